//! `arcade_core`: deterministic guest/console matching and queueing engine.
//!
//! No IO beyond the metrics CSV helpers, no network. All randomness via the
//! passed-in Rng; all routes via the passed-in `Navigator`.

mod console;
pub mod difficulty;
mod engine;
pub mod events;
mod floor;
mod guest;
pub mod metrics;
pub mod navigation;
pub mod queue;
pub mod snapshot;
mod types;

pub use console::place_console;
pub use difficulty::{
    parameters_for_day, DayPreview, DifficultyCurve, DifficultyParameters, DifficultyScaling,
    DifficultySummary, TypeDistribution,
};
pub use engine::{day_for_time, tick};
pub use events::{EventBus, EventKind, ListenerError, ListenerId};
pub use guest::{spawn_guest, ANGRY_SATISFACTION};
pub use metrics::{compute_metrics, write_metrics_csv, MetricsFileWriter, MetricsSnapshot};
pub use navigation::{DirectNavigator, Navigator};
pub use queue::{ConsoleQueueView, QueueManager, QueueUpdateSummary};
pub use snapshot::{SaveSnapshot, SAVE_SCHEMA_VERSION};
pub use types::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub(crate) fn emit(counters: &mut Counters, tick: u64, now_ms: f64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        tick,
        now_ms,
        event,
    }
}

#[cfg(test)]
mod tests;
