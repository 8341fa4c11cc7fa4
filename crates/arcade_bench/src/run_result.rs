use arcade_core::MetricsSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Fewer departures than this never count as an angry-majority collapse.
const COLLAPSE_MIN_DEPARTURES: u64 = 10;

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub run_schema_version: u32,
    pub run_status: String,
    pub run_id: String,
    pub seed: u64,
    pub scenario_name: String,
    pub scenario_params: serde_json::Value,
    pub tick_start: u64,
    pub tick_end: u64,
    pub total_ticks: u64,
    pub wall_time_ms: u64,
    pub sim_ticks_per_second: f64,
    pub summary_metrics: Option<SummaryMetrics>,
    pub event_counts_by_kind: BTreeMap<String, u64>,
    pub first_breakdown_tick: Option<u64>,
    pub collapse_occurred: bool,
    pub collapse_tick: Option<u64>,
    pub collapse_reason: Option<String>,
    pub metrics_path: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryMetrics {
    pub day: u32,
    pub guests_spawned: u64,
    pub guests_served: u64,
    pub guests_angered: u64,
    pub guests_abandoned: u64,
    pub guests_left: u64,
    pub avg_departed_satisfaction: f64,
    pub guests_on_floor: u32,
    pub total_queued: u32,
    pub longest_queue: u32,
    pub queue_advancements: u64,
    pub consoles_broken: u32,
    pub consoles_under_repair: u32,
    pub avg_console_durability: f64,
    pub console_utilization: f64,
    pub breakdowns: u64,
    pub repairs: u64,
    pub difficulty_intensity: f64,
}

impl SummaryMetrics {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            day: snapshot.day,
            guests_spawned: snapshot.guests_spawned,
            guests_served: snapshot.guests_served,
            guests_angered: snapshot.guests_angered,
            guests_abandoned: snapshot.guests_abandoned,
            guests_left: snapshot.guests_left,
            avg_departed_satisfaction: f64::from(snapshot.avg_departed_satisfaction),
            guests_on_floor: snapshot.guests_total,
            total_queued: snapshot.total_queued,
            longest_queue: snapshot.longest_queue,
            queue_advancements: snapshot.queue_advancements,
            consoles_broken: snapshot.consoles_broken,
            consoles_under_repair: snapshot.consoles_under_repair,
            avg_console_durability: f64::from(snapshot.avg_console_durability),
            console_utilization: f64::from(snapshot.console_utilization),
            breakdowns: snapshot.breakdowns,
            repairs: snapshot.repairs,
            difficulty_intensity: snapshot.difficulty_intensity,
        }
    }
}

impl RunResult {
    /// Write JSON atomically: write to `.tmp` then rename.
    pub fn write_atomic(&self, path: &Path) -> anyhow::Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// A floor has collapsed when no console can take a guest, or when most of
/// the guests who left did so angry.
pub fn detect_collapse(snapshot: &MetricsSnapshot) -> (bool, Option<String>) {
    if snapshot.consoles_total > 0
        && snapshot.consoles_operational + snapshot.consoles_in_use == 0
    {
        return (true, Some("no_working_consoles".to_string()));
    }
    if snapshot.guests_left >= COLLAPSE_MIN_DEPARTURES
        && snapshot.guests_angered * 2 > snapshot.guests_left
    {
        return (true, Some("angry_majority".to_string()));
    }
    (false, None)
}
