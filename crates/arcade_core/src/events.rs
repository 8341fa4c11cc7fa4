//! Typed event bus.
//!
//! Listeners subscribe to an `EventKind` and receive every matching
//! `EventEnvelope` in registration order. A listener that returns an error or
//! panics is logged and skipped; the remaining listeners still run.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{Event, EventEnvelope};

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Box<dyn FnMut(&EventEnvelope) -> Result<(), ListenerError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Fieldless discriminant of `Event`, used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    DayStarted,
    DifficultyChanged,
    GuestSpawned,
    GuestSpawnDenied,
    GuestTargetedConsole,
    GuestJoinedQueue,
    QueueJoinDeclined,
    QueueAdvanced,
    GuestAbandonedQueue,
    GuestStartedUsing,
    GuestFinishedUsing,
    GuestBecameAngry,
    GuestLeft,
    ConsolePlaced,
    ConsoleBrokeDown,
    ConsoleRepairStarted,
    ConsoleRepaired,
}

impl EventKind {
    pub const ALL: [EventKind; 17] = [
        EventKind::DayStarted,
        EventKind::DifficultyChanged,
        EventKind::GuestSpawned,
        EventKind::GuestSpawnDenied,
        EventKind::GuestTargetedConsole,
        EventKind::GuestJoinedQueue,
        EventKind::QueueJoinDeclined,
        EventKind::QueueAdvanced,
        EventKind::GuestAbandonedQueue,
        EventKind::GuestStartedUsing,
        EventKind::GuestFinishedUsing,
        EventKind::GuestBecameAngry,
        EventKind::GuestLeft,
        EventKind::ConsolePlaced,
        EventKind::ConsoleBrokeDown,
        EventKind::ConsoleRepairStarted,
        EventKind::ConsoleRepaired,
    ];

    /// Wire name used by presentation layers.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::DayStarted => "dayStarted",
            EventKind::DifficultyChanged => "difficultyChanged",
            EventKind::GuestSpawned => "guestSpawned",
            EventKind::GuestSpawnDenied => "guestSpawnDenied",
            EventKind::GuestTargetedConsole => "guestTargetedConsole",
            EventKind::GuestJoinedQueue => "guestJoinedQueue",
            EventKind::QueueJoinDeclined => "queueJoinDeclined",
            EventKind::QueueAdvanced => "queueAdvanced",
            EventKind::GuestAbandonedQueue => "guestAbandonedQueue",
            EventKind::GuestStartedUsing => "guestStartedUsing",
            EventKind::GuestFinishedUsing => "guestFinishedUsing",
            EventKind::GuestBecameAngry => "guestBecameAngry",
            EventKind::GuestLeft => "guestLeft",
            EventKind::ConsolePlaced => "consolePlaced",
            EventKind::ConsoleBrokeDown => "consoleBrokeDown",
            EventKind::ConsoleRepairStarted => "consoleRepairStarted",
            EventKind::ConsoleRepaired => "consoleRepaired",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DayStarted { .. } => EventKind::DayStarted,
            Event::DifficultyChanged { .. } => EventKind::DifficultyChanged,
            Event::GuestSpawned { .. } => EventKind::GuestSpawned,
            Event::GuestSpawnDenied { .. } => EventKind::GuestSpawnDenied,
            Event::GuestTargetedConsole { .. } => EventKind::GuestTargetedConsole,
            Event::GuestJoinedQueue { .. } => EventKind::GuestJoinedQueue,
            Event::QueueJoinDeclined { .. } => EventKind::QueueJoinDeclined,
            Event::QueueAdvanced { .. } => EventKind::QueueAdvanced,
            Event::GuestAbandonedQueue { .. } => EventKind::GuestAbandonedQueue,
            Event::GuestStartedUsing { .. } => EventKind::GuestStartedUsing,
            Event::GuestFinishedUsing { .. } => EventKind::GuestFinishedUsing,
            Event::GuestBecameAngry { .. } => EventKind::GuestBecameAngry,
            Event::GuestLeft { .. } => EventKind::GuestLeft,
            Event::ConsolePlaced { .. } => EventKind::ConsolePlaced,
            Event::ConsoleBrokeDown { .. } => EventKind::ConsoleBrokeDown,
            Event::ConsoleRepairStarted { .. } => EventKind::ConsoleRepairStarted,
            Event::ConsoleRepaired { .. } => EventKind::ConsoleRepaired,
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    next_listener_id: u64,
    listeners: BTreeMap<EventKind, Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&EventEnvelope) -> Result<(), ListenerError> + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Subscribes by wire name. Unknown names register nothing.
    pub fn on_named<F>(&mut self, name: &str, listener: F) -> Option<ListenerId>
    where
        F: FnMut(&EventEnvelope) -> Result<(), ListenerError> + 'static,
    {
        let kind = EventKind::from_name(name)?;
        Some(self.on(kind, listener))
    }

    /// Returns false when no such listener is registered for `kind`.
    pub fn off(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Dispatches one envelope. Returns the number of listeners that failed.
    pub fn emit(&mut self, envelope: &EventEnvelope) -> usize {
        let kind = envelope.event.kind();
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return 0;
        };
        let mut failures = 0;
        for (id, listener) in listeners.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    tracing::warn!(event = kind.name(), listener = id.0, "listener failed: {err}");
                }
                Err(_) => {
                    failures += 1;
                    tracing::warn!(event = kind.name(), listener = id.0, "listener panicked");
                }
            }
        }
        failures
    }

    pub fn emit_all(&mut self, envelopes: &[EventEnvelope]) -> usize {
        envelopes.iter().map(|envelope| self.emit(envelope)).sum()
    }
}
