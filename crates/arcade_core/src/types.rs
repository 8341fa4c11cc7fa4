//! Type definitions for `arcade_core`.
//!
//! All public state, content, command and event types used by the engine.
//! Entities reference each other by id only; the arenas live in `GameState`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::difficulty::{DifficultyCurve, DifficultyParameters, DifficultyScaling};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! numeric_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "_{:04}"), self.0)
            }
        }
    };
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

numeric_id!(GuestId, "guest");
numeric_id!(ConsoleId, "console");
string_id!(CommandId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestType {
    Family,
    Enthusiast,
    Casual,
    Tourist,
}

impl GuestType {
    /// Fixed walk order for cumulative distribution draws.
    pub const ALL: [GuestType; 4] = [
        GuestType::Family,
        GuestType::Enthusiast,
        GuestType::Casual,
        GuestType::Tourist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GuestType::Family => "family",
            GuestType::Enthusiast => "enthusiast",
            GuestType::Casual => "casual",
            GuestType::Tourist => "tourist",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestState {
    Seeking,
    Waiting,
    Using,
    Leaving,
    Angry,
}

impl GuestState {
    pub fn as_str(self) -> &'static str {
        match self {
            GuestState::Seeking => "seeking",
            GuestState::Waiting => "waiting",
            GuestState::Using => "using",
            GuestState::Leaving => "leaving",
            GuestState::Angry => "angry",
        }
    }

    /// `Leaving` and `Angry` never return to any other state.
    pub fn is_departing(self) -> bool {
        matches!(self, GuestState::Leaving | GuestState::Angry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleState {
    Operational,
    InUse,
    Broken,
    UnderRepair,
}

impl ConsoleState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleState::Operational => "operational",
            ConsoleState::InUse => "in_use",
            ConsoleState::Broken => "broken",
            ConsoleState::UnderRepair => "under_repair",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub meta: MetaState,
    pub difficulty: DifficultyScaling,
    pub guests: BTreeMap<GuestId, Guest>,
    pub consoles: BTreeMap<ConsoleId, Console>,
    pub stats: FloorStats,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    /// Simulation clock in milliseconds since the floor opened.
    pub now_ms: f64,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
    pub next_guest_id: u64,
    pub next_console_id: u64,
}

/// Lifetime totals. Never decremented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorStats {
    pub guests_spawned: u64,
    pub guests_served: u64,
    pub guests_angered: u64,
    pub guests_abandoned: u64,
    pub guests_left: u64,
    /// Sum of final satisfaction over every guest that left the floor.
    pub departed_satisfaction_total: i64,
    pub queue_advancements: u64,
    pub breakdowns: u64,
    pub repairs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub guest_type: GuestType,
    pub state: GuestState,
    pub satisfaction: i32,
    /// Base budget before the difficulty modifier is applied.
    pub patience_ms: f64,
    /// Difficulty patience modifier captured at spawn time.
    pub patience_modifier: f64,
    pub arrival_ms: f64,
    /// Index in the queue of `target_console`; `None` when not queued.
    pub queue_position: Option<usize>,
    pub current_console: Option<ConsoleId>,
    pub target_console: Option<ConsoleId>,
    pub queued_at_ms: Option<f64>,
    pub use_started_ms: Option<f64>,
    /// Consoles this guest already refused to queue for.
    pub declined: SmallVec<[ConsoleId; 4]>,
    pub position: Position,
    pub route: VecDeque<Position>,
    pub walk_speed: f32,
    /// Set once patience ran out; survives the move to `Leaving`.
    pub angered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Console {
    pub id: ConsoleId,
    /// References a `ConsoleDef` id in `GameContent`.
    pub kind: String,
    pub state: ConsoleState,
    pub durability: u32,
    pub max_durability: u32,
    pub durability_loss_per_use: u32,
    pub capacity: u32,
    pub current_users: SmallVec<[GuestId; 4]>,
    pub queue: Vec<GuestId>,
    pub appeal: f64,
    pub appeals_to: Vec<GuestType>,
    pub breakdown_chance: f64,
    pub position: Position,
    pub use_duration_ms: f64,
    pub repair_duration_ms: f64,
    pub repair_started_ms: Option<f64>,
    /// Set when a use cycle completes; consumed by the console step.
    pub breakdown_check_due: bool,
    pub total_uses: u64,
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_tick: u64,
    pub execute_at_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// `None` draws the type from the current difficulty distribution.
    SpawnGuest { guest_type: Option<GuestType> },
    PlaceConsole { kind: String, position: Position },
    RepairConsole { console_id: ConsoleId },
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub now_ms: f64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DayStarted {
        day: u32,
    },
    DifficultyChanged {
        day: u32,
        parameters: DifficultyParameters,
    },
    GuestSpawned {
        guest_id: GuestId,
        guest_type: GuestType,
    },
    /// Only emitted at `EventLevel::Debug`.
    GuestSpawnDenied {
        active_guests: usize,
        max_guests: u32,
    },
    GuestTargetedConsole {
        guest_id: GuestId,
        console_id: ConsoleId,
        score: f64,
    },
    GuestJoinedQueue {
        guest_id: GuestId,
        console_id: ConsoleId,
        position: usize,
    },
    QueueJoinDeclined {
        guest_id: GuestId,
        console_id: ConsoleId,
    },
    QueueAdvanced {
        console_id: ConsoleId,
        guest_id: GuestId,
        remaining: usize,
    },
    GuestAbandonedQueue {
        guest_id: GuestId,
        console_id: ConsoleId,
        waited_ms: f64,
    },
    GuestStartedUsing {
        guest_id: GuestId,
        console_id: ConsoleId,
    },
    GuestFinishedUsing {
        guest_id: GuestId,
        console_id: ConsoleId,
        satisfaction: i32,
    },
    GuestBecameAngry {
        guest_id: GuestId,
        was_queued_at: Option<ConsoleId>,
    },
    GuestLeft {
        guest_id: GuestId,
        satisfaction: i32,
        angry: bool,
    },
    ConsolePlaced {
        console_id: ConsoleId,
        kind: String,
    },
    ConsoleBrokeDown {
        console_id: ConsoleId,
        released_guests: usize,
        ejected_guests: usize,
    },
    ConsoleRepairStarted {
        console_id: ConsoleId,
    },
    ConsoleRepaired {
        console_id: ConsoleId,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub consoles: Vec<ConsoleDef>,
    pub guests: Vec<GuestProfileDef>,
    pub difficulty: DifficultyCurve,
    pub starting_consoles: Vec<ConsolePlacement>,
    pub constants: Constants,
}

impl GameContent {
    pub fn console_def(&self, kind: &str) -> Option<&ConsoleDef> {
        self.consoles.iter().find(|def| def.id == kind)
    }

    pub fn guest_profile(&self, guest_type: GuestType) -> Option<&GuestProfileDef> {
        self.guests.iter().find(|p| p.guest_type == guest_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleDef {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    pub max_durability: u32,
    pub durability_loss_per_use: u32,
    pub appeal: f64,
    pub appeals_to: Vec<GuestType>,
    pub use_duration_ms: f64,
    pub repair_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestProfileDef {
    pub guest_type: GuestType,
    pub base_patience_ms: f64,
    pub base_satisfaction: i32,
    /// Floor units per millisecond.
    pub walk_speed: f32,
    /// Probability of accepting a queue before the difficulty modifier.
    pub queue_willingness: f64,
    /// Longest wait in a queue before the guest gives up.
    pub queue_tolerance_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolePlacement {
    pub kind: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    pub day_length_ms: f64,
    pub entrance: Position,
    pub exit: Position,
    /// Guests within this distance of their target count as arrived.
    pub arrival_radius: f32,
    pub max_queue_length: usize,
    // Console scoring
    pub type_match_multiplier: f64,
    pub distance_scale: f64,
    pub queue_length_penalty: f64,
    pub congestion_radius: f32,
    pub congestion_weight: f64,
    // Satisfaction deltas
    pub completion_satisfaction: i32,
    pub type_match_satisfaction: i32,
    pub abandon_satisfaction_penalty: i32,
    pub breakdown_satisfaction_penalty: i32,
    /// Broken consoles start repairing on their own when set.
    pub auto_repair: bool,
}
