//! Flat save records.
//!
//! A `SaveSnapshot` keeps levels and counters only: the day, clock, lifetime
//! statistics and each console's wear. Guests are transient and are not
//! saved; restoring yields an open floor with empty queues.

use serde::{Deserialize, Serialize};

use crate::difficulty::DifficultyScaling;
use crate::{
    Console, ConsoleId, ConsoleState, Counters, FloorStats, GameContent, GameState, MetaState,
    Position,
};

pub const SAVE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLevel {
    pub id: ConsoleId,
    pub kind: String,
    pub position: Position,
    pub durability: u32,
    pub state: ConsoleState,
    pub repair_started_ms: Option<f64>,
    pub total_uses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub schema_version: u32,
    pub content_version: String,
    pub seed: u64,
    pub tick: u64,
    pub now_ms: f64,
    pub day: u32,
    pub next_event_id: u64,
    pub next_guest_id: u64,
    pub next_console_id: u64,
    pub stats: FloorStats,
    pub consoles: Vec<ConsoleLevel>,
}

impl SaveSnapshot {
    pub fn from_state(state: &GameState) -> Self {
        let consoles = state
            .consoles
            .values()
            .map(|console| ConsoleLevel {
                id: console.id,
                kind: console.kind.clone(),
                position: console.position,
                durability: console.durability,
                state: console.state,
                repair_started_ms: console.repair_started_ms,
                total_uses: console.total_uses,
            })
            .collect();
        Self {
            schema_version: SAVE_SCHEMA_VERSION,
            content_version: state.meta.content_version.clone(),
            seed: state.meta.seed,
            tick: state.meta.tick,
            now_ms: state.meta.now_ms,
            day: state.difficulty.day,
            next_event_id: state.counters.next_event_id,
            next_guest_id: state.counters.next_guest_id,
            next_console_id: state.counters.next_console_id,
            stats: state.stats.clone(),
            consoles,
        }
    }

    /// Rebuilds a floor from the saved levels. Returns `None` for a schema
    /// this build does not read. Consoles whose kind no longer exists in
    /// `content` are dropped.
    pub fn restore(&self, content: &GameContent) -> Option<GameState> {
        if self.schema_version != SAVE_SCHEMA_VERSION {
            tracing::warn!(
                found = self.schema_version,
                expected = SAVE_SCHEMA_VERSION,
                "unsupported save schema"
            );
            return None;
        }

        let mut difficulty = DifficultyScaling::new(&content.difficulty);
        difficulty.update_difficulty_for_day(&content.difficulty, self.day.max(1));
        let breakdown_rate = difficulty.console_breakdown_rate();

        let mut consoles = std::collections::BTreeMap::new();
        for level in &self.consoles {
            let Some(def) = content.console_def(&level.kind) else {
                tracing::warn!(kind = %level.kind, console = %level.id, "dropping console of unknown kind");
                continue;
            };
            let mut console = Console::from_def(level.id, def, level.position, breakdown_rate);
            console.durability = level.durability.min(console.max_durability);
            console.total_uses = level.total_uses;
            console.state = match level.state {
                ConsoleState::InUse => ConsoleState::Operational,
                other => other,
            };
            if console.state == ConsoleState::UnderRepair {
                console.repair_started_ms = Some(level.repair_started_ms.unwrap_or(self.now_ms));
            }
            consoles.insert(level.id, console);
        }

        let next_console_id = consoles
            .keys()
            .next_back()
            .map_or(self.next_console_id, |id| self.next_console_id.max(id.0 + 1));

        Some(GameState {
            meta: MetaState {
                tick: self.tick,
                now_ms: self.now_ms,
                seed: self.seed,
                schema_version: self.schema_version,
                content_version: self.content_version.clone(),
            },
            difficulty,
            guests: std::collections::BTreeMap::new(),
            consoles,
            stats: self.stats.clone(),
            counters: Counters {
                next_event_id: self.next_event_id,
                next_command_id: 0,
                next_guest_id: self.next_guest_id,
                next_console_id,
            },
        })
    }
}
