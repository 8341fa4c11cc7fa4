use arcade_core::{
    Command, CommandEnvelope, CommandId, ConsoleId, ConsoleState, GameContent, GameState,
};
use serde::{Deserialize, Serialize};

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &GameState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

/// Runs the floor without a player:
/// 1. Sends in a guest whenever the difficulty spawn interval has elapsed and
///    the floor is below its guest cap.
/// 2. Orders repairs for broken consoles when content turns `auto_repair` off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloorManager {
    last_spawn_ms: Option<f64>,
}

/// Allocates a command ID and builds a `CommandEnvelope` for the current tick.
fn make_cmd(tick: u64, next_id: &mut u64, command: Command) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_tick: tick,
        execute_at_tick: tick,
        command,
    }
}

/// Broken consoles sorted by ID; the arena is already ordered.
fn broken_consoles(state: &GameState) -> Vec<ConsoleId> {
    state
        .consoles
        .values()
        .filter(|console| console.state == ConsoleState::Broken)
        .map(|console| console.id)
        .collect()
}

impl FloorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock time of the last spawn this manager requested.
    pub fn last_spawn_ms(&self) -> Option<f64> {
        self.last_spawn_ms
    }

    fn spawn_due(&self, state: &GameState) -> bool {
        match self.last_spawn_ms {
            None => true,
            Some(last) => state.meta.now_ms - last >= state.difficulty.guest_spawn_interval_ms(),
        }
    }
}

impl CommandSource for FloorManager {
    fn generate_commands(
        &mut self,
        state: &GameState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let tick = state.meta.tick;
        let mut commands = Vec::new();

        // A full floor holds the timer; the next free slot is filled at once.
        if self.spawn_due(state)
            && state
                .difficulty
                .can_spawn_more_guests(state.active_guest_count())
        {
            commands.push(make_cmd(
                tick,
                next_command_id,
                Command::SpawnGuest { guest_type: None },
            ));
            self.last_spawn_ms = Some(state.meta.now_ms);
        }

        if !content.constants.auto_repair {
            for console_id in broken_consoles(state) {
                commands.push(make_cmd(
                    tick,
                    next_command_id,
                    Command::RepairConsole { console_id },
                ));
            }
        }

        commands
    }
}
