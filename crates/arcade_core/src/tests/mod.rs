use super::*;
use crate::test_fixtures::{
    assert_floor_invariants, base_content, base_state, empty_state, insert_guest,
    insert_guest_of_type, make_rng, place_guest_at,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

mod commands;
mod queueing;

// --- Shared test helpers ------------------------------------------------

const TICK_MS: f64 = 100.0;

fn test_content() -> GameContent {
    base_content()
}

fn test_state(content: &GameContent) -> GameState {
    base_state(content)
}

fn command(state: &GameState, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{:06}", state.meta.tick)),
        issued_tick: state.meta.tick,
        execute_at_tick: state.meta.tick,
        command,
    }
}

fn spawn_command(state: &GameState, guest_type: Option<GuestType>) -> CommandEnvelope {
    command(state, Command::SpawnGuest { guest_type })
}

/// The first console placed from `starting_consoles` (an arcade cabinet,
/// capacity 1).
fn cabinet(state: &GameState) -> ConsoleId {
    *state.consoles.keys().next().unwrap()
}

/// Runs `n` empty ticks and returns every event produced.
fn run_ticks(
    state: &mut GameState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    n: u64,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(tick(
            state,
            &[],
            content,
            &DirectNavigator,
            rng,
            TICK_MS,
            EventLevel::Normal,
        ));
    }
    events
}

fn count_kind(events: &[EventEnvelope], kind: EventKind) -> usize {
    events.iter().filter(|e| e.event.kind() == kind).count()
}
