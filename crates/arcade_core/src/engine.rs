use rand::Rng;

use crate::console::{apply_breakdown_rate, place_console, update_consoles};
use crate::guest::{spawn_guest, update_guests};
use crate::navigation::Navigator;
use crate::queue::QueueManager;
use crate::{Command, CommandEnvelope, Event, EventEnvelope, EventLevel, GameContent, GameState};

/// Advance the floor by one tick of `delta_ms` milliseconds.
///
/// Order of operations:
/// 1. Advance the clock.
/// 2. Apply commands scheduled for this tick.
/// 3. Roll over to a new day (and rescale difficulty) if the clock crossed one.
/// 4. Queue pass: abandonment, advancement, targeting, admission.
/// 5. Guest transitions: walking, patience, use completion, departure.
/// 6. Console transitions: breakdown checks and repairs.
/// 7. Increment tick counter.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    navigator: &impl Navigator,
    rng: &mut impl Rng,
    delta_ms: f64,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    let delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };
    state.meta.now_ms += delta_ms;

    apply_commands(state, commands, content, rng, event_level, &mut events);
    roll_day(state, content, &mut events);
    QueueManager::new(content).update(state, navigator, rng, &mut events);
    update_guests(state, content, navigator, delta_ms, &mut events);
    update_consoles(state, content, navigator, rng, &mut events);

    state.meta.tick += 1;
    events
}

/// Day number for a clock reading. Day 1 starts at zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn day_for_time(now_ms: f64, day_length_ms: f64) -> u32 {
    if day_length_ms <= 0.0 || now_ms <= 0.0 {
        return 1;
    }
    let elapsed_days = (now_ms / day_length_ms).floor();
    if elapsed_days >= f64::from(u32::MAX - 1) {
        return u32::MAX;
    }
    elapsed_days as u32 + 1
}

fn roll_day(state: &mut GameState, content: &GameContent, events: &mut Vec<EventEnvelope>) {
    let day = day_for_time(state.meta.now_ms, content.constants.day_length_ms);
    if day <= state.difficulty.day {
        return;
    }
    let current_tick = state.meta.tick;
    let now = state.meta.now_ms;
    let changed = state
        .difficulty
        .update_difficulty_for_day(&content.difficulty, day);
    tracing::debug!(day, changed, "day started");
    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        now,
        Event::DayStarted { day },
    ));
    if changed {
        apply_breakdown_rate(state);
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            now,
            Event::DifficultyChanged {
                day,
                parameters: state.difficulty.parameters.clone(),
            },
        ));
    }
}

fn apply_commands(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    let now = state.meta.now_ms;

    for envelope in commands {
        if envelope.execute_at_tick != current_tick {
            continue;
        }
        let event = match &envelope.command {
            Command::SpawnGuest { guest_type } => {
                match spawn_guest(state, content, rng, *guest_type) {
                    Some(guest_id) => Some(Event::GuestSpawned {
                        guest_id,
                        guest_type: state.guests[&guest_id].guest_type,
                    }),
                    None if event_level == EventLevel::Debug => Some(Event::GuestSpawnDenied {
                        active_guests: state.active_guest_count(),
                        max_guests: state.difficulty.max_simultaneous_guests(),
                    }),
                    None => None,
                }
            }
            Command::PlaceConsole { kind, position } => {
                place_console(state, content, kind, *position).map(|console_id| {
                    Event::ConsolePlaced {
                        console_id,
                        kind: kind.clone(),
                    }
                })
            }
            Command::RepairConsole { console_id } => {
                let started = state
                    .consoles
                    .get_mut(console_id)
                    .is_some_and(|console| console.start_repair(now));
                started.then_some(Event::ConsoleRepairStarted {
                    console_id: *console_id,
                })
            }
        };
        if let Some(event) = event {
            events.push(crate::emit(&mut state.counters, current_tick, now, event));
        }
    }
}
