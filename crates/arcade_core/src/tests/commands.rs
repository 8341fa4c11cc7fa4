use super::*;

fn run_one(
    state: &mut GameState,
    content: &GameContent,
    commands: &[CommandEnvelope],
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    tick(
        state,
        commands,
        content,
        &DirectNavigator,
        &mut make_rng(),
        TICK_MS,
        event_level,
    )
}

#[test]
fn test_spawn_denial_is_a_debug_event() {
    let content = test_content();
    let cap = content.difficulty.base.max_simultaneous_guests as usize;

    let mut state = test_state(&content);
    let spawns: Vec<CommandEnvelope> = (0..=cap).map(|_| spawn_command(&state, None)).collect();
    let events = run_one(&mut state, &content, &spawns, EventLevel::Debug);
    assert_eq!(count_kind(&events, EventKind::GuestSpawned), cap);
    assert_eq!(count_kind(&events, EventKind::GuestSpawnDenied), 1);
    assert_eq!(state.guests.len(), cap);

    let mut state = test_state(&content);
    let spawns: Vec<CommandEnvelope> = (0..=cap).map(|_| spawn_command(&state, None)).collect();
    let events = run_one(&mut state, &content, &spawns, EventLevel::Normal);
    assert_eq!(count_kind(&events, EventKind::GuestSpawnDenied), 0);
    assert_eq!(state.guests.len(), cap);
}

#[test]
fn test_explicit_guest_type_is_honored() {
    let content = test_content();
    let mut state = test_state(&content);
    let spawn = spawn_command(&state, Some(GuestType::Enthusiast));
    let events = run_one(&mut state, &content, &[spawn], EventLevel::Normal);
    assert!(events.iter().any(|e| matches!(
        e.event,
        Event::GuestSpawned {
            guest_type: GuestType::Enthusiast,
            ..
        }
    )));
    assert!(state
        .guests
        .values()
        .all(|g| g.guest_type == GuestType::Enthusiast));
}

#[test]
fn test_commands_for_other_ticks_are_ignored() {
    let content = test_content();
    let mut state = test_state(&content);
    let mut spawn = spawn_command(&state, None);
    spawn.execute_at_tick = 5;
    let events = run_one(&mut state, &content, &[spawn], EventLevel::Debug);
    assert!(events.is_empty());
    assert!(state.guests.is_empty());
}

#[test]
fn test_placing_consoles_needs_a_known_kind() {
    let content = test_content();
    let mut state = empty_state(&content);
    let place = |state: &GameState, kind: &str| {
        command(
            state,
            Command::PlaceConsole {
                kind: kind.to_string(),
                position: Position::new(3.0, 4.0),
            },
        )
    };
    let known = place(&state, "racing_sim");
    let unknown = place(&state, "claw_machine");
    let events = run_one(&mut state, &content, &[known, unknown], EventLevel::Normal);

    assert_eq!(count_kind(&events, EventKind::ConsolePlaced), 1);
    assert_eq!(state.consoles.len(), 1);
    let console = state.consoles.values().next().unwrap();
    assert_eq!(console.kind, "racing_sim");
    assert_eq!(console.capacity, 2);
    assert_eq!(console.id.to_string(), "console_0001");
}

#[test]
fn test_repairing_an_unknown_console_is_a_no_op() {
    let content = test_content();
    let mut state = test_state(&content);
    let repair = command(
        &state,
        Command::RepairConsole {
            console_id: ConsoleId(999),
        },
    );
    let events = run_one(&mut state, &content, &[repair], EventLevel::Debug);
    assert_eq!(count_kind(&events, EventKind::ConsoleRepairStarted), 0);
}

#[test]
fn test_state_round_trips_through_json() {
    let content = test_content();
    let mut state = test_state(&content);
    let mut rng = make_rng();
    let spawn = spawn_command(&state, None);
    tick(
        &mut state,
        &[spawn],
        &content,
        &DirectNavigator,
        &mut rng,
        TICK_MS,
        EventLevel::Normal,
    );
    run_ticks(&mut state, &content, &mut rng, 40);

    let json = serde_json::to_string(&state).unwrap();
    let restored: GameState = serde_json::from_str(&json).unwrap();
    assert_eq!(serde_json::to_string(&restored).unwrap(), json);
    assert_floor_invariants(&restored);
}
