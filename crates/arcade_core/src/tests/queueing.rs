use super::*;

#[test]
fn test_queue_positions_follow_join_order() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let g1 = insert_guest(&mut state, &content, GuestId(1));
    let g2 = insert_guest(&mut state, &content, GuestId(2));

    assert_eq!(state.add_to_queue(console_id, g1), Some(0));
    assert_eq!(state.add_to_queue(console_id, g2), Some(1));

    assert_eq!(state.guests[&g1].queue_position, Some(0));
    assert_eq!(state.guests[&g2].queue_position, Some(1));
    assert_eq!(state.next_in_queue(console_id), Some(g1));
    assert_eq!(state.queue_length(console_id), 2, "peek must not remove");
    assert_floor_invariants(&state);
}

#[test]
fn test_a_guest_cannot_hold_two_queue_slots() {
    let content = test_content();
    let mut state = test_state(&content);
    let ids: Vec<ConsoleId> = state.consoles.keys().copied().collect();
    let g1 = insert_guest(&mut state, &content, GuestId(1));

    assert_eq!(state.add_to_queue(ids[0], g1), Some(0));
    assert_eq!(state.add_to_queue(ids[1], g1), None);
    assert_eq!(state.queue_length(ids[1]), 0);
}

#[test]
fn test_removal_renumbers_everyone_behind() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let guests: Vec<GuestId> = (1..=4)
        .map(|n| insert_guest(&mut state, &content, GuestId(n)))
        .collect();
    for guest_id in &guests {
        state.add_to_queue(console_id, *guest_id);
    }

    assert_eq!(state.remove_from_queue(guests[1]), Some(console_id));

    assert_eq!(state.guests[&guests[1]].queue_position, None);
    assert_eq!(state.guests[&guests[0]].queue_position, Some(0));
    assert_eq!(state.guests[&guests[2]].queue_position, Some(1));
    assert_eq!(state.guests[&guests[3]].queue_position, Some(2));
    // The removed guest still reads Waiting; send it elsewhere before checking.
    state.guests.get_mut(&guests[1]).unwrap().state = GuestState::Leaving;
    assert_floor_invariants(&state);
}

#[test]
fn test_advancement_moves_the_head_onto_a_freed_slot() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let user = insert_guest(&mut state, &content, GuestId(1));
    let g2 = insert_guest(&mut state, &content, GuestId(2));
    let g3 = insert_guest(&mut state, &content, GuestId(3));

    assert!(state.start_using_console(user, console_id));
    state.add_to_queue(console_id, g2);
    state.add_to_queue(console_id, g3);
    state.finish_using_console(user);
    state.guests.get_mut(&user).unwrap().state = GuestState::Leaving;

    let manager = QueueManager::new(&content);
    let mut events = Vec::new();
    let advanced = manager.process_queue_advancement(&mut state, &mut events);

    assert_eq!(advanced, 1);
    assert_eq!(state.queue_length(console_id), 1);
    let moved = &state.guests[&g2];
    assert_eq!(moved.queue_position, None);
    assert_eq!(moved.state, GuestState::Using);
    assert_eq!(moved.current_console, Some(console_id));
    assert_eq!(state.guests[&g3].queue_position, Some(0));
    assert_eq!(count_kind(&events, EventKind::QueueAdvanced), 1);
    assert_eq!(state.stats.queue_advancements, 1);
    assert_floor_invariants(&state);
}

#[test]
fn test_advancement_leaves_a_full_console_alone() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let user = insert_guest(&mut state, &content, GuestId(1));
    let waiting = insert_guest(&mut state, &content, GuestId(2));
    state.start_using_console(user, console_id);
    state.add_to_queue(console_id, waiting);

    let mut events = Vec::new();
    let advanced = QueueManager::new(&content).process_queue_advancement(&mut state, &mut events);

    assert_eq!(advanced, 0);
    assert!(events.is_empty());
    assert_eq!(state.guests[&waiting].queue_position, Some(0));
}

#[test]
fn test_abandonment_is_strictly_past_tolerance() {
    let content = test_content();
    let mut state = test_state(&content);
    let id = insert_guest_of_type(&mut state, &content, GuestId(1), GuestType::Enthusiast);
    let manager = QueueManager::new(&content);
    let guest = &state.guests[&id];

    assert!(manager.should_abandon_queue(guest, 20_000.0));
    assert!(!manager.should_abandon_queue(guest, 15_000.0));
    assert!(!manager.should_abandon_queue(guest, 0.0));
}

#[test]
fn test_expired_waits_leave_the_queue_with_a_penalty() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let user = insert_guest(&mut state, &content, GuestId(1));
    let waiter = insert_guest_of_type(&mut state, &content, GuestId(2), GuestType::Enthusiast);
    state.start_using_console(user, console_id);
    state.add_to_queue(console_id, waiter);
    let before = state.guests[&waiter].satisfaction;

    state.meta.now_ms = 20_000.0;
    let mut events = Vec::new();
    let summary =
        QueueManager::new(&content).update(&mut state, &DirectNavigator, &mut make_rng(), &mut events);

    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.total_queued, 0);
    let guest = &state.guests[&waiter];
    assert_eq!(guest.state, GuestState::Leaving);
    assert_eq!(guest.queue_position, None);
    assert_eq!(
        guest.satisfaction,
        before - content.constants.abandon_satisfaction_penalty
    );
    assert_eq!(state.stats.guests_abandoned, 1);
    assert_eq!(count_kind(&events, EventKind::GuestAbandonedQueue), 1);
    assert_floor_invariants(&state);
}

#[test]
fn test_four_seeking_guests_never_double_count() {
    let content = test_content();
    let mut state = test_state(&content);
    let mut rng = make_rng();
    let manager = QueueManager::new(&content);
    let spot = state.consoles[&cabinet(&state)].position;
    for n in 1..=4 {
        let id = insert_guest(&mut state, &content, GuestId(n));
        place_guest_at(&mut state, id, spot);
    }

    let mut events = Vec::new();
    for _ in 0..3 {
        let summary = manager.update(&mut state, &DirectNavigator, &mut rng, &mut events);
        assert!(summary.total_queued <= 4);
        assert_floor_invariants(&state);
    }
    let using = state
        .guests
        .values()
        .filter(|g| g.state == GuestState::Using)
        .count();
    assert_eq!(using, 1, "the cabinet seats one guest");
}

#[test]
fn test_score_prefers_type_match_proximity_and_short_queues() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let casual = insert_guest_of_type(&mut state, &content, GuestId(1), GuestType::Casual);
    let family = insert_guest_of_type(&mut state, &content, GuestId(2), GuestType::Family);
    let manager = QueueManager::new(&content);
    let console = state.consoles[&console_id].clone();

    let matched = manager.calculate_queue_score(&state.guests[&casual], &console, 5.0);
    let unmatched = manager.calculate_queue_score(&state.guests[&family], &console, 5.0);
    assert!(matched > unmatched);

    let far = manager.calculate_queue_score(&state.guests[&casual], &console, 25.0);
    assert!(matched > far);

    let mut crowded = console.clone();
    crowded.queue = vec![GuestId(90), GuestId(91)];
    let queued = manager.calculate_queue_score(&state.guests[&casual], &crowded, 5.0);
    assert!(matched > queued);

    let congested = manager.score_with_congestion(&state.guests[&casual], &console, 5.0, 4);
    assert!(matched > congested);
}

#[test]
fn test_ties_go_to_the_first_candidate() {
    let content = test_content();
    let mut state = empty_state(&content);
    let a = place_console(&mut state, &content, "arcade_cabinet", Position::new(5.0, 0.0)).unwrap();
    let b = place_console(&mut state, &content, "arcade_cabinet", Position::new(0.0, 5.0)).unwrap();
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let guest = &state.guests[&guest_id];
    let manager = QueueManager::new(&content);

    let forward = [&state.consoles[&a], &state.consoles[&b]];
    let backward = [&state.consoles[&b], &state.consoles[&a]];
    assert_eq!(manager.find_optimal_console(guest, &forward).map(|c| c.0), Some(a));
    assert_eq!(manager.find_optimal_console(guest, &backward).map(|c| c.0), Some(b));
}

#[test]
fn test_broken_and_saturated_consoles_are_not_candidates() {
    let content = test_content();
    let mut state = empty_state(&content);
    let near = place_console(&mut state, &content, "arcade_cabinet", Position::new(1.0, 0.0)).unwrap();
    let far = place_console(&mut state, &content, "arcade_cabinet", Position::new(30.0, 0.0)).unwrap();
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let manager = QueueManager::new(&content);

    state.consoles.get_mut(&near).unwrap().state = ConsoleState::Broken;
    let pick = manager.find_optimal_console_on_floor(&state, &state.guests[&guest_id]);
    assert_eq!(pick.map(|c| c.0), Some(far));

    state.consoles.get_mut(&near).unwrap().state = ConsoleState::UnderRepair;
    let pick = manager.find_optimal_console_on_floor(&state, &state.guests[&guest_id]);
    assert_eq!(pick.map(|c| c.0), Some(far));

    let far_console = state.consoles.get_mut(&far).unwrap();
    far_console.current_users.push(GuestId(80));
    far_console.queue = (81..86).map(GuestId).collect();
    let pick = manager.find_optimal_console_on_floor(&state, &state.guests[&guest_id]);
    assert_eq!(pick, None);
}

#[test]
fn test_declined_consoles_are_skipped() {
    let content = test_content();
    let mut state = test_state(&content);
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let manager = QueueManager::new(&content);
    let (first_pick, _) = manager
        .find_optimal_console_on_floor(&state, &state.guests[&guest_id])
        .unwrap();

    state.guests.get_mut(&guest_id).unwrap().declined.push(first_pick);
    let (second_pick, _) = manager
        .find_optimal_console_on_floor(&state, &state.guests[&guest_id])
        .unwrap();
    assert_ne!(first_pick, second_pick);
}

#[test]
fn test_guests_reconsider_after_declining_every_console() {
    let content = test_content();
    let mut state = test_state(&content);
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let all: Vec<ConsoleId> = state.consoles.keys().copied().collect();
    state
        .guests
        .get_mut(&guest_id)
        .unwrap()
        .declined
        .extend(all.iter().copied());
    let manager = QueueManager::new(&content);
    let mut rng = make_rng();
    let mut events = Vec::new();

    let first = manager.update(&mut state, &DirectNavigator, &mut rng, &mut events);
    assert_eq!(first.targeted, 0);
    assert!(state.guests[&guest_id].declined.is_empty());

    let second = manager.update(&mut state, &DirectNavigator, &mut rng, &mut events);
    assert_eq!(second.targeted, 1);
    assert!(state.guests[&guest_id].target_console.is_some());
}

#[test]
fn test_released_guests_forget_their_declines() {
    let content = test_content();
    let mut state = test_state(&content);
    let ids: Vec<ConsoleId> = state.consoles.keys().copied().collect();
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    state.add_to_queue(ids[0], guest_id);
    state.guests.get_mut(&guest_id).unwrap().declined.push(ids[1]);

    assert_eq!(state.release_queue(ids[0]), vec![guest_id]);

    let guest = &state.guests[&guest_id];
    assert_eq!(guest.state, GuestState::Seeking);
    assert!(guest.declined.is_empty());
    assert_floor_invariants(&state);
}

#[test]
fn test_join_gate_follows_willingness_and_queue_limit() {
    let mut content = test_content();
    for profile in &mut content.guests {
        profile.queue_willingness = 1.0;
    }
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let mut rng = make_rng();

    {
        let manager = QueueManager::new(&content);
        let guest = &state.guests[&guest_id];
        let console = &state.consoles[&console_id];
        assert!((0..50).all(|_| manager.should_join_queue(guest, console, &mut rng)));
    }

    state.consoles.get_mut(&console_id).unwrap().queue = (50..55).map(GuestId).collect();
    let manager = QueueManager::new(&content);
    let guest = &state.guests[&guest_id];
    let console = &state.consoles[&console_id];
    assert!(!manager.should_join_queue(guest, console, &mut rng));
}

#[test]
fn test_unwilling_guests_never_join() {
    let mut content = test_content();
    for profile in &mut content.guests {
        profile.queue_willingness = 0.0;
    }
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let guest_id = insert_guest(&mut state, &content, GuestId(1));
    let manager = QueueManager::new(&content);
    let mut rng = make_rng();
    let guest = &state.guests[&guest_id];
    let console = &state.consoles[&console_id];
    assert!((0..50).all(|_| !manager.should_join_queue(guest, console, &mut rng)));
}

#[test]
fn test_visualization_is_a_pure_read() {
    let content = test_content();
    let mut state = test_state(&content);
    let console_id = cabinet(&state);
    let g1 = insert_guest(&mut state, &content, GuestId(1));
    state.add_to_queue(console_id, g1);

    let before = serde_json::to_string(&state).unwrap();
    let view = QueueManager::new(&content).get_visualization_data(&state);
    let after = serde_json::to_string(&state).unwrap();

    assert_eq!(before, after);
    assert_eq!(view.len(), state.consoles.len());
    let entry = &view[&console_id.to_string()];
    assert_eq!(entry.kind, "arcade_cabinet");
    assert_eq!(entry.queue_length, 1);
    assert_eq!(entry.queue, vec![g1]);
}
