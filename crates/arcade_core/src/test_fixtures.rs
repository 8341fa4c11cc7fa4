//! Shared test fixtures for arcade_core and downstream crates.
//!
//! `base_content()` is a small but complete floor: three console kinds, all
//! four guest profiles and a difficulty curve whose bounds are all reachable.
//! `base_state()` places the starting consoles; `empty_state()` places none.

use std::collections::{BTreeMap, VecDeque};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::console::place_console;
use crate::difficulty::{DifficultyCurve, DifficultyParameters, DifficultyScaling, TypeDistribution};
use crate::{
    ConsoleDef, ConsolePlacement, Constants, Counters, FloorStats, GameContent, GameState, Guest,
    GuestId, GuestProfileDef, GuestState, GuestType, MetaState, Position,
};

fn console_def(id: &str, capacity: u32, appeal: f64, appeals_to: Vec<GuestType>) -> ConsoleDef {
    ConsoleDef {
        id: id.to_string(),
        name: id.replace('_', " "),
        capacity,
        max_durability: 20,
        durability_loss_per_use: 1,
        appeal,
        appeals_to,
        use_duration_ms: 2_000.0,
        repair_duration_ms: 5_000.0,
    }
}

fn profile(
    guest_type: GuestType,
    base_patience_ms: f64,
    queue_willingness: f64,
    queue_tolerance_ms: f64,
) -> GuestProfileDef {
    GuestProfileDef {
        guest_type,
        base_patience_ms,
        base_satisfaction: 5,
        walk_speed: 0.005,
        queue_willingness,
        queue_tolerance_ms,
    }
}

pub fn base_content() -> GameContent {
    GameContent {
        content_version: "test".to_string(),
        consoles: vec![
            console_def(
                "arcade_cabinet",
                1,
                1.0,
                vec![GuestType::Enthusiast, GuestType::Casual],
            ),
            console_def(
                "racing_sim",
                2,
                1.2,
                vec![GuestType::Enthusiast, GuestType::Tourist],
            ),
            console_def(
                "dance_machine",
                1,
                0.9,
                vec![GuestType::Family, GuestType::Casual, GuestType::Tourist],
            ),
        ],
        guests: vec![
            profile(GuestType::Family, 60_000.0, 0.9, 30_000.0),
            profile(GuestType::Enthusiast, 40_000.0, 0.4, 15_000.0),
            profile(GuestType::Casual, 45_000.0, 0.6, 20_000.0),
            profile(GuestType::Tourist, 50_000.0, 0.7, 25_000.0),
        ],
        difficulty: DifficultyCurve {
            base: DifficultyParameters {
                guest_spawn_interval_ms: 3_000.0,
                max_simultaneous_guests: 8,
                guest_patience_modifier: 1.0,
                console_breakdown_rate: 0.02,
                guest_type_distribution: TypeDistribution {
                    family: 0.35,
                    enthusiast: 0.15,
                    casual: 0.3,
                    tourist: 0.2,
                },
            },
            spawn_interval_step_ms: 150.0,
            min_spawn_interval_ms: 1_000.0,
            guests_per_day: 1,
            max_guests_ceiling: 20,
            patience_step: 0.03,
            min_patience_modifier: 0.5,
            breakdown_step: 0.005,
            max_breakdown_rate: 0.15,
            enthusiast_step: 0.02,
            max_enthusiast_share: 0.45,
            family_step: 0.02,
            min_family_share: 0.1,
        },
        starting_consoles: vec![
            ConsolePlacement {
                kind: "arcade_cabinet".to_string(),
                position: Position::new(10.0, 0.0),
            },
            ConsolePlacement {
                kind: "racing_sim".to_string(),
                position: Position::new(10.0, 10.0),
            },
            ConsolePlacement {
                kind: "dance_machine".to_string(),
                position: Position::new(5.0, 15.0),
            },
        ],
        constants: Constants {
            day_length_ms: 120_000.0,
            entrance: Position::new(0.0, 0.0),
            exit: Position::new(0.0, 20.0),
            arrival_radius: 0.5,
            max_queue_length: 5,
            type_match_multiplier: 1.5,
            distance_scale: 10.0,
            queue_length_penalty: 0.25,
            congestion_radius: 3.0,
            congestion_weight: 0.1,
            completion_satisfaction: 3,
            type_match_satisfaction: 2,
            abandon_satisfaction_penalty: 2,
            breakdown_satisfaction_penalty: 3,
            auto_repair: true,
        },
    }
}

/// Day 1, no consoles, no guests. Ids start at 1.
pub fn empty_state(content: &GameContent) -> GameState {
    GameState {
        meta: MetaState {
            tick: 0,
            now_ms: 0.0,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        difficulty: DifficultyScaling::new(&content.difficulty),
        guests: BTreeMap::new(),
        consoles: BTreeMap::new(),
        stats: FloorStats::default(),
        counters: Counters {
            next_event_id: 0,
            next_command_id: 0,
            next_guest_id: 1,
            next_console_id: 1,
        },
    }
}

/// `empty_state` with the starting consoles placed.
pub fn base_state(content: &GameContent) -> GameState {
    let mut state = empty_state(content);
    for placement in &content.starting_consoles {
        place_console(&mut state, content, &placement.kind, placement.position);
    }
    state
}

/// Inserts a seeking casual guest at the entrance, bypassing the spawn cap.
pub fn insert_guest(state: &mut GameState, content: &GameContent, id: GuestId) -> GuestId {
    insert_guest_of_type(state, content, id, GuestType::Casual)
}

pub fn insert_guest_of_type(
    state: &mut GameState,
    content: &GameContent,
    id: GuestId,
    guest_type: GuestType,
) -> GuestId {
    let profile = content
        .guest_profile(guest_type)
        .expect("fixture content has every guest profile");
    let guest = Guest::new(
        id,
        profile,
        state.difficulty.guest_patience_modifier(),
        state.meta.now_ms,
        content.constants.entrance,
    );
    state.guests.insert(id, guest);
    state.counters.next_guest_id = state.counters.next_guest_id.max(id.0 + 1);
    id
}

/// Moves a guest onto a console's position with an empty route.
pub fn place_guest_at(state: &mut GameState, guest_id: GuestId, position: Position) {
    let guest = state.guests.get_mut(&guest_id).expect("guest exists");
    guest.position = position;
    guest.route = VecDeque::new();
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

/// Panics if any queue or usage relationship is out of step.
pub fn assert_floor_invariants(state: &GameState) {
    let mut seen_in_queue = std::collections::BTreeSet::new();
    for console in state.consoles.values() {
        assert!(
            console.current_users.len() <= console.capacity as usize,
            "{} has {} users for capacity {}",
            console.id,
            console.current_users.len(),
            console.capacity
        );
        for (index, guest_id) in console.queue.iter().enumerate() {
            assert!(
                seen_in_queue.insert(*guest_id),
                "{guest_id} appears in more than one queue"
            );
            let guest = &state.guests[guest_id];
            assert_eq!(guest.queue_position, Some(index), "{guest_id} position drifted");
            assert_eq!(guest.target_console, Some(console.id));
            assert_eq!(guest.state, GuestState::Waiting);
        }
        for guest_id in &console.current_users {
            let guest = &state.guests[guest_id];
            assert_eq!(guest.current_console, Some(console.id));
            assert_eq!(guest.state, GuestState::Using);
        }
    }
    for guest in state.guests.values() {
        if guest.queue_position.is_some() {
            assert!(seen_in_queue.contains(&guest.id), "{} claims a queue slot", guest.id);
        }
        assert!(guest.patience_ms >= 0.0);
    }
}
