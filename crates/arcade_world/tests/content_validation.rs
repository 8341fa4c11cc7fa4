//! Content validation tests for the shipped `content/*.json` floor data.
//!
//! These load the real files and check:
//! 1. Every file deserializes and passes `validate_content`
//! 2. Range constraints that keep the floor playable
//! 3. Difficulty bounds are reachable within a sane number of days
//! 4. Loader errors name the file that failed

use arcade_core::{parameters_for_day, GameContent, Guest, GuestId, GuestType, QueueManager};
use arcade_world::{build_initial_state, load_content};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Integration tests run from the crate directory, so go up two levels.
fn content_dir() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    format!("{manifest}/../../content")
}

fn load_test_content() -> &'static GameContent {
    static CONTENT: OnceLock<GameContent> = OnceLock::new();
    CONTENT.get_or_init(|| {
        load_content(&content_dir()).expect("load_content should succeed for shipped content")
    })
}

// =========================================================================
// 1. Schema validation
// =========================================================================

#[test]
fn content_loads_successfully() {
    let content = load_test_content();
    assert!(!content.content_version.is_empty());
}

// =========================================================================
// 2. Playability
// =========================================================================

#[test]
fn every_guest_type_has_a_console_it_likes() {
    let content = load_test_content();
    for guest_type in GuestType::ALL {
        assert!(
            content
                .consoles
                .iter()
                .any(|c| c.appeals_to.contains(&guest_type)),
            "no console appeals to {}",
            guest_type.as_str()
        );
    }
}

#[test]
fn every_console_kind_is_placed_at_start() {
    let content = load_test_content();
    let placed: HashSet<&str> = content
        .starting_consoles
        .iter()
        .map(|p| p.kind.as_str())
        .collect();
    for def in &content.consoles {
        assert!(placed.contains(def.id.as_str()), "{} is never placed", def.id);
    }
}

#[test]
fn consoles_survive_several_uses() {
    let content = load_test_content();
    for def in &content.consoles {
        assert!(
            def.max_durability >= def.durability_loss_per_use * 5,
            "{} wears out in under five uses",
            def.id
        );
    }
}

#[test]
fn guests_are_patient_enough_to_queue() {
    let content = load_test_content();
    for profile in &content.guests {
        assert!(
            profile.queue_tolerance_ms < profile.base_patience_ms,
            "{} tolerates queues longer than its patience",
            profile.guest_type.as_str()
        );
    }
}

fn shipped_guest(content: &GameContent, guest_type: GuestType) -> Guest {
    let profile = content
        .guest_profile(guest_type)
        .expect("every guest type has a profile");
    Guest::new(GuestId(1), profile, 1.0, 0.0, content.constants.entrance)
}

#[test]
fn enthusiasts_abandon_after_fifteen_seconds() {
    let content = load_test_content();
    let manager = QueueManager::new(content);
    let guest = shipped_guest(content, GuestType::Enthusiast);
    assert!(manager.should_abandon_queue(&guest, 20_000.0));
    assert!(!manager.should_abandon_queue(&guest, 15_000.0));
}

#[test]
fn families_wait_longest_and_enthusiasts_shortest() {
    let content = load_test_content();
    let tolerance = |guest_type| {
        content
            .guest_profile(guest_type)
            .map(|p| p.queue_tolerance_ms)
            .unwrap()
    };
    for guest_type in GuestType::ALL {
        assert!(tolerance(GuestType::Family) >= tolerance(guest_type));
        assert!(tolerance(GuestType::Enthusiast) <= tolerance(guest_type));
    }
}

#[test]
fn starting_floor_stays_inside_the_walls() {
    let content = load_test_content();
    let state = build_initial_state(content, 1);
    assert_eq!(state.consoles.len(), content.starting_consoles.len());
    for console in state.consoles.values() {
        assert!(console.position.x >= 0.0 && console.position.y >= 0.0);
        assert!(console.position.distance_to(content.constants.entrance) > 0.0);
    }
}

// =========================================================================
// 3. Difficulty curve
// =========================================================================

#[test]
fn difficulty_reaches_its_bounds_within_a_season() {
    let content = load_test_content();
    let curve = &content.difficulty;
    let late = parameters_for_day(curve, 60);
    assert!((late.guest_spawn_interval_ms - curve.min_spawn_interval_ms).abs() < 1e-9);
    assert_eq!(late.max_simultaneous_guests, curve.max_guests_ceiling);
    assert!((late.console_breakdown_rate - curve.max_breakdown_rate).abs() < 1e-9);
    assert!((late.guest_type_distribution.sum() - 1.0).abs() < 1e-9);
}

// =========================================================================
// 4. Loader errors
// =========================================================================

fn copy_content_to(dir: &std::path::Path) {
    for file in [
        "constants.json",
        "consoles.json",
        "guests.json",
        "difficulty.json",
    ] {
        std::fs::copy(format!("{}/{file}", content_dir()), dir.join(file)).unwrap();
    }
}

#[test]
fn missing_file_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    copy_content_to(dir.path());
    std::fs::remove_file(dir.path().join("guests.json")).unwrap();

    let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("reading guests.json"));
}

#[test]
fn malformed_file_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    copy_content_to(dir.path());
    std::fs::write(dir.path().join("difficulty.json"), "{ \"base\": 3 }").unwrap();

    let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("parsing difficulty.json"));
}

#[test]
fn starting_consoles_are_optional() {
    let dir = tempfile::tempdir().unwrap();
    copy_content_to(dir.path());
    let raw = std::fs::read_to_string(dir.path().join("consoles.json")).unwrap();
    let mut consoles: serde_json::Value = serde_json::from_str(&raw).unwrap();
    consoles
        .as_object_mut()
        .unwrap()
        .remove("starting_consoles");
    std::fs::write(dir.path().join("consoles.json"), consoles.to_string()).unwrap();

    let content = load_content(dir.path().to_str().unwrap()).unwrap();
    assert!(content.starting_consoles.is_empty());
    assert!(build_initial_state(&content, 3).consoles.is_empty());
}
