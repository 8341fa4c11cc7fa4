//! Content loading and floor construction shared between arcade_cli and arcade_bench.

use anyhow::{Context, Result};
use arcade_core::{
    place_console, ConsoleDef, ConsolePlacement, Constants, Counters, DifficultyCurve,
    DifficultyScaling, FloorStats, GameContent, GameState, GuestProfileDef, GuestType, MetaState,
    SAVE_SCHEMA_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Deserialize)]
struct ConsolesFile {
    content_version: String,
    consoles: Vec<ConsoleDef>,
    #[serde(default)]
    starting_consoles: Vec<ConsolePlacement>,
}

#[derive(Deserialize)]
struct GuestsFile {
    profiles: Vec<GuestProfileDef>,
}

/// Content directory both binaries read when none is given.
pub const DEFAULT_CONTENT_DIR: &str = "./content";
/// Simulated milliseconds per tick for the CLI and bench scenarios.
pub const DEFAULT_TICK_MS: f64 = 250.0;
/// Ticks between metrics samples for the CLI and bench scenarios.
pub const DEFAULT_METRICS_EVERY: u64 = 40;

/// Day 1 uses the base distribution as written, so it must already sum to 1.
const SHARE_TOLERANCE: f64 = 1e-9;

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like a duplicate console kind, a guest type without a
/// profile, a difficulty base value outside its own bounds, or a starting
/// console of a kind that doesn't exist.
pub fn validate_content(content: &GameContent) {
    validate_consoles(&content.consoles);
    validate_profiles(&content.guests);
    validate_curve(&content.difficulty);
    validate_constants(&content.constants);

    let kinds: HashSet<&str> = content.consoles.iter().map(|c| c.id.as_str()).collect();
    for placement in &content.starting_consoles {
        assert!(
            kinds.contains(placement.kind.as_str()),
            "starting console kind '{}' is not a known console kind",
            placement.kind,
        );
    }
}

fn validate_consoles(consoles: &[ConsoleDef]) {
    let mut seen = HashSet::new();
    for def in consoles {
        assert!(!def.id.is_empty(), "console kind has an empty id");
        assert!(
            seen.insert(def.id.as_str()),
            "console kind '{}' is defined more than once",
            def.id,
        );
        assert!(def.capacity >= 1, "console '{}' has zero capacity", def.id);
        assert!(
            def.max_durability >= 1,
            "console '{}' has zero max_durability",
            def.id
        );
        assert!(
            def.appeal > 0.0,
            "console '{}' appeal must be positive, got {}",
            def.id,
            def.appeal,
        );
        assert!(
            def.use_duration_ms > 0.0 && def.repair_duration_ms > 0.0,
            "console '{}' durations must be positive",
            def.id,
        );
    }
}

fn validate_profiles(profiles: &[GuestProfileDef]) {
    for guest_type in GuestType::ALL {
        let count = profiles
            .iter()
            .filter(|p| p.guest_type == guest_type)
            .count();
        assert!(
            count == 1,
            "guest type '{}' needs exactly one profile, found {count}",
            guest_type.as_str(),
        );
    }
    for profile in profiles {
        let name = profile.guest_type.as_str();
        assert!(
            profile.base_patience_ms > 0.0,
            "guest profile '{name}' has non-positive patience"
        );
        assert!(
            profile.walk_speed > 0.0,
            "guest profile '{name}' has non-positive walk_speed"
        );
        assert!(
            (0.0..=1.0).contains(&profile.queue_willingness),
            "guest profile '{name}' queue_willingness {} is not a probability",
            profile.queue_willingness,
        );
        assert!(
            profile.queue_tolerance_ms >= 0.0,
            "guest profile '{name}' has negative queue_tolerance_ms"
        );
    }
}

fn validate_curve(curve: &DifficultyCurve) {
    let base = &curve.base;
    let total = base.guest_type_distribution.sum();
    assert!(
        (total - 1.0).abs() < SHARE_TOLERANCE,
        "guest type distribution sums to {total}, expected 1.0"
    );
    assert!(
        base.guest_spawn_interval_ms >= curve.min_spawn_interval_ms,
        "base spawn interval {} is below its floor {}",
        base.guest_spawn_interval_ms,
        curve.min_spawn_interval_ms,
    );
    assert!(
        base.max_simultaneous_guests <= curve.max_guests_ceiling,
        "base max guests {} is above its ceiling {}",
        base.max_simultaneous_guests,
        curve.max_guests_ceiling,
    );
    assert!(
        base.guest_patience_modifier >= curve.min_patience_modifier,
        "base patience modifier {} is below its floor {}",
        base.guest_patience_modifier,
        curve.min_patience_modifier,
    );
    assert!(
        base.console_breakdown_rate <= curve.max_breakdown_rate,
        "base breakdown rate {} is above its ceiling {}",
        base.console_breakdown_rate,
        curve.max_breakdown_rate,
    );
    assert!(
        (0.0..=1.0).contains(&curve.max_breakdown_rate),
        "max breakdown rate {} is not a probability",
        curve.max_breakdown_rate,
    );
    let shares = &base.guest_type_distribution;
    assert!(
        shares.enthusiast <= curve.max_enthusiast_share,
        "base enthusiast share {} is above its ceiling {}",
        shares.enthusiast,
        curve.max_enthusiast_share,
    );
    assert!(
        shares.family >= curve.min_family_share,
        "base family share {} is below its floor {}",
        shares.family,
        curve.min_family_share,
    );
}

fn validate_constants(constants: &Constants) {
    assert!(
        constants.day_length_ms > 0.0,
        "day_length_ms must be positive"
    );
    assert!(
        constants.distance_scale > 0.0,
        "distance_scale must be positive"
    );
    assert!(
        constants.max_queue_length >= 1,
        "max_queue_length must be at least 1"
    );
    assert!(
        constants.arrival_radius > 0.0,
        "arrival_radius must be positive"
    );
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let raw = std::fs::read_to_string(dir.join(file)).with_context(|| format!("reading {file}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {file}"))
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = read_json(dir, "constants.json")?;
    let consoles_file: ConsolesFile = read_json(dir, "consoles.json")?;
    let guests_file: GuestsFile = read_json(dir, "guests.json")?;
    let difficulty: DifficultyCurve = read_json(dir, "difficulty.json")?;
    let content = GameContent {
        content_version: consoles_file.content_version,
        consoles: consoles_file.consoles,
        guests: guests_file.profiles,
        difficulty,
        starting_consoles: consoles_file.starting_consoles,
        constants,
    };
    validate_content(&content);
    tracing::debug!(
        content_version = %content.content_version,
        console_kinds = content.consoles.len(),
        starting_consoles = content.starting_consoles.len(),
        "content loaded"
    );
    Ok(content)
}

/// Day 1 floor with the starting consoles placed and no guests.
pub fn build_initial_state(content: &GameContent, seed: u64) -> GameState {
    let mut state = GameState {
        meta: MetaState {
            tick: 0,
            now_ms: 0.0,
            seed,
            schema_version: SAVE_SCHEMA_VERSION,
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
    };
    for placement in &content.starting_consoles {
        place_console(&mut state, content, &placement.kind, placement.position);
    }
    state
}
