use crate::run_result::{self, RunResult, SummaryMetrics};
use anyhow::{Context, Result};
use arcade_control::{CommandSource, FloorManager};
use arcade_core::{
    compute_metrics, DirectNavigator, Event, EventEnvelope, EventLevel, GameContent,
    MetricsFileWriter, MetricsSnapshot,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// Loop settings shared by every seed of a scenario.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub ticks: u64,
    pub tick_ms: f64,
    pub metrics_every: u64,
}

pub struct SeedResult {
    pub seed: u64,
    pub final_snapshot: MetricsSnapshot,
    pub wall_time_ms: u64,
    pub run_id: String,
}

#[derive(Serialize)]
struct SeedRunInfo<'a> {
    run_id: &'a str,
    seed: u64,
    content_version: &'a str,
    ticks: u64,
    tick_ms: f64,
    metrics_every: u64,
    runner: &'static str,
}

/// Per-kind event counts over a whole run.
#[derive(Default)]
struct EventTally {
    counts: BTreeMap<String, u64>,
    first_breakdown_tick: Option<u64>,
}

impl EventTally {
    fn record(&mut self, events: &[EventEnvelope]) {
        for envelope in events {
            *self
                .counts
                .entry(envelope.event.kind().name().to_string())
                .or_default() += 1;
            if self.first_breakdown_tick.is_none()
                && matches!(envelope.event, Event::ConsoleBrokeDown { .. })
            {
                self.first_breakdown_tick = Some(envelope.tick);
            }
        }
    }
}

fn write_run_info(seed_dir: &Path, info: &SeedRunInfo<'_>) -> Result<()> {
    let path = seed_dir.join("run_info.json");
    let json = serde_json::to_string_pretty(info).context("serializing run_info")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}

/// Creates the seed directory, writes `run_info.json` and opens the metrics CSV.
fn open_seed_dir(
    seed_dir: &Path,
    run_id: &str,
    seed: u64,
    content: &GameContent,
    config: RunConfig,
) -> Result<MetricsFileWriter> {
    std::fs::create_dir_all(seed_dir)
        .with_context(|| format!("creating seed directory: {}", seed_dir.display()))?;
    write_run_info(
        seed_dir,
        &SeedRunInfo {
            run_id,
            seed,
            content_version: &content.content_version,
            ticks: config.ticks,
            tick_ms: config.tick_ms,
            metrics_every: config.metrics_every,
            runner: "arcade_bench",
        },
    )?;
    MetricsFileWriter::new(seed_dir.to_path_buf())
        .with_context(|| format!("opening metrics CSV in {}", seed_dir.display()))
}

pub fn run_seed(
    content: &GameContent,
    seed: u64,
    config: RunConfig,
    seed_dir: &Path,
    scenario_name: &str,
    scenario_params: &serde_json::Value,
) -> Result<SeedResult> {
    let run_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = arcade_world::build_initial_state(content, seed);
    let mut manager = FloorManager::new();
    let mut next_command_id = 0u64;

    let mut metrics_writer = open_seed_dir(seed_dir, &run_id, seed, content, config)?;
    let mut tally = EventTally::default();

    for _ in 0..config.ticks {
        let commands = manager.generate_commands(&state, content, &mut next_command_id);
        let events = arcade_core::tick(
            &mut state,
            &commands,
            content,
            &DirectNavigator,
            &mut rng,
            config.tick_ms,
            EventLevel::Normal,
        );
        tally.record(&events);

        if state.meta.tick % config.metrics_every == 0 {
            let snapshot = compute_metrics(&state, content);
            metrics_writer
                .write_row(&snapshot)
                .context("writing metrics row")?;
        }
    }

    // Always capture final snapshot
    let final_snapshot = compute_metrics(&state, content);
    if state.meta.tick % config.metrics_every != 0 {
        metrics_writer
            .write_row(&final_snapshot)
            .context("writing final metrics row")?;
    }
    metrics_writer.flush().context("flushing metrics")?;

    let wall_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let sim_ticks_per_second = if wall_time_ms > 0 {
        (config.ticks as f64) / (wall_time_ms as f64 / 1000.0)
    } else {
        0.0
    };

    let (collapse_occurred, collapse_reason) = run_result::detect_collapse(&final_snapshot);
    tracing::debug!(seed, wall_time_ms, collapse_occurred, "seed finished");

    let run_result = RunResult {
        run_schema_version: 1,
        run_status: "completed".to_string(),
        run_id: run_id.clone(),
        seed,
        scenario_name: scenario_name.to_string(),
        scenario_params: scenario_params.clone(),
        tick_start: 0,
        tick_end: final_snapshot.tick,
        total_ticks: config.ticks,
        wall_time_ms,
        sim_ticks_per_second,
        summary_metrics: Some(SummaryMetrics::from_snapshot(&final_snapshot)),
        event_counts_by_kind: tally.counts,
        first_breakdown_tick: tally.first_breakdown_tick,
        collapse_occurred,
        collapse_tick: collapse_occurred.then_some(final_snapshot.tick),
        collapse_reason,
        metrics_path: "metrics_000.csv".to_string(),
        error_message: None,
    };

    run_result
        .write_atomic(&seed_dir.join("run_result.json"))
        .context("writing run_result.json")?;

    Ok(SeedResult {
        seed,
        final_snapshot,
        wall_time_ms,
        run_id,
    })
}
