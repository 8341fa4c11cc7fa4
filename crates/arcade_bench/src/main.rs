use anyhow::{Context, Result};
use arcade_core::MetricsSnapshot;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod overrides;
mod run_result;
mod runner;
mod scenario;
mod summary;

#[derive(Parser)]
#[command(
    name = "arcade_bench",
    about = "Automated scenario runner for arcade floor benchmarking"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file across multiple seeds.
    Run {
        /// Path to the scenario JSON file.
        #[arg(long)]
        scenario: String,
        /// Output directory (default: runs/).
        #[arg(long, default_value = "runs")]
        output_dir: String,
    },
}

#[derive(Serialize)]
struct ScenarioParams<'a> {
    ticks: u64,
    tick_ms: f64,
    metrics_every: u64,
    content_dir: &'a str,
    overrides: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct BatchSummary<'a> {
    batch_schema_version: u32,
    batch_id: String,
    scenario_name: &'a str,
    scenario_params: &'a serde_json::Value,
    seed_count: usize,
    run_ids: Vec<&'a str>,
    collapsed_count: usize,
    total_wall_time_ms: u64,
    aggregated_metrics: serde_json::Value,
}

fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    let mut file =
        std::fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("writing {}", tmp.display()))?;
    file.sync_all()?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming {}", tmp.display()))?;
    Ok(())
}

fn run(scenario_path: &str, output_dir: &str) -> Result<()> {
    let scenario = scenario::load_scenario(Path::new(scenario_path))?;
    let seeds = &scenario.seeds;
    let config = scenario.config;

    println!(
        "Loading scenario '{}': {} seeds × {} ticks",
        scenario.name,
        seeds.len(),
        config.ticks
    );

    let scenario_params = serde_json::to_value(ScenarioParams {
        ticks: config.ticks,
        tick_ms: config.tick_ms,
        metrics_every: config.metrics_every,
        content_dir: &scenario.content_dir,
        overrides: &scenario.overrides,
    })
    .context("serializing scenario params")?;

    // Create timestamped output directory.
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_dir = PathBuf::from(output_dir).join(format!("{}_{}", scenario.name, timestamp));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating output directory: {}", run_dir.display()))?;
    std::fs::copy(scenario_path, run_dir.join("scenario.json")).context("copying scenario file")?;

    println!("Output: {}", run_dir.display());
    println!("Running {} seeds in parallel...", seeds.len());

    let results: Vec<Result<runner::SeedResult>> = seeds
        .par_iter()
        .map(|&seed| {
            let seed_dir = run_dir.join(format!("seed_{seed}"));
            runner::run_seed(
                &scenario.content,
                seed,
                config,
                &seed_dir,
                &scenario.name,
                &scenario_params,
            )
        })
        .collect();

    let mut seed_results = Vec::new();
    for result in results {
        match result {
            Ok(seed_result) => seed_results.push(seed_result),
            Err(err) => tracing::error!("seed failed: {err:#}"),
        }
    }

    if seed_results.is_empty() {
        anyhow::bail!("all seeds failed");
    }

    let snapshot_refs: Vec<(u64, &MetricsSnapshot)> = seed_results
        .iter()
        .map(|r| (r.seed, &r.final_snapshot))
        .collect();
    let stats = summary::compute_summary(&snapshot_refs);
    summary::print_summary(&scenario.name, config.ticks, &stats);

    let summary_path = run_dir.join("summary.json");
    write_json_atomic(&summary_path, &stats)?;

    let snapshot_only_refs: Vec<&MetricsSnapshot> =
        seed_results.iter().map(|r| &r.final_snapshot).collect();
    let batch_summary = BatchSummary {
        batch_schema_version: 1,
        batch_id: Uuid::new_v4().to_string(),
        scenario_name: &scenario.name,
        scenario_params: &scenario_params,
        seed_count: seed_results.len(),
        run_ids: seed_results.iter().map(|r| r.run_id.as_str()).collect(),
        collapsed_count: stats.collapsed_count,
        total_wall_time_ms: seed_results.iter().map(|r| r.wall_time_ms).sum(),
        aggregated_metrics: summary::build_aggregated_metrics(&snapshot_only_refs),
    };
    let batch_path = run_dir.join("batch_summary.json");
    write_json_atomic(&batch_path, &batch_summary)?;

    println!("Summary written to {}", summary_path.display());
    println!("Batch summary written to {}", batch_path.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            scenario,
            output_dir,
        } => run(&scenario, &output_dir)?,
    }
    Ok(())
}
