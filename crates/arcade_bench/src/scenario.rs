//! Scenario files: a named batch of seeded runs over one content directory.
//!
//! Loading resolves everything a batch needs before any output is written:
//! the content with its overrides applied, the seed list and the loop
//! settings. A scenario that loads is a scenario that can run.

use crate::overrides::apply_overrides;
use crate::runner::RunConfig;
use anyhow::{bail, ensure, Context, Result};
use arcade_core::GameContent;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Seeds as an explicit list or an inclusive `{"range": [first, last]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedSpec {
    List(Vec<u64>),
    Range { range: [u64; 2] },
}

impl SeedSpec {
    /// Each seed writes to its own `seed_<n>` directory, so repeats are refused.
    fn resolve(self) -> Result<Vec<u64>> {
        let seeds = match self {
            SeedSpec::List(seeds) => seeds,
            SeedSpec::Range {
                range: [first, last],
            } => {
                ensure!(first <= last, "seed range [{first}, {last}] is empty");
                (first..=last).collect()
            }
        };
        ensure!(!seeds.is_empty(), "no seeds listed");
        let mut seen = BTreeSet::new();
        if let Some(repeat) = seeds.iter().find(|seed| !seen.insert(**seed)) {
            bail!("seed {repeat} is listed more than once");
        }
        Ok(seeds)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    name: String,
    ticks: u64,
    tick_ms: Option<f64>,
    metrics_every: Option<u64>,
    seeds: SeedSpec,
    content_dir: Option<String>,
    #[serde(default)]
    overrides: HashMap<String, serde_json::Value>,
}

pub struct Scenario {
    pub name: String,
    pub seeds: Vec<u64>,
    pub config: RunConfig,
    pub content_dir: String,
    pub overrides: HashMap<String, serde_json::Value>,
    /// Content from `content_dir` with `overrides` applied.
    pub content: GameContent,
}

/// The name becomes part of the output directory.
fn check_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "scenario name is empty");
    ensure!(
        name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        "scenario name '{name}' may only use letters, digits, '_' and '-'"
    );
    Ok(())
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let file: ScenarioFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario {}", path.display()))?;

    check_name(&file.name)?;
    ensure!(file.ticks > 0, "scenario '{}' runs zero ticks", file.name);
    let config = RunConfig {
        ticks: file.ticks,
        tick_ms: file.tick_ms.unwrap_or(arcade_world::DEFAULT_TICK_MS),
        metrics_every: file
            .metrics_every
            .unwrap_or(arcade_world::DEFAULT_METRICS_EVERY),
    };
    ensure!(
        config.tick_ms.is_finite() && config.tick_ms > 0.0,
        "tick_ms must be a positive number, got {}",
        config.tick_ms
    );
    ensure!(config.metrics_every > 0, "metrics_every must be at least 1");
    let seeds = file.seeds.resolve().context("resolving seeds")?;

    let content_dir = file
        .content_dir
        .unwrap_or_else(|| arcade_world::DEFAULT_CONTENT_DIR.to_string());
    let mut content = arcade_world::load_content(&content_dir)
        .with_context(|| format!("loading content from {content_dir}"))?;
    apply_overrides(&mut content.constants, &file.overrides).context("applying overrides")?;
    arcade_world::validate_content(&content);

    Ok(Scenario {
        name: file.name,
        seeds,
        config,
        content_dir,
        overrides: file.overrides,
        content,
    })
}
