use anyhow::{bail, Context, Result};
use arcade_control::{CommandSource, FloorManager};
use arcade_core::{
    compute_metrics, DirectNavigator, Event, EventBus, EventKind, EventLevel, GameContent,
    GameState, MetricsFileWriter, QueueManager, SaveSnapshot,
};
use arcade_world::{build_initial_state, load_content};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "arcade_cli", about = "Arcade floor simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the floor for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Build a fresh floor with this seed. Mutually exclusive with --save.
        #[arg(long, conflicts_with = "save_file")]
        seed: Option<u64>,
        /// Resume from a save snapshot. Mutually exclusive with --seed.
        #[arg(long = "save", conflicts_with = "seed")]
        save_file: Option<PathBuf>,
        #[arg(long, default_value = arcade_world::DEFAULT_CONTENT_DIR)]
        content_dir: String,
        /// Simulated milliseconds per tick.
        #[arg(long, default_value_t = arcade_world::DEFAULT_TICK_MS)]
        tick_ms: f64,
        #[arg(long, default_value_t = 240)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Sample metrics every N ticks.
        #[arg(long, default_value_t = arcade_world::DEFAULT_METRICS_EVERY)]
        metrics_every: u64,
        /// Disable metrics collection to the runs/ directory.
        #[arg(long)]
        no_metrics: bool,
        /// Write a save snapshot here when the run finishes.
        #[arg(long)]
        save_to: Option<PathBuf>,
    },
    /// Print the difficulty curve for the coming days.
    Preview {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, default_value = arcade_world::DEFAULT_CONTENT_DIR)]
        content_dir: String,
    },
}

struct RunArgs {
    ticks: u64,
    seed: Option<u64>,
    save_file: Option<PathBuf>,
    content_dir: String,
    tick_ms: f64,
    print_every: u64,
    event_level: EventLevel,
    metrics_every: u64,
    no_metrics: bool,
    save_to: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn generate_run_id(seed: u64) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{stamp}_seed{seed}")
}

fn create_run_dir(run_id: &str) -> Result<PathBuf> {
    let dir = PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

#[derive(Serialize)]
struct RunInfo<'a> {
    run_id: &'a str,
    seed: u64,
    content_version: &'a str,
    ticks: u64,
    tick_ms: f64,
    metrics_every: u64,
    runner: &'static str,
}

fn write_run_info(dir: &Path, info: &RunInfo<'_>) -> Result<()> {
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// A fresh floor from `seed`, or the floor recorded in `save_file`.
fn load_start_state(
    content: &GameContent,
    seed: Option<u64>,
    save_file: Option<&Path>,
) -> Result<GameState> {
    let Some(path) = save_file else {
        let resolved_seed = seed.unwrap_or_else(rand::random);
        return Ok(build_initial_state(content, resolved_seed));
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading save file: {}", path.display()))?;
    let snapshot: SaveSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("parsing save file: {}", path.display()))?;
    match snapshot.restore(content) {
        Some(state) => Ok(state),
        None => bail!(
            "save file {} has schema version {}, which this build cannot restore",
            path.display(),
            snapshot.schema_version
        ),
    }
}

fn write_save(state: &GameState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&SaveSnapshot::from_state(state))
        .context("serializing save snapshot")?;
    std::fs::write(path, json).with_context(|| format!("writing save file: {}", path.display()))
}

/// Logs the events worth seeing without `--event-level debug`.
fn notable_event_bus() -> EventBus {
    let mut bus = EventBus::new();
    bus.on(EventKind::DayStarted, |envelope| {
        if let Event::DayStarted { day } = envelope.event {
            tracing::info!(day, tick = envelope.tick, "day started");
        }
        Ok(())
    });
    bus.on(EventKind::DifficultyChanged, |envelope| {
        if let Event::DifficultyChanged { day, parameters } = &envelope.event {
            tracing::info!(
                day,
                spawn_interval_ms = parameters.guest_spawn_interval_ms,
                max_guests = parameters.max_simultaneous_guests,
                breakdown_rate = parameters.console_breakdown_rate,
                "difficulty changed"
            );
        }
        Ok(())
    });
    bus.on(EventKind::ConsoleBrokeDown, |envelope| {
        if let Event::ConsoleBrokeDown {
            console_id,
            released_guests,
            ejected_guests,
        } = envelope.event
        {
            tracing::info!(
                %console_id,
                released_guests,
                ejected_guests,
                "console broke down"
            );
        }
        Ok(())
    });
    bus
}

fn run(args: RunArgs) -> Result<()> {
    let content = load_content(&args.content_dir)?;
    let mut state = load_start_state(&content, args.seed, args.save_file.as_deref())?;
    let mut rng = ChaCha8Rng::seed_from_u64(state.meta.seed ^ state.meta.tick);

    let mut metrics_writer: Option<MetricsFileWriter> = None;
    if !args.no_metrics {
        let run_id = generate_run_id(state.meta.seed);
        let run_dir = create_run_dir(&run_id)?;
        write_run_info(
            &run_dir,
            &RunInfo {
                run_id: &run_id,
                seed: state.meta.seed,
                content_version: &content.content_version,
                ticks: args.ticks,
                tick_ms: args.tick_ms,
                metrics_every: args.metrics_every,
                runner: "arcade_cli",
            },
        )?;
        let writer = MetricsFileWriter::new(run_dir.clone())
            .with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
        metrics_writer = Some(writer);
        println!("Run directory: {}", run_dir.display());
    }

    let mut manager = FloorManager::new();
    let mut bus = notable_event_bus();
    let print_every = args.print_every.max(1);
    let metrics_every = args.metrics_every.max(1);

    println!(
        "Starting floor: ticks={} seed={} consoles={} content_version={}",
        args.ticks,
        state.meta.seed,
        state.consoles.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..args.ticks {
        let mut next_command_id = state.counters.next_command_id;
        let commands = manager.generate_commands(&state, &content, &mut next_command_id);
        state.counters.next_command_id = next_command_id;

        let events = arcade_core::tick(
            &mut state,
            &commands,
            &content,
            &DirectNavigator,
            &mut rng,
            args.tick_ms,
            args.event_level,
        );
        bus.emit_all(&events);

        if state.meta.tick % print_every == 0 {
            print_status(&state, &content);
        }

        if let Some(ref mut writer) = metrics_writer {
            if state.meta.tick % metrics_every == 0 {
                let snapshot = compute_metrics(&state, &content);
                writer.write_row(&snapshot).context("writing metrics row")?;
            }
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state, &content);
    print_queues(&state, &content);

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics written to runs/ directory.");
    }
    if let Some(path) = &args.save_to {
        write_save(&state, path)?;
        println!("Save written to {}", path.display());
    }

    Ok(())
}

fn print_status(state: &GameState, content: &GameContent) {
    let metrics = compute_metrics(state, content);
    println!(
        "[tick={tick:05}  day={day}]  guests={guests:2} (seek={seek} wait={wait} use={using} \
         leave={leave})  queued={queued:2}  broken={broken}  served={served}  angry={angry}  \
         avg_sat={sat:.1}",
        tick = metrics.tick,
        day = metrics.day,
        guests = metrics.guests_total,
        seek = metrics.guests_seeking,
        wait = metrics.guests_waiting,
        using = metrics.guests_using,
        leave = metrics.guests_leaving + metrics.guests_angry,
        queued = metrics.total_queued,
        broken = metrics.consoles_broken + metrics.consoles_under_repair,
        served = metrics.guests_served,
        angry = metrics.guests_angered,
        sat = metrics.avg_departed_satisfaction,
    );
}

fn print_queues(state: &GameState, content: &GameContent) {
    let view = QueueManager::new(content).get_visualization_data(state);
    for (console_id, queue) in &view {
        let waiting: Vec<String> = queue.queue.iter().map(ToString::to_string).collect();
        println!(
            "  {console_id} {kind:<16} queue={len} [{waiting}]",
            kind = queue.kind,
            len = queue.queue_length,
            waiting = waiting.join(", "),
        );
    }
}

fn preview(content_dir: &str, days: u32) -> Result<()> {
    let content = load_content(content_dir)?;
    let state = build_initial_state(&content, 0);
    let summary = state.difficulty.summary(&content.difficulty);
    println!(
        "Day {} intensity={:.2} (spawn={:.2} crowd={:.2} patience={:.2} breakdown={:.2})",
        summary.day,
        summary.overall_intensity,
        summary.spawn_pressure,
        summary.crowd_pressure,
        summary.patience_pressure,
        summary.breakdown_pressure,
    );
    println!(
        "{:>4}  {:>10}  {:>6}  {:>8}  {:>9}  {:>6}  {:>6}",
        "day", "spawn_ms", "guests", "patience", "breakdown", "family", "enthus"
    );
    for day in state.difficulty.preview(&content.difficulty, days) {
        let p = &day.parameters;
        println!(
            "{:>4}  {:>10.0}  {:>6}  {:>8.2}  {:>9.3}  {:>6.2}  {:>6.2}",
            day.day,
            p.guest_spawn_interval_ms,
            p.max_simultaneous_guests,
            p.guest_patience_modifier,
            p.console_breakdown_rate,
            p.guest_type_distribution.family,
            p.guest_type_distribution.enthusiast,
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

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
            ticks,
            seed,
            save_file,
            content_dir,
            tick_ms,
            print_every,
            event_level,
            metrics_every,
            no_metrics,
            save_to,
        } => {
            let event_level = match event_level.as_str() {
                "debug" => EventLevel::Debug,
                _ => EventLevel::Normal,
            };
            run(RunArgs {
                ticks,
                seed,
                save_file,
                content_dir,
                tick_ms,
                print_every,
                event_level,
                metrics_every,
                no_metrics,
                save_to,
            })?;
        }
        Commands::Preview { days, content_dir } => preview(&content_dir, days)?,
    }
    Ok(())
}
