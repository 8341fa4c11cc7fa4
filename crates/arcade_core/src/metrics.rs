//! Snapshot metrics computed from `GameState`.
//!
//! `compute_metrics(&GameState, &GameContent) -> MetricsSnapshot` samples the
//! floor for time-series analysis. No state mutation; the CSV helpers at the
//! bottom are the only IO.

use std::io::Write;

use serde::Serialize;

use crate::{ConsoleState, GameContent, GameState, GuestState};

/// Current schema version. Bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub metrics_version: u32,
    pub now_ms: f64,
    pub day: u32,

    // Guests on the floor
    pub guests_total: u32,
    pub guests_seeking: u32,
    pub guests_waiting: u32,
    pub guests_using: u32,
    pub guests_leaving: u32,
    pub guests_angry: u32,

    // Queues
    pub total_queued: u32,
    pub longest_queue: u32,

    // Consoles
    pub consoles_total: u32,
    pub consoles_operational: u32,
    pub consoles_in_use: u32,
    pub consoles_broken: u32,
    pub consoles_under_repair: u32,
    pub avg_console_durability: f32,
    pub console_utilization: f32,

    // Lifetime
    pub guests_spawned: u64,
    pub guests_served: u64,
    pub guests_angered: u64,
    pub guests_abandoned: u64,
    pub guests_left: u64,
    pub avg_departed_satisfaction: f32,
    pub queue_advancements: u64,
    pub breakdowns: u64,
    pub repairs: u64,

    // Difficulty
    pub spawn_interval_ms: f64,
    pub max_simultaneous_guests: u32,
    pub patience_modifier: f64,
    pub breakdown_rate: f64,
    pub difficulty_intensity: f64,
}

#[derive(Default)]
struct GuestTally {
    total: u32,
    seeking: u32,
    waiting: u32,
    using: u32,
    leaving: u32,
    angry: u32,
}

#[derive(Default)]
struct ConsoleTally {
    total: u32,
    operational: u32,
    in_use: u32,
    broken: u32,
    under_repair: u32,
    total_queued: u32,
    longest_queue: u32,
    durability_sum: f64,
    users: u32,
    capacity: u32,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn tally_consoles(state: &GameState) -> ConsoleTally {
    let mut tally = ConsoleTally::default();
    for console in state.consoles.values() {
        tally.total += 1;
        match console.state {
            ConsoleState::Operational => tally.operational += 1,
            ConsoleState::InUse => tally.in_use += 1,
            ConsoleState::Broken => tally.broken += 1,
            ConsoleState::UnderRepair => tally.under_repair += 1,
        }
        let queued = count(console.queue.len());
        tally.total_queued += queued;
        tally.longest_queue = tally.longest_queue.max(queued);
        tally.durability_sum += console.durability_ratio();
        tally.users += count(console.current_users.len());
        tally.capacity += console.capacity;
    }
    tally
}

fn tally_guests(state: &GameState) -> GuestTally {
    let mut tally = GuestTally::default();
    for guest in state.guests.values() {
        tally.total += 1;
        match guest.state {
            GuestState::Seeking => tally.seeking += 1,
            GuestState::Waiting => tally.waiting += 1,
            GuestState::Using => tally.using += 1,
            GuestState::Leaving => tally.leaving += 1,
            GuestState::Angry => tally.angry += 1,
        }
    }
    tally
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_metrics(state: &GameState, content: &GameContent) -> MetricsSnapshot {
    let guests = tally_guests(state);
    let consoles = tally_consoles(state);
    let stats = &state.stats;
    let parameters = &state.difficulty.parameters;

    let avg_console_durability = if consoles.total > 0 {
        (consoles.durability_sum / f64::from(consoles.total)) as f32
    } else {
        0.0
    };
    let console_utilization = if consoles.capacity > 0 {
        consoles.users as f32 / consoles.capacity as f32
    } else {
        0.0
    };
    let avg_departed_satisfaction = if stats.guests_left > 0 {
        (stats.departed_satisfaction_total as f64 / stats.guests_left as f64) as f32
    } else {
        0.0
    };

    MetricsSnapshot {
        tick: state.meta.tick,
        metrics_version: METRICS_VERSION,
        now_ms: state.meta.now_ms,
        day: state.difficulty.day,
        guests_total: guests.total,
        guests_seeking: guests.seeking,
        guests_waiting: guests.waiting,
        guests_using: guests.using,
        guests_leaving: guests.leaving,
        guests_angry: guests.angry,
        total_queued: consoles.total_queued,
        longest_queue: consoles.longest_queue,
        consoles_total: consoles.total,
        consoles_operational: consoles.operational,
        consoles_in_use: consoles.in_use,
        consoles_broken: consoles.broken,
        consoles_under_repair: consoles.under_repair,
        avg_console_durability,
        console_utilization,
        guests_spawned: stats.guests_spawned,
        guests_served: stats.guests_served,
        guests_angered: stats.guests_angered,
        guests_abandoned: stats.guests_abandoned,
        guests_left: stats.guests_left,
        avg_departed_satisfaction,
        queue_advancements: stats.queue_advancements,
        breakdowns: stats.breakdowns,
        repairs: stats.repairs,
        spawn_interval_ms: parameters.guest_spawn_interval_ms,
        max_simultaneous_guests: parameters.max_simultaneous_guests,
        patience_modifier: parameters.guest_patience_modifier,
        breakdown_rate: parameters.console_breakdown_rate,
        difficulty_intensity: state.difficulty.summary(&content.difficulty).overall_intensity,
    }
}

/// Write the CSV header row for metrics.
pub fn write_metrics_header(writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "tick,metrics_version,now_ms,day,\
         guests_total,guests_seeking,guests_waiting,guests_using,guests_leaving,guests_angry,\
         total_queued,longest_queue,\
         consoles_total,consoles_operational,consoles_in_use,consoles_broken,consoles_under_repair,\
         avg_console_durability,console_utilization,\
         guests_spawned,guests_served,guests_angered,guests_abandoned,guests_left,\
         avg_departed_satisfaction,queue_advancements,breakdowns,repairs,\
         spawn_interval_ms,max_simultaneous_guests,patience_modifier,breakdown_rate,\
         difficulty_intensity"
    )
}

/// Append a single metrics snapshot as a CSV row.
pub fn append_metrics_row(writer: &mut impl Write, s: &MetricsSnapshot) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        s.tick,
        s.metrics_version,
        s.now_ms,
        s.day,
        s.guests_total,
        s.guests_seeking,
        s.guests_waiting,
        s.guests_using,
        s.guests_leaving,
        s.guests_angry,
        s.total_queued,
        s.longest_queue,
        s.consoles_total,
        s.consoles_operational,
        s.consoles_in_use,
        s.consoles_broken,
        s.consoles_under_repair,
        s.avg_console_durability,
        s.console_utilization,
        s.guests_spawned,
        s.guests_served,
        s.guests_angered,
        s.guests_abandoned,
        s.guests_left,
        s.avg_departed_satisfaction,
        s.queue_advancements,
        s.breakdowns,
        s.repairs,
        s.spawn_interval_ms,
        s.max_simultaneous_guests,
        s.patience_modifier,
        s.breakdown_rate,
        s.difficulty_intensity,
    )
}

/// Write a collection of snapshots to a CSV file.
pub fn write_metrics_csv(
    path: &std::path::Path,
    snapshots: &[MetricsSnapshot],
) -> std::io::Result<()> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_metrics_header(&mut writer)?;
    for snapshot in snapshots {
        append_metrics_row(&mut writer, snapshot)?;
    }
    writer.flush()
}

/// Maximum data rows per CSV file before rotating to a new file.
const MAX_ROWS_PER_FILE: usize = 50_000;

/// Rotating metrics CSV writer: `metrics_000.csv`, `metrics_001.csv`, ...
/// after [`MAX_ROWS_PER_FILE`] rows each.
pub struct MetricsFileWriter {
    run_dir: std::path::PathBuf,
    file_index: u32,
    rows_in_current_file: usize,
    writer: std::io::BufWriter<std::fs::File>,
}

impl MetricsFileWriter {
    pub fn new(run_dir: std::path::PathBuf) -> std::io::Result<Self> {
        let writer = open_csv_file(&run_dir, 0)?;
        Ok(Self {
            run_dir,
            file_index: 0,
            rows_in_current_file: 0,
            writer,
        })
    }

    pub fn write_row(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        if self.rows_in_current_file >= MAX_ROWS_PER_FILE {
            self.writer.flush()?;
            self.file_index += 1;
            self.writer = open_csv_file(&self.run_dir, self.file_index)?;
            self.rows_in_current_file = 0;
        }
        append_metrics_row(&mut self.writer, snapshot)?;
        self.rows_in_current_file += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn open_csv_file(
    run_dir: &std::path::Path,
    index: u32,
) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    let path = run_dir.join(format!("metrics_{index:03}.csv"));
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_metrics_header(&mut writer)?;
    Ok(writer)
}
