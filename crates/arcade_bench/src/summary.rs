use crate::run_result::detect_collapse;
use arcade_core::MetricsSnapshot;
use serde::Serialize;

type Extractor = (&'static str, fn(&MetricsSnapshot) -> f64);

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub seed_count: usize,
    pub collapsed_count: usize,
    pub metrics: Vec<MetricSummary>,
}

#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Headline numbers printed after a batch.
const HEADLINE: &[Extractor] = &[
    ("guests_served", |s| s.guests_served as f64),
    ("served_per_spawn", |s| ratio(s.guests_served, s.guests_spawned)),
    ("angry_departure_rate", |s| ratio(s.guests_angered, s.guests_left)),
    ("abandon_rate", |s| ratio(s.guests_abandoned, s.guests_left)),
    ("avg_departed_satisfaction", |s| {
        f64::from(s.avg_departed_satisfaction)
    }),
    ("longest_queue", |s| f64::from(s.longest_queue)),
    ("breakdowns", |s| s.breakdowns as f64),
    ("avg_console_durability", |s| {
        f64::from(s.avg_console_durability)
    }),
    ("difficulty_intensity", |s| s.difficulty_intensity),
];

/// Every `SummaryMetrics` key, in the order `batch_summary.json` lists them.
const CONTRACT: &[Extractor] = &[
    ("day", |s| f64::from(s.day)),
    ("guests_spawned", |s| s.guests_spawned as f64),
    ("guests_served", |s| s.guests_served as f64),
    ("guests_angered", |s| s.guests_angered as f64),
    ("guests_abandoned", |s| s.guests_abandoned as f64),
    ("guests_left", |s| s.guests_left as f64),
    ("avg_departed_satisfaction", |s| {
        f64::from(s.avg_departed_satisfaction)
    }),
    ("guests_on_floor", |s| f64::from(s.guests_total)),
    ("total_queued", |s| f64::from(s.total_queued)),
    ("longest_queue", |s| f64::from(s.longest_queue)),
    ("queue_advancements", |s| s.queue_advancements as f64),
    ("consoles_broken", |s| f64::from(s.consoles_broken)),
    ("consoles_under_repair", |s| {
        f64::from(s.consoles_under_repair)
    }),
    ("avg_console_durability", |s| {
        f64::from(s.avg_console_durability)
    }),
    ("console_utilization", |s| f64::from(s.console_utilization)),
    ("breakdowns", |s| s.breakdowns as f64),
    ("repairs", |s| s.repairs as f64),
    ("difficulty_intensity", |s| s.difficulty_intensity),
];

pub fn compute_summary(snapshots: &[(u64, &MetricsSnapshot)]) -> SummaryStats {
    let collapsed_count = snapshots
        .iter()
        .filter(|(_, s)| detect_collapse(s).0)
        .count();

    let metrics = HEADLINE
        .iter()
        .map(|(name, extract)| {
            let values: Vec<f64> = snapshots.iter().map(|(_, s)| extract(s)).collect();
            compute_metric_summary(name, &values)
        })
        .collect();

    SummaryStats {
        seed_count: snapshots.len(),
        collapsed_count,
        metrics,
    }
}

fn compute_metric_summary(name: &str, values: &[f64]) -> MetricSummary {
    let count = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / count;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;

    MetricSummary {
        name: name.to_string(),
        mean,
        min,
        max,
        stddev: variance.sqrt(),
    }
}

/// Build aggregated metrics in the contract format:
/// `{ "key": { "mean": ..., "min": ..., "max": ..., "stddev": ... }, ... }`
pub fn build_aggregated_metrics(snapshots: &[&MetricsSnapshot]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, extract) in CONTRACT {
        let values: Vec<f64> = snapshots.iter().map(|s| extract(s)).collect();
        let summary = compute_metric_summary(name, &values);
        map.insert(
            (*name).to_string(),
            serde_json::json!({
                "mean": summary.mean,
                "min": summary.min,
                "max": summary.max,
                "stddev": summary.stddev,
            }),
        );
    }
    serde_json::Value::Object(map)
}

pub fn print_summary(scenario_name: &str, ticks: u64, stats: &SummaryStats) {
    let tick_display = if ticks >= 1000 {
        format!("{}k", ticks / 1000)
    } else {
        ticks.to_string()
    };
    println!(
        "\n=== {} ({} seeds, {} ticks each) ===\n",
        scenario_name, stats.seed_count, tick_display
    );
    println!(
        "{:<30} {:>8} {:>8} {:>8} {:>8}",
        "Metric", "Mean", "Min", "Max", "StdDev"
    );
    println!("{}", "-".repeat(70));
    for metric in &stats.metrics {
        println!(
            "{:<30} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            metric.name, metric.mean, metric.min, metric.max, metric.stddev
        );
    }
    println!(
        "{:<30} {}/{}",
        "collapse_rate", stats.collapsed_count, stats.seed_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_core::compute_metrics;
    use arcade_core::test_fixtures::{base_content, base_state};

    fn make_snapshot(served: u64, left: u64, angered: u64, longest_queue: u32) -> MetricsSnapshot {
        let content = base_content();
        let mut snapshot = compute_metrics(&base_state(&content), &content);
        snapshot.tick = 100;
        snapshot.guests_spawned = left + 2;
        snapshot.guests_served = served;
        snapshot.guests_left = left;
        snapshot.guests_angered = angered;
        snapshot.longest_queue = longest_queue;
        snapshot
    }

    #[test]
    fn test_summary_basic_stats() {
        let s1 = make_snapshot(10, 12, 1, 2);
        let s2 = make_snapshot(20, 22, 2, 4);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &s1), (2, &s2)];
        let stats = compute_summary(&snapshots);

        assert_eq!(stats.seed_count, 2);
        assert_eq!(stats.collapsed_count, 0);

        let served = &stats.metrics[0];
        assert_eq!(served.name, "guests_served");
        assert!((served.mean - 15.0).abs() < 1e-9);
        assert!((served.min - 10.0).abs() < 1e-9);
        assert!((served.max - 20.0).abs() < 1e-9);
        assert!((served.stddev - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_collapse_counted() {
        let collapsed = make_snapshot(2, 20, 15, 5);
        let healthy = make_snapshot(20, 20, 1, 1);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &collapsed), (2, &healthy)];
        assert_eq!(compute_summary(&snapshots).collapsed_count, 1);
    }

    #[test]
    fn test_stddev_zero_for_identical() {
        let s1 = make_snapshot(5, 6, 1, 2);
        let s2 = make_snapshot(5, 6, 1, 2);
        let snapshots: Vec<(u64, &MetricsSnapshot)> = vec![(1, &s1), (2, &s2)];
        for metric in &compute_summary(&snapshots).metrics {
            assert!(
                metric.stddev.abs() < 1e-10,
                "stddev for {} should be 0, got {}",
                metric.name,
                metric.stddev
            );
        }
    }

    #[test]
    fn test_ratios_survive_an_empty_floor() {
        let empty = make_snapshot(0, 0, 0, 0);
        let stats = compute_summary(&[(1, &empty)]);
        assert!(stats.metrics.iter().all(|m| m.mean.is_finite()));
    }

    #[test]
    fn test_build_aggregated_metrics_has_all_keys() {
        let s1 = make_snapshot(10, 12, 1, 2);
        let s2 = make_snapshot(20, 22, 2, 4);
        let agg = build_aggregated_metrics(&[&s1, &s2]);

        let obj = agg.as_object().unwrap();
        assert_eq!(obj.len(), CONTRACT.len());
        for (key, _) in CONTRACT {
            let entry = obj
                .get(*key)
                .unwrap_or_else(|| panic!("missing key: {key}"));
            for stat in ["mean", "min", "max", "stddev"] {
                assert!(entry.get(stat).is_some(), "missing {stat} for {key}");
            }
        }
        let longest = &agg["longest_queue"];
        assert!((longest["mean"].as_f64().unwrap() - 3.0).abs() < 1e-9);
        assert!((longest["max"].as_f64().unwrap() - 4.0).abs() < 1e-9);
    }
}
