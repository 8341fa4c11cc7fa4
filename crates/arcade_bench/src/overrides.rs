use anyhow::{anyhow, bail, Result};
use arcade_core::Constants;
use std::collections::HashMap;

const VALID_KEYS: &[&str] = &[
    "day_length_ms",
    "arrival_radius",
    "max_queue_length",
    "type_match_multiplier",
    "distance_scale",
    "queue_length_penalty",
    "congestion_radius",
    "congestion_weight",
    "completion_satisfaction",
    "type_match_satisfaction",
    "abandon_satisfaction_penalty",
    "breakdown_satisfaction_penalty",
    "auto_repair",
];

pub fn apply_overrides(
    constants: &mut Constants,
    overrides: &HashMap<String, serde_json::Value>,
) -> Result<()> {
    for (key, value) in overrides {
        match key.as_str() {
            "day_length_ms" => constants.day_length_ms = as_positive_f64(key, value)?,
            "arrival_radius" => constants.arrival_radius = as_f32(key, value)?,
            "max_queue_length" => constants.max_queue_length = as_usize(key, value)?,
            "type_match_multiplier" => constants.type_match_multiplier = as_f64(key, value)?,
            "distance_scale" => constants.distance_scale = as_positive_f64(key, value)?,
            "queue_length_penalty" => constants.queue_length_penalty = as_f64(key, value)?,
            "congestion_radius" => constants.congestion_radius = as_f32(key, value)?,
            "congestion_weight" => constants.congestion_weight = as_f64(key, value)?,
            "completion_satisfaction" => {
                constants.completion_satisfaction = as_i32(key, value)?;
            }
            "type_match_satisfaction" => {
                constants.type_match_satisfaction = as_i32(key, value)?;
            }
            "abandon_satisfaction_penalty" => {
                constants.abandon_satisfaction_penalty = as_i32(key, value)?;
            }
            "breakdown_satisfaction_penalty" => {
                constants.breakdown_satisfaction_penalty = as_i32(key, value)?;
            }
            "auto_repair" => constants.auto_repair = as_bool(key, value)?,
            _ => bail!(
                "unknown override key '{key}'. Valid keys: {}",
                VALID_KEYS.join(", ")
            ),
        }
    }
    Ok(())
}

fn as_f64(key: &str, value: &serde_json::Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| anyhow!("override '{key}': expected a number, got {value}"))
}

fn as_positive_f64(key: &str, value: &serde_json::Value) -> Result<f64> {
    let val = as_f64(key, value)?;
    if val <= 0.0 {
        bail!("override '{key}': expected a positive number, got {val}");
    }
    Ok(val)
}

#[allow(clippy::cast_possible_truncation)] // JSON f64→f32 is intentional
fn as_f32(key: &str, value: &serde_json::Value) -> Result<f32> {
    as_f64(key, value).map(|v| v as f32)
}

fn as_usize(key: &str, value: &serde_json::Value) -> Result<usize> {
    let val = value
        .as_u64()
        .ok_or_else(|| anyhow!("override '{key}': expected a positive integer, got {value}"))?;
    usize::try_from(val).map_err(|_| anyhow!("override '{key}': value {val} is too large"))
}

fn as_i32(key: &str, value: &serde_json::Value) -> Result<i32> {
    let val = value
        .as_i64()
        .ok_or_else(|| anyhow!("override '{key}': expected an integer, got {value}"))?;
    i32::try_from(val).map_err(|_| anyhow!("override '{key}': value {val} exceeds i32 range"))
}

fn as_bool(key: &str, value: &serde_json::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow!("override '{key}': expected true or false, got {value}"))
}
