//! Day-indexed difficulty scaling.
//!
//! `parameters_for_day` is a pure function of the curve and the day number.
//! Every scaled field is clamped to its floor/ceiling and moves in one
//! direction only as days increase; day 1 (and anything below) reproduces the
//! base parameters exactly.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::GuestType;

/// Guest-type shares. Always sums to 1.0 after `normalized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDistribution {
    pub family: f64,
    pub enthusiast: f64,
    pub casual: f64,
    pub tourist: f64,
}

impl TypeDistribution {
    pub fn get(&self, guest_type: GuestType) -> f64 {
        match guest_type {
            GuestType::Family => self.family,
            GuestType::Enthusiast => self.enthusiast,
            GuestType::Casual => self.casual,
            GuestType::Tourist => self.tourist,
        }
    }

    pub fn sum(&self) -> f64 {
        self.family + self.enthusiast + self.casual + self.tourist
    }

    /// Rescales every share by the total. A degenerate (non-positive) total
    /// falls back to a uniform split.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 || !total.is_finite() {
            return Self {
                family: 0.25,
                enthusiast: 0.25,
                casual: 0.25,
                tourist: 0.25,
            };
        }
        Self {
            family: self.family / total,
            enthusiast: self.enthusiast / total,
            casual: self.casual / total,
            tourist: self.tourist / total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyParameters {
    pub guest_spawn_interval_ms: f64,
    pub max_simultaneous_guests: u32,
    pub guest_patience_modifier: f64,
    pub console_breakdown_rate: f64,
    pub guest_type_distribution: TypeDistribution,
}

/// Base parameters plus per-day steps and the bounds each field is clamped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyCurve {
    pub base: DifficultyParameters,
    pub spawn_interval_step_ms: f64,
    pub min_spawn_interval_ms: f64,
    pub guests_per_day: u32,
    pub max_guests_ceiling: u32,
    pub patience_step: f64,
    pub min_patience_modifier: f64,
    pub breakdown_step: f64,
    pub max_breakdown_rate: f64,
    pub enthusiast_step: f64,
    pub max_enthusiast_share: f64,
    pub family_step: f64,
    pub min_family_share: f64,
}

/// Computes the parameter snapshot for `day`.
pub fn parameters_for_day(curve: &DifficultyCurve, day: u32) -> DifficultyParameters {
    if day <= 1 {
        return curve.base.clone();
    }
    let days_in = day - 1;
    let offset = f64::from(days_in);
    let base = &curve.base;

    let guest_spawn_interval_ms = (base.guest_spawn_interval_ms
        - offset * curve.spawn_interval_step_ms)
        .max(curve.min_spawn_interval_ms);
    let max_simultaneous_guests = base
        .max_simultaneous_guests
        .saturating_add(curve.guests_per_day.saturating_mul(days_in))
        .min(curve.max_guests_ceiling);
    let guest_patience_modifier = (base.guest_patience_modifier - offset * curve.patience_step)
        .max(curve.min_patience_modifier);
    let console_breakdown_rate = (base.console_breakdown_rate + offset * curve.breakdown_step)
        .min(curve.max_breakdown_rate);

    let shares = &base.guest_type_distribution;
    let raw = TypeDistribution {
        family: (shares.family - offset * curve.family_step).max(curve.min_family_share),
        enthusiast: (shares.enthusiast + offset * curve.enthusiast_step)
            .min(curve.max_enthusiast_share),
        casual: shares.casual,
        tourist: shares.tourist,
    };

    DifficultyParameters {
        guest_spawn_interval_ms,
        max_simultaneous_guests,
        guest_patience_modifier,
        console_breakdown_rate,
        guest_type_distribution: raw.normalized(),
    }
}

/// Current difficulty level. Lives in `GameState`; the curve comes from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyScaling {
    pub day: u32,
    pub parameters: DifficultyParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct DifficultySummary {
    pub day: u32,
    pub parameters: DifficultyParameters,
    /// 0.0 at base, 1.0 once the field has reached its bound.
    pub spawn_pressure: f64,
    pub crowd_pressure: f64,
    pub patience_pressure: f64,
    pub breakdown_pressure: f64,
    pub overall_intensity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPreview {
    pub day: u32,
    pub parameters: DifficultyParameters,
}

impl DifficultyScaling {
    pub fn new(curve: &DifficultyCurve) -> Self {
        Self {
            day: 1,
            parameters: parameters_for_day(curve, 1),
        }
    }

    /// Recomputes the snapshot for `day`. Returns true when any parameter changed.
    pub fn update_difficulty_for_day(&mut self, curve: &DifficultyCurve, day: u32) -> bool {
        let parameters = parameters_for_day(curve, day);
        self.day = day;
        if parameters == self.parameters {
            return false;
        }
        tracing::debug!(
            day,
            spawn_interval_ms = parameters.guest_spawn_interval_ms,
            max_guests = parameters.max_simultaneous_guests,
            patience_modifier = parameters.guest_patience_modifier,
            breakdown_rate = parameters.console_breakdown_rate,
            "difficulty rescaled"
        );
        self.parameters = parameters;
        true
    }

    pub fn guest_spawn_interval_ms(&self) -> f64 {
        self.parameters.guest_spawn_interval_ms
    }

    pub fn max_simultaneous_guests(&self) -> u32 {
        self.parameters.max_simultaneous_guests
    }

    pub fn guest_patience_modifier(&self) -> f64 {
        self.parameters.guest_patience_modifier
    }

    pub fn console_breakdown_rate(&self) -> f64 {
        self.parameters.console_breakdown_rate
    }

    pub fn can_spawn_more_guests(&self, active_guests: usize) -> bool {
        u32::try_from(active_guests).is_ok_and(|n| n < self.max_simultaneous_guests())
    }

    /// Walks the cumulative distribution. Falls back to `Casual` when float
    /// drift leaves the roll above the final cumulative share.
    pub fn random_guest_type(&self, rng: &mut impl Rng) -> GuestType {
        let roll: f64 = rng.gen();
        let distribution = &self.parameters.guest_type_distribution;
        let mut cumulative = 0.0;
        for guest_type in GuestType::ALL {
            cumulative += distribution.get(guest_type);
            if roll < cumulative {
                return guest_type;
            }
        }
        GuestType::Casual
    }

    pub fn summary(&self, curve: &DifficultyCurve) -> DifficultySummary {
        let base = &curve.base;
        let current = &self.parameters;
        let spawn_pressure = progress(
            base.guest_spawn_interval_ms - current.guest_spawn_interval_ms,
            base.guest_spawn_interval_ms - curve.min_spawn_interval_ms,
        );
        let crowd_pressure = progress(
            f64::from(current.max_simultaneous_guests) - f64::from(base.max_simultaneous_guests),
            f64::from(curve.max_guests_ceiling) - f64::from(base.max_simultaneous_guests),
        );
        let patience_pressure = progress(
            base.guest_patience_modifier - current.guest_patience_modifier,
            base.guest_patience_modifier - curve.min_patience_modifier,
        );
        let breakdown_pressure = progress(
            current.console_breakdown_rate - base.console_breakdown_rate,
            curve.max_breakdown_rate - base.console_breakdown_rate,
        );
        DifficultySummary {
            day: self.day,
            parameters: current.clone(),
            spawn_pressure,
            crowd_pressure,
            patience_pressure,
            breakdown_pressure,
            overall_intensity: (spawn_pressure
                + crowd_pressure
                + patience_pressure
                + breakdown_pressure)
                / 4.0,
        }
    }

    /// Parameters for the next `days_ahead` days, starting after the current one.
    pub fn preview(&self, curve: &DifficultyCurve, days_ahead: u32) -> Vec<DayPreview> {
        (1..=days_ahead)
            .map(|ahead| {
                let day = self.day.saturating_add(ahead);
                DayPreview {
                    day,
                    parameters: parameters_for_day(curve, day),
                }
            })
            .collect()
    }
}

fn progress(moved: f64, range: f64) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    (moved / range).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, make_rng};
    use rand::RngCore;

    /// Returns the largest possible value on every draw.
    struct MaxRng;

    impl RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }
        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0xFF);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0xFF);
            Ok(())
        }
    }

    #[test]
    fn test_day_one_and_below_reproduce_base() {
        let curve = base_content().difficulty;
        assert_eq!(parameters_for_day(&curve, 1), curve.base);
        assert_eq!(parameters_for_day(&curve, 0), curve.base);
    }

    #[test]
    fn test_scaled_fields_are_monotonic_and_bounded() {
        let curve = base_content().difficulty;
        let mut previous = parameters_for_day(&curve, 1);
        for day in 2..=120 {
            let current = parameters_for_day(&curve, day);
            assert!(current.guest_spawn_interval_ms <= previous.guest_spawn_interval_ms);
            assert!(current.max_simultaneous_guests >= previous.max_simultaneous_guests);
            assert!(current.guest_patience_modifier <= previous.guest_patience_modifier);
            assert!(current.console_breakdown_rate >= previous.console_breakdown_rate);

            assert!(current.guest_spawn_interval_ms >= curve.min_spawn_interval_ms);
            assert!(current.max_simultaneous_guests <= curve.max_guests_ceiling);
            assert!(current.guest_patience_modifier >= curve.min_patience_modifier);
            assert!(current.console_breakdown_rate <= curve.max_breakdown_rate);
            previous = current;
        }
    }

    #[test]
    fn test_distribution_sums_to_one_every_day() {
        let curve = base_content().difficulty;
        for day in 1..=200 {
            let sum = parameters_for_day(&curve, day).guest_type_distribution.sum();
            assert!((sum - 1.0).abs() < 1e-9, "day {day} sums to {sum}");
        }
    }

    #[test]
    fn test_enthusiasts_grow_and_families_shrink() {
        let curve = base_content().difficulty;
        let early = parameters_for_day(&curve, 1).guest_type_distribution;
        let late = parameters_for_day(&curve, 30).guest_type_distribution;
        assert!(late.enthusiast > early.enthusiast);
        assert!(late.family < early.family);
    }

    #[test]
    fn test_update_reports_changes_only_when_parameters_move() {
        let curve = base_content().difficulty;
        let mut scaling = DifficultyScaling::new(&curve);
        assert!(!scaling.update_difficulty_for_day(&curve, 1));
        assert!(scaling.update_difficulty_for_day(&curve, 2));
        assert_eq!(scaling.day, 2);
        assert!(!scaling.update_difficulty_for_day(&curve, 2));
    }

    #[test]
    fn test_spawn_gate_respects_max_guests() {
        let curve = base_content().difficulty;
        let scaling = DifficultyScaling::new(&curve);
        let max = scaling.max_simultaneous_guests() as usize;
        assert!(scaling.can_spawn_more_guests(max - 1));
        assert!(!scaling.can_spawn_more_guests(max));
        assert!(!scaling.can_spawn_more_guests(max + 5));
    }

    #[test]
    fn test_random_guest_type_falls_back_to_casual_on_drift() {
        let curve = base_content().difficulty;
        let mut scaling = DifficultyScaling::new(&curve);
        // Shares that sum to slightly under one leave the top roll unmatched.
        scaling.parameters.guest_type_distribution = TypeDistribution {
            family: 0.25,
            enthusiast: 0.25,
            casual: 0.0,
            tourist: 0.25,
        };
        assert_eq!(scaling.random_guest_type(&mut MaxRng), GuestType::Casual);
    }

    #[test]
    fn test_random_guest_type_follows_a_degenerate_distribution() {
        let curve = base_content().difficulty;
        let mut scaling = DifficultyScaling::new(&curve);
        scaling.parameters.guest_type_distribution = TypeDistribution {
            family: 0.0,
            enthusiast: 1.0,
            casual: 0.0,
            tourist: 0.0,
        };
        let mut rng = make_rng();
        for _ in 0..50 {
            assert_eq!(scaling.random_guest_type(&mut rng), GuestType::Enthusiast);
        }
    }

    #[test]
    fn test_preview_starts_after_current_day() {
        let curve = base_content().difficulty;
        let mut scaling = DifficultyScaling::new(&curve);
        scaling.update_difficulty_for_day(&curve, 3);
        let preview = scaling.preview(&curve, 4);
        let days: Vec<u32> = preview.iter().map(|p| p.day).collect();
        assert_eq!(days, vec![4, 5, 6, 7]);
        assert_eq!(preview[0].parameters, parameters_for_day(&curve, 4));
    }

    #[test]
    fn test_summary_pressure_is_zero_at_base_and_saturates() {
        let curve = base_content().difficulty;
        let mut scaling = DifficultyScaling::new(&curve);
        let fresh = scaling.summary(&curve);
        assert!(fresh.overall_intensity.abs() < 1e-9);

        scaling.update_difficulty_for_day(&curve, 10_000);
        let saturated = scaling.summary(&curve);
        assert!((saturated.overall_intensity - 1.0).abs() < 1e-9);
    }
}
