//! Console resource: capacity, durability and the breakdown/repair cycle.
//!
//! Breakdown is rolled once per completed use cycle. Finishing a use sets
//! `breakdown_check_due`; the console step consumes the flag and rolls
//! `effective_breakdown_chance` against the injected RNG.

use rand::Rng;
use smallvec::SmallVec;

use crate::navigation::Navigator;
use crate::{
    Console, ConsoleDef, ConsoleId, ConsoleState, Event, EventEnvelope, GameContent, GameState,
    GuestId, GuestType, Position,
};

impl Console {
    pub fn from_def(
        id: ConsoleId,
        def: &ConsoleDef,
        position: Position,
        breakdown_chance: f64,
    ) -> Self {
        Self {
            id,
            kind: def.id.clone(),
            state: ConsoleState::Operational,
            durability: def.max_durability,
            max_durability: def.max_durability,
            durability_loss_per_use: def.durability_loss_per_use,
            capacity: def.capacity.max(1),
            current_users: SmallVec::new(),
            queue: Vec::new(),
            appeal: def.appeal,
            appeals_to: def.appeals_to.clone(),
            breakdown_chance: breakdown_chance.clamp(0.0, 1.0),
            position,
            use_duration_ms: def.use_duration_ms,
            repair_duration_ms: def.repair_duration_ms,
            repair_started_ms: None,
            breakdown_check_due: false,
            total_uses: 0,
        }
    }

    /// Operational or in use; broken and under-repair consoles take nobody.
    pub fn is_usable(&self) -> bool {
        matches!(self.state, ConsoleState::Operational | ConsoleState::InUse)
    }

    pub fn has_free_slot(&self) -> bool {
        self.is_usable() && self.current_users.len() < self.capacity as usize
    }

    pub fn appeals_to_guest_type(&self, guest_type: GuestType) -> bool {
        self.appeals_to.contains(&guest_type)
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn next_in_queue(&self) -> Option<GuestId> {
        self.queue.first().copied()
    }

    pub fn durability_ratio(&self) -> f64 {
        if self.max_durability == 0 {
            return 0.0;
        }
        f64::from(self.durability) / f64::from(self.max_durability)
    }

    /// Wear raises the base chance: a fully worn console rolls at twice the
    /// rate of a fresh one.
    pub fn effective_breakdown_chance(&self) -> f64 {
        (self.breakdown_chance * (2.0 - self.durability_ratio())).clamp(0.0, 1.0)
    }

    /// Rolls for a breakdown. A console with no durability left always
    /// breaks. Returns true if the console is now broken.
    pub fn check_breakdown(&mut self, rng: &mut impl Rng) -> bool {
        if !self.is_usable() {
            return false;
        }
        let roll: f64 = rng.gen();
        if self.durability == 0 || roll < self.effective_breakdown_chance() {
            self.state = ConsoleState::Broken;
            return true;
        }
        false
    }

    /// `Broken` → `UnderRepair`. Any other state is left alone.
    pub fn start_repair(&mut self, now_ms: f64) -> bool {
        if self.state != ConsoleState::Broken {
            return false;
        }
        self.state = ConsoleState::UnderRepair;
        self.repair_started_ms = Some(now_ms);
        true
    }

    /// Completes a repair once its duration has elapsed, restoring full
    /// durability.
    pub fn update_repair(&mut self, now_ms: f64) -> bool {
        let Some(started) = self.repair_started_ms else {
            return false;
        };
        if self.state != ConsoleState::UnderRepair || now_ms - started < self.repair_duration_ms {
            return false;
        }
        self.durability = self.max_durability;
        self.repair_started_ms = None;
        self.breakdown_check_due = false;
        self.state = ConsoleState::Operational;
        true
    }

    /// Keeps `Operational`/`InUse` in step with the user list.
    pub(crate) fn sync_usage_state(&mut self) {
        if !self.is_usable() {
            return;
        }
        self.state = if self.current_users.is_empty() {
            ConsoleState::Operational
        } else {
            ConsoleState::InUse
        };
    }
}

/// Places a console of a content-defined kind. Unknown kinds place nothing.
pub fn place_console(
    state: &mut GameState,
    content: &GameContent,
    kind: &str,
    position: Position,
) -> Option<ConsoleId> {
    let def = content.console_def(kind)?;
    let id = ConsoleId(state.counters.next_console_id);
    state.counters.next_console_id += 1;
    let console = Console::from_def(
        id,
        def,
        position,
        state.difficulty.console_breakdown_rate(),
    );
    state.consoles.insert(id, console);
    Some(id)
}

/// Pushes the current difficulty breakdown rate into every console.
pub(crate) fn apply_breakdown_rate(state: &mut GameState) {
    let rate = state.difficulty.console_breakdown_rate().clamp(0.0, 1.0);
    for console in state.consoles.values_mut() {
        console.breakdown_chance = rate;
    }
}

/// Console step: pending breakdown checks, automatic repair starts and
/// repair completion.
pub(crate) fn update_consoles(
    state: &mut GameState,
    content: &GameContent,
    navigator: &impl Navigator,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    let now = state.meta.now_ms;
    let console_ids: Vec<ConsoleId> = state.consoles.keys().copied().collect();

    for console_id in console_ids {
        let broke = {
            let Some(console) = state.consoles.get_mut(&console_id) else {
                continue;
            };
            if console.breakdown_check_due {
                console.breakdown_check_due = false;
                console.check_breakdown(rng)
            } else {
                false
            }
        };

        if broke {
            state.stats.breakdowns += 1;
            let released = state.release_queue(console_id);
            let ejected = state.eject_users(console_id);
            for guest_id in &ejected {
                crate::guest::begin_departure(
                    state,
                    *guest_id,
                    content.constants.breakdown_satisfaction_penalty,
                    navigator,
                    &content.constants,
                );
            }
            tracing::debug!(
                console = %console_id,
                released = released.len(),
                ejected = ejected.len(),
                "console broke down"
            );
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                now,
                Event::ConsoleBrokeDown {
                    console_id,
                    released_guests: released.len(),
                    ejected_guests: ejected.len(),
                },
            ));
        }

        let Some(console) = state.consoles.get_mut(&console_id) else {
            continue;
        };
        if content.constants.auto_repair && console.start_repair(now) {
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                now,
                Event::ConsoleRepairStarted { console_id },
            ));
        }

        let Some(console) = state.consoles.get_mut(&console_id) else {
            continue;
        };
        if console.update_repair(now) {
            state.stats.repairs += 1;
            tracing::debug!(console = %console_id, "console repaired");
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                now,
                Event::ConsoleRepaired { console_id },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, make_rng};

    fn arcade_console(breakdown_chance: f64) -> Console {
        let content = base_content();
        let def = content.console_def("arcade_cabinet").unwrap();
        Console::from_def(ConsoleId(0), def, Position::new(10.0, 10.0), breakdown_chance)
    }

    #[test]
    fn test_certain_breakdown_breaks_on_next_check() {
        let mut console = arcade_console(1.0);
        let mut rng = make_rng();
        assert_eq!(console.state, ConsoleState::Operational);
        assert!(console.check_breakdown(&mut rng));
        assert_eq!(console.state, ConsoleState::Broken);
    }

    #[test]
    fn test_zero_chance_never_breaks_while_durable() {
        let mut console = arcade_console(0.0);
        let mut rng = make_rng();
        for _ in 0..1000 {
            assert!(!console.check_breakdown(&mut rng));
        }
        assert_eq!(console.state, ConsoleState::Operational);
    }

    #[test]
    fn test_exhausted_durability_always_breaks() {
        let mut console = arcade_console(0.0);
        console.durability = 0;
        assert!(console.check_breakdown(&mut make_rng()));
    }

    #[test]
    fn test_broken_console_is_not_rolled_again() {
        let mut console = arcade_console(1.0);
        let mut rng = make_rng();
        console.check_breakdown(&mut rng);
        assert!(!console.check_breakdown(&mut rng));
    }

    #[test]
    fn test_repair_restores_full_durability_after_duration() {
        let mut console = arcade_console(1.0);
        console.durability = 3;
        console.check_breakdown(&mut make_rng());

        assert!(!console.update_repair(0.0), "not under repair yet");
        assert!(console.start_repair(1_000.0));
        assert_eq!(console.state, ConsoleState::UnderRepair);
        assert!(!console.start_repair(1_000.0));

        let done_at = 1_000.0 + console.repair_duration_ms;
        assert!(!console.update_repair(done_at - 1.0));
        assert!(console.update_repair(done_at));
        assert_eq!(console.state, ConsoleState::Operational);
        assert_eq!(console.durability, console.max_durability);
    }

    #[test]
    fn test_wear_raises_effective_chance() {
        let mut console = arcade_console(0.1);
        let fresh = console.effective_breakdown_chance();
        console.durability = console.max_durability / 2;
        assert!(console.effective_breakdown_chance() > fresh);
    }

    #[test]
    fn test_type_appeal_comes_from_def() {
        let console = arcade_console(0.0);
        assert!(console.appeals_to_guest_type(GuestType::Enthusiast));
        assert!(!console.appeals_to_guest_type(GuestType::Family));
    }

    #[test]
    fn test_place_console_rejects_unknown_kind() {
        let content = base_content();
        let mut state = crate::test_fixtures::empty_state(&content);
        assert!(place_console(&mut state, &content, "pinball_9000", Position::default()).is_none());
        assert!(state.consoles.is_empty());
        let id = place_console(&mut state, &content, "arcade_cabinet", Position::default());
        assert!(id.is_some());
        assert_eq!(state.consoles.len(), 1);
    }
}
