//! Guest state machine: spawn, patience, walking, use completion, departure.
//!
//! `Seeking → Waiting → Using → Leaving → removed`, with the side branch
//! `Seeking | Waiting → Angry → Leaving → removed`. A guest that turns angry
//! leaves its queue in the same step and stays `Angry` until the next guest
//! step, which turns it `Leaving`.

use std::collections::VecDeque;

use rand::Rng;
use smallvec::SmallVec;

use crate::navigation::Navigator;
use crate::{
    Console, Constants, Event, EventEnvelope, GameContent, GameState, Guest, GuestId,
    GuestProfileDef, GuestState, GuestType, Position,
};

/// Satisfaction assigned (not subtracted) when patience runs out.
pub const ANGRY_SATISFACTION: i32 = -5;

impl Guest {
    pub fn new(
        id: GuestId,
        profile: &GuestProfileDef,
        patience_modifier: f64,
        now_ms: f64,
        position: Position,
    ) -> Self {
        Self {
            id,
            guest_type: profile.guest_type,
            state: GuestState::Seeking,
            satisfaction: profile.base_satisfaction,
            patience_ms: profile.base_patience_ms.max(0.0),
            patience_modifier: patience_modifier.max(0.0),
            arrival_ms: now_ms,
            queue_position: None,
            current_console: None,
            target_console: None,
            queued_at_ms: None,
            use_started_ms: None,
            declined: SmallVec::new(),
            position,
            route: VecDeque::new(),
            walk_speed: profile.walk_speed.max(0.0),
            angered: false,
        }
    }

    /// Total patience after the difficulty modifier.
    pub fn patience_budget_ms(&self) -> f64 {
        self.patience_ms * self.patience_modifier
    }

    /// Zero once the guest has turned angry; never negative.
    pub fn patience_remaining(&self, now_ms: f64) -> f64 {
        if self.angered {
            return 0.0;
        }
        (self.patience_budget_ms() - (now_ms - self.arrival_ms)).max(0.0)
    }

    /// Turns a seeking or waiting guest angry once its patience is spent.
    /// Queue eviction is the caller's job. Returns true on the transition.
    pub fn update_patience(&mut self, now_ms: f64) -> bool {
        if !matches!(self.state, GuestState::Seeking | GuestState::Waiting) {
            return false;
        }
        if now_ms - self.arrival_ms < self.patience_budget_ms() {
            return false;
        }
        self.state = GuestState::Angry;
        self.angered = true;
        self.satisfaction = ANGRY_SATISFACTION;
        true
    }

    pub fn can_start_using_console(&self, console: &Console) -> bool {
        matches!(self.state, GuestState::Seeking | GuestState::Waiting) && console.has_free_slot()
    }

    /// Walks the route for `delta_ms`. Returns true once the route is empty.
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance_along_route(&mut self, delta_ms: f64) -> bool {
        let mut budget = f64::from(self.walk_speed) * delta_ms.max(0.0);
        while let Some(&waypoint) = self.route.front() {
            let distance = f64::from(self.position.distance_to(waypoint));
            if distance <= budget {
                self.position = waypoint;
                budget -= distance;
                self.route.pop_front();
                continue;
            }
            if distance > 0.0 {
                let fraction = (budget / distance) as f32;
                self.position = Position::new(
                    self.position.x + (waypoint.x - self.position.x) * fraction,
                    self.position.y + (waypoint.y - self.position.y) * fraction,
                );
            }
            return false;
        }
        true
    }

    pub fn is_near(&self, target: Position, radius: f32) -> bool {
        self.position.distance_to(target) <= radius
    }
}

/// Creates a guest at the entrance if the difficulty cap allows another one.
/// `None` picks the type from the current distribution. Returns `None` when
/// the floor is full or the type has no profile.
pub fn spawn_guest(
    state: &mut GameState,
    content: &GameContent,
    rng: &mut impl Rng,
    guest_type: Option<GuestType>,
) -> Option<GuestId> {
    if !state
        .difficulty
        .can_spawn_more_guests(state.active_guest_count())
    {
        return None;
    }
    let guest_type = guest_type.unwrap_or_else(|| state.difficulty.random_guest_type(rng));
    let profile = content.guest_profile(guest_type)?;

    let id = GuestId(state.counters.next_guest_id);
    state.counters.next_guest_id += 1;
    let guest = Guest::new(
        id,
        profile,
        state.difficulty.guest_patience_modifier(),
        state.meta.now_ms,
        content.constants.entrance,
    );
    state.guests.insert(id, guest);
    state.stats.guests_spawned += 1;
    Some(id)
}

/// Sends a guest toward the exit. Leaves any queue first and applies
/// `satisfaction_delta`. Angry guests keep their state until the next guest
/// step; everyone else becomes `Leaving`. With no route the guest is removed
/// on the next guest step.
pub(crate) fn begin_departure(
    state: &mut GameState,
    guest_id: GuestId,
    satisfaction_delta: i32,
    navigator: &impl Navigator,
    constants: &Constants,
) {
    state.remove_from_queue(guest_id);
    let Some(guest) = state.guests.get_mut(&guest_id) else {
        return;
    };
    if guest.state != GuestState::Angry {
        guest.state = GuestState::Leaving;
    }
    guest.satisfaction = guest.satisfaction.saturating_add(satisfaction_delta);
    guest.target_console = None;
    guest.route = navigator
        .find_path(guest.position, constants.exit)
        .map(VecDeque::from)
        .unwrap_or_default();
}

/// Guest step: walking, patience, use completion and removal.
pub(crate) fn update_guests(
    state: &mut GameState,
    content: &GameContent,
    navigator: &impl Navigator,
    delta_ms: f64,
    events: &mut Vec<EventEnvelope>,
) {
    let guest_ids: Vec<GuestId> = state.guests.keys().copied().collect();
    for guest_id in guest_ids {
        settle_angry(state, guest_id);
        walk(state, guest_id, delta_ms);
        check_patience(state, content, navigator, guest_id, events);
        check_use_completion(state, content, navigator, guest_id, events);
        check_departure(state, guest_id, events);
    }
}

fn settle_angry(state: &mut GameState, guest_id: GuestId) {
    if let Some(guest) = state.guests.get_mut(&guest_id) {
        if guest.state == GuestState::Angry {
            guest.state = GuestState::Leaving;
        }
    }
}

fn walk(state: &mut GameState, guest_id: GuestId, delta_ms: f64) {
    let Some(guest) = state.guests.get_mut(&guest_id) else {
        return;
    };
    if matches!(guest.state, GuestState::Waiting | GuestState::Using) {
        return;
    }
    guest.advance_along_route(delta_ms);
}

fn check_patience(
    state: &mut GameState,
    content: &GameContent,
    navigator: &impl Navigator,
    guest_id: GuestId,
    events: &mut Vec<EventEnvelope>,
) {
    let now = state.meta.now_ms;
    let Some(guest) = state.guests.get_mut(&guest_id) else {
        return;
    };
    let was_queued_at = guest.queue_position.and(guest.target_console);
    if !guest.update_patience(now) {
        return;
    }
    state.stats.guests_angered += 1;
    begin_departure(state, guest_id, 0, navigator, &content.constants);
    tracing::trace!(guest = %guest_id, "guest ran out of patience");
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        now,
        Event::GuestBecameAngry {
            guest_id,
            was_queued_at,
        },
    ));
}

fn check_use_completion(
    state: &mut GameState,
    content: &GameContent,
    navigator: &impl Navigator,
    guest_id: GuestId,
    events: &mut Vec<EventEnvelope>,
) {
    let now = state.meta.now_ms;
    let Some(guest) = state.guests.get(&guest_id) else {
        return;
    };
    if guest.state != GuestState::Using {
        return;
    }
    let (Some(console_id), Some(started)) = (guest.current_console, guest.use_started_ms) else {
        return;
    };
    let Some(console) = state.consoles.get(&console_id) else {
        return;
    };
    if now - started < console.use_duration_ms {
        return;
    }

    let constants = &content.constants;
    let mut bonus = constants.completion_satisfaction;
    if console.appeals_to_guest_type(guest.guest_type) {
        bonus += constants.type_match_satisfaction;
    }
    state.finish_using_console(guest_id);
    state.stats.guests_served += 1;
    begin_departure(state, guest_id, bonus, navigator, constants);

    let satisfaction = state.guests.get(&guest_id).map_or(0, |g| g.satisfaction);
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        now,
        Event::GuestFinishedUsing {
            guest_id,
            console_id,
            satisfaction,
        },
    ));
}

/// Leaving guests with nowhere left to walk are removed from the floor.
fn check_departure(state: &mut GameState, guest_id: GuestId, events: &mut Vec<EventEnvelope>) {
    let Some(guest) = state.guests.get(&guest_id) else {
        return;
    };
    if guest.state != GuestState::Leaving || !guest.route.is_empty() {
        return;
    }
    let satisfaction = guest.satisfaction;
    let angry = guest.angered;
    state.guests.remove(&guest_id);
    state.stats.guests_left += 1;
    state.stats.departed_satisfaction_total += i64::from(satisfaction);
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        state.meta.now_ms,
        Event::GuestLeft {
            guest_id,
            satisfaction,
            angry,
        },
    ));
}
