//! Queue manager: console choice, queue admission, advancement and abandonment.
//!
//! Console scoring:
//!
//! ```text
//! score = appeal / (1 + congestion_weight * nearby)
//!       * (type_match_multiplier if the console appeals to the guest type, else 1)
//!       * distance_scale / (distance_scale + distance)
//!       * 1 / (1 + queue_length_penalty * queue_length)
//! ```
//!
//! With positive coefficients the score rises with type match and proximity
//! and falls with queue length and crowding.

use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use serde::Serialize;

use crate::navigation::Navigator;
use crate::{
    Console, ConsoleId, Event, EventEnvelope, GameContent, GameState, Guest, GuestId, GuestState,
};

/// Read-only view of one console's queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleQueueView {
    pub kind: String,
    pub queue_length: usize,
    pub queue: Vec<GuestId>,
}

/// What one `QueueManager::update` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueUpdateSummary {
    pub abandoned: usize,
    pub advanced: usize,
    pub targeted: usize,
    pub joined: usize,
    pub declined: usize,
    pub started_directly: usize,
    /// Guests in any queue once the pass is done.
    pub total_queued: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueManager<'a> {
    content: &'a GameContent,
}

enum Arrival {
    Started,
    Joined,
    Declined,
}

impl<'a> QueueManager<'a> {
    pub fn new(content: &'a GameContent) -> Self {
        Self { content }
    }

    pub fn calculate_queue_score(&self, guest: &Guest, console: &Console, distance: f64) -> f64 {
        self.score_with_congestion(guest, console, distance, 0)
    }

    /// Score with the console's appeal depressed by `nearby` guests.
    pub fn score_with_congestion(
        &self,
        guest: &Guest,
        console: &Console,
        distance: f64,
        nearby: usize,
    ) -> f64 {
        let constants = &self.content.constants;
        let appeal = console.appeal / (1.0 + constants.congestion_weight * nearby as f64);
        let type_factor = if console.appeals_to_guest_type(guest.guest_type) {
            constants.type_match_multiplier
        } else {
            1.0
        };
        let proximity = constants.distance_scale / (constants.distance_scale + distance.max(0.0));
        let queue_factor =
            1.0 / (1.0 + constants.queue_length_penalty * console.queue_length() as f64);
        appeal * type_factor * proximity * queue_factor
    }

    /// Rolls the guest type's queue willingness, scaled by the patience
    /// modifier the guest arrived with. A full queue always refuses.
    pub fn should_join_queue(&self, guest: &Guest, console: &Console, rng: &mut impl Rng) -> bool {
        if console.queue_length() >= self.content.constants.max_queue_length {
            return false;
        }
        let Some(profile) = self.content.guest_profile(guest.guest_type) else {
            return false;
        };
        let probability = (profile.queue_willingness * guest.patience_modifier).clamp(0.0, 1.0);
        rng.gen::<f64>() < probability
    }

    /// True iff `wait_ms` exceeds the guest type's queue tolerance.
    pub fn should_abandon_queue(&self, guest: &Guest, wait_ms: f64) -> bool {
        self.content
            .guest_profile(guest.guest_type)
            .is_some_and(|profile| wait_ms > profile.queue_tolerance_ms)
    }

    /// Usable, and either has a free slot or room in its queue.
    pub fn is_eligible(&self, console: &Console) -> bool {
        console.is_usable()
            && (console.has_free_slot()
                || console.queue_length() < self.content.constants.max_queue_length)
    }

    /// Highest-scoring eligible console. Ties keep the earliest candidate.
    pub fn find_optimal_console(
        &self,
        guest: &Guest,
        consoles: &[&Console],
    ) -> Option<(ConsoleId, f64)> {
        self.best_candidate(
            guest,
            consoles.iter().map(|console| (*console, 0)),
        )
    }

    /// Like `find_optimal_console` over the whole floor, skipping consoles the
    /// guest declined and counting crowding around each console.
    pub fn find_optimal_console_on_floor(
        &self,
        state: &GameState,
        guest: &Guest,
    ) -> Option<(ConsoleId, f64)> {
        let radius = self.content.constants.congestion_radius;
        let candidates = state
            .consoles
            .values()
            .filter(|console| !guest.declined.contains(&console.id))
            .map(|console| {
                let nearby = state
                    .guests
                    .values()
                    .filter(|other| {
                        other.id != guest.id
                            && other.state == GuestState::Seeking
                            && other.is_near(console.position, radius)
                    })
                    .count();
                (console, nearby)
            });
        self.best_candidate(guest, candidates)
    }

    fn best_candidate<'c>(
        &self,
        guest: &Guest,
        candidates: impl Iterator<Item = (&'c Console, usize)>,
    ) -> Option<(ConsoleId, f64)> {
        let mut best: Option<(ConsoleId, f64)> = None;
        for (console, nearby) in candidates {
            if !self.is_eligible(console) {
                continue;
            }
            let distance = f64::from(guest.position.distance_to(console.position));
            let score = self.score_with_congestion(guest, console, distance, nearby);
            let better = match best {
                Some((_, top)) => score > top,
                None => true,
            };
            if better {
                best = Some((console.id, score));
            }
        }
        best
    }

    /// Moves queue heads onto free slots, console by console. Returns the
    /// number of guests that started.
    pub fn process_queue_advancement(
        &self,
        state: &mut GameState,
        events: &mut Vec<EventEnvelope>,
    ) -> usize {
        let current_tick = state.meta.tick;
        let now = state.meta.now_ms;
        let console_ids: Vec<ConsoleId> = state.consoles.keys().copied().collect();
        let mut advanced = 0;

        for console_id in console_ids {
            loop {
                let Some(console) = state.consoles.get(&console_id) else {
                    break;
                };
                let Some(head) = console.next_in_queue() else {
                    break;
                };
                let ready = state
                    .guests
                    .get(&head)
                    .is_some_and(|guest| guest.can_start_using_console(console));
                if !ready || !state.start_using_console(head, console_id) {
                    break;
                }
                advanced += 1;
                state.stats.queue_advancements += 1;
                let remaining = state.queue_length(console_id);
                events.push(crate::emit(
                    &mut state.counters,
                    current_tick,
                    now,
                    Event::QueueAdvanced {
                        console_id,
                        guest_id: head,
                        remaining,
                    },
                ));
                events.push(crate::emit(
                    &mut state.counters,
                    current_tick,
                    now,
                    Event::GuestStartedUsing {
                        guest_id: head,
                        console_id,
                    },
                ));
            }
        }
        advanced
    }

    /// Pure snapshot keyed by console id.
    pub fn get_visualization_data(&self, state: &GameState) -> BTreeMap<String, ConsoleQueueView> {
        state
            .consoles
            .values()
            .map(|console| {
                (
                    console.id.to_string(),
                    ConsoleQueueView {
                        kind: console.kind.clone(),
                        queue_length: console.queue_length(),
                        queue: console.queue.clone(),
                    },
                )
            })
            .collect()
    }

    /// One queue pass: abandonment, advancement, then targeting and
    /// admission for every seeking guest.
    pub fn update(
        &self,
        state: &mut GameState,
        navigator: &impl Navigator,
        rng: &mut impl Rng,
        events: &mut Vec<EventEnvelope>,
    ) -> QueueUpdateSummary {
        let mut summary = QueueUpdateSummary {
            abandoned: self.abandon_expired_waits(state, navigator, events),
            advanced: self.process_queue_advancement(state, events),
            ..QueueUpdateSummary::default()
        };

        let seeking: Vec<GuestId> = state
            .guests
            .values()
            .filter(|guest| guest.state == GuestState::Seeking)
            .map(|guest| guest.id)
            .collect();
        for guest_id in seeking {
            self.step_seeking_guest(state, navigator, rng, guest_id, events, &mut summary);
        }

        summary.total_queued = state.total_queued();
        summary
    }

    fn abandon_expired_waits(
        &self,
        state: &mut GameState,
        navigator: &impl Navigator,
        events: &mut Vec<EventEnvelope>,
    ) -> usize {
        let now = state.meta.now_ms;
        let expired: Vec<(GuestId, ConsoleId, f64)> = state
            .guests
            .values()
            .filter(|guest| guest.state == GuestState::Waiting)
            .filter_map(|guest| {
                let waited = now - guest.queued_at_ms?;
                let console_id = guest.target_console?;
                self.should_abandon_queue(guest, waited)
                    .then_some((guest.id, console_id, waited))
            })
            .collect();

        for &(guest_id, console_id, waited_ms) in &expired {
            crate::guest::begin_departure(
                state,
                guest_id,
                -self.content.constants.abandon_satisfaction_penalty,
                navigator,
                &self.content.constants,
            );
            state.stats.guests_abandoned += 1;
            tracing::trace!(guest = %guest_id, console = %console_id, waited_ms, "queue abandoned");
            events.push(crate::emit(
                &mut state.counters,
                state.meta.tick,
                now,
                Event::GuestAbandonedQueue {
                    guest_id,
                    console_id,
                    waited_ms,
                },
            ));
        }
        expired.len()
    }

    fn step_seeking_guest(
        &self,
        state: &mut GameState,
        navigator: &impl Navigator,
        rng: &mut impl Rng,
        guest_id: GuestId,
        events: &mut Vec<EventEnvelope>,
        summary: &mut QueueUpdateSummary,
    ) {
        let Some(guest) = state.guests.get(&guest_id) else {
            return;
        };
        let target = guest
            .target_console
            .filter(|id| state.consoles.get(id).is_some_and(Console::is_usable));

        let Some(console_id) = target else {
            if self.choose_target(state, navigator, guest_id, events) {
                summary.targeted += 1;
            }
            return;
        };

        let radius = self.content.constants.arrival_radius;
        let Some(console) = state.consoles.get(&console_id) else {
            return;
        };
        if !guest.is_near(console.position, radius) {
            if guest.route.is_empty() {
                let route = navigator.find_path(guest.position, console.position);
                if let Some(guest) = state.guests.get_mut(&guest_id) {
                    guest.route = route.map(VecDeque::from).unwrap_or_default();
                }
            }
            return;
        }

        match self.admit_on_arrival(state, rng, guest_id, console_id, events) {
            Arrival::Started => summary.started_directly += 1,
            Arrival::Joined => summary.joined += 1,
            Arrival::Declined => summary.declined += 1,
        }
    }

    /// Picks a console for a seeking guest and requests a route to it.
    fn choose_target(
        &self,
        state: &mut GameState,
        navigator: &impl Navigator,
        guest_id: GuestId,
        events: &mut Vec<EventEnvelope>,
    ) -> bool {
        let Some(guest) = state.guests.get(&guest_id) else {
            return false;
        };
        let Some((console_id, score)) = self.find_optimal_console_on_floor(state, guest) else {
            // Nothing left to try; declined consoles come back on the next pass.
            if let Some(guest) = state.guests.get_mut(&guest_id) {
                guest.target_console = None;
                guest.declined.clear();
            }
            return false;
        };
        let from = guest.position;
        let to = state.consoles[&console_id].position;
        let route = navigator.find_path(from, to);

        let Some(guest) = state.guests.get_mut(&guest_id) else {
            return false;
        };
        guest.target_console = Some(console_id);
        guest.route = route.map(VecDeque::from).unwrap_or_default();
        events.push(crate::emit(
            &mut state.counters,
            state.meta.tick,
            state.meta.now_ms,
            Event::GuestTargetedConsole {
                guest_id,
                console_id,
                score,
            },
        ));
        true
    }

    /// A guest at its console starts at once when a slot is free and nobody
    /// is waiting; otherwise it rolls to join the queue or declines it.
    fn admit_on_arrival(
        &self,
        state: &mut GameState,
        rng: &mut impl Rng,
        guest_id: GuestId,
        console_id: ConsoleId,
        events: &mut Vec<EventEnvelope>,
    ) -> Arrival {
        let current_tick = state.meta.tick;
        let now = state.meta.now_ms;
        let Some(console) = state.consoles.get(&console_id) else {
            return Arrival::Declined;
        };

        if console.queue.is_empty() && state.start_using_console(guest_id, console_id) {
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                now,
                Event::GuestStartedUsing {
                    guest_id,
                    console_id,
                },
            ));
            return Arrival::Started;
        }

        let (Some(guest), Some(console)) =
            (state.guests.get(&guest_id), state.consoles.get(&console_id))
        else {
            return Arrival::Declined;
        };
        if self.should_join_queue(guest, console, rng) {
            if let Some(position) = state.add_to_queue(console_id, guest_id) {
                events.push(crate::emit(
                    &mut state.counters,
                    current_tick,
                    now,
                    Event::GuestJoinedQueue {
                        guest_id,
                        console_id,
                        position,
                    },
                ));
                return Arrival::Joined;
            }
        }

        if let Some(guest) = state.guests.get_mut(&guest_id) {
            guest.declined.push(console_id);
            guest.target_console = None;
            guest.route.clear();
        }
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            now,
            Event::QueueJoinDeclined {
                guest_id,
                console_id,
            },
        ));
        Arrival::Declined
    }
}
