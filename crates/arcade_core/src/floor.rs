//! Queue and usage membership on the arcade floor.
//!
//! These are the only functions that change `Console::queue`,
//! `Console::current_users`, `Guest::queue_position` or `Guest::current_console`.
//! Each one updates both sides of the relationship before returning, and any
//! removal renumbers every guest behind the removed slot.

use crate::{ConsoleId, ConsoleState, GameState, GuestId, GuestState};

impl GameState {
    /// Guests still on the floor, departing ones included.
    pub fn active_guest_count(&self) -> usize {
        self.guests.len()
    }

    pub fn total_queued(&self) -> usize {
        self.consoles.values().map(|c| c.queue.len()).sum()
    }

    /// Unknown console ids report an empty queue.
    pub fn queue_length(&self, console_id: ConsoleId) -> usize {
        self.consoles.get(&console_id).map_or(0, |c| c.queue.len())
    }

    /// Peeks the head of a console's queue without removing it.
    pub fn next_in_queue(&self, console_id: ConsoleId) -> Option<GuestId> {
        self.consoles
            .get(&console_id)
            .and_then(|c| c.queue.first().copied())
    }

    /// Appends `guest_id` to the console's queue and moves the guest to
    /// `Waiting`. Returns the assigned position, or `None` when the guest or
    /// console is unknown, the guest is already queued or not seeking, or
    /// the console cannot be used.
    pub fn add_to_queue(&mut self, console_id: ConsoleId, guest_id: GuestId) -> Option<usize> {
        let now = self.meta.now_ms;
        let console = self.consoles.get_mut(&console_id)?;
        let guest = self.guests.get_mut(&guest_id)?;
        if guest.state != GuestState::Seeking || guest.queue_position.is_some() {
            return None;
        }
        if !console.is_usable() {
            return None;
        }
        console.queue.push(guest_id);
        let position = console.queue.len() - 1;
        guest.queue_position = Some(position);
        guest.state = GuestState::Waiting;
        guest.target_console = Some(console_id);
        guest.queued_at_ms = Some(now);
        guest.route.clear();
        Some(position)
    }

    /// Takes a guest out of whatever queue holds it. The guest keeps its
    /// state; callers decide what it becomes next. Returns the console the
    /// guest was queued at.
    pub fn remove_from_queue(&mut self, guest_id: GuestId) -> Option<ConsoleId> {
        let guest = self.guests.get_mut(&guest_id)?;
        guest.queue_position?;
        let console_id = guest.target_console?;
        guest.queue_position = None;
        guest.queued_at_ms = None;

        let console = self.consoles.get_mut(&console_id)?;
        let index = console.queue.iter().position(|id| *id == guest_id)?;
        console.queue.remove(index);
        self.renumber_queue_from(console_id, index);
        Some(console_id)
    }

    /// Moves a guest onto a console slot, leaving any queue it was in.
    /// Returns false when `Guest::can_start_using_console` does not hold.
    pub fn start_using_console(&mut self, guest_id: GuestId, console_id: ConsoleId) -> bool {
        let (Some(guest), Some(console)) =
            (self.guests.get(&guest_id), self.consoles.get(&console_id))
        else {
            return false;
        };
        if !guest.can_start_using_console(console) {
            return false;
        }
        if guest.queue_position.is_some() {
            self.remove_from_queue(guest_id);
        }

        let now = self.meta.now_ms;
        let Some(console) = self.consoles.get_mut(&console_id) else {
            return false;
        };
        console.current_users.push(guest_id);
        console.state = ConsoleState::InUse;

        let Some(guest) = self.guests.get_mut(&guest_id) else {
            return false;
        };
        guest.state = GuestState::Using;
        guest.current_console = Some(console_id);
        guest.target_console = None;
        guest.use_started_ms = Some(now);
        guest.route.clear();
        true
    }

    /// Frees the guest's slot, wears the console and flags it for a
    /// breakdown check. Returns the console that was in use.
    pub fn finish_using_console(&mut self, guest_id: GuestId) -> Option<ConsoleId> {
        let guest = self.guests.get_mut(&guest_id)?;
        let console_id = guest.current_console.take()?;
        guest.use_started_ms = None;

        let console = self.consoles.get_mut(&console_id)?;
        console.current_users.retain(|id| *id != guest_id);
        console.durability = console
            .durability
            .saturating_sub(console.durability_loss_per_use);
        console.total_uses += 1;
        console.breakdown_check_due = true;
        console.sync_usage_state();
        Some(console_id)
    }

    /// Empties a console's queue, returning every member to `Seeking` with a
    /// clean slate of declined consoles.
    pub fn release_queue(&mut self, console_id: ConsoleId) -> Vec<GuestId> {
        let Some(console) = self.consoles.get_mut(&console_id) else {
            return Vec::new();
        };
        let released = std::mem::take(&mut console.queue);
        for guest_id in &released {
            if let Some(guest) = self.guests.get_mut(guest_id) {
                guest.queue_position = None;
                guest.queued_at_ms = None;
                guest.target_console = None;
                guest.declined.clear();
                guest.state = GuestState::Seeking;
            }
        }
        released
    }

    /// Removes every current user from a console. Their state is left to
    /// the caller.
    pub fn eject_users(&mut self, console_id: ConsoleId) -> Vec<GuestId> {
        let Some(console) = self.consoles.get_mut(&console_id) else {
            return Vec::new();
        };
        let ejected: Vec<GuestId> = console.current_users.drain(..).collect();
        console.sync_usage_state();
        for guest_id in &ejected {
            if let Some(guest) = self.guests.get_mut(guest_id) {
                guest.current_console = None;
                guest.use_started_ms = None;
            }
        }
        ejected
    }

    fn renumber_queue_from(&mut self, console_id: ConsoleId, start: usize) {
        let Some(console) = self.consoles.get(&console_id) else {
            return;
        };
        for (index, guest_id) in console.queue.iter().enumerate().skip(start) {
            if let Some(guest) = self.guests.get_mut(guest_id) {
                guest.queue_position = Some(index);
            }
        }
    }
}
