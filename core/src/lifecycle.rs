//! Client-side view of the reservation lifecycle.
//!
//! The server owns reservation state. `ReservationTracker` keeps the UI's
//! best guess between calls and is rebuilt from fresh server data by
//! `reconcile` whenever a session resumes. Transition methods return `true`
//! when the state changed.

use chrono::NaiveDateTime;

use crate::countdown::{parse_expiry, Countdown};
use crate::types::{Ticket, TicketId};

/// How a single ticket looks at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Unreserved,
    /// Held, unpaid, deadline still ahead.
    Reserved,
    /// Held and unpaid but past the deadline; the server will reclaim it.
    ExpiredReserved,
    Paid,
}

impl TicketStatus {
    pub fn of(ticket: &Ticket, now: NaiveDateTime) -> Self {
        if ticket.is_paid {
            return TicketStatus::Paid;
        }
        if !ticket.is_reserved {
            return TicketStatus::Unreserved;
        }
        match ticket.reservation_expires_at.as_deref().and_then(parse_expiry) {
            Some(expires_at) if !Countdown::new(ticket.id, expires_at).is_expired_at(now) => {
                TicketStatus::Reserved
            }
            _ => TicketStatus::ExpiredReserved,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ReservationState {
    #[default]
    None,
    /// The user's active hold, as last reported by the server.
    Pending(Ticket),
    Paid(TicketId),
}

impl ReservationState {
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            ReservationState::None => None,
            ReservationState::Pending(ticket) => Some(ticket.id),
            ReservationState::Paid(id) => Some(*id),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReservationTracker {
    state: ReservationState,
}

impl ReservationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReservationState {
        &self.state
    }

    /// The held ticket, when there is one.
    pub fn pending(&self) -> Option<&Ticket> {
        match &self.state {
            ReservationState::Pending(ticket) => Some(ticket),
            _ => None,
        }
    }

    /// A reserve call succeeded.
    pub fn on_reserved(&mut self, ticket: Ticket) -> bool {
        if ticket.is_paid {
            return self.on_paid(&ticket);
        }
        if !ticket.is_reserved {
            return false;
        }
        tracing::info!(ticket_id = %ticket.id, "reservation pending");
        self.set(ReservationState::Pending(ticket))
    }

    /// A purchase or complete-reservation call succeeded.
    pub fn on_paid(&mut self, ticket: &Ticket) -> bool {
        if !ticket.is_paid {
            return false;
        }
        tracing::info!(ticket_id = %ticket.id, "reservation paid");
        self.set(ReservationState::Paid(ticket.id))
    }

    pub fn on_cancelled(&mut self, ticket_id: TicketId) -> bool {
        self.clear_pending(ticket_id)
    }

    /// The local countdown for `ticket_id` fired.
    pub fn on_local_expiry(&mut self, ticket_id: TicketId) -> bool {
        self.clear_pending(ticket_id)
    }

    /// The server refused to act on the hold because it already released
    /// the seat.
    pub fn on_reclaimed(&mut self, ticket_id: TicketId) -> bool {
        let changed = self.clear_pending(ticket_id);
        if changed {
            tracing::info!(%ticket_id, "reservation reclaimed by server");
        }
        changed
    }

    /// Rebuild state from the passenger's tickets as the server lists them.
    ///
    /// Any locally remembered flag is ignored except to prefer the tracked
    /// ticket when several holds are live, and to keep reporting `Paid` for
    /// the ticket we were following.
    pub fn reconcile(&mut self, tickets: &[Ticket], now: NaiveDateTime) -> bool {
        let tracked = self.state.ticket_id();
        let live = |t: &&Ticket| TicketStatus::of(t, now) == TicketStatus::Reserved;

        let next = match tickets
            .iter()
            .filter(live)
            .find(|t| Some(t.id) == tracked)
            .or_else(|| tickets.iter().find(live))
        {
            Some(ticket) => ReservationState::Pending(ticket.clone()),
            None => match tracked {
                Some(id) if tickets.iter().any(|t| t.id == id && t.is_paid) => {
                    ReservationState::Paid(id)
                }
                _ => ReservationState::None,
            },
        };

        if next != self.state {
            tracing::debug!(from = ?self.state.ticket_id(), to = ?next.ticket_id(), "reservation reconciled");
        }
        self.set(next)
    }

    fn clear_pending(&mut self, ticket_id: TicketId) -> bool {
        match &self.state {
            ReservationState::Pending(ticket) if ticket.id == ticket_id => {
                self.set(ReservationState::None)
            }
            _ => false,
        }
    }

    fn set(&mut self, next: ReservationState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }
}
