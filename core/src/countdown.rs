//! Pure countdown arithmetic for a reservation hold.
//!
//! Everything here is advisory. The server decides when a hold is gone; the
//! client only mirrors the deadline it was given so a label can count down.

use chrono::{DateTime, Local, NaiveDateTime};
use thiserror::Error;

use crate::types::{Ticket, TicketId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchError {
    /// The ticket is paid, not reserved, or has no deadline.
    #[error("ticket {0} is not a pending reservation")]
    NotPending(TicketId),

    #[error("ticket {ticket_id} has an unreadable expiry {raw:?}")]
    InvalidExpiry { ticket_id: TicketId, raw: String },
}

/// Parse a server-reported `reservationExpiresAt`.
///
/// Accepts ISO-8601 local date-times with or without fractional seconds
/// (the backend emits up to seven digits) and RFC 3339 strings carrying an
/// offset, which are converted to local time.
pub fn parse_expiry(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

/// Render whole seconds as `MM:SS`. Minutes do not roll over into hours.
pub fn format_remaining(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Deadline of one reservation hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    ticket_id: TicketId,
    expires_at: NaiveDateTime,
}

impl Countdown {
    pub fn new(ticket_id: TicketId, expires_at: NaiveDateTime) -> Self {
        Self {
            ticket_id,
            expires_at,
        }
    }

    pub fn for_ticket(ticket: &Ticket) -> Result<Self, WatchError> {
        let raw = match &ticket.reservation_expires_at {
            Some(raw) if ticket.is_reserved && !ticket.is_paid => raw,
            _ => return Err(WatchError::NotPending(ticket.id)),
        };
        parse_expiry(raw)
            .map(|expires_at| Self::new(ticket.id, expires_at))
            .ok_or_else(|| WatchError::InvalidExpiry {
                ticket_id: ticket.id,
                raw: raw.clone(),
            })
    }

    pub fn ticket_id(&self) -> TicketId {
        self.ticket_id
    }

    pub fn expires_at(&self) -> NaiveDateTime {
        self.expires_at
    }

    /// Whole seconds left, truncated toward zero. Negative once past due.
    pub fn remaining_at(&self, now: NaiveDateTime) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        self.remaining_at(now) <= 0
    }

    pub fn display_at(&self, now: NaiveDateTime) -> String {
        format_remaining(self.remaining_at(now))
    }
}

/// Source of "now" for countdowns.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall time captured once, advanced by tokio's monotonic clock.
///
/// Immune to wall-clock jumps while running, and follows tokio's paused
/// time in tests.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall: NaiveDateTime,
    origin: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(wall: NaiveDateTime) -> Self {
        Self {
            wall,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for AnchoredClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Duration::from_std(self.origin.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or(NaiveDateTime::MAX)
    }
}
