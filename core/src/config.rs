//! Client configuration loaded from environment variables with defaults.

use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5281";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root URL of the booking API (`BOOKING_API_URL`).
    pub base_url: String,
    /// Countdown cadence (`BOOKING_TICK_MILLIS`), see `ReservationWatcher::from_config`.
    pub tick: Duration,
    /// Per-request timeout (`BOOKING_TIMEOUT_SECS`).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tick: Duration::from_secs(1),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            base_url: lookup("BOOKING_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            tick: number("BOOKING_TICK_MILLIS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick),
            request_timeout: number("BOOKING_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
