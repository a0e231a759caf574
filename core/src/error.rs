//! Error types for the booking API client.
//!
//! # Design
//! Three failure families reach the user: the network could not be reached
//! (`Transport`), the server refused the request (`Rejected`, `NotFound`,
//! `Unauthorized`, `SeatUnavailable`), or the payload was not what we
//! expected (`MissingBody`, `Deserialization`, `Serialization`). None of them
//! are retried; `user_message` renders the text a screen shows.

use serde_json::Value;
use thiserror::Error;

use crate::types::TripAvailability;

/// Shown when a rejection carries no readable message.
pub const GENERIC_REJECTION: &str = "The request was rejected.";

/// Errors returned by `BookingClient` parse methods and `BookingService`.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("connection error: {0}")]
    Transport(String),

    /// The server answered but refused the operation, either with a 4xx/5xx
    /// status or with `success: false` in the envelope.
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// The bearer token is missing, expired or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The seat was taken by someone else. `availability` holds a fresh
    /// seat map when the service managed to re-fetch one.
    #[error("seat unavailable: {message}")]
    SeatUnavailable {
        message: String,
        availability: Option<Box<TripAvailability>>,
    },

    /// The envelope reported success but carried no body.
    #[error("response body missing")]
    MissingBody,

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Text suitable for a blocking warning.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "Connection error. Please try again.".to_string(),
            ApiError::Rejected { message, .. }
            | ApiError::NotFound(message)
            | ApiError::Unauthorized(message)
            | ApiError::SeatUnavailable { message, .. } => message.clone(),
            ApiError::MissingBody
            | ApiError::Deserialization(_)
            | ApiError::Serialization(_) => "Unexpected response from server.".to_string(),
        }
    }

    pub fn is_seat_unavailable(&self) -> bool {
        matches!(self, ApiError::SeatUnavailable { .. })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `message` first, then the first entry under `errors` (either a
/// validation map of string arrays or a plain array).
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        if !message.trim().is_empty() {
            return Some(message.to_string());
        }
    }

    let first = match value.get("errors")? {
        Value::Object(map) => map.values().next().cloned(),
        Value::Array(items) => items.first().cloned(),
        _ => None,
    }?;
    match first {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
    .filter(|s| !s.trim().is_empty())
}
