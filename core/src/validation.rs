//! Passenger form checks and the seat/gender validation gate.
//!
//! The gate sits between "continue" on the passenger form and whatever comes
//! next (reserve or payment). The server decides whether the seat and gender
//! fit together; the gate only makes sure that exactly one response, the one
//! for the latest submission, can move the user forward.

use thiserror::Error;

use crate::error::ApiError;
use crate::types::{CreatePassenger, Gender, TripId};

/// Placeholder birth date sent when the form does not collect one.
pub const DEFAULT_DATE_OF_BIRTH: &str = "1995-01-01T00:00:00";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("first and last name must be at least 2 characters")]
    NameTooShort,
    #[error("TC number must be exactly 11 digits")]
    InvalidTcNo,
    #[error("email is required")]
    MissingEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassengerForm {
    pub first_name: String,
    pub last_name: String,
    pub tc_no: String,
    pub email: String,
    pub phone_number: String,
    pub gender: Gender,
    pub date_of_birth: String,
}

impl PassengerForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.first_name.trim().chars().count() < 2 || self.last_name.trim().chars().count() < 2
        {
            return Err(FormError::NameTooShort);
        }
        let tc = self.tc_no.trim();
        if tc.len() != 11 || !tc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormError::InvalidTcNo);
        }
        if self.email.trim().is_empty() {
            return Err(FormError::MissingEmail);
        }
        Ok(())
    }

    pub fn to_create_passenger(&self) -> CreatePassenger {
        CreatePassenger {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            tc_no: self.tc_no.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            gender: self.gender,
            date_of_birth: self.date_of_birth.clone(),
        }
    }
}

/// One validation request issued by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    id: u64,
    pub trip_id: TripId,
    pub seat_number: u32,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The seat fits; continue with this passenger.
    Proceed(CreatePassenger),
    /// Blocking warning to show as-is. Nothing else changes.
    Warning(String),
    /// Stale or duplicate response.
    Ignored,
}

#[derive(Debug, Default)]
pub struct SeatGate {
    issued: u64,
    outstanding: Option<(u64, CreatePassenger)>,
    proceeded: bool,
}

impl SeatGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the form locally and issue a submission for it. Any earlier
    /// outstanding submission becomes stale, and a gate that already let a
    /// passenger through is re-armed for this one.
    pub fn submit(
        &mut self,
        trip_id: TripId,
        seat_number: u32,
        form: &PassengerForm,
    ) -> Result<Submission, FormError> {
        form.validate()?;
        self.proceeded = false;
        self.issued += 1;
        self.outstanding = Some((self.issued, form.to_create_passenger()));
        Ok(Submission {
            id: self.issued,
            trip_id,
            seat_number,
            gender: form.gender,
        })
    }

    /// Feed back the server's answer for `submission`.
    pub fn resolve(&mut self, submission: &Submission, result: Result<(), ApiError>) -> GateOutcome {
        if self.proceeded {
            return GateOutcome::Ignored;
        }
        let passenger = match self.outstanding.take() {
            Some((id, passenger)) if id == submission.id => passenger,
            other => {
                self.outstanding = other;
                tracing::debug!(submission = submission.id, "stale seat validation response");
                return GateOutcome::Ignored;
            }
        };

        match result {
            Ok(()) => {
                self.proceeded = true;
                GateOutcome::Proceed(passenger)
            }
            Err(err) => {
                tracing::debug!(error = %err, seat = submission.seat_number, "seat validation refused");
                GateOutcome::Warning(err.user_message())
            }
        }
    }

    /// A response is pending; "continue" should stay disabled.
    pub fn is_waiting(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn has_proceeded(&self) -> bool {
        self.proceeded
    }

    /// Re-arm the gate, e.g. when the user comes back to the form.
    pub fn reset(&mut self) {
        self.outstanding = None;
        self.proceeded = false;
    }
}
