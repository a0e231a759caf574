//! Stateless HTTP request builder and response parser for the booking API.
//!
//! # Design
//! `BookingClient` holds only a `base_url`. Each endpoint is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`. Authenticated builders take the caller's
//! `Session` explicitly. Parsers unwrap the `{success, message, body}`
//! envelope and map failures onto `ApiError`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{extract_error_message, ApiError, GENERIC_REJECTION};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::Session;
use crate::types::{
    ApiResponse, City, CompleteReservation, CreatePassenger, Gender, LoginRequest, Passenger,
    PassengerId, PurchaseTicket, RegisterRequest, ReserveTicket, Ticket, TicketId, Trip,
    TripAvailability, TripId, TripSearch, UserData,
};

/// Stateless client for the booking API.
#[derive(Debug, Clone)]
pub struct BookingClient {
    base_url: String,
}

impl BookingClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        session: Option<&Session>,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(session) = session {
            headers.push(session.bearer_header());
        }
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body,
        }
    }

    // --- auth ---

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        Ok(self.request(HttpMethod::Post, "/api/Auth/login", None, Some(body)))
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        Ok(self.request(HttpMethod::Post, "/api/Auth/register", None, Some(body)))
    }

    // --- catalog ---

    pub fn build_list_cities(&self, session: &Session) -> HttpRequest {
        self.request(HttpMethod::Get, "/api/Cities", Some(session), None)
    }

    pub fn build_search_trips(&self, session: &Session, search: &TripSearch) -> HttpRequest {
        let path = format!("/api/Trips/search?{}", search.to_query());
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    pub fn build_list_trips(&self, session: &Session) -> HttpRequest {
        self.request(HttpMethod::Get, "/api/Trips", Some(session), None)
    }

    pub fn build_seat_availability(&self, session: &Session, trip_id: TripId) -> HttpRequest {
        let path = format!("/api/Tickets/trips/{trip_id}/availability");
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    pub fn build_trip_tickets(&self, session: &Session, trip_id: TripId) -> HttpRequest {
        let path = format!("/api/Tickets/trips/{trip_id}");
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    // --- passengers ---

    pub fn build_create_passenger(
        &self,
        session: &Session,
        input: &CreatePassenger,
    ) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        Ok(self.request(HttpMethod::Post, "/api/Passengers", Some(session), Some(body)))
    }

    pub fn build_passenger_by_tc(&self, session: &Session, tc_no: &str) -> HttpRequest {
        let path = format!("/api/Passengers/tc/{}", tc_no.trim());
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    // --- tickets ---

    pub fn build_validate_seat_gender(
        &self,
        session: &Session,
        trip_id: TripId,
        seat_number: u32,
        gender: Gender,
    ) -> HttpRequest {
        let path = format!(
            "/api/Tickets/trips/{trip_id}/seats/{seat_number}/validate-gender?gender={}",
            u8::from(gender)
        );
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    pub fn build_reserve(
        &self,
        session: &Session,
        trip_id: TripId,
        input: &ReserveTicket,
    ) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        let path = format!("/api/Tickets/trips/{trip_id}/reserve");
        Ok(self.request(HttpMethod::Post, &path, Some(session), Some(body)))
    }

    pub fn build_complete_reservation(
        &self,
        session: &Session,
        ticket_id: TicketId,
        input: &CompleteReservation,
    ) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        let path = format!("/api/Tickets/{ticket_id}/complete-reservation");
        Ok(self.request(HttpMethod::Post, &path, Some(session), Some(body)))
    }

    pub fn build_purchase(
        &self,
        session: &Session,
        input: &PurchaseTicket,
    ) -> Result<HttpRequest, ApiError> {
        let body = json_body(input)?;
        let path = format!("/api/Tickets/trips/{}/purchase", input.trip_id);
        Ok(self.request(HttpMethod::Post, &path, Some(session), Some(body)))
    }

    pub fn build_cancel_ticket(&self, session: &Session, ticket_id: TicketId) -> HttpRequest {
        let path = format!("/api/Tickets/{ticket_id}");
        self.request(HttpMethod::Delete, &path, Some(session), None)
    }

    /// Admin only; the server answers 403 for anyone else.
    pub fn build_delete_trip(&self, session: &Session, trip_id: TripId) -> HttpRequest {
        let path = format!("/api/Trips/{trip_id}");
        self.request(HttpMethod::Delete, &path, Some(session), None)
    }

    pub fn build_passenger_tickets(&self, session: &Session, passenger_id: PassengerId) -> HttpRequest {
        let path = format!("/api/Tickets/passengers/{passenger_id}");
        self.request(HttpMethod::Get, &path, Some(session), None)
    }

    // --- parsers ---

    pub fn parse_login(&self, response: HttpResponse) -> Result<UserData, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<UserData, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_list_cities(&self, response: HttpResponse) -> Result<Vec<City>, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_search_trips(&self, response: HttpResponse) -> Result<Vec<Trip>, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_list_trips(&self, response: HttpResponse) -> Result<Vec<Trip>, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_seat_availability(
        &self,
        response: HttpResponse,
    ) -> Result<TripAvailability, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_trip_tickets(&self, response: HttpResponse) -> Result<Vec<Ticket>, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_create_passenger(&self, response: HttpResponse) -> Result<Passenger, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_passenger_by_tc(&self, response: HttpResponse) -> Result<Passenger, ApiError> {
        parse_envelope(response)
    }

    /// `Ok(())` only when the server reports the seat/gender combination as
    /// allowed. A `false` verdict keeps the server's message for the user.
    pub fn parse_validate_seat_gender(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_confirmation(response)
    }

    pub fn parse_reserve(&self, response: HttpResponse) -> Result<Ticket, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_complete_reservation(&self, response: HttpResponse) -> Result<Ticket, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_purchase(&self, response: HttpResponse) -> Result<Ticket, ApiError> {
        parse_envelope(response)
    }

    pub fn parse_cancel_ticket(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_confirmation(response)
    }

    pub fn parse_delete_trip(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_confirmation(response)
    }

    pub fn parse_passenger_tickets(&self, response: HttpResponse) -> Result<Vec<Ticket>, ApiError> {
        parse_envelope(response)
    }
}

fn json_body<T: Serialize>(input: &T) -> Result<String, ApiError> {
    serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message =
        extract_error_message(&response.body).unwrap_or_else(|| GENERIC_REJECTION.to_string());
    Err(match response.status {
        401 | 403 => ApiError::Unauthorized(message),
        404 => ApiError::NotFound(message),
        409 => ApiError::SeatUnavailable {
            message,
            availability: None,
        },
        status => ApiError::Rejected { status, message },
    })
}

fn parse_envelope<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    read_envelope(response)?.body.ok_or(ApiError::MissingBody)
}

/// Status check plus `success` check, leaving the body and message to the
/// caller.
fn read_envelope<T: DeserializeOwned>(response: HttpResponse) -> Result<ApiResponse<T>, ApiError> {
    check_status(&response)?;
    let envelope: ApiResponse<T> = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected {
            status: response.status,
            message: non_blank(envelope.message),
        });
    }
    Ok(envelope)
}

/// Endpoints answering with a bare `bool` body: anything but `true` is a
/// refusal worded by the server when it gave a reason.
fn parse_confirmation(response: HttpResponse) -> Result<(), ApiError> {
    let status = response.status;
    let envelope: ApiResponse<bool> = read_envelope(response)?;
    match envelope.body {
        Some(true) => Ok(()),
        Some(false) => Err(ApiError::Rejected {
            status,
            message: non_blank(envelope.message),
        }),
        None => Err(ApiError::MissingBody),
    }
}

fn non_blank(message: Option<String>) -> String {
    message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_REJECTION.to_string())
}
