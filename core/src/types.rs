//! Domain DTOs for the booking API.
//!
//! # Design
//! These types mirror the backend's JSON schema (camelCase) but are defined
//! independently from the mock-server crate; integration tests catch schema
//! drift between the two. `reservationExpiresAt` stays a raw string on
//! `Ticket` because interpreting it is client-side, advisory work (see
//! `countdown::parse_expiry`).

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Server-assigned trip identifier.
    TripId
);
id_type!(
    /// Server-assigned ticket identifier.
    TicketId
);
id_type!(
    /// Server-assigned passenger identifier.
    PassengerId
);

/// Uniform envelope wrapped around every API response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    // `#[serde(default)]` here would demand `T: Default`.
    pub body: Option<T>,
}

/// Passenger gender, encoded on the wire as `1` (male) or `2` (female).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Gender {
    Male,
    Female,
}

impl From<Gender> for u8 {
    fn from(gender: Gender) -> u8 {
        match gender {
            Gender::Male => 1,
            Gender::Female => 2,
        }
    }
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Gender::Male),
            2 => Ok(Gender::Female),
            other => Err(format!("unknown gender code {other}")),
        }
    }
}

// --- auth ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub token: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
}

// --- locations and trips ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub districts: Option<Vec<District>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub origin_city_name: Option<String>,
    #[serde(default)]
    pub origin_district_name: Option<String>,
    pub destination_city_name: Option<String>,
    #[serde(default)]
    pub destination_district_name: Option<String>,
    pub departure_date: String,
    pub departure_time: Option<String>,
    pub price: f64,
    pub company_name: Option<String>,
    #[serde(default)]
    pub sold_ticket_count: u32,
    pub bus_plate_number: Option<String>,
}

/// Query parameters for `GET /api/Trips/search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSearch {
    pub origin_id: i64,
    pub origin_district_id: Option<i64>,
    pub destination_id: i64,
    pub destination_district_id: Option<i64>,
    pub date: NaiveDate,
}

impl TripSearch {
    pub(crate) fn to_query(&self) -> String {
        let mut query = format!("originId={}", self.origin_id);
        if let Some(district) = self.origin_district_id {
            query.push_str(&format!("&originDistrictId={district}"));
        }
        query.push_str(&format!("&destinationId={}", self.destination_id));
        if let Some(district) = self.destination_district_id {
            query.push_str(&format!("&destinationDistrictId={district}"));
        }
        query.push_str(&format!("&date={}", self.date.format("%Y-%m-%d")));
        query
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailability {
    pub seat_number: u32,
    pub is_available: bool,
    pub status: String,
    pub passenger_name: Option<String>,
    pub reservation_expires_at: Option<String>,
    /// Occupant gender code; `0` for an empty seat.
    #[serde(default)]
    pub gender: u8,
}

impl SeatAvailability {
    pub fn occupant_gender(&self) -> Option<Gender> {
        Gender::try_from(self.gender).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripAvailability {
    pub trip_id: TripId,
    pub total_seats: u32,
    pub available_seats: u32,
    pub occupied_seats: u32,
    pub seats: Vec<SeatAvailability>,
}

impl TripAvailability {
    pub fn seat(&self, seat_number: u32) -> Option<&SeatAvailability> {
        self.seats.iter().find(|s| s.seat_number == seat_number)
    }
}

// --- passengers ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub id: PassengerId,
    pub first_name: String,
    pub last_name: String,
    pub tc_no: String,
    pub email: String,
    pub phone_number: String,
    pub gender: Gender,
    pub date_of_birth: String,
}

/// Request payload for creating a passenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePassenger {
    pub first_name: String,
    pub last_name: String,
    pub tc_no: String,
    pub email: String,
    pub phone_number: String,
    pub gender: Gender,
    pub date_of_birth: String,
}

impl From<&Passenger> for CreatePassenger {
    fn from(p: &Passenger) -> Self {
        Self {
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            tc_no: p.tc_no.clone(),
            email: p.email.clone(),
            phone_number: p.phone_number.clone(),
            gender: p.gender,
            date_of_birth: p.date_of_birth.clone(),
        }
    }
}

// --- tickets ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub seat_number: u32,
    pub price: f64,
    pub is_paid: bool,
    pub is_reserved: bool,
    #[serde(default)]
    pub reservation_expires_at: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub trip: Option<Trip>,
    #[serde(default, deserialize_with = "lenient_passenger")]
    pub passenger: Option<Passenger>,
}

/// An embedded passenger that does not decode (an unknown gender code, say)
/// is dropped instead of failing the whole ticket.
fn lenient_passenger<'de, D>(deserializer: D) -> Result<Option<Passenger>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value) {
        Ok(passenger) => Some(passenger),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable passenger on ticket");
            None
        }
    }))
}

impl Ticket {
    /// Reserved, unpaid and carrying a deadline: the shape a countdown can
    /// be started for. Whether the deadline has passed is not checked here.
    pub fn is_pending_reservation(&self) -> bool {
        self.is_reserved && !self.is_paid && self.reservation_expires_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveTicket {
    pub passenger_id: PassengerId,
    pub seat_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteReservation {
    pub paid_amount: f64,
}

/// Request payload for buying a seat outright, without a hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicket {
    pub trip_id: TripId,
    pub passenger_id: PassengerId,
    pub seat_number: u32,
    pub paid_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_uses_integer_codes() {
        assert_eq!(serde_json::to_value(Gender::Male).unwrap(), 1);
        assert_eq!(serde_json::to_value(Gender::Female).unwrap(), 2);
        let g: Gender = serde_json::from_str("2").unwrap();
        assert_eq!(g, Gender::Female);
        assert!(serde_json::from_str::<Gender>("0").is_err());
    }

    #[test]
    fn ticket_accepts_missing_optional_fields() {
        let json = r#"{"id":7,"seatNumber":12,"price":450.0,"isPaid":false,"isReserved":true}"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.id, TicketId(7));
        assert!(ticket.reservation_expires_at.is_none());
        assert!(ticket.trip.is_none());
        assert!(!ticket.is_pending_reservation());
    }

    #[test]
    fn pending_reservation_requires_deadline_and_no_payment() {
        let json = r#"{"id":7,"seatNumber":12,"price":450.0,"isPaid":false,"isReserved":true,
            "reservationExpiresAt":"2030-01-01T10:00:00"}"#;
        let mut ticket: Ticket = serde_json::from_str(json).unwrap();
        assert!(ticket.is_pending_reservation());
        ticket.is_paid = true;
        assert!(!ticket.is_pending_reservation());
    }

    #[test]
    fn ticket_survives_unreadable_passenger() {
        let json = r#"{"id":7,"seatNumber":12,"price":450.0,"isPaid":true,"isReserved":false,
            "passenger":{"id":3,"firstName":"Ali","lastName":"Can","tcNo":"1","email":"a@b.c",
            "phoneNumber":"5","gender":0,"dateOfBirth":"1990-01-01T00:00:00"}}"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.id, TicketId(7));
        assert!(ticket.passenger.is_none());

        let json = json.replace(r#""gender":0"#, r#""gender":1"#);
        let ticket: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(ticket.passenger.map(|p| p.gender), Some(Gender::Male));
    }

    #[test]
    fn envelope_without_body_parses() {
        let env: ApiResponse<Ticket> =
            serde_json::from_str(r#"{"success":false,"message":"Seat taken"}"#).unwrap();
        assert!(!env.success);
        assert_eq!(env.message.as_deref(), Some("Seat taken"));
        assert!(env.body.is_none());
    }

    #[test]
    fn reserve_payload_is_camel_case() {
        let body = serde_json::to_value(ReserveTicket {
            passenger_id: PassengerId(3),
            seat_number: 14,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"passengerId": 3, "seatNumber": 14}));
    }

    #[test]
    fn trip_search_query_skips_missing_districts() {
        let search = TripSearch {
            origin_id: 34,
            origin_district_id: None,
            destination_id: 6,
            destination_district_id: Some(61),
            date: NaiveDate::from_ymd_opt(2025, 12, 12).unwrap(),
        };
        assert_eq!(
            search.to_query(),
            "originId=34&destinationId=6&destinationDistrictId=61&date=2025-12-12"
        );
    }
}
