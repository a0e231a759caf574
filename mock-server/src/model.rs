//! Wire types for the booking API, as the server sends and accepts them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `{success, message, body}` wrapper every endpoint responds with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub body: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self {
            success: true,
            message: None,
            body: Some(body),
        }
    }
}

// --- auth ---

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub token: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

// --- catalog ---

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub districts: Vec<District>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripView {
    pub id: i64,
    pub origin_city_name: String,
    pub origin_district_name: Option<String>,
    pub destination_city_name: String,
    pub destination_district_name: Option<String>,
    pub departure_date: String,
    pub departure_time: String,
    pub price: f64,
    pub company_name: String,
    pub sold_ticket_count: u32,
    pub bus_plate_number: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub origin_id: i64,
    #[serde(default)]
    pub origin_district_id: Option<i64>,
    pub destination_id: i64,
    #[serde(default)]
    pub destination_district_id: Option<i64>,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub seat_number: u32,
    pub is_available: bool,
    pub status: String,
    pub passenger_name: Option<String>,
    pub reservation_expires_at: Option<String>,
    pub gender: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityView {
    pub trip_id: i64,
    pub total_seats: u32,
    pub available_seats: u32,
    pub occupied_seats: u32,
    pub seats: Vec<SeatView>,
}

// --- passengers ---

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerInput {
    pub first_name: String,
    pub last_name: String,
    pub tc_no: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub gender: u8,
    pub date_of_birth: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub tc_no: String,
    pub email: String,
    pub phone_number: String,
    pub gender: u8,
    pub date_of_birth: String,
}

// --- tickets ---

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    pub id: i64,
    pub seat_number: u32,
    pub price: f64,
    pub is_paid: bool,
    pub is_reserved: bool,
    pub reservation_expires_at: Option<String>,
    pub created_date: String,
    pub trip: TripView,
    pub passenger: Passenger,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveInput {
    pub passenger_id: i64,
    pub seat_number: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteInput {
    pub paid_amount: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInput {
    pub trip_id: i64,
    pub passenger_id: i64,
    pub seat_number: u32,
    pub paid_amount: f64,
}

#[derive(Deserialize)]
pub struct GenderQuery {
    pub gender: u8,
}
