//! In-memory booking API.
//!
//! Serves the same routes and envelope as the real backend so the client
//! crate can be exercised end to end. Passenger and ticket routes require a
//! bearer token from `/api/Auth/login` or `/api/Auth/register`; deleting a
//! trip also requires the admin role.

pub mod model;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};

use model::{
    AvailabilityView, City, CompleteInput, Envelope, GenderQuery, LoginInput, Passenger,
    PassengerInput, PurchaseInput, RegisterInput, ReserveInput, SearchQuery, TicketView, TripView,
    UserData,
};
pub use store::{Config, Refusal, Store, ADMIN_EMAIL, ADMIN_PASSWORD};

pub type Db = Arc<RwLock<Store>>;

type Reply<T> = Result<Json<Envelope<T>>, Refusal>;

pub fn app() -> Router {
    app_with(Config::default())
}

pub fn app_with(config: Config) -> Router {
    router(Arc::new(RwLock::new(Store::new(config))))
}

pub fn router(db: Db) -> Router {
    Router::new()
        .route("/api/Auth/login", post(login))
        .route("/api/Auth/register", post(register))
        .route("/api/Cities", get(list_cities))
        .route("/api/Trips", get(list_trips))
        .route("/api/Trips/search", get(search_trips))
        .route("/api/Trips/{trip_id}", delete(delete_trip))
        .route("/api/Passengers", post(create_passenger))
        .route("/api/Passengers/tc/{tc_no}", get(passenger_by_tc))
        .route("/api/Tickets/trips/{trip_id}", get(trip_tickets))
        .route(
            "/api/Tickets/trips/{trip_id}/availability",
            get(seat_availability),
        )
        .route(
            "/api/Tickets/trips/{trip_id}/seats/{seat_number}/validate-gender",
            get(validate_gender),
        )
        .route("/api/Tickets/trips/{trip_id}/reserve", post(reserve))
        .route("/api/Tickets/trips/{trip_id}/purchase", post(purchase))
        .route(
            "/api/Tickets/passengers/{passenger_id}",
            get(passenger_tickets),
        )
        .route("/api/Tickets/{ticket_id}", delete(cancel_ticket))
        .route(
            "/api/Tickets/{ticket_id}/complete-reservation",
            post(complete_reservation),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener, config: Config) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

fn ok<T: Serialize>(body: T) -> Reply<T> {
    Ok(Json(Envelope::ok(body)))
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl IntoResponse for Refusal {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Refusal::Invalid { field, message } => {
                let mut errors = serde_json::Map::new();
                errors.insert(field.to_string(), json!([message]));
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "success": false, "message": null, "errors": errors }),
                )
            }
            Refusal::BadRequest(message) => (StatusCode::BAD_REQUEST, failure(message)),
            Refusal::Unauthorized(message) => (StatusCode::UNAUTHORIZED, failure(message)),
            Refusal::Forbidden(message) => (StatusCode::FORBIDDEN, failure(message)),
            Refusal::NotFound(message) => (StatusCode::NOT_FOUND, failure(message)),
            Refusal::Conflict(message) => (StatusCode::CONFLICT, failure(message)),
        };
        (status, Json(body)).into_response()
    }
}

fn failure(message: String) -> serde_json::Value {
    json!({ "success": false, "message": message, "body": null })
}

/// The authenticated caller's email, taken from the bearer token.
pub struct Caller(pub String);

impl FromRequestParts<Db> for Caller {
    type Rejection = Refusal;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default();
        db.read().await.authenticate(token.trim()).map(Caller)
    }
}

// --- auth ---

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> Reply<UserData> {
    let user = db.write().await.login(&input.email, &input.password)?;
    tracing::info!(email = %user.email, role = %user.role, "login");
    ok(user)
}

async fn register(State(db): State<Db>, Json(input): Json<RegisterInput>) -> Reply<UserData> {
    ok(db.write().await.register(input)?)
}

// --- catalog ---

async fn list_cities(State(db): State<Db>) -> Reply<Vec<City>> {
    ok(db.read().await.cities())
}

async fn list_trips(State(db): State<Db>) -> Reply<Vec<TripView>> {
    ok(db.write().await.trips(now()))
}

async fn search_trips(
    State(db): State<Db>,
    Query(query): Query<SearchQuery>,
) -> Reply<Vec<TripView>> {
    ok(db.write().await.search(&query, now()))
}

async fn delete_trip(
    State(db): State<Db>,
    Caller(email): Caller,
    Path(trip_id): Path<i64>,
) -> Reply<bool> {
    db.write().await.delete_trip(&email, trip_id)?;
    ok(true)
}

// --- passengers ---

async fn create_passenger(
    State(db): State<Db>,
    Caller(email): Caller,
    Json(input): Json<PassengerInput>,
) -> Reply<Passenger> {
    let passenger = db.write().await.upsert_passenger(input)?;
    tracing::info!(passenger_id = passenger.id, by = %email, "passenger saved");
    ok(passenger)
}

async fn passenger_by_tc(
    State(db): State<Db>,
    _caller: Caller,
    Path(tc_no): Path<String>,
) -> Reply<Passenger> {
    ok(db.read().await.passenger_by_tc(&tc_no)?)
}

// --- tickets ---

async fn trip_tickets(
    State(db): State<Db>,
    _caller: Caller,
    Path(trip_id): Path<i64>,
) -> Reply<Vec<TicketView>> {
    ok(db.write().await.trip_tickets(trip_id, now())?)
}

async fn seat_availability(
    State(db): State<Db>,
    _caller: Caller,
    Path(trip_id): Path<i64>,
) -> Reply<AvailabilityView> {
    ok(db.write().await.availability(trip_id, now())?)
}

async fn validate_gender(
    State(db): State<Db>,
    _caller: Caller,
    Path((trip_id, seat_number)): Path<(i64, u32)>,
    Query(query): Query<GenderQuery>,
) -> Reply<bool> {
    db.write()
        .await
        .validate_gender(trip_id, seat_number, query.gender, now())?;
    ok(true)
}

async fn reserve(
    State(db): State<Db>,
    _caller: Caller,
    Path(trip_id): Path<i64>,
    Json(input): Json<ReserveInput>,
) -> Reply<TicketView> {
    ok(db.write().await.reserve(trip_id, input, now())?)
}

async fn purchase(
    State(db): State<Db>,
    _caller: Caller,
    Path(trip_id): Path<i64>,
    Json(input): Json<PurchaseInput>,
) -> Reply<TicketView> {
    ok(db.write().await.purchase(trip_id, input, now())?)
}

async fn complete_reservation(
    State(db): State<Db>,
    _caller: Caller,
    Path(ticket_id): Path<i64>,
    Json(input): Json<CompleteInput>,
) -> Reply<TicketView> {
    ok(db
        .write()
        .await
        .complete_reservation(ticket_id, input, now())?)
}

async fn cancel_ticket(
    State(db): State<Db>,
    _caller: Caller,
    Path(ticket_id): Path<i64>,
) -> Reply<bool> {
    db.write().await.cancel(ticket_id)?;
    ok(true)
}

async fn passenger_tickets(
    State(db): State<Db>,
    _caller: Caller,
    Path(passenger_id): Path<i64>,
) -> Reply<Vec<TicketView>> {
    ok(db.write().await.passenger_tickets(passenger_id, now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_maps_to_status() {
        let cases = [
            (Refusal::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (Refusal::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (Refusal::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Refusal::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Refusal::Conflict("x".into()), StatusCode::CONFLICT),
            (
                Refusal::Invalid {
                    field: "TcNo",
                    message: "x".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (refusal, status) in cases {
            assert_eq!(refusal.into_response().status(), status);
        }
    }

    #[test]
    fn failure_body_carries_message() {
        let body = failure("Seat 4 is no longer available.".into());
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Seat 4 is no longer available.");
        assert!(body["body"].is_null());
    }
}
