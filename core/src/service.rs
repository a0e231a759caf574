//! Booking workflows that span more than one API call.
//!
//! # Design
//! `BookingService` pairs a `BookingClient` with a `Transport`. It holds no
//! session state of its own: every call takes the caller's `Session`, and the
//! reservation tracker is passed in when a call needs to update it. Nothing is
//! retried. A seat conflict from any booking call re-fetches the seat map so
//! the caller can redraw it instead of trying again blindly; on payment it
//! also drops the tracked hold, since the server has already released it.

use chrono::NaiveDateTime;

use crate::client::BookingClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::lifecycle::{ReservationState, ReservationTracker};
use crate::session::Session;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    City, CompleteReservation, CreatePassenger, LoginRequest, Passenger, PassengerId,
    PurchaseTicket, RegisterRequest, ReserveTicket, Ticket, TicketId, Trip, TripAvailability,
    TripId, TripSearch, UserData,
};
use crate::validation::Submission;

pub struct BookingService<T> {
    client: BookingClient,
    transport: T,
}

impl BookingService<ReqwestTransport> {
    /// Service over reqwest with the configured base URL and timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::new(BookingClient::new(&config.base_url), transport))
    }
}

impl<T: Transport> BookingService<T> {
    pub fn new(client: BookingClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &BookingClient {
        &self.client
    }

    async fn call<R>(
        &self,
        request: HttpRequest,
        parse: impl FnOnce(&BookingClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let method = request.method.as_str();
        let path = request.path.clone();
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(method, %path, error = %err, "booking api unreachable");
                return Err(err);
            }
        };
        tracing::debug!(method, %path, status = response.status, "booking api call");
        parse(&self.client, response)
    }

    // --- auth ---

    /// Log in and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = self.client.build_login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let user = self.call(request, BookingClient::parse_login).await?;
        let session = Session::from_login(user);
        tracing::info!(email = %session.email(), role = ?session.role(), "logged in");
        Ok(session)
    }

    pub async fn register(&self, input: &RegisterRequest) -> Result<UserData, ApiError> {
        let request = self.client.build_register(input)?;
        self.call(request, BookingClient::parse_register).await
    }

    // --- catalog ---

    pub async fn cities(&self, session: &Session) -> Result<Vec<City>, ApiError> {
        let request = self.client.build_list_cities(session);
        self.call(request, BookingClient::parse_list_cities).await
    }

    pub async fn search_trips(
        &self,
        session: &Session,
        search: &TripSearch,
    ) -> Result<Vec<Trip>, ApiError> {
        let request = self.client.build_search_trips(session, search);
        self.call(request, BookingClient::parse_search_trips).await
    }

    pub async fn all_trips(&self, session: &Session) -> Result<Vec<Trip>, ApiError> {
        let request = self.client.build_list_trips(session);
        self.call(request, BookingClient::parse_list_trips).await
    }

    pub async fn seat_map(
        &self,
        session: &Session,
        trip_id: TripId,
    ) -> Result<TripAvailability, ApiError> {
        let request = self.client.build_seat_availability(session, trip_id);
        let mut availability = self
            .call(request, BookingClient::parse_seat_availability)
            .await?;
        availability.seats.sort_by_key(|s| s.seat_number);
        Ok(availability)
    }

    /// Tickets on a trip as the server lists them, ordered by seat.
    pub async fn trip_tickets(
        &self,
        session: &Session,
        trip_id: TripId,
    ) -> Result<Vec<Ticket>, ApiError> {
        let request = self.client.build_trip_tickets(session, trip_id);
        let mut tickets = self.call(request, BookingClient::parse_trip_tickets).await?;
        tickets.sort_by_key(|t| t.seat_number);
        Ok(tickets)
    }

    // --- passengers ---

    pub async fn passenger_by_tc(&self, session: &Session, tc_no: &str) -> Result<Passenger, ApiError> {
        let request = self.client.build_passenger_by_tc(session, tc_no);
        self.call(request, BookingClient::parse_passenger_by_tc).await
    }

    async fn create_passenger(
        &self,
        session: &mut Session,
        input: &CreatePassenger,
    ) -> Result<Passenger, ApiError> {
        let request = self.client.build_create_passenger(session, input)?;
        let passenger = self
            .call(request, BookingClient::parse_create_passenger)
            .await?;
        session.remember_passenger(passenger.id);
        Ok(passenger)
    }

    // --- tickets ---

    /// Ask the server whether the submitted seat/gender pair is allowed.
    pub async fn validate_seat(
        &self,
        session: &Session,
        submission: &Submission,
    ) -> Result<(), ApiError> {
        let request = self.client.build_validate_seat_gender(
            session,
            submission.trip_id,
            submission.seat_number,
            submission.gender,
        );
        self.call(request, BookingClient::parse_validate_seat_gender)
            .await
    }

    /// Create the passenger, then hold the seat for them.
    pub async fn reserve(
        &self,
        session: &mut Session,
        trip_id: TripId,
        seat_number: u32,
        passenger: &CreatePassenger,
        tracker: &mut ReservationTracker,
    ) -> Result<Ticket, ApiError> {
        let passenger = self.create_passenger(session, passenger).await?;
        let request = self.client.build_reserve(
            session,
            trip_id,
            &ReserveTicket {
                passenger_id: passenger.id,
                seat_number,
            },
        )?;
        let ticket = match self.call(request, BookingClient::parse_reserve).await {
            Ok(ticket) => ticket,
            Err(err) => return Err(self.with_seat_map(session, trip_id, err).await),
        };
        tracker.on_reserved(ticket.clone());
        Ok(ticket)
    }

    /// Pay for an existing hold.
    ///
    /// A seat conflict here means the hold was reclaimed: the tracker lets go
    /// of it, and the error carries a fresh seat map when the tracked ticket
    /// names its trip.
    pub async fn complete_reservation(
        &self,
        session: &Session,
        ticket_id: TicketId,
        paid_amount: f64,
        tracker: &mut ReservationTracker,
    ) -> Result<Ticket, ApiError> {
        let request = self.client.build_complete_reservation(
            session,
            ticket_id,
            &CompleteReservation { paid_amount },
        )?;
        let ticket = match self
            .call(request, BookingClient::parse_complete_reservation)
            .await
        {
            Ok(ticket) => ticket,
            Err(err) if err.is_seat_unavailable() => {
                let trip_id = tracker
                    .pending()
                    .filter(|t| t.id == ticket_id)
                    .and_then(|t| t.trip.as_ref())
                    .map(|trip| trip.id);
                tracker.on_reclaimed(ticket_id);
                return Err(match trip_id {
                    Some(trip_id) => self.with_seat_map(session, trip_id, err).await,
                    None => err,
                });
            }
            Err(err) => return Err(err),
        };
        tracker.on_paid(&ticket);
        Ok(ticket)
    }

    /// Create the passenger, then buy the seat outright.
    pub async fn purchase(
        &self,
        session: &mut Session,
        trip_id: TripId,
        seat_number: u32,
        passenger: &CreatePassenger,
        paid_amount: f64,
        tracker: &mut ReservationTracker,
    ) -> Result<Ticket, ApiError> {
        let passenger = self.create_passenger(session, passenger).await?;
        let request = self.client.build_purchase(
            session,
            &PurchaseTicket {
                trip_id,
                passenger_id: passenger.id,
                seat_number,
                paid_amount,
            },
        )?;
        let ticket = match self.call(request, BookingClient::parse_purchase).await {
            Ok(ticket) => ticket,
            Err(err) => return Err(self.with_seat_map(session, trip_id, err).await),
        };
        tracker.on_paid(&ticket);
        Ok(ticket)
    }

    pub async fn cancel(
        &self,
        session: &Session,
        ticket_id: TicketId,
        tracker: &mut ReservationTracker,
    ) -> Result<(), ApiError> {
        let request = self.client.build_cancel_ticket(session, ticket_id);
        self.call(request, BookingClient::parse_cancel_ticket).await?;
        tracker.on_cancelled(ticket_id);
        tracing::info!(%ticket_id, "ticket cancelled");
        Ok(())
    }

    // --- admin ---

    /// Remove a trip and every ticket sold on it. Admin sessions only.
    pub async fn delete_trip(&self, session: &Session, trip_id: TripId) -> Result<(), ApiError> {
        let request = self.client.build_delete_trip(session, trip_id);
        self.call(request, BookingClient::parse_delete_trip).await?;
        tracing::info!(%trip_id, "trip deleted");
        Ok(())
    }

    pub async fn passenger_tickets(
        &self,
        session: &Session,
        passenger_id: PassengerId,
    ) -> Result<Vec<Ticket>, ApiError> {
        let request = self.client.build_passenger_tickets(session, passenger_id);
        self.call(request, BookingClient::parse_passenger_tickets)
            .await
    }

    /// Paid or held tickets for the passenger with this TC number.
    pub async fn tickets_by_tc(&self, session: &Session, tc_no: &str) -> Result<Vec<Ticket>, ApiError> {
        let passenger = self.passenger_by_tc(session, tc_no).await?;
        let tickets = self.passenger_tickets(session, passenger.id).await?;
        Ok(tickets
            .into_iter()
            .filter(|t| t.is_paid || t.is_reserved)
            .collect())
    }

    /// Session resume: rebuild the tracker from the server's ticket list.
    ///
    /// On failure the tracker is left untouched.
    pub async fn refresh_reservation<'a>(
        &self,
        session: &Session,
        tracker: &'a mut ReservationTracker,
        now: NaiveDateTime,
    ) -> Result<&'a ReservationState, ApiError> {
        let tickets = match session.passenger_id() {
            Some(passenger_id) => self.passenger_tickets(session, passenger_id).await?,
            None => Vec::new(),
        };
        tracker.reconcile(&tickets, now);
        Ok(tracker.state())
    }

    async fn with_seat_map(&self, session: &Session, trip_id: TripId, err: ApiError) -> ApiError {
        match err {
            ApiError::SeatUnavailable { message, .. } => {
                tracing::info!(%trip_id, %message, "seat taken, refreshing seat map");
                let availability = self.seat_map(session, trip_id).await.ok().map(Box::new);
                ApiError::SeatUnavailable {
                    message,
                    availability,
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::types::Gender;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the requests it saw.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, body: &str) -> Self {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(ApiError::Transport(message.to_string())));
            self
        }

        fn paths(&self) -> Vec<(HttpMethod, String)> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.method, r.path.clone()))
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.seen.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("no scripted response".into())))
        }
    }

    fn service(transport: ScriptedTransport) -> BookingService<ScriptedTransport> {
        BookingService::new(BookingClient::new("http://api"), transport)
    }

    fn session() -> Session {
        Session::from_login(UserData {
            token: "t".into(),
            email: "u@example.com".into(),
            first_name: None,
            last_name: None,
            role: "User".into(),
        })
    }

    fn passenger_input() -> CreatePassenger {
        CreatePassenger {
            first_name: "Zeynep".into(),
            last_name: "Aydin".into(),
            tc_no: "12345678901".into(),
            email: "z@example.com".into(),
            phone_number: "555".into(),
            gender: Gender::Female,
            date_of_birth: "1995-01-01T00:00:00".into(),
        }
    }

    const PASSENGER: &str = r#"{"success":true,"message":null,"body":{"id":21,"firstName":"Zeynep",
        "lastName":"Aydin","tcNo":"12345678901","email":"z@example.com","phoneNumber":"555",
        "gender":2,"dateOfBirth":"1995-01-01T00:00:00"}}"#;

    #[tokio::test]
    async fn reserve_creates_passenger_then_holds_seat() {
        let transport = ScriptedTransport::default().reply(200, PASSENGER).reply(
            200,
            r#"{"success":true,"message":null,"body":{"id":5,"seatNumber":9,"price":300.0,
                "isPaid":false,"isReserved":true,"reservationExpiresAt":"2099-01-01T00:00:00"}}"#,
        );
        let svc = service(transport);
        let mut session = session();
        let mut tracker = ReservationTracker::new();

        let ticket = svc
            .reserve(&mut session, TripId(3), 9, &passenger_input(), &mut tracker)
            .await
            .unwrap();

        assert_eq!(ticket.id, TicketId(5));
        assert_eq!(session.passenger_id(), Some(PassengerId(21)));
        assert_eq!(tracker.pending().map(|t| t.id), Some(TicketId(5)));
        assert_eq!(
            svc.transport.paths(),
            vec![
                (HttpMethod::Post, "http://api/api/Passengers".to_string()),
                (HttpMethod::Post, "http://api/api/Tickets/trips/3/reserve".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn seat_conflict_refreshes_seat_map() {
        let transport = ScriptedTransport::default()
            .reply(200, PASSENGER)
            .reply(409, r#"{"success":false,"message":"Seat 9 is no longer available."}"#)
            .reply(
                200,
                r#"{"success":true,"message":null,"body":{"tripId":3,"totalSeats":2,"availableSeats":1,
                    "occupiedSeats":1,"seats":[
                    {"seatNumber":2,"isAvailable":true,"status":"Available","passengerName":null,"reservationExpiresAt":null,"gender":0},
                    {"seatNumber":1,"isAvailable":false,"status":"Sold","passengerName":"A B","reservationExpiresAt":null,"gender":1}]}}"#,
            );
        let svc = service(transport);
        let mut session = session();
        let mut tracker = ReservationTracker::new();

        let err = svc
            .purchase(&mut session, TripId(3), 9, &passenger_input(), 300.0, &mut tracker)
            .await
            .unwrap_err();

        match err {
            ApiError::SeatUnavailable {
                message,
                availability: Some(map),
            } => {
                assert_eq!(message, "Seat 9 is no longer available.");
                assert_eq!(map.seats[0].seat_number, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tracker.state(), &ReservationState::None);
        assert_eq!(svc.transport.paths().len(), 3);
    }

    #[tokio::test]
    async fn transport_failure_leaves_tracker_alone() {
        let svc = service(ScriptedTransport::default().fail("connection refused"));
        let mut session = session();
        session.remember_passenger(PassengerId(21));
        let mut tracker = ReservationTracker::new();
        tracker.on_reserved(Ticket {
            id: TicketId(5),
            seat_number: 9,
            price: 300.0,
            is_paid: false,
            is_reserved: true,
            reservation_expires_at: Some("2099-01-01T00:00:00".into()),
            created_date: None,
            trip: None,
            passenger: None,
        });

        let now = chrono::Local::now().naive_local();
        let err = svc
            .refresh_reservation(&session, &mut tracker, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(tracker.pending().is_some());
    }

    #[tokio::test]
    async fn refresh_without_passenger_clears_state() {
        let svc = service(ScriptedTransport::default());
        let mut tracker = ReservationTracker::new();
        let now = chrono::Local::now().naive_local();

        let state = svc
            .refresh_reservation(&session(), &mut tracker, now)
            .await
            .unwrap();
        assert_eq!(state, &ReservationState::None);
        assert!(svc.transport.paths().is_empty());
    }

    #[tokio::test]
    async fn tickets_by_tc_filters_dead_tickets() {
        let transport = ScriptedTransport::default().reply(200, PASSENGER).reply(
            200,
            r#"{"success":true,"message":null,"body":[
                {"id":1,"seatNumber":1,"price":300.0,"isPaid":true,"isReserved":false},
                {"id":2,"seatNumber":2,"price":300.0,"isPaid":false,"isReserved":false},
                {"id":3,"seatNumber":3,"price":300.0,"isPaid":false,"isReserved":true,"reservationExpiresAt":"2099-01-01T00:00:00"}]}"#,
        );
        let svc = service(transport);

        let tickets = svc.tickets_by_tc(&session(), "12345678901").await.unwrap();
        let ids: Vec<_> = tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TicketId(1), TicketId(3)]);
    }

    const SEAT_MAP: &str = r#"{"success":true,"message":null,"body":{"tripId":3,"totalSeats":2,
        "availableSeats":2,"occupiedSeats":0,"seats":[
        {"seatNumber":1,"isAvailable":true,"status":"Available","passengerName":null,"reservationExpiresAt":null,"gender":0},
        {"seatNumber":2,"isAvailable":true,"status":"Available","passengerName":null,"reservationExpiresAt":null,"gender":0}]}}"#;

    fn held_ticket(trip: Option<Trip>) -> Ticket {
        Ticket {
            id: TicketId(5),
            seat_number: 2,
            price: 300.0,
            is_paid: false,
            is_reserved: true,
            reservation_expires_at: Some("2099-01-01T00:00:00".into()),
            created_date: None,
            trip,
            passenger: None,
        }
    }

    fn trip() -> Trip {
        serde_json::from_str(
            r#"{"id":3,"originCityName":"Istanbul","destinationCityName":"Izmir",
                "departureDate":"2099-01-01","price":300.0,"soldTicketCount":1}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reclaimed_hold_on_payment_clears_tracker_and_refreshes_map() {
        let transport = ScriptedTransport::default()
            .reply(409, r#"{"success":false,"message":"Reservation 5 has expired."}"#)
            .reply(200, SEAT_MAP);
        let svc = service(transport);
        let mut tracker = ReservationTracker::new();
        tracker.on_reserved(held_ticket(Some(trip())));

        let err = svc
            .complete_reservation(&session(), TicketId(5), 300.0, &mut tracker)
            .await
            .unwrap_err();

        match err {
            ApiError::SeatUnavailable {
                message,
                availability: Some(map),
            } => {
                assert_eq!(message, "Reservation 5 has expired.");
                assert!(map.seat(2).unwrap().is_available);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tracker.state(), &ReservationState::None);
        assert_eq!(
            svc.transport.paths(),
            vec![
                (HttpMethod::Post, "http://api/api/Tickets/5/complete-reservation".to_string()),
                (HttpMethod::Get, "http://api/api/Tickets/trips/3/availability".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn reclaimed_hold_without_trip_skips_the_map() {
        let transport = ScriptedTransport::default()
            .reply(409, r#"{"success":false,"message":"Reservation 5 has expired."}"#);
        let svc = service(transport);
        let mut tracker = ReservationTracker::new();
        tracker.on_reserved(held_ticket(None));

        let err = svc
            .complete_reservation(&session(), TicketId(5), 300.0, &mut tracker)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ApiError::SeatUnavailable {
                message: "Reservation 5 has expired.".to_string(),
                availability: None,
            }
        );
        assert_eq!(tracker.state(), &ReservationState::None);
        assert_eq!(svc.transport.paths().len(), 1);
    }

    #[tokio::test]
    async fn other_payment_failures_keep_the_hold() {
        let transport = ScriptedTransport::default()
            .reply(400, r#"{"success":false,"message":"Paid amount does not match."}"#);
        let svc = service(transport);
        let mut tracker = ReservationTracker::new();
        tracker.on_reserved(held_ticket(Some(trip())));

        let err = svc
            .complete_reservation(&session(), TicketId(5), 1.0, &mut tracker)
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Paid amount does not match.");
        assert_eq!(tracker.pending().map(|t| t.id), Some(TicketId(5)));
    }

    #[tokio::test]
    async fn delete_trip_sends_delete_and_surfaces_refusal() {
        let transport = ScriptedTransport::default()
            .reply(200, r#"{"success":true,"message":"Trip deleted.","body":true}"#)
            .reply(403, r#"{"success":false,"message":"Only administrators can delete trips."}"#);
        let svc = service(transport);

        svc.delete_trip(&session(), TripId(3)).await.unwrap();
        let err = svc.delete_trip(&session(), TripId(3)).await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(
            svc.transport.paths(),
            vec![
                (HttpMethod::Delete, "http://api/api/Trips/3".to_string()),
                (HttpMethod::Delete, "http://api/api/Trips/3".to_string()),
            ]
        );
    }
}
