//! In-memory state and the booking rules the server enforces.
//!
//! Every operation that looks at tickets first reclaims holds whose deadline
//! has passed, so an expired hold is never reported as reserved and never
//! blocks its seat.

use std::collections::HashMap;
use std::env;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::model::{
    AvailabilityView, City, CompleteInput, District, Passenger, PassengerInput, PurchaseInput,
    RegisterInput, ReserveInput, SearchQuery, SeatView, TicketView, TripView, UserData,
};

/// Local date-time format used for every timestamp on the wire.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const ADMIN_EMAIL: &str = "admin@busbook.local";
pub const ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Clone)]
pub struct Config {
    /// How long a reservation holds its seat.
    pub hold: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hold: Duration::minutes(15),
        }
    }
}

impl Config {
    /// Reads `HOLD_SECONDS`; anything unparseable keeps the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hold: env::var("HOLD_SECONDS")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|secs| *secs >= 0)
                .map(Duration::seconds)
                .unwrap_or(defaults.hold),
        }
    }
}

/// Why a request was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    BadRequest(String),
    /// Field validation failure, reported under `errors`.
    Invalid { field: &'static str, message: String },
    Unauthorized(String),
    /// Authenticated, but the role does not allow it.
    Forbidden(String),
    NotFound(String),
    Conflict(String),
}

struct User {
    password: String,
    first_name: String,
    last_name: String,
    role: &'static str,
}

struct Trip {
    id: i64,
    origin: (i64, Option<i64>),
    destination: (i64, Option<i64>),
    departure: NaiveDateTime,
    price: f64,
    company_name: String,
    bus_plate_number: String,
    total_seats: u32,
}

struct Ticket {
    id: i64,
    trip_id: i64,
    passenger_id: i64,
    seat_number: u32,
    price: f64,
    is_paid: bool,
    is_reserved: bool,
    expires_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl Ticket {
    fn holds_seat(&self) -> bool {
        self.is_paid || self.is_reserved
    }
}

pub struct Store {
    config: Config,
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    cities: Vec<City>,
    trips: Vec<Trip>,
    passengers: Vec<Passenger>,
    tickets: Vec<Ticket>,
    next_passenger_id: i64,
    next_ticket_id: i64,
}

fn stamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

impl Store {
    /// Seeded store with trips departing tomorrow.
    pub fn new(config: Config) -> Self {
        let tomorrow = Local::now().date_naive() + Duration::days(1);
        Self::seeded(config, tomorrow)
    }

    /// Seeded store with every trip departing on `date`.
    pub fn seeded(config: Config, date: NaiveDate) -> Self {
        let mut users = HashMap::new();
        users.insert(
            ADMIN_EMAIL.to_string(),
            User {
                password: ADMIN_PASSWORD.to_string(),
                first_name: "System".to_string(),
                last_name: "Admin".to_string(),
                role: "Admin",
            },
        );

        let district = |id: i64, name: &str| District {
            id,
            name: name.to_string(),
        };
        let cities = vec![
            City {
                id: 6,
                name: "Ankara".to_string(),
                districts: vec![district(601, "Cankaya"), district(602, "Kecioren")],
            },
            City {
                id: 34,
                name: "Istanbul".to_string(),
                districts: vec![district(3401, "Kadikoy"), district(3402, "Esenler")],
            },
            City {
                id: 35,
                name: "Izmir".to_string(),
                districts: vec![district(3501, "Konak")],
            },
        ];

        let at = |hour: u32, minute: u32| {
            date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
        };
        let trips = vec![
            Trip {
                id: 1,
                origin: (34, Some(3402)),
                destination: (6, Some(601)),
                departure: at(9, 30),
                price: 450.0,
                company_name: "Anadolu Ekspres".to_string(),
                bus_plate_number: "34 ABC 123".to_string(),
                total_seats: 40,
            },
            Trip {
                id: 2,
                origin: (6, Some(601)),
                destination: (34, Some(3401)),
                departure: at(14, 0),
                price: 475.0,
                company_name: "Anadolu Ekspres".to_string(),
                bus_plate_number: "06 DEF 456".to_string(),
                total_seats: 40,
            },
            Trip {
                id: 3,
                origin: (34, None),
                destination: (35, Some(3501)),
                departure: at(22, 15),
                price: 520.0,
                company_name: "Ege Turizm".to_string(),
                bus_plate_number: "35 EGE 35".to_string(),
                total_seats: 30,
            },
        ];

        Self {
            config,
            users,
            tokens: HashMap::new(),
            cities,
            trips,
            passengers: Vec::new(),
            tickets: Vec::new(),
            next_passenger_id: 1,
            next_ticket_id: 1,
        }
    }

    // --- auth ---

    pub fn login(&mut self, email: &str, password: &str) -> Result<UserData, Refusal> {
        let email = email.trim().to_lowercase();
        let valid = self
            .users
            .get(&email)
            .is_some_and(|user| user.password == password);
        if !valid {
            return Err(Refusal::Unauthorized("Invalid email or password.".to_string()));
        }
        Ok(self.issue_token(&email))
    }

    pub fn register(&mut self, input: RegisterInput) -> Result<UserData, Refusal> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Refusal::Invalid {
                field: "Email",
                message: "Email is required.".to_string(),
            });
        }
        if input.password.chars().count() < 6 {
            return Err(Refusal::Invalid {
                field: "Password",
                message: "Password must be at least 6 characters.".to_string(),
            });
        }
        if self.users.contains_key(&email) {
            return Err(Refusal::BadRequest(format!(
                "{email} is already registered."
            )));
        }
        self.users.insert(
            email.clone(),
            User {
                password: input.password,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                role: "User",
            },
        );
        tracing::info!(%email, "user registered");
        Ok(self.issue_token(&email))
    }

    fn issue_token(&mut self, email: &str) -> UserData {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), email.to_string());
        let (first_name, last_name, role) = match self.users.get(email) {
            Some(user) => (user.first_name.clone(), user.last_name.clone(), user.role),
            None => (String::new(), String::new(), "User"),
        };
        UserData {
            token,
            email: email.to_string(),
            first_name,
            last_name,
            role: role.to_string(),
        }
    }

    /// The email the bearer token belongs to.
    pub fn authenticate(&self, token: &str) -> Result<String, Refusal> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Refusal::Unauthorized("Authentication required.".to_string()))
    }

    // --- catalog ---

    pub fn cities(&self) -> Vec<City> {
        self.cities.clone()
    }

    pub fn trips(&mut self, now: NaiveDateTime) -> Vec<TripView> {
        self.reclaim_expired(now);
        self.trips.iter().map(|t| self.trip_view(t)).collect()
    }

    pub fn search(&mut self, query: &SearchQuery, now: NaiveDateTime) -> Vec<TripView> {
        self.reclaim_expired(now);
        let on_route = |(city, district): (i64, Option<i64>), want: i64, want_district: Option<i64>| {
            city == want && want_district.is_none_or(|d| district == Some(d))
        };
        self.trips
            .iter()
            .filter(|t| on_route(t.origin, query.origin_id, query.origin_district_id))
            .filter(|t| {
                on_route(
                    t.destination,
                    query.destination_id,
                    query.destination_district_id,
                )
            })
            .filter(|t| t.departure.date() == query.date)
            .map(|t| self.trip_view(t))
            .collect()
    }

    pub fn availability(
        &mut self,
        trip_id: i64,
        now: NaiveDateTime,
    ) -> Result<AvailabilityView, Refusal> {
        self.reclaim_expired(now);
        let trip = self.trip(trip_id)?;
        let seats: Vec<SeatView> = (1..=trip.total_seats)
            .map(|seat_number| match self.occupant(trip_id, seat_number) {
                Some(ticket) => {
                    let passenger = self.passenger(ticket.passenger_id);
                    SeatView {
                        seat_number,
                        is_available: false,
                        status: if ticket.is_paid { "Sold" } else { "Reserved" }.to_string(),
                        passenger_name: passenger
                            .map(|p| format!("{} {}", p.first_name, p.last_name)),
                        reservation_expires_at: ticket
                            .expires_at
                            .filter(|_| !ticket.is_paid)
                            .map(stamp),
                        gender: passenger.map_or(0, |p| p.gender),
                    }
                }
                None => SeatView {
                    seat_number,
                    is_available: true,
                    status: "Available".to_string(),
                    passenger_name: None,
                    reservation_expires_at: None,
                    gender: 0,
                },
            })
            .collect();
        let occupied_seats = seats.iter().filter(|s| !s.is_available).count() as u32;
        Ok(AvailabilityView {
            trip_id,
            total_seats: trip.total_seats,
            available_seats: trip.total_seats - occupied_seats,
            occupied_seats,
            seats,
        })
    }

    pub fn trip_tickets(
        &mut self,
        trip_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<TicketView>, Refusal> {
        self.reclaim_expired(now);
        self.trip(trip_id)?;
        Ok(self
            .tickets
            .iter()
            .filter(|t| t.trip_id == trip_id)
            .filter_map(|t| self.ticket_view(t))
            .collect())
    }

    // --- passengers ---

    /// Create a passenger, or update the one already on file for the TC
    /// number.
    pub fn upsert_passenger(&mut self, input: PassengerInput) -> Result<Passenger, Refusal> {
        let tc_no = input.tc_no.trim().to_string();
        if tc_no.len() != 11 || !tc_no.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Refusal::Invalid {
                field: "TcNo",
                message: "TC number must be exactly 11 digits.".to_string(),
            });
        }
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(Refusal::Invalid {
                field: "FirstName",
                message: "First and last name are required.".to_string(),
            });
        }
        check_gender(input.gender)?;

        let id = match self.passengers.iter().find(|p| p.tc_no == tc_no) {
            Some(existing) => existing.id,
            None => {
                let id = self.next_passenger_id;
                self.next_passenger_id += 1;
                id
            }
        };
        let passenger = Passenger {
            id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            tc_no,
            email: input.email.trim().to_string(),
            phone_number: input.phone_number.trim().to_string(),
            gender: input.gender,
            date_of_birth: input.date_of_birth,
        };
        self.passengers.retain(|p| p.id != id);
        self.passengers.push(passenger.clone());
        Ok(passenger)
    }

    pub fn passenger_by_tc(&self, tc_no: &str) -> Result<Passenger, Refusal> {
        self.passengers
            .iter()
            .find(|p| p.tc_no == tc_no.trim())
            .cloned()
            .ok_or_else(|| Refusal::NotFound(format!("No passenger with TC number {tc_no}.")))
    }

    // --- tickets ---

    pub fn validate_gender(
        &mut self,
        trip_id: i64,
        seat_number: u32,
        gender: u8,
        now: NaiveDateTime,
    ) -> Result<(), Refusal> {
        self.reclaim_expired(now);
        self.check_seat(trip_id, seat_number, gender)
    }

    pub fn reserve(
        &mut self,
        trip_id: i64,
        input: ReserveInput,
        now: NaiveDateTime,
    ) -> Result<TicketView, Refusal> {
        self.reclaim_expired(now);
        let gender = self.passenger_gender(input.passenger_id)?;
        self.check_seat(trip_id, input.seat_number, gender)?;
        let price = self.trip(trip_id)?.price;
        let expires_at = now + self.config.hold;
        let id = self.push_ticket(Ticket {
            id: 0,
            trip_id,
            passenger_id: input.passenger_id,
            seat_number: input.seat_number,
            price,
            is_paid: false,
            is_reserved: true,
            expires_at: Some(expires_at),
            created_at: now,
        });
        tracing::info!(ticket_id = id, trip_id, seat = input.seat_number, expires_at = %stamp(expires_at), "seat reserved");
        self.view_of(id)
    }

    pub fn complete_reservation(
        &mut self,
        ticket_id: i64,
        input: CompleteInput,
        now: NaiveDateTime,
    ) -> Result<TicketView, Refusal> {
        self.reclaim_expired(now);
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| Refusal::NotFound(format!("Ticket {ticket_id} was not found.")))?;
        if ticket.is_paid {
            return Err(Refusal::BadRequest(format!(
                "Ticket {ticket_id} is already paid."
            )));
        }
        if !ticket.is_reserved {
            return Err(Refusal::Conflict(format!(
                "Reservation {ticket_id} has expired."
            )));
        }
        if input.paid_amount < ticket.price {
            return Err(Refusal::BadRequest(
                "Paid amount does not cover the ticket price.".to_string(),
            ));
        }
        ticket.is_paid = true;
        ticket.is_reserved = false;
        ticket.expires_at = None;
        tracing::info!(ticket_id, "reservation completed");
        self.view_of(ticket_id)
    }

    pub fn purchase(
        &mut self,
        trip_id: i64,
        input: PurchaseInput,
        now: NaiveDateTime,
    ) -> Result<TicketView, Refusal> {
        self.reclaim_expired(now);
        if input.trip_id != trip_id {
            return Err(Refusal::BadRequest(
                "Trip in the body does not match the URL.".to_string(),
            ));
        }
        let gender = self.passenger_gender(input.passenger_id)?;
        self.check_seat(trip_id, input.seat_number, gender)?;
        let price = self.trip(trip_id)?.price;
        if input.paid_amount < price {
            return Err(Refusal::BadRequest(
                "Paid amount does not cover the ticket price.".to_string(),
            ));
        }
        let id = self.push_ticket(Ticket {
            id: 0,
            trip_id,
            passenger_id: input.passenger_id,
            seat_number: input.seat_number,
            price,
            is_paid: true,
            is_reserved: false,
            expires_at: None,
            created_at: now,
        });
        tracing::info!(ticket_id = id, trip_id, seat = input.seat_number, "seat purchased");
        self.view_of(id)
    }

    pub fn cancel(&mut self, ticket_id: i64) -> Result<(), Refusal> {
        let before = self.tickets.len();
        self.tickets.retain(|t| t.id != ticket_id);
        if self.tickets.len() == before {
            return Err(Refusal::NotFound(format!("Ticket {ticket_id} was not found.")));
        }
        tracing::info!(ticket_id, "ticket cancelled");
        Ok(())
    }

    pub fn passenger_tickets(&mut self, passenger_id: i64, now: NaiveDateTime) -> Vec<TicketView> {
        self.reclaim_expired(now);
        self.tickets
            .iter()
            .filter(|t| t.passenger_id == passenger_id)
            .filter_map(|t| self.ticket_view(t))
            .collect()
    }

    // --- admin ---

    /// Remove a trip together with every ticket on it.
    pub fn delete_trip(&mut self, caller: &str, trip_id: i64) -> Result<(), Refusal> {
        let admin = self.users.get(caller).is_some_and(|u| u.role == "Admin");
        if !admin {
            return Err(Refusal::Forbidden(
                "Only administrators can delete trips.".to_string(),
            ));
        }
        self.trip(trip_id)?;
        self.trips.retain(|t| t.id != trip_id);
        let before = self.tickets.len();
        self.tickets.retain(|t| t.trip_id != trip_id);
        tracing::info!(trip_id, tickets = before - self.tickets.len(), "trip deleted");
        Ok(())
    }

    // --- rules ---

    fn reclaim_expired(&mut self, now: NaiveDateTime) {
        for ticket in &mut self.tickets {
            let lapsed = ticket.is_reserved
                && !ticket.is_paid
                && ticket.expires_at.is_none_or(|at| at <= now);
            if lapsed {
                ticket.is_reserved = false;
                tracing::debug!(ticket_id = ticket.id, "hold reclaimed");
            }
        }
    }

    fn check_seat(&self, trip_id: i64, seat_number: u32, gender: u8) -> Result<(), Refusal> {
        let trip = self.trip(trip_id)?;
        if seat_number == 0 || seat_number > trip.total_seats {
            return Err(Refusal::BadRequest(format!(
                "Seat {seat_number} does not exist on this bus."
            )));
        }
        check_gender(gender)?;
        if self.occupant(trip_id, seat_number).is_some() {
            return Err(Refusal::Conflict(format!(
                "Seat {seat_number} is no longer available."
            )));
        }

        // Seats pair up as (1, 2), (3, 4), ...
        let neighbour = if seat_number % 2 == 1 {
            seat_number + 1
        } else {
            seat_number - 1
        };
        let clash = self
            .occupant(trip_id, neighbour)
            .and_then(|t| self.passenger(t.passenger_id))
            .is_some_and(|p| p.gender != gender);
        if clash {
            return Err(Refusal::BadRequest(format!(
                "Seat {seat_number} is next to a passenger of a different gender."
            )));
        }
        Ok(())
    }

    fn occupant(&self, trip_id: i64, seat_number: u32) -> Option<&Ticket> {
        self.tickets
            .iter()
            .find(|t| t.trip_id == trip_id && t.seat_number == seat_number && t.holds_seat())
    }

    fn trip(&self, trip_id: i64) -> Result<&Trip, Refusal> {
        self.trips
            .iter()
            .find(|t| t.id == trip_id)
            .ok_or_else(|| Refusal::NotFound(format!("Trip {trip_id} was not found.")))
    }

    fn passenger(&self, passenger_id: i64) -> Option<&Passenger> {
        self.passengers.iter().find(|p| p.id == passenger_id)
    }

    fn passenger_gender(&self, passenger_id: i64) -> Result<u8, Refusal> {
        self.passenger(passenger_id)
            .map(|p| p.gender)
            .ok_or_else(|| Refusal::NotFound(format!("Passenger {passenger_id} was not found.")))
    }

    fn push_ticket(&mut self, mut ticket: Ticket) -> i64 {
        ticket.id = self.next_ticket_id;
        self.next_ticket_id += 1;
        let id = ticket.id;
        self.tickets.push(ticket);
        id
    }

    fn view_of(&self, ticket_id: i64) -> Result<TicketView, Refusal> {
        self.tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .and_then(|t| self.ticket_view(t))
            .ok_or_else(|| Refusal::NotFound(format!("Ticket {ticket_id} was not found.")))
    }

    // --- views ---

    fn city_name(&self, city_id: i64) -> String {
        self.cities
            .iter()
            .find(|c| c.id == city_id)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn district_name(&self, district_id: Option<i64>) -> Option<String> {
        let district_id = district_id?;
        self.cities
            .iter()
            .flat_map(|c| &c.districts)
            .find(|d| d.id == district_id)
            .map(|d| d.name.clone())
    }

    fn trip_view(&self, trip: &Trip) -> TripView {
        let sold_ticket_count = self
            .tickets
            .iter()
            .filter(|t| t.trip_id == trip.id && t.holds_seat())
            .count() as u32;
        TripView {
            id: trip.id,
            origin_city_name: self.city_name(trip.origin.0),
            origin_district_name: self.district_name(trip.origin.1),
            destination_city_name: self.city_name(trip.destination.0),
            destination_district_name: self.district_name(trip.destination.1),
            departure_date: trip.departure.date().format("%Y-%m-%d").to_string(),
            departure_time: trip.departure.time().format("%H:%M:%S").to_string(),
            price: trip.price,
            company_name: trip.company_name.clone(),
            sold_ticket_count,
            bus_plate_number: trip.bus_plate_number.clone(),
        }
    }

    fn ticket_view(&self, ticket: &Ticket) -> Option<TicketView> {
        let trip = self.trips.iter().find(|t| t.id == ticket.trip_id)?;
        let passenger = self.passenger(ticket.passenger_id)?.clone();
        Some(TicketView {
            id: ticket.id,
            seat_number: ticket.seat_number,
            price: ticket.price,
            is_paid: ticket.is_paid,
            is_reserved: ticket.is_reserved,
            reservation_expires_at: ticket.expires_at.map(stamp),
            created_date: stamp(ticket.created_at),
            trip: self.trip_view(trip),
            passenger,
        })
    }
}

fn check_gender(gender: u8) -> Result<(), Refusal> {
    match gender {
        1 | 2 => Ok(()),
        _ => Err(Refusal::BadRequest(
            "Gender must be 1 (male) or 2 (female).".to_string(),
        )),
    }
}
