//! Typed navigation state.
//!
//! Each `Screen` variant carries exactly the data it needs, and `transition`
//! is a pure function `(screen, event) -> screen`. Events that make no sense
//! for the current screen leave it unchanged.

use crate::session::Role;
use crate::types::{CreatePassenger, Ticket, TicketId, Trip, TripId, TripSearch};

/// The parts of a trip the booking screens display.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    pub trip_id: TripId,
    pub price: f64,
    pub origin: String,
    pub origin_district: Option<String>,
    pub destination: String,
    pub destination_district: Option<String>,
    pub departure_date: String,
    pub departure_time: String,
    pub bus_plate_number: String,
    pub company_name: String,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            price: trip.price,
            origin: trip.origin_city_name.clone().unwrap_or_default(),
            origin_district: trip.origin_district_name.clone(),
            destination: trip.destination_city_name.clone().unwrap_or_default(),
            destination_district: trip.destination_district_name.clone(),
            departure_date: trip.departure_date.clone(),
            departure_time: trip.departure_time.clone().unwrap_or_default(),
            bus_plate_number: trip.bus_plate_number.clone().unwrap_or_default(),
            company_name: trip.company_name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Login,
    Register,
    UserHome,
    MyTickets,
    TripList {
        search: TripSearch,
    },
    SeatSelection {
        search: TripSearch,
        trip: TripSummary,
    },
    PassengerDetails {
        search: TripSearch,
        trip: TripSummary,
        seat_number: u32,
    },
    Payment {
        trip: TripSummary,
        seat_number: u32,
        passenger: CreatePassenger,
        /// Set when paying for an existing hold rather than buying outright.
        reservation: Option<TicketId>,
    },
    AdminHome,
    AdminTripList,
    TripPassengerList {
        trip_id: TripId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoggedIn(Role),
    OpenRegister,
    Registered,
    Logout,
    Back,
    SearchTrips(TripSearch),
    OpenMyTickets,
    TripSelected(TripSummary),
    SeatSelected(u32),
    /// Seat validation passed and the user chose to pay now.
    ContinueToPayment(CreatePassenger),
    /// Seat validation passed and the hold was placed.
    Reserved,
    /// Pay for a hold shown on the home screen.
    PayReservation(Ticket),
    PaymentSucceeded,
    OpenAdminTrips,
    OpenTripPassengers(TripId),
}

pub fn transition(screen: Screen, event: Event) -> Screen {
    match (screen, event) {
        (_, Event::Logout) => Screen::Login,

        (Screen::Login, Event::LoggedIn(Role::Admin)) => Screen::AdminHome,
        (Screen::Login, Event::LoggedIn(Role::User)) => Screen::UserHome,
        (Screen::Login, Event::OpenRegister) => Screen::Register,
        (Screen::Register, Event::Registered | Event::Back) => Screen::Login,

        (Screen::UserHome, Event::SearchTrips(search)) => Screen::TripList { search },
        (Screen::UserHome, Event::OpenMyTickets) => Screen::MyTickets,
        (Screen::UserHome, Event::PayReservation(ticket)) => {
            match payment_for_reservation(&ticket) {
                Some(payment) => payment,
                None => Screen::UserHome,
            }
        }
        (Screen::MyTickets, Event::Back) => Screen::UserHome,

        (Screen::TripList { .. }, Event::Back) => Screen::UserHome,
        (Screen::TripList { search }, Event::TripSelected(trip)) => {
            Screen::SeatSelection { search, trip }
        }

        (Screen::SeatSelection { search, .. }, Event::Back) => Screen::TripList { search },
        (Screen::SeatSelection { search, trip }, Event::SeatSelected(seat_number)) => {
            Screen::PassengerDetails {
                search,
                trip,
                seat_number,
            }
        }

        (Screen::PassengerDetails { search, trip, .. }, Event::Back) => {
            Screen::SeatSelection { search, trip }
        }
        (Screen::PassengerDetails { .. }, Event::Reserved) => Screen::UserHome,
        (
            Screen::PassengerDetails {
                trip, seat_number, ..
            },
            Event::ContinueToPayment(passenger),
        ) => Screen::Payment {
            trip,
            seat_number,
            passenger,
            reservation: None,
        },

        (Screen::Payment { .. }, Event::Back | Event::PaymentSucceeded) => Screen::UserHome,

        (Screen::AdminHome, Event::OpenAdminTrips) => Screen::AdminTripList,
        (Screen::AdminTripList, Event::Back) => Screen::AdminHome,
        (Screen::AdminTripList, Event::OpenTripPassengers(trip_id)) => {
            Screen::TripPassengerList { trip_id }
        }
        (Screen::TripPassengerList { .. }, Event::Back) => Screen::AdminTripList,

        (screen, _) => screen,
    }
}

fn payment_for_reservation(ticket: &Ticket) -> Option<Screen> {
    let trip = ticket.trip.as_ref()?;
    let passenger = ticket.passenger.as_ref()?;
    Some(Screen::Payment {
        trip: TripSummary::from(trip),
        seat_number: ticket.seat_number,
        passenger: CreatePassenger::from(passenger),
        reservation: Some(ticket.id),
    })
}
