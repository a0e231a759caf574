//! Client core for the bus booking API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). On top of that sit the pieces
//! a booking front end needs: the reservation countdown watcher, the
//! seat/gender validation gate, the reservation lifecycle tracker and the
//! typed screen flow.
//!
//! # Design
//! - `BookingClient` is stateless; it holds only `base_url`. Authenticated
//!   builders take the caller's `Session`.
//! - Each endpoint is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit. `BookingService` drives them through a
//!   `Transport` for callers that want async workflows.
//! - `ReservationWatcher` owns at most one countdown task and reports
//!   through an unbounded channel. After `stop` returns, nothing more is
//!   delivered.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod countdown;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod screen;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod validation;
pub mod watcher;

pub use client::BookingClient;
pub use config::ClientConfig;
pub use countdown::{
    format_remaining, parse_expiry, AnchoredClock, Clock, Countdown, SystemClock, WatchError,
};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{ReservationState, ReservationTracker, TicketStatus};
pub use screen::{transition, Event, Screen, TripSummary};
pub use service::BookingService;
pub use session::{Role, Session};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    CreatePassenger, Gender, Passenger, PassengerId, Ticket, TicketId, Trip, TripAvailability,
    TripId, TripSearch,
};
pub use validation::{GateOutcome, PassengerForm, SeatGate};
pub use watcher::{CountdownEvent, ReservationWatcher};
