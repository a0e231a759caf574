//! Authenticated session context.
//!
//! A `Session` exists from a successful login until `end` is called at
//! logout. It is handed by reference to every request builder that needs a
//! bearer token, so there is no process-wide token store.

use crate::types::{PassengerId, UserData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    fn from_wire(role: &str) -> Self {
        if role.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Role,
    passenger_id: Option<PassengerId>,
}

impl Session {
    pub fn from_login(user: UserData) -> Self {
        Self {
            role: Role::from_wire(&user.role),
            token: user.token,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            passenger_id: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.email.clone(),
        }
    }

    /// The passenger most recently created from this session, if any.
    pub fn passenger_id(&self) -> Option<PassengerId> {
        self.passenger_id
    }

    pub fn remember_passenger(&mut self, id: PassengerId) {
        self.passenger_id = Some(id);
    }

    /// `(name, value)` pair for the authorization header.
    pub fn bearer_header(&self) -> (String, String) {
        ("authorization".to_string(), format!("Bearer {}", self.token))
    }

    /// Logout. Consumes the session so it cannot be used afterwards.
    pub fn end(self) {
        tracing::debug!(email = %self.email, "session ended");
    }
}
