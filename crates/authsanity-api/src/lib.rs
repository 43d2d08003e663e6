//! authsanity-api
//!
//! Contracts between the authentication policy and the collaborators it
//! drives: the transport that carries a `(principal, ticket)` pair, the
//! verification backend that owns tickets, and the server-side session.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod error;

pub use error::{Error, Result};

pub type Principal = String;
pub type Ticket = String;

/// A response header handed back to the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The unit a transport stores and reads back.
///
/// On the wire this is the two-element array `[principal, ticket]`, with
/// `null` standing in for an absent member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(Option<Principal>, Option<Ticket>)",
    into = "(Option<Principal>, Option<Ticket>)"
)]
pub struct AuthPayload {
    pub principal: Option<Principal>,
    pub ticket: Option<Ticket>,
}

impl AuthPayload {
    pub fn new(principal: impl Into<Principal>, ticket: impl Into<Ticket>) -> Self {
        Self {
            principal: Some(principal.into()),
            ticket: Some(ticket.into()),
        }
    }

    /// The `(None, None)` payload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.principal.is_none() && self.ticket.is_none()
    }
}

impl From<(Option<Principal>, Option<Ticket>)> for AuthPayload {
    fn from((principal, ticket): (Option<Principal>, Option<Ticket>)) -> Self {
        Self { principal, ticket }
    }
}

impl From<AuthPayload> for (Option<Principal>, Option<Ticket>) {
    fn from(p: AuthPayload) -> Self {
        (p.principal, p.ticket)
    }
}

/// Answer of [`VerificationService::userid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// A ticket was checked during this request; `None` means it did not
    /// identify anyone.
    Verified(Option<Principal>),
    /// No ticket has been checked yet during this request.
    Unverified,
}

/// Carries the opaque `(principal, ticket)` pair between client and server.
///
/// An implementation is bound to a single request.
pub trait AuthTransport: Send {
    /// Header names the response must vary on when this transport is used.
    fn vary(&self) -> &[&'static str];

    /// The payload the client presented. Anything missing, malformed or
    /// forged reads as [`AuthPayload::empty`].
    fn get_value(&mut self) -> AuthPayload;

    /// Headers that make the client present `payload` from now on.
    fn headers_remember(&mut self, payload: &AuthPayload) -> Result<Vec<Header>>;

    /// Headers that make the client drop whatever it presents.
    fn headers_forget(&mut self) -> Result<Vec<Header>>;
}

/// Authoritative ticket store and validator, bound to a single request.
pub trait VerificationService: Send {
    /// The verified userid, or [`Verification::Unverified`] until
    /// [`verify_ticket`](Self::verify_ticket) has run for this request.
    fn userid(&self) -> Result<Verification>;

    /// Groups of the verified user. The userid itself need not be included.
    fn groups(&self) -> Result<Vec<String>>;

    /// Check that `ticket` belongs to `principal`. Must accept absent values.
    fn verify_ticket(&mut self, principal: Option<&str>, ticket: Option<&str>) -> Result<()>;

    /// Register a new ticket. Fails with [`Error::Validation`] when the
    /// principal is unknown or the ticket cannot be stored.
    fn add_ticket(&mut self, principal: &str, ticket: &str) -> Result<()>;

    /// Drop a ticket. Unknown or absent tickets are a no-op.
    fn remove_ticket(&mut self, ticket: Option<&str>) -> Result<()>;
}

/// A server-side session as seen by the policy and the session transport.
pub trait Session: Send {
    fn get(&self, key: &str) -> Option<Value>;

    fn insert(&mut self, key: String, value: Value);

    fn remove(&mut self, key: &str) -> Option<Value>;

    /// Snapshot of every key/value pair.
    fn items(&self) -> BTreeMap<String, Value>;

    fn update(&mut self, data: BTreeMap<String, Value>);

    /// Drop all data and start over under a new session identifier.
    fn invalidate(&mut self);

    /// Issue a new CSRF token and return it.
    fn rotate_token(&mut self) -> String;
}

pub type SharedSession = Arc<Mutex<dyn Session>>;

/// The parts of an incoming request the transports look at.
#[derive(Clone, Default)]
pub struct RequestHead {
    pub host: String,
    pub headers: Vec<Header>,
    pub session: Option<SharedSession>,
}

impl fmt::Debug for RequestHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHead")
            .field("host", &self.host)
            .field("headers", &self.headers)
            .field("session", &self.session.is_some())
            .finish()
    }
}

impl RequestHead {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = Header>) -> Self {
        self.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SharedSession) -> Self {
        self.session = Some(session);
        self
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Value of the request cookie `name`, searching every `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case("cookie"))
            .flat_map(|h| h.value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| k.trim() == name)
            .map(|(_, v)| v.trim().trim_matches('"'))
    }

    /// The host without its port.
    pub fn domain(&self) -> &str {
        let host = self.host.trim();
        if let Some(rest) = host.strip_prefix('[') {
            // [::1]:8080
            return rest.split(']').next().unwrap_or(rest);
        }
        match host.rsplit_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
            _ => host,
        }
    }
}
