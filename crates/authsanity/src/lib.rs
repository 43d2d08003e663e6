//! authsanity
//!
//! Ticket-based authentication that keeps *where* credentials travel apart
//! from *how* they are checked:
//!
//! - **Transports** carry a `(principal, ticket)` pair in a signed cookie, the
//!   server-side session, or an `Authorization: Bearer` token.
//! - **Verification services** own the tickets and know each user's groups.
//! - **[`AuthPolicy`]** drives both: it resolves the userid once per request,
//!   derives effective principals, and issues or revokes tickets on login and
//!   logout, rotating the session on login.
//!
//! ## Quick start
//! ```
//! use authsanity::{AuthConfig, AuthPolicy, MemoryTicketStore, RequestHead};
//!
//! # fn demo() -> authsanity::Result<()> {
//! let cfg = AuthConfig::from_settings([
//!     ("authsanity.source", "header"),
//!     ("authsanity.secret", "change-me"),
//! ])?;
//! let policy = AuthPolicy::from_config(&cfg)?;
//! let store = MemoryTicketStore::new();
//! store.add_principal("alice", ["editors"]);
//!
//! // Log in.
//! let mut req = policy
//!     .request(RequestHead::new("example.com"))
//!     .with_verification(store.verifier());
//! let headers = policy.remember(&mut req, "alice")?;
//!
//! // The client sends the token back.
//! let mut req = policy
//!     .request(RequestHead::new("example.com").with_headers(headers))
//!     .with_verification(store.verifier());
//! assert_eq!(policy.authenticated_userid(&mut req)?.as_deref(), Some("alice"));
//! # Ok(()) }
//! # demo().unwrap();
//! ```

#![forbid(unsafe_code)]

mod config;
mod cookie;
#[cfg(feature = "memory")]
mod memory;
mod policy;
mod principal;
mod session;
mod signed;
mod ticket;
mod transport;
mod vary;

pub use authsanity_api::{
    AuthPayload, AuthTransport, Error, Header, Principal, RequestHead, Result, Session,
    SharedSession, Ticket, Verification, VerificationService,
};
pub use config::{AuthConfig, CookieConfig, HeaderConfig, SessionConfig, SourceKind};
pub use cookie::{CookieOptions, MAX_AGE_LIMIT, SameSite, build_clear_cookie, build_set_cookie};
#[cfg(feature = "memory")]
pub use memory::{MemoryTicketStore, MemoryVerifier};
pub use policy::{AuthPolicy, AuthRequest, AuthenticationOutcome};
pub use principal::{AUTHENTICATED, EVERYONE, sanitize};
pub use session::{MemorySession, share};
pub use signed::{DecodeError, HashAlg, SignedSerializer};
pub use ticket::new_ticket;
pub use transport::{
    COOKIE_SALT, CookieSettings, CookieTransport, HeaderTransport, SCHEME, SessionTransport,
    TransportFactory,
};
pub use vary::VaryRegistry;
