//! The authentication policy.
//!
//! [`AuthPolicy`] is built once and shared by every request. Each request gets
//! an [`AuthRequest`] that owns the bound transport, the verification backend,
//! the vary registry and the memoized outcome. The policy owns the
//! "verify at most once per request" rule: the first resolution is stored in
//! the request and every later call answers from it.

use std::fmt;
use std::sync::{Arc, MutexGuard};

use authsanity_api::{
    AuthPayload, AuthTransport, Error, Header, Principal, RequestHead, Result, Session,
    SharedSession, Verification, VerificationService,
};
use once_cell::sync::OnceCell;

use crate::config::AuthConfig;
use crate::principal::{AUTHENTICATED, EVERYONE, sanitize};
use crate::ticket::new_ticket;
use crate::transport::TransportFactory;
use crate::vary::VaryRegistry;

macro_rules! debug_log {
    ($policy:expr, $($arg:tt)+) => {
        if $policy.debug {
            tracing::debug!(target: "authsanity::policy", $($arg)+);
        }
    };
}

/// Memo of the identity resolved for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    #[default]
    Unresolved,
    Resolved(Option<Principal>),
}

/// Per-request authentication state.
pub struct AuthRequest {
    head: RequestHead,
    transport: Option<Box<dyn AuthTransport>>,
    verification: Option<Box<dyn VerificationService>>,
    vary: VaryRegistry,
    outcome: AuthenticationOutcome,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("head", &self.head)
            .field("transport", &self.transport.is_some())
            .field("verification", &self.verification.is_some())
            .field("vary", &self.vary)
            .field("outcome", &self.outcome)
            .finish()
    }
}

struct Bound<'a> {
    transport: &'a mut dyn AuthTransport,
    verification: &'a mut dyn VerificationService,
    outcome: &'a mut AuthenticationOutcome,
}

impl AuthRequest {
    /// A request with no collaborators attached yet.
    pub fn new(head: RequestHead) -> Self {
        Self {
            head,
            transport: None,
            verification: None,
            vary: VaryRegistry::new(),
            outcome: AuthenticationOutcome::Unresolved,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: impl AuthTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    #[must_use]
    pub fn with_verification(mut self, verification: impl VerificationService + 'static) -> Self {
        self.verification = Some(Box::new(verification));
        self
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn vary(&self) -> &VaryRegistry {
        &self.vary
    }

    pub fn outcome(&self) -> &AuthenticationOutcome {
        &self.outcome
    }

    /// Merge the collected vary names into the response headers. Consumes the
    /// request, so it happens once.
    pub fn finish(self, response_headers: &mut Vec<Header>) {
        if self.vary.is_empty() {
            return;
        }

        let existing = response_headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case("vary"))
            .map(|h| h.value.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        response_headers.retain(|h| !h.name.eq_ignore_ascii_case("vary"));

        if let Some(value) = self.vary.apply(Some(existing.as_str())) {
            response_headers.push(Header::new("Vary", value));
        }
    }

    /// Look up both collaborators and record the transport's vary names.
    fn bind(&mut self) -> Result<Bound<'_>> {
        let transport = self.transport.as_deref_mut().ok_or_else(|| {
            Error::Configuration("no authentication transport is configured".to_string())
        })?;
        let verification = self.verification.as_deref_mut().ok_or_else(|| {
            Error::Configuration("no verification service is configured".to_string())
        })?;

        self.vary.add(transport.vary().iter().copied());

        Ok(Bound {
            transport,
            verification,
            outcome: &mut self.outcome,
        })
    }
}

type SessionCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Resolves identities and runs the login/logout protocol.
#[derive(Default)]
pub struct AuthPolicy {
    debug: bool,
    transport: Option<TransportFactory>,
    session_check: Option<SessionCheck>,
    session_registered: OnceCell<bool>,
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPolicy")
            .field("debug", &self.debug)
            .field("transport", &self.transport)
            .field("session_check", &self.session_check.is_some())
            .field("session_registered", &self.session_registered.get())
            .finish()
    }
}

impl AuthPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration. Fails on a missing secret or a bad option.
    pub fn from_config(cfg: &AuthConfig) -> Result<Self> {
        cfg.validate()?;
        let policy = Self {
            debug: cfg.debug,
            transport: TransportFactory::from_config(cfg)?,
            ..Self::default()
        };
        Ok(if cfg.session_facility() {
            policy.with_session_facility(true)
        } else {
            policy
        })
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, factory: TransportFactory) -> Self {
        self.transport = Some(factory);
        self
    }

    /// Declare whether the host attaches a session to every request.
    #[must_use]
    pub fn with_session_facility(mut self, registered: bool) -> Self {
        self.session_check = None;
        self.session_registered = OnceCell::with_value(registered);
        self
    }

    /// Ask `check` whether a session facility is registered. It runs once,
    /// on the first login or logout, and the answer holds from then on.
    #[must_use]
    pub fn with_session_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.session_check = Some(Arc::new(check));
        self.session_registered = OnceCell::new();
        self
    }

    /// Start a request, binding the configured transport to it.
    pub fn request(&self, head: RequestHead) -> AuthRequest {
        let transport = self.transport.as_ref().map(|f| f.bind(&head));
        let mut req = AuthRequest::new(head);
        req.transport = transport;
        req
    }

    /// Unverified identities are never exposed.
    pub fn unauthenticated_userid(&self, _req: &AuthRequest) -> Option<Principal> {
        None
    }

    /// The verified userid of this request, if any.
    pub fn authenticated_userid(&self, req: &mut AuthRequest) -> Result<Option<Principal>> {
        let bound = req.bind()?;

        if let AuthenticationOutcome::Resolved(userid) = &*bound.outcome {
            return Ok(userid.clone());
        }

        let userid = match bound.verification.userid()? {
            Verification::Verified(userid) => userid,
            Verification::Unverified => {
                debug_log!(self, "authentication has not yet been completed");

                let AuthPayload { principal, ticket } = bound.transport.get_value();
                debug_log!(
                    self,
                    principal = ?principal,
                    has_ticket = ticket.is_some(),
                    "transport provided credentials"
                );

                // Always verify, even with nothing presented.
                bound
                    .verification
                    .verify_ticket(principal.as_deref(), ticket.as_deref())?;

                match bound.verification.userid()? {
                    Verification::Verified(userid) => userid,
                    Verification::Unverified => None,
                }
            }
        };

        *bound.outcome = AuthenticationOutcome::Resolved(userid.clone());
        debug_log!(self, userid = ?userid, "authenticated_userid resolved");
        Ok(userid)
    }

    /// `[Everyone]` for anonymous requests, else
    /// `[Everyone, Authenticated, userid, groups...]`.
    pub fn effective_principals(&self, req: &mut AuthRequest) -> Result<Vec<Principal>> {
        let mut principals = vec![EVERYONE.to_string()];

        let Some(userid) = self.authenticated_userid(req)? else {
            debug_log!(self, principals = ?principals, "no authenticated userid");
            return Ok(principals);
        };

        if sanitize(&userid).is_none() {
            debug_log!(
                self,
                userid = %userid,
                principals = ?principals,
                "authenticated userid is reserved; treating request as anonymous"
            );
            return Ok(principals);
        }

        let groups = req.bind()?.verification.groups()?;

        principals.push(AUTHENTICATED.to_string());
        principals.push(userid);
        principals.extend(groups);

        debug_log!(self, principals = ?principals, "effective principals");
        Ok(principals)
    }

    /// Log `principal` in: issue a ticket, rotate the session and return the
    /// headers the transport needs.
    pub fn remember(&self, req: &mut AuthRequest, principal: &str) -> Result<Vec<Header>> {
        let session = self.session(req)?;
        let prev_userid = self.authenticated_userid(req)?;

        let bound = req.bind()?;
        let ticket = new_ticket();
        debug_log!(self, principal = %principal, "remembering principal");

        bound.verification.add_ticket(principal, &ticket)?;

        if let Some(session) = session {
            let same_identity = prev_userid.as_deref() == Some(principal);
            rotate_session(&session, same_identity)?;
            debug_log!(self, same_identity, "session rotated");
        }

        bound
            .transport
            .headers_remember(&AuthPayload::new(principal, ticket))
    }

    /// Log out: drop the presented ticket, invalidate the session and return
    /// the headers the transport needs.
    pub fn forget(&self, req: &mut AuthRequest) -> Result<Vec<Header>> {
        let session = self.session(req)?;

        let bound = req.bind()?;
        let AuthPayload { ticket, .. } = bound.transport.get_value();
        debug_log!(self, has_ticket = ticket.is_some(), "forgetting ticket");

        bound.verification.remove_ticket(ticket.as_deref())?;

        if let Some(session) = session {
            lock(&session)?.invalidate();
        }

        bound.transport.headers_forget()
    }

    /// Whether a session facility is registered. Decided once per policy.
    pub fn session_registered(&self) -> bool {
        *self
            .session_registered
            .get_or_init(|| self.session_check.as_ref().is_some_and(|check| check()))
    }

    /// The request's session when a session facility is registered.
    fn session(&self, req: &AuthRequest) -> Result<Option<SharedSession>> {
        if !self.session_registered() {
            return Ok(None);
        }
        req.head.session.clone().map(Some).ok_or_else(|| {
            Error::Configuration(
                "a session facility is registered but the request has no session".to_string(),
            )
        })
    }
}

fn lock(session: &SharedSession) -> Result<MutexGuard<'_, dyn Session + 'static>> {
    session
        .lock()
        .map_err(|_| Error::Session("session lock poisoned".to_string()))
}

/// Start a new session. Logging in again as the same identity keeps the data
/// and only issues a new id and CSRF token.
fn rotate_session(session: &SharedSession, same_identity: bool) -> Result<()> {
    let mut session = lock(session)?;
    if same_identity {
        let data = session.items();
        session.invalidate();
        session.update(data);
        session.rotate_token();
    } else {
        session.invalidate();
    }
    Ok(())
}
