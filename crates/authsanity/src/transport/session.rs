//! Server-side session transport.

use authsanity_api::{
    AuthPayload, AuthTransport, Error, Header, RequestHead, Result, Session, SharedSession,
};

/// Stores the payload under a key of the request's session.
///
/// The first value seen is kept for the rest of the request: after
/// `headers_remember` or `headers_forget`, `get_value` still answers with
/// what the client came in with.
pub struct SessionTransport {
    value_key: String,
    session: Option<SharedSession>,
    current: Option<AuthPayload>,
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("value_key", &self.value_key)
            .field("session", &self.session.is_some())
            .field("current", &self.current)
            .finish()
    }
}

impl SessionTransport {
    pub fn bind(value_key: &str, head: &RequestHead) -> Self {
        Self {
            value_key: value_key.to_string(),
            session: head.session.clone(),
            current: None,
        }
    }

    fn read(&self, session: &dyn Session) -> AuthPayload {
        let Some(stored) = session.get(&self.value_key) else {
            return AuthPayload::empty();
        };
        serde_json::from_value(stored).unwrap_or_else(|e| {
            tracing::debug!(key = %self.value_key, error = %e, "ignoring malformed session value");
            AuthPayload::empty()
        })
    }

    /// Lock the session, take the snapshot if this is the first access, and
    /// run `f` on it.
    fn with_session<T>(&mut self, f: impl FnOnce(&mut dyn Session, &str) -> T) -> Result<T> {
        let shared = self.session.clone().ok_or_else(|| {
            Error::Configuration(
                "session transport used on a request without a session".to_string(),
            )
        })?;
        let mut guard = shared
            .lock()
            .map_err(|_| Error::Session("session lock poisoned".to_string()))?;

        if self.current.is_none() {
            self.current = Some(self.read(&*guard));
        }
        Ok(f(&mut *guard, &self.value_key))
    }
}

impl AuthTransport for SessionTransport {
    fn vary(&self) -> &[&'static str] {
        &[]
    }

    fn get_value(&mut self) -> AuthPayload {
        if let Some(current) = &self.current {
            return current.clone();
        }
        match self.with_session(|_, _| ()) {
            Ok(()) => self.current.clone().unwrap_or_default(),
            Err(e) => {
                tracing::debug!(error = %e, "no session to read credentials from");
                AuthPayload::empty()
            }
        }
    }

    fn headers_remember(&mut self, payload: &AuthPayload) -> Result<Vec<Header>> {
        let value = serde_json::to_value(payload)?;
        self.with_session(|session, key| session.insert(key.to_string(), value))?;
        Ok(Vec::new())
    }

    fn headers_forget(&mut self) -> Result<Vec<Header>> {
        self.with_session(|session, key| {
            session.remove(key);
        })?;
        Ok(Vec::new())
    }
}
