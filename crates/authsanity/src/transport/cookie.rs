//! Signed cookie transport.

use authsanity_api::{AuthPayload, AuthTransport, Header, RequestHead, Result};

use crate::cookie::{CookieOptions, build_clear_cookie, build_set_cookie};
use crate::signed::SignedSerializer;

/// Salt mixed into the cookie signing key.
pub const COOKIE_SALT: &str = "authsanity";

const VARY: &[&str] = &["Cookie"];

/// Settings shared by every request using the cookie transport.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub serializer: SignedSerializer,
    pub options: CookieOptions,
    /// Empty means the request's own domain.
    pub domains: Vec<String>,
}

/// Carries the payload in a signed cookie.
#[derive(Debug)]
pub struct CookieTransport {
    serializer: SignedSerializer,
    options: CookieOptions,
    domains: Vec<String>,
    presented: Option<String>,
}

impl CookieTransport {
    pub fn bind(settings: &CookieSettings, head: &RequestHead) -> Self {
        let domains = if settings.domains.is_empty() {
            vec![head.domain().to_string()]
        } else {
            settings.domains.clone()
        };

        Self {
            serializer: settings.serializer.clone(),
            options: settings.options.clone(),
            domains,
            presented: head
                .cookie(&settings.options.name)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }

    fn options_for(&self, domain: &str) -> CookieOptions {
        let mut opts = self.options.clone();
        opts.domain = Some(domain.to_string());
        opts
    }
}

impl AuthTransport for CookieTransport {
    fn vary(&self) -> &[&'static str] {
        VARY
    }

    fn get_value(&mut self) -> AuthPayload {
        let Some(raw) = self.presented.as_deref() else {
            return AuthPayload::empty();
        };

        match self.serializer.loads(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(cookie = %self.options.name, error = %e, "ignoring auth cookie");
                AuthPayload::empty()
            }
        }
    }

    fn headers_remember(&mut self, payload: &AuthPayload) -> Result<Vec<Header>> {
        let value = self.serializer.dumps(payload)?;
        Ok(self
            .domains
            .iter()
            .map(|d| Header::new("Set-Cookie", build_set_cookie(&value, &self.options_for(d))))
            .collect())
    }

    fn headers_forget(&mut self) -> Result<Vec<Header>> {
        Ok(self
            .domains
            .iter()
            .map(|d| Header::new("Set-Cookie", build_clear_cookie(&self.options_for(d))))
            .collect())
    }
}
