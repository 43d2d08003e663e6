//! `Authorization: Bearer` transport.

use authsanity_api::{AuthPayload, AuthTransport, Header, RequestHead, Result};

use crate::signed::SignedSerializer;

pub const SCHEME: &str = "Bearer";

const VARY: &[&str] = &["Authorization"];

/// Carries the payload as a signed bearer token. Stateless: forgetting is
/// up to the client.
#[derive(Debug)]
pub struct HeaderTransport {
    serializer: SignedSerializer,
    presented: Option<String>,
    current: Option<AuthPayload>,
}

impl HeaderTransport {
    pub fn bind(serializer: &SignedSerializer, head: &RequestHead) -> Self {
        Self {
            serializer: serializer.clone(),
            presented: head.header("Authorization").map(str::to_string),
            current: None,
        }
    }

    fn decode(&self) -> AuthPayload {
        let Some(raw) = self.presented.as_deref() else {
            return AuthPayload::empty();
        };

        let token = match raw.trim().split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case(SCHEME) => token.trim(),
            _ => {
                tracing::debug!("ignoring Authorization header with another scheme");
                return AuthPayload::empty();
            }
        };

        match self.serializer.loads(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring bearer token");
                AuthPayload::empty()
            }
        }
    }
}

impl AuthTransport for HeaderTransport {
    fn vary(&self) -> &[&'static str] {
        VARY
    }

    fn get_value(&mut self) -> AuthPayload {
        if self.current.is_none() {
            self.current = Some(self.decode());
        }
        self.current.clone().unwrap_or_default()
    }

    fn headers_remember(&mut self, payload: &AuthPayload) -> Result<Vec<Header>> {
        let token = self.serializer.dumps(payload)?;
        Ok(vec![Header::new("Authorization", format!("{SCHEME} {token}"))])
    }

    fn headers_forget(&mut self) -> Result<Vec<Header>> {
        Ok(Vec::new())
    }
}
