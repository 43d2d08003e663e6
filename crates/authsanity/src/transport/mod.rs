//! The three credential transports and the factory that binds one of them to
//! each request.

mod cookie;
mod header;
mod session;

pub use cookie::{COOKIE_SALT, CookieSettings, CookieTransport};
pub use header::{HeaderTransport, SCHEME};
pub use session::SessionTransport;

use authsanity_api::{AuthTransport, Error, RequestHead, Result};

use crate::config::{AuthConfig, SourceKind};
use crate::cookie::CookieOptions;
use crate::signed::SignedSerializer;

/// Per-policy transport settings, ready to be bound to requests.
#[derive(Debug, Clone)]
pub enum TransportFactory {
    Cookie(CookieSettings),
    Session { value_key: String },
    Header(SignedSerializer),
}

impl TransportFactory {
    /// Build the factory selected by `cfg.source`, or `None` when no source is
    /// configured.
    pub fn from_config(cfg: &AuthConfig) -> Result<Option<Self>> {
        let Some(source) = cfg.source else {
            return Ok(None);
        };

        let secret = || {
            cfg.secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "authsanity.secret is required for the {source:?} source"
                    ))
                })
        };

        let factory = match source {
            SourceKind::Cookie => {
                let c = &cfg.cookie;
                TransportFactory::Cookie(CookieSettings {
                    serializer: SignedSerializer::new(secret()?, COOKIE_SALT, c.hashalg),
                    options: CookieOptions {
                        name: c.cookie_name.clone(),
                        path: c.path.clone(),
                        domain: None,
                        secure: c.secure,
                        http_only: c.httponly,
                        same_site: c.samesite,
                        max_age_seconds: c.max_age,
                    },
                    domains: c.domains.clone(),
                })
            }
            SourceKind::Session => TransportFactory::Session {
                value_key: cfg.session.value_key.clone(),
            },
            SourceKind::Header => TransportFactory::Header(SignedSerializer::new(
                secret()?,
                &cfg.header.salt,
                cfg.header.hashalg,
            )),
        };
        Ok(Some(factory))
    }

    /// A transport bound to `head`.
    pub fn bind(&self, head: &RequestHead) -> Box<dyn AuthTransport> {
        match self {
            TransportFactory::Cookie(settings) => Box::new(CookieTransport::bind(settings, head)),
            TransportFactory::Session { value_key } => {
                Box::new(SessionTransport::bind(value_key, head))
            }
            TransportFactory::Header(serializer) => {
                Box::new(HeaderTransport::bind(serializer, head))
            }
        }
    }
}
