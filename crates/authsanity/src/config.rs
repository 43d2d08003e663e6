//! Policy configuration.
//!
//! Options can come from a TOML document (`AuthConfig::from_toml_str`) or from
//! a flat map of `authsanity.*` settings (`AuthConfig::from_settings`), the
//! shape most host frameworks hand out.

use std::fmt;

use authsanity_api::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::cookie::{MAX_AGE_LIMIT, SameSite};
use crate::signed::HashAlg;

/// Prefix of every recognized flat setting.
pub const SETTINGS_PREFIX: &str = "authsanity.";

/// Which transport carries the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cookie,
    Session,
    Header,
}

impl SourceKind {
    fn needs_secret(self) -> bool {
        matches!(self, SourceKind::Cookie | SourceKind::Header)
    }

    fn parse(s: &str) -> Result<Option<Self>> {
        match s.trim() {
            "" => Ok(None),
            "cookie" => Ok(Some(SourceKind::Cookie)),
            "session" => Ok(Some(SourceKind::Session)),
            "header" => Ok(Some(SourceKind::Header)),
            other => Err(Error::Configuration(format!(
                "unknown authsanity.source: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub cookie_name: String,
    pub secure: bool,
    pub max_age: Option<u64>,
    pub httponly: bool,
    pub path: String,
    /// Domains to set the cookie for. Empty means the request's own domain.
    pub domains: Vec<String>,
    pub hashalg: HashAlg,
    pub samesite: Option<SameSite>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: "auth".to_string(),
            secure: false,
            max_age: None,
            httponly: true,
            path: "/".to_string(),
            domains: Vec::new(),
            hashalg: HashAlg::default(),
            samesite: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session key the payload is stored under.
    pub value_key: String,
    /// The host attaches a session to every request. Logins then rotate the
    /// session and logouts invalidate it. Implied by the session source.
    pub facility: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            value_key: "sanity.value".to_string(),
            facility: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub salt: String,
    pub hashalg: HashAlg,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            salt: "sanity.header.".to_string(),
            hashalg: HashAlg::default(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub source: Option<SourceKind>,
    pub secret: Option<String>,
    /// Emit `tracing` debug events for every step of the protocol.
    pub debug: bool,
    pub cookie: CookieConfig,
    pub session: SessionConfig,
    pub header: HeaderConfig,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("source", &self.source)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("debug", &self.debug)
            .field("cookie", &self.cookie)
            .field("session", &self.session)
            .field("header", &self.header)
            .finish()
    }
}

impl AuthConfig {
    /// Parse a TOML document. Options are read from an `[authsanity]` table
    /// when present, else from the top level.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Document {
            authsanity: AuthConfig,
        }

        let invalid = |e: toml::de::Error| Error::Configuration(format!("invalid TOML: {e}"));

        let doc: toml::Table = toml::from_str(s).map_err(invalid)?;
        let cfg = if doc.contains_key("authsanity") {
            toml::from_str::<Document>(s).map_err(invalid)?.authsanity
        } else {
            toml::from_str::<AuthConfig>(s).map_err(invalid)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `authsanity.*` keys out of a flat settings map. Other keys are
    /// ignored.
    pub fn from_settings<I, K, V>(settings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = AuthConfig::default();

        for (key, value) in settings {
            let Some(key) = key.as_ref().strip_prefix(SETTINGS_PREFIX) else {
                continue;
            };
            let value = value.as_ref();

            match key {
                "source" => cfg.source = SourceKind::parse(value)?,
                "secret" => cfg.secret = Some(value.to_string()),
                "debug" => cfg.debug = parse_bool(key, value)?,
                "cookie.cookie_name" => cfg.cookie.cookie_name = value.trim().to_string(),
                "cookie.secure" => cfg.cookie.secure = parse_bool(key, value)?,
                "cookie.max_age" => cfg.cookie.max_age = parse_max_age(value)?,
                "cookie.httponly" => cfg.cookie.httponly = parse_bool(key, value)?,
                "cookie.path" => cfg.cookie.path = value.trim().to_string(),
                "cookie.domains" => cfg.cookie.domains = parse_list(value),
                "cookie.hashalg" => cfg.cookie.hashalg = value.parse()?,
                "cookie.samesite" => cfg.cookie.samesite = parse_same_site(value)?,
                "session.value_key" => cfg.session.value_key = value.to_string(),
                "session.facility" => cfg.session.facility = parse_bool(key, value)?,
                "header.salt" => cfg.header.salt = value.to_string(),
                "header.hashalg" => cfg.header.hashalg = value.parse()?,
                _ => {}
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Whether a session facility is registered for this policy.
    pub fn session_facility(&self) -> bool {
        self.session.facility || self.source == Some(SourceKind::Session)
    }

    /// Check that the chosen source has what it needs.
    pub fn validate(&self) -> Result<()> {
        if let Some(source) = self.source {
            let has_secret = self.secret.as_deref().is_some_and(|s| !s.is_empty());
            if source.needs_secret() && !has_secret {
                return Err(Error::Configuration(format!(
                    "authsanity.secret is required for the {source:?} source"
                )));
            }
        }
        if self.cookie.cookie_name.is_empty() {
            return Err(Error::Configuration(
                "authsanity.cookie.cookie_name must not be empty".to_string(),
            ));
        }
        if self.cookie.max_age.is_some_and(|age| age > MAX_AGE_LIMIT) {
            return Err(Error::Configuration(format!(
                "authsanity.cookie.max_age must not exceed {MAX_AGE_LIMIT} seconds"
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "" | "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(Error::Configuration(format!(
            "authsanity.{key}: expected a boolean, got {other:?}"
        ))),
    }
}

fn parse_max_age(value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e| {
        Error::Configuration(format!("authsanity.cookie.max_age: {e}"))
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_same_site(value: &str) -> Result<Option<SameSite>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "strict" => Ok(Some(SameSite::Strict)),
        "lax" => Ok(Some(SameSite::Lax)),
        "none" => Ok(Some(SameSite::None)),
        other => Err(Error::Configuration(format!(
            "authsanity.cookie.samesite: unknown value {other:?}"
        ))),
    }
}
