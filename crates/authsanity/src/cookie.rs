//! `Set-Cookie` header builders.

use httpdate::fmt_http_date;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest `Max-Age` accepted, about a century. Keeps `Expires` well inside
/// what an HTTP date can express.
pub const MAX_AGE_LIMIT: u64 = 100 * 365 * 24 * 60 * 60;

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the authentication cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Cookie name.
    pub name: String,

    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// Not accessible to JS.
    pub http_only: bool,

    /// SameSite attribute; omitted when `None`.
    pub same_site: Option<SameSite>,

    /// Max-Age in seconds.
    pub max_age_seconds: Option<u64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "auth".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: None,
            max_age_seconds: None,
        }
    }
}

fn common_attributes(parts: &mut Vec<String>, opts: &CookieOptions) {
    parts.push(format!("Path={}", opts.path));

    if let Some(domain) = &opts.domain {
        parts.push(format!("Domain={domain}"));
    }

    if opts.secure {
        parts.push("Secure".to_string());
    }
    if opts.http_only {
        parts.push("HttpOnly".to_string());
    }

    if let Some(same_site) = opts.same_site {
        parts.push(format!("SameSite={}", same_site.as_str()));
    }
}

/// Build a `Set-Cookie` header value.
pub fn build_set_cookie(value: &str, opts: &CookieOptions) -> String {
    let mut parts: Vec<String> = vec![format!("{}={value}", opts.name)];
    common_attributes(&mut parts, opts);

    if let Some(max_age) = opts.max_age_seconds {
        parts.push(format!("Max-Age={max_age}"));
        // Expires for older clients, when it can be written.
        let expires = SystemTime::now()
            .checked_add(Duration::from_secs(max_age))
            .filter(|_| max_age <= MAX_AGE_LIMIT);
        if let Some(expires) = expires {
            parts.push(format!("Expires={}", fmt_http_date(expires)));
        }
    }

    parts.join("; ")
}

/// Build a `Set-Cookie` header value that clears the cookie.
pub fn build_clear_cookie(opts: &CookieOptions) -> String {
    let mut parts: Vec<String> = vec![format!("{}=", opts.name)];
    common_attributes(&mut parts, opts);

    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cookie() {
        let sc = build_set_cookie("abc", &CookieOptions::default());
        assert_eq!(sc, "auth=abc; Path=/; HttpOnly");
    }

    #[test]
    fn all_attributes() {
        let opts = CookieOptions {
            domain: Some("example.com".to_string()),
            secure: true,
            same_site: Some(SameSite::Lax),
            max_age_seconds: Some(60),
            ..Default::default()
        };
        let sc = build_set_cookie("abc", &opts);
        assert!(sc.starts_with("auth=abc; Path=/; Domain=example.com; Secure; HttpOnly"));
        assert!(sc.contains("SameSite=Lax"));
        assert!(sc.contains("Max-Age=60"));
        assert!(sc.contains("Expires="));
    }

    #[test]
    fn huge_max_age_omits_expires() {
        let opts = CookieOptions {
            max_age_seconds: Some(300_000_000_000),
            ..Default::default()
        };
        let sc = build_set_cookie("abc", &opts);
        assert!(sc.contains("Max-Age=300000000000"));
        assert!(!sc.contains("Expires="));

        let opts = CookieOptions {
            max_age_seconds: Some(u64::MAX),
            ..Default::default()
        };
        assert!(!build_set_cookie("abc", &opts).contains("Expires="));
    }

    #[test]
    fn same_site_deserializes_lowercase() {
        let parsed: SameSite = serde_json::from_str("\"lax\"").unwrap();
        assert_eq!(parsed, SameSite::Lax);
    }

    #[test]
    fn clear_cookie_has_max_age_zero() {
        let sc = build_clear_cookie(&CookieOptions::default());
        assert!(sc.starts_with("auth=;"));
        assert!(sc.contains("Max-Age=0"));
        assert!(sc.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
