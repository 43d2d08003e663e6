//! Signed, JSON-encoded tokens.
//!
//! A token is `base64url(HMAC(salt || secret, json) || json)` with the
//! padding stripped. Decoding checks the MAC in constant time before the
//! JSON is looked at.

use std::fmt;
use std::str::FromStr;

use authsanity_api::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// HMAC hash algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    Sha256,
    Sha384,
    #[default]
    Sha512,
}

impl HashAlg {
    /// Length of the MAC in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }
}

impl FromStr for HashAlg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlg::Sha256),
            "sha384" => Ok(HashAlg::Sha384),
            "sha512" => Ok(HashAlg::Sha512),
            other => Err(Error::Configuration(format!(
                "unsupported hash algorithm: {other}"
            ))),
        }
    }
}

/// Why a token was rejected. Never leaves a transport.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("token is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token shorter than its signature")]
    Truncated,

    #[error("signature mismatch")]
    BadSignature,

    #[error("unusable signing key")]
    Key,

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Signs and verifies JSON values with a salted secret.
#[derive(Clone)]
pub struct SignedSerializer {
    key: Vec<u8>,
    alg: HashAlg,
}

impl fmt::Debug for SignedSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedSerializer")
            .field("key", &"<redacted>")
            .field("alg", &self.alg)
            .finish()
    }
}

impl SignedSerializer {
    pub fn new(secret: &str, salt: &str, alg: HashAlg) -> Self {
        let mut key = Vec::with_capacity(salt.len() + secret.len());
        key.extend_from_slice(salt.as_bytes());
        key.extend_from_slice(secret.as_bytes());
        Self { key, alg }
    }

    pub fn alg(&self) -> HashAlg {
        self.alg
    }

    /// Serialize `value` to JSON and sign it.
    pub fn dumps<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let body = serde_json::to_vec(value)?;
        let mut out = self
            .mac(&body)
            .map_err(|_| Error::Configuration("unusable signing key".to_string()))?;
        out.extend_from_slice(&body);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Verify `token` and deserialize its payload.
    pub fn loads<T: DeserializeOwned>(&self, token: &str) -> std::result::Result<T, DecodeError> {
        let raw = URL_SAFE_NO_PAD.decode(token.trim().trim_end_matches('='))?;

        let split = self.alg.digest_len();
        if raw.len() < split {
            return Err(DecodeError::Truncated);
        }
        let (sig, body) = raw.split_at(split);

        let expected = self.mac(body).map_err(|_| DecodeError::Key)?;
        if !bool::from(expected.ct_eq(sig)) {
            return Err(DecodeError::BadSignature);
        }

        Ok(serde_json::from_slice(body)?)
    }

    fn mac(&self, data: &[u8]) -> std::result::Result<Vec<u8>, InvalidLength> {
        Ok(match self.alg {
            HashAlg::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            HashAlg::Sha384 => {
                let mut mac = Hmac::<Sha384>::new_from_slice(&self.key)?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            HashAlg::Sha512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(&self.key)?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        })
    }
}
