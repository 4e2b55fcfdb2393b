//! API credentials.
//!
//! The control plane authenticates every call with an API id and an API key.
//! Legacy endpoints expect both as form fields, newer endpoints as headers.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Form field carrying the API id on legacy endpoints.
pub const API_ID_FIELD: &str = "api_id";
/// Form field carrying the API key on legacy endpoints.
pub const API_KEY_FIELD: &str = "api_key";
/// Header carrying the API id on JSON endpoints.
pub const API_ID_HEADER: &str = "x-api-id";
/// Header carrying the API key on JSON endpoints.
pub const API_KEY_HEADER: &str = "x-api-key";

/// API id and key pair. Immutable once built.
pub struct Credentials {
    api_id: String,
    api_key: SecretString,
}

impl Credentials {
    /// Create credentials from an id and key.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is empty.
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_id = api_id.into();
        let api_key = api_key.into();

        if api_id.trim().is_empty() {
            return Err(Error::ConfigError("API id must not be empty".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(Error::ConfigError("API key must not be empty".to_string()));
        }

        Ok(Self {
            api_id,
            api_key: SecretString::from(api_key),
        })
    }

    /// The API id.
    #[must_use]
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// The API key, still wrapped.
    #[must_use]
    pub const fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Form pairs appended to legacy request bodies.
    #[must_use]
    pub fn form_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (API_ID_FIELD, self.api_id.as_str()),
            (API_KEY_FIELD, self.api_key.expose_secret()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("12345", "secret-key").unwrap();
        assert_eq!(creds.api_id(), "12345");
        assert_eq!(creds.api_key().expose_secret(), "secret-key");
    }

    #[test]
    fn test_credentials_reject_empty() {
        assert!(matches!(
            Credentials::new("", "key"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            Credentials::new("12345", "  "),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new("12345", "secret-key").unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("12345"));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_form_pairs() {
        let creds = Credentials::new("12345", "secret-key").unwrap();
        assert_eq!(
            creds.form_pairs(),
            [("api_id", "12345"), ("api_key", "secret-key")]
        );
    }
}
