//! Credential management for the Perplexity API key.
//!
//! Provides syntactic key validation plus secure storage using the system
//! keyring with environment variable fallback for CI/deployment scenarios.
//!
//! # Example
//!
//! ```ignore
//! use plexi_client::auth::CredentialStore;
//!
//! let store = CredentialStore::new("plexi").with_env_fallback();
//!
//! // Store a key in the system keyring
//! store.set("pplx-...")?;
//!
//! // Retrieve it (checks keyring first, then PERPLEXITY_API_KEY)
//! let key = store.get()?;
//! ```

use std::env;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{Error, Result};

/// Substring every valid Perplexity API key carries.
pub const KEY_PREFIX: &str = "pplx-";

/// Environment variable consulted by the fallback lookup.
pub const ENV_VAR: &str = "PERPLEXITY_API_KEY";

/// Default keyring service name.
pub const SERVICE_NAME: &str = "plexi";

/// Keyring entry name under the service.
const KEYRING_USER: &str = "perplexity";

/// Check that a key is syntactically acceptable.
///
/// Purely local: no network traffic. The checks run in order and the first
/// violation wins.
///
/// # Errors
///
/// Returns `Error::MissingKey` for an empty key, `Error::InvalidKey` when the
/// `pplx-` marker is absent or the key contains characters outside the
/// printable ASCII range (space through tilde).
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::MissingKey);
    }
    if !key.contains(KEY_PREFIX) {
        return Err(Error::InvalidKey("missing the pplx- prefix"));
    }
    if !key.chars().all(|c| (' '..='~').contains(&c)) {
        return Err(Error::InvalidKey(
            "contains characters outside printable ASCII",
        ));
    }
    Ok(())
}

/// A secure API key that prevents accidental logging.
///
/// The key is wrapped in `SecretString` which:
/// - Implements `Debug` as `"[REDACTED]"`
/// - Zeroizes memory on drop
/// - Requires explicit `.expose_secret()` to access the value
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to the API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Secure credential storage with system keyring and environment fallback.
///
/// # Storage Priority
///
/// When retrieving the key:
/// 1. System keyring (if available)
/// 2. `PERPLEXITY_API_KEY` (if `env_fallback` is enabled)
///
/// When storing the key, only the keyring is written; the environment is
/// read-only.
pub struct CredentialStore {
    service_name: String,
    env_fallback: bool,
}

impl CredentialStore {
    /// Create a new credential store.
    ///
    /// # Arguments
    ///
    /// * `service_name` - Service identifier for the keyring (e.g. "plexi")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            env_fallback: false,
        }
    }

    /// Enable environment variable fallback.
    ///
    /// When enabled, if the key is not found in the keyring the store checks
    /// `PERPLEXITY_API_KEY`.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// Get the stored API key.
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialsNotFound` if no key is found anywhere.
    pub fn get(&self) -> Result<ApiKey> {
        if let Some(key) = self.get_from_keyring() {
            debug!("retrieved API key from keyring");
            return Ok(key);
        }

        if self.env_fallback
            && let Some(key) = self.get_from_env()
        {
            debug!("retrieved API key from environment");
            return Ok(key);
        }

        Err(Error::CredentialsNotFound(KEYRING_USER.to_string()))
    }

    /// Store an API key in the system keyring.
    ///
    /// # Errors
    ///
    /// Returns `Error::Keyring` if the keyring operation fails.
    pub fn set(&self, key: &str) -> Result<()> {
        let entry = self.keyring_entry()?;
        entry
            .set_password(key)
            .map_err(|e| Error::Keyring(e.to_string()))?;
        debug!("stored API key in keyring");
        Ok(())
    }

    /// Delete the API key from the system keyring.
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialsNotFound` if no key is stored, or
    /// `Error::Keyring` for any other keyring failure.
    pub fn delete(&self) -> Result<()> {
        let entry = self.keyring_entry()?;
        entry.delete_credential().map_err(|e| match e {
            keyring::Error::NoEntry => Error::CredentialsNotFound(KEYRING_USER.to_string()),
            _ => Error::Keyring(e.to_string()),
        })?;
        debug!("deleted API key from keyring");
        Ok(())
    }

    /// Check if a key is available from any source.
    pub fn has(&self) -> bool {
        self.get().is_ok()
    }

    /// Get the source of the stored key, if any.
    pub fn source(&self) -> Option<CredentialSource> {
        if self.get_from_keyring().is_some() {
            Some(CredentialSource::Keyring)
        } else if self.env_fallback && self.get_from_env().is_some() {
            Some(CredentialSource::Environment)
        } else {
            None
        }
    }

    fn keyring_entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service_name, KEYRING_USER)
            .map_err(|e| Error::Keyring(e.to_string()))
    }

    fn get_from_keyring(&self) -> Option<ApiKey> {
        let entry = self.keyring_entry().ok()?;
        entry.get_password().ok().map(ApiKey::new)
    }

    fn get_from_env(&self) -> Option<ApiKey> {
        env::var(ENV_VAR).ok().map(ApiKey::new)
    }
}

/// Source of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Stored in system keyring.
    Keyring,
    /// From environment variable.
    Environment,
}
