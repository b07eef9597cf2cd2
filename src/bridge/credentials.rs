//! Provider key storage in the OS keyring.

use thiserror::Error;
use tracing::debug;

/// Keyring service name.
pub const SERVICE_NAME: &str = "VoiceDesk";

/// Keyring account holding the ElevenLabs key.
pub const USERNAME: &str = "elevenlabs_api_key";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Keyring error: {0}")]
    Keyring(String),
    #[error("Failed to save API key: {0}")]
    Store(String),
}

/// Where the provider key lives.
pub trait CredentialStore: Send + Sync {
    /// The stored key, or `None` when nothing is stored.
    fn load(&self) -> Result<Option<String>, CredentialError>;

    fn store(&self, api_key: &str) -> Result<(), CredentialError>;
}

/// Credential store backed by the platform keyring.
pub struct KeyringStore {
    service: String,
    username: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), username: USERNAME.to_string() }
    }

    fn entry(&self) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, &self.username).map_err(|e| CredentialError::Keyring(e.to_string()))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Result<Option<String>, CredentialError> {
        match self.entry()?.get_password() {
            Ok(password) if password.trim().is_empty() => Ok(None),
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => {
                debug!("No API key stored for service {}", self.service);
                Ok(None)
            }
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }

    fn store(&self, api_key: &str) -> Result<(), CredentialError> {
        self.entry()?.set_password(api_key).map_err(|e| CredentialError::Store(e.to_string()))
    }
}
