//! Credential sealing port.

use crate::catalog::domain::{CredentialMap, SealedCredentials};
use thiserror::Error;

/// Encrypts and decrypts credential maps at rest.
pub trait CredentialSealer: Send + Sync {
    /// Serializes and encrypts `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialSealError`] when encryption fails.
    fn seal(&self, credentials: &CredentialMap) -> Result<SealedCredentials, CredentialSealError>;

    /// Decrypts and parses a sealed bundle.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialSealError`] when the ciphertext is truncated,
    /// fails authentication, or does not decode to a credential map.
    fn open(&self, sealed: &SealedCredentials) -> Result<CredentialMap, CredentialSealError>;
}

/// Errors returned while sealing or opening credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialSealError {
    /// The sealing key is not 64 hexadecimal characters.
    #[error("credential sealing key must be 64 hex characters")]
    InvalidKey,

    /// Encryption failed.
    #[error("failed to seal credentials")]
    Seal,

    /// The ciphertext is shorter than its nonce.
    #[error("sealed credentials are truncated")]
    Truncated,

    /// Decryption or authentication failed.
    #[error("failed to open sealed credentials")]
    Open,

    /// The decrypted payload is not a credential map.
    #[error("sealed credentials are malformed: {0}")]
    Malformed(String),
}
