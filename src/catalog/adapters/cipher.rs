//! AES-256-GCM credential sealer.
//!
//! Each sealed blob is `[12-byte nonce][ciphertext + tag]`, with a fresh
//! random nonce per seal. The plaintext is the JSON encoding of the
//! credential map.

use crate::catalog::{
    domain::{CredentialMap, SealedCredentials},
    ports::{CredentialSealError, CredentialSealer},
};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};

const NONCE_LEN: usize = 12;

/// Seals credential maps with a 256-bit AES-GCM key.
#[derive(Clone)]
pub struct AesGcmCredentialSealer {
    cipher: Aes256Gcm,
}

impl AesGcmCredentialSealer {
    /// Creates a sealer from raw key bytes.
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        let cipher_key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(cipher_key),
        }
    }

    /// Creates a sealer from a 64-character hexadecimal key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialSealError::InvalidKey`] when the value is not
    /// exactly 32 hex-encoded bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, CredentialSealError> {
        let trimmed = encoded.trim();
        if trimmed.len() != 64 || !trimmed.is_ascii() {
            return Err(CredentialSealError::InvalidKey);
        }

        let mut key = [0_u8; 32];
        for (slot, pair) in key.iter_mut().zip(trimmed.as_bytes().chunks(2)) {
            let digits = std::str::from_utf8(pair).map_err(|_| CredentialSealError::InvalidKey)?;
            *slot = u8::from_str_radix(digits, 16).map_err(|_| CredentialSealError::InvalidKey)?;
        }
        Ok(Self::new(&key))
    }
}

impl std::fmt::Debug for AesGcmCredentialSealer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("AesGcmCredentialSealer")
    }
}

impl CredentialSealer for AesGcmCredentialSealer {
    fn seal(&self, credentials: &CredentialMap) -> Result<SealedCredentials, CredentialSealError> {
        let plaintext = serde_json::to_vec(credentials)
            .map_err(|err| CredentialSealError::Malformed(err.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CredentialSealError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);
        Ok(SealedCredentials::from_bytes(blob))
    }

    fn open(&self, sealed: &SealedCredentials) -> Result<CredentialMap, CredentialSealError> {
        let bytes = sealed.as_bytes();
        if bytes.len() < NONCE_LEN {
            return Err(CredentialSealError::Truncated);
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CredentialSealError::Open)?;
        serde_json::from_slice(&plaintext)
            .map_err(|err| CredentialSealError::Malformed(err.to_string()))
    }
}
