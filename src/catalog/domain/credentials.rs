//! Credential bundle values and masking rules.

use super::{BindingId, CatalogDomainError, TenantId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder shown instead of a stored credential value.
pub const CREDENTIAL_MASK: &str = "********";

/// Plaintext credential key-value map.
///
/// Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialMap(BTreeMap<String, String>);

impl CredentialMap {
    /// Creates a credential map from key-value pairs.
    ///
    /// Keys are trimmed; values are kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyCredentialKey`] when a key is blank.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, CatalogDomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            let normalized = key.into().trim().to_owned();
            if normalized.is_empty() {
                return Err(CatalogDomainError::EmptyCredentialKey);
            }
            values.insert(normalized, value.into());
        }
        Ok(Self(values))
    }

    /// Returns the configured keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the value for `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of configured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over key-value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl fmt::Debug for CredentialMap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(self.0.keys().map(|key| (key, CREDENTIAL_MASK)))
            .finish()
    }
}

/// Opaque ciphertext of a sealed [`CredentialMap`].
#[derive(Clone, PartialEq, Eq)]
pub struct SealedCredentials(Vec<u8>);

impl SealedCredentials {
    /// Wraps stored ciphertext bytes.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the ciphertext bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the wrapper and returns the ciphertext bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for SealedCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "SealedCredentials({} bytes)", self.0.len())
    }
}

/// Sealed credentials attached to a binding for a tenant, optionally scoped
/// to a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    binding_id: BindingId,
    tenant_id: TenantId,
    user_id: Option<UserId>,
    sealed: SealedCredentials,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted credential bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCredentialBundleData {
    /// Owning binding.
    pub binding_id: BindingId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning user, or `None` for a tenant-wide bundle.
    pub user_id: Option<UserId>,
    /// Stored ciphertext.
    pub sealed: SealedCredentials,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CredentialBundle {
    /// Creates a bundle scoped to a binding, tenant, and optional user.
    #[must_use]
    pub fn new(
        binding_id: BindingId,
        tenant_id: TenantId,
        user_id: Option<UserId>,
        sealed: SealedCredentials,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            binding_id,
            tenant_id,
            user_id,
            sealed,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a bundle from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedCredentialBundleData) -> Self {
        Self {
            binding_id: data.binding_id,
            tenant_id: data.tenant_id,
            user_id: data.user_id,
            sealed: data.sealed,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns a copy of this bundle's ciphertext attached to another
    /// binding and owner.
    #[must_use]
    pub fn reattach(
        &self,
        binding_id: BindingId,
        user_id: Option<UserId>,
        clock: &impl Clock,
    ) -> Self {
        Self::new(
            binding_id,
            self.tenant_id.clone(),
            user_id,
            self.sealed.clone(),
            clock,
        )
    }

    /// Returns the owning binding.
    #[must_use]
    pub const fn binding_id(&self) -> BindingId {
        self.binding_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the owning user, if the bundle is user-scoped.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Returns the stored ciphertext.
    #[must_use]
    pub const fn sealed(&self) -> &SealedCredentials {
        &self.sealed
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Read view of one declared credential key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedCredentialField {
    /// Declared key name.
    pub key: String,
    /// Whether a value is stored for the key.
    pub is_set: bool,
    /// [`CREDENTIAL_MASK`] when set, otherwise `None`.
    pub display: Option<&'static str>,
}

impl MaskedCredentialField {
    /// Builds the masked view of `key` given the stored values.
    #[must_use]
    pub fn for_key(key: &str, stored: &CredentialMap) -> Self {
        let is_set = stored.get(key).is_some_and(|value| !value.is_empty());
        Self {
            key: key.to_owned(),
            is_set,
            display: is_set.then_some(CREDENTIAL_MASK),
        }
    }
}

/// OAuth access token issued by an external authorization flow.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps an issued token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("AccessToken(********)")
    }
}
