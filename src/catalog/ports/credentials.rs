//! Credential store port for OAuth tokens and sealed credential bundles.

use crate::catalog::domain::{AccessToken, BindingId, CatalogId, CredentialBundle, TenantId, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for credential store operations.
pub type CredentialStoreResult<T> = Result<T, CredentialStoreError>;

/// Read and upsert contract for per-binding credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds the OAuth access token issued for `(binding, tenant, user)`.
    async fn find_access_token(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> CredentialStoreResult<Option<AccessToken>>;

    /// Finds the credential bundle for a binding, preferring the user's own
    /// row and falling back to the tenant-wide row.
    async fn find_bundle(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> CredentialStoreResult<Option<CredentialBundle>>;

    /// Finds the most recently created bundle attached to any binding of
    /// `catalog_id` within `tenant_id`.
    async fn latest_bundle_for_catalog(
        &self,
        tenant_id: &TenantId,
        catalog_id: CatalogId,
    ) -> CredentialStoreResult<Option<CredentialBundle>>;

    /// Inserts or replaces the bundle scoped to its binding, tenant, and
    /// user.
    async fn upsert_bundle(&self, bundle: &CredentialBundle) -> CredentialStoreResult<()>;
}

/// Errors returned by credential store implementations.
#[derive(Debug, Clone, Error)]
pub enum CredentialStoreError {
    /// Persistence-layer failure.
    #[error("credential persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CredentialStoreError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for CredentialStoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
