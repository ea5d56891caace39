//! Resolution of per-tenant auth material into upstream request headers.

use crate::catalog::{
    domain::{
        AuthMode, BindingId, CredentialBundle, CredentialMap, TenantId, UpstreamHeaders, UserId,
    },
    ports::{CredentialSealer, CredentialStore, CredentialStoreError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned while building upstream headers.
#[derive(Debug, Clone, Error)]
pub enum HeaderBuildError {
    /// The catalog uses OAuth and no token was issued for this user.
    #[error("no OAuth access token for binding {binding_id}")]
    MissingAccessToken {
        /// Binding that needs a token.
        binding_id: BindingId,
    },

    /// The credential store failed.
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
}

/// Builds the header map sent with an upstream catalog call.
#[derive(Clone)]
pub struct HeaderBuilder<K, X>
where
    K: CredentialStore,
    X: CredentialSealer,
{
    credentials: Arc<K>,
    sealer: Arc<X>,
}

impl<K, X> HeaderBuilder<K, X>
where
    K: CredentialStore,
    X: CredentialSealer,
{
    /// Creates a header builder.
    #[must_use]
    pub const fn new(credentials: Arc<K>, sealer: Arc<X>) -> Self {
        Self {
            credentials,
            sealer,
        }
    }

    /// Resolves headers for `binding_id` on behalf of `user_id`.
    ///
    /// API-key bundles that cannot be opened degrade to an empty map and
    /// are reported through a `warn` event.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderBuildError::MissingAccessToken`] for OAuth catalogs
    /// without a stored token, or store failures.
    pub async fn build(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: &UserId,
        auth_mode: AuthMode,
    ) -> Result<UpstreamHeaders, HeaderBuildError> {
        match auth_mode {
            AuthMode::None => Ok(UpstreamHeaders::new()),
            AuthMode::OAuth => {
                let token = self
                    .credentials
                    .find_access_token(binding_id, tenant_id, user_id)
                    .await?
                    .ok_or(HeaderBuildError::MissingAccessToken { binding_id })?;
                let mut headers = UpstreamHeaders::new();
                headers.insert(
                    "Authorization".to_owned(),
                    format!("Bearer {}", token.as_str()),
                );
                Ok(headers)
            }
            AuthMode::ApiKey => {
                let bundle = self
                    .credentials
                    .find_bundle(binding_id, tenant_id, Some(user_id))
                    .await?;
                let Some(stored) = bundle else {
                    debug!(%binding_id, tenant = %tenant_id, "no credential bundle; sending no auth headers");
                    return Ok(UpstreamHeaders::new());
                };
                Ok(open_or_empty(self.sealer.as_ref(), &stored)
                    .iter()
                    .filter(|(_, value)| !value.is_empty())
                    .map(|(key, value)| (key.to_owned(), value.to_owned()))
                    .collect())
            }
        }
    }
}

/// Opens a stored bundle, logging and returning an empty map when the
/// ciphertext cannot be opened or parsed.
pub(super) fn open_or_empty<X>(sealer: &X, bundle: &CredentialBundle) -> CredentialMap
where
    X: CredentialSealer + ?Sized,
{
    sealer.open(bundle.sealed()).unwrap_or_else(|err| {
        warn!(
            binding_id = %bundle.binding_id(),
            tenant = %bundle.tenant_id(),
            error = %err,
            "stored credentials could not be opened; falling back to empty credentials"
        );
        CredentialMap::default()
    })
}
