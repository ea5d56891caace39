//! Manual administration of a tenant's bindings.

use super::{
    headers::open_or_empty,
    kind::{ErrorKind, credential_error_kind, store_error_kind},
};
use crate::catalog::{
    domain::{
        AllowListDelta, Binding, BindingAllowListChange, BindingId, CREDENTIAL_MASK, Catalog,
        CatalogDomainError, CatalogId, CredentialBundle, CredentialMap, MaskedCredentialField,
        ReconciliationPlan, TenantId, ToolId, UserId,
    },
    ports::{
        CatalogStore, CatalogStoreError, CredentialSealError, CredentialSealer, CredentialStore,
        CredentialStoreError,
    },
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors returned by [`BindingAdminService`].
#[derive(Debug, Clone, Error)]
pub enum BindingAdminError {
    /// The binding does not exist in the requesting tenant.
    #[error("binding {0} not found")]
    BindingNotFound(BindingId),

    /// The binding's catalog no longer exists.
    #[error("catalog {0} not found")]
    CatalogNotFound(CatalogId),

    /// The tool does not belong to the binding's catalog.
    #[error("tool {tool_id} is not part of the catalog bound by {binding_id}")]
    ToolNotInCatalog {
        /// Binding being edited.
        binding_id: BindingId,
        /// Rejected tool.
        tool_id: ToolId,
    },

    /// Credential keys failed validation.
    #[error(transparent)]
    Domain(#[from] CatalogDomainError),

    /// Credentials could not be sealed.
    #[error(transparent)]
    Seal(#[from] CredentialSealError),

    /// The catalog store failed.
    #[error(transparent)]
    Store(#[from] CatalogStoreError),

    /// The credential store failed.
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
}

impl BindingAdminError {
    /// Classifies the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BindingNotFound(_) | Self::CatalogNotFound(_) => ErrorKind::NotFound,
            Self::ToolNotInCatalog { .. } | Self::Domain(_) => ErrorKind::BadRequest,
            Self::Seal(_) => ErrorKind::Internal,
            Self::Store(error) => store_error_kind(error),
            Self::Credentials(error) => credential_error_kind(error),
        }
    }
}

/// Result type for binding administration.
pub type BindingAdminResult<T> = Result<T, BindingAdminError>;

/// Enable/disable, per-tool toggles, and credential management for
/// bindings.
#[derive(Clone)]
pub struct BindingAdminService<S, K, X, C>
where
    S: CatalogStore,
    K: CredentialStore,
    X: CredentialSealer,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    credentials: Arc<K>,
    sealer: Arc<X>,
    clock: Arc<C>,
}

impl<S, K, X, C> BindingAdminService<S, K, X, C>
where
    S: CatalogStore,
    K: CredentialStore,
    X: CredentialSealer,
    C: Clock + Send + Sync,
{
    /// Creates a binding administration service.
    #[must_use]
    pub const fn new(store: Arc<S>, credentials: Arc<K>, sealer: Arc<X>, clock: Arc<C>) -> Self {
        Self {
            store,
            credentials,
            sealer,
            clock,
        }
    }

    async fn find_binding_in_tenant(
        &self,
        tenant_id: &TenantId,
        binding_id: BindingId,
    ) -> BindingAdminResult<Binding> {
        self.store
            .find_binding(binding_id)
            .await?
            .filter(|binding| binding.tenant_id() == tenant_id)
            .ok_or(BindingAdminError::BindingNotFound(binding_id))
    }

    async fn catalog_of(&self, binding: &Binding) -> BindingAdminResult<Catalog> {
        self.store
            .find_catalog(binding.catalog_id())
            .await?
            .ok_or(BindingAdminError::CatalogNotFound(binding.catalog_id()))
    }

    /// Enables or disables a binding.
    ///
    /// # Errors
    ///
    /// Returns [`BindingAdminError::BindingNotFound`] when the binding is not
    /// in `tenant_id`, or store failures.
    pub async fn set_binding_enabled(
        &self,
        tenant_id: &TenantId,
        binding_id: BindingId,
        enabled: bool,
    ) -> BindingAdminResult<Binding> {
        let mut binding = self.find_binding_in_tenant(tenant_id, binding_id).await?;
        binding.set_enabled(enabled, self.clock.utc());
        self.store.save_binding_enabled(&binding).await?;
        info!(%binding_id, enabled, "binding toggled");
        Ok(binding)
    }

    /// Connects or disconnects one tool on a binding's allow-list.
    ///
    /// The change is written as a single-tool delta, leaving every other
    /// allow-list entry as stored.
    ///
    /// # Errors
    ///
    /// Returns [`BindingAdminError::ToolNotInCatalog`] when the tool belongs
    /// to another catalog, [`BindingAdminError::BindingNotFound`] when the
    /// binding is not in `tenant_id`, or store failures.
    pub async fn set_tool_connected(
        &self,
        tenant_id: &TenantId,
        binding_id: BindingId,
        tool_id: ToolId,
        connected: bool,
    ) -> BindingAdminResult<Binding> {
        let binding = self.find_binding_in_tenant(tenant_id, binding_id).await?;
        let in_catalog = self
            .store
            .list_tools(binding.catalog_id())
            .await?
            .iter()
            .any(|tool| tool.id() == tool_id);
        if !in_catalog {
            return Err(BindingAdminError::ToolNotInCatalog {
                binding_id,
                tool_id,
            });
        }

        let single = BTreeSet::from([tool_id]);
        let delta = if connected {
            AllowListDelta::new(single, BTreeSet::new())
        } else {
            AllowListDelta::new(BTreeSet::new(), single)
        };
        let plan = ReconciliationPlan::for_binding(BindingAllowListChange { binding_id, delta });
        self.store
            .apply_reconciliation(&plan, self.clock.utc())
            .await?;

        self.find_binding_in_tenant(tenant_id, binding_id).await
    }

    /// Stores credentials for a binding, scoped to `user_id` or tenant-wide.
    ///
    /// A value equal to [`CREDENTIAL_MASK`] keeps the currently stored value
    /// for that key, so a masked read can be submitted back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::UndeclaredCredentialKeys`] (as
    /// [`BindingAdminError::Domain`]) for keys the catalog does not declare,
    /// [`BindingAdminError::BindingNotFound`] when the binding is not in
    /// `tenant_id`, or sealing and store failures.
    pub async fn upsert_credentials(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
        binding_id: BindingId,
        submitted: &CredentialMap,
    ) -> BindingAdminResult<Vec<MaskedCredentialField>> {
        let binding = self.find_binding_in_tenant(tenant_id, binding_id).await?;
        let catalog = self.catalog_of(&binding).await?;
        catalog.ensure_declared_keys(submitted)?;

        let stored = self
            .credentials
            .find_bundle(binding_id, tenant_id, user_id)
            .await?
            .map(|bundle| open_or_empty(self.sealer.as_ref(), &bundle))
            .unwrap_or_default();
        let merged = CredentialMap::from_pairs(submitted.iter().filter_map(|(key, value)| {
            if value == CREDENTIAL_MASK {
                stored.get(key).map(|kept| (key, kept))
            } else {
                Some((key, value))
            }
        }))?;

        let bundle = CredentialBundle::new(
            binding_id,
            tenant_id.clone(),
            user_id.cloned(),
            self.sealer.seal(&merged)?,
            &*self.clock,
        );
        self.credentials.upsert_bundle(&bundle).await?;
        info!(%binding_id, keys = merged.len(), user_scoped = user_id.is_some(), "credentials stored");

        Ok(mask(&catalog, &merged))
    }

    /// Describes which declared credential keys are set, never returning
    /// stored values.
    ///
    /// # Errors
    ///
    /// Returns [`BindingAdminError::BindingNotFound`] when the binding is not
    /// in `tenant_id`, or store failures.
    pub async fn describe_credentials(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
        binding_id: BindingId,
    ) -> BindingAdminResult<Vec<MaskedCredentialField>> {
        let binding = self.find_binding_in_tenant(tenant_id, binding_id).await?;
        let catalog = self.catalog_of(&binding).await?;
        let stored = self
            .credentials
            .find_bundle(binding_id, tenant_id, user_id)
            .await?
            .map(|bundle| open_or_empty(self.sealer.as_ref(), &bundle))
            .unwrap_or_default();
        Ok(mask(&catalog, &stored))
    }
}

fn mask(catalog: &Catalog, stored: &CredentialMap) -> Vec<MaskedCredentialField> {
    catalog
        .credential_keys()
        .iter()
        .map(|key| MaskedCredentialField::for_key(key, stored))
        .collect()
}
