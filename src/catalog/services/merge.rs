//! Composition of several catalogs into one new composite entity.

use super::kind::{ErrorKind, credential_error_kind, store_error_kind};
use crate::catalog::{
    domain::{
        Binding, CatalogDomainError, CatalogId, CompositeEntity, CredentialBundle, CredentialMap,
        EntityId, NewEntityPlan, TenantId, ToolId, UserId,
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

/// Smallest number of entries a merged entity may be built from.
pub const MIN_MERGE_ENTRIES: usize = 2;

/// One catalog to include in a merged entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry {
    /// Catalog to bind.
    pub catalog_id: CatalogId,
    /// Display name of the new binding.
    pub display_name: String,
    /// Tools to allow; `None` allows every current tool of the catalog.
    pub tool_ids: Option<BTreeSet<ToolId>>,
    /// Credentials to attach; `None` reuses the tenant's latest bundle for
    /// the catalog, if any.
    pub credentials: Option<CredentialMap>,
}

impl MergeEntry {
    /// Creates an entry that allows every tool and reuses existing
    /// credentials.
    #[must_use]
    pub fn new(catalog_id: CatalogId, display_name: impl Into<String>) -> Self {
        Self {
            catalog_id,
            display_name: display_name.into(),
            tool_ids: None,
            credentials: None,
        }
    }

    /// Restricts the allow-list to `tool_ids`.
    #[must_use]
    pub fn with_tools(mut self, tool_ids: impl IntoIterator<Item = ToolId>) -> Self {
        self.tool_ids = Some(tool_ids.into_iter().collect());
        self
    }

    /// Attaches explicit credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialMap) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Input of [`TemplateMergeService::create_merged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMergedRequest {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Creating user; attached bundles are scoped to this user.
    pub user_id: UserId,
    /// Name of the new entity.
    pub name: String,
    /// Catalogs to bind, in display order.
    pub entries: Vec<MergeEntry>,
}

/// Output of a successful merge: the new entity id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedEntity {
    /// New entity identifier.
    pub id: EntityId,
}

/// Errors returned while building a merged entity.
#[derive(Debug, Clone, Error)]
pub enum MergeError {
    /// Fewer than [`MIN_MERGE_ENTRIES`] entries were supplied.
    #[error("a merged entity needs at least {MIN_MERGE_ENTRIES} catalogs, got {count}")]
    TooFewEntries {
        /// Entries supplied.
        count: usize,
    },

    /// An entry references a missing catalog.
    #[error("catalog {0} not found")]
    CatalogNotFound(CatalogId),

    /// An entry selects tools the catalog does not currently have.
    #[error("catalog {catalog_id} has no tools {}", format_tool_ids(tool_ids))]
    UnknownTools {
        /// Catalog of the offending entry.
        catalog_id: CatalogId,
        /// Offending tool ids.
        tool_ids: Vec<ToolId>,
    },

    /// A name, display name, or credential key failed validation.
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

impl MergeError {
    /// Classifies the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TooFewEntries { .. } | Self::UnknownTools { .. } | Self::Domain(_) => {
                ErrorKind::BadRequest
            }
            Self::CatalogNotFound(_) => ErrorKind::NotFound,
            Self::Seal(_) => ErrorKind::Internal,
            Self::Store(error) => store_error_kind(error),
            Self::Credentials(error) => credential_error_kind(error),
        }
    }
}

fn format_tool_ids(tool_ids: &[ToolId]) -> String {
    tool_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Builds tenant-owned composite entities from several shared catalogs.
#[derive(Clone)]
pub struct TemplateMergeService<S, K, X, C>
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

impl<S, K, X, C> TemplateMergeService<S, K, X, C>
where
    S: CatalogStore,
    K: CredentialStore,
    X: CredentialSealer,
    C: Clock + Send + Sync,
{
    /// Creates a merge service.
    #[must_use]
    pub const fn new(store: Arc<S>, credentials: Arc<K>, sealer: Arc<X>, clock: Arc<C>) -> Self {
        Self {
            store,
            credentials,
            sealer,
            clock,
        }
    }

    /// Validates every entry and then creates the entity, its bindings,
    /// and their credential bundles in one store call.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError`] when fewer than two entries are given, a
    /// catalog is missing, a tool selection or credential key is invalid,
    /// or a store fails. Nothing is written on error.
    pub async fn create_merged(&self, request: CreateMergedRequest) -> MergeResult<MergedEntity> {
        if request.entries.len() < MIN_MERGE_ENTRIES {
            return Err(MergeError::TooFewEntries {
                count: request.entries.len(),
            });
        }

        let entity = CompositeEntity::new(
            request.tenant_id.clone(),
            request.name,
            request.user_id.clone(),
            &*self.clock,
        )?;

        let mut bindings = Vec::with_capacity(request.entries.len());
        let mut bundles = Vec::new();
        for (position, entry) in (0_u32..).zip(request.entries) {
            let (binding, bundle) = self
                .prepare_binding(&entity, &request.user_id, position, entry)
                .await?;
            bindings.push(binding);
            bundles.extend(bundle);
        }

        let plan = NewEntityPlan {
            entity,
            bindings,
            bundles,
        };
        self.store.insert_entity(&plan).await?;

        info!(
            entity_id = %plan.entity.id(),
            tenant = %plan.entity.tenant_id(),
            bindings = plan.bindings.len(),
            "merged entity created"
        );
        Ok(MergedEntity {
            id: plan.entity.id(),
        })
    }

    async fn prepare_binding(
        &self,
        entity: &CompositeEntity,
        user_id: &UserId,
        position: u32,
        entry: MergeEntry,
    ) -> MergeResult<(Binding, Option<CredentialBundle>)> {
        let catalog = self
            .store
            .find_catalog(entry.catalog_id)
            .await?
            .ok_or(MergeError::CatalogNotFound(entry.catalog_id))?;
        let current: BTreeSet<ToolId> = self
            .store
            .list_tools(catalog.id())
            .await?
            .iter()
            .map(|tool| tool.id())
            .collect();

        let allowed = match entry.tool_ids {
            None => current,
            Some(selected) => {
                let unknown: Vec<ToolId> = selected.difference(&current).copied().collect();
                if !unknown.is_empty() {
                    return Err(MergeError::UnknownTools {
                        catalog_id: catalog.id(),
                        tool_ids: unknown,
                    });
                }
                selected
            }
        };

        let sealed = match entry.credentials {
            Some(credentials) => {
                catalog.ensure_declared_keys(&credentials)?;
                Some(self.sealer.seal(&credentials)?)
            }
            None => None,
        };

        let binding = Binding::new(
            entity,
            catalog.id(),
            entry.display_name,
            position,
            allowed,
            &*self.clock,
        )?;

        let bundle = match sealed {
            Some(ciphertext) => Some(CredentialBundle::new(
                binding.id(),
                entity.tenant_id().clone(),
                Some(user_id.clone()),
                ciphertext,
                &*self.clock,
            )),
            None => self
                .credentials
                .latest_bundle_for_catalog(entity.tenant_id(), catalog.id())
                .await?
                .map(|existing| {
                    existing.reattach(binding.id(), existing.user_id().cloned(), &*self.clock)
                }),
        };

        Ok((binding, bundle))
    }
}
