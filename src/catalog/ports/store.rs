//! Persistence port for catalogs, tools, entities, and bindings.

use crate::catalog::domain::{
    Binding, BindingId, Catalog, CatalogId, CatalogTool, CompositeEntity, EntityId, NewEntityPlan,
    ReconciliationPlan, TenantId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for catalog store operations.
pub type CatalogStoreResult<T> = Result<T, CatalogStoreError>;

/// Persistence contract for the shared catalog store and tenant bindings.
///
/// Every write method is atomic: it either applies completely or leaves the
/// store untouched.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Stores a catalog together with its initial tools.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError::DuplicateCatalog`] when the identifier
    /// already exists.
    async fn register_catalog(
        &self,
        catalog: &Catalog,
        tools: &[CatalogTool],
    ) -> CatalogStoreResult<()>;

    /// Finds a catalog by identifier.
    async fn find_catalog(&self, catalog_id: CatalogId) -> CatalogStoreResult<Option<Catalog>>;

    /// Lists the current tools of a catalog in creation order.
    async fn list_tools(&self, catalog_id: CatalogId) -> CatalogStoreResult<Vec<CatalogTool>>;

    /// Finds a composite entity by identifier.
    async fn find_entity(&self, entity_id: EntityId)
    -> CatalogStoreResult<Option<CompositeEntity>>;

    /// Lists an entity's bindings in display order.
    async fn list_bindings(&self, entity_id: EntityId) -> CatalogStoreResult<Vec<Binding>>;

    /// Finds a binding by identifier.
    async fn find_binding(&self, binding_id: BindingId) -> CatalogStoreResult<Option<Binding>>;

    /// Applies one refresh's tool mutations and allow-list deltas.
    ///
    /// Inserts run first, then in-place updates, then binding deltas, then
    /// deletes. A deleted tool is removed from every binding's allow-list.
    /// Touched bindings are stamped with `applied_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError::BindingNotFound`] when a delta targets a
    /// missing binding; nothing is written in that case.
    async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
        applied_at: DateTime<Utc>,
    ) -> CatalogStoreResult<()>;

    /// Lists entities outside `excluded_tenant` that bind any of
    /// `catalog_ids`, oldest first, without duplicates.
    async fn entities_binding_catalogs(
        &self,
        catalog_ids: &BTreeSet<CatalogId>,
        excluded_tenant: &TenantId,
    ) -> CatalogStoreResult<Vec<CompositeEntity>>;

    /// Inserts a new entity with its bindings and credential bundles.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError::DuplicateEntity`] when the entity
    /// identifier already exists.
    async fn insert_entity(&self, plan: &NewEntityPlan) -> CatalogStoreResult<()>;

    /// Persists a binding's enabled flag and update timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogStoreError::BindingNotFound`] when the binding does
    /// not exist.
    async fn save_binding_enabled(&self, binding: &Binding) -> CatalogStoreResult<()>;
}

/// Errors returned by catalog store implementations.
#[derive(Debug, Clone, Error)]
pub enum CatalogStoreError {
    /// A catalog with the same identifier already exists.
    #[error("duplicate catalog identifier: {0}")]
    DuplicateCatalog(CatalogId),

    /// An entity with the same identifier already exists.
    #[error("duplicate entity identifier: {0}")]
    DuplicateEntity(EntityId),

    /// A binding referenced by a write does not exist.
    #[error("binding not found: {0}")]
    BindingNotFound(BindingId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted catalog data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogStoreError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for CatalogStoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
