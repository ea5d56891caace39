//! Tenant-owned composite entities and their catalog bindings.

use super::{BindingId, CatalogDomainError, CatalogId, EntityId, TenantId, ToolId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tenant-owned aggregate of ordered catalog bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeEntity {
    id: EntityId,
    tenant_id: TenantId,
    name: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted composite entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEntityData {
    /// Persisted entity identifier.
    pub id: EntityId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// User who created the entity.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CompositeEntity {
    /// Creates a new composite entity.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyEntityName`] when the name is blank.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        created_by: UserId,
        clock: &impl Clock,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyEntityName);
        }

        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            name: normalized_name,
            created_by,
            created_at: clock.utc(),
        })
    }

    /// Reconstructs an entity from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedEntityData) -> Self {
        Self {
            id: data.id,
            tenant_id: data.tenant_id,
            name: data.name,
            created_by: data.created_by,
            created_at: data.created_at,
        }
    }

    /// Returns the entity identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the creating user.
    #[must_use]
    pub const fn created_by(&self) -> &UserId {
        &self.created_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Connect/disconnect delta for one binding's allow-list.
///
/// Deltas never replace the allow-list wholesale, so concurrent manual
/// toggles on unrelated tools survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListDelta {
    connect: BTreeSet<ToolId>,
    disconnect: BTreeSet<ToolId>,
}

impl AllowListDelta {
    /// Builds a delta from explicit connect and disconnect sets.
    #[must_use]
    pub const fn new(connect: BTreeSet<ToolId>, disconnect: BTreeSet<ToolId>) -> Self {
        Self {
            connect,
            disconnect,
        }
    }

    /// Computes the refresh delta for a binding.
    ///
    /// `connect = (reconnect ∪ created) − connected` and
    /// `disconnect = removed ∩ connected`.
    #[must_use]
    pub fn for_refresh(
        connected: &BTreeSet<ToolId>,
        reconnect: &BTreeSet<ToolId>,
        created: &BTreeSet<ToolId>,
        removed: &BTreeSet<ToolId>,
    ) -> Self {
        let connect = reconnect
            .union(created)
            .filter(|tool_id| !connected.contains(tool_id))
            .copied()
            .collect();
        let disconnect = removed.intersection(connected).copied().collect();
        Self {
            connect,
            disconnect,
        }
    }

    /// Returns tools to add to the allow-list.
    #[must_use]
    pub const fn connect(&self) -> &BTreeSet<ToolId> {
        &self.connect
    }

    /// Returns tools to remove from the allow-list.
    #[must_use]
    pub const fn disconnect(&self) -> &BTreeSet<ToolId> {
        &self.disconnect
    }

    /// Returns whether the delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connect.is_empty() && self.disconnect.is_empty()
    }

    /// Drops connects for tools that will never exist.
    pub fn forget(&mut self, tool_ids: &BTreeSet<ToolId>) {
        self.connect.retain(|tool_id| !tool_ids.contains(tool_id));
        self.disconnect.retain(|tool_id| !tool_ids.contains(tool_id));
    }
}

/// Tenant-scoped attachment of a catalog into a composite entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    id: BindingId,
    entity_id: EntityId,
    tenant_id: TenantId,
    catalog_id: CatalogId,
    display_name: String,
    enabled: bool,
    position: u32,
    allowed_tools: BTreeSet<ToolId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBindingData {
    /// Persisted binding identifier.
    pub id: BindingId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Bound catalog.
    pub catalog_id: CatalogId,
    /// Display name.
    pub display_name: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Display order inside the entity.
    pub position: u32,
    /// Allow-listed tools.
    pub allowed_tools: BTreeSet<ToolId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Binding {
    /// Creates an enabled binding of `catalog_id` inside `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyDisplayName`] when the display name
    /// is blank.
    pub fn new(
        entity: &CompositeEntity,
        catalog_id: CatalogId,
        display_name: impl Into<String>,
        position: u32,
        allowed_tools: BTreeSet<ToolId>,
        clock: &impl Clock,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_name = display_name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyDisplayName);
        }

        let timestamp = clock.utc();
        Ok(Self {
            id: BindingId::new(),
            entity_id: entity.id(),
            tenant_id: entity.tenant_id().clone(),
            catalog_id,
            display_name: normalized_name,
            enabled: true,
            position,
            allowed_tools,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a binding from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedBindingData) -> Self {
        Self {
            id: data.id,
            entity_id: data.entity_id,
            tenant_id: data.tenant_id,
            catalog_id: data.catalog_id,
            display_name: data.display_name,
            enabled: data.enabled,
            position: data.position,
            allowed_tools: data.allowed_tools,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the binding identifier.
    #[must_use]
    pub const fn id(&self) -> BindingId {
        self.id
    }

    /// Returns the owning entity.
    #[must_use]
    pub const fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the bound catalog.
    #[must_use]
    pub const fn catalog_id(&self) -> CatalogId {
        self.catalog_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns whether the binding is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the display position inside the entity.
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Returns the allow-listed tools.
    #[must_use]
    pub const fn allowed_tools(&self) -> &BTreeSet<ToolId> {
        &self.allowed_tools
    }

    /// Returns whether `tool_id` is allow-listed.
    #[must_use]
    pub fn is_connected(&self, tool_id: ToolId) -> bool {
        self.allowed_tools.contains(&tool_id)
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

    /// Applies a connect/disconnect delta to the allow-list, stamping the
    /// binding with `applied_at` when anything changes.
    pub fn apply_delta(&mut self, delta: &AllowListDelta, applied_at: DateTime<Utc>) {
        if delta.is_empty() {
            return;
        }
        self.allowed_tools.extend(delta.connect().iter().copied());
        self.allowed_tools
            .retain(|tool_id| !delta.disconnect().contains(tool_id));
        self.updated_at = applied_at;
    }

    /// Removes a tool that no longer exists anywhere.
    pub fn forget_tool(&mut self, tool_id: ToolId) {
        self.allowed_tools.remove(&tool_id);
    }

    /// Enables or disables the binding.
    pub fn set_enabled(&mut self, enabled: bool, updated_at: DateTime<Utc>) {
        self.enabled = enabled;
        self.updated_at = updated_at;
    }
}
