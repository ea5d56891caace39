//! Write plans handed to the store for atomic application.

use super::{
    AllowListDelta, Binding, BindingId, CatalogId, CatalogTool, CompositeEntity,
    CredentialBundle, ToolId,
};
use std::collections::{BTreeMap, BTreeSet};

/// Tool mutations for one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogToolChanges {
    catalog_id: CatalogId,
    create: Vec<CatalogTool>,
    update: Vec<CatalogTool>,
    delete: BTreeSet<ToolId>,
}

impl CatalogToolChanges {
    /// Creates an empty change list for `catalog_id`.
    #[must_use]
    pub const fn new(catalog_id: CatalogId) -> Self {
        Self {
            catalog_id,
            create: Vec::new(),
            update: Vec::new(),
            delete: BTreeSet::new(),
        }
    }

    /// Returns the affected catalog.
    #[must_use]
    pub const fn catalog_id(&self) -> CatalogId {
        self.catalog_id
    }

    /// Returns tools to insert.
    #[must_use]
    pub fn create(&self) -> &[CatalogTool] {
        &self.create
    }

    /// Returns tools whose stored content is replaced.
    #[must_use]
    pub fn update(&self) -> &[CatalogTool] {
        &self.update
    }

    /// Returns tools to hard-delete.
    #[must_use]
    pub const fn delete(&self) -> &BTreeSet<ToolId> {
        &self.delete
    }

    /// Returns whether no tool is touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Queues a tool insert.
    pub fn push_create(&mut self, tool: CatalogTool) {
        self.create.push(tool);
    }

    /// Queues a content update, folding it into a pending insert of the same
    /// tool when there is one.
    pub fn push_update(&mut self, tool: CatalogTool) {
        if let Some(pending) = self
            .create
            .iter_mut()
            .chain(self.update.iter_mut())
            .find(|pending| pending.id() == tool.id())
        {
            *pending = tool;
            return;
        }
        self.update.push(tool);
    }

    /// Queues a delete. Returns `true` when the delete cancelled a pending
    /// insert, in which case the tool never reaches storage.
    pub fn push_delete(&mut self, tool_id: ToolId) -> bool {
        self.update.retain(|pending| pending.id() != tool_id);
        let before = self.create.len();
        self.create.retain(|pending| pending.id() != tool_id);
        if self.create.len() < before {
            return true;
        }
        self.delete.insert(tool_id);
        false
    }
}

/// Allow-list delta for one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingAllowListChange {
    /// Binding to adjust.
    pub binding_id: BindingId,
    /// Connect/disconnect delta.
    pub delta: AllowListDelta,
}

/// Everything one refresh call writes, applied as a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    catalogs: BTreeMap<CatalogId, CatalogToolChanges>,
    bindings: Vec<BindingAllowListChange>,
    cancelled: BTreeSet<ToolId>,
}

impl ReconciliationPlan {
    /// Creates a plan that only adjusts one binding's allow-list.
    #[must_use]
    pub fn for_binding(change: BindingAllowListChange) -> Self {
        Self {
            catalogs: BTreeMap::new(),
            bindings: vec![change],
            cancelled: BTreeSet::new(),
        }
    }

    /// Returns per-catalog tool mutations.
    pub fn catalogs(&self) -> impl Iterator<Item = &CatalogToolChanges> {
        self.catalogs.values()
    }

    /// Returns per-binding allow-list deltas.
    #[must_use]
    pub fn bindings(&self) -> &[BindingAllowListChange] {
        &self.bindings
    }

    /// Returns whether applying the plan would write nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalogs.values().all(CatalogToolChanges::is_empty)
            && self.bindings.iter().all(|change| change.delta.is_empty())
    }

    /// Returns the catalogs whose tools change.
    #[must_use]
    pub fn touched_catalogs(&self) -> BTreeSet<CatalogId> {
        self.catalogs
            .values()
            .filter(|changes| !changes.is_empty())
            .map(CatalogToolChanges::catalog_id)
            .collect()
    }

    /// Returns the mutable change list for `catalog_id`, creating it on
    /// first use.
    pub fn catalog_mut(&mut self, catalog_id: CatalogId) -> &mut CatalogToolChanges {
        self.catalogs
            .entry(catalog_id)
            .or_insert_with(|| CatalogToolChanges::new(catalog_id))
    }

    /// Records a tool whose pending insert was cancelled by a later delete.
    pub fn cancel_tool(&mut self, tool_id: ToolId) {
        self.cancelled.insert(tool_id);
    }

    /// Queues a binding delta.
    pub fn push_binding(&mut self, change: BindingAllowListChange) {
        self.bindings.push(change);
    }

    /// Strips references to cancelled inserts from every binding delta.
    #[must_use]
    pub fn finish(mut self) -> Self {
        if !self.cancelled.is_empty() {
            for change in &mut self.bindings {
                change.delta.forget(&self.cancelled);
            }
        }
        self
    }
}

/// Everything created by one composite-entity creation, applied as a single
/// unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntityPlan {
    /// Entity to insert.
    pub entity: CompositeEntity,
    /// Bindings in display order, each with its initial allow-list.
    pub bindings: Vec<Binding>,
    /// Credential bundles attached to the new bindings.
    pub bundles: Vec<CredentialBundle>,
}
