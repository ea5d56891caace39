//! Refresh outcome reports returned to callers.

use super::{BindingId, CatalogId, ChangeKind, ChangeSet, EntityId, TenantId, ToolChange};
use serde::Serialize;

/// Per-binding outcome of one refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingRefreshReport {
    /// Refreshed binding.
    pub binding_id: BindingId,
    /// Catalog bound by the binding.
    pub catalog_id: CatalogId,
    /// Binding display name.
    pub display_name: String,
    /// Number of tools added upstream.
    pub added: usize,
    /// Number of tools no longer served upstream.
    pub removed: usize,
    /// Number of tools whose content changed.
    pub modified: usize,
    /// Number of tools whose content is identical.
    pub unchanged: usize,
    /// Whether anything was added, removed, or modified.
    pub has_changes: bool,
    /// Whether the catalog was skipped because it is not a live remote
    /// integration.
    pub skipped: bool,
    /// Ordered per-tool diff.
    pub changes: Vec<ToolChange>,
}

impl BindingRefreshReport {
    /// Builds a report from a detector result.
    #[must_use]
    pub fn from_change_set(
        binding_id: BindingId,
        catalog_id: CatalogId,
        display_name: impl Into<String>,
        change_set: &ChangeSet,
    ) -> Self {
        let added = change_set.count(ChangeKind::Added);
        let removed = change_set.count(ChangeKind::Removed);
        let modified = change_set.count(ChangeKind::Modified);
        Self {
            binding_id,
            catalog_id,
            display_name: display_name.into(),
            added,
            removed,
            modified,
            unchanged: change_set.count(ChangeKind::Unchanged),
            has_changes: added > 0 || removed > 0 || modified > 0,
            skipped: false,
            changes: change_set.changes().to_vec(),
        }
    }

    /// Builds the zero-change entry for a catalog that is never fetched.
    #[must_use]
    pub fn skipped(
        binding_id: BindingId,
        catalog_id: CatalogId,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            binding_id,
            catalog_id,
            display_name: display_name.into(),
            added: 0,
            removed: 0,
            modified: 0,
            unchanged: 0,
            has_changes: false,
            skipped: true,
            changes: Vec::new(),
        }
    }
}

/// Counts summed over every binding in a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshTotals {
    /// Bindings visited.
    pub bindings: usize,
    /// Tools added.
    pub added: usize,
    /// Tools removed.
    pub removed: usize,
    /// Tools modified.
    pub modified: usize,
    /// Tools unchanged.
    pub unchanged: usize,
}

impl RefreshTotals {
    /// Sums the counts of every binding report.
    #[must_use]
    pub fn from_reports(reports: &[BindingRefreshReport]) -> Self {
        reports.iter().fold(Self::default(), |totals, report| Self {
            bindings: totals.bindings + 1,
            added: totals.added + report.added,
            removed: totals.removed + report.removed,
            modified: totals.modified + report.modified,
            unchanged: totals.unchanged + report.unchanged,
        })
    }
}

/// Another tenant whose composite entity binds a changed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantImpact {
    /// Impacted tenant.
    pub tenant_id: TenantId,
    /// First entity of that tenant binding a changed catalog.
    pub entity_id: EntityId,
    /// Name of that entity.
    pub entity_name: String,
}

/// Outcome of one refresh call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Always `true` for a returned report; failures surface as errors.
    pub success: bool,
    /// Refreshed entity.
    pub entity_id: EntityId,
    /// Whether the refresh ran in preview mode.
    pub dry_run: bool,
    /// Per-binding outcomes in display order.
    pub bindings: Vec<BindingRefreshReport>,
    /// Summed counts.
    pub totals: RefreshTotals,
    /// Whether any binding reported changes.
    pub has_any_changes: bool,
    /// Other tenants affected by the applied changes.
    pub affected_tenants: Vec<TenantImpact>,
}

impl RefreshReport {
    /// Assembles a report from per-binding outcomes.
    #[must_use]
    pub fn new(entity_id: EntityId, dry_run: bool, bindings: Vec<BindingRefreshReport>) -> Self {
        let totals = RefreshTotals::from_reports(&bindings);
        let has_any_changes = bindings.iter().any(|report| report.has_changes);
        Self {
            success: true,
            entity_id,
            dry_run,
            bindings,
            totals,
            has_any_changes,
            affected_tenants: Vec::new(),
        }
    }

    /// Returns the catalogs of bindings that reported changes.
    #[must_use]
    pub fn changed_catalogs(&self) -> std::collections::BTreeSet<CatalogId> {
        self.bindings
            .iter()
            .filter(|report| report.has_changes)
            .map(|report| report.catalog_id)
            .collect()
    }
}
