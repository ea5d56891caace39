//! Change detection between cached and freshly fetched tools.

use super::{CatalogTool, ToolDefinition, ToolId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Classification of one tool in a refresh diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Served upstream but not cached.
    Added,
    /// Cached but no longer served upstream.
    Removed,
    /// Served and cached with differing description or schema.
    Modified,
    /// Served and cached with identical content.
    Unchanged,
}

/// Transient diff outcome for a single tool. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolChange {
    /// Diff classification.
    pub kind: ChangeKind,
    /// Tool name, the identity used for matching.
    pub name: String,
    /// Cached tool identifier, absent for additions.
    pub tool_id: Option<ToolId>,
    /// Description before the change, recorded for modifications.
    pub previous_description: Option<String>,
    /// Input schema before the change, recorded for modifications.
    pub previous_input_schema: Option<Value>,
}

impl ToolChange {
    fn added(definition: &ToolDefinition) -> Self {
        Self {
            kind: ChangeKind::Added,
            name: definition.name().to_owned(),
            tool_id: None,
            previous_description: None,
            previous_input_schema: None,
        }
    }

    fn existing(kind: ChangeKind, tool: &CatalogTool) -> Self {
        Self {
            kind,
            name: tool.name().to_owned(),
            tool_id: Some(tool.id()),
            previous_description: None,
            previous_input_schema: None,
        }
    }

    fn modified(tool: &CatalogTool) -> Self {
        Self {
            previous_description: tool.definition().description().map(str::to_owned),
            previous_input_schema: Some(tool.definition().input_schema().clone()),
            ..Self::existing(ChangeKind::Modified, tool)
        }
    }
}

/// In-place content update for a cached tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUpdate {
    /// Cached tool to update.
    pub tool_id: ToolId,
    /// New content.
    pub definition: ToolDefinition,
}

/// Output of [`detect_changes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<ToolChange>,
    to_create: Vec<ToolDefinition>,
    to_update: Vec<ToolUpdate>,
    to_delete: BTreeSet<ToolId>,
    keep_connected: BTreeSet<ToolId>,
}

impl ChangeSet {
    /// Returns the ordered change list: fetched order, then removals in
    /// cached order.
    #[must_use]
    pub fn changes(&self) -> &[ToolChange] {
        &self.changes
    }

    /// Returns definitions to create.
    #[must_use]
    pub fn to_create(&self) -> &[ToolDefinition] {
        &self.to_create
    }

    /// Returns in-place updates.
    #[must_use]
    pub fn to_update(&self) -> &[ToolUpdate] {
        &self.to_update
    }

    /// Returns cached tools no longer served upstream.
    #[must_use]
    pub const fn to_delete(&self) -> &BTreeSet<ToolId> {
        &self.to_delete
    }

    /// Returns cached tools still served upstream.
    #[must_use]
    pub const fn keep_connected(&self) -> &BTreeSet<ToolId> {
        &self.keep_connected
    }

    /// Counts changes of one kind.
    #[must_use]
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes
            .iter()
            .filter(|change| change.kind == kind)
            .count()
    }

    /// Returns whether anything was added, removed, or modified.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.to_create.is_empty() || !self.to_update.is_empty() || !self.to_delete.is_empty()
    }
}

/// Diffs cached tools against freshly fetched definitions.
///
/// Tools are matched by exact name, so a rename surfaces as one removal and
/// one addition. When upstream serves a name twice, the first occurrence
/// wins.
#[must_use]
pub fn detect_changes(existing: &[CatalogTool], fetched: &[ToolDefinition]) -> ChangeSet {
    let cached_by_name: HashMap<&str, &CatalogTool> =
        existing.iter().map(|tool| (tool.name(), tool)).collect();

    let mut change_set = ChangeSet::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(fetched.len());

    for definition in fetched {
        if !seen.insert(definition.name()) {
            continue;
        }

        let Some(cached) = cached_by_name.get(definition.name()) else {
            change_set.changes.push(ToolChange::added(definition));
            change_set.to_create.push(definition.clone());
            continue;
        };

        change_set.keep_connected.insert(cached.id());
        if cached.matches(definition) {
            change_set
                .changes
                .push(ToolChange::existing(ChangeKind::Unchanged, cached));
        } else {
            change_set.changes.push(ToolChange::modified(cached));
            change_set.to_update.push(ToolUpdate {
                tool_id: cached.id(),
                definition: definition.clone(),
            });
        }
    }

    for cached in existing {
        if !seen.contains(cached.name()) {
            change_set
                .changes
                .push(ToolChange::existing(ChangeKind::Removed, cached));
            change_set.to_delete.insert(cached.id());
        }
    }

    change_set
}
