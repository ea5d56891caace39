//! Cross-tenant impact resolution and notification payload rendering.

use crate::catalog::domain::{
    CompositeEntity, EntityId, Notification, NotificationKind, NotificationPriority,
    RefreshTotals, TenantId, TenantImpact, UserId,
};
use minijinja::Environment;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

const REFRESHED_TITLE: &str = "Tools refreshed for {{ entity_name }}";
const REFRESHED_MESSAGE: &str = "{{ added }} added, {{ modified }} modified, {{ removed }} removed \
across {{ bindings }} binding{% if bindings != 1 %}s{% endif %}.";
const SHARED_TITLE: &str = "A shared catalog used by {{ entity_name }} changed";
const SHARED_MESSAGE: &str = "{{ catalogs | join(', ') }} changed after a refresh outside your \
organization. Review the tool selection of {{ entity_name }}.";

/// Error raised when a notification template cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render {kind} notification: {reason}")]
pub struct NotificationRenderError {
    /// Notification being rendered.
    pub kind: NotificationKind,
    /// Renderer message.
    pub reason: String,
}

/// Keeps the first entity of each tenant, in the order given.
///
/// `entities` is expected oldest first, so each tenant is represented by
/// its earliest-created entity.
#[must_use]
pub fn distinct_by_tenant(entities: Vec<CompositeEntity>) -> Vec<TenantImpact> {
    let mut seen: BTreeSet<TenantId> = BTreeSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.tenant_id().clone()))
        .map(|entity| TenantImpact {
            tenant_id: entity.tenant_id().clone(),
            entity_id: entity.id(),
            entity_name: entity.name().to_owned(),
        })
        .collect()
}

/// Renders refresh notifications from fixed templates.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    link_base: String,
}

impl NotificationComposer {
    /// Creates a composer whose links are rooted at `link_base`.
    #[must_use]
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            link_base: link_base.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Returns the console link for an entity.
    #[must_use]
    pub fn link_for(&self, entity_id: EntityId) -> String {
        format!("{}/servers/{entity_id}", self.link_base)
    }

    /// Builds the normal-priority notice for the tenant that ran the refresh.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationRenderError`] when a template fails to render.
    pub fn catalog_refreshed(
        &self,
        entity: &CompositeEntity,
        totals: &RefreshTotals,
        triggered_by: &UserId,
    ) -> Result<Notification, NotificationRenderError> {
        let mut context = Map::new();
        context.insert("entity_name".to_owned(), Value::from(entity.name()));
        context.insert("added".to_owned(), Value::from(totals.added));
        context.insert("modified".to_owned(), Value::from(totals.modified));
        context.insert("removed".to_owned(), Value::from(totals.removed));
        context.insert("bindings".to_owned(), Value::from(totals.bindings));

        let kind = NotificationKind::CatalogRefreshed;
        Ok(Notification {
            kind,
            priority: NotificationPriority::Normal,
            title: render(kind, REFRESHED_TITLE, &context)?,
            message: render(kind, REFRESHED_MESSAGE, &context)?,
            link: self.link_for(entity.id()),
            tenant_id: entity.tenant_id().clone(),
            triggered_by: triggered_by.clone(),
            entity_id: entity.id(),
        })
    }

    /// Builds the high-priority notice for a tenant whose entity binds a
    /// catalog changed by someone else.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationRenderError`] when a template fails to render.
    pub fn shared_catalog_changed(
        &self,
        impact: &TenantImpact,
        catalog_names: &[String],
        triggered_by: &UserId,
    ) -> Result<Notification, NotificationRenderError> {
        let mut context = Map::new();
        context.insert(
            "entity_name".to_owned(),
            Value::from(impact.entity_name.as_str()),
        );
        context.insert(
            "catalogs".to_owned(),
            Value::Array(catalog_names.iter().map(|name| Value::from(name.as_str())).collect()),
        );

        let kind = NotificationKind::SharedCatalogChanged;
        Ok(Notification {
            kind,
            priority: NotificationPriority::High,
            title: render(kind, SHARED_TITLE, &context)?,
            message: render(kind, SHARED_MESSAGE, &context)?,
            link: self.link_for(impact.entity_id),
            tenant_id: impact.tenant_id.clone(),
            triggered_by: triggered_by.clone(),
            entity_id: impact.entity_id,
        })
    }
}

fn render(
    kind: NotificationKind,
    template: &str,
    context: &Map<String, Value>,
) -> Result<String, NotificationRenderError> {
    Environment::new()
        .render_str(template, context)
        .map_err(|error| NotificationRenderError {
            kind,
            reason: error.to_string(),
        })
}
