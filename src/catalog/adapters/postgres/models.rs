//! Diesel row models for catalog persistence.

use super::schema::{
    binding_tools, bindings, catalog_tools, catalogs, composite_entities, credential_bundles,
    notification_outbox,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

/// Query and insert row for catalogs.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = catalogs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogRow {
    /// Catalog identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Catalog kind.
    pub kind: String,
    /// Upstream transport.
    pub transport: String,
    /// Upstream base URL.
    pub base_url: Option<String>,
    /// Auth mode.
    pub auth_mode: String,
    /// Declared credential keys.
    pub credential_keys: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for catalog tools.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = catalog_tools)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogToolRow {
    /// Tool identifier.
    pub id: Uuid,
    /// Owning catalog.
    pub catalog_id: Uuid,
    /// Tool name.
    pub name: String,
    /// Normalized description.
    pub description: Option<String>,
    /// Input schema.
    pub input_schema: Value,
    /// Content fingerprint.
    pub fingerprint: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for composite entities.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = composite_entities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EntityRow {
    /// Entity identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Creating user.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query and insert row for bindings.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = bindings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BindingRow {
    /// Binding identifier.
    pub id: Uuid,
    /// Owning entity.
    pub entity_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Bound catalog.
    pub catalog_id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Display order.
    pub position: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert row for one allow-list entry.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = binding_tools)]
pub struct BindingToolRow {
    /// Binding.
    pub binding_id: Uuid,
    /// Allow-listed tool.
    pub tool_id: Uuid,
}

/// Query and insert row for credential bundles.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = credential_bundles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CredentialBundleRow {
    /// Row identifier.
    pub id: Uuid,
    /// Owning binding.
    pub binding_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning user.
    pub user_id: Option<String>,
    /// Ciphertext.
    pub sealed: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for outbox entries.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = notification_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxRow {
    /// Entry identifier.
    pub id: Uuid,
    /// Recipient tenant.
    pub tenant_id: String,
    /// Serialized notification.
    pub payload: Value,
    /// Failed attempts.
    pub attempts: i32,
    /// Latest failure.
    pub last_error: Option<String>,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
    /// Delivery timestamp.
    pub delivered_at: Option<DateTime<Utc>>,
}
