//! Domain model for shared tool catalogs and tenant bindings.
//!
//! Catalogs and their tools are global and tenant-independent. Composite
//! entities and their bindings are tenant-owned, and each binding carries an
//! allow-list that stays a subset of its catalog's current tools. Change
//! detection, write plans, and refresh reports are pure values computed here
//! and persisted by adapters.

mod binding;
mod catalog;
mod changes;
mod credentials;
mod error;
mod ids;
mod notification;
mod plan;
mod report;
mod tool;

pub use binding::{AllowListDelta, Binding, CompositeEntity, PersistedBindingData, PersistedEntityData};
pub use catalog::{
    AuthMode, Catalog, CatalogKind, CatalogTransport, PersistedCatalogData, UpstreamEndpoint,
    UpstreamHeaders,
};
pub use changes::{ChangeKind, ChangeSet, ToolChange, ToolUpdate, detect_changes};
pub use credentials::{
    AccessToken, CREDENTIAL_MASK, CredentialBundle, CredentialMap, MaskedCredentialField,
    PersistedCredentialBundleData, SealedCredentials,
};
pub use error::{
    CatalogDomainError, ParseAuthModeError, ParseCatalogKindError, ParseCatalogTransportError,
};
pub use ids::{BindingId, CatalogId, EntityId, NotificationId, TenantId, ToolId, UserId};
pub use notification::{Notification, NotificationKind, NotificationPriority, OutboxEntry};
pub use plan::{BindingAllowListChange, CatalogToolChanges, NewEntityPlan, ReconciliationPlan};
pub use report::{BindingRefreshReport, RefreshReport, RefreshTotals, TenantImpact};
pub use tool::{CatalogTool, PersistedToolData, ToolDefinition, ToolFingerprint, canonicalize_schema};
