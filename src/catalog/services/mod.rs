//! Application services for catalog refresh, merge, binding administration,
//! and notification dispatch.

mod bindings;
mod dispatch;
mod headers;
mod impact;
mod kind;
mod merge;
mod refresh;

pub use bindings::{BindingAdminError, BindingAdminResult, BindingAdminService};
pub use dispatch::{DispatchSummary, NotificationDispatcher};
pub use headers::{HeaderBuildError, HeaderBuilder};
pub use impact::{NotificationComposer, NotificationRenderError, distinct_by_tenant};
pub use kind::ErrorKind;
pub use merge::{
    CreateMergedRequest, MIN_MERGE_ENTRIES, MergeEntry, MergeError, MergeResult, MergedEntity,
    TemplateMergeService,
};
pub use refresh::{CatalogRefreshService, RefreshError, RefreshRequest, RefreshResult};
