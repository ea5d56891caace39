//! Port contracts for catalog reconciliation and composite-entity assembly.

mod credentials;
mod fetcher;
mod notifications;
mod sealer;
mod store;

pub use credentials::{CredentialStore, CredentialStoreError, CredentialStoreResult};
pub use fetcher::{CatalogFetchError, CatalogFetchResult, CatalogFetcher};
pub use notifications::{
    NotificationOutbox, NotificationOutboxError, NotificationOutboxResult, NotificationSink,
    NotificationSinkError, NotificationSinkResult,
};
pub use sealer::{CredentialSealError, CredentialSealer};
pub use store::{CatalogStore, CatalogStoreError, CatalogStoreResult};
