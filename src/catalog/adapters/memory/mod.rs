//! In-memory adapters for tests and local deterministic flows.

mod fetcher;
mod outbox;
mod store;

pub use fetcher::InMemoryCatalogFetcher;
pub use outbox::{InMemoryNotificationOutbox, RecordingNotificationSink};
pub use store::InMemoryCatalogStore;
