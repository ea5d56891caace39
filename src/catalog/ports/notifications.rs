//! Notification outbox and delivery sink ports.

use crate::catalog::domain::{Notification, NotificationId, OutboxEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for outbox operations.
pub type NotificationOutboxResult<T> = Result<T, NotificationOutboxError>;

/// Result type for sink deliveries.
pub type NotificationSinkResult<T> = Result<T, NotificationSinkError>;

/// Durable queue of notifications awaiting delivery.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Queues a pending entry.
    async fn enqueue(&self, entry: &OutboxEntry) -> NotificationOutboxResult<()>;

    /// Returns up to `limit` pending entries, fewest failed attempts first
    /// and oldest first within equal attempts.
    async fn pending(&self, limit: usize) -> NotificationOutboxResult<Vec<OutboxEntry>>;

    /// Marks an entry delivered so it is no longer pending.
    async fn mark_delivered(
        &self,
        id: NotificationId,
        delivered_at: DateTime<Utc>,
    ) -> NotificationOutboxResult<()>;

    /// Records a failed attempt; the entry stays pending.
    async fn mark_failed(&self, id: NotificationId, error: &str) -> NotificationOutboxResult<()>;
}

/// Errors returned by outbox implementations.
#[derive(Debug, Clone, Error)]
pub enum NotificationOutboxError {
    /// The entry does not exist.
    #[error("outbox entry not found: {0}")]
    NotFound(NotificationId),

    /// Persisted data could not be reconstructed.
    #[error("invalid persisted outbox entry: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("outbox persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotificationOutboxError {
    /// Wraps persisted-data decoding failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for NotificationOutboxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    async fn deliver(&self, notification: &Notification) -> NotificationSinkResult<()>;
}

/// Errors returned by notification sinks.
#[derive(Debug, Clone, Error)]
pub enum NotificationSinkError {
    /// The channel refused the payload.
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// The channel could not be reached.
    #[error("notification channel unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotificationSinkError {
    /// Wraps a channel failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
