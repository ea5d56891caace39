//! In-memory notification outbox and recording sink.

use crate::catalog::{
    domain::{Notification, NotificationId, OutboxEntry, TenantId},
    ports::{
        NotificationOutbox, NotificationOutboxError, NotificationOutboxResult, NotificationSink,
        NotificationSinkError, NotificationSinkResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory notification outbox.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationOutbox {
    entries: Arc<RwLock<Vec<StoredEntry>>>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: OutboxEntry,
    delivered_at: Option<DateTime<Utc>>,
}

impl InMemoryNotificationOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every entry ever enqueued, delivered or not, in enqueue
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationOutboxError::Persistence`] when lock
    /// acquisition fails.
    pub fn all_entries(&self) -> NotificationOutboxResult<Vec<OutboxEntry>> {
        let entries = self.entries.read().map_err(|err| {
            NotificationOutboxError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(entries.iter().map(|stored| stored.entry.clone()).collect())
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryNotificationOutbox {
    async fn enqueue(&self, entry: &OutboxEntry) -> NotificationOutboxResult<()> {
        let mut entries = self.entries.write().map_err(|err| {
            NotificationOutboxError::persistence(std::io::Error::other(err.to_string()))
        })?;
        entries.push(StoredEntry {
            entry: entry.clone(),
            delivered_at: None,
        });
        Ok(())
    }

    async fn pending(&self, limit: usize) -> NotificationOutboxResult<Vec<OutboxEntry>> {
        let entries = self.entries.read().map_err(|err| {
            NotificationOutboxError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let mut pending: Vec<&OutboxEntry> = entries
            .iter()
            .filter(|stored| stored.delivered_at.is_none())
            .map(|stored| &stored.entry)
            .collect();
        pending.sort_by_key(|entry| entry.attempts);
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn mark_delivered(
        &self,
        id: NotificationId,
        delivered_at: DateTime<Utc>,
    ) -> NotificationOutboxResult<()> {
        let mut entries = self.entries.write().map_err(|err| {
            NotificationOutboxError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let stored = entries
            .iter_mut()
            .find(|stored| stored.entry.id == id)
            .ok_or(NotificationOutboxError::NotFound(id))?;
        stored.delivered_at = Some(delivered_at);
        Ok(())
    }

    async fn mark_failed(&self, id: NotificationId, error: &str) -> NotificationOutboxResult<()> {
        let mut entries = self.entries.write().map_err(|err| {
            NotificationOutboxError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let stored = entries
            .iter_mut()
            .find(|stored| stored.entry.id == id)
            .ok_or(NotificationOutboxError::NotFound(id))?;
        stored.entry.attempts = stored.entry.attempts.saturating_add(1);
        stored.entry.last_error = Some(error.to_owned());
        Ok(())
    }
}

/// Sink that records every delivered notification.
///
/// Deliveries to tenants registered with [`Self::reject_tenant`] fail, which
/// lets tests observe retry behaviour.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    state: Arc<RwLock<RecordingSinkState>>,
}

#[derive(Debug, Default)]
struct RecordingSinkState {
    delivered: Vec<Notification>,
    rejected_tenants: HashSet<TenantId>,
}

impl RecordingNotificationSink {
    /// Creates a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to `tenant_id` fail until [`Self::accept_tenant`].
    ///
    /// # Errors
    ///
    /// Returns [`NotificationSinkError::Unavailable`] when lock acquisition
    /// fails.
    pub fn reject_tenant(&self, tenant_id: TenantId) -> NotificationSinkResult<()> {
        let mut state = self.state.write().map_err(|err| {
            NotificationSinkError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        state.rejected_tenants.insert(tenant_id);
        Ok(())
    }

    /// Lets deliveries to `tenant_id` succeed again.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationSinkError::Unavailable`] when lock acquisition
    /// fails.
    pub fn accept_tenant(&self, tenant_id: &TenantId) -> NotificationSinkResult<()> {
        let mut state = self.state.write().map_err(|err| {
            NotificationSinkError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        state.rejected_tenants.remove(tenant_id);
        Ok(())
    }

    /// Returns the notifications delivered so far.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationSinkError::Unavailable`] when lock acquisition
    /// fails.
    pub fn delivered(&self) -> NotificationSinkResult<Vec<Notification>> {
        let state = self.state.read().map_err(|err| {
            NotificationSinkError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.delivered.clone())
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, notification: &Notification) -> NotificationSinkResult<()> {
        let mut state = self.state.write().map_err(|err| {
            NotificationSinkError::unavailable(std::io::Error::other(err.to_string()))
        })?;
        if state.rejected_tenants.contains(&notification.tenant_id) {
            return Err(NotificationSinkError::Rejected(format!(
                "tenant {} is not accepting notifications",
                notification.tenant_id
            )));
        }
        state.delivered.push(notification.clone());
        Ok(())
    }
}
