//! Notification payloads and their outbox envelope.

use super::{EntityId, NotificationId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a notification was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The originating tenant's own entity was refreshed with changes.
    CatalogRefreshed,
    /// A catalog another tenant depends on changed externally.
    SharedCatalogChanged,
}

impl NotificationKind {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CatalogRefreshed => "catalog_refreshed",
            Self::SharedCatalogChanged => "shared_catalog_changed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NotificationKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "catalog_refreshed" => Ok(Self::CatalogRefreshed),
            "shared_catalog_changed" => Ok(Self::SharedCatalogChanged),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Informational notice.
    Normal,
    /// Notice the recipient should act on.
    High,
}

impl NotificationPriority {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl TryFrom<&str> for NotificationPriority {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(format!("unknown notification priority: {other}")),
        }
    }
}

/// Payload handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification kind.
    pub kind: NotificationKind,
    /// Delivery priority.
    pub priority: NotificationPriority,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Link to the affected entity.
    pub link: String,
    /// Recipient tenant.
    pub tenant_id: TenantId,
    /// User whose refresh triggered the notice.
    pub triggered_by: UserId,
    /// Entity the link points at.
    pub entity_id: EntityId,
}

/// Notification queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    /// Entry identifier.
    pub id: NotificationId,
    /// Queued payload.
    pub notification: Notification,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Error from the latest failed attempt.
    pub last_error: Option<String>,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Wraps a payload in a fresh pending entry.
    #[must_use]
    pub fn pending(notification: Notification, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            notification,
            attempts: 0,
            last_error: None,
            enqueued_at,
        }
    }
}
