//! `PostgreSQL` notification outbox.

use super::{CatalogPgPool, models::OutboxRow, run_blocking, schema::notification_outbox};
use crate::catalog::{
    domain::{Notification, NotificationId, OutboxEntry},
    ports::{NotificationOutbox, NotificationOutboxError, NotificationOutboxResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// `PostgreSQL`-backed [`NotificationOutbox`].
///
/// Payloads are stored as JSON; delivered rows are kept with their
/// delivery timestamp.
#[derive(Debug, Clone)]
pub struct PostgresNotificationOutbox {
    pool: CatalogPgPool,
}

impl PostgresNotificationOutbox {
    /// Creates an outbox from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: CatalogPgPool) -> Self {
        Self { pool }
    }
}

fn entry_to_row(entry: &OutboxEntry) -> NotificationOutboxResult<OutboxRow> {
    let payload = serde_json::to_value(&entry.notification)
        .map_err(NotificationOutboxError::persistence)?;
    Ok(OutboxRow {
        id: entry.id.into_inner(),
        tenant_id: entry.notification.tenant_id.as_str().to_owned(),
        payload,
        attempts: i32::try_from(entry.attempts).map_err(NotificationOutboxError::persistence)?,
        last_error: entry.last_error.clone(),
        enqueued_at: entry.enqueued_at,
        delivered_at: None,
    })
}

fn row_to_entry(row: OutboxRow) -> NotificationOutboxResult<OutboxEntry> {
    let notification: Notification = serde_json::from_value(row.payload)
        .map_err(NotificationOutboxError::invalid_persisted_data)?;
    Ok(OutboxEntry {
        id: NotificationId::from_uuid(row.id),
        notification,
        attempts: u32::try_from(row.attempts)
            .map_err(NotificationOutboxError::invalid_persisted_data)?,
        last_error: row.last_error,
        enqueued_at: row.enqueued_at,
    })
}

#[async_trait]
impl NotificationOutbox for PostgresNotificationOutbox {
    async fn enqueue(&self, entry: &OutboxEntry) -> NotificationOutboxResult<()> {
        let row = entry_to_row(entry)?;
        run_blocking(&self.pool, move |connection| {
            diesel::insert_into(notification_outbox::table)
                .values(&row)
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn pending(&self, limit: usize) -> NotificationOutboxResult<Vec<OutboxEntry>> {
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        run_blocking(&self.pool, move |connection| {
            let rows = notification_outbox::table
                .filter(notification_outbox::delivered_at.is_null())
                .order((
                    notification_outbox::attempts.asc(),
                    notification_outbox::enqueued_at.asc(),
                    notification_outbox::id.asc(),
                ))
                .limit(row_limit)
                .select(OutboxRow::as_select())
                .load::<OutboxRow>(connection)?;
            rows.into_iter().map(row_to_entry).collect()
        })
        .await
    }

    async fn mark_delivered(
        &self,
        id: NotificationId,
        delivered_at: DateTime<Utc>,
    ) -> NotificationOutboxResult<()> {
        run_blocking(&self.pool, move |connection| {
            let updated = diesel::update(notification_outbox::table.find(id.into_inner()))
                .set(notification_outbox::delivered_at.eq(Some(delivered_at)))
                .execute(connection)?;
            if updated == 0 {
                return Err(NotificationOutboxError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn mark_failed(&self, id: NotificationId, error: &str) -> NotificationOutboxResult<()> {
        let message = error.to_owned();
        run_blocking(&self.pool, move |connection| {
            let updated = diesel::update(notification_outbox::table.find(id.into_inner()))
                .set((
                    notification_outbox::attempts.eq(notification_outbox::attempts + 1),
                    notification_outbox::last_error.eq(Some(message)),
                ))
                .execute(connection)?;
            if updated == 0 {
                return Err(NotificationOutboxError::NotFound(id));
            }
            Ok(())
        })
        .await
    }
}
