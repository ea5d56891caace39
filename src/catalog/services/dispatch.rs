//! Outbox draining.

use crate::catalog::ports::{NotificationOutbox, NotificationOutboxResult, NotificationSink};
use crate::config::DEFAULT_OUTBOX_BATCH_SIZE;
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Entries handed to the sink and marked delivered.
    pub delivered: usize,
    /// Entries the sink rejected; they stay pending.
    pub failed: usize,
}

/// Delivers pending outbox entries to a notification sink.
#[derive(Clone)]
pub struct NotificationDispatcher<O, N, C>
where
    O: NotificationOutbox,
    N: NotificationSink,
    C: Clock + Send + Sync,
{
    outbox: Arc<O>,
    sink: Arc<N>,
    clock: Arc<C>,
    batch_size: usize,
}

impl<O, N, C> NotificationDispatcher<O, N, C>
where
    O: NotificationOutbox,
    N: NotificationSink,
    C: Clock + Send + Sync,
{
    /// Creates a dispatcher with the default batch size.
    #[must_use]
    pub const fn new(outbox: Arc<O>, sink: Arc<N>, clock: Arc<C>) -> Self {
        Self {
            outbox,
            sink,
            clock,
            batch_size: DEFAULT_OUTBOX_BATCH_SIZE,
        }
    }

    /// Replaces the number of entries drained per pass.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Delivers up to one batch of pending entries.
    ///
    /// Sink failures are recorded on the entry and counted; they never
    /// abort the pass. Entries that failed before are drained after fresh
    /// ones, so a tenant whose channel keeps failing cannot hold back the
    /// rest of the queue.
    ///
    /// # Errors
    ///
    /// Returns outbox failures.
    pub async fn dispatch_pending(&self) -> NotificationOutboxResult<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        for entry in self.outbox.pending(self.batch_size).await? {
            match self.sink.deliver(&entry.notification).await {
                Ok(()) => {
                    self.outbox.mark_delivered(entry.id, self.clock.utc()).await?;
                    summary.delivered += 1;
                }
                Err(err) => {
                    warn!(
                        notification_id = %entry.id,
                        tenant = %entry.notification.tenant_id,
                        attempts = entry.attempts + 1,
                        error = %err,
                        "notification delivery failed"
                    );
                    self.outbox.mark_failed(entry.id, &err.to_string()).await?;
                    summary.failed += 1;
                }
            }
        }
        debug!(delivered = summary.delivered, failed = summary.failed, "dispatch pass finished");
        Ok(summary)
    }
}
