//! Outbox draining, failure recording, and retry.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use rstest::rstest;
use toolhub::catalog::{
    domain::{
        AuthMode, EntityId, Notification, NotificationKind, NotificationPriority, OutboxEntry,
    },
    ports::{NotificationOutbox, NotificationSink, NotificationSinkError, NotificationSinkResult},
    services::{NotificationDispatcher, RefreshRequest},
};

use super::helpers::{Harness, harness, tenant, user};

mockall::mock! {
    pub Sink {}

    #[async_trait]
    impl NotificationSink for Sink {
        async fn deliver(&self, notification: &Notification) -> NotificationSinkResult<()>;
    }
}

fn notice(tenant_name: &str) -> Notification {
    Notification {
        kind: NotificationKind::SharedCatalogChanged,
        priority: NotificationPriority::High,
        title: "A shared catalog changed".to_owned(),
        message: "GitHub changed".to_owned(),
        link: "http://localhost:3000/servers/x".to_owned(),
        tenant_id: tenant(tenant_name).expect("valid tenant"),
        triggered_by: user("alice").expect("valid user"),
        entity_id: EntityId::new(),
    }
}

async fn enqueue(harness: &Harness, tenant_name: &str) -> OutboxEntry {
    let entry = OutboxEntry::pending(notice(tenant_name), DefaultClock.utc());
    harness.outbox.enqueue(&entry).await.expect("entry queued");
    entry
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delivered_entries_are_not_redelivered(harness: Harness) {
    enqueue(&harness, "acme").await;
    enqueue(&harness, "globex").await;
    let dispatcher = harness.dispatcher();

    let first = dispatcher.dispatch_pending().await.expect("first pass");
    let second = dispatcher.dispatch_pending().await.expect("second pass");

    assert_eq!((first.delivered, first.failed), (2, 0));
    assert_eq!((second.delivered, second.failed), (0, 0));
    assert_eq!(harness.sink.delivered().expect("sink readable").len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_delivery_is_recorded_and_retried(harness: Harness) {
    enqueue(&harness, "acme").await;
    let rejected = enqueue(&harness, "globex").await;
    let globex = tenant("globex").expect("valid tenant");
    harness.sink.reject_tenant(globex.clone()).expect("sink configured");
    let dispatcher = harness.dispatcher();

    let first = dispatcher.dispatch_pending().await.expect("first pass");
    assert_eq!((first.delivered, first.failed), (1, 1));
    let recorded = harness
        .outbox
        .all_entries()
        .expect("outbox readable")
        .into_iter()
        .find(|entry| entry.id == rejected.id)
        .expect("entry kept");
    assert_eq!(recorded.attempts, 1);
    assert!(recorded.last_error.is_some());

    harness.sink.accept_tenant(&globex).expect("sink configured");
    let retry = dispatcher.dispatch_pending().await.expect("retry pass");
    assert_eq!((retry.delivered, retry.failed), (1, 0));
    let tenants: Vec<String> = harness
        .sink
        .delivered()
        .expect("sink readable")
        .iter()
        .map(|notification| notification.tenant_id.to_string())
        .collect();
    assert_eq!(tenants, vec!["acme", "globex"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_tenant_cannot_hold_back_later_entries(harness: Harness) {
    enqueue(&harness, "globex").await;
    enqueue(&harness, "globex").await;
    enqueue(&harness, "acme").await;
    harness
        .sink
        .reject_tenant(tenant("globex").expect("valid tenant"))
        .expect("sink configured");
    let dispatcher = harness.dispatcher().with_batch_size(2);

    let first = dispatcher.dispatch_pending().await.expect("first pass");
    let second = dispatcher.dispatch_pending().await.expect("second pass");

    assert_eq!((first.delivered, first.failed), (0, 2));
    assert_eq!((second.delivered, second.failed), (1, 1));
    let delivered = harness.sink.delivered().expect("sink readable");
    assert_eq!(delivered.len(), 1);
    assert!(
        delivered
            .iter()
            .all(|notification| notification.tenant_id.as_str() == "acme")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_size_bounds_one_pass(harness: Harness) {
    for name in ["acme", "globex", "initech"] {
        enqueue(&harness, name).await;
    }
    let dispatcher = harness.dispatcher().with_batch_size(2);

    let first = dispatcher.dispatch_pending().await.expect("first pass");
    let second = dispatcher.dispatch_pending().await.expect("second pass");

    assert_eq!(first.delivered, 2);
    assert_eq!(second.delivered, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unavailable_sink_counts_failures(harness: Harness) {
    enqueue(&harness, "acme").await;
    let mut sink = MockSink::new();
    sink.expect_deliver()
        .withf(|notification| notification.tenant_id.as_str() == "acme")
        .times(1)
        .returning(|_| {
            Err(NotificationSinkError::unavailable(std::io::Error::other(
                "connection refused",
            )))
        });
    let dispatcher = NotificationDispatcher::new(
        Arc::clone(&harness.outbox),
        Arc::new(sink),
        Arc::new(DefaultClock),
    );

    let summary = dispatcher.dispatch_pending().await.expect("pass completes");

    assert_eq!((summary.delivered, summary.failed), (0, 1));
    let pending = harness.outbox.pending(10).await.expect("outbox readable");
    assert_eq!(pending.first().map(|entry| entry.attempts), Some(1));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_notices_are_delivered_after_dispatch(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, _) = harness
        .entity_with_bindings(&tenant("acme").expect("valid tenant"), "Platform", &[&catalog])
        .await
        .expect("entity created");
    harness
        .entity_with_bindings(&tenant("globex").expect("valid tenant"), "Ops", &[&catalog])
        .await
        .expect("entity created");
    harness
        .serve(&catalog, &[("a", "A"), ("b", "B")])
        .expect("upstream scripted");

    harness
        .refresh_service()
        .refresh(RefreshRequest::new(
            entity.id(),
            entity.tenant_id().clone(),
            user("alice").expect("valid user"),
        ))
        .await
        .expect("refresh succeeds");
    assert!(harness.sink.delivered().expect("sink readable").is_empty());

    let summary = harness
        .dispatcher()
        .dispatch_pending()
        .await
        .expect("dispatch succeeds");

    assert_eq!(summary.delivered, 2);
    let delivered = harness.sink.delivered().expect("sink readable");
    let own = delivered.first().expect("own notice");
    assert_eq!(own.title, "Tools refreshed for Platform");
    assert!(own.link.ends_with(&format!("/servers/{}", entity.id())));
    let shared = delivered.get(1).expect("shared notice");
    assert_eq!(shared.tenant_id.as_str(), "globex");
    assert!(shared.message.contains("GitHub"));
}
