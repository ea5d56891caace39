//! Catalog refresh against scripted upstreams.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::rstest;
use toolhub::catalog::{
    adapters::memory::InMemoryCatalogFetcher,
    domain::{
        AuthMode, Binding, Catalog, CompositeEntity, CredentialMap, NotificationKind,
        NotificationPriority, ToolDefinition, UpstreamEndpoint, UpstreamHeaders,
    },
    ports::{CatalogFetchError, CatalogFetchResult, CatalogFetcher, CatalogStore},
    services::{CatalogRefreshService, ErrorKind, RefreshRequest},
};

use super::helpers::{Harness, harness, tenant, user};

fn request(entity: &CompositeEntity) -> RefreshRequest {
    RefreshRequest::new(
        entity.id(),
        entity.tenant_id().clone(),
        user("alice").expect("valid user"),
    )
}

async fn tool_names(harness: &Harness, catalog: &Catalog) -> Vec<String> {
    harness
        .store
        .list_tools(catalog.id())
        .await
        .expect("tools list")
        .iter()
        .map(|tool| tool.name().to_owned())
        .collect()
}

async fn single_binding(harness: &Harness, tenant_name: &str, catalog: &Catalog) -> (CompositeEntity, Binding) {
    let (entity, bindings) = harness
        .entity_with_bindings(&tenant(tenant_name).expect("valid tenant"), "Workspace", &[catalog])
        .await
        .expect("entity created");
    let binding = bindings.into_iter().next().expect("one binding");
    (entity, binding)
}

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_partitions_changes_and_rewrites_allow_list(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog(
            "GitHub",
            AuthMode::None,
            &[("keep", "same"), ("edit", "old"), ("drop", "gone")],
        )
        .await
        .expect("catalog registered");
    let (entity, binding) = single_binding(&harness, "acme", &catalog).await;
    harness
        .serve(&catalog, &[("keep", "same"), ("edit", "new"), ("fresh", "brand new")])
        .expect("upstream scripted");

    let report = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect("refresh succeeds");

    assert!(report.success);
    assert!(report.has_any_changes);
    assert_eq!(report.totals.added, 1);
    assert_eq!(report.totals.removed, 1);
    assert_eq!(report.totals.modified, 1);
    assert_eq!(report.totals.unchanged, 1);
    assert_eq!(
        harness.allowed_names(&binding).await.expect("allow-list"),
        names(&["keep", "edit", "fresh"])
    );

    let stored = harness.store.list_tools(catalog.id()).await.expect("tools list");
    let edited = stored
        .iter()
        .find(|tool| tool.name() == "edit")
        .expect("edited tool kept");
    assert_eq!(edited.definition().description(), Some("new"));
    assert_eq!(stored.len(), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_refresh_is_a_no_op(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("Linear", AuthMode::None, &[("a", "A"), ("b", "B")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;
    harness
        .serve(&catalog, &[("a", "A"), ("b", "B"), ("c", "C")])
        .expect("upstream scripted");
    let service = harness.refresh_service();

    let first = service.refresh(request(&entity)).await.expect("first refresh");
    let queued = harness.outbox.all_entries().expect("outbox readable").len();
    let second = service.refresh(request(&entity)).await.expect("second refresh");

    assert!(first.has_any_changes);
    assert!(!second.has_any_changes);
    assert_eq!(second.totals.unchanged, 3);
    assert_eq!(
        harness.outbox.all_entries().expect("outbox readable").len(),
        queued
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_reports_without_writing(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A"), ("b", "B")])
        .await
        .expect("catalog registered");
    let (entity, binding) = single_binding(&harness, "acme", &catalog).await;
    harness
        .serve(&catalog, &[("a", "A v2"), ("c", "C")])
        .expect("upstream scripted");

    let report = harness
        .refresh_service()
        .refresh(request(&entity).with_dry_run(true))
        .await
        .expect("preview succeeds");

    assert!(report.dry_run);
    assert_eq!(report.totals.added, 1);
    assert_eq!(report.totals.removed, 1);
    assert_eq!(report.totals.modified, 1);
    assert_eq!(tool_names(&harness, &catalog).await, vec!["a", "b"]);
    assert_eq!(
        harness.allowed_names(&binding).await.expect("allow-list"),
        names(&["a", "b"])
    );
    assert!(harness.outbox.all_entries().expect("outbox readable").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_upstream_aborts_without_writes(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A"), ("b", "B")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;
    harness.serve(&catalog, &[]).expect("upstream scripted");

    let error = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect_err("empty upstream must be refused");

    assert_eq!(error.kind(), ErrorKind::FatalUpstream);
    assert_eq!(tool_names(&harness, &catalog).await, vec!["a", "b"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_binding_discards_earlier_changes(harness: Harness) {
    let (first, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (second, _) = harness
        .remote_catalog("Linear", AuthMode::None, &[("x", "X")])
        .await
        .expect("catalog registered");
    let (entity, _) = harness
        .entity_with_bindings(&tenant("acme").expect("valid tenant"), "Workspace", &[&first, &second])
        .await
        .expect("entity created");
    harness
        .serve(&first, &[("a", "A"), ("b", "B")])
        .expect("upstream scripted");
    harness
        .fetcher
        .set_failure(
            second.base_url().expect("remote catalog"),
            CatalogFetchError::UpstreamStatus {
                endpoint: "Linear".to_owned(),
                status: 502,
            },
        )
        .expect("failure scripted");

    let error = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect_err("upstream failure aborts the refresh");

    assert_eq!(error.kind(), ErrorKind::FatalUpstream);
    assert_eq!(tool_names(&harness, &first).await, vec!["a"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_are_unauthenticated(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;
    harness
        .fetcher
        .set_failure(
            catalog.base_url().expect("remote catalog"),
            CatalogFetchError::Unauthorized {
                endpoint: "GitHub".to_owned(),
                status: 401,
            },
        )
        .expect("failure scripted");

    let error = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect_err("401 aborts the refresh");

    assert_eq!(error.kind(), ErrorKind::Unauthenticated);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn oauth_binding_without_token_never_calls_upstream(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("Notion", AuthMode::OAuth, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;

    let error = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect_err("missing token aborts the refresh");

    assert_eq!(error.kind(), ErrorKind::Unauthenticated);
    assert!(harness.fetcher.requests().expect("requests readable").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn api_key_credentials_reach_upstream(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("Stripe", AuthMode::ApiKey, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, binding) = single_binding(&harness, "acme", &catalog).await;
    harness
        .admin_service()
        .upsert_credentials(
            entity.tenant_id(),
            None,
            binding.id(),
            &CredentialMap::from_pairs([("X-Api-Key", "sk-test")]).expect("valid credentials"),
        )
        .await
        .expect("credentials stored");

    harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect("refresh succeeds");

    let requests = harness.fetcher.requests().expect("requests readable");
    let (_, headers) = requests.first().expect("one upstream call");
    assert_eq!(headers.get("X-Api-Key").map(String::as_str), Some("sk-test"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn local_catalog_is_skipped(harness: Harness) {
    let catalog = Catalog::local("Bundled", &DefaultClock).expect("valid catalog");
    harness
        .store
        .register_catalog(&catalog, &[])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;

    let report = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect("refresh succeeds");

    let entry = report.bindings.first().expect("one binding report");
    assert!(entry.skipped);
    assert!(!report.has_any_changes);
    assert!(harness.fetcher.requests().expect("requests readable").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn entity_of_another_tenant_is_not_found(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;

    let foreign = RefreshRequest::new(
        entity.id(),
        tenant("globex").expect("valid tenant"),
        user("mallory").expect("valid user"),
    );
    let error = harness
        .refresh_service()
        .refresh(foreign)
        .await
        .expect_err("foreign tenant cannot refresh");

    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn catalog_bound_twice_is_diffed_once(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A"), ("b", "B")])
        .await
        .expect("catalog registered");
    let (entity, bindings) = harness
        .entity_with_bindings(&tenant("acme").expect("valid tenant"), "Workspace", &[&catalog, &catalog])
        .await
        .expect("entity created");
    harness
        .serve(&catalog, &[("a", "A"), ("c", "C")])
        .expect("upstream scripted");

    let report = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect("refresh succeeds");

    assert_eq!(report.totals.added, 1);
    assert_eq!(report.totals.removed, 1);
    assert_eq!(tool_names(&harness, &catalog).await, vec!["a", "c"]);
    for binding in &bindings {
        assert_eq!(
            harness.allowed_names(binding).await.expect("allow-list"),
            names(&["a", "c"])
        );
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shared_catalog_change_reaches_other_tenants_only(harness: Harness) {
    let (shared, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A"), ("b", "B")])
        .await
        .expect("catalog registered");
    let (unrelated, _) = harness
        .remote_catalog("Linear", AuthMode::None, &[("x", "X")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &shared).await;
    let (_, neighbour) = single_binding(&harness, "globex", &shared).await;
    single_binding(&harness, "initech", &unrelated).await;
    harness
        .serve(&shared, &[("a", "A"), ("c", "C")])
        .expect("upstream scripted");

    let report = harness
        .refresh_service()
        .refresh(request(&entity))
        .await
        .expect("refresh succeeds");

    let impacted: Vec<&str> = report
        .affected_tenants
        .iter()
        .map(|impact| impact.tenant_id.as_str())
        .collect();
    assert_eq!(impacted, vec!["globex"]);
    assert_eq!(
        harness.allowed_names(&neighbour).await.expect("allow-list"),
        names(&["a"])
    );

    let queued = harness.outbox.all_entries().expect("outbox readable");
    let summary: Vec<(&str, NotificationKind, NotificationPriority)> = queued
        .iter()
        .map(|entry| {
            (
                entry.notification.tenant_id.as_str(),
                entry.notification.kind,
                entry.notification.priority,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("acme", NotificationKind::CatalogRefreshed, NotificationPriority::Normal),
            ("globex", NotificationKind::SharedCatalogChanged, NotificationPriority::High),
        ]
    );
}

struct SlowFetcher {
    inner: Arc<InMemoryCatalogFetcher>,
    delay: Duration,
}

#[async_trait]
impl CatalogFetcher for SlowFetcher {
    async fn list_tools(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_tools(endpoint, headers).await
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn timeout_persists_nothing(harness: Harness) {
    let (catalog, _) = harness
        .remote_catalog("GitHub", AuthMode::None, &[("a", "A")])
        .await
        .expect("catalog registered");
    let (entity, _) = single_binding(&harness, "acme", &catalog).await;
    harness
        .serve(&catalog, &[("a", "A"), ("b", "B")])
        .expect("upstream scripted");
    let service = CatalogRefreshService::new(
        Arc::clone(&harness.store),
        harness.header_builder(),
        Arc::new(SlowFetcher {
            inner: Arc::clone(&harness.fetcher),
            delay: Duration::from_millis(250),
        }),
        Arc::clone(&harness.outbox),
        Arc::new(DefaultClock),
    )
    .with_timeout(Duration::from_millis(20));

    let error = service
        .refresh(request(&entity))
        .await
        .expect_err("slow upstream times out");

    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(tool_names(&harness, &catalog).await, vec!["a"]);
    assert!(harness.outbox.all_entries().expect("outbox readable").is_empty());
}
