//! Binding toggles and credential management.

use std::collections::BTreeSet;

use mockable::DefaultClock;
use rstest::rstest;
use toolhub::catalog::{
    domain::{
        AuthMode, Binding, CREDENTIAL_MASK, CredentialBundle, CredentialMap, SealedCredentials,
        TenantId, ToolId,
    },
    ports::{CatalogStore, CredentialStore},
    services::{BindingAdminError, ErrorKind, RefreshRequest},
};

use super::helpers::{Harness, harness, tenant, user};

async fn bound(harness: &Harness) -> (TenantId, Binding) {
    let (catalog, _) = harness
        .remote_catalog("Stripe", AuthMode::ApiKey, &[("a", "A"), ("b", "B"), ("c", "C")])
        .await
        .expect("catalog registered");
    let acme = tenant("acme").expect("valid tenant");
    let (_, bindings) = harness
        .entity_with_bindings(&acme, "Payments", &[&catalog])
        .await
        .expect("entity created");
    (acme, bindings.into_iter().next().expect("one binding"))
}

async fn tool_id(harness: &Harness, binding: &Binding, name: &str) -> ToolId {
    harness
        .store
        .list_tools(binding.catalog_id())
        .await
        .expect("tools list")
        .iter()
        .find(|tool| tool.name() == name)
        .map(|tool| tool.id())
        .expect("tool exists")
}

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

fn credentials(pairs: &[(&str, &str)]) -> CredentialMap {
    CredentialMap::from_pairs(pairs.iter().copied()).expect("valid pairs")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabling_a_binding_is_persisted(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let admin = harness.admin_service();

    let disabled = admin
        .set_binding_enabled(&acme, binding.id(), false)
        .await
        .expect("toggle succeeds");
    let stored = harness
        .store
        .find_binding(binding.id())
        .await
        .expect("lookup succeeds")
        .expect("binding exists");

    assert!(!disabled.is_enabled());
    assert!(!stored.is_enabled());
    assert_eq!(stored.allowed_tools(), binding.allowed_tools());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn other_tenant_cannot_toggle(harness: Harness) {
    let (_, binding) = bound(&harness).await;

    let error = harness
        .admin_service()
        .set_binding_enabled(&tenant("globex").expect("valid tenant"), binding.id(), false)
        .await
        .expect_err("foreign binding is hidden");

    assert!(matches!(error, BindingAdminError::BindingNotFound(_)));
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_toggle_touches_only_that_tool(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let admin = harness.admin_service();
    let b = tool_id(&harness, &binding, "b").await;

    let without_b = admin
        .set_tool_connected(&acme, binding.id(), b, false)
        .await
        .expect("disconnect succeeds");
    assert!(!without_b.is_connected(b));
    assert_eq!(
        harness.allowed_names(&binding).await.expect("allow-list"),
        names(&["a", "c"])
    );

    admin
        .set_tool_connected(&acme, binding.id(), b, true)
        .await
        .expect("connect succeeds");
    assert_eq!(
        harness.allowed_names(&binding).await.expect("allow-list"),
        names(&["a", "b", "c"])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_of_another_catalog_is_rejected(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let (_, foreign_tools) = harness
        .remote_catalog("Linear", AuthMode::None, &[("x", "X")])
        .await
        .expect("catalog registered");
    let foreign = foreign_tools.first().expect("one tool").id();

    let error = harness
        .admin_service()
        .set_tool_connected(&acme, binding.id(), foreign, true)
        .await
        .expect_err("foreign tool is rejected");

    assert_eq!(error.kind(), ErrorKind::BadRequest);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_reconnects_tools_still_served(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let b = tool_id(&harness, &binding, "b").await;
    harness
        .admin_service()
        .set_tool_connected(&acme, binding.id(), b, false)
        .await
        .expect("disconnect succeeds");
    harness
        .admin_service()
        .upsert_credentials(&acme, None, binding.id(), &credentials(&[("X-Api-Key", "sk")]))
        .await
        .expect("credentials stored");

    let report = harness
        .refresh_service()
        .refresh(RefreshRequest::new(
            binding.entity_id(),
            acme.clone(),
            user("alice").expect("valid user"),
        ))
        .await
        .expect("refresh succeeds");

    assert!(!report.has_any_changes);
    assert_eq!(
        harness.allowed_names(&binding).await.expect("allow-list"),
        names(&["a", "b", "c"])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn credential_reads_are_masked(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let admin = harness.admin_service();

    let written = admin
        .upsert_credentials(&acme, None, binding.id(), &credentials(&[("X-Api-Key", "sk-secret")]))
        .await
        .expect("credentials stored");
    let read = admin
        .describe_credentials(&acme, None, binding.id())
        .await
        .expect("describe succeeds");

    assert_eq!(written, read);
    let shown: Vec<(&str, bool, Option<&str>)> = read
        .iter()
        .map(|field| (field.key.as_str(), field.is_set, field.display))
        .collect();
    assert_eq!(
        shown,
        vec![
            ("X-Api-Key", true, Some(CREDENTIAL_MASK)),
            ("X-Region", false, None),
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn submitting_the_mask_keeps_the_stored_value(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    let admin = harness.admin_service();
    admin
        .upsert_credentials(
            &acme,
            None,
            binding.id(),
            &credentials(&[("X-Api-Key", "sk-original"), ("X-Region", "eu")]),
        )
        .await
        .expect("credentials stored");

    admin
        .upsert_credentials(
            &acme,
            None,
            binding.id(),
            &credentials(&[("X-Api-Key", CREDENTIAL_MASK), ("X-Region", "us")]),
        )
        .await
        .expect("credentials updated");

    let headers = harness
        .header_builder()
        .build(binding.id(), &acme, &user("alice").expect("valid user"), AuthMode::ApiKey)
        .await
        .expect("headers build");
    assert_eq!(headers.get("X-Api-Key").map(String::as_str), Some("sk-original"));
    assert_eq!(headers.get("X-Region").map(String::as_str), Some("us"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeclared_credential_key_is_rejected(harness: Harness) {
    let (acme, binding) = bound(&harness).await;

    let error = harness
        .admin_service()
        .upsert_credentials(&acme, None, binding.id(), &credentials(&[("Authorization", "x")]))
        .await
        .expect_err("undeclared key is rejected");

    assert_eq!(error.kind(), ErrorKind::BadRequest);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreadable_bundle_reads_as_unset(harness: Harness) {
    let (acme, binding) = bound(&harness).await;
    harness
        .store
        .upsert_bundle(&CredentialBundle::new(
            binding.id(),
            acme.clone(),
            None,
            SealedCredentials::from_bytes(vec![1, 2, 3]),
            &DefaultClock,
        ))
        .await
        .expect("bundle stored");

    let read = harness
        .admin_service()
        .describe_credentials(&acme, None, binding.id())
        .await
        .expect("describe degrades instead of failing");

    assert!(read.iter().all(|field| !field.is_set));
}
