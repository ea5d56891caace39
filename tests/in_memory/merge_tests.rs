//! Composite entity creation from several shared catalogs.

use std::collections::BTreeSet;

use rstest::rstest;
use toolhub::catalog::{
    domain::{
        AuthMode, Catalog, CatalogId, CatalogTool, CredentialMap, MaskedCredentialField, TenantId,
        ToolId,
    },
    ports::CatalogStore,
    services::{CreateMergedRequest, ErrorKind, MergeEntry, MergeError},
};

use super::helpers::{Harness, harness, tenant, user};

fn merge_request(entries: Vec<MergeEntry>) -> CreateMergedRequest {
    CreateMergedRequest {
        tenant_id: tenant("acme").expect("valid tenant"),
        user_id: user("alice").expect("valid user"),
        name: "Engineering".to_owned(),
        entries,
    }
}

async fn two_catalogs(harness: &Harness) -> ((Catalog, Vec<CatalogTool>), (Catalog, Vec<CatalogTool>)) {
    let github = harness
        .remote_catalog("GitHub", AuthMode::ApiKey, &[("search", "Search"), ("create_issue", "Create")])
        .await
        .expect("catalog registered");
    let linear = harness
        .remote_catalog("Linear", AuthMode::None, &[("list", "List"), ("close", "Close")])
        .await
        .expect("catalog registered");
    (github, linear)
}

async fn nothing_created(harness: &Harness, catalogs: &[&Catalog]) -> bool {
    let ids: BTreeSet<CatalogId> = catalogs.iter().map(|catalog| catalog.id()).collect();
    harness
        .store
        .entities_binding_catalogs(&ids, &TenantId::new("nobody").expect("valid tenant"))
        .await
        .expect("lookup succeeds")
        .is_empty()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn single_entry_is_rejected(harness: Harness) {
    let ((github, _), _) = two_catalogs(&harness).await;

    let error = harness
        .merge_service()
        .create_merged(merge_request(vec![MergeEntry::new(github.id(), "GitHub")]))
        .await
        .expect_err("one catalog is not a merge");

    assert!(matches!(error, MergeError::TooFewEntries { count: 1 }));
    assert_eq!(error.kind(), ErrorKind::BadRequest);
    assert!(nothing_created(&harness, &[&github]).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn two_entries_create_ordered_bindings(harness: Harness) {
    let ((github, github_tools), (linear, linear_tools)) = two_catalogs(&harness).await;
    let first_linear = linear_tools.first().expect("linear tool").id();

    let merged = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code"),
            MergeEntry::new(linear.id(), "Tickets").with_tools([first_linear]),
        ]))
        .await
        .expect("merge succeeds");

    let bindings = harness
        .store
        .list_bindings(merged.id)
        .await
        .expect("bindings list");
    let layout: Vec<(u32, &str)> = bindings
        .iter()
        .map(|binding| (binding.position(), binding.display_name()))
        .collect();
    assert_eq!(layout, vec![(0, "Code"), (1, "Tickets")]);

    let [code, tickets] = &bindings[..] else {
        panic!("two bindings expected");
    };
    let every_github_tool: BTreeSet<ToolId> = github_tools.iter().map(CatalogTool::id).collect();
    assert_eq!(code.allowed_tools(), &every_github_tool);
    assert_eq!(tickets.allowed_tools(), &BTreeSet::from([first_linear]));
    assert!(code.is_enabled() && tickets.is_enabled());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_selection_creates_nothing(harness: Harness) {
    let ((github, _), (linear, _)) = two_catalogs(&harness).await;
    let stray = ToolId::new();

    let error = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code"),
            MergeEntry::new(linear.id(), "Tickets").with_tools([stray]),
        ]))
        .await
        .expect_err("foreign tool is rejected");

    assert!(matches!(&error, MergeError::UnknownTools { tool_ids, .. } if tool_ids == &vec![stray]));
    assert_eq!(error.kind(), ErrorKind::BadRequest);
    assert!(nothing_created(&harness, &[&github, &linear]).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeclared_credential_key_creates_nothing(harness: Harness) {
    let ((github, _), (linear, _)) = two_catalogs(&harness).await;
    let credentials =
        CredentialMap::from_pairs([("X-Api-Key", "sk"), ("X-Unknown", "?")]).expect("valid pairs");

    let error = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code").with_credentials(credentials),
            MergeEntry::new(linear.id(), "Tickets"),
        ]))
        .await
        .expect_err("undeclared key is rejected");

    assert_eq!(error.kind(), ErrorKind::BadRequest);
    assert!(nothing_created(&harness, &[&github, &linear]).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_catalog_is_not_found(harness: Harness) {
    let ((github, _), _) = two_catalogs(&harness).await;

    let error = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code"),
            MergeEntry::new(CatalogId::new(), "Ghost"),
        ]))
        .await
        .expect_err("missing catalog is rejected");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(nothing_created(&harness, &[&github]).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn explicit_credentials_are_scoped_to_the_creator(harness: Harness) {
    let ((github, _), (linear, _)) = two_catalogs(&harness).await;
    let credentials = CredentialMap::from_pairs([("X-Api-Key", "sk-live")]).expect("valid pairs");

    let merged = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code").with_credentials(credentials),
            MergeEntry::new(linear.id(), "Tickets"),
        ]))
        .await
        .expect("merge succeeds");
    let bindings = harness.store.list_bindings(merged.id).await.expect("bindings list");
    let code = bindings.first().expect("first binding");
    let acme = tenant("acme").expect("valid tenant");
    let alice = user("alice").expect("valid user");
    let admin = harness.admin_service();

    let personal = admin
        .describe_credentials(&acme, Some(&alice), code.id())
        .await
        .expect("describe succeeds");
    let tenant_wide = admin
        .describe_credentials(&acme, None, code.id())
        .await
        .expect("describe succeeds");

    let api_key = |fields: &[MaskedCredentialField]| {
        fields
            .iter()
            .find(|field| field.key == "X-Api-Key")
            .map(|field| field.is_set)
    };
    assert_eq!(api_key(&personal), Some(true));
    assert_eq!(api_key(&tenant_wide), Some(false));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn existing_tenant_credentials_are_reused(harness: Harness) {
    let ((github, _), (linear, _)) = two_catalogs(&harness).await;
    let acme = tenant("acme").expect("valid tenant");
    let (_, existing) = harness
        .entity_with_bindings(&acme, "Legacy", &[&github])
        .await
        .expect("entity created");
    let existing_binding = existing.first().expect("one binding");
    harness
        .admin_service()
        .upsert_credentials(
            &acme,
            None,
            existing_binding.id(),
            &CredentialMap::from_pairs([("X-Api-Key", "sk-shared")]).expect("valid pairs"),
        )
        .await
        .expect("credentials stored");

    let merged = harness
        .merge_service()
        .create_merged(merge_request(vec![
            MergeEntry::new(github.id(), "Code"),
            MergeEntry::new(linear.id(), "Tickets"),
        ]))
        .await
        .expect("merge succeeds");
    let bindings = harness.store.list_bindings(merged.id).await.expect("bindings list");
    let code = bindings.first().expect("first binding");

    let headers = harness
        .header_builder()
        .build(code.id(), &acme, &user("alice").expect("valid user"), github.auth_mode())
        .await
        .expect("headers build");
    assert_eq!(headers.get("X-Api-Key").map(String::as_str), Some("sk-shared"));

    let tenant_wide = harness
        .admin_service()
        .describe_credentials(&acme, None, code.id())
        .await
        .expect("credentials described");
    assert!(
        tenant_wide
            .iter()
            .any(|field| field.key == "X-Api-Key" && field.is_set)
    );
}
