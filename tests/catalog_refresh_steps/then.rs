//! Then steps for catalog refresh BDD scenarios.

use super::world::{RefreshWorld, run_async, sorted_names};
use eyre::WrapErr;
use rstest_bdd_macros::then;
use toolhub::catalog::ports::CatalogStore;

#[then("the refresh reports {added:usize} added, {removed:usize} removed and {modified:usize} modified")]
fn refresh_reports_counts(
    world: &mut RefreshWorld,
    added: usize,
    removed: usize,
    modified: usize,
) -> Result<(), eyre::Report> {
    let totals = world.report()?.totals;
    let observed = (totals.added, totals.removed, totals.modified);
    if observed != (added, removed, modified) {
        return Err(eyre::eyre!(
            "expected {added}/{removed}/{modified} added/removed/modified, found {observed:?}"
        ));
    }
    Ok(())
}

#[then(r#"the binding of tenant "{tenant}" allows tools "{tools}""#)]
fn binding_allows(world: &mut RefreshWorld, tenant: String, tools: String) -> Result<(), eyre::Report> {
    let binding_id = world.entity_of(&tenant)?.binding.id();
    let catalog_id = world.catalog()?.id();
    let stored = run_async(world.store.find_binding(binding_id))
        .wrap_err("find binding")?
        .ok_or_else(|| eyre::eyre!("binding of tenant '{tenant}' is gone"))?;
    let mut allowed: Vec<String> = run_async(world.store.list_tools(catalog_id))
        .wrap_err("list tools")?
        .iter()
        .filter(|tool| stored.is_connected(tool.id()))
        .map(|tool| tool.name().to_owned())
        .collect();
    allowed.sort();
    let expected = sorted_names(&tools);
    if allowed != expected {
        return Err(eyre::eyre!("expected allow-list {expected:?}, found {allowed:?}"));
    }
    Ok(())
}

#[then(r#"the catalog still caches tools "{tools}""#)]
fn catalog_caches(world: &mut RefreshWorld, tools: String) -> Result<(), eyre::Report> {
    let catalog_id = world.catalog()?.id();
    let mut cached: Vec<String> = run_async(world.store.list_tools(catalog_id))
        .wrap_err("list tools")?
        .iter()
        .map(|tool| tool.name().to_owned())
        .collect();
    cached.sort();
    let expected = sorted_names(&tools);
    if cached != expected {
        return Err(eyre::eyre!("expected cached tools {expected:?}, found {cached:?}"));
    }
    Ok(())
}

#[then(r#"the refresh fails with kind "{kind}""#)]
fn refresh_fails_with(world: &mut RefreshWorld, kind: String) -> Result<(), eyre::Report> {
    match world.last_result.as_ref() {
        Some(Err(err)) if err.kind().as_str() == kind => Ok(()),
        Some(Err(err)) => Err(eyre::eyre!("expected kind '{kind}', got '{}': {err}", err.kind())),
        Some(Ok(_)) => Err(eyre::eyre!("expected refresh to fail with '{kind}'")),
        None => Err(eyre::eyre!("no refresh ran in scenario world")),
    }
}

#[then(r#"tenant "{tenant}" is reported as affected"#)]
fn tenant_is_affected(world: &mut RefreshWorld, tenant: String) -> Result<(), eyre::Report> {
    let report = world.report()?;
    if !report
        .affected_tenants
        .iter()
        .any(|impact| impact.tenant_id.as_str() == tenant)
    {
        return Err(eyre::eyre!(
            "expected '{tenant}' among affected tenants {:?}",
            report.affected_tenants
        ));
    }
    Ok(())
}

#[then("{count:usize} notifications are queued")]
fn notifications_queued(world: &mut RefreshWorld, count: usize) -> Result<(), eyre::Report> {
    let queued = world.outbox.all_entries().wrap_err("read outbox")?.len();
    if queued != count {
        return Err(eyre::eyre!("expected {count} queued notifications, found {queued}"));
    }
    Ok(())
}
