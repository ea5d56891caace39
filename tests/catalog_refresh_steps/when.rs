//! When steps for catalog refresh BDD scenarios.

use super::world::{RefreshWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use toolhub::catalog::{domain::UserId, services::RefreshRequest};

fn refresh(world: &mut RefreshWorld, tenant: &str, dry_run: bool) -> Result<(), eyre::Report> {
    let created = world.entity_of(tenant)?;
    let request = RefreshRequest::new(
        created.entity.id(),
        created.tenant_id.clone(),
        UserId::new("alice").wrap_err("user id")?,
    )
    .with_dry_run(dry_run);
    world.last_result = Some(run_async(world.service.refresh(request)));
    Ok(())
}

#[when(r#"tenant "{tenant}" refreshes the entity"#)]
fn tenant_refreshes(world: &mut RefreshWorld, tenant: String) -> Result<(), eyre::Report> {
    refresh(world, &tenant, false)
}

#[when(r#"tenant "{tenant}" previews a refresh of the entity"#)]
fn tenant_previews(world: &mut RefreshWorld, tenant: String) -> Result<(), eyre::Report> {
    refresh(world, &tenant, true)
}
