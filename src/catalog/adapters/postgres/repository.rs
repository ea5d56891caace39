//! `PostgreSQL` implementation of the catalog and credential stores.

use super::{
    CatalogPgPool,
    conversions::{
        binding_to_row, bundle_to_row, catalog_to_row, entity_to_row, row_to_binding,
        row_to_bundle, row_to_catalog, row_to_entity, row_to_tool, tool_to_row,
    },
    models::{BindingRow, BindingToolRow, CatalogRow, CatalogToolRow, CredentialBundleRow, EntityRow},
    run_blocking,
    schema::{
        binding_tools, bindings, catalog_tools, catalogs, composite_entities, credential_bundles,
        oauth_tokens,
    },
};
use crate::catalog::{
    domain::{
        AccessToken, Binding, BindingAllowListChange, BindingId, Catalog, CatalogId, CatalogTool,
        CompositeEntity, CredentialBundle, EntityId, NewEntityPlan, ReconciliationPlan, TenantId,
        ToolId, UserId,
    },
    ports::{
        CatalogStore, CatalogStoreError, CatalogStoreResult, CredentialStore,
        CredentialStoreError, CredentialStoreResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// `PostgreSQL`-backed [`CatalogStore`] and [`CredentialStore`].
///
/// Reconciliation takes a transaction-scoped advisory lock per touched
/// catalog and inserts tools with `ON CONFLICT (catalog_id, name) DO
/// UPDATE`, so concurrent refreshes of one shared catalog converge on a
/// single row per tool name.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: CatalogPgPool,
}

impl PostgresCatalogStore {
    /// Creates a store from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: CatalogPgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &CatalogPgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn register_catalog(
        &self,
        catalog: &Catalog,
        tools: &[CatalogTool],
    ) -> CatalogStoreResult<()> {
        let catalog_id = catalog.id();
        let catalog_row = catalog_to_row(catalog)?;
        let tool_rows: Vec<CatalogToolRow> = tools.iter().map(tool_to_row).collect();

        run_blocking(&self.pool, move |connection| {
            connection.transaction::<_, CatalogStoreError, _>(|tx| {
                diesel::insert_into(catalogs::table)
                    .values(&catalog_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            CatalogStoreError::DuplicateCatalog(catalog_id)
                        }
                        _ => CatalogStoreError::persistence(err),
                    })?;
                if !tool_rows.is_empty() {
                    diesel::insert_into(catalog_tools::table)
                        .values(&tool_rows)
                        .execute(tx)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn find_catalog(&self, catalog_id: CatalogId) -> CatalogStoreResult<Option<Catalog>> {
        run_blocking(&self.pool, move |connection| {
            let row = catalogs::table
                .find(catalog_id.into_inner())
                .select(CatalogRow::as_select())
                .first::<CatalogRow>(connection)
                .optional()?;
            row.map(row_to_catalog).transpose()
        })
        .await
    }

    async fn list_tools(&self, catalog_id: CatalogId) -> CatalogStoreResult<Vec<CatalogTool>> {
        run_blocking(&self.pool, move |connection| {
            let rows = catalog_tools::table
                .filter(catalog_tools::catalog_id.eq(catalog_id.into_inner()))
                .order((catalog_tools::created_at.asc(), catalog_tools::name.asc()))
                .select(CatalogToolRow::as_select())
                .load::<CatalogToolRow>(connection)?;
            rows.into_iter().map(row_to_tool).collect()
        })
        .await
    }

    async fn find_entity(
        &self,
        entity_id: EntityId,
    ) -> CatalogStoreResult<Option<CompositeEntity>> {
        run_blocking(&self.pool, move |connection| {
            let row = composite_entities::table
                .find(entity_id.into_inner())
                .select(EntityRow::as_select())
                .first::<EntityRow>(connection)
                .optional()?;
            row.map(row_to_entity).transpose()
        })
        .await
    }

    async fn list_bindings(&self, entity_id: EntityId) -> CatalogStoreResult<Vec<Binding>> {
        run_blocking(&self.pool, move |connection| {
            let rows = bindings::table
                .filter(bindings::entity_id.eq(entity_id.into_inner()))
                .order(bindings::position.asc())
                .select(BindingRow::as_select())
                .load::<BindingRow>(connection)?;
            hydrate_bindings(connection, rows)
        })
        .await
    }

    async fn find_binding(&self, binding_id: BindingId) -> CatalogStoreResult<Option<Binding>> {
        run_blocking(&self.pool, move |connection| {
            let rows = bindings::table
                .filter(bindings::id.eq(binding_id.into_inner()))
                .select(BindingRow::as_select())
                .load::<BindingRow>(connection)?;
            Ok(hydrate_bindings(connection, rows)?.into_iter().next())
        })
        .await
    }

    async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
        applied_at: DateTime<Utc>,
    ) -> CatalogStoreResult<()> {
        let plan = plan.clone();
        run_blocking(&self.pool, move |connection| {
            connection.transaction::<_, CatalogStoreError, _>(|tx| {
                for changes in plan.catalogs() {
                    lock_catalog(tx, changes.catalog_id())?;
                }

                let mut remapped: HashMap<Uuid, Uuid> = HashMap::new();
                for changes in plan.catalogs() {
                    for tool in changes.create() {
                        let row = tool_to_row(tool);
                        let stored_id = upsert_tool(tx, &row)?;
                        if stored_id != row.id {
                            remapped.insert(row.id, stored_id);
                        }
                    }
                    for tool in changes.update() {
                        let row = tool_to_row(tool);
                        diesel::update(catalog_tools::table.find(row.id))
                            .set((
                                catalog_tools::description.eq(&row.description),
                                catalog_tools::input_schema.eq(&row.input_schema),
                                catalog_tools::fingerprint.eq(&row.fingerprint),
                                catalog_tools::updated_at.eq(row.updated_at),
                            ))
                            .execute(tx)?;
                    }
                }

                for change in plan.bindings() {
                    apply_binding_delta(tx, change, &remapped, applied_at)?;
                }

                for changes in plan.catalogs() {
                    let doomed: Vec<Uuid> =
                        changes.delete().iter().map(|tool_id| tool_id.into_inner()).collect();
                    if doomed.is_empty() {
                        continue;
                    }
                    // binding_tools rows cascade with the tool.
                    diesel::delete(catalog_tools::table.filter(catalog_tools::id.eq_any(&doomed)))
                        .execute(tx)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn entities_binding_catalogs(
        &self,
        catalog_ids: &BTreeSet<CatalogId>,
        excluded_tenant: &TenantId,
    ) -> CatalogStoreResult<Vec<CompositeEntity>> {
        let catalog_uuids: Vec<Uuid> = catalog_ids.iter().map(|id| id.into_inner()).collect();
        let tenant = excluded_tenant.as_str().to_owned();

        run_blocking(&self.pool, move |connection| {
            let entity_ids: Vec<Uuid> = bindings::table
                .filter(bindings::catalog_id.eq_any(&catalog_uuids))
                .filter(bindings::tenant_id.ne(&tenant))
                .select(bindings::entity_id)
                .distinct()
                .load(connection)?;
            if entity_ids.is_empty() {
                return Ok(Vec::new());
            }

            let rows = composite_entities::table
                .filter(composite_entities::id.eq_any(&entity_ids))
                .filter(composite_entities::tenant_id.ne(&tenant))
                .order((composite_entities::created_at.asc(), composite_entities::id.asc()))
                .select(EntityRow::as_select())
                .load::<EntityRow>(connection)?;
            rows.into_iter().map(row_to_entity).collect()
        })
        .await
    }

    async fn insert_entity(&self, plan: &NewEntityPlan) -> CatalogStoreResult<()> {
        let entity_id = plan.entity.id();
        let entity_row = entity_to_row(&plan.entity);
        let binding_rows = plan
            .bindings
            .iter()
            .map(binding_to_row)
            .collect::<CatalogStoreResult<Vec<_>>>()?;
        let allow_rows: Vec<BindingToolRow> = plan
            .bindings
            .iter()
            .flat_map(|binding| {
                binding.allowed_tools().iter().map(|tool_id| BindingToolRow {
                    binding_id: binding.id().into_inner(),
                    tool_id: tool_id.into_inner(),
                })
            })
            .collect();
        let bundle_rows: Vec<CredentialBundleRow> = plan.bundles.iter().map(bundle_to_row).collect();

        run_blocking(&self.pool, move |connection| {
            connection.transaction::<_, CatalogStoreError, _>(|tx| {
                diesel::insert_into(composite_entities::table)
                    .values(&entity_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            CatalogStoreError::DuplicateEntity(entity_id)
                        }
                        _ => CatalogStoreError::persistence(err),
                    })?;
                diesel::insert_into(bindings::table)
                    .values(&binding_rows)
                    .execute(tx)?;
                if !allow_rows.is_empty() {
                    diesel::insert_into(binding_tools::table)
                        .values(&allow_rows)
                        .execute(tx)?;
                }
                for row in &bundle_rows {
                    replace_bundle(tx, row)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn save_binding_enabled(&self, binding: &Binding) -> CatalogStoreResult<()> {
        let binding_id = binding.id();
        let enabled = binding.is_enabled();
        let updated_at = binding.updated_at();

        run_blocking(&self.pool, move |connection| {
            let updated = diesel::update(bindings::table.find(binding_id.into_inner()))
                .set((
                    bindings::enabled.eq(enabled),
                    bindings::updated_at.eq(updated_at),
                ))
                .execute(connection)?;
            if updated == 0 {
                return Err(CatalogStoreError::BindingNotFound(binding_id));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CredentialStore for PostgresCatalogStore {
    async fn find_access_token(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> CredentialStoreResult<Option<AccessToken>> {
        let tenant = tenant_id.as_str().to_owned();
        let user = user_id.as_str().to_owned();

        run_blocking(&self.pool, move |connection| {
            let token = oauth_tokens::table
                .filter(oauth_tokens::binding_id.eq(binding_id.into_inner()))
                .filter(oauth_tokens::tenant_id.eq(&tenant))
                .filter(oauth_tokens::user_id.eq(&user))
                .select(oauth_tokens::access_token)
                .first::<String>(connection)
                .optional()?;
            Ok(token.map(AccessToken::new))
        })
        .await
    }

    async fn find_bundle(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> CredentialStoreResult<Option<CredentialBundle>> {
        let tenant = tenant_id.as_str().to_owned();
        let user = user_id.map(|value| value.as_str().to_owned());

        run_blocking(&self.pool, move |connection| {
            let rows = credential_bundles::table
                .filter(credential_bundles::binding_id.eq(binding_id.into_inner()))
                .filter(credential_bundles::tenant_id.eq(&tenant))
                .select(CredentialBundleRow::as_select())
                .load::<CredentialBundleRow>(connection)?;

            let user_row = user.as_ref().and_then(|wanted| {
                rows.iter()
                    .find(|row| row.user_id.as_deref() == Some(wanted.as_str()))
            });
            let chosen = user_row.or_else(|| rows.iter().find(|row| row.user_id.is_none()));
            chosen.cloned().map(row_to_bundle).transpose()
        })
        .await
    }

    async fn latest_bundle_for_catalog(
        &self,
        tenant_id: &TenantId,
        catalog_id: CatalogId,
    ) -> CredentialStoreResult<Option<CredentialBundle>> {
        let tenant = tenant_id.as_str().to_owned();

        run_blocking(&self.pool, move |connection| {
            let binding_ids: Vec<Uuid> = bindings::table
                .filter(bindings::catalog_id.eq(catalog_id.into_inner()))
                .filter(bindings::tenant_id.eq(&tenant))
                .select(bindings::id)
                .load(connection)?;
            if binding_ids.is_empty() {
                return Ok(None);
            }

            let row = credential_bundles::table
                .filter(credential_bundles::binding_id.eq_any(&binding_ids))
                .filter(credential_bundles::tenant_id.eq(&tenant))
                .order(credential_bundles::created_at.desc())
                .select(CredentialBundleRow::as_select())
                .first::<CredentialBundleRow>(connection)
                .optional()?;
            row.map(row_to_bundle).transpose()
        })
        .await
    }

    async fn upsert_bundle(&self, bundle: &CredentialBundle) -> CredentialStoreResult<()> {
        let row = bundle_to_row(bundle);
        run_blocking(&self.pool, move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| replace_bundle(tx, &row))
                .map_err(CredentialStoreError::persistence)
        })
        .await
    }
}

fn hydrate_bindings(
    connection: &mut PgConnection,
    rows: Vec<BindingRow>,
) -> CatalogStoreResult<Vec<Binding>> {
    let binding_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let pairs: Vec<(Uuid, Uuid)> = if binding_ids.is_empty() {
        Vec::new()
    } else {
        binding_tools::table
            .filter(binding_tools::binding_id.eq_any(&binding_ids))
            .select((binding_tools::binding_id, binding_tools::tool_id))
            .load(connection)?
    };

    let mut allowed: HashMap<Uuid, BTreeSet<ToolId>> = HashMap::new();
    for (binding_id, tool_id) in pairs {
        allowed
            .entry(binding_id)
            .or_default()
            .insert(ToolId::from_uuid(tool_id));
    }
    rows.into_iter()
        .map(|row| row_to_binding(row, &mut allowed))
        .collect()
}

fn lock_catalog(tx: &mut PgConnection, catalog_id: CatalogId) -> CatalogStoreResult<()> {
    let (high, low) = catalog_id.into_inner().as_u64_pair();
    let key = i64::try_from((high ^ low) >> 1).unwrap_or(i64::MAX);
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<diesel::sql_types::BigInt, _>(key)
        .execute(tx)?;
    Ok(())
}

fn upsert_tool(tx: &mut PgConnection, row: &CatalogToolRow) -> CatalogStoreResult<Uuid> {
    let stored_id = diesel::insert_into(catalog_tools::table)
        .values(row)
        .on_conflict((catalog_tools::catalog_id, catalog_tools::name))
        .do_update()
        .set((
            catalog_tools::description.eq(excluded(catalog_tools::description)),
            catalog_tools::input_schema.eq(excluded(catalog_tools::input_schema)),
            catalog_tools::fingerprint.eq(excluded(catalog_tools::fingerprint)),
            catalog_tools::updated_at.eq(excluded(catalog_tools::updated_at)),
        ))
        .returning(catalog_tools::id)
        .get_result::<Uuid>(tx)?;
    Ok(stored_id)
}

fn apply_binding_delta(
    tx: &mut PgConnection,
    change: &BindingAllowListChange,
    remapped: &HashMap<Uuid, Uuid>,
    applied_at: DateTime<Utc>,
) -> CatalogStoreResult<()> {
    let binding_uuid = change.binding_id.into_inner();
    let catalog_uuid = bindings::table
        .find(binding_uuid)
        .select(bindings::catalog_id)
        .first::<Uuid>(tx)
        .optional()?
        .ok_or(CatalogStoreError::BindingNotFound(change.binding_id))?;
    if change.delta.is_empty() {
        return Ok(());
    }

    let wanted: Vec<Uuid> = change
        .delta
        .connect()
        .iter()
        .map(|tool_id| {
            let planned = tool_id.into_inner();
            remapped.get(&planned).copied().unwrap_or(planned)
        })
        .collect();
    if !wanted.is_empty() {
        let present: Vec<Uuid> = catalog_tools::table
            .filter(catalog_tools::catalog_id.eq(catalog_uuid))
            .filter(catalog_tools::id.eq_any(&wanted))
            .select(catalog_tools::id)
            .load(tx)?;
        let rows: Vec<BindingToolRow> = present
            .into_iter()
            .map(|tool_id| BindingToolRow {
                binding_id: binding_uuid,
                tool_id,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(binding_tools::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(tx)?;
        }
    }

    let dropped: Vec<Uuid> = change
        .delta
        .disconnect()
        .iter()
        .map(|tool_id| tool_id.into_inner())
        .collect();
    if !dropped.is_empty() {
        diesel::delete(
            binding_tools::table
                .filter(binding_tools::binding_id.eq(binding_uuid))
                .filter(binding_tools::tool_id.eq_any(&dropped)),
        )
        .execute(tx)?;
    }

    diesel::update(bindings::table.find(binding_uuid))
        .set(bindings::updated_at.eq(applied_at))
        .execute(tx)?;
    Ok(())
}

fn replace_bundle(tx: &mut PgConnection, row: &CredentialBundleRow) -> Result<(), DieselError> {
    let scope = credential_bundles::table
        .filter(credential_bundles::binding_id.eq(row.binding_id))
        .filter(credential_bundles::tenant_id.eq(&row.tenant_id));
    match &row.user_id {
        Some(user) => {
            diesel::delete(scope.filter(credential_bundles::user_id.eq(user))).execute(tx)?;
        }
        None => {
            diesel::delete(scope.filter(credential_bundles::user_id.is_null())).execute(tx)?;
        }
    }
    diesel::insert_into(credential_bundles::table)
        .values(row)
        .execute(tx)?;
    Ok(())
}
