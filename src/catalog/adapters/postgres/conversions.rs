//! Row and domain conversions for the catalog store.

use super::models::{
    BindingRow, CatalogRow, CatalogToolRow, CredentialBundleRow, EntityRow,
};
use crate::catalog::{
    domain::{
        AuthMode, Binding, BindingId, Catalog, CatalogId, CatalogKind, CatalogTool,
        CatalogTransport, CompositeEntity, CredentialBundle, EntityId, PersistedBindingData,
        PersistedCatalogData, PersistedCredentialBundleData, PersistedEntityData,
        PersistedToolData, SealedCredentials, TenantId, ToolDefinition, ToolFingerprint, ToolId,
        UserId,
    },
    ports::{CatalogStoreError, CatalogStoreResult, CredentialStoreError, CredentialStoreResult},
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

pub(super) fn catalog_to_row(catalog: &Catalog) -> CatalogStoreResult<CatalogRow> {
    let credential_keys =
        serde_json::to_value(catalog.credential_keys()).map_err(CatalogStoreError::persistence)?;
    Ok(CatalogRow {
        id: catalog.id().into_inner(),
        name: catalog.name().to_owned(),
        kind: catalog.kind().as_str().to_owned(),
        transport: catalog.transport().as_str().to_owned(),
        base_url: catalog.base_url().map(str::to_owned),
        auth_mode: catalog.auth_mode().as_str().to_owned(),
        credential_keys,
        created_at: catalog.created_at(),
        updated_at: catalog.updated_at(),
    })
}

pub(super) fn row_to_catalog(row: CatalogRow) -> CatalogStoreResult<Catalog> {
    let kind = CatalogKind::try_from(row.kind.as_str())
        .map_err(CatalogStoreError::invalid_persisted_data)?;
    let transport = CatalogTransport::try_from(row.transport.as_str())
        .map_err(CatalogStoreError::invalid_persisted_data)?;
    let auth_mode = AuthMode::try_from(row.auth_mode.as_str())
        .map_err(CatalogStoreError::invalid_persisted_data)?;
    let credential_keys: BTreeSet<String> = serde_json::from_value(row.credential_keys)
        .map_err(CatalogStoreError::invalid_persisted_data)?;

    Ok(Catalog::from_persisted(PersistedCatalogData {
        id: CatalogId::from_uuid(row.id),
        name: row.name,
        kind,
        transport,
        base_url: row.base_url,
        auth_mode,
        credential_keys,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn tool_to_row(tool: &CatalogTool) -> CatalogToolRow {
    let definition = tool.definition();
    CatalogToolRow {
        id: tool.id().into_inner(),
        catalog_id: tool.catalog_id().into_inner(),
        name: definition.name().to_owned(),
        description: definition.description().map(str::to_owned),
        input_schema: definition.input_schema().clone(),
        fingerprint: tool.fingerprint().as_str().to_owned(),
        created_at: tool.created_at(),
        updated_at: tool.updated_at(),
    }
}

pub(super) fn row_to_tool(row: CatalogToolRow) -> CatalogStoreResult<CatalogTool> {
    let definition = ToolDefinition::new(row.name, row.description, row.input_schema)
        .map_err(CatalogStoreError::invalid_persisted_data)?;
    Ok(CatalogTool::from_persisted(PersistedToolData {
        id: ToolId::from_uuid(row.id),
        catalog_id: CatalogId::from_uuid(row.catalog_id),
        definition,
        fingerprint: ToolFingerprint::from_persisted(row.fingerprint),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn entity_to_row(entity: &CompositeEntity) -> EntityRow {
    EntityRow {
        id: entity.id().into_inner(),
        tenant_id: entity.tenant_id().as_str().to_owned(),
        name: entity.name().to_owned(),
        created_by: entity.created_by().as_str().to_owned(),
        created_at: entity.created_at(),
    }
}

pub(super) fn row_to_entity(row: EntityRow) -> CatalogStoreResult<CompositeEntity> {
    Ok(CompositeEntity::from_persisted(PersistedEntityData {
        id: EntityId::from_uuid(row.id),
        tenant_id: TenantId::new(row.tenant_id).map_err(CatalogStoreError::invalid_persisted_data)?,
        name: row.name,
        created_by: UserId::new(row.created_by)
            .map_err(CatalogStoreError::invalid_persisted_data)?,
        created_at: row.created_at,
    }))
}

pub(super) fn binding_to_row(binding: &Binding) -> CatalogStoreResult<BindingRow> {
    Ok(BindingRow {
        id: binding.id().into_inner(),
        entity_id: binding.entity_id().into_inner(),
        tenant_id: binding.tenant_id().as_str().to_owned(),
        catalog_id: binding.catalog_id().into_inner(),
        display_name: binding.display_name().to_owned(),
        enabled: binding.is_enabled(),
        position: i32::try_from(binding.position()).map_err(CatalogStoreError::persistence)?,
        created_at: binding.created_at(),
        updated_at: binding.updated_at(),
    })
}

pub(super) fn row_to_binding(
    row: BindingRow,
    allowed: &mut HashMap<Uuid, BTreeSet<ToolId>>,
) -> CatalogStoreResult<Binding> {
    let allowed_tools = allowed.remove(&row.id).unwrap_or_default();
    Ok(Binding::from_persisted(PersistedBindingData {
        id: BindingId::from_uuid(row.id),
        entity_id: EntityId::from_uuid(row.entity_id),
        tenant_id: TenantId::new(row.tenant_id).map_err(CatalogStoreError::invalid_persisted_data)?,
        catalog_id: CatalogId::from_uuid(row.catalog_id),
        display_name: row.display_name,
        enabled: row.enabled,
        position: u32::try_from(row.position).map_err(CatalogStoreError::invalid_persisted_data)?,
        allowed_tools,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn bundle_to_row(bundle: &CredentialBundle) -> CredentialBundleRow {
    CredentialBundleRow {
        id: Uuid::new_v4(),
        binding_id: bundle.binding_id().into_inner(),
        tenant_id: bundle.tenant_id().as_str().to_owned(),
        user_id: bundle.user_id().map(|user| user.as_str().to_owned()),
        sealed: bundle.sealed().as_bytes().to_vec(),
        created_at: bundle.created_at(),
        updated_at: bundle.updated_at(),
    }
}

pub(super) fn row_to_bundle(row: CredentialBundleRow) -> CredentialStoreResult<CredentialBundle> {
    let user_id = row
        .user_id
        .map(UserId::new)
        .transpose()
        .map_err(CredentialStoreError::persistence)?;
    Ok(CredentialBundle::from_persisted(PersistedCredentialBundleData {
        binding_id: BindingId::from_uuid(row.binding_id),
        tenant_id: TenantId::new(row.tenant_id).map_err(CredentialStoreError::persistence)?,
        user_id,
        sealed: SealedCredentials::from_bytes(row.sealed),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
