//! In-memory catalog and credential store.

use crate::catalog::{
    domain::{
        AccessToken, AllowListDelta, Binding, BindingId, Catalog, CatalogId, CatalogTool, CompositeEntity,
        CredentialBundle, EntityId, NewEntityPlan, ReconciliationPlan, TenantId, ToolId, UserId,
    },
    ports::{
        CatalogStore, CatalogStoreError, CatalogStoreResult, CredentialStore,
        CredentialStoreError, CredentialStoreResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory implementation of [`CatalogStore`] and
/// [`CredentialStore`].
///
/// Writes are staged on a copy of the state and swapped in only when the
/// whole operation succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

type TokenKey = (BindingId, TenantId, UserId);

#[derive(Debug, Clone, Default)]
struct InMemoryStoreState {
    catalogs: HashMap<CatalogId, Catalog>,
    tools: HashMap<CatalogId, Vec<CatalogTool>>,
    entities: Vec<CompositeEntity>,
    bindings: HashMap<BindingId, Binding>,
    bundles: Vec<CredentialBundle>,
    tokens: HashMap<TokenKey, AccessToken>,
}

impl InMemoryCatalogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an OAuth access token issued for `(binding, tenant, user)`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError::Persistence`] when lock acquisition
    /// fails.
    pub fn store_access_token(
        &self,
        binding_id: BindingId,
        tenant_id: TenantId,
        user_id: UserId,
        token: AccessToken,
    ) -> CredentialStoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| CredentialStoreError::persistence(std::io::Error::other(err.to_string())))?;
        state.tokens.insert((binding_id, tenant_id, user_id), token);
        Ok(())
    }

    fn read_state(
        &self,
    ) -> CatalogStoreResult<std::sync::RwLockReadGuard<'_, InMemoryStoreState>> {
        self.state
            .read()
            .map_err(|err| CatalogStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(
        &self,
    ) -> CatalogStoreResult<std::sync::RwLockWriteGuard<'_, InMemoryStoreState>> {
        self.state
            .write()
            .map_err(|err| CatalogStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn read_credentials(
        &self,
    ) -> CredentialStoreResult<std::sync::RwLockReadGuard<'_, InMemoryStoreState>> {
        self.state.read().map_err(|err| {
            CredentialStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryStoreState {
    fn apply(
        &mut self,
        plan: &ReconciliationPlan,
        applied_at: DateTime<Utc>,
    ) -> CatalogStoreResult<()> {
        let mut remapped: HashMap<ToolId, ToolId> = HashMap::new();

        for changes in plan.catalogs() {
            let tools = self.tools.entry(changes.catalog_id()).or_default();
            for tool in changes.create() {
                // A concurrent refresh may already have stored the name.
                if let Some(stored) = tools.iter_mut().find(|stored| stored.name() == tool.name()) {
                    remapped.insert(tool.id(), stored.id());
                    *stored = stored.revised(tool.definition().clone(), applied_at);
                } else {
                    tools.push(tool.clone());
                }
            }
            for tool in changes.update() {
                if let Some(stored) = tools.iter_mut().find(|stored| stored.id() == tool.id()) {
                    *stored = tool.clone();
                }
            }
        }

        for change in plan.bindings() {
            let binding = self
                .bindings
                .get_mut(&change.binding_id)
                .ok_or(CatalogStoreError::BindingNotFound(change.binding_id))?;
            let current: BTreeSet<ToolId> = self
                .tools
                .get(&binding.catalog_id())
                .map(|tools| tools.iter().map(CatalogTool::id).collect())
                .unwrap_or_default();
            let connect = change
                .delta
                .connect()
                .iter()
                .map(|tool_id| remapped.get(tool_id).copied().unwrap_or(*tool_id))
                .filter(|tool_id| current.contains(tool_id))
                .collect();
            let delta = AllowListDelta::new(
                connect,
                change.delta.disconnect().clone(),
            );
            binding.apply_delta(&delta, applied_at);
        }

        for changes in plan.catalogs() {
            if changes.delete().is_empty() {
                continue;
            }
            if let Some(tools) = self.tools.get_mut(&changes.catalog_id()) {
                tools.retain(|tool| !changes.delete().contains(&tool.id()));
            }
            for binding in self.bindings.values_mut() {
                for tool_id in changes.delete() {
                    binding.forget_tool(*tool_id);
                }
            }
        }

        Ok(())
    }

    fn upsert_bundle(&mut self, bundle: &CredentialBundle) {
        let existing = self.bundles.iter_mut().find(|stored| {
            stored.binding_id() == bundle.binding_id()
                && stored.tenant_id() == bundle.tenant_id()
                && stored.user_id() == bundle.user_id()
        });
        match existing {
            Some(stored) => *stored = bundle.clone(),
            None => self.bundles.push(bundle.clone()),
        }
    }

    fn bundle_for(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> Option<&CredentialBundle> {
        self.bundles.iter().find(|bundle| {
            bundle.binding_id() == binding_id
                && bundle.tenant_id() == tenant_id
                && bundle.user_id() == user_id
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn register_catalog(
        &self,
        catalog: &Catalog,
        tools: &[CatalogTool],
    ) -> CatalogStoreResult<()> {
        let mut state = self.write_state()?;
        if state.catalogs.contains_key(&catalog.id()) {
            return Err(CatalogStoreError::DuplicateCatalog(catalog.id()));
        }
        state.catalogs.insert(catalog.id(), catalog.clone());
        state.tools.insert(catalog.id(), tools.to_vec());
        Ok(())
    }

    async fn find_catalog(&self, catalog_id: CatalogId) -> CatalogStoreResult<Option<Catalog>> {
        let state = self.read_state()?;
        Ok(state.catalogs.get(&catalog_id).cloned())
    }

    async fn list_tools(&self, catalog_id: CatalogId) -> CatalogStoreResult<Vec<CatalogTool>> {
        let state = self.read_state()?;
        Ok(state.tools.get(&catalog_id).cloned().unwrap_or_default())
    }

    async fn find_entity(
        &self,
        entity_id: EntityId,
    ) -> CatalogStoreResult<Option<CompositeEntity>> {
        let state = self.read_state()?;
        Ok(state
            .entities
            .iter()
            .find(|entity| entity.id() == entity_id)
            .cloned())
    }

    async fn list_bindings(&self, entity_id: EntityId) -> CatalogStoreResult<Vec<Binding>> {
        let state = self.read_state()?;
        let mut bindings: Vec<Binding> = state
            .bindings
            .values()
            .filter(|binding| binding.entity_id() == entity_id)
            .cloned()
            .collect();
        bindings.sort_by_key(Binding::position);
        Ok(bindings)
    }

    async fn find_binding(&self, binding_id: BindingId) -> CatalogStoreResult<Option<Binding>> {
        let state = self.read_state()?;
        Ok(state.bindings.get(&binding_id).cloned())
    }

    async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
        applied_at: DateTime<Utc>,
    ) -> CatalogStoreResult<()> {
        let mut state = self.write_state()?;
        let mut staged = state.clone();
        staged.apply(plan, applied_at)?;
        *state = staged;
        Ok(())
    }

    async fn entities_binding_catalogs(
        &self,
        catalog_ids: &BTreeSet<CatalogId>,
        excluded_tenant: &TenantId,
    ) -> CatalogStoreResult<Vec<CompositeEntity>> {
        let state = self.read_state()?;
        let mut entities: Vec<CompositeEntity> = state
            .entities
            .iter()
            .filter(|entity| entity.tenant_id() != excluded_tenant)
            .filter(|entity| {
                state.bindings.values().any(|binding| {
                    binding.entity_id() == entity.id() && catalog_ids.contains(&binding.catalog_id())
                })
            })
            .cloned()
            .collect();
        entities.sort_by_key(CompositeEntity::created_at);
        Ok(entities)
    }

    async fn insert_entity(&self, plan: &NewEntityPlan) -> CatalogStoreResult<()> {
        let mut state = self.write_state()?;
        let entity_id = plan.entity.id();
        if state.entities.iter().any(|entity| entity.id() == entity_id) {
            return Err(CatalogStoreError::DuplicateEntity(entity_id));
        }

        state.entities.push(plan.entity.clone());
        for binding in &plan.bindings {
            state.bindings.insert(binding.id(), binding.clone());
        }
        for bundle in &plan.bundles {
            state.upsert_bundle(bundle);
        }
        Ok(())
    }

    async fn save_binding_enabled(&self, binding: &Binding) -> CatalogStoreResult<()> {
        let mut state = self.write_state()?;
        let stored = state
            .bindings
            .get_mut(&binding.id())
            .ok_or(CatalogStoreError::BindingNotFound(binding.id()))?;
        stored.set_enabled(binding.is_enabled(), binding.updated_at());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCatalogStore {
    async fn find_access_token(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> CredentialStoreResult<Option<AccessToken>> {
        let state = self.read_credentials()?;
        Ok(state
            .tokens
            .get(&(binding_id, tenant_id.clone(), user_id.clone()))
            .cloned())
    }

    async fn find_bundle(
        &self,
        binding_id: BindingId,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> CredentialStoreResult<Option<CredentialBundle>> {
        let state = self.read_credentials()?;
        let user_row = user_id.and_then(|user| state.bundle_for(binding_id, tenant_id, Some(user)));
        Ok(user_row
            .or_else(|| state.bundle_for(binding_id, tenant_id, None))
            .cloned())
    }

    async fn latest_bundle_for_catalog(
        &self,
        tenant_id: &TenantId,
        catalog_id: CatalogId,
    ) -> CredentialStoreResult<Option<CredentialBundle>> {
        let state = self.read_credentials()?;
        let latest = state
            .bundles
            .iter()
            .filter(|bundle| bundle.tenant_id() == tenant_id)
            .filter(|bundle| {
                state
                    .bindings
                    .get(&bundle.binding_id())
                    .is_some_and(|binding| binding.catalog_id() == catalog_id)
            })
            .fold(None::<&CredentialBundle>, |latest, bundle| match latest {
                Some(current) if current.created_at() > bundle.created_at() => Some(current),
                _ => Some(bundle),
            });
        Ok(latest.cloned())
    }

    async fn upsert_bundle(&self, bundle: &CredentialBundle) -> CredentialStoreResult<()> {
        let mut state = self.state.write().map_err(|err| {
            CredentialStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.upsert_bundle(bundle);
        Ok(())
    }
}
