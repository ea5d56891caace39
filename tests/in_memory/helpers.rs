//! Shared fixtures for in-memory catalog service tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;
use toolhub::catalog::{
    adapters::{
        AesGcmCredentialSealer,
        memory::{
            InMemoryCatalogFetcher, InMemoryCatalogStore, InMemoryNotificationOutbox,
            RecordingNotificationSink,
        },
    },
    domain::{
        AuthMode, Binding, Catalog, CatalogTool, CatalogTransport, CompositeEntity, NewEntityPlan,
        TenantId, ToolDefinition, ToolId, UserId,
    },
    ports::CatalogStore,
    services::{
        BindingAdminService, CatalogRefreshService, HeaderBuilder, NotificationDispatcher,
        TemplateMergeService,
    },
};

/// Boxed error used by fallible helpers.
pub type TestError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for fallible helpers.
pub type TestResult<T> = Result<T, TestError>;

/// Refresh service wired to in-memory adapters.
pub type TestRefreshService = CatalogRefreshService<
    InMemoryCatalogStore,
    InMemoryCatalogStore,
    AesGcmCredentialSealer,
    InMemoryCatalogFetcher,
    InMemoryNotificationOutbox,
    DefaultClock,
>;

/// Merge service wired to in-memory adapters.
pub type TestMergeService = TemplateMergeService<
    InMemoryCatalogStore,
    InMemoryCatalogStore,
    AesGcmCredentialSealer,
    DefaultClock,
>;

/// Binding administration service wired to in-memory adapters.
pub type TestAdminService = BindingAdminService<
    InMemoryCatalogStore,
    InMemoryCatalogStore,
    AesGcmCredentialSealer,
    DefaultClock,
>;

/// Dispatcher draining the in-memory outbox into the recording sink.
pub type TestDispatcher =
    NotificationDispatcher<InMemoryNotificationOutbox, RecordingNotificationSink, DefaultClock>;

/// Key used to seal credentials in tests.
pub const TEST_KEY: [u8; 32] = [7; 32];

/// Shared adapters behind every service under test.
pub struct Harness {
    /// Catalog and credential store.
    pub store: Arc<InMemoryCatalogStore>,
    /// Scripted upstream.
    pub fetcher: Arc<InMemoryCatalogFetcher>,
    /// Notification outbox.
    pub outbox: Arc<InMemoryNotificationOutbox>,
    /// Recording notification sink.
    pub sink: Arc<RecordingNotificationSink>,
    /// Credential sealer.
    pub sealer: Arc<AesGcmCredentialSealer>,
}

impl Harness {
    /// Creates empty adapters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryCatalogStore::new()),
            fetcher: Arc::new(InMemoryCatalogFetcher::new()),
            outbox: Arc::new(InMemoryNotificationOutbox::new()),
            sink: Arc::new(RecordingNotificationSink::new()),
            sealer: Arc::new(AesGcmCredentialSealer::new(&TEST_KEY)),
        }
    }

    /// Builds a refresh service over the shared adapters.
    #[must_use]
    pub fn refresh_service(&self) -> TestRefreshService {
        CatalogRefreshService::new(
            Arc::clone(&self.store),
            self.header_builder(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.outbox),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a header builder over the shared adapters.
    #[must_use]
    pub fn header_builder(&self) -> HeaderBuilder<InMemoryCatalogStore, AesGcmCredentialSealer> {
        HeaderBuilder::new(Arc::clone(&self.store), Arc::clone(&self.sealer))
    }

    /// Builds a merge service over the shared adapters.
    #[must_use]
    pub fn merge_service(&self) -> TestMergeService {
        TemplateMergeService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.sealer),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a binding administration service over the shared adapters.
    #[must_use]
    pub fn admin_service(&self) -> TestAdminService {
        BindingAdminService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.sealer),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a dispatcher over the shared outbox and sink.
    #[must_use]
    pub fn dispatcher(&self) -> TestDispatcher {
        NotificationDispatcher::new(
            Arc::clone(&self.outbox),
            Arc::clone(&self.sink),
            Arc::new(DefaultClock),
        )
    }

    /// Registers a remote catalog caching `tools` and scripts its upstream
    /// to serve the same list.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is invalid or registration fails.
    pub async fn remote_catalog(
        &self,
        name: &str,
        auth_mode: AuthMode,
        tools: &[(&str, &str)],
    ) -> TestResult<(Catalog, Vec<CatalogTool>)> {
        let catalog = Catalog::remote(
            name,
            CatalogTransport::StreamableHttp,
            format!("https://{}.example.com/mcp", name.to_lowercase().replace(' ', "-")),
            auth_mode,
            &DefaultClock,
        )?
        .with_credential_keys(["X-Api-Key", "X-Region"])?;
        let cached = tools
            .iter()
            .map(|(tool_name, description)| {
                Ok(CatalogTool::new(
                    catalog.id(),
                    definition(tool_name, description)?,
                    &DefaultClock,
                ))
            })
            .collect::<TestResult<Vec<_>>>()?;
        self.store.register_catalog(&catalog, &cached).await?;
        self.serve(&catalog, tools)?;
        Ok((catalog, cached))
    }

    /// Scripts the catalog's upstream to serve `tools`.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition is invalid or scripting fails.
    pub fn serve(&self, catalog: &Catalog, tools: &[(&str, &str)]) -> TestResult<()> {
        let definitions = tools
            .iter()
            .map(|(tool_name, description)| definition(tool_name, description))
            .collect::<TestResult<Vec<_>>>()?;
        let base_url = catalog.base_url().ok_or("catalog has no base URL")?;
        self.fetcher.set_tools(base_url, definitions)?;
        Ok(())
    }

    /// Creates an entity in `tenant_id` binding each catalog with every
    /// current tool connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or a binding is invalid or the store
    /// fails.
    pub async fn entity_with_bindings(
        &self,
        tenant_id: &TenantId,
        name: &str,
        catalogs: &[&Catalog],
    ) -> TestResult<(CompositeEntity, Vec<Binding>)> {
        let entity = CompositeEntity::new(tenant_id.clone(), name, user("owner")?, &DefaultClock)?;
        let mut bindings = Vec::with_capacity(catalogs.len());
        for (position, catalog) in (0_u32..).zip(catalogs) {
            let allowed: BTreeSet<ToolId> = self
                .store
                .list_tools(catalog.id())
                .await?
                .iter()
                .map(CatalogTool::id)
                .collect();
            bindings.push(Binding::new(
                &entity,
                catalog.id(),
                catalog.name(),
                position,
                allowed,
                &DefaultClock,
            )?);
        }
        self.store
            .insert_entity(&NewEntityPlan {
                entity: entity.clone(),
                bindings: bindings.clone(),
                bundles: Vec::new(),
            })
            .await?;
        Ok((entity, bindings))
    }

    /// Returns the stored allow-list of a binding, keyed by tool name.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding is missing or the store fails.
    pub async fn allowed_names(&self, binding: &Binding) -> TestResult<BTreeSet<String>> {
        let stored = self
            .store
            .find_binding(binding.id())
            .await?
            .ok_or("binding missing")?;
        let tools = self.store.list_tools(binding.catalog_id()).await?;
        Ok(tools
            .iter()
            .filter(|tool| stored.is_connected(tool.id()))
            .map(|tool| tool.name().to_owned())
            .collect())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Provides fresh adapters for each test.
#[fixture]
pub fn harness() -> Harness {
    Harness::new()
}

/// Builds a tool definition with a trivial object schema.
///
/// # Errors
///
/// Returns an error if the name is blank.
pub fn definition(name: &str, description: &str) -> TestResult<ToolDefinition> {
    Ok(ToolDefinition::new(
        name,
        Some(description.to_owned()),
        json!({"type": "object"}),
    )?)
}

/// Builds a tenant identifier.
///
/// # Errors
///
/// Returns an error if the value is blank.
pub fn tenant(name: &str) -> TestResult<TenantId> {
    Ok(TenantId::new(name)?)
}

/// Builds a user identifier.
///
/// # Errors
///
/// Returns an error if the value is blank.
pub fn user(name: &str) -> TestResult<UserId> {
    Ok(UserId::new(name)?)
}
