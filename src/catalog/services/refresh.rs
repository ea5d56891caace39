//! Catalog refresh: fetch, diff, apply, and cross-tenant fan-out.

use super::{
    headers::{HeaderBuildError, HeaderBuilder},
    impact::{NotificationComposer, distinct_by_tenant},
    kind::{ErrorKind, store_error_kind},
};
use crate::catalog::{
    domain::{
        AllowListDelta, Binding, BindingAllowListChange, BindingId, BindingRefreshReport, Catalog,
        CatalogId, CatalogTool, ChangeSet, CompositeEntity, EntityId, OutboxEntry,
        ReconciliationPlan, RefreshReport, TenantId, TenantImpact, UserId, detect_changes,
    },
    ports::{
        CatalogFetchError, CatalogFetcher, CatalogStore, CatalogStoreError, CredentialSealer,
        CredentialStore, NotificationOutbox,
    },
};
use crate::config::{ConsoleConfig, DEFAULT_LINK_BASE, DEFAULT_REFRESH_TIMEOUT};
use mockable::Clock;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Input of one refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Entity whose bindings are refreshed.
    pub entity_id: EntityId,
    /// Tenant that owns the entity.
    pub tenant_id: TenantId,
    /// User on whose behalf upstreams are called.
    pub user_id: UserId,
    /// When set, the diff is computed and reported but nothing is written.
    pub dry_run: bool,
}

impl RefreshRequest {
    /// Creates a request that applies changes.
    #[must_use]
    pub const fn new(entity_id: EntityId, tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            entity_id,
            tenant_id,
            user_id,
            dry_run: false,
        }
    }

    /// Sets preview mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Errors returned by [`CatalogRefreshService::refresh`].
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    /// The entity does not exist in the requesting tenant.
    #[error("composite entity {0} not found")]
    EntityNotFound(EntityId),

    /// A binding references a catalog that no longer exists.
    #[error("catalog {0} not found")]
    CatalogNotFound(CatalogId),

    /// A live remote catalog returned no tools.
    #[error("upstream for binding {binding_id} returned no tools; refusing to remove every tool of catalog {catalog_id}")]
    EmptyUpstream {
        /// Binding being refreshed.
        binding_id: BindingId,
        /// Catalog whose fetch came back empty.
        catalog_id: CatalogId,
    },

    /// The fetch phase exceeded its time budget.
    #[error("refresh of entity {entity_id} timed out after {timeout:?}")]
    Timeout {
        /// Entity being refreshed.
        entity_id: EntityId,
        /// Configured budget.
        timeout: Duration,
    },

    /// Upstream headers could not be resolved.
    #[error(transparent)]
    Headers(#[from] HeaderBuildError),

    /// The upstream call failed.
    #[error(transparent)]
    Fetch(#[from] CatalogFetchError),

    /// The catalog store failed.
    #[error(transparent)]
    Store(#[from] CatalogStoreError),
}

impl RefreshError {
    /// Classifies the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotFound(_) | Self::CatalogNotFound(_) => ErrorKind::NotFound,
            Self::EmptyUpstream { .. } => ErrorKind::FatalUpstream,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Headers(HeaderBuildError::MissingAccessToken { .. })
            | Self::Fetch(CatalogFetchError::Unauthorized { .. }) => ErrorKind::Unauthenticated,
            Self::Headers(HeaderBuildError::Credentials(_)) => ErrorKind::Internal,
            Self::Fetch(_) => ErrorKind::FatalUpstream,
            Self::Store(error) => store_error_kind(error),
        }
    }
}

/// Result type for refresh operations.
pub type RefreshResult<T> = Result<T, RefreshError>;

struct WorkingCatalog {
    catalog: Catalog,
    tools: Vec<CatalogTool>,
}

struct PlannedRefresh {
    reports: Vec<BindingRefreshReport>,
    plan: ReconciliationPlan,
    catalog_names: BTreeMap<CatalogId, String>,
}

/// Re-fetches every binding of an entity and reconciles the shared
/// catalogs with what upstream serves.
///
/// Fetches run sequentially under one time budget. All writes for a call
/// are handed to the store as a single plan after every fetch succeeded,
/// so a failure or timeout leaves storage untouched. Notifications are
/// queued only after the plan committed and never fail the call.
#[derive(Clone)]
pub struct CatalogRefreshService<S, K, X, F, O, C>
where
    S: CatalogStore,
    K: CredentialStore,
    X: CredentialSealer,
    F: CatalogFetcher,
    O: NotificationOutbox,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    headers: HeaderBuilder<K, X>,
    fetcher: Arc<F>,
    outbox: Arc<O>,
    clock: Arc<C>,
    composer: NotificationComposer,
    refresh_timeout: Duration,
}

impl<S, K, X, F, O, C> CatalogRefreshService<S, K, X, F, O, C>
where
    S: CatalogStore,
    K: CredentialStore,
    X: CredentialSealer,
    F: CatalogFetcher,
    O: NotificationOutbox,
    C: Clock + Send + Sync,
{
    /// Creates a refresh service with default timeout and link base.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        headers: HeaderBuilder<K, X>,
        fetcher: Arc<F>,
        outbox: Arc<O>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            store,
            headers,
            fetcher,
            outbox,
            clock,
            composer: NotificationComposer::new(DEFAULT_LINK_BASE),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Applies the refresh budget and notification link root from
    /// `config`.
    #[must_use]
    pub fn with_config(self, config: &ConsoleConfig) -> Self {
        self.with_timeout(config.refresh_timeout())
            .with_composer(NotificationComposer::new(config.link_base.clone()))
    }

    /// Replaces the fetch-phase time budget.
    #[must_use]
    pub const fn with_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Replaces the notification composer.
    #[must_use]
    pub fn with_composer(mut self, composer: NotificationComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Refreshes every binding of the requested entity.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] when the entity or a catalog is missing,
    /// headers cannot be built, an upstream fails or returns no tools, the
    /// fetch phase times out, or the store rejects the plan. Nothing is
    /// written in any of these cases.
    pub async fn refresh(&self, request: RefreshRequest) -> RefreshResult<RefreshReport> {
        let entity = self
            .store
            .find_entity(request.entity_id)
            .await?
            .filter(|found| found.tenant_id() == &request.tenant_id)
            .ok_or(RefreshError::EntityNotFound(request.entity_id))?;

        let planned = tokio::time::timeout(self.refresh_timeout, self.plan_refresh(&entity, &request))
            .await
            .map_err(|_| RefreshError::Timeout {
                entity_id: entity.id(),
                timeout: self.refresh_timeout,
            })??;

        let mut report = RefreshReport::new(entity.id(), request.dry_run, planned.reports);
        if request.dry_run {
            info!(
                entity_id = %entity.id(),
                added = report.totals.added,
                removed = report.totals.removed,
                modified = report.totals.modified,
                "refresh preview computed"
            );
            return Ok(report);
        }

        if !planned.plan.is_empty() {
            self.store
                .apply_reconciliation(&planned.plan, self.clock.utc())
                .await?;
        }
        info!(
            entity_id = %entity.id(),
            bindings = report.totals.bindings,
            added = report.totals.added,
            removed = report.totals.removed,
            modified = report.totals.modified,
            "refresh applied"
        );

        if report.has_any_changes {
            report.affected_tenants = self.resolve_impact(&entity, &report).await;
            self.enqueue_notifications(&entity, &report, &planned.catalog_names, &request.user_id)
                .await;
        }
        Ok(report)
    }

    async fn plan_refresh(
        &self,
        entity: &CompositeEntity,
        request: &RefreshRequest,
    ) -> RefreshResult<PlannedRefresh> {
        let bindings = self.store.list_bindings(entity.id()).await?;
        let mut working: BTreeMap<CatalogId, WorkingCatalog> = BTreeMap::new();
        let mut plan = ReconciliationPlan::default();
        let mut reports = Vec::with_capacity(bindings.len());

        for binding in &bindings {
            let catalog_id = binding.catalog_id();
            let current = match working.entry(catalog_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => slot.insert(self.load_catalog(catalog_id).await?),
            };

            let Some(endpoint) = current.catalog.endpoint(binding.display_name()) else {
                debug!(binding_id = %binding.id(), %catalog_id, "catalog is not a live remote; skipping");
                reports.push(BindingRefreshReport::skipped(
                    binding.id(),
                    catalog_id,
                    binding.display_name(),
                ));
                continue;
            };

            let headers = self
                .headers
                .build(
                    binding.id(),
                    entity.tenant_id(),
                    &request.user_id,
                    current.catalog.auth_mode(),
                )
                .await?;
            let fetched = self.fetcher.list_tools(&endpoint, &headers).await?;
            if fetched.is_empty() {
                warn!(binding_id = %binding.id(), %catalog_id, "upstream returned no tools; aborting refresh");
                return Err(RefreshError::EmptyUpstream {
                    binding_id: binding.id(),
                    catalog_id,
                });
            }

            let change_set = detect_changes(&current.tools, &fetched);
            debug!(
                binding_id = %binding.id(),
                fetched = fetched.len(),
                has_changes = change_set.has_changes(),
                "binding diffed"
            );
            stage_binding(current, &change_set, binding, &mut plan, &*self.clock);
            reports.push(BindingRefreshReport::from_change_set(
                binding.id(),
                catalog_id,
                binding.display_name(),
                &change_set,
            ));
        }

        let catalog_names = working
            .iter()
            .map(|(catalog_id, current)| (*catalog_id, current.catalog.name().to_owned()))
            .collect();
        Ok(PlannedRefresh {
            reports,
            plan: plan.finish(),
            catalog_names,
        })
    }

    async fn load_catalog(&self, catalog_id: CatalogId) -> RefreshResult<WorkingCatalog> {
        let catalog = self
            .store
            .find_catalog(catalog_id)
            .await?
            .ok_or(RefreshError::CatalogNotFound(catalog_id))?;
        let tools = self.store.list_tools(catalog_id).await?;
        Ok(WorkingCatalog { catalog, tools })
    }

    async fn resolve_impact(
        &self,
        entity: &CompositeEntity,
        report: &RefreshReport,
    ) -> Vec<TenantImpact> {
        self.store
            .entities_binding_catalogs(&report.changed_catalogs(), entity.tenant_id())
            .await
            .map(distinct_by_tenant)
            .unwrap_or_else(|err| {
                warn!(entity_id = %entity.id(), error = %err, "impact resolution failed after commit");
                Vec::new()
            })
    }

    async fn enqueue_notifications(
        &self,
        entity: &CompositeEntity,
        report: &RefreshReport,
        catalog_names: &BTreeMap<CatalogId, String>,
        triggered_by: &UserId,
    ) {
        let changed_names: Vec<String> = report
            .changed_catalogs()
            .iter()
            .filter_map(|catalog_id| catalog_names.get(catalog_id).cloned())
            .collect();

        let rendered = std::iter::once(self.composer.catalog_refreshed(
            entity,
            &report.totals,
            triggered_by,
        ))
        .chain(report.affected_tenants.iter().map(|impact| {
            self.composer
                .shared_catalog_changed(impact, &changed_names, triggered_by)
        }));

        for notice in rendered {
            let notification = match notice {
                Ok(notification) => notification,
                Err(err) => {
                    warn!(entity_id = %entity.id(), error = %err, "notification skipped");
                    continue;
                }
            };
            let tenant = notification.tenant_id.clone();
            let entry = OutboxEntry::pending(notification, self.clock.utc());
            if let Err(err) = self.outbox.enqueue(&entry).await {
                warn!(entity_id = %entity.id(), %tenant, error = %err, "failed to queue notification");
            }
        }
    }
}

/// Folds one binding's diff into the working catalog and the write plan.
fn stage_binding(
    current: &mut WorkingCatalog,
    change_set: &ChangeSet,
    binding: &Binding,
    plan: &mut ReconciliationPlan,
    clock: &impl Clock,
) {
    let catalog_id = current.catalog.id();
    let revised_at = clock.utc();

    let mut created = BTreeSet::new();
    for definition in change_set.to_create() {
        let tool = CatalogTool::new(catalog_id, definition.clone(), clock);
        created.insert(tool.id());
        plan.catalog_mut(catalog_id).push_create(tool.clone());
        current.tools.push(tool);
    }

    for update in change_set.to_update() {
        if let Some(slot) = current
            .tools
            .iter_mut()
            .find(|tool| tool.id() == update.tool_id)
        {
            let revised = slot.revised(update.definition.clone(), revised_at);
            plan.catalog_mut(catalog_id).push_update(revised.clone());
            *slot = revised;
        }
    }

    current
        .tools
        .retain(|tool| !change_set.to_delete().contains(&tool.id()));
    for tool_id in change_set.to_delete() {
        if plan.catalog_mut(catalog_id).push_delete(*tool_id) {
            plan.cancel_tool(*tool_id);
        }
    }

    let delta = AllowListDelta::for_refresh(
        binding.allowed_tools(),
        change_set.keep_connected(),
        &created,
        change_set.to_delete(),
    );
    if !delta.is_empty() {
        plan.push_binding(BindingAllowListChange {
            binding_id: binding.id(),
            delta,
        });
    }
}
