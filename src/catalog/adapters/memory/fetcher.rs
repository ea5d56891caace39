//! In-memory catalog fetcher for deterministic refresh flows.

use crate::catalog::{
    domain::{ToolDefinition, UpstreamEndpoint, UpstreamHeaders},
    ports::{CatalogFetchError, CatalogFetchResult, CatalogFetcher},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Fetcher serving scripted tool lists keyed by upstream base URL.
///
/// Every call is recorded together with the headers it carried.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogFetcher {
    state: Arc<RwLock<InMemoryFetcherState>>,
}

#[derive(Debug, Default)]
struct InMemoryFetcherState {
    responses: HashMap<String, CatalogFetchResult<Vec<ToolDefinition>>>,
    requests: Vec<(UpstreamEndpoint, UpstreamHeaders)>,
}

impl InMemoryCatalogFetcher {
    /// Creates a fetcher with no scripted upstreams.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `tools` for `base_url`, replacing any previous script.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError::Transport`] when lock acquisition fails.
    pub fn set_tools(
        &self,
        base_url: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> CatalogFetchResult<()> {
        self.script(base_url.into(), Ok(tools))
    }

    /// Fails every fetch of `base_url` with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError::Transport`] when lock acquisition fails.
    pub fn set_failure(
        &self,
        base_url: impl Into<String>,
        error: CatalogFetchError,
    ) -> CatalogFetchResult<()> {
        self.script(base_url.into(), Err(error))
    }

    /// Returns every recorded fetch in call order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError::Transport`] when lock acquisition fails.
    pub fn requests(&self) -> CatalogFetchResult<Vec<(UpstreamEndpoint, UpstreamHeaders)>> {
        let state = self
            .state
            .read()
            .map_err(|err| CatalogFetchError::transport(std::io::Error::other(err.to_string())))?;
        Ok(state.requests.clone())
    }

    fn script(
        &self,
        base_url: String,
        response: CatalogFetchResult<Vec<ToolDefinition>>,
    ) -> CatalogFetchResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| CatalogFetchError::transport(std::io::Error::other(err.to_string())))?;
        state.responses.insert(base_url, response);
        Ok(())
    }
}

#[async_trait]
impl CatalogFetcher for InMemoryCatalogFetcher {
    async fn list_tools(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>> {
        let mut state = self
            .state
            .write()
            .map_err(|err| CatalogFetchError::transport(std::io::Error::other(err.to_string())))?;
        state.requests.push((endpoint.clone(), headers.clone()));
        state
            .responses
            .get(endpoint.base_url())
            .cloned()
            .unwrap_or_else(|| {
                Err(CatalogFetchError::UpstreamStatus {
                    endpoint: endpoint.display_name().to_owned(),
                    status: 404,
                })
            })
    }
}
