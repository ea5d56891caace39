//! Upstream catalog listing port.

use crate::catalog::domain::{ToolDefinition, UpstreamEndpoint, UpstreamHeaders};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for upstream catalog fetches.
pub type CatalogFetchResult<T> = Result<T, CatalogFetchError>;

/// Lists the tools an upstream catalog currently serves.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetches the complete tool list from `endpoint`, sending `headers`
    /// with every request.
    async fn list_tools(
        &self,
        endpoint: &UpstreamEndpoint,
        headers: &UpstreamHeaders,
    ) -> CatalogFetchResult<Vec<ToolDefinition>>;
}

/// Errors returned by catalog fetcher adapters.
#[derive(Debug, Clone, Error)]
pub enum CatalogFetchError {
    /// The upstream rejected the supplied credentials.
    #[error("upstream '{endpoint}' rejected credentials with status {status}")]
    Unauthorized {
        /// Endpoint display name.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The upstream answered with an unexpected status code.
    #[error("upstream '{endpoint}' returned status {status}")]
    UpstreamStatus {
        /// Endpoint display name.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The upstream answered with a payload that violates the protocol.
    #[error("upstream '{endpoint}' protocol error: {message}")]
    Protocol {
        /// Endpoint display name.
        endpoint: String,
        /// Description of the violation.
        message: String,
    },

    /// Network or runtime failure.
    #[error("upstream transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogFetchError {
    /// Wraps a network or runtime failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Builds a protocol violation error.
    pub fn protocol(endpoint: &UpstreamEndpoint, message: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.display_name().to_owned(),
            message: message.into(),
        }
    }
}
