//! Console settings with environment overrides.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default budget for the fetch phase of one refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of outbox entries drained per dispatch pass.
pub const DEFAULT_OUTBOX_BATCH_SIZE: usize = 50;

/// Default root of links embedded in notifications.
pub const DEFAULT_LINK_BASE: &str = "http://localhost:3000";

/// Default MCP protocol version announced to upstreams.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Default per-request timeout of the HTTP catalog fetcher.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "TOOLHUB_";

/// Errors returned while loading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that does not parse.
    #[error("invalid value '{value}' for {name}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Rejected value.
        value: String,
    },
}

/// Settings shared by the catalog services and adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Fetch-phase budget of one refresh, in seconds.
    pub refresh_timeout_secs: u64,
    /// Outbox entries drained per dispatch pass.
    pub outbox_batch_size: usize,
    /// Root of links embedded in notifications.
    pub link_base: String,
    /// MCP protocol version announced to upstreams.
    pub protocol_version: String,
    /// Per-request timeout of the HTTP fetcher, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT.as_secs(),
            outbox_batch_size: DEFAULT_OUTBOX_BATCH_SIZE,
            link_base: DEFAULT_LINK_BASE.to_owned(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_owned(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
        }
    }
}

impl ConsoleConfig {
    /// Loads defaults overridden by `TOOLHUB_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads defaults overridden by values returned from `lookup`, which is
    /// called with full variable names such as `TOOLHUB_LINK_BASE`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric value does not
    /// parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value.trim().to_owned()))
        };

        let mut config = Self::default();
        if let Some((name, value)) = read("REFRESH_TIMEOUT_SECS") {
            config.refresh_timeout_secs = parse_number(name, value)?;
        }
        if let Some((name, value)) = read("OUTBOX_BATCH_SIZE") {
            config.outbox_batch_size = parse_number(name, value)?;
        }
        if let Some((_, value)) = read("LINK_BASE") {
            config.link_base = value;
        }
        if let Some((_, value)) = read("PROTOCOL_VERSION") {
            config.protocol_version = value;
        }
        if let Some((name, value)) = read("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_number(name, value)?;
        }
        Ok(config)
    }

    /// Sets the refresh budget.
    #[must_use]
    pub const fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the dispatch batch size.
    #[must_use]
    pub const fn with_outbox_batch_size(mut self, batch_size: usize) -> Self {
        self.outbox_batch_size = batch_size;
        self
    }

    /// Sets the notification link root.
    #[must_use]
    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    /// Returns the refresh budget.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Returns the HTTP fetcher request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(name: String, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}
