//! Shared catalog aggregate and its connection settings.

use super::{
    CatalogDomainError, CatalogId, CredentialMap, ParseAuthModeError, ParseCatalogKindError,
    ParseCatalogTransportError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How an upstream expects callers to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials are sent.
    None,
    /// A per-user OAuth access token is sent as a bearer token.
    OAuth,
    /// Stored credential bundle values are sent as headers.
    ApiKey,
}

impl AuthMode {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OAuth => "oauth",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuthMode {
    type Error = ParseAuthModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "oauth" => Ok(Self::OAuth),
            "api_key" => Ok(Self::ApiKey),
            _ => Err(ParseAuthModeError(value.to_owned())),
        }
    }
}

/// Wire transport used to reach a remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogTransport {
    /// Request/response JSON-RPC over HTTP POST.
    StreamableHttp,
    /// Long-lived HTTP+SSE stream with a separate POST endpoint.
    Sse,
}

impl CatalogTransport {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable_http",
            Self::Sse => "sse",
        }
    }
}

impl fmt::Display for CatalogTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CatalogTransport {
    type Error = ParseCatalogTransportError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "streamable_http" | "http" => Ok(Self::StreamableHttp),
            "sse" => Ok(Self::Sse),
            _ => Err(ParseCatalogTransportError(value.to_owned())),
        }
    }
}

/// Whether a catalog is backed by a live upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    /// Live remote integration whose tools are fetched on refresh.
    Remote,
    /// Bundled integration whose tools are managed locally.
    Local,
}

impl CatalogKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl TryFrom<&str> for CatalogKind {
    type Error = ParseCatalogKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            _ => Err(ParseCatalogKindError(value.to_owned())),
        }
    }
}

/// Address of a remote catalog as seen by one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    display_name: String,
    base_url: String,
    transport: CatalogTransport,
}

impl UpstreamEndpoint {
    /// Creates an endpoint description.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        base_url: impl Into<String>,
        transport: CatalogTransport,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            base_url: base_url.into(),
            transport,
        }
    }

    /// Returns the binding display name used for diagnostics.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the upstream base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the upstream transport.
    #[must_use]
    pub const fn transport(&self) -> CatalogTransport {
        self.transport
    }
}

/// Header map sent with an upstream catalog call.
pub type UpstreamHeaders = BTreeMap<String, String>;

/// Shared, tenant-independent definition of one upstream integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    id: CatalogId,
    name: String,
    kind: CatalogKind,
    transport: CatalogTransport,
    base_url: Option<String>,
    auth_mode: AuthMode,
    credential_keys: BTreeSet<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing persisted catalog state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCatalogData {
    /// Persisted catalog identifier.
    pub id: CatalogId,
    /// Persisted display name.
    pub name: String,
    /// Persisted catalog kind.
    pub kind: CatalogKind,
    /// Persisted transport.
    pub transport: CatalogTransport,
    /// Persisted base URL, absent for local catalogs.
    pub base_url: Option<String>,
    /// Persisted auth mode.
    pub auth_mode: AuthMode,
    /// Persisted declared credential keys.
    pub credential_keys: BTreeSet<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Catalog {
    /// Creates a live remote catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError`] when the name is blank or the base URL
    /// is empty or not an HTTP(S) URL.
    pub fn remote(
        name: impl Into<String>,
        transport: CatalogTransport,
        base_url: impl Into<String>,
        auth_mode: AuthMode,
        clock: &impl Clock,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_base_url = base_url.into().trim().to_owned();
        if normalized_base_url.is_empty() {
            return Err(CatalogDomainError::EmptyBaseUrl);
        }

        let has_valid_prefix = normalized_base_url.starts_with("http://")
            || normalized_base_url.starts_with("https://");
        if !has_valid_prefix {
            return Err(CatalogDomainError::InvalidBaseUrl(normalized_base_url));
        }

        let mut catalog = Self::local(name, clock)?;
        catalog.kind = CatalogKind::Remote;
        catalog.transport = transport;
        catalog.base_url = Some(normalized_base_url);
        catalog.auth_mode = auth_mode;
        Ok(catalog)
    }

    /// Creates a bundled catalog that is never fetched remotely.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyCatalogName`] when the name is
    /// blank.
    pub fn local(name: impl Into<String>, clock: &impl Clock) -> Result<Self, CatalogDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyCatalogName);
        }

        let timestamp = clock.utc();
        Ok(Self {
            id: CatalogId::new(),
            name: normalized_name,
            kind: CatalogKind::Local,
            transport: CatalogTransport::StreamableHttp,
            base_url: None,
            auth_mode: AuthMode::None,
            credential_keys: BTreeSet::new(),
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Declares the credential keys tenants may configure for this catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyCredentialKey`] when any key is
    /// blank.
    pub fn with_credential_keys<I, K>(mut self, keys: I) -> Result<Self, CatalogDomainError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut declared = BTreeSet::new();
        for key in keys {
            let normalized = key.into().trim().to_owned();
            if normalized.is_empty() {
                return Err(CatalogDomainError::EmptyCredentialKey);
            }
            declared.insert(normalized);
        }
        self.credential_keys = declared;
        Ok(self)
    }

    /// Reconstructs a catalog from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedCatalogData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            kind: data.kind,
            transport: data.transport,
            base_url: data.base_url,
            auth_mode: data.auth_mode,
            credential_keys: data.credential_keys,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the catalog identifier.
    #[must_use]
    pub const fn id(&self) -> CatalogId {
        self.id
    }

    /// Returns the catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the catalog kind.
    #[must_use]
    pub const fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Returns the transport used for remote fetches.
    #[must_use]
    pub const fn transport(&self) -> CatalogTransport {
        self.transport
    }

    /// Returns the remote base URL, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Returns the declared auth mode.
    #[must_use]
    pub const fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    /// Returns the declared credential keys.
    #[must_use]
    pub const fn credential_keys(&self) -> &BTreeSet<String> {
        &self.credential_keys
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether refresh should fetch this catalog from upstream.
    #[must_use]
    pub const fn is_live_remote(&self) -> bool {
        matches!(self.kind, CatalogKind::Remote) && self.base_url.is_some()
    }

    /// Returns the upstream endpoint for a binding, or `None` for catalogs
    /// that are not live remote integrations.
    #[must_use]
    pub fn endpoint(&self, display_name: &str) -> Option<UpstreamEndpoint> {
        if !self.is_live_remote() {
            return None;
        }
        self.base_url.as_ref().map(|base_url| UpstreamEndpoint {
            display_name: display_name.to_owned(),
            base_url: base_url.clone(),
            transport: self.transport,
        })
    }

    /// Validates that every key in `credentials` is declared by this
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::UndeclaredCredentialKeys`] naming every
    /// offending key.
    pub fn ensure_declared_keys(&self, credentials: &CredentialMap) -> Result<(), CatalogDomainError> {
        let undeclared: Vec<String> = credentials
            .keys()
            .filter(|key| !self.credential_keys.contains(*key))
            .map(str::to_owned)
            .collect();

        if undeclared.is_empty() {
            return Ok(());
        }

        Err(CatalogDomainError::UndeclaredCredentialKeys {
            catalog_id: self.id,
            keys: undeclared,
        })
    }
}
