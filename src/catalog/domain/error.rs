//! Error types for catalog domain validation and parsing.

use super::CatalogId;
use thiserror::Error;

/// Errors returned while constructing catalog domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogDomainError {
    /// The catalog name is empty after trimming.
    #[error("catalog name must not be empty")]
    EmptyCatalogName,

    /// The remote base URL is empty.
    #[error("catalog base URL must not be empty")]
    EmptyBaseUrl,

    /// The remote base URL does not have an `http://` or `https://` prefix.
    #[error("catalog base URL '{0}' must start with 'http://' or 'https://'")]
    InvalidBaseUrl(String),

    /// A declared credential key is empty after trimming.
    #[error("credential key names must not be empty")]
    EmptyCredentialKey,

    /// A tool name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// A composite entity name is empty after trimming.
    #[error("entity name must not be empty")]
    EmptyEntityName,

    /// A binding display name is empty after trimming.
    #[error("binding display name must not be empty")]
    EmptyDisplayName,

    /// A tenant or user identifier is blank or too long.
    #[error("invalid {kind} identifier: '{value}'")]
    InvalidPrincipal {
        /// Which principal failed validation.
        kind: &'static str,
        /// Raw rejected value.
        value: String,
    },

    /// Credential keys were supplied that the catalog does not declare.
    #[error("catalog {catalog_id} does not declare credential keys: {}", keys.join(", "))]
    UndeclaredCredentialKeys {
        /// Catalog whose declared key set was violated.
        catalog_id: CatalogId,
        /// Offending keys in sorted order.
        keys: Vec<String>,
    },
}

/// Error returned while parsing an auth mode from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown catalog auth mode: {0}")]
pub struct ParseAuthModeError(pub String);

/// Error returned while parsing a catalog transport from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown catalog transport: {0}")]
pub struct ParseCatalogTransportError(pub String);

/// Error returned while parsing a catalog kind from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown catalog kind: {0}")]
pub struct ParseCatalogKindError(pub String);
