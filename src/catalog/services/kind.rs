//! Caller-facing error classification shared by catalog services.

use crate::catalog::ports::{CatalogStoreError, CredentialStoreError};
use serde::Serialize;
use std::fmt;

/// Coarse classification of a service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A catalog, entity, binding, or tool does not exist for the caller.
    NotFound,
    /// The request failed validation.
    BadRequest,
    /// A required OAuth access token is absent or was rejected upstream.
    Unauthenticated,
    /// The upstream returned nothing usable, treated as an outage.
    FatalUpstream,
    /// The operation exceeded its time budget.
    Timeout,
    /// Storage or another internal collaborator failed.
    Internal,
}

impl ErrorKind {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unauthenticated => "unauthenticated",
            Self::FatalUpstream => "fatal_upstream",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

pub(super) const fn store_error_kind(error: &CatalogStoreError) -> ErrorKind {
    match error {
        CatalogStoreError::BindingNotFound(_) => ErrorKind::NotFound,
        CatalogStoreError::DuplicateCatalog(_)
        | CatalogStoreError::DuplicateEntity(_)
        | CatalogStoreError::InvalidPersistedData(_)
        | CatalogStoreError::Persistence(_) => ErrorKind::Internal,
    }
}

pub(super) const fn credential_error_kind(error: &CredentialStoreError) -> ErrorKind {
    match error {
        CredentialStoreError::Persistence(_) => ErrorKind::Internal,
    }
}
