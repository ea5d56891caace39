//! Tool definitions as fetched from upstream and as stored per catalog.

use super::{CatalogDomainError, CatalogId, ToolId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Tool metadata as served by an upstream catalog.
///
/// Descriptions are trimmed and a blank description is stored as `None`, so
/// `""` and a missing description compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: String,
    description: Option<String>,
    input_schema: Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyToolName`] when the name is blank.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        input_schema: Value,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyToolName);
        }

        let normalized_description = description
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Self {
            name: normalized_name,
            description: normalized_description,
            input_schema,
        })
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the normalized description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the input schema as served.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Computes the content fingerprint of description and schema.
    #[must_use]
    pub fn fingerprint(&self) -> ToolFingerprint {
        ToolFingerprint::compute(self.description(), &self.input_schema)
    }
}

/// SHA-256 digest over a tool's normalized description and canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolFingerprint(String);

impl ToolFingerprint {
    /// Computes the fingerprint for a description and schema pair.
    #[must_use]
    pub fn compute(description: Option<&str>, input_schema: &Value) -> Self {
        let mut canonical = Map::new();
        canonical.insert(
            "description".to_owned(),
            description.map_or(Value::Null, |text| Value::String(text.to_owned())),
        );
        canonical.insert("input_schema".to_owned(), canonicalize_schema(input_schema));

        let digest = Sha256::digest(Value::Object(canonical).to_string().as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Wraps a persisted fingerprint.
    #[must_use]
    pub const fn from_persisted(value: String) -> Self {
        Self(value)
    }

    /// Returns the hex-encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `schema` with every object's keys inserted in sorted order.
///
/// Array order is significant and preserved.
#[must_use]
pub fn canonicalize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(value) = fields.get(key) {
                    sorted.insert(key.clone(), canonicalize_schema(value));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_schema).collect()),
        other => other.clone(),
    }
}

/// Tool record owned by exactly one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTool {
    id: ToolId,
    catalog_id: CatalogId,
    definition: ToolDefinition,
    fingerprint: ToolFingerprint,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedToolData {
    /// Persisted tool identifier.
    pub id: ToolId,
    /// Owning catalog.
    pub catalog_id: CatalogId,
    /// Persisted definition.
    pub definition: ToolDefinition,
    /// Persisted fingerprint.
    pub fingerprint: ToolFingerprint,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CatalogTool {
    /// Creates a new tool record with a fresh identifier.
    #[must_use]
    pub fn new(catalog_id: CatalogId, definition: ToolDefinition, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        let fingerprint = definition.fingerprint();
        Self {
            id: ToolId::new(),
            catalog_id,
            definition,
            fingerprint,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a tool from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedToolData) -> Self {
        Self {
            id: data.id,
            catalog_id: data.catalog_id,
            definition: data.definition,
            fingerprint: data.fingerprint,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the tool identifier.
    #[must_use]
    pub const fn id(&self) -> ToolId {
        self.id
    }

    /// Returns the owning catalog.
    #[must_use]
    pub const fn catalog_id(&self) -> CatalogId {
        self.catalog_id
    }

    /// Returns the stored definition.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the stored fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &ToolFingerprint {
        &self.fingerprint
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

    /// Returns whether `fetched` carries the same content as this record.
    #[must_use]
    pub fn matches(&self, fetched: &ToolDefinition) -> bool {
        self.fingerprint == fetched.fingerprint()
    }

    /// Returns this record with its content replaced in place.
    #[must_use]
    pub fn revised(&self, definition: ToolDefinition, revised_at: DateTime<Utc>) -> Self {
        let fingerprint = definition.fingerprint();
        Self {
            id: self.id,
            catalog_id: self.catalog_id,
            definition,
            fingerprint,
            created_at: self.created_at,
            updated_at: revised_at,
        }
    }
}
