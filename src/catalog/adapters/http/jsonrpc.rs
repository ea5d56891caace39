//! JSON-RPC envelopes for the MCP `initialize` and `tools/list` exchange.

use crate::catalog::domain::{ToolDefinition, UpstreamEndpoint};
use crate::catalog::ports::CatalogFetchError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub(super) const INITIALIZE_ID: u64 = 1;

/// Outgoing JSON-RPC message. Notifications carry no `id`.
#[derive(Debug, Serialize)]
pub(super) struct JsonRpcMessage {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl JsonRpcMessage {
    pub(super) fn initialize(protocol_version: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(INITIALIZE_ID),
            method: "initialize",
            params: Some(json!({
                "protocolVersion": protocol_version,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
        }
    }

    pub(super) const fn initialized() -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: None,
        }
    }

    pub(super) fn list_tools(id: u64, cursor: Option<&str>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: "tools/list",
            params: cursor.map(|value| json!({ "cursor": value })),
        }
    }

    pub(super) const fn id(&self) -> Option<u64> {
        self.id
    }
}

/// Incoming JSON-RPC message. Requests and notifications from the server
/// deserialize with `result` and `error` both absent.
#[derive(Debug, Deserialize)]
pub(super) struct JsonRpcReply {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcReply {
    /// Returns whether this reply answers request `id`.
    pub(super) fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
            && (self.result.is_some() || self.error.is_some())
    }

    /// Extracts the result payload.
    pub(super) fn into_result(self, endpoint: &UpstreamEndpoint) -> Result<Value, CatalogFetchError> {
        if let Some(error) = self.error {
            return Err(CatalogFetchError::protocol(
                endpoint,
                format!("JSON-RPC error {}: {}", error.code, error.message),
            ));
        }
        self.result
            .ok_or_else(|| CatalogFetchError::protocol(endpoint, "reply carried no result"))
    }
}

/// One page of a `tools/list` result.
#[derive(Debug, Deserialize)]
pub(super) struct ToolsPage {
    #[serde(default)]
    tools: Vec<WireTool>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "empty_object_schema", rename = "inputSchema")]
    input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object" })
}

impl ToolsPage {
    /// Parses a `tools/list` result payload.
    pub(super) fn parse(endpoint: &UpstreamEndpoint, result: Value) -> Result<Self, CatalogFetchError> {
        serde_json::from_value(result).map_err(|err| {
            CatalogFetchError::protocol(endpoint, format!("malformed tools/list result: {err}"))
        })
    }

    /// Returns the cursor of the next page, if any.
    pub(super) fn next_cursor(&self) -> Option<&str> {
        self.next_cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
    }

    /// Converts the page's tools into domain definitions.
    pub(super) fn into_definitions(
        self,
        endpoint: &UpstreamEndpoint,
    ) -> Result<Vec<ToolDefinition>, CatalogFetchError> {
        self.tools
            .into_iter()
            .map(|tool| {
                ToolDefinition::new(tool.name, tool.description, tool.input_schema).map_err(|err| {
                    CatalogFetchError::protocol(endpoint, format!("invalid tool: {err}"))
                })
            })
            .collect()
    }
}
