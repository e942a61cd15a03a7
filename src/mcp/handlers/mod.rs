//! Tool handlers for the MCP server.

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod search;
pub mod sources;

/// Parse structured arguments supplied to a tool invocation.
///
/// Malformed arguments come back as an error tool result for the caller to read.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, CallToolResult> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value).map_err(invalid_arguments)
}

pub(crate) fn invalid_arguments(reason: impl std::fmt::Display) -> CallToolResult {
    tracing::debug!(%reason, "Rejected tool arguments");
    CallToolResult::error(vec![Content::text(format!("Invalid arguments: {reason}"))])
}
