//! Handler for the `list_data_sources` tool.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{
    mcp::{format::format_data_sources, handlers::parse_arguments},
    processing::CorpusScope,
};

/// `list_data_sources` takes no arguments.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ListDataSourcesArgs {}

/// Report the corpus allow-list configured at startup. The store is not consulted.
pub(crate) fn handle_list_data_sources(
    scope: &CorpusScope,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    if let Err(result) = parse_arguments::<ListDataSourcesArgs>(arguments) {
        return Ok(result);
    }
    Ok(CallToolResult::success(vec![Content::text(
        format_data_sources(scope.tags()),
    )]))
}
