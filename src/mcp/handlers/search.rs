//! Handler and helpers for the `search_documents` tool.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Number;

use crate::{
    mcp::{
        format::{EMPTY_QUERY_MESSAGE, format_search_results},
        handlers::{invalid_arguments, parse_arguments},
    },
    processing::RetrievalService,
};

/// Results returned when the caller omits `limit`.
pub const DEFAULT_LIMIT: i64 = 5;
/// Smallest number of results a search returns.
pub const MIN_LIMIT: i64 = 1;
/// Largest number of results a search returns.
pub const MAX_LIMIT: i64 = 20;

/// Arguments accepted by `search_documents`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SearchDocumentsArgs {
    /// Text to search for.
    pub(crate) query: String,
    /// Requested number of results before clamping; absent or null means the default.
    #[serde(default)]
    pub(crate) limit: Option<Number>,
}

/// Read a requested limit, saturating integral values that do not fit in `i64`.
///
/// Non-integral numbers such as `2.5` are rejected.
pub(crate) fn requested_limit(limit: Option<&Number>) -> Result<i64, String> {
    let Some(limit) = limit else {
        return Ok(DEFAULT_LIMIT);
    };
    if let Some(value) = limit.as_i64() {
        return Ok(value);
    }
    if limit.is_u64() {
        return Ok(i64::MAX);
    }
    match limit.as_f64() {
        // Float to int `as` casts saturate.
        Some(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(format!("limit must be an integer, got {limit}")),
    }
}

/// Clamp a requested result count into the supported range.
pub fn clamp_limit(requested: i64) -> usize {
    // The clamped value is always within 1..=20.
    requested.clamp(MIN_LIMIT, MAX_LIMIT) as usize
}

/// Handle `search_documents`: embed the query and report ranked chunks as markdown.
///
/// Malformed arguments, an empty query, and search failures come back as error text results
/// rather than protocol errors so the calling model can read and react to them.
pub(crate) async fn handle_search_documents(
    retrieval: &RetrievalService,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: SearchDocumentsArgs = match parse_arguments(arguments) {
        Ok(args) => args,
        Err(result) => return Ok(result),
    };
    if args.query.trim().is_empty() {
        return Ok(CallToolResult::error(vec![Content::text(
            EMPTY_QUERY_MESSAGE,
        )]));
    }
    let requested = match requested_limit(args.limit.as_ref()) {
        Ok(requested) => requested,
        Err(reason) => return Ok(invalid_arguments(reason)),
    };

    let limit = clamp_limit(requested);
    tracing::info!(limit, requested, "Searching documents");
    match retrieval.search(&args.query, limit).await {
        Ok(hits) => Ok(CallToolResult::success(vec![Content::text(
            format_search_results(&args.query, &hits),
        )])),
        Err(error) => {
            tracing::warn!(kind = ?error.kind(), error = %error, "Search failed");
            Ok(CallToolResult::error(vec![Content::text(format!(
                "Search error: {error}"
            ))]))
        }
    }
}
