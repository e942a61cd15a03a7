//! The closed set of tools served over MCP, with their descriptors and schema checks.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use rmcp::model::{Tool, ToolAnnotations};
use serde_json::{Map, Value};
use thiserror::Error;

use super::{
    handlers::{search::SearchDocumentsArgs, sources::ListDataSourcesArgs},
    schemas,
};

/// Tools exposed by the retrieval server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Semantic search over the configured corpora.
    SearchDocuments,
    /// Report the configured corpus allow-list.
    ListDataSources,
}

impl ToolKind {
    /// Every tool, in the order they are advertised.
    pub const ALL: [ToolKind; 2] = [ToolKind::SearchDocuments, ToolKind::ListDataSources];

    /// Wire name of the tool.
    pub const fn name(self) -> &'static str {
        match self {
            ToolKind::SearchDocuments => "search_documents",
            ToolKind::ListDataSources => "list_data_sources",
        }
    }

    /// Resolve a wire name; `None` for unknown tools.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Input schema advertised to clients.
    pub(crate) fn input_schema(self) -> Map<String, Value> {
        match self {
            ToolKind::SearchDocuments => schemas::search_documents_input_schema(),
            ToolKind::ListDataSources => schemas::empty_object_schema(),
        }
    }

    /// Schema derived from the argument type the handler deserializes.
    fn argument_schema(self) -> Result<Value, serde_json::Error> {
        let root = match self {
            ToolKind::SearchDocuments => schemars::schema_for!(SearchDocumentsArgs),
            ToolKind::ListDataSources => schemars::schema_for!(ListDataSourcesArgs),
        };
        serde_json::to_value(root)
    }

    /// MCP descriptor returned from `tools/list`.
    pub(crate) fn descriptor(self) -> Tool {
        let (title, description) = match self {
            ToolKind::SearchDocuments => (
                "Search Documents",
                "Semantic search across the document corpora this server was started with. \
                 Returns the most similar chunks with source, score, and text.",
            ),
            ToolKind::ListDataSources => (
                "List Data Sources",
                "List the corpus names this server searches.",
            ),
        };
        Tool {
            name: Cow::Borrowed(self.name()),
            title: Some(title.to_string()),
            description: Some(Cow::Borrowed(description)),
            input_schema: Arc::new(self.input_schema()),
            output_schema: None,
            annotations: Some(
                ToolAnnotations::with_title(title)
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            icons: None,
        }
    }
}

/// Disagreement between an advertised tool schema and the arguments its handler accepts.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The argument type could not be rendered as a JSON schema.
    #[error("tool {tool}: failed to derive argument schema: {reason}")]
    Schema {
        /// Tool name.
        tool: &'static str,
        /// Serializer diagnostic.
        reason: String,
    },
    /// Advertised and accepted property names differ.
    #[error("tool {tool}: declares properties {declared:?} but accepts {accepted:?}")]
    Properties {
        /// Tool name.
        tool: &'static str,
        /// Properties in the advertised schema.
        declared: Vec<String>,
        /// Properties the handler deserializes.
        accepted: Vec<String>,
    },
    /// A property is advertised with a different JSON type than the handler expects.
    #[error("tool {tool}: property {property} declared as {declared} but parsed as {accepted}")]
    PropertyType {
        /// Tool name.
        tool: &'static str,
        /// Property name.
        property: String,
        /// Advertised JSON type.
        declared: String,
        /// JSON type the handler accepts.
        accepted: String,
    },
    /// Advertised and actual required properties differ.
    #[error("tool {tool}: requires {declared:?} but handler requires {accepted:?}")]
    Required {
        /// Tool name.
        tool: &'static str,
        /// Required properties in the advertised schema.
        declared: Vec<String>,
        /// Properties without a default in the argument type.
        accepted: Vec<String>,
    },
}

/// Check every advertised tool schema against the argument type its handler parses.
pub fn validate_tool_catalog() -> Result<(), CatalogError> {
    for kind in ToolKind::ALL {
        let tool = kind.name();
        let declared = Value::Object(kind.input_schema());
        let accepted = kind.argument_schema().map_err(|err| CatalogError::Schema {
            tool,
            reason: err.to_string(),
        })?;

        let declared_types = property_types(&declared);
        let accepted_types = property_types(&accepted);
        if declared_types.keys().ne(accepted_types.keys()) {
            return Err(CatalogError::Properties {
                tool,
                declared: declared_types.into_keys().collect(),
                accepted: accepted_types.into_keys().collect(),
            });
        }
        for (property, declared_type) in &declared_types {
            let accepted_type = &accepted_types[property];
            if !accepts(declared_type, accepted_type) {
                return Err(CatalogError::PropertyType {
                    tool,
                    property: property.clone(),
                    declared: declared_type.clone(),
                    accepted: accepted_type.clone(),
                });
            }
        }

        let declared_required = required(&declared);
        let accepted_required = required(&accepted);
        if declared_required != accepted_required {
            return Err(CatalogError::Required {
                tool,
                declared: declared_required.into_iter().collect(),
                accepted: accepted_required.into_iter().collect(),
            });
        }
    }
    tracing::debug!(tools = ToolKind::ALL.len(), "Tool catalog validated");
    Ok(())
}

fn property_types(schema: &Value) -> BTreeMap<String, String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| (name.clone(), primary_type(property)))
                .collect()
        })
        .unwrap_or_default()
}

/// Whether a handler parsing `accepted` takes every value of the advertised `declared` type.
fn accepts(declared: &str, accepted: &str) -> bool {
    declared == accepted || (declared == "integer" && accepted == "number")
}

/// First non-null JSON type of a property schema.
fn primary_type(property: &Value) -> String {
    match property.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .unwrap_or("null")
            .to_string(),
        _ => "any".to_string(),
    }
}

fn required(schema: &Value) -> BTreeSet<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
