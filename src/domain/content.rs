//! Tool result payloads
//!
//! `tools/call` results carry text and `resource_link` content items. Links
//! point at the `mcp://` resources served by `resources/read`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::raindrop::types::{Bookmark, Collection};

pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    ResourceLink {
        uri: String,
        name: String,
        description: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
        meta: Option<Map<String, Value>>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn collection_link(collection: &Collection) -> Self {
        Self::ResourceLink {
            uri: format!("mcp://collection/{}", collection.id),
            name: collection
                .title
                .clone()
                .unwrap_or_else(|| "Untitled Collection".to_string()),
            description: collection.description.clone().unwrap_or_else(|| {
                format!("Collection with {} bookmarks", collection.count.unwrap_or(0))
            }),
            mime_type: JSON_MIME_TYPE.to_string(),
            meta: None,
        }
    }

    pub fn bookmark_link(bookmark: &Bookmark) -> Self {
        Self::ResourceLink {
            uri: format!("mcp://raindrop/{}", bookmark.id),
            name: bookmark
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string()),
            description: bookmark
                .excerpt
                .clone()
                .filter(|excerpt| !excerpt.is_empty())
                .unwrap_or_else(|| "No description".to_string()),
            mime_type: JSON_MIME_TYPE.to_string(),
            meta: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResponse {
    pub fn new(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            structured_content: None,
            is_error: None,
        }
    }

    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured_content = Some(structured);
        self
    }

    /// Failed tool execution reported in-band, as MCP expects for handler errors.
    pub fn from_error(tool: &str, err: &AppError) -> Self {
        Self {
            content: vec![ContentItem::text(format!(
                "{tool} failed: {}",
                err.public_message()
            ))],
            structured_content: None,
            is_error: Some(true),
        }
    }
}
