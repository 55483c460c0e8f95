//! Interactive tools exposed via Model Context Protocol
//!
//! Each tool has a typed input struct (its schema is derived from the struct)
//! and a `ToolCall` variant holding the validated command. Arguments are
//! decoded and validated before anything reaches the Raindrop API.

use rust_mcp_sdk::{macros, schema::Tool};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::content::{ContentItem, ToolResponse};
use crate::domain::diagnostics::Diagnostics;
use crate::domain::utils::{
    normalize_list_limit, normalize_object_id, normalize_operation, normalize_page_size,
    normalize_tag_names, normalize_text, normalize_url, require_id, require_text,
};
use crate::errors::AppError;
use crate::raindrop::types::{
    BookmarkDraft, BookmarkQuery, BulkEdit, CollectionDraft, HighlightDraft, IdRef,
};
use crate::raindrop::RaindropApi;

const MANAGE_OPERATIONS: &[&str] = &["create", "update", "delete"];
const TAG_OPERATIONS: &[&str] = &["rename", "merge", "delete"];

#[macros::mcp_tool(
    name = "diagnostics",
    description = "Provides server diagnostics and environment info as a resource link"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DiagnosticsTool {
    /// Include environment details in the diagnostics metadata
    pub include_environment: Option<bool>,
}

#[macros::mcp_tool(
    name = "collection_list",
    description = "Lists Raindrop collections, or the children of a parent collection"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CollectionListTool {
    /// Parent collection ID; omit to list root collections
    pub parent_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "collection_manage",
    description = "Creates, updates, or deletes a collection. Use the operation parameter to specify the action."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CollectionManageTool {
    /// One of: create, update, delete
    pub operation: String,
    /// Collection ID (required for update and delete)
    pub id: Option<i64>,
    /// Collection title (required for create)
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Make the collection public
    pub public: Option<bool>,
    /// Parent collection ID for nested collections
    pub parent_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "bookmark_search",
    description = "Searches bookmarks with full-text search, tags, and advanced filters"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BookmarkSearchTool {
    /// Full-text search query
    pub search: Option<String>,
    /// Collection ID to search within; omit to search everything
    pub collection: Option<i64>,
    /// Tags to filter by
    pub tags: Option<Vec<String>>,
    /// Single tag to filter by
    pub tag: Option<String>,
    /// Only important (favorite) bookmarks
    pub important: Option<bool>,
    /// Page number, starting at 0
    pub page: Option<u32>,
    /// Items per page (max 50)
    pub per_page: Option<u32>,
    /// Sort order: score, title, -title, created, -created, domain, -domain
    pub sort: Option<String>,
    pub duplicates: Option<bool>,
    pub broken: Option<bool>,
    /// Only bookmarks with highlights
    pub highlight: Option<bool>,
    pub domain: Option<String>,
}

#[macros::mcp_tool(name = "bookmark_get", description = "Fetches a single bookmark by ID")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BookmarkGetTool {
    /// Bookmark ID
    pub id: i64,
}

#[macros::mcp_tool(
    name = "bookmark_list",
    description = "Lists bookmarks in a collection (limit 1-100, default 50)"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BookmarkListTool {
    /// Collection ID; 0 lists all bookmarks
    pub collection_id: i64,
    pub limit: Option<u32>,
}

#[macros::mcp_tool(
    name = "bookmark_manage",
    description = "Creates, updates, or deletes bookmarks. Use the operation parameter to specify the action."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BookmarkManageTool {
    /// One of: create, update, delete
    pub operation: String,
    /// Bookmark ID (required for update and delete)
    pub id: Option<i64>,
    /// Bookmark URL (required for create)
    pub url: Option<String>,
    pub title: Option<String>,
    /// Stored as the bookmark excerpt
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub important: Option<bool>,
    /// Target collection (required for create, moves the bookmark on update)
    pub collection_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "bookmark_bulk_edit",
    description = "Bulk updates tags, favorite status, media, or cover, or moves bookmarks to another collection"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BookmarkBulkEditTool {
    /// Collection containing the bookmarks
    pub collection_id: i64,
    /// Bookmark IDs to update; omit to update the whole collection
    pub ids: Option<Vec<i64>>,
    pub important: Option<bool>,
    /// Tags to set; an empty list removes all tags
    pub tags: Option<Vec<String>>,
    /// Media URLs to set; an empty list removes all media
    pub media: Option<Vec<String>>,
    /// Cover URL; use <screenshot> for an automatic screenshot
    pub cover: Option<String>,
    /// Move the bookmarks to this collection
    pub move_to_collection: Option<i64>,
    /// Include nested collections
    pub nested: Option<bool>,
}

#[macros::mcp_tool(
    name = "tag_list",
    description = "Lists tags with usage counts, globally or for one collection"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct TagListTool {
    /// Collection ID; omit for all tags
    pub collection_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "tag_manage",
    description = "Renames, merges, or deletes tags. Use the operation parameter to specify the action."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct TagManageTool {
    /// One of: rename, merge, delete
    pub operation: String,
    /// Limit the change to one collection
    pub collection_id: Option<i64>,
    /// Tags to act on; rename uses the first entry
    pub tag_names: Vec<String>,
    /// New tag name (required for rename and merge)
    pub new_name: Option<String>,
}

#[macros::mcp_tool(
    name = "highlight_list",
    description = "Lists highlights for one bookmark, or across all bookmarks"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct HighlightListTool {
    /// Bookmark ID; omit for all highlights
    pub bookmark_id: Option<i64>,
}

#[macros::mcp_tool(
    name = "highlight_manage",
    description = "Creates, updates, or deletes highlights. Use the operation parameter to specify the action."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct HighlightManageTool {
    /// One of: create, update, delete
    pub operation: String,
    /// Highlight ID (required for update and delete)
    pub id: Option<String>,
    /// Bookmark to highlight (required for create)
    pub bookmark_id: Option<i64>,
    /// Highlighted text (required for create)
    pub text: Option<String>,
    pub note: Option<String>,
    /// Highlight color, defaults to yellow
    pub color: Option<String>,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        DiagnosticsTool::tool(),
        CollectionListTool::tool(),
        CollectionManageTool::tool(),
        BookmarkSearchTool::tool(),
        BookmarkGetTool::tool(),
        BookmarkListTool::tool(),
        BookmarkManageTool::tool(),
        BookmarkBulkEditTool::tool(),
        TagListTool::tool(),
        TagManageTool::tool(),
        HighlightListTool::tool(),
        HighlightManageTool::tool(),
    ]
}

pub fn tool_names() -> Vec<String> {
    build_tools_list().into_iter().map(|tool| tool.name).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionCommand {
    Create(CollectionDraft),
    Update { id: i64, draft: CollectionDraft },
    Delete { id: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkCommand {
    Create(BookmarkDraft),
    Update { id: i64, draft: BookmarkDraft },
    Delete { id: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagCommand {
    Rename {
        collection_id: Option<i64>,
        from: String,
        to: String,
    },
    Merge {
        collection_id: Option<i64>,
        tags: Vec<String>,
        to: String,
    },
    Delete {
        collection_id: Option<i64>,
        tags: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HighlightCommand {
    Create {
        bookmark_id: i64,
        draft: HighlightDraft,
    },
    Update {
        id: String,
        draft: HighlightDraft,
    },
    Delete {
        id: String,
    },
}

/// One validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Diagnostics { include_environment: bool },
    CollectionList { parent_id: Option<i64> },
    CollectionManage(CollectionCommand),
    BookmarkSearch(BookmarkQuery),
    BookmarkGet { id: i64 },
    BookmarkList { collection_id: i64, limit: u32 },
    BookmarkManage(BookmarkCommand),
    BookmarkBulkEdit { collection_id: i64, edit: BulkEdit },
    TagList { collection_id: Option<i64> },
    TagManage(TagCommand),
    HighlightList { bookmark_id: Option<i64> },
    HighlightManage(HighlightCommand),
}

pub struct ToolContext<'a> {
    pub api: &'a dyn RaindropApi,
    pub diagnostics: &'a Diagnostics,
}

impl ToolCall {
    pub fn parse(name: &str, arguments: Option<Map<String, Value>>) -> Result<Self, AppError> {
        let arguments = Value::Object(arguments.unwrap_or_default());

        match name {
            "diagnostics" => {
                let input: DiagnosticsTool = decode(arguments)?;
                Ok(Self::Diagnostics {
                    include_environment: input.include_environment.unwrap_or(false),
                })
            }
            "collection_list" => {
                let input: CollectionListTool = decode(arguments)?;
                Ok(Self::CollectionList {
                    parent_id: input.parent_id,
                })
            }
            "collection_manage" => {
                collection_command(decode(arguments)?).map(Self::CollectionManage)
            }
            "bookmark_search" => bookmark_query(decode(arguments)?).map(Self::BookmarkSearch),
            "bookmark_get" => {
                let input: BookmarkGetTool = decode(arguments)?;
                Ok(Self::BookmarkGet { id: input.id })
            }
            "bookmark_list" => {
                let input: BookmarkListTool = decode(arguments)?;
                Ok(Self::BookmarkList {
                    collection_id: input.collection_id,
                    limit: normalize_list_limit(input.limit)?,
                })
            }
            "bookmark_manage" => bookmark_command(decode(arguments)?).map(Self::BookmarkManage),
            "bookmark_bulk_edit" => {
                let input: BookmarkBulkEditTool = decode(arguments)?;
                Ok(Self::BookmarkBulkEdit {
                    collection_id: input.collection_id,
                    edit: BulkEdit {
                        ids: input.ids,
                        important: input.important,
                        tags: input.tags,
                        media: input.media,
                        cover: normalize_text(input.cover),
                        collection: input.move_to_collection.map(|id| IdRef { id }),
                        nested: input.nested,
                    },
                })
            }
            "tag_list" => {
                let input: TagListTool = decode(arguments)?;
                Ok(Self::TagList {
                    collection_id: input.collection_id,
                })
            }
            "tag_manage" => tag_command(decode(arguments)?).map(Self::TagManage),
            "highlight_list" => {
                let input: HighlightListTool = decode(arguments)?;
                Ok(Self::HighlightList {
                    bookmark_id: input.bookmark_id,
                })
            }
            "highlight_manage" => {
                highlight_command(decode(arguments)?).map(Self::HighlightManage)
            }
            _ => Err(AppError::not_found(
                "tool_not_found",
                format!("unknown tool name: {name}"),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Diagnostics { .. } => "diagnostics",
            Self::CollectionList { .. } => "collection_list",
            Self::CollectionManage(_) => "collection_manage",
            Self::BookmarkSearch(_) => "bookmark_search",
            Self::BookmarkGet { .. } => "bookmark_get",
            Self::BookmarkList { .. } => "bookmark_list",
            Self::BookmarkManage(_) => "bookmark_manage",
            Self::BookmarkBulkEdit { .. } => "bookmark_bulk_edit",
            Self::TagList { .. } => "tag_list",
            Self::TagManage(_) => "tag_manage",
            Self::HighlightList { .. } => "highlight_list",
            Self::HighlightManage(_) => "highlight_manage",
        }
    }

    pub async fn execute(self, ctx: ToolContext<'_>) -> Result<ToolResponse, AppError> {
        let api = ctx.api;

        match self {
            Self::Diagnostics {
                include_environment,
            } => Ok(ToolResponse::new(vec![ContentItem::ResourceLink {
                uri: "diagnostics://server".to_string(),
                name: "Server Diagnostics".to_string(),
                description: format!(
                    "Server diagnostics and environment info resource. Version: {}",
                    env!("CARGO_PKG_VERSION")
                ),
                mime_type: "application/json".to_string(),
                meta: Some(ctx.diagnostics.snapshot(include_environment)),
            }])),
            Self::CollectionList { parent_id } => {
                let collections = match parent_id {
                    Some(parent_id) => api.list_child_collections(parent_id).await?,
                    None => api.list_collections().await?,
                };
                let mut content = vec![ContentItem::text(format!(
                    "Found {} collections",
                    collections.len()
                ))];
                content.extend(collections.iter().map(ContentItem::collection_link));
                Ok(ToolResponse::new(content))
            }
            Self::CollectionManage(command) => match command {
                CollectionCommand::Create(draft) => {
                    let collection = api.create_collection(&draft).await?;
                    Ok(ToolResponse::new(vec![
                        ContentItem::text(format!("Created collection {}", collection.id)),
                        ContentItem::collection_link(&collection),
                    ])
                    .with_structured(json!({ "collection": collection })))
                }
                CollectionCommand::Update { id, draft } => {
                    let collection = api.update_collection(id, &draft).await?;
                    Ok(ToolResponse::new(vec![
                        ContentItem::text(format!("Updated collection {id}")),
                        ContentItem::collection_link(&collection),
                    ])
                    .with_structured(json!({ "collection": collection })))
                }
                CollectionCommand::Delete { id } => {
                    api.delete_collection(id).await?;
                    Ok(deleted_response("collection", id))
                }
            },
            Self::BookmarkSearch(query) => {
                let page = api.search_bookmarks(&query).await?;
                let mut content = vec![ContentItem::text(format!(
                    "Found {} bookmarks",
                    page.count
                ))];
                content.extend(page.items.iter().map(ContentItem::bookmark_link));
                Ok(ToolResponse::new(content).with_structured(json!({
                    "count": page.count,
                    "returned": page.items.len(),
                })))
            }
            Self::BookmarkGet { id } => {
                let bookmark = api.get_bookmark(id).await?;
                Ok(
                    ToolResponse::new(vec![ContentItem::bookmark_link(&bookmark)])
                        .with_structured(json!({ "bookmark": bookmark })),
                )
            }
            Self::BookmarkList {
                collection_id,
                limit,
            } => {
                let page = api
                    .search_bookmarks(&BookmarkQuery {
                        collection: Some(collection_id).filter(|id| *id != 0),
                        per_page: Some(limit),
                        ..BookmarkQuery::default()
                    })
                    .await?;
                let mut content = vec![ContentItem::text(format!(
                    "Found {} bookmarks in collection",
                    page.count
                ))];
                content.extend(
                    page.items
                        .iter()
                        .take(limit as usize)
                        .map(ContentItem::bookmark_link),
                );
                Ok(ToolResponse::new(content))
            }
            Self::BookmarkManage(command) => match command {
                BookmarkCommand::Create(draft) => {
                    let bookmark = api.create_bookmark(&draft).await?;
                    Ok(ToolResponse::new(vec![
                        ContentItem::text(format!("Created bookmark {}", bookmark.id)),
                        ContentItem::bookmark_link(&bookmark),
                    ])
                    .with_structured(json!({ "bookmark": bookmark })))
                }
                BookmarkCommand::Update { id, draft } => {
                    let bookmark = api.update_bookmark(id, &draft).await?;
                    Ok(ToolResponse::new(vec![
                        ContentItem::text(format!("Updated bookmark {id}")),
                        ContentItem::bookmark_link(&bookmark),
                    ])
                    .with_structured(json!({ "bookmark": bookmark })))
                }
                BookmarkCommand::Delete { id } => {
                    api.delete_bookmark(id).await?;
                    Ok(deleted_response("bookmark", id))
                }
            },
            Self::BookmarkBulkEdit {
                collection_id,
                edit,
            } => {
                let outcome = api.bulk_edit_bookmarks(collection_id, &edit).await?;
                let modified = outcome
                    .modified
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(ToolResponse::new(vec![ContentItem::text(format!(
                    "Bulk edit successful. Modified: {modified}"
                ))])
                .with_structured(json!({ "modified": outcome.modified })))
            }
            Self::TagList { collection_id } => {
                let tags = api.list_tags(collection_id).await?;
                Ok(
                    ToolResponse::new(vec![ContentItem::text(format!(
                        "Found {} tags",
                        tags.len()
                    ))])
                    .with_structured(json!({ "tags": tags })),
                )
            }
            Self::TagManage(command) => {
                let summary = match command {
                    TagCommand::Rename {
                        collection_id,
                        from,
                        to,
                    } => {
                        api.rename_tag(collection_id, &from, &to).await?;
                        format!("Renamed tag {from} to {to}")
                    }
                    TagCommand::Merge {
                        collection_id,
                        tags,
                        to,
                    } => {
                        api.merge_tags(collection_id, &tags, &to).await?;
                        format!("Merged {} tags into {to}", tags.len())
                    }
                    TagCommand::Delete {
                        collection_id,
                        tags,
                    } => {
                        api.delete_tags(collection_id, &tags).await?;
                        format!("Deleted {} tags", tags.len())
                    }
                };
                Ok(ToolResponse::new(vec![ContentItem::text(summary)])
                    .with_structured(json!({ "result": true })))
            }
            Self::HighlightList { bookmark_id } => {
                let highlights = match bookmark_id {
                    Some(bookmark_id) => api.list_highlights(bookmark_id).await?,
                    None => api.list_all_highlights().await?,
                };
                Ok(ToolResponse::new(vec![ContentItem::text(format!(
                    "Found {} highlights",
                    highlights.len()
                ))])
                .with_structured(json!({ "highlights": highlights })))
            }
            Self::HighlightManage(command) => match command {
                HighlightCommand::Create { bookmark_id, draft } => {
                    let highlight = api.create_highlight(bookmark_id, &draft).await?;
                    Ok(ToolResponse::new(vec![ContentItem::text(format!(
                        "Created highlight {} on bookmark {bookmark_id}",
                        highlight.id
                    ))])
                    .with_structured(json!({ "highlight": highlight })))
                }
                HighlightCommand::Update { id, draft } => {
                    let highlight = api.update_highlight(&id, &draft).await?;
                    Ok(
                        ToolResponse::new(vec![ContentItem::text(format!(
                            "Updated highlight {id}"
                        ))])
                        .with_structured(json!({ "highlight": highlight })),
                    )
                }
                HighlightCommand::Delete { id } => {
                    api.delete_highlight(&id).await?;
                    Ok(deleted_response("highlight", id))
                }
            },
        }
    }
}

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, AppError> {
    serde_json::from_value(arguments).map_err(|err| {
        AppError::bad_request("invalid_arguments", format!("invalid tool arguments: {err}"))
    })
}

fn deleted_response<T: std::fmt::Display + Serialize>(kind: &str, id: T) -> ToolResponse {
    ToolResponse::new(vec![ContentItem::text(format!("Deleted {kind} {id}"))])
        .with_structured(json!({ "deleted": true, "id": id }))
}

fn collection_command(input: CollectionManageTool) -> Result<CollectionCommand, AppError> {
    let operation = normalize_operation(&input.operation, MANAGE_OPERATIONS)?;
    let draft = CollectionDraft {
        title: normalize_text(input.title),
        description: normalize_text(input.description),
        color: normalize_text(input.color),
        is_public: input.public,
        parent: input.parent_id.map(|id| IdRef { id }),
    };

    match operation {
        "create" => {
            if draft.title.is_none() {
                return Err(AppError::bad_request(
                    "missing_title",
                    "title is required for create",
                ));
            }
            Ok(CollectionCommand::Create(draft))
        }
        "update" => Ok(CollectionCommand::Update {
            id: require_id(input.id, "id is required for update")?,
            draft,
        }),
        _ => Ok(CollectionCommand::Delete {
            id: require_id(input.id, "id is required for delete")?,
        }),
    }
}

fn bookmark_query(input: BookmarkSearchTool) -> Result<BookmarkQuery, AppError> {
    let mut tags = input
        .tags
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tag| normalize_text(Some(tag)))
        .collect::<Vec<_>>();
    if let Some(tag) = normalize_text(input.tag) {
        tags = vec![tag];
    }

    Ok(BookmarkQuery {
        collection: input.collection.filter(|id| *id != 0),
        search: normalize_text(input.search),
        tags,
        important: input.important,
        page: input.page,
        per_page: normalize_page_size(input.per_page)?,
        sort: normalize_text(input.sort),
        duplicates: input.duplicates,
        broken: input.broken,
        highlight: input.highlight,
        domain: normalize_text(input.domain),
    })
}

fn bookmark_command(input: BookmarkManageTool) -> Result<BookmarkCommand, AppError> {
    let operation = normalize_operation(&input.operation, MANAGE_OPERATIONS)?;
    let draft = BookmarkDraft {
        link: normalize_url(input.url)?,
        title: normalize_text(input.title),
        excerpt: normalize_text(input.description),
        tags: input.tags,
        important: input.important,
        collection: input.collection_id.map(|id| IdRef { id }),
    };

    match operation {
        "create" => {
            if draft.link.is_none() {
                return Err(AppError::bad_request(
                    "missing_url",
                    "url is required for create",
                ));
            }
            if draft.collection.is_none() {
                return Err(AppError::bad_request(
                    "missing_collection_id",
                    "collection_id is required for create",
                ));
            }
            Ok(BookmarkCommand::Create(draft))
        }
        "update" => Ok(BookmarkCommand::Update {
            id: require_id(input.id, "id is required for update")?,
            draft,
        }),
        _ => Ok(BookmarkCommand::Delete {
            id: require_id(input.id, "id is required for delete")?,
        }),
    }
}

fn tag_command(input: TagManageTool) -> Result<TagCommand, AppError> {
    let operation = normalize_operation(&input.operation, TAG_OPERATIONS)?;
    let tags = normalize_tag_names(input.tag_names)?;
    let collection_id = input.collection_id;

    match operation {
        "rename" => {
            let to = require_text(
                input.new_name,
                "missing_new_name",
                "new_name is required for rename",
            )?;
            let from = tags.into_iter().next().ok_or_else(|| {
                AppError::bad_request("missing_tag_names", "tag_names must include a tag")
            })?;
            Ok(TagCommand::Rename {
                collection_id,
                from,
                to,
            })
        }
        "merge" => Ok(TagCommand::Merge {
            collection_id,
            to: require_text(
                input.new_name,
                "missing_new_name",
                "new_name is required for merge",
            )?,
            tags,
        }),
        _ => Ok(TagCommand::Delete {
            collection_id,
            tags,
        }),
    }
}

fn highlight_command(input: HighlightManageTool) -> Result<HighlightCommand, AppError> {
    let operation = normalize_operation(&input.operation, MANAGE_OPERATIONS)?;
    let id = normalize_object_id(input.id)?;

    match operation {
        "create" => Ok(HighlightCommand::Create {
            bookmark_id: require_id(input.bookmark_id, "bookmark_id is required for create")?,
            draft: HighlightDraft {
                text: Some(require_text(
                    input.text,
                    "missing_text",
                    "text is required for create",
                )?),
                note: normalize_text(input.note),
                color: normalize_text(input.color),
            },
        }),
        "update" => Ok(HighlightCommand::Update {
            id: require_id(id, "id is required for update")?,
            draft: HighlightDraft {
                text: normalize_text(input.text),
                note: normalize_text(input.note),
                color: normalize_text(input.color),
            },
        }),
        _ => Ok(HighlightCommand::Delete {
            id: require_id(id, "id is required for delete")?,
        }),
    }
}
