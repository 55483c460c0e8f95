//! Model Context Protocol resource providers
//!
//! Two static resources (`mcp://user/profile`, `diagnostics://server`) plus
//! the `mcp://collection/{id}` and `mcp://raindrop/{id}` templates, which are
//! fetched live from Raindrop.io on every read.

use rust_mcp_sdk::schema::{ReadResourceContent, ReadResourceResult, Resource, TextResourceContents};
use serde_json::{json, Value};

use crate::domain::content::JSON_MIME_TYPE;
use crate::domain::diagnostics::Diagnostics;
use crate::domain::utils::parse_resource_id;
use crate::errors::AppError;
use crate::raindrop::RaindropApi;

pub const USER_PROFILE_URI: &str = "mcp://user/profile";
pub const DIAGNOSTICS_URI: &str = "diagnostics://server";
pub const COLLECTION_URI_PREFIX: &str = "mcp://collection/";
pub const BOOKMARK_URI_PREFIX: &str = "mcp://raindrop/";

pub fn build_resources_list() -> Vec<Resource> {
    vec![
        Resource {
            annotations: None,
            description: Some("Authenticated Raindrop.io user profile".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            name: "User Profile".to_string(),
            size: None,
            title: None,
            uri: USER_PROFILE_URI.to_string(),
        },
        Resource {
            annotations: None,
            description: Some("Server diagnostics and environment info".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            name: "Server Diagnostics".to_string(),
            size: None,
            title: None,
            uri: DIAGNOSTICS_URI.to_string(),
        },
    ]
}

pub fn build_resource_templates() -> Vec<Value> {
    vec![
        json!({
            "uriTemplate": "mcp://collection/{id}",
            "name": "Collection",
            "description": "A Raindrop.io collection by numeric ID",
            "mimeType": JSON_MIME_TYPE,
        }),
        json!({
            "uriTemplate": "mcp://raindrop/{id}",
            "name": "Bookmark",
            "description": "A Raindrop.io bookmark by numeric ID",
            "mimeType": JSON_MIME_TYPE,
        }),
    ]
}

pub async fn read_resource(
    api: &dyn RaindropApi,
    diagnostics: &Diagnostics,
    uri: &str,
) -> Result<ReadResourceResult, AppError> {
    let document = if let Some(raw_id) = uri.strip_prefix(COLLECTION_URI_PREFIX) {
        let id = parse_resource_id(raw_id, "collection")?;
        let collection = api
            .get_collection(id)
            .await
            .map_err(|err| wrap_fetch_error(uri, err))?;
        json!({ "collection": collection })
    } else if let Some(raw_id) = uri.strip_prefix(BOOKMARK_URI_PREFIX) {
        let id = parse_resource_id(raw_id, "bookmark")?;
        let bookmark = api
            .get_bookmark(id)
            .await
            .map_err(|err| wrap_fetch_error(uri, err))?;
        json!({ "raindrop": bookmark })
    } else if uri == USER_PROFILE_URI {
        if api.has_credentials() {
            let user = api
                .get_user()
                .await
                .map_err(|err| wrap_fetch_error(uri, err))?;
            json!({ "user": user })
        } else {
            json!({
                "profile": "Set RAINDROP_ACCESS_TOKEN to load the authenticated user profile",
                "authenticated": false,
            })
        }
    } else if uri == DIAGNOSTICS_URI {
        Value::Object(diagnostics.snapshot(true))
    } else {
        return Err(AppError::not_found(
            "resource_not_found",
            format!("unknown resource uri: {uri}"),
        ));
    };

    Ok(json_document(uri, &document))
}

fn json_document(uri: &str, document: &Value) -> ReadResourceResult {
    ReadResourceResult {
        contents: vec![ReadResourceContent::from(TextResourceContents {
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            text: document.to_string(),
            uri: uri.to_string(),
        })],
        meta: None,
    }
}

/// Keeps the error class but names the resource that could not be loaded.
fn wrap_fetch_error(uri: &str, err: AppError) -> AppError {
    let message = format!(
        "Failed to fetch data for resource {uri}: {}",
        err.public_message()
    );
    match err {
        AppError::NotFound { code, .. } => AppError::NotFound { code, message },
        AppError::Upstream { status, .. } => AppError::Upstream { status, message },
        _ => AppError::upstream(None, message),
    }
}
