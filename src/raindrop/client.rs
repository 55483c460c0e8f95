use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::debug;

use super::types::{
    Bookmark, BookmarkDraft, BookmarkPage, BookmarkQuery, BulkEdit, BulkEditOutcome, Collection,
    CollectionDraft, Highlight, HighlightDraft, IdRef, ItemEnvelope, ItemsEnvelope,
    ResultEnvelope, Tag, User, UserEnvelope,
};
use super::RaindropApi;
use crate::errors::AppError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HIGHLIGHT_COLOR: &str = "yellow";

pub struct RaindropClient {
    http: Client,
    base_url: Url,
    access_token: Option<String>,
    timeout: Duration,
}

impl RaindropClient {
    /// Every request is bounded by `timeout`; reqwest cancels the in-flight
    /// call when it elapses.
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::internal(format!("failed to build HTTP client: {err}")))?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                AppError::internal(format!("invalid Raindrop API base URL: {base_url}"))
            })?;

        Ok(Self {
            http,
            base_url,
            access_token,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so an id can never address a different endpoint.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(method = %method, url = %url, "raindrop request");
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
        let response = builder.send().await.map_err(|err| self.transport_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response.json::<T>().await.map_err(|err| {
            if err.is_timeout() {
                self.timeout_error()
            } else {
                AppError::upstream(
                    Some(status.as_u16()),
                    format!("invalid response body from Raindrop API: {err}"),
                )
            }
        })
    }

    async fn send_result(
        &self,
        builder: RequestBuilder,
        action: &str,
    ) -> Result<ResultEnvelope, AppError> {
        let envelope: ResultEnvelope = self.send(builder).await?;
        if envelope.result == Some(false) {
            let message = envelope
                .error_message
                .clone()
                .unwrap_or_else(|| format!("failed to {action}"));
            return Err(AppError::upstream(None, message));
        }
        Ok(envelope)
    }

    fn transport_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            return self.timeout_error();
        }
        AppError::upstream(None, format!("Raindrop API request failed: {err}"))
    }

    fn timeout_error(&self) -> AppError {
        AppError::UpstreamTimeout {
            seconds: self.timeout.as_secs(),
        }
    }
}

fn status_error(status: StatusCode) -> AppError {
    let mut message = format!(
        "API Error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string();

    match status {
        StatusCode::UNAUTHORIZED => message.push_str(". Check your RAINDROP_ACCESS_TOKEN"),
        StatusCode::TOO_MANY_REQUESTS => {
            message.push_str(". Rate limited - wait before making more requests")
        }
        StatusCode::NOT_FOUND => return AppError::not_found("upstream_not_found", message),
        _ => {}
    }

    AppError::upstream(Some(status.as_u16()), message)
}

#[derive(Serialize)]
struct NewHighlight<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    color: &'a str,
    raindrop: IdRef,
}

fn require_item<T>(envelope: ItemEnvelope<T>, missing: &'static str) -> Result<T, AppError> {
    envelope.item.ok_or_else(|| AppError::upstream(None, missing))
}

fn collection_scope(collection_id: Option<i64>) -> String {
    collection_id.unwrap_or(0).to_string()
}

#[async_trait]
impl RaindropApi for RaindropClient {
    fn has_credentials(&self) -> bool {
        self.access_token.is_some()
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, AppError> {
        let envelope: ItemsEnvelope<Collection> =
            self.send(self.request(Method::GET, &["collections"])).await?;
        Ok(envelope.items.unwrap_or_default())
    }

    async fn list_child_collections(&self, parent_id: i64) -> Result<Vec<Collection>, AppError> {
        let parent_id = parent_id.to_string();
        let envelope: ItemsEnvelope<Collection> = self
            .send(self.request(Method::GET, &["collections", &parent_id, "childrens"]))
            .await?;
        Ok(envelope.items.unwrap_or_default())
    }

    async fn get_collection(&self, id: i64) -> Result<Collection, AppError> {
        let envelope: ItemEnvelope<Collection> = self
            .send(self.request(Method::GET, &["collection", &id.to_string()]))
            .await?;
        envelope
            .item
            .ok_or_else(|| AppError::not_found("collection_not_found", "Collection not found"))
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> Result<Collection, AppError> {
        let envelope = self
            .send(self.request(Method::POST, &["collection"]).json(draft))
            .await?;
        require_item(envelope, "Failed to create collection")
    }

    async fn update_collection(
        &self,
        id: i64,
        draft: &CollectionDraft,
    ) -> Result<Collection, AppError> {
        let envelope = self
            .send(
                self.request(Method::PUT, &["collection", &id.to_string()])
                    .json(draft),
            )
            .await?;
        require_item(envelope, "Failed to update collection")
    }

    async fn delete_collection(&self, id: i64) -> Result<(), AppError> {
        self.send_result(
            self.request(Method::DELETE, &["collection", &id.to_string()]),
            "delete collection",
        )
        .await?;
        Ok(())
    }

    async fn search_bookmarks(&self, query: &BookmarkQuery) -> Result<BookmarkPage, AppError> {
        let scope = collection_scope(query.collection);
        let envelope: ItemsEnvelope<Bookmark> = self
            .send(
                self.request(Method::GET, &["raindrops", &scope])
                    .query(&query.query_pairs()),
            )
            .await?;
        Ok(BookmarkPage {
            items: envelope.items.unwrap_or_default(),
            count: envelope.count.unwrap_or(0),
        })
    }

    async fn get_bookmark(&self, id: i64) -> Result<Bookmark, AppError> {
        let envelope: ItemEnvelope<Bookmark> = self
            .send(self.request(Method::GET, &["raindrop", &id.to_string()]))
            .await?;
        envelope
            .item
            .ok_or_else(|| AppError::not_found("bookmark_not_found", "Bookmark not found"))
    }

    async fn create_bookmark(&self, draft: &BookmarkDraft) -> Result<Bookmark, AppError> {
        let envelope = self
            .send(self.request(Method::POST, &["raindrop"]).json(draft))
            .await?;
        require_item(envelope, "Failed to create bookmark")
    }

    async fn update_bookmark(&self, id: i64, draft: &BookmarkDraft) -> Result<Bookmark, AppError> {
        let envelope = self
            .send(
                self.request(Method::PUT, &["raindrop", &id.to_string()])
                    .json(draft),
            )
            .await?;
        require_item(envelope, "Failed to update bookmark")
    }

    async fn delete_bookmark(&self, id: i64) -> Result<(), AppError> {
        self.send_result(
            self.request(Method::DELETE, &["raindrop", &id.to_string()]),
            "delete bookmark",
        )
        .await?;
        Ok(())
    }

    async fn bulk_edit_bookmarks(
        &self,
        collection_id: i64,
        edit: &BulkEdit,
    ) -> Result<BulkEditOutcome, AppError> {
        let envelope = self
            .send_result(
                self.request(Method::PUT, &["raindrops", &collection_id.to_string()])
                    .json(edit),
                "bulk edit bookmarks",
            )
            .await?;
        if envelope.result.is_none() {
            return Err(AppError::upstream(None, "Bulk edit failed"));
        }
        Ok(BulkEditOutcome {
            modified: envelope.modified,
        })
    }

    async fn list_tags(&self, collection_id: Option<i64>) -> Result<Vec<Tag>, AppError> {
        let scope = collection_scope(collection_id);
        let envelope: ItemsEnvelope<Tag> = self
            .send(self.request(Method::GET, &["tags", &scope]))
            .await?;
        Ok(envelope.items.unwrap_or_default())
    }

    async fn rename_tag(
        &self,
        collection_id: Option<i64>,
        from: &str,
        to: &str,
    ) -> Result<(), AppError> {
        let scope = collection_scope(collection_id);
        self.send_result(
            self.request(Method::PUT, &["tags", &scope])
                .json(&json!({ "replace": to, "tags": [from] })),
            "rename tag",
        )
        .await?;
        Ok(())
    }

    async fn merge_tags(
        &self,
        collection_id: Option<i64>,
        tags: &[String],
        to: &str,
    ) -> Result<(), AppError> {
        let scope = collection_scope(collection_id);
        self.send_result(
            self.request(Method::PUT, &["tags", &scope])
                .json(&json!({ "replace": to, "tags": tags })),
            "merge tags",
        )
        .await?;
        Ok(())
    }

    async fn delete_tags(
        &self,
        collection_id: Option<i64>,
        tags: &[String],
    ) -> Result<(), AppError> {
        let scope = collection_scope(collection_id);
        self.send_result(
            self.request(Method::DELETE, &["tags", &scope])
                .json(&json!({ "tags": tags })),
            "delete tags",
        )
        .await?;
        Ok(())
    }

    async fn get_user(&self) -> Result<User, AppError> {
        let envelope: UserEnvelope = self.send(self.request(Method::GET, &["user"])).await?;
        envelope
            .user
            .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))
    }

    async fn list_highlights(&self, bookmark_id: i64) -> Result<Vec<Highlight>, AppError> {
        let bookmark_id = bookmark_id.to_string();
        let envelope: ItemsEnvelope<Highlight> = self
            .send(self.request(Method::GET, &["raindrop", &bookmark_id, "highlights"]))
            .await?;
        Ok(envelope.items.unwrap_or_default())
    }

    async fn list_all_highlights(&self) -> Result<Vec<Highlight>, AppError> {
        let envelope: ItemsEnvelope<Bookmark> =
            self.send(self.request(Method::GET, &["raindrops", "0"])).await?;
        Ok(envelope
            .items
            .unwrap_or_default()
            .into_iter()
            .flat_map(|bookmark| bookmark.highlights)
            .collect())
    }

    async fn create_highlight(
        &self,
        bookmark_id: i64,
        draft: &HighlightDraft,
    ) -> Result<Highlight, AppError> {
        let body = NewHighlight {
            text: draft.text.as_deref(),
            note: draft.note.as_deref(),
            color: draft.color.as_deref().unwrap_or(DEFAULT_HIGHLIGHT_COLOR),
            raindrop: IdRef { id: bookmark_id },
        };
        let envelope = self
            .send(self.request(Method::POST, &["highlights"]).json(&body))
            .await?;
        require_item(envelope, "Failed to create highlight")
    }

    async fn update_highlight(
        &self,
        id: &str,
        draft: &HighlightDraft,
    ) -> Result<Highlight, AppError> {
        let envelope = self
            .send(
                self.request(Method::PUT, &["highlights", id])
                    .json(draft),
            )
            .await?;
        require_item(envelope, "Failed to update highlight")
    }

    async fn delete_highlight(&self, id: &str) -> Result<(), AppError> {
        self.send_result(
            self.request(Method::DELETE, &["highlights", id]),
            "delete highlight",
        )
        .await?;
        Ok(())
    }
}
