//! Raindrop.io REST access
//!
//! `RaindropApi` is the seam between the MCP layer and the upstream service;
//! `RaindropClient` is the reqwest-backed implementation.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::errors::AppError;
use types::{
    Bookmark, BookmarkDraft, BookmarkPage, BookmarkQuery, BulkEdit, BulkEditOutcome, Collection,
    CollectionDraft, Highlight, HighlightDraft, Tag, User,
};

pub use client::RaindropClient;

#[async_trait]
pub trait RaindropApi: Send + Sync {
    /// Whether calls will carry an access token.
    fn has_credentials(&self) -> bool;

    async fn list_collections(&self) -> Result<Vec<Collection>, AppError>;
    async fn list_child_collections(&self, parent_id: i64) -> Result<Vec<Collection>, AppError>;
    async fn get_collection(&self, id: i64) -> Result<Collection, AppError>;
    async fn create_collection(&self, draft: &CollectionDraft) -> Result<Collection, AppError>;
    async fn update_collection(
        &self,
        id: i64,
        draft: &CollectionDraft,
    ) -> Result<Collection, AppError>;
    async fn delete_collection(&self, id: i64) -> Result<(), AppError>;

    async fn search_bookmarks(&self, query: &BookmarkQuery) -> Result<BookmarkPage, AppError>;
    async fn get_bookmark(&self, id: i64) -> Result<Bookmark, AppError>;
    async fn create_bookmark(&self, draft: &BookmarkDraft) -> Result<Bookmark, AppError>;
    async fn update_bookmark(&self, id: i64, draft: &BookmarkDraft) -> Result<Bookmark, AppError>;
    async fn delete_bookmark(&self, id: i64) -> Result<(), AppError>;
    async fn bulk_edit_bookmarks(
        &self,
        collection_id: i64,
        edit: &BulkEdit,
    ) -> Result<BulkEditOutcome, AppError>;

    async fn list_tags(&self, collection_id: Option<i64>) -> Result<Vec<Tag>, AppError>;
    async fn rename_tag(
        &self,
        collection_id: Option<i64>,
        from: &str,
        to: &str,
    ) -> Result<(), AppError>;
    async fn merge_tags(
        &self,
        collection_id: Option<i64>,
        tags: &[String],
        to: &str,
    ) -> Result<(), AppError>;
    async fn delete_tags(&self, collection_id: Option<i64>, tags: &[String])
        -> Result<(), AppError>;

    async fn get_user(&self) -> Result<User, AppError>;

    async fn list_highlights(&self, bookmark_id: i64) -> Result<Vec<Highlight>, AppError>;
    async fn list_all_highlights(&self) -> Result<Vec<Highlight>, AppError>;
    async fn create_highlight(
        &self,
        bookmark_id: i64,
        draft: &HighlightDraft,
    ) -> Result<Highlight, AppError>;
    async fn update_highlight(&self, id: &str, draft: &HighlightDraft)
        -> Result<Highlight, AppError>;
    async fn delete_highlight(&self, id: &str) -> Result<(), AppError>;
}
