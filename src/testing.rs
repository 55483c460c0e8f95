//! In-memory `RaindropApi` used by unit tests across the crate.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::raindrop::types::{
    Bookmark, BookmarkDraft, BookmarkPage, BookmarkQuery, BulkEdit, BulkEditOutcome, Collection,
    CollectionDraft, Highlight, HighlightDraft, Tag, User,
};
use crate::raindrop::RaindropApi;

#[derive(Debug, Default)]
pub struct MockRaindrop {
    fail: bool,
    credentials: bool,
}

impl MockRaindrop {
    pub fn failing() -> Self {
        Self {
            fail: true,
            credentials: true,
        }
    }

    pub fn authenticated() -> Self {
        Self {
            fail: false,
            credentials: true,
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::upstream(Some(503), "API Error: 503 Service Unavailable"));
        }
        Ok(())
    }
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("mock fixture")
}

fn collection(id: i64, title: &str) -> Collection {
    from_json(json!({ "_id": id, "title": title, "count": 2 }))
}

fn bookmark(id: i64, title: &str) -> Bookmark {
    from_json(json!({
        "_id": id,
        "title": title,
        "link": format!("https://example.com/{id}"),
        "excerpt": format!("Excerpt for {title}"),
        "tags": ["rust"]
    }))
}

fn highlight(id: &str) -> Highlight {
    from_json(json!({ "_id": id, "text": "highlighted", "color": "yellow" }))
}

#[async_trait]
impl RaindropApi for MockRaindrop {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, AppError> {
        self.check()?;
        Ok(vec![collection(1, "Inbox"), collection(2, "Reading")])
    }

    async fn list_child_collections(&self, parent_id: i64) -> Result<Vec<Collection>, AppError> {
        self.check()?;
        Ok(vec![collection(parent_id * 10, "Child")])
    }

    async fn get_collection(&self, id: i64) -> Result<Collection, AppError> {
        self.check()?;
        match id {
            1 => Ok(collection(1, "Inbox")),
            2 => Ok(collection(2, "Reading")),
            _ => Err(AppError::not_found(
                "collection_not_found",
                "Collection not found",
            )),
        }
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> Result<Collection, AppError> {
        self.check()?;
        Ok(collection(99, draft.title.as_deref().unwrap_or("Untitled")))
    }

    async fn update_collection(
        &self,
        id: i64,
        draft: &CollectionDraft,
    ) -> Result<Collection, AppError> {
        self.check()?;
        Ok(collection(id, draft.title.as_deref().unwrap_or("Updated")))
    }

    async fn delete_collection(&self, _id: i64) -> Result<(), AppError> {
        self.check()
    }

    async fn search_bookmarks(&self, _query: &BookmarkQuery) -> Result<BookmarkPage, AppError> {
        self.check()?;
        Ok(BookmarkPage {
            items: vec![bookmark(10, "First"), bookmark(11, "Second")],
            count: 2,
        })
    }

    async fn get_bookmark(&self, id: i64) -> Result<Bookmark, AppError> {
        self.check()?;
        if id == 10 {
            return Ok(bookmark(10, "First"));
        }
        Err(AppError::not_found("bookmark_not_found", "Bookmark not found"))
    }

    async fn create_bookmark(&self, draft: &BookmarkDraft) -> Result<Bookmark, AppError> {
        self.check()?;
        Ok(bookmark(42, draft.title.as_deref().unwrap_or("Created")))
    }

    async fn update_bookmark(&self, id: i64, draft: &BookmarkDraft) -> Result<Bookmark, AppError> {
        self.check()?;
        Ok(bookmark(id, draft.title.as_deref().unwrap_or("Updated")))
    }

    async fn delete_bookmark(&self, _id: i64) -> Result<(), AppError> {
        self.check()
    }

    async fn bulk_edit_bookmarks(
        &self,
        _collection_id: i64,
        edit: &BulkEdit,
    ) -> Result<BulkEditOutcome, AppError> {
        self.check()?;
        Ok(BulkEditOutcome {
            modified: Some(edit.ids.as_ref().map_or(0, |ids| ids.len() as u64)),
        })
    }

    async fn list_tags(&self, _collection_id: Option<i64>) -> Result<Vec<Tag>, AppError> {
        self.check()?;
        Ok(vec![Tag {
            name: "rust".to_string(),
            count: 2,
        }])
    }

    async fn rename_tag(
        &self,
        _collection_id: Option<i64>,
        _from: &str,
        _to: &str,
    ) -> Result<(), AppError> {
        self.check()
    }

    async fn merge_tags(
        &self,
        _collection_id: Option<i64>,
        _tags: &[String],
        _to: &str,
    ) -> Result<(), AppError> {
        self.check()
    }

    async fn delete_tags(
        &self,
        _collection_id: Option<i64>,
        _tags: &[String],
    ) -> Result<(), AppError> {
        self.check()
    }

    async fn get_user(&self) -> Result<User, AppError> {
        self.check()?;
        Ok(from_json(json!({ "_id": 7, "email": "reader@example.com", "fullName": "Reader" })))
    }

    async fn list_highlights(&self, _bookmark_id: i64) -> Result<Vec<Highlight>, AppError> {
        self.check()?;
        Ok(vec![highlight("h1")])
    }

    async fn list_all_highlights(&self) -> Result<Vec<Highlight>, AppError> {
        self.check()?;
        Ok(vec![highlight("h1"), highlight("h2")])
    }

    async fn create_highlight(
        &self,
        _bookmark_id: i64,
        _draft: &HighlightDraft,
    ) -> Result<Highlight, AppError> {
        self.check()?;
        Ok(highlight("h-new"))
    }

    async fn update_highlight(
        &self,
        id: &str,
        _draft: &HighlightDraft,
    ) -> Result<Highlight, AppError> {
        self.check()?;
        Ok(highlight(id))
    }

    async fn delete_highlight(&self, _id: &str) -> Result<(), AppError> {
        self.check()
    }
}
