//! Optimistic sync of small user-preference records (path history, bookmarks).
//!
//! Every change is snapshot, mutate, persist, and on failure restore the snapshot. The server is
//! the source of truth; the in-memory records are a cache.

use crate::api::{ApiError, ServerApi};
use crate::model::{Bookmarks, Field, PathHistory};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;

/// Most-recent paths kept per field.
pub const PATH_HISTORY_LIMIT: usize = 10;

/// A persist was rejected and the local record was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyncError {
    pub field: Option<String>,
    pub message: String,
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        Self {
            field: e.field().map(str::to_string),
            message: e.to_string(),
        }
    }
}

/// Mutate `record` in place and persist it. If persisting fails, `record` is restored to its
/// exact prior value before the error is returned.
pub async fn apply_optimistic<R, M, P, Fut>(
    record: &mut R,
    mutate: M,
    persist: P,
) -> Result<(), SyncError>
where
    R: Clone,
    M: FnOnce(&mut R),
    P: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<(), ApiError>>,
{
    let previous = record.clone();
    mutate(record);
    match persist(record.clone()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            *record = previous;
            Err(e.into())
        }
    }
}

/// Move `path` to the front, dropping duplicates, keeping at most `limit` entries.
pub fn push_recent(list: &mut Vec<String>, path: &str, limit: usize) {
    list.retain(|p| p != path);
    list.insert(0, path.to_string());
    list.truncate(limit);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkChange {
    Added,
    Removed,
}

impl BookmarkChange {
    pub fn notice(self) -> &'static str {
        match self {
            BookmarkChange::Added => "북마크에 추가되었습니다.",
            BookmarkChange::Removed => "북마크에서 제거되었습니다.",
        }
    }
}

/// Remove `path` if present, otherwise append it.
pub fn toggle_membership(list: &mut Vec<String>, path: &str) -> BookmarkChange {
    match list.iter().position(|p| p == path) {
        Some(idx) => {
            list.remove(idx);
            BookmarkChange::Removed
        }
        None => {
            list.push(path.to_string());
            BookmarkChange::Added
        }
    }
}

/// Cached preference records plus the API they persist to.
pub struct Preferences<A: ServerApi> {
    api: Arc<A>,
    pub path_history: PathHistory,
    pub bookmarks: Bookmarks,
}

impl<A: ServerApi> Preferences<A> {
    pub async fn load(api: Arc<A>) -> Result<Self, ApiError> {
        let path_history = api.load_path_history().await?;
        let bookmarks = api.load_bookmarks().await?;
        Ok(Self {
            api,
            path_history,
            bookmarks,
        })
    }

    /// Like [`Preferences::load`], but an unreachable record starts out empty.
    pub async fn load_or_default(api: Arc<A>) -> Self {
        let path_history = api.load_path_history().await.unwrap_or_else(|e| {
            warn!("path history unavailable: {e}");
            PathHistory::default()
        });
        let bookmarks = api.load_bookmarks().await.unwrap_or_else(|e| {
            warn!("bookmarks unavailable: {e}");
            Bookmarks::default()
        });
        Self {
            api,
            path_history,
            bookmarks,
        }
    }

    /// Record `path` as most recent for `field`. Blank paths are ignored.
    pub async fn add_to_path_history(&mut self, field: Field, path: &str) -> Result<(), SyncError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(());
        }
        let api = Arc::clone(&self.api);
        apply_optimistic(
            &mut self.path_history,
            |h| push_recent(h.get_mut(field), path, PATH_HISTORY_LIMIT),
            |h| async move { api.save_path_history(&h).await },
        )
        .await
    }

    pub async fn toggle_bookmark(
        &mut self,
        field: Field,
        path: &str,
    ) -> Result<BookmarkChange, SyncError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(SyncError {
                field: Some(field.as_str().to_string()),
                message: "경로를 먼저 입력해주세요.".into(),
            });
        }
        let api = Arc::clone(&self.api);
        let mut change = BookmarkChange::Added;
        apply_optimistic(
            &mut self.bookmarks,
            |b| change = toggle_membership(b.get_mut(field), path),
            |b| async move { api.save_bookmarks(&b).await },
        )
        .await?;
        Ok(change)
    }

    /// Remove a bookmark. Returns false, without contacting the server, when it was not there.
    pub async fn remove_bookmark(&mut self, field: Field, path: &str) -> Result<bool, SyncError> {
        if !self.bookmarks.get(field).iter().any(|p| p == path) {
            debug!("bookmark {path} not present under {}", field.as_str());
            return Ok(false);
        }
        let api = Arc::clone(&self.api);
        apply_optimistic(
            &mut self.bookmarks,
            |b| b.get_mut(field).retain(|p| p != path),
            |b| async move { api.save_bookmarks(&b).await },
        )
        .await?;
        Ok(true)
    }
}
