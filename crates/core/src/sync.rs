//! Remote persistence: progress, bookmarks and settings.
//!
//! Every call can fail with [`SyncError`]; callers log and keep going.
//! Nothing is queued or retried, the next natural trigger sends fresh state.

use serde::{Deserialize, Serialize};

use crate::bookmarks::{Bookmark, BookmarkId, BookmarkList, NewBookmark};
use crate::config::ApiUrls;
use crate::error::SyncError;
use crate::position::{self, PositionToken};
use crate::settings::ReaderSettings;

/// Header carrying the anti-forgery token on every mutating call.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// `POST <saveProgress>` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub current_cfi: String,
    pub percentage: f64,
    /// Whole minutes since the session started.
    pub session_duration: u64,
}

impl ProgressUpdate {
    /// Payload for `position`, or `None` while there is nothing meaningful
    /// to save (a single page).
    pub fn for_position(position: PositionToken, session_minutes: u64) -> Option<Self> {
        if position.total_pages <= 1 {
            return None;
        }
        Some(Self {
            current_cfi: position.to_string(),
            percentage: position::progress_percentage(position.page, position.total_pages),
            session_duration: session_minutes,
        })
    }
}

#[async_trait::async_trait]
pub trait ReaderApi: Send + Sync {
    async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), SyncError>;

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, SyncError>;

    /// Returns the new bookmark's id when the server reports one.
    async fn create_bookmark(
        &self,
        bookmark: &NewBookmark,
    ) -> Result<Option<BookmarkId>, SyncError>;

    async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), SyncError>;

    async fn fetch_settings(&self) -> Result<ReaderSettings, SyncError>;

    async fn save_settings(&self, settings: &ReaderSettings) -> Result<(), SyncError>;
}

/// [`ReaderApi`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpReaderApi {
    client: reqwest::Client,
    origin: reqwest::Url,
    urls: ApiUrls,
    csrf_token: String,
}

#[derive(Deserialize)]
struct CreatedBookmark {
    id: Option<BookmarkId>,
}

impl HttpReaderApi {
    /// `origin` resolves the relative endpoint paths the host page hands out.
    pub fn new(
        client: reqwest::Client,
        origin: reqwest::Url,
        urls: ApiUrls,
        csrf_token: &str,
    ) -> Self {
        Self {
            client,
            origin,
            urls,
            csrf_token: csrf_token.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, SyncError> {
        self.origin.join(path).map_err(|e| SyncError::Network {
            endpoint: path.to_string(),
            detail: e.to_string(),
        })
    }

    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SyncError> {
        let response = request.send().await.map_err(|e| SyncError::Network {
            endpoint: path.to_string(),
            detail: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, SyncError> {
        response.json::<T>().await.map_err(|e| SyncError::Decode {
            endpoint: path.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ReaderApi for HttpReaderApi {
    async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), SyncError> {
        let path = &self.urls.save_progress;
        let request = self
            .client
            .post(self.endpoint(path)?)
            .header(CSRF_HEADER, &self.csrf_token)
            .json(update);
        self.send(path, request).await?;
        Ok(())
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, SyncError> {
        let path = &self.urls.bookmarks;
        let request = self.client.get(self.endpoint(path)?);
        let response = self.send(path, request).await?;
        let list: BookmarkList = Self::decode(path, response).await?;
        Ok(list.bookmarks)
    }

    async fn create_bookmark(
        &self,
        bookmark: &NewBookmark,
    ) -> Result<Option<BookmarkId>, SyncError> {
        let path = &self.urls.create_bookmark;
        let request = self
            .client
            .post(self.endpoint(path)?)
            .header(CSRF_HEADER, &self.csrf_token)
            .json(bookmark);
        let response = self.send(path, request).await?;
        // The id is informational; the list is reloaded afterwards anyway.
        Ok(Self::decode::<CreatedBookmark>(path, response)
            .await
            .ok()
            .and_then(|c| c.id))
    }

    async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), SyncError> {
        let path = format!("{}{}/delete/", self.urls.delete_bookmark_base, id);
        let request = self
            .client
            .delete(self.endpoint(&path)?)
            .header(CSRF_HEADER, &self.csrf_token);
        self.send(&path, request).await?;
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<ReaderSettings, SyncError> {
        let path = &self.urls.settings;
        let request = self.client.get(self.endpoint(path)?);
        let response = self.send(path, request).await?;
        Self::decode(path, response).await
    }

    async fn save_settings(&self, settings: &ReaderSettings) -> Result<(), SyncError> {
        let path = &self.urls.settings;
        let request = self
            .client
            .put(self.endpoint(path)?)
            .header(CSRF_HEADER, &self.csrf_token)
            .json(settings);
        self.send(path, request).await?;
        Ok(())
    }
}
