//! Bookmark records as the remote store exchanges them.

use serde::{Deserialize, Serialize};

use crate::position::PositionToken;

pub type BookmarkId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chapter_title: String,
    /// Position token recorded at creation.
    #[serde(default)]
    pub cfi: String,
}

impl Bookmark {
    pub fn position(&self) -> Option<PositionToken> {
        PositionToken::parse(&self.cfi)
    }

    /// Page to open in a layout of `total_pages` pages.
    pub fn target_page(&self, total_pages: u32) -> Option<u32> {
        self.position().map(|p| p.rescale(total_pages))
    }

    /// Label for lists; untitled bookmarks get a generic one.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Bookmark"
        } else {
            &self.title
        }
    }
}

/// `GET <bookmarks>` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookmarkList {
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

/// `POST <createBookmark>` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub ebook: i64,
    pub cfi: String,
    pub title: String,
    pub chapter_title: String,
}

impl NewBookmark {
    /// Bookmark for the current page, titled `"Page N"`.
    pub fn at(ebook: i64, position: PositionToken, chapter_title: &str) -> Self {
        Self {
            ebook,
            cfi: position.to_string(),
            title: format!("Page {}", position.page),
            chapter_title: chapter_title.to_string(),
        }
    }
}
