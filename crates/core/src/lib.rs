pub mod archive;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod layout;
pub mod navigation;
pub mod package;
pub mod pagination;
pub mod paths;
pub mod position;
pub mod progress;
pub mod render;
pub mod security;
pub mod settings;

#[cfg(feature = "remote")]
pub mod debounce;
#[cfg(feature = "remote")]
pub mod session;
#[cfg(feature = "remote")]
pub mod sync;

pub mod prelude {
    pub use crate::archive::Archive;
    pub use crate::bookmarks::{Bookmark, BookmarkId, NewBookmark};
    pub use crate::config::{BookData, ReaderConfig};
    pub use crate::error::*;
    pub use crate::layout::{EstimatedLayout, FrameMetrics, LayoutEngine, MeasuredLayout};
    pub use crate::navigation::{TableOfContents, TocEntry};
    pub use crate::package::{Metadata, Package};
    pub use crate::pagination::{PageView, Paginator};
    pub use crate::position::PositionToken;
    pub use crate::render::{BlobStore, DataUriStore, ImageBindings, RenderedSurface};
    pub use crate::settings::{FontFamily, ReaderSettings, Theme};

    #[cfg(feature = "remote")]
    pub use crate::session::{ReaderSession, SessionOptions};
    #[cfg(feature = "remote")]
    pub use crate::sync::{HttpReaderApi, ReaderApi};
}
