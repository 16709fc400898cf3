//! Reader session: the single context that owns an opened book, its rendered
//! surface, pagination, settings and bookmarks, and keeps the remote store
//! informed of the reading position.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::archive::{self, Archive};
use crate::bookmarks::{Bookmark, BookmarkId, NewBookmark};
use crate::config::{BookData, ReaderConfig, TimingConfig};
use crate::debounce::{DeadlineGate, Debouncer};
use crate::error::{FetchError, ReaderError, SyncError};
use crate::layout::{FrameMetrics, LayoutEngine};
use crate::navigation::{self, TableOfContents};
use crate::package::{Metadata, Package};
use crate::pagination::{PageView, Paginator};
use crate::position::{self, PositionToken};
use crate::progress::{emit_progress, LoadStage, ProgressHandler};
use crate::render::{self, BlobStore, DataUriStore, ImageBindings, RenderedSurface};
use crate::settings::{FontFamily, ReaderSettings, Theme};
use crate::sync::{HttpReaderApi, ProgressUpdate, ReaderApi};

/// Everything a session needs besides the book and the layout engine.
pub struct SessionOptions {
    pub timing: TimingConfig,
    pub limits: crate::security::SecurityLimits,
    pub store: Box<dyn BlobStore>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            limits: crate::security::SecurityLimits::default(),
            store: Box::new(DataUriStore::default()),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            timing: config.reader.clone(),
            limits: crate::config::security_limits_from_config(&config.security),
            store: Box::new(DataUriStore::default()),
        }
    }
}

pub struct ReaderSession<L: LayoutEngine> {
    book: BookData,
    timing: TimingConfig,
    archive: Archive,
    package: Package,
    metadata: Metadata,
    toc: TableOfContents,
    surface: RenderedSurface,
    bindings: ImageBindings,
    store: Box<dyn BlobStore>,
    layout: L,
    paginator: Paginator,
    settings: ReaderSettings,
    bookmarks: Vec<Bookmark>,
    api: Arc<dyn ReaderApi>,
    save_debounce: Debouncer,
    resize_gate: DeadlineGate,
    position_tx: watch::Sender<PositionToken>,
    autosave: Option<JoinHandle<()>>,
    started: Instant,
}

impl<L: LayoutEngine> ReaderSession<L> {
    /// Download the book named by `book.epub_url` and open it. Relative URLs
    /// in `book` are resolved against `origin`.
    pub async fn open(
        book: BookData,
        origin: reqwest::Url,
        layout: L,
        options: SessionOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Self, ReaderError> {
        let client = reqwest::Client::new();
        let url = origin
            .join(&book.epub_url)
            .map_err(|e| FetchError::Network(format!("Invalid book URL {}: {e}", book.epub_url)))?;

        emit_progress(progress, LoadStage::Download, 0, None, Some(url.as_str()));
        let archive = archive::fetch(&client, url.as_str(), &options.limits).await?;

        let api = Arc::new(HttpReaderApi::new(
            client,
            origin,
            book.api_urls.clone(),
            &book.csrf_token,
        ));
        Self::from_archive(book, archive, api, layout, options, progress)
    }

    /// Parse and render an already loaded archive. Pagination waits for [`ReaderSession::start`].
    pub fn from_archive(
        book: BookData,
        archive: Archive,
        api: Arc<dyn ReaderApi>,
        layout: L,
        options: SessionOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Self, ReaderError> {
        emit_progress(progress, LoadStage::Parse, 0, None, None);
        let package = Package::open(&archive)?;
        let metadata = package
            .metadata
            .clone()
            .with_fallback(book.title.as_deref(), book.author.as_deref());
        let toc = navigation::parse_toc(&archive, &package);
        tracing::info!(
            "Opened '{}': {} spine items, {} TOC entries ({:?})",
            metadata.title.as_deref().unwrap_or("untitled"),
            package.spine.len(),
            toc.entries.len(),
            toc.source
        );

        let mut store = options.store;
        let mut bindings = ImageBindings::default();
        let surface =
            render::render_all(&archive, &package, &mut bindings, store.as_mut(), progress);

        let settings = ReaderSettings {
            theme: book.theme.unwrap_or_default(),
            ..ReaderSettings::default()
        };
        let (position_tx, _) = watch::channel(PositionToken::new(1, 1));

        Ok(Self {
            timing: options.timing.clone(),
            save_debounce: Debouncer::new(options.timing.save_debounce()),
            resize_gate: DeadlineGate::new(options.timing.resize_debounce()),
            paginator: Paginator::new(options.timing.column_gap),
            book,
            archive,
            package,
            metadata,
            toc,
            surface,
            bindings,
            store,
            layout,
            settings,
            bookmarks: Vec::new(),
            api,
            position_tx,
            autosave: None,
            started: Instant::now(),
        })
    }

    /// Load remote settings, paginate, restore the saved position, load
    /// bookmarks and start the periodic autosave.
    pub async fn start(&mut self) -> PageView {
        match self.api.fetch_settings().await {
            Ok(settings) => self.settings = settings,
            Err(e) => tracing::warn!("Using default reader settings: {}", e),
        }

        self.recalculate();
        if let Some(page) = self.restore_target() {
            tracing::info!("Restoring position: page {}", page);
            self.paginator.go_to_page(page as i64);
            self.publish_position();
        }

        self.reload_bookmarks().await;
        self.start_autosave();
        self.view()
    }

    fn restore_target(&self) -> Option<u32> {
        let saved = self.book.saved_progress.as_ref()?;
        position::restore_page(
            saved.cfi.as_deref(),
            saved.percentage,
            self.paginator.total_pages(),
        )
    }

    fn start_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
        let api = Arc::clone(&self.api);
        let rx = self.position_tx.subscribe();
        let interval = self.timing.autosave_interval();
        let started = self.started;
        self.autosave = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let position = *rx.borrow();
                let minutes = minutes_since(started);
                if let Some(update) = ProgressUpdate::for_position(position, minutes) {
                    if let Err(e) = api.save_progress(&update).await {
                        tracing::warn!("Autosave failed: {}", e);
                    }
                }
            }
        }));
    }

    // --- Pagination ---

    /// Full layout pass. The current page is kept (clamped), not rescaled.
    pub fn recalculate(&mut self) -> PageView {
        let view = self
            .paginator
            .recalculate(&mut self.layout, &self.surface, &self.settings);
        self.publish_position();
        view
    }

    pub fn go_to_page(&mut self, page: i64) -> PageView {
        let view = self.paginator.go_to_page(page);
        self.after_navigation();
        view
    }

    pub fn next_page(&mut self) -> Option<PageView> {
        let view = self.paginator.next_page()?;
        self.after_navigation();
        Some(view)
    }

    pub fn prev_page(&mut self) -> Option<PageView> {
        let view = self.paginator.prev_page()?;
        self.after_navigation();
        Some(view)
    }

    /// `None` (and no navigation) when the chapter was not rendered.
    pub fn go_to_spine_item(&mut self, spine_index: usize) -> Option<PageView> {
        let view = self.paginator.go_to_spine_item(spine_index)?;
        self.after_navigation();
        Some(view)
    }

    /// Seek to a fraction of the book, `0.0..=1.0`.
    pub fn go_to_fraction(&mut self, fraction: f64) -> PageView {
        let view = self.paginator.go_to_fraction(fraction);
        self.after_navigation();
        view
    }

    /// `None` when the bookmark's position token does not parse.
    pub fn go_to_bookmark(&mut self, bookmark: &Bookmark) -> Option<PageView> {
        let page = bookmark.target_page(self.paginator.total_pages())?;
        Some(self.go_to_page(page as i64))
    }

    fn after_navigation(&mut self) {
        self.publish_position();
        self.schedule_save();
    }

    fn publish_position(&self) {
        self.position_tx.send_replace(self.position());
    }

    fn schedule_save(&self) {
        let minutes = minutes_since(self.started);
        let Some(update) = ProgressUpdate::for_position(self.position(), minutes) else {
            return;
        };
        let api = Arc::clone(&self.api);
        self.save_debounce.schedule(async move {
            if let Err(e) = api.save_progress(&update).await {
                tracing::warn!("Progress save failed: {}", e);
            }
        });
    }

    // --- Resize ---

    /// Record a new frame size. Pagination is redone once resizing settles.
    pub fn resize(&mut self, frame: FrameMetrics) {
        self.layout.set_frame(frame);
        self.resize_gate.touch();
    }

    /// Recalculate if the resize debounce has elapsed.
    pub fn flush_resize(&mut self) -> Option<PageView> {
        self.resize_gate.take_due().then(|| self.recalculate())
    }

    /// Wait for a pending resize to settle, then recalculate.
    pub async fn settle(&mut self) -> Option<PageView> {
        if self.resize_gate.wait().await {
            Some(self.recalculate())
        } else {
            None
        }
    }

    // --- Settings ---

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.theme = theme;
        self.push_settings();
    }

    /// Changes glyph widths, so pagination is redone.
    pub fn set_font_family(&mut self, family: FontFamily) -> PageView {
        self.settings.font_family = family;
        let view = self.recalculate();
        self.push_settings();
        view
    }

    /// Step the font size and keep the reader at the same relative position.
    pub fn change_font_size(&mut self, delta: i32) -> PageView {
        let frac = position::fraction_of_span(
            self.paginator.current_page(),
            self.paginator.total_pages(),
        );
        self.settings.change_font_size(delta);
        self.recalculate();
        let page = position::page_at_fraction_of_span(frac, self.paginator.total_pages());
        let view = self.go_to_page(page as i64);
        self.push_settings();
        view
    }

    /// Fire-and-forget; failures are only logged.
    fn push_settings(&self) {
        let api = Arc::clone(&self.api);
        let settings = self.settings;
        tokio::spawn(async move {
            if let Err(e) = api.save_settings(&settings).await {
                tracing::debug!("Settings not saved: {}", e);
            }
        });
    }

    // --- Bookmarks ---

    /// Bookmark the current page, then reload the list.
    pub async fn add_bookmark(&mut self) -> Result<Option<BookmarkId>, SyncError> {
        let chapter = self.chapter_title().unwrap_or_default().to_string();
        let request = NewBookmark::at(self.book.id, self.position(), &chapter);
        let id = self.api.create_bookmark(&request).await?;
        self.reload_bookmarks().await;
        Ok(id)
    }

    pub async fn delete_bookmark(&mut self, id: BookmarkId) -> Result<(), SyncError> {
        self.api.delete_bookmark(id).await?;
        self.reload_bookmarks().await;
        Ok(())
    }

    /// Replace the cached list. On failure the previous list is kept.
    pub async fn reload_bookmarks(&mut self) {
        match self.api.list_bookmarks().await {
            Ok(bookmarks) => self.bookmarks = bookmarks,
            Err(e) => tracing::warn!("Could not load bookmarks: {}", e),
        }
    }

    // --- Persistence ---

    /// Save immediately, as when the page becomes hidden.
    pub async fn save_now(&self) -> Result<(), SyncError> {
        match ProgressUpdate::for_position(self.position(), minutes_since(self.started)) {
            Some(update) => self.api.save_progress(&update).await,
            None => Ok(()),
        }
    }

    /// End the session: final save, stop timers, release image handles.
    /// Returns the number of handles released.
    pub async fn teardown(mut self) -> usize {
        self.save_debounce.cancel();
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
        if let Err(e) = self.save_now().await {
            tracing::warn!("Final progress save failed: {}", e);
        }
        self.bindings.clear();
        let released = self.store.release_all();
        tracing::info!("Session closed, {} image handles released", released);
        released
    }

    // --- Accessors ---

    pub fn position(&self) -> PositionToken {
        PositionToken::new(self.paginator.current_page(), self.paginator.total_pages())
    }

    pub fn view(&self) -> PageView {
        self.paginator.view()
    }

    /// Label of the TOC entry for the chapter on screen.
    pub fn chapter_title(&self) -> Option<&str> {
        let spine = self.paginator.active_spine_index()?;
        self.toc.entry_for_spine(spine).map(|e| e.label.as_str())
    }

    pub fn book(&self) -> &BookData {
        &self.book
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn surface(&self) -> &RenderedSurface {
        &self.surface
    }

    pub fn images(&self) -> &ImageBindings {
        &self.bindings
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }
}

impl<L: LayoutEngine> Drop for ReaderSession<L> {
    fn drop(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
    }
}

fn minutes_since(started: Instant) -> u64 {
    started.elapsed().as_secs() / 60
}
