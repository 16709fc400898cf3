//! WASM bindings for the retroreader core.
//!
//! The browser host owns the real layout: it applies [`WasmReader::column_spec`]
//! to the content element, measures the flow, and passes the numbers to
//! [`WasmReader::recalculate`]. Everything else (parsing, rendering, page math)
//! happens here. Structured values cross the boundary as JSON strings.

use retroreader_core::archive::Archive;
use retroreader_core::error::ReaderError;
use retroreader_core::layout::{FrameMetrics, LayoutEngine, LayoutMeasurement, MeasuredLayout};
use retroreader_core::navigation::{self, TableOfContents};
use retroreader_core::package::{Metadata, Package};
use retroreader_core::pagination::{PageView, Paginator};
use retroreader_core::position::{self, PositionToken};
use retroreader_core::render::{self, BlobStore, DataUriStore, ImageBindings, RenderedSurface};
use retroreader_core::security::SecurityLimits;
use retroreader_core::settings::ReaderSettings;
use wasm_bindgen::prelude::*;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_err)
}

#[wasm_bindgen]
pub struct WasmReader {
    package: Package,
    metadata: Metadata,
    toc: TableOfContents,
    surface: RenderedSurface,
    bindings: ImageBindings,
    store: DataUriStore,
    layout: MeasuredLayout,
    paginator: Paginator,
    settings: ReaderSettings,
}

impl WasmReader {
    fn open(data: &[u8], frame: FrameMetrics) -> Result<WasmReader, ReaderError> {
        let archive = Archive::from_bytes(data, &SecurityLimits::default())?;
        let package = Package::open(&archive)?;
        let toc = navigation::parse_toc(&archive, &package);
        let mut bindings = ImageBindings::default();
        let mut store = DataUriStore::default();
        let surface = render::render_all(&archive, &package, &mut bindings, &mut store, None);

        Ok(WasmReader {
            metadata: package.metadata.clone(),
            package,
            toc,
            surface,
            bindings,
            store,
            layout: MeasuredLayout::new(frame),
            paginator: Paginator::default(),
            settings: ReaderSettings::default(),
        })
    }
}

#[wasm_bindgen]
impl WasmReader {
    /// Open a package from its bytes and render every chapter.
    /// Load failures reject with a single user-facing message.
    #[wasm_bindgen(constructor)]
    pub fn new(data: &[u8], width: f64, height: f64) -> Result<WasmReader, JsValue> {
        Self::open(data, FrameMetrics::new(width, height))
            .map_err(|e| JsValue::from_str(e.user_message()))
    }

    /// Fill title and author the package did not declare.
    pub fn set_host_metadata(&mut self, title: Option<String>, author: Option<String>) {
        self.metadata = self
            .package
            .metadata
            .clone()
            .with_fallback(title.as_deref(), author.as_deref());
    }

    pub fn metadata_json(&self) -> Result<String, JsValue> {
        to_json(&self.metadata)
    }

    pub fn toc_json(&self) -> Result<String, JsValue> {
        to_json(&self.toc)
    }

    /// Rendered chapters, ready to be placed in the content element.
    pub fn surface_html(&self) -> String {
        self.surface.to_html()
    }

    pub fn set_settings_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.settings = serde_json::from_str(json).map_err(js_err)?;
        Ok(())
    }

    pub fn settings_json(&self) -> Result<String, JsValue> {
        to_json(&self.settings)
    }

    pub fn set_frame(&mut self, width: f64, height: f64, padding_left: f64, padding_right: f64) {
        self.layout.set_frame(FrameMetrics {
            height,
            client_width: width,
            padding_left,
            padding_right,
        });
    }

    /// Column height, width and gap to apply before measuring, as JSON.
    pub fn column_spec(&self) -> Result<String, JsValue> {
        to_json(&self.paginator.column_spec(&self.layout))
    }

    /// Feed the measured flow (`chapter_offsets_json` is `[[spine, offset], ...]`)
    /// and recompute pages. Returns the page view as JSON.
    pub fn recalculate(
        &mut self,
        scroll_width: f64,
        chapter_offsets_json: &str,
    ) -> Result<String, JsValue> {
        let chapter_offsets: Vec<(usize, f64)> =
            serde_json::from_str(chapter_offsets_json).map_err(js_err)?;
        self.layout.set_measurement(LayoutMeasurement {
            scroll_width,
            chapter_offsets,
        });
        let view = self
            .paginator
            .recalculate(&mut self.layout, &self.surface, &self.settings);
        to_json(&view)
    }

    /// Page to open from saved progress; stays on page 1 when nothing applies.
    pub fn restore(
        &mut self,
        cfi: Option<String>,
        percentage: Option<f64>,
    ) -> Result<String, JsValue> {
        let total = self.paginator.total_pages();
        let view = match position::restore_page(cfi.as_deref(), percentage, total) {
            Some(page) => self.paginator.go_to_page(page as i64),
            None => self.paginator.view(),
        };
        to_json(&view)
    }

    pub fn go_to_page(&mut self, page: f64) -> Result<String, JsValue> {
        let view = self.paginator.go_to_page(page as i64);
        to_json(&view)
    }

    /// `undefined` at the last page.
    pub fn next_page(&mut self) -> Result<Option<String>, JsValue> {
        self.paginator.next_page().map(|v| to_json(&v)).transpose()
    }

    pub fn prev_page(&mut self) -> Result<Option<String>, JsValue> {
        self.paginator.prev_page().map(|v| to_json(&v)).transpose()
    }

    pub fn go_to_spine_item(&mut self, spine_index: usize) -> Result<Option<String>, JsValue> {
        self.paginator
            .go_to_spine_item(spine_index)
            .map(|v| to_json(&v))
            .transpose()
    }

    pub fn go_to_fraction(&mut self, fraction: f64) -> Result<String, JsValue> {
        let view = self.paginator.go_to_fraction(fraction);
        to_json(&view)
    }

    /// Step the font size; the caller re-measures and then calls
    /// [`WasmReader::reanchor`] with the returned fraction.
    pub fn change_font_size(&mut self, delta: i32) -> f64 {
        self.settings.change_font_size(delta);
        position::fraction_of_span(self.paginator.current_page(), self.paginator.total_pages())
    }

    /// Move to the page at `fraction` of the page span after a relayout.
    pub fn reanchor(&mut self, fraction: f64) -> Result<String, JsValue> {
        let page = position::page_at_fraction_of_span(fraction, self.paginator.total_pages());
        let view: PageView = self.paginator.go_to_page(page as i64);
        to_json(&view)
    }

    /// `page:N:T` for the current page, as saved and bookmarked.
    pub fn position_token(&self) -> String {
        PositionToken::new(self.paginator.current_page(), self.paginator.total_pages()).to_string()
    }

    /// Label of the TOC entry for the chapter on screen.
    pub fn chapter_title(&self) -> Option<String> {
        let spine = self.paginator.active_spine_index()?;
        self.toc.entry_for_spine(spine).map(|e| e.label.clone())
    }

    /// Drop every image handle. The reader must not be used for display afterwards.
    pub fn release_images(&mut self) -> usize {
        self.bindings.clear();
        self.store.release_all()
    }
}
