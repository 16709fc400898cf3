//! Content renderer: every spine document, sanitized, with images bound to
//! local handles, concatenated into one surface in spine order.

pub mod dom;
pub mod images;
pub mod sanitize;

use crate::archive::Archive;
use crate::error::ChapterRenderError;
use crate::package::Package;
use crate::progress::{emit_progress, LoadStage, ProgressHandler};

pub use dom::RenderNode;
pub use images::{BlobStore, DataUriStore, ImageBindings};

/// One rendered spine item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBlock {
    pub spine_index: usize,
    /// Descriptor-relative href of the source document.
    pub source_href: String,
    pub nodes: Vec<RenderNode>,
}

impl ChapterBlock {
    pub fn text_content(&self) -> String {
        self.nodes.iter().map(RenderNode::text_content).collect()
    }
}

/// The single continuous content surface. Chapters are in spine order;
/// chapters that failed to render are absent.
#[derive(Debug, Clone, Default)]
pub struct RenderedSurface {
    pub chapters: Vec<ChapterBlock>,
}

impl RenderedSurface {
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapter(&self, spine_index: usize) -> Option<&ChapterBlock> {
        self.chapters.iter().find(|c| c.spine_index == spine_index)
    }

    /// Surface markup: chapter blocks tagged with spine index and source,
    /// with a separator between consecutive rendered chapters.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for (i, chapter) in self.chapters.iter().enumerate() {
            if i > 0 {
                out.push_str("<div class=\"chapter-separator\"></div>");
            }
            let block = RenderNode::element(
                "div",
                vec![
                    ("class".into(), "chapter-block".into()),
                    ("data-spine".into(), chapter.spine_index.to_string()),
                    ("data-href".into(), chapter.source_href.clone()),
                ],
                chapter.nodes.clone(),
            );
            // Writing into a String cannot fail.
            let _ = block.write_html(&mut out);
        }
        out
    }
}

/// Render every spine item in order. A chapter that cannot be rendered is
/// logged and skipped; it never aborts the whole render.
pub fn render_all(
    archive: &Archive,
    package: &Package,
    bindings: &mut ImageBindings,
    store: &mut dyn BlobStore,
    progress: Option<&dyn ProgressHandler>,
) -> RenderedSurface {
    let total = package.spine.len();
    let mut surface = RenderedSurface::default();

    for (i, item) in package.spine.iter().enumerate() {
        match render_chapter(archive, package, i, &item.href, bindings, store) {
            Ok(block) => surface.chapters.push(block),
            Err(e) => tracing::warn!("Skipping chapter {}: {}", i, e),
        }
        if i % 5 == 0 || i + 1 == total {
            emit_progress(
                progress,
                LoadStage::Render,
                (i + 1) as u64,
                Some(total as u64),
                Some(&format!("{} / {} sections", i + 1, total)),
            );
        }
    }

    tracing::info!(
        "Rendered {} of {} chapters, {} images bound",
        surface.len(),
        total,
        bindings.len()
    );
    surface
}

/// Parse one spine document in HTML mode and build its chapter block.
pub fn render_chapter(
    archive: &Archive,
    package: &Package,
    spine_index: usize,
    href: &str,
    bindings: &mut ImageBindings,
    store: &mut dyn BlobStore,
) -> Result<ChapterBlock, ChapterRenderError> {
    let path = package.resolve_href(href);
    let markup = archive
        .entry_text(&path)
        .ok_or_else(|| ChapterRenderError::Missing { path: path.clone() })?;

    let document = scraper::Html::parse_document(&markup);
    let body = scraper::Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .ok_or_else(|| ChapterRenderError::NoBody { path: path.clone() })?;

    let mut nodes = dom::children_of(body);
    sanitize::sanitize_nodes(&mut nodes);
    images::resolve_images(&mut nodes, href, bindings, archive, package, store);

    Ok(ChapterBlock {
        spine_index,
        source_href: href.to_string(),
        nodes,
    })
}
