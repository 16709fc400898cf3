//! Column layout: what the paginator asks of a layout pass, and two engines
//! that answer it.
//!
//! A browser host measures the real DOM and feeds the numbers to
//! [`MeasuredLayout`]. [`EstimatedLayout`] approximates the same flow from
//! font metrics so books can be paginated without a renderer.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::render::{RenderNode, RenderedSurface};
use crate::settings::{FontFamily, ReaderSettings};

/// Visible frame of the reader, as the host measures it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub height: f64,
    pub client_width: f64,
    #[serde(default)]
    pub padding_left: f64,
    #[serde(default)]
    pub padding_right: f64,
}

impl FrameMetrics {
    pub fn new(client_width: f64, height: f64) -> Self {
        Self {
            height,
            client_width,
            padding_left: 0.0,
            padding_right: 0.0,
        }
    }

    /// Content width excluding padding. One column is exactly this wide.
    pub fn column_width(&self) -> f64 {
        (self.client_width - self.padding_left - self.padding_right).max(1.0)
    }
}

/// Column parameters applied to the content surface before measuring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub height: f64,
    pub column_width: f64,
    pub column_gap: f64,
}

impl ColumnSpec {
    pub fn page_step(&self) -> f64 {
        self.column_width + self.column_gap
    }
}

/// Result of a layout pass: total flowed width and where each chapter block starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutMeasurement {
    pub scroll_width: f64,
    /// `(spine index, horizontal offset)` in document order.
    pub chapter_offsets: Vec<(usize, f64)>,
}

pub trait LayoutEngine: Send {
    fn frame(&self) -> FrameMetrics;

    fn set_frame(&mut self, frame: FrameMetrics);

    /// Lay out `surface` with `spec` and report the measurement.
    fn layout(
        &mut self,
        surface: &RenderedSurface,
        spec: &ColumnSpec,
        settings: &ReaderSettings,
    ) -> LayoutMeasurement;
}

/// Host-measured layout. The host applies the column spec, reads back the
/// scroll width and chapter offsets, and stores them with [`MeasuredLayout::set_measurement`].
#[derive(Debug, Clone)]
pub struct MeasuredLayout {
    frame: FrameMetrics,
    measurement: LayoutMeasurement,
}

impl MeasuredLayout {
    pub fn new(frame: FrameMetrics) -> Self {
        Self {
            frame,
            measurement: LayoutMeasurement::default(),
        }
    }

    pub fn set_measurement(&mut self, measurement: LayoutMeasurement) {
        self.measurement = measurement;
    }
}

impl LayoutEngine for MeasuredLayout {
    fn frame(&self) -> FrameMetrics {
        self.frame
    }

    fn set_frame(&mut self, frame: FrameMetrics) {
        self.frame = frame;
    }

    fn layout(
        &mut self,
        _: &RenderedSurface,
        _: &ColumnSpec,
        _: &ReaderSettings,
    ) -> LayoutMeasurement {
        self.measurement.clone()
    }
}

/// Deterministic estimate of column flow from font metrics.
#[derive(Debug, Clone)]
pub struct EstimatedLayout {
    frame: FrameMetrics,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
}

impl EstimatedLayout {
    pub fn new(frame: FrameMetrics) -> Self {
        Self {
            frame,
            line_height: 1.6,
        }
    }

    /// Average glyph advance relative to font size.
    fn char_factor(family: FontFamily) -> f64 {
        match family {
            FontFamily::Serif => 0.5,
            FontFamily::Sans => 0.52,
            FontFamily::Mono => 0.6,
        }
    }

    /// Number of columns one chapter occupies.
    fn chapter_columns(
        &self,
        nodes: &[RenderNode],
        spec: &ColumnSpec,
        settings: &ReaderSettings,
    ) -> usize {
        let font_size = settings.font_size as f64;
        let char_width = font_size * Self::char_factor(settings.font_family);
        let chars_per_line = ((spec.column_width / char_width).floor() as usize).max(1);
        let line_px = font_size * self.line_height;
        let lines_per_column = ((spec.height / line_px).floor() as usize).max(1);

        let lines: usize = collect_blocks(nodes)
            .into_iter()
            .map(|block| match block {
                Block::Text(chars) => chars.div_ceil(chars_per_line).max(1),
                Block::Image => (lines_per_column / 2).max(1),
            })
            .sum();
        lines.div_ceil(lines_per_column).max(1)
    }
}

impl LayoutEngine for EstimatedLayout {
    fn frame(&self) -> FrameMetrics {
        self.frame
    }

    fn set_frame(&mut self, frame: FrameMetrics) {
        self.frame = frame;
    }

    fn layout(
        &mut self,
        surface: &RenderedSurface,
        spec: &ColumnSpec,
        settings: &ReaderSettings,
    ) -> LayoutMeasurement {
        let step = spec.page_step();
        let mut columns = 0usize;
        let mut chapter_offsets = Vec::with_capacity(surface.len());

        // Each chapter starts on a fresh column.
        for chapter in &surface.chapters {
            chapter_offsets.push((chapter.spine_index, columns as f64 * step));
            columns += self.chapter_columns(&chapter.nodes, spec, settings);
        }

        let columns = columns.max(1) as f64;
        LayoutMeasurement {
            scroll_width: columns * spec.column_width + (columns - 1.0) * spec.column_gap,
            chapter_offsets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Visible characters of one block of flowed text.
    Text(usize),
    Image,
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p",
    "pre", "section", "table", "tr", "ul",
];

fn collect_blocks(nodes: &[RenderNode]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending = String::new();
    for node in nodes {
        walk_blocks(node, &mut blocks, &mut pending);
    }
    flush(&mut blocks, &mut pending);
    blocks
}

fn walk_blocks(node: &RenderNode, blocks: &mut Vec<Block>, pending: &mut String) {
    match node {
        RenderNode::Text(t) => pending.push_str(t),
        RenderNode::Comment(_) => {}
        RenderNode::Element { name, children, .. } => match name.as_str() {
            "img" | "image" | "svg" => {
                flush(blocks, pending);
                blocks.push(Block::Image);
            }
            "br" => flush(blocks, pending),
            n if BLOCK_ELEMENTS.contains(&n) => {
                flush(blocks, pending);
                for child in children {
                    walk_blocks(child, blocks, pending);
                }
                flush(blocks, pending);
            }
            _ => {
                for child in children {
                    walk_blocks(child, blocks, pending);
                }
            }
        },
    }
}

fn flush(blocks: &mut Vec<Block>, pending: &mut String) {
    let collapsed = pending.split_whitespace().collect::<Vec<_>>().join(" ");
    pending.clear();
    if !collapsed.is_empty() {
        blocks.push(Block::Text(collapsed.graphemes(true).count()));
    }
}
