//! Paginator: turns a layout measurement into page-addressed navigation.
//!
//! One page is one column; moving to page `n` translates the content surface
//! by `(n - 1) * page_step` where `page_step = column_width + column_gap`.

use serde::Serialize;

use crate::layout::{ColumnSpec, LayoutEngine};
use crate::position;
use crate::render::RenderedSurface;
use crate::settings::ReaderSettings;

/// Gap between columns in pixels.
pub const COLUMN_GAP: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaginationState {
    pub current_page: u32,
    pub total_pages: u32,
    pub column_width: f64,
    pub column_gap: f64,
    pub page_step: f64,
}

/// What the UI needs after every navigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageView {
    pub page: u32,
    pub total_pages: u32,
    /// Horizontal translation of the content surface, in pixels (non-negative, applied leftwards).
    pub translate_x: f64,
    /// Whole-number percentage for the progress display.
    pub percentage: u32,
    /// Spine index of the chapter occupying most of the page.
    pub active_spine: Option<usize>,
}

impl PageView {
    /// CSS transform for the content surface.
    pub fn transform(&self) -> String {
        format!("translateX(-{}px)", self.translate_x)
    }
}

#[derive(Debug, Clone)]
pub struct Paginator {
    state: PaginationState,
    chapter_offsets: Vec<(usize, f64)>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(COLUMN_GAP)
    }
}

impl Paginator {
    pub fn new(column_gap: f64) -> Self {
        Self {
            state: PaginationState {
                current_page: 1,
                total_pages: 1,
                column_width: 0.0,
                column_gap,
                page_step: column_gap,
            },
            chapter_offsets: Vec::new(),
        }
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn current_page(&self) -> u32 {
        self.state.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.state.total_pages
    }

    pub fn chapter_offsets(&self) -> &[(usize, f64)] {
        &self.chapter_offsets
    }

    /// Column parameters for the engine's current frame.
    pub fn column_spec(&self, engine: &dyn LayoutEngine) -> ColumnSpec {
        let frame = engine.frame();
        ColumnSpec {
            height: frame.height,
            column_width: frame.column_width(),
            column_gap: self.state.column_gap,
        }
    }

    /// Full layout pass: re-derive column width, page step and total pages,
    /// then clamp the current page into range.
    pub fn recalculate(
        &mut self,
        engine: &mut dyn LayoutEngine,
        surface: &RenderedSurface,
        settings: &ReaderSettings,
    ) -> PageView {
        let spec = self.column_spec(engine);
        let measurement = engine.layout(surface, &spec, settings);
        self.apply_measurement(spec, measurement.scroll_width, measurement.chapter_offsets);
        tracing::info!(
            "Pagination: {} pages (col={}, step={})",
            self.state.total_pages,
            self.state.column_width,
            self.state.page_step
        );
        self.view()
    }

    fn apply_measurement(
        &mut self,
        spec: ColumnSpec,
        scroll_width: f64,
        offsets: Vec<(usize, f64)>,
    ) {
        let step = spec.page_step();
        self.state.column_width = spec.column_width;
        self.state.page_step = step;
        self.state.total_pages = ((scroll_width / step).ceil() as u32).max(1);
        self.state.current_page = self.state.current_page.clamp(1, self.state.total_pages);
        self.chapter_offsets = offsets;
    }

    /// Clamp `page` into `[1, total_pages]` and move there.
    pub fn go_to_page(&mut self, page: i64) -> PageView {
        self.state.current_page = page.clamp(1, self.state.total_pages as i64) as u32;
        self.view()
    }

    /// `None` at the last page; navigation is not cyclic.
    pub fn next_page(&mut self) -> Option<PageView> {
        (self.state.current_page < self.state.total_pages)
            .then(|| self.go_to_page(self.state.current_page as i64 + 1))
    }

    /// `None` at the first page.
    pub fn prev_page(&mut self) -> Option<PageView> {
        (self.state.current_page > 1).then(|| self.go_to_page(self.state.current_page as i64 - 1))
    }

    /// Page on which a chapter block starts: `floor(offset / step) + 1`.
    pub fn page_of_spine_item(&self, spine_index: usize) -> Option<u32> {
        let (_, offset) = self
            .chapter_offsets
            .iter()
            .find(|(idx, _)| *idx == spine_index)?;
        let page = (offset / self.state.page_step + 1e-6).floor() as i64 + 1;
        Some(page.clamp(1, self.state.total_pages as i64) as u32)
    }

    /// Jump to the start of a chapter. `None` when that chapter was not rendered.
    pub fn go_to_spine_item(&mut self, spine_index: usize) -> Option<PageView> {
        let page = self.page_of_spine_item(spine_index)?;
        Some(self.go_to_page(page as i64))
    }

    /// Seek to a fraction of the book, as a click on the progress bar does.
    pub fn go_to_fraction(&mut self, fraction: f64) -> PageView {
        let page = position::page_for_fraction(fraction, self.state.total_pages);
        self.go_to_page(page as i64)
    }

    pub fn translate_x(&self) -> f64 {
        (self.state.current_page - 1) as f64 * self.state.page_step
    }

    /// Last chapter block starting at or before the middle of the visible page.
    pub fn active_spine_index(&self) -> Option<usize> {
        let threshold = self.translate_x() + self.state.column_width / 2.0;
        self.chapter_offsets
            .iter()
            .take_while(|(_, offset)| *offset <= threshold)
            .last()
            .map(|(idx, _)| *idx)
    }

    pub fn view(&self) -> PageView {
        PageView {
            page: self.state.current_page,
            total_pages: self.state.total_pages,
            translate_x: self.translate_x(),
            percentage: position::display_percentage(
                self.state.current_page,
                self.state.total_pages,
            ),
            active_spine: self.active_spine_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FrameMetrics, LayoutMeasurement, MeasuredLayout};
    use proptest::prelude::*;

    /// 400px columns (step 480) over `columns` columns, chapters at the given columns.
    fn paginator(columns: u32, chapter_columns: &[(usize, u32)]) -> Paginator {
        let mut engine = MeasuredLayout::new(FrameMetrics::new(400.0, 600.0));
        let columns = columns as f64;
        engine.set_measurement(LayoutMeasurement {
            scroll_width: columns * 400.0 + (columns - 1.0) * 80.0,
            chapter_offsets: chapter_columns
                .iter()
                .map(|(idx, col)| (*idx, *col as f64 * 480.0))
                .collect(),
        });
        let mut p = Paginator::default();
        p.recalculate(&mut engine, &RenderedSurface::default(), &ReaderSettings::default());
        p
    }

    #[test]
    fn total_pages_from_scroll_width() {
        let p = paginator(12, &[]);
        assert_eq!(p.total_pages(), 12);
        assert_eq!(p.state().page_step, 480.0);
        assert_eq!(p.state().column_width, 400.0);
    }

    #[test]
    fn at_least_one_page() {
        let mut engine = MeasuredLayout::new(FrameMetrics::new(400.0, 600.0));
        let mut p = Paginator::default();
        p.recalculate(&mut engine, &RenderedSurface::default(), &ReaderSettings::default());
        assert_eq!(p.total_pages(), 1);
        assert!(p.next_page().is_none());
        assert!(p.prev_page().is_none());
    }

    #[test]
    fn transform_matches_page() {
        let mut p = paginator(10, &[]);
        let view = p.go_to_page(3);
        assert_eq!(view.translate_x, 960.0);
        assert_eq!(view.transform(), "translateX(-960px)");
    }

    #[test]
    fn next_and_prev_stop_at_boundaries() {
        let mut p = paginator(3, &[]);
        assert!(p.prev_page().is_none());
        assert_eq!(p.next_page().map(|v| v.page), Some(2));
        assert_eq!(p.next_page().map(|v| v.page), Some(3));
        assert!(p.next_page().is_none());
        assert_eq!(p.current_page(), 3);
    }

    #[test]
    fn spine_navigation_and_chapter_tracking() {
        let mut p = paginator(10, &[(0, 0), (1, 4), (3, 7)]);
        assert_eq!(p.go_to_spine_item(1).map(|v| v.page), Some(5));
        assert_eq!(p.view().active_spine, Some(1));
        assert_eq!(p.go_to_page(7).active_spine, Some(1));
        assert_eq!(p.go_to_page(8).active_spine, Some(3));
        // Spine item 2 was skipped during render.
        assert!(p.go_to_spine_item(2).is_none());
        assert_eq!(p.current_page(), 8);
    }

    #[test]
    fn recalculate_clamps_current_page() {
        let mut p = paginator(10, &[]);
        p.go_to_page(9);
        let mut engine = MeasuredLayout::new(FrameMetrics::new(400.0, 600.0));
        engine.set_measurement(LayoutMeasurement {
            scroll_width: 4.0 * 480.0 - 80.0,
            chapter_offsets: vec![],
        });
        let surface = RenderedSurface::default();
        let view = p.recalculate(&mut engine, &surface, &ReaderSettings::default());
        assert_eq!((view.page, view.total_pages), (4, 4));
    }

    #[test]
    fn fraction_seek() {
        let mut p = paginator(20, &[]);
        assert_eq!(p.go_to_fraction(0.5).page, 10);
        assert_eq!(p.go_to_fraction(0.0).page, 1);
        assert_eq!(p.go_to_fraction(1.0).page, 20);
    }

    proptest! {
        #[test]
        fn go_to_page_clamps(total in 1u32..500, target in -1000i64..1000) {
            let mut p = paginator(total, &[]);
            let view = p.go_to_page(target);
            prop_assert!(view.page >= 1 && view.page <= p.total_pages());
            if target < 1 {
                prop_assert_eq!(view, p.go_to_page(1));
            }
            if target > total as i64 {
                prop_assert_eq!(view, p.go_to_page(total as i64));
            }
        }

        #[test]
        fn go_to_page_is_idempotent(total in 1u32..500, target in 1i64..500) {
            let mut p = paginator(total, &[(0, 0)]);
            let first = p.go_to_page(target);
            let second = p.go_to_page(target);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn recalculate_is_stable(total in 1u32..500, page in 1i64..500) {
            let mut engine = MeasuredLayout::new(FrameMetrics::new(400.0, 600.0));
            engine.set_measurement(LayoutMeasurement {
                scroll_width: total as f64 * 480.0 - 80.0,
                chapter_offsets: vec![(0, 0.0)],
            });
            let mut p = Paginator::default();
            let surface = RenderedSurface::default();
            let settings = ReaderSettings::default();
            p.recalculate(&mut engine, &surface, &settings);
            p.go_to_page(page);
            let a = *p.state();
            p.recalculate(&mut engine, &surface, &settings);
            prop_assert_eq!(a, *p.state());
        }
    }
}
