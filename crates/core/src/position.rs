//! Position tokens (`page:<current>:<total>`) and the percentage arithmetic
//! used to save and restore a reading location.

use std::fmt;

/// A page position together with the page count it was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionToken {
    pub page: u32,
    pub total_pages: u32,
}

impl PositionToken {
    pub fn new(page: u32, total_pages: u32) -> Self {
        Self { page, total_pages }
    }

    /// Strict parse: exactly three `:`-separated segments, `page` prefix,
    /// both numbers at least 1. Anything else is `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.trim().split(':');
        let (Some("page"), Some(page), Some(total), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        let page: u32 = page.parse().ok()?;
        let total_pages: u32 = total.parse().ok()?;
        (page >= 1 && total_pages >= 1).then_some(Self { page, total_pages })
    }

    /// Page in a layout with `total_pages` pages. Unchanged totals return the
    /// recorded page; otherwise the relative position is carried over.
    pub fn rescale(&self, total_pages: u32) -> u32 {
        let total_pages = total_pages.max(1);
        if self.total_pages == total_pages || self.total_pages <= 1 {
            return self.page.clamp(1, total_pages);
        }
        let frac = (self.page.min(self.total_pages) - 1) as f64 / (self.total_pages - 1) as f64;
        page_at_fraction_of_span(frac, total_pages)
    }
}

impl fmt::Display for PositionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}:{}", self.page, self.total_pages)
    }
}

/// `(page-1)/(total-1)`, or 0 for a single page.
pub fn fraction_of_span(page: u32, total_pages: u32) -> f64 {
    if total_pages <= 1 {
        return 0.0;
    }
    ((page.max(1) - 1) as f64 / (total_pages - 1) as f64).clamp(0.0, 1.0)
}

/// Inverse of [`fraction_of_span`]: `round(frac*(total-1)) + 1`.
pub fn page_at_fraction_of_span(frac: f64, total_pages: u32) -> u32 {
    let total_pages = total_pages.max(1);
    let page = (frac.clamp(0.0, 1.0) * (total_pages - 1) as f64).round() as u32 + 1;
    page.clamp(1, total_pages)
}

/// Completion percentage sent with a progress save, in `[0, 100]`.
pub fn progress_percentage(page: u32, total_pages: u32) -> f64 {
    fraction_of_span(page, total_pages) * 100.0
}

/// Whole-number percentage shown next to the page counter.
pub fn display_percentage(page: u32, total_pages: u32) -> u32 {
    progress_percentage(page, total_pages).round() as u32
}

/// Page for a seek to `fraction` of the book: `max(1, round(fraction * total))`.
pub fn page_for_fraction(fraction: f64, total_pages: u32) -> u32 {
    let page = (fraction.clamp(0.0, 1.0) * total_pages as f64).round() as u32;
    page.clamp(1, total_pages.max(1))
}

/// Page to restore from saved progress. The token wins when it parses;
/// otherwise a positive percentage is converted. `None` leaves the reader at page 1.
pub fn restore_page(cfi: Option<&str>, percentage: Option<f64>, total_pages: u32) -> Option<u32> {
    if let Some(token) = cfi.and_then(PositionToken::parse) {
        return Some(token.rescale(total_pages));
    }
    match percentage {
        Some(pct) if pct > 0.0 => Some(page_for_fraction(pct / 100.0, total_pages)),
        _ => None,
    }
}
