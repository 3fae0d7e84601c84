//! Preview viewport geometry
//!
//! Annotation coordinates are pixels from the top-left corner of the page
//! image as displayed. A [`ViewportSnapshot`] records the displayed size of
//! the page those pixels refer to, so export can map them back to PDF points
//! no matter how the preview has been resized since.

use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};

/// Displayed size of one page, in preview pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSnapshot {
    pub width: f32,
    pub height: f32,
}

impl ViewportSnapshot {
    /// Snapshot of a page displayed at `width` by `height` pixels.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// PDF points per preview pixel along x
    pub fn scale_x(&self, page: PageSize) -> f32 {
        page.width_pt / self.width
    }

    /// PDF points per preview pixel along y
    pub fn scale_y(&self, page: PageSize) -> f32 {
        page.height_pt / self.height
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// How the vertical extent of the preview is derived from its width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "height", rename_all = "snake_case")]
pub enum HeightNormalization {
    /// The page is displayed at its own aspect ratio.
    AspectCorrect,
    /// A constant vertical divisor regardless of page shape.
    Fixed(f32),
}

impl Default for HeightNormalization {
    fn default() -> Self {
        HeightNormalization::AspectCorrect
    }
}

/// Preview render width plus the intrinsic page sizes of the loaded document
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportGeometry {
    render_width: f32,
    page_sizes: Vec<PageSize>,
    normalization: HeightNormalization,
}

impl ViewportGeometry {
    /// Geometry for pages displayed `render_width` pixels wide.
    pub fn new(
        render_width: f32,
        page_sizes: Vec<PageSize>,
        normalization: HeightNormalization,
    ) -> Self {
        Self { render_width, page_sizes, normalization }
    }

    pub fn render_width(&self) -> f32 {
        self.render_width
    }

    pub fn normalization(&self) -> HeightNormalization {
        self.normalization
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    /// Intrinsic size of a 1-based page
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        page.checked_sub(1).and_then(|index| self.page_sizes.get(index as usize)).copied()
    }

    /// Same pages, displayed at a new width.
    pub fn with_render_width(mut self, render_width: f32) -> Self {
        self.render_width = render_width;
        self
    }

    /// Snapshot of the displayed size of a 1-based page
    pub fn snapshot_for_page(&self, page: u32) -> Option<ViewportSnapshot> {
        let size = self.page_size(page)?;
        let height = match self.normalization {
            HeightNormalization::AspectCorrect => {
                if size.width_pt > 0.0 {
                    self.render_width * size.height_pt / size.width_pt
                } else {
                    self.render_width
                }
            }
            HeightNormalization::Fixed(height) => height,
        };
        Some(ViewportSnapshot::new(self.render_width, height))
    }
}

/// A point in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

/// Map a preview position to PDF space.
///
/// The returned `y` is the PDF coordinate of the top of the element.
pub fn project_point(x: f32, y: f32, viewport: ViewportSnapshot, page: PageSize) -> PdfPoint {
    PdfPoint {
        x: x * viewport.scale_x(page),
        y: page.height_pt - y * viewport.scale_y(page),
    }
}

/// Scale factors to move coordinates from `from` into `to`.
///
/// Returns `(1.0, 1.0)` if either snapshot is degenerate.
pub fn rebase_factors(from: ViewportSnapshot, to: ViewportSnapshot) -> (f32, f32) {
    if !from.is_usable() || !to.is_usable() {
        return (1.0, 1.0);
    }
    (to.width / from.width, to.height / from.height)
}
