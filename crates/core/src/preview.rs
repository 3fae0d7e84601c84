//! Overlay markers for the page preview
//!
//! The host draws the rendered page image itself and positions one marker per
//! annotation on top of it. Markers are emitted bottom to top.

use crate::annotation::{
    AnnotationContent, AnnotationId, AnnotationKind, AnnotationStore, Point, Size,
};
use crate::font_catalog::FontCatalog;
use serde::Serialize;

/// Stacking order of unselected markers
pub const Z_INDEX_DEFAULT: u32 = 10;
/// Stacking order of the selected marker
pub const Z_INDEX_SELECTED: u32 = 100;

/// Text-specific marker styling, as CSS values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMarker {
    pub text: String,
    pub font_family: String,
    /// Pixels
    pub font_size: f32,
    pub font_weight: &'static str,
    pub font_style: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMarker {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
    pub left: f32,
    pub top: f32,
    /// Shapes only; text sizes itself
    pub size: Option<Size>,
    pub text: Option<TextMarker>,
    /// CSS `rgb(...)`
    pub color: String,
    pub opacity: f32,
    pub z_index: u32,
    pub selected: bool,
    /// Center of the resize handle, for the selected shape
    pub resize_handle: Option<Point>,
}

/// Markers for every annotation on a 1-based page, selected one last.
pub fn preview_markers(
    store: &AnnotationStore,
    page: u32,
    catalog: &FontCatalog,
) -> Vec<PreviewMarker> {
    let selected_id = store.selected_id();

    store
        .render_order(page)
        .into_iter()
        .map(|annotation| {
            let selected = selected_id == Some(annotation.id);
            let position = annotation.position;

            let (size, text, opacity, resize_handle) = match &annotation.content {
                AnnotationContent::Text { text, style } => {
                    let marker = TextMarker {
                        text: text.clone(),
                        font_family: catalog.css_family(&style.font).to_owned(),
                        font_size: style.font_size,
                        font_weight: if style.bold { "bold" } else { "normal" },
                        font_style: if style.italic { "italic" } else { "normal" },
                    };
                    (None, Some(marker), 1.0, None)
                }
                AnnotationContent::Shape { size, style } => {
                    let handle = selected
                        .then(|| Point::new(position.x + size.width, position.y + size.height));
                    (Some(*size), None, style.opacity, handle)
                }
            };

            PreviewMarker {
                id: annotation.id,
                kind: annotation.kind(),
                left: position.x,
                top: position.y,
                size,
                text,
                color: annotation.color().to_css(),
                opacity,
                z_index: if selected { Z_INDEX_SELECTED } else { Z_INDEX_DEFAULT },
                selected,
                resize_handle,
            }
        })
        .collect()
}
