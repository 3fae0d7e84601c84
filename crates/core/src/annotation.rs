//! Overlay annotation model and store
//!
//! Annotations are positioned in preview space: pixels from the top-left of
//! the displayed page image. Each annotation carries the [`ViewportSnapshot`]
//! its coordinates refer to, which is what export projects from.

use crate::font_catalog::FontId;
use crate::viewport::{rebase_factors, ViewportSnapshot};
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation
///
/// Generated using UUID v4, stable for the lifetime of the session.
pub type AnnotationId = uuid::Uuid;

/// Position in preview pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Point at `(x, y)` preview pixels.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Offset by `other - origin`
    pub fn translated(self, origin: Point, other: Point) -> Point {
        Point::new(self.x + (other.x - origin.x), self.y + (other.y - origin.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    /// Size in preview pixels; limits are applied by the store, not here.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Normalized RGB color
///
/// Channels are always within `[0.0, 1.0]`; construction clamps and maps NaN
/// to `0.0`. Serialized as an `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Rgb {
    r: f32,
    g: f32,
    b: f32,
}

fn clamp_channel(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };
    pub const RED: Rgb = Rgb { r: 0.8, g: 0.0, b: 0.0 };
    pub const BLUE: Rgb = Rgb { r: 0.0, g: 0.3, b: 0.8 };

    /// The swatches offered by the property panel
    pub const PRESETS: [Rgb; 4] = [Rgb::BLACK, Rgb::WHITE, Rgb::RED, Rgb::BLUE];

    /// Preset swatch `index`, if there is one.
    pub fn preset(index: usize) -> Option<Rgb> {
        Self::PRESETS.get(index).copied()
    }

    /// Clamps each channel to `[0.0, 1.0]`.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r: clamp_channel(r), g: clamp_channel(g), b: clamp_channel(b) }
    }

    pub fn r(&self) -> f32 {
        self.r
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    pub fn b(&self) -> f32 {
        self.b
    }

    fn bytes(&self) -> [u8; 3] {
        [self.r, self.g, self.b].map(|channel| (channel * 255.0).round() as u8)
    }

    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.bytes();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Parse `#rrggbb`, `rrggbb` or `#rgb`.
    pub fn from_hex(hex: &str) -> Option<Rgb> {
        let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f32::from(v) / 255.0);
        match digits.len() {
            6 => {
                let (r, g, b) = (&digits[0..2], &digits[2..4], &digits[4..6]);
                Some(Rgb::new(channel(r)?, channel(g)?, channel(b)?))
            }
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1].repeat(2));
                Some(Rgb::new(short(0)?, short(1)?, short(2)?))
            }
            _ => None,
        }
    }

    /// CSS `rgb(r, g, b)` with 0-255 channels
    pub fn to_css(&self) -> String {
        let [r, g, b] = self.bytes();
        format!("rgb({r}, {g}, {b})")
    }

    /// Color in the form the PDF engine draws with.
    pub fn to_engine(self) -> pdf_engine::RgbColor {
        pdf_engine::RgbColor::new(self.r, self.g, self.b)
    }
}

impl From<[f32; 3]> for Rgb {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Rgb::new(r, g, b)
    }
}

impl From<Rgb> for [f32; 3] {
    fn from(color: Rgb) -> Self {
        [color.r, color.g, color.b]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: FontId,
    /// Size in preview pixels
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub fill: Rgb,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Text,
    Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationContent {
    /// Auto-sized text; may be empty.
    Text { text: String, style: TextStyle },
    /// Filled rectangle whose top-left corner is the annotation position.
    Shape { size: Size, style: ShapeStyle },
}

impl AnnotationContent {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationContent::Text { .. } => AnnotationKind::Text,
            AnnotationContent::Shape { .. } => AnnotationKind::Shape,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// 1-based page number
    pub page: u32,
    pub position: Point,
    /// Viewport the position and sizes are expressed in
    pub viewport: ViewportSnapshot,
    pub content: AnnotationContent,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        self.content.kind()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            AnnotationContent::Text { text, .. } => Some(text),
            AnnotationContent::Shape { .. } => None,
        }
    }

    /// Style of a text annotation
    pub fn text_style(&self) -> Option<&TextStyle> {
        match &self.content {
            AnnotationContent::Text { style, .. } => Some(style),
            AnnotationContent::Shape { .. } => None,
        }
    }

    /// Size of a shape annotation
    pub fn shape_size(&self) -> Option<Size> {
        match &self.content {
            AnnotationContent::Shape { size, .. } => Some(*size),
            AnnotationContent::Text { .. } => None,
        }
    }

    /// Text color or shape fill
    pub fn color(&self) -> Rgb {
        match &self.content {
            AnnotationContent::Text { style, .. } => style.color,
            AnnotationContent::Shape { style, .. } => style.fill,
        }
    }
}

/// Partial update for [`AnnotationStore::update`]
///
/// Fields that do not apply to the target's kind are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub position: Option<Point>,
    pub text: Option<String>,
    pub font: Option<FontId>,
    pub font_size: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color: Option<Rgb>,
    pub size: Option<Size>,
    pub opacity: Option<f32>,
}

impl AnnotationPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn font(mut self, font: FontId) -> Self {
        self.font = Some(font);
        self
    }

    pub fn font_size(mut self, font_size: f32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }
}

/// Bounds applied to every write into the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreLimits {
    /// Smallest shape width/height in preview pixels
    pub min_shape_size: f32,
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Replaces a NaN font size
    pub default_font_size: f32,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            min_shape_size: 20.0,
            min_font_size: 8.0,
            max_font_size: 72.0,
            default_font_size: 16.0,
        }
    }
}

impl StoreLimits {
    /// Clamp into the font range; NaN becomes the default size.
    pub fn clamp_font_size(&self, size: f32) -> f32 {
        if size.is_nan() {
            self.default_font_size.clamp(self.min_font_size, self.max_font_size)
        } else {
            size.clamp(self.min_font_size, self.max_font_size)
        }
    }

    /// Raise a width or height to the shape minimum; NaN becomes the minimum.
    pub fn floor_dimension(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min_shape_size
        } else {
            value.max(self.min_shape_size)
        }
    }

    /// Raise both dimensions to the shape size floor.
    pub fn floor_size(&self, size: Size) -> Size {
        Size::new(self.floor_dimension(size.width), self.floor_dimension(size.height))
    }

    fn sanitize(&self, content: &mut AnnotationContent) {
        match content {
            AnnotationContent::Text { style, .. } => {
                style.font_size = self.clamp_font_size(style.font_size);
            }
            AnnotationContent::Shape { size, style } => {
                *size = self.floor_size(*size);
                style.opacity = clamp_opacity(style.opacity);
            }
        }
    }
}

/// Clamp to `0.0..=1.0`, treating NaN as opaque.
pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("invalid page number {0}")]
    InvalidPage(u32),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordered annotations plus the single selection pointer
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    selected: Option<AnnotationId>,
    limits: StoreLimits,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store enforcing `limits` on every write.
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self { limits, ..Self::default() }
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    /// Append a new annotation and select it.
    pub fn create(
        &mut self,
        page: u32,
        position: Point,
        viewport: ViewportSnapshot,
        mut content: AnnotationContent,
    ) -> StoreResult<AnnotationId> {
        if page == 0 {
            return Err(StoreError::InvalidPage(page));
        }
        self.limits.sanitize(&mut content);

        let id = AnnotationId::new_v4();
        tracing::debug!(%id, page, kind = ?content.kind(), "annotation created");
        self.annotations.push(Annotation { id, page, position, viewport, content });
        self.selected = Some(id);
        Ok(id)
    }

    /// Apply `patch` to an annotation, clamping sizes, font size and opacity.
    pub fn update(&mut self, id: AnnotationId, patch: &AnnotationPatch) -> StoreResult<()> {
        let limits = self.limits;
        let annotation = self.get_mut(id)?;

        if let Some(position) = patch.position {
            annotation.position = position;
        }

        match &mut annotation.content {
            AnnotationContent::Text { text, style } => {
                if let Some(new_text) = &patch.text {
                    text.clone_from(new_text);
                }
                if let Some(font) = &patch.font {
                    style.font = font.clone();
                }
                if let Some(size) = patch.font_size {
                    style.font_size = limits.clamp_font_size(size);
                }
                if let Some(bold) = patch.bold {
                    style.bold = bold;
                }
                if let Some(italic) = patch.italic {
                    style.italic = italic;
                }
                if let Some(color) = patch.color {
                    style.color = color;
                }
            }
            AnnotationContent::Shape { size, style } => {
                if let Some(new_size) = patch.size {
                    *size = limits.floor_size(new_size);
                }
                if let Some(color) = patch.color {
                    style.fill = color;
                }
                if let Some(opacity) = patch.opacity {
                    style.opacity = clamp_opacity(opacity);
                }
            }
        }

        Ok(())
    }

    /// Remove an annotation. Removing the selected one clears the selection.
    pub fn remove(&mut self, id: AnnotationId) -> StoreResult<Annotation> {
        let index = self
            .annotations
            .iter()
            .position(|annotation| annotation.id == id)
            .ok_or_else(|| not_found(id))?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        tracing::debug!(%id, "annotation removed");
        Ok(self.annotations.remove(index))
    }

    /// Select an annotation, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<AnnotationId>) -> StoreResult<()> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(not_found(id));
            }
        }
        self.selected = id;
        Ok(())
    }

    /// Annotations on a 1-based page, in insertion order
    pub fn list_for_page(&self, page: u32) -> Vec<&Annotation> {
        self.annotations.iter().filter(|annotation| annotation.page == page).collect()
    }

    /// Annotations on a page bottom to top: insertion order with the
    /// selected annotation last.
    pub fn render_order(&self, page: u32) -> Vec<&Annotation> {
        let mut ordered = self.list_for_page(page);
        if let Some(selected) = self.selected {
            if let Some(index) = ordered.iter().position(|annotation| annotation.id == selected) {
                let annotation = ordered.remove(index);
                ordered.push(annotation);
            }
        }
        ordered
    }

    /// Drop every annotation and the selection.
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.selected = None;
    }

    /// Annotation `id`, if it exists
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    fn get_mut(&mut self, id: AnnotationId) -> StoreResult<&mut Annotation> {
        match self.annotations.iter_mut().find(|annotation| annotation.id == id) {
            Some(annotation) => Ok(annotation),
            None => Err(not_found(id)),
        }
    }

    pub fn selected_id(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Annotation> {
        self.selected.and_then(|id| self.get(id))
    }

    /// All annotations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Move every annotation into the viewport `target` returns for its page.
    ///
    /// Positions, shape sizes and font sizes scale with the viewport. The
    /// scaled sizes still pass through the store limits, so shrinking below
    /// the shape floor or the font minimum stops at that bound. Annotations
    /// whose page has no target keep their snapshot.
    pub fn rebase_viewports<F>(&mut self, target: F)
    where
        F: Fn(u32) -> Option<ViewportSnapshot>,
    {
        let limits = self.limits;
        for annotation in &mut self.annotations {
            let Some(to) = target(annotation.page) else {
                continue;
            };
            let (fx, fy) = rebase_factors(annotation.viewport, to);
            annotation.position =
                Point::new(annotation.position.x * fx, annotation.position.y * fy);
            match &mut annotation.content {
                AnnotationContent::Text { style, .. } => {
                    style.font_size = limits.clamp_font_size(style.font_size * fx);
                }
                AnnotationContent::Shape { size, .. } => {
                    *size = limits.floor_size(Size::new(size.width * fx, size.height * fy));
                }
            }
            annotation.viewport = to;
        }
    }
}

fn not_found(id: AnnotationId) -> StoreError {
    tracing::warn!(%id, "annotation not found");
    StoreError::NotFound(id)
}
