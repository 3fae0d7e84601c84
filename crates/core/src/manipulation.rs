//! Pointer gestures and property edits
//!
//! The controller turns pointer events and property-panel input into store
//! mutations. At most one gesture (move or resize) is active; it lives in a
//! [`GestureSession`] from pointer-down until pointer-up, cancel or leave.

use crate::annotation::{
    AnnotationId, AnnotationKind, AnnotationPatch, AnnotationStore, Point, Rgb, Size, StoreError,
};
use crate::font_catalog::{FontCatalog, FontId};

/// Type of gesture in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Drag the whole annotation
    Move,
    /// Drag the bottom-right corner of a shape
    Resize,
}

/// Values captured at pointer-down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureStart {
    pub pointer: Point,
    pub position: Point,
    /// Shape size at the start of a resize
    pub size: Option<Size>,
}

/// The active gesture: its target, kind and starting values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSession {
    pub annotation: AnnotationId,
    pub kind: GestureKind,
    pub start: GestureStart,
}

impl GestureSession {
    /// Patch for the annotation with the pointer at `pointer`.
    ///
    /// The store applies the size floor.
    fn patch_for(&self, pointer: Point) -> AnnotationPatch {
        match self.kind {
            GestureKind::Move => {
                let position = self.start.position.translated(self.start.pointer, pointer);
                AnnotationPatch::new().position(position)
            }
            GestureKind::Resize => {
                let start = self.start.size.unwrap_or(Size::new(0.0, 0.0));
                AnnotationPatch::new().size(Size::new(
                    start.width + (pointer.x - self.start.pointer.x),
                    start.height + (pointer.y - self.start.pointer.y),
                ))
            }
        }
    }
}

/// Why a gesture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEnd {
    Released,
    Cancelled,
    PointerLeft,
    /// A new pointer-down arrived before the previous gesture ended
    Superseded,
    /// The target annotation went away
    TargetRemoved,
}

/// A single property-panel input change
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEdit {
    Text(String),
    FontFamily(FontId),
    FontSize(f32),
    Bold(bool),
    ToggleBold,
    Italic(bool),
    ToggleItalic,
    Color(Rgb),
    /// Swatch index into [`Rgb::PRESETS`]
    Preset(usize),
    /// `#rrggbb` from a color input
    ColorHex(String),
    Opacity(f32),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InteractionError {
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("annotation {0} cannot be resized")]
    NotResizable(AnnotationId),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for InteractionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => InteractionError::NotFound(id),
            other => InteractionError::Store(other),
        }
    }
}

pub type InteractionResult<T> = Result<T, InteractionError>;

/// Tracks the active gesture and applies pointer and property input
#[derive(Debug, Clone)]
pub struct InteractionController {
    gesture: Option<GestureSession>,
    handle_radius: f32,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl InteractionController {
    /// Controller whose resize handle reacts within `handle_radius` pixels.
    pub fn new(handle_radius: f32) -> Self {
        Self { gesture: None, handle_radius }
    }

    pub fn gesture(&self) -> Option<&GestureSession> {
        self.gesture.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Select the annotation and start moving it.
    pub fn pointer_down_on_element(
        &mut self,
        store: &mut AnnotationStore,
        id: AnnotationId,
        pointer: Point,
    ) -> InteractionResult<()> {
        self.finish_stale();

        let position = store.get(id).ok_or(InteractionError::NotFound(id))?.position;
        store.select(Some(id))?;

        self.begin(GestureSession {
            annotation: id,
            kind: GestureKind::Move,
            start: GestureStart { pointer, position, size: None },
        });
        Ok(())
    }

    /// Start resizing a shape from its bottom-right handle.
    pub fn pointer_down_on_resize_handle(
        &mut self,
        store: &mut AnnotationStore,
        id: AnnotationId,
        pointer: Point,
    ) -> InteractionResult<()> {
        self.finish_stale();

        let annotation = store.get(id).ok_or(InteractionError::NotFound(id))?;
        let Some(size) = annotation.shape_size() else {
            return Err(InteractionError::NotResizable(id));
        };
        let position = annotation.position;
        store.select(Some(id))?;

        self.begin(GestureSession {
            annotation: id,
            kind: GestureKind::Resize,
            start: GestureStart { pointer, position, size: Some(size) },
        });
        Ok(())
    }

    /// Apply the active gesture for a pointer at `pointer`.
    ///
    /// Returns `false` when no gesture is active. If the target disappeared
    /// the gesture ends and `NotFound` is returned.
    pub fn pointer_move(
        &mut self,
        store: &mut AnnotationStore,
        pointer: Point,
    ) -> InteractionResult<bool> {
        let Some(session) = self.gesture else {
            return Ok(false);
        };

        match store.update(session.annotation, &session.patch_for(pointer)) {
            Ok(()) => Ok(true),
            Err(err) => {
                self.end(GestureEnd::TargetRemoved);
                Err(err.into())
            }
        }
    }

    /// End the gesture, returning it if one was active.
    pub fn pointer_up(&mut self) -> Option<GestureSession> {
        self.end(GestureEnd::Released)
    }

    /// The last applied state is kept.
    pub fn pointer_cancel(&mut self) -> Option<GestureSession> {
        self.end(GestureEnd::Cancelled)
    }

    /// End the gesture when the pointer leaves the preview.
    pub fn pointer_leave(&mut self) -> Option<GestureSession> {
        self.end(GestureEnd::PointerLeft)
    }

    /// End the gesture if it targets `id`.
    pub fn forget(&mut self, id: AnnotationId) {
        if self.gesture.is_some_and(|session| session.annotation == id) {
            self.end(GestureEnd::TargetRemoved);
        }
    }

    /// Drop any gesture without logging, used when the document changes.
    pub fn reset(&mut self) {
        self.gesture = None;
    }

    /// Whether `pointer` is on the resize handle of shape `id`.
    pub fn resize_handle_hit(
        &self,
        store: &AnnotationStore,
        id: AnnotationId,
        pointer: Point,
    ) -> bool {
        let Some(annotation) = store.get(id) else {
            return false;
        };
        let Some(size) = annotation.shape_size() else {
            return false;
        };
        let dx = pointer.x - (annotation.position.x + size.width);
        let dy = pointer.y - (annotation.position.y + size.height);
        (dx * dx + dy * dy).sqrt() <= self.handle_radius
    }

    /// Apply a property-panel edit to `id`.
    ///
    /// Malformed input (bad hex, unknown font) leaves the field unchanged and
    /// returns `Ok(false)`. Edits that do not apply to the annotation's kind
    /// are ignored.
    pub fn apply_edit(
        &self,
        store: &mut AnnotationStore,
        catalog: &FontCatalog,
        id: AnnotationId,
        edit: PropertyEdit,
    ) -> InteractionResult<bool> {
        let annotation = store.get(id).ok_or(InteractionError::NotFound(id))?;
        let style = annotation.text_style();

        let patch = match edit {
            PropertyEdit::Text(text) => AnnotationPatch::new().text(text),
            PropertyEdit::FontFamily(font) => {
                if !catalog.contains(&font) {
                    tracing::debug!(%font, "ignoring unknown font");
                    return Ok(false);
                }
                AnnotationPatch::new().font(font)
            }
            PropertyEdit::FontSize(size) => AnnotationPatch::new().font_size(size),
            PropertyEdit::Bold(bold) => AnnotationPatch::new().bold(bold),
            PropertyEdit::ToggleBold => match style {
                Some(style) => AnnotationPatch::new().bold(!style.bold),
                None => return Ok(false),
            },
            PropertyEdit::Italic(italic) => AnnotationPatch::new().italic(italic),
            PropertyEdit::ToggleItalic => match style {
                Some(style) => AnnotationPatch::new().italic(!style.italic),
                None => return Ok(false),
            },
            PropertyEdit::Color(color) => AnnotationPatch::new().color(color),
            PropertyEdit::Preset(index) => match Rgb::preset(index) {
                Some(color) => AnnotationPatch::new().color(color),
                None => {
                    tracing::debug!(index, "ignoring unknown color preset");
                    return Ok(false);
                }
            },
            PropertyEdit::ColorHex(hex) => match Rgb::from_hex(&hex) {
                Some(color) => AnnotationPatch::new().color(color),
                None => {
                    tracing::debug!(%hex, "ignoring malformed color");
                    return Ok(false);
                }
            },
            PropertyEdit::Opacity(opacity) => {
                if annotation.kind() != AnnotationKind::Shape {
                    return Ok(false);
                }
                AnnotationPatch::new().opacity(opacity)
            }
        };

        store.update(id, &patch)?;
        Ok(true)
    }

    fn begin(&mut self, session: GestureSession) {
        tracing::debug!(annotation = %session.annotation, kind = ?session.kind, "gesture started");
        self.gesture = Some(session);
    }

    fn finish_stale(&mut self) {
        if self.gesture.is_some() {
            tracing::warn!("pointer down during an active gesture, finishing the previous one");
            self.end(GestureEnd::Superseded);
        }
    }

    fn end(&mut self, reason: GestureEnd) -> Option<GestureSession> {
        let session = self.gesture.take()?;
        tracing::debug!(
            annotation = %session.annotation,
            kind = ?session.kind,
            ?reason,
            "gesture ended"
        );
        Some(session)
    }
}
