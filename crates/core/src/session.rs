//! Editor session
//!
//! [`EditorSession`] owns the loaded document, the viewport geometry, the
//! current page, the annotation store and the interaction controller. It is
//! the only place that replaces the document or recomputes geometry.

use crate::action_log::{ActionEvent, ActionLog, TracingActionLog, UserAction};
use crate::annotation::{
    AnnotationContent, AnnotationId, AnnotationStore, Point, ShapeStyle, StoreError, TextStyle,
};
use crate::config::{ConfigError, EditorConfig};
use crate::download::{DownloadError, DownloadSink};
use crate::font_catalog::{CatalogError, FontCatalog};
use crate::font_fetch::{FontFetcher, HttpFontFetcher};
use crate::manipulation::{GestureSession, InteractionController, InteractionError, PropertyEdit};
use crate::pdf_export::{ExportError, ExportProjector, ExportStats};
use crate::preview::{preview_markers, PreviewMarker};
use crate::viewport::{ViewportGeometry, ViewportSnapshot};
use pdf_engine::{EditableDocument, LopdfCodec, PageSize, PdfCodec, PdfEngineError};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("failed to load PDF: {0}")]
    LoadFailure(#[source] PdfEngineError),
    #[error("invalid viewport width: {0}")]
    InvalidViewport(f32),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to deliver export: {0}")]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// The loaded PDF. Bytes are shared and never modified.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    bytes: Arc<[u8]>,
    page_sizes: Vec<PageSize>,
}

impl DocumentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }
}

/// Allows one export at a time. Clones share the same gate.
#[derive(Debug, Clone, Default)]
pub struct ExportGate {
    busy: Arc<AtomicBool>,
}

impl ExportGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another ticket is alive.
    pub fn try_acquire(&self) -> Option<ExportTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExportTicket { busy: Arc::clone(&self.busy) })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of an export; dropping it reopens the gate.
#[derive(Debug)]
pub struct ExportTicket {
    busy: Arc<AtomicBool>,
}

impl Drop for ExportTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Summary of a delivered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub file_name: String,
    pub size: usize,
    pub stats: ExportStats,
}

pub struct EditorSession<C: PdfCodec = LopdfCodec> {
    config: EditorConfig,
    codec: C,
    catalog: Arc<FontCatalog>,
    fetcher: Box<dyn FontFetcher>,
    action_log: Arc<dyn ActionLog>,
    store: AnnotationStore,
    controller: InteractionController,
    document: Option<DocumentHandle>,
    geometry: Option<ViewportGeometry>,
    render_width: f32,
    page: u32,
    export_gate: ExportGate,
}

impl EditorSession<LopdfCodec> {
    /// Session with the lopdf codec and the built-in font catalog.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_codec(config, LopdfCodec::new())
    }

    /// Validates `config` and loads its font catalog file, if one is set.
    pub fn from_config(config: EditorConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let catalog = match &config.font_catalog_path {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(ConfigError::Io)?;
                FontCatalog::from_json(&json)?
            }
            None => FontCatalog::builtin(),
        };
        Ok(Self::new(config).with_catalog(Arc::new(catalog)))
    }
}

impl<C: PdfCodec> EditorSession<C> {
    /// Session loading and saving documents through `codec`.
    pub fn with_codec(config: EditorConfig, codec: C) -> Self {
        let fetcher = HttpFontFetcher::new(config.font_fetch_timeout());
        Self {
            store: AnnotationStore::with_limits(config.store_limits()),
            controller: InteractionController::new(config.resize_handle_radius),
            render_width: config.default_viewport_width,
            codec,
            catalog: Arc::new(FontCatalog::builtin()),
            fetcher: Box::new(fetcher),
            action_log: Arc::new(TracingActionLog),
            document: None,
            geometry: None,
            page: 1,
            export_gate: ExportGate::new(),
            config,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<FontCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the HTTP font fetcher.
    pub fn with_fetcher<F: FontFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn with_action_log(mut self, action_log: Arc<dyn ActionLog>) -> Self {
        self.action_log = action_log;
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FontCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    pub fn geometry(&self) -> Option<&ViewportGeometry> {
        self.geometry.as_ref()
    }

    pub fn export_gate(&self) -> &ExportGate {
        &self.export_gate
    }

    pub fn render_width(&self) -> f32 {
        self.render_width
    }

    /// Current 1-based page
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, DocumentHandle::page_count)
    }

    /// Parse `bytes` and make them the current document.
    ///
    /// Annotations, selection and any gesture are discarded and the view
    /// returns to page 1. On failure the previous document stays loaded.
    pub fn load_document(
        &mut self,
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<u32, SessionError> {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();

        let page_sizes = match self.codec.load(&bytes) {
            Ok(document) => document.page_sizes().to_vec(),
            Err(err) => {
                tracing::warn!(file = %name, error = %err, "failed to load PDF");
                return Err(SessionError::LoadFailure(err));
            }
        };
        let page_count = page_sizes.len() as u32;

        self.store.clear();
        self.controller.reset();
        self.page = 1;
        self.geometry = Some(ViewportGeometry::new(
            self.render_width,
            page_sizes.clone(),
            self.config.height_normalization,
        ));
        tracing::info!(file = %name, pages = page_count, bytes = bytes.len(), "document loaded");
        self.document = Some(DocumentHandle { name, bytes, page_sizes });

        self.record(UserAction::DocumentLoaded);
        Ok(page_count)
    }

    /// Drop the document together with its annotations.
    pub fn close_document(&mut self) {
        if self.document.is_none() {
            return;
        }
        self.record(UserAction::DocumentClosed);
        self.store.clear();
        self.controller.reset();
        self.document = None;
        self.geometry = None;
        self.page = 1;
        tracing::debug!("document closed");
    }

    /// Record a new preview render width and move every annotation into it.
    pub fn resize_viewport(&mut self, width: f32) -> Result<(), SessionError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(SessionError::InvalidViewport(width));
        }
        if width == self.render_width {
            return Ok(());
        }
        self.render_width = width;

        if let Some(geometry) = self.geometry.take() {
            let geometry = geometry.with_render_width(width);
            self.store.rebase_viewports(|page| geometry.snapshot_for_page(page));
            self.geometry = Some(geometry);
        }
        tracing::debug!(width, "viewport resized");
        Ok(())
    }

    /// Go to `page`, clamped to the document. Returns the page now shown.
    pub fn set_page(&mut self, page: u32) -> u32 {
        let count = self.page_count();
        self.page = if count == 0 { 1 } else { page.clamp(1, count) };
        self.page
    }

    /// Advance one page, stopping at the last.
    pub fn next_page(&mut self) -> u32 {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.set_page(self.page.saturating_sub(1))
    }

    /// Viewport snapshot of the current page
    pub fn current_snapshot(&self) -> Option<ViewportSnapshot> {
        self.geometry.as_ref()?.snapshot_for_page(self.page)
    }

    /// Add a text annotation with the configured defaults to the current page.
    pub fn add_text(&mut self) -> Result<AnnotationId, SessionError> {
        let snapshot = self.current_snapshot().ok_or(SessionError::NoDocument)?;
        let defaults = &self.config.text_defaults;
        let font = defaults.font.clone().unwrap_or_else(|| self.catalog.default_id().clone());

        let content = AnnotationContent::Text {
            text: defaults.text.clone(),
            style: TextStyle {
                font,
                font_size: defaults.font_size,
                bold: false,
                italic: false,
                color: defaults.color,
            },
        };
        let id = self.store.create(self.page, defaults.position, snapshot, content)?;
        self.record(UserAction::TextAdded);
        Ok(id)
    }

    /// Add a shape annotation with the configured defaults to the current page.
    pub fn add_shape(&mut self) -> Result<AnnotationId, SessionError> {
        let snapshot = self.current_snapshot().ok_or(SessionError::NoDocument)?;
        let defaults = &self.config.shape_defaults;

        let content = AnnotationContent::Shape {
            size: defaults.size,
            style: ShapeStyle { fill: defaults.color, opacity: defaults.opacity },
        };
        let id = self.store.create(self.page, defaults.position, snapshot, content)?;
        self.record(UserAction::ShapeAdded);
        Ok(id)
    }

    /// Remove the selected annotation, if any.
    pub fn remove_selected(&mut self) -> Result<Option<AnnotationId>, SessionError> {
        match self.store.selected_id() {
            Some(id) => self.remove(id).map(|()| Some(id)),
            None => Ok(None),
        }
    }

    /// Remove `id`, ending any gesture on it.
    pub fn remove(&mut self, id: AnnotationId) -> Result<(), SessionError> {
        self.store.remove(id)?;
        self.controller.forget(id);
        self.record(UserAction::AnnotationRemoved);
        Ok(())
    }

    pub fn select(&mut self, id: Option<AnnotationId>) -> Result<(), SessionError> {
        self.store.select(id)?;
        Ok(())
    }

    /// Select `id` and start moving it.
    pub fn pointer_down(&mut self, id: AnnotationId, pointer: Point) -> Result<(), SessionError> {
        self.controller.pointer_down_on_element(&mut self.store, id, pointer)?;
        Ok(())
    }

    /// Start resizing shape `id` from its corner handle.
    pub fn pointer_down_on_resize_handle(
        &mut self,
        id: AnnotationId,
        pointer: Point,
    ) -> Result<(), SessionError> {
        self.controller.pointer_down_on_resize_handle(&mut self.store, id, pointer)?;
        Ok(())
    }

    pub fn resize_handle_hit(&self, id: AnnotationId, pointer: Point) -> bool {
        self.controller.resize_handle_hit(&self.store, id, pointer)
    }

    /// Returns `false` when no gesture is active.
    pub fn pointer_move(&mut self, pointer: Point) -> Result<bool, SessionError> {
        Ok(self.controller.pointer_move(&mut self.store, pointer)?)
    }

    pub fn pointer_up(&mut self) -> Option<GestureSession> {
        self.controller.pointer_up()
    }

    pub fn pointer_cancel(&mut self) -> Option<GestureSession> {
        self.controller.pointer_cancel()
    }

    pub fn pointer_leave(&mut self) -> Option<GestureSession> {
        self.controller.pointer_leave()
    }

    /// Apply a property-panel edit to the selection. `Ok(false)` when nothing
    /// is selected or the edit was ignored.
    pub fn edit_selected(&mut self, edit: PropertyEdit) -> Result<bool, SessionError> {
        match self.store.selected_id() {
            Some(id) => self.edit(id, edit),
            None => Ok(false),
        }
    }

    /// Apply a property-panel edit to `id`.
    pub fn edit(&mut self, id: AnnotationId, edit: PropertyEdit) -> Result<bool, SessionError> {
        Ok(self.controller.apply_edit(&mut self.store, &self.catalog, id, edit)?)
    }

    /// Overlay markers for the current page
    pub fn preview_markers(&self) -> Vec<PreviewMarker> {
        if self.document.is_none() {
            return Vec::new();
        }
        preview_markers(&self.store, self.page, &self.catalog)
    }

    /// Burn every annotation into a copy of the document and hand it to `sink`.
    ///
    /// The sink is only called when the export succeeded.
    pub fn export(&self, sink: &mut dyn DownloadSink) -> Result<ExportReport, SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let _ticket = self.export_gate.try_acquire().ok_or(ExportError::ExportInFlight)?;

        self.record(UserAction::ExportStarted);
        let projector =
            ExportProjector::new(&self.codec, &self.catalog, &*self.fetcher, &self.config.export);

        let result = projector.export(document.name(), document.bytes(), self.store.iter());
        let exported = match result {
            Ok(exported) => exported,
            Err(err) => {
                tracing::warn!(file = %document.name(), error = %err, "export failed");
                let details = serde_json::json!({ "error": err.to_string() });
                self.record_with(UserAction::ExportFailed, details);
                return Err(err.into());
            }
        };

        if let Err(err) = sink.deliver(&exported.file_name, &exported.bytes) {
            let details = serde_json::json!({ "error": err.to_string() });
            self.record_with(UserAction::ExportFailed, details);
            return Err(err.into());
        }

        self.record_with(
            UserAction::ExportFinished,
            serde_json::json!({
                "outputName": exported.file_name,
                "bytes": exported.bytes.len(),
                "fallbacks": exported.stats.fallbacks.len(),
            }),
        );
        Ok(ExportReport {
            size: exported.bytes.len(),
            file_name: exported.file_name,
            stats: exported.stats,
        })
    }

    fn record(&self, action: UserAction) {
        self.record_with(action, serde_json::json!({}));
    }

    fn record_with(&self, action: UserAction, details: serde_json::Value) {
        let file_name = self.document.as_ref().map(DocumentHandle::name);
        let event = ActionEvent::new(action, file_name, self.store.len()).with_details(details);
        self.action_log.record(event);
    }
}
