//! PDF Overlay Core Library
//!
//! Annotation state, pointer interaction and export pipeline for placing text
//! and shape overlays on a PDF preview and burning them into the document.

pub mod action_log;
pub mod annotation;
pub mod config;
pub mod download;
pub mod font_catalog;
pub mod font_fetch;
pub mod manipulation;
pub mod pdf_export;
pub mod preview;
pub mod session;
pub mod viewport;

pub use action_log::{
    ActionEvent, ActionLog, MemoryActionLog, NoopActionLog, TracingActionLog, UserAction,
};
pub use annotation::{
    Annotation, AnnotationContent, AnnotationId, AnnotationKind, AnnotationPatch, AnnotationStore,
    Point, Rgb, ShapeStyle, Size, StoreError, StoreLimits, TextStyle,
};
pub use config::{ConfigError, EditorConfig, ShapeDefaults, TextDefaults};
pub use download::{DirectorySink, DownloadError, DownloadSink};
pub use font_catalog::{
    CatalogError, FontCatalog, FontEntry, FontFaces, FontId, FontLocation, FontSource,
    StandardFamily,
};
pub use font_fetch::{FontFetchError, FontFetcher, HttpFontFetcher};
pub use manipulation::{
    GestureKind, GestureSession, GestureStart, InteractionController, InteractionError,
    PropertyEdit,
};
pub use pdf_export::{
    ExportError, ExportOptions, ExportProjector, ExportResult, ExportStats, ExportedPdf,
    FontFallback,
};
pub use preview::{preview_markers, PreviewMarker, TextMarker};
pub use session::{
    DocumentHandle, EditorSession, ExportGate, ExportReport, ExportTicket, SessionError,
};
pub use viewport::{HeightNormalization, ViewportGeometry, ViewportSnapshot};
