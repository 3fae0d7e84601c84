//! Burning overlay annotations into a PDF
//!
//! Annotations are stored in preview pixels relative to the viewport snapshot
//! they were placed in. Export maps them into the PDF user space of their
//! page and draws them through a [`PdfCodec`]:
//!
//! - `sx = page_width / viewport.width`, `sy = page_height / viewport.height`
//! - `pdf_x = x * sx`, top edge `pdf_y = page_height - y * sy`
//! - text baseline sits `font_size * sx` below the top edge
//! - shapes span `width * sx` by `height * sy` downward from the top edge

use crate::annotation::{Annotation, AnnotationContent, Point, Size};
use crate::font_catalog::{FaceKey, FaceProgram, FontCatalog, FontId, ResolvedFace, StandardFamily};
use crate::font_fetch::FontFetcher;
use crate::viewport::{project_point, ViewportSnapshot};
use pdf_engine::{
    EditableDocument, FontProgram, FontResource, PageSize, PdfCodec, PdfEngineError, RectFill,
    StandardFont, TextRun,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do when an external font cannot be fetched or embedded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFallback {
    /// Fail the export with [`ExportError::EmbedFailure`].
    #[default]
    Abort,
    /// Use Helvetica in the requested weight and style.
    Standard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Prepended to the original file name
    pub file_prefix: String,
    pub font_fallback: FontFallback,
    /// Line advance as a multiple of the drawn font size
    pub line_height: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            file_prefix: "edited_".to_owned(),
            font_fallback: FontFallback::Abort,
            line_height: 1.2,
        }
    }
}

/// Error types for PDF export operations
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to load the original PDF: {0}")]
    LoadFailure(#[source] PdfEngineError),
    #[error("failed to embed font {font}: {reason}")]
    EmbedFailure { font: String, reason: String },
    #[error("annotation page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("failed to draw annotation: {0}")]
    Draw(#[source] PdfEngineError),
    #[error("failed to save the PDF: {0}")]
    Save(#[source] PdfEngineError),
    #[error("an export is already running")]
    ExportInFlight,
}

/// Result type for PDF export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// A font that was replaced by a standard face during export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFallbackRecord {
    pub font: FontId,
    pub reason: String,
}

/// Counters collected while drawing one export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub texts_drawn: usize,
    pub shapes_drawn: usize,
    /// Text annotations skipped because their text is empty
    pub empty_texts: usize,
    pub fonts_embedded: usize,
    pub fonts_fetched: usize,
    pub fallbacks: Vec<FontFallbackRecord>,
    /// Characters drawn as a replacement because their font has no glyph
    /// for them
    pub missing_glyphs: usize,
}

/// A serialized PDF with the overlays burned in
#[derive(Debug, Clone)]
pub struct ExportedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub stats: ExportStats,
}

/// Text placement in PDF space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedText {
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
}

/// Rectangle in PDF space, `(x, y)` is the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Baseline origin and drawn size of a text placed at `position`.
pub fn project_text(
    position: Point,
    font_size: f32,
    viewport: ViewportSnapshot,
    page: PageSize,
) -> ProjectedText {
    let top = project_point(position.x, position.y, viewport, page);
    let size = font_size * viewport.scale_x(page);
    ProjectedText { x: top.x, baseline: top.y - size, size }
}

/// PDF rectangle covered by a shape whose top-left corner is at `position`.
pub fn project_shape(
    position: Point,
    size: Size,
    viewport: ViewportSnapshot,
    page: PageSize,
) -> ProjectedRect {
    let top = project_point(position.x, position.y, viewport, page);
    let height = size.height * viewport.scale_y(page);
    ProjectedRect {
        x: top.x,
        y: top.y - height,
        width: size.width * viewport.scale_x(page),
        height,
    }
}

/// `<prefix><file name>`, dropping any directory part of `original`.
pub fn export_file_name(prefix: &str, original: &str) -> String {
    let base = original.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(original);
    let base = if base.is_empty() { "document.pdf" } else { base };
    format!("{prefix}{base}")
}

#[derive(Debug, Clone)]
struct EmbeddedFace {
    resource: FontResource,
    synthetic_bold: bool,
    synthetic_italic: bool,
}

#[derive(Debug, Clone)]
enum CachedFace {
    Embedded(FontResource),
    /// The face could not be embedded; Helvetica stands in for it.
    Fallback,
}

/// Fonts embedded during a single export, keyed by face
#[derive(Default)]
struct FontCache {
    faces: HashMap<FaceKey, CachedFace>,
    standard: HashMap<StandardFont, FontResource>,
}

impl FontCache {
    fn standard_resource<D: EditableDocument>(
        &mut self,
        document: &mut D,
        font: StandardFont,
        stats: &mut ExportStats,
    ) -> Result<FontResource, PdfEngineError> {
        if let Some(resource) = self.standard.get(&font) {
            return Ok(resource.clone());
        }
        let resource = document.embed_font(FontProgram::Standard(font))?;
        stats.fonts_embedded += 1;
        self.standard.insert(font, resource.clone());
        Ok(resource)
    }
}

/// Projects annotations into a copy of the original document.
pub struct ExportProjector<'a, C> {
    codec: &'a C,
    catalog: &'a FontCatalog,
    fetcher: &'a dyn FontFetcher,
    options: &'a ExportOptions,
}

impl<'a, C: PdfCodec> ExportProjector<'a, C> {
    /// Projector drawing with `codec`, resolving fonts through `catalog`.
    pub fn new(
        codec: &'a C,
        catalog: &'a FontCatalog,
        fetcher: &'a dyn FontFetcher,
        options: &'a ExportOptions,
    ) -> Self {
        Self { codec, catalog, fetcher, options }
    }

    /// Draw `annotations` (in order) into `original` and serialize the result.
    pub fn export<'s, I>(
        &self,
        name: &str,
        original: &[u8],
        annotations: I,
    ) -> ExportResult<ExportedPdf>
    where
        I: IntoIterator<Item = &'s Annotation>,
    {
        let mut document = self.codec.load(original).map_err(ExportError::LoadFailure)?;
        let page_sizes = document.page_sizes().to_vec();
        let page_count = page_sizes.len() as u32;

        let mut cache = FontCache::default();
        let mut stats = ExportStats::default();

        for annotation in annotations {
            let page_size = annotation
                .page
                .checked_sub(1)
                .and_then(|index| page_sizes.get(index as usize))
                .copied()
                .ok_or(ExportError::PageOutOfRange { page: annotation.page, page_count })?;
            let page_index = annotation.page - 1;

            match &annotation.content {
                AnnotationContent::Text { text, style } => {
                    if text.is_empty() {
                        stats.empty_texts += 1;
                        continue;
                    }
                    let face = self.catalog.resolve(&style.font, style.bold, style.italic);
                    let embedded = self.embed_face(&mut document, &mut cache, face, &mut stats)?;
                    let placed = project_text(
                        annotation.position,
                        style.font_size,
                        annotation.viewport,
                        page_size,
                    );

                    let drawn = document
                        .draw_text(page_index, &TextRun {
                            text,
                            x: placed.x,
                            y: placed.baseline,
                            size: placed.size,
                            line_height: placed.size * self.options.line_height,
                            font: &embedded.resource,
                            color: style.color.to_engine(),
                            synthetic_bold: embedded.synthetic_bold,
                            synthetic_italic: embedded.synthetic_italic,
                        })
                        .map_err(ExportError::Draw)?;
                    if drawn.missing_glyphs > 0 {
                        tracing::warn!(
                            id = %annotation.id,
                            font = %embedded.resource.base_font,
                            missing = drawn.missing_glyphs,
                            "text drawn with replacement glyphs"
                        );
                    }
                    stats.missing_glyphs += drawn.missing_glyphs;
                    stats.texts_drawn += 1;
                }
                AnnotationContent::Shape { size, style } => {
                    let rect =
                        project_shape(annotation.position, *size, annotation.viewport, page_size);
                    document
                        .draw_rectangle(page_index, &RectFill {
                            x: rect.x,
                            y: rect.y,
                            width: rect.width,
                            height: rect.height,
                            color: style.fill.to_engine(),
                            opacity: style.opacity,
                        })
                        .map_err(ExportError::Draw)?;
                    stats.shapes_drawn += 1;
                }
            }
        }

        let bytes = document.save().map_err(ExportError::Save)?;
        let file_name = export_file_name(&self.options.file_prefix, name);

        tracing::info!(
            file = %file_name,
            texts = stats.texts_drawn,
            shapes = stats.shapes_drawn,
            fonts = stats.fonts_embedded,
            missing_glyphs = stats.missing_glyphs,
            bytes = bytes.len(),
            "export finished"
        );

        Ok(ExportedPdf { file_name, bytes, stats })
    }

    fn embed_face<D: EditableDocument>(
        &self,
        document: &mut D,
        cache: &mut FontCache,
        face: ResolvedFace,
        stats: &mut ExportStats,
    ) -> ExportResult<EmbeddedFace> {
        let display_name = || {
            self.catalog
                .get(&face.key.font)
                .map(|entry| entry.display_name.clone())
                .unwrap_or_else(|| face.key.font.to_string())
        };
        let embed_failure = |e: PdfEngineError| ExportError::EmbedFailure {
            font: display_name(),
            reason: e.to_string(),
        };

        let known = cache.faces.get(&face.key).cloned();
        let cached = match (&face.program, known) {
            (_, Some(cached)) => cached,
            (FaceProgram::Standard(font), None) => {
                let resource =
                    cache.standard_resource(document, *font, stats).map_err(embed_failure)?;
                CachedFace::Embedded(resource)
            }
            (FaceProgram::External(location), None) => {
                stats.fonts_fetched += 1;
                let embedded = self
                    .fetcher
                    .fetch(location)
                    .map_err(|e| e.to_string())
                    .and_then(|data| {
                        document.embed_font(FontProgram::TrueType(data)).map_err(|e| e.to_string())
                    });

                let cached = match (embedded, self.options.font_fallback) {
                    (Ok(resource), _) => {
                        stats.fonts_embedded += 1;
                        CachedFace::Embedded(resource)
                    }
                    (Err(reason), FontFallback::Abort) => {
                        return Err(ExportError::EmbedFailure { font: display_name(), reason });
                    }
                    (Err(reason), FontFallback::Standard) => {
                        tracing::warn!(
                            font = %face.key.font,
                            %reason,
                            "font unavailable, using Helvetica"
                        );
                        stats
                            .fallbacks
                            .push(FontFallbackRecord { font: face.key.font.clone(), reason });
                        CachedFace::Fallback
                    }
                };
                cache.faces.insert(face.key.clone(), cached.clone());
                cached
            }
        };

        match cached {
            CachedFace::Embedded(resource) => Ok(EmbeddedFace {
                resource,
                synthetic_bold: face.synthetic_bold,
                synthetic_italic: face.synthetic_italic,
            }),
            CachedFace::Fallback => {
                let font = StandardFamily::Helvetica.face(face.bold(), face.italic());
                let resource =
                    cache.standard_resource(document, font, stats).map_err(embed_failure)?;
                Ok(EmbeddedFace { resource, synthetic_bold: false, synthetic_italic: false })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationStore, Rgb, ShapeStyle, TextStyle};
    use crate::font_catalog::{FontEntry, FontFaces, FontLocation};
    use crate::font_fetch::FontFetchError;
    use crate::test_support::{Recorded, RecordingCodec};
    use std::cell::Cell;

    const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn aspect_viewport() -> ViewportSnapshot {
        ViewportSnapshot::new(700.0, 700.0 * 792.0 / 612.0)
    }

    fn text_content(text: &str, font: &str, bold: bool, italic: bool) -> AnnotationContent {
        AnnotationContent::Text {
            text: text.to_owned(),
            style: TextStyle {
                font: FontId::new(font),
                font_size: 16.0,
                bold,
                italic,
                color: Rgb::RED,
            },
        }
    }

    /// Add a text annotation at (10, 10) on `page`.
    fn add_text(store: &mut AnnotationStore, page: u32, content: AnnotationContent) {
        store.create(page, Point::new(10.0, 10.0), aspect_viewport(), content).unwrap();
    }

    /// Serves fixed bytes, or fails, and counts calls.
    struct CountingFetcher {
        data: Option<Vec<u8>>,
        calls: Cell<usize>,
    }

    impl CountingFetcher {
        fn serving(data: &[u8]) -> Self {
            Self { data: Some(data.to_vec()), calls: Cell::new(0) }
        }

        fn failing() -> Self {
            Self { data: None, calls: Cell::new(0) }
        }
    }

    impl FontFetcher for CountingFetcher {
        fn fetch(&self, location: &FontLocation) -> Result<Vec<u8>, FontFetchError> {
            self.calls.set(self.calls.get() + 1);
            self.data.clone().ok_or_else(|| FontFetchError::Network {
                url: location.to_string(),
                reason: "offline".to_owned(),
            })
        }
    }

    fn external_catalog() -> FontCatalog {
        FontCatalog::builtin().with_entry(FontEntry::external(
            "inter",
            "Inter",
            "Inter, sans-serif",
            FontFaces::regular(FontLocation::Url("https://fonts.example/inter.ttf".into())),
        ))
    }

    fn run(
        store: &AnnotationStore,
        catalog: &FontCatalog,
        fetcher: &dyn FontFetcher,
        options: &ExportOptions,
    ) -> (ExportResult<ExportedPdf>, Recorded) {
        let codec = RecordingCodec::new(vec![LETTER, LETTER]);
        let projector = ExportProjector::new(&codec, catalog, fetcher, options);
        let result = projector.export("report.pdf", b"%PDF", store.iter());
        (result, codec.recorded())
    }

    /// Export with the builtin catalog, default options and no network.
    fn run_builtin(store: &AnnotationStore) -> (ExportResult<ExportedPdf>, Recorded) {
        let fetcher = CountingFetcher::failing();
        run(store, &FontCatalog::builtin(), &fetcher, &ExportOptions::default())
    }

    #[test]
    fn test_project_text_aspect_correct() {
        let placed = project_text(Point::new(100.0, 100.0), 16.0, aspect_viewport(), LETTER);
        assert!(approx(placed.x, 87.428_57));
        assert!(approx(placed.baseline, 690.582_9));
        assert!(approx(placed.size, 13.988_57));
    }

    #[test]
    fn test_project_text_fixed_height() {
        let viewport = ViewportSnapshot::new(700.0, 1000.0);
        let placed = project_text(Point::new(100.0, 100.0), 16.0, viewport, LETTER);
        assert!(approx(placed.x, 87.428_57));
        assert!(approx(placed.baseline, 698.811_4));
        assert!(approx(placed.size, 13.988_57));
    }

    #[test]
    fn test_project_shape() {
        let rect = project_shape(
            Point::new(150.0, 150.0),
            Size::new(100.0, 50.0),
            ViewportSnapshot::new(700.0, 1000.0),
            LETTER,
        );
        assert!(approx(rect.x, 131.142_86));
        assert!(approx(rect.width, 87.428_57));
        assert!(approx(rect.height, 39.6));
        assert!(approx(rect.y, 792.0 - 118.8 - 39.6));
    }

    #[test]
    fn test_preview_origin_projects_to_page_top() {
        let origin = Point::new(0.0, 0.0);

        let placed = project_text(origin, 16.0, aspect_viewport(), LETTER);
        assert_eq!(placed.x, 0.0);
        assert!(approx(placed.baseline + placed.size, 792.0));

        let viewport = ViewportSnapshot::new(700.0, 1000.0);
        let rect = project_shape(origin, Size::new(100.0, 50.0), viewport, LETTER);
        assert_eq!(rect.x, 0.0);
        assert!(approx(rect.y + rect.height, 792.0));
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("edited_", "report.pdf"), "edited_report.pdf");
        assert_eq!(export_file_name("edited_", "/home/me/report.pdf"), "edited_report.pdf");
        assert_eq!(export_file_name("x-", "C:\\docs\\a.pdf"), "x-a.pdf");
        assert_eq!(export_file_name("edited_", ""), "edited_document.pdf");
    }

    #[test]
    fn test_export_draws_in_store_order() {
        let mut store = AnnotationStore::new();
        let hello = text_content("Hello", "helvetica", false, false);
        store.create(1, Point::new(100.0, 100.0), aspect_viewport(), hello).unwrap();
        let shape = AnnotationContent::Shape {
            size: Size::new(100.0, 50.0),
            style: ShapeStyle { fill: Rgb::new(0.9, 0.9, 0.0), opacity: 0.5 },
        };
        store.create(2, Point::new(150.0, 150.0), aspect_viewport(), shape).unwrap();

        let (result, recorded) = run_builtin(&store);
        let exported = result.unwrap();

        assert_eq!(exported.file_name, "edited_report.pdf");
        assert_eq!(exported.stats.texts_drawn, 1);
        assert_eq!(exported.stats.shapes_drawn, 1);
        assert_eq!(recorded.texts.len(), 1);
        assert_eq!(recorded.texts[0].page_index, 0);
        assert!(approx(recorded.texts[0].y, 690.582_9));
        assert!(approx(recorded.texts[0].line_height, 13.988_57 * 1.2));
        assert_eq!(recorded.rects[0].0, 1);
        assert_eq!(recorded.rects[0].1.opacity, 0.5);
        assert!(recorded.saved);
    }

    #[test]
    fn test_one_font_per_face() {
        let mut store = AnnotationStore::new();
        for _ in 0..3 {
            add_text(&mut store, 1, text_content("a", "helvetica", false, false));
        }
        add_text(&mut store, 1, text_content("b", "helvetica", true, false));

        let (result, recorded) = run_builtin(&store);
        assert_eq!(result.unwrap().stats.fonts_embedded, 2);
        assert_eq!(
            recorded.embedded,
            vec![
                FontProgram::Standard(StandardFont::Helvetica),
                FontProgram::Standard(StandardFont::HelveticaBold),
            ]
        );
    }

    #[test]
    fn test_external_font_fetched_once() {
        let mut store = AnnotationStore::new();
        for _ in 0..3 {
            add_text(&mut store, 1, text_content("a", "inter", false, false));
        }
        add_text(&mut store, 1, text_content("b", "inter", false, true));

        let fetcher = CountingFetcher::serving(b"ttf-bytes");
        let (result, recorded) =
            run(&store, &external_catalog(), &fetcher, &ExportOptions::default());
        let stats = result.unwrap().stats;

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(stats.fonts_fetched, 1);
        assert_eq!(recorded.embedded, vec![FontProgram::TrueType(b"ttf-bytes".to_vec())]);
        assert!(recorded.texts[3].synthetic_italic);
        assert!(!recorded.texts[0].synthetic_italic);
    }

    #[test]
    fn test_fetch_failure_aborts_by_default() {
        let mut store = AnnotationStore::new();
        add_text(&mut store, 1, text_content("a", "inter", false, false));

        let fetcher = CountingFetcher::failing();
        let (result, recorded) =
            run(&store, &external_catalog(), &fetcher, &ExportOptions::default());
        assert!(
            matches!(result, Err(ExportError::EmbedFailure { ref font, .. }) if font == "Inter")
        );
        assert!(!recorded.saved);
    }

    #[test]
    fn test_fetch_failure_falls_back_to_helvetica() {
        let mut store = AnnotationStore::new();
        add_text(&mut store, 1, text_content("a", "inter", true, false));
        add_text(&mut store, 1, text_content("b", "inter", true, false));

        let options =
            ExportOptions { font_fallback: FontFallback::Standard, ..ExportOptions::default() };
        let fetcher = CountingFetcher::failing();
        let (result, recorded) = run(&store, &external_catalog(), &fetcher, &options);
        let stats = result.unwrap().stats;

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(stats.fallbacks.len(), 1);
        assert_eq!(stats.fallbacks[0].font, FontId::new("inter"));
        assert_eq!(recorded.embedded, vec![FontProgram::Standard(StandardFont::HelveticaBold)]);
        assert!(!recorded.texts[0].synthetic_bold);
    }

    #[test]
    fn test_missing_glyphs_are_counted() {
        let mut store = AnnotationStore::new();
        add_text(&mut store, 1, text_content("Nový text – Příliš", "helvetica", false, false));
        add_text(&mut store, 2, text_content("žluťoučký kůň", "helvetica", false, false));
        add_text(&mut store, 2, text_content("plain", "helvetica", false, false));

        let (result, recorded) = run_builtin(&store);
        let stats = result.unwrap().stats;
        assert_eq!(stats.texts_drawn, 3);
        assert_eq!(stats.missing_glyphs, 5);
        assert_eq!(recorded.texts[0].text, "Nový text – Příliš");
    }

    #[test]
    fn test_empty_text_draws_nothing() {
        let mut store = AnnotationStore::new();
        add_text(&mut store, 1, text_content("", "helvetica", false, false));

        let (result, recorded) = run_builtin(&store);
        let stats = result.unwrap().stats;
        assert_eq!(stats.empty_texts, 1);
        assert!(recorded.texts.is_empty());
        assert!(recorded.embedded.is_empty());
    }

    #[test]
    fn test_page_out_of_range() {
        let mut store = AnnotationStore::new();
        add_text(&mut store, 3, text_content("a", "helvetica", false, false));

        let (result, recorded) = run_builtin(&store);
        assert!(matches!(result, Err(ExportError::PageOutOfRange { page: 3, page_count: 2 })));
        assert!(!recorded.saved);
    }

    #[test]
    fn test_load_failure() {
        let store = AnnotationStore::new();
        let codec = RecordingCodec::new(vec![LETTER]);
        let catalog = FontCatalog::builtin();
        let fetcher = CountingFetcher::failing();
        let options = ExportOptions::default();
        let result = ExportProjector::new(&codec, &catalog, &fetcher, &options).export(
            "x.pdf",
            RecordingCodec::INVALID,
            store.iter(),
        );
        assert!(matches!(result, Err(ExportError::LoadFailure(_))));
    }
}
