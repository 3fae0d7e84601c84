mod document;
mod font;

pub use document::LopdfDocument;
pub use font::{encode_win_ansi, EncodedText, StandardFont};

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// Normalized RGB color, each channel in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };

    /// Channels are taken as given; callers clamp.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Font program handed to [`EditableDocument::embed_font`].
#[derive(Debug, Clone, PartialEq)]
pub enum FontProgram {
    /// One of the standard 14 fonts; no glyph data is embedded.
    Standard(StandardFont),
    /// Raw TrueType (`glyf`) font file bytes.
    TrueType(Vec<u8>),
}

/// Handle to a font embedded in one [`EditableDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontResourceId(u32);

impl FontResourceId {
    /// Wraps an identifier handed out by an [`EditableDocument`] implementation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// An embedded, export-ready font usable by [`EditableDocument::draw_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontResource {
    pub id: FontResourceId,
    /// Name the font is registered under in page resources (e.g. `FOv1`).
    pub resource_name: String,
    pub base_font: String,
}

/// A single text draw in PDF user space of the target page.
///
/// `x`/`y` locate the baseline of the first line. Lines are separated by `\n`
/// and advance downward by `line_height`.
#[derive(Debug, Clone)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub line_height: f32,
    pub font: &'a FontResource,
    pub color: RgbColor,
    /// Emulate a bold weight with fill+stroke rendering.
    pub synthetic_bold: bool,
    /// Emulate an italic style with a horizontal skew.
    pub synthetic_italic: bool,
}

/// A filled rectangle in PDF user space; `(x, y)` is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectFill {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: RgbColor,
    pub opacity: f32,
}

/// Result of one [`EditableDocument::draw_text`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawnText {
    /// Characters drawn as `?` or `.notdef` because the font has no glyph
    /// for them
    pub missing_glyphs: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("font program could not be parsed: {0}")]
    InvalidFont(String),
    #[error("unknown font resource {0}")]
    UnknownFont(u32),
    #[error("content encoding failed: {0}")]
    Content(String),
}

/// Entry point of a PDF codec: turns bytes into an editable document.
pub trait PdfCodec {
    type Document: EditableDocument;

    fn load(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError>;
}

/// A loaded document that overlay content can be drawn into.
///
/// Page indices are zero-based.
pub trait EditableDocument {
    /// Size of every page, in page order.
    fn page_sizes(&self) -> &[PageSize];

    fn page_count(&self) -> u32 {
        self.page_sizes().len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        self.page_sizes().get(page_index as usize).copied().ok_or(
            PdfEngineError::PageOutOfRange { page: page_index, page_count: self.page_count() },
        )
    }

    /// Add a font to the document; each call embeds a new font object.
    fn embed_font(&mut self, program: FontProgram) -> Result<FontResource, PdfEngineError>;

    /// Draw a text run. Characters the font cannot show are still drawn, as
    /// a replacement, and counted in the returned [`DrawnText`].
    fn draw_text(
        &mut self,
        page_index: u32,
        run: &TextRun<'_>,
    ) -> Result<DrawnText, PdfEngineError>;

    fn draw_rectangle(&mut self, page_index: u32, rect: &RectFill) -> Result<(), PdfEngineError>;

    /// Serialize the document with all overlays applied.
    fn save(self) -> Result<Vec<u8>, PdfEngineError>
    where
        Self: Sized;
}

/// [`PdfCodec`] backed by `lopdf`
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfCodec;

impl LopdfCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PdfCodec for LopdfCodec {
    type Document = LopdfDocument;

    fn load(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError> {
        LopdfDocument::load(bytes)
    }
}

/// The codec used when none is configured.
pub fn default_codec() -> LopdfCodec {
    LopdfCodec::new()
}
