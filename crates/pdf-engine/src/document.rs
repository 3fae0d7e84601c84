//! Editable lopdf-backed document.
//!
//! Overlay operations are buffered per page and written on [`save`]: one new
//! content stream per touched page, appended after the original content,
//! which is wrapped in `q`/`Q` so an unbalanced graphics state left by the
//! original cannot shift the overlay.
//!
//! [`save`]: crate::EditableDocument::save

use crate::font::{
    add_truetype_font, encode_win_ansi, standard_font_dictionary, CidFont, EncodedText,
};
use crate::{
    DrawnText, EditableDocument, FontProgram, FontResource, FontResourceId, PageSize,
    PdfEngineError, RectFill, TextRun,
};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum depth when walking the page tree for inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Horizontal skew used for synthetic italics (tan 12°).
const SYNTHETIC_ITALIC_SKEW: f32 = 0.2126;

/// Stroke width for synthetic bold, relative to the font size.
const SYNTHETIC_BOLD_STROKE: f32 = 0.03;

#[derive(Debug, Clone)]
struct PageRecord {
    object_id: ObjectId,
    size: PageSize,
    /// Lower-left corner of the MediaBox; overlay coordinates are relative to it.
    origin: (f32, f32),
}

/// How text shown with a font is turned into string bytes
#[derive(Debug)]
enum FontEncoding {
    WinAnsi,
    Identity(CidFont),
}

#[derive(Debug)]
struct EmbeddedFont {
    resource_name: String,
    object_id: ObjectId,
    encoding: FontEncoding,
}

impl EmbeddedFont {
    fn encode(&mut self, text: &str) -> Result<EncodedText, PdfEngineError> {
        match &mut self.encoding {
            FontEncoding::WinAnsi => Ok(encode_win_ansi(text)),
            FontEncoding::Identity(font) => font.encode(text),
        }
    }

    fn string_format(&self) -> StringFormat {
        match self.encoding {
            FontEncoding::WinAnsi => StringFormat::Literal,
            FontEncoding::Identity(_) => StringFormat::Hexadecimal,
        }
    }
}

#[derive(Debug, Default)]
struct PageOverlay {
    operations: Vec<Operation>,
    fonts: BTreeSet<FontResourceId>,
    graphics_states: BTreeSet<u32>,
}

/// A parsed PDF plus the overlay content drawn into it so far
#[derive(Debug)]
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<PageRecord>,
    page_sizes: Vec<PageSize>,
    fonts: BTreeMap<FontResourceId, EmbeddedFont>,
    /// Opacity in thousandths -> (resource name, ExtGState object)
    graphics_states: BTreeMap<u32, (String, ObjectId)>,
    overlays: BTreeMap<usize, PageOverlay>,
}

impl LopdfDocument {
    /// Parse `bytes` and read every page's MediaBox.
    ///
    /// Encrypted documents and documents without pages are rejected.
    pub fn load(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let mut pages = Vec::new();
        for (_, object_id) in doc.get_pages() {
            let (size, origin) = match resolve_media_box(&doc, object_id) {
                Some([x0, y0, x1, y1]) => (
                    PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
                    (x0.min(x1), y0.min(y1)),
                ),
                None => (PageSize::default(), (0.0, 0.0)),
            };
            pages.push(PageRecord { object_id, size, origin });
        }

        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        let page_sizes = pages.iter().map(|page| page.size).collect();

        Ok(Self {
            doc,
            pages,
            page_sizes,
            fonts: BTreeMap::new(),
            graphics_states: BTreeMap::new(),
            overlays: BTreeMap::new(),
        })
    }

    fn check_page(&self, page_index: u32) -> Result<usize, PdfEngineError> {
        let index = page_index as usize;
        if index < self.pages.len() {
            Ok(index)
        } else {
            Err(PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: self.pages.len() as u32,
            })
        }
    }

    fn graphics_state_for(&mut self, opacity: f32) -> u32 {
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u32;
        if !self.graphics_states.contains_key(&key) {
            let alpha = key as f32 / 1000.0;
            let object_id = self.doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"ExtGState".to_vec())),
                ("ca", Object::Real(alpha)),
                ("CA", Object::Real(alpha)),
            ]));
            let name = format!("GSOv{}", self.graphics_states.len() + 1);
            self.graphics_states.insert(key, (name, object_id));
        }
        key
    }

    fn write_page_overlay(
        &mut self,
        page_index: usize,
        overlay: PageOverlay,
        wrap: (ObjectId, ObjectId),
    ) -> Result<(), PdfEngineError> {
        let page = self.pages[page_index].clone();

        let mut operations = vec![Operation::new("q", vec![])];
        if page.origin != (0.0, 0.0) {
            operations.push(Operation::new(
                "cm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    Object::Real(page.origin.0),
                    Object::Real(page.origin.1),
                ],
            ));
        }
        operations.extend(overlay.operations);
        operations.push(Operation::new("Q", vec![]));

        let content = Content { operations }
            .encode()
            .map_err(|err| PdfEngineError::Content(err.to_string()))?;
        let overlay_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

        let fonts: Vec<(String, ObjectId)> = overlay
            .fonts
            .iter()
            .filter_map(|id| self.fonts.get(id))
            .map(|font| (font.resource_name.clone(), font.object_id))
            .collect();
        let states: Vec<(String, ObjectId)> = overlay
            .graphics_states
            .iter()
            .filter_map(|key| self.graphics_states.get(key))
            .cloned()
            .collect();
        self.register_resources(page.object_id, &fonts, &states)?;

        let existing = self.existing_contents(page.object_id)?;
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(wrap.0));
        contents.extend(existing);
        contents.push(Object::Reference(wrap.1));
        contents.push(Object::Reference(overlay_id));

        self.doc
            .get_dictionary_mut(page.object_id)?
            .set("Contents", Object::Array(contents));

        Ok(())
    }

    /// The page's content streams as a flat list of references.
    fn existing_contents(&self, page_id: ObjectId) -> Result<Vec<Object>, PdfEngineError> {
        let page = self.doc.get_dictionary(page_id)?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(contents)
    }

    /// Add font and ExtGState entries to the page's (possibly inherited or
    /// indirect) resource dictionary.
    fn register_resources(
        &mut self,
        page_id: ObjectId,
        fonts: &[(String, ObjectId)],
        states: &[(String, ObjectId)],
    ) -> Result<(), PdfEngineError> {
        let page = self.doc.get_dictionary(page_id)?;
        let indirect = match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        let mut resources = match page.get(b"Resources") {
            Ok(object) => deref(&self.doc, object).and_then(|o| o.as_dict().ok()).cloned(),
            Err(_) => inherited_resources(&self.doc, page_id),
        }
        .unwrap_or_default();

        for (key, entries) in [("Font", fonts), ("ExtGState", states)] {
            if entries.is_empty() {
                continue;
            }
            let mut category = resources
                .get(key.as_bytes())
                .ok()
                .and_then(|object| deref(&self.doc, object))
                .and_then(|object| object.as_dict().ok())
                .cloned()
                .unwrap_or_default();
            for (name, object_id) in entries {
                category.set(name.as_str(), Object::Reference(*object_id));
            }
            resources.set(key, Object::Dictionary(category));
        }

        match indirect {
            Some(resources_id) => {
                self.doc.objects.insert(resources_id, Object::Dictionary(resources));
            }
            None => {
                self.doc
                    .get_dictionary_mut(page_id)?
                    .set("Resources", Object::Dictionary(resources));
            }
        }

        Ok(())
    }
}

impl EditableDocument for LopdfDocument {
    fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    fn embed_font(&mut self, program: FontProgram) -> Result<FontResource, PdfEngineError> {
        let (object_id, base_font, encoding) = match program {
            FontProgram::Standard(font) => {
                let object_id = self.doc.add_object(standard_font_dictionary(font));
                (object_id, font.base_name().to_owned(), FontEncoding::WinAnsi)
            }
            FontProgram::TrueType(data) => {
                let font = add_truetype_font(&mut self.doc, data)?;
                (font.object_id(), font.base_font().to_owned(), FontEncoding::Identity(font))
            }
        };

        let id = FontResourceId(self.fonts.len() as u32 + 1);
        let resource_name = format!("FOv{}", id.raw());
        let embedded = EmbeddedFont { resource_name: resource_name.clone(), object_id, encoding };
        self.fonts.insert(id, embedded);
        tracing::debug!(font = %base_font, resource = %resource_name, "embedded font");

        Ok(FontResource { id, resource_name, base_font })
    }

    fn draw_text(
        &mut self,
        page_index: u32,
        run: &TextRun<'_>,
    ) -> Result<DrawnText, PdfEngineError> {
        let index = self.check_page(page_index)?;
        let font = self
            .fonts
            .get_mut(&run.font.id)
            .ok_or(PdfEngineError::UnknownFont(run.font.id.raw()))?;

        let format = font.string_format();
        let mut drawn = DrawnText::default();
        let mut lines = Vec::new();
        for line in run.text.split('\n') {
            let encoded = font.encode(line.trim_end_matches('\r'))?;
            drawn.missing_glyphs += encoded.missing;
            lines.push(encoded.bytes);
        }

        let color = run.color;
        let skew = if run.synthetic_italic { SYNTHETIC_ITALIC_SKEW } else { 0.0 };

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]),
        ];
        if run.synthetic_bold {
            ops.push(Operation::new("RG", vec![color.r.into(), color.g.into(), color.b.into()]));
            ops.push(Operation::new("w", vec![(run.size * SYNTHETIC_BOLD_STROKE).into()]));
        }
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(run.font.resource_name.as_bytes().to_vec()), run.size.into()],
        ));
        if run.synthetic_bold {
            ops.push(Operation::new("Tr", vec![2.into()]));
        }
        ops.push(Operation::new("TL", vec![run.line_height.into()]));
        ops.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), skew.into(), 1.into(), run.x.into(), run.y.into()],
        ));
        for (line_number, bytes) in lines.into_iter().enumerate() {
            if line_number > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            if !bytes.is_empty() {
                ops.push(Operation::new("Tj", vec![Object::String(bytes, format.clone())]));
            }
        }
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));

        let overlay = self.overlays.entry(index).or_default();
        overlay.operations.extend(ops);
        overlay.fonts.insert(run.font.id);

        if drawn.missing_glyphs > 0 {
            tracing::warn!(
                font = %run.font.base_font,
                missing = drawn.missing_glyphs,
                "font has no glyph for some characters"
            );
        }
        Ok(drawn)
    }

    fn draw_rectangle(&mut self, page_index: u32, rect: &RectFill) -> Result<(), PdfEngineError> {
        let index = self.check_page(page_index)?;
        let state =
            if rect.opacity < 1.0 { Some(self.graphics_state_for(rect.opacity)) } else { None };

        let mut ops = vec![Operation::new("q", vec![])];
        if let Some(key) = state {
            let name = &self.graphics_states[&key].0;
            ops.push(Operation::new("gs", vec![Object::Name(name.as_bytes().to_vec())]));
        }
        let color = rect.color;
        ops.push(Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]));
        ops.push(Operation::new(
            "re",
            vec![rect.x.into(), rect.y.into(), rect.width.into(), rect.height.into()],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));

        let overlay = self.overlays.entry(index).or_default();
        overlay.operations.extend(ops);
        if let Some(key) = state {
            overlay.graphics_states.insert(key);
        }

        Ok(())
    }

    fn save(mut self) -> Result<Vec<u8>, PdfEngineError> {
        for font in self.fonts.values() {
            if let FontEncoding::Identity(cid_font) = &font.encoding {
                cid_font.finish(&mut self.doc)?;
            }
        }

        let overlays = std::mem::take(&mut self.overlays);
        if !overlays.is_empty() {
            let open = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let close = self.doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            for (page_index, overlay) in overlays {
                self.write_page_overlay(page_index, overlay, (open, close))?;
            }
        }

        let mut output = Vec::new();
        self.doc.save_to(&mut output).map_err(lopdf::Error::from)?;
        Ok(output)
    }
}

fn deref<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn parse_box(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let array = deref(doc, object)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0_f32; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = deref(doc, item)?.as_float().ok()?;
    }
    Some(values)
}

/// MediaBox of a page, walking up the page tree for inherited values.
fn resolve_media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = Some(page_id);
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(media_box) = dict.get(b"MediaBox") {
            return parse_box(doc, media_box);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = doc
        .get_dictionary(page_id)
        .ok()?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .ok();
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return deref(doc, resources).and_then(|o| o.as_dict().ok()).cloned();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pdf_with_pages, tiny_truetype};
    use crate::{RgbColor, StandardFont};

    fn run<'a>(text: &'a str, font: &'a FontResource) -> TextRun<'a> {
        TextRun {
            text,
            x: 72.0,
            y: 700.0,
            size: 12.0,
            line_height: 14.4,
            font,
            color: RgbColor::BLACK,
            synthetic_bold: false,
            synthetic_italic: false,
        }
    }

    fn overlay_stream_text(bytes: &[u8], page_number: u32) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page_number];
        let content = doc.get_page_content(page_id).unwrap();
        String::from_utf8_lossy(&content).into_owned()
    }

    #[test]
    fn test_save_without_overlays_preserves_pages() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0], [0.0, 0.0, 300.0, 400.0]]);
        let document = LopdfDocument::load(&bytes).unwrap();
        let saved = document.save().unwrap();

        let reloaded = LopdfDocument::load(&saved).unwrap();
        assert_eq!(reloaded.page_sizes(), &[
            PageSize { width_pt: 612.0, height_pt: 792.0 },
            PageSize { width_pt: 300.0, height_pt: 400.0 },
        ]);
    }

    #[test]
    fn test_media_box_origin_is_normalized() {
        let bytes = pdf_with_pages(&[[50.0, 100.0, 662.0, 892.0]]);
        let document = LopdfDocument::load(&bytes).unwrap();

        assert_eq!(document.page_size(0).unwrap(), PageSize { width_pt: 612.0, height_pt: 792.0 });
        assert_eq!(document.pages[0].origin, (50.0, 100.0));
    }

    #[test]
    fn test_draw_rectangle_appends_overlay_stream() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        document
            .draw_rectangle(0, &RectFill {
                x: 10.0,
                y: 20.0,
                width: 100.0,
                height: 50.0,
                color: RgbColor::new(0.9, 0.9, 0.0),
                opacity: 0.5,
            })
            .unwrap();
        let saved = document.save().unwrap();

        let content = overlay_stream_text(&saved, 1);
        assert!(content.contains("(original) Tj"));
        assert!(content.contains("re"));
        assert!(content.contains("/GSOv1 gs"));

        let doc = Document::load_mem(&saved).unwrap();
        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().expect("inline resources");
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert!(states.has(b"GSOv1"));
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"), "original font entries survive");
    }

    #[test]
    fn test_opaque_rectangle_skips_graphics_state() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        document
            .draw_rectangle(0, &RectFill {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                color: RgbColor::BLACK,
                opacity: 1.0,
            })
            .unwrap();
        assert!(document.graphics_states.is_empty());
    }

    #[test]
    fn test_draw_text_registers_font_resource() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0], [0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let font = document.embed_font(FontProgram::Standard(StandardFont::HelveticaBold)).unwrap();
        assert_eq!(font.resource_name, "FOv1");
        assert_eq!(font.base_font, "Helvetica-Bold");

        document
            .draw_text(1, &TextRun {
                text: "Hello (world)",
                x: 87.5,
                y: 690.0,
                size: 14.0,
                line_height: 16.8,
                font: &font,
                color: RgbColor::BLACK,
                synthetic_bold: false,
                synthetic_italic: false,
            })
            .unwrap();
        let saved = document.save().unwrap();

        let untouched = overlay_stream_text(&saved, 1);
        assert!(!untouched.contains("FOv1"));

        let content = overlay_stream_text(&saved, 2);
        assert!(content.contains("/FOv1 "));
        assert!(content.contains("Tf"));
        assert!(content.contains("Tj"));
    }

    #[test]
    fn test_multiline_text_uses_line_advance() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let font = document.embed_font(FontProgram::Standard(StandardFont::Helvetica)).unwrap();
        document
            .draw_text(0, &TextRun {
                text: "one\ntwo",
                x: 0.0,
                y: 700.0,
                size: 10.0,
                line_height: 12.0,
                font: &font,
                color: RgbColor::BLACK,
                synthetic_bold: true,
                synthetic_italic: true,
            })
            .unwrap();

        let ops = &document.overlays[&0].operations;
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators.iter().filter(|op| **op == "Tj").count(), 2);
        assert!(operators.contains(&"T*"));
        assert!(operators.contains(&"Tr"));
    }

    #[test]
    fn test_standard_font_counts_missing_glyphs() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let font = document.embed_font(FontProgram::Standard(StandardFont::Helvetica)).unwrap();

        let czech = run("Nový text – Příliš\nžluťoučký kůň", &font);
        let drawn = document.draw_text(0, &czech).unwrap();
        assert_eq!(drawn.missing_glyphs, 5);
        let drawn = document.draw_text(0, &run("Plain text", &font)).unwrap();
        assert_eq!(drawn, DrawnText::default());
    }

    #[test]
    fn test_truetype_text_is_written_as_glyph_ids() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let font = document.embed_font(FontProgram::TrueType(tiny_truetype())).unwrap();
        assert_eq!(font.base_font, "EmbeddedFont");

        let drawn = document.draw_text(0, &run("AřP", &font)).unwrap();
        assert_eq!(drawn.missing_glyphs, 1);
        let saved = document.save().unwrap();

        let content = overlay_stream_text(&saved, 1);
        assert!(content.contains("<000100020000> Tj"), "{content}");

        let doc = Document::load_mem(&saved).unwrap();
        let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        let type0_id = fonts.get(b"FOv1").unwrap().as_reference().unwrap();
        let type0 = doc.get_dictionary(type0_id).unwrap();
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert!(type0.get(b"ToUnicode").unwrap().as_reference().is_ok());
    }

    #[test]
    fn test_draw_text_with_foreign_font_fails() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let foreign = FontResource {
            id: FontResourceId(42),
            resource_name: "FOv42".to_owned(),
            base_font: "Helvetica".to_owned(),
        };
        let err = document
            .draw_text(0, &TextRun {
                text: "x",
                x: 0.0,
                y: 0.0,
                size: 10.0,
                line_height: 12.0,
                font: &foreign,
                color: RgbColor::BLACK,
                synthetic_bold: false,
                synthetic_italic: false,
            })
            .expect_err("font was never embedded");
        assert!(matches!(err, PdfEngineError::UnknownFont(42)));
    }

    #[test]
    fn test_draw_on_missing_page_fails() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let rect = RectFill {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            color: RgbColor::BLACK,
            opacity: 1.0,
        };
        assert!(matches!(
            document.draw_rectangle(5, &rect),
            Err(PdfEngineError::PageOutOfRange { page: 5, page_count: 1 })
        ));
    }

    #[test]
    fn test_graphics_states_are_shared_per_opacity() {
        let bytes = pdf_with_pages(&[[0.0, 0.0, 612.0, 792.0]]);
        let mut document = LopdfDocument::load(&bytes).unwrap();
        let first = document.graphics_state_for(0.5);
        let second = document.graphics_state_for(0.5004);
        let third = document.graphics_state_for(0.25);
        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(document.graphics_states.len(), 2);
    }
}
