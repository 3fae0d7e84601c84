//! Font programs and text encoding for overlay text.
//!
//! The standard 14 fonts are simple fonts in `WinAnsiEncoding`. Embedded
//! TrueType programs are written as `Type0` fonts over a `CIDFontType2`
//! descendant with `Identity-H` encoding: text is a sequence of two-byte
//! glyph ids, so any character the program has a glyph for can be drawn.
//! A `ToUnicode` CMap keeps the text extractable.

use crate::PdfEngineError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Entries per `beginbfchar` block; the CMap format caps blocks at 100.
const BFCHAR_BLOCK: usize = 100;

/// The non-symbolic standard 14 fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// PostScript name used as `BaseFont`.
    pub fn base_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}

/// Characters at WinAnsi codes 0x80..=0x9F. `None` marks unassigned codes.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn win_ansi_code(ch: char) -> Option<u8> {
    match ch as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(ch as u32 as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|entry| *entry == Some(ch))
            .map(|index| 0x80 + index as u8),
    }
}

#[cfg(test)]
fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => None,
    }
}

/// Bytes of a text show operand for one font.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedText {
    pub bytes: Vec<u8>,
    /// Characters the font has no code or glyph for
    pub missing: usize,
}

/// Tabs are drawn as a space; other control characters are dropped.
fn drawable_chars(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().filter_map(|ch| match ch {
        '\t' => Some(' '),
        ch if ch.is_control() => None,
        ch => Some(ch),
    })
}

/// Encode text as WinAnsi bytes.
///
/// Characters outside the encoding are written as `?` and counted in
/// [`EncodedText::missing`].
pub fn encode_win_ansi(text: &str) -> EncodedText {
    let mut encoded = EncodedText::default();
    for ch in drawable_chars(text) {
        let code = win_ansi_code(ch).unwrap_or_else(|| {
            encoded.missing += 1;
            b'?'
        });
        encoded.bytes.push(code);
    }
    encoded
}

pub(crate) fn standard_font_dictionary(font: StandardFont) -> Dictionary {
    Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(font.base_name().as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ])
}

fn parse_face(data: &[u8]) -> Result<ttf_parser::Face<'_>, PdfEngineError> {
    ttf_parser::Face::parse(data, 0).map_err(|err| PdfEngineError::InvalidFont(err.to_string()))
}

/// Converts font units to the 1000-unit glyph space of PDF font metrics.
fn glyph_space(units_per_em: u16) -> impl Fn(f32) -> i64 {
    let units_per_em = f32::from(units_per_em.max(1));
    move |value| (value * 1000.0 / units_per_em).round() as i64
}

/// Metrics read from a TrueType program, scaled to 1000 units per em.
struct TrueTypeMetrics {
    postscript_name: String,
    missing_width: i64,
    bbox: [i64; 4],
    ascent: i64,
    descent: i64,
    cap_height: i64,
    flags: i64,
    stem_v: i64,
}

fn read_truetype_metrics(data: &[u8]) -> Result<TrueTypeMetrics, PdfEngineError> {
    let face = parse_face(data)?;
    let scale = glyph_space(face.units_per_em());

    let missing_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|advance| scale(f32::from(advance)))
        .unwrap_or(0);

    let postscript_name = face
        .names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .and_then(|name| name.to_string())
        .map(|name| sanitize_font_name(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "EmbeddedFont".to_owned());

    let rect = face.global_bounding_box();
    let ascent = scale(f32::from(face.ascender()));
    let descent = scale(f32::from(face.descender()));
    let cap_height = face.capital_height().map(|h| scale(f32::from(h))).unwrap_or(ascent);

    // Symbolic: glyphs are addressed by id, not through a standard encoding.
    let mut flags = 4;
    if face.is_monospaced() {
        flags |= 1;
    }
    if face.is_italic() {
        flags |= 64;
    }

    Ok(TrueTypeMetrics {
        postscript_name,
        missing_width,
        bbox: [
            scale(f32::from(rect.x_min)),
            scale(f32::from(rect.y_min)),
            scale(f32::from(rect.x_max)),
            scale(f32::from(rect.y_max)),
        ],
        ascent,
        descent,
        cap_height,
        flags,
        stem_v: if face.is_bold() { 120 } else { 80 },
    })
}

fn sanitize_font_name(name: &str) -> String {
    name.chars().filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_')).collect()
}

/// An embedded TrueType program written as a `Type0` font.
///
/// Glyphs used by drawn text are collected so [`CidFont::finish`] can write
/// their widths and `ToUnicode` entries once all text is in.
#[derive(Debug)]
pub(crate) struct CidFont {
    data: Vec<u8>,
    base_font: String,
    type0_id: ObjectId,
    descendant_id: ObjectId,
    /// Glyph id -> first character drawn with it
    used: BTreeMap<u16, char>,
}

impl CidFont {
    /// The `Type0` font dictionary referenced from page resources.
    pub(crate) fn object_id(&self) -> ObjectId {
        self.type0_id
    }

    pub(crate) fn base_font(&self) -> &str {
        &self.base_font
    }

    /// Encode text as big-endian glyph ids.
    ///
    /// Characters without a glyph are written as glyph 0 (`.notdef`) and
    /// counted in [`EncodedText::missing`].
    pub(crate) fn encode(&mut self, text: &str) -> Result<EncodedText, PdfEngineError> {
        let face = parse_face(&self.data)?;
        let mut encoded = EncodedText::default();
        for ch in drawable_chars(text) {
            let glyph = match face.glyph_index(ch) {
                Some(glyph) => {
                    self.used.entry(glyph.0).or_insert(ch);
                    glyph.0
                }
                None => {
                    encoded.missing += 1;
                    0
                }
            };
            encoded.bytes.extend_from_slice(&glyph.to_be_bytes());
        }
        Ok(encoded)
    }

    /// Write the `W` array and `ToUnicode` CMap for the glyphs used so far.
    pub(crate) fn finish(&self, doc: &mut Document) -> Result<(), PdfEngineError> {
        if self.used.is_empty() {
            return Ok(());
        }
        let face = parse_face(&self.data)?;
        let scale = glyph_space(face.units_per_em());

        let mut widths = Vec::with_capacity(self.used.len() * 2);
        for glyph in self.used.keys() {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(*glyph))
                .map(|advance| scale(f32::from(advance)))
                .unwrap_or(0);
            widths.push(Object::Integer(i64::from(*glyph)));
            widths.push(Object::Array(vec![Object::Integer(advance)]));
        }
        doc.get_dictionary_mut(self.descendant_id)?.set("W", Object::Array(widths));

        let cmap = to_unicode_cmap(&self.used);
        let cmap_id = doc.add_object(Stream::new(Dictionary::new(), cmap.into_bytes()));
        doc.get_dictionary_mut(self.type0_id)?.set("ToUnicode", Object::Reference(cmap_id));
        Ok(())
    }
}

/// `ToUnicode` CMap mapping each glyph id back to its character.
pub(crate) fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        out.push_str(&format!("{} beginbfchar\n", block.len()));
        for (glyph, ch) in block {
            let mut units = [0_u16; 2];
            let utf16: String =
                ch.encode_utf16(&mut units).iter().map(|unit| format!("{unit:04X}")).collect();
            out.push_str(&format!("<{glyph:04X}> <{utf16}>\n"));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

/// Add the font file, descriptor, `CIDFontType2` and `Type0` dictionaries
/// for a TrueType program.
pub(crate) fn add_truetype_font(
    doc: &mut Document,
    data: Vec<u8>,
) -> Result<CidFont, PdfEngineError> {
    let metrics = read_truetype_metrics(&data)?;

    let length = data.len() as i64;
    let font_file =
        Stream::new(Dictionary::from_iter([("Length1", Object::Integer(length))]), data.clone());
    let font_file_id = doc.add_object(font_file);

    let base_font = Object::Name(metrics.postscript_name.as_bytes().to_vec());
    let descriptor_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"FontDescriptor".to_vec())),
        ("FontName", base_font.clone()),
        ("Flags", Object::Integer(metrics.flags)),
        ("FontBBox", Object::Array(metrics.bbox.iter().map(|v| Object::Integer(*v)).collect())),
        ("ItalicAngle", Object::Integer(0)),
        ("Ascent", Object::Integer(metrics.ascent)),
        ("Descent", Object::Integer(metrics.descent)),
        ("CapHeight", Object::Integer(metrics.cap_height)),
        ("StemV", Object::Integer(metrics.stem_v)),
        ("FontFile2", Object::Reference(font_file_id)),
    ]));

    let system_info = Dictionary::from_iter([
        ("Registry", Object::string_literal("Adobe")),
        ("Ordering", Object::string_literal("Identity")),
        ("Supplement", Object::Integer(0)),
    ]);
    let descendant_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
        ("BaseFont", base_font.clone()),
        ("CIDSystemInfo", Object::Dictionary(system_info)),
        ("FontDescriptor", Object::Reference(descriptor_id)),
        ("DW", Object::Integer(metrics.missing_width)),
        ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
    ]));

    let type0_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type0".to_vec())),
        ("BaseFont", base_font),
        ("Encoding", Object::Name(b"Identity-H".to_vec())),
        ("DescendantFonts", Object::Array(vec![Object::Reference(descendant_id)])),
    ]));

    Ok(CidFont {
        data,
        base_font: metrics.postscript_name,
        type0_id,
        descendant_id,
        used: BTreeMap::new(),
    })
}
