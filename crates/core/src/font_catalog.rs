//! Font catalog
//!
//! Read-only table of the font families the editor offers. Each entry pairs a
//! CSS family for the preview with the source used when the family is
//! embedded on export.

use pdf_engine::StandardFont;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontId(String);

impl FontId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FontId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Standard 14 families that need no glyph data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

impl StandardFamily {
    /// The standard font for the requested weight and style
    pub fn face(self, bold: bool, italic: bool) -> StandardFont {
        use StandardFont::*;
        match (self, bold, italic) {
            (StandardFamily::Helvetica, false, false) => Helvetica,
            (StandardFamily::Helvetica, true, false) => HelveticaBold,
            (StandardFamily::Helvetica, false, true) => HelveticaOblique,
            (StandardFamily::Helvetica, true, true) => HelveticaBoldOblique,
            (StandardFamily::Times, false, false) => TimesRoman,
            (StandardFamily::Times, true, false) => TimesBold,
            (StandardFamily::Times, false, true) => TimesItalic,
            (StandardFamily::Times, true, true) => TimesBoldItalic,
            (StandardFamily::Courier, false, false) => Courier,
            (StandardFamily::Courier, true, false) => CourierBold,
            (StandardFamily::Courier, false, true) => CourierOblique,
            (StandardFamily::Courier, true, true) => CourierBoldOblique,
        }
    }
}

/// Where a TrueType font file can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontLocation {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for FontLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontLocation::Url(url) => f.write_str(url),
            FontLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Font files of an external family. Only `regular` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFaces {
    pub regular: FontLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<FontLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<FontLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold_italic: Option<FontLocation>,
}

impl FontFaces {
    /// Faces with only a regular program; other styles are synthesized.
    pub fn regular(location: FontLocation) -> Self {
        Self { regular: location, bold: None, italic: None, bold_italic: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FontSource {
    Standard { family: StandardFamily },
    External { faces: FontFaces },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontEntry {
    pub id: FontId,
    pub display_name: String,
    /// `font-family` value used by the preview
    pub css_family: String,
    pub source: FontSource,
}

impl FontEntry {
    /// Entry backed by one of the base-14 PDF families.
    pub fn standard(
        id: &str,
        display_name: &str,
        css_family: &str,
        family: StandardFamily,
    ) -> Self {
        Self {
            id: FontId::new(id),
            display_name: display_name.to_owned(),
            css_family: css_family.to_owned(),
            source: FontSource::Standard { family },
        }
    }

    /// Entry backed by TrueType programs loaded from files or URLs.
    pub fn external(id: &str, display_name: &str, css_family: &str, faces: FontFaces) -> Self {
        Self {
            id: FontId::new(id),
            display_name: display_name.to_owned(),
            css_family: css_family.to_owned(),
            source: FontSource::External { faces },
        }
    }
}

/// Which of a family's faces is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaceVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FaceVariant {
    /// Variant for the requested style flags
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FaceVariant::Regular,
            (true, false) => FaceVariant::Bold,
            (false, true) => FaceVariant::Italic,
            (true, true) => FaceVariant::BoldItalic,
        }
    }
}

/// Identity of one embeddable face; export embeds each key once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub font: FontId,
    pub variant: FaceVariant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceProgram {
    Standard(StandardFont),
    External(FontLocation),
}

/// Result of [`FontCatalog::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFace {
    pub key: FaceKey,
    pub program: FaceProgram,
    /// Bold was requested but the family has no native bold face
    pub synthetic_bold: bool,
    /// Italic was requested but the family has no native italic face
    pub synthetic_italic: bool,
}

impl ResolvedFace {
    /// Whether the requested style is bold, natively or synthesized
    pub fn bold(&self) -> bool {
        self.synthetic_bold
            || matches!(self.key.variant, FaceVariant::Bold | FaceVariant::BoldItalic)
    }

    pub fn italic(&self) -> bool {
        self.synthetic_italic
            || matches!(self.key.variant, FaceVariant::Italic | FaceVariant::BoldItalic)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid font catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("font catalog has no entries")]
    Empty,
    #[error("duplicate font id: {0}")]
    DuplicateId(FontId),
    #[error("default font {0} is not in the catalog")]
    UnknownDefault(FontId),
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    default: Option<FontId>,
    fonts: Vec<FontEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontCatalog {
    entries: Vec<FontEntry>,
    default: FontId,
}

impl FontCatalog {
    /// Helvetica (default), Times and Courier from the standard 14 fonts.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                FontEntry::standard(
                    "helvetica",
                    "Helvetica",
                    "Helvetica, Arial, sans-serif",
                    StandardFamily::Helvetica,
                ),
                FontEntry::standard(
                    "times",
                    "Times",
                    "\"Times New Roman\", Times, serif",
                    StandardFamily::Times,
                ),
                FontEntry::standard(
                    "courier",
                    "Courier",
                    "\"Courier New\", Courier, monospace",
                    StandardFamily::Courier,
                ),
            ],
            default: FontId::new("helvetica"),
        }
    }

    /// Parse a catalog from JSON.
    ///
    /// ```json
    /// { "default": "inter", "fonts": [ { "id": "inter", ... } ] }
    /// ```
    /// Without `default` the first entry is the default.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let first = file.fonts.first().ok_or(CatalogError::Empty)?.id.clone();

        let mut catalog = Self { entries: Vec::with_capacity(file.fonts.len()), default: first };
        for entry in file.fonts {
            if catalog.contains(&entry.id) {
                return Err(CatalogError::DuplicateId(entry.id));
            }
            catalog.entries.push(entry);
        }

        match file.default {
            Some(default) => catalog.with_default(default),
            None => Ok(catalog),
        }
    }

    /// Add an entry, replacing any entry with the same id.
    pub fn with_entry(mut self, entry: FontEntry) -> Self {
        match self.entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Make `id` the default entry; it must already be in the catalog.
    pub fn with_default(mut self, id: FontId) -> Result<Self, CatalogError> {
        if !self.contains(&id) {
            return Err(CatalogError::UnknownDefault(id));
        }
        self.default = id;
        Ok(self)
    }

    pub fn default_id(&self) -> &FontId {
        &self.default
    }

    pub fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    pub fn get(&self, id: &FontId) -> Option<&FontEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn contains(&self, id: &FontId) -> bool {
        self.get(id).is_some()
    }

    /// The entry for `id`, or the default entry for unknown ids.
    pub fn entry_or_default(&self, id: &FontId) -> &FontEntry {
        self.get(id)
            .or_else(|| self.get(&self.default))
            .unwrap_or(&self.entries[0])
    }

    /// CSS `font-family` of `id`, or of the default entry.
    pub fn css_family(&self, id: &FontId) -> &str {
        &self.entry_or_default(id).css_family
    }

    /// Pick the face to embed for a family and style.
    ///
    /// External families without a native face for the requested style fall
    /// back to the closest face and mark the missing part as synthetic.
    pub fn resolve(&self, id: &FontId, bold: bool, italic: bool) -> ResolvedFace {
        let entry = self.entry_or_default(id);

        match &entry.source {
            FontSource::Standard { family } => ResolvedFace {
                key: FaceKey {
                    font: entry.id.clone(),
                    variant: FaceVariant::from_flags(bold, italic),
                },
                program: FaceProgram::Standard(family.face(bold, italic)),
                synthetic_bold: false,
                synthetic_italic: false,
            },
            FontSource::External { faces } => {
                let candidates = [
                    (FaceVariant::BoldItalic, bold && italic, faces.bold_italic.as_ref()),
                    (FaceVariant::Bold, bold, faces.bold.as_ref()),
                    (FaceVariant::Italic, italic, faces.italic.as_ref()),
                ];
                let (variant, location) = candidates
                    .into_iter()
                    .find_map(|(variant, wanted, location)| match (wanted, location) {
                        (true, Some(location)) => Some((variant, location)),
                        _ => None,
                    })
                    .unwrap_or((FaceVariant::Regular, &faces.regular));

                let native_bold = matches!(variant, FaceVariant::Bold | FaceVariant::BoldItalic);
                let native_italic =
                    matches!(variant, FaceVariant::Italic | FaceVariant::BoldItalic);

                ResolvedFace {
                    key: FaceKey { font: entry.id.clone(), variant },
                    program: FaceProgram::External(location.clone()),
                    synthetic_bold: bold && !native_bold,
                    synthetic_italic: italic && !native_italic,
                }
            }
        }
    }
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_family() -> FontEntry {
        FontEntry::external(
            "inter",
            "Inter",
            "Inter, sans-serif",
            FontFaces {
                regular: FontLocation::Url("https://fonts.example/inter.ttf".into()),
                bold: Some(FontLocation::Url("https://fonts.example/inter-bold.ttf".into())),
                italic: None,
                bold_italic: None,
            },
        )
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = FontCatalog::builtin();
        assert_eq!(catalog.entries().len(), 3);
        assert_eq!(catalog.default_id().as_str(), "helvetica");
        assert!(catalog.contains(&FontId::new("times")));
    }

    #[test]
    fn test_resolve_standard_faces() {
        let catalog = FontCatalog::builtin();
        let face = catalog.resolve(&FontId::new("helvetica"), true, false);
        assert_eq!(face.program, FaceProgram::Standard(StandardFont::HelveticaBold));
        assert!(!face.synthetic_bold);

        let face = catalog.resolve(&FontId::new("times"), true, true);
        assert_eq!(face.program, FaceProgram::Standard(StandardFont::TimesBoldItalic));
        assert_eq!(face.key.variant, FaceVariant::BoldItalic);
    }

    #[test]
    fn test_unknown_id_resolves_to_default() {
        let catalog = FontCatalog::builtin();
        let face = catalog.resolve(&FontId::new("comic-sans"), false, false);
        assert_eq!(face.key.font.as_str(), "helvetica");
        assert_eq!(catalog.css_family(&FontId::new("comic-sans")), "Helvetica, Arial, sans-serif");
    }

    #[test]
    fn test_external_missing_face_is_synthetic() {
        let catalog = FontCatalog::builtin().with_entry(external_family());
        let id = FontId::new("inter");

        let bold = catalog.resolve(&id, true, false);
        assert_eq!(bold.key.variant, FaceVariant::Bold);
        assert!(!bold.synthetic_bold);

        let italic = catalog.resolve(&id, false, true);
        assert_eq!(italic.key.variant, FaceVariant::Regular);
        assert!(italic.synthetic_italic);

        let bold_italic = catalog.resolve(&id, true, true);
        assert_eq!(bold_italic.key.variant, FaceVariant::Bold);
        assert!(!bold_italic.synthetic_bold);
        assert!(bold_italic.synthetic_italic);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "default": "inter",
            "fonts": [
                { "id": "helvetica", "display_name": "Helvetica", "css_family": "Helvetica",
                  "source": { "type": "standard", "family": "helvetica" } },
                { "id": "inter", "display_name": "Inter", "css_family": "Inter",
                  "source": { "type": "external",
                              "faces": { "regular": { "path": "/fonts/Inter.ttf" } } } }
            ]
        }"#;
        let catalog = FontCatalog::from_json(json).unwrap();
        assert_eq!(catalog.default_id().as_str(), "inter");

        let face = catalog.resolve(&FontId::new("inter"), false, false);
        let expected = FontLocation::Path("/fonts/Inter.ttf".into());
        assert_eq!(face.program, FaceProgram::External(expected));
    }

    #[test]
    fn test_from_json_rejects_bad_catalogs() {
        assert!(matches!(FontCatalog::from_json(r#"{"fonts": []}"#), Err(CatalogError::Empty)));
        assert!(matches!(FontCatalog::from_json("not json"), Err(CatalogError::Parse(_))));

        let unknown_default = r#"{"default": "x", "fonts": [
            { "id": "a", "display_name": "A", "css_family": "A",
              "source": { "type": "standard", "family": "courier" } } ]}"#;
        assert!(matches!(
            FontCatalog::from_json(unknown_default),
            Err(CatalogError::UnknownDefault(_))
        ));
    }

    #[test]
    fn test_with_entry_replaces_existing_id() {
        let catalog = FontCatalog::builtin().with_entry(FontEntry::standard(
            "times",
            "Serif",
            "serif",
            StandardFamily::Times,
        ));
        assert_eq!(catalog.entries().len(), 3);
        assert_eq!(catalog.get(&FontId::new("times")).unwrap().display_name, "Serif");
    }

    #[test]
    fn test_with_default() {
        let catalog = FontCatalog::builtin().with_default(FontId::new("courier")).unwrap();
        assert_eq!(catalog.default_id().as_str(), "courier");
        let face = catalog.resolve(&FontId::new("missing"), false, false);
        assert_eq!(face.program, FaceProgram::Standard(StandardFont::Courier));

        assert!(matches!(
            FontCatalog::builtin().with_default(FontId::new("inter")),
            Err(CatalogError::UnknownDefault(id)) if id.as_str() == "inter"
        ));
    }
}
