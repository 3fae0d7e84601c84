use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_overlay_core::{
    DirectorySink, DownloadError, DownloadSink, EditorConfig, EditorSession, HeightNormalization,
    Point, PropertyEdit, Rgb, SessionError,
};
use std::fs;
use tempfile::TempDir;

fn sample_pdf(media_boxes: &[[f32; 4]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for media_box in media_boxes {
        let content = Stream::new(Dictionary::new(), b"0 0 m 100 100 l S".to_vec());
        let content_id = doc.add_object(content);
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("MediaBox", Object::Array(media_box.iter().map(|v| Object::Real(*v)).collect())),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn letter_pdf(pages: usize) -> Vec<u8> {
    sample_pdf(&vec![[0.0, 0.0, 612.0, 792.0]; pages])
}

fn page_operations(bytes: &[u8], page_number: u32) -> Vec<lopdf::content::Operation> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page_number];
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content).unwrap().operations
}

fn page_operators(bytes: &[u8], page_number: u32) -> Vec<String> {
    page_operations(bytes, page_number).into_iter().map(|op| op.operator).collect()
}

fn media_boxes(bytes: &[u8]) -> Vec<Vec<f32>> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_dictionary(*page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box.iter().map(|v| v.as_float().unwrap()).collect()
        })
        .collect()
}

/// `(x, y)` operands of every text matrix on the page
fn text_origins(bytes: &[u8], page_number: u32) -> Vec<(f32, f32)> {
    page_operations(bytes, page_number)
        .iter()
        .filter(|op| op.operator == "Tm")
        .map(|op| (op.operands[4].as_float().unwrap(), op.operands[5].as_float().unwrap()))
        .collect()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-2
}

#[derive(Default)]
struct MemorySink {
    files: Vec<(String, Vec<u8>)>,
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        self.files.push((file_name.to_owned(), bytes.to_vec()));
        Ok(())
    }
}

#[test]
fn test_export_writes_overlays_into_pdf() {
    let dir = TempDir::new().unwrap();
    let mut session = EditorSession::new(EditorConfig::default());
    assert_eq!(session.load_document("contract.pdf", letter_pdf(2)).unwrap(), 2);

    session.add_text().unwrap();
    session.edit_selected(PropertyEdit::Text("Signed".into())).unwrap();
    session.next_page();
    session.add_shape().unwrap();

    let mut sink = DirectorySink::new(dir.path());
    let report = session.export(&mut sink).unwrap();
    assert_eq!(report.file_name, "edited_contract.pdf");

    let written = fs::read(dir.path().join("edited_contract.pdf")).unwrap();
    assert_eq!(written.len(), report.size);
    let doc = Document::load_mem(&written).unwrap();
    assert_eq!(doc.get_pages().len(), 2);

    let first = page_operators(&written, 1);
    assert!(first.contains(&"Tj".to_string()));
    assert!(!first.contains(&"re".to_string()));

    let second = page_operators(&written, 2);
    assert!(second.contains(&"re".to_string()));
    assert!(second.contains(&"gs".to_string()));
    assert!(!second.contains(&"Tj".to_string()));
}

#[test]
fn test_text_lands_at_projected_baseline() {
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("a.pdf", letter_pdf(1)).unwrap();
    session.add_text().unwrap();

    let mut sink = MemorySink::default();
    session.export(&mut sink).unwrap();

    let origins = text_origins(&sink.files[0].1, 1);
    assert_eq!(origins.len(), 1);
    assert!(approx(origins[0].0, 87.428_57));
    assert!(approx(origins[0].1, 690.582_9));
}

#[test]
fn test_fixed_height_normalization() {
    let config =
        EditorConfig::default().with_height_normalization(HeightNormalization::Fixed(1000.0));
    let mut session = EditorSession::new(config);
    session.load_document("a.pdf", letter_pdf(1)).unwrap();
    session.add_text().unwrap();

    let mut sink = MemorySink::default();
    session.export(&mut sink).unwrap();

    let origins = text_origins(&sink.files[0].1, 1);
    assert!(approx(origins[0].0, 87.428_57));
    assert!(approx(origins[0].1, 698.811_4));
}

#[test]
fn test_resize_keeps_export_coordinates() {
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("a.pdf", letter_pdf(1)).unwrap();
    let id = session.add_shape().unwrap();
    session.pointer_down(id, Point::new(160.0, 160.0)).unwrap();
    session.pointer_move(Point::new(200.0, 260.0)).unwrap();
    session.pointer_up();
    session.add_text().unwrap();

    let mut before = MemorySink::default();
    session.export(&mut before).unwrap();

    session.resize_viewport(980.0).unwrap();
    session.resize_viewport(455.0).unwrap();
    let mut after = MemorySink::default();
    session.export(&mut after).unwrap();

    let rects = |bytes: &[u8]| -> Vec<Vec<f32>> {
        page_operations(bytes, 1)
            .into_iter()
            .filter(|op| op.operator == "re")
            .map(|op| op.operands.iter().map(|o| o.as_float().unwrap()).collect())
            .collect()
    };
    let rects_before = rects(&before.files[0].1);
    let rects_after = rects(&after.files[0].1);
    assert_eq!(rects_before.len(), 1);
    for (a, b) in rects_before[0].iter().zip(&rects_after[0]) {
        assert!(approx(*a, *b), "{a} != {b}");
    }

    let text_before = text_origins(&before.files[0].1, 1);
    let text_after = text_origins(&after.files[0].1, 1);
    assert!(approx(text_before[0].0, text_after[0].0));
    assert!(approx(text_before[0].1, text_after[0].1));
}

#[test]
fn test_three_texts_share_one_font() {
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("a.pdf", letter_pdf(1)).unwrap();
    for _ in 0..3 {
        session.add_text().unwrap();
        session.edit_selected(PropertyEdit::Color(Rgb::BLUE)).unwrap();
    }

    let mut sink = MemorySink::default();
    let report = session.export(&mut sink).unwrap();
    assert_eq!(report.stats.texts_drawn, 3);
    assert_eq!(report.stats.fonts_embedded, 1);
    assert_eq!(report.stats.fonts_fetched, 0);

    let fonts: Vec<Vec<u8>> = page_operations(&sink.files[0].1, 1)
        .into_iter()
        .filter(|op| op.operator == "Tf")
        .map(|op| op.operands[0].as_name().unwrap().to_vec())
        .collect();
    assert_eq!(fonts.len(), 3);
    assert!(fonts.iter().all(|name| name == b"FOv1"));
}

#[test]
fn test_load_failure_delivers_nothing() {
    let dir = TempDir::new().unwrap();
    let mut session = EditorSession::new(EditorConfig::default());

    let result = session.load_document("broken.pdf", b"this is not a pdf".to_vec());
    assert!(matches!(result, Err(SessionError::LoadFailure(_))));

    let mut sink = DirectorySink::new(dir.path());
    assert!(matches!(session.export(&mut sink), Err(SessionError::NoDocument)));
    assert!(sink.last_written().is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_original_file_is_untouched() {
    let original = letter_pdf(1);
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("a.pdf", original.clone()).unwrap();
    session.add_text().unwrap();

    let mut sink = MemorySink::default();
    session.export(&mut sink).unwrap();
    session.export(&mut sink).unwrap();

    assert_eq!(&session.document().unwrap().bytes()[..], &original[..]);
    assert_eq!(sink.files.len(), 2);
}

#[test]
fn test_export_without_annotations_keeps_pages() {
    let original = sample_pdf(&[[0.0, 0.0, 612.0, 792.0], [0.0, 0.0, 842.0, 595.0]]);
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("blank.pdf", original.clone()).unwrap();

    let mut sink = MemorySink::default();
    let report = session.export(&mut sink).unwrap();
    assert_eq!(report.stats.texts_drawn, 0);
    assert_eq!(report.stats.shapes_drawn, 0);
    assert_eq!(report.stats.fonts_embedded, 0);

    let written = &sink.files[0].1;
    let doc = Document::load_mem(written).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
    assert_eq!(media_boxes(written), media_boxes(&original));
    assert_eq!(media_boxes(written)[1], vec![0.0, 0.0, 842.0, 595.0]);
}
