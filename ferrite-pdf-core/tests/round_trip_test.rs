//! Write/parse round trips through both cross-reference formats

use ferrite_pdf::parser::xref::load_xref;
use ferrite_pdf::{
    Dictionary, Object, ObjectId, ParseOptions, PdfFile, PdfString, SerializationMode, Session,
    Stream, WriterConfig, XRefMode,
};
use std::collections::HashSet;

/// A small document: catalog, page tree, one page with content and a font
fn build_document(session: &mut Session) -> PdfFile {
    let mut file = session.create();

    let mut font = Dictionary::new();
    font.set("Type", Object::name("Font"));
    font.set("Subtype", Object::name("Type1"));
    font.set("BaseFont", Object::name("Helvetica"));
    let font = file.add(font);

    let content = Stream::new(b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET\n0 0 m 100 100 l S".to_vec());
    let content = file.add(content);

    let pages = file.add(Object::Null);

    let mut resources = Dictionary::new();
    let mut fonts = Dictionary::new();
    fonts.set("F1", font);
    resources.set("Font", fonts);

    let mut page = Dictionary::new();
    page.set("Type", Object::name("Page"));
    page.set("Parent", pages);
    page.set(
        "MediaBox",
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(612.0),
            Object::Real(791.5),
        ],
    );
    page.set("Contents", content);
    page.set("Resources", resources);
    let page = file.add(page);

    let mut tree = Dictionary::new();
    tree.set("Type", Object::name("Pages"));
    tree.set("Kids", vec![Object::Reference(page)]);
    tree.set("Count", 1);
    file.objects_mut().replace(pages.number(), tree).unwrap();

    let mut info = Dictionary::new();
    info.set("Title", "Round (trip) \\ test");
    info.set("Producer", Object::String(PdfString::hex(vec![0x00, 0xFE, 0x41])));
    info.set("CreationDate", "D:20240102030405+01'00'");
    info.set("Odd Name", Object::name("with space#hash"));
    let info = file.add(info);

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::name("Catalog"));
    catalog.set("Pages", pages);
    let catalog = file.add(catalog);

    file.trailer_mut().set("Root", catalog);
    file.trailer_mut().set("Info", info);
    file
}

fn collect_objects(file: &mut PdfFile) -> Vec<(u32, Option<Object>)> {
    let last = file.objects().last_object_number();
    (1..=last)
        .map(|number| {
            let object = file.objects_mut().resolve(number).unwrap().unwrap();
            let data = object.is_in_use().then(|| object.data().clone());
            (number, data)
        })
        .collect()
}

fn round_trip(mode: XRefMode) {
    let mut session = Session::new();
    let mut original = build_document(&mut session);
    original.objects_mut().remove_at(5).unwrap();
    original.trailer_mut().remove("Info");
    *original.config_mut() = WriterConfig {
        xref_mode: mode,
        ..WriterConfig::default()
    };

    let bytes = original.to_bytes(SerializationMode::Standard).unwrap();
    let mut reloaded = session.load(bytes, ParseOptions::default()).unwrap();

    assert_eq!(
        reloaded.trailer().get("Root"),
        original.trailer().get("Root")
    );
    let expected = collect_objects(&mut original);
    let actual = collect_objects(&mut reloaded);
    assert_eq!(actual[..expected.len()], expected[..]);
}

#[test]
fn test_round_trip_with_xref_table() {
    round_trip(XRefMode::Table);
}

#[test]
fn test_round_trip_with_xref_stream() {
    round_trip(XRefMode::Stream);
}

#[test]
fn test_round_trip_preserves_values() {
    let mut session = Session::new();
    let mut file = build_document(&mut session);
    let bytes = file.to_bytes(SerializationMode::Standard).unwrap();
    let mut reloaded = session.load(bytes, ParseOptions::default()).unwrap();

    let info = reloaded.resolve(&Object::Reference(ObjectId::new(5, 0))).unwrap();
    let info = info.as_dict().unwrap();
    assert_eq!(
        info.get("Title").and_then(Object::as_string).unwrap().as_bytes(),
        b"Round (trip) \\ test"
    );
    assert_eq!(
        info.get("Producer").and_then(Object::as_string).unwrap().as_bytes(),
        &[0x00, 0xFE, 0x41]
    );
    let date = info
        .get("CreationDate")
        .and_then(Object::as_string)
        .and_then(|s| s.as_date())
        .unwrap();
    assert_eq!(date.to_rfc3339(), "2024-01-02T03:04:05+01:00");
    assert_eq!(info.get_name("Odd Name"), Some("with space#hash"));

    let content = reloaded.resolve(&Object::Reference(ObjectId::new(2, 0))).unwrap();
    let stream = content.as_stream().unwrap();
    assert_eq!(stream.data(), b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET\n0 0 m 100 100 l S");
    assert_eq!(stream.dictionary().get_integer("Length"), Some(54));
}

fn assert_free_chain(bytes: &[u8]) {
    let index = load_xref(bytes, ParseOptions::default()).unwrap();
    let free: HashSet<u32> = index
        .entries
        .values()
        .filter(|e| e.is_free() && e.number != 0)
        .map(|e| e.number)
        .collect();

    let mut visited = HashSet::new();
    let mut next = index.entries[&0].next_free();
    while next != 0 {
        assert!(free.contains(&next), "object {next} in chain is not free");
        assert!(visited.insert(next), "object {next} visited twice");
        next = index.entries[&next].next_free();
    }
    assert_eq!(visited, free);
}

#[test]
fn test_free_chain_terminates_at_zero() {
    for mode in [XRefMode::Table, XRefMode::Stream] {
        for removed in [vec![], vec![3], vec![1, 2, 5], vec![6, 4, 1]] {
            let mut session = Session::new();
            let mut file = build_document(&mut session);
            for number in &removed {
                file.objects_mut().remove_at(*number).unwrap();
            }
            file.config_mut().xref_mode = mode;
            let bytes = file.to_bytes(SerializationMode::Standard).unwrap();
            assert_free_chain(&bytes);
        }
    }
}

#[test]
fn test_rewrite_of_rewrite_is_stable() {
    let mut session = Session::new();
    let mut file = build_document(&mut session);
    let first = file.to_bytes(SerializationMode::Standard).unwrap();

    // The xref stream of the first output is suppressed in the second
    let mut reloaded = session.load(first, ParseOptions::default()).unwrap();
    let second = reloaded.to_bytes(SerializationMode::Standard).unwrap();
    let mut again = session.load(second, ParseOptions::default()).unwrap();

    let expected = collect_objects(&mut file);
    let actual = collect_objects(&mut again);
    assert_eq!(actual[..expected.len()], expected[..]);
    let old_xref_stream = again.objects_mut().resolve(7).unwrap().unwrap();
    assert!(!old_xref_stream.is_in_use());
}
