//! Incremental updates: original bytes kept, changes appended

use ferrite_pdf::parser::xref::{find_startxref, load_xref};
use ferrite_pdf::{
    Dictionary, Object, ObjectId, ParseOptions, PdfVersion, SerializationMode, Session, XRefMode,
};

/// Classic PDF 1.4 file with an xref table, offsets computed while building
fn classic_pdf() -> Vec<u8> {
    let bodies = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
    ];
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    out
}

#[test]
fn test_incremental_preserves_original_prefix() {
    let original = classic_pdf();
    let mut session = Session::new();
    let mut file = session.load(original.clone(), ParseOptions::default()).unwrap();

    let mut info = Dictionary::new();
    info.set("Title", "Updated");
    let info = file.add(info);
    file.trailer_mut().set("Info", info);

    let page = file.objects_mut().resolve_mut(3).unwrap().unwrap();
    page.data_mut().as_dict_mut().unwrap().set("Rotate", 90);

    let updated = file.to_bytes(SerializationMode::Incremental).unwrap();
    assert!(updated.starts_with(&original));
    assert!(updated.len() > original.len());

    let mut reopened = session.load(updated, ParseOptions::default()).unwrap();
    let page = reopened.resolve(&Object::Reference(ObjectId::new(3, 0))).unwrap();
    assert_eq!(page.as_dict().unwrap().get_integer("Rotate"), Some(90));
    let catalog = reopened.resolve(&Object::Reference(ObjectId::new(1, 0))).unwrap();
    assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));
    assert_eq!(reopened.trailer().get("Info"), Some(&Object::Reference(info)));
    assert_eq!(reopened.trailer().get("Root"), Some(&Object::Reference(ObjectId::new(1, 0))));
}

#[test]
fn test_incremental_section_chains_to_previous() {
    let original = classic_pdf();
    let previous = find_startxref(&original).unwrap();
    let mut file = Session::new()
        .load(original.clone(), ParseOptions::default())
        .unwrap();
    file.objects_mut().update(2).unwrap();

    let updated = file.to_bytes(SerializationMode::Incremental).unwrap();
    let tail = String::from_utf8_lossy(&updated[original.len()..]).into_owned();

    // A 1.4 file gets a classic table rather than an xref stream
    assert!(tail.starts_with("2 0 obj\n"));
    assert!(tail.contains("xref\n2 1\n"));
    assert!(tail.contains(&format!("/Prev {previous}")));
    assert!(!tail.contains("0000000000 65535 f"));

    let newest = find_startxref(&updated).unwrap();
    assert!(newest > previous);
    let index = load_xref(&updated, ParseOptions::default()).unwrap();
    assert_eq!(index.entries[&2].offset, original.len() as u64);
    assert_eq!(index.entries[&1].offset, 9);
}

#[test]
fn test_incremental_free_relinks_chain() {
    let original = classic_pdf();
    let mut file = Session::new().load(original, ParseOptions::default()).unwrap();
    file.objects_mut().remove_at(3).unwrap();

    let updated = file.to_bytes(SerializationMode::Incremental).unwrap();
    let index = load_xref(&updated, ParseOptions::default()).unwrap();
    assert_eq!(index.entries[&0].next_free(), 3);
    assert!(index.entries[&3].is_free());
    assert_eq!(index.entries[&3].next_free(), 0);
    assert_eq!(index.entries[&3].generation, 65535);
}

#[test]
fn test_incremental_with_xref_stream() {
    let mut session = Session::new();
    let mut base = session.create();
    let root = base.add(Dictionary::new());
    base.trailer_mut().set("Root", root);
    let original = base.to_bytes(SerializationMode::Standard).unwrap();

    let mut file = session.load(original.clone(), ParseOptions::default()).unwrap();
    assert_eq!(file.version(), PdfVersion::V1_7);
    assert_eq!(file.config().xref_mode, XRefMode::Stream);
    let added = file.add(Object::name("Extra"));
    assert_eq!(added, ObjectId::new(3, 0));

    let updated = file.to_bytes(SerializationMode::Incremental).unwrap();
    assert!(updated.starts_with(&original));

    let mut reopened = session.load(updated, ParseOptions::default()).unwrap();
    assert_eq!(
        reopened.resolve(&Object::Reference(added)).unwrap(),
        Object::name("Extra")
    );
    // 1: root, 2: first xref stream, 3: added, 4: update xref stream
    assert_eq!(reopened.objects().last_object_number(), 4);
}

#[test]
fn test_incremental_without_changes_is_identity() {
    let original = classic_pdf();
    let mut file = Session::new()
        .load(original.clone(), ParseOptions::default())
        .unwrap();
    // Reading alone does not mark anything modified
    file.objects_mut().resolve(2).unwrap();
    assert_eq!(file.to_bytes(SerializationMode::Incremental).unwrap(), original);
}
