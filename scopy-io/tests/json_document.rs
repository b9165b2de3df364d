use std::path::PathBuf;

use scopy_core::document::{ElementId, ElementKind, ViewKind};
use scopy_core::geometry::Point2;
use scopy_core::store::DocumentStore;
use scopy_io::{DocumentLoader, DocumentSaver, IoError, JsonFacade};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn loads_office_block_fixture() {
    let doc = JsonFacade::new()
        .load(&fixture("office_block.json"))
        .expect("load fixture");

    assert_eq!(doc.levels().len(), 2);
    assert_eq!(doc.sheets().len(), 2);

    let ground = doc.sheet_by_number("a101").expect("A101 present");
    assert_eq!(ground.title, "Ground Floor");
    assert_eq!(ground.origin, Point2::new(0.0, 0.0));

    let viewports = doc.viewports_on(ground.id);
    assert_eq!(viewports.len(), 2);
    assert!(
        viewports
            .iter()
            .any(|vp| vp.view == ElementId::new(2) && vp.center == Point2::new(210.0, 148.5))
    );

    let legend = doc.view_by_name("Door Legend").expect("legend present");
    assert_eq!(legend.kind, ViewKind::Legend);
    assert!(!legend.crop.active);

    let template = doc.view_by_name("Presentation").expect("template present");
    assert!(template.is_template);

    let tag = doc.element(ElementId::new(14)).expect("tag present");
    assert!(tag.view_specific);
    assert!(matches!(tag.kind, ElementKind::Tag { .. }));
}

#[test]
fn saved_document_keeps_edits_and_id_counter() {
    let mut doc = JsonFacade::new()
        .load(&fixture("office_block.json"))
        .expect("load fixture");
    doc.begin_transaction("edit").unwrap();
    let sheet = doc.create_sheet("A103", "Roof", "Architectural").unwrap();
    doc.commit_transaction().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.json");
    JsonFacade::compact().save(&doc, &path).expect("save");

    let mut reloaded = JsonFacade::new().load(&path).expect("reload");
    assert_eq!(reloaded.element_count(), doc.element_count());
    assert_eq!(reloaded.sheet(sheet).map(|s| s.title.as_str()), Some("Roof"));
    assert!(!reloaded.is_in_transaction());

    // 重新加载后继续分配的编号不得与已有图元冲突。
    reloaded.begin_transaction("edit").unwrap();
    let next = reloaded.create_sheet("A104", "Section", "").unwrap();
    reloaded.commit_transaction().unwrap();
    assert!(next.get() > sheet.get());
}

#[test]
fn missing_and_malformed_documents_are_reported() {
    let err = JsonFacade::new()
        .load(&fixture("does_not_exist.json"))
        .unwrap_err();
    assert!(matches!(err, IoError::ReadError { .. }));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{ "sheets": [ { "id": "one" } ] }"#).unwrap();
    let err = JsonFacade::new().load(&path).unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument { .. }));
}

#[test]
fn document_without_id_counter_allocates_fresh_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_counter.json");
    std::fs::write(
        &path,
        r#"{
            "levels": [ { "id": 0, "name": "Level 1", "elevation": 0.0 } ],
            "views": [ { "id": 1, "name": "Level 1", "kind": "floor_plan", "level": 0 } ],
            "sheets": [ { "id": 2, "number": "A101", "title": "Plans" } ],
            "elements": [
                {
                    "id": 3,
                    "owner": 2,
                    "kind": { "type": "viewport", "view": 1, "center": [10.0, 10.0], "half_extent": [5.0, 5.0] }
                }
            ]
        }"#,
    )
    .unwrap();

    let mut doc = JsonFacade::new().load(&path).expect("load document");
    doc.begin_transaction("edit").unwrap();
    let sheet = doc.create_sheet("A102", "Plans - Copy", "").unwrap();
    let view = doc
        .duplicate_view(ElementId::new(1), scopy_core::store::DuplicateOption::Duplicate)
        .unwrap();
    let viewport = doc
        .place_viewport(sheet, view, Point2::new(10.0, 10.0))
        .unwrap();
    doc.commit_transaction().unwrap();

    let fresh = [sheet, view, viewport];
    assert!(fresh.iter().all(|id| id.get() > 3));
    assert_eq!(doc.levels()[0].id, ElementId::new(0));
    assert_eq!(doc.sheet_by_number("A101").map(|s| s.id), Some(ElementId::new(2)));
    assert_eq!(doc.view_by_name("Level 1").map(|v| v.id), Some(ElementId::new(1)));
}

#[test]
fn default_facade_writes_pretty_json() {
    let doc = JsonFacade::new()
        .load(&fixture("office_block.json"))
        .expect("load fixture");
    let dir = tempfile::tempdir().unwrap();

    let pretty = dir.path().join("default.json");
    JsonFacade::default().save(&doc, &pretty).unwrap();
    assert!(std::fs::read_to_string(&pretty).unwrap().contains('\n'));

    let compact = dir.path().join("compact.json");
    JsonFacade::compact().save(&doc, &compact).unwrap();
    assert!(!std::fs::read_to_string(&compact).unwrap().contains('\n'));
}
