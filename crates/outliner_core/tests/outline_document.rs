use outliner_core::{
    CheckedState, CodecError, OutlineDocument, OutlineValue, SaveOptions, StyleAttributes,
    StyleValue, StyledText,
};
use rust_decimal::Decimal;

const GROCERIES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<outline version="3">
  <named-styles>
    <named-style id="hl" name="Highlight">
      <style><value key="font-weight">9</value></style>
    </named-style>
  </named-styles>
  <window width="800" height="600"/>
  <style><value key="font-size">14</value></style>
  <columns>
    <column identifier="topic" type="text" outline-column="yes">
      <title><text><p><run><lit>Topic</lit></run></p></text></title>
    </column>
    <column identifier="cost" type="number" summary="sum">
      <style><value key="font-italic">yes</value></style>
    </column>
    <column identifier="status" type="enumeration">
      <enumerations>
        <member id="todo"><text><p><run><lit>To do</lit></run></p></text></member>
        <member id="done"><text><p><run><lit>Done</lit></run></p></text></member>
      </enumerations>
    </column>
    <column identifier="flag" type="checkbox"/>
    <column identifier="notes" type="text" note-column="yes"/>
  </columns>
  <root>
    <row id="r1" expanded="yes">
      <values>
        <text><p><run><lit>Groceries</lit></run></p></text>
        <null/>
        <enum>todo</enum>
        <checkbox>unchecked</checkbox>
      </values>
      <note><text><p><run><lit>weekly</lit></run></p><p><run><lit>run</lit></run></p></text></note>
      <row id="r2" state="checked">
        <values>
          <text><p><run><style><inherited-style refid="hl"/></style><lit>Milk</lit></run></p></text>
          <number>1</number>
          <enum>done</enum>
          <checkbox>checked</checkbox>
        </values>
      </row>
      <row id="r3">
        <values>
          <text><p><run><lit>Eggs</lit></run></p></text>
          <number>2</number>
        </values>
      </row>
      <row id="r4">
        <values><text/><null/><null/><null/></values>
      </row>
    </row>
  </root>
</outline>
"#;

fn load() -> OutlineDocument {
    OutlineDocument::from_oo3_xml(GROCERIES).unwrap()
}

fn outline_with_rows(rows: &str) -> String {
    format!(
        r#"<outline version="3">
  <columns>
    <column identifier="topic" type="text"/>
    <column identifier="status" type="enumeration">
      <enumerations><member id="todo"/></enumerations>
    </column>
  </columns>
  <root>{rows}</root>
</outline>"#
    )
}

#[test]
fn load_builds_tree_columns_and_metadata() {
    let document = load();
    assert_eq!(document.columns().len(), 4);
    assert_eq!(document.note_column().identifier(), "notes");
    assert_eq!(document.row_count(), 4);
    assert_eq!(document.window_size().map(|size| size.width), Some(800));

    let r1 = document.row_by_identifier("r1").unwrap();
    let r2 = document.row_by_identifier("r2").unwrap();
    assert_eq!(document.parent_for_row(r2), Some(r1));
    assert_eq!(document.parent_for_row(r1), Some(document.root()));
    assert_eq!(document.children(r1).len(), 3);

    let row = document.row(r1).unwrap();
    assert!(row.is_expanded());
    assert_eq!(row.note().string(), "weekly\nrun");
    assert_eq!(
        document.row(r2).unwrap().checked_state(),
        CheckedState::Checked
    );
    assert_eq!(
        document.value(r2, 2).unwrap().as_enumeration_id(),
        "done"
    );
}

#[test]
fn reserialized_xml_is_stable_across_round_trips() {
    let first = load().to_oo3_xml(true).unwrap();
    let reloaded = OutlineDocument::from_oo3_xml(&first).unwrap();
    let second = reloaded.to_oo3_xml(true).unwrap();
    assert_eq!(first, second);

    assert_eq!(reloaded.row_count(), 4);
    assert!(reloaded.load_report().is_clean());
}

fn run_shapes(
    document: &OutlineDocument,
    text: &StyledText,
) -> Vec<(String, Option<StyleValue>)> {
    text.runs()
        .iter()
        .map(|run| {
            let resolved = document.style_registry().resolve(run.style);
            (run.text.clone(), resolved.get("font-weight").cloned())
        })
        .collect()
}

#[test]
fn styled_note_runs_survive_a_document_round_trip() {
    let mut document = load();
    let base = document.note_column().style();
    let mut bold = StyleAttributes::new();
    bold.insert("font-weight", StyleValue::Integer(9));
    let bold = document
        .style_registry_mut()
        .partial_style_from_attributes(&bold, base);

    let mut note = StyledText::plain("a", bold);
    note.push("\nb", base);
    let r4 = document.row_by_identifier("r4").unwrap();
    document.row_mut(r4).unwrap().set_note(note.clone());

    let reloaded = OutlineDocument::from_oo3_xml(&document.to_oo3_xml(true).unwrap()).unwrap();
    let reloaded_r4 = reloaded.row_by_identifier("r4").unwrap();
    let reread = reloaded.row(reloaded_r4).unwrap().note();
    assert_eq!(run_shapes(&reloaded, reread), run_shapes(&document, &note));
    assert_eq!(reread.runs()[0].text, "a\n");
}

#[test]
fn short_rows_are_padded_and_flagged() {
    let document = load();
    let r3 = document.row_by_identifier("r3").unwrap();
    let row = document.row(r3).unwrap();

    assert_eq!(row.values().len(), 4);
    assert!(row.values_padded());
    assert!(row.value(2).is_placeholder());
    assert!(row.value(3).is_placeholder());
    assert_eq!(document.load_report().padded_rows, vec!["r3".to_string()]);

    let r4 = document.row_by_identifier("r4").unwrap();
    assert!(!document.row(r4).unwrap().values_padded());
}

#[test]
fn sum_summary_skips_placeholders() {
    let document = load();
    let r1 = document.row_by_identifier("r1").unwrap();
    assert_eq!(
        document.compute_summary(r1, 1),
        Some(OutlineValue::Number(Decimal::from(3)))
    );
    assert_eq!(document.compute_summary(r1, 0), None);
}

#[test]
fn refresh_summaries_stores_parent_values() {
    let mut document = load();
    let r1 = document.row_by_identifier("r1").unwrap();
    assert!(document.value(r1, 1).unwrap().is_placeholder());

    document.refresh_summaries();
    assert_eq!(document.value(r1, 1).unwrap().as_number(), Decimal::from(3));
}

#[test]
fn column_and_run_styles_resolve_through_three_levels() {
    let document = load();
    let registry = document.style_registry();

    let cost = document.column(1);
    let explicit = registry.style(cost.style()).explicit();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit.get("font-italic"), Some(&StyleValue::Bool(true)));

    let resolved = cost.default_style(registry);
    assert_eq!(
        resolved.get("font-size"),
        Some(&StyleValue::Number(Decimal::from(14)))
    );
    assert_eq!(resolved.get("font-italic"), Some(&StyleValue::Bool(true)));
    assert_eq!(
        resolved.get("font-family"),
        Some(&StyleValue::Text("Helvetica".to_string()))
    );

    let r2 = document.row_by_identifier("r2").unwrap();
    let milk = document.value(r2, 0).unwrap().as_text();
    let run = registry.resolve(milk.runs()[0].style);
    assert_eq!(run.get("font-weight"), Some(&StyleValue::Integer(9)));
    assert_eq!(
        run.get("font-size"),
        Some(&StyleValue::Number(Decimal::from(14)))
    );
}

#[test]
fn too_many_values_abort_the_load() {
    let xml = outline_with_rows(
        r#"<row id="a"><values><text/><null/><null/></values></row>"#,
    );
    assert!(matches!(
        OutlineDocument::from_oo3_xml(&xml).unwrap_err(),
        CodecError::TooManyValues {
            expected: 2,
            found: 3,
            ..
        }
    ));
}

#[test]
fn duplicate_row_identifiers_abort_the_load() {
    let xml = outline_with_rows(r#"<row id="a"/><row id="a"/>"#);
    assert!(matches!(
        OutlineDocument::from_oo3_xml(&xml).unwrap_err(),
        CodecError::DuplicateRowIdentifier(id) if id == "a"
    ));
}

#[test]
fn undeclared_enumeration_ids_abort_the_load() {
    let xml = outline_with_rows(r#"<row id="a"><values><text/><enum>later</enum></values></row>"#);
    assert!(matches!(
        OutlineDocument::from_oo3_xml(&xml).unwrap_err(),
        CodecError::UnknownEnumeration { id, .. } if id == "later"
    ));
}

#[test]
fn missing_columns_element_is_rejected() {
    let xml = r#"<outline version="3"><root/></outline>"#;
    assert!(matches!(
        OutlineDocument::from_oo3_xml(xml).unwrap_err(),
        CodecError::MissingElement { element, .. } if element == "columns"
    ));
}

#[test]
fn invalid_row_identifiers_are_regenerated() {
    let xml = outline_with_rows(
        r#"<row id="has space"><values><text/><null/></values></row><row><values><text/><null/></values></row>"#,
    );
    let document = OutlineDocument::from_oo3_xml(&xml).unwrap();
    let regenerated = &document.load_report().regenerated_identifiers;
    assert_eq!(regenerated.len(), 2);
    for identifier in regenerated {
        assert!(document.row_by_identifier(identifier).is_some());
    }
    assert_ne!(regenerated[0], regenerated[1]);
}

#[test]
fn missing_note_column_is_synthesized() {
    let xml = outline_with_rows("");
    let document = OutlineDocument::from_oo3_xml(&xml).unwrap();
    assert!(document.note_column().is_note_column());
    assert_ne!(document.note_column().identifier(), "topic");
    assert_ne!(document.note_column().identifier(), "status");
}

#[test]
fn inserted_rows_get_unique_identifiers() {
    let mut document = OutlineDocument::new();
    let root = document.root();
    let mut identifiers = std::collections::HashSet::new();
    for index in 0..200 {
        let row = document.insert_row(root, index).unwrap();
        let identifier = document.row(row).unwrap().identifier().to_string();
        assert_eq!(document.row_by_identifier(&identifier), Some(row));
        assert!(identifiers.insert(identifier));
    }
}

#[test]
fn compressed_save_round_trips_through_a_file() {
    let document = load();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("groceries.ooutline");

    document
        .save_to_path(
            &path,
            SaveOptions {
                compress: true,
                pretty: false,
            },
        )
        .unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let reloaded = OutlineDocument::load_from_path(&path).unwrap();
    assert_eq!(
        reloaded.to_oo3_xml(true).unwrap(),
        document.to_oo3_xml(true).unwrap()
    );
}

#[test]
fn subtree_copies_paste_into_another_document() {
    let source = load();
    let r1 = source.row_by_identifier("r1").unwrap();
    let r2 = source.row_by_identifier("r2").unwrap();
    let fragment = source.subtree_to_oo3_xml(&[r1, r2]);

    let mut target = OutlineDocument::new();
    let root = target.root();
    let inserted = target
        .insert_rows_from_oo3_xml(&fragment, root, 0)
        .unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(target.row_count(), 4);

    let pasted = inserted[0];
    assert_eq!(target.value(pasted, 0).unwrap().as_text().string(), "Groceries");
    assert_eq!(target.row(pasted).unwrap().note().string(), "weekly\nrun");
    assert_eq!(target.children(pasted).len(), 3);

    let milk = target.children(pasted)[0];
    let run_style = target.value(milk, 0).unwrap().as_text().runs()[0].style;
    assert_eq!(
        target.style_registry().resolve(run_style).get("font-weight"),
        Some(&StyleValue::Integer(9))
    );
}

#[test]
fn pasting_into_the_same_document_renames_clashing_rows() {
    let mut document = load();
    let r1 = document.row_by_identifier("r1").unwrap();
    let fragment = document.subtree_to_oo3_xml(&[r1]);
    let root = document.root();

    let inserted = document.insert_rows_from_oo3_xml(&fragment, root, 1).unwrap();
    let copy = inserted[0];
    assert_ne!(document.row(copy).unwrap().identifier(), "r1");
    assert_eq!(document.row_count(), 8);
    assert_eq!(document.value(copy, 2).unwrap().as_enumeration_id(), "todo");
}
