use chrono::{TimeZone, Utc};
use outliner_core::{
    CheckedState, CodecError, ColumnType, OutlineDocument, StyleValue, SummaryKind,
};
use plist::{Dictionary, Value};
use rust_decimal::Decimal;
use std::time::SystemTime;

fn dict(entries: Vec<(&str, Value)>) -> Value {
    let mut dictionary = Dictionary::new();
    for (key, value) in entries {
        dictionary.insert(key.to_string(), value);
    }
    Value::Dictionary(dictionary)
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

fn legacy_outline(rows: Vec<Value>) -> Value {
    dict(vec![
        (
            "Columns",
            Value::Array(vec![
                dict(vec![("Title", text("Topic")), ("Type", text("Text"))]),
                dict(vec![
                    ("Title", text("Cost")),
                    ("Type", Value::from(1i64)),
                    ("Width", Value::Real(120.0)),
                    ("Summary", text("sum")),
                ]),
                dict(vec![
                    ("Title", text("Status")),
                    ("Type", text("Popup")),
                    (
                        "Enumeration",
                        Value::Array(vec![text("Open"), text("Closed")]),
                    ),
                ]),
                dict(vec![("Title", text("Notes")), ("Type", text("Text"))]),
            ]),
        ),
        (
            "Styles",
            dict(vec![(
                "1",
                dict(vec![
                    ("FontSize", Value::Real(10.5)),
                    ("Bold", Value::Boolean(true)),
                    ("Color", text("1 0 0")),
                ]),
            )]),
        ),
        ("NoteColumn", Value::from(3i64)),
        ("Children", Value::Array(rows)),
    ])
}

fn encode_binary(value: &Value) -> Vec<u8> {
    let mut bytes = Vec::new();
    value.to_writer_binary(&mut bytes).unwrap();
    bytes
}

#[test]
fn binary_plist_imports_columns_rows_and_notes() {
    let rows = vec![dict(vec![
        (
            "Values",
            Value::Array(vec![
                text("Trip"),
                Value::Real(12.25),
                text("Closed"),
                text("book hotel"),
            ]),
        ),
        ("Checked", Value::from(1i64)),
        ("Expanded", Value::Boolean(true)),
        (
            "Children",
            Value::Array(vec![dict(vec![(
                "Values",
                Value::Array(vec![text("Train"), Value::from(30i64)]),
            )])]),
        ),
    ])];
    let bytes = encode_binary(&legacy_outline(rows));

    let document = OutlineDocument::open_bytes(&bytes).unwrap();
    assert_eq!(document.columns().len(), 3);
    assert!(document.column(0).is_outline_column());
    assert_eq!(document.column(1).column_type(), ColumnType::Number);
    assert_eq!(document.column(1).width(), 120);
    assert_eq!(document.column(1).summary(), Some(SummaryKind::Sum));
    assert_eq!(document.column(2).column_type(), ColumnType::Enumeration);
    assert_eq!(document.column(2).enumeration().len(), 2);

    let top = document.children(document.root())[0];
    let row = document.row(top).unwrap();
    assert_eq!(row.value(0).as_text().string(), "Trip");
    assert_eq!(row.value(1).as_number(), Decimal::new(1225, 2));
    assert_eq!(document.column(2).display_string(row.value(2)), "Closed");
    assert_eq!(row.note().string(), "book hotel");
    assert_eq!(row.checked_state(), CheckedState::Checked);
    assert!(row.is_expanded());

    let child = document.children(top)[0];
    let child_row = document.row(child).unwrap();
    assert!(child_row.values_padded());
    assert_eq!(child_row.value(1).as_number(), Decimal::from(30));
    assert!(child_row.value(2).is_placeholder());
    assert_eq!(document.load_report().padded_rows.len(), 1);

    let cost_style = document.column(1).default_style(document.style_registry());
    assert_eq!(
        cost_style.get("font-size"),
        Some(&StyleValue::Number(Decimal::new(105, 1)))
    );
    assert_eq!(cost_style.get("font-weight"), Some(&StyleValue::Integer(9)));
}

#[test]
fn xml_plist_imports_and_resaves_as_oo3() {
    let rows = vec![dict(vec![(
        "Values",
        Value::Array(vec![text("Only"), Value::from(2i64)]),
    )])];
    let mut bytes = Vec::new();
    legacy_outline(rows).to_writer_xml(&mut bytes).unwrap();

    let document = OutlineDocument::open_bytes(&bytes).unwrap();
    assert_eq!(document.row_count(), 1);

    let xml = document.to_oo3_xml(true).unwrap();
    let reloaded = OutlineDocument::from_oo3_xml(&xml).unwrap();
    assert_eq!(reloaded.row_count(), 1);
    assert_eq!(reloaded.to_oo3_xml(true).unwrap(), xml);
}

#[test]
fn legacy_dates_convert_from_plist_dates() {
    let due = Utc.with_ymd_and_hms(2001, 1, 2, 0, 0, 0).unwrap();
    let outline = dict(vec![
        (
            "Columns",
            Value::Array(vec![
                dict(vec![("Type", text("Text"))]),
                dict(vec![("Type", text("Date"))]),
            ]),
        ),
        (
            "Children",
            Value::Array(vec![dict(vec![(
                "Values",
                Value::Array(vec![
                    text("Launch"),
                    Value::Date(SystemTime::from(due).into()),
                ]),
            )])]),
        ),
    ]);

    let document = OutlineDocument::from_oo2_plist(&encode_binary(&outline)).unwrap();
    let top = document.children(document.root())[0];
    let date = document.value(top, 1).unwrap().as_date();
    assert_eq!(date.reference_seconds(), Decimal::from(86_400));
}

#[test]
fn rows_with_extra_values_are_rejected() {
    let rows = vec![dict(vec![(
        "Values",
        Value::Array(vec![text("a"), text("b"), text("c"), text("d"), text("e")]),
    )])];
    let bytes = encode_binary(&legacy_outline(rows));
    assert!(matches!(
        OutlineDocument::from_oo2_plist(&bytes).unwrap_err(),
        CodecError::TooManyValues {
            expected: 4,
            found: 5,
            ..
        }
    ));
}

#[test]
fn plists_without_columns_are_rejected() {
    let bytes = encode_binary(&dict(vec![("Children", Value::Array(Vec::new()))]));
    assert!(matches!(
        OutlineDocument::from_oo2_plist(&bytes).unwrap_err(),
        CodecError::LegacyStructure(_)
    ));
}
