use outliner_core::{
    CheckedState, ColumnFormatter, ColumnType, OutlineColumn, OutlineDate, OutlineDocument,
    OutlineValue, StyleRegistry, StyledText, SummaryKind, ValueError,
};
use rust_decimal::Decimal;

fn column(column_type: ColumnType) -> OutlineColumn {
    let registry = StyleRegistry::new();
    OutlineColumn::new("c", column_type, registry.root())
}

#[test]
fn placeholder_materializes_per_column_type() {
    let placeholder = OutlineValue::placeholder();
    assert_eq!(
        placeholder.materialize(&column(ColumnType::Number)),
        OutlineValue::Number(Decimal::ZERO)
    );
    assert_eq!(
        placeholder.materialize(&column(ColumnType::CheckBox)),
        OutlineValue::CheckBox(CheckedState::Unchecked)
    );
    assert_eq!(
        placeholder.materialize(&column(ColumnType::Date)),
        OutlineValue::Date(OutlineDate::reference())
    );
    assert!(placeholder
        .materialize(&column(ColumnType::Enumeration))
        .is_placeholder());

    let number = OutlineValue::Number(Decimal::new(25, 1));
    assert_eq!(number.materialize(&column(ColumnType::Number)), number);
}

#[test]
fn set_value_materializes_placeholders_into_number_columns() {
    let mut document = OutlineDocument::new();
    let cost = document.add_column("Cost", ColumnType::Number);
    let root = document.root();
    let row = document.insert_row(root, 0).unwrap();

    document
        .set_value(row, cost, OutlineValue::Placeholder)
        .unwrap();
    assert_eq!(
        document.value(row, cost),
        Some(&OutlineValue::Number(Decimal::ZERO))
    );
}

#[test]
fn editor_values_must_match_the_column_type() {
    let text = OutlineValue::Text(StyledText::new());
    assert_eq!(
        OutlineValue::with_value(text, &column(ColumnType::Number)),
        Err(ValueError::TypeMismatch {
            expected: ColumnType::Number,
            found: ColumnType::Text,
        })
    );
}

#[test]
fn enumeration_values_take_labels_from_the_column() {
    let registry = StyleRegistry::new();
    let root = registry.root();
    let mut status = OutlineColumn::new("status", ColumnType::Enumeration, root);
    status
        .add_enumeration_member("done", StyledText::plain("Done", root))
        .unwrap();

    let value = OutlineValue::with_value(
        OutlineValue::Enumeration {
            id: "done".to_string(),
            label: StyledText::new(),
        },
        &status,
    )
    .unwrap();
    assert_eq!(status.display_string(&value), "Done");

    let unknown = OutlineValue::with_value(
        OutlineValue::Enumeration {
            id: "later".to_string(),
            label: StyledText::new(),
        },
        &status,
    );
    assert_eq!(unknown, Err(ValueError::UnknownEnumeration("later".to_string())));
}

#[test]
#[should_panic]
fn typed_accessor_panics_on_mismatch() {
    OutlineValue::Text(StyledText::new()).as_number();
}

#[test]
fn formatter_renders_numbers_for_display() {
    let mut cost = column(ColumnType::Number);
    cost.set_formatter(Some(ColumnFormatter::currency("$")));
    assert_eq!(
        cost.display_string(&OutlineValue::Number(Decimal::new(123_456_789, 3))),
        "$123,456.79"
    );
    assert_eq!(cost.display_string(&OutlineValue::Placeholder), "");
}

#[test]
fn mean_and_extremes_skip_placeholders() {
    let values = || {
        vec![
            OutlineValue::Number(Decimal::from(4)),
            OutlineValue::Placeholder,
            OutlineValue::Number(Decimal::from(8)),
        ]
    };
    assert_eq!(
        SummaryKind::Mean.summarize(values()),
        OutlineValue::Number(Decimal::from(6))
    );
    assert_eq!(
        SummaryKind::Maximum.summarize(values()),
        OutlineValue::Number(Decimal::from(8))
    );
    assert_eq!(
        SummaryKind::Sum.summarize(Vec::new()),
        OutlineValue::Number(Decimal::ZERO)
    );
    assert!(SummaryKind::Mean.summarize(Vec::new()).is_placeholder());
}

#[test]
fn host_facing_enums_serialize_as_snake_case() {
    assert_eq!(
        serde_json::to_string(&ColumnType::CheckBox).unwrap(),
        "\"check_box\""
    );
    assert_eq!(
        serde_json::to_string(&SummaryKind::CheckState).unwrap(),
        "\"check_state\""
    );
    let state: CheckedState = serde_json::from_str("\"indeterminate\"").unwrap();
    assert_eq!(state, CheckedState::Indeterminate);
}
