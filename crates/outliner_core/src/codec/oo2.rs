//! Legacy OO2 property-list import.
//!
//! # Responsibility
//! - Build an `OutlineDocument` from the OO2 `Columns`/`Styles`/`Children`
//!   property list, binary or XML.
//!
//! # Invariants
//! - Read-only: documents are never written back in this format.
//! - Row values are aligned with the legacy `Columns` array, which includes
//!   the note column when `NoteColumn` is set.

use crate::codec::{CodecError, CodecResult};
use crate::model::column::{ColumnType, OutlineColumn};
use crate::model::document::OutlineDocument;
use crate::model::formatter::parse_number_text;
use crate::model::identifier::generate_identifier;
use crate::model::row::RowId;
use crate::model::summary::SummaryKind;
use crate::model::text::StyledText;
use crate::model::value::{CheckedState, OutlineDate, OutlineValue};
use crate::style::keys::parse_decimal;
use crate::style::{Color, StyleAttributes, StyleId, StyleRegistry, StyleValue};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use plist::{Dictionary, Value};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::time::{Instant, SystemTime};

const BOLD_WEIGHT: i64 = 9;

/// Where a legacy value index lands in the imported document.
#[derive(Debug, Clone, Copy)]
enum LegacySlot {
    Column(usize),
    Note,
}

impl OutlineDocument {
    /// Imports an OO2 property list.
    ///
    /// # Errors
    /// - Returns `Plist` when the bytes are not a property list.
    /// - Returns `LegacyStructure` when required entries are missing or mistyped.
    /// - Returns `TooManyValues` or `InvalidColumnWidths` for inconsistent content.
    pub fn from_oo2_plist(bytes: &[u8]) -> CodecResult<Self> {
        let started_at = Instant::now();
        match read_legacy(bytes) {
            Ok(document) => {
                info!(
                    "event=document_load module=codec status=ok format=oo2 rows={} columns={} padded_rows={} duration_ms={}",
                    document.row_count(),
                    document.columns().len(),
                    document.load_report().padded_rows.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(document)
            }
            Err(err) => {
                error!(
                    "event=document_load module=codec status=error format=oo2 duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl OutlineColumn {
    /// Builds a column from one `Columns` entry and its `Styles` attributes.
    ///
    /// # Errors
    /// - Returns `LegacyStructure` for an unknown `Type`.
    /// - Returns `InvalidColumnWidths` when `MinWidth` exceeds `MaxWidth`.
    pub fn from_oo2_plist(
        entry: &Dictionary,
        column_index: usize,
        style_attributes: &StyleAttributes,
        registry: &mut StyleRegistry,
        document_style: StyleId,
        title_style: StyleId,
    ) -> CodecResult<Self> {
        let column_type = match entry.get("Type") {
            Some(Value::String(tag)) => ColumnType::from_oo3_str(tag),
            Some(value) => integer(value).and_then(legacy_type_code),
            None => Some(ColumnType::Text),
        }
        .ok_or_else(|| {
            CodecError::LegacyStructure(format!("column {column_index} has an unknown Type"))
        })?;

        let style = registry.allocate_style(document_style, style_attributes);
        let identifier = generate_identifier();
        let mut column = OutlineColumn::new(identifier, column_type, style);

        if let Some(title) = entry.get("Title").and_then(Value::as_string) {
            column.set_title(StyledText::plain(title, title_style));
        }

        let min = dimension(entry, "MinWidth").unwrap_or(column.min_width());
        let max = dimension(entry, "MaxWidth").unwrap_or(column.max_width());
        column
            .set_width_limits(min, max)
            .map_err(|_| CodecError::InvalidColumnWidths {
                column: column.identifier().to_string(),
                min,
                max,
            })?;
        if let Some(width) = dimension(entry, "Width") {
            column.set_width(width);
        }

        if column_type == ColumnType::Enumeration {
            let labels = entry
                .get("Enumeration")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (position, label) in labels.iter().enumerate() {
                let Some(label) = label.as_string() else {
                    warn!(
                        "event=legacy_enumeration_skipped module=codec status=skipped column={} position={}",
                        column_index, position
                    );
                    continue;
                };
                let member = StyledText::plain(label, style);
                if column
                    .add_enumeration_member(format!("e{position}"), member)
                    .is_err()
                {
                    warn!(
                        "event=legacy_enumeration_skipped module=codec status=skipped column={} position={}",
                        column_index, position
                    );
                }
            }
        }

        if let Some(summary) = entry.get("Summary").and_then(Value::as_string) {
            let applied = SummaryKind::from_oo3_str(summary)
                .map(|kind| column.set_summary(Some(kind)).is_ok())
                .unwrap_or(false);
            if !applied {
                warn!(
                    "event=column_summary_dropped module=codec status=skipped column={} summary={}",
                    column_index, summary
                );
            }
        }

        Ok(column)
    }
}

fn read_legacy(bytes: &[u8]) -> CodecResult<OutlineDocument> {
    let value = Value::from_reader(Cursor::new(bytes))?;
    let top = value
        .as_dictionary()
        .ok_or_else(|| legacy("top level is not a dictionary"))?;
    let entries = top
        .get("Columns")
        .and_then(Value::as_array)
        .ok_or_else(|| legacy("missing Columns array"))?;
    let styles = top.get("Styles").and_then(Value::as_dictionary);
    let note_index = top
        .get("NoteColumn")
        .and_then(integer)
        .and_then(|index| usize::try_from(index).ok());

    let mut registry = StyleRegistry::new();
    let root_style = registry.root();
    let document_style = registry.allocate_style(root_style, &StyleAttributes::new());
    let title_style = registry.allocate_style(document_style, &StyleAttributes::new());

    let mut columns = Vec::new();
    let mut slots = Vec::with_capacity(entries.len());
    let mut note_column = None;
    for (index, entry) in entries.iter().enumerate() {
        let entry = entry
            .as_dictionary()
            .ok_or_else(|| legacy(&format!("column {index} is not a dictionary")))?;
        let attributes = styles
            .and_then(|styles| styles.get(&index.to_string()))
            .and_then(Value::as_dictionary)
            .map(legacy_style_attributes)
            .unwrap_or_default();

        if note_index == Some(index) {
            let style = registry.allocate_style(document_style, &attributes);
            note_column = Some(OutlineColumn::note_column(generate_identifier(), style));
            slots.push(LegacySlot::Note);
            continue;
        }
        let column = OutlineColumn::from_oo2_plist(
            entry,
            index,
            &attributes,
            &mut registry,
            document_style,
            title_style,
        )?;
        slots.push(LegacySlot::Column(columns.len()));
        columns.push(column);
    }

    let note_column = match note_column {
        Some(column) => column,
        None => {
            let style = registry.allocate_style(document_style, &StyleAttributes::new());
            OutlineColumn::note_column(generate_identifier(), style)
        }
    };

    let mut document =
        OutlineDocument::with_parts(registry, document_style, title_style, note_column);
    for column in columns {
        document.push_column(column);
    }
    if !document.columns.is_empty() {
        document.columns[0].set_outline_column(true);
    }

    let root = document.root();
    if let Some(children) = top.get("Children").and_then(Value::as_array) {
        for child in children {
            read_legacy_row(&mut document, child, root, &slots)?;
        }
    }
    Ok(document)
}

fn read_legacy_row(
    document: &mut OutlineDocument,
    value: &Value,
    parent: RowId,
    slots: &[LegacySlot],
) -> CodecResult<()> {
    let entry = value
        .as_dictionary()
        .ok_or_else(|| legacy("row is not a dictionary"))?;

    let identifier = document.fresh_identifier();
    let raw_values = entry
        .get("Values")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if raw_values.len() > slots.len() {
        return Err(CodecError::TooManyValues {
            row: identifier,
            expected: slots.len(),
            found: raw_values.len(),
        });
    }

    let mut values = vec![OutlineValue::Placeholder; document.columns.len()];
    let mut note = StyledText::new();
    for (raw, slot) in raw_values.iter().zip(slots) {
        match slot {
            LegacySlot::Note => {
                if let Some(text) = raw.as_string() {
                    note = StyledText::plain(text, document.note_column.style());
                }
            }
            LegacySlot::Column(index) => {
                values[*index] = legacy_value(raw, &document.columns[*index]);
            }
        }
    }
    let values_padded = raw_values.len() < slots.len();
    if values_padded {
        warn!(
            "event=row_values_padded module=codec status=recovered format=oo2 identifier={} found={} expected={}",
            identifier,
            raw_values.len(),
            slots.len()
        );
        document.load_report.padded_rows.push(identifier.clone());
    }

    let checked_state = match entry.get("Checked") {
        Some(Value::Boolean(true)) => CheckedState::Checked,
        Some(value) => match integer(value) {
            Some(1) => CheckedState::Checked,
            Some(-1) => CheckedState::Indeterminate,
            _ => CheckedState::Unchecked,
        },
        None => CheckedState::Unchecked,
    };
    let is_expanded = entry
        .get("Expanded")
        .and_then(Value::as_boolean)
        .unwrap_or(false);

    let position = document.children(parent).len();
    let id = document.allocate_row(identifier, parent);
    document.link_child(parent, id, position);
    if let Some(row) = document.rows.get_mut(&id) {
        row.values = values;
        row.values_padded = values_padded;
        row.set_note(note);
        row.set_checked_state(checked_state);
        row.set_expanded(is_expanded);
    }

    if let Some(children) = entry.get("Children").and_then(Value::as_array) {
        for child in children {
            read_legacy_row(document, child, id, slots)?;
        }
    }
    Ok(())
}

fn legacy_value(raw: &Value, column: &OutlineColumn) -> OutlineValue {
    let converted = match column.column_type() {
        ColumnType::Text => raw
            .as_string()
            .map(|text| OutlineValue::Text(StyledText::plain(text, column.style()))),
        ColumnType::Number => match raw {
            Value::String(text) => parse_number_text(text),
            Value::Real(real) => parse_decimal(&real.to_string()),
            other => integer(other).map(Decimal::from),
        }
        .map(OutlineValue::Number),
        ColumnType::Date => match raw {
            Value::Date(date) => {
                let date: DateTime<Utc> = SystemTime::from(*date).into();
                Some(OutlineValue::Date(OutlineDate::from_datetime(date)))
            }
            Value::Real(real) => parse_decimal(&real.to_string())
                .map(|seconds| OutlineValue::Date(OutlineDate::from_reference_seconds(seconds))),
            _ => None,
        },
        ColumnType::Enumeration => {
            let member = match raw {
                Value::String(label) => column
                    .enumeration()
                    .iter()
                    .find(|member| member.label.string() == *label),
                other => integer(other)
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| column.enumeration().get(index)),
            };
            member.map(|member| OutlineValue::Enumeration {
                id: member.id.clone(),
                label: member.label.clone(),
            })
        }
        ColumnType::CheckBox => match raw {
            Value::Boolean(flag) => Some(if *flag {
                CheckedState::Checked
            } else {
                CheckedState::Unchecked
            }),
            other => integer(other).map(|state| match state {
                1 => CheckedState::Checked,
                -1 => CheckedState::Indeterminate,
                _ => CheckedState::Unchecked,
            }),
        }
        .map(OutlineValue::CheckBox),
    };

    converted.unwrap_or_else(|| {
        warn!(
            "event=legacy_value_skipped module=codec status=skipped column={} type={}",
            column.identifier(),
            column.column_type().as_oo3_str()
        );
        OutlineValue::Placeholder
    })
}

/// Maps one `Styles` entry onto registry keys.
fn legacy_style_attributes(style: &Dictionary) -> StyleAttributes {
    let mut attributes = StyleAttributes::new();
    if let Some(family) = style.get("FontFamily").and_then(Value::as_string) {
        attributes.insert("font-family", StyleValue::Text(family.to_string()));
    }
    if let Some(size) = style.get("FontSize").and_then(number) {
        attributes.insert("font-size", StyleValue::Number(size));
    }
    if let Some(bold) = style.get("Bold").and_then(Value::as_boolean) {
        let weight = if bold { BOLD_WEIGHT } else { 5 };
        attributes.insert("font-weight", StyleValue::Integer(weight));
    }
    if let Some(italic) = style.get("Italic").and_then(Value::as_boolean) {
        attributes.insert("font-italic", StyleValue::Bool(italic));
    }
    if let Some(color) = style
        .get("Color")
        .and_then(Value::as_string)
        .and_then(legacy_color)
    {
        attributes.insert("font-fill", StyleValue::Color(color));
    }
    let alignment = match style.get("Alignment") {
        Some(Value::String(name)) => Some(name.trim().to_ascii_lowercase()),
        Some(other) => integer(other).and_then(|code| {
            let name = match code {
                0 => "left",
                1 => "right",
                2 => "center",
                3 => "justified",
                4 => "natural",
                _ => return None,
            };
            Some(name.to_string())
        }),
        None => None,
    };
    if let Some(alignment) = alignment {
        attributes.insert("paragraph-alignment", StyleValue::Keyword(alignment));
    }
    attributes
}

/// Parses `"r g b [a]"` colour strings.
fn legacy_color(text: &str) -> Option<Color> {
    let components: Vec<Decimal> = text
        .split_whitespace()
        .map(parse_decimal)
        .collect::<Option<Vec<_>>>()?;
    match components.as_slice() {
        [red, green, blue] => Some(Color::rgb(*red, *green, *blue)),
        [red, green, blue, alpha] => Some(Color {
            red: *red,
            green: *green,
            blue: *blue,
            alpha: *alpha,
        }),
        _ => None,
    }
}

fn legacy_type_code(code: i64) -> Option<ColumnType> {
    match code {
        0 => Some(ColumnType::Text),
        1 => Some(ColumnType::Number),
        2 => Some(ColumnType::Date),
        3 => Some(ColumnType::Enumeration),
        4 => Some(ColumnType::CheckBox),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(integer) => integer.as_signed(),
        Value::Boolean(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn number(value: &Value) -> Option<Decimal> {
    match value {
        Value::Real(real) => parse_decimal(&real.to_string()),
        Value::String(text) => parse_decimal(text),
        other => integer(other).map(Decimal::from),
    }
}

fn dimension(entry: &Dictionary, key: &str) -> Option<u32> {
    let value = entry.get(key)?;
    match value {
        Value::Real(real) if *real >= 0.0 => Some(real.round() as u32),
        other => integer(other).and_then(|width| u32::try_from(width).ok()),
    }
}

fn legacy(reason: &str) -> CodecError {
    CodecError::LegacyStructure(reason.to_string())
}
