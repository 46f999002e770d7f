//! Typed cell values.
//!
//! # Responsibility
//! - Represent one row/column intersection as a closed sum type.
//! - Read and write the per-type OO3 value elements.
//!
//! # Invariants
//! - A non-placeholder value always matches its column's type.
//! - Numbers and dates are exact decimals; no floating point on any path.
//! - An unchanged value writes back exactly the text it was read from.

use crate::codec::{CodecError, CodecResult};
use crate::model::column::{ColumnType, OutlineColumn};
use crate::model::text::StyledText;
use crate::style::keys::parse_decimal;
use crate::style::StyleRegistry;
use crate::xml::XmlElement;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const REFERENCE_UNIX_SECONDS: i64 = 978_307_200;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Tri-state checkbox value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckedState {
    #[default]
    Unchecked,
    Checked,
    Indeterminate,
}

impl CheckedState {
    pub fn as_oo3_str(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Checked => "checked",
            Self::Indeterminate => "indeterminate",
        }
    }

    pub fn from_oo3_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "checked" | "yes" => Some(Self::Checked),
            "unchecked" | "no" => Some(Self::Unchecked),
            "indeterminate" | "mixed" => Some(Self::Indeterminate),
            _ => None,
        }
    }

    /// Combined state of a group: uniform groups keep their state.
    pub fn combine(states: impl IntoIterator<Item = CheckedState>) -> Option<Self> {
        let mut combined = None;
        for state in states {
            combined = match combined {
                None => Some(state),
                Some(current) if current == state => Some(current),
                Some(_) => return Some(Self::Indeterminate),
            };
        }
        combined
    }
}

/// Point in time as seconds since 2001-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutlineDate {
    seconds: Decimal,
}

impl OutlineDate {
    /// The reference date itself.
    pub fn reference() -> Self {
        Self {
            seconds: Decimal::ZERO,
        }
    }

    pub fn from_reference_seconds(seconds: Decimal) -> Self {
        Self { seconds }
    }

    pub fn reference_seconds(&self) -> Decimal {
        self.seconds
    }

    pub fn from_datetime(date: DateTime<Utc>) -> Self {
        let whole = Decimal::from(date.timestamp() - REFERENCE_UNIX_SECONDS);
        let nanos = date.timestamp_subsec_nanos();
        let seconds = if nanos == 0 {
            whole
        } else {
            (whole + Decimal::new(i64::from(nanos), 9)).normalize()
        };
        Self { seconds }
    }

    /// Converts to a UTC timestamp; `None` when out of chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let whole = self.seconds.floor();
        let nanos = ((self.seconds - whole) * Decimal::from(NANOS_PER_SECOND))
            .round()
            .to_u32()?;
        let whole = whole.to_i64()?.checked_add(REFERENCE_UNIX_SECONDS)?;
        DateTime::from_timestamp(whole, nanos)
    }

    fn parse(text: &str) -> Option<Self> {
        if let Some(seconds) = parse_decimal(text) {
            return Some(Self { seconds });
        }
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|date| Self::from_datetime(date.with_timezone(&Utc)))
    }
}

/// Editor-path value validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    TypeMismatch {
        expected: ColumnType,
        found: ColumnType,
    },
    UnknownEnumeration(String),
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => write!(
                f,
                "{} value cannot be stored in a {} column",
                found.as_oo3_str(),
                expected.as_oo3_str()
            ),
            Self::UnknownEnumeration(id) => write!(f, "unknown enumeration member `{id}`"),
        }
    }
}

impl Error for ValueError {}

/// One cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineValue {
    /// Not yet materialized; valid in any column.
    Placeholder,
    Text(StyledText),
    Number(Decimal),
    Date(OutlineDate),
    Enumeration { id: String, label: StyledText },
    CheckBox(CheckedState),
}

impl OutlineValue {
    pub fn placeholder() -> Self {
        Self::Placeholder
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Column type this value belongs to; `None` for placeholders.
    pub fn value_type(&self) -> Option<ColumnType> {
        match self {
            Self::Placeholder => None,
            Self::Text(_) => Some(ColumnType::Text),
            Self::Number(_) => Some(ColumnType::Number),
            Self::Date(_) => Some(ColumnType::Date),
            Self::Enumeration { .. } => Some(ColumnType::Enumeration),
            Self::CheckBox(_) => Some(ColumnType::CheckBox),
        }
    }

    /// # Panics
    /// Panics when the value is not text.
    pub fn as_text(&self) -> &StyledText {
        match self {
            Self::Text(text) => text,
            other => panic!("expected a text value, found {:?}", other.value_type()),
        }
    }

    /// # Panics
    /// Panics when the value is not a number.
    pub fn as_number(&self) -> Decimal {
        match self {
            Self::Number(number) => *number,
            other => panic!("expected a number value, found {:?}", other.value_type()),
        }
    }

    /// # Panics
    /// Panics when the value is not a date.
    pub fn as_date(&self) -> OutlineDate {
        match self {
            Self::Date(date) => *date,
            other => panic!("expected a date value, found {:?}", other.value_type()),
        }
    }

    /// # Panics
    /// Panics when the value is not an enumeration.
    pub fn as_enumeration_id(&self) -> &str {
        match self {
            Self::Enumeration { id, .. } => id,
            other => panic!("expected an enumeration value, found {:?}", other.value_type()),
        }
    }

    /// # Panics
    /// Panics when the value is not a checkbox.
    pub fn as_checked_state(&self) -> CheckedState {
        match self {
            Self::CheckBox(state) => *state,
            other => panic!("expected a checkbox value, found {:?}", other.value_type()),
        }
    }

    /// Column-appropriate empty value for a placeholder; other values are cloned.
    ///
    /// A placeholder stays a placeholder in an enumeration column without members.
    pub fn materialize(&self, column: &OutlineColumn) -> Self {
        if !self.is_placeholder() {
            return self.clone();
        }
        match column.column_type() {
            ColumnType::Text => Self::Text(StyledText::new()),
            ColumnType::Number => Self::Number(Decimal::ZERO),
            ColumnType::Date => Self::Date(OutlineDate::reference()),
            ColumnType::Enumeration => match column.enumeration().first() {
                Some(member) => Self::Enumeration {
                    id: member.id.clone(),
                    label: member.label.clone(),
                },
                None => Self::Placeholder,
            },
            ColumnType::CheckBox => Self::CheckBox(CheckedState::Unchecked),
        }
    }

    /// Validates an editor-supplied value against `column`.
    ///
    /// Placeholders are materialized. Enumeration labels are taken from the
    /// column so callers may pass any label.
    ///
    /// # Errors
    /// - Returns `TypeMismatch` when the value type differs from the column type.
    /// - Returns `UnknownEnumeration` when the member id is not declared.
    pub fn with_value(raw: OutlineValue, column: &OutlineColumn) -> Result<Self, ValueError> {
        let Some(found) = raw.value_type() else {
            return Ok(raw.materialize(column));
        };
        if found != column.column_type() {
            return Err(ValueError::TypeMismatch {
                expected: column.column_type(),
                found,
            });
        }
        match raw {
            Self::Enumeration { id, .. } => {
                let member = column
                    .enumeration_member(&id)
                    .ok_or(ValueError::UnknownEnumeration(id.clone()))?;
                Ok(Self::Enumeration {
                    label: member.label.clone(),
                    id,
                })
            }
            other => Ok(other),
        }
    }

    /// Reads one value element for `column`.
    ///
    /// # Errors
    /// - Returns `UnexpectedElement` when the element does not match the column type.
    /// - Returns `InvalidNumber`, `InvalidDate` or `InvalidCheckState` for bad content.
    /// - Returns `UnknownEnumeration` when the id is not declared by the column.
    pub fn from_oo3_xml(
        element: &XmlElement,
        column: &OutlineColumn,
        registry: &mut StyleRegistry,
    ) -> CodecResult<Self> {
        let expected = column.column_type();
        match (element.name(), expected) {
            ("null", _) => Ok(Self::Placeholder),
            ("text", ColumnType::Text) => Ok(Self::Text(StyledText::from_oo3_xml(
                element,
                registry,
                column.style(),
            )?)),
            ("number", ColumnType::Number) => {
                let text = element.text();
                parse_decimal(&text)
                    .map(Self::Number)
                    .ok_or(CodecError::InvalidNumber(text))
            }
            ("date", ColumnType::Date) => {
                let text = element.text();
                OutlineDate::parse(&text)
                    .map(Self::Date)
                    .ok_or(CodecError::InvalidDate(text))
            }
            ("enum", ColumnType::Enumeration) => {
                let id = element.text().trim().to_string();
                let member = column.enumeration_member(&id).ok_or_else(|| {
                    CodecError::UnknownEnumeration {
                        column: column.identifier().to_string(),
                        id: id.clone(),
                    }
                })?;
                Ok(Self::Enumeration {
                    label: member.label.clone(),
                    id,
                })
            }
            ("checkbox", ColumnType::CheckBox) => {
                let text = element.text();
                CheckedState::from_oo3_str(&text)
                    .map(Self::CheckBox)
                    .ok_or(CodecError::InvalidCheckState(text))
            }
            (name, _) => Err(CodecError::UnexpectedElement {
                parent: format!("{} column", expected.as_oo3_str()),
                element: name.to_string(),
            }),
        }
    }

    /// Writes the value element for `column`.
    ///
    /// # Panics
    /// Panics when a non-placeholder value does not match the column type.
    pub fn to_oo3_xml(&self, column: &OutlineColumn, registry: &StyleRegistry) -> XmlElement {
        if let Some(found) = self.value_type() {
            assert!(
                found == column.column_type(),
                "{} value written against a {} column",
                found.as_oo3_str(),
                column.column_type().as_oo3_str()
            );
        }
        match self {
            Self::Placeholder => XmlElement::new("null"),
            Self::Text(text) => text.to_oo3_xml(registry, column.style()),
            Self::Number(number) => XmlElement::new("number").with_text(number.to_string()),
            Self::Date(date) => {
                XmlElement::new("date").with_text(date.reference_seconds().to_string())
            }
            Self::Enumeration { id, .. } => XmlElement::new("enum").with_text(id.as_str()),
            Self::CheckBox(state) => XmlElement::new("checkbox").with_text(state.as_oo3_str()),
        }
    }
}
