//! Stateless column summary strategies.
//!
//! # Invariants
//! - A summary reads only the children of the row it summarizes.
//! - Children that have children contribute their own summary.
//! - Placeholders are skipped; any other type mismatch is a caller bug.

use crate::model::column::ColumnType;
use crate::model::document::OutlineDocument;
use crate::model::row::RowId;
use crate::model::value::{CheckedState, OutlineValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Sum,
    Mean,
    Minimum,
    Maximum,
    CheckState,
}

impl SummaryKind {
    pub fn as_oo3_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "average",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::CheckState => "state",
        }
    }

    pub fn from_oo3_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Some(Self::Sum),
            "average" | "mean" => Some(Self::Mean),
            "minimum" | "min" => Some(Self::Minimum),
            "maximum" | "max" => Some(Self::Maximum),
            "state" | "checkbox" => Some(Self::CheckState),
            _ => None,
        }
    }

    /// Whether this summary can aggregate values of `column_type`.
    pub fn supports(&self, column_type: ColumnType) -> bool {
        match self {
            Self::Sum | Self::Mean => column_type == ColumnType::Number,
            Self::Minimum | Self::Maximum => {
                matches!(column_type, ColumnType::Number | ColumnType::Date)
            }
            Self::CheckState => column_type == ColumnType::CheckBox,
        }
    }

    /// Summarizes the children of `row` in column `column_index`.
    ///
    /// # Panics
    /// Panics when `column_index` is out of range or a child value cannot be
    /// aggregated by this summary.
    pub fn compute_summary_for_row(
        &self,
        document: &OutlineDocument,
        row: RowId,
        column_index: usize,
    ) -> OutlineValue {
        let values = document.children(row).iter().map(|child| {
            if document.children(*child).is_empty() {
                document
                    .value(*child, column_index)
                    .cloned()
                    .unwrap_or(OutlineValue::Placeholder)
            } else {
                self.compute_summary_for_row(document, *child, column_index)
            }
        });
        self.summarize(values)
    }

    /// Aggregates values, skipping placeholders.
    ///
    /// # Panics
    /// Panics when a value cannot be aggregated by this summary.
    pub fn summarize(&self, values: impl IntoIterator<Item = OutlineValue>) -> OutlineValue {
        let present = values.into_iter().filter(|value| !value.is_placeholder());
        match self {
            Self::Sum => OutlineValue::Number(present.map(|value| value.as_number()).sum()),
            Self::Mean => {
                let mut total = Decimal::ZERO;
                let mut count = 0u32;
                for value in present {
                    total += value.as_number();
                    count += 1;
                }
                match total.checked_div(Decimal::from(count)) {
                    Some(mean) if count > 0 => OutlineValue::Number(mean.normalize()),
                    _ => OutlineValue::Placeholder,
                }
            }
            Self::Minimum => extreme(present, Ordering::Less),
            Self::Maximum => extreme(present, Ordering::Greater),
            Self::CheckState => {
                match CheckedState::combine(present.map(|value| value.as_checked_state())) {
                    Some(state) => OutlineValue::CheckBox(state),
                    None => OutlineValue::Placeholder,
                }
            }
        }
    }
}

fn extreme(values: impl Iterator<Item = OutlineValue>, wanted: Ordering) -> OutlineValue {
    let mut best: Option<OutlineValue> = None;
    for value in values {
        let replace = match &best {
            None => true,
            Some(current) => compare(&value, current) == wanted,
        };
        if replace {
            best = Some(value);
        }
    }
    best.unwrap_or(OutlineValue::Placeholder)
}

fn compare(left: &OutlineValue, right: &OutlineValue) -> Ordering {
    match (left, right) {
        (OutlineValue::Number(left), OutlineValue::Number(right)) => left.cmp(right),
        (OutlineValue::Date(left), OutlineValue::Date(right)) => left.cmp(right),
        _ => panic!(
            "cannot compare {:?} with {:?} in a summary",
            left.value_type(),
            right.value_type()
        ),
    }
}
