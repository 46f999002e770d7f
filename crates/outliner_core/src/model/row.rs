//! Outline rows stored in the document arena.
//!
//! # Invariants
//! - `values` is aligned positionally with the document column list.
//! - `parent`/`children` are maintained by the owning document only.

use crate::model::text::StyledText;
use crate::model::value::{CheckedState, OutlineValue};
use std::fmt::{Display, Formatter};

/// Document-scoped row handle. Never reused after the row is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub(crate) u64);

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    pub(crate) identifier: String,
    pub(crate) parent: Option<RowId>,
    pub(crate) children: Vec<RowId>,
    pub(crate) values: Vec<OutlineValue>,
    note: StyledText,
    checked_state: CheckedState,
    is_expanded: bool,
    is_note_expanded: bool,
    pub(crate) values_padded: bool,
}

impl OutlineRow {
    /// Empty row with one placeholder per column.
    pub(crate) fn new(identifier: String, parent: Option<RowId>, column_count: usize) -> Self {
        Self {
            identifier,
            parent,
            children: Vec::new(),
            values: vec![OutlineValue::Placeholder; column_count],
            note: StyledText::new(),
            checked_state: CheckedState::default(),
            is_expanded: false,
            is_note_expanded: false,
            values_padded: false,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn parent(&self) -> Option<RowId> {
        self.parent
    }

    pub fn children(&self) -> &[RowId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn values(&self) -> &[OutlineValue] {
        &self.values
    }

    /// # Panics
    /// Panics when `column_index` is out of range.
    pub fn value(&self, column_index: usize) -> &OutlineValue {
        &self.values[column_index]
    }

    pub fn note(&self) -> &StyledText {
        &self.note
    }

    pub fn set_note(&mut self, note: StyledText) {
        self.note = note;
    }

    pub fn checked_state(&self) -> CheckedState {
        self.checked_state
    }

    pub fn set_checked_state(&mut self, state: CheckedState) {
        self.checked_state = state;
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.is_expanded = expanded;
    }

    pub fn is_note_expanded(&self) -> bool {
        self.is_note_expanded
    }

    pub fn set_note_expanded(&mut self, expanded: bool) {
        self.is_note_expanded = expanded;
    }

    /// Whether this row was loaded with fewer values than columns.
    pub fn values_padded(&self) -> bool {
        self.values_padded
    }
}
