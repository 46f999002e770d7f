//! Outline editing use-case service.
//!
//! # Responsibility
//! - Provide row add, delete, indent, outdent and move operations.
//! - Keep derived state (summaries, parent check states) current after edits.
//!
//! # Invariants
//! - The root row is never moved, removed or given a value through this service.
//! - Move operations must not create parent-child cycles.
//! - After `set_checked_state`, every ancestor reflects the combined state
//!   of its children.

use crate::model::document::{DocumentError, OutlineDocument};
use crate::model::row::RowId;
use crate::model::text::StyledText;
use crate::model::value::{CheckedState, OutlineValue};
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from outline service operations.
#[derive(Debug)]
pub enum OutlineServiceError {
    /// Target row does not exist.
    RowNotFound(RowId),
    /// The root row cannot be the target of this operation.
    RootRowImmutable,
    /// Row has no previous sibling to indent under.
    CannotIndent(RowId),
    /// Row is already top-level.
    CannotOutdent(RowId),
    /// Move operation would create a cycle.
    CycleDetected { row: RowId, parent: RowId },
    /// Document-level failure.
    Document(DocumentError),
}

impl Display for OutlineServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowNotFound(row) => write!(f, "row not found: {row}"),
            Self::RootRowImmutable => write!(f, "the root row cannot be edited"),
            Self::CannotIndent(row) => write!(f, "row has no previous sibling: {row}"),
            Self::CannotOutdent(row) => write!(f, "row is already top-level: {row}"),
            Self::CycleDetected { row, parent } => {
                write!(f, "move would create cycle: row {row} under parent {parent}")
            }
            Self::Document(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OutlineServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentError> for OutlineServiceError {
    fn from(value: DocumentError) -> Self {
        match value {
            DocumentError::RowNotFound(row) => Self::RowNotFound(row),
            DocumentError::RootRowImmutable => Self::RootRowImmutable,
            DocumentError::CycleDetected { row, parent } => Self::CycleDetected { row, parent },
            other => Self::Document(other),
        }
    }
}

pub type OutlineServiceResult<T> = Result<T, OutlineServiceError>;

/// Editing facade over one borrowed document.
pub struct OutlineService<'doc> {
    document: &'doc mut OutlineDocument,
}

impl<'doc> OutlineService<'doc> {
    pub fn new(document: &'doc mut OutlineDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &OutlineDocument {
        self.document
    }

    /// Inserts an empty row directly after `sibling`.
    pub fn add_row_after(&mut self, sibling: RowId) -> OutlineServiceResult<RowId> {
        let (parent, index) = self.position_of(sibling)?;
        let row = self.document.insert_row(parent, index + 1)?;
        self.document.refresh_summaries();
        debug!(
            "event=row_added module=service status=ok row={} parent={}",
            row, parent
        );
        Ok(row)
    }

    /// Appends an empty row as the last child of `parent` (root allowed).
    pub fn add_child_row(&mut self, parent: RowId) -> OutlineServiceResult<RowId> {
        let index = self
            .document
            .row(parent)
            .ok_or(OutlineServiceError::RowNotFound(parent))?
            .children()
            .len();
        let row = self.document.insert_row(parent, index)?;
        self.document.refresh_summaries();
        debug!(
            "event=row_added module=service status=ok row={} parent={}",
            row, parent
        );
        Ok(row)
    }

    /// Deletes rows and their subtrees; returns how many rows left the document.
    ///
    /// Every handle is validated before anything is removed.
    pub fn delete_rows(&mut self, rows: &[RowId]) -> OutlineServiceResult<usize> {
        for row in rows {
            self.ensure_row(*row)?;
        }
        let selected: HashSet<RowId> = rows.iter().copied().collect();
        let before = self.document.row_count();
        for row in rows {
            // Rows already removed with a selected ancestor are skipped.
            let covered = self
                .document
                .parent_for_row(*row)
                .map(|parent| self.has_selected_ancestor(parent, &selected))
                .unwrap_or(true);
            if covered {
                continue;
            }
            self.document.remove_row(*row)?;
        }
        self.document.refresh_summaries();
        let removed = before - self.document.row_count();
        debug!(
            "event=rows_deleted module=service status=ok requested={} removed={}",
            rows.len(),
            removed
        );
        Ok(removed)
    }

    /// Makes `row` the last child of its previous sibling.
    pub fn increase_indent(&mut self, row: RowId) -> OutlineServiceResult<()> {
        let (parent, index) = self.position_of(row)?;
        if index == 0 {
            return Err(OutlineServiceError::CannotIndent(row));
        }
        let new_parent = self.document.children(parent)[index - 1];
        let position = self.document.children(new_parent).len();
        self.document.move_row(row, new_parent, position)?;
        self.document.refresh_summaries();
        Ok(())
    }

    /// Makes `row` the sibling directly after its current parent.
    pub fn decrease_indent(&mut self, row: RowId) -> OutlineServiceResult<()> {
        let (parent, _) = self.position_of(row)?;
        if parent == self.document.root() {
            return Err(OutlineServiceError::CannotOutdent(row));
        }
        let (grandparent, parent_index) = self.position_of(parent)?;
        self.document.move_row(row, grandparent, parent_index + 1)?;
        self.document.refresh_summaries();
        Ok(())
    }

    /// Moves `row` under `new_parent` at `index` (clamped to the child count).
    pub fn move_row(
        &mut self,
        row: RowId,
        new_parent: RowId,
        index: usize,
    ) -> OutlineServiceResult<()> {
        self.ensure_row(row)?;
        if self.document.row(new_parent).is_none() {
            return Err(OutlineServiceError::RowNotFound(new_parent));
        }
        if self.document.is_same_or_ancestor(row, new_parent) {
            return Err(OutlineServiceError::CycleDetected {
                row,
                parent: new_parent,
            });
        }
        let remaining = self
            .document
            .children(new_parent)
            .iter()
            .filter(|child| **child != row)
            .count();
        self.document
            .move_row(row, new_parent, index.min(remaining))?;
        self.document.refresh_summaries();
        Ok(())
    }

    /// Stores one value and refreshes summary columns.
    pub fn set_value(
        &mut self,
        row: RowId,
        column_index: usize,
        value: OutlineValue,
    ) -> OutlineServiceResult<()> {
        self.document.set_value(row, column_index, value)?;
        self.document.refresh_summaries();
        Ok(())
    }

    pub fn set_note(&mut self, row: RowId, note: StyledText) -> OutlineServiceResult<()> {
        self.ensure_row(row)?;
        if let Some(target) = self.document.row_mut(row) {
            target.set_note(note);
        }
        Ok(())
    }

    /// Sets `row` and its descendants to `state`, then recombines ancestors.
    pub fn set_checked_state(
        &mut self,
        row: RowId,
        state: CheckedState,
    ) -> OutlineServiceResult<()> {
        self.ensure_row(row)?;
        let mut targets = self.document.descendants(row);
        targets.push(row);
        for id in targets {
            if let Some(target) = self.document.row_mut(id) {
                target.set_checked_state(state);
            }
        }

        let root = self.document.root();
        let mut cursor = self.document.parent_for_row(row);
        while let Some(ancestor) = cursor {
            if ancestor == root {
                break;
            }
            let combined = CheckedState::combine(
                self.document
                    .children(ancestor)
                    .iter()
                    .filter_map(|child| self.document.row(*child))
                    .map(|child| child.checked_state()),
            );
            if let (Some(combined), Some(target)) = (combined, self.document.row_mut(ancestor)) {
                target.set_checked_state(combined);
            }
            cursor = self.document.parent_for_row(ancestor);
        }
        Ok(())
    }

    fn ensure_row(&self, row: RowId) -> OutlineServiceResult<()> {
        if row == self.document.root() {
            return Err(OutlineServiceError::RootRowImmutable);
        }
        if self.document.row(row).is_none() {
            return Err(OutlineServiceError::RowNotFound(row));
        }
        Ok(())
    }

    /// Parent and child index of a non-root row.
    fn position_of(&self, row: RowId) -> OutlineServiceResult<(RowId, usize)> {
        self.ensure_row(row)?;
        let parent = self
            .document
            .parent_for_row(row)
            .ok_or(OutlineServiceError::RowNotFound(row))?;
        let index = self
            .document
            .children(parent)
            .iter()
            .position(|child| *child == row)
            .ok_or(OutlineServiceError::RowNotFound(row))?;
        Ok((parent, index))
    }

    fn has_selected_ancestor(&self, start: RowId, selected: &HashSet<RowId>) -> bool {
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            if selected.contains(&current) {
                return true;
            }
            cursor = self.document.parent_for_row(current);
        }
        false
    }
}
