//! Outline document aggregate.
//!
//! # Responsibility
//! - Own the row arena, the synthetic root row, columns and the style registry.
//! - Keep the identifier lookup table and parent links consistent with the tree.
//!
//! # Invariants
//! - Every row identifier is unique within the document.
//! - `root` is never serialized as a row and cannot be moved or removed.
//! - Every row (root included) holds exactly one value per column.
//! - Removing a row removes its whole subtree from the arena and the lookup table.

use crate::codec::{CodecError, LoadReport};
use crate::model::column::{ColumnType, OutlineColumn};
use crate::model::identifier::{
    generate_identifier, generate_unique_identifier, is_valid_identifier,
};
use crate::model::row::{OutlineRow, RowId};
use crate::model::text::StyledText;
use crate::model::value::{OutlineValue, ValueError};
use crate::style::{StyleAttributes, StyleId, StyleRegistry};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from structural document edits.
#[derive(Debug)]
pub enum DocumentError {
    /// Row handle is stale or belongs to another document.
    RowNotFound(RowId),
    /// The synthetic root row cannot be edited structurally.
    RootRowImmutable,
    /// Move would place a row under itself or one of its descendants.
    CycleDetected { row: RowId, parent: RowId },
    DuplicateIdentifier(String),
    InvalidIdentifier(String),
    Value(ValueError),
    Codec(CodecError),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowNotFound(row) => write!(f, "row not found: {row}"),
            Self::RootRowImmutable => write!(f, "the root row cannot be edited"),
            Self::CycleDetected { row, parent } => {
                write!(f, "move would create cycle: {row} under {parent}")
            }
            Self::DuplicateIdentifier(id) => write!(f, "row identifier `{id}` is already used"),
            Self::InvalidIdentifier(id) => write!(f, "invalid row identifier `{id}`"),
            Self::Value(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Value(err) => Some(err),
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValueError> for DocumentError {
    fn from(value: ValueError) -> Self {
        Self::Value(value)
    }
}

impl From<CodecError> for DocumentError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Persisted window frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct OutlineDocument {
    pub(crate) rows: HashMap<RowId, OutlineRow>,
    pub(crate) identifiers: HashMap<String, RowId>,
    pub(crate) root: RowId,
    pub(crate) next_row: u64,
    pub(crate) columns: Vec<OutlineColumn>,
    pub(crate) note_column: OutlineColumn,
    pub(crate) style_registry: StyleRegistry,
    pub(crate) document_style: StyleId,
    pub(crate) title_style: StyleId,
    pub(crate) window_size: Option<WindowSize>,
    pub(crate) load_report: LoadReport,
}

impl Default for OutlineDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineDocument {
    /// Creates an empty document with one outline (topic) column.
    pub fn new() -> Self {
        let mut registry = StyleRegistry::new();
        let root_style = registry.root();
        let document_style = registry.allocate_style(root_style, &StyleAttributes::new());
        let title_style = registry.allocate_style(document_style, &StyleAttributes::new());
        let note_style = registry.allocate_style(document_style, &StyleAttributes::new());
        let note_column = OutlineColumn::note_column(generate_identifier(), note_style);

        let mut document = Self::with_parts(registry, document_style, title_style, note_column);
        let topic = document.add_column("Topic", ColumnType::Text);
        document.columns[topic].set_outline_column(true);
        document
    }

    /// Document with no columns and an empty root, used by the loaders.
    pub(crate) fn with_parts(
        style_registry: StyleRegistry,
        document_style: StyleId,
        title_style: StyleId,
        note_column: OutlineColumn,
    ) -> Self {
        let root = RowId(0);
        let mut rows = HashMap::new();
        rows.insert(root, OutlineRow::new(String::new(), None, 0));
        Self {
            rows,
            identifiers: HashMap::new(),
            root,
            next_row: 1,
            columns: Vec::new(),
            note_column,
            style_registry,
            document_style,
            title_style,
            window_size: None,
            load_report: LoadReport::default(),
        }
    }

    pub fn root(&self) -> RowId {
        self.root
    }

    pub fn row(&self, id: RowId) -> Option<&OutlineRow> {
        self.rows.get(&id)
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut OutlineRow> {
        self.rows.get_mut(&id)
    }

    pub fn row_by_identifier(&self, identifier: &str) -> Option<RowId> {
        self.identifiers.get(identifier).copied()
    }

    /// Number of rows, excluding the root.
    pub fn row_count(&self) -> usize {
        self.rows.len() - 1
    }

    /// Every row in display order (pre-order), excluding the root.
    pub fn all_rows(&self) -> Vec<RowId> {
        self.descendants(self.root)
    }

    /// Parent of `id`; top-level rows report the root. O(1).
    pub fn parent_for_row(&self, id: RowId) -> Option<RowId> {
        self.rows.get(&id).and_then(OutlineRow::parent)
    }

    /// Children of `id`; empty for stale handles.
    pub fn children(&self, id: RowId) -> &[RowId] {
        self.rows
            .get(&id)
            .map(OutlineRow::children)
            .unwrap_or_default()
    }

    /// Pre-order descendants of `id`, excluding `id`.
    pub fn descendants(&self, id: RowId) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut stack: Vec<RowId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is `row` or lies on its parent chain.
    pub fn is_same_or_ancestor(&self, ancestor: RowId, row: RowId) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(row);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            cursor = self.parent_for_row(current);
        }
        false
    }

    pub fn columns(&self) -> &[OutlineColumn] {
        &self.columns
    }

    /// # Panics
    /// Panics when `index` is out of range.
    pub fn column(&self, index: usize) -> &OutlineColumn {
        &self.columns[index]
    }

    /// # Panics
    /// Panics when `index` is out of range.
    pub fn column_mut(&mut self, index: usize) -> &mut OutlineColumn {
        &mut self.columns[index]
    }

    pub fn column_index(&self, identifier: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.identifier() == identifier)
    }

    pub fn note_column(&self) -> &OutlineColumn {
        &self.note_column
    }

    pub fn style_registry(&self) -> &StyleRegistry {
        &self.style_registry
    }

    pub fn style_registry_mut(&mut self) -> &mut StyleRegistry {
        &mut self.style_registry
    }

    pub fn document_style(&self) -> StyleId {
        self.document_style
    }

    pub fn title_style(&self) -> StyleId {
        self.title_style
    }

    pub fn window_size(&self) -> Option<WindowSize> {
        self.window_size
    }

    pub fn set_window_size(&mut self, size: Option<WindowSize>) {
        self.window_size = size;
    }

    /// Recoverable conditions met while this document was loaded.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Appends a column and gives every row a placeholder for it.
    pub fn add_column(&mut self, title: &str, column_type: ColumnType) -> usize {
        let style = self
            .style_registry
            .allocate_style(self.document_style, &StyleAttributes::new());
        let identifier = generate_unique_identifier(|candidate| {
            self.column_index(candidate).is_some() || self.note_column.identifier() == candidate
        });
        let mut column = OutlineColumn::new(identifier, column_type, style);
        column.set_title(StyledText::plain(title, self.title_style));
        self.push_column(column)
    }

    pub(crate) fn push_column(&mut self, column: OutlineColumn) -> usize {
        self.columns.push(column);
        for row in self.rows.values_mut() {
            row.values.push(OutlineValue::Placeholder);
        }
        self.columns.len() - 1
    }

    pub(crate) fn fresh_identifier(&self) -> String {
        generate_unique_identifier(|candidate| self.identifiers.contains_key(candidate))
    }

    /// Allocates a detached row; the caller links it into the tree.
    pub(crate) fn allocate_row(&mut self, identifier: String, parent: RowId) -> RowId {
        let id = RowId(self.next_row);
        self.next_row += 1;
        self.identifiers.insert(identifier.clone(), id);
        self.rows
            .insert(id, OutlineRow::new(identifier, Some(parent), self.columns.len()));
        id
    }

    pub(crate) fn link_child(&mut self, parent: RowId, child: RowId, index: usize) {
        if let Some(row) = self.rows.get_mut(&parent) {
            row.children.insert(index, child);
        }
        if let Some(row) = self.rows.get_mut(&child) {
            row.parent = Some(parent);
        }
    }

    fn unlink_child(&mut self, child: RowId) {
        let Some(parent) = self.parent_for_row(child) else {
            return;
        };
        if let Some(row) = self.rows.get_mut(&parent) {
            row.children.retain(|id| *id != child);
        }
    }

    fn ensure_editable(&self, id: RowId) -> DocumentResult<()> {
        if id == self.root {
            return Err(DocumentError::RootRowImmutable);
        }
        if !self.rows.contains_key(&id) {
            return Err(DocumentError::RowNotFound(id));
        }
        Ok(())
    }

    /// Inserts a new empty row as child `index` of `parent`.
    ///
    /// # Errors
    /// - Returns `RowNotFound` when `parent` is stale.
    ///
    /// # Panics
    /// Panics when `index` exceeds the parent's child count.
    pub fn insert_row(&mut self, parent: RowId, index: usize) -> DocumentResult<RowId> {
        let child_count = self
            .rows
            .get(&parent)
            .ok_or(DocumentError::RowNotFound(parent))?
            .children
            .len();
        assert!(
            index <= child_count,
            "insertion index {index} exceeds child count {child_count}"
        );
        let identifier = self.fresh_identifier();
        let id = self.allocate_row(identifier, parent);
        self.link_child(parent, id, index);
        Ok(id)
    }

    /// Removes `id` and its subtree.
    ///
    /// # Errors
    /// - Returns `RootRowImmutable` for the root and `RowNotFound` for stale handles.
    pub fn remove_row(&mut self, id: RowId) -> DocumentResult<()> {
        self.ensure_editable(id)?;
        self.unlink_child(id);
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for row_id in doomed {
            if let Some(row) = self.rows.remove(&row_id) {
                if self.identifiers.get(&row.identifier) == Some(&row_id) {
                    self.identifiers.remove(&row.identifier);
                }
            }
        }
        Ok(())
    }

    /// Moves `id` to child position `index` of `new_parent`.
    ///
    /// `index` is interpreted after `id` has been detached from its old parent.
    ///
    /// # Errors
    /// - Returns `RootRowImmutable`, `RowNotFound`, or `CycleDetected`.
    ///
    /// # Panics
    /// Panics when `index` exceeds the new parent's child count.
    pub fn move_row(&mut self, id: RowId, new_parent: RowId, index: usize) -> DocumentResult<()> {
        self.ensure_editable(id)?;
        if !self.rows.contains_key(&new_parent) {
            return Err(DocumentError::RowNotFound(new_parent));
        }
        if self.is_same_or_ancestor(id, new_parent) {
            return Err(DocumentError::CycleDetected {
                row: id,
                parent: new_parent,
            });
        }

        self.unlink_child(id);
        let child_count = self.children(new_parent).len();
        assert!(
            index <= child_count,
            "insertion index {index} exceeds child count {child_count}"
        );
        self.link_child(new_parent, id, index);
        Ok(())
    }

    /// Renames one row identifier.
    ///
    /// # Errors
    /// - Returns `InvalidIdentifier` or `DuplicateIdentifier` for unusable names.
    pub fn set_row_identifier(&mut self, id: RowId, identifier: &str) -> DocumentResult<()> {
        self.ensure_editable(id)?;
        if !is_valid_identifier(identifier) {
            return Err(DocumentError::InvalidIdentifier(identifier.to_string()));
        }
        match self.identifiers.get(identifier) {
            Some(existing) if *existing == id => return Ok(()),
            Some(_) => return Err(DocumentError::DuplicateIdentifier(identifier.to_string())),
            None => {}
        }
        let Some(row) = self.rows.get_mut(&id) else {
            return Err(DocumentError::RowNotFound(id));
        };
        let old = std::mem::replace(&mut row.identifier, identifier.to_string());
        self.identifiers.remove(&old);
        self.identifiers.insert(identifier.to_string(), id);
        Ok(())
    }

    /// Value of `row` in column `column_index`; `None` for stale rows.
    ///
    /// # Panics
    /// Panics when `column_index` is out of range.
    pub fn value(&self, row: RowId, column_index: usize) -> Option<&OutlineValue> {
        self.rows.get(&row).map(|row| row.value(column_index))
    }

    /// Validates and stores one value.
    ///
    /// # Errors
    /// - Returns `RootRowImmutable`/`RowNotFound` for unusable rows.
    /// - Returns `Value` when the value does not fit the column.
    ///
    /// # Panics
    /// Panics when `column_index` is out of range.
    pub fn set_value(
        &mut self,
        row: RowId,
        column_index: usize,
        raw: OutlineValue,
    ) -> DocumentResult<()> {
        self.ensure_editable(row)?;
        let value = OutlineValue::with_value(raw, &self.columns[column_index])?;
        if let Some(target) = self.rows.get_mut(&row) {
            target.values[column_index] = value;
        }
        Ok(())
    }

    /// Summary of `row`'s children in `column_index`; `None` without a summary.
    ///
    /// # Panics
    /// Panics when `column_index` is out of range.
    pub fn compute_summary(&self, row: RowId, column_index: usize) -> Option<OutlineValue> {
        let kind = self.columns[column_index].summary()?;
        Some(kind.compute_summary_for_row(self, row, column_index))
    }

    /// Stores fresh summaries in every parent row of every summarized column.
    pub fn refresh_summaries(&mut self) {
        // Reverse pre-order visits every child before its parent.
        let order: Vec<RowId> = self.all_rows().into_iter().rev().collect();
        for column_index in 0..self.columns.len() {
            let Some(kind) = self.columns[column_index].summary() else {
                continue;
            };
            for id in &order {
                let children = self.children(*id);
                if children.is_empty() {
                    continue;
                }
                let values: Vec<OutlineValue> = children
                    .iter()
                    .filter_map(|child| self.value(*child, column_index).cloned())
                    .collect();
                let summary = kind.summarize(values);
                if let Some(row) = self.rows.get_mut(id) {
                    row.values[column_index] = summary;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentError, OutlineDocument};
    use crate::model::column::ColumnType;

    #[test]
    fn new_document_has_topic_column_and_empty_root() {
        let document = OutlineDocument::new();
        assert_eq!(document.columns().len(), 1);
        assert!(document.column(0).is_outline_column());
        assert!(document.note_column().is_note_column());
        assert_eq!(document.row_count(), 0);
        assert!(document.parent_for_row(document.root()).is_none());
    }

    #[test]
    fn add_column_pads_existing_rows() {
        let mut document = OutlineDocument::new();
        let root = document.root();
        let row = document.insert_row(root, 0).unwrap();
        let index = document.add_column("Cost", ColumnType::Number);
        assert_eq!(index, 1);
        assert!(document.value(row, 1).unwrap().is_placeholder());
    }

    #[test]
    fn move_rejects_cycles_and_root() {
        let mut document = OutlineDocument::new();
        let root = document.root();
        let parent = document.insert_row(root, 0).unwrap();
        let child = document.insert_row(parent, 0).unwrap();

        assert!(matches!(
            document.move_row(parent, child, 0),
            Err(DocumentError::CycleDetected { .. })
        ));
        assert!(matches!(
            document.move_row(root, parent, 0),
            Err(DocumentError::RootRowImmutable)
        ));

        document.move_row(child, root, 1).unwrap();
        assert_eq!(document.children(root), &[parent, child]);
        assert_eq!(document.parent_for_row(child), Some(root));
    }

    #[test]
    fn remove_drops_subtree_and_identifiers() {
        let mut document = OutlineDocument::new();
        let root = document.root();
        let parent = document.insert_row(root, 0).unwrap();
        let child = document.insert_row(parent, 0).unwrap();
        let child_identifier = document.row(child).unwrap().identifier().to_string();

        document.remove_row(parent).unwrap();
        assert!(document.row(child).is_none());
        assert!(document.row_by_identifier(&child_identifier).is_none());
        assert_eq!(document.row_count(), 0);
        assert!(matches!(
            document.remove_row(parent),
            Err(DocumentError::RowNotFound(_))
        ));
    }

    #[test]
    fn set_row_identifier_validates_and_reindexes() {
        let mut document = OutlineDocument::new();
        let root = document.root();
        let first = document.insert_row(root, 0).unwrap();
        let second = document.insert_row(root, 1).unwrap();

        document.set_row_identifier(first, "intro").unwrap();
        assert_eq!(document.row_by_identifier("intro"), Some(first));
        assert!(matches!(
            document.set_row_identifier(second, "intro"),
            Err(DocumentError::DuplicateIdentifier(_))
        ));
        assert!(matches!(
            document.set_row_identifier(second, "has space"),
            Err(DocumentError::InvalidIdentifier(_))
        ));
    }
}
