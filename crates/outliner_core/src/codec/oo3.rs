//! OO3 XML document codec.
//!
//! # Responsibility
//! - Parse `<outline version="3">` into an `OutlineDocument` and write it back.
//! - Handle the optional gzip container.
//! - Transfer row subtrees between documents through OO3 XML.
//!
//! # Invariants
//! - Row values are read by position against the document column list.
//! - Values are written in each row's stored order.
//! - The synthetic root row is never written as a `<row>`.

use crate::codec::{CodecError, CodecResult, SaveOptions};
use crate::model::column::OutlineColumn;
use crate::model::document::{DocumentError, DocumentResult, OutlineDocument, WindowSize};
use crate::model::identifier::{generate_unique_identifier, is_valid_identifier};
use crate::model::row::RowId;
use crate::model::text::StyledText;
use crate::model::value::{CheckedState, OutlineValue};
use crate::style::{StyleId, StyleRegistry};
use crate::xml::{parse_yes_no, yes_no, XmlElement, XmlError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, info, warn};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

const OUTLINE_VERSION: &str = "3";

impl OutlineDocument {
    /// Parses OO3 XML text.
    ///
    /// # Errors
    /// - Returns `CodecError` on XML syntax errors or format corruption.
    pub fn from_oo3_xml(text: &str) -> CodecResult<Self> {
        let element = XmlElement::parse(text)?;
        Self::from_oo3_element(&element)
    }

    /// Parses OO3 bytes, unwrapping gzip when present.
    ///
    /// # Errors
    /// - Returns `CodecError` on invalid gzip, UTF-8, XML or format corruption.
    pub fn from_oo3_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let inflated;
        let plain = if bytes.starts_with(&[0x1f, 0x8b]) {
            let mut decoder = GzDecoder::new(bytes);
            let mut buffer = Vec::new();
            decoder.read_to_end(&mut buffer)?;
            inflated = buffer;
            inflated.as_slice()
        } else {
            bytes
        };
        let text = std::str::from_utf8(plain).map_err(|_| XmlError::Utf8("document".to_string()))?;
        Self::from_oo3_xml(text)
    }

    /// Builds a document from a parsed `<outline>` element.
    ///
    /// # Errors
    /// - Returns `MissingElement` when `<columns>` or `<root>` is absent.
    /// - Returns any column, row or value corruption found while reading.
    pub fn from_oo3_element(element: &XmlElement) -> CodecResult<Self> {
        let started_at = Instant::now();
        match Self::read_outline(element) {
            Ok(document) => {
                info!(
                    "event=document_load module=codec status=ok format=oo3 rows={} columns={} padded_rows={} duration_ms={}",
                    document.row_count(),
                    document.columns().len(),
                    document.load_report().padded_rows.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(document)
            }
            Err(err) => {
                error!(
                    "event=document_load module=codec status=error format=oo3 duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn read_outline(element: &XmlElement) -> CodecResult<Self> {
        if element.name() != "outline" {
            return Err(CodecError::UnexpectedElement {
                parent: "document".to_string(),
                element: element.name().to_string(),
            });
        }
        if let Some(version) = element.attribute("version") {
            if version.trim() != OUTLINE_VERSION {
                return Err(CodecError::UnsupportedVersion(version.to_string()));
            }
        }

        let mut registry = StyleRegistry::from_oo3_xml(element)?;
        let root_style = registry.root();
        let document_style =
            registry.partial_style_for_oo3_xml(element.element_for_name("style")?, root_style)?;
        let title_style = match element.element_for_name("title-style")? {
            Some(title) => {
                registry.partial_style_for_oo3_xml(title.element_for_name("style")?, document_style)?
            }
            None => registry.partial_style_for_oo3_xml(None, document_style)?,
        };

        let columns_element = required_child(element, "columns")?;
        let mut columns = Vec::new();
        let mut note_column: Option<OutlineColumn> = None;
        let mut seen = HashSet::new();
        for child in columns_element.child_elements() {
            if child.name() != "column" {
                warn!(
                    "event=columns_element_skipped module=codec status=skipped element={}",
                    child.name()
                );
                continue;
            }
            let column =
                OutlineColumn::from_oo3_xml(child, &mut registry, document_style, title_style)?;
            if !seen.insert(column.identifier().to_string()) {
                return Err(CodecError::DuplicateColumnIdentifier(
                    column.identifier().to_string(),
                ));
            }
            if column.is_note_column() {
                if note_column.is_some() {
                    return Err(CodecError::MultipleNoteColumns);
                }
                note_column = Some(column);
            } else {
                columns.push(column);
            }
        }
        let note_column = match note_column {
            Some(column) => column,
            None => {
                let style = registry.partial_style_for_oo3_xml(None, document_style)?;
                let identifier = generate_unique_identifier(|candidate| {
                    seen.contains(candidate)
                });
                OutlineColumn::note_column(identifier, style)
            }
        };

        let mut document =
            OutlineDocument::with_parts(registry, document_style, title_style, note_column);
        for column in columns {
            document.push_column(column);
        }

        if let Some(window) = element.element_for_name("window")? {
            document.window_size = Some(WindowSize {
                width: dimension(window, "width")?,
                height: dimension(window, "height")?,
            });
        }

        let root_element = required_child(element, "root")?;
        let root = document.root();
        for child in root_element.child_elements() {
            match child.name() {
                "row" => {
                    document.read_row(child, root)?;
                }
                other => warn!(
                    "event=root_element_skipped module=codec status=skipped element={}",
                    other
                ),
            }
        }

        Ok(document)
    }

    fn read_row(&mut self, element: &XmlElement, parent: RowId) -> CodecResult<RowId> {
        let identifier = match element.attribute("id") {
            Some(raw) if is_valid_identifier(raw) => {
                if self.identifiers.contains_key(raw) {
                    return Err(CodecError::DuplicateRowIdentifier(raw.to_string()));
                }
                raw.to_string()
            }
            raw => {
                let fresh = self.fresh_identifier();
                warn!(
                    "event=row_identifier_regenerated module=codec status=recovered had_identifier={} identifier={}",
                    raw.is_some(),
                    fresh
                );
                self.load_report.regenerated_identifiers.push(fresh.clone());
                fresh
            }
        };

        let is_expanded = row_flag(element, "expanded")?;
        let is_note_expanded = row_flag(element, "note-expanded")?;
        let checked_state = match element.attribute("state") {
            Some(raw) => CheckedState::from_oo3_str(raw)
                .ok_or_else(|| CodecError::InvalidCheckState(raw.to_string()))?,
            None => CheckedState::default(),
        };

        let column_count = self.columns.len();
        let mut values = Vec::with_capacity(column_count);
        if let Some(values_element) = element.element_for_name("values")? {
            let found = values_element.child_elements().count();
            if found > column_count {
                return Err(CodecError::TooManyValues {
                    row: identifier,
                    expected: column_count,
                    found,
                });
            }
            for (index, value_element) in values_element.child_elements().enumerate() {
                values.push(OutlineValue::from_oo3_xml(
                    value_element,
                    &self.columns[index],
                    &mut self.style_registry,
                )?);
            }
        }
        let values_padded = values.len() < column_count;
        if values_padded {
            warn!(
                "event=row_values_padded module=codec status=recovered identifier={} found={} expected={}",
                identifier,
                values.len(),
                column_count
            );
            values.resize(column_count, OutlineValue::Placeholder);
            self.load_report.padded_rows.push(identifier.clone());
        }

        let note = match element.element_for_name("note")? {
            Some(note) => match note.element_for_name("text")? {
                Some(text) => {
                    let base = self.note_column.style();
                    StyledText::from_oo3_xml(text, &mut self.style_registry, base)?
                }
                None => StyledText::new(),
            },
            None => StyledText::new(),
        };

        let position = self.children(parent).len();
        let id = self.allocate_row(identifier, parent);
        self.link_child(parent, id, position);
        if let Some(row) = self.rows.get_mut(&id) {
            row.values = values;
            row.values_padded = values_padded;
            row.set_note(note);
            row.set_checked_state(checked_state);
            row.set_expanded(is_expanded);
            row.set_note_expanded(is_note_expanded);
        }

        for child in element.child_elements() {
            match child.name() {
                "row" => {
                    self.read_row(child, id)?;
                }
                "values" | "note" => {}
                other => warn!(
                    "event=row_element_skipped module=codec status=skipped element={}",
                    other
                ),
            }
        }

        Ok(id)
    }

    /// Writes the whole document as an `<outline>` element.
    pub fn to_oo3_element(&self) -> XmlElement {
        self.outline_element(self.children(self.root))
    }

    /// Serializes the document as OO3 XML text.
    ///
    /// # Errors
    /// - Returns `CodecError::Xml` when the writer fails.
    pub fn to_oo3_xml(&self, pretty: bool) -> CodecResult<String> {
        Ok(self.to_oo3_element().to_document_string(pretty)?)
    }

    /// Serializes the document, gzip-wrapped when `options.compress` is set.
    ///
    /// # Errors
    /// - Returns `CodecError` when XML writing or compression fails.
    pub fn to_oo3_bytes(&self, options: SaveOptions) -> CodecResult<Vec<u8>> {
        let text = self.to_oo3_xml(options.pretty)?;
        if !options.compress {
            return Ok(text.into_bytes());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes())?;
        Ok(encoder.finish()?)
    }

    /// Writes the document to `path` in OO3 format.
    ///
    /// # Errors
    /// - Returns `CodecError::Io` when the file cannot be written.
    pub fn save_to_path(&self, path: impl AsRef<Path>, options: SaveOptions) -> CodecResult<()> {
        let started_at = Instant::now();
        let bytes = self.to_oo3_bytes(options)?;
        match std::fs::write(path.as_ref(), &bytes) {
            Ok(()) => {
                info!(
                    "event=document_save module=codec status=ok compressed={} bytes={} duration_ms={}",
                    options.compress,
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=document_save module=codec status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Writes the given rows and their subtrees as a standalone `<outline>`.
    ///
    /// Stale handles and rows already covered by an ancestor in `rows` are skipped.
    pub fn subtree_to_oo3_xml(&self, rows: &[RowId]) -> XmlElement {
        let selected: HashSet<RowId> = rows.iter().copied().collect();
        let top: Vec<RowId> = rows
            .iter()
            .copied()
            .filter(|id| *id != self.root && self.rows.contains_key(id))
            .filter(|id| {
                let mut cursor = self.parent_for_row(*id);
                while let Some(ancestor) = cursor {
                    if selected.contains(&ancestor) {
                        return false;
                    }
                    cursor = self.parent_for_row(ancestor);
                }
                true
            })
            .collect();
        self.outline_element(&top)
    }

    fn outline_element(&self, top: &[RowId]) -> XmlElement {
        let registry = &self.style_registry;
        let mut outline = XmlElement::new("outline").with_attribute("version", OUTLINE_VERSION);
        for element in registry.to_oo3_xml() {
            outline.push_child(element);
        }
        if let Some(size) = self.window_size {
            outline.push_child(
                XmlElement::new("window")
                    .with_attribute("width", size.width.to_string())
                    .with_attribute("height", size.height.to_string()),
            );
        }
        if !registry.style(self.document_style).is_empty() {
            outline.push_child(registry.style_to_oo3_xml(self.document_style));
        }
        if !registry.style(self.title_style).is_empty() {
            outline.push_child(
                XmlElement::new("title-style").with_child(registry.style_to_oo3_xml(self.title_style)),
            );
        }

        let mut columns = XmlElement::new("columns");
        for column in &self.columns {
            columns.push_child(column.to_oo3_xml(registry, self.title_style));
        }
        columns.push_child(self.note_column.to_oo3_xml(registry, self.title_style));
        outline.push_child(columns);

        let mut root = XmlElement::new("root");
        for id in top {
            if let Some(row) = self.write_row(*id) {
                root.push_child(row);
            }
        }
        outline.push_child(root);
        outline
    }

    fn write_row(&self, id: RowId) -> Option<XmlElement> {
        let row = self.row(id)?;
        let registry = &self.style_registry;
        let mut element = XmlElement::new("row").with_attribute("id", row.identifier());
        if row.is_expanded() {
            element.set_attribute("expanded", yes_no(true));
        }
        if row.is_note_expanded() {
            element.set_attribute("note-expanded", yes_no(true));
        }
        if row.checked_state() != CheckedState::Unchecked {
            element.set_attribute("state", row.checked_state().as_oo3_str());
        }

        if !row.values().is_empty() {
            let mut values = XmlElement::new("values");
            for (index, value) in row.values().iter().enumerate() {
                values.push_child(value.to_oo3_xml(&self.columns[index], registry));
            }
            element.push_child(values);
        }
        if !row.note().is_empty() {
            element.push_child(
                XmlElement::new("note")
                    .with_child(row.note().to_oo3_xml(registry, self.note_column.style())),
            );
        }
        for child in row.children() {
            if let Some(child) = self.write_row(*child) {
                element.push_child(child);
            }
        }
        Some(element)
    }

    /// Materializes rows written by [`OutlineDocument::subtree_to_oo3_xml`]
    /// (possibly from another document) as children of `parent` at `index`.
    ///
    /// Columns are matched by identifier, then by position when types agree.
    /// Unmatched values stay placeholders. Identifiers already used here are
    /// replaced with fresh ones.
    ///
    /// # Errors
    /// - Returns `RowNotFound` when `parent` is stale.
    /// - Returns `Codec` when the XML is not a valid outline.
    ///
    /// # Panics
    /// Panics when `index` exceeds the parent's child count.
    pub fn insert_rows_from_oo3_xml(
        &mut self,
        element: &XmlElement,
        parent: RowId,
        index: usize,
    ) -> DocumentResult<Vec<RowId>> {
        let child_count = self
            .rows
            .get(&parent)
            .ok_or(DocumentError::RowNotFound(parent))?
            .children()
            .len();
        assert!(
            index <= child_count,
            "insertion index {index} exceeds child count {child_count}"
        );

        let source = OutlineDocument::from_oo3_element(element)?;
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                source
                    .column_index(column.identifier())
                    .or_else(|| (position < source.columns.len()).then_some(position))
                    .filter(|found| source.columns[*found].column_type() == column.column_type())
            })
            .collect();

        let mut inserted = Vec::new();
        for (offset, top) in source.children(source.root()).iter().enumerate() {
            inserted.push(self.import_row(&source, *top, parent, index + offset, &mapping));
        }
        info!(
            "event=rows_imported module=codec status=ok top_level={} total_rows={}",
            inserted.len(),
            source.row_count()
        );
        Ok(inserted)
    }

    fn import_row(
        &mut self,
        source: &OutlineDocument,
        source_id: RowId,
        parent: RowId,
        position: usize,
        mapping: &[Option<usize>],
    ) -> RowId {
        let identifier = match source.row(source_id) {
            Some(row) if !self.identifiers.contains_key(row.identifier()) => {
                row.identifier().to_string()
            }
            _ => self.fresh_identifier(),
        };
        let id = self.allocate_row(identifier, parent);
        self.link_child(parent, id, position);

        let Some(source_row) = source.row(source_id) else {
            return id;
        };
        let values: Vec<OutlineValue> = mapping
            .iter()
            .enumerate()
            .map(|(index, source_index)| match source_index {
                Some(source_index) => self.import_value(
                    source,
                    source_row.value(*source_index),
                    source.column(*source_index),
                    index,
                ),
                None => OutlineValue::Placeholder,
            })
            .collect();
        let note = self.import_text(
            source,
            source_row.note(),
            source.note_column().style(),
            self.note_column.style(),
        );

        if let Some(row) = self.rows.get_mut(&id) {
            row.values = values;
            row.set_note(note);
            row.set_checked_state(source_row.checked_state());
            row.set_expanded(source_row.is_expanded());
            row.set_note_expanded(source_row.is_note_expanded());
        }

        for (offset, child) in source_row.children().iter().enumerate() {
            self.import_row(source, *child, id, offset, mapping);
        }
        id
    }

    fn import_value(
        &mut self,
        source: &OutlineDocument,
        value: &OutlineValue,
        source_column: &OutlineColumn,
        column_index: usize,
    ) -> OutlineValue {
        match value {
            OutlineValue::Text(text) => {
                let base = self.columns[column_index].style();
                OutlineValue::Text(self.import_text(source, text, source_column.style(), base))
            }
            OutlineValue::Enumeration { id, .. } => {
                match self.columns[column_index].enumeration_member(id) {
                    Some(member) => OutlineValue::Enumeration {
                        id: id.clone(),
                        label: member.label.clone(),
                    },
                    None => {
                        warn!(
                            "event=enumeration_value_dropped module=codec status=skipped column={} id={}",
                            self.columns[column_index].identifier(),
                            id
                        );
                        OutlineValue::Placeholder
                    }
                }
            }
            other => other.clone(),
        }
    }

    /// Re-creates runs under `base`, keeping only what differed from `source_base`.
    fn import_text(
        &mut self,
        source: &OutlineDocument,
        text: &StyledText,
        source_base: StyleId,
        base: StyleId,
    ) -> StyledText {
        let source_registry = source.style_registry();
        let source_defaults = source_registry.resolve(source_base);
        let mut imported = StyledText::new();
        for run in text.runs() {
            if run.style == source_base {
                imported.push(run.text.as_str(), base);
                continue;
            }
            let mut attributes = self.style_registry.resolve(base);
            for (key, value) in source_registry.resolve(run.style) {
                if source_defaults.get(key) != Some(&value) {
                    attributes.insert(key, value);
                }
            }
            let style = self
                .style_registry
                .partial_style_from_attributes(&attributes, base);
            imported.push(run.text.as_str(), style);
        }
        imported
    }
}

fn required_child<'a>(element: &'a XmlElement, name: &str) -> CodecResult<&'a XmlElement> {
    element
        .element_for_name(name)?
        .ok_or_else(|| CodecError::MissingElement {
            parent: element.name().to_string(),
            element: name.to_string(),
        })
}

fn dimension(element: &XmlElement, name: &str) -> CodecResult<u32> {
    let raw = element
        .attribute(name)
        .ok_or_else(|| CodecError::MissingAttribute {
            element: element.name().to_string(),
            attribute: name.to_string(),
        })?;
    raw.trim()
        .parse()
        .map_err(|_| CodecError::InvalidAttribute {
            element: element.name().to_string(),
            attribute: name.to_string(),
            value: raw.to_string(),
        })
}

fn row_flag(element: &XmlElement, name: &str) -> CodecResult<bool> {
    match element.attribute(name) {
        Some(raw) => parse_yes_no(raw).ok_or_else(|| CodecError::InvalidAttribute {
            element: "row".to_string(),
            attribute: name.to_string(),
            value: raw.to_string(),
        }),
        None => Ok(false),
    }
}
