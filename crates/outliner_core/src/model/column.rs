//! Outline column metadata.
//!
//! # Responsibility
//! - Describe one column: type, widths, formatter, enumeration table,
//!   summary strategy and default style.
//! - Read and write the OO3 `<column>` element.
//!
//! # Invariants
//! - `min_width <= width <= max_width`.
//! - Enumeration members exist only on enumeration columns and have unique ids.
//! - A summary is only attached when it supports the column type.

use crate::codec::{CodecError, CodecResult};
use crate::model::formatter::ColumnFormatter;
use crate::model::identifier::generate_identifier;
use crate::model::summary::SummaryKind;
use crate::model::text::StyledText;
use crate::model::value::{CheckedState, OutlineValue};
use crate::style::{StyleAttributes, StyleId, StyleRegistry};
use crate::xml::{parse_yes_no, yes_no, XmlElement};
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_WIDTH: u32 = 200;
pub const DEFAULT_MIN_WIDTH: u32 = 13;
pub const DEFAULT_MAX_WIDTH: u32 = 1_000_000;

/// Kind of data stored in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Enumeration,
    CheckBox,
}

impl ColumnType {
    pub fn as_oo3_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Enumeration => "enumeration",
            Self::CheckBox => "checkbox",
        }
    }

    pub fn from_oo3_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "rich-text" => Some(Self::Text),
            "number" | "numeric" => Some(Self::Number),
            "date" => Some(Self::Date),
            "enumeration" | "enum" | "popup" => Some(Self::Enumeration),
            "checkbox" | "check-box" => Some(Self::CheckBox),
            _ => None,
        }
    }
}

/// One entry of an enumeration column's member table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationMember {
    pub id: String,
    pub label: StyledText,
}

/// Errors from editor-path column changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    UnsupportedSummary {
        summary: SummaryKind,
        column_type: ColumnType,
    },
    InvalidWidths {
        min: u32,
        max: u32,
    },
    NotEnumeration(ColumnType),
    DuplicateEnumerationMember(String),
}

impl Display for ColumnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSummary {
                summary,
                column_type,
            } => write!(
                f,
                "`{}` summary does not support {} columns",
                summary.as_oo3_str(),
                column_type.as_oo3_str()
            ),
            Self::InvalidWidths { min, max } => {
                write!(f, "minimum width {min} exceeds maximum width {max}")
            }
            Self::NotEnumeration(column_type) => write!(
                f,
                "{} column has no enumeration table",
                column_type.as_oo3_str()
            ),
            Self::DuplicateEnumerationMember(id) => {
                write!(f, "enumeration member `{id}` already exists")
            }
        }
    }
}

impl Error for ColumnError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineColumn {
    identifier: String,
    title: StyledText,
    column_type: ColumnType,
    width: u32,
    min_width: u32,
    max_width: u32,
    text_export_width: Option<u32>,
    formatter: Option<ColumnFormatter>,
    enumeration: Vec<EnumerationMember>,
    summary: Option<SummaryKind>,
    style: StyleId,
    is_note_column: bool,
    is_outline_column: bool,
}

impl OutlineColumn {
    /// Creates a column whose style is `style` (owned by the document registry).
    pub fn new(identifier: impl Into<String>, column_type: ColumnType, style: StyleId) -> Self {
        Self {
            identifier: identifier.into(),
            title: StyledText::new(),
            column_type,
            width: DEFAULT_WIDTH,
            min_width: DEFAULT_MIN_WIDTH,
            max_width: DEFAULT_MAX_WIDTH,
            text_export_width: None,
            formatter: None,
            enumeration: Vec::new(),
            summary: None,
            style,
            is_note_column: false,
            is_outline_column: false,
        }
    }

    /// Text column reserved for note styling.
    pub fn note_column(identifier: impl Into<String>, style: StyleId) -> Self {
        Self {
            is_note_column: true,
            ..Self::new(identifier, ColumnType::Text, style)
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &StyledText {
        &self.title
    }

    pub fn set_title(&mut self, title: StyledText) {
        self.title = title;
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Sets the width, clamped into the column's limits.
    pub fn set_width(&mut self, width: u32) {
        self.width = width.clamp(self.min_width, self.max_width);
    }

    /// Sets width limits and re-clamps the current width.
    ///
    /// # Errors
    /// - Returns `InvalidWidths` when `min > max`.
    pub fn set_width_limits(&mut self, min: u32, max: u32) -> Result<(), ColumnError> {
        if min > max {
            return Err(ColumnError::InvalidWidths { min, max });
        }
        self.min_width = min;
        self.max_width = max;
        self.width = self.width.clamp(min, max);
        Ok(())
    }

    pub fn text_export_width(&self) -> Option<u32> {
        self.text_export_width
    }

    pub fn set_text_export_width(&mut self, width: Option<u32>) {
        self.text_export_width = width;
    }

    pub fn formatter(&self) -> Option<&ColumnFormatter> {
        self.formatter.as_ref()
    }

    pub fn set_formatter(&mut self, formatter: Option<ColumnFormatter>) {
        self.formatter = formatter;
    }

    pub fn enumeration(&self) -> &[EnumerationMember] {
        &self.enumeration
    }

    pub fn enumeration_member(&self, id: &str) -> Option<&EnumerationMember> {
        self.enumeration.iter().find(|member| member.id == id)
    }

    /// Appends one enumeration member.
    ///
    /// # Errors
    /// - Returns `NotEnumeration` on non-enumeration columns.
    /// - Returns `DuplicateEnumerationMember` when `id` exists.
    pub fn add_enumeration_member(
        &mut self,
        id: impl Into<String>,
        label: StyledText,
    ) -> Result<(), ColumnError> {
        if self.column_type != ColumnType::Enumeration {
            return Err(ColumnError::NotEnumeration(self.column_type));
        }
        let id = id.into();
        if self.enumeration_member(&id).is_some() {
            return Err(ColumnError::DuplicateEnumerationMember(id));
        }
        self.enumeration.push(EnumerationMember { id, label });
        Ok(())
    }

    pub fn summary(&self) -> Option<SummaryKind> {
        self.summary
    }

    /// # Errors
    /// - Returns `UnsupportedSummary` when `summary` cannot aggregate this column type.
    pub fn set_summary(&mut self, summary: Option<SummaryKind>) -> Result<(), ColumnError> {
        if let Some(kind) = summary {
            if !kind.supports(self.column_type) {
                return Err(ColumnError::UnsupportedSummary {
                    summary: kind,
                    column_type: self.column_type,
                });
            }
        }
        self.summary = summary;
        Ok(())
    }

    pub fn style(&self) -> StyleId {
        self.style
    }

    pub fn is_note_column(&self) -> bool {
        self.is_note_column
    }

    pub fn is_outline_column(&self) -> bool {
        self.is_outline_column
    }

    pub fn set_outline_column(&mut self, is_outline_column: bool) {
        self.is_outline_column = is_outline_column;
    }

    /// Fully resolved attributes every value in this column starts from.
    pub fn default_style(&self, registry: &StyleRegistry) -> StyleAttributes {
        registry.resolve(self.style)
    }

    /// Renders a value through this column's formatter.
    pub fn display_string(&self, value: &OutlineValue) -> String {
        match value {
            OutlineValue::Placeholder => String::new(),
            OutlineValue::Text(text) => text.string(),
            OutlineValue::Number(number) => match &self.formatter {
                Some(formatter) => formatter.format_number(*number),
                None => number.to_string(),
            },
            OutlineValue::Date(date) => match &self.formatter {
                Some(formatter) => formatter.format_date(date),
                None => ColumnFormatter::date("%Y-%m-%d %H:%M:%S").format_date(date),
            },
            OutlineValue::Enumeration { label, .. } => label.string(),
            OutlineValue::CheckBox(state) => match state {
                CheckedState::Checked => "[x]".to_string(),
                CheckedState::Unchecked => "[ ]".to_string(),
                CheckedState::Indeterminate => "[-]".to_string(),
            },
        }
    }

    /// Reads one `<column>`.
    ///
    /// Column styles cascade from `document_style`; titles from `title_style`.
    ///
    /// # Errors
    /// - Returns `MissingAttribute`/`InvalidAttribute` for a bad `type`, width or flag.
    /// - Returns `InvalidColumnWidths` when the minimum exceeds the maximum.
    /// - Returns `DuplicateEnumerationMember` for repeated member ids.
    pub fn from_oo3_xml(
        element: &XmlElement,
        registry: &mut StyleRegistry,
        document_style: StyleId,
        title_style: StyleId,
    ) -> CodecResult<Self> {
        let identifier = match element.attribute("identifier") {
            Some(identifier) if !identifier.trim().is_empty() => identifier.to_string(),
            _ => {
                let generated = generate_identifier();
                warn!(
                    "event=column_identifier_generated module=model status=recovered identifier={}",
                    generated
                );
                generated
            }
        };
        let raw_type = element
            .attribute("type")
            .ok_or_else(|| CodecError::MissingAttribute {
                element: "column".to_string(),
                attribute: "type".to_string(),
            })?;
        let column_type =
            ColumnType::from_oo3_str(raw_type).ok_or_else(|| invalid("type", raw_type))?;

        let style = registry.partial_style_for_oo3_xml(element.element_for_name("style")?, document_style)?;
        let mut column = Self::new(identifier, column_type, style);

        let min = width_attribute(element, "minimum-width")?.unwrap_or(DEFAULT_MIN_WIDTH);
        let max = width_attribute(element, "maximum-width")?.unwrap_or(DEFAULT_MAX_WIDTH);
        if min > max {
            return Err(CodecError::InvalidColumnWidths {
                column: column.identifier.clone(),
                min,
                max,
            });
        }
        column.min_width = min;
        column.max_width = max;
        column.set_width(width_attribute(element, "width")?.unwrap_or(DEFAULT_WIDTH));
        column.text_export_width = width_attribute(element, "text-export-width")?;
        column.is_note_column = flag_attribute(element, "note-column")?;
        column.is_outline_column = flag_attribute(element, "outline-column")?;

        if let Some(raw) = element.attribute("summary") {
            match SummaryKind::from_oo3_str(raw) {
                Some(kind) if kind.supports(column_type) => column.summary = Some(kind),
                _ => warn!(
                    "event=column_summary_dropped module=model status=skipped column={} summary={}",
                    column.identifier, raw
                ),
            }
        }

        for child in element.child_elements() {
            match child.name() {
                "style" => {}
                "title" => {
                    if let Some(text) = child.element_for_name("text")? {
                        column.title = StyledText::from_oo3_xml(text, registry, title_style)?;
                    }
                }
                "formatter" => column.formatter = ColumnFormatter::from_oo3_xml(child)?,
                "enumerations" if column_type == ColumnType::Enumeration => {
                    column.read_enumerations(child, registry)?;
                }
                other => warn!(
                    "event=column_element_skipped module=model status=skipped column={} element={}",
                    column.identifier, other
                ),
            }
        }

        Ok(column)
    }

    fn read_enumerations(
        &mut self,
        element: &XmlElement,
        registry: &mut StyleRegistry,
    ) -> CodecResult<()> {
        for member in element.elements_named("member") {
            let id = member
                .attribute("id")
                .ok_or_else(|| CodecError::MissingAttribute {
                    element: "member".to_string(),
                    attribute: "id".to_string(),
                })?
                .to_string();
            if self.enumeration_member(&id).is_some() {
                return Err(CodecError::DuplicateEnumerationMember {
                    column: self.identifier.clone(),
                    id,
                });
            }
            let label = match member.element_for_name("text")? {
                Some(text) => StyledText::from_oo3_xml(text, registry, self.style)?,
                None => StyledText::new(),
            };
            self.enumeration.push(EnumerationMember { id, label });
        }
        Ok(())
    }

    /// Writes one `<column>`.
    pub fn to_oo3_xml(&self, registry: &StyleRegistry, title_style: StyleId) -> XmlElement {
        let mut element = XmlElement::new("column")
            .with_attribute("identifier", self.identifier.as_str())
            .with_attribute("type", self.column_type.as_oo3_str())
            .with_attribute("width", self.width.to_string())
            .with_attribute("minimum-width", self.min_width.to_string())
            .with_attribute("maximum-width", self.max_width.to_string());
        if let Some(width) = self.text_export_width {
            element.set_attribute("text-export-width", width.to_string());
        }
        if let Some(summary) = self.summary {
            element.set_attribute("summary", summary.as_oo3_str());
        }
        if self.is_note_column {
            element.set_attribute("note-column", yes_no(true));
        }
        if self.is_outline_column {
            element.set_attribute("outline-column", yes_no(true));
        }

        if !registry.style(self.style).is_empty() {
            element.push_child(registry.style_to_oo3_xml(self.style));
        }
        if !self.title.is_empty() {
            element.push_child(
                XmlElement::new("title").with_child(self.title.to_oo3_xml(registry, title_style)),
            );
        }
        if let Some(formatter) = &self.formatter {
            element.push_child(formatter.to_oo3_xml());
        }
        if self.column_type == ColumnType::Enumeration && !self.enumeration.is_empty() {
            let mut enumerations = XmlElement::new("enumerations");
            for member in &self.enumeration {
                enumerations.push_child(
                    XmlElement::new("member")
                        .with_attribute("id", member.id.as_str())
                        .with_child(member.label.to_oo3_xml(registry, self.style)),
                );
            }
            element.push_child(enumerations);
        }
        element
    }
}

fn invalid(attribute: &str, value: &str) -> CodecError {
    CodecError::InvalidAttribute {
        element: "column".to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

fn width_attribute(element: &XmlElement, name: &str) -> CodecResult<Option<u32>> {
    match element.attribute(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, raw)),
        None => Ok(None),
    }
}

fn flag_attribute(element: &XmlElement, name: &str) -> CodecResult<bool> {
    match element.attribute(name) {
        Some(raw) => parse_yes_no(raw).ok_or_else(|| invalid(name, raw)),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnError, ColumnType, OutlineColumn};
    use crate::codec::CodecError;
    use crate::model::summary::SummaryKind;
    use crate::model::text::StyledText;
    use crate::style::StyleRegistry;
    use crate::xml::XmlElement;

    #[test]
    fn width_is_clamped_into_limits() {
        let registry = StyleRegistry::new();
        let mut column = OutlineColumn::new("c1", ColumnType::Number, registry.root());
        column.set_width_limits(50, 80).unwrap();
        column.set_width(500);
        assert_eq!(column.width(), 80);
        assert_eq!(
            column.set_width_limits(9, 3),
            Err(ColumnError::InvalidWidths { min: 9, max: 3 })
        );
    }

    #[test]
    fn summary_must_support_column_type() {
        let registry = StyleRegistry::new();
        let mut column = OutlineColumn::new("c1", ColumnType::Text, registry.root());
        assert!(matches!(
            column.set_summary(Some(SummaryKind::Sum)),
            Err(ColumnError::UnsupportedSummary { .. })
        ));
        assert!(column.set_summary(None).is_ok());
    }

    #[test]
    fn enumeration_members_only_on_enumeration_columns() {
        let registry = StyleRegistry::new();
        let root = registry.root();
        let mut text = OutlineColumn::new("c1", ColumnType::Text, root);
        assert_eq!(
            text.add_enumeration_member("a", StyledText::plain("A", root)),
            Err(ColumnError::NotEnumeration(ColumnType::Text))
        );

        let mut status = OutlineColumn::new("c2", ColumnType::Enumeration, root);
        status
            .add_enumeration_member("a", StyledText::plain("A", root))
            .unwrap();
        assert!(matches!(
            status.add_enumeration_member("a", StyledText::new()),
            Err(ColumnError::DuplicateEnumerationMember(_))
        ));
    }

    #[test]
    fn parse_rejects_inverted_limits_and_drops_bad_summary() {
        let mut registry = StyleRegistry::new();
        let root = registry.root();
        let inverted = XmlElement::parse(
            r#"<column identifier="c" type="number" minimum-width="90" maximum-width="10"/>"#,
        )
        .unwrap();
        assert!(matches!(
            OutlineColumn::from_oo3_xml(&inverted, &mut registry, root, root).unwrap_err(),
            CodecError::InvalidColumnWidths { min: 90, max: 10, .. }
        ));

        let text = XmlElement::parse(
            r#"<column identifier="c" type="text" width="5000" maximum-width="300" summary="sum"/>"#,
        )
        .unwrap();
        let column = OutlineColumn::from_oo3_xml(&text, &mut registry, root, root).unwrap();
        assert_eq!(column.width(), 300);
        assert_eq!(column.summary(), None);
    }
}
