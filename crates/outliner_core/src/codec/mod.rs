//! Document container codecs and their shared error model.
//!
//! # Responsibility
//! - Define the load/save error taxonomy shared by every XML/plist reader.
//! - Provide save options and the per-load recovery report.
//! - Sniff containers (plain OO3, gzip OO3, OO2 plist) on open.
//!
//! # Invariants
//! - A `CodecError` always aborts the whole-document load.
//! - Recoverable conditions are reported through `LoadReport`, never errors.

pub mod oo2;
pub mod oo3;

use crate::model::document::OutlineDocument;
use crate::xml::XmlError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that abort a document load or save.
#[derive(Debug)]
pub enum CodecError {
    /// Required child element is absent.
    MissingElement {
        parent: String,
        element: String,
    },
    /// Child element is not valid at this position.
    UnexpectedElement {
        parent: String,
        element: String,
    },
    /// Required attribute is absent.
    MissingAttribute {
        element: String,
        attribute: String,
    },
    /// Attribute value cannot be interpreted.
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    InvalidNumber(String),
    InvalidDate(String),
    InvalidCheckState(String),
    /// Value references an enumeration member its column does not declare.
    UnknownEnumeration {
        column: String,
        id: String,
    },
    /// Row carries more values than the document has columns.
    TooManyValues {
        row: String,
        expected: usize,
        found: usize,
    },
    DuplicateRowIdentifier(String),
    DuplicateColumnIdentifier(String),
    DuplicateEnumerationMember {
        column: String,
        id: String,
    },
    DuplicateNamedStyle(String),
    /// `inherited-style` refers to a named style that does not exist.
    UnresolvedStyleReference(String),
    /// Named styles inherit from each other in a loop.
    CyclicStyleReference(String),
    /// Column minimum width exceeds its maximum width.
    InvalidColumnWidths {
        column: String,
        min: u32,
        max: u32,
    },
    MultipleNoteColumns,
    UnsupportedVersion(String),
    /// Bytes are neither OO3 XML, gzip, nor an OO2 property list.
    UnrecognizedContainer,
    /// OO2 property list has an unexpected shape.
    LegacyStructure(String),
    Xml(XmlError),
    Io(std::io::Error),
    Plist(plist::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingElement { parent, element } => {
                write!(f, "missing `{element}` element in `{parent}`")
            }
            Self::UnexpectedElement { parent, element } => {
                write!(f, "unexpected `{element}` element in `{parent}`")
            }
            Self::MissingAttribute { element, attribute } => {
                write!(f, "missing `{attribute}` attribute on `{element}`")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "invalid `{attribute}` attribute on `{element}`: `{value}`"
            ),
            Self::InvalidNumber(value) => write!(f, "invalid number value `{value}`"),
            Self::InvalidDate(value) => write!(f, "invalid date value `{value}`"),
            Self::InvalidCheckState(value) => write!(f, "invalid checkbox value `{value}`"),
            Self::UnknownEnumeration { column, id } => {
                write!(f, "column `{column}` has no enumeration member `{id}`")
            }
            Self::TooManyValues {
                row,
                expected,
                found,
            } => write!(
                f,
                "row `{row}` has {found} values but the document has {expected} columns"
            ),
            Self::DuplicateRowIdentifier(id) => write!(f, "duplicate row identifier `{id}`"),
            Self::DuplicateColumnIdentifier(id) => {
                write!(f, "duplicate column identifier `{id}`")
            }
            Self::DuplicateEnumerationMember { column, id } => {
                write!(f, "column `{column}` declares enumeration member `{id}` twice")
            }
            Self::DuplicateNamedStyle(id) => write!(f, "duplicate named style `{id}`"),
            Self::UnresolvedStyleReference(id) => {
                write!(f, "style references unknown named style `{id}`")
            }
            Self::CyclicStyleReference(id) => {
                write!(f, "named style `{id}` inherits from itself")
            }
            Self::InvalidColumnWidths { column, min, max } => write!(
                f,
                "column `{column}` minimum width {min} exceeds maximum width {max}"
            ),
            Self::MultipleNoteColumns => write!(f, "document declares more than one note column"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported outline version `{version}`")
            }
            Self::UnrecognizedContainer => write!(f, "unrecognized outline container format"),
            Self::LegacyStructure(reason) => write!(f, "malformed legacy outline: {reason}"),
            Self::Xml(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "outline io failed: {err}"),
            Self::Plist(err) => write!(f, "outline property list error: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Plist(err) => Some(err),
            _ => None,
        }
    }
}

impl From<XmlError> for CodecError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

impl From<std::io::Error> for CodecError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<plist::Error> for CodecError {
    fn from(value: plist::Error) -> Self {
        Self::Plist(value)
    }
}

/// Serialization switches for OO3 output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Wrap the XML in a gzip stream.
    pub compress: bool,
    /// Indent element-only content.
    pub pretty: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress: false,
            pretty: true,
        }
    }
}

/// Recoverable conditions met while loading one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Identifiers of rows that had fewer values than columns.
    pub padded_rows: Vec<String>,
    /// Row identifiers that were invalid and got replaced.
    pub regenerated_identifiers: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.padded_rows.is_empty() && self.regenerated_identifiers.is_empty()
    }
}

/// Container detected from leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Xml,
    Gzip,
    BinaryPlist,
    XmlPlist,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BINARY_PLIST_MAGIC: &[u8] = b"bplist";

/// Detects the container kind of raw document bytes.
pub fn sniff_container(bytes: &[u8]) -> CodecResult<ContainerKind> {
    if bytes.starts_with(&GZIP_MAGIC) {
        return Ok(ContainerKind::Gzip);
    }
    if bytes.starts_with(BINARY_PLIST_MAGIC) {
        return Ok(ContainerKind::BinaryPlist);
    }
    let head_len = bytes.len().min(512);
    let head = String::from_utf8_lossy(&bytes[..head_len]);
    if head.contains("<plist") || head.contains("PropertyList-1.0.dtd") {
        return Ok(ContainerKind::XmlPlist);
    }
    if head.trim_start_matches('\u{feff}').trim_start().starts_with('<') {
        return Ok(ContainerKind::Xml);
    }
    Err(CodecError::UnrecognizedContainer)
}

impl OutlineDocument {
    /// Opens any supported container: OO3 XML (plain or gzip) or an OO2 plist.
    ///
    /// # Errors
    /// - Returns `UnrecognizedContainer` when the bytes match no known format.
    /// - Propagates the selected reader's errors.
    pub fn open_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let container = sniff_container(bytes)?;
        info!(
            "event=document_open module=codec status=start container={:?} bytes={}",
            container,
            bytes.len()
        );
        match container {
            ContainerKind::Xml | ContainerKind::Gzip => Self::from_oo3_bytes(bytes),
            ContainerKind::BinaryPlist | ContainerKind::XmlPlist => Self::from_oo2_plist(bytes),
        }
    }

    /// Reads and opens the document at `path`.
    pub fn load_from_path(path: impl AsRef<Path>) -> CodecResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::open_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{sniff_container, CodecError, ContainerKind, SaveOptions};

    #[test]
    fn sniff_detects_each_container() {
        assert_eq!(
            sniff_container(b"<?xml version=\"1.0\"?><outline/>").unwrap(),
            ContainerKind::Xml
        );
        assert_eq!(
            sniff_container(&[0x1f, 0x8b, 0x08, 0x00]).unwrap(),
            ContainerKind::Gzip
        );
        assert_eq!(
            sniff_container(b"bplist00....").unwrap(),
            ContainerKind::BinaryPlist
        );
        assert_eq!(
            sniff_container(b"<?xml version=\"1.0\"?>\n<plist version=\"1.0\"><dict/></plist>")
                .unwrap(),
            ContainerKind::XmlPlist
        );
        assert!(matches!(
            sniff_container(b"hello").unwrap_err(),
            CodecError::UnrecognizedContainer
        ));
    }

    #[test]
    fn default_save_options_are_plain_pretty_xml() {
        let options = SaveOptions::default();
        assert!(!options.compress);
        assert!(options.pretty);
    }
}
