//! Core engine for OO3 outline documents.
//! This crate owns the document model, its style cascade and the file codecs.

pub mod codec;
pub mod logging;
pub mod model;
pub mod service;
pub mod session;
pub mod style;
pub mod xml;

pub use codec::{sniff_container, CodecError, CodecResult, ContainerKind, LoadReport, SaveOptions};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::column::{ColumnError, ColumnType, EnumerationMember, OutlineColumn};
pub use model::document::{DocumentError, DocumentResult, OutlineDocument, WindowSize};
pub use model::formatter::ColumnFormatter;
pub use model::row::{OutlineRow, RowId};
pub use model::summary::SummaryKind;
pub use model::text::{StyledText, TextRun};
pub use model::value::{CheckedState, OutlineDate, OutlineValue, ValueError};
pub use service::{OutlineService, OutlineServiceError, OutlineServiceResult};
pub use session::{
    close_document, find_row_in_open_documents, open_documents, register_open_document,
    SharedDocument,
};
pub use style::{Color, StyleAttributes, StyleId, StyleRegistry, StyleValue};
pub use xml::{XmlElement, XmlError};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
