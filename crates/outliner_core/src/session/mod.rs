//! Process-wide session state shared by hosts.

pub mod open_documents;

pub use open_documents::{
    close_document, find_row_in_open_documents, open_documents, register_open_document,
    SharedDocument,
};
