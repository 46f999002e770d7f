//! Outline document model.
//!
//! # Responsibility
//! - Define rows, columns, typed values and the document aggregate.
//! - Keep one authoritative owning tree: the document owns every row.
//!
//! # Invariants
//! - Rows refer to each other only through `RowId` handles.
//! - Styles are referred to only through `StyleId` handles into the
//!   document's registry.

pub mod column;
pub mod document;
pub mod formatter;
pub mod identifier;
pub mod row;
pub mod summary;
pub mod text;
pub mod value;
