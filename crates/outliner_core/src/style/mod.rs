//! Cascading style attributes.

pub mod keys;
pub mod registry;

pub use keys::{Color, StyleAttributes, StyleKey, StyleValue};
pub use registry::{NamedStyle, PartialStyle, StyleError, StyleId, StyleRegistry};
