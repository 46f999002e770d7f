//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate document edits into use-case level APIs.
//! - Keep host/CLI layers decoupled from arena bookkeeping.

pub mod outline_service;

pub use outline_service::{OutlineService, OutlineServiceError, OutlineServiceResult};
