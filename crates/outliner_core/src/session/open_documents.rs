//! Registry of documents currently open in this process.
//!
//! # Responsibility
//! - Track open documents without keeping them alive.
//! - Resolve a row identifier across every open document.
//!
//! # Invariants
//! - The registry holds only weak references; dropping the last
//!   `SharedDocument` removes the document from every later snapshot.
//! - Snapshots are independent of the registry, so callers may register or
//!   close documents while iterating one.
//! - A poisoned lock is recovered, never propagated as a panic.

use crate::model::document::OutlineDocument;
use crate::model::row::RowId;
use log::debug;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};

/// Document handle shared between the registry and its host.
pub type SharedDocument = Arc<Mutex<OutlineDocument>>;

static OPEN_DOCUMENTS: Lazy<Mutex<Vec<Weak<Mutex<OutlineDocument>>>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

fn registry() -> MutexGuard<'static, Vec<Weak<Mutex<OutlineDocument>>>> {
    OPEN_DOCUMENTS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Wraps `document` in a shared handle and registers it.
pub fn register_open_document(document: OutlineDocument) -> SharedDocument {
    let shared = Arc::new(Mutex::new(document));
    let mut entries = registry();
    entries.retain(|entry| entry.strong_count() > 0);
    entries.push(Arc::downgrade(&shared));
    debug!(
        "event=document_registered module=session status=ok open_documents={}",
        entries.len()
    );
    shared
}

/// Removes `document` from the registry. Returns `false` when it was not registered.
pub fn close_document(document: &SharedDocument) -> bool {
    let mut entries = registry();
    let target = Arc::as_ptr(document);
    let closed = entries
        .iter()
        .any(|entry| std::ptr::eq(entry.as_ptr(), target));
    entries.retain(|entry| entry.strong_count() > 0 && !std::ptr::eq(entry.as_ptr(), target));
    debug!(
        "event=document_closed module=session status={} open_documents={}",
        if closed { "ok" } else { "not_registered" },
        entries.len()
    );
    closed
}

/// Strong handles to every live registered document, in registration order.
pub fn open_documents() -> Vec<SharedDocument> {
    let mut entries = registry();
    entries.retain(|entry| entry.strong_count() > 0);
    entries.iter().filter_map(Weak::upgrade).collect()
}

/// First open document holding a row named `identifier`.
///
/// Documents locked elsewhere (including by the caller) are skipped.
pub fn find_row_in_open_documents(identifier: &str) -> Option<(SharedDocument, RowId)> {
    for document in open_documents() {
        let found = match document.try_lock() {
            Ok(guard) => guard.row_by_identifier(identifier),
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().row_by_identifier(identifier)
            }
            Err(TryLockError::WouldBlock) => continue,
        };
        if let Some(row) = found {
            return Some((document, row));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{close_document, open_documents, register_open_document};
    use crate::model::document::OutlineDocument;
    use std::sync::Arc;

    #[test]
    fn dropped_documents_leave_later_snapshots() {
        let kept = register_open_document(OutlineDocument::new());
        let dropped = register_open_document(OutlineDocument::new());
        drop(dropped);

        let snapshot = open_documents();
        assert!(snapshot.iter().any(|document| Arc::ptr_eq(document, &kept)));
        assert!(close_document(&kept));
        assert!(!close_document(&kept));
    }
}
