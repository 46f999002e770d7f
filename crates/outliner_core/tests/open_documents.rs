use outliner_core::{
    close_document, find_row_in_open_documents, open_documents, register_open_document,
    OutlineDocument,
};
use std::sync::{Arc, Mutex, MutexGuard};

// Snapshots hold strong handles; registry tests run serially.
static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    REGISTRY_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn document_with_row(identifier: &str) -> OutlineDocument {
    let mut document = OutlineDocument::new();
    let root = document.root();
    let row = document.insert_row(root, 0).unwrap();
    document.set_row_identifier(row, identifier).unwrap();
    document
}

#[test]
fn snapshots_survive_registry_changes() {
    let _serial = serial();
    let first = register_open_document(OutlineDocument::new());
    let snapshot = open_documents();
    assert!(snapshot.iter().any(|document| Arc::ptr_eq(document, &first)));

    // Closing while holding a snapshot leaves the snapshot intact.
    assert!(close_document(&first));
    assert!(snapshot.iter().any(|document| Arc::ptr_eq(document, &first)));
    assert!(!open_documents()
        .iter()
        .any(|document| Arc::ptr_eq(document, &first)));
}

#[test]
fn dropping_the_last_handle_unregisters_the_document() {
    let _serial = serial();
    let shared = register_open_document(document_with_row("dropped-row"));
    assert!(find_row_in_open_documents("dropped-row").is_some());

    drop(shared);
    assert!(find_row_in_open_documents("dropped-row").is_none());
}

#[test]
fn rows_are_found_across_open_documents() {
    let _serial = serial();
    let plans = register_open_document(document_with_row("plans-intro"));
    let notes = register_open_document(document_with_row("notes-intro"));

    let (found, row) = find_row_in_open_documents("notes-intro").unwrap();
    assert!(Arc::ptr_eq(&found, &notes));
    let guard = found.lock().unwrap();
    assert_eq!(guard.row(row).unwrap().identifier(), "notes-intro");
    drop(guard);

    assert!(find_row_in_open_documents("missing-row").is_none());
    close_document(&plans);
    close_document(&notes);
}

#[test]
fn documents_locked_by_the_caller_are_skipped() {
    let _serial = serial();
    let shared = register_open_document(document_with_row("locked-row"));
    {
        let _guard = shared.lock().unwrap();
        assert!(find_row_in_open_documents("locked-row").is_none());
    }
    assert!(find_row_in_open_documents("locked-row").is_some());
    close_document(&shared);
}
