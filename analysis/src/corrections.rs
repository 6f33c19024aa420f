//! Correction table — per-file fixes from the most recent analysis pass.
//!
//! Each entry holds an immutable [`CorrectionMap`] snapshot that a pass
//! replaces wholesale, plus a [`PublishHandle`] for the pass that will next
//! (or last did) publish for the file. Readers load snapshots without
//! locking; the table lock is only held to find or insert an entry.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::protocol::normalize_document_uri;
use crate::types::Fix;

/// Issue identity → fix.
pub type CorrectionMap = HashMap<String, Fix>;

/// Awaitable completion of one publish operation.
///
/// Resolves when the owning pass finishes, is superseded during its debounce
/// wait, or is dropped (e.g. the task panicked).
#[derive(Debug, Clone)]
pub struct PublishHandle {
    rx: watch::Receiver<bool>,
}

impl PublishHandle {
    /// A handle that has already resolved.
    #[must_use]
    pub fn completed() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    pub(crate) fn pending() -> (PublishSignal, Self) {
        let (tx, rx) = watch::channel(false);
        (PublishSignal { tx }, Self { rx })
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // An error means the signal was dropped, which also ends the wait.
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Completing side of a [`PublishHandle`]. Completes on drop.
#[derive(Debug)]
pub(crate) struct PublishSignal {
    tx: watch::Sender<bool>,
}

impl PublishSignal {
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for PublishSignal {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Corrections and publish state for one document.
#[derive(Debug)]
pub struct CorrectionEntry {
    corrections: ArcSwap<CorrectionMap>,
    publish: ArcSwap<PublishHandle>,
}

impl CorrectionEntry {
    fn new() -> Self {
        Self {
            corrections: ArcSwap::from_pointee(CorrectionMap::new()),
            publish: ArcSwap::from_pointee(PublishHandle::completed()),
        }
    }

    /// Current fixes. The snapshot is shared; later passes never mutate it.
    #[must_use]
    pub fn corrections(&self) -> Arc<CorrectionMap> {
        self.corrections.load_full()
    }

    #[must_use]
    pub fn pending_publish(&self) -> PublishHandle {
        PublishHandle::clone(&self.publish.load())
    }

    pub(crate) fn set_pending_publish(&self, handle: PublishHandle) {
        self.publish.store(Arc::new(handle));
    }

    /// Install the fixes of a completed pass, discarding the previous ones.
    pub(crate) fn replace(&self, corrections: CorrectionMap) {
        self.corrections.store(Arc::new(corrections));
    }

    pub(crate) fn clear(&self) {
        self.replace(CorrectionMap::new());
    }
}

/// Document URI → [`CorrectionEntry`].
///
/// URIs are keyed in normalized form, so an escaped drive colon and its
/// plain spelling name the same entry.
#[derive(Debug, Default)]
pub struct CorrectionTable {
    entries: RwLock<HashMap<String, Arc<CorrectionEntry>>>,
}

impl CorrectionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<CorrectionEntry>> {
        self.entries
            .read()
            .get(normalize_document_uri(uri).as_ref())
            .cloned()
    }

    /// Look up the entry for `uri`, creating an empty one on first use.
    pub fn get_or_create(&self, uri: &str) -> Arc<CorrectionEntry> {
        if let Some(entry) = self.get(uri) {
            return entry;
        }
        Arc::clone(
            self.entries
                .write()
                .entry(normalize_document_uri(uri).into_owned())
                .or_insert_with(|| Arc::new(CorrectionEntry::new())),
        )
    }

    /// Drop the entry for a closed document.
    pub fn remove(&self, uri: &str) -> bool {
        self.entries
            .write()
            .remove(normalize_document_uri(uri).as_ref())
            .is_some()
    }

    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.entries.read().keys().cloned().collect();
        uris.sort();
        uris
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
