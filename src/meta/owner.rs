// src/meta/owner.rs

//! A generic, atomically-swappable container for one of the five
//! versioned cluMeta documents.
//!
//! Readers take an immutable `Arc` snapshot and never block a writer;
//! at most one writer may be mid-`modify` at a time per owner.

use crate::errors::CpError;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// A cluMeta sub-document that carries a monotonic version counter.
pub trait VersionedDoc: Clone {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);

    fn bump_version(&mut self) {
        self.set_version(self.version() + 1);
    }
}

/// Owns exactly one versioned document, enforcing single-writer
/// mutation and publish-by-swap semantics.
pub struct Owner<T: VersionedDoc> {
    current: RwLock<Arc<T>>,
    write_lock: AsyncMutex<()>,
}

impl<T: VersionedDoc> Owner<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Returns a consistent, immutable snapshot of the current document.
    pub fn get(&self) -> Arc<T> {
        self.current.read().clone()
    }

    /// Replaces the document unconditionally, without bumping the
    /// version — used when wholesale-adopting a foreign cluster's
    /// documents during force-join.
    pub fn install(&self, doc: T) {
        *self.current.write() = Arc::new(doc);
    }

    /// Replaces the document iff its current version matches
    /// `expected_version`, returning the prior snapshot for inspection
    /// (rollback uses this to restore an exact prior state).
    pub fn compare_and_set(&self, expected_version: u64, new: T) -> Result<Arc<T>, CpError> {
        let mut guard = self.current.write();
        if guard.version() != expected_version {
            return Err(CpError::Internal(format!(
                "compare-and-set failed: expected version {expected_version}, found {}",
                guard.version()
            )));
        }
        let prior = guard.clone();
        *guard = Arc::new(new);
        Ok(prior)
    }

    /// Clones the current document, lets `pre` mutate (or abort) it,
    /// bumps the version on success, publishes, then — once the write
    /// lock has been released — invokes `final_cb` with the published
    /// snapshot. Only one `modify` may be in flight at a time.
    pub async fn modify<P, F>(&self, pre: P, final_cb: Option<F>) -> Result<Arc<T>, CpError>
    where
        P: FnOnce(&mut T) -> Result<(), CpError>,
        F: FnOnce(Arc<T>),
    {
        let guard = self.write_lock.lock().await;
        let mut clone = (*self.current.read()).as_ref().clone();
        pre(&mut clone)?;
        clone.bump_version();
        let published = Arc::new(clone);
        *self.current.write() = published.clone();
        drop(guard);

        if let Some(cb) = final_cb {
            cb(published.clone());
        }
        Ok(published)
    }
}
