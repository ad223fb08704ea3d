//! # Conditional Request Coordinator
//!
//! Serializes mutations per document. Each [`DocumentKey`] has its own
//! `tokio::sync::RwLock`, held exclusively for the whole
//! load, check, change, validate, persist sequence:
//!
//! 1. load `{content, tag}` from the store
//! 2. evaluate `If-Match` / `If-None-Match` against the loaded tag
//! 3. let the caller derive the new content from the loaded content
//! 4. validate the new content with the application usage
//! 5. write it back, passing the loaded tag as the expected tag
//!
//! Any failure before step 5 leaves the stored document untouched.
//! Lock entries are held weakly and pruned once no request uses them.

use crate::error::XcapError;
use crate::preconditions::{PreconditionOutcome, Preconditions};
use crate::store::{DocumentKey, EntityTag, Store, StoreError, StoredDocument};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use xcap_appusage::ApplicationUsage;
use xcap_document::XmlTree;
use xcap_uri::DocumentSelector;

/// New state of a document, derived from its loaded content
#[derive(Debug, Clone)]
pub enum Change {
    /// Replace the stored content
    Write(Arc<XmlTree>),
    /// Replace the stored content; the change created a node
    Insert(Arc<XmlTree>),
    /// Delete the document
    Remove,
}

/// Outcome of a committed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Tag of the new content, `None` after a removal
    pub tag: Option<EntityTag>,
    /// Whether the document or node did not exist before
    pub created: bool,
}

type DocumentLock = Arc<RwLock<()>>;

pub struct Coordinator {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<DocumentKey, Weak<RwLock<()>>>>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Number of lock entries currently tracked
    pub fn lock_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }

    /// Get or create the lock of a document
    fn lock_for(&self, key: &DocumentKey) -> DocumentLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(key).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(RwLock::new(()));
        locks.insert(key.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Load a document. Takes the shared side of the document's lock unless
    /// the store reads atomic snapshots.
    pub async fn read(&self, key: &DocumentKey) -> Result<Option<StoredDocument>, XcapError> {
        if self.store.snapshot_reads() {
            return self.store.get(key).await.map_err(|e| store_failure(key, e));
        }

        let lock = self.lock_for(key);
        let _guard = lock.read().await;
        self.store.get(key).await.map_err(|e| store_failure(key, e))
    }

    /// Run one mutation of the document addressed by `selector`.
    ///
    /// `change` receives the current content (`None` when the document does
    /// not exist) after the preconditions passed.
    #[instrument(skip_all, fields(auid = %selector.auid, document = %selector.document))]
    pub async fn mutate<F>(
        &self,
        selector: &DocumentSelector,
        usage: &ApplicationUsage,
        preconditions: &Preconditions,
        change: F,
    ) -> Result<Committed, XcapError>
    where
        F: FnOnce(Option<Arc<XmlTree>>) -> Result<Change, XcapError> + Send,
    {
        let key = DocumentKey::from(selector);
        let lock = self.lock_for(&key);
        let _guard = lock.write().await;

        let loaded = self.store.get(&key).await.map_err(|e| store_failure(&key, e))?;
        let current_tag = loaded.as_ref().map(|doc| doc.tag.clone());
        debug!(exists = loaded.is_some(), "loaded document");

        match preconditions.evaluate(current_tag.as_ref()) {
            PreconditionOutcome::Pass => {}
            outcome => {
                warn!(?outcome, key = %key, "precondition failed");
                return Err(XcapError::PreconditionFailed);
            }
        }

        let existed = loaded.is_some();
        let (content, created) = match change(loaded.map(|doc| doc.content))? {
            Change::Write(content) => (content, !existed),
            Change::Insert(content) => (content, true),
            Change::Remove => {
                self.store
                    .delete(&key, current_tag.as_ref())
                    .await
                    .map_err(|e| store_failure(&key, e))?;
                info!(key = %key, "removed document");
                return Ok(Committed {
                    tag: None,
                    created: false,
                });
            }
        };

        let violations = usage.validate(&content, Some(selector));
        if !violations.is_empty() {
            warn!(key = %key, count = violations.len(), first = %violations[0], "rejected invalid document");
            return Err(XcapError::Validation(violations));
        }

        let tag = self
            .store
            .put(&key, content, current_tag.as_ref())
            .await
            .map_err(|e| store_failure(&key, e))?;
        info!(key = %key, tag = %tag, created, "committed document");

        Ok(Committed {
            tag: Some(tag),
            created,
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("snapshot_reads", &self.store.snapshot_reads())
            .field("locks", &self.lock_count())
            .finish()
    }
}

fn store_failure(key: &DocumentKey, e: StoreError) -> XcapError {
    match &e {
        StoreError::Conflict(_) | StoreError::NotFound(_) => warn!(key = %key, error = %e, "store rejected write"),
        _ => error!(key = %key, error = %e, "store failure"),
    }
    XcapError::from(e)
}
