//! # Store Adapter
//!
//! Persistence boundary of the server. A store keeps one
//! `{content, entity tag}` pair per [`DocumentKey`] and performs
//! compare-and-swap writes against the tag the caller loaded.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use xcap_document::XmlTree;
use xcap_uri::{Context, DocumentSelector};

/// Identity of one stored document: owner (or the global tree), usage and
/// document name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub auid: String,
    pub context: Context,
    pub document: String,
}

impl DocumentKey {
    pub fn new(auid: impl Into<String>, context: Context, document: impl Into<String>) -> Self {
        Self {
            auid: auid.into(),
            context,
            document: document.into(),
        }
    }

    /// Owner XUI, `None` for global documents
    pub fn owner(&self) -> Option<&str> {
        self.context.owner()
    }
}

impl From<&DocumentSelector> for DocumentKey {
    fn from(selector: &DocumentSelector) -> Self {
        Self::new(selector.auid.clone(), selector.context.clone(), selector.document.clone())
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Context::Users(owner) => write!(f, "{}/users/{}/{}", self.auid, owner, self.document),
            Context::Global => write!(f, "{}/global/{}", self.auid, self.document),
        }
    }
}

/// Opaque version identifier of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityTag(String);

impl EntityTag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted form used in the `ETag` header
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues entity tags that are never reused: the generator's start instant
/// followed by a per-generator sequence number
#[derive(Debug)]
pub struct TagGenerator {
    epoch: String,
    sequence: AtomicU64,
}

impl TagGenerator {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
        Self {
            epoch: format!("{:x}", nanos),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> EntityTag {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        EntityTag(format!("{}-{:x}", self.epoch, sequence))
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub content: Arc<XmlTree>,
    pub tag: EntityTag,
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The current tag differs from the one the caller expected
    #[error("Document {0} changed since it was read")]
    Conflict(DocumentKey),

    #[error("Document {0} does not exist")]
    NotFound(DocumentKey),

    #[error("Invalid document key: {0}")]
    InvalidKey(String),

    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<StoredDocument>>;

    /// Write `content` if the current tag equals `expected` (`None`: the
    /// document must not exist) and return the new tag
    async fn put(
        &self,
        key: &DocumentKey,
        content: Arc<XmlTree>,
        expected: Option<&EntityTag>,
    ) -> StoreResult<EntityTag>;

    /// Remove the document if the current tag equals `expected` (`None`:
    /// unconditionally)
    async fn delete(&self, key: &DocumentKey, expected: Option<&EntityTag>) -> StoreResult<()>;

    /// Whether `get` observes writes atomically, so readers need no lock
    fn snapshot_reads(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique() {
        let generator = TagGenerator::new();
        let tags: HashSet<EntityTag> = (0..1000).map(|_| generator.next()).collect();
        assert_eq!(tags.len(), 1000);
    }

    #[test]
    fn test_tags_differ_across_generators() {
        let a = TagGenerator::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TagGenerator::new();
        assert_ne!(a.next(), b.next());
    }

    #[test]
    fn test_key_display() {
        let key = DocumentKey::new("resource-lists", Context::Users("sip:bob@example.com".into()), "index");
        assert_eq!(key.to_string(), "resource-lists/users/sip:bob@example.com/index");
        assert_eq!(key.owner(), Some("sip:bob@example.com"));
        assert_eq!(EntityTag::new("a-1").quoted(), "\"a-1\"");
    }
}
