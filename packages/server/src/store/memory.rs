use super::{DocumentKey, EntityTag, Store, StoreError, StoreResult, StoredDocument, TagGenerator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use xcap_document::XmlTree;

/// Documents kept in process memory. Reads return a consistent snapshot of
/// `{content, tag}` without any coordination.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentKey, StoredDocument>>,
    tags: TagGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<StoredDocument>> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(key).cloned())
    }

    async fn put(
        &self,
        key: &DocumentKey,
        content: Arc<XmlTree>,
        expected: Option<&EntityTag>,
    ) -> StoreResult<EntityTag> {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);

        if documents.get(key).map(|doc| &doc.tag) != expected {
            return Err(StoreError::Conflict(key.clone()));
        }

        let tag = self.tags.next();
        documents.insert(
            key.clone(),
            StoredDocument {
                content,
                tag: tag.clone(),
            },
        );
        Ok(tag)
    }

    async fn delete(&self, key: &DocumentKey, expected: Option<&EntityTag>) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);

        let current = documents
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if expected.is_some_and(|tag| tag != &current.tag) {
            return Err(StoreError::Conflict(key.clone()));
        }

        documents.remove(key);
        Ok(())
    }

    fn snapshot_reads(&self) -> bool {
        true
    }
}
