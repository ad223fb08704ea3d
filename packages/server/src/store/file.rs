use super::{DocumentKey, EntityTag, Store, StoreError, StoreResult, StoredDocument, TagGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use xcap_document::{parse_document, write_document, XmlTree};
use xcap_uri::Context;

const RECORD_EXTENSION: &str = "json";
const TEMPORARY_EXTENSION: &str = "tmp";

/// On-disk form of one document. Tag and content live in the same file so
/// that a single rename replaces both.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    tag: EntityTag,
    document: String,
}

/// Documents stored as files under a root directory:
///
/// ```text
/// <root>/<auid>/users/<owner>/<document>.json
/// <root>/<auid>/global/<document>.json
/// ```
///
/// Each file is a JSON record holding the entity tag and the serialized
/// document. Path segments are NFC-normalized and rejected when they could
/// escape the root or collide with record and temporary file names. Records
/// are replaced through a temporary file and a rename, so readers see
/// either the old or the new version.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    tags: TagGenerator,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tags: TagGenerator::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a document's record file
    pub fn record_path(&self, key: &DocumentKey) -> StoreResult<PathBuf> {
        let mut path = self.root.join(safe_segment(&key.auid)?);
        match &key.context {
            Context::Users(owner) => {
                path.push("users");
                path.push(safe_segment(owner)?);
            }
            Context::Global => path.push("global"),
        }

        let segments: Vec<&str> = key.document.split('/').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(StoreError::InvalidKey(key.to_string()));
        };
        for segment in parents {
            path.push(document_segment(segment)?);
        }
        path.push(format!("{}.{}", document_segment(last)?, RECORD_EXTENSION));
        Ok(path)
    }

    async fn read_record(&self, key: &DocumentKey, path: &Path) -> StoreResult<Option<Record>> {
        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: Record = serde_json::from_str(&source)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", key, e)))?;
        if record.tag.as_str().is_empty() {
            return Err(StoreError::Corrupt(format!("{} has no entity tag", key)));
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<StoredDocument>> {
        let path = self.record_path(key)?;
        let Some(record) = self.read_record(key, &path).await? else {
            return Ok(None);
        };
        let content = parse_document(&record.document)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", key, e)))?;

        Ok(Some(StoredDocument {
            content: Arc::new(content),
            tag: record.tag,
        }))
    }

    async fn put(
        &self,
        key: &DocumentKey,
        content: Arc<XmlTree>,
        expected: Option<&EntityTag>,
    ) -> StoreResult<EntityTag> {
        let path = self.record_path(key)?;
        let current = self.read_record(key, &path).await?;
        if current.as_ref().map(|record| &record.tag) != expected {
            return Err(StoreError::Conflict(key.clone()));
        }

        let record = Record {
            tag: self.tags.next(),
            document: write_document(&content).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        replace_file(&path, &bytes, &record.tag).await?;

        debug!(key = %key, tag = %record.tag, path = %path.display(), "stored document");
        Ok(record.tag)
    }

    async fn delete(&self, key: &DocumentKey, expected: Option<&EntityTag>) -> StoreResult<()> {
        let path = self.record_path(key)?;
        let current = self
            .read_record(key, &path)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if expected.is_some_and(|tag| tag != &current.tag) {
            return Err(StoreError::Conflict(key.clone()));
        }

        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

/// Write through a temporary sibling file, then rename over the target.
/// The temporary file is removed when either step fails.
async fn replace_file(path: &Path, bytes: &[u8], tag: &EntityTag) -> StoreResult<()> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(format!(".{}.{}", tag, TEMPORARY_EXTENSION));
    let temporary = PathBuf::from(temporary);

    let written = match tokio::fs::write(&temporary, bytes).await {
        Ok(()) => tokio::fs::rename(&temporary, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&temporary).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %temporary.display(), error = %cleanup, "failed to remove temporary file");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// A document path segment: a safe segment that cannot be mistaken for a
/// record or temporary file
fn document_segment(segment: &str) -> StoreResult<String> {
    let normalized = safe_segment(segment)?;
    let extension = Path::new(&normalized).extension().and_then(|e| e.to_str());
    if matches!(extension, Some(RECORD_EXTENSION) | Some(TEMPORARY_EXTENSION)) {
        return Err(StoreError::InvalidKey(segment.to_string()));
    }
    Ok(normalized)
}

/// NFC-normalize a path segment, rejecting anything that is not a plain
/// file name
fn safe_segment(segment: &str) -> StoreResult<String> {
    let normalized: String = segment.nfc().collect();
    let invalid = normalized.is_empty()
        || normalized == "."
        || normalized == ".."
        || normalized.starts_with('.')
        || normalized.contains(&['/', '\\', '\0'][..]);
    if invalid {
        return Err(StoreError::InvalidKey(segment.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(document: &str) -> DocumentKey {
        DocumentKey::new("resource-lists", Context::Users("sip:bob@example.com".into()), document)
    }

    fn tree(name: &str) -> Arc<XmlTree> {
        Arc::new(
            parse_document(&format!(
                r#"<resource-lists xmlns="urn:ietf:params:xml:ns:resource-lists"><list name="{name}"/></resource-lists>"#
            ))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_roundtrip_through_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let tag = store.put(&key("index"), tree("a"), None).await.unwrap();
        let path = dir
            .path()
            .join("resource-lists/users/sip:bob@example.com/index.json");
        assert!(path.exists());

        let stored = store.get(&key("index")).await.unwrap().unwrap();
        assert_eq!(stored.tag, tag);
        assert_eq!(*stored.content, *tree("a"));

        // a new store instance reads the same tag back
        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get(&key("index")).await.unwrap().unwrap().tag, tag);
    }

    #[tokio::test]
    async fn test_nested_documents_and_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let outer = store.put(&key("work"), tree("w"), None).await.unwrap();
        store.put(&key("work/team"), tree("t"), None).await.unwrap();

        assert!(matches!(
            store.put(&key("work"), tree("x"), None).await,
            Err(StoreError::Conflict(_))
        ));
        store.delete(&key("work"), Some(&outer)).await.unwrap();
        assert!(store.get(&key("work")).await.unwrap().is_none());
        assert!(store.get(&key("work/team")).await.unwrap().is_some());
        assert!(matches!(
            store.delete(&key("work"), None).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_segments() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        for document in ["../escape", "a/../../b", ".hidden", "a//b"] {
            assert!(
                matches!(store.get(&key(document)).await, Err(StoreError::InvalidKey(_))),
                "{} was accepted",
                document
            );
        }
    }

    #[test]
    fn test_segments_are_nfc_normalized() {
        let store = FileStore::new("/data");
        let decomposed = key("cafe\u{301}");
        let composed = key("caf\u{e9}");

        assert_eq!(
            store.record_path(&decomposed).unwrap(),
            store.record_path(&composed).unwrap()
        );
    }

    #[tokio::test]
    async fn test_names_cannot_collide_with_records() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store.put(&key("a"), tree("a"), None).await.unwrap();
        for document in ["a.json/b", "a.json", "index.json.1-1.tmp/b"] {
            assert!(
                matches!(
                    store.put(&key(document), tree("b"), None).await,
                    Err(StoreError::InvalidKey(_))
                ),
                "{} was accepted",
                document
            );
        }
        // dotted names with other extensions are ordinary documents
        store.put(&key("a.v2/b"), tree("b"), None).await.unwrap();
        assert!(store.get(&key("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tag_and_content_are_one_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let first = store.put(&key("index"), tree("a"), None).await.unwrap();
        let second = store.put(&key("index"), tree("b"), Some(&first)).await.unwrap();
        store.delete(&key("index"), Some(&second)).await.unwrap();

        // no sidecar or temporary file is left behind, so a fresh create works
        let parent = dir.path().join("resource-lists/users/sip:bob@example.com");
        assert_eq!(std::fs::read_dir(&parent).unwrap().count(), 0);
        store.put(&key("index"), tree("c"), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_untagged_content_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.record_path(&key("index")).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        // bare content without its tag
        std::fs::write(
            &path,
            r#"<resource-lists xmlns="urn:ietf:params:xml:ns:resource-lists"/>"#,
        )
        .unwrap();
        assert!(matches!(store.get(&key("index")).await, Err(StoreError::Corrupt(_))));
        assert!(matches!(
            store.put(&key("index"), tree("a"), None).await,
            Err(StoreError::Corrupt(_))
        ));

        // a record whose tag is missing
        std::fs::write(&path, r#"{"tag":"","document":"<list/>"}"#).unwrap();
        assert!(matches!(store.get(&key("index")).await, Err(StoreError::Corrupt(_))));
        assert!(matches!(
            store.delete(&key("index"), None).await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_replace_removes_temporary_file() {
        let dir = TempDir::new().unwrap();
        // renaming a file over a directory fails
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("child"), "x").unwrap();

        let tag = EntityTag::new("1-1");
        assert!(replace_file(&target, b"content", &tag).await.is_err());

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("occupied")]);
    }
}
