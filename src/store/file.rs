//! File-backed revision store
//!
//! Working set is held in memory; `sync` rewrites `revisions.dat` as a
//! complete checksummed snapshot:
//! 1. write all records to `revisions.dat.tmp`
//! 2. fsync the temp file
//! 3. rename over `revisions.dat`
//!
//! A crash at any point leaves either the previous or the new snapshot.
//! Mutations since the last `sync` are not durable.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::errors::{StoreError, StoreResult};
use super::memory::MemoryRevisionStore;
use super::record::{self, MAGIC};
use super::RevisionStore;
use crate::observability::{log_event_with_fields, Event};
use crate::revision::{RevisionId, RevisionNode};

/// Snapshot file name inside the store directory.
pub const STORE_FILE: &str = "revisions.dat";

const TEMP_SUFFIX: &str = "tmp";

/// Durable store rooted at a directory.
#[derive(Debug)]
pub struct FileRevisionStore {
    dir: PathBuf,
    inner: MemoryRevisionStore,
    dirty: AtomicBool,
}

impl FileRevisionStore {
    /// Opens (or creates) a store in `dir`.
    ///
    /// # Errors
    ///
    /// FATAL `AERO_DATA_CORRUPTION` if an existing snapshot fails validation.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::write_failed(
                format!("Failed to create store directory: {}", dir.display()),
                e,
            )
        })?;

        let path = dir.join(STORE_FILE);
        let nodes = match fs::read(&path) {
            Ok(bytes) => record::decode_all(&bytes).map_err(|e| {
                let path = path.display().to_string();
                log_event_with_fields(
                    Event::StoreCorruption,
                    &[("path", &path), ("error", e.message())],
                );
                e
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::read_failed(
                    format!("Failed to read store file: {}", path.display()),
                    e,
                ))
            }
        };

        Ok(Self {
            dir,
            inner: MemoryRevisionStore::from_nodes(nodes),
            dirty: AtomicBool::new(false),
        })
    }

    /// Directory holding the snapshot.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn write_snapshot(&self) -> StoreResult<usize> {
        let nodes = self.inner.snapshot();
        let mut buf = MAGIC.to_vec();
        for node in &nodes {
            record::encode_into(&mut buf, node)?;
        }

        let target = self.path();
        let temp = target.with_extension(format!("dat.{}", TEMP_SUFFIX));

        let mut file = File::create(&temp).map_err(|e| {
            StoreError::write_failed(format!("Failed to create {}", temp.display()), e)
        })?;
        file.write_all(&buf)
            .map_err(|e| StoreError::write_failed("Failed to write snapshot", e))?;
        file.sync_all()
            .map_err(|e| StoreError::write_failed("Failed to fsync snapshot", e))?;
        drop(file);

        fs::rename(&temp, &target).map_err(|e| {
            StoreError::io_error(format!("Failed to install {}", target.display()), e)
        })?;

        Ok(nodes.len())
    }
}

impl RevisionStore for FileRevisionStore {
    fn get(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<Option<RevisionNode>> {
        self.inner.get(doc_id, rev_id)
    }

    fn put(&self, node: &RevisionNode) -> StoreResult<()> {
        self.inner.put(node)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn delete(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<()> {
        self.inner.delete(doc_id, rev_id)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.document_ids()
    }

    fn revisions(&self, doc_id: &str) -> StoreResult<Vec<RevisionNode>> {
        self.inner.revisions(doc_id)
    }

    fn sync(&self) -> StoreResult<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match self.write_snapshot() {
            Ok(count) => {
                let path = self.path().display().to_string();
                log_event_with_fields(
                    Event::StoreSync,
                    &[("path", &path), ("revisions", &count.to_string())],
                );
                Ok(())
            }
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(doc: &str, gen: u64, digest: &str) -> RevisionNode {
        RevisionNode::new(doc, RevisionId::new(gen, digest).unwrap(), None, None, false)
    }

    #[test]
    fn test_open_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileRevisionStore::open(dir.path()).unwrap();
        assert!(store.document_ids().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_sync_then_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileRevisionStore::open(dir.path()).unwrap();
            store.put(&node("a", 1, "aa")).unwrap();
            store.put(&node("b", 1, "bb")).unwrap();
            store.sync().unwrap();
        }

        let store = FileRevisionStore::open(dir.path()).unwrap();
        assert_eq!(store.document_ids().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsynced_writes_are_lost() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileRevisionStore::open(dir.path()).unwrap();
            store.put(&node("a", 1, "aa")).unwrap();
        }
        let store = FileRevisionStore::open(dir.path()).unwrap();
        assert!(store.document_ids().unwrap().is_empty());
    }

    #[test]
    fn test_sync_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FileRevisionStore::open(dir.path()).unwrap();
        store.put(&node("a", 1, "aa")).unwrap();
        store.sync().unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![STORE_FILE.to_string()]);
    }

    #[test]
    fn test_corrupt_snapshot_fails_open() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileRevisionStore::open(dir.path()).unwrap();
            store.put(&node("a", 1, "aa")).unwrap();
            store.sync().unwrap();
        }
        let path = dir.path().join(STORE_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = FileRevisionStore::open(dir.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}
