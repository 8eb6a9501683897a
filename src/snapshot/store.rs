//! Durable storage backends for snapshots and versions.
//!
//! The managers persist two things per record: the configuration text
//! (content) and a JSON metadata document. Both go through the
//! [`ObjectStore`] trait as (bucket, key) pairs so the engine can sit on a
//! directory tree, an in-memory map, or anything else that can hold named
//! blobs.
//!
//! Reads degrade instead of failing the whole manager: a missing bucket
//! lists as empty, and callers skip entries they cannot decode. A corrupt
//! index must never prevent new snapshots from being created.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use dashmap::DashMap;
use thiserror::Error;

/// Errors from storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("object {bucket}/{key} not found")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A minimal named-blob store.
pub trait ObjectStore: Send + Sync {
    /// Writes an object, replacing any existing one.
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Reads an object.
    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Returns true if the object exists.
    fn exists(&self, bucket: &str, key: &str) -> bool;

    /// Lists the keys in a bucket, sorted. A missing bucket is empty.
    fn list(&self, bucket: &str) -> StoreResult<Vec<String>>;

    /// Deletes an object. Deleting a missing object is a no-op.
    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Directory-per-bucket filesystem store.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for FsStore {
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        let dir = self.root.join(bucket);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(key), data)?;
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        match fs::read(self.object_path(bucket, key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.object_path(bucket, key).exists()
    }

    fn list(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let dir = self.root.join(bucket);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                keys.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.object_path(bucket, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        self.objects
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    fn list(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
