//! In-memory storage for tests/dev.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Cursor, Write};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use depot_core::validate_key;

use crate::error::StorageError;
use crate::service::{ByteSink, ByteSource, DataStorageService};

#[derive(Debug, Clone)]
struct Blob {
    bytes: Arc<[u8]>,
    modified: SystemTime,
}

type BlobMap = Arc<RwLock<HashMap<String, Blob>>>;

/// Map-backed blob store.
///
/// - Sinks buffer privately and publish on flush/drop, so a reader never sees
///   a half-written blob
/// - Sources read from a shared immutable buffer; the map lock is only held
///   to clone a pointer
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataStorageService {
    blobs: BlobMap,
}

impl InMemoryDataStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate a blob's modification time (for age-based sweeps in tests).
    pub fn set_modified(&self, key: &str, modified: SystemTime) -> bool {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        match blobs.get_mut(key) {
            Some(blob) => {
                blob.modified = modified;
                true
            }
            None => false,
        }
    }
}

/// Buffers writes for one key and publishes them into the map.
struct InMemorySink {
    key: String,
    buffer: Vec<u8>,
    blobs: BlobMap,
}

impl InMemorySink {
    fn publish(&self) {
        let blob = Blob {
            bytes: Arc::from(self.buffer.as_slice()),
            modified: SystemTime::now(),
        };
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.key.clone(), blob);
    }
}

impl Write for InMemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for InMemorySink {
    fn drop(&mut self) {
        self.publish();
    }
}

impl DataStorageService for InMemoryDataStorageService {
    fn put(&self, key: &str) -> Result<ByteSink, StorageError> {
        validate_key(key)?;
        Ok(Box::new(InMemorySink {
            key: key.to_string(),
            buffer: Vec::new(),
            blobs: self.blobs.clone(),
        }))
    }

    fn get(&self, key: &str) -> Result<Option<ByteSource>, StorageError> {
        validate_key(key)?;
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .get(key)
            .map(|blob| Box::new(Cursor::new(blob.bytes.clone())) as ByteSource))
    }

    fn remove(&self, key: &str) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        true
    }

    fn keys(&self, older_than: Option<Duration>) -> Result<BTreeSet<String>, StorageError> {
        let cutoff = match older_than {
            None => None,
            Some(age) => match SystemTime::now().checked_sub(age) {
                Some(cutoff) => Some(cutoff),
                None => return Ok(BTreeSet::new()),
            },
        };
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .iter()
            .filter(|(_, blob)| cutoff.is_none_or(|cutoff| blob.modified < cutoff))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
