//! Storage abstraction.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageError;

/// Streaming writer for one blob. Dropping it releases the underlying handle.
pub type ByteSink = Box<dyn Write + Send>;

/// Streaming reader for one blob.
pub type ByteSource = Box<dyn Read + Send>;

/// Key/value blob store.
///
/// Implementations must be safe to share between the job engine and every
/// runner invocation; operations on different keys must not serialize on a
/// global lock for the duration of a read or write.
pub trait DataStorageService: Send + Sync {
    /// Open a sink for `key`, replacing any existing blob.
    fn put(&self, key: &str) -> Result<ByteSink, StorageError>;

    /// Open a source for `key` if a blob is stored under it.
    fn get(&self, key: &str) -> Result<Option<ByteSource>, StorageError>;

    /// Remove the blob for `key`.
    ///
    /// Returns `true` when no blob exists for the key afterwards (including
    /// when none existed). Failures are logged and reported as `false`.
    fn remove(&self, key: &str) -> bool;

    /// All keys, or only those last modified longer than `older_than` ago.
    fn keys(&self, older_than: Option<Duration>) -> Result<BTreeSet<String>, StorageError>;

    /// Delete every blob.
    fn clear(&self) -> Result<(), StorageError>;
}

impl<T: DataStorageService + ?Sized> DataStorageService for Arc<T> {
    fn put(&self, key: &str) -> Result<ByteSink, StorageError> {
        (**self).put(key)
    }

    fn get(&self, key: &str) -> Result<Option<ByteSource>, StorageError> {
        (**self).get(key)
    }

    fn remove(&self, key: &str) -> bool {
        (**self).remove(key)
    }

    fn keys(&self, older_than: Option<Duration>) -> Result<BTreeSet<String>, StorageError> {
        (**self).keys(older_than)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}
