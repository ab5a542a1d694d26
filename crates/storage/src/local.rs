//! Filesystem-backed storage: one `<key>.dat` file per blob.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};

use depot_core::validate_key;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::service::{ByteSink, ByteSource, DataStorageService};

const SUFFIX: &str = ".dat";

/// Stores each blob as a file in a single directory.
///
/// The filesystem provides the per-key isolation; no lock is held by this
/// type at all.
#[derive(Debug, Clone)]
pub struct LocalDataStorageService {
    root: PathBuf,
}

impl LocalDataStorageService {
    /// Open (creating if needed) the storage directory.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let root = config.root_dir.clone();
        let root_display = root.display().to_string();

        if root.is_dir() {
            let existing = fs::read_dir(&root)
                .map_err(|e| StorageError::io(root_display.clone(), e))?
                .count();
            info!(dir = %root_display, existing, "using existing data storage directory");
        } else {
            fs::create_dir_all(&root).map_err(|e| StorageError::io(root_display.clone(), e))?;
            info!(dir = %root_display, "created data storage directory");
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}{SUFFIX}")))
    }
}

impl DataStorageService for LocalDataStorageService {
    fn put(&self, key: &str) -> Result<ByteSink, StorageError> {
        let path = self.path_for_key(key)?;
        let file = File::create(&path).map_err(|e| StorageError::io(key, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn get(&self, key: &str) -> Result<Option<ByteSource>, StorageError> {
        let path = self.path_for_key(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn remove(&self, key: &str) -> bool {
        let path = match self.path_for_key(key) {
            Ok(path) => path,
            Err(e) => {
                warn!(key = %key, error = %e, "refusing to remove invalid key");
                return false;
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                error!(key = %key, error = %e, "unable to remove stored data");
                false
            }
        }
    }

    fn keys(&self, older_than: Option<Duration>) -> Result<BTreeSet<String>, StorageError> {
        let root_display = self.root.display().to_string();
        let cutoff = match older_than {
            None => None,
            Some(age) => match SystemTime::now().checked_sub(age) {
                Some(cutoff) => Some(cutoff),
                // No blob can be older than the earliest representable time.
                None => return Ok(BTreeSet::new()),
            },
        };
        let mut keys = BTreeSet::new();

        for entry in
            fs::read_dir(&self.root).map_err(|e| StorageError::io(root_display.clone(), e))?
        {
            let entry = entry.map_err(|e| StorageError::io(root_display.clone(), e))?;
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(|n| n.strip_suffix(SUFFIX)) else {
                continue;
            };

            if let Some(cutoff) = cutoff {
                let Some(modified) = modified_time(&entry).map_err(|e| StorageError::io(key, e))?
                else {
                    continue;
                };
                if modified >= cutoff {
                    continue;
                }
            }

            keys.insert(key.to_string());
        }

        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        info!(dir = %self.root.display(), "will clear data storage");

        for key in self.keys(None)? {
            if !self.remove(&key) {
                error!(key = %key, "was not able to delete during clear");
            }
        }

        info!(dir = %self.root.display(), "did clear data storage");
        Ok(())
    }
}

/// Modification time of a listed entry; `None` once it has been removed
/// concurrently.
fn modified_time(entry: &fs::DirEntry) -> std::io::Result<Option<SystemTime>> {
    match entry.metadata().and_then(|m| m.modified()) {
        Ok(modified) => Ok(Some(modified)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn service() -> (tempfile::TempDir, LocalDataStorageService) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::default().with_root_dir(dir.path().join("data"));
        let service = LocalDataStorageService::new(&config).unwrap();
        (dir, service)
    }

    fn read_all(service: &LocalDataStorageService, key: &str) -> Option<String> {
        service.get(key).unwrap().map(|mut source| {
            let mut s = String::new();
            source.read_to_string(&mut s).unwrap();
            s
        })
    }

    #[test]
    fn put_then_get_round_trips_bytes() {
        let (_dir, service) = service();

        {
            let mut sink = service.put("abc").unwrap();
            sink.write_all(b"hello\n").unwrap();
        }

        assert_eq!(read_all(&service, "abc").as_deref(), Some("hello\n"));
        assert!(service.root().join("abc.dat").is_file());
    }

    #[test]
    fn put_overwrites_existing_blob() {
        let (_dir, service) = service();

        service.put("k").unwrap().write_all(b"first version").unwrap();
        service.put("k").unwrap().write_all(b"second").unwrap();

        assert_eq!(read_all(&service, "k").as_deref(), Some("second"));
    }

    #[test]
    fn missing_key_reads_as_absent() {
        let (_dir, service) = service();
        assert!(read_all(&service, "nope").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, service) = service();
        service.put("gone").unwrap().write_all(b"x").unwrap();

        assert!(service.remove("gone"));
        assert!(service.remove("gone"));
        assert!(read_all(&service, "gone").is_none());
    }

    #[test]
    fn keys_ignores_foreign_files_and_honours_age() {
        let (_dir, service) = service();
        service.put("one").unwrap().write_all(b"1").unwrap();
        service.put("two").unwrap().write_all(b"2").unwrap();
        fs::write(service.root().join("stray.tmp"), b"?").unwrap();

        let all = service.keys(None).unwrap();
        assert_eq!(all.into_iter().collect::<Vec<_>>(), vec!["one", "two"]);

        // Nothing was written an hour ago.
        assert!(service.keys(Some(Duration::from_secs(3600))).unwrap().is_empty());
    }

    #[test]
    fn unrepresentable_age_matches_nothing() {
        let (_dir, service) = service();
        service.put("fresh").unwrap().write_all(b"1").unwrap();

        assert!(service.keys(Some(Duration::MAX)).unwrap().is_empty());
        assert_eq!(service.keys(None).unwrap().len(), 1);
    }

    #[test]
    fn entry_removed_after_listing_is_skipped() {
        let (_dir, service) = service();
        service.put("racy").unwrap().write_all(b"1").unwrap();

        let entries: Vec<_> = fs::read_dir(service.root())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert!(service.remove("racy"));

        assert_eq!(modified_time(&entries[0]).unwrap(), None);
    }

    #[test]
    fn clear_removes_every_blob() {
        let (_dir, service) = service();
        service.put("a").unwrap().write_all(b"1").unwrap();
        service.put("b").unwrap().write_all(b"2").unwrap();

        service.clear().unwrap();

        assert!(service.keys(None).unwrap().is_empty());
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let (_dir, service) = service();
        assert!(matches!(service.put("../escape"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(service.get(""), Err(StorageError::InvalidKey(_))));
        assert!(!service.remove("a/b"));
    }
}
