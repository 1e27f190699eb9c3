//! Record partitions: one directory tree of grant record files.
//!
//! Two partitions exist per store: the ephemeral one (runtime directory,
//! cleared at boot, flat layout) and the durable one (persistent directory,
//! one `uid<N>/` subdirectory per holder). Both use the same write
//! discipline: take the partition lock file, write a temporary file, then
//! rename it into place. Readers never take the lock; a rename is atomic,
//! so they see either the old record or the new one, never a torn line.

use crate::record::{GrantRecord, RecordParseError};
use crate::StoreError;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = ".lock";

/// A single record partition rooted at one directory.
#[derive(Debug)]
pub(crate) struct Partition {
    root: PathBuf,
}

/// Held partition writer lock; released when dropped.
pub(crate) struct PartitionLock {
    file: File,
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        // closing the descriptor releases the lock anyway; unlock early so
        // the drop order within a scope does not matter
        let _ = FileExt::unlock(&self.file);
    }
}

impl Partition {
    /// Opens (creating if needed) a partition at `root`.
    pub(crate) fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Takes the exclusive writer lock for this partition.
    ///
    /// Mutations from concurrent store handles (the engine and the grant
    /// helper run in separate processes) serialize on this; reads do not.
    pub(crate) fn lock(&self) -> Result<PartitionLock, StoreError> {
        let path = self.root.join(LOCK_FILE);
        let file = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        file.lock_exclusive()
            .map_err(|source| StoreError::Lock { path, source })?;
        Ok(PartitionLock { file })
    }

    /// Writes a record at `rel`, atomically, creating parent directories.
    pub(crate) fn write(&self, rel: &str, record: &GrantRecord) -> Result<(), StoreError> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp = path.with_extension("grant.tmp");
        fs::write(&temp, record.encode()).map_err(|source| StoreError::Io {
            path: temp.clone(),
            source,
        })?;
        fs::rename(&temp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote grant record");
        Ok(())
    }

    /// Reads the record at `rel`.
    ///
    /// A missing file is `None`. A present but undecodable file is also
    /// `None`: it is logged and left in place for an operator to inspect,
    /// and a grant that cannot be decoded must not authorize anything.
    pub(crate) fn read(&self, rel: &str) -> Result<Option<GrantRecord>, StoreError> {
        let path = self.root.join(rel);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        match GrantRecord::parse(&content) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                warn_corrupt(&path, &reason);
                Ok(None)
            }
        }
    }

    /// Removes the record at `rel`; `Ok(false)` when it did not exist.
    pub(crate) fn remove(&self, rel: &str) -> Result<bool, StoreError> {
        let path = self.root.join(rel);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed grant record");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Enumerates every decodable record in the partition.
    ///
    /// Yields `(relative_path, record)` pairs. Walks the root and one level
    /// of `uid<N>/` subdirectories, skipping the lock file, temp files and
    /// anything that does not end in `.grant`.
    pub(crate) fn scan(&self) -> Result<Vec<(String, GrantRecord)>, StoreError> {
        let mut out = Vec::new();
        self.scan_dir(&self.root, None, &mut out)?;
        Ok(out)
    }

    fn scan_dir(
        &self,
        dir: &Path,
        prefix: Option<&str>,
        out: &mut Vec<(String, GrantRecord)>,
    ) -> Result<(), StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            let path = entry.path();
            if path.is_dir() {
                if prefix.is_none() && name.starts_with("uid") {
                    self.scan_dir(&path, Some(name), out)?;
                }
                continue;
            }
            if !name.ends_with(".grant") {
                continue;
            }

            let rel = match prefix {
                Some(dir_name) => format!("{dir_name}/{name}"),
                None => name.to_string(),
            };
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(StoreError::Io { path, source }),
            };
            match GrantRecord::parse(&content) {
                Ok(record) => out.push((rel, record)),
                Err(reason) => warn_corrupt(&path, &reason),
            }
        }
        Ok(())
    }
}

fn warn_corrupt(path: &Path, reason: &RecordParseError) {
    warn!(path = %path.display(), %reason, "skipping undecodable grant record");
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_types::Constraint;
    use tempfile::TempDir;

    fn record(action: &str) -> GrantRecord {
        GrantRecord {
            action_id: action.into(),
            created_at: 100,
            granting_uid: 0,
            constraint: Constraint::NONE,
            negative: false,
        }
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path().join("run")).unwrap();
        let rel = "uid1000-pid-1@2-a.b.grant";

        assert_eq!(p.read(rel).unwrap(), None);
        p.write(rel, &record("a.b")).unwrap();
        assert_eq!(p.read(rel).unwrap(), Some(record("a.b")));
        assert!(p.remove(rel).unwrap());
        assert!(!p.remove(rel).unwrap());
    }

    #[test]
    fn write_creates_uid_subdirs() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path()).unwrap();
        p.write("uid1000/a.b.grant", &record("a.b")).unwrap();
        assert_eq!(p.read("uid1000/a.b.grant").unwrap(), Some(record("a.b")));
    }

    #[test]
    fn corrupt_record_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path()).unwrap();
        fs::write(dir.path().join("uid1-pid-1@2-a.b.grant"), "not a record").unwrap();
        assert_eq!(p.read("uid1-pid-1@2-a.b.grant").unwrap(), None);
        // the file stays on disk for inspection
        assert!(dir.path().join("uid1-pid-1@2-a.b.grant").exists());
    }

    #[test]
    fn scan_walks_root_and_uid_dirs() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path()).unwrap();
        p.write("uid1-session-c1-a.b.grant", &record("a.b")).unwrap();
        p.write("uid2/c.d.grant", &record("c.d")).unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();
        fs::write(dir.path().join(".lock"), "").unwrap();

        let mut rels: Vec<String> = p.scan().unwrap().into_iter().map(|(rel, _)| rel).collect();
        rels.sort();
        assert_eq!(rels, vec!["uid1-session-c1-a.b.grant", "uid2/c.d.grant"]);
    }

    #[test]
    fn scan_skips_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path()).unwrap();
        p.write("uid1-session-c1-a.b.grant", &record("a.b")).unwrap();
        fs::write(dir.path().join("uid1-session-c1-x.y.grant"), "torn").unwrap();
        assert_eq!(p.scan().unwrap().len(), 1);
    }

    #[test]
    fn lock_is_reentrant_across_handles_after_release() {
        let dir = TempDir::new().unwrap();
        let p = Partition::open(dir.path()).unwrap();
        drop(p.lock().unwrap());
        drop(p.lock().unwrap());
    }
}
