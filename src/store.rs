//! Filesystem persistence for content records.
//!
//! The store owns a single flat directory with one file per record, named by
//! the record's key. Records are created exactly once: writes open the file
//! with `create_new`, so a second writer for the same key loses and the disk
//! keeps whatever got there first. All disk work runs on the blocking pool,
//! which the bootstrap bounds to the configured worker count, keeping the
//! request handlers free of inline I/O.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task;

use crate::content::{Content, ContentError};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Exclusive create lost to an existing file. The write is dropped; the
    /// cache already holds the resolved record for this key.
    #[error("content file already exists")]
    AlreadyExists,
    #[error("malformed content record: {0}")]
    Decode(#[from] ContentError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Counters from one expiry sweep pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Regular files examined.
    pub scanned: usize,
    /// Expired records deleted.
    pub deleted: usize,
}

/// Filesystem-backed record store rooted at one content directory.
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Opens a store rooted at `dir`, creating the directory if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the record file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Loads and fully decodes the record for `key`.
    ///
    /// A missing file is not an error: it resolves to the empty sentinel,
    /// which the cache is free to remember. Everything else propagates.
    pub async fn load(&self, key: &str) -> Result<Content, StoreError> {
        let path = self.path_for(key);
        task::spawn_blocking(move || load_sync(&path))
            .await
            .expect("store load task panicked")
    }

    /// Persists a fully-formed record under its key.
    ///
    /// The open is exclusive-create; racing writers surface
    /// [`StoreError::AlreadyExists`], which callers log and drop.
    pub async fn write(&self, content: Arc<Content>) -> Result<(), StoreError> {
        let path = self.path_for(&content.key);
        task::spawn_blocking(move || write_sync(&path, &content))
            .await
            .expect("store write task panicked")
    }

    /// One sweep pass: meta-decode every regular file in the content
    /// directory and delete those whose expiry precedes `now_ms`. Per-file
    /// failures are logged and skipped; the pass keeps going.
    pub async fn sweep(&self, now_ms: i64) -> Result<SweepStats, StoreError> {
        let dir = self.dir.clone();
        task::spawn_blocking(move || sweep_sync(&dir, now_ms))
            .await
            .expect("store sweep task panicked")
    }
}

fn load_sync(path: &Path) -> Result<Content, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Content::empty()),
        Err(err) => return Err(err.into()),
    };
    Ok(Content::decode(BufReader::new(file))?)
}

/// Meta-only read of one record file. Used by the sweep pass.
fn load_meta_sync(path: &Path) -> Result<Content, StoreError> {
    let file = File::open(path)?;
    Ok(Content::decode_meta(BufReader::new(file))?)
}

fn write_sync(path: &Path, content: &Content) -> Result<(), StoreError> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(StoreError::AlreadyExists);
        }
        Err(err) => return Err(err.into()),
    };
    let mut writer = BufWriter::new(file);
    content.encode(&mut writer)?;
    writer.flush()?;
    Ok(())
}

fn sweep_sync(dir: &Path, now_ms: i64) -> Result<SweepStats, StoreError> {
    let mut stats = SweepStats::default();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "sweep: unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => {}
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "sweep: stat failed");
                continue;
            }
        }

        stats.scanned += 1;
        match load_meta_sync(&path) {
            Ok(meta) if meta.is_expired(now_ms) => match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(key = %meta.key, "swept expired content");
                    stats.deleted += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "sweep: delete failed");
                }
            },
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "sweep: unreadable record");
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(key: &str, expiry: i64, body: &'static [u8]) -> Arc<Content> {
        Arc::new(Content::new(
            key.into(),
            Bytes::from_static(b"text/plain"),
            expiry,
            Bytes::from_static(body),
        ))
    }

    #[tokio::test]
    async fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        let original = record("abcd123", 9_999_999_999_999, b"payload");
        store.write(Arc::clone(&original)).await.unwrap();

        let loaded = store.load("abcd123").await.unwrap();
        assert_eq!(loaded, *original);
    }

    #[tokio::test]
    async fn missing_key_loads_the_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        let loaded = store.load("nothere").await.unwrap();
        assert!(!loaded.is_present());
    }

    #[tokio::test]
    async fn second_write_for_a_key_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        store.write(record("dupe111", 1, b"first")).await.unwrap();
        let err = store.write(record("dupe111", 2, b"second")).await;
        assert!(matches!(err, Err(StoreError::AlreadyExists)));

        // Disk keeps the first record.
        let loaded = store.load("dupe111").await.unwrap();
        assert_eq!(loaded.body, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn sweep_deletes_expired_and_keeps_live_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        store.write(record("expired", 1_000, b"old")).await.unwrap();
        store
            .write(record("aliveok", i64::MAX, b"new"))
            .await
            .unwrap();

        let stats = store.sweep(2_000).await.unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.deleted, 1);

        assert!(!store.path_for("expired").exists());
        assert!(store.path_for("aliveok").exists());
    }

    #[tokio::test]
    async fn sweep_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("garbage"), b"\x00\x01").unwrap();
        store.write(record("expired", 1, b"old")).await.unwrap();

        let stats = store.sweep(1_000).await.unwrap();
        assert_eq!(stats.deleted, 1);
        // The unreadable file is left in place.
        assert!(dir.path().join("garbage").exists());
    }
}
