//! File-backed session store
//!
//! One file per key, named by the SHA-256 of the key so arbitrary keys map
//! to safe file names. Each file is an 8-byte little-endian expiry
//! (unix millis, `0` = never) followed by the raw value.

use crate::error::StoreError;
use crate::store::SessionStore;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

const HEADER_LEN: usize = 8;

/// Session store persisting entries under a directory
#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
    /// Serializes writers so compare-and-swap is atomic within the process
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io_error(&dir, e))?;
        tracing::info!(dir = %dir.display(), "opened file session store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.session", hex::encode(digest)))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io_error(&path, e)),
        };

        if raw.len() < HEADER_LEN {
            return Err(StoreError::corrupt(key, "truncated header"));
        }
        let (header, body) = raw.split_at(HEADER_LEN);
        let mut expiry = [0u8; HEADER_LEN];
        expiry.copy_from_slice(header);
        let expires_at = u64::from_le_bytes(expiry);

        if expires_at != 0 && expires_at <= now_millis() {
            remove_file(&path).await?;
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }

    async fn write_entry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let expires_at = ttl.map_or(0, |ttl| {
            now_millis().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
        });

        let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
        buf.extend_from_slice(&expires_at.to_le_bytes());
        buf.extend_from_slice(value);

        // Write-then-rename so readers never see a partial file
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &buf)
            .await
            .map_err(|e| StoreError::io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io_error(&path, e))
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

async fn remove_file(path: &Path) -> Result<bool, StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io_error(path, e)),
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read_entry(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_entry(key, &value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let existed = self.read_entry(key).await?.is_some();
        remove_file(&self.path_for(key)).await?;
        Ok(existed)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_entry(key).await?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.write_entry(key, &value, ttl).await?;
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
