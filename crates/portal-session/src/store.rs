//! Session store trait

use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to a session store backend
pub type SharedStore = Arc<dyn SessionStore>;

/// Opaque key-value persistence for session data
///
/// Values are raw bytes; callers own the encoding. A `ttl` of `None` keeps
/// the entry until it is deleted.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Read a value, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value unconditionally
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Remove a value, returning whether one was present
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically replace the value if the current one equals `expected`
    ///
    /// `expected = None` means "only if absent". Returns `false` without
    /// writing when the current value differs.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Backend name for diagnostics
    fn name(&self) -> &'static str;
}
