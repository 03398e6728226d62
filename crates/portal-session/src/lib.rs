//! Portal Session Store
//!
//! Opaque key-value persistence for per-session data.
//!
//! # Backends
//!
//! - [`MemorySessionStore`]: in-process map with lazy TTL expiry
//! - [`FileSessionStore`]: one file per key under a directory
//! - [`CachedSessionStore`]: moka read-through cache in front of another store
//!
//! Every backend implements [`SessionStore`], including an atomic
//! [`SessionStore::compare_and_swap`] used for guarded writes.
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_session::{MemorySessionStore, SessionStore};
//! use std::time::Duration;
//!
//! let store = MemorySessionStore::new();
//! store.set("wizard:abc", b"{}".to_vec(), Some(Duration::from_secs(900))).await?;
//! assert!(store.get("wizard:abc").await?.is_some());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cached;
mod error;
mod file;
mod memory;
mod session_id;
mod store;

// Re-exports
pub use cached::CachedSessionStore;
pub use error::StoreError;
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use session_id::{SessionId, SessionIdError};
pub use store::{SessionStore, SharedStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
