//! Portal Server - HTTP surface of the benefits portal
//!
//! - Apply wizard routes under `/apply/{session}` ([`routes::apply_routes`])
//! - User and alert subscription API under `/api/v1/users` ([`routes::user_routes`])
//! - Layered configuration ([`PortalConfig`]) and tracing setup ([`telemetry`])

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-exports for convenience
pub use config::{ConfigError, LogFormat, PortalConfig, StoreBackend};
pub use error::{ApiError, StartupError};
pub use routes::{routes, CSRF_HEADER};
pub use state::AppState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
