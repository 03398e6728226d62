//! Portal Subscriptions - alert subscriptions for portal users
//!
//! - Users with a verified or unverified contact e-mail ([`User`])
//! - At most one subscription per alert type per user ([`UserService`])
//! - Numeric e-mail confirmation codes with expiry ([`ConfirmationCode`])
//! - Link-carrying HTTP representations ([`model`])

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod domain;
pub mod email;
pub mod error;
pub mod model;
pub mod service;

// Re-exports for convenience
pub use domain::{AlertType, AlertTypeCatalog, ConfirmationCode, Subscription, SubscriptionCreate, User};
pub use email::{EmailSender, LogEmailSender};
pub use error::{NotificationError, SubscriptionError};
pub use service::{ConfirmationCodeConfig, UserService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
