//! Domain types

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of alert a user can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertType {
    /// Stable code
    pub code: String,
    /// Human-readable description
    pub description: String,
}

/// Alert subscription of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id
    pub id: Uuid,
    /// Subscribed alert
    pub alert_type: AlertType,
    /// Creation time
    pub created_on: DateTime<Utc>,
}

/// E-mail verification code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationCode {
    /// Code id
    pub id: Uuid,
    /// Numeric code sent to the user
    pub code: String,
    /// Creation time
    pub created_on: DateTime<Utc>,
    /// Code is rejected from this instant on
    pub expiry_date: DateTime<Utc>,
}

impl ConfirmationCode {
    /// Whether the code has expired at `now`
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: Uuid,
    /// Contact e-mail
    pub email: String,
    /// E-mail confirmed through a code
    pub email_verified: bool,
    /// `en` or `fr`
    pub preferred_language: String,
    /// Alert subscriptions
    pub subscriptions: Vec<Subscription>,
    /// Outstanding confirmation codes
    pub confirmation_codes: Vec<ConfirmationCode>,
    /// Creation time
    pub created_on: DateTime<Utc>,
}

/// Request to subscribe a user to an alert type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCreate {
    /// Alert type code
    pub alert_type_code: String,
}

/// Alert types that may be subscribed to, in display order
#[derive(Debug, Clone, Default)]
pub struct AlertTypeCatalog {
    types: IndexMap<String, AlertType>,
}

impl AlertTypeCatalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in alert types
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register("programme-updates", "News and updates about the programme");
        catalog.register("application-status", "Changes to the status of an application");
        catalog.register("benefit-renewal", "Reminders to renew coverage");
        catalog
    }

    /// Add or replace an alert type
    pub fn register(&mut self, code: &str, description: &str) {
        self.types.insert(
            code.to_string(),
            AlertType {
                code: code.to_string(),
                description: description.to_string(),
            },
        );
    }

    /// Look up by code
    #[inline]
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&AlertType> {
        self.types.get(code)
    }

    /// All alert types
    pub fn iter(&self) -> impl Iterator<Item = &AlertType> {
        self.types.values()
    }

    /// Number of alert types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
