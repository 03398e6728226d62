//! Hypermedia representations returned over HTTP
//!
//! Every model carries a `_links.self.href` pointing at its canonical URL.

use crate::domain::{ConfirmationCode, Subscription, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL
    pub href: String,
}

/// Link set of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// Canonical URL of the model
    #[serde(rename = "self")]
    pub self_link: Link,
}

impl Links {
    fn to(href: String) -> Self {
        Self {
            self_link: Link { href },
        }
    }
}

/// User representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    /// Id
    pub id: Uuid,
    /// Contact e-mail
    pub email: String,
    /// E-mail confirmed
    pub email_verified: bool,
    /// `en` or `fr`
    pub preferred_language: String,
    /// Creation time
    pub created_on: DateTime<Utc>,
    /// Hypermedia links
    #[serde(rename = "_links")]
    pub links: Links,
}

/// Subscription representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionModel {
    /// Id
    pub id: Uuid,
    /// Alert type code
    pub alert_type_code: String,
    /// Alert type description
    pub description: String,
    /// Creation time
    pub created_on: DateTime<Utc>,
    /// Hypermedia links
    #[serde(rename = "_links")]
    pub links: Links,
}

/// Confirmation code representation; the code itself is never exposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationCodeModel {
    /// Id
    pub id: Uuid,
    /// Creation time
    pub created_on: DateTime<Utc>,
    /// Code is rejected from this instant on
    pub expiry_date: DateTime<Utc>,
    /// Hypermedia links
    #[serde(rename = "_links")]
    pub links: Links,
}

/// Collection of models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionModel<T> {
    /// Members
    pub items: Vec<T>,
    /// Hypermedia links
    #[serde(rename = "_links")]
    pub links: Links,
}

/// Path of a user
#[must_use]
pub fn user_path(user_id: Uuid) -> String {
    format!("/api/v1/users/{user_id}")
}

/// Map a user to its representation
#[must_use]
pub fn to_user_model(user: &User) -> UserModel {
    UserModel {
        id: user.id,
        email: user.email.clone(),
        email_verified: user.email_verified,
        preferred_language: user.preferred_language.clone(),
        created_on: user.created_on,
        links: Links::to(user_path(user.id)),
    }
}

/// Map a subscription of `user_id` to its representation
#[must_use]
pub fn to_subscription_model(user_id: Uuid, subscription: &Subscription) -> SubscriptionModel {
    SubscriptionModel {
        id: subscription.id,
        alert_type_code: subscription.alert_type.code.clone(),
        description: subscription.alert_type.description.clone(),
        created_on: subscription.created_on,
        links: Links::to(format!(
            "{}/subscriptions/{}",
            user_path(user_id),
            subscription.id
        )),
    }
}

/// Map subscriptions of `user_id` to a collection
#[must_use]
pub fn to_subscription_collection(
    user_id: Uuid,
    subscriptions: &[Subscription],
) -> CollectionModel<SubscriptionModel> {
    CollectionModel {
        items: subscriptions
            .iter()
            .map(|s| to_subscription_model(user_id, s))
            .collect(),
        links: Links::to(format!("{}/subscriptions", user_path(user_id))),
    }
}

/// Map a confirmation code of `user_id` to its representation
#[must_use]
pub fn to_confirmation_code_model(user_id: Uuid, code: &ConfirmationCode) -> ConfirmationCodeModel {
    ConfirmationCodeModel {
        id: code.id,
        created_on: code.created_on,
        expiry_date: code.expiry_date,
        links: Links::to(format!("{}/confirmation-codes/{}", user_path(user_id), code.id)),
    }
}

/// Map confirmation codes of `user_id` to a collection
#[must_use]
pub fn to_confirmation_code_collection(
    user_id: Uuid,
    codes: &[ConfirmationCode],
) -> CollectionModel<ConfirmationCodeModel> {
    CollectionModel {
        items: codes
            .iter()
            .map(|c| to_confirmation_code_model(user_id, c))
            .collect(),
        links: Links::to(format!("{}/confirmation-codes", user_path(user_id))),
    }
}
