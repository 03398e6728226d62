//! User service
//!
//! Users live in a [`DashMap`] keyed by id. Shard guards are never held
//! across an `.await`; confirmation-code delivery happens between a read and
//! a write of the user entry.

use crate::domain::{AlertTypeCatalog, ConfirmationCode, Subscription, SubscriptionCreate, User};
use crate::email::EmailSender;
use crate::error::SubscriptionError;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

const LANGUAGES: [&str; 2] = ["en", "fr"];

/// Confirmation code settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationCodeConfig {
    /// Number of digits
    pub length: usize,
    /// Validity window in seconds
    pub expiry_secs: i64,
}

impl Default for ConfirmationCodeConfig {
    fn default() -> Self {
        Self {
            length: 5,
            expiry_secs: 24 * 60 * 60,
        }
    }
}

impl ConfirmationCodeConfig {
    /// Validity window
    #[must_use]
    pub fn expiry(&self) -> Duration {
        Duration::seconds(self.expiry_secs)
    }
}

/// Users, their alert subscriptions and confirmation codes
#[derive(Debug)]
pub struct UserService {
    users: DashMap<Uuid, User>,
    alert_types: RwLock<AlertTypeCatalog>,
    email: Arc<dyn EmailSender>,
    codes: ConfirmationCodeConfig,
}

impl UserService {
    /// Service with the standard alert types
    #[must_use]
    pub fn new(email: Arc<dyn EmailSender>, codes: ConfirmationCodeConfig) -> Self {
        Self::with_catalog(email, codes, AlertTypeCatalog::standard())
    }

    /// Service with a custom alert type catalog
    #[must_use]
    pub fn with_catalog(
        email: Arc<dyn EmailSender>,
        codes: ConfirmationCodeConfig,
        catalog: AlertTypeCatalog,
    ) -> Self {
        Self {
            users: DashMap::new(),
            alert_types: RwLock::new(catalog),
            email,
            codes,
        }
    }

    /// Add or replace an alert type at runtime
    pub fn register_alert_type(&self, code: &str, description: &str) {
        self.alert_types.write().register(code, description);
    }

    /// Register a new user
    pub fn create_user(
        &self,
        email: &str,
        preferred_language: &str,
    ) -> Result<User, SubscriptionError> {
        let email = validate_email(email)?;
        if !LANGUAGES.contains(&preferred_language) {
            return Err(SubscriptionError::InvalidLanguage(
                preferred_language.to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            email_verified: false,
            preferred_language: preferred_language.to_string(),
            subscriptions: Vec::new(),
            confirmation_codes: Vec::new(),
            created_on: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// User by id
    #[must_use]
    pub fn get_user_by_id(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    /// Change a user's e-mail; the new address is unverified
    pub fn update_email(&self, id: Uuid, email: &str) -> Result<User, SubscriptionError> {
        let email = validate_email(email)?;
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(SubscriptionError::UserNotFound(id))?;
        if user.email != email {
            user.email = email;
            user.email_verified = false;
            user.confirmation_codes.clear();
        }
        Ok(user.clone())
    }

    /// Subscribe a user to an alert type
    ///
    /// `Conflict` when the user already has a subscription with the code.
    pub fn create_subscription_for_user(
        &self,
        user_id: Uuid,
        create: &SubscriptionCreate,
    ) -> Result<Subscription, SubscriptionError> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or(SubscriptionError::UserNotFound(user_id))?;

        if user
            .subscriptions
            .iter()
            .any(|s| s.alert_type.code == create.alert_type_code)
        {
            return Err(SubscriptionError::Conflict {
                user_id,
                alert_type_code: create.alert_type_code.clone(),
            });
        }

        let alert_type = self
            .alert_types
            .read()
            .get(&create.alert_type_code)
            .cloned()
            .ok_or_else(|| SubscriptionError::AlertTypeNotFound(create.alert_type_code.clone()))?;

        let subscription = Subscription {
            id: Uuid::new_v4(),
            alert_type,
            created_on: Utc::now(),
        };
        user.subscriptions.push(subscription.clone());
        info!(
            %user_id,
            subscription_id = %subscription.id,
            alert_type = %subscription.alert_type.code,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Subscriptions of a user
    pub fn get_subscriptions_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        self.users
            .get(&user_id)
            .map(|u| u.subscriptions.clone())
            .ok_or(SubscriptionError::UserNotFound(user_id))
    }

    /// One subscription of a user
    pub fn get_subscription_by_id(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, SubscriptionError> {
        self.get_subscriptions_by_user_id(user_id)?
            .into_iter()
            .find(|s| s.id == subscription_id)
            .ok_or(SubscriptionError::SubscriptionNotFound(subscription_id))
    }

    /// Remove a subscription
    pub fn delete_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<(), SubscriptionError> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or(SubscriptionError::UserNotFound(user_id))?;
        let before = user.subscriptions.len();
        user.subscriptions.retain(|s| s.id != subscription_id);
        if user.subscriptions.len() == before {
            return Err(SubscriptionError::SubscriptionNotFound(subscription_id));
        }
        Ok(())
    }

    /// Issue and e-mail a new confirmation code
    ///
    /// The new code replaces any outstanding one once delivery succeeded. A
    /// code sent to an address the user has since replaced is discarded.
    pub async fn create_confirmation_code(
        &self,
        user_id: Uuid,
    ) -> Result<ConfirmationCode, SubscriptionError> {
        let (email, language) = self
            .users
            .get(&user_id)
            .map(|u| (u.email.clone(), u.preferred_language.clone()))
            .ok_or(SubscriptionError::UserNotFound(user_id))?;

        let now = Utc::now();
        let code = ConfirmationCode {
            id: Uuid::new_v4(),
            code: random_digits(self.codes.length),
            created_on: now,
            expiry_date: now + self.codes.expiry(),
        };

        self.email
            .send_confirmation_code(&email, &language, &code)
            .await
            .map_err(|e| {
                warn!(%user_id, error = %e, "confirmation code not delivered");
                e
            })?;

        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or(SubscriptionError::UserNotFound(user_id))?;
        if user.email != email {
            warn!(%user_id, code_id = %code.id, "e-mail changed during delivery, code discarded");
            return Err(SubscriptionError::EmailChanged(user_id));
        }
        user.confirmation_codes = vec![code.clone()];
        info!(%user_id, code_id = %code.id, "confirmation code issued");
        Ok(code)
    }

    /// Outstanding confirmation codes of a user
    pub fn get_confirmation_codes(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConfirmationCode>, SubscriptionError> {
        self.users
            .get(&user_id)
            .map(|u| u.confirmation_codes.clone())
            .ok_or(SubscriptionError::UserNotFound(user_id))
    }

    /// Check a code; on success the e-mail is verified and codes are dropped
    pub fn verify_confirmation_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<User, SubscriptionError> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or(SubscriptionError::UserNotFound(user_id))?;

        let now = Utc::now();
        let Some(matching) = user.confirmation_codes.iter().find(|c| c.code == code.trim()) else {
            warn!(%user_id, "confirmation code mismatch");
            return Err(SubscriptionError::CodeMismatch);
        };
        if matching.is_expired(now) {
            return Err(SubscriptionError::CodeExpired);
        }

        user.email_verified = true;
        user.confirmation_codes.clear();
        info!(%user_id, "e-mail verified");
        Ok(user.clone())
    }

    /// Number of users
    #[inline]
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

fn validate_email(email: &str) -> Result<String, SubscriptionError> {
    let email = email.trim();
    if EMAIL.is_match(email) {
        Ok(email.to_ascii_lowercase())
    } else {
        Err(SubscriptionError::InvalidEmail(email.to_string()))
    }
}

fn random_digits(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length.max(1))
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MockEmailSender;
    use crate::error::NotificationError;

    fn service_with(email: MockEmailSender, codes: ConfirmationCodeConfig) -> UserService {
        UserService::new(Arc::new(email), codes)
    }

    fn quiet_sender() -> MockEmailSender {
        let mut email = MockEmailSender::new();
        email
            .expect_send_confirmation_code()
            .returning(|_, _, _| Ok(()));
        email
    }

    #[test]
    fn create_user_validates() {
        let service = service_with(MockEmailSender::new(), ConfirmationCodeConfig::default());
        let user = service.create_user(" Someone@Example.ca ", "fr").unwrap();
        assert_eq!(user.email, "someone@example.ca");
        assert!(!user.email_verified);
        assert_eq!(service.get_user_by_id(user.id), Some(user));

        assert!(matches!(
            service.create_user("not-an-email", "en"),
            Err(SubscriptionError::InvalidEmail(_))
        ));
        assert!(matches!(
            service.create_user("a@b.ca", "de"),
            Err(SubscriptionError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn duplicate_alert_type_conflicts() {
        let service = service_with(MockEmailSender::new(), ConfirmationCodeConfig::default());
        let user = service.create_user("a@b.ca", "en").unwrap();
        let create = SubscriptionCreate {
            alert_type_code: "application-status".into(),
        };

        service.create_subscription_for_user(user.id, &create).unwrap();
        assert!(matches!(
            service.create_subscription_for_user(user.id, &create),
            Err(SubscriptionError::Conflict { .. })
        ));
        assert_eq!(service.get_subscriptions_by_user_id(user.id).unwrap().len(), 1);
    }

    #[test]
    fn unknown_user_and_alert_type() {
        let service = service_with(MockEmailSender::new(), ConfirmationCodeConfig::default());
        let create = SubscriptionCreate {
            alert_type_code: "programme-updates".into(),
        };
        assert!(service
            .create_subscription_for_user(Uuid::new_v4(), &create)
            .unwrap_err()
            .is_not_found());

        let user = service.create_user("a@b.ca", "en").unwrap();
        let err = service
            .create_subscription_for_user(
                user.id,
                &SubscriptionCreate {
                    alert_type_code: "nope".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err, SubscriptionError::AlertTypeNotFound("nope".into()));

        service.register_alert_type("nope", "Now it exists");
        assert!(service
            .create_subscription_for_user(
                user.id,
                &SubscriptionCreate {
                    alert_type_code: "nope".into(),
                },
            )
            .is_ok());
    }

    #[test]
    fn get_and_delete_subscription() {
        let service = service_with(MockEmailSender::new(), ConfirmationCodeConfig::default());
        let user = service.create_user("a@b.ca", "en").unwrap();
        let sub = service
            .create_subscription_for_user(
                user.id,
                &SubscriptionCreate {
                    alert_type_code: "benefit-renewal".into(),
                },
            )
            .unwrap();

        assert_eq!(service.get_subscription_by_id(user.id, sub.id).unwrap(), sub);
        service.delete_subscription(user.id, sub.id).unwrap();
        assert_eq!(
            service.get_subscription_by_id(user.id, sub.id),
            Err(SubscriptionError::SubscriptionNotFound(sub.id))
        );
        assert!(service.delete_subscription(user.id, sub.id).is_err());
    }

    #[tokio::test]
    async fn confirmation_code_round_trip() {
        let mut email = MockEmailSender::new();
        email
            .expect_send_confirmation_code()
            .withf(|to, lang, code| to == "a@b.ca" && lang == "en" && code.code.len() == 6)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let service = service_with(
            email,
            ConfirmationCodeConfig {
                length: 6,
                expiry_secs: 600,
            },
        );
        let user = service.create_user("a@b.ca", "en").unwrap();

        let code = service.create_confirmation_code(user.id).await.unwrap();
        assert!(code.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(service.get_confirmation_codes(user.id).unwrap(), vec![code.clone()]);

        let wrong = if code.code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            service.verify_confirmation_code(user.id, wrong),
            Err(SubscriptionError::CodeMismatch)
        );

        let verified = service.verify_confirmation_code(user.id, &code.code).unwrap();
        assert!(verified.email_verified);
        assert!(verified.confirmation_codes.is_empty());
    }

    #[tokio::test]
    async fn new_code_replaces_old() {
        let service = service_with(quiet_sender(), ConfirmationCodeConfig::default());
        let user = service.create_user("a@b.ca", "en").unwrap();
        let first = service.create_confirmation_code(user.id).await.unwrap();
        let second = service.create_confirmation_code(user.id).await.unwrap();

        let codes = service.get_confirmation_codes(user.id).unwrap();
        assert_eq!(codes, vec![second]);
        assert!(!codes.iter().any(|c| c.id == first.id));
    }

    #[tokio::test]
    async fn expired_code_rejected() {
        let service = service_with(
            quiet_sender(),
            ConfirmationCodeConfig {
                length: 5,
                expiry_secs: 0,
            },
        );
        let user = service.create_user("a@b.ca", "en").unwrap();
        let code = service.create_confirmation_code(user.id).await.unwrap();

        assert_eq!(
            service.verify_confirmation_code(user.id, &code.code),
            Err(SubscriptionError::CodeExpired)
        );
        assert!(!service.get_user_by_id(user.id).unwrap().email_verified);
    }

    #[tokio::test]
    async fn failed_delivery_stores_nothing() {
        let mut email = MockEmailSender::new();
        email.expect_send_confirmation_code().returning(|to, _, _| {
            Err(NotificationError {
                recipient: to.to_string(),
                reason: "provider down".into(),
            })
        });
        let service = service_with(email, ConfirmationCodeConfig::default());
        let user = service.create_user("a@b.ca", "en").unwrap();

        let err = service.create_confirmation_code(user.id).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Notification(_)));
        assert!(service.get_confirmation_codes(user.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_change_resets_verification() {
        let service = service_with(quiet_sender(), ConfirmationCodeConfig::default());
        let user = service.create_user("a@b.ca", "en").unwrap();
        let code = service.create_confirmation_code(user.id).await.unwrap();
        service.verify_confirmation_code(user.id, &code.code).unwrap();

        let same = service.update_email(user.id, "A@B.ca").unwrap();
        assert!(same.email_verified);

        let changed = service.update_email(user.id, "c@d.ca").unwrap();
        assert!(!changed.email_verified);
        assert_eq!(changed.email, "c@d.ca");
    }
}
