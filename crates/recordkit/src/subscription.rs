//! Server-held notification rules and the client that registers them.
//!
//! The client keeps no registry of active subscriptions: once registered, the
//! identifier is the only handle needed to remove one.

use crate::adapter::{settle, submit};
use crate::client::RecordClient;
use crate::errors::{Operation, RecordKitResult};
use crate::mapping::RecordMapping;
use crate::query::Predicate;
use crate::remote::{Callback, RemoteDatabase, RemoteResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random identifier for callers without a stable one of their own.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Record changes that fire a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTriggers {
    pub on_create: bool,
    pub on_update: bool,
    pub on_delete: bool,
}

impl Default for SubscriptionTriggers {
    fn default() -> Self {
        Self {
            on_create: true,
            on_update: true,
            on_delete: true,
        }
    }
}

impl SubscriptionTriggers {
    pub fn is_empty(&self) -> bool {
        !(self.on_create || self.on_update || self.on_delete)
    }
}

/// Payload metadata of the push notification a subscription sends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationInfo {
    pub title: Option<String>,
    pub body: Option<String>,
    pub sound: Option<String>,
    pub badge: bool,
}

impl NotificationInfo {
    pub fn alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
            sound: Some("default".to_string()),
            badge: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub record_type: String,
    pub predicate: Predicate,
    pub triggers: SubscriptionTriggers,
    pub notification: NotificationInfo,
}

impl Subscription {
    pub fn new(
        record_type: impl Into<String>,
        predicate: Predicate,
        id: impl Into<SubscriptionId>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            predicate,
            triggers: SubscriptionTriggers::default(),
            notification: NotificationInfo::default(),
        }
    }

    pub fn for_type<T: RecordMapping>(predicate: Predicate, id: impl Into<SubscriptionId>) -> Self {
        Self::new(T::RECORD_TYPE, predicate, id)
    }

    pub fn with_triggers(mut self, triggers: SubscriptionTriggers) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_notification(mut self, notification: NotificationInfo) -> Self {
        self.notification = notification;
        self
    }
}

#[async_trait]
pub trait SubscriptionService: Send + Sync {
    async fn subscribe(&self, subscription: &Subscription) -> RecordKitResult<bool>;

    /// Fails with `UnsubscribeFailed` when the service does not know `id`.
    async fn unsubscribe(&self, id: &SubscriptionId) -> RecordKitResult<bool>;
}

#[async_trait]
impl<C, D> SubscriptionService for RecordClient<C, D>
where
    C: Send + Sync,
    D: RemoteDatabase,
{
    async fn subscribe(&self, subscription: &Subscription) -> RecordKitResult<bool> {
        let scope = self.config().scope;
        let subscription = subscription.clone();
        tracing::debug!(
            subscription_id = %subscription.id,
            record_type = %subscription.record_type,
            scope = %scope,
            "registering subscription"
        );
        let outcome = submit(
            Operation::SaveSubscription,
            |done: Callback<RemoteResult<SubscriptionId>>| {
                self.database().save_subscription(scope, subscription, done)
            },
        )
        .await;
        settle(Operation::SaveSubscription, outcome).map(|_| true)
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> RecordKitResult<bool> {
        let scope = self.config().scope;
        let id = id.clone();
        tracing::debug!(subscription_id = %id, scope = %scope, "removing subscription");
        let outcome = submit(
            Operation::DeleteSubscription,
            |done: Callback<RemoteResult<SubscriptionId>>| {
                self.database().delete_subscription(scope, id, done)
            },
        )
        .await;
        settle(Operation::DeleteSubscription, outcome).map(|_| true)
    }
}
