//! Callback-based boundary to the remote record service.
//!
//! Transports implement [`RemoteContainer`] and [`RemoteDatabase`]. Every
//! primitive returns immediately and reports its outcome later through the
//! supplied callback, possibly from another thread.

use crate::config::DatabaseScope;
use crate::query::{QueryCursor, QuerySpec};
use crate::subscription::{Subscription, SubscriptionId};
use crate::types::{AccountStatus, PermissionStatus, Record, RecordIdentity, UserIdentity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Completion handler handed to a remote primitive. Transports are expected
/// to call it once, but a misbehaving transport may call it again.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Raw failure reported by a transport. Never returned to callers of the
/// client; classified into [`crate::RecordKitError`] first.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("permission failure: {0}")]
    PermissionFailure(String),

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("server record changed: {0}")]
    ServerRecordChanged(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("request rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationPermission {
    UserDiscoverability,
}

/// Query submission: a fresh query, or the continuation of an earlier one.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryRequest {
    Initial(QuerySpec),
    Continuation {
        cursor: QueryCursor,
        limit: Option<usize>,
    },
}

impl QueryRequest {
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Initial(spec) => spec.limit,
            Self::Continuation { limit, .. } => *limit,
        }
    }

    pub fn record_type(&self) -> Option<&str> {
        match self {
            Self::Initial(spec) => Some(spec.record_type.as_str()),
            Self::Continuation { .. } => None,
        }
    }
}

pub type RecordMatched = (RecordIdentity, RemoteResult<Record>);

/// Account and user identity primitives of a container.
pub trait RemoteContainer: Send + Sync {
    fn account_status(&self, done: Callback<RemoteResult<AccountStatus>>);

    fn request_permission(
        &self,
        permission: ApplicationPermission,
        done: Callback<RemoteResult<PermissionStatus>>,
    );

    fn fetch_user_record_id(&self, done: Callback<RemoteResult<RecordIdentity>>);

    fn discover_user_identity(
        &self,
        user_record_id: RecordIdentity,
        done: Callback<RemoteResult<Option<UserIdentity>>>,
    );
}

/// Record and subscription primitives of one database.
pub trait RemoteDatabase: Send + Sync {
    /// Streams each match through `record_matched`, then signals
    /// `query_completed` exactly once with an optional continuation cursor.
    fn perform_query(
        &self,
        scope: DatabaseScope,
        request: QueryRequest,
        record_matched: Callback<RecordMatched>,
        query_completed: Callback<RemoteResult<Option<QueryCursor>>>,
    );

    fn fetch_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<Option<Record>>>,
    );

    /// Inserts when the record has no identity, replaces otherwise.
    fn save_record(&self, scope: DatabaseScope, record: Record, done: Callback<RemoteResult<Record>>);

    fn delete_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<RecordIdentity>>,
    );

    fn save_subscription(
        &self,
        scope: DatabaseScope,
        subscription: Subscription,
        done: Callback<RemoteResult<SubscriptionId>>,
    );

    fn delete_subscription(
        &self,
        scope: DatabaseScope,
        id: SubscriptionId,
        done: Callback<RemoteResult<SubscriptionId>>,
    );
}

impl<T> RemoteContainer for Arc<T>
where
    T: RemoteContainer + ?Sized,
{
    fn account_status(&self, done: Callback<RemoteResult<AccountStatus>>) {
        (**self).account_status(done)
    }

    fn request_permission(
        &self,
        permission: ApplicationPermission,
        done: Callback<RemoteResult<PermissionStatus>>,
    ) {
        (**self).request_permission(permission, done)
    }

    fn fetch_user_record_id(&self, done: Callback<RemoteResult<RecordIdentity>>) {
        (**self).fetch_user_record_id(done)
    }

    fn discover_user_identity(
        &self,
        user_record_id: RecordIdentity,
        done: Callback<RemoteResult<Option<UserIdentity>>>,
    ) {
        (**self).discover_user_identity(user_record_id, done)
    }
}

impl<T> RemoteDatabase for Arc<T>
where
    T: RemoteDatabase + ?Sized,
{
    fn perform_query(
        &self,
        scope: DatabaseScope,
        request: QueryRequest,
        record_matched: Callback<RecordMatched>,
        query_completed: Callback<RemoteResult<Option<QueryCursor>>>,
    ) {
        (**self).perform_query(scope, request, record_matched, query_completed)
    }

    fn fetch_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<Option<Record>>>,
    ) {
        (**self).fetch_record(scope, identity, done)
    }

    fn save_record(&self, scope: DatabaseScope, record: Record, done: Callback<RemoteResult<Record>>) {
        (**self).save_record(scope, record, done)
    }

    fn delete_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<RecordIdentity>>,
    ) {
        (**self).delete_record(scope, identity, done)
    }

    fn save_subscription(
        &self,
        scope: DatabaseScope,
        subscription: Subscription,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        (**self).save_subscription(scope, subscription, done)
    }

    fn delete_subscription(
        &self,
        scope: DatabaseScope,
        id: SubscriptionId,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        (**self).delete_subscription(scope, id, done)
    }
}
