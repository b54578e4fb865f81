//! Closed failure taxonomy shared by every public operation.

use crate::remote::RemoteError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum RecordKitError {
    #[error("account status could not be determined")]
    AccountIndeterminate,

    #[error("account is restricted")]
    AccountRestricted,

    #[error("no account is signed in")]
    AccountNotFound,

    #[error("account status is unknown")]
    AccountUnknown,

    #[error("discoverability permission was not granted")]
    PermissionDenied,

    #[error("user identity could not be resolved")]
    UserIdentityUnresolved,

    #[error("record identity could not be resolved")]
    RecordIdentityUnresolved,

    #[error("records could not be fetched")]
    RecordNotFound,

    #[error("record save failed")]
    SaveFailed,

    #[error("record delete failed")]
    DeleteFailed,

    #[error("subscription registration failed")]
    SubscribeFailed,

    #[error("subscription removal failed")]
    UnsubscribeFailed,
}

pub type RecordKitResult<T> = Result<T, RecordKitError>;

/// Remote primitive a failure originated from. Each one belongs to exactly one
/// failure family of [`RecordKitError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    AccountStatus,
    RequestPermission,
    FetchUserRecordId,
    DiscoverUserIdentity,
    Query,
    FetchRecord,
    SaveRecord,
    DeleteRecord,
    SaveSubscription,
    DeleteSubscription,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountStatus => "account_status",
            Self::RequestPermission => "request_permission",
            Self::FetchUserRecordId => "fetch_user_record_id",
            Self::DiscoverUserIdentity => "discover_user_identity",
            Self::Query => "perform_query",
            Self::FetchRecord => "fetch_record",
            Self::SaveRecord => "save_record",
            Self::DeleteRecord => "delete_record",
            Self::SaveSubscription => "save_subscription",
            Self::DeleteSubscription => "delete_subscription",
        }
    }

    /// Failure reported when the operation fails for a reason that has no
    /// more specific classification.
    pub fn failure(self) -> RecordKitError {
        match self {
            Self::AccountStatus => RecordKitError::AccountUnknown,
            Self::RequestPermission => RecordKitError::PermissionDenied,
            Self::FetchUserRecordId => RecordKitError::RecordIdentityUnresolved,
            Self::DiscoverUserIdentity => RecordKitError::UserIdentityUnresolved,
            Self::Query | Self::FetchRecord => RecordKitError::RecordNotFound,
            Self::SaveRecord => RecordKitError::SaveFailed,
            Self::DeleteRecord => RecordKitError::DeleteFailed,
            Self::SaveSubscription => RecordKitError::SubscribeFailed,
            Self::DeleteSubscription => RecordKitError::UnsubscribeFailed,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecordKitError {
    /// Classifies a raw remote error raised by `operation`.
    pub fn classify(operation: Operation, error: &RemoteError) -> Self {
        match (operation, error) {
            (Operation::AccountStatus, RemoteError::NotAuthenticated) => Self::AccountNotFound,
            (Operation::AccountStatus, RemoteError::PermissionFailure(_)) => {
                Self::AccountRestricted
            }
            _ => operation.failure(),
        }
    }
}
