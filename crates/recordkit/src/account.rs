//! Account availability, discoverability permission and current-user identity.

use crate::adapter::{settle, submit};
use crate::client::RecordClient;
use crate::errors::{Operation, RecordKitError, RecordKitResult};
use crate::remote::{ApplicationPermission, Callback, RemoteContainer, RemoteResult};
use crate::types::{AccountStatus, PermissionStatus, RecordIdentity, UserIdentity};
use async_trait::async_trait;

/// Maps a reported account status to the account check outcome.
pub fn account_status_result(status: AccountStatus) -> RecordKitResult<bool> {
    match status {
        AccountStatus::Available => Ok(true),
        AccountStatus::Restricted => Err(RecordKitError::AccountRestricted),
        AccountStatus::NoAccount => Err(RecordKitError::AccountNotFound),
        AccountStatus::CouldNotDetermine => Err(RecordKitError::AccountIndeterminate),
        AccountStatus::TemporarilyUnavailable => Err(RecordKitError::AccountUnknown),
    }
}

#[async_trait]
pub trait AccountService: Send + Sync {
    /// `Ok(true)` only when an account is available.
    async fn check_account_status(&self) -> RecordKitResult<bool>;

    /// `Ok(true)` only on an explicit grant; anything else is `PermissionDenied`.
    async fn request_discoverability_permission(&self) -> RecordKitResult<bool>;

    async fn resolve_current_user_id(&self) -> RecordKitResult<RecordIdentity>;

    async fn discover_user_identity(
        &self,
        user_record_id: &RecordIdentity,
    ) -> RecordKitResult<UserIdentity>;

    /// Resolves the current user id, then discovers that user's given name.
    ///
    /// Discovery is only issued once the id is known.
    async fn resolve_display_name(&self) -> RecordKitResult<String> {
        let user_record_id = self.resolve_current_user_id().await?;
        let identity = self.discover_user_identity(&user_record_id).await?;
        match identity.given_name() {
            Some(name) => Ok(name.to_string()),
            None => {
                tracing::debug!(user = %user_record_id, "discovered identity has no given name");
                Err(RecordKitError::UserIdentityUnresolved)
            }
        }
    }
}

#[async_trait]
impl<C, D> AccountService for RecordClient<C, D>
where
    C: RemoteContainer,
    D: Send + Sync,
{
    async fn check_account_status(&self) -> RecordKitResult<bool> {
        let outcome = submit(
            Operation::AccountStatus,
            |done: Callback<RemoteResult<AccountStatus>>| self.container().account_status(done),
        )
        .await;
        let status = settle(Operation::AccountStatus, outcome)?;
        tracing::debug!(status = ?status, "account status reported");
        account_status_result(status)
    }

    async fn request_discoverability_permission(&self) -> RecordKitResult<bool> {
        let outcome = submit(
            Operation::RequestPermission,
            |done: Callback<RemoteResult<PermissionStatus>>| {
                self.container()
                    .request_permission(ApplicationPermission::UserDiscoverability, done)
            },
        )
        .await;
        match settle(Operation::RequestPermission, outcome)? {
            PermissionStatus::Granted => Ok(true),
            status => {
                tracing::debug!(status = ?status, "discoverability permission not granted");
                Err(RecordKitError::PermissionDenied)
            }
        }
    }

    async fn resolve_current_user_id(&self) -> RecordKitResult<RecordIdentity> {
        let outcome = submit(
            Operation::FetchUserRecordId,
            |done: Callback<RemoteResult<RecordIdentity>>| self.container().fetch_user_record_id(done),
        )
        .await;
        settle(Operation::FetchUserRecordId, outcome)
    }

    async fn discover_user_identity(
        &self,
        user_record_id: &RecordIdentity,
    ) -> RecordKitResult<UserIdentity> {
        let user_record_id = user_record_id.clone();
        let outcome = submit(
            Operation::DiscoverUserIdentity,
            |done: Callback<RemoteResult<Option<UserIdentity>>>| {
                self.container().discover_user_identity(user_record_id, done)
            },
        )
        .await;
        settle(Operation::DiscoverUserIdentity, outcome)?
            .ok_or(RecordKitError::UserIdentityUnresolved)
    }
}
