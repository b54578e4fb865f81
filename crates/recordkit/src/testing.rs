//! In-memory remote service for tests.
//!
//! `MockCloud` implements both boundary traits. Results are computed when a
//! primitive is submitted and delivered from a spawned task when a tokio
//! runtime is running (inline otherwise), so callers observe real suspension.

use crate::config::DatabaseScope;
use crate::errors::Operation;
use crate::query::{QueryCursor, compare_records};
use crate::remote::{
    ApplicationPermission, Callback, QueryRequest, RecordMatched, RemoteContainer, RemoteDatabase,
    RemoteError, RemoteResult,
};
use crate::subscription::{Subscription, SubscriptionId};
use crate::types::{AccountStatus, PermissionStatus, Record, RecordIdentity, UserIdentity};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const MOCK_USER_RECORD_NAME: &str = "_mock-user";

/// Continuations kept alive at once; the oldest is forgotten first.
pub const MOCK_OPEN_CURSOR_LIMIT: usize = 32;

#[derive(Clone, Debug, Default)]
pub struct MockCloud {
    inner: Arc<Mutex<MockCloudState>>,
}

#[derive(Debug)]
struct MockCloudState {
    account_status: RemoteResult<AccountStatus>,
    permission: PermissionStatus,
    user_record_id: Option<RecordIdentity>,
    users: BTreeMap<RecordIdentity, UserIdentity>,
    records: BTreeMap<DatabaseScope, Vec<Record>>,
    subscriptions: BTreeMap<(DatabaseScope, SubscriptionId), Subscription>,
    cursors: BTreeMap<u64, Vec<Record>>,
    failures: BTreeMap<Operation, RemoteError>,
    page_limit: Option<usize>,
    duplicate_callbacks: bool,
    next_change_tag: u64,
    next_cursor: u64,
    calls: Vec<Operation>,
}

impl Default for MockCloudState {
    fn default() -> Self {
        Self {
            account_status: Ok(AccountStatus::Available),
            permission: PermissionStatus::Granted,
            user_record_id: Some(RecordIdentity::user(MOCK_USER_RECORD_NAME)),
            users: BTreeMap::new(),
            records: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            cursors: BTreeMap::new(),
            failures: BTreeMap::new(),
            page_limit: None,
            duplicate_callbacks: false,
            next_change_tag: 0,
            next_cursor: 0,
            calls: Vec::new(),
        }
    }
}

impl MockCloudState {
    fn allocate_change_tag(&mut self) -> String {
        self.next_change_tag += 1;
        format!("tag-{}", self.next_change_tag)
    }

    /// Parks the rest of a result set behind a fresh cursor.
    fn open_cursor(&mut self, rest: Vec<Record>) -> QueryCursor {
        self.next_cursor += 1;
        self.cursors.insert(self.next_cursor, rest);
        while self.cursors.len() > MOCK_OPEN_CURSOR_LIMIT {
            self.cursors.pop_first();
        }
        QueryCursor::new(format!("cursor-{}", self.next_cursor))
    }

    fn take_cursor(&mut self, cursor: &QueryCursor) -> RemoteResult<Vec<Record>> {
        cursor
            .as_str()
            .strip_prefix("cursor-")
            .and_then(|sequence| sequence.parse::<u64>().ok())
            .and_then(|sequence| self.cursors.remove(&sequence))
            .ok_or_else(|| RemoteError::InvalidArguments(format!("unknown query cursor {cursor}")))
    }

    /// Stores `record` under a freshly issued identity.
    fn insert_new(&mut self, scope: DatabaseScope, mut record: Record) -> (RecordIdentity, Record) {
        let identity = RecordIdentity::new(uuid::Uuid::new_v4().to_string(), &record.record_type);
        record.identity = Some(identity.clone());
        record.change_tag = Some(self.allocate_change_tag());
        self.records.entry(scope).or_default().push(record.clone());
        (identity, record)
    }

    fn save(&mut self, scope: DatabaseScope, mut record: Record) -> RemoteResult<Record> {
        let Some(identity) = record.identity.clone() else {
            let (_, stored) = self.insert_new(scope, record);
            return Ok(stored);
        };
        let change_tag = self.allocate_change_tag();
        let stored = self
            .records
            .entry(scope)
            .or_default()
            .iter_mut()
            .find(|stored| stored.identity.as_ref() == Some(&identity))
            .ok_or_else(|| RemoteError::UnknownItem(identity.to_string()))?;
        record.change_tag = Some(change_tag);
        *stored = record.clone();
        Ok(record)
    }

    fn find(&self, scope: DatabaseScope, identity: &RecordIdentity) -> Option<Record> {
        self.records
            .get(&scope)?
            .iter()
            .find(|record| record.identity.as_ref() == Some(identity))
            .cloned()
    }

    fn delete(&mut self, scope: DatabaseScope, identity: RecordIdentity) -> RemoteResult<RecordIdentity> {
        let records = self.records.entry(scope).or_default();
        let position = records
            .iter()
            .position(|record| record.identity.as_ref() == Some(&identity))
            .ok_or_else(|| RemoteError::UnknownItem(identity.to_string()))?;
        records.remove(position);
        Ok(identity)
    }

    /// Evaluates a query against the current contents. Continuations serve the
    /// snapshot taken by the initial request.
    fn query(
        &mut self,
        scope: DatabaseScope,
        request: QueryRequest,
    ) -> RemoteResult<(Vec<Record>, Option<QueryCursor>)> {
        let limit = request.limit().or(self.page_limit);
        let matches = match request {
            QueryRequest::Initial(spec) => {
                let mut matches = self
                    .records
                    .get(&scope)
                    .map(|records| {
                        records
                            .iter()
                            .filter(|record| {
                                record.record_type == spec.record_type
                                    && spec.predicate.matches(record)
                            })
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                matches.sort_by(|left, right| compare_records(left, right, &spec.sort_keys));
                if let Some(keys) = &spec.desired_keys {
                    for record in &mut matches {
                        record.fields.retain(|name, _| keys.contains(name));
                    }
                }
                matches
            }
            QueryRequest::Continuation { cursor, .. } => self.take_cursor(&cursor)?,
        };

        match limit {
            Some(limit) if matches.len() > limit => {
                let mut page = matches;
                let rest = page.split_off(limit);
                Ok((page, Some(self.open_cursor(rest))))
            }
            _ => Ok((matches, None)),
        }
    }
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockCloudState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_account_status(self, status: AccountStatus) -> Self {
        self.state().account_status = Ok(status);
        self
    }

    /// Makes the account status check report a remote error instead of a status.
    pub fn with_account_error(self, error: RemoteError) -> Self {
        self.state().account_status = Err(error);
        self
    }

    pub fn with_permission(self, permission: PermissionStatus) -> Self {
        self.state().permission = permission;
        self
    }

    pub fn with_user_record_id(self, user_record_id: Option<RecordIdentity>) -> Self {
        self.state().user_record_id = user_record_id;
        self
    }

    /// Registers a discoverable user under its user record id.
    pub fn with_user(self, identity: UserIdentity) -> Self {
        if let Some(user_record_id) = identity.user_record_id.clone() {
            self.state().users.insert(user_record_id, identity);
        }
        self
    }

    /// Page size used when a query carries no limit of its own.
    pub fn with_page_limit(self, page_limit: usize) -> Self {
        self.state().page_limit = Some(page_limit).filter(|limit| *limit > 0);
        self
    }

    /// Fires every completion callback a second time with an error.
    pub fn with_duplicate_callbacks(self) -> Self {
        self.state().duplicate_callbacks = true;
        self
    }

    /// Fails the next submission of `operation` with `error`. A failing query
    /// still streams its matches before the terminal error.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.state().failures.insert(operation, error);
    }

    /// Stores a record directly, bypassing the call log. Returns its identity.
    pub fn seed(&self, scope: DatabaseScope, record: Record) -> RecordIdentity {
        let (identity, _) = self.state().insert_new(scope, record.with_identity(None));
        identity
    }

    pub fn records(&self, scope: DatabaseScope) -> Vec<Record> {
        self.state().records.get(&scope).cloned().unwrap_or_default()
    }

    pub fn subscriptions(&self, scope: DatabaseScope) -> Vec<SubscriptionId> {
        self.state()
            .subscriptions
            .keys()
            .filter(|(stored_scope, _)| *stored_scope == scope)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Primitives submitted so far, in submission order.
    pub fn calls(&self) -> Vec<Operation> {
        self.state().calls.clone()
    }

    /// Logs the call, applies any injected failure, then runs `handler`.
    fn with_state<T>(
        &self,
        operation: Operation,
        handler: impl FnOnce(&mut MockCloudState) -> RemoteResult<T>,
    ) -> (RemoteResult<T>, bool) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(_) => {
                return (
                    Err(RemoteError::Internal("mock remote mutex poisoned".to_string())),
                    false,
                );
            }
        };
        state.calls.push(operation);
        let duplicate = state.duplicate_callbacks;
        if let Some(error) = state.failures.remove(&operation) {
            return (Err(error), duplicate);
        }
        (handler(&mut *state), duplicate)
    }

    fn reply<T>(&self, operation: Operation, done: Callback<RemoteResult<T>>, handled: (RemoteResult<T>, bool))
    where
        T: Send + 'static,
    {
        let (result, duplicate) = handled;
        dispatch(move || {
            done(result);
            if duplicate {
                done(Err(RemoteError::Internal(format!(
                    "duplicate {operation} callback"
                ))));
            }
        });
    }
}

fn dispatch(job: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { job() });
        }
        Err(_) => job(),
    }
}

impl RemoteContainer for MockCloud {
    fn account_status(&self, done: Callback<RemoteResult<AccountStatus>>) {
        let handled = self.with_state(Operation::AccountStatus, |state| {
            state.account_status.clone()
        });
        self.reply(Operation::AccountStatus, done, handled);
    }

    fn request_permission(
        &self,
        _permission: ApplicationPermission,
        done: Callback<RemoteResult<PermissionStatus>>,
    ) {
        let handled = self.with_state(Operation::RequestPermission, |state| Ok(state.permission));
        self.reply(Operation::RequestPermission, done, handled);
    }

    fn fetch_user_record_id(&self, done: Callback<RemoteResult<RecordIdentity>>) {
        let handled = self.with_state(Operation::FetchUserRecordId, |state| {
            state
                .user_record_id
                .clone()
                .ok_or(RemoteError::NotAuthenticated)
        });
        self.reply(Operation::FetchUserRecordId, done, handled);
    }

    fn discover_user_identity(
        &self,
        user_record_id: RecordIdentity,
        done: Callback<RemoteResult<Option<UserIdentity>>>,
    ) {
        let handled = self.with_state(Operation::DiscoverUserIdentity, |state| {
            Ok(state.users.get(&user_record_id).cloned())
        });
        self.reply(Operation::DiscoverUserIdentity, done, handled);
    }
}

impl RemoteDatabase for MockCloud {
    fn perform_query(
        &self,
        scope: DatabaseScope,
        request: QueryRequest,
        record_matched: Callback<RecordMatched>,
        query_completed: Callback<RemoteResult<Option<QueryCursor>>>,
    ) {
        let (page, failure, duplicate) = match self.inner.lock() {
            Ok(mut state) => {
                state.calls.push(Operation::Query);
                let failure = state.failures.remove(&Operation::Query);
                let duplicate = state.duplicate_callbacks;
                (state.query(scope, request), failure, duplicate)
            }
            Err(_) => (
                Err(RemoteError::Internal("mock remote mutex poisoned".to_string())),
                None,
                false,
            ),
        };
        dispatch(move || {
            let completion = match page {
                Ok((records, cursor)) => {
                    for record in records {
                        if let Some(identity) = record.identity.clone() {
                            record_matched((identity, Ok(record)));
                        }
                    }
                    match failure {
                        Some(error) => Err(error),
                        None => Ok(cursor),
                    }
                }
                Err(error) => Err(error),
            };
            query_completed(completion);
            if duplicate {
                query_completed(Err(RemoteError::Internal(
                    "duplicate query completion".to_string(),
                )));
            }
        });
    }

    fn fetch_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<Option<Record>>>,
    ) {
        let handled = self.with_state(Operation::FetchRecord, |state| {
            Ok(state.find(scope, &identity))
        });
        self.reply(Operation::FetchRecord, done, handled);
    }

    fn save_record(&self, scope: DatabaseScope, record: Record, done: Callback<RemoteResult<Record>>) {
        let handled = self.with_state(Operation::SaveRecord, |state| state.save(scope, record));
        self.reply(Operation::SaveRecord, done, handled);
    }

    fn delete_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<RecordIdentity>>,
    ) {
        let handled = self.with_state(Operation::DeleteRecord, |state| {
            state.delete(scope, identity)
        });
        self.reply(Operation::DeleteRecord, done, handled);
    }

    fn save_subscription(
        &self,
        scope: DatabaseScope,
        subscription: Subscription,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        let handled = self.with_state(Operation::SaveSubscription, |state| {
            if subscription.triggers.is_empty() {
                return Err(RemoteError::InvalidArguments(format!(
                    "subscription {} fires on nothing",
                    subscription.id
                )));
            }
            let id = subscription.id.clone();
            state.subscriptions.insert((scope, id.clone()), subscription);
            Ok(id)
        });
        self.reply(Operation::SaveSubscription, done, handled);
    }

    fn delete_subscription(
        &self,
        scope: DatabaseScope,
        id: SubscriptionId,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        let handled = self.with_state(Operation::DeleteSubscription, |state| {
            state
                .subscriptions
                .remove(&(scope, id.clone()))
                .map(|_| id.clone())
                .ok_or_else(|| RemoteError::UnknownItem(id.to_string()))
        });
        self.reply(Operation::DeleteSubscription, done, handled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Predicate, SortKey, build_query};

    fn spec(limit: Option<usize>) -> QueryRequest {
        QueryRequest::Initial(build_query(
            "Records",
            Predicate::all(),
            Some(vec![SortKey::ascending("name")]),
            limit,
        ))
    }

    #[test]
    fn query_pages_through_snapshot_with_cursor() {
        let cloud = MockCloud::new();
        for name in ["c", "a", "b"] {
            cloud.seed(
                DatabaseScope::Public,
                Record::new("Records").with_field("name", name),
            );
        }

        let mut state = cloud.state();
        let (first, cursor) = state
            .query(DatabaseScope::Public, spec(Some(2)))
            .expect("first page");
        let names = first.iter().filter_map(|r| r.text("name")).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);

        let cursor = cursor.expect("more results");
        let (second, next) = state
            .query(
                DatabaseScope::Public,
                QueryRequest::Continuation {
                    cursor: cursor.clone(),
                    limit: Some(2),
                },
            )
            .expect("second page");
        assert_eq!(second.len(), 1);
        assert_eq!(next, None);

        let replay = state.query(
            DatabaseScope::Public,
            QueryRequest::Continuation {
                cursor,
                limit: None,
            },
        );
        assert!(matches!(replay, Err(RemoteError::InvalidArguments(_))));
    }

    #[test]
    fn abandoned_cursors_are_bounded_and_oldest_expires_first() {
        let cloud = MockCloud::new();
        for name in ["a", "b"] {
            cloud.seed(
                DatabaseScope::Public,
                Record::new("Records").with_field("name", name),
            );
        }

        let mut state = cloud.state();
        let cursors = (0..MOCK_OPEN_CURSOR_LIMIT + 1)
            .map(|_| {
                let (_, cursor) = state
                    .query(DatabaseScope::Public, spec(Some(1)))
                    .expect("query");
                cursor.expect("more results")
            })
            .collect::<Vec<_>>();
        assert_eq!(state.cursors.len(), MOCK_OPEN_CURSOR_LIMIT);

        let continue_from = |state: &mut MockCloudState, cursor: &QueryCursor| {
            state.query(
                DatabaseScope::Public,
                QueryRequest::Continuation {
                    cursor: cursor.clone(),
                    limit: Some(1),
                },
            )
        };
        assert!(matches!(
            continue_from(&mut *state, &cursors[0]),
            Err(RemoteError::InvalidArguments(_))
        ));
        let (last_page, next) =
            continue_from(&mut *state, &cursors[MOCK_OPEN_CURSOR_LIMIT]).expect("latest cursor");
        assert_eq!(last_page.len(), 1);
        assert_eq!(next, None);
    }

    #[test]
    fn seed_returns_identity_of_stored_record() {
        let cloud = MockCloud::new();
        let identity = cloud.seed(
            DatabaseScope::Public,
            Record::new("Records")
                .with_identity(Some(RecordIdentity::new("ignored", "Records")))
                .with_field("name", "milk"),
        );
        assert_ne!(identity.record_name, "ignored");
        assert_eq!(identity.record_type, "Records");
        let stored = cloud.records(DatabaseScope::Public);
        assert_eq!(stored[0].identity.as_ref(), Some(&identity));
        assert!(stored[0].change_tag.is_some());
    }

    #[test]
    fn save_unknown_identity_expected_unknown_item() {
        let cloud = MockCloud::new();
        let record = Record::new("Records")
            .with_identity(Some(RecordIdentity::new("forged", "Records")))
            .with_field("name", "milk");
        let result = cloud.state().save(DatabaseScope::Public, record);
        assert!(matches!(result, Err(RemoteError::UnknownItem(_))));
    }

    #[test]
    fn scopes_are_isolated() {
        let cloud = MockCloud::new();
        cloud.seed(
            DatabaseScope::Private,
            Record::new("Records").with_field("name", "milk"),
        );
        assert!(cloud.records(DatabaseScope::Public).is_empty());
        assert_eq!(cloud.records(DatabaseScope::Private).len(), 1);
    }

    #[test]
    fn callbacks_fire_inline_without_runtime() {
        let cloud = MockCloud::new().with_account_status(AccountStatus::Restricted);
        let seen = Arc::new(Mutex::new(Vec::<RemoteResult<AccountStatus>>::new()));
        let sink = Arc::clone(&seen);
        cloud.account_status(Arc::new(move |status: RemoteResult<AccountStatus>| {
            sink.lock().expect("sink lock").push(status);
        }));
        assert_eq!(
            *seen.lock().expect("seen lock"),
            vec![Ok(AccountStatus::Restricted)]
        );
        assert_eq!(cloud.calls(), vec![Operation::AccountStatus]);
    }
}
