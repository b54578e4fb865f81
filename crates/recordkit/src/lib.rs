#![doc = r#"
Generic client layer over a remote, schema-flexible record database.

Operation mapping:

| Client method | Remote primitive | Failure family |
| --- | --- | --- |
| `AccountService::check_account_status` | `RemoteContainer::account_status` | `AccountIndeterminate` / `AccountRestricted` / `AccountNotFound` / `AccountUnknown` |
| `AccountService::request_discoverability_permission` | `RemoteContainer::request_permission` | `PermissionDenied` |
| `AccountService::resolve_current_user_id` | `RemoteContainer::fetch_user_record_id` | `RecordIdentityUnresolved` |
| `AccountService::discover_user_identity` | `RemoteContainer::discover_user_identity` | `UserIdentityUnresolved` |
| `AccountService::resolve_display_name` | `fetch_user_record_id`, then `discover_user_identity` | `RecordIdentityUnresolved` / `UserIdentityUnresolved` |
| `RecordService::fetch` / `fetch_page` / `fetch_page_after` / `fetch_all` | `RemoteDatabase::perform_query` | `RecordNotFound` |
| `RecordService::fetch_one` | `RemoteDatabase::fetch_record` | `RecordNotFound` |
| `RecordService::save` / `save_returning` / `update` | `RemoteDatabase::save_record` | `SaveFailed` |
| `RecordService::delete` / `delete_by_identity` | `RemoteDatabase::delete_record` | `RecordIdentityUnresolved` (no identity) / `DeleteFailed` |
| `SubscriptionService::subscribe` | `RemoteDatabase::save_subscription` | `SubscribeFailed` |
| `SubscriptionService::unsubscribe` | `RemoteDatabase::delete_subscription` | `UnsubscribeFailed` |

Implementation notes:
- Each call submits exactly one remote primitive per step and never retries.
- Callbacks are honored once; repeats are logged and ignored.
- `update` is `save`: the service replaces the stored record (last write wins).
- Queries buffer per-record signals and resolve only on the terminal signal.
"#]

pub mod account;
pub mod adapter;
pub mod client;
pub mod config;
pub mod crud;
pub mod errors;
pub mod mapping;
pub mod query;
pub mod remote;
pub mod subscription;
pub mod testing;
pub mod types;

pub use account::{AccountService, account_status_result};
pub use client::RecordClient;
pub use config::{
    ClientConfig, ConfigError, DEFAULT_CONTAINER_ID, DEFAULT_ENDPOINT, DatabaseScope, Environment,
};
pub use crud::RecordService;
pub use errors::{Operation, RecordKitError, RecordKitResult};
pub use mapping::{Item, RecordMapping};
pub use query::{
    Comparison, ComparisonOperator, FieldCondition, Predicate, QueryBuilder, QueryCursor,
    QueryPage, QuerySpec, SortKey, build_query, compare_records,
};
pub use remote::{
    ApplicationPermission, Callback, QueryRequest, RecordMatched, RemoteContainer, RemoteDatabase,
    RemoteError, RemoteResult,
};
pub use subscription::{
    NotificationInfo, Subscription, SubscriptionId, SubscriptionService, SubscriptionTriggers,
};
pub use testing::MockCloud;
pub use types::{
    AccountStatus, AssetReference, FieldValue, NameComponents, PermissionStatus, Record,
    RecordIdentity, USER_RECORD_TYPE, UserIdentity,
};
