mod support;

use recordkit::{
    AssetReference, Callback, ClientConfig, DatabaseScope, Item, MockCloud, Operation, Predicate,
    QueryCursor, QueryRequest, QuerySpec, Record, RecordClient, RecordIdentity, RecordKitError,
    RecordMapping, RecordMatched, RecordService, RemoteDatabase, RemoteError, RemoteResult,
    SortKey, Subscription, SubscriptionId, build_query,
};
use support::client_with;

fn by_name() -> QuerySpec {
    QuerySpec::for_type::<Item>()
        .sort_by(SortKey::ascending(Item::NAME_FIELD))
        .build()
}

fn names(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.name.as_str()).collect()
}

#[tokio::test(flavor = "current_thread")]
async fn save_fetch_delete_milk_scenario() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);

    assert_eq!(client.save(&Item::new("milk")).await, Ok(true));

    let items = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert_eq!(names(&items), vec!["milk"]);
    let stored = cloud.records(DatabaseScope::Public);
    assert_eq!(items[0].identity, stored[0].identity);
    assert!(items[0].identity.is_some());

    assert_eq!(client.delete(&items[0]).await, Ok(true));
    let items = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert!(items.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_empty_store_expected_empty_success() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    assert_eq!(client.fetch::<Item>(by_name()).await, Ok(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_limit_predicate_and_sort_are_honored() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    for name in ["milk", "bread", "mango", "eggs", "melon"] {
        client.save(&Item::new(name)).await.expect("save");
    }

    let spec = QuerySpec::for_type::<Item>()
        .filter(Predicate::field(Item::NAME_FIELD).begins_with("m"))
        .sort_by(SortKey::descending(Item::NAME_FIELD))
        .limit(2)
        .build();
    let items = client.fetch::<Item>(spec).await.expect("fetch");
    assert_eq!(names(&items), vec!["milk", "melon"]);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_without_sort_keys_keeps_arrival_order() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    for name in ["pear", "apple", "fig"] {
        client.save(&Item::new(name)).await.expect("save");
    }

    let spec = build_query(Item::RECORD_TYPE, Predicate::all(), None, None);
    let items = client.fetch::<Item>(spec).await.expect("fetch");
    assert_eq!(names(&items), vec!["pear", "apple", "fig"]);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_skips_records_that_do_not_decode() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    cloud.seed(
        DatabaseScope::Public,
        Record::new(Item::RECORD_TYPE).with_field("title", "unnamed"),
    );
    cloud.seed(
        DatabaseScope::Public,
        Record::new(Item::RECORD_TYPE)
            .with_field(Item::NAME_FIELD, "bread")
            .with_field(Item::IMAGE_FIELD, 42_i64),
    );
    client.save(&Item::new("milk")).await.expect("save");

    let items = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert_eq!(names(&items), vec!["milk"]);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_terminal_failure_after_streamed_records_expected_record_not_found() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    client.save(&Item::new("milk")).await.expect("save");
    cloud.fail_next(
        Operation::Query,
        RemoteError::ServiceUnavailable("maintenance".to_string()),
    );

    assert_eq!(
        client.fetch::<Item>(by_name()).await,
        Err(RecordKitError::RecordNotFound)
    );
    assert_eq!(client.fetch::<Item>(by_name()).await.map(|items| items.len()), Ok(1));
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_other_record_type_expected_no_matches() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    cloud.seed(
        DatabaseScope::Public,
        Record::new("Receipts").with_field(Item::NAME_FIELD, "milk"),
    );
    assert_eq!(client.fetch::<Item>(by_name()).await, Ok(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_page_and_fetch_all_follow_cursors() {
    let cloud = MockCloud::new().with_page_limit(2);
    let client = client_with(&cloud);
    for name in ["a", "b", "c", "d", "e"] {
        client.save(&Item::new(name)).await.expect("save");
    }

    let page = client.fetch_page::<Item>(by_name()).await.expect("first page");
    assert_eq!(names(&page.items), vec!["a", "b"]);
    assert!(page.has_more());

    let cursor = page.cursor.expect("cursor");
    let next = client
        .fetch_page_after::<Item>(cursor, Some(2))
        .await
        .expect("second page");
    assert_eq!(names(&next.items), vec!["c", "d"]);

    let before = cloud.calls().len();
    let all = client.fetch_all::<Item>(by_name()).await.expect("fetch all");
    assert_eq!(names(&all), vec!["a", "b", "c", "d", "e"]);
    let queries = cloud.calls()[before..]
        .iter()
        .filter(|operation| **operation == Operation::Query)
        .count();
    assert_eq!(queries, 3);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_page_after_unknown_cursor_expected_record_not_found() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let result = client
        .fetch_page_after::<Item>(QueryCursor::new("stale"), None)
        .await;
    assert_eq!(result, Err(RecordKitError::RecordNotFound));
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_with_desired_keys_drops_other_fields() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    client
        .save(&Item::new("bread").with_image(AssetReference::from_url("https://assets.example/b")))
        .await
        .expect("save");

    let spec = QuerySpec::for_type::<Item>()
        .desired_keys([Item::NAME_FIELD])
        .build();
    let items = client.fetch::<Item>(spec).await.expect("fetch");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].image, None);
}

#[tokio::test(flavor = "current_thread")]
async fn update_replaces_stored_fields_last_write_wins() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let saved = client
        .save_returning(&Item::new("milk"))
        .await
        .expect("save");
    let identity = saved.identity.clone().expect("identity assigned");

    let stale = saved.renamed("oat milk");
    let fresh = saved.renamed("almond milk");
    assert_eq!(client.update(&fresh).await, Ok(true));
    assert_eq!(client.update(&stale).await, Ok(true));

    let fetched = client.fetch_one::<Item>(&identity).await.expect("fetch one");
    assert_eq!(fetched.name, "oat milk");
    assert_eq!(cloud.records(DatabaseScope::Public).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_one_missing_record_expected_record_not_found() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let result = client
        .fetch_one::<Item>(&RecordIdentity::new("missing", Item::RECORD_TYPE))
        .await;
    assert_eq!(result, Err(RecordKitError::RecordNotFound));
}

#[tokio::test(flavor = "current_thread")]
async fn save_remote_error_expected_save_failed_without_retry() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    cloud.fail_next(Operation::SaveRecord, RemoteError::QuotaExceeded);

    assert_eq!(
        client.save(&Item::new("milk")).await,
        Err(RecordKitError::SaveFailed)
    );
    assert_eq!(cloud.calls(), vec![Operation::SaveRecord]);
    assert!(cloud.records(DatabaseScope::Public).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn delete_without_identity_issues_no_remote_call() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    assert_eq!(
        client.delete(&Item::new("milk")).await,
        Err(RecordKitError::RecordIdentityUnresolved)
    );
    assert!(cloud.calls().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn delete_unknown_identity_expected_delete_failed() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let forged = RecordIdentity::new("forged", Item::RECORD_TYPE);
    assert_eq!(
        client.delete_by_identity(&forged).await,
        Err(RecordKitError::DeleteFailed)
    );
    assert_eq!(cloud.calls(), vec![Operation::DeleteRecord]);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_in_flight_before_save_does_not_observe_it() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);

    let mut pending = client.fetch::<Item>(by_name());
    assert!(futures::poll!(&mut pending).is_pending());

    client.save(&Item::new("milk")).await.expect("save");

    assert_eq!(pending.await, Ok(Vec::new()));
    let after = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert_eq!(names(&after), vec!["milk"]);
}

#[tokio::test(flavor = "current_thread")]
async fn duplicate_callbacks_resolve_with_first_outcome() {
    let cloud = MockCloud::new().with_duplicate_callbacks();
    let client = client_with(&cloud);

    assert_eq!(client.save(&Item::new("milk")).await, Ok(true));
    let items = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert_eq!(names(&items), vec!["milk"]);
}

#[tokio::test(flavor = "current_thread")]
async fn private_scope_client_does_not_see_public_records() {
    let cloud = MockCloud::new();
    let public = client_with(&cloud);
    let private = RecordClient::with_service(
        ClientConfig::default().with_scope(DatabaseScope::Private),
        cloud.clone(),
    );

    public.save(&Item::new("milk")).await.expect("save");
    assert_eq!(private.fetch::<Item>(by_name()).await, Ok(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn client_without_account_container_saves_and_fetches() {
    let cloud = MockCloud::new();
    let client = RecordClient::new(ClientConfig::default(), (), cloud.clone());

    assert_eq!(client.save(&Item::new("milk")).await, Ok(true));
    let saved = client
        .save_returning(&Item::new("bread"))
        .await
        .expect("save returning");
    assert_eq!(client.update(&saved.renamed("rye")).await, Ok(true));

    let items = client.fetch::<Item>(by_name()).await.expect("fetch");
    assert_eq!(names(&items), vec!["milk", "rye"]);
    assert_eq!(client.delete(&items[0]).await, Ok(true));
}

/// Serves fixed pages that ignore the requested limit.
struct OverDeliveringPages {
    first: Vec<&'static str>,
    first_cursor: Option<QueryCursor>,
    second: Vec<&'static str>,
}

fn matched(name: &str) -> RecordMatched {
    let identity = RecordIdentity::new(name, Item::RECORD_TYPE);
    let record = Item::new(name).encode().with_identity(Some(identity.clone()));
    (identity, Ok(record))
}

impl RemoteDatabase for OverDeliveringPages {
    fn perform_query(
        &self,
        _scope: DatabaseScope,
        request: QueryRequest,
        record_matched: Callback<RecordMatched>,
        query_completed: Callback<RemoteResult<Option<QueryCursor>>>,
    ) {
        let (names, cursor) = match request {
            QueryRequest::Initial(_) => (&self.first, self.first_cursor.clone()),
            QueryRequest::Continuation { .. } => (&self.second, None),
        };
        for name in names {
            record_matched(matched(name));
        }
        query_completed(Ok(cursor));
    }

    fn fetch_record(
        &self,
        _scope: DatabaseScope,
        _identity: RecordIdentity,
        done: Callback<RemoteResult<Option<Record>>>,
    ) {
        done(Ok(None));
    }

    fn save_record(&self, _scope: DatabaseScope, record: Record, done: Callback<RemoteResult<Record>>) {
        done(Ok(record));
    }

    fn delete_record(
        &self,
        _scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<RecordIdentity>>,
    ) {
        done(Ok(identity));
    }

    fn save_subscription(
        &self,
        _scope: DatabaseScope,
        subscription: Subscription,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        done(Ok(subscription.id));
    }

    fn delete_subscription(
        &self,
        _scope: DatabaseScope,
        id: SubscriptionId,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        done(Ok(id));
    }
}

fn limited(limit: usize) -> QuerySpec {
    QuerySpec::for_type::<Item>().limit(limit).build()
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_all_over_delivered_page_keeps_records_before_cursor() {
    let database = OverDeliveringPages {
        first: vec!["a", "b", "c"],
        first_cursor: Some(QueryCursor::new("page-2")),
        second: vec!["d"],
    };
    let client = RecordClient::new(ClientConfig::default(), (), database);

    let page = client.fetch_page::<Item>(limited(2)).await.expect("page");
    assert_eq!(names(&page.items), vec!["a", "b", "c"]);
    assert!(page.has_more());

    let all = client.fetch_all::<Item>(limited(2)).await.expect("fetch all");
    assert_eq!(names(&all), vec!["a", "b", "c", "d"]);
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_over_delivered_results_capped_at_limit() {
    let with_cursor = RecordClient::new(
        ClientConfig::default(),
        (),
        OverDeliveringPages {
            first: vec!["a", "b", "c"],
            first_cursor: Some(QueryCursor::new("page-2")),
            second: Vec::new(),
        },
    );
    let items = with_cursor.fetch::<Item>(limited(2)).await.expect("fetch");
    assert_eq!(names(&items), vec!["a", "b"]);

    let final_page = RecordClient::new(
        ClientConfig::default(),
        (),
        OverDeliveringPages {
            first: vec!["a", "b", "c"],
            first_cursor: None,
            second: Vec::new(),
        },
    );
    let page = final_page
        .fetch_page::<Item>(limited(2))
        .await
        .expect("page");
    assert_eq!(names(&page.items), vec!["a", "b"]);
    assert!(!page.has_more());
}
