mod support;

use recordkit::{
    DatabaseScope, Item, MockCloud, NotificationInfo, Operation, Predicate, RecordKitError,
    RemoteError, Subscription, SubscriptionId, SubscriptionService, SubscriptionTriggers,
};
use support::client_with;

#[tokio::test(flavor = "current_thread")]
async fn subscribe_then_unsubscribe_twice() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let subscription = Subscription::new("Records", Predicate::all(), "S1")
        .with_notification(NotificationInfo::alert("New item", "An item was added"));

    assert_eq!(client.subscribe(&subscription).await, Ok(true));
    assert_eq!(
        cloud.subscriptions(DatabaseScope::Public),
        vec![SubscriptionId::new("S1")]
    );

    let id = SubscriptionId::new("S1");
    assert_eq!(client.unsubscribe(&id).await, Ok(true));
    assert_eq!(
        client.unsubscribe(&id).await,
        Err(RecordKitError::UnsubscribeFailed)
    );
    assert!(cloud.subscriptions(DatabaseScope::Public).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn subscribe_rejected_expected_subscribe_failed() {
    let cloud = MockCloud::new();
    let client = client_with(&cloud);
    let silent = Subscription::for_type::<Item>(
        Predicate::from(Predicate::field(Item::NAME_FIELD).equals("milk")),
        SubscriptionId::generate(),
    )
    .with_triggers(SubscriptionTriggers {
        on_create: false,
        on_update: false,
        on_delete: false,
    });
    assert_eq!(
        client.subscribe(&silent).await,
        Err(RecordKitError::SubscribeFailed)
    );

    cloud.fail_next(
        Operation::SaveSubscription,
        RemoteError::RateLimited {
            retry_after_secs: Some(30),
        },
    );
    let subscription = Subscription::for_type::<Item>(Predicate::all(), "S2");
    assert_eq!(
        client.subscribe(&subscription).await,
        Err(RecordKitError::SubscribeFailed)
    );
    assert!(cloud.subscriptions(DatabaseScope::Public).is_empty());
}
