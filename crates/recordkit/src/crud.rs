//! Generic fetch, save and delete over any [`RecordMapping`] type.
//!
//! `update` is the same request as `save`. The service replaces the stored
//! record wholesale (last write wins); there is no optimistic concurrency
//! check, so concurrent read-modify-write cycles can lose updates.

use crate::adapter::{QueryBatch, run_query, settle, submit};
use crate::client::RecordClient;
use crate::errors::{Operation, RecordKitError, RecordKitResult};
use crate::mapping::RecordMapping;
use crate::query::{QueryCursor, QueryPage, QuerySpec};
use crate::remote::{Callback, QueryRequest, RemoteDatabase, RemoteResult};
use crate::types::{Record, RecordIdentity};
use async_trait::async_trait;

#[async_trait]
pub trait RecordService: Send + Sync {
    /// Runs one query invocation and decodes the matches in arrival order.
    async fn fetch_page<T: RecordMapping>(&self, spec: QuerySpec) -> RecordKitResult<QueryPage<T>>;

    async fn fetch_page_after<T: RecordMapping>(
        &self,
        cursor: QueryCursor,
        limit: Option<usize>,
    ) -> RecordKitResult<QueryPage<T>>;

    async fn fetch_one<T: RecordMapping>(&self, identity: &RecordIdentity) -> RecordKitResult<T>;

    async fn save_returning<T: RecordMapping>(&self, item: &T) -> RecordKitResult<T>;

    async fn save<T: RecordMapping>(&self, item: &T) -> RecordKitResult<bool>;

    async fn delete_by_identity(&self, identity: &RecordIdentity) -> RecordKitResult<bool>;

    /// Single invocation only; the continuation cursor is dropped, so the
    /// items are capped at the query's limit.
    async fn fetch<T: RecordMapping>(&self, spec: QuerySpec) -> RecordKitResult<Vec<T>> {
        let limit = spec.limit;
        let mut items = self.fetch_page(spec).await?.items;
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    /// Follows continuation cursors until the service reports no more
    /// results. The limit applies to each page, not to the total.
    async fn fetch_all<T: RecordMapping>(&self, spec: QuerySpec) -> RecordKitResult<Vec<T>> {
        let limit = spec.limit;
        let mut page = self.fetch_page::<T>(spec).await?;
        let mut items = std::mem::take(&mut page.items);
        while let Some(cursor) = page.cursor.take() {
            tracing::debug!(cursor = %cursor, fetched = items.len(), "following query cursor");
            page = self.fetch_page_after::<T>(cursor, limit).await?;
            items.append(&mut page.items);
        }
        Ok(items)
    }

    async fn update<T: RecordMapping>(&self, item: &T) -> RecordKitResult<bool> {
        self.save(item).await
    }

    /// Fails with `RecordIdentityUnresolved`, without contacting the service,
    /// when `item` was never saved.
    async fn delete<T: RecordMapping>(&self, item: &T) -> RecordKitResult<bool> {
        let Some(identity) = item.identity() else {
            tracing::debug!(record_type = T::RECORD_TYPE, "delete requested for unsaved record");
            return Err(RecordKitError::RecordIdentityUnresolved);
        };
        self.delete_by_identity(&identity).await
    }
}

impl<C, D> RecordClient<C, D>
where
    D: RemoteDatabase,
{
    async fn query_page<T: RecordMapping>(
        &self,
        request: QueryRequest,
    ) -> RecordKitResult<QueryPage<T>> {
        let scope = self.config().scope;
        let limit = request.limit();
        tracing::debug!(
            record_type = request.record_type().unwrap_or(T::RECORD_TYPE),
            scope = %scope,
            limit = ?limit,
            "submitting query"
        );
        let outcome = run_query(self.database(), scope, request).await;
        let QueryBatch {
            mut records,
            cursor,
        } = settle(Operation::Query, outcome)?;

        // A continuation cursor points past every delivered record, so a
        // page that carries one keeps its surplus.
        if let Some(limit) = limit.filter(|limit| records.len() > *limit) {
            tracing::warn!(
                returned = records.len(),
                limit,
                has_more = cursor.is_some(),
                "service returned more records than requested"
            );
            if cursor.is_none() {
                records.truncate(limit);
            }
        }

        let received = records.len();
        let items = records.iter().filter_map(decode_or_skip::<T>).collect::<Vec<_>>();
        tracing::debug!(
            record_type = T::RECORD_TYPE,
            received,
            decoded = items.len(),
            has_more = cursor.is_some(),
            "query completed"
        );
        Ok(QueryPage { items, cursor })
    }
}

fn decode_or_skip<T: RecordMapping>(record: &Record) -> Option<T> {
    let decoded = T::decode(record);
    if decoded.is_none() {
        tracing::debug!(
            record_type = T::RECORD_TYPE,
            record = ?record.identity,
            "skipping record that does not decode"
        );
    }
    decoded
}

#[async_trait]
impl<C, D> RecordService for RecordClient<C, D>
where
    C: Send + Sync,
    D: RemoteDatabase,
{
    async fn fetch_page<T: RecordMapping>(&self, spec: QuerySpec) -> RecordKitResult<QueryPage<T>> {
        self.query_page(QueryRequest::Initial(spec)).await
    }

    async fn fetch_page_after<T: RecordMapping>(
        &self,
        cursor: QueryCursor,
        limit: Option<usize>,
    ) -> RecordKitResult<QueryPage<T>> {
        let limit = limit.filter(|limit| *limit > 0);
        self.query_page(QueryRequest::Continuation { cursor, limit })
            .await
    }

    async fn fetch_one<T: RecordMapping>(&self, identity: &RecordIdentity) -> RecordKitResult<T> {
        let scope = self.config().scope;
        let target = identity.clone();
        let database = self.database();
        let outcome = submit(
            Operation::FetchRecord,
            |done: Callback<RemoteResult<Option<Record>>>| {
                database.fetch_record(scope, target, done)
            },
        )
        .await;
        let Some(record) = settle(Operation::FetchRecord, outcome)? else {
            tracing::debug!(record = %identity, "record does not exist");
            return Err(RecordKitError::RecordNotFound);
        };
        decode_or_skip(&record).ok_or(RecordKitError::RecordNotFound)
    }

    async fn save_returning<T: RecordMapping>(&self, item: &T) -> RecordKitResult<T> {
        let saved = self.save_record(item.encode()).await?;
        T::decode(&saved).ok_or_else(|| {
            tracing::warn!(
                record_type = T::RECORD_TYPE,
                record = ?saved.identity,
                "saved record does not decode"
            );
            RecordKitError::SaveFailed
        })
    }

    async fn save<T: RecordMapping>(&self, item: &T) -> RecordKitResult<bool> {
        self.save_record(item.encode()).await.map(|_| true)
    }

    async fn delete_by_identity(&self, identity: &RecordIdentity) -> RecordKitResult<bool> {
        let scope = self.config().scope;
        let target = identity.clone();
        tracing::debug!(record = %identity, scope = %scope, "deleting record");
        let database = self.database();
        let outcome = submit(
            Operation::DeleteRecord,
            |done: Callback<RemoteResult<RecordIdentity>>| {
                database.delete_record(scope, target, done)
            },
        )
        .await;
        settle(Operation::DeleteRecord, outcome).map(|_| true)
    }
}

impl<C, D> RecordClient<C, D>
where
    D: RemoteDatabase,
{
    async fn save_record(&self, record: Record) -> RecordKitResult<Record> {
        let scope = self.config().scope;
        tracing::debug!(
            record_type = %record.record_type,
            record = ?record.identity,
            scope = %scope,
            "saving record"
        );
        let database = self.database();
        let outcome = submit(
            Operation::SaveRecord,
            |done: Callback<RemoteResult<Record>>| database.save_record(scope, record, done),
        )
        .await;
        settle(Operation::SaveRecord, outcome)
    }
}
