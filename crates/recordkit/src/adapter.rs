//! Adapts single-shot remote callbacks into futures.

use crate::config::DatabaseScope;
use crate::errors::{Operation, RecordKitError, RecordKitResult};
use crate::query::QueryCursor;
use crate::remote::{Callback, QueryRequest, RecordMatched, RemoteDatabase, RemoteResult};
use crate::types::Record;
use futures::channel::oneshot;
use std::sync::{Arc, Mutex, PoisonError};

struct Resolver<T> {
    operation: Operation,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Resolver<T> {
    fn resolve(&self, value: T) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            tracing::warn!(
                operation = %self.operation,
                "remote callback fired more than once; ignoring repeat"
            );
            return;
        };
        if sender.send(value).is_err() {
            tracing::debug!(operation = %self.operation, "caller dropped interest before completion");
        }
    }
}

/// Builds a callback that resolves `receiver` with the first value it is
/// called with. Later calls are ignored; dropping the callback without calling
/// it cancels the receiver.
pub fn once_callback<T>(operation: Operation) -> (Callback<T>, oneshot::Receiver<T>)
where
    T: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let resolver = Resolver {
        operation,
        sender: Mutex::new(Some(sender)),
    };
    let callback: Callback<T> = Arc::new(move |value| resolver.resolve(value));
    (callback, receiver)
}

/// Hands a fresh callback to `start` and waits for its first invocation.
///
/// Returns `None` when the transport dropped the callback without calling it.
pub async fn submit<T, F>(operation: Operation, start: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(Callback<T>) + Send,
{
    let (done, receiver) = once_callback(operation);
    tracing::debug!(operation = %operation, "submitting remote operation");
    start(done);
    match receiver.await {
        Ok(value) => Some(value),
        Err(oneshot::Canceled) => {
            tracing::warn!(operation = %operation, "remote callback dropped without firing");
            None
        }
    }
}

/// Classifies the outcome of [`submit`] into the operation's failure family.
pub fn settle<T>(operation: Operation, outcome: Option<RemoteResult<T>>) -> RecordKitResult<T> {
    match outcome {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => {
            let classified = RecordKitError::classify(operation, &error);
            tracing::warn!(
                operation = %operation,
                error = %error,
                classified = %classified,
                "remote operation failed"
            );
            Err(classified)
        }
        None => Err(operation.failure()),
    }
}

/// Records buffered by one query invocation plus its continuation cursor.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBatch {
    pub records: Vec<Record>,
    pub cursor: Option<QueryCursor>,
}

/// Runs one query, buffering per-record signals until the terminal one.
///
/// Records reported with a per-record error are skipped. Partial results are
/// never surfaced: a failing terminal signal discards the buffer.
pub async fn run_query<D>(
    database: &D,
    scope: DatabaseScope,
    request: QueryRequest,
) -> Option<RemoteResult<QueryBatch>>
where
    D: RemoteDatabase + ?Sized,
{
    let buffer = Arc::new(Mutex::new(Vec::<Record>::new()));

    let record_matched: Callback<RecordMatched> = {
        let buffer = Arc::clone(&buffer);
        Arc::new(move |(identity, result): RecordMatched| match result {
            Ok(record) => buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record),
            Err(error) => {
                tracing::warn!(record = %identity, error = %error, "skipping record that failed to load");
            }
        })
    };

    submit(Operation::Query, move |done: Callback<RemoteResult<QueryBatch>>| {
        let query_completed: Callback<RemoteResult<Option<QueryCursor>>> =
            Arc::new(move |result: RemoteResult<Option<QueryCursor>>| {
                let records =
                    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
                done(result.map(|cursor| QueryBatch { records, cursor }));
            });
        database.perform_query(scope, request, record_matched, query_completed);
    })
    .await
}
