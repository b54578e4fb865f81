use crate::wire;
use recordkit::{
    AccountStatus, ApplicationPermission, Callback, ClientConfig, DatabaseScope, PermissionStatus,
    QueryCursor, QueryRequest, Record, RecordIdentity, RecordMatched, RemoteContainer,
    RemoteDatabase, RemoteError, RemoteResult, Subscription, SubscriptionId, UserIdentity,
};
use serde_json::Value;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum WebClientError {
    #[error("web service client requires a running tokio runtime")]
    NoRuntime,
}

/// HTTP half shared with spawned request tasks.
#[derive(Clone, Debug)]
struct Transport {
    client: reqwest::Client,
    api_token: Option<String>,
}

impl Transport {
    async fn get_json(&self, url: String) -> RemoteResult<Value> {
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|err| RemoteError::Network(format!("http get failed: {err}")))?;
        Self::read_json(response).await
    }

    async fn post_json(&self, url: String, body: &Value) -> RemoteResult<Value> {
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|err| RemoteError::Network(format!("http post failed: {err}")))?;
        Self::read_json(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.query(&[("ckAPIToken", token.as_str())]),
            None => request,
        }
    }

    async fn read_json(response: reqwest::Response) -> RemoteResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| RemoteError::Network(format!("http read body failed: {err}")))?;
        if !status.is_success() {
            return Err(wire::map_http_status(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|err| RemoteError::InvalidResponse(format!("http json decode failed: {err}")))
    }
}

/// Remote boundary over the record web-services API.
///
/// Every primitive spawns one request task on the captured runtime and fires
/// its callback from that task.
#[derive(Clone, Debug)]
pub struct WebServiceClient {
    transport: Transport,
    config: ClientConfig,
    runtime: tokio::runtime::Handle,
}

impl WebServiceClient {
    /// Captures the current tokio runtime for request tasks.
    pub fn new(config: ClientConfig) -> Result<Self, WebClientError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WebClientError::NoRuntime)?;
        Ok(Self::with_handle(config, runtime))
    }

    pub fn with_handle(config: ClientConfig, runtime: tokio::runtime::Handle) -> Self {
        Self {
            transport: Transport {
                client: reqwest::Client::new(),
                api_token: config.api_token.clone(),
            },
            config,
            runtime,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// URL of `path` under the database of `scope`.
    pub fn endpoint(&self, scope: DatabaseScope, path: &str) -> String {
        format!(
            "{}/database/1/{}/{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.container_id,
            self.config.environment,
            scope,
            path.trim_start_matches('/')
        )
    }

    fn users_endpoint(&self, path: &str) -> String {
        self.endpoint(DatabaseScope::Public, &format!("users/{path}"))
    }

    fn spawn<T, F>(&self, operation: &'static str, request: F, done: Callback<RemoteResult<T>>)
    where
        T: Send + 'static,
        F: Future<Output = RemoteResult<T>> + Send + 'static,
    {
        let container = self.config.container_id.clone();
        self.runtime.spawn(async move {
            let result = request.await;
            match &result {
                Ok(_) => tracing::debug!(operation, container = %container, "web request completed"),
                Err(error) => {
                    tracing::debug!(operation, container = %container, error = %error, "web request failed")
                }
            }
            done(result);
        });
    }

    fn caller(&self) -> impl Future<Output = RemoteResult<wire::CallerInfo>> + Send + 'static {
        let transport = self.transport.clone();
        let url = self.users_endpoint("caller");
        async move { wire::decode_caller(&transport.get_json(url).await?) }
    }
}

impl RemoteContainer for WebServiceClient {
    fn account_status(&self, done: Callback<RemoteResult<AccountStatus>>) {
        let caller = self.caller();
        self.spawn(
            "account_status",
            async move { wire::account_status_from_caller(caller.await) },
            done,
        );
    }

    fn request_permission(
        &self,
        _permission: ApplicationPermission,
        done: Callback<RemoteResult<PermissionStatus>>,
    ) {
        let caller = self.caller();
        self.spawn(
            "request_permission",
            async move { Ok(wire::permission_from_caller(&caller.await?)) },
            done,
        );
    }

    fn fetch_user_record_id(&self, done: Callback<RemoteResult<RecordIdentity>>) {
        let caller = self.caller();
        self.spawn(
            "fetch_user_record_id",
            async move { Ok(RecordIdentity::user(caller.await?.user_record_name)) },
            done,
        );
    }

    fn discover_user_identity(
        &self,
        user_record_id: RecordIdentity,
        done: Callback<RemoteResult<Option<UserIdentity>>>,
    ) {
        let transport = self.transport.clone();
        let url = self.users_endpoint("discover");
        let body = wire::encode_discover(&user_record_id);
        self.spawn(
            "discover_user_identity",
            async move { wire::decode_discovered(&transport.post_json(url, &body).await?) },
            done,
        );
    }
}

impl RemoteDatabase for WebServiceClient {
    fn perform_query(
        &self,
        scope: DatabaseScope,
        request: QueryRequest,
        record_matched: Callback<RecordMatched>,
        query_completed: Callback<RemoteResult<Option<QueryCursor>>>,
    ) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "records/query");
        let body = wire::encode_query_request(&request);
        self.spawn(
            "perform_query",
            async move {
                let body = body?;
                let response = transport.post_json(url, &body).await?;
                let (matched, cursor) = wire::decode_query_response(&body, &response)?;
                for entry in matched {
                    record_matched(entry);
                }
                Ok(cursor)
            },
            query_completed,
        );
    }

    fn fetch_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<Option<Record>>>,
    ) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "records/lookup");
        let body = wire::encode_lookup(&identity);
        self.spawn(
            "fetch_record",
            async move { wire::decode_lookup(&transport.post_json(url, &body).await?) },
            done,
        );
    }

    fn save_record(&self, scope: DatabaseScope, record: Record, done: Callback<RemoteResult<Record>>) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "records/modify");
        let body = wire::encode_save(&record);
        self.spawn(
            "save_record",
            async move {
                let response = transport.post_json(url, &body).await?;
                wire::decode_record(wire::first_entry(&response, "records")?)
            },
            done,
        );
    }

    fn delete_record(
        &self,
        scope: DatabaseScope,
        identity: RecordIdentity,
        done: Callback<RemoteResult<RecordIdentity>>,
    ) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "records/modify");
        let body = wire::encode_delete(&identity);
        self.spawn(
            "delete_record",
            async move {
                let response = transport.post_json(url, &body).await?;
                wire::decode_deleted(&response, &identity)
            },
            done,
        );
    }

    fn save_subscription(
        &self,
        scope: DatabaseScope,
        subscription: Subscription,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "subscriptions/modify");
        let body = wire::encode_subscription(&subscription);
        self.spawn(
            "save_subscription",
            async move { wire::decode_subscription_id(&transport.post_json(url, &body).await?) },
            done,
        );
    }

    fn delete_subscription(
        &self,
        scope: DatabaseScope,
        id: SubscriptionId,
        done: Callback<RemoteResult<SubscriptionId>>,
    ) {
        let transport = self.transport.clone();
        let url = self.endpoint(scope, "subscriptions/modify");
        let body = wire::encode_subscription_delete(&id);
        self.spawn(
            "delete_subscription",
            async move { wire::decode_subscription_id(&transport.post_json(url, &body).await?) },
            done,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordkit::Environment;

    #[tokio::test(flavor = "current_thread")]
    async fn endpoint_joins_container_environment_and_scope() {
        let config = ClientConfig::new("iCloud.com.example.groceries")
            .with_endpoint("https://api.example.com/")
            .with_environment(Environment::Production);
        let client = WebServiceClient::new(config).expect("runtime is running");
        assert_eq!(
            client.endpoint(DatabaseScope::Private, "/records/query"),
            "https://api.example.com/database/1/iCloud.com.example.groceries/production/private/records/query"
        );
        assert_eq!(
            client.users_endpoint("caller"),
            "https://api.example.com/database/1/iCloud.com.example.groceries/production/public/users/caller"
        );
    }

    #[test]
    fn new_without_runtime_expected_error() {
        assert!(matches!(
            WebServiceClient::new(ClientConfig::default()),
            Err(WebClientError::NoRuntime)
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_cursor_completes_query_with_error() {
        let client = WebServiceClient::new(ClientConfig::default()).expect("runtime is running");
        let (sender, receiver) = tokio::sync::oneshot::channel();
        let sender = std::sync::Mutex::new(Some(sender));
        client.perform_query(
            DatabaseScope::Public,
            QueryRequest::Continuation {
                cursor: QueryCursor::new("%%%"),
                limit: None,
            },
            std::sync::Arc::new(|_: RecordMatched| {}),
            std::sync::Arc::new(move |result: RemoteResult<Option<QueryCursor>>| {
                if let Some(sender) = sender.lock().expect("sender lock").take() {
                    let _ = sender.send(result);
                }
            }),
        );
        let result = receiver.await.expect("completion fires");
        assert!(matches!(result, Err(RemoteError::InvalidArguments(_))));
    }
}
