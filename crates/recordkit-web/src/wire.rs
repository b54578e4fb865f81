//! JSON shapes of the record web-services API.

use base64::Engine;
use recordkit::{
    AccountStatus, AssetReference, ComparisonOperator, FieldValue, NameComponents,
    PermissionStatus, Predicate, QueryCursor, QueryRequest, QuerySpec, Record, RecordIdentity,
    RecordMatched, RemoteError, RemoteResult, SortKey, Subscription, SubscriptionId, UserIdentity,
};
use serde_json::{Map, Value, json};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn invalid(message: impl Into<String>) -> RemoteError {
    RemoteError::InvalidResponse(message.into())
}

fn timestamp_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    }
}

fn timestamp_from_millis(millis: i64) -> SystemTime {
    if millis >= 0 {
        UNIX_EPOCH + Duration::from_millis(millis.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_millis(millis.unsigned_abs())
    }
}

pub fn encode_field(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(text) => json!({ "value": text, "type": "STRING" }),
        FieldValue::Integer(number) => json!({ "value": number, "type": "INT64" }),
        FieldValue::Double(number) => json!({ "value": number, "type": "DOUBLE" }),
        FieldValue::Boolean(flag) => json!({ "value": i64::from(*flag), "type": "INT64" }),
        FieldValue::Timestamp(time) => {
            json!({ "value": timestamp_millis(*time), "type": "TIMESTAMP" })
        }
        FieldValue::Bytes(bytes) => json!({
            "value": base64::engine::general_purpose::STANDARD.encode(bytes),
            "type": "BYTES",
        }),
        FieldValue::Asset(asset) => {
            let mut object = Map::new();
            if let Some(checksum) = &asset.file_checksum {
                object.insert("fileChecksum".to_string(), json!(checksum));
            }
            if let Some(size) = asset.size {
                object.insert("size".to_string(), json!(size));
            }
            if let Some(url) = &asset.download_url {
                object.insert("downloadURL".to_string(), json!(url));
            }
            json!({ "value": Value::Object(object), "type": "ASSETID" })
        }
        FieldValue::List(values) => json!({
            "value": values.iter().map(encode_field).collect::<Vec<_>>(),
            "type": "LIST",
        }),
    }
}

/// Decodes a `{ "value": ..., "type": ... }` field. A missing type is inferred
/// from the JSON shape of the value.
pub fn decode_field(field: &Value) -> RemoteResult<FieldValue> {
    let value = field
        .get("value")
        .ok_or_else(|| invalid("field is missing its value"))?;
    let kind = field.get("type").and_then(Value::as_str);

    match kind {
        Some("STRING") => value
            .as_str()
            .map(|text| FieldValue::Text(text.to_string()))
            .ok_or_else(|| invalid("STRING field is not a string")),
        Some("INT64") => value
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| invalid("INT64 field is not an integer")),
        Some("DOUBLE") => value
            .as_f64()
            .map(FieldValue::Double)
            .ok_or_else(|| invalid("DOUBLE field is not a number")),
        Some("BOOLEAN") => match value {
            Value::Bool(flag) => Ok(FieldValue::Boolean(*flag)),
            Value::Number(number) if number.as_i64() == Some(0) => Ok(FieldValue::Boolean(false)),
            Value::Number(number) if number.as_i64() == Some(1) => Ok(FieldValue::Boolean(true)),
            _ => Err(invalid("BOOLEAN field is not a flag")),
        },
        Some("TIMESTAMP") => value
            .as_i64()
            .map(|millis| FieldValue::Timestamp(timestamp_from_millis(millis)))
            .ok_or_else(|| invalid("TIMESTAMP field is not milliseconds")),
        Some("BYTES") => {
            let encoded = value
                .as_str()
                .ok_or_else(|| invalid("BYTES field is not a string"))?;
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(FieldValue::Bytes)
                .map_err(|err| invalid(format!("BYTES field is not base64: {err}")))
        }
        Some("ASSETID") => decode_asset(value).map(FieldValue::Asset),
        Some("LIST") => value
            .as_array()
            .ok_or_else(|| invalid("LIST field is not an array"))?
            .iter()
            .map(decode_field)
            .collect::<RemoteResult<Vec<_>>>()
            .map(FieldValue::List),
        Some(other) => Err(invalid(format!("unsupported field type {other}"))),
        None => infer_field(value),
    }
}

fn infer_field(value: &Value) -> RemoteResult<FieldValue> {
    match value {
        Value::String(text) => Ok(FieldValue::Text(text.clone())),
        Value::Bool(flag) => Ok(FieldValue::Boolean(*flag)),
        Value::Number(number) => number
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| number.as_f64().map(FieldValue::Double))
            .ok_or_else(|| invalid("numeric field out of range")),
        Value::Array(values) => values
            .iter()
            .map(infer_field)
            .collect::<RemoteResult<Vec<_>>>()
            .map(FieldValue::List),
        Value::Object(_) => decode_asset(value).map(FieldValue::Asset),
        Value::Null => Err(invalid("field value is null")),
    }
}

fn decode_asset(value: &Value) -> RemoteResult<AssetReference> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("ASSETID field is not an object"))?;
    Ok(AssetReference {
        file_checksum: object
            .get("fileChecksum")
            .and_then(Value::as_str)
            .map(str::to_string),
        size: object.get("size").and_then(Value::as_u64),
        download_url: object
            .get("downloadURL")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

pub fn encode_record(record: &Record) -> Value {
    let fields = record
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_field(value)))
        .collect::<Map<_, _>>();
    let mut object = Map::new();
    object.insert("recordType".to_string(), json!(record.record_type));
    if let Some(identity) = &record.identity {
        object.insert("recordName".to_string(), json!(identity.record_name));
    }
    if let Some(change_tag) = &record.change_tag {
        object.insert("recordChangeTag".to_string(), json!(change_tag));
    }
    object.insert("fields".to_string(), Value::Object(fields));
    Value::Object(object)
}

/// Decodes a record entry. Fields this codec cannot read are left out so the
/// record mapping decides whether the record is still usable.
pub fn decode_record(value: &Value) -> RemoteResult<Record> {
    let record_type = value
        .get("recordType")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("record is missing recordType"))?;
    let mut record = Record::new(record_type);
    record.identity = value
        .get("recordName")
        .and_then(Value::as_str)
        .map(|name| RecordIdentity::new(name, record_type));
    record.change_tag = value
        .get("recordChangeTag")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(fields) = value.get("fields").and_then(Value::as_object) {
        for (name, field) in fields {
            match decode_field(field) {
                Ok(decoded) => record.set(name.clone(), decoded),
                Err(error) => tracing::debug!(
                    record_type,
                    field = %name,
                    error = %error,
                    "skipping undecodable field"
                ),
            }
        }
    }
    Ok(record)
}

fn comparator(operator: ComparisonOperator) -> &'static str {
    match operator {
        ComparisonOperator::Equals => "EQUALS",
        ComparisonOperator::NotEquals => "NOT_EQUALS",
        ComparisonOperator::LessThan => "LESS_THAN",
        ComparisonOperator::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
        ComparisonOperator::GreaterThan => "GREATER_THAN",
        ComparisonOperator::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
        ComparisonOperator::BeginsWith => "BEGINS_WITH",
        ComparisonOperator::In => "IN",
    }
}

pub fn encode_filters(predicate: &Predicate) -> Value {
    Value::Array(
        predicate
            .comparisons()
            .iter()
            .map(|comparison| {
                json!({
                    "comparator": comparator(comparison.operator),
                    "fieldName": comparison.field,
                    "fieldValue": encode_field(&comparison.value),
                })
            })
            .collect(),
    )
}

pub fn encode_sorts(sort_keys: &[SortKey]) -> Value {
    Value::Array(
        sort_keys
            .iter()
            .map(|key| json!({ "fieldName": key.field, "ascending": key.ascending }))
            .collect(),
    )
}

pub fn encode_query(spec: &QuerySpec) -> Value {
    let mut body = Map::new();
    body.insert(
        "query".to_string(),
        json!({
            "recordType": spec.record_type,
            "filterBy": encode_filters(&spec.predicate),
            "sortBy": encode_sorts(&spec.sort_keys),
        }),
    );
    if let Some(limit) = spec.limit {
        body.insert("resultsLimit".to_string(), json!(limit));
    }
    if let Some(keys) = &spec.desired_keys {
        body.insert("desiredKeys".to_string(), json!(keys));
    }
    Value::Object(body)
}

/// Packs the request body and the server's continuation marker into one
/// opaque cursor, since continuing a query resends the original query.
pub fn encode_cursor(body: &Value, marker: &str) -> QueryCursor {
    let packed = json!({ "body": body, "marker": marker });
    QueryCursor::new(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(packed.to_string()))
}

pub fn decode_cursor(cursor: &QueryCursor) -> RemoteResult<(Value, String)> {
    let malformed = || RemoteError::InvalidArguments(format!("malformed query cursor {cursor}"));
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor.as_str())
        .map_err(|_| malformed())?;
    let packed: Value = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
    let marker = packed
        .get("marker")
        .and_then(Value::as_str)
        .ok_or_else(malformed)?
        .to_string();
    let body = packed.get("body").cloned().ok_or_else(malformed)?;
    Ok((body, marker))
}

/// Request body for a query submission. A continuation replays the original
/// query with the marker and, when given, a new page limit.
pub fn encode_query_request(request: &QueryRequest) -> RemoteResult<Value> {
    match request {
        QueryRequest::Initial(spec) => Ok(encode_query(spec)),
        QueryRequest::Continuation { cursor, limit } => {
            let (mut body, marker) = decode_cursor(cursor)?;
            let object = body
                .as_object_mut()
                .ok_or_else(|| RemoteError::InvalidArguments(format!("malformed query cursor {cursor}")))?;
            object.insert("continuationMarker".to_string(), json!(marker));
            match limit {
                Some(limit) => {
                    object.insert("resultsLimit".to_string(), json!(limit));
                }
                None => {
                    object.remove("resultsLimit");
                }
            }
            Ok(body)
        }
    }
}

/// Splits a query response into per-record outcomes plus the next cursor.
pub fn decode_query_response(
    request_body: &Value,
    response: &Value,
) -> RemoteResult<(Vec<RecordMatched>, Option<QueryCursor>)> {
    let record_type = request_body
        .pointer("/query/recordType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let entries = response
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("query response is missing records"))?;

    let matched = entries
        .iter()
        .map(|entry| {
            let record_name = entry
                .get("recordName")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let identity = RecordIdentity::new(
                record_name,
                entry
                    .get("recordType")
                    .and_then(Value::as_str)
                    .unwrap_or(record_type),
            );
            let outcome = match entry_error(entry) {
                Some(error) => Err(error),
                None => decode_record(entry),
            };
            (identity, outcome)
        })
        .collect();

    let cursor = response
        .get("continuationMarker")
        .and_then(Value::as_str)
        .filter(|marker| !marker.is_empty())
        .map(|marker| {
            let mut body = request_body.clone();
            if let Some(object) = body.as_object_mut() {
                object.remove("continuationMarker");
            }
            encode_cursor(&body, marker)
        });
    Ok((matched, cursor))
}

/// Per-item error embedded in a batch response, if any.
pub fn entry_error(entry: &Value) -> Option<RemoteError> {
    let code = entry.get("serverErrorCode").and_then(Value::as_str)?;
    let reason = entry
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or(code)
        .to_string();
    let retry_after_secs = entry.get("retryAfter").and_then(Value::as_u64);
    Some(map_server_error(code, reason, retry_after_secs))
}

pub fn map_server_error(code: &str, reason: String, retry_after_secs: Option<u64>) -> RemoteError {
    match code {
        "AUTHENTICATION_REQUIRED" | "AUTHENTICATION_FAILED" => RemoteError::NotAuthenticated,
        "ACCESS_DENIED" => RemoteError::PermissionFailure(reason),
        "NOT_FOUND" | "ZONE_NOT_FOUND" => RemoteError::UnknownItem(reason),
        "CONFLICT" | "EXISTS" => RemoteError::ServerRecordChanged(reason),
        "BAD_REQUEST" | "VALIDATING_REFERENCE_ERROR" => RemoteError::InvalidArguments(reason),
        "QUOTA_EXCEEDED" => RemoteError::QuotaExceeded,
        "THROTTLED" | "TRY_AGAIN_LATER" => RemoteError::RateLimited { retry_after_secs },
        "UNAVAILABLE" | "SERVICE_UNAVAILABLE" => RemoteError::ServiceUnavailable(reason),
        _ => RemoteError::Internal(format!("{code}: {reason}")),
    }
}

/// Maps a failed HTTP exchange, preferring the server error code in the body.
pub fn map_http_status(status: reqwest::StatusCode, body: &str) -> RemoteError {
    if let Some(error) = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| entry_error(&payload))
    {
        return error;
    }
    match status {
        reqwest::StatusCode::UNAUTHORIZED => RemoteError::NotAuthenticated,
        reqwest::StatusCode::FORBIDDEN => RemoteError::PermissionFailure(body.to_string()),
        reqwest::StatusCode::NOT_FOUND => RemoteError::UnknownItem(body.to_string()),
        reqwest::StatusCode::CONFLICT | reqwest::StatusCode::PRECONDITION_FAILED => {
            RemoteError::ServerRecordChanged(body.to_string())
        }
        reqwest::StatusCode::BAD_REQUEST => RemoteError::InvalidArguments(body.to_string()),
        reqwest::StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited {
            retry_after_secs: None,
        },
        reqwest::StatusCode::SERVICE_UNAVAILABLE => {
            RemoteError::ServiceUnavailable(body.to_string())
        }
        _ => RemoteError::Internal(format!("http request failed with status {status}: {body}")),
    }
}

/// Save is a forced replace when the record has an identity, so the change
/// tag is never compared.
pub fn encode_save(record: &Record) -> Value {
    let operation_type = if record.identity.is_some() {
        "forceUpdate"
    } else {
        "create"
    };
    json!({
        "operations": [{ "operationType": operation_type, "record": encode_record(record) }],
        "atomic": true,
    })
}

pub fn encode_delete(identity: &RecordIdentity) -> Value {
    json!({
        "operations": [{
            "operationType": "forceDelete",
            "record": { "recordName": identity.record_name, "recordType": identity.record_type },
        }],
        "atomic": true,
    })
}

pub fn encode_lookup(identity: &RecordIdentity) -> Value {
    json!({ "records": [{ "recordName": identity.record_name }] })
}

/// First entry of a batch response, with embedded errors surfaced.
pub fn first_entry<'a>(response: &'a Value, key: &str) -> RemoteResult<&'a Value> {
    let entry = response
        .get(key)
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .ok_or_else(|| invalid(format!("response is missing {key}")))?;
    match entry_error(entry) {
        Some(error) => Err(error),
        None => Ok(entry),
    }
}

/// Lookup result; a `NOT_FOUND` entry means the record does not exist.
pub fn decode_lookup(response: &Value) -> RemoteResult<Option<Record>> {
    match first_entry(response, "records") {
        Ok(entry) => decode_record(entry).map(Some),
        Err(RemoteError::UnknownItem(_)) => Ok(None),
        Err(error) => Err(error),
    }
}

pub fn decode_deleted(response: &Value, identity: &RecordIdentity) -> RemoteResult<RecordIdentity> {
    let entry = first_entry(response, "records")?;
    let record_name = entry
        .get("recordName")
        .and_then(Value::as_str)
        .unwrap_or(identity.record_name.as_str());
    Ok(RecordIdentity::new(record_name, identity.record_type.as_str()))
}

pub fn encode_subscription(subscription: &Subscription) -> Value {
    let triggers = subscription.triggers;
    let fires_on = [
        (triggers.on_create, "create"),
        (triggers.on_update, "update"),
        (triggers.on_delete, "delete"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect::<Vec<_>>();

    let notification = &subscription.notification;
    let mut info = Map::new();
    if let Some(title) = &notification.title {
        info.insert("title".to_string(), json!(title));
    }
    if let Some(body) = &notification.body {
        info.insert("alertBody".to_string(), json!(body));
    }
    if let Some(sound) = &notification.sound {
        info.insert("soundName".to_string(), json!(sound));
    }
    info.insert("shouldBadge".to_string(), json!(notification.badge));

    json!({
        "operations": [{
            "operationType": "create",
            "subscription": {
                "subscriptionID": subscription.id.as_str(),
                "subscriptionType": "query",
                "query": {
                    "recordType": subscription.record_type,
                    "filterBy": encode_filters(&subscription.predicate),
                },
                "firesOn": fires_on,
                "notificationInfo": Value::Object(info),
            },
        }],
    })
}

pub fn encode_subscription_delete(id: &SubscriptionId) -> Value {
    json!({
        "operations": [{
            "operationType": "delete",
            "subscription": { "subscriptionID": id.as_str() },
        }],
    })
}

pub fn decode_subscription_id(response: &Value) -> RemoteResult<SubscriptionId> {
    first_entry(response, "subscriptions")?
        .get("subscriptionID")
        .and_then(Value::as_str)
        .map(SubscriptionId::new)
        .ok_or_else(|| invalid("subscription entry is missing subscriptionID"))
}

/// Caller record of `users/caller`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerInfo {
    pub user_record_name: String,
    pub discoverable: bool,
}

pub fn decode_caller(response: &Value) -> RemoteResult<CallerInfo> {
    let user_record_name = response
        .get("userRecordName")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("caller response is missing userRecordName"))?
        .to_string();
    Ok(CallerInfo {
        user_record_name,
        discoverable: response
            .get("isDiscoverable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Account status implied by the outcome of a caller lookup. Errors that say
/// nothing about the account are passed through.
pub fn account_status_from_caller(caller: RemoteResult<CallerInfo>) -> RemoteResult<AccountStatus> {
    match caller {
        Ok(_) => Ok(AccountStatus::Available),
        Err(RemoteError::NotAuthenticated) => Ok(AccountStatus::NoAccount),
        Err(RemoteError::PermissionFailure(_)) => Ok(AccountStatus::Restricted),
        Err(RemoteError::ServiceUnavailable(_)) => Ok(AccountStatus::TemporarilyUnavailable),
        Err(error) => Err(error),
    }
}

pub fn permission_from_caller(caller: &CallerInfo) -> PermissionStatus {
    if caller.discoverable {
        PermissionStatus::Granted
    } else {
        PermissionStatus::Denied
    }
}

pub fn encode_discover(user_record_id: &RecordIdentity) -> Value {
    json!({ "users": [{ "userRecordName": user_record_id.record_name }] })
}

/// Discovered identity, or `None` when the user is not discoverable.
pub fn decode_discovered(response: &Value) -> RemoteResult<Option<UserIdentity>> {
    let entry = match first_entry(response, "users") {
        Ok(entry) => entry,
        Err(RemoteError::UnknownItem(_)) => return Ok(None),
        Err(error) => return Err(error),
    };
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
    let name_components = entry.get("nameComponents").map(|names| NameComponents {
        given_name: text(names.get("givenName")),
        family_name: text(names.get("familyName")),
    });
    Ok(Some(UserIdentity {
        user_record_id: entry
            .get("userRecordName")
            .and_then(Value::as_str)
            .map(RecordIdentity::user),
        name_components,
        lookup_email: text(entry.get("emailAddress")),
    }))
}
