//! Record, identity and account data types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Record type the service uses for user records.
pub const USER_RECORD_TYPE: &str = "Users";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub record_name: String,
    pub record_type: String,
}

impl RecordIdentity {
    pub fn new(record_name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            record_name: record_name.into(),
            record_type: record_type.into(),
        }
    }

    pub fn user(record_name: impl Into<String>) -> Self {
        Self::new(record_name, USER_RECORD_TYPE)
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_type, self.record_name)
    }
}

/// Reference to a file stored by the service next to a record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub file_checksum: Option<String>,
    pub size: Option<u64>,
    pub download_url: Option<String>,
}

impl AssetReference {
    pub fn from_url(download_url: impl Into<String>) -> Self {
        Self {
            download_url: Some(download_url.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Timestamp(SystemTime),
    Bytes(Vec<u8>),
    Asset(AssetReference),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Bytes(_) => "bytes",
            Self::Asset(_) => "asset",
            Self::List(_) => "list",
        }
    }

    /// Orders two values of comparable kinds. Integers and doubles compare
    /// numerically; other mixed kinds are unordered.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Integer(left), Self::Double(right)) => (*left as f64).partial_cmp(right),
            (Self::Double(left), Self::Integer(right)) => left.partial_cmp(&(*right as f64)),
            (Self::Double(left), Self::Double(right)) => left.partial_cmp(right),
            (Self::Boolean(left), Self::Boolean(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            (left, right) if left == right => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<SystemTime> for FieldValue {
    fn from(value: SystemTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<AssetReference> for FieldValue {
    fn from(value: AssetReference) -> Self {
        Self::Asset(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        Self::List(value)
    }
}

/// Generic unit exchanged with the remote store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_type: String,
    pub identity: Option<RecordIdentity>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Server version tag of the stored record. Opaque to the client.
    pub change_tag: Option<String>,
}

impl Record {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            identity: None,
            fields: BTreeMap::new(),
            change_tag: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<RecordIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FieldValue::Double(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Booleans travel as 0/1 integers on some transports, so both shapes are accepted.
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Boolean(value) => Some(*value),
            FieldValue::Integer(0) => Some(false),
            FieldValue::Integer(1) => Some(true),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<SystemTime> {
        match self.get(name)? {
            FieldValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            FieldValue::Bytes(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    pub fn asset(&self, name: &str) -> Option<&AssetReference> {
        match self.get(name)? {
            FieldValue::Asset(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Available,
    Restricted,
    NoAccount,
    CouldNotDetermine,
    TemporarilyUnavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    InitialState,
    CouldNotComplete,
    Denied,
    Granted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameComponents {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_record_id: Option<RecordIdentity>,
    pub name_components: Option<NameComponents>,
    pub lookup_email: Option<String>,
}

impl UserIdentity {
    pub fn given_name(&self) -> Option<&str> {
        self.name_components
            .as_ref()?
            .given_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn typed_accessors_type_mismatch_expected_none() {
        let record = Record::new("Records")
            .with_field("name", "milk")
            .with_field("count", 3_i64);

        assert_eq!(record.text("name"), Some("milk"));
        assert_eq!(record.text("count"), None);
        assert_eq!(record.integer("name"), None);
        assert_eq!(record.double("count"), Some(3.0));
        assert_eq!(record.asset("missing"), None);
    }

    #[test]
    fn boolean_accessor_accepts_integer_flags() {
        let record = Record::new("Records")
            .with_field("done", 1_i64)
            .with_field("archived", false)
            .with_field("priority", 7_i64);

        assert_eq!(record.boolean("done"), Some(true));
        assert_eq!(record.boolean("archived"), Some(false));
        assert_eq!(record.boolean("priority"), None);
    }

    #[test]
    fn compare_mixed_numeric_kinds_expected_numeric_order() {
        let one = FieldValue::Integer(1);
        let one_and_half = FieldValue::Double(1.5);
        assert_eq!(one.compare(&one_and_half), Some(Ordering::Less));
        assert_eq!(one_and_half.compare(&one), Some(Ordering::Greater));
        assert_eq!(FieldValue::from("1").compare(&one), None);
    }

    #[test]
    fn compare_timestamps_expected_chronological_order() {
        let earlier = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let later = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
        assert_eq!(
            FieldValue::from(earlier).compare(&FieldValue::from(later)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn given_name_blank_expected_none() {
        let identity = UserIdentity {
            name_components: Some(NameComponents {
                given_name: Some("  ".to_string()),
                family_name: Some("Appleseed".to_string()),
            }),
            ..UserIdentity::default()
        };
        assert_eq!(identity.given_name(), None);
    }

    #[test]
    fn record_identity_display_expected_type_and_name() {
        let identity = RecordIdentity::new("A1B2", "Records");
        assert_eq!(identity.to_string(), "Records/A1B2");
        assert_eq!(RecordIdentity::user("_abc").record_type, USER_RECORD_TYPE);
    }
}
