//! Mapping contract between application types and generic records.

use crate::types::{AssetReference, Record, RecordIdentity};
use serde::{Deserialize, Serialize};

/// Capability required of any type read from or written to the store.
///
/// `decode` must be total: a record with missing or malformed fields yields
/// `None`, which fetches treat as "skip this record" rather than a failure.
pub trait RecordMapping: Sized + Send + Sync {
    const RECORD_TYPE: &'static str;

    fn decode(record: &Record) -> Option<Self>;

    /// Field mapping to submit, carrying the identity once one was assigned.
    fn encode(&self) -> Record;

    fn identity(&self) -> Option<RecordIdentity> {
        self.encode().identity
    }
}

/// Named item with an optional image, stored as a `Records` record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub image: Option<AssetReference>,
    pub identity: Option<RecordIdentity>,
}

impl Item {
    pub const NAME_FIELD: &'static str = "name";
    pub const IMAGE_FIELD: &'static str = "image";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            identity: None,
        }
    }

    pub fn with_image(mut self, image: AssetReference) -> Self {
        self.image = Some(image);
        self
    }

    /// Copy of the item with a new name, keeping its identity so the next
    /// save replaces the stored record.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

impl RecordMapping for Item {
    const RECORD_TYPE: &'static str = "Records";

    fn decode(record: &Record) -> Option<Self> {
        let name = record.text(Self::NAME_FIELD)?;
        let image = match record.get(Self::IMAGE_FIELD) {
            None => None,
            Some(_) => Some(record.asset(Self::IMAGE_FIELD)?.clone()),
        };
        Some(Self {
            name: name.to_string(),
            image,
            identity: record.identity.clone(),
        })
    }

    fn encode(&self) -> Record {
        let mut record = Record::new(Self::RECORD_TYPE)
            .with_identity(self.identity.clone())
            .with_field(Self::NAME_FIELD, self.name.as_str());
        if let Some(image) = &self.image {
            record.set(Self::IMAGE_FIELD, image.clone());
        }
        record
    }

    fn identity(&self) -> Option<RecordIdentity> {
        self.identity.clone()
    }
}
