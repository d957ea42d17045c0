//! Record types for locally tracked data.

use crate::{Error, RecordId};
use serde::{Deserialize, Serialize};

/// The open, named set of scalar values carried by a record.
///
/// The payload is domain-specific (text, integers, status strings, date
/// strings) and opaque to the sync engine except for the record id.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A locally identified unit of domain data synchronized between stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable local identifier, assigned by the record store on first
    /// create. `None` means the record has never been committed. Once
    /// assigned, the id is immutable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// The actual data payload
    pub fields: Fields,
}

impl Record {
    /// Create an uncommitted record from its fields.
    pub fn new(fields: Fields) -> Self {
        Self { id: None, fields }
    }

    /// Create a record with an already-assigned id.
    pub fn with_id(id: RecordId, fields: Fields) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }

    /// The assigned id, or [`Error::MissingId`] for an uncommitted record.
    pub fn require_id(&self) -> Result<RecordId, Error> {
        self.id.ok_or(Error::MissingId)
    }

    /// Check whether the record has been committed to a store.
    pub fn is_committed(&self) -> bool {
        self.id.is_some()
    }

    /// Build a [`Fields`] map from a JSON object literal.
    ///
    /// Non-object values yield an empty map; convenient in tests and for
    /// collaborators that already hold `serde_json::Value` payloads.
    pub fn fields_from(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Fields::new(),
        }
    }
}
