//! The fixed schema of the resolve-versions table.
//!
//! Serializes in the layout the BigQuery REST API expects for `schema.fields`.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Timestamp,
    String,
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    pub fn scalar(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            fields: Vec::new(),
        }
    }

    pub fn record(name: &str, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Record,
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// `timestamp, userId, unitId, ipAddress, userAgent, customClientData, packages{reference, version}`.
    pub fn resolve_versions() -> Self {
        use FieldType::{String, Timestamp};

        Self {
            fields: vec![
                FieldSchema::scalar("timestamp", Timestamp),
                FieldSchema::scalar("userId", String),
                FieldSchema::scalar("unitId", String),
                FieldSchema::scalar("ipAddress", String),
                FieldSchema::scalar("userAgent", String),
                FieldSchema::scalar("customClientData", String),
                FieldSchema::record(
                    "packages",
                    vec![
                        FieldSchema::scalar("reference", String),
                        FieldSchema::scalar("version", String),
                    ],
                ),
            ],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl ValueObject for TableSchema {}
