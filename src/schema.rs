//! Schema records and snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

/// Format of a registered schema. The registry omits the field for Avro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    #[default]
    Avro,
    Json,
    Protobuf,
}

/// One version of a subject as returned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: u32,
    pub id: u32,
    /// Raw schema text, as stored
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: SchemaType,
}

/// Where an already registered schema lives under a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMatch {
    pub id: u32,
    pub version: u32,
}

/// A subject at one version, with the version list known at fetch time.
///
/// Snapshots are shared as `Arc<SchemaSnapshot>` and never mutated. The
/// version lists are not refreshed when the registry later gains versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub subject_name: String,
    pub version: u32,
    pub id: u32,
    pub schema_type: SchemaType,
    pub schema_text: String,
    /// Every version of the subject, in the order the registry listed them
    pub all_versions: Vec<u32>,
    /// `all_versions` without `version`
    pub other_versions: Vec<u32>,
    pub fetched_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Combine a version record with the subject's version list
    pub fn assemble(record: SubjectVersion, all_versions: Vec<u32>) -> Self {
        let other_versions = all_versions
            .iter()
            .copied()
            .filter(|v| *v != record.version)
            .collect();

        Self {
            subject_name: record.subject,
            version: record.version,
            id: record.id,
            schema_type: record.schema_type,
            schema_text: record.schema,
            all_versions,
            other_versions,
            fetched_at: Utc::now(),
        }
    }

    /// Structural parse of the schema text
    pub fn parsed(&self) -> Result<serde_json::Value> {
        parse_schema_text(self.schema_type, &self.schema_text).map_err(|reason| SchemaError::Parse {
            subject: self.subject_name.clone(),
            version: self.version,
            reason,
        })
    }

    /// Checksum of the parsed structure, insensitive to whitespace and key order
    pub fn fingerprint(&self) -> Result<Checksum> {
        self.parsed().map(|value| Checksum::from_json(&value))
    }

    /// Same registry content, ignoring when it was fetched
    pub fn same_content(&self, other: &SchemaSnapshot) -> bool {
        self.subject_name == other.subject_name
            && self.version == other.version
            && self.id == other.id
            && self.schema_type == other.schema_type
            && self.schema_text == other.schema_text
            && self.all_versions == other.all_versions
    }

    /// Cache key (e.g. "orders-value/3")
    pub fn key(&self) -> String {
        format!("{}/{}", self.subject_name, self.version)
    }
}

/// Parse schema text into its structural JSON form.
///
/// Avro text must be a valid Avro schema and JSON-Schema text must compile.
/// Protobuf text is not JSON; it is kept as an opaque string value.
pub fn parse_schema_text(
    schema_type: SchemaType,
    text: &str,
) -> std::result::Result<serde_json::Value, String> {
    if schema_type == SchemaType::Protobuf {
        return Ok(serde_json::Value::String(text.to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;

    match schema_type {
        SchemaType::Avro => {
            apache_avro::Schema::parse(&value).map_err(|e| e.to_string())?;
        }
        SchemaType::Json => {
            if let Err(e) = jsonschema::JSONSchema::compile(&value) {
                return Err(e.to_string());
            }
        }
        SchemaType::Protobuf => {}
    }

    Ok(value)
}
