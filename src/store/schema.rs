//! Versioned collection documents.
//!
//! ```text
//! {"schemaVersion":1,"savedAt":"2024-03-01T10:00:00Z","data":{"kind":"records","items":[...]}}
//! ```
//!
//! Documents without a `schemaVersion` are the untagged layout older builds
//! wrote (a bare array, or a bare settings object) and decode as version 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::model::{Collection, EntityKind};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRef<'a> {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    data: &'a Collection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    schema_version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    data: Value,
}

#[derive(Debug)]
pub struct Decoded {
    pub collection: Collection,
    pub schema_version: u32,
    pub saved_at: Option<DateTime<Utc>>,
}

pub fn encode(collection: &Collection, saved_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string(&DocumentRef {
        schema_version: SCHEMA_VERSION,
        saved_at,
        data: collection,
    })
}

pub fn decode(expected: EntityKind, raw: &str) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;

    let versioned = value
        .as_object()
        .is_some_and(|object| object.contains_key("schemaVersion"));
    if !versioned {
        return Ok(Decoded {
            collection: Collection::from_untagged(expected, value)?,
            schema_version: 0,
            saved_at: None,
        });
    }

    let document = Document::deserialize(value)?;
    if document.schema_version > SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: document.schema_version,
            supported: SCHEMA_VERSION,
        });
    }

    let collection = Collection::deserialize(document.data)?;
    if collection.kind() != expected {
        return Err(DecodeError::KindMismatch {
            expected,
            found: collection.kind(),
        });
    }

    Ok(Decoded {
        collection,
        schema_version: document.schema_version,
        saved_at: document.saved_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Settings, Topic};

    #[test]
    fn encoded_document_decodes_to_same_collection() {
        let mut topic = Topic::new("Alpha");
        topic.id = "t-1".to_owned();
        let collection = Collection::Topics(vec![topic]);

        let raw = encode(&collection, Utc::now()).unwrap();
        let decoded = decode(EntityKind::Topics, &raw).unwrap();
        assert_eq!(decoded.collection, collection);
        assert_eq!(decoded.schema_version, SCHEMA_VERSION);
        assert!(decoded.saved_at.is_some());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let error = decode(EntityKind::Records, "{\"schemaVersion\":1,").unwrap_err();
        assert!(matches!(error, DecodeError::Malformed(_)));
    }

    #[test]
    fn future_version_is_rejected() {
        let raw = r#"{"schemaVersion":7,"data":{"kind":"topics","items":[]}}"#;
        let error = decode(EntityKind::Topics, raw).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::UnsupportedVersion { found: 7, .. }
        ));
    }

    #[test]
    fn document_under_wrong_key_is_rejected() {
        let raw = encode(&Collection::Notes(Vec::new()), Utc::now()).unwrap();
        let error = decode(EntityKind::Topics, &raw).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::KindMismatch {
                expected: EntityKind::Topics,
                found: EntityKind::Notes
            }
        ));
    }

    #[test]
    fn bare_settings_object_is_version_zero() {
        let decoded = decode(EntityKind::Settings, r#"{"mindMapSpacing": 90.0}"#).unwrap();
        assert_eq!(decoded.schema_version, 0);
        let Collection::Settings(settings) = decoded.collection else {
            panic!("expected settings");
        };
        assert_eq!(settings.mind_map_spacing, 90.0);
        assert_eq!(settings.assistant, Settings::default().assistant);
    }

    #[test]
    fn array_of_wrong_shape_is_malformed() {
        let error = decode(EntityKind::Topics, r#"[{"name": 3}]"#).unwrap_err();
        assert!(matches!(error, DecodeError::Malformed(_)));
    }
}
