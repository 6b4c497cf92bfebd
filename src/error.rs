use std::path::PathBuf;

use thiserror::Error;

use crate::model::EntityKind;

/// Errors raised by a [`crate::store::KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key {key:?}")]
    InvalidKey { key: String },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store unavailable for key {key}")]
    Unavailable { key: String },
}

/// Why a persisted collection document could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("document holds {found} but key belongs to {expected}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn required(field: &'static str) -> Self {
        Self {
            field,
            reason: "is required".to_owned(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no assistant endpoint configured")]
    NotConfigured,

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} failed")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("endpoint answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("response does not match the mind-map schema: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
pub enum LabError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("failed to encode {kind}")]
    Encode {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("encoded {kind} would not read back")]
    Unreadable {
        kind: EntityKind,
        #[source]
        source: DecodeError,
    },

    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

pub type LabResult<T> = Result<T, LabError>;
