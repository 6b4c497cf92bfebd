//! Entity types persisted by the lab store.
//!
//! Every entity type lives in one collection stored under one key. A
//! [`Collection`] is the decoded form of such a document; its variant tag is
//! the entity kind, so a document stored under the wrong key is detectable.

mod chat;
mod entities;
mod settings;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::mindmap::MindMap;

pub use chat::{ChatMessage, ChatSession, MessageSource, Role};
pub use entities::{
    CalendarEvent, ExperimentRecord, Note, Quantity, RecordStatus, Sample, SampleStatus, Sop,
    Topic,
};
pub use settings::{AssistantSettings, Settings};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Topics,
    Records,
    Notes,
    Sops,
    Samples,
    Calendar,
    ChatSessions,
    MindMaps,
    Settings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        Self::Topics,
        Self::Records,
        Self::Notes,
        Self::Sops,
        Self::Samples,
        Self::Calendar,
        Self::ChatSessions,
        Self::MindMaps,
        Self::Settings,
    ];

    /// Collections read on almost every screen; warmed up at start-up.
    pub const FREQUENT: [EntityKind; 5] = [
        Self::Topics,
        Self::Records,
        Self::Notes,
        Self::MindMaps,
        Self::Settings,
    ];

    pub fn store_key(self) -> &'static str {
        match self {
            Self::Topics => "lab_topics",
            Self::Records => "lab_records",
            Self::Notes => "lab_notes",
            Self::Sops => "lab_sops",
            Self::Samples => "lab_samples",
            Self::Calendar => "lab_calendar",
            Self::ChatSessions => "lab_chat_sessions",
            Self::MindMaps => "lab_mind_maps",
            Self::Settings => "lab_settings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Topics => "topic",
            Self::Records => "record",
            Self::Notes => "note",
            Self::Sops => "sop",
            Self::Samples => "sample",
            Self::Calendar => "calendar event",
            Self::ChatSessions => "chat session",
            Self::MindMaps => "mind map",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A whole entity collection as stored under its key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "camelCase")]
pub enum Collection {
    Topics(Vec<Topic>),
    Records(Vec<ExperimentRecord>),
    Notes(Vec<Note>),
    Sops(Vec<Sop>),
    Samples(Vec<Sample>),
    Calendar(Vec<CalendarEvent>),
    ChatSessions(Vec<ChatSession>),
    MindMaps(Vec<MindMap>),
    Settings(Settings),
}

impl Collection {
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Topics => Self::Topics(Vec::new()),
            EntityKind::Records => Self::Records(Vec::new()),
            EntityKind::Notes => Self::Notes(Vec::new()),
            EntityKind::Sops => Self::Sops(Vec::new()),
            EntityKind::Samples => Self::Samples(Vec::new()),
            EntityKind::Calendar => Self::Calendar(Vec::new()),
            EntityKind::ChatSessions => Self::ChatSessions(Vec::new()),
            EntityKind::MindMaps => Self::MindMaps(Vec::new()),
            EntityKind::Settings => Self::Settings(Settings::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Topics(_) => EntityKind::Topics,
            Self::Records(_) => EntityKind::Records,
            Self::Notes(_) => EntityKind::Notes,
            Self::Sops(_) => EntityKind::Sops,
            Self::Samples(_) => EntityKind::Samples,
            Self::Calendar(_) => EntityKind::Calendar,
            Self::ChatSessions(_) => EntityKind::ChatSessions,
            Self::MindMaps(_) => EntityKind::MindMaps,
            Self::Settings(_) => EntityKind::Settings,
        }
    }

    /// Number of entities; settings count as one document.
    pub fn len(&self) -> usize {
        match self {
            Self::Topics(items) => items.len(),
            Self::Records(items) => items.len(),
            Self::Notes(items) => items.len(),
            Self::Sops(items) => items.len(),
            Self::Samples(items) => items.len(),
            Self::Calendar(items) => items.len(),
            Self::ChatSessions(items) => items.len(),
            Self::MindMaps(items) => items.len(),
            Self::Settings(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the untagged payload that older builds stored directly under
    /// a key: a bare array of entities, or a bare settings object.
    pub fn from_untagged(kind: EntityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Topics => Self::Topics(serde_json::from_value(value)?),
            EntityKind::Records => Self::Records(serde_json::from_value(value)?),
            EntityKind::Notes => Self::Notes(serde_json::from_value(value)?),
            EntityKind::Sops => Self::Sops(serde_json::from_value(value)?),
            EntityKind::Samples => Self::Samples(serde_json::from_value(value)?),
            EntityKind::Calendar => Self::Calendar(serde_json::from_value(value)?),
            EntityKind::ChatSessions => Self::ChatSessions(serde_json::from_value(value)?),
            EntityKind::MindMaps => Self::MindMaps(serde_json::from_value(value)?),
            EntityKind::Settings => Self::Settings(serde_json::from_value(value)?),
        })
    }
}

/// A record type kept in its own collection.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Human-facing name used for search and listings.
    fn title(&self) -> &str;

    fn validate(&self) -> Result<(), ValidationError>;

    /// Assigns identity and creation time to a freshly built entity.
    fn stamp_new(&mut self, id: String, now: DateTime<Utc>);

    fn touch(&mut self, now: DateTime<Utc>);

    /// Items of `collection`, or nothing if it holds another kind.
    fn from_collection(collection: Collection) -> Vec<Self>;

    fn into_collection(items: Vec<Self>) -> Collection;
}

/// Implements [`Entity`] for a struct carrying `id`, `created_at` and
/// `updated_at` fields. Validation stays on the type as `check`.
macro_rules! collection_entity {
    ($ty:ty, $variant:ident, $title:ident) => {
        impl $crate::model::Entity for $ty {
            const KIND: $crate::model::EntityKind = $crate::model::EntityKind::$variant;

            fn id(&self) -> &str {
                &self.id
            }

            fn title(&self) -> &str {
                &self.$title
            }

            fn validate(&self) -> Result<(), $crate::error::ValidationError> {
                self.check()
            }

            fn stamp_new(&mut self, id: String, now: chrono::DateTime<chrono::Utc>) {
                self.id = id;
                self.created_at = now;
                self.updated_at = now;
            }

            fn touch(&mut self, now: chrono::DateTime<chrono::Utc>) {
                self.updated_at = now;
            }

            fn from_collection(collection: $crate::model::Collection) -> Vec<Self> {
                match collection {
                    $crate::model::Collection::$variant(items) => items,
                    _ => Vec::new(),
                }
            }

            fn into_collection(items: Vec<Self>) -> $crate::model::Collection {
                $crate::model::Collection::$variant(items)
            }
        }
    };
}

pub(crate) use collection_entity;

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::required(field))
    } else {
        Ok(())
    }
}
