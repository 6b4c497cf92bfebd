use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{collection_entity, require_text};
use crate::error::ValidationError;

/// A research project grouping records and notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            description: String::new(),
            color: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

collection_entity!(Topic, Topics, title);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub procedure: String,
    #[serde(default)]
    pub results: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sample_ids: Vec<String>,
    #[serde(default)]
    pub sop_id: Option<String>,
    #[serde(default)]
    pub performed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentRecord {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            topic_id: None,
            status: RecordStatus::Planned,
            objective: String::new(),
            procedure: String::new(),
            results: String::new(),
            conclusion: String::new(),
            tags: Vec::new(),
            sample_ids: Vec::new(),
            sop_id: None,
            performed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_topic(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.status == RecordStatus::Completed && self.performed_at.is_none() {
            return Err(ValidationError::invalid(
                "performedAt",
                "a completed record needs the date it was performed",
            ));
        }
        Ok(())
    }
}

collection_entity!(ExperimentRecord, Records, title);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub record_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            content: content.into(),
            topic_id: None,
            record_ids: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

collection_entity!(Note, Notes, title);

/// Standard operating procedure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sop {
    pub id: String,
    pub title: String,
    #[serde(default = "default_sop_version")]
    pub version: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub safety_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_sop_version() -> String {
    "1.0".to_owned()
}

impl Sop {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            version: default_sop_version(),
            category: String::new(),
            steps: Vec::new(),
            safety_notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("version", &self.version)?;
        if let Some(index) = self.steps.iter().position(|step| step.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "steps",
                format!("step {} is empty", index + 1),
            ));
        }
        Ok(())
    }
}

collection_entity!(Sop, Sops, title);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStatus {
    #[default]
    Available,
    InUse,
    Depleted,
    Disposed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub quantity: Option<Quantity>,
    #[serde(default)]
    pub status: SampleStatus,
    #[serde(default)]
    pub record_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            kind: String::new(),
            location: String::new(),
            quantity: None,
            status: SampleStatus::Available,
            record_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if let Some(quantity) = &self.quantity {
            if !quantity.value.is_finite() || quantity.value < 0.0 {
                return Err(ValidationError::invalid(
                    "quantity",
                    "must be a non-negative number",
                ));
            }
            require_text("quantity.unit", &quantity.unit)?;
        }
        Ok(())
    }
}

collection_entity!(Sample, Samples, name);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub reminder_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            start,
            end: None,
            topic_id: None,
            record_id: None,
            reminder_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the event overlaps the half-open window `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let end = self.end.unwrap_or(self.start);
        self.start < to && end >= from
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if let Some(end) = self.end
            && end < self.start
        {
            return Err(ValidationError::invalid("end", "ends before it starts"));
        }
        Ok(())
    }
}

collection_entity!(CalendarEvent, Calendar, title);
