//! Reading and Subject domain types.
//!
//! A [`Reading`] is one persisted blood-pressure measurement:
//! photo received → vision model extracts numbers → classified → stored.
//! Readings are append-only; nothing in the system updates or deletes one.

use serde::{Deserialize, Serialize};

/// Surrogate identifier assigned by the storage backend.
pub type RecordId = i64;

/// The string shape every backend returns for `created_at`.
///
/// Stored timestamps are UTC in this format regardless of backend.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The chat-platform identity a reading belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Stable platform user id (e.g. DingTalk `senderStaffId`)
    pub id: String,

    /// Display name at the time of the event
    pub display_name: String,
}

impl Subject {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A reading about to be written. The backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReading {
    pub subject_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,

    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse: Option<i32>,

    /// URL of the photographed display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Classification label computed at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NewReading {
    /// Start a reading for a subject with every measurement absent.
    pub fn for_subject(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id.clone(),
            subject_name: Some(subject.display_name.clone()),
            systolic: None,
            diastolic: None,
            pulse: None,
            image_url: None,
            label: None,
        }
    }
}

/// A persisted reading as returned by history queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub id: RecordId,
    pub subject_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,

    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// UTC creation time, formatted with [`TIMESTAMP_FORMAT`]
    pub created_at: String,
}

impl Reading {
    /// Materialize a stored reading from the values that were appended.
    pub fn from_new(id: RecordId, new: NewReading, created_at: impl Into<String>) -> Self {
        Self {
            id,
            subject_id: new.subject_id,
            subject_name: new.subject_name,
            systolic: new.systolic,
            diastolic: new.diastolic,
            pulse: new.pulse,
            image_url: new.image_url,
            label: new.label,
            created_at: created_at.into(),
        }
    }
}
