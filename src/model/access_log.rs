//! Access log entries: one per datapoint handed to an annotator.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DatapointId;

/// A persisted `(user, project, datasource, datapoint)` assignment and its disposition.
///
/// An entry with all three disposition flags false is *open*: shown, not yet
/// acted on. There is at most one open entry per `(user, project)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: i64,
    pub user: String,
    pub project_id: Uuid,
    pub datasource_id: Uuid,
    pub datapoint: DatapointId,
    pub is_submitted: bool,
    pub is_skipped: bool,
    pub is_deferred: bool,

    /// Skipped automatically because its datasource left the project
    /// or its datapoint stopped resolving.
    pub is_stale: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Store-wide counter bumped on every write. Orders "most recently updated".
    pub revision: i64,
}

impl AccessLogEntry {
    pub fn is_open(&self) -> bool {
        !self.is_submitted && !self.is_skipped && !self.is_deferred
    }
}

/// The fields needed to create an open entry.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub user: &'a str,
    pub project_id: Uuid,
    pub datasource_id: Uuid,
    pub datapoint: DatapointId,
}

/// What an annotator did with a datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Submitted,
    Skipped,

    /// Saved for later. Served again once everything else is exhausted.
    Deferred,
}
