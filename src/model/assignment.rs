//! The engine's answer to "what should this annotator see next?"

use serde::Serialize;
use uuid::Uuid;

use super::DatapointId;

/// Result of one `next` call.
///
/// `Empty` and `NoData` are normal terminal states, not failures; callers
/// render them distinctly from errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Assignment {
    /// A datapoint to annotate.
    Datapoint(DatapointHandle),

    /// Nothing unseen is left for this annotator, and nothing is deferred.
    Empty,

    /// The project's sources hold no data at all.
    NoData,
}

impl Assignment {
    pub fn datapoint(&self) -> Option<&DatapointHandle> {
        match self {
            Self::Datapoint(handle) => Some(handle),
            Self::Empty | Self::NoData => None,
        }
    }
}

/// A resolved datapoint, ready to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatapointHandle {
    pub datapoint: DatapointId,
    pub text: String,
    pub datasource_id: Uuid,
    pub source_name: String,
    pub is_deferred: bool,
    pub origin: Origin,

    /// The open access log entry backing this handle.
    /// `None` for interactive sources, which are never logged.
    pub entry_id: Option<i64>,
}

/// Which engine state produced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// The open entry, resumed.
    Open,

    /// The last submitted datapoint, kept on screen in manual mode.
    LastSubmitted,

    /// Freshly selected.
    Fresh,

    /// Resurrected from the deferred pile.
    Deferred,
}
