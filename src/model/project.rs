//! Project configuration consumed by the assignment engine.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An annotation project: which sources feed it and how datapoints are handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub data_order: DataOrder,

    /// No two annotators ever receive the same datapoint.
    pub disjoint_annotation: bool,

    /// Serve a new datapoint after every annotation instead of waiting
    /// for an explicit request.
    pub auto_advance: bool,

    pub created_at: Timestamp,

    /// Attached data source ids, in definition order.
    pub datasources: Vec<Uuid>,
}

/// Order in which datapoints are drawn from the attached sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataOrder {
    RandomWithReplacement,
    #[default]
    RandomWithoutReplacement,

    /// Exhaust each source in turn, in definition order.
    Sequential,

    /// Round-robin over sources, one datapoint each.
    ParallelSequential,
}

impl DataOrder {
    pub const ALL: [Self; 4] = [
        Self::RandomWithReplacement,
        Self::RandomWithoutReplacement,
        Self::Sequential,
        Self::ParallelSequential,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RandomWithReplacement => "random-with-replacement",
            Self::RandomWithoutReplacement => "random-without-replacement",
            Self::Sequential => "sequential",
            Self::ParallelSequential => "parallel-sequential",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == s)
    }

    pub fn is_random(self) -> bool {
        matches!(
            self,
            Self::RandomWithReplacement | Self::RandomWithoutReplacement
        )
    }
}
