//! Core data model for marginalia.
//!
//! These types represent the assignment domain: data source definitions,
//! projects, access log entries, and the assignment handed to an annotator.

mod access_log;
mod assignment;
mod datasource;
mod project;

pub use access_log::{AccessLogEntry, Disposition, NewEntry};
pub use assignment::{Assignment, DatapointHandle, Origin};
pub use datasource::{DataSourceDefinition, SourceKind, TextFormatting, Visibility};
pub use project::{DataOrder, Project};

/// Identifier of one datapoint within a data source: an index into `0..size()`.
pub type DatapointId = u64;
