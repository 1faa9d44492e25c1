//! Local persistence for the catalog and the access log.
//!
//! Everything lives in one `SQLite` file:
//!
//! ```text
//! datasource          # Data source definitions
//! project             # Project configuration
//! project_datasource  # Ordered attachment of definitions to projects
//! access_log          # One row per datapoint handed to an annotator
//! claim               # Datapoints reserved in disjoint projects
//! ```

mod access_log;
mod catalog;

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use jiff::Timestamp;
use rusqlite::Connection;
use uuid::Uuid;

use crate::{model::DatapointId, source::SourceError};

pub use access_log::AssignOutcome;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("datasource not found: {0}")]
    DataSourceNotFound(Uuid),

    #[error("datasource already exists: {0}")]
    DataSourceAlreadyExists(Uuid),

    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("project already exists: {0}")]
    ProjectAlreadyExists(Uuid),

    #[error("access log entry not found: {0}")]
    EntryNotFound(i64),

    #[error("datasource {datasource} is already attached to project {project}")]
    AlreadyAttached { project: Uuid, datasource: Uuid },

    #[error("datasource {datasource} is not attached to project {project}")]
    NotAttached { project: Uuid, datasource: Uuid },

    #[error("datasource {0} is referenced by the access log; its spec can no longer change")]
    DefinitionInUse(Uuid),

    #[error(transparent)]
    Configuration(#[from] SourceError),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS datasource (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    spec        TEXT NOT NULL,
    language    TEXT NOT NULL,
    formatting  TEXT NOT NULL,
    is_public   INTEGER NOT NULL,
    owner       TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project (
    id                   TEXT PRIMARY KEY,
    title                TEXT NOT NULL,
    data_order           TEXT NOT NULL,
    disjoint_annotation  INTEGER NOT NULL,
    auto_advance         INTEGER NOT NULL,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_datasource (
    project_id     TEXT NOT NULL REFERENCES project(id),
    datasource_id  TEXT NOT NULL REFERENCES datasource(id),
    position       INTEGER NOT NULL,
    PRIMARY KEY (project_id, datasource_id)
);

CREATE TABLE IF NOT EXISTS access_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    annotator      TEXT NOT NULL,
    project_id     TEXT NOT NULL REFERENCES project(id),
    datasource_id  TEXT NOT NULL REFERENCES datasource(id),
    datapoint      INTEGER NOT NULL,
    is_submitted   INTEGER NOT NULL DEFAULT 0,
    is_skipped     INTEGER NOT NULL DEFAULT 0,
    is_deferred    INTEGER NOT NULL DEFAULT 0,
    is_stale       INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    revision       INTEGER NOT NULL
);

-- At most one open entry per (annotator, project).
CREATE UNIQUE INDEX IF NOT EXISTS access_log_open
    ON access_log (annotator, project_id)
    WHERE is_submitted = 0 AND is_skipped = 0 AND is_deferred = 0;

CREATE INDEX IF NOT EXISTS access_log_project_source
    ON access_log (project_id, datasource_id, datapoint);

CREATE INDEX IF NOT EXISTS access_log_project_user_source
    ON access_log (project_id, annotator, datasource_id, datapoint);

CREATE INDEX IF NOT EXISTS access_log_recent
    ON access_log (project_id, annotator, revision);

CREATE TABLE IF NOT EXISTS claim (
    project_id     TEXT NOT NULL,
    datasource_id  TEXT NOT NULL,
    datapoint      INTEGER NOT NULL,
    annotator      TEXT NOT NULL,
    PRIMARY KEY (project_id, datasource_id, datapoint)
);
";

/// `SQLite`-backed storage for the catalog and the access log.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Returns the default database path: `~/.marginalia/marginalia.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".marginalia").join("marginalia.sqlite"))
    }

    fn init(conn: Connection) -> Result<Self> {
        // Several annotators may hit the same file at once.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

// ── Column codecs ──

fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    value
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

fn parse_timestamp(value: &str, column: &str) -> Result<Timestamp> {
    value
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

fn datapoint_to_sql(id: DatapointId) -> Result<i64> {
    i64::try_from(id).map_err(|_| StorageError::Corrupt(format!("datapoint id {id} out of range")))
}

fn datapoint_from_sql(value: i64) -> Result<DatapointId> {
    DatapointId::try_from(value)
        .map_err(|_| StorageError::Corrupt(format!("negative datapoint id {value}")))
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
