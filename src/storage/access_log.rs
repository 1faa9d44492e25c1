//! Access log storage: the ledger of datapoints handed to annotators.
//!
//! Every write bumps a store-wide `revision`, so "most recently updated"
//! never depends on clock resolution.

use std::collections::HashSet;

use jiff::Timestamp;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::model::{AccessLogEntry, DatapointId, Disposition, NewEntry};

use super::{
    Result, Storage, StorageError, datapoint_from_sql, datapoint_to_sql, is_constraint_violation,
    parse_timestamp, parse_uuid,
};

const ENTRY_COLUMNS: &str = "id, annotator, project_id, datasource_id, datapoint, \
     is_submitted, is_skipped, is_deferred, is_stale, created_at, updated_at, revision";

const NEXT_REVISION: &str = "(SELECT COALESCE(MAX(revision), 0) + 1 FROM access_log)";

/// Outcome of trying to create an open entry.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    /// The entry was created (and the datapoint claimed, if requested).
    Created(AccessLogEntry),

    /// Another annotator already claimed the datapoint. Nothing was written.
    Claimed,

    /// The user already has an open entry. Nothing was written.
    OpenExists(AccessLogEntry),
}

impl Storage {
    // ── Queries ──

    /// Loads a single entry.
    pub fn load_entry(&self, id: i64) -> Result<AccessLogEntry> {
        self.query_entry(
            &format!("SELECT {ENTRY_COLUMNS} FROM access_log WHERE id = ?1"),
            params![id],
        )?
        .ok_or(StorageError::EntryNotFound(id))
    }

    /// The open entry for `(user, project)`, if any.
    pub fn find_open(&self, user: &str, project_id: Uuid) -> Result<Option<AccessLogEntry>> {
        self.query_entry(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM access_log
                 WHERE annotator = ?1 AND project_id = ?2
                   AND is_submitted = 0 AND is_skipped = 0 AND is_deferred = 0
                 ORDER BY revision DESC LIMIT 1"
            ),
            params![user, project_id.to_string()],
        )
    }

    /// The most recently updated submitted, non-skipped entry.
    pub fn find_last_submitted(
        &self,
        user: &str,
        project_id: Uuid,
    ) -> Result<Option<AccessLogEntry>> {
        self.query_entry(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM access_log
                 WHERE annotator = ?1 AND project_id = ?2
                   AND is_submitted = 1 AND is_skipped = 0
                 ORDER BY revision DESC LIMIT 1"
            ),
            params![user, project_id.to_string()],
        )
    }

    /// Deferred entries, most recently updated first.
    pub fn list_deferred(&self, user: &str, project_id: Uuid) -> Result<Vec<AccessLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM access_log
             WHERE annotator = ?1 AND project_id = ?2 AND is_deferred = 1
             ORDER BY revision DESC"
        ))?;
        let rows = stmt.query_map(params![user, project_id.to_string()], RawEntry::from_row)?;
        rows.map(|raw| raw?.into_entry()).collect()
    }

    /// The most recently updated entry of any status.
    pub fn find_latest(&self, user: &str, project_id: Uuid) -> Result<Option<AccessLogEntry>> {
        self.query_entry(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM access_log
                 WHERE annotator = ?1 AND project_id = ?2
                 ORDER BY revision DESC LIMIT 1"
            ),
            params![user, project_id.to_string()],
        )
    }

    /// Datapoint ids logged against a datasource within a project.
    ///
    /// Scoped to one annotator when `user` is given, to everyone otherwise.
    /// Any disposition counts.
    pub fn logged_ids(
        &self,
        project_id: Uuid,
        user: Option<&str>,
        datasource_id: Uuid,
    ) -> Result<HashSet<DatapointId>> {
        let project = project_id.to_string();
        let datasource = datasource_id.to_string();
        let mut ids = HashSet::new();

        let mut collect = |rows: &mut rusqlite::Rows<'_>| -> Result<()> {
            while let Some(row) = rows.next()? {
                ids.insert(datapoint_from_sql(row.get(0)?)?);
            }
            Ok(())
        };

        match user {
            Some(user) => {
                let mut stmt = self.conn.prepare(
                    "SELECT DISTINCT datapoint FROM access_log
                     WHERE project_id = ?1 AND annotator = ?2 AND datasource_id = ?3",
                )?;
                collect(&mut stmt.query(params![project, user, datasource])?)?;
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT DISTINCT datapoint FROM access_log
                     WHERE project_id = ?1 AND datasource_id = ?2",
                )?;
                collect(&mut stmt.query(params![project, datasource])?)?;
            }
        }
        Ok(ids)
    }

    /// Next sequential position for `(user, datasource)`: highest logged id + 1.
    pub fn cursor(&self, project_id: Uuid, user: &str, datasource_id: Uuid) -> Result<DatapointId> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(datapoint) FROM access_log
             WHERE project_id = ?1 AND annotator = ?2 AND datasource_id = ?3",
            params![project_id.to_string(), user, datasource_id.to_string()],
            |row| row.get(0),
        )?;
        match max {
            Some(max) => Ok(datapoint_from_sql(max)? + 1),
            None => Ok(0),
        }
    }

    /// Entries for a project, oldest first. All annotators when `user` is `None`.
    pub fn list_entries(
        &self,
        project_id: Uuid,
        user: Option<&str>,
    ) -> Result<Vec<AccessLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM access_log
             WHERE project_id = ?1 AND (?2 IS NULL OR annotator = ?2)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![project_id.to_string(), user], RawEntry::from_row)?;
        rows.map(|raw| raw?.into_entry()).collect()
    }

    // ── Writes ──

    /// Creates an open entry, optionally claiming the datapoint project-wide.
    ///
    /// Both inserts share one transaction: a claim conflict or an existing
    /// open entry leaves the store untouched.
    pub fn assign(&self, new: &NewEntry<'_>, claim: bool) -> Result<AssignOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let project = new.project_id.to_string();
        let datasource = new.datasource_id.to_string();
        let datapoint = datapoint_to_sql(new.datapoint)?;

        if claim {
            let claimed = tx.execute(
                "INSERT INTO claim (project_id, datasource_id, datapoint, annotator)
                 VALUES (?1, ?2, ?3, ?4)",
                params![project, datasource, datapoint, new.user],
            );
            match claimed {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => return Ok(AssignOutcome::Claimed),
                Err(e) => return Err(e.into()),
            }
        }

        let now = Timestamp::now().to_string();
        let inserted = tx.execute(
            &format!(
                "INSERT INTO access_log
                     (annotator, project_id, datasource_id, datapoint,
                      created_at, updated_at, revision)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, {NEXT_REVISION})"
            ),
            params![new.user, project, datasource, datapoint, now],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                drop(tx);
                return match self.find_open(new.user, new.project_id)? {
                    Some(open) => Ok(AssignOutcome::OpenExists(open)),
                    None => Err(e.into()),
                };
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(AssignOutcome::Created(self.load_entry(id)?))
    }

    /// Records what the annotator did with an entry.
    pub fn record_disposition(&self, id: i64, disposition: Disposition) -> Result<AccessLogEntry> {
        let set = match disposition {
            Disposition::Submitted => "is_submitted = 1, is_deferred = 0",
            Disposition::Skipped => "is_skipped = 1",
            Disposition::Deferred => "is_deferred = 1",
        };
        self.update_entry(id, set)
    }

    /// Skips an entry whose datasource left the project, flagging it stale.
    pub fn mark_stale(&self, id: i64) -> Result<AccessLogEntry> {
        self.update_entry(id, "is_skipped = 1, is_deferred = 0, is_stale = 1")
    }

    /// Clears a deferred entry's flag, making it the open entry again.
    pub fn reopen(&self, id: i64) -> Result<AccessLogEntry> {
        self.update_entry(id, "is_deferred = 0")
    }

    /// Deletes any open entry for `(user, project)`. Returns how many were removed.
    pub fn delete_open(&self, user: &str, project_id: Uuid) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM access_log
             WHERE annotator = ?1 AND project_id = ?2
               AND is_submitted = 0 AND is_skipped = 0 AND is_deferred = 0",
            params![user, project_id.to_string()],
        )?)
    }

    /// Physically deletes entries (and claims) whose datasource is no longer
    /// attached to the project. Returns how many entries were removed.
    pub fn purge_detached(&self, project_id: Uuid) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let project = project_id.to_string();
        let removed = tx.execute(
            "DELETE FROM access_log
             WHERE project_id = ?1 AND datasource_id NOT IN
                 (SELECT datasource_id FROM project_datasource WHERE project_id = ?1)",
            [&project],
        )?;
        tx.execute(
            "DELETE FROM claim
             WHERE project_id = ?1 AND datasource_id NOT IN
                 (SELECT datasource_id FROM project_datasource WHERE project_id = ?1)",
            [&project],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Reserves a datapoint without logging it, as a racing call would.
    #[cfg(test)]
    pub(crate) fn claim_only(
        &self,
        project_id: Uuid,
        datasource_id: Uuid,
        datapoint: DatapointId,
        user: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO claim (project_id, datasource_id, datapoint, annotator)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                project_id.to_string(),
                datasource_id.to_string(),
                datapoint_to_sql(datapoint)?,
                user
            ],
        )?;
        Ok(())
    }

    fn update_entry(&self, id: i64, set: &str) -> Result<AccessLogEntry> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE access_log
                 SET {set}, updated_at = ?1, revision = {NEXT_REVISION}
                 WHERE id = ?2"
            ),
            params![Timestamp::now().to_string(), id],
        )?;
        if rows == 0 {
            return Err(StorageError::EntryNotFound(id));
        }
        self.load_entry(id)
    }

    fn query_entry(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<AccessLogEntry>> {
        self.conn
            .query_row(sql, params, RawEntry::from_row)
            .optional()?
            .map(RawEntry::into_entry)
            .transpose()
    }
}

/// An access log row as stored, before parsing.
struct RawEntry {
    id: i64,
    user: String,
    project_id: String,
    datasource_id: String,
    datapoint: i64,
    is_submitted: bool,
    is_skipped: bool,
    is_deferred: bool,
    is_stale: bool,
    created_at: String,
    updated_at: String,
    revision: i64,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user: row.get(1)?,
            project_id: row.get(2)?,
            datasource_id: row.get(3)?,
            datapoint: row.get(4)?,
            is_submitted: row.get(5)?,
            is_skipped: row.get(6)?,
            is_deferred: row.get(7)?,
            is_stale: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            revision: row.get(11)?,
        })
    }

    fn into_entry(self) -> Result<AccessLogEntry> {
        Ok(AccessLogEntry {
            id: self.id,
            user: self.user,
            project_id: parse_uuid(&self.project_id, "entry project_id")?,
            datasource_id: parse_uuid(&self.datasource_id, "entry datasource_id")?,
            datapoint: datapoint_from_sql(self.datapoint)?,
            is_submitted: self.is_submitted,
            is_skipped: self.is_skipped,
            is_deferred: self.is_deferred,
            is_stale: self.is_stale,
            created_at: parse_timestamp(&self.created_at, "entry created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "entry updated_at")?,
            revision: self.revision,
        })
    }
}
