//! Catalog storage: data source definitions, projects, and attachments.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::{
    model::{DataOrder, DataSourceDefinition, Project, SourceKind, TextFormatting, Visibility},
    source,
};

use super::{Result, Storage, StorageError, is_constraint_violation, parse_timestamp, parse_uuid};

const DATASOURCE_COLUMNS: &str =
    "id, name, kind, spec, language, formatting, is_public, owner, created_at";

impl Storage {
    // ── Data sources ──

    /// Adds a data source definition after validating its spec.
    pub fn add_datasource(&self, definition: &DataSourceDefinition) -> Result<()> {
        source::validate(definition.kind, &definition.spec)?;
        let inserted = self.conn.execute(
            "INSERT INTO datasource
                 (id, name, kind, spec, language, formatting, is_public, owner, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                definition.id.to_string(),
                &definition.name,
                definition.kind.as_str(),
                serde_json::to_string(&definition.spec)?,
                &definition.language,
                definition.formatting.as_str(),
                definition.visibility == Visibility::Public,
                &definition.owner,
                definition.created_at.to_string(),
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(StorageError::DataSourceAlreadyExists(definition.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a single data source definition.
    pub fn load_datasource(&self, id: Uuid) -> Result<DataSourceDefinition> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {DATASOURCE_COLUMNS} FROM datasource WHERE id = ?1"),
                [id.to_string()],
                RawDataSource::from_row,
            )
            .optional()?
            .ok_or(StorageError::DataSourceNotFound(id))?;
        raw.into_definition()
    }

    /// Lists all definitions in creation order.
    pub fn list_datasources(&self) -> Result<Vec<DataSourceDefinition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DATASOURCE_COLUMNS} FROM datasource ORDER BY rowid"
        ))?;
        let rows = stmt.query_map([], RawDataSource::from_row)?;
        rows.map(|raw| raw?.into_definition()).collect()
    }

    /// Replaces a definition's spec.
    ///
    /// Refused once any access log entry references the definition: the new
    /// spec could renumber datapoints under existing entries.
    pub fn update_datasource_spec(&self, id: Uuid, spec: &serde_json::Value) -> Result<()> {
        let definition = self.load_datasource(id)?;
        source::validate(definition.kind, spec)?;

        let referenced: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM access_log WHERE datasource_id = ?1)",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if referenced {
            return Err(StorageError::DefinitionInUse(id));
        }

        self.conn.execute(
            "UPDATE datasource SET spec = ?1 WHERE id = ?2",
            params![serde_json::to_string(spec)?, id.to_string()],
        )?;
        Ok(())
    }

    // ── Projects ──

    /// Creates a project together with its initial attachments.
    pub fn create_project(&self, project: &Project) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO project
                 (id, title, data_order, disjoint_annotation, auto_advance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id.to_string(),
                &project.title,
                project.data_order.as_str(),
                project.disjoint_annotation,
                project.auto_advance,
                project.created_at.to_string(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StorageError::ProjectAlreadyExists(project.id));
            }
            Err(e) => return Err(e.into()),
        }
        for datasource_id in &project.datasources {
            attach(&tx, project.id, *datasource_id)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Updates a project's title and assignment settings. Attachments are untouched.
    pub fn update_project(&self, project: &Project) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE project
             SET title = ?1, data_order = ?2, disjoint_annotation = ?3, auto_advance = ?4
             WHERE id = ?5",
            params![
                &project.title,
                project.data_order.as_str(),
                project.disjoint_annotation,
                project.auto_advance,
                project.id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(StorageError::ProjectNotFound(project.id));
        }
        Ok(())
    }

    /// Loads a project with its attached data sources in definition order.
    pub fn load_project(&self, id: Uuid) -> Result<Project> {
        load_project_row(&self.conn, id)
    }

    /// Lists all projects in creation order.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let ids: Vec<String> = self
            .conn
            .prepare("SELECT id FROM project ORDER BY rowid")?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        ids.iter()
            .map(|id| load_project_row(&self.conn, parse_uuid(id, "project id")?))
            .collect()
    }

    /// Attaches a data source at the end of a project's definition order.
    pub fn attach_datasource(&self, project_id: Uuid, datasource_id: Uuid) -> Result<()> {
        self.load_project(project_id)?;
        attach(&self.conn, project_id, datasource_id)
    }

    /// Detaches a data source. Access log entries are kept; the engine
    /// skips them as stale.
    pub fn detach_datasource(&self, project_id: Uuid, datasource_id: Uuid) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM project_datasource WHERE project_id = ?1 AND datasource_id = ?2",
            params![project_id.to_string(), datasource_id.to_string()],
        )?;
        if rows == 0 {
            return Err(StorageError::NotAttached {
                project: project_id,
                datasource: datasource_id,
            });
        }
        Ok(())
    }

    /// The definitions attached to a project, in definition order.
    pub fn attached_datasources(&self, project: &Project) -> Result<Vec<DataSourceDefinition>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.name, d.kind, d.spec, d.language, d.formatting,
                    d.is_public, d.owner, d.created_at
             FROM datasource d
             JOIN project_datasource pd ON pd.datasource_id = d.id
             WHERE pd.project_id = ?1
             ORDER BY pd.position",
        )?;
        let rows = stmt.query_map([project.id.to_string()], RawDataSource::from_row)?;
        rows.map(|raw| raw?.into_definition()).collect()
    }
}

fn attach(conn: &Connection, project_id: Uuid, datasource_id: Uuid) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM datasource WHERE id = ?1)",
        [datasource_id.to_string()],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StorageError::DataSourceNotFound(datasource_id));
    }

    let inserted = conn.execute(
        "INSERT INTO project_datasource (project_id, datasource_id, position)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1
                          FROM project_datasource WHERE project_id = ?1))",
        params![project_id.to_string(), datasource_id.to_string()],
    );
    match inserted {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(StorageError::AlreadyAttached {
            project: project_id,
            datasource: datasource_id,
        }),
        Err(e) => Err(e.into()),
    }
}

fn load_project_row(conn: &Connection, id: Uuid) -> Result<Project> {
    let (title, data_order, disjoint_annotation, auto_advance, created_at) = conn
        .query_row(
            "SELECT title, data_order, disjoint_annotation, auto_advance, created_at
             FROM project WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?
        .ok_or(StorageError::ProjectNotFound(id))?;

    let datasources = conn
        .prepare(
            "SELECT datasource_id FROM project_datasource
             WHERE project_id = ?1 ORDER BY position",
        )?
        .query_map([id.to_string()], |row| row.get::<_, String>(0))?
        .map(|r| parse_uuid(&r?, "datasource id"))
        .collect::<Result<Vec<_>>>()?;

    Ok(Project {
        id,
        title,
        data_order: DataOrder::parse(&data_order)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown data order: {data_order}")))?,
        disjoint_annotation,
        auto_advance,
        created_at: parse_timestamp(&created_at, "project created_at")?,
        datasources,
    })
}

/// A datasource row as stored, before parsing.
struct RawDataSource {
    id: String,
    name: String,
    kind: String,
    spec: String,
    language: String,
    formatting: String,
    is_public: bool,
    owner: Option<String>,
    created_at: String,
}

impl RawDataSource {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            spec: row.get(3)?,
            language: row.get(4)?,
            formatting: row.get(5)?,
            is_public: row.get(6)?,
            owner: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_definition(self) -> Result<DataSourceDefinition> {
        Ok(DataSourceDefinition {
            id: parse_uuid(&self.id, "datasource id")?,
            name: self.name,
            kind: SourceKind::parse(&self.kind).ok_or_else(|| {
                StorageError::Corrupt(format!("unknown source kind: {}", self.kind))
            })?,
            spec: serde_json::from_str(&self.spec)?,
            language: self.language,
            formatting: TextFormatting::parse(&self.formatting).ok_or_else(|| {
                StorageError::Corrupt(format!("unknown formatting: {}", self.formatting))
            })?,
            visibility: if self.is_public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            owner: self.owner,
            created_at: parse_timestamp(&self.created_at, "datasource created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use serde_json::json;

    use crate::model::NewEntry;

    fn sample_datasource(texts: &[&str]) -> DataSourceDefinition {
        DataSourceDefinition {
            id: Uuid::new_v4(),
            name: "headlines".into(),
            kind: SourceKind::TextList,
            spec: json!({ "texts": texts }),
            language: "en".into(),
            formatting: TextFormatting::Plain,
            visibility: Visibility::Public,
            owner: Some("curator".into()),
            created_at: Timestamp::now(),
        }
    }

    fn sample_project(datasources: Vec<Uuid>) -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Sentiment".into(),
            data_order: DataOrder::RandomWithoutReplacement,
            disjoint_annotation: false,
            auto_advance: true,
            created_at: Timestamp::now(),
            datasources,
        }
    }

    #[test]
    fn add_and_load_datasource() {
        let storage = Storage::open_in_memory().unwrap();
        let ds = sample_datasource(&["a", "b"]);

        storage.add_datasource(&ds).unwrap();
        let loaded = storage.load_datasource(ds.id).unwrap();

        assert_eq!(loaded.name, "headlines");
        assert_eq!(loaded.kind, SourceKind::TextList);
        assert_eq!(loaded.spec, ds.spec);
        assert_eq!(loaded.visibility, Visibility::Public);
        assert_eq!(loaded.owner.as_deref(), Some("curator"));
    }

    #[test]
    fn add_datasource_validates_spec() {
        let storage = Storage::open_in_memory().unwrap();
        let mut ds = sample_datasource(&[]);
        ds.spec = json!({ "texts": "not a list" });

        let err = storage.add_datasource(&ds).unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[test]
    fn add_duplicate_datasource_fails() {
        let storage = Storage::open_in_memory().unwrap();
        let ds = sample_datasource(&["a"]);

        storage.add_datasource(&ds).unwrap();
        let err = storage.add_datasource(&ds).unwrap_err();
        assert!(matches!(err, StorageError::DataSourceAlreadyExists(_)));
    }

    #[test]
    fn load_nonexistent_datasource_fails() {
        let storage = Storage::open_in_memory().unwrap();
        let err = storage.load_datasource(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StorageError::DataSourceNotFound(_)));
    }

    #[test]
    fn project_keeps_attachment_order() {
        let storage = Storage::open_in_memory().unwrap();
        let first = sample_datasource(&["a"]);
        let second = sample_datasource(&["b"]);
        let third = sample_datasource(&["c"]);
        for ds in [&first, &second, &third] {
            storage.add_datasource(ds).unwrap();
        }

        let project = sample_project(vec![second.id, first.id]);
        storage.create_project(&project).unwrap();
        storage.attach_datasource(project.id, third.id).unwrap();

        let loaded = storage.load_project(project.id).unwrap();
        assert_eq!(loaded.datasources, [second.id, first.id, third.id]);

        let attached = storage.attached_datasources(&loaded).unwrap();
        let names: Vec<Uuid> = attached.iter().map(|d| d.id).collect();
        assert_eq!(names, [second.id, first.id, third.id]);
    }

    #[test]
    fn attach_twice_fails() {
        let storage = Storage::open_in_memory().unwrap();
        let ds = sample_datasource(&["a"]);
        storage.add_datasource(&ds).unwrap();
        let project = sample_project(vec![ds.id]);
        storage.create_project(&project).unwrap();

        let err = storage.attach_datasource(project.id, ds.id).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyAttached { .. }));
    }

    #[test]
    fn attach_unknown_datasource_fails() {
        let storage = Storage::open_in_memory().unwrap();
        let project = sample_project(vec![]);
        storage.create_project(&project).unwrap();

        let err = storage
            .attach_datasource(project.id, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, StorageError::DataSourceNotFound(_)));
    }

    #[test]
    fn create_project_with_unknown_datasource_rolls_back() {
        let storage = Storage::open_in_memory().unwrap();
        let project = sample_project(vec![Uuid::new_v4()]);

        storage.create_project(&project).unwrap_err();
        assert!(storage.list_projects().unwrap().is_empty());
    }

    #[test]
    fn detach_removes_attachment() {
        let storage = Storage::open_in_memory().unwrap();
        let ds = sample_datasource(&["a"]);
        storage.add_datasource(&ds).unwrap();
        let project = sample_project(vec![ds.id]);
        storage.create_project(&project).unwrap();

        storage.detach_datasource(project.id, ds.id).unwrap();
        assert!(storage.load_project(project.id).unwrap().datasources.is_empty());

        let err = storage.detach_datasource(project.id, ds.id).unwrap_err();
        assert!(matches!(err, StorageError::NotAttached { .. }));
    }

    #[test]
    fn update_project_settings() {
        let storage = Storage::open_in_memory().unwrap();
        let mut project = sample_project(vec![]);
        storage.create_project(&project).unwrap();

        project.data_order = DataOrder::ParallelSequential;
        project.disjoint_annotation = true;
        project.auto_advance = false;
        storage.update_project(&project).unwrap();

        let loaded = storage.load_project(project.id).unwrap();
        assert_eq!(loaded.data_order, DataOrder::ParallelSequential);
        assert!(loaded.disjoint_annotation);
        assert!(!loaded.auto_advance);
    }

    #[test]
    fn spec_is_frozen_once_referenced() {
        let storage = Storage::open_in_memory().unwrap();
        let ds = sample_datasource(&["a", "b"]);
        storage.add_datasource(&ds).unwrap();
        let project = sample_project(vec![ds.id]);
        storage.create_project(&project).unwrap();

        // Unreferenced: editable.
        storage
            .update_datasource_spec(ds.id, &json!({ "texts": ["a", "b", "c"] }))
            .unwrap();

        storage
            .assign(
                &NewEntry {
                    user: "ann",
                    project_id: project.id,
                    datasource_id: ds.id,
                    datapoint: 0,
                },
                false,
            )
            .unwrap();

        let err = storage
            .update_datasource_spec(ds.id, &json!({ "texts": ["z"] }))
            .unwrap_err();
        assert!(matches!(err, StorageError::DefinitionInUse(_)));
        assert_eq!(
            storage.load_datasource(ds.id).unwrap().spec,
            json!({ "texts": ["a", "b", "c"] })
        );
    }
}
