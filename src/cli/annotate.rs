//! Annotating commands: next, submit, skip, defer, log.

use crate::config::Config;
use crate::engine::Engine;
use crate::model::{Disposition, Project};
use crate::storage::Storage;

use super::format::{describe_assignment, format_disposition, format_entry, short_id};

pub(super) fn cmd_next(
    storage: &Storage,
    config: &Config,
    user: &str,
    project: &Project,
    force: bool,
    json: bool,
) -> Result<(), String> {
    let engine = Engine::new(storage, config.source_settings());
    let assignment = engine
        .next(user, project, force, &mut rand::thread_rng())
        .map_err(|e| format!("failed to assign a datapoint: {e}"))?;

    if json {
        let json = serde_json::to_string_pretty(&assignment)
            .map_err(|e| format!("failed to serialize assignment: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    eprintln!("{}", describe_assignment(&assignment));
    if let Some(handle) = assignment.datapoint() {
        println!("{}", handle.text);
    }
    Ok(())
}

/// Record a disposition on the annotator's open entry.
pub(super) fn cmd_dispose(
    storage: &Storage,
    user: &str,
    project: &Project,
    disposition: Disposition,
) -> Result<(), String> {
    let open = storage
        .find_open(user, project.id)
        .map_err(|e| format!("failed to read access log: {e}"))?
        .ok_or_else(|| {
            format!(
                "no open datapoint for {user} in project {}; run `marginalia next` first",
                short_id(project.id)
            )
        })?;

    let entry = storage
        .record_disposition(open.id, disposition)
        .map_err(|e| format!("failed to update access log: {e}"))?;

    tracing::info!(
        user,
        project = %project.id,
        entry = entry.id,
        datapoint = entry.datapoint,
        disposition = format_disposition(disposition),
        "recorded disposition"
    );
    eprintln!("{} datapoint {}", format_disposition(disposition), entry.datapoint);
    Ok(())
}

pub(super) fn cmd_log(
    storage: &Storage,
    project: &Project,
    user: Option<&str>,
) -> Result<(), String> {
    let entries = storage
        .list_entries(project.id, user)
        .map_err(|e| format!("failed to read access log: {e}"))?;

    if entries.is_empty() {
        println!("No entries");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use serde_json::json;
    use uuid::Uuid;

    use crate::model::{DataOrder, DataSourceDefinition, SourceKind, TextFormatting, Visibility};

    fn project_with_texts(storage: &Storage) -> Project {
        let definition = DataSourceDefinition {
            id: Uuid::new_v4(),
            name: "greetings".into(),
            kind: SourceKind::TextList,
            spec: json!({ "texts": ["hello", "bonjour"] }),
            language: "en".into(),
            formatting: TextFormatting::Plain,
            visibility: Visibility::Private,
            owner: None,
            created_at: Timestamp::now(),
        };
        storage.add_datasource(&definition).unwrap();

        let project = Project {
            id: Uuid::new_v4(),
            title: "Greetings".into(),
            data_order: DataOrder::Sequential,
            disjoint_annotation: false,
            auto_advance: true,
            created_at: Timestamp::now(),
            datasources: vec![definition.id],
        };
        storage.create_project(&project).unwrap();
        project
    }

    #[test]
    fn dispose_without_open_entry_is_an_error() {
        let storage = Storage::open_in_memory().unwrap();
        let project = project_with_texts(&storage);

        let err = cmd_dispose(&storage, "ann", &project, Disposition::Submitted).unwrap_err();
        assert!(err.starts_with("no open datapoint for ann"), "{err}");
    }

    #[test]
    fn next_then_submit_closes_the_entry() {
        let storage = Storage::open_in_memory().unwrap();
        let project = project_with_texts(&storage);
        let config = Config::default();

        cmd_next(&storage, &config, "ann", &project, false, false).unwrap();
        assert!(storage.find_open("ann", project.id).unwrap().is_some());

        cmd_dispose(&storage, "ann", &project, Disposition::Submitted).unwrap();
        assert!(storage.find_open("ann", project.id).unwrap().is_none());

        let entries = storage.list_entries(project.id, Some("ann")).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_submitted);
    }
}
