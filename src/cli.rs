//! CLI interface for Marginalia.
//!
//! Non-interactive: arguments in, text out. Commands split into three groups:
//!
//! - `marginalia source add|edit|list|show`: the data source catalog.
//! - `marginalia project new|list|show|attach|detach|purge|set`: projects.
//! - `marginalia next|submit|skip|defer|log --project <id>`: annotating.
//!
//! Every id argument takes a full UUID or an unambiguous prefix.

mod annotate;
mod format;
mod project;
mod source;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::identity;
use crate::model::{DataSourceDefinition, Disposition, Project};
use crate::storage::Storage;

use project::ProjectCommand;
use source::SourceCommand;

/// Marginalia: hand out texts to annotators.
#[derive(Debug, Parser)]
#[command(name = "marginalia", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Annotator to act as.
    /// Falls back to `MARGINALIA_USER`, then `user` in the config file.
    #[arg(long = "as", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: annotating a corpus
  1. marginalia source add reviews --kind local-files --spec '{"folders": ["./reviews"]}'
     → prints a datasource ID (e.g. 5c1e09aa)
  2. marginalia project new "Sentiment" --source 5c1 --disjoint
     → prints a project ID (e.g. a3b0fc12)
  3. marginalia --as ann next --project a3b
  4. marginalia --as ann submit --project a3b
  5. marginalia --as ann next --project a3b --force   # skip to a new text

Review:
  marginalia log --project a3b
  marginalia project set a3b --order sequential --auto-advance false"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage data source definitions.
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },

    /// Manage projects and their attached data sources.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Show the datapoint to annotate next.
    ///
    /// Resumes the open datapoint if there is one. The text goes to stdout,
    /// its provenance to stderr.
    Next {
        /// Project ID: full UUID or unambiguous prefix.
        #[arg(long)]
        project: String,

        /// Skip the current datapoint and draw a new one.
        #[arg(long)]
        force: bool,

        /// Print the full assignment as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Mark the open datapoint as annotated.
    Submit {
        /// Project ID: full UUID or unambiguous prefix.
        #[arg(long)]
        project: String,
    },

    /// Skip the open datapoint for good.
    Skip {
        /// Project ID: full UUID or unambiguous prefix.
        #[arg(long)]
        project: String,
    },

    /// Put the open datapoint aside until everything else is done.
    Defer {
        /// Project ID: full UUID or unambiguous prefix.
        #[arg(long)]
        project: String,
    },

    /// Show the access log of a project.
    Log {
        /// Project ID: full UUID or unambiguous prefix.
        #[arg(long)]
        project: String,

        /// Include every annotator, not just the acting one.
        #[arg(long)]
        all: bool,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, config: &Config, storage: &Storage) -> Result<(), String> {
    let user = || identity::resolve_user(cli.user.as_deref(), config);

    match cli.command {
        Command::Source { ref command } => {
            // Ownership is recorded when an annotator is known, never required.
            source::run(storage, command, user().ok().as_deref(), config)
        }
        Command::Project { ref command } => project::run(storage, command),
        Command::Next {
            ref project,
            force,
            json,
        } => {
            let project = resolve_project(storage, project)?;
            annotate::cmd_next(storage, config, &user()?, &project, force, json)
        }
        Command::Submit { ref project } => {
            let project = resolve_project(storage, project)?;
            annotate::cmd_dispose(storage, &user()?, &project, Disposition::Submitted)
        }
        Command::Skip { ref project } => {
            let project = resolve_project(storage, project)?;
            annotate::cmd_dispose(storage, &user()?, &project, Disposition::Skipped)
        }
        Command::Defer { ref project } => {
            let project = resolve_project(storage, project)?;
            annotate::cmd_dispose(storage, &user()?, &project, Disposition::Deferred)
        }
        Command::Log { ref project, all } => {
            let project = resolve_project(storage, project)?;
            let user = if all { None } else { Some(user()?) };
            annotate::cmd_log(storage, &project, user.as_deref())
        }
    }
}

/// Resolve a project reference (full UUID or unambiguous prefix).
fn resolve_project(storage: &Storage, reference: &str) -> Result<Project, String> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return storage
            .load_project(id)
            .map_err(|e| format!("project not found: {e}"));
    }

    let projects = storage
        .list_projects()
        .map_err(|e| format!("failed to list projects: {e}"))?;
    resolve_prefix(reference, projects, |p| p.id, "project")
}

/// Resolve a datasource reference (full UUID or unambiguous prefix).
fn resolve_datasource(storage: &Storage, reference: &str) -> Result<DataSourceDefinition, String> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return storage
            .load_datasource(id)
            .map_err(|e| format!("datasource not found: {e}"));
    }

    let definitions = storage
        .list_datasources()
        .map_err(|e| format!("failed to list datasources: {e}"))?;
    resolve_prefix(reference, definitions, |d| d.id, "datasource")
}

fn resolve_prefix<T>(
    reference: &str,
    items: Vec<T>,
    id_of: impl Fn(&T) -> Uuid,
    noun: &str,
) -> Result<T, String> {
    let mut matches: Vec<T> = items
        .into_iter()
        .filter(|item| id_of(item).to_string().starts_with(reference))
        .collect();

    match matches.len() {
        0 => Err(format!("no {noun} matching '{reference}'")),
        1 => Ok(matches.remove(0)),
        n => {
            let ids: Vec<String> = matches.iter().map(|m| format::short_id(id_of(m))).collect();
            Err(format!(
                "'{reference}' is ambiguous: matches {n} {noun}s: {}",
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prefix_resolution() {
        let a: Uuid = "a3b0fc12-0000-4000-8000-000000000000".parse().unwrap();
        let b: Uuid = "a3c11111-0000-4000-8000-000000000000".parse().unwrap();

        assert_eq!(resolve_prefix("a3b", vec![a, b], |u| *u, "project").unwrap(), a);

        let err = resolve_prefix("a3", vec![a, b], |u| *u, "project").unwrap_err();
        assert!(err.contains("ambiguous"), "{err}");

        let err = resolve_prefix("ff", vec![a, b], |u| *u, "project").unwrap_err();
        assert_eq!(err, "no project matching 'ff'");
    }

    #[test]
    fn as_is_global() {
        let cli = Cli::try_parse_from(["marginalia", "next", "--project", "a3b", "--as", "ann"])
            .unwrap();
        assert_eq!(cli.user.as_deref(), Some("ann"));
        assert!(matches!(cli.command, Command::Next { force: false, .. }));
    }
}
