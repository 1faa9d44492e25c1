//! Project commands: create, inspect, and wire data sources in and out.

use clap::Subcommand;
use jiff::Timestamp;
use uuid::Uuid;

use crate::model::{DataOrder, Project};
use crate::storage::Storage;

use super::format::{format_flags, short_id};
use super::{resolve_datasource, resolve_project};

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Create a new project. Prints the project ID.
    New {
        /// What the project is about.
        title: String,

        /// How datapoints are drawn: random-with-replacement,
        /// random-without-replacement, sequential, parallel-sequential.
        #[arg(long, value_parser = parse_order, default_value = "random-without-replacement")]
        order: DataOrder,

        /// Never give two annotators the same datapoint.
        #[arg(long)]
        disjoint: bool,

        /// Keep showing the last submitted datapoint until `next --force`.
        #[arg(long)]
        manual: bool,

        /// Datasource to attach (repeatable, in order).
        #[arg(long = "source")]
        sources: Vec<String>,
    },

    /// List projects.
    List,

    /// Show a project's settings and attached sources.
    Show {
        /// Project ID: full UUID or unambiguous prefix.
        project: String,
    },

    /// Attach a datasource at the end of the project's source order.
    Attach {
        /// Project ID: full UUID or unambiguous prefix.
        project: String,

        /// Datasource ID: full UUID or unambiguous prefix.
        datasource: String,
    },

    /// Detach a datasource. Its log entries stay until `purge`.
    Detach {
        /// Project ID: full UUID or unambiguous prefix.
        project: String,

        /// Datasource ID: full UUID or unambiguous prefix.
        datasource: String,
    },

    /// Delete log entries and claims of datasources no longer attached.
    Purge {
        /// Project ID: full UUID or unambiguous prefix.
        project: String,
    },

    /// Change a project's settings.
    Set {
        /// Project ID: full UUID or unambiguous prefix.
        project: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, value_parser = parse_order)]
        order: Option<DataOrder>,

        #[arg(long)]
        disjoint: Option<bool>,

        #[arg(long)]
        auto_advance: Option<bool>,
    },
}

pub(super) fn run(storage: &Storage, command: &ProjectCommand) -> Result<(), String> {
    match command {
        ProjectCommand::New {
            title,
            order,
            disjoint,
            manual,
            sources,
        } => {
            let datasources = sources
                .iter()
                .map(|s| resolve_datasource(storage, s).map(|d| d.id))
                .collect::<Result<Vec<_>, _>>()?;
            let project = Project {
                id: Uuid::new_v4(),
                title: title.clone(),
                data_order: *order,
                disjoint_annotation: *disjoint,
                auto_advance: !*manual,
                created_at: Timestamp::now(),
                datasources,
            };
            cmd_new(storage, &project)
        }
        ProjectCommand::List => cmd_list(storage),
        ProjectCommand::Show { project } => cmd_show(storage, &resolve_project(storage, project)?),
        ProjectCommand::Attach {
            project,
            datasource,
        } => {
            let project = resolve_project(storage, project)?;
            let datasource = resolve_datasource(storage, datasource)?;
            storage
                .attach_datasource(project.id, datasource.id)
                .map_err(|e| format!("failed to attach datasource: {e}"))?;
            eprintln!("Attached {} to {}", datasource.name, short_id(project.id));
            Ok(())
        }
        ProjectCommand::Detach {
            project,
            datasource,
        } => {
            let project = resolve_project(storage, project)?;
            let datasource = resolve_datasource(storage, datasource)?;
            storage
                .detach_datasource(project.id, datasource.id)
                .map_err(|e| format!("failed to detach datasource: {e}"))?;
            eprintln!("Detached {} from {}", datasource.name, short_id(project.id));
            Ok(())
        }
        ProjectCommand::Purge { project } => {
            let project = resolve_project(storage, project)?;
            let removed = storage
                .purge_detached(project.id)
                .map_err(|e| format!("failed to purge: {e}"))?;
            eprintln!("Removed {removed} entr{}", if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
        ProjectCommand::Set {
            project,
            title,
            order,
            disjoint,
            auto_advance,
        } => {
            let mut project = resolve_project(storage, project)?;
            if let Some(title) = title {
                project.title.clone_from(title);
            }
            if let Some(order) = order {
                project.data_order = *order;
            }
            if let Some(disjoint) = disjoint {
                project.disjoint_annotation = *disjoint;
            }
            if let Some(auto_advance) = auto_advance {
                project.auto_advance = *auto_advance;
            }
            storage
                .update_project(&project)
                .map_err(|e| format!("failed to update project: {e}"))?;
            cmd_show(storage, &project)
        }
    }
}

fn cmd_new(storage: &Storage, project: &Project) -> Result<(), String> {
    storage
        .create_project(project)
        .map_err(|e| format!("failed to create project: {e}"))?;

    tracing::info!(project = %project.id, order = project.data_order.as_str(), "project created");
    println!("{}", project.id);
    Ok(())
}

fn cmd_list(storage: &Storage) -> Result<(), String> {
    let projects = storage
        .list_projects()
        .map_err(|e| format!("failed to list projects: {e}"))?;

    if projects.is_empty() {
        println!("No projects");
        return Ok(());
    }

    for p in &projects {
        println!(
            "{}  [{}] [{} source(s)]  {}",
            short_id(p.id),
            p.data_order.as_str(),
            p.datasources.len(),
            p.title
        );
    }
    Ok(())
}

fn cmd_show(storage: &Storage, project: &Project) -> Result<(), String> {
    let definitions = storage
        .attached_datasources(project)
        .map_err(|e| format!("failed to load datasources: {e}"))?;

    println!("{}  {}", project.id, project.title);
    println!("order: {}", project.data_order.as_str());
    println!("flags: {}", format_flags(project));
    if definitions.is_empty() {
        println!("sources: none");
    }
    for d in &definitions {
        println!("source: {}  [{}]  {}", short_id(d.id), d.kind, d.name);
    }
    Ok(())
}

fn parse_order(s: &str) -> Result<DataOrder, String> {
    DataOrder::parse(s).ok_or_else(|| {
        let known: Vec<&str> = DataOrder::ALL.iter().map(|o| o.as_str()).collect();
        format!("unknown order '{s}' (expected one of: {})", known.join(", "))
    })
}
