//! Data source catalog commands: add, edit, list, show.

use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use jiff::Timestamp;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::model::{DataSourceDefinition, SourceKind, TextFormatting, Visibility};
use crate::source;
use crate::storage::Storage;

use super::format::short_id;
use super::resolve_datasource;

#[derive(Debug, Subcommand)]
pub enum SourceCommand {
    /// Define a new data source. Prints the datasource ID.
    ///
    /// The spec is validated before anything is stored.
    Add {
        /// Display name.
        name: String,

        /// Kind of source: text-list, local-files, json-files, remote-api, interactive.
        #[arg(long, value_parser = parse_kind)]
        kind: SourceKind,

        /// Kind-specific spec as JSON, e.g. `{"texts": ["first", "second"]}`.
        #[arg(long, conflicts_with = "spec_file")]
        spec: Option<String>,

        /// Read the spec from a JSON file instead.
        #[arg(long)]
        spec_file: Option<PathBuf>,

        /// Language of the texts.
        #[arg(long, default_value = "en")]
        language: String,

        /// How texts are cleaned up before display: plain, preserve, markdown.
        #[arg(long, value_parser = parse_formatting, default_value = "plain")]
        formatting: TextFormatting,

        /// Let anyone attach this source to their projects.
        #[arg(long)]
        public: bool,
    },

    /// Replace the spec of a definition no annotator has seen yet.
    Edit {
        /// Datasource ID: full UUID or unambiguous prefix.
        datasource: String,

        /// Kind-specific spec as JSON.
        #[arg(long, conflicts_with = "spec_file")]
        spec: Option<String>,

        /// Read the spec from a JSON file instead.
        #[arg(long)]
        spec_file: Option<PathBuf>,
    },

    /// List data source definitions.
    List,

    /// Show a definition and how many datapoints it currently holds.
    Show {
        /// Datasource ID: full UUID or unambiguous prefix.
        datasource: String,
    },
}

pub(super) fn run(
    storage: &Storage,
    command: &SourceCommand,
    owner: Option<&str>,
    config: &Config,
) -> Result<(), String> {
    match command {
        SourceCommand::Add {
            name,
            kind,
            spec,
            spec_file,
            language,
            formatting,
            public,
        } => {
            let spec = read_spec(spec.as_deref(), spec_file.as_ref())?;
            let definition = DataSourceDefinition {
                id: Uuid::new_v4(),
                name: name.clone(),
                kind: *kind,
                spec,
                language: language.clone(),
                formatting: *formatting,
                visibility: if *public {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
                owner: owner.map(String::from),
                created_at: Timestamp::now(),
            };
            cmd_add(storage, &definition)
        }
        SourceCommand::Edit {
            datasource,
            spec,
            spec_file,
        } => {
            let definition = resolve_datasource(storage, datasource)?;
            let spec = read_spec(spec.as_deref(), spec_file.as_ref())?;
            storage
                .update_datasource_spec(definition.id, &spec)
                .map_err(|e| format!("failed to update datasource: {e}"))?;
            eprintln!("Updated {}", definition.name);
            Ok(())
        }
        SourceCommand::List => cmd_list(storage),
        SourceCommand::Show { datasource } => {
            let definition = resolve_datasource(storage, datasource)?;
            cmd_show(&definition, config)
        }
    }
}

fn cmd_add(storage: &Storage, definition: &DataSourceDefinition) -> Result<(), String> {
    storage
        .add_datasource(definition)
        .map_err(|e| format!("failed to add datasource: {e}"))?;

    tracing::info!(datasource = %definition.id, kind = %definition.kind, "datasource added");
    println!("{}", definition.id);
    Ok(())
}

fn cmd_list(storage: &Storage) -> Result<(), String> {
    let definitions = storage
        .list_datasources()
        .map_err(|e| format!("failed to list datasources: {e}"))?;

    if definitions.is_empty() {
        println!("No datasources");
        return Ok(());
    }

    for d in &definitions {
        println!("{}  [{}] [{}]  {}", short_id(d.id), d.kind, d.language, d.name);
    }
    Ok(())
}

fn cmd_show(definition: &DataSourceDefinition, config: &Config) -> Result<(), String> {
    let json = serde_json::to_string_pretty(definition)
        .map_err(|e| format!("failed to serialize datasource: {e}"))?;
    println!("{json}");

    let instance = source::instantiate(definition, &config.source_settings())
        .map_err(|e| format!("failed to open datasource: {e}"))?;
    eprintln!("{} datapoint(s)", instance.size());
    Ok(())
}

/// The spec from `--spec`, `--spec-file`, or `{}` when neither is given.
fn read_spec(inline: Option<&str>, file: Option<&PathBuf>) -> Result<Value, String> {
    let (text, origin) = match (inline, file) {
        (Some(text), _) => (text.to_string(), "--spec".to_string()),
        (None, Some(path)) => (
            fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
            path.display().to_string(),
        ),
        (None, None) => return Ok(Value::Object(serde_json::Map::new())),
    };
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {origin}: {e}"))
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    SourceKind::parse(s).ok_or_else(|| {
        let known: Vec<&str> = SourceKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown kind '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_formatting(s: &str) -> Result<TextFormatting, String> {
    TextFormatting::parse(s).ok_or_else(|| format!("unknown formatting '{s}'"))
}
