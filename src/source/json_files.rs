//! JSON files kind: one datapoint per record.
//!
//! A file holds either a JSON array of objects, a single object, or JSON
//! Lines. Every object whose `key` field is a string becomes a datapoint;
//! other records are ignored.

use std::{fs, path::PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::model::{DatapointId, SourceKind};

use super::{
    DataSource, Result, SourceError,
    local_files::{collect_files, file_name, require_paths},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonFilesSpec {
    #[serde(default)]
    pub folders: Vec<PathBuf>,

    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Field holding the text of each record.
    pub key: String,
}

impl JsonFilesSpec {
    pub fn check(&self) -> Result<()> {
        require_paths(SourceKind::JsonFiles, &self.folders, &self.files)?;
        if self.key.is_empty() {
            return Err(SourceError::Configuration {
                kind: SourceKind::JsonFiles,
                message: "`key` must not be empty".into(),
            });
        }
        Ok(())
    }
}

struct Record {
    file: String,
    text: String,
}

pub struct JsonFilesSource {
    records: Vec<Record>,
}

impl JsonFilesSource {
    /// Scan and parse every `.json` / `.jsonl` file.
    pub fn new(spec: JsonFilesSpec) -> Result<Self> {
        spec.check()?;
        let extensions = ["json".to_string(), "jsonl".to_string()];
        let mut records = Vec::new();

        for path in collect_files(&spec.folders, &spec.files, &extensions) {
            let contents = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "unreadable JSON datapoint file"
                    );
                    continue;
                }
            };
            let file = file_name(&path);
            for text in extract_texts(&contents, &spec.key) {
                records.push(Record {
                    file: file.clone(),
                    text,
                });
            }
        }

        Ok(Self { records })
    }
}

impl DataSource for JsonFilesSource {
    fn size(&self) -> u64 {
        self.records.len() as u64
    }

    fn get(&self, id: DatapointId) -> Option<String> {
        let idx = usize::try_from(id).ok()?;
        self.records.get(idx).map(|r| r.text.clone())
    }

    fn source_name(&self, id: DatapointId) -> String {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.records.get(idx))
            .map(|r| r.file.clone())
            .unwrap_or_default()
    }
}

/// Pull the `key` field out of every record in a file's contents.
fn extract_texts(contents: &str, key: &str) -> Vec<String> {
    let values = match serde_json::from_str::<Value>(contents) {
        Ok(Value::Array(items)) => items,
        Ok(value) => vec![value],
        // Not a single document: try JSON Lines.
        Err(_) => contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect(),
    };

    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(mut map) => match map.remove(key) {
                Some(Value::String(text)) => Some(text),
                _ => None,
            },
            _ => None,
        })
        .collect()
}
