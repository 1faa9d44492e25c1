//! Local files kind: one datapoint per plain-text file.
//!
//! Folders are walked recursively with the `ignore` crate, sorted by file
//! name so ids stay stable across instantiations. Explicitly listed files
//! follow the walked ones, in the order given.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ignore::WalkBuilder;
use serde::Deserialize;

use crate::model::{DatapointId, SourceKind};

use super::{DataSource, Result, SourceError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalFilesSpec {
    #[serde(default)]
    pub folders: Vec<PathBuf>,

    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Only files with one of these extensions (without the dot) are kept.
    /// Empty keeps everything.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl LocalFilesSpec {
    pub fn check(&self) -> Result<()> {
        require_paths(SourceKind::LocalFiles, &self.folders, &self.files)
    }
}

/// A scanned file and its full contents.
struct TextFile {
    path: PathBuf,
    text: String,
}

pub struct LocalFilesSource {
    files: Vec<TextFile>,
}

impl LocalFilesSource {
    /// Scan the folders and read every file.
    ///
    /// Unreadable files keep their slot with empty text so later ids do
    /// not shift.
    pub fn new(spec: LocalFilesSpec) -> Result<Self> {
        spec.check()?;
        let files = collect_files(&spec.folders, &spec.files, &spec.extensions)
            .into_iter()
            .map(|path| {
                let text = match fs::read(&path) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "unreadable datapoint file"
                        );
                        String::new()
                    }
                };
                TextFile { path, text }
            })
            .collect();
        Ok(Self { files })
    }
}

impl DataSource for LocalFilesSource {
    fn size(&self) -> u64 {
        self.files.len() as u64
    }

    fn get(&self, id: DatapointId) -> Option<String> {
        let idx = usize::try_from(id).ok()?;
        self.files.get(idx).map(|f| f.text.clone())
    }

    fn source_name(&self, id: DatapointId) -> String {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.files.get(idx))
            .map(|f| file_name(&f.path))
            .unwrap_or_default()
    }
}

/// Fail unless at least one folder or file is configured.
pub(super) fn require_paths(
    kind: SourceKind,
    folders: &[PathBuf],
    files: &[PathBuf],
) -> Result<()> {
    if folders.is_empty() && files.is_empty() {
        return Err(SourceError::Configuration {
            kind,
            message: "at least one of `folders` or `files` is required".into(),
        });
    }
    Ok(())
}

/// Walk `folders` and append `files`, keeping only matching extensions.
///
/// Missing folders contribute nothing. Hidden files are skipped.
pub(super) fn collect_files(
    folders: &[PathBuf],
    files: &[PathBuf],
    extensions: &[String],
) -> Vec<PathBuf> {
    let mut collected = Vec::new();

    for folder in folders {
        let walker = WalkBuilder::new(folder)
            .standard_filters(false)
            .hidden(true)
            .sort_by_file_name(Ord::cmp)
            .build();
        for entry in walker.flatten() {
            if entry.file_type().is_some_and(|ft| ft.is_file())
                && has_extension(entry.path(), extensions)
            {
                collected.push(entry.into_path());
            }
        }
    }

    collected.extend(
        files
            .iter()
            .filter(|p| has_extension(p, extensions))
            .cloned(),
    );
    collected
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

pub(super) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
