//! Data source definitions: what a project draws its texts from.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured provider of datapoints.
///
/// The `spec` blob is interpreted by the adapter registered for `kind`.
/// Once an access log entry references the definition, its spec must not
/// change: datapoint ids would silently point at different texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDefinition {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    pub spec: serde_json::Value,
    pub language: String,
    pub formatting: TextFormatting,
    pub visibility: Visibility,
    pub owner: Option<String>,
    pub created_at: Timestamp,
}

/// Backing-store kind. Each variant has exactly one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Inline list of strings stored in the spec itself.
    TextList,

    /// Plain-text files found in folders or listed explicitly.
    LocalFiles,

    /// Records inside JSON or JSON Lines files.
    JsonFiles,

    /// An HTTP service exposing `size` and `get_datapoint`.
    RemoteApi,

    /// The annotator supplies the text; nothing is logged.
    Interactive,
}

impl SourceKind {
    pub const ALL: [Self; 5] = [
        Self::TextList,
        Self::LocalFiles,
        Self::JsonFiles,
        Self::RemoteApi,
        Self::Interactive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextList => "text-list",
            Self::LocalFiles => "local-files",
            Self::JsonFiles => "json-files",
            Self::RemoteApi => "remote-api",
            Self::Interactive => "interactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How raw text is post-processed before it is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextFormatting {
    /// Trimmed, with runs of blank lines collapsed into one.
    #[default]
    Plain,

    /// Shown exactly as stored.
    Preserve,

    /// Markdown source, rendered by the client.
    Markdown,
}

impl TextFormatting {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Preserve => "preserve",
            Self::Markdown => "markdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Plain, Self::Preserve, Self::Markdown]
            .into_iter()
            .find(|f| f.as_str() == s)
    }

    /// Apply this formatting mode to raw datapoint text.
    pub fn apply(self, raw: &str) -> String {
        match self {
            Self::Plain => collapse_blank_lines(raw.trim()),
            Self::Preserve | Self::Markdown => raw.to_string(),
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

/// Who may attach a definition to their projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_formatting_trims_and_collapses_blank_lines() {
        let raw = "\n  First line.  \n\n\n\nSecond line.\n\n";
        assert_eq!(
            TextFormatting::Plain.apply(raw),
            "First line.\n\nSecond line."
        );
    }

    #[test]
    fn preserve_formatting_is_identity() {
        let raw = "  keep\n\n\n  this  ";
        assert_eq!(TextFormatting::Preserve.apply(raw), raw);
        assert_eq!(TextFormatting::Markdown.apply(raw), raw);
    }

    #[test]
    fn source_kind_names_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::parse("TextsAPI"), None);
    }
}
