//! Data source adapters: uniform access to heterogeneous backing stores.
//!
//! Each [`SourceKind`] has one adapter module. Adapters are built fresh from
//! their definition on every request and never cached, so a changed folder or
//! remote corpus is seen immediately. Caching, if ever needed, belongs here
//! behind [`instantiate`] rather than in the engine.

mod interactive;
mod json_files;
mod local_files;
mod remote_api;
mod text_list;

use std::time::Duration;

use rand::{Rng, RngCore};
use serde::de::DeserializeOwned;

use crate::model::{DataSourceDefinition, DatapointId, SourceKind};

pub use interactive::{InteractiveSource, InteractiveSpec};
pub use json_files::{JsonFilesSource, JsonFilesSpec};
pub use local_files::{LocalFilesSource, LocalFilesSpec};
pub use remote_api::{RemoteApiSource, RemoteApiSpec};
pub use text_list::{TextListSource, TextListSpec};

/// Errors raised while building an adapter from its definition.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid {kind} spec: {message}")]
    Configuration { kind: SourceKind, message: String },
}

pub type Result<T> = core::result::Result<T, SourceError>;

/// Runtime knobs shared by all adapters.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Per-request timeout for the remote API kind.
    pub remote_timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// A provider of datapoints addressed by `0..size()`.
///
/// Implementations never fail once built: unreachable or unreadable backing
/// stores look empty.
pub trait DataSource {
    /// Number of addressable datapoints, computed from the backing store.
    fn size(&self) -> u64;

    /// Raw text of a datapoint, or `None` when `id` is out of range.
    fn get(&self, id: DatapointId) -> Option<String>;

    /// A uniformly random datapoint. `None` when the source is empty.
    fn get_random(&self, rng: &mut dyn RngCore) -> Option<(DatapointId, String)> {
        let size = self.size();
        if size == 0 {
            return None;
        }
        let id = rng.gen_range(0..size);
        self.get(id).map(|text| (id, text))
    }

    /// Diagnostic label for a datapoint, such as its file name.
    fn source_name(&self, _id: DatapointId) -> String {
        String::new()
    }

    /// Interactive sources take their text from the annotator and are never logged.
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Build the adapter registered for a definition's kind.
pub fn instantiate(
    definition: &DataSourceDefinition,
    settings: &SourceSettings,
) -> Result<Box<dyn DataSource>> {
    let spec = &definition.spec;
    let source: Box<dyn DataSource> = match definition.kind {
        SourceKind::TextList => Box::new(TextListSource::new(parse_spec(definition.kind, spec)?)),
        SourceKind::LocalFiles => {
            Box::new(LocalFilesSource::new(parse_spec(definition.kind, spec)?)?)
        }
        SourceKind::JsonFiles => {
            Box::new(JsonFilesSource::new(parse_spec(definition.kind, spec)?)?)
        }
        SourceKind::RemoteApi => Box::new(RemoteApiSource::new(
            parse_spec(definition.kind, spec)?,
            settings.remote_timeout,
        )?),
        SourceKind::Interactive => {
            Box::new(InteractiveSource::new(parse_spec(definition.kind, spec)?))
        }
    };
    Ok(source)
}

/// Check a spec blob without touching the backing store.
///
/// Run when a definition is created or edited so malformed specs surface
/// to whoever configures the project, not to annotators.
pub fn validate(kind: SourceKind, spec: &serde_json::Value) -> Result<()> {
    match kind {
        SourceKind::TextList => parse_spec::<TextListSpec>(kind, spec).map(drop),
        SourceKind::LocalFiles => parse_spec::<LocalFilesSpec>(kind, spec)?.check(),
        SourceKind::JsonFiles => parse_spec::<JsonFilesSpec>(kind, spec)?.check(),
        SourceKind::RemoteApi => parse_spec::<RemoteApiSpec>(kind, spec)?.check(),
        SourceKind::Interactive => parse_spec::<InteractiveSpec>(kind, spec).map(drop),
    }
}

fn parse_spec<T: DeserializeOwned>(kind: SourceKind, spec: &serde_json::Value) -> Result<T> {
    serde_json::from_value(spec.clone()).map_err(|e| SourceError::Configuration {
        kind,
        message: e.to_string(),
    })
}
