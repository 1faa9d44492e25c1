//! Interactive kind: the annotator types the text to annotate.
//!
//! Exposes a single datapoint carrying the prompt. The engine never writes
//! access log entries for it, so it never runs out.

use serde::Deserialize;

use crate::model::DatapointId;

use super::DataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractiveSpec {
    #[serde(default)]
    pub prompt: String,
}

pub struct InteractiveSource {
    prompt: String,
}

impl InteractiveSource {
    pub fn new(spec: InteractiveSpec) -> Self {
        Self {
            prompt: spec.prompt,
        }
    }
}

impl DataSource for InteractiveSource {
    fn size(&self) -> u64 {
        1
    }

    fn get(&self, id: DatapointId) -> Option<String> {
        (id == 0).then(|| self.prompt.clone())
    }

    fn is_interactive(&self) -> bool {
        true
    }
}
