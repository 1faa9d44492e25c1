//! Text list kind: datapoints stored inline in the definition.

use serde::Deserialize;

use crate::model::DatapointId;

use super::DataSource;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextListSpec {
    pub texts: Vec<String>,
}

pub struct TextListSource {
    texts: Vec<String>,
}

impl TextListSource {
    pub fn new(spec: TextListSpec) -> Self {
        Self { texts: spec.texts }
    }
}

impl DataSource for TextListSource {
    fn size(&self) -> u64 {
        self.texts.len() as u64
    }

    fn get(&self, id: DatapointId) -> Option<String> {
        let idx = usize::try_from(id).ok()?;
        self.texts.get(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_is_none() {
        let source = TextListSource::new(TextListSpec {
            texts: vec!["only".into()],
        });
        assert_eq!(source.get(0).as_deref(), Some("only"));
        assert_eq!(source.get(1), None);
        assert_eq!(source.get(u64::MAX), None);
        assert_eq!(source.source_name(0), "");
    }
}
