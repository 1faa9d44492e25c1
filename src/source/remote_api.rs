//! Remote API kind: datapoints served over HTTP.
//!
//! The service exposes two endpoints:
//!
//! ```text
//! GET {endpoint}/size                  -> {"size": 42}
//! GET {endpoint}/get_datapoint?key=7   -> {"text": "..."}
//! ```
//!
//! The corpus may change between calls, so `size` is fetched every time.
//! Transport failures and timeouts are logged and read as an empty source.

use std::time::Duration;

use serde::{Deserialize, de::DeserializeOwned};
use ureq::Agent;

use crate::model::{DatapointId, SourceKind};

use super::{DataSource, Result, SourceError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteApiSpec {
    pub endpoint: String,
}

impl RemoteApiSpec {
    pub fn check(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(SourceError::Configuration {
                kind: SourceKind::RemoteApi,
                message: format!("endpoint must be an http(s) URL, got `{}`", self.endpoint),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct SizeResponse {
    size: u64,
}

#[derive(Deserialize)]
struct DatapointResponse {
    text: String,
}

pub struct RemoteApiSource {
    endpoint: String,
    agent: Agent,
}

impl RemoteApiSource {
    pub fn new(spec: RemoteApiSpec, timeout: Duration) -> Result<Self> {
        spec.check()?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            endpoint: spec.endpoint.trim_end_matches('/').to_string(),
            agent,
        })
    }

    /// GET a JSON document, or `None` on any transport or decoding failure.
    fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Option<T> {
        let url = format!("{}/{path}", self.endpoint);
        let mut request = self.agent.get(&url);
        for (name, value) in query {
            request = request.query(name, value);
        }

        let body = match request.call() {
            Ok(response) => response.into_string(),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "remote datasource unreachable");
                return None;
            }
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "failed to read remote datasource response");
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "malformed remote datasource response");
                None
            }
        }
    }
}

impl DataSource for RemoteApiSource {
    fn size(&self) -> u64 {
        self.fetch::<SizeResponse>("size", &[]).map_or(0, |r| r.size)
    }

    fn get(&self, id: DatapointId) -> Option<String> {
        let key = id.to_string();
        self.fetch::<DatapointResponse>("get_datapoint", &[("key", &key)])
            .map(|r| r.text)
    }
}
