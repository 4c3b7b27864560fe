use std::collections::HashMap;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Configuration for the sink write path.
///
/// Values come from the bundled defaults, overridden by environment
/// variables with the `SKIFF__` prefix (e.g. `SKIFF__WRITER__WRITE_BATCH_SIZE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub writer: WriterConfig,
    pub table_defaults: TableDefaults,
}

impl SinkConfig {
    pub fn load() -> CommonResult<Self> {
        Figment::from(Toml::string(DEFAULT_CONFIG))
            .admerge(Env::prefixed("SKIFF__").map(|p| p.as_str().replace("__", ".").into()))
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Number of rows a write task buffers before encoding a batch.
    pub write_batch_size: usize,
    /// Soft limit on the size of a single data file, in bytes.
    pub target_file_size: u64,
}

/// Default properties attached to tables created by the sink.
///
/// `properties` applies to every namespace; `namespaces` holds
/// per-namespace overrides that win on key collisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefaults {
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub namespaces: HashMap<String, HashMap<String, String>>,
}

impl TableDefaults {
    pub fn table_properties(&self, namespace: &str) -> Vec<(String, String)> {
        let mut merged = self.properties.clone();
        if let Some(overrides) = self.namespaces.get(namespace) {
            merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let mut properties: Vec<_> = merged.into_iter().collect();
        properties.sort();
        properties
    }
}
