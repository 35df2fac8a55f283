use std::path::Path;

use model::execution::variables::{Variable, VariableMap};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigParseError, EngineError};

/// `{source, target}` directed edge entry of the `connections` list
/// (§6). Named to match the wire shape; `PipelineBuilder` (in
/// `engine-runtime`) folds a list of these into `Pipeline::edges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub source: String,
    pub target: String,
}

/// `{source_database, destination_database}` connection-string shape
/// (§6): a dialect identifier plus the URL the `connectors` crate's
/// `ConnectionPool` consumes directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dialect: String,
    pub url: String,
}

/// Project-level configuration consumed by the core (§6). Deserialized
/// from JSON or YAML depending on the file extension of the path it was
/// loaded from — both formats are already in the teacher's dependency
/// set, so both are supported rather than picking one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: String,
    pub project_name: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    pub source_database: DatabaseConfig,
    pub destination_database: DatabaseConfig,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub jobs: Vec<model::execution::job::Job>,
    #[serde(default)]
    pub connections: Vec<ConnectionEdge>,
    #[serde(default)]
    pub start: Option<Vec<String>>,
    #[serde(default)]
    pub cleanup_on_failure: bool,
}

fn default_concurrency() -> u32 {
    1
}

impl ProjectConfig {
    /// Reads and deserializes a project config file, dispatching on its
    /// extension (`.json`, `.yaml`, `.yml`). A failure to load the
    /// project is fatal before the run begins (§7).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "json" => serde_json::from_str(&text).map_err(|e| EngineError::ConfigParse {
                path: path.display().to_string(),
                source: ConfigParseError::Json(e),
            }),
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| EngineError::ConfigParse {
                path: path.display().to_string(),
                source: ConfigParseError::Yaml(e),
            }),
            other => Err(EngineError::UnknownConfigExtension(other.to_string())),
        }
    }

    /// Flattens `variables` into the `name -> string` map referenced by
    /// `${name}` in job SQL (§3).
    pub fn variable_map(&self) -> VariableMap {
        VariableMap::from_list(&self.variables)
    }

    /// `concurrency`, clamped to at least 1 per §6's `int >= 1`
    /// constraint — a misconfigured `0` degrades to single-threaded
    /// rather than deadlocking an empty worker pool.
    pub fn concurrency(&self) -> u32 {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "project_id": "p1",
            "project_name": "demo",
            "concurrency": 4,
            "source_database": {"dialect": "postgres", "url": "postgres://localhost/src"},
            "destination_database": {"dialect": "postgres", "url": "postgres://localhost/dst"},
            "variables": [{"name": "schema", "value": "public"}],
            "jobs": [],
            "connections": []
        }"#
    }

    #[test]
    fn parses_json_config() {
        let cfg: ProjectConfig = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(cfg.concurrency(), 4);
        assert_eq!(cfg.variable_map().0.get("schema").unwrap(), "public");
    }

    #[test]
    fn zero_concurrency_clamps_to_one() {
        let mut cfg: ProjectConfig = serde_json::from_str(sample_json()).unwrap();
        cfg.concurrency = 0;
        assert_eq!(cfg.concurrency(), 1);
    }
}
