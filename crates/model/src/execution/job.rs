use crate::core::identifiers::JobId;
use serde::{Deserialize, Serialize};

/// Which connection pool an `execution`/`condition` job runs against.
/// Copy jobs always read from `Source` and write to `Destination`;
/// `memory-select` always reads from `Destination` (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobConnection {
    Source,
    Destination,
}

impl Default for JobConnection {
    fn default() -> Self {
        JobConnection::Destination
    }
}

/// A job's kind. `Update` is accepted on input but is a pure alias for
/// `Execution` per §3 ("`update` aliases `execution`") — it is normalized
/// away during deserialization so downstream code only ever matches on
/// the four canonical kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Insert,
    Execution,
    Condition,
    #[serde(rename = "memory-select")]
    MemorySelect,
}

fn default_records_per_page() -> u32 {
    1000
}

/// One node of the pipeline DAG. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub name: String,
    #[serde(rename = "type", deserialize_with = "deserialize_job_kind")]
    pub kind: JobKind,
    pub select_sql: Option<String>,
    pub insert_sql: Option<String>,
    #[serde(alias = "posInsertSql", default)]
    pub post_insert_sql: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default = "default_records_per_page")]
    pub records_per_page: u32,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub connection: JobConnection,
}

impl Job {
    pub fn is_copy_job(&self) -> bool {
        matches!(self.kind, JobKind::Insert)
    }
}

/// Accepts both `"update"` and `"execution"` on input (§3), folding them
/// onto the single `JobKind::Execution` variant so every other component
/// only has to reason about four kinds.
fn deserialize_job_kind<'de, D>(deserializer: D) -> Result<JobKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.as_str() {
        "insert" => Ok(JobKind::Insert),
        "execution" | "update" => Ok(JobKind::Execution),
        "condition" => Ok(JobKind::Condition),
        "memory-select" => Ok(JobKind::MemorySelect),
        other => Err(serde::de::Error::custom(format!(
            "unknown job type: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_aliases_execution() {
        let json = r#"{
            "job_id": "j1", "name": "n", "type": "update",
            "select_sql": null, "insert_sql": null
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.kind, JobKind::Execution);
    }

    #[test]
    fn legacy_pos_insert_sql_alias_is_accepted() {
        let json = r#"{
            "job_id": "j1", "name": "n", "type": "insert",
            "select_sql": "SELECT 1", "insert_sql": "INSERT INTO t",
            "posInsertSql": "UPDATE t SET x = 1"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.post_insert_sql.as_deref(), Some("UPDATE t SET x = 1"));
    }
}
