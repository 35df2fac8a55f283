#![allow(dead_code)]

use crate::pg_client;
use connectors::sql::ConnectionPool;
use connectors::sql::DialectKind;
use engine_core::config::{ConnectionEdge, DatabaseConfig, ProjectConfig};
use engine_processing::ProcessingExecutorFactory;
use engine_runtime::Controller;
use model::execution::job::{Job, JobConnection, JobKind};
use model::execution::variables::Variable;
use model::log::PipelineLog;
use std::collections::HashMap;

/// Builds a minimal `ProjectConfig` with both `source_database` and
/// `destination_database` pointed at the same Postgres instance, since
/// the end-to-end scenarios in §8 use Postgres on both sides.
pub fn project_config(project_id: &str, concurrency: u32, jobs: Vec<Job>) -> ProjectConfig {
    ProjectConfig {
        project_id: project_id.to_string(),
        project_name: project_id.to_string(),
        concurrency,
        source_database: DatabaseConfig {
            dialect: "postgres".to_string(),
            url: crate::TEST_PG_URL.to_string(),
        },
        destination_database: DatabaseConfig {
            dialect: "postgres".to_string(),
            url: crate::TEST_PG_URL.to_string(),
        },
        variables: Vec::new(),
        jobs,
        connections: Vec::new(),
        start: None,
        cleanup_on_failure: true,
    }
}

pub fn edge(from: &str, to: &str) -> ConnectionEdge {
    ConnectionEdge { source: from.to_string(), target: to.to_string() }
}

pub fn variable(name: &str, value: &str) -> Variable {
    Variable { name: name.to_string(), value: value.to_string(), kind: None }
}

/// Builds an `insert` job with sensible defaults for a copy-job scenario.
pub fn copy_job(
    id: &str,
    select_sql: &str,
    insert_sql: &str,
    columns: &[&str],
    records_per_page: u32,
) -> Job {
    Job {
        job_id: id.into(),
        name: id.to_string(),
        kind: JobKind::Insert,
        select_sql: Some(select_sql.to_string()),
        insert_sql: Some(insert_sql.to_string()),
        post_insert_sql: None,
        columns: columns.iter().map(|s| s.to_string()).collect(),
        primary_keys: Vec::new(),
        records_per_page,
        stop_on_error: false,
        connection: JobConnection::Destination,
    }
}

pub fn condition_job(id: &str, select_sql: &str, stop_on_error: bool) -> Job {
    Job {
        job_id: id.into(),
        name: id.to_string(),
        kind: JobKind::Condition,
        select_sql: Some(select_sql.to_string()),
        insert_sql: None,
        post_insert_sql: None,
        columns: Vec::new(),
        primary_keys: Vec::new(),
        records_per_page: 1000,
        stop_on_error,
        connection: JobConnection::Source,
    }
}

pub fn memory_select_job(id: &str, name: &str, select_sql: &str, columns: &[&str]) -> Job {
    Job {
        job_id: id.into(),
        name: name.to_string(),
        kind: JobKind::MemorySelect,
        select_sql: Some(select_sql.to_string()),
        insert_sql: None,
        post_insert_sql: None,
        columns: columns.iter().map(|s| s.to_string()).collect(),
        primary_keys: Vec::new(),
        records_per_page: 1000,
        stop_on_error: false,
        connection: JobConnection::Destination,
    }
}

/// Runs `config`'s pipeline to completion on a fresh, private `Controller`
/// and returns the resulting pipeline log.
pub async fn run_pipeline(config: ProjectConfig) -> PipelineLog {
    let controller = new_controller();
    controller
        .run(config.project_id.clone(), config, &ProcessingExecutorFactory)
        .await
        .expect("pipeline run")
}

/// Like `run_pipeline`, but also returns the `Controller` so the caller
/// can invoke `stop` concurrently with the run (cancellation scenarios).
pub fn new_controller() -> std::sync::Arc<Controller> {
    Controller::new(std::env::temp_dir().join("stratum-engine-tests-logs"))
}

pub async fn execute(sql: &str) {
    let client = pg_client().await;
    client.batch_execute(sql).await.expect("execute sql");
}

pub async fn row_count(table: &str) -> i64 {
    let client = pg_client().await;
    let row = client
        .query_one(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .await
        .expect("count rows");
    row.get(0)
}

pub async fn fetch_int_pairs(query: &str, col_a: &str, col_b: &str) -> Vec<(i64, String)> {
    let client = pg_client().await;
    let rows = client.query(query, &[]).await.expect("fetch rows");
    rows.iter()
        .map(|r| (r.get::<_, i32>(col_a) as i64, r.get::<_, String>(col_b)))
        .collect()
}

pub async fn table_exists(table: &str) -> bool {
    let client = pg_client().await;
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1)",
            &[&table],
        )
        .await
        .expect("check table existence");
    row.get(0)
}

/// A connection pool pointed at the shared test Postgres database, for
/// tests that want to drive a connection directly rather than through a
/// full pipeline run (e.g. exercising `select_by_hash`).
pub fn test_pool() -> ConnectionPool {
    ConnectionPool::new(DialectKind::Postgres, crate::TEST_PG_URL).expect("build pool")
}

pub fn hashmap(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
