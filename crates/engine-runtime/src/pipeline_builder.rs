//! Folds an `engine_core::config::ProjectConfig` into the
//! `model::execution::pipeline::Pipeline` the scheduler runs over.

use std::collections::HashMap;

use engine_core::config::ProjectConfig;
use model::core::identifiers::{JobId, PipelineId, ProjectId};
use model::execution::pipeline::Pipeline;

use crate::error::RuntimeError;

pub fn build_pipeline(
    pipeline_id: impl Into<String>,
    config: &ProjectConfig,
) -> Result<Pipeline, RuntimeError> {
    let declared_order: Vec<JobId> = config.jobs.iter().map(|j| j.job_id.clone()).collect();
    let known: std::collections::HashSet<&JobId> = declared_order.iter().collect();

    let mut edges: HashMap<JobId, Vec<JobId>> = HashMap::new();
    for edge in &config.connections {
        let source = JobId::from(edge.source.as_str());
        let target = JobId::from(edge.target.as_str());
        if !known.contains(&source) {
            return Err(RuntimeError::UnknownJob(edge.source.clone()));
        }
        if !known.contains(&target) {
            return Err(RuntimeError::UnknownJob(edge.target.clone()));
        }
        edges.entry(source).or_default().push(target);
    }

    let jobs = config
        .jobs
        .iter()
        .map(|j| (j.job_id.clone(), j.clone()))
        .collect();

    Ok(Pipeline {
        pipeline_id: PipelineId::from(pipeline_id.into().as_str()),
        project_id: ProjectId::from(config.project_id.as_str()),
        jobs,
        edges,
        start: config
            .start
            .as_ref()
            .map(|ids| ids.iter().map(|s| JobId::from(s.as_str())).collect()),
        declared_order,
        cleanup_on_failure: config.cleanup_on_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::config::ConnectionEdge;
    use model::execution::job::{JobConnection, JobKind};

    fn config_with(jobs: Vec<model::execution::job::Job>, connections: Vec<ConnectionEdge>) -> ProjectConfig {
        ProjectConfig {
            project_id: "p1".into(),
            project_name: "demo".into(),
            concurrency: 1,
            source_database: engine_core::config::DatabaseConfig {
                dialect: "postgres".into(),
                url: "postgres://localhost/src".into(),
            },
            destination_database: engine_core::config::DatabaseConfig {
                dialect: "postgres".into(),
                url: "postgres://localhost/dst".into(),
            },
            variables: vec![],
            jobs,
            connections,
            start: None,
            cleanup_on_failure: false,
        }
    }

    fn job(id: &str) -> model::execution::job::Job {
        model::execution::job::Job {
            job_id: id.into(),
            name: id.to_string(),
            kind: JobKind::Execution,
            select_sql: None,
            insert_sql: None,
            post_insert_sql: None,
            columns: vec![],
            primary_keys: vec![],
            records_per_page: 100,
            stop_on_error: false,
            connection: JobConnection::Destination,
        }
    }

    #[test]
    fn builds_edges_from_connections() {
        let cfg = config_with(
            vec![job("a"), job("b")],
            vec![ConnectionEdge { source: "a".into(), target: "b".into() }],
        );
        let pipeline = build_pipeline("run1", &cfg).unwrap();
        assert_eq!(pipeline.successors(&JobId::from("a")), &[JobId::from("b")]);
    }

    #[test]
    fn unknown_connection_endpoint_is_rejected() {
        let cfg = config_with(
            vec![job("a")],
            vec![ConnectionEdge { source: "a".into(), target: "ghost".into() }],
        );
        assert!(build_pipeline("run1", &cfg).is_err());
    }
}
