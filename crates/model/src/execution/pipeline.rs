use crate::{
    core::identifiers::{JobId, PipelineId, ProjectId},
    execution::job::Job,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A pipeline: a DAG of jobs plus its directed edges (§3 "Pipeline").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub pipeline_id: PipelineId,
    pub project_id: ProjectId,
    pub jobs: HashMap<JobId, Job>,
    /// `source_id -> [target_id]`.
    pub edges: HashMap<JobId, Vec<JobId>>,
    /// Explicit start set, if the caller named one.
    #[serde(default)]
    pub start: Option<Vec<JobId>>,
    /// Declared job insertion order — used as the scheduler's tie-break
    /// for seeding and for appending undispatched nodes (§4.5).
    pub declared_order: Vec<JobId>,
    #[serde(default)]
    pub cleanup_on_failure: bool,
}

impl Pipeline {
    /// Resolves the start set per §3: the explicit list if given, else
    /// all roots (no in-edges), else all jobs.
    pub fn resolve_start_set(&self) -> Vec<JobId> {
        if let Some(explicit) = &self.start
            && !explicit.is_empty()
        {
            return explicit.clone();
        }

        let roots = self.roots();
        if !roots.is_empty() {
            return roots;
        }

        self.declared_order.clone()
    }

    fn roots(&self) -> Vec<JobId> {
        let mut has_incoming: HashSet<&JobId> = HashSet::new();
        for targets in self.edges.values() {
            for t in targets {
                has_incoming.insert(t);
            }
        }
        self.declared_order
            .iter()
            .filter(|id| !has_incoming.contains(id))
            .cloned()
            .collect()
    }

    pub fn successors(&self, job_id: &JobId) -> &[JobId] {
        self.edges
            .get(job_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::job::{JobConnection, JobKind};

    fn job(id: &str) -> Job {
        Job {
            job_id: id.into(),
            name: id.to_string(),
            kind: JobKind::Insert,
            select_sql: Some("SELECT 1".into()),
            insert_sql: Some("INSERT INTO t".into()),
            post_insert_sql: None,
            columns: vec![],
            primary_keys: vec![],
            records_per_page: 100,
            stop_on_error: false,
            connection: JobConnection::Destination,
        }
    }

    fn pipeline(edges: &[(&str, &str)], order: &[&str]) -> Pipeline {
        let mut jobs = HashMap::new();
        let mut edge_map: HashMap<JobId, Vec<JobId>> = HashMap::new();
        for id in order {
            jobs.insert(JobId::from(*id), job(id));
        }
        for (from, to) in edges {
            edge_map
                .entry(JobId::from(*from))
                .or_default()
                .push(JobId::from(*to));
        }
        Pipeline {
            pipeline_id: "p".into(),
            project_id: "proj".into(),
            jobs,
            edges: edge_map,
            start: None,
            declared_order: order.iter().map(|s| JobId::from(*s)).collect(),
            cleanup_on_failure: false,
        }
    }

    #[test]
    fn start_set_defaults_to_roots() {
        let p = pipeline(&[("a", "b"), ("b", "c")], &["a", "b", "c"]);
        assert_eq!(p.resolve_start_set(), vec![JobId::from("a")]);
    }

    #[test]
    fn start_set_falls_back_to_all_jobs_when_no_roots() {
        // a <-> b cycle: both have incoming edges, so no roots exist.
        let p = pipeline(&[("a", "b"), ("b", "a")], &["a", "b"]);
        let start = p.resolve_start_set();
        assert_eq!(start, vec![JobId::from("a"), JobId::from("b")]);
    }

    #[test]
    fn explicit_start_set_wins() {
        let mut p = pipeline(&[("a", "b")], &["a", "b"]);
        p.start = Some(vec![JobId::from("b")]);
        assert_eq!(p.resolve_start_set(), vec![JobId::from("b")]);
    }
}
