//! C5 DAG Scheduler — live dispatch. Builds on the pure graph functions
//! in `dag.rs`: jobs are started concurrently as soon as every
//! predecessor within the reachable subgraph has reached a terminal
//! state, per §4.5's dispatch rule.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use engine_core::cancellation::CancelToken;
use model::core::identifiers::JobId;
use model::execution::pipeline::Pipeline;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dag::{reachable_set, restricted_indegree, seed_queue};

/// The outcome of running a single job, as reported back to the
/// scheduler. Log/event-bus bookkeeping for the job itself is the
/// executor's responsibility (§4.6–§4.7); the scheduler only needs to
/// know whether to trigger successors and whether to halt the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Failed { stop_on_error: bool },
}

/// Implemented by `engine-processing`'s dispatcher: routes a job id to
/// the right executor (copy / execution / condition / memory-select)
/// based on its `JobKind` and runs it to completion.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job_id: &JobId, cancel: CancelToken) -> JobOutcome;

    /// Called for a job whose predecessors are all terminal but at
    /// least one failed (or the pipeline already halted) — the job
    /// itself never runs (§4.5 "does not trigger its successors"). The
    /// executor still needs to give it a terminal log entry so the
    /// pipeline log's job state machine never leaves a node at
    /// `pending` forever.
    async fn skip(&self, job_id: &JobId, reason: &str);
}

/// Summary of one scheduler run, used by the controller (C8) to decide
/// the pipeline's final status together with whether `Stop` was called
/// externally.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOutcome {
    /// At least one `stop_on_error = true` job failed.
    pub stop_on_error_triggered: bool,
}

pub struct Scheduler;

impl Scheduler {
    /// Runs every reachable job to completion, dispatching concurrently
    /// and propagating failure/skip through the DAG as described in
    /// §4.5. Returns once no job is left pending or running.
    pub async fn run(
        pipeline: &Pipeline,
        executor: Arc<dyn JobExecutor>,
        cancel: CancelToken,
    ) -> SchedulerOutcome {
        let start = pipeline.resolve_start_set();
        let reachable = reachable_set(pipeline, &start);
        let mut indegree = restricted_indegree(pipeline, &reachable);
        let seed = seed_queue(pipeline, &start, &reachable, &indegree);

        let mut blocked: HashMap<JobId, bool> =
            reachable.iter().cloned().map(|id| (id, false)).collect();
        let mut outcome = SchedulerOutcome::default();

        let (tx, mut rx) = mpsc::channel::<(JobId, JobOutcome)>(reachable.len().max(1));
        let mut in_flight = 0usize;

        let mut dispatch = |job_id: JobId,
                             in_flight: &mut usize,
                             tx: mpsc::Sender<(JobId, JobOutcome)>,
                             executor: Arc<dyn JobExecutor>,
                             cancel: CancelToken| {
            *in_flight += 1;
            // A stopped run never starts new jobs (§5): once the token is
            // flipped, route every would-be dispatch through `skip`
            // instead of `execute` so it still gets a terminal log entry.
            if cancel.is_cancelled() {
                tokio::spawn(async move {
                    executor.skip(&job_id, "pipeline was stopped").await;
                    let _ = tx.send((job_id, JobOutcome::Failed { stop_on_error: false })).await;
                });
                return;
            }
            let job_cancel = cancel.child();
            tokio::spawn(async move {
                let result = executor.execute(&job_id, job_cancel).await;
                let _ = tx.send((job_id, result)).await;
            });
        };

        for id in seed {
            dispatch(id, &mut in_flight, tx.clone(), executor.clone(), cancel.clone());
        }

        while in_flight > 0 {
            let Some((finished_id, result)) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            if let JobOutcome::Failed { stop_on_error: true } = result {
                outcome.stop_on_error_triggered = true;
                warn!(job_id = %finished_id, "stop_on_error job failed; pipeline will report error");
            }

            let mut frontier: VecDeque<(JobId, bool)> =
                VecDeque::from([(finished_id, matches!(result, JobOutcome::Failed { .. }))]);
            let mut visited_in_cascade: HashSet<JobId> = HashSet::new();

            while let Some((job_id, job_failed)) = frontier.pop_front() {
                if !visited_in_cascade.insert(job_id.clone()) {
                    continue;
                }
                for succ in pipeline.successors(&job_id) {
                    if !reachable.contains(succ) {
                        continue;
                    }
                    if job_failed || outcome.stop_on_error_triggered {
                        if let Some(b) = blocked.get_mut(succ) {
                            *b = true;
                        }
                    }
                    if let Some(count) = indegree.get_mut(succ) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            if blocked.get(succ).copied().unwrap_or(false) {
                                let reason = "an upstream job in this path did not complete successfully";
                                info!(job_id = %succ, %reason, "skipping job");
                                let executor = executor.clone();
                                let succ = succ.clone();
                                let reason_owned = reason.to_string();
                                tokio::spawn(async move {
                                    executor.skip(&succ, &reason_owned).await;
                                });
                                frontier.push_back((succ.clone(), true));
                            } else {
                                dispatch(
                                    succ.clone(),
                                    &mut in_flight,
                                    tx.clone(),
                                    executor.clone(),
                                    cancel.clone(),
                                );
                            }
                        }
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::job::{Job, JobConnection, JobKind};
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    fn job(id: &str, stop_on_error: bool) -> Job {
        Job {
            job_id: id.into(),
            name: id.to_string(),
            kind: JobKind::Execution,
            select_sql: None,
            insert_sql: None,
            post_insert_sql: None,
            columns: vec![],
            primary_keys: vec![],
            records_per_page: 100,
            stop_on_error,
            connection: JobConnection::Destination,
        }
    }

    fn pipeline(edges: &[(&str, &str)], order: &[(&str, bool)]) -> Pipeline {
        let mut jobs = Map::new();
        let mut edge_map: Map<JobId, Vec<JobId>> = Map::new();
        for (id, stop_on_error) in order {
            jobs.insert(JobId::from(*id), job(id, *stop_on_error));
        }
        for (from, to) in edges {
            edge_map.entry(JobId::from(*from)).or_default().push(JobId::from(*to));
        }
        Pipeline {
            pipeline_id: "p".into(),
            project_id: "proj".into(),
            jobs,
            edges: edge_map,
            start: None,
            declared_order: order.iter().map(|(s, _)| JobId::from(*s)).collect(),
            cleanup_on_failure: false,
        }
    }

    struct FakeExecutor {
        fail: HashSet<String>,
        ran: Mutex<Vec<String>>,
        skipped: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobExecutor for FakeExecutor {
        async fn execute(&self, job_id: &JobId, _cancel: CancelToken) -> JobOutcome {
            self.ran.lock().unwrap().push(job_id.to_string());
            if self.fail.contains(job_id.as_str()) {
                JobOutcome::Failed { stop_on_error: false }
            } else {
                JobOutcome::Done
            }
        }

        async fn skip(&self, job_id: &JobId, _reason: &str) {
            self.skipped.lock().unwrap().push(job_id.to_string());
        }
    }

    #[tokio::test]
    async fn all_jobs_run_on_a_simple_chain() {
        let p = pipeline(&[("a", "b"), ("b", "c")], &[("a", false), ("b", false), ("c", false)]);
        let executor = Arc::new(FakeExecutor {
            fail: HashSet::new(),
            ran: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
        });
        let outcome = Scheduler::run(&p, executor.clone(), CancelToken::new()).await;
        assert!(!outcome.stop_on_error_triggered);
        let ran = executor.ran.lock().unwrap();
        assert_eq!(ran.len(), 3);
    }

    #[tokio::test]
    async fn non_stop_on_error_failure_skips_only_its_successors() {
        // a -> b -> c ; a -> d (independent path)
        let p = pipeline(
            &[("a", "b"), ("b", "c"), ("a", "d")],
            &[("a", false), ("b", false), ("c", false), ("d", false)],
        );
        let mut fail = HashSet::new();
        fail.insert("b".to_string());
        let executor = Arc::new(FakeExecutor {
            fail,
            ran: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
        });
        let outcome = Scheduler::run(&p, executor.clone(), CancelToken::new()).await;
        assert!(!outcome.stop_on_error_triggered);
        let ran = executor.ran.lock().unwrap();
        assert!(ran.contains(&"a".to_string()));
        assert!(ran.contains(&"b".to_string()));
        assert!(ran.contains(&"d".to_string()));
        assert!(!ran.contains(&"c".to_string()));
        let skipped = executor.skipped.lock().unwrap();
        assert!(skipped.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn stop_on_error_failure_is_reported_to_caller() {
        let p = pipeline(&[("a", "b")], &[("a", true), ("b", false)]);
        let mut fail = HashSet::new();
        fail.insert("a".to_string());
        let executor = Arc::new(FakeExecutor {
            fail,
            ran: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
        });
        let outcome = Scheduler::run(&p, executor.clone(), CancelToken::new()).await;
        assert!(outcome.stop_on_error_triggered);
        let skipped = executor.skipped.lock().unwrap();
        assert!(skipped.contains(&"b".to_string()));
    }
}
