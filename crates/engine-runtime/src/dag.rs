//! C5 DAG Scheduler: reachable-set BFS and Kahn's-algorithm execution
//! order, pure over `model::execution::pipeline::Pipeline` so they can
//! be property-tested without spinning up any tasks (§8 property 5).

use std::collections::{HashMap, HashSet, VecDeque};

use model::core::identifiers::JobId;
use model::execution::pipeline::Pipeline;

/// BFS from `start` over the pipeline's forward edges (§4.5 "Reachable
/// set").
pub fn reachable_set(pipeline: &Pipeline, start: &[JobId]) -> HashSet<JobId> {
    let mut seen: HashSet<JobId> = start.iter().cloned().collect();
    let mut queue: VecDeque<JobId> = start.iter().cloned().collect();

    while let Some(job_id) = queue.pop_front() {
        for succ in pipeline.successors(&job_id) {
            if seen.insert(succ.clone()) {
                queue.push_back(succ.clone());
            }
        }
    }

    seen
}

/// Indegree of every node in `reachable`, counting only edges whose
/// source is also in `reachable` (§4.5 "indegrees restricted to the
/// reachable set").
pub fn restricted_indegree(
    pipeline: &Pipeline,
    reachable: &HashSet<JobId>,
) -> HashMap<JobId, u32> {
    let mut indegree: HashMap<JobId, u32> =
        reachable.iter().cloned().map(|id| (id, 0)).collect();

    for source in reachable {
        for target in pipeline.successors(source) {
            if reachable.contains(target)
                && let Some(count) = indegree.get_mut(target)
            {
                *count += 1;
            }
        }
    }

    indegree
}

/// The Kahn's-algorithm seed queue (§4.5): the intersection of the
/// start-job set with zero-indegree reachable nodes, in declared order;
/// if that intersection is empty, every zero-indegree reachable node in
/// declared order.
pub fn seed_queue(
    pipeline: &Pipeline,
    start: &[JobId],
    reachable: &HashSet<JobId>,
    indegree: &HashMap<JobId, u32>,
) -> Vec<JobId> {
    let start_set: HashSet<&JobId> = start.iter().collect();
    let zero_indegree_in_order: Vec<JobId> = pipeline
        .declared_order
        .iter()
        .filter(|id| reachable.contains(*id) && indegree.get(*id).copied() == Some(0))
        .cloned()
        .collect();

    let seeded: Vec<JobId> = zero_indegree_in_order
        .iter()
        .filter(|id| start_set.contains(*id))
        .cloned()
        .collect();

    if !seeded.is_empty() {
        seeded
    } else {
        zero_indegree_in_order
    }
}

/// Full Kahn's-algorithm execution order over the reachable subgraph,
/// with the declared-order seed/tie-break and the undrained-node
/// fallback described in §4.5: nodes still at indegree > 0 after
/// draining (cycles, or nodes unreachable by the seed queue alone) are
/// appended in declared insertion order. This function is pure and used
/// for property testing and for display (e.g. the CLI's "planned
/// order" output); live dispatch uses its own event-driven completion
/// propagation in `scheduler.rs`, not this order directly.
pub fn execution_order(pipeline: &Pipeline, start: &[JobId]) -> Vec<JobId> {
    let reachable = reachable_set(pipeline, start);
    let mut indegree = restricted_indegree(pipeline, &reachable);
    let mut queue: VecDeque<JobId> = seed_queue(pipeline, start, &reachable, &indegree).into();

    let mut order = Vec::with_capacity(reachable.len());
    let mut visited: HashSet<JobId> = HashSet::new();

    while let Some(job_id) = queue.pop_front() {
        if !visited.insert(job_id.clone()) {
            continue;
        }
        order.push(job_id.clone());

        let mut newly_ready: Vec<JobId> = Vec::new();
        for succ in pipeline.successors(&job_id) {
            if !reachable.contains(succ) {
                continue;
            }
            if let Some(count) = indegree.get_mut(succ) {
                *count = count.saturating_sub(1);
                if *count == 0 && !visited.contains(succ) {
                    newly_ready.push(succ.clone());
                }
            }
        }
        // Declared-order tie-break among nodes that became ready at the
        // same step.
        newly_ready.sort_by_key(|id| {
            pipeline
                .declared_order
                .iter()
                .position(|d| d == id)
                .unwrap_or(usize::MAX)
        });
        for id in newly_ready {
            queue.push_back(id);
        }
    }

    // Anything left (cycles, or reachable-but-never-drained nodes) is
    // appended in declared order.
    for id in &pipeline.declared_order {
        if reachable.contains(id) && !visited.contains(id) {
            visited.insert(id.clone());
            order.push(id.clone());
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::job::{Job, JobConnection, JobKind};
    use std::collections::HashMap as Map;

    fn job(id: &str) -> Job {
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
            stop_on_error: false,
            connection: JobConnection::Destination,
        }
    }

    fn pipeline(edges: &[(&str, &str)], order: &[&str]) -> Pipeline {
        let mut jobs = Map::new();
        let mut edge_map: Map<JobId, Vec<JobId>> = Map::new();
        for id in order {
            jobs.insert(JobId::from(*id), job(id));
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
            declared_order: order.iter().map(|s| JobId::from(*s)).collect(),
            cleanup_on_failure: false,
        }
    }

    fn ids(names: &[&str]) -> Vec<JobId> {
        names.iter().map(|s| JobId::from(*s)).collect()
    }

    #[test]
    fn reachable_set_follows_forward_edges_only() {
        // d is unreachable from a.
        let p = pipeline(&[("a", "b"), ("b", "c"), ("d", "c")], &["a", "b", "c", "d"]);
        let reach = reachable_set(&p, &ids(&["a"]));
        assert_eq!(reach, ids(&["a", "b", "c"]).into_iter().collect());
    }

    #[test]
    fn execution_order_lists_every_node_before_its_descendants() {
        let p = pipeline(
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
            &["a", "b", "c", "d"],
        );
        let order = execution_order(&p, &ids(&["a"]));
        let pos = |name: &str| order.iter().position(|id| id.as_str() == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn cyclic_nodes_are_appended_in_declared_order_after_draining() {
        let p = pipeline(&[("a", "b"), ("b", "a")], &["a", "b"]);
        let order = execution_order(&p, &ids(&["a", "b"]));
        assert_eq!(order, ids(&["a", "b"]));
    }

    #[test]
    fn diamond_dag_linearizes_correctly() {
        let p = pipeline(
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")],
            &["a", "b", "c", "d", "e"],
        );
        let order = execution_order(&p, &ids(&["a"]));
        assert_eq!(order.len(), 5);
        let pos = |name: &str| order.iter().position(|id| id.as_str() == name).unwrap();
        assert!(pos("d") < pos("e"));
    }
}
