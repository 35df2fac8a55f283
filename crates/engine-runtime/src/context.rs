//! The resources a running pipeline shares across every job executor
//! (§4.8): the two connection pools, the memory dataset store, the
//! pipeline log, the event bus, and the run's cancellation token.

use std::sync::Arc;

use connectors::sql::ConnectionPool;
use engine_core::cancellation::CancelToken;
use engine_core::event_bus::EventBus;
use engine_core::log_store::PipelineLogStore;
use engine_core::metrics::Metrics;
use memory_store::MemoryStore;
use model::execution::pipeline::Pipeline;
use model::execution::variables::VariableMap;
use planner::Dialect;

#[derive(Clone)]
pub struct RunContext {
    pub pipeline: Arc<Pipeline>,
    pub variables: Arc<VariableMap>,
    pub source_pool: Arc<ConnectionPool>,
    pub destination_pool: Arc<ConnectionPool>,
    pub source_dialect: Arc<dyn Dialect>,
    pub destination_dialect: Arc<dyn Dialect>,
    pub memory_store: MemoryStore,
    pub log_store: Arc<PipelineLogStore>,
    pub event_bus: EventBus,
    pub cancel: CancelToken,
    pub concurrency: u32,
    /// Run-scoped counters (records/batches/failures), independent of the
    /// persisted pipeline log — the in-process analogue of the teacher's
    /// benchmarking probe counters, kept here because this core does not
    /// depend on the out-of-scope probe subsystem (§1).
    pub metrics: Metrics,
}
