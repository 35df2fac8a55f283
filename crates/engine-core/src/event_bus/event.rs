use crate::metrics::MetricsSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker trait for anything published on the `EventBus`. `event_type`
/// is used only for log lines, not dispatch (dispatch is by `TypeId`,
/// see `EventBus::publish`).
pub trait Event: Send + Sync + 'static {
    fn event_type(&self) -> &'static str;
}

/// §6 "jobs": snapshot list of per-job state, published after any
/// per-job mutation.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub name: String,
    pub total: Option<u64>,
    pub processed: u64,
    pub progress_pct: Option<f64>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsEvent {
    pub jobs: Vec<JobSnapshot>,
    pub metrics: MetricsSnapshot,
}

impl Event for JobsEvent {
    fn event_type(&self) -> &'static str {
        "jobs"
    }
}

/// §6 "project": coarse pipeline-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Running,
    Stop,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectEvent {
    pub status: ProjectStatus,
}

impl Event for ProjectEvent {
    fn event_type(&self) -> &'static str {
        "project"
    }
}

/// §6 "counts": preflight-count progress horizon.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountsEvent {
    pub done: u64,
    pub total: u64,
}

impl Event for CountsEvent {
    fn event_type(&self) -> &'static str {
        "counts"
    }
}

/// §6 "workers": aggregate reader/writer activity for the active copy job.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkersEvent {
    pub read_active: u32,
    pub read_total: u32,
    pub write_active: u32,
    pub write_total: u32,
}

impl Event for WorkersEvent {
    fn event_type(&self) -> &'static str {
        "workers"
    }
}
