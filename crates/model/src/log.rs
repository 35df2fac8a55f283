use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job state machine (§3): `Pending -> Running -> {Done | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

/// Pipeline state machine (§3): `Running -> {Done | Error | Stopped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Done,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLog {
    pub offset: u64,
    pub limit: u32,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub rows: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BatchLog {
    pub fn started(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit,
            status: BatchStatus::Running,
            error: None,
            error_type: None,
            error_code: None,
            rows: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn complete(&mut self, rows: u64) {
        self.rows = rows;
        self.status = BatchStatus::Done;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String, error_type: String, error_code: Option<String>) {
        self.error = Some(error);
        self.error_type = Some(error_type);
        self.error_code = error_code;
        self.status = BatchStatus::Error;
        self.ended_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub job_id: String,
    pub name: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub stop_on_error: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub processed: u64,
    pub total: Option<u64>,
    pub batches: Vec<BatchLog>,
}

impl JobLog {
    /// A job log entry seeded before the scheduler has dispatched this
    /// job (§3 "pending"): every reachable job gets one of these up
    /// front, so `Stop` always has a row to mark `error` on even if the
    /// job never got to run.
    pub fn pending(job_id: String, name: String, stop_on_error: bool) -> Self {
        Self {
            job_id,
            name,
            status: JobStatus::Pending,
            error: None,
            error_type: None,
            error_code: None,
            stop_on_error,
            started_at: None,
            ended_at: None,
            processed: 0,
            total: None,
            batches: Vec::new(),
        }
    }

    pub fn started(job_id: String, name: String, stop_on_error: bool) -> Self {
        let mut job_log = Self::pending(job_id, name, stop_on_error);
        job_log.start();
        job_log
    }

    fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Error)
    }

    /// `Pending -> Running` (§3). A no-op once the job has already
    /// reached a terminal state, e.g. it was marked `error` by `Stop`
    /// just before its own task got a chance to run.
    pub fn start(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Done;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String, error_type: Option<String>, error_code: Option<String>) {
        if self.is_terminal() {
            return;
        }
        self.error = Some(error);
        self.error_type = error_type;
        self.error_code = error_code;
        self.status = JobStatus::Error;
        self.ended_at = Some(Utc::now());
    }

    pub fn progress_pct(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed as f64 / total as f64) * 100.0
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineLog {
    pub pipeline_id: String,
    pub project_id: String,
    pub project: String,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub jobs: Vec<JobLog>,
}

impl PipelineLog {
    pub fn started(pipeline_id: String, project_id: String, project: String) -> Self {
        Self {
            pipeline_id,
            project_id,
            project,
            status: PipelineStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            jobs: Vec::new(),
        }
    }

    pub fn job_mut(&mut self, job_id: &str) -> Option<&mut JobLog> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }

    /// Seeds a `Pending` row for `job_id` if one isn't already present.
    /// The controller calls this for every reachable job before the
    /// scheduler starts dispatching, so `fail_non_terminal` always has a
    /// complete picture of the run's jobs to mark on `Stop`.
    pub fn seed_pending(&mut self, job_id: String, name: String, stop_on_error: bool) {
        if self.job_mut(&job_id).is_none() {
            self.jobs.push(JobLog::pending(job_id, name, stop_on_error));
        }
    }

    /// Marks every job still at `Pending` or `Running` `error` with
    /// `reason` (§4.5 "Stop ... marks all not-yet-terminal jobs `error`
    /// with the reason"). Idempotent: a job already `Done`/`Error` is
    /// left untouched.
    pub fn fail_non_terminal(&mut self, reason: &str) {
        for job in &mut self.jobs {
            if matches!(job.status, JobStatus::Pending | JobStatus::Running) {
                job.fail(reason.to_string(), None, None);
            }
        }
    }

    pub fn finish(&mut self, status: PipelineStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}
