pub mod context;
pub mod controller;
pub mod dag;
pub mod error;
pub mod pipeline_builder;
pub mod scheduler;

pub use context::RunContext;
pub use controller::{Controller, ExecutorFactory};
pub use error::RuntimeError;
pub use scheduler::{JobExecutor, JobOutcome, Scheduler, SchedulerOutcome};
