//! C4/C6/C7: the job executors that actually move or evaluate data, and
//! the dispatcher that routes each job to the right one by `JobKind`.

pub mod condition;
pub mod copy_executor;
pub mod count_worker;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod materialize;
pub mod memory_select;

pub use dispatcher::{Dispatcher, ProcessingExecutorFactory};
pub use error::ProcessingError;
