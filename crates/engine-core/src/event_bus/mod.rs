pub mod bus;
pub mod event;

pub use bus::{EventBus, Subscription};
pub use event::{
    CountsEvent, Event, JobSnapshot, JobsEvent, ProjectEvent, ProjectStatus, WorkersEvent,
};
