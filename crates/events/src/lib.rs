//! In-process event distribution for pipeline runs.

pub mod bus;

pub use bus::{EventBus, EventKind, PipelineEvent};
