//! Declarative entry triggers and their dispatch machinery.

mod registry;
mod types;

pub use registry::{run_trigger_processor, run_trigger_scanner, TriggerRegistry};
pub use types::{
    EntryTrigger, LifecycleEvent, LifecycleEventKind, TriggerKind, TriggerState, TriggerTarget,
};
