//! Cadence: calendar scheduling and trigger engine
//!
//! A calendaring core that manages calendars, entries, recurring series,
//! participants, and declarative triggers that hand entry lifecycle
//! transitions and due times off to external workflow and service
//! collaborators.

pub mod access;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod error;
pub mod external;
pub mod lifecycle;
pub mod participants;
pub mod recurrence;
pub mod store;
pub mod triggers;

pub use access::{evaluate as evaluate_calendar_access, CalendarAccessResolver, CalendarAction};
pub use availability::{availability, free_slots, AvailabilitySlot, FreeSlot};
pub use calendar::{
    Calendar, CalendarEntry, CalendarInput, CalendarManager, CalendarPatch, CalendarSettings,
    CalendarVisibility, EntryInput, EntryPatch, EntryPriority, EntryStatus, WorkingHours,
};
pub use config::{CalendarConfig, Config, EngineDefaults, SchedulerConfig, WorkingHoursConfig};
pub use error::{CadenceError, ConfigError, Result, StorageError};
pub use external::{
    ExecutionContext, NotificationPayload, Notifier, RecordingNotifier, RecordingServiceInvoker,
    RecordingWorkflowExecutor, ServiceInvoker, WorkflowExecutor,
};
pub use lifecycle::EntryLifecycleManager;
pub use participants::{
    InviteInput, Participant, ParticipantManager, ParticipantRole, RsvpStatus,
};
pub use recurrence::{expand, Frequency, Occurrence, RecurrencePattern};
pub use store::{CalendarStore, EntryQuery, MemoryCalendarStore};
pub use triggers::{
    run_trigger_processor, run_trigger_scanner, EntryTrigger, LifecycleEvent, LifecycleEventKind,
    TriggerKind, TriggerRegistry, TriggerState, TriggerTarget,
};
