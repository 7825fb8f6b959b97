//! Calendars and calendar entries.

mod manager;
mod types;

pub use manager::{CalendarInput, CalendarManager, CalendarPatch};
pub use types::{
    Calendar, CalendarEntry, CalendarSettings, CalendarVisibility, EntryInput, EntryPatch,
    EntryPriority, EntryStatus, WorkingHours,
};
