//! Persistence contract for calendars, entries, and participants.

mod memory;

pub use memory::MemoryCalendarStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calendar::{Calendar, CalendarEntry, EntryStatus};
use crate::error::Result;
use crate::participants::Participant;

/// Query for entries within a calendar or for a user.
///
/// The default status filter is `confirmed`-only; cancelled entries stay
/// readable by id but drop out of listings unless explicitly requested.
#[derive(Debug, Clone)]
pub struct EntryQuery {
    pub calendar_id: Option<String>,
    /// Matches entries the user organizes or participates in.
    pub user_id: Option<String>,
    /// Half-open `[start, end)` window on entry overlap.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Empty means any status.
    pub statuses: Vec<EntryStatus>,
}

impl Default for EntryQuery {
    fn default() -> Self {
        Self {
            calendar_id: None,
            user_id: None,
            window: None,
            statuses: vec![EntryStatus::Confirmed],
        }
    }
}

impl EntryQuery {
    /// Restrict to a calendar.
    pub fn for_calendar(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: Some(calendar_id.into()),
            ..Default::default()
        }
    }

    /// Restrict to a user (organizer or participant).
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Restrict to entries overlapping `[start, end)`.
    pub fn within(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window = Some((start, end));
        self
    }

    /// Add a status to the filter.
    pub fn with_status(mut self, status: EntryStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    /// Match entries of any status.
    pub fn any_status(mut self) -> Self {
        self.statuses.clear();
        self
    }

    /// Whether an entry matches this query.
    pub fn matches(&self, entry: &CalendarEntry, participants: &[Participant]) -> bool {
        if let Some(ref calendar_id) = self.calendar_id {
            if &entry.calendar_id != calendar_id {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            let involved = &entry.organizer_id == user_id
                || participants.iter().any(|p| &p.user_id == user_id);
            if !involved {
                return false;
            }
        }
        if let Some((start, end)) = self.window {
            if !entry.overlaps(start, end) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&entry.status) {
            return false;
        }
        true
    }
}

/// Transactional persistence collaborator for the five aggregate types.
///
/// An entry and its recurrence/trigger children are one aggregate: insert
/// and update commit the whole aggregate atomically, so readers never see an
/// entry with a dangling recurrence or trigger reference.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    // Calendars

    /// Persist a new calendar. Setting `is_default` clears the flag on the
    /// owner's previous default so at most one remains.
    async fn create_calendar(&self, calendar: Calendar) -> Result<Calendar>;

    async fn get_calendar(&self, id: &str) -> Result<Option<Calendar>>;

    /// Replace a calendar record, keeping the single-default invariant.
    async fn update_calendar(&self, calendar: Calendar) -> Result<()>;

    /// Soft-delete: clears `active`, never removes the row.
    async fn deactivate_calendar(&self, id: &str) -> Result<()>;

    async fn list_calendars_for_owner(&self, owner_id: &str) -> Result<Vec<Calendar>>;

    // Entries

    /// Commit a new entry aggregate (entry + recurrence + triggers).
    async fn insert_entry(&self, entry: CalendarEntry) -> Result<()>;

    /// Replace an existing entry aggregate.
    async fn update_entry(&self, entry: CalendarEntry) -> Result<()>;

    async fn get_entry(&self, id: &str) -> Result<Option<CalendarEntry>>;

    /// Find entries matching the query, ordered by start time.
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<CalendarEntry>>;

    // Participants

    /// Insert or replace the (entry, user) participant row.
    async fn upsert_participant(&self, participant: Participant) -> Result<()>;

    async fn get_participant(&self, entry_id: &str, user_id: &str)
        -> Result<Option<Participant>>;

    async fn get_participants(&self, entry_id: &str) -> Result<Vec<Participant>>;

    /// Returns whether a row was removed.
    async fn remove_participant(&self, entry_id: &str, user_id: &str) -> Result<bool>;

    // Trigger scheduling support

    /// Non-cancelled entries carrying at least one unfired time-based
    /// trigger due at or before `until`.
    async fn entries_with_due_time_triggers(
        &self,
        until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEntry>>;

    /// Stamp a trigger's dispatch ledger.
    async fn mark_trigger_fired(
        &self,
        entry_id: &str,
        trigger_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
