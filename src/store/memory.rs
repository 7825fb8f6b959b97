//! In-memory calendar store for tests and embedded deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calendar::{Calendar, CalendarEntry};
use crate::error::{Result, StorageError};
use crate::participants::Participant;
use crate::triggers::TriggerKind;

use super::{CalendarStore, EntryQuery};

#[derive(Default)]
struct Inner {
    calendars: HashMap<String, Calendar>,
    entries: HashMap<String, CalendarEntry>,
    /// Participant rows keyed by entry id.
    participants: HashMap<String, Vec<Participant>>,
}

/// `CalendarStore` backed by process memory. All writes take the single
/// store lock, which is the in-memory analogue of a transaction: an entry
/// aggregate becomes visible in one step or not at all.
#[derive(Default)]
pub struct MemoryCalendarStore {
    inner: RwLock<Inner>,
}

impl MemoryCalendarStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> StorageError {
    StorageError::Connection("store lock poisoned".to_string())
}

#[async_trait]
impl CalendarStore for MemoryCalendarStore {
    async fn create_calendar(&self, calendar: Calendar) -> Result<Calendar> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if inner.calendars.contains_key(&calendar.id) {
            return Err(StorageError::InvalidOperation(format!(
                "calendar {} already exists",
                calendar.id
            ))
            .into());
        }
        if calendar.is_default {
            clear_other_defaults(&mut inner, &calendar.owner_id, &calendar.id);
        }
        inner.calendars.insert(calendar.id.clone(), calendar.clone());
        Ok(calendar)
    }

    async fn get_calendar(&self, id: &str) -> Result<Option<Calendar>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.calendars.get(id).cloned())
    }

    async fn update_calendar(&self, calendar: Calendar) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if !inner.calendars.contains_key(&calendar.id) {
            return Err(StorageError::NotFound(format!("calendar {}", calendar.id)).into());
        }
        if calendar.is_default {
            clear_other_defaults(&mut inner, &calendar.owner_id, &calendar.id);
        }
        inner.calendars.insert(calendar.id.clone(), calendar);
        Ok(())
    }

    async fn deactivate_calendar(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let calendar = inner
            .calendars
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("calendar {id}")))?;
        calendar.active = false;
        calendar.updated_at = Utc::now();
        Ok(())
    }

    async fn list_calendars_for_owner(&self, owner_id: &str) -> Result<Vec<Calendar>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut calendars: Vec<Calendar> = inner
            .calendars
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        calendars.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(calendars)
    }

    async fn insert_entry(&self, entry: CalendarEntry) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if inner.entries.contains_key(&entry.id) {
            return Err(StorageError::InvalidOperation(format!(
                "entry {} already exists",
                entry.id
            ))
            .into());
        }
        inner.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn update_entry(&self, entry: CalendarEntry) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if !inner.entries.contains_key(&entry.id) {
            return Err(StorageError::NotFound(format!("entry {}", entry.id)).into());
        }
        inner.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<CalendarEntry>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.entries.get(id).cloned())
    }

    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<CalendarEntry>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        static NO_PARTICIPANTS: Vec<Participant> = Vec::new();
        let mut entries: Vec<CalendarEntry> = inner
            .entries
            .values()
            .filter(|e| {
                let participants = inner.participants.get(&e.id).unwrap_or(&NO_PARTICIPANTS);
                query.matches(e, participants)
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(entries)
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let rows = inner
            .participants
            .entry(participant.entry_id.clone())
            .or_default();
        match rows.iter_mut().find(|p| p.user_id == participant.user_id) {
            Some(existing) => *existing = participant,
            None => rows.push(participant),
        }
        Ok(())
    }

    async fn get_participant(
        &self,
        entry_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner
            .participants
            .get(entry_id)
            .and_then(|rows| rows.iter().find(|p| p.user_id == user_id))
            .cloned())
    }

    async fn get_participants(&self, entry_id: &str) -> Result<Vec<Participant>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.participants.get(entry_id).cloned().unwrap_or_default())
    }

    async fn remove_participant(&self, entry_id: &str, user_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let Some(rows) = inner.participants.get_mut(entry_id) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|p| p.user_id != user_id);
        Ok(rows.len() < before)
    }

    async fn entries_with_due_time_triggers(
        &self,
        until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEntry>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut entries: Vec<CalendarEntry> = inner
            .entries
            .values()
            .filter(|e| !e.is_cancelled())
            .filter(|e| {
                e.triggers().any(|t| {
                    t.kind == TriggerKind::TimeBased
                        && t.last_fired_at.is_none()
                        && t.due_at(e.start) <= until
                })
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(entries)
    }

    async fn mark_trigger_fired(
        &self,
        entry_id: &str,
        trigger_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let entry = inner
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| StorageError::NotFound(format!("entry {entry_id}")))?;
        let trigger = entry
            .workflow_trigger
            .iter_mut()
            .chain(entry.service_trigger.iter_mut())
            .find(|t| t.id == trigger_id)
            .ok_or_else(|| {
                StorageError::NotFound(format!("trigger {trigger_id} on entry {entry_id}"))
            })?;
        trigger.last_fired_at = Some(at);
        Ok(())
    }
}

fn clear_other_defaults(inner: &mut Inner, owner_id: &str, keep_id: &str) {
    for calendar in inner.calendars.values_mut() {
        if calendar.owner_id == owner_id && calendar.id != keep_id && calendar.is_default {
            calendar.is_default = false;
            calendar.updated_at = Utc::now();
        }
    }
}
