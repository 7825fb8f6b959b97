//! Entry lifecycle orchestration: create, update, delete, duplicate.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::calendar::{CalendarEntry, EntryInput, EntryPatch, EntryStatus};
use crate::config::EngineDefaults;
use crate::error::{CadenceError, Result};
use crate::store::CalendarStore;
use crate::triggers::{LifecycleEvent, LifecycleEventKind};

/// Orchestrates entry mutations as atomic store commits and hands the
/// resulting lifecycle events to the trigger processor after each commit.
///
/// The defaults are plain injected configuration; the manager holds no
/// process-wide state of its own.
pub struct EntryLifecycleManager<S: CalendarStore> {
    store: Arc<S>,
    defaults: EngineDefaults,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl<S: CalendarStore> EntryLifecycleManager<S> {
    pub fn new(
        store: Arc<S>,
        defaults: EngineDefaults,
        events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> Self {
        Self {
            store,
            defaults,
            events_tx,
        }
    }

    /// Create an entry (plus its optional recurrence and triggers) as one
    /// atomic aggregate, then queue the `created` event.
    pub async fn create(&self, input: EntryInput, organizer_id: &str) -> Result<CalendarEntry> {
        let now = Utc::now();
        let end = input.end.unwrap_or_else(|| {
            input.start + Duration::minutes(self.defaults.default_entry_duration_minutes)
        });
        if !input.all_day && end <= input.start {
            return Err(CadenceError::Validation(
                "end must be after start".to_string(),
            ));
        }
        if let Some(ref recurrence) = input.recurrence {
            recurrence.validate()?;
        }

        // Triggers on a new entry always start with a clean dispatch ledger,
        // even when the input was cloned from an already-fired entry.
        let workflow_trigger = input.workflow_trigger.map(|mut t| {
            t.last_fired_at = None;
            t
        });
        let service_trigger = input.service_trigger.map(|mut t| {
            t.last_fired_at = None;
            t
        });

        let entry = CalendarEntry {
            id: uuid::Uuid::new_v4().to_string(),
            calendar_id: input.calendar_id,
            organizer_id: organizer_id.to_string(),
            title: input.title,
            description: input.description,
            location: input.location,
            start: input.start,
            end,
            timezone: input.timezone.unwrap_or_else(|| "UTC".to_string()),
            all_day: input.all_day,
            status: input.status.unwrap_or(EntryStatus::Confirmed),
            priority: input.priority.unwrap_or_default(),
            category: input.category,
            tags: input.tags,
            metadata: input.metadata,
            recurrence: input.recurrence,
            workflow_trigger,
            service_trigger,
            created_by: organizer_id.to_string(),
            updated_by: organizer_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_entry(entry.clone()).await?;
        debug!("Created calendar entry: {} ({})", entry.title, entry.id);

        self.emit(LifecycleEvent::new(
            LifecycleEventKind::Created,
            entry.clone(),
            organizer_id,
        ));
        Ok(entry)
    }

    /// Apply a partial patch. Permitted only for the organizer or an
    /// existing participant, checked against pre-mutation state.
    pub async fn update(
        &self,
        entry_id: &str,
        patch: EntryPatch,
        user_id: &str,
    ) -> Result<CalendarEntry> {
        let mut entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;

        self.check_entry_access(&entry, user_id, "update").await?;

        // Cancellation is terminal; it cannot be reverted by patching.
        if entry.is_cancelled() && patch.status.is_some_and(|s| s != EntryStatus::Cancelled) {
            return Err(CadenceError::Validation(format!(
                "entry {entry_id} is cancelled and cannot be reinstated"
            )));
        }

        patch.apply_to(&mut entry);
        if !entry.all_day && entry.end <= entry.start {
            return Err(CadenceError::Validation(
                "end must be after start".to_string(),
            ));
        }
        if let Some(ref recurrence) = entry.recurrence {
            recurrence.validate()?;
        }
        entry.updated_by = user_id.to_string();
        entry.updated_at = Utc::now();

        self.store.update_entry(entry.clone()).await?;
        debug!("Updated calendar entry: {} ({})", entry.title, entry.id);

        self.emit(LifecycleEvent::new(
            LifecycleEventKind::Updated,
            entry.clone(),
            user_id,
        ));
        Ok(entry)
    }

    /// Soft-delete: transitions the entry to `cancelled`. The row stays
    /// readable by id; default listings exclude it.
    pub async fn delete(&self, entry_id: &str, user_id: &str) -> Result<CalendarEntry> {
        let mut entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;

        self.check_entry_access(&entry, user_id, "delete").await?;

        entry.status = EntryStatus::Cancelled;
        entry.updated_by = user_id.to_string();
        entry.updated_at = Utc::now();

        self.store.update_entry(entry.clone()).await?;
        debug!("Cancelled calendar entry: {} ({})", entry.title, entry.id);

        self.emit(LifecycleEvent::new(
            LifecycleEventKind::Deleted,
            entry.clone(),
            user_id,
        ));
        Ok(entry)
    }

    /// Copy an existing entry into a new one organized by `user_id`.
    ///
    /// Start and end shift forward by the configured duplicate offset
    /// unless the modifications override them. Participant rows are never
    /// copied.
    pub async fn duplicate(
        &self,
        entry_id: &str,
        modifications: EntryPatch,
        user_id: &str,
    ) -> Result<CalendarEntry> {
        let original = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;

        self.check_entry_access(&original, user_id, "duplicate")
            .await?;

        let offset = Duration::hours(self.defaults.duplicate_offset_hours);
        let mut input = EntryInput {
            calendar_id: original.calendar_id.clone(),
            title: original.title.clone(),
            description: original.description.clone(),
            location: original.location.clone(),
            start: original.start + offset,
            end: Some(original.end + offset),
            timezone: Some(original.timezone.clone()),
            all_day: original.all_day,
            status: Some(EntryStatus::Confirmed),
            priority: Some(original.priority),
            category: original.category.clone(),
            tags: original.tags.clone(),
            metadata: original.metadata.clone(),
            recurrence: original.recurrence.clone(),
            workflow_trigger: original.workflow_trigger.clone(),
            service_trigger: original.service_trigger.clone(),
        };

        if let Some(title) = modifications.title {
            input.title = title;
        }
        if let Some(description) = modifications.description {
            input.description = Some(description);
        }
        if let Some(location) = modifications.location {
            input.location = Some(location);
        }
        if let Some(start) = modifications.start {
            input.start = start;
        }
        if let Some(end) = modifications.end {
            input.end = Some(end);
        }
        if let Some(priority) = modifications.priority {
            input.priority = Some(priority);
        }
        if let Some(category) = modifications.category {
            input.category = Some(category);
        }
        if let Some(tags) = modifications.tags {
            input.tags = tags;
        }
        if modifications.clear_recurrence {
            input.recurrence = None;
        } else if let Some(recurrence) = modifications.recurrence {
            input.recurrence = Some(recurrence);
        }

        self.create(input, user_id).await
    }

    /// Organizer-or-participant check against the pre-mutation row.
    async fn check_entry_access(
        &self,
        entry: &CalendarEntry,
        user_id: &str,
        action: &str,
    ) -> Result<()> {
        if entry.organizer_id == user_id {
            return Ok(());
        }
        if self
            .store
            .get_participant(&entry.id, user_id)
            .await?
            .is_some()
        {
            return Ok(());
        }
        Err(CadenceError::PermissionDenied(format!(
            "user {user_id} may not {action} entry {}",
            entry.id
        )))
    }

    /// Queue a lifecycle event for the trigger processor. The commit has
    /// already happened, so a full or closed channel is logged and ignored
    /// rather than surfaced to the caller.
    fn emit(&self, event: LifecycleEvent) {
        let kind = event.kind;
        let entry_id = event.entry.id.clone();
        if self.events_tx.send(event).is_err() {
            warn!(
                "Lifecycle event channel closed; {} event for entry {} dropped",
                kind, entry_id
            );
        }
    }
}
