//! Core calendar types: calendars, entries, and their patch structs.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::recurrence::RecurrencePattern;
use crate::triggers::EntryTrigger;

// ============================================================================
// Calendar
// ============================================================================

/// A named container of calendar entries owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Calendar {
    /// Unique identifier.
    pub id: String,
    /// Owning user.
    pub owner_id: String,
    /// Display name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Who may see and act on this calendar.
    pub visibility: CalendarVisibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_unit_id: Option<String>,
    /// IANA time zone name.
    pub timezone: String,
    pub working_hours: WorkingHours,
    pub settings: CalendarSettings,
    /// Soft-delete flag. Calendars are never hard-deleted so historical
    /// entries keep a valid owner reference.
    #[serde(default = "default_true")]
    pub active: bool,
    /// At most one calendar per owner may be the default.
    #[serde(default)]
    pub is_default: bool,
    /// Users granted access when visibility is `shared`.
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,
    /// Teams granted access when visibility is `shared`.
    #[serde(default)]
    pub allowed_team_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Calendar {
    /// Create a new private calendar.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            color: None,
            visibility: CalendarVisibility::Private,
            organization_id: None,
            client_id: None,
            business_unit_id: None,
            timezone: "UTC".to_string(),
            working_hours: WorkingHours::default(),
            settings: CalendarSettings::default(),
            active: true,
            is_default: false,
            allowed_user_ids: Vec::new(),
            allowed_team_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: CalendarVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the time zone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Scope to an organization.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Mark as the owner's default calendar.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Grant access to a user (effective when visibility is `shared`).
    pub fn with_allowed_user(mut self, user_id: impl Into<String>) -> Self {
        self.allowed_user_ids.push(user_id.into());
        self
    }
}

/// Visibility policy governing who may read/write/administer a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CalendarVisibility {
    /// Owner only.
    #[default]
    Private,
    /// Owner plus the allow-lists.
    Shared,
    /// Owner plus application members (membership check is external).
    Application,
    /// Owner plus organization members (membership check is external).
    Organization,
    /// Anyone may read; only the owner may write or administer.
    Public,
}

/// Working-hours policy attached to a calendar.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub include_weekends: bool,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            include_weekends: false,
        }
    }
}

/// Typed per-calendar settings. The key space is known; anything genuinely
/// deployment-specific goes in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CalendarSettings {
    /// Default reminder lead time for new entries, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_reminder_minutes: Option<u32>,
    /// Default entry duration when no end time is supplied, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_entry_duration_minutes: Option<i64>,
    /// Slot width for availability queries against this calendar, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_granularity_minutes: Option<u32>,
    /// Whether overlapping entries are tolerated without warning.
    #[serde(default)]
    pub allow_overlap: bool,
    /// Residual open-ended settings.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Calendar Entry
// ============================================================================

/// A scheduled occurrence or the anchor of a recurring series.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalendarEntry {
    /// Unique identifier.
    pub id: String,
    /// Owning calendar.
    pub calendar_id: String,
    /// The user who created and administers the entry.
    pub organizer_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA time zone the entry was scheduled in.
    pub timezone: String,
    #[serde(default)]
    pub all_day: bool,
    pub status: EntryStatus,
    pub priority: EntryPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Residual open-ended metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Recurrence rule for a repeating series. Occurrences are computed,
    /// never materialized beyond this anchor row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    /// At most one workflow trigger per entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_trigger: Option<EntryTrigger>,
    /// At most one service trigger per entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_trigger: Option<EntryTrigger>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEntry {
    /// Duration of a single occurrence.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open interval overlap with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }

    /// Whether the entry has been soft-deleted.
    pub fn is_cancelled(&self) -> bool {
        self.status == EntryStatus::Cancelled
    }

    /// All triggers attached to this entry.
    pub fn triggers(&self) -> impl Iterator<Item = &EntryTrigger> {
        self.workflow_trigger.iter().chain(self.service_trigger.iter())
    }
}

/// Lifecycle status of an entry. `Cancelled` is terminal and doubles as the
/// soft-delete marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
    Completed,
}

/// Priority of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// ============================================================================
// Entry input and patch
// ============================================================================

/// Input for creating a new entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryInput {
    pub calendar_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    /// When omitted, the configured default entry duration applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<EntryPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_trigger: Option<EntryTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_trigger: Option<EntryTrigger>,
}

impl EntryInput {
    /// Minimal input for an entry on a calendar.
    pub fn new(
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            title: title.into(),
            description: None,
            location: None,
            start,
            end: None,
            timezone: None,
            all_day: false,
            status: None,
            priority: None,
            category: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
            recurrence: None,
            workflow_trigger: None,
            service_trigger: None,
        }
    }

    /// Set the end time.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Set the duration (calculates the end time).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.end = Some(self.start + duration);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Mark as an all-day entry.
    pub fn all_day_entry(mut self) -> Self {
        self.all_day = true;
        self
    }

    /// Set the recurrence rule.
    pub fn with_recurrence(mut self, recurrence: RecurrencePattern) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Attach a workflow trigger.
    pub fn with_workflow_trigger(mut self, trigger: EntryTrigger) -> Self {
        self.workflow_trigger = Some(trigger);
        self
    }

    /// Attach a service trigger.
    pub fn with_service_trigger(mut self, trigger: EntryTrigger) -> Self {
        self.service_trigger = Some(trigger);
        self
    }
}

/// Partial patch for updating an entry. Only supplied fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<EntryPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Upserts the recurrence child; no pre-existing rule is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    /// Clear any recurrence rule.
    #[serde(default)]
    pub clear_recurrence: bool,
    /// Upserts the workflow trigger child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_trigger: Option<EntryTrigger>,
    /// Upserts the service trigger child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_trigger: Option<EntryTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl EntryPatch {
    /// Apply this patch to an entry. Audit stamps are the caller's job.
    pub fn apply_to(&self, entry: &mut CalendarEntry) {
        if let Some(ref title) = self.title {
            entry.title = title.clone();
        }
        if let Some(ref description) = self.description {
            entry.description = Some(description.clone());
        }
        if let Some(ref location) = self.location {
            entry.location = Some(location.clone());
        }
        if let Some(start) = self.start {
            entry.start = start;
        }
        if let Some(end) = self.end {
            entry.end = end;
        }
        if let Some(all_day) = self.all_day {
            entry.all_day = all_day;
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(priority) = self.priority {
            entry.priority = priority;
        }
        if let Some(ref category) = self.category {
            entry.category = Some(category.clone());
        }
        if let Some(ref tags) = self.tags {
            entry.tags = tags.clone();
        }
        if let Some(ref recurrence) = self.recurrence {
            entry.recurrence = Some(recurrence.clone());
        }
        if self.clear_recurrence {
            entry.recurrence = None;
        }
        if let Some(ref trigger) = self.workflow_trigger {
            entry.workflow_trigger = Some(trigger.clone());
        }
        if let Some(ref trigger) = self.service_trigger {
            entry.service_trigger = Some(trigger.clone());
        }
        if let Some(ref metadata) = self.metadata {
            entry.metadata = metadata.clone();
        }
    }
}
