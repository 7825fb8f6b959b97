//! Trigger and lifecycle-event types.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::calendar::CalendarEntry;

/// The lifecycle condition or time offset a trigger binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    OnCreate,
    OnUpdate,
    OnDelete,
    /// Fires when `now >= entry.start + offset_minutes`.
    TimeBased,
    ParticipantResponse,
}

impl TriggerKind {
    /// Whether a lifecycle event of the given kind makes this trigger due.
    pub fn matches_event(&self, event: LifecycleEventKind) -> bool {
        matches!(
            (self, event),
            (TriggerKind::OnCreate, LifecycleEventKind::Created)
                | (TriggerKind::OnUpdate, LifecycleEventKind::Updated)
                | (TriggerKind::OnDelete, LifecycleEventKind::Deleted)
                | (
                    TriggerKind::ParticipantResponse,
                    LifecycleEventKind::ParticipantResponse
                )
        )
    }
}

/// What a trigger invokes when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TriggerTarget {
    Workflow { workflow_id: String, version: u32 },
    Service { service_id: String, method: String },
}

/// Dispatch state of a trigger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    Idle,
    Due,
    Dispatched,
}

/// A declarative binding from an entry lifecycle event or time offset to an
/// external workflow or service invocation. Owned by its entry; never
/// queried by identity outside the entry context.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryTrigger {
    pub id: String,
    pub kind: TriggerKind,
    pub target: TriggerTarget,
    /// Minute offset relative to the entry start; only consulted for
    /// `time_based` triggers. Negative means before the start.
    #[serde(default)]
    pub offset_minutes: i64,
    /// Parameters forwarded to the target on dispatch.
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    /// Dispatch ledger stamp. A time-based trigger with this set is never
    /// re-dispatched by the periodic scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl EntryTrigger {
    /// Create a workflow trigger.
    pub fn workflow(kind: TriggerKind, workflow_id: impl Into<String>, version: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            target: TriggerTarget::Workflow {
                workflow_id: workflow_id.into(),
                version,
            },
            offset_minutes: 0,
            params: HashMap::new(),
            last_fired_at: None,
        }
    }

    /// Create a service trigger.
    pub fn service(
        kind: TriggerKind,
        service_id: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            target: TriggerTarget::Service {
                service_id: service_id.into(),
                method: method.into(),
            },
            offset_minutes: 0,
            params: HashMap::new(),
            last_fired_at: None,
        }
    }

    /// Set the minute offset relative to the entry start.
    pub fn with_offset_minutes(mut self, offset: i64) -> Self {
        self.offset_minutes = offset;
        self
    }

    /// Add a dispatch parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// The instant a time-based trigger comes due.
    pub fn due_at(&self, entry_start: DateTime<Utc>) -> DateTime<Utc> {
        entry_start + Duration::minutes(self.offset_minutes)
    }

    /// Current dispatch state relative to the entry and clock.
    pub fn state(&self, entry_start: DateTime<Utc>, now: DateTime<Utc>) -> TriggerState {
        if self.last_fired_at.is_some() {
            TriggerState::Dispatched
        } else if self.kind == TriggerKind::TimeBased && now >= self.due_at(entry_start) {
            TriggerState::Due
        } else {
            TriggerState::Idle
        }
    }
}

/// Kind of entry lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    Created,
    Updated,
    Deleted,
    ParticipantResponse,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::ParticipantResponse => "participant_response",
        }
    }
}

impl std::fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entry lifecycle transition handed to the trigger processor after the
/// originating operation has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    /// Snapshot of the entry as of the commit.
    pub entry: CalendarEntry,
    /// The user whose action caused the transition.
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleEventKind, entry: CalendarEntry, actor_id: impl Into<String>) -> Self {
        Self {
            kind,
            entry,
            actor_id: actor_id.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trigger_kind_event_matching() {
        assert!(TriggerKind::OnCreate.matches_event(LifecycleEventKind::Created));
        assert!(TriggerKind::ParticipantResponse
            .matches_event(LifecycleEventKind::ParticipantResponse));
        assert!(!TriggerKind::OnDelete.matches_event(LifecycleEventKind::Updated));
        assert!(!TriggerKind::TimeBased.matches_event(LifecycleEventKind::Created));
    }

    #[test]
    fn test_time_based_state_machine() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let trigger = EntryTrigger::workflow(TriggerKind::TimeBased, "wf-1", 1)
            .with_offset_minutes(-15);

        // 15 minutes before start
        assert_eq!(
            trigger.due_at(start),
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 45, 0).unwrap()
        );

        let before = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 9, 45, 0).unwrap();
        assert_eq!(trigger.state(start, before), TriggerState::Idle);
        assert_eq!(trigger.state(start, after), TriggerState::Due);

        let mut fired = trigger;
        fired.last_fired_at = Some(after);
        assert_eq!(fired.state(start, after), TriggerState::Dispatched);
    }
}
