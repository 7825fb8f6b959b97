//! Participant invitation and RSVP management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{CadenceError, Result};
use crate::store::CalendarStore;
use crate::triggers::{LifecycleEvent, LifecycleEventKind};

/// Role of a participant on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Organizer,
    #[default]
    Required,
    Optional,
    /// A bookable resource (room, equipment) rather than a person.
    Resource,
}

/// RSVP state. `pending` transitions to any of the other three; responses
/// are re-entrant and a user may change their answer at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Tentative,
}

/// Join row between an entry and a user. At most one row exists per
/// (entry, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Participant {
    pub entry_id: String,
    pub user_id: String,
    pub role: ParticipantRole,
    pub rsvp: RsvpStatus,
    pub invited_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Participant {
    /// A fresh pending invitation.
    pub fn invited(
        entry_id: impl Into<String>,
        user_id: impl Into<String>,
        role: ParticipantRole,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            user_id: user_id.into(),
            role,
            rsvp: RsvpStatus::Pending,
            invited_at: Utc::now(),
            responded_at: None,
            notes: None,
        }
    }
}

/// A single invitation in an `invite` call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InviteInput {
    pub user_id: String,
    #[serde(default)]
    pub role: ParticipantRole,
}

/// Manager for participant membership and RSVP state.
pub struct ParticipantManager<S: CalendarStore> {
    store: Arc<S>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl<S: CalendarStore> ParticipantManager<S> {
    pub fn new(store: Arc<S>, events_tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { store, events_tx }
    }

    /// Invite users to an entry. Organizer-only; idempotent per user
    /// (re-inviting an existing participant updates the role instead of
    /// duplicating the row).
    pub async fn invite(
        &self,
        entry_id: &str,
        invites: Vec<InviteInput>,
        organizer_id: &str,
    ) -> Result<Vec<Participant>> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;
        if entry.organizer_id != organizer_id {
            return Err(CadenceError::PermissionDenied(format!(
                "only the organizer may invite participants to entry {entry_id}"
            )));
        }

        let mut rows = Vec::with_capacity(invites.len());
        for invite in invites {
            let row = match self.store.get_participant(entry_id, &invite.user_id).await? {
                Some(mut existing) => {
                    existing.role = invite.role;
                    existing
                }
                None => Participant::invited(entry_id, &invite.user_id, invite.role),
            };
            self.store.upsert_participant(row.clone()).await?;
            debug!("Invited {} to entry {}", row.user_id, entry_id);
            rows.push(row);
        }
        Ok(rows)
    }

    /// Record a user's RSVP. Re-entrant: every call updates `responded_at`
    /// and, when supplied, the notes.
    pub async fn respond(
        &self,
        entry_id: &str,
        user_id: &str,
        rsvp: RsvpStatus,
        notes: Option<String>,
    ) -> Result<Participant> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;

        let mut participant = self
            .store
            .get_participant(entry_id, user_id)
            .await?
            .ok_or_else(|| CadenceError::participant_not_found(entry_id, user_id))?;

        participant.rsvp = rsvp;
        participant.responded_at = Some(Utc::now());
        if notes.is_some() {
            participant.notes = notes;
        }
        self.store.upsert_participant(participant.clone()).await?;
        debug!("Participant {} responded {:?} on entry {}", user_id, rsvp, entry_id);

        self.emit(LifecycleEvent::new(
            LifecycleEventKind::ParticipantResponse,
            entry,
            user_id,
        ));
        Ok(participant)
    }

    /// Remove a participant. Organizer-only.
    pub async fn remove(&self, entry_id: &str, user_id: &str, organizer_id: &str) -> Result<()> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| CadenceError::entry_not_found(entry_id))?;
        if entry.organizer_id != organizer_id {
            return Err(CadenceError::PermissionDenied(format!(
                "only the organizer may remove participants from entry {entry_id}"
            )));
        }

        let removed = self.store.remove_participant(entry_id, user_id).await?;
        if !removed {
            return Err(CadenceError::participant_not_found(entry_id, user_id));
        }
        debug!("Removed participant {} from entry {}", user_id, entry_id);
        Ok(())
    }

    /// List participants of an entry.
    pub async fn list(&self, entry_id: &str) -> Result<Vec<Participant>> {
        self.store.get_participants(entry_id).await
    }

    fn emit(&self, event: LifecycleEvent) {
        if self.events_tx.send(event).is_err() {
            warn!("Lifecycle event channel closed; trigger fan-out skipped");
        }
    }
}
