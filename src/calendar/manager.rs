//! Calendar CRUD and sharing.

use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::access::{evaluate, CalendarAction};
use crate::calendar::{Calendar, CalendarVisibility, WorkingHours};
use crate::config::CalendarConfig;
use crate::error::{CadenceError, Result};
use crate::store::CalendarStore;

/// Input for creating a calendar. Unset fields fall back to the configured
/// calendar defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalendarInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub visibility: CalendarVisibility,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl CalendarInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: None,
            visibility: CalendarVisibility::default(),
            timezone: None,
            working_hours: None,
            organization_id: None,
            is_default: false,
        }
    }
}

/// Partial update for a calendar. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CalendarPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

/// Manager for calendar records. Mutation is admin-gated (in practice the
/// owner, per the visibility table); reads go through the same table.
pub struct CalendarManager<S: CalendarStore> {
    store: Arc<S>,
    config: CalendarConfig,
}

impl<S: CalendarStore> CalendarManager<S> {
    pub fn new(store: Arc<S>, config: CalendarConfig) -> Self {
        Self { store, config }
    }

    /// Create a calendar for `owner_id`, applying configured defaults for
    /// the time zone and working hours.
    pub async fn create(&self, input: CalendarInput, owner_id: &str) -> Result<Calendar> {
        if input.name.trim().is_empty() {
            return Err(CadenceError::Validation(
                "calendar name must not be empty".to_string(),
            ));
        }

        let mut calendar = Calendar::new(owner_id, input.name)
            .with_visibility(input.visibility)
            .with_timezone(
                input
                    .timezone
                    .unwrap_or_else(|| self.config.default_timezone.clone()),
            );
        calendar.description = input.description;
        calendar.color = input.color;
        calendar.organization_id = input.organization_id;
        calendar.is_default = input.is_default;
        calendar.working_hours = input.working_hours.unwrap_or(WorkingHours {
            start_hour: self.config.working_hours.start_hour,
            end_hour: self.config.working_hours.end_hour,
            include_weekends: self.config.working_hours.include_weekends,
        });

        let calendar = self.store.create_calendar(calendar).await?;
        info!("Created calendar: {} ({})", calendar.name, calendar.id);
        Ok(calendar)
    }

    /// Fetch a calendar, enforcing read visibility.
    pub async fn get(&self, calendar_id: &str, user_id: &str) -> Result<Calendar> {
        let calendar = self.load(calendar_id).await?;
        if !evaluate(&calendar, user_id, CalendarAction::Read) {
            return Err(CadenceError::PermissionDenied(format!(
                "user {user_id} may not read calendar {calendar_id}"
            )));
        }
        Ok(calendar)
    }

    /// Apply a partial update. Requires `admin` standing.
    pub async fn update(
        &self,
        calendar_id: &str,
        patch: CalendarPatch,
        user_id: &str,
    ) -> Result<Calendar> {
        let mut calendar = self.authorize_admin(calendar_id, user_id).await?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CadenceError::Validation(
                    "calendar name must not be empty".to_string(),
                ));
            }
            calendar.name = name;
        }
        if let Some(description) = patch.description {
            calendar.description = Some(description);
        }
        if let Some(color) = patch.color {
            calendar.color = Some(color);
        }
        if let Some(timezone) = patch.timezone {
            calendar.timezone = timezone;
        }
        if let Some(working_hours) = patch.working_hours {
            calendar.working_hours = working_hours;
        }
        if let Some(is_default) = patch.is_default {
            calendar.is_default = is_default;
        }
        calendar.updated_at = Utc::now();

        self.store.update_calendar(calendar.clone()).await?;
        debug!("Updated calendar: {}", calendar_id);
        Ok(calendar)
    }

    /// Change visibility and replace the user allow-list. Requires `admin`
    /// standing.
    pub async fn share(
        &self,
        calendar_id: &str,
        visibility: CalendarVisibility,
        allowed_user_ids: Vec<String>,
        user_id: &str,
    ) -> Result<Calendar> {
        let mut calendar = self.authorize_admin(calendar_id, user_id).await?;

        calendar.visibility = visibility;
        calendar.allowed_user_ids = allowed_user_ids;
        calendar.updated_at = Utc::now();

        self.store.update_calendar(calendar.clone()).await?;
        info!(
            "Shared calendar {} as {:?} with {} user(s)",
            calendar_id,
            visibility,
            calendar.allowed_user_ids.len()
        );
        Ok(calendar)
    }

    /// Soft-delete a calendar. The record stays readable so historical
    /// entries keep a valid reference. Requires `admin` standing.
    pub async fn deactivate(&self, calendar_id: &str, user_id: &str) -> Result<()> {
        self.authorize_admin(calendar_id, user_id).await?;
        self.store.deactivate_calendar(calendar_id).await?;
        info!("Deactivated calendar: {}", calendar_id);
        Ok(())
    }

    /// List the owner's calendars, active ones only.
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Calendar>> {
        let calendars = self.store.list_calendars_for_owner(owner_id).await?;
        Ok(calendars.into_iter().filter(|c| c.active).collect())
    }

    async fn load(&self, calendar_id: &str) -> Result<Calendar> {
        self.store
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| CadenceError::calendar_not_found(calendar_id))
    }

    async fn authorize_admin(&self, calendar_id: &str, user_id: &str) -> Result<Calendar> {
        let calendar = self.load(calendar_id).await?;
        if !evaluate(&calendar, user_id, CalendarAction::Admin) {
            return Err(CadenceError::PermissionDenied(format!(
                "user {user_id} may not administer calendar {calendar_id}"
            )));
        }
        Ok(calendar)
    }
}
