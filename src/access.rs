//! Calendar-level authorization.
//!
//! Visibility policy only. Whether a user actually belongs to the sharing
//! organization or application is the identity collaborator's problem; by the
//! time a user id reaches this resolver it is assumed authenticated, and the
//! allow-lists on the calendar are the whole story here.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{Calendar, CalendarVisibility};
use crate::error::{CadenceError, Result};
use crate::store::CalendarStore;

/// Action a user attempts against a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CalendarAction {
    Read,
    Write,
    Admin,
}

/// Evaluate the visibility decision table for one calendar.
///
/// The owner passes every action. Beyond that: `private` admits nobody;
/// `shared`, `application`, and `organization` admit users on the allow-lists
/// for any action; `public` admits anyone for `read` only.
pub fn evaluate(calendar: &Calendar, user_id: &str, action: CalendarAction) -> bool {
    if calendar.owner_id == user_id {
        return true;
    }
    match calendar.visibility {
        CalendarVisibility::Private => false,
        // Team allow-lists are expanded to user ids by the identity
        // collaborator before the check reaches this table.
        CalendarVisibility::Shared
        | CalendarVisibility::Application
        | CalendarVisibility::Organization => {
            calendar.allowed_user_ids.iter().any(|u| u == user_id)
        }
        CalendarVisibility::Public => action == CalendarAction::Read,
    }
}

/// Store-backed resolver answering "may this user do this to this calendar".
pub struct CalendarAccessResolver<S: CalendarStore> {
    store: Arc<S>,
}

impl<S: CalendarStore> CalendarAccessResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load the calendar and run the decision table. Unknown calendars are a
    /// `NotFound` error rather than a silent deny.
    pub async fn check_access(
        &self,
        calendar_id: &str,
        user_id: &str,
        action: CalendarAction,
    ) -> Result<bool> {
        let calendar = self
            .store
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| CadenceError::calendar_not_found(calendar_id))?;

        let allowed = evaluate(&calendar, user_id, action);
        debug!(
            "Access check: user={} calendar={} action={:?} -> {}",
            user_id, calendar_id, action, allowed
        );
        Ok(allowed)
    }
}
