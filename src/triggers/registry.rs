//! Trigger dispatch: lifecycle-event matching, the due-time scan, and the
//! background processor and scanner loops.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::calendar::CalendarEntry;
use crate::error::{CadenceError, Result};
use crate::external::{
    ExecutionContext, NotificationPayload, Notifier, ServiceInvoker, WorkflowExecutor,
};
use crate::store::CalendarStore;
use crate::triggers::{EntryTrigger, LifecycleEvent, TriggerKind, TriggerTarget};

/// Dispatches entry triggers to the workflow and service collaborators.
///
/// Lifecycle-event triggers fire once per event by construction. Time-based
/// triggers go through the `last_fired_at` ledger: the scan never dispatches
/// an instance whose stamp is set, and stamps only after a successful
/// dispatch. A dispatch that fails is retried on the next scan, so delivery
/// is at-least-once and downstream targets must tolerate duplicates.
pub struct TriggerRegistry<S: CalendarStore> {
    store: Arc<S>,
    workflows: Arc<dyn WorkflowExecutor>,
    services: Arc<dyn ServiceInvoker>,
    dispatch_timeout: Duration,
}

impl<S: CalendarStore> TriggerRegistry<S> {
    pub fn new(
        store: Arc<S>,
        workflows: Arc<dyn WorkflowExecutor>,
        services: Arc<dyn ServiceInvoker>,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            workflows,
            services,
            dispatch_timeout,
        }
    }

    /// Dispatch every trigger on the event's entry whose kind matches the
    /// lifecycle transition. Each dispatch is isolated; a failure is logged
    /// and never affects the other triggers or the caller.
    pub async fn handle_event(&self, event: &LifecycleEvent) {
        for trigger in event.entry.triggers() {
            if !trigger.kind.matches_event(event.kind) {
                continue;
            }
            if let Err(e) = self
                .dispatch(trigger, &event.entry, event.kind.as_str(), event.occurred_at)
                .await
            {
                warn!(
                    "Trigger {} dispatch failed for entry {} on {}: {}",
                    trigger.id, event.entry.id, event.kind, e
                );
            }
        }
    }

    /// One pass of the time-based scan. Returns how many triggers fired.
    ///
    /// A trigger is due when `now >= entry.start + offset_minutes` and its
    /// ledger stamp is unset. The stamp is written only after the dispatch
    /// succeeds, and no store lock is held across the dispatch itself.
    pub async fn scan_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let entries = self.store.entries_with_due_time_triggers(now).await?;
        let mut fired = 0;

        for entry in entries {
            for trigger in entry.triggers() {
                if trigger.kind != TriggerKind::TimeBased
                    || trigger.last_fired_at.is_some()
                    || now < trigger.due_at(entry.start)
                {
                    continue;
                }
                match self.dispatch(trigger, &entry, "time_based", now).await {
                    Ok(()) => {
                        // A failed ledger write must not halt the rest of the
                        // pass; the trigger stays due and is retried next
                        // scan, like a failed dispatch.
                        if let Err(e) = self
                            .store
                            .mark_trigger_fired(&entry.id, &trigger.id, now)
                            .await
                        {
                            warn!(
                                "Ledger write failed for trigger {} on entry {}: {}",
                                trigger.id, entry.id, e
                            );
                            continue;
                        }
                        debug!("Fired time trigger {} for entry {}", trigger.id, entry.id);
                        fired += 1;
                    }
                    Err(e) => {
                        warn!(
                            "Time trigger {} dispatch failed for entry {}: {}",
                            trigger.id, entry.id, e
                        );
                    }
                }
            }
        }
        Ok(fired)
    }

    async fn dispatch(
        &self,
        trigger: &EntryTrigger,
        entry: &CalendarEntry,
        event: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        let ctx = ExecutionContext {
            entry_id: entry.id.clone(),
            calendar_id: entry.calendar_id.clone(),
            entry_title: entry.title.clone(),
            entry_start: entry.start,
            event: event.to_string(),
            occurred_at,
            params: trigger.params.clone(),
        };

        let call = async {
            match &trigger.target {
                TriggerTarget::Workflow {
                    workflow_id,
                    version,
                } => self.workflows.execute(workflow_id, *version, ctx).await,
                TriggerTarget::Service { service_id, method } => {
                    self.services.invoke(service_id, method, ctx).await
                }
            }
        };

        tokio::time::timeout(self.dispatch_timeout, call)
            .await
            .map_err(|_| {
                CadenceError::Dispatch(format!(
                    "trigger {} timed out after {:?}",
                    trigger.id, self.dispatch_timeout
                ))
            })?
    }
}

/// Background task draining the lifecycle-event channel.
///
/// For every event it runs the matching triggers and fans a notification out
/// to the entry's organizer and participants, deduplicated. Notification
/// failures are logged per recipient and never stop the loop.
pub async fn run_trigger_processor<S: CalendarStore>(
    registry: Arc<TriggerRegistry<S>>,
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
) {
    info!("Trigger processor started");

    while let Some(event) = rx.recv().await {
        registry.handle_event(&event).await;

        let mut recipients = vec![event.entry.organizer_id.clone()];
        match registry.store.get_participants(&event.entry.id).await {
            Ok(participants) => {
                for p in participants {
                    if !recipients.contains(&p.user_id) {
                        recipients.push(p.user_id);
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Participant lookup failed for entry {} on {}: {}",
                    event.entry.id, event.kind, e
                );
            }
        }

        let payload = NotificationPayload {
            event: event.kind.as_str().to_string(),
            entry_id: event.entry.id.clone(),
            entry_title: event.entry.title.clone(),
            entry_start: event.entry.start,
            actor_id: event.actor_id.clone(),
        };
        for user_id in recipients {
            if let Err(e) = notifier.notify(&user_id, payload.clone()).await {
                warn!(
                    "Notification to {} failed for entry {} on {}: {}",
                    user_id, event.entry.id, event.kind, e
                );
            }
        }
    }

    info!("Trigger processor stopped");
}

/// Background task running the due-time scan on a fixed interval.
pub async fn run_trigger_scanner<S: CalendarStore>(
    registry: Arc<TriggerRegistry<S>>,
    poll_interval: Duration,
) {
    info!("Trigger scanner started (every {:?})", poll_interval);
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        match registry.scan_due(Utc::now()).await {
            Ok(0) => {}
            Ok(fired) => debug!("Trigger scan fired {} trigger(s)", fired),
            Err(e) => warn!("Trigger scan failed: {}", e),
        }
    }
}
