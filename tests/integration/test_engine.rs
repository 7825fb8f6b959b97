//! End-to-end lifecycle and trigger dispatch tests.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use tokio::sync::mpsc;

use cadence::{
    run_trigger_processor, CalendarInput, CalendarManager, CalendarStore, Config, EntryInput,
    EntryLifecycleManager, EntryPatch, EntryStatus, EntryTrigger, MemoryCalendarStore, Notifier,
    RecordingNotifier, RecordingServiceInvoker, RecordingWorkflowExecutor, TriggerKind,
    TriggerRegistry,
};

struct Engine {
    store: Arc<MemoryCalendarStore>,
    calendars: CalendarManager<MemoryCalendarStore>,
    lifecycle: EntryLifecycleManager<MemoryCalendarStore>,
    workflows: Arc<RecordingWorkflowExecutor>,
    services: Arc<RecordingServiceInvoker>,
    notifier: Arc<RecordingNotifier>,
    registry: Arc<TriggerRegistry<MemoryCalendarStore>>,
    events_tx: mpsc::UnboundedSender<cadence::LifecycleEvent>,
    processor: tokio::task::JoinHandle<()>,
}

fn engine() -> Engine {
    let config = Config::default();
    let store = Arc::new(MemoryCalendarStore::new());
    let workflows = Arc::new(RecordingWorkflowExecutor::new());
    let services = Arc::new(RecordingServiceInvoker::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let registry = Arc::new(TriggerRegistry::new(
        store.clone(),
        workflows.clone(),
        services.clone(),
        config.scheduler.dispatch_timeout(),
    ));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let processor = tokio::spawn(run_trigger_processor(
        registry.clone(),
        notifier.clone() as Arc<dyn Notifier>,
        events_rx,
    ));

    Engine {
        calendars: CalendarManager::new(store.clone(), config.calendar.clone()),
        lifecycle: EntryLifecycleManager::new(
            store.clone(),
            config.defaults.clone(),
            events_tx.clone(),
        ),
        store,
        workflows,
        services,
        notifier,
        registry,
        events_tx,
        processor,
    }
}

impl Engine {
    /// Close the event channel and wait for the processor to drain it.
    async fn drain(self) {
        drop(self.lifecycle);
        drop(self.events_tx);
        self.processor.await.unwrap();
    }
}

#[tokio::test]
async fn test_create_dispatches_on_create_trigger_and_notifies() {
    let e = engine();
    let calendar = e
        .calendars
        .create(CalendarInput::new("Work"), "alice")
        .await
        .unwrap();

    let start = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    let entry = e
        .lifecycle
        .create(
            EntryInput::new(&calendar.id, "Kickoff", start)
                .with_duration(Duration::hours(1))
                .with_workflow_trigger(EntryTrigger::workflow(TriggerKind::OnCreate, "wf-1", 3)),
            "alice",
        )
        .await
        .unwrap();

    let workflows = e.workflows.clone();
    let notifier = e.notifier.clone();
    e.drain().await;

    let calls = workflows.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "wf-1");
    assert_eq!(calls[0].1, 3);
    assert_eq!(calls[0].2.entry_id, entry.id);
    assert_eq!(calls[0].2.event, "created");

    // The organizer is the only involved user
    assert_eq!(notifier.recipients(), vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_update_and_delete_drive_matching_triggers() {
    let e = engine();
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    let entry = e
        .lifecycle
        .create(
            EntryInput::new("cal-1", "Review", start)
                .with_duration(Duration::hours(1))
                .with_service_trigger(EntryTrigger::service(
                    TriggerKind::OnDelete,
                    "svc-audit",
                    "record",
                )),
            "alice",
        )
        .await
        .unwrap();

    let patch = EntryPatch {
        title: Some("Review (moved)".to_string()),
        ..Default::default()
    };
    e.lifecycle.update(&entry.id, patch, "alice").await.unwrap();
    e.lifecycle.delete(&entry.id, "alice").await.unwrap();

    let store = e.store.clone();
    let services = e.services.clone();
    let notifier = e.notifier.clone();
    e.drain().await;

    // Only the delete matched the service trigger
    let calls = services.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "svc-audit");
    assert_eq!(calls[0].2.event, "deleted");

    // Create, update, delete each notified the organizer
    assert_eq!(notifier.sent_count(), 3);

    // The cancelled entry is still readable by id
    let row = store.get_entry(&entry.id).await.unwrap().unwrap();
    assert_eq!(row.status, EntryStatus::Cancelled);
}

#[tokio::test]
async fn test_scan_ledger_fires_once_across_restarts() {
    let e = engine();
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    let entry = e
        .lifecycle
        .create(
            EntryInput::new("cal-1", "Reminder target", start)
                .with_duration(Duration::minutes(30))
                .with_workflow_trigger(
                    EntryTrigger::workflow(TriggerKind::TimeBased, "wf-remind", 1)
                        .with_offset_minutes(-30),
                ),
            "alice",
        )
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 45, 0).unwrap();
    assert_eq!(e.registry.scan_due(now).await.unwrap(), 1);

    // A second registry over the same store sees the persisted ledger stamp
    let registry2 = TriggerRegistry::new(
        e.store.clone(),
        e.workflows.clone(),
        e.services.clone(),
        StdDuration::from_secs(30),
    );
    assert_eq!(registry2.scan_due(now).await.unwrap(), 0);
    assert_eq!(e.workflows.call_count(), 1);

    let row = e.store.get_entry(&entry.id).await.unwrap().unwrap();
    assert_eq!(row.workflow_trigger.unwrap().last_fired_at, Some(now));
}

#[tokio::test]
async fn test_duplicate_copies_triggers_with_fresh_ledger() {
    let e = engine();
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    let entry = e
        .lifecycle
        .create(
            EntryInput::new("cal-1", "Workshop", start)
                .with_duration(Duration::hours(2))
                .with_workflow_trigger(
                    EntryTrigger::workflow(TriggerKind::TimeBased, "wf-remind", 1)
                        .with_offset_minutes(-15),
                ),
            "alice",
        )
        .await
        .unwrap();

    // Fire the original's trigger
    let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 50, 0).unwrap();
    assert_eq!(e.registry.scan_due(now).await.unwrap(), 1);

    let copy = e
        .lifecycle
        .duplicate(&entry.id, EntryPatch::default(), "alice")
        .await
        .unwrap();
    assert_eq!(copy.start, entry.start + Duration::hours(24));

    // The copy's trigger is due the day after and fires independently
    let next_day = now + Duration::hours(24);
    assert_eq!(e.registry.scan_due(next_day).await.unwrap(), 1);
    assert_eq!(e.workflows.call_count(), 2);
}
