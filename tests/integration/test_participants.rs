//! Invitation and RSVP flow across the whole engine.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use tokio::sync::mpsc;

use cadence::{
    run_trigger_processor, CalendarStore, EngineDefaults, EntryInput, EntryLifecycleManager,
    EntryTrigger,
    InviteInput, MemoryCalendarStore, Notifier, ParticipantManager, ParticipantRole,
    RecordingNotifier, RecordingServiceInvoker, RecordingWorkflowExecutor, RsvpStatus,
    TriggerKind, TriggerRegistry,
};

#[tokio::test]
async fn test_rsvp_flow_fires_trigger_and_notifies_everyone() {
    let store = Arc::new(MemoryCalendarStore::new());
    let workflows = Arc::new(RecordingWorkflowExecutor::new());
    let services = Arc::new(RecordingServiceInvoker::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let registry = Arc::new(TriggerRegistry::new(
        store.clone(),
        workflows.clone(),
        services.clone(),
        StdDuration::from_secs(30),
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let processor = tokio::spawn(run_trigger_processor(
        registry,
        notifier.clone() as Arc<dyn Notifier>,
        rx,
    ));

    let lifecycle = EntryLifecycleManager::new(store.clone(), EngineDefaults::default(), tx.clone());
    let participants = ParticipantManager::new(store.clone(), tx.clone());

    let start = Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap();
    let entry = lifecycle
        .create(
            EntryInput::new("cal-1", "Offsite", start)
                .with_duration(Duration::hours(3))
                .with_workflow_trigger(EntryTrigger::workflow(
                    TriggerKind::ParticipantResponse,
                    "wf-headcount",
                    1,
                )),
            "alice",
        )
        .await
        .unwrap();

    participants
        .invite(
            &entry.id,
            vec![
                InviteInput {
                    user_id: "bob".to_string(),
                    role: ParticipantRole::Required,
                },
                InviteInput {
                    user_id: "carol".to_string(),
                    role: ParticipantRole::Optional,
                },
            ],
            "alice",
        )
        .await
        .unwrap();

    participants
        .respond(&entry.id, "bob", RsvpStatus::Accepted, None)
        .await
        .unwrap();
    participants
        .respond(&entry.id, "carol", RsvpStatus::Declined, Some("conflict".into()))
        .await
        .unwrap();

    drop(lifecycle);
    drop(participants);
    drop(tx);
    processor.await.unwrap();

    // One dispatch per response event
    let calls = workflows.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.0 == "wf-headcount"));
    assert!(calls.iter().all(|c| c.2.event == "participant_response"));

    // Each of the three events (create + two responses) fanned out to the
    // organizer and, once invited, both participants
    let recipients = notifier.recipients();
    assert_eq!(recipients.iter().filter(|r| *r == "alice").count(), 3);
    assert_eq!(recipients.iter().filter(|r| *r == "bob").count(), 2);
    assert_eq!(recipients.iter().filter(|r| *r == "carol").count(), 2);

    let rows = store.get_participants(&entry.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    let bob = rows.iter().find(|p| p.user_id == "bob").unwrap();
    assert_eq!(bob.rsvp, RsvpStatus::Accepted);
    assert!(bob.responded_at.is_some());
}
