//! Recurrence expansion feeding availability over stored entries.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tokio::sync::mpsc;

use cadence::{
    availability, expand, free_slots, CalendarStore, EngineDefaults, EntryInput,
    EntryLifecycleManager,
    EntryQuery, MemoryCalendarStore, RecurrencePattern,
};

#[tokio::test]
async fn test_expand_stored_series_and_compute_availability() {
    let store = Arc::new(MemoryCalendarStore::new());
    let (tx, _rx) = mpsc::unbounded_channel();
    let lifecycle = EntryLifecycleManager::new(store.clone(), EngineDefaults::default(), tx);

    // Weekly standup, Mondays 09:00-09:30, anchored on Mon 2024-01-01
    let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let series = lifecycle
        .create(
            EntryInput::new("cal-1", "Standup", anchor)
                .with_duration(Duration::minutes(30))
                .with_recurrence(RecurrencePattern::weekly_on([0])),
            "alice",
        )
        .await
        .unwrap();

    // One-off meeting on Mon Jan 8, 10:00-11:00
    lifecycle
        .create(
            EntryInput::new(
                "cal-1",
                "Planning",
                Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap(),
            )
            .with_duration(Duration::hours(1)),
            "alice",
        )
        .await
        .unwrap();

    let entries = store
        .find_entries(&EntryQuery::for_calendar("cal-1"))
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);

    // Expand the series over three weeks
    let rule = entries
        .iter()
        .find(|e| e.id == series.id)
        .and_then(|e| e.recurrence.as_ref())
        .unwrap();
    let occurrences = expand(
        rule,
        series.start,
        series.end,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 21, 23, 59, 0).unwrap(),
    )
    .unwrap();
    assert_eq!(occurrences.len(), 3);
    assert_eq!(
        occurrences[1].start,
        Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap()
    );

    // Materialize the Jan 8 occurrence alongside the one-off and ask for the
    // morning's availability in hour slots
    let mut materialized = entries.clone();
    let mut occurrence_row = entries
        .iter()
        .find(|e| e.id == series.id)
        .cloned()
        .unwrap();
    occurrence_row.id = format!("{}@2024-01-08", series.id);
    occurrence_row.start = occurrences[1].start;
    occurrence_row.end = occurrences[1].end;
    materialized.push(occurrence_row);

    let window_start = Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap();
    let window_end = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
    let slots = availability(&materialized, window_start, window_end, 60).unwrap();

    assert_eq!(slots.len(), 4);
    assert!(slots[0].available); // 08:00 free
    assert!(!slots[1].available); // 09:00 blocked by the standup occurrence
    assert!(!slots[2].available); // 10:00 blocked by planning
    assert!(slots[3].available); // 11:00 free

    let free = free_slots(&slots);
    assert_eq!(free.len(), 2);
    assert_eq!(free[0].duration_minutes, 60);
}
