//! Availability computation over a set of calendar entries.
//!
//! Pure in-memory work: callers supply the already-recurrence-expanded entry
//! set for the window, and no I/O happens here.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEntry;
use crate::error::{CadenceError, Result};

/// A fixed-width time slot marked available or blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
    /// Entries whose `[start, end)` intersects this slot's `[start, end)`.
    pub conflicting_entry_ids: Vec<String>,
}

/// A merged run of consecutive available slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Partition `[window_start, window_end)` into fixed-width slots and mark
/// each one against the supplied entries.
///
/// A slot is unavailable iff at least one non-cancelled entry overlaps it
/// under half-open interval semantics (`entry.start < slot.end &&
/// entry.end > slot.start`). Slots are generated day by day; the final slot
/// of the window is clipped to `window_end`.
pub fn availability(
    entries: &[CalendarEntry],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    slot_granularity_minutes: u32,
) -> Result<Vec<AvailabilitySlot>> {
    if window_start > window_end {
        return Err(CadenceError::Validation(
            "window start must not be after window end".to_string(),
        ));
    }
    if slot_granularity_minutes == 0 {
        return Err(CadenceError::Validation(
            "slot granularity must be >= 1 minute".to_string(),
        ));
    }

    let slot_width = Duration::minutes(slot_granularity_minutes as i64);
    let active: Vec<&CalendarEntry> = entries.iter().filter(|e| !e.is_cancelled()).collect();

    let mut slots = Vec::new();
    let mut day_start = window_start;

    while day_start < window_end {
        let day_end = next_day_boundary(day_start).min(window_end);

        let mut slot_start = day_start;
        while slot_start < day_end {
            let slot_end = (slot_start + slot_width).min(day_end);

            let conflicting_entry_ids: Vec<String> = active
                .iter()
                .filter(|e| e.overlaps(slot_start, slot_end))
                .map(|e| e.id.clone())
                .collect();

            slots.push(AvailabilitySlot {
                start: slot_start,
                end: slot_end,
                available: conflicting_entry_ids.is_empty(),
                conflicting_entry_ids,
            });

            slot_start = slot_end;
        }

        day_start = day_end;
    }

    Ok(slots)
}

/// Merge consecutive available slots into free runs.
pub fn free_slots(slots: &[AvailabilitySlot]) -> Vec<FreeSlot> {
    let mut free = Vec::new();
    let mut run: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for slot in slots {
        if slot.available {
            run = match run {
                Some((start, end)) if end == slot.start => Some((start, slot.end)),
                Some(open) => {
                    push_free(&mut free, open);
                    Some((slot.start, slot.end))
                }
                None => Some((slot.start, slot.end)),
            };
        } else if let Some(open) = run.take() {
            push_free(&mut free, open);
        }
    }
    if let Some(open) = run {
        push_free(&mut free, open);
    }

    free
}

fn push_free(free: &mut Vec<FreeSlot>, (start, end): (DateTime<Utc>, DateTime<Utc>)) {
    free.push(FreeSlot {
        start,
        end,
        duration_minutes: (end - start).num_minutes(),
    });
}

fn next_day_boundary(at: DateTime<Utc>) -> DateTime<Utc> {
    let next = at.date_naive() + Duration::days(1);
    DateTime::from_naive_utc_and_offset(next.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{EntryPriority, EntryStatus};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn entry(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEntry {
        CalendarEntry {
            id: id.to_string(),
            calendar_id: "cal-1".to_string(),
            organizer_id: "user-1".to_string(),
            title: id.to_string(),
            description: None,
            location: None,
            start,
            end,
            timezone: "UTC".to_string(),
            all_day: false,
            status: EntryStatus::Confirmed,
            priority: EntryPriority::Normal,
            category: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
            recurrence: None,
            workflow_trigger: None,
            service_trigger: None,
            created_by: "user-1".to_string(),
            updated_by: "user-1".to_string(),
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_hour_slots_with_single_entry() {
        // One entry 09:00-10:00, window 09:00-11:00 at hour granularity:
        // first slot blocked, second free.
        let entries = vec![entry("e1", utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 10, 0))];
        let slots = availability(
            &entries,
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 11, 0),
            60,
        )
        .unwrap();

        assert_eq!(slots.len(), 2);
        assert!(!slots[0].available);
        assert_eq!(slots[0].conflicting_entry_ids, vec!["e1".to_string()]);
        assert!(slots[1].available);
        assert!(slots[1].conflicting_entry_ids.is_empty());
    }

    #[test]
    fn test_cancelled_entries_never_block() {
        let mut cancelled = entry("e1", utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 10, 0));
        cancelled.status = EntryStatus::Cancelled;

        let slots = availability(
            &[cancelled],
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 11, 0),
            60,
        )
        .unwrap();
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn test_adding_overlapping_entry_flips_slot() {
        let window = (utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 12, 0));
        let before = availability(&[], window.0, window.1, 60).unwrap();
        assert!(before.iter().all(|s| s.available));

        let entries = vec![entry("e2", utc(2024, 1, 1, 10, 30), utc(2024, 1, 1, 11, 30))];
        let after = availability(&entries, window.0, window.1, 60).unwrap();
        assert!(after[0].available);
        assert!(!after[1].available);
        assert!(!after[2].available);
        assert!(after[1].conflicting_entry_ids.contains(&"e2".to_string()));
    }

    #[test]
    fn test_touching_entry_does_not_conflict() {
        // Entry ends exactly when the slot starts: half-open, no overlap.
        let entries = vec![entry("e1", utc(2024, 1, 1, 8, 0), utc(2024, 1, 1, 9, 0))];
        let slots = availability(
            &entries,
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 10, 0),
            60,
        )
        .unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots[0].available);
    }

    #[test]
    fn test_slots_clip_to_day_and_window() {
        // Window crossing midnight: slot boundaries restart at the day edge.
        let slots = availability(&[], utc(2024, 1, 1, 23, 30), utc(2024, 1, 2, 0, 30), 60).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].end, utc(2024, 1, 2, 0, 0));
        assert_eq!(slots[1].start, utc(2024, 1, 2, 0, 0));
        assert_eq!(slots[1].end, utc(2024, 1, 2, 0, 30));
    }

    #[test]
    fn test_free_slot_merging() {
        let entries = vec![entry("e1", utc(2024, 1, 1, 10, 0), utc(2024, 1, 1, 11, 0))];
        let slots = availability(
            &entries,
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 13, 0),
            60,
        )
        .unwrap();

        let free = free_slots(&slots);
        assert_eq!(free.len(), 2);
        assert_eq!(free[0].start, utc(2024, 1, 1, 9, 0));
        assert_eq!(free[0].end, utc(2024, 1, 1, 10, 0));
        assert_eq!(free[1].start, utc(2024, 1, 1, 11, 0));
        assert_eq!(free[1].end, utc(2024, 1, 1, 13, 0));
        assert_eq!(free[1].duration_minutes, 120);
    }

    #[test]
    fn test_zero_granularity_rejected() {
        let result = availability(&[], utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 10, 0), 0);
        assert!(matches!(result, Err(CadenceError::Validation(_))));
    }
}
