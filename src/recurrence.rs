//! Recurrence rule expansion.
//!
//! Expansion is a pure function over a [`RecurrencePattern`] and an anchor
//! interval: no cursor state is kept between calls, and unbounded patterns
//! always terminate by clipping to the query window.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, Result};

/// Hard cap on expansion steps, so a pathological rule cannot spin.
const MAX_EXPANSION_STEPS: usize = 10_000;

/// Frequency unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A rule describing how a base entry repeats.
///
/// The rule generates occurrence start instants from an anchor; occurrences
/// are computed on demand and never materialized. `count` bounds the number
/// of realized occurrences counted from the anchor (a month skipped for a
/// missing day-of-month does not consume a slot; a date listed in
/// `exceptions` does).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    /// Every N frequency units. Must be >= 1.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Days of week for weekly rules (0 = Monday .. 6 = Sunday).
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    /// Day of month for monthly rules; defaults to the anchor's day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    /// End condition: no occurrence starts after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    /// End condition: at most this many occurrences from the anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Occurrence start instants to suppress (single-occurrence deletions).
    #[serde(default)]
    pub exceptions: Vec<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrencePattern {
    fn with_frequency(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: Vec::new(),
            day_of_month: None,
            until: None,
            count: None,
            exceptions: Vec::new(),
        }
    }

    /// Create a daily rule.
    pub fn daily() -> Self {
        Self::with_frequency(Frequency::Daily)
    }

    /// Create a weekly rule.
    pub fn weekly() -> Self {
        Self::with_frequency(Frequency::Weekly)
    }

    /// Create a weekly rule on specific days (0 = Monday .. 6 = Sunday).
    pub fn weekly_on(days: impl IntoIterator<Item = u8>) -> Self {
        let mut rule = Self::with_frequency(Frequency::Weekly);
        rule.days_of_week = days.into_iter().collect();
        rule.days_of_week.sort_unstable();
        rule.days_of_week.dedup();
        rule
    }

    /// Create a monthly rule.
    pub fn monthly() -> Self {
        Self::with_frequency(Frequency::Monthly)
    }

    /// Create a yearly rule.
    pub fn yearly() -> Self {
        Self::with_frequency(Frequency::Yearly)
    }

    /// Set the interval.
    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Set the until end condition.
    pub fn until(mut self, date: DateTime<Utc>) -> Self {
        self.until = Some(date);
        self
    }

    /// Set the count end condition.
    pub fn times(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Suppress a single occurrence.
    pub fn except(mut self, date: DateTime<Utc>) -> Self {
        self.exceptions.push(date);
        self
    }

    /// Check the rule's fields are in range.
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(CadenceError::Validation(
                "recurrence interval must be >= 1".to_string(),
            ));
        }
        if let Some(day) = self.days_of_week.iter().find(|&&d| d > 6) {
            return Err(CadenceError::Validation(format!(
                "day of week {day} out of range (0-6)"
            )));
        }
        if let Some(day) = self.day_of_month {
            if day == 0 || day > 31 {
                return Err(CadenceError::Validation(format!(
                    "day of month {day} out of range (1-31)"
                )));
            }
        }
        Ok(())
    }
}

/// A single expanded occurrence of a recurring series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Expand a recurrence rule over a query window.
///
/// Returns the ordered occurrence starts intersecting
/// `[window_start, window_end]` (inclusive on both bounds), each paired with
/// an end derived from the anchor's duration. The anchor itself is the first
/// occurrence of the series.
///
/// Expansion walks at most 10,000 occurrences; a window wide enough to
/// exceed that is a `Validation` error, never a silently truncated sequence.
pub fn expand(
    pattern: &RecurrencePattern,
    anchor_start: DateTime<Utc>,
    anchor_end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<Occurrence>> {
    pattern.validate()?;
    if window_start > window_end {
        return Err(CadenceError::Validation(
            "window start must not be after window end".to_string(),
        ));
    }
    if anchor_end < anchor_start {
        return Err(CadenceError::Validation(
            "anchor end must not be before anchor start".to_string(),
        ));
    }

    let duration = anchor_end - anchor_start;
    let mut occurrences = Vec::new();
    let mut current = anchor_start;
    let mut produced: u32 = 0;
    let mut steps = 0;

    loop {
        if steps >= MAX_EXPANSION_STEPS {
            return Err(CadenceError::Validation(format!(
                "recurrence expansion exceeded {MAX_EXPANSION_STEPS} occurrences; \
                 narrow the window or bound the rule"
            )));
        }
        steps += 1;

        if let Some(count) = pattern.count {
            if produced >= count {
                break;
            }
        }
        if let Some(until) = pattern.until {
            if current > until {
                break;
            }
        }
        if current > window_end {
            break;
        }

        produced += 1;
        if current >= window_start && !pattern.exceptions.contains(&current) {
            occurrences.push(Occurrence {
                start: current,
                end: current + duration,
            });
        }

        match next_occurrence(current, anchor_start, pattern) {
            Some(next) if next > current => current = next,
            _ => break,
        }
    }

    Ok(occurrences)
}

/// The series occurrence following `current`, or `None` when no later month
/// or year can host the rule's day.
fn next_occurrence(
    current: DateTime<Utc>,
    anchor_start: DateTime<Utc>,
    pattern: &RecurrencePattern,
) -> Option<DateTime<Utc>> {
    let interval = pattern.interval as i64;

    match pattern.frequency {
        Frequency::Daily => Some(current + Duration::days(interval)),
        Frequency::Weekly => {
            if pattern.days_of_week.is_empty() {
                return Some(current + Duration::weeks(interval));
            }
            let current_dow = current.weekday().num_days_from_monday() as u8;
            // Later day within the same active week, otherwise the first
            // selected day of the next active week.
            match pattern.days_of_week.iter().find(|&&d| d > current_dow) {
                Some(&d) => Some(current + Duration::days((d - current_dow) as i64)),
                None => {
                    let first = *pattern.days_of_week.first()? as i64;
                    let days_ahead = 7 * interval - current_dow as i64 + first;
                    Some(current + Duration::days(days_ahead))
                }
            }
        }
        Frequency::Monthly => {
            // A month without the target day is skipped, never shifted to
            // its last day.
            let target_day = pattern.day_of_month.unwrap_or(anchor_start.day());
            let mut year = current.year();
            let mut month0 = current.month0() as i64;
            for _ in 0..48 {
                month0 += interval;
                year += (month0 / 12) as i32;
                month0 %= 12;
                if let Some(date) = NaiveDate::from_ymd_opt(year, month0 as u32 + 1, target_day) {
                    return at_time_of(date, current);
                }
            }
            None
        }
        Frequency::Yearly => {
            // Feb 29 anchors skip non-leap years.
            let mut year = current.year();
            for _ in 0..16 {
                year += pattern.interval as i32;
                if let Some(date) =
                    NaiveDate::from_ymd_opt(year, anchor_start.month(), anchor_start.day())
                {
                    return at_time_of(date, current);
                }
            }
            None
        }
    }
}

fn at_time_of(date: NaiveDate, time_source: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = date.and_hms_opt(
        time_source.hour(),
        time_source.minute(),
        time_source.second(),
    )?;
    Some(DateTime::from_naive_utc_and_offset(time, Utc))
}
