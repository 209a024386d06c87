// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup plan schedules.
//!
//! A `Plan` schedule is either a 5-field cron expression evaluated in UTC or a
//! fixed interval such as `30m` or `6h`. Interval slots are anchored at the
//! plan's creation time; cron slots are absolute.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use cozystack_operator::backup_crd::ScheduleType;
//! use cozystack_operator::schedule::{job_name, Schedule};
//!
//! let schedule = Schedule::parse(ScheduleType::Cron, "0 3 * * *").unwrap();
//! let anchor = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! let next = schedule.next_after(anchor, anchor).unwrap();
//! assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap());
//! assert_eq!(job_name("nightly", next), "nightly-28928340");
//! ```

use crate::backup_crd::ScheduleType;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use regex::Regex;
use thiserror::Error;

/// Upper bound on field-skipping steps when searching for a slot.
const MAX_SEARCH_STEPS: usize = 100_000;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule value is empty")]
    Empty,

    #[error("invalid interval '{0}': expected <number><unit> with unit s, m, h or d")]
    InvalidInterval(String),

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// A parsed 5-field cron expression (minute hour day-of-month month day-of-week).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

/// Parsed plan schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(CronSchedule),
    Interval(Duration),
}

impl Schedule {
    /// Parses a schedule value according to its declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when the value is empty or malformed.
    pub fn parse(kind: ScheduleType, value: &str) -> Result<Self, ScheduleError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ScheduleError::Empty);
        }
        match kind {
            ScheduleType::Cron => CronSchedule::parse(value).map(Schedule::Cron),
            ScheduleType::Interval => parse_interval(value).map(Schedule::Interval),
        }
    }

    /// First slot strictly after `after`.
    ///
    /// `anchor` is the origin of interval schedules and is ignored for cron.
    #[must_use]
    pub fn next_after(&self, anchor: DateTime<Utc>, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron(cron) => cron.next_after(after),
            Schedule::Interval(every) => {
                let elapsed = (after - anchor).num_seconds();
                let step = every.num_seconds();
                if elapsed < 0 {
                    return Some(anchor + *every);
                }
                let k = elapsed / step + 1;
                Some(anchor + Duration::seconds(k.checked_mul(step)?))
            }
        }
    }

    /// Latest slot at or before `at`. Interval schedules have no slot at the anchor itself.
    #[must_use]
    pub fn latest_at_or_before(
        &self,
        anchor: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron(cron) => cron.latest_at_or_before(at),
            Schedule::Interval(every) => {
                let elapsed = (at - anchor).num_seconds();
                let step = every.num_seconds();
                let k = elapsed.div_euclid(step);
                (k >= 1).then(|| anchor + Duration::seconds(k * step))
            }
        }
    }
}

/// What a plan reconcile should do now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSlots {
    /// Slot that has come due since the last scheduled job, if any.
    pub due: Option<DateTime<Utc>>,
    /// Next slot after `now`.
    pub next: Option<DateTime<Utc>>,
}

/// Computes the due and next slots of a plan.
///
/// Only the latest missed slot is reported as due; earlier missed slots are skipped.
#[must_use]
pub fn plan_slots(
    schedule: &Schedule,
    anchor: DateTime<Utc>,
    last_scheduled: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PlanSlots {
    let since = last_scheduled.unwrap_or(anchor);
    PlanSlots {
        due: schedule
            .latest_at_or_before(anchor, now)
            .filter(|slot| *slot > since),
        next: schedule.next_after(anchor, now),
    }
}

/// `BackupJob` name for a plan slot: `{plan}-{unix minutes}`.
#[must_use]
pub fn job_name(plan: &str, slot: DateTime<Utc>) -> String {
    format!("{plan}-{}", slot.timestamp().div_euclid(60))
}

/// Parses an interval such as `90s`, `30m`, `6h` or `1d`.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidInterval`] for malformed or zero intervals.
pub fn parse_interval(value: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(value.to_string());
    let interval_regex =
        Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$").map_err(|_| invalid())?;
    let lower = value.trim().to_lowercase();
    let captures = interval_regex.captures(&lower).ok_or_else(invalid)?;

    let number: i64 = captures["number"].parse().map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }
    let seconds = match &captures["unit"] {
        "s" => Some(number),
        "m" => number.checked_mul(60),
        "h" => number.checked_mul(3_600),
        _ => number.checked_mul(86_400),
    }
    .ok_or_else(invalid)?;
    Duration::try_seconds(seconds).ok_or_else(invalid)
}

// ============================================================================
// Cron
// ============================================================================

impl CronSchedule {
    /// Parses a 5-field cron expression or one of the `@hourly`, `@daily`,
    /// `@midnight`, `@weekly`, `@monthly`, `@yearly`, `@annually` macros.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidCron`] describing the offending field.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let expanded = match expression {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            "@weekly" => "0 0 * * 0",
            "@monthly" => "0 0 1 * *",
            "@yearly" | "@annually" => "0 0 1 1 *",
            other => other,
        };
        let error = |reason: String| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(error(format!("expected 5 fields, found {}", fields.len())));
        }

        let minutes = parse_field(fields[0], 0, 59, &[]).map_err(|e| error(format!("minute: {e}")))?;
        let hours = parse_field(fields[1], 0, 23, &[]).map_err(|e| error(format!("hour: {e}")))?;
        let days_of_month =
            parse_field(fields[2], 1, 31, &[]).map_err(|e| error(format!("day of month: {e}")))?;
        let months =
            parse_field(fields[3], 1, 12, &MONTH_NAMES).map_err(|e| error(format!("month: {e}")))?;
        let mut days_of_week = parse_field(fields[4], 0, 7, &WEEKDAY_NAMES)
            .map_err(|e| error(format!("day of week: {e}")))?;
        // 7 is an alias for Sunday.
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !is_wildcard(fields[2]),
            dow_restricted: !is_wildcard(fields[4]),
        })
    }

    fn day_matches(&self, t: DateTime<Utc>) -> bool {
        let dom = has_bit(self.days_of_month, t.day());
        let dow = has_bit(self.days_of_week, t.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// First matching minute strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = start_of_minute(after)? + Duration::minutes(1);
        for _ in 0..MAX_SEARCH_STEPS {
            if !has_bit(self.months, t.month()) {
                t = start_of_next_month(t)?;
            } else if !self.day_matches(t) {
                t = start_of_day(t)? + Duration::days(1);
            } else if !has_bit(self.hours, t.hour()) {
                t = start_of_hour(t)? + Duration::hours(1);
            } else if !has_bit(self.minutes, t.minute()) {
                t += Duration::minutes(1);
            } else {
                return Some(t);
            }
        }
        None
    }

    /// Latest matching minute at or before `at`.
    #[must_use]
    pub fn latest_at_or_before(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = start_of_minute(at)?;
        let one_minute = Duration::minutes(1);
        for _ in 0..MAX_SEARCH_STEPS {
            if !has_bit(self.months, t.month()) {
                t = start_of_month(t)? - one_minute;
            } else if !self.day_matches(t) {
                t = start_of_day(t)? - one_minute;
            } else if !has_bit(self.hours, t.hour()) {
                t = start_of_hour(t)? - one_minute;
            } else if !has_bit(self.minutes, t.minute()) {
                t -= one_minute;
            } else {
                return Some(t);
            }
        }
        None
    }
}

fn is_wildcard(field: &str) -> bool {
    field == "*" || field == "?"
}

fn has_bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn parse_value(token: &str, names: &[&str], offset: u32) -> Result<u32, String> {
    if let Ok(n) = token.parse::<u32>() {
        return Ok(n);
    }
    let lower = token.to_lowercase();
    names
        .iter()
        .position(|name| *name == lower)
        .and_then(|i| u32::try_from(i).ok())
        .map(|i| i + offset)
        .ok_or_else(|| format!("invalid value '{token}'"))
}

/// Parses one comma-separated cron field into a bit mask over `min..=max`.
fn parse_field(field: &str, min: u32, max: u32, names: &[&str]) -> Result<u64, String> {
    let mut mask = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{step}'"))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if is_wildcard(range) {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, names, min)?, parse_value(b, names, min)?)
        } else {
            let value = parse_value(range, names, min)?;
            // `5/15` means "from 5 to the end, every 15".
            (value, if part.contains('/') { max } else { value })
        };

        if start < min || end > max || start > end {
            return Err(format!("'{part}' is outside {min}-{max}"));
        }
        let mut value = start;
        while value <= end {
            mask |= 1 << value;
            value += step;
        }
    }
    Ok(mask)
}

fn start_of_minute(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    t.with_second(0)?.with_nanosecond(0)
}

fn start_of_hour(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_minute(t)?.with_minute(0)
}

fn start_of_day(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(t.date_naive().and_hms_opt(0, 0, 0)?.and_utc())
}

fn start_of_month(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0).single()
}

fn start_of_next_month(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod schedule_tests;
