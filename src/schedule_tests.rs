// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::backup_crd::ScheduleType;
    use crate::schedule::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn cron(expr: &str) -> Schedule {
        Schedule::parse(ScheduleType::Cron, expr).unwrap()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_interval("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_interval("6H").unwrap(), Duration::hours(6));
        assert_eq!(parse_interval("1d").unwrap(), Duration::days(1));
        assert!(parse_interval("0h").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("1h30m").is_err());
        assert!(parse_interval("10w").is_err());
    }

    #[test]
    fn test_empty_schedule_rejected() {
        assert_eq!(
            Schedule::parse(ScheduleType::Cron, "  "),
            Err(ScheduleError::Empty)
        );
    }

    #[test]
    fn test_invalid_cron_expressions() {
        for expr in ["* * * *", "60 * * * *", "* 24 * * *", "* * 0 * *", "*/0 * * * *", "5-1 * * * *"] {
            assert!(
                matches!(
                    Schedule::parse(ScheduleType::Cron, expr),
                    Err(ScheduleError::InvalidCron { .. })
                ),
                "expected {expr} to be rejected"
            );
        }
    }

    #[test]
    fn test_cron_next_daily() {
        let schedule = cron("0 3 * * *");
        let now = at(2025, 1, 1, 3, 0);
        assert_eq!(schedule.next_after(now, now), Some(at(2025, 1, 2, 3, 0)));
        let before = at(2025, 1, 1, 2, 59);
        assert_eq!(schedule.next_after(before, before), Some(at(2025, 1, 1, 3, 0)));
    }

    #[test]
    fn test_cron_steps_lists_and_ranges() {
        let schedule = cron("*/15 9-17 * * 1-5");
        // Saturday 2025-01-04 rolls to Monday 2025-01-06 09:00.
        let now = at(2025, 1, 4, 12, 7);
        assert_eq!(schedule.next_after(now, now), Some(at(2025, 1, 6, 9, 0)));
        let monday = at(2025, 1, 6, 9, 1);
        assert_eq!(schedule.next_after(monday, monday), Some(at(2025, 1, 6, 9, 15)));

        let list = cron("0 0,12 * * *");
        let noon = at(2025, 3, 10, 11, 0);
        assert_eq!(list.next_after(noon, noon), Some(at(2025, 3, 10, 12, 0)));
    }

    #[test]
    fn test_cron_names_and_macros() {
        assert_eq!(cron("0 0 1 jan *"), cron("@yearly"));
        assert_eq!(cron("0 0 * * SUN"), cron("@weekly"));
        assert_eq!(cron("0 0 * * 7"), cron("0 0 * * 0"));
    }

    #[test]
    fn test_cron_month_rollover() {
        let schedule = cron("30 1 29 2 *");
        let now = at(2025, 3, 1, 0, 0);
        assert_eq!(schedule.next_after(now, now), Some(at(2028, 2, 29, 1, 30)));
    }

    #[test]
    fn test_cron_day_of_month_or_day_of_week() {
        // Restricted day-of-month and day-of-week match when either matches.
        let schedule = cron("0 0 15 * 1");
        // 2025-01-06 is a Monday.
        let now = at(2025, 1, 1, 0, 0);
        assert_eq!(schedule.next_after(now, now), Some(at(2025, 1, 6, 0, 0)));
    }

    #[test]
    fn test_cron_latest_at_or_before() {
        let schedule = cron("0 3 * * *");
        assert_eq!(
            schedule.latest_at_or_before(at(2025, 1, 1, 0, 0), at(2025, 1, 5, 2, 59)),
            Some(at(2025, 1, 4, 3, 0))
        );
        assert_eq!(
            schedule.latest_at_or_before(at(2025, 1, 1, 0, 0), at(2025, 1, 5, 3, 0)),
            Some(at(2025, 1, 5, 3, 0))
        );
    }

    #[test]
    fn test_interval_slots_are_anchored() {
        let schedule = Schedule::parse(ScheduleType::Interval, "6h").unwrap();
        let anchor = at(2025, 1, 1, 0, 10);
        assert_eq!(schedule.latest_at_or_before(anchor, at(2025, 1, 1, 5, 0)), None);
        assert_eq!(
            schedule.latest_at_or_before(anchor, at(2025, 1, 1, 13, 0)),
            Some(at(2025, 1, 1, 12, 10))
        );
        assert_eq!(
            schedule.next_after(anchor, at(2025, 1, 1, 13, 0)),
            Some(at(2025, 1, 1, 18, 10))
        );
    }

    #[test]
    fn test_plan_slots_due_once_per_slot() {
        let schedule = cron("0 * * * *");
        let anchor = at(2025, 1, 1, 0, 30);
        let now = at(2025, 1, 1, 1, 0);

        let first = plan_slots(&schedule, anchor, None, now);
        assert_eq!(first.due, Some(at(2025, 1, 1, 1, 0)));
        assert_eq!(first.next, Some(at(2025, 1, 1, 2, 0)));

        // Reconciling again in the same minute finds nothing new.
        let again = plan_slots(&schedule, anchor, first.due, now + Duration::seconds(20));
        assert_eq!(again.due, None);
    }

    #[test]
    fn test_plan_slots_nothing_before_first_slot() {
        let schedule = cron("0 3 * * *");
        let anchor = at(2025, 1, 1, 4, 0);
        let slots = plan_slots(&schedule, anchor, None, at(2025, 1, 1, 5, 0));
        assert_eq!(slots.due, None);
        assert_eq!(slots.next, Some(at(2025, 1, 2, 3, 0)));
    }

    #[test]
    fn test_job_name_is_minute_quantized() {
        let slot = at(2025, 1, 1, 3, 0);
        assert_eq!(job_name("nightly", slot), "nightly-28928340");
        assert_eq!(
            job_name("nightly", slot + Duration::seconds(59)),
            job_name("nightly", slot)
        );
    }
}
