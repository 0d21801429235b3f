//! Bounded day window for one incremental sync invocation.
//!
//! The cursor walks forward from the day after the watermark, at most
//! `max_days` days per invocation:
//! - a past day with no applied events is skipped over immediately,
//! - a past day with applied events ends the invocation,
//! - a day that could not be fetched completely ends the invocation without
//!   counting as processed,
//! - reaching today ends the invocation.

use chrono::NaiveDate;

/// Walks the days an incremental sync should process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCursor {
    next: NaiveDate,
    today: NaiveDate,
    remaining: u32,
    last_completed: Option<NaiveDate>,
    finished: bool,
}

impl DayCursor {
    /// Start after `watermark`, or at `today` when the watermark is not behind it.
    pub fn start(watermark: NaiveDate, today: NaiveDate, max_days: u32) -> Self {
        let next = if watermark < today {
            watermark.succ_opt().unwrap_or(today)
        } else {
            today
        };

        Self {
            next,
            today,
            remaining: max_days,
            last_completed: None,
            finished: max_days == 0,
        }
    }

    /// Day to process next, or `None` once the invocation is done.
    pub fn next_day(&self) -> Option<NaiveDate> {
        if self.finished {
            None
        } else {
            Some(self.next)
        }
    }

    /// Record that `day` (the value returned by `next_day`) was processed.
    pub fn complete(&mut self, day: NaiveDate, applied: u64) {
        self.remaining = self.remaining.saturating_sub(1);
        self.last_completed = Some(day);

        if day >= self.today || applied > 0 || self.remaining == 0 {
            self.finished = true;
            return;
        }

        match day.succ_opt() {
            Some(next) => self.next = next,
            None => self.finished = true,
        }
    }

    /// Stop at the day returned by `next_day` without completing it.
    ///
    /// The watermark stays at the last completed day, so the next invocation
    /// starts from the halted day again.
    pub fn halt(&mut self) {
        self.finished = true;
    }

    pub fn reached_today(&self) -> bool {
        self.last_completed.is_some_and(|d| d >= self.today)
    }

    /// Watermark to persist after the loop; `None` when nothing was processed.
    pub fn watermark(&self) -> Option<NaiveDate> {
        if self.reached_today() {
            Some(self.today)
        } else {
            self.last_completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    /// Drive a cursor with a fixed applied-count per day; returns visited days.
    fn drive(cursor: &mut DayCursor, applied_on: impl Fn(NaiveDate) -> u64) -> Vec<NaiveDate> {
        let mut visited = Vec::new();
        while let Some(d) = cursor.next_day() {
            visited.push(d);
            cursor.complete(d, applied_on(d));
        }
        visited
    }

    #[test]
    fn starts_the_day_after_the_watermark() {
        let cursor = DayCursor::start(day(10), day(20), 3);
        assert_eq!(cursor.next_day(), Some(day(11)));
    }

    #[test]
    fn starts_today_when_watermark_is_current() {
        assert_eq!(DayCursor::start(day(20), day(20), 3).next_day(), Some(day(20)));
        assert_eq!(DayCursor::start(day(25), day(20), 3).next_day(), Some(day(20)));
    }

    #[test]
    fn empty_past_days_are_skipped_within_budget() {
        let mut cursor = DayCursor::start(day(10), day(20), 3);
        let visited = drive(&mut cursor, |_| 0);

        assert_eq!(visited, vec![day(11), day(12), day(13)]);
        assert_eq!(cursor.watermark(), Some(day(13)));
        assert!(!cursor.reached_today());
    }

    #[test]
    fn past_day_with_events_ends_the_invocation() {
        let mut cursor = DayCursor::start(day(10), day(20), 3);
        let visited = drive(&mut cursor, |d| if d == day(12) { 4 } else { 0 });

        assert_eq!(visited, vec![day(11), day(12)]);
        assert_eq!(cursor.watermark(), Some(day(12)));
    }

    #[test]
    fn reaching_today_stops_and_sets_watermark_to_today() {
        let mut cursor = DayCursor::start(day(18), day(20), 5);
        let visited = drive(&mut cursor, |_| 0);

        assert_eq!(visited, vec![day(19), day(20)]);
        assert!(cursor.reached_today());
        assert_eq!(cursor.watermark(), Some(day(20)));
    }

    #[test]
    fn today_with_events_still_sets_watermark_to_today() {
        let mut cursor = DayCursor::start(day(20), day(20), 3);
        let visited = drive(&mut cursor, |_| 7);

        assert_eq!(visited, vec![day(20)]);
        assert_eq!(cursor.watermark(), Some(day(20)));
    }

    #[test]
    fn halted_day_is_not_passed_by_the_watermark() {
        let mut cursor = DayCursor::start(day(10), day(20), 3);

        assert_eq!(cursor.next_day(), Some(day(11)));
        cursor.complete(day(11), 0);
        assert_eq!(cursor.next_day(), Some(day(12)));
        cursor.halt();

        assert_eq!(cursor.next_day(), None);
        assert_eq!(cursor.watermark(), Some(day(11)));
    }

    #[test]
    fn halting_the_first_day_leaves_no_watermark() {
        let mut cursor = DayCursor::start(day(19), day(20), 3);
        cursor.halt();

        assert_eq!(cursor.watermark(), None);
        assert!(!cursor.reached_today());
    }

    #[test]
    fn zero_budget_processes_nothing() {
        let mut cursor = DayCursor::start(day(10), day(20), 0);
        assert!(drive(&mut cursor, |_| 0).is_empty());
        assert_eq!(cursor.watermark(), None);
    }

    #[test]
    fn watermark_never_advances_more_than_the_budget() {
        for budget in 1..6u32 {
            let mut cursor = DayCursor::start(day(10), day(20), budget);
            drive(&mut cursor, |_| 0);
            let advanced = (cursor.watermark().unwrap() - day(10)).num_days();
            assert!(advanced <= i64::from(budget));
        }
    }
}
