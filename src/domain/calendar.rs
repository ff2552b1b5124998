//! Working calendars used to apply lags
//!
//! A lag of `n` working days moves a reference instant forward (or backward
//! for leads) by `n` days that the calendar counts as working. Without a
//! project calendar every day counts.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

/// Converts working-day offsets into instants
pub trait WorkingCalendar: Send + Sync {
    /// Returns `from` shifted by `working_days` (negative = earlier)
    fn offset(&self, from: DateTime<Utc>, working_days: i32) -> DateTime<Utc>;
}

/// Every calendar day is a working day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarDays;

impl WorkingCalendar for CalendarDays {
    fn offset(&self, from: DateTime<Utc>, working_days: i32) -> DateTime<Utc> {
        from.checked_add_signed(Duration::days(i64::from(working_days)))
            .unwrap_or_else(|| limit(working_days))
    }
}

/// Monday to Friday, minus listed holidays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Returns true if the date counts as a working day
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Whole weeks that can be skipped from `date` before reaching a holiday
    fn holiday_free_weeks(&self, date: NaiveDate, forward: bool) -> Option<i64> {
        let next = if forward {
            self.holidays.range(date.succ_opt()?..).next()
        } else {
            self.holidays.range(..date).next_back()
        };
        next.map(|holiday| ((*holiday - date).num_days().abs() - 1) / 7)
    }

    /// Returns `None` when the result leaves the representable range
    fn checked_offset(&self, from: DateTime<Utc>, working_days: i32) -> Option<DateTime<Utc>> {
        let forward = working_days > 0;
        let sign: i64 = if forward { 1 } else { -1 };
        let shift = |t: DateTime<Utc>, days: i64| t.checked_add_signed(Duration::days(days * sign));

        let mut remaining = i64::from(working_days.unsigned_abs());
        let mut current = from;

        // Any 7 consecutive days hold exactly 5 weekdays
        let mut idle_weeks = 0u32;
        while remaining > 5 && idle_weeks <= 53 {
            let mut weeks = (remaining - 1) / 5;
            if let Some(free) = self.holiday_free_weeks(current.date_naive(), forward) {
                weeks = weeks.min(free);
            }

            if weeks > 0 {
                current = shift(current, 7 * weeks)?;
                remaining -= 5 * weeks;
                idle_weeks = 0;
                continue;
            }

            // A holiday falls within the next week
            let mut working = 0;
            for _ in 0..7 {
                current = shift(current, 1)?;
                if self.is_working_day(current.date_naive()) {
                    working += 1;
                }
            }
            remaining -= working;
            idle_weeks = if working == 0 { idle_weeks + 1 } else { 0 };
        }

        // A calendar with no working days at all would never terminate
        let mut idle = 0u32;
        while remaining > 0 && idle < 366 {
            current = shift(current, 1)?;
            if self.is_working_day(current.date_naive()) {
                remaining -= 1;
                idle = 0;
            } else {
                idle += 1;
            }
        }

        Some(current)
    }
}

impl WorkingCalendar for WeekdayCalendar {
    fn offset(&self, from: DateTime<Utc>, working_days: i32) -> DateTime<Utc> {
        self.checked_offset(from, working_days)
            .unwrap_or_else(|| limit(working_days))
    }
}

/// Saturates an offset that runs past the representable range
fn limit(working_days: i32) -> DateTime<Utc> {
    if working_days < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    }
}
