use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Per-day totals. `date` serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub focus_sessions_completed: u32,
    pub focus_minutes: u32,
    pub break_minutes: u32,
}

impl DayRecord {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            focus_sessions_completed: 0,
            focus_minutes: 0,
            break_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub focus_sessions: u32,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub days_active: u32,
}

/// Ordered by date, one record per calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHistory {
    days: Vec<DayRecord>,
}

impl SessionHistory {
    pub fn days(&self) -> &[DayRecord] {
        &self.days
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.days
            .binary_search_by_key(&date, |record| record.date)
            .ok()
            .map(|index| &self.days[index])
    }

    fn entry(&mut self, date: NaiveDate) -> &mut DayRecord {
        let index = match self.days.binary_search_by_key(&date, |record| record.date) {
            Ok(index) => index,
            Err(index) => {
                self.days.insert(index, DayRecord::empty(date));
                index
            }
        };
        &mut self.days[index]
    }

    pub fn record_focus(&mut self, date: NaiveDate, minutes: u32) {
        let record = self.entry(date);
        record.focus_sessions_completed += 1;
        record.focus_minutes += minutes;
    }

    pub fn record_break(&mut self, date: NaiveDate, minutes: u32) {
        self.entry(date).break_minutes += minutes;
    }

    pub fn totals(&self) -> Totals {
        self.days.iter().fold(Totals::default(), |mut totals, day| {
            totals.focus_sessions += day.focus_sessions_completed;
            totals.focus_minutes += day.focus_minutes;
            totals.break_minutes += day.break_minutes;
            if day.focus_sessions_completed > 0 {
                totals.days_active += 1;
            }
            totals
        })
    }

    /// Consecutive days with a focus session, ending today (or yesterday when
    /// nothing has been completed yet today).
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let active = |date: NaiveDate| {
            self.day(date)
                .is_some_and(|record| record.focus_sessions_completed > 0)
        };
        let mut cursor = if active(today) {
            today
        } else {
            today - Duration::days(1)
        };
        let mut streak = 0;
        while active(cursor) {
            streak += 1;
            cursor = cursor - Duration::days(1);
        }
        streak
    }

    /// The last `count` calendar days ending at `today`, oldest first, with
    /// empty records for idle days.
    pub fn recent(&self, today: NaiveDate, count: u32) -> Vec<DayRecord> {
        (0..count)
            .rev()
            .map(|offset| {
                let date = today - Duration::days(i64::from(offset));
                self.day(date)
                    .cloned()
                    .unwrap_or_else(|| DayRecord::empty(date))
            })
            .collect()
    }
}
