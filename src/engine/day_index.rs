use chrono::Days;

use crate::model::*;

/// Whole days from `range_start` to `date`. Negative before the window; callers clamp.
pub fn day_index(date: Day, range_start: Day) -> i64 {
    date.signed_duration_since(range_start).num_days()
}

/// Inverse of [`day_index`]. `None` only when the result leaves chrono's calendar.
pub fn date_at(range_start: Day, index: i64) -> Option<Day> {
    if index >= 0 {
        range_start.checked_add_days(Days::new(index as u64))
    } else {
        range_start.checked_sub_days(Days::new(index.unsigned_abs()))
    }
}

/// The date of every column in the window, in column order.
pub fn column_dates(window: &VisibleWindow) -> Vec<Day> {
    (0..i64::from(window.day_count))
        .map_while(|i| date_at(window.range_start, i))
        .collect()
}
