use crate::model::*;

use super::day_index::day_index;

/// Clip a normalized span to the window as `(column, span)`.
///
/// Returns `None` when nothing of the span is visible. Any `Some` satisfies
/// `column + span <= day_count`, so renderers never bounds-check again.
pub fn project(span: &DaySpan, window: &VisibleWindow) -> Option<GridCell> {
    let (col_start, col_end) = column_range(span, window);
    if col_end <= col_start {
        return None;
    }
    Some(GridCell {
        column: col_start as u32,
        span: (col_end - col_start) as u32,
    })
}

/// Clamped `[col_start, col_end)` in `0..=day_count`. Empty when not visible.
pub(super) fn column_range(span: &DaySpan, window: &VisibleWindow) -> (i64, i64) {
    let day_count = i64::from(window.day_count);
    let col_start = day_index(span.start, window.range_start).clamp(0, day_count);
    let col_end = day_index(span.end, window.range_start).clamp(0, day_count);
    (col_start, col_end)
}
