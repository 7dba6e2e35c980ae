use std::collections::HashMap;

use crate::model::*;

use super::normalize::normalize_car;
use super::projection::column_range;

// ── Utilization ───────────────────────────────────────────────────

/// Percent of window days covered by at least one booking, rounded half-up.
///
/// Overlapping bookings count a day once. An empty window is 0%.
pub fn utilization(set: &[NormalizedBooking], window: &VisibleWindow) -> u32 {
    if window.day_count == 0 {
        return 0;
    }
    let covered = covered_columns(set.iter().map(|b| &b.span), window)
        .iter()
        .map(|(start, end)| end - start)
        .sum::<i64>();
    percent(covered as u64, window.day_count)
}

fn percent(covered: u64, day_count: u32) -> u32 {
    let days = u64::from(day_count);
    ((200 * covered.min(days) + days) / (2 * days)) as u32
}

/// Disjoint, sorted column ranges covered by the given spans inside the window.
fn covered_columns<'a>(
    spans: impl Iterator<Item = &'a DaySpan>,
    window: &VisibleWindow,
) -> Vec<(i64, i64)> {
    let mut ranges: Vec<(i64, i64)> = spans
        .map(|span| column_range(span, window))
        .filter(|(start, end)| start < end)
        .collect();
    ranges.sort_unstable();
    merge_overlapping(&ranges)
}

/// Merge sorted overlapping/adjacent ranges into disjoint ranges.
pub fn merge_overlapping(sorted: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut merged: Vec<(i64, i64)> = Vec::new();
    for &(start, end) in sorted {
        if let Some(last) = merged.last_mut()
            && start <= last.1
        {
            last.1 = last.1.max(end);
            continue;
        }
        merged.push((start, end));
    }
    merged
}

// ── Conflicts ─────────────────────────────────────────────────────

/// True iff `target` overlaps any booking in `others` with a different identity.
///
/// Compares full normalized ranges, never window projections.
pub fn has_conflict(target: &NormalizedBooking, others: &[NormalizedBooking]) -> bool {
    others
        .iter()
        .any(|other| other.key != target.key && other.span.overlaps(&target.span))
}

/// Conflict flag for every booking of one car, in a single sort-and-sweep pass.
pub fn conflict_flags(set: &[NormalizedBooking]) -> HashMap<BookingKey, bool> {
    let mut flags: HashMap<BookingKey, bool> = set.iter().map(|b| (b.key, false)).collect();

    let mut order: Vec<&NormalizedBooking> = set.iter().collect();
    order.sort_by_key(|b| (b.span.start, b.key));

    for (i, a) in order.iter().enumerate() {
        // Everything after `a` starts no earlier, so it overlaps iff it starts before a.end.
        for b in &order[i + 1..] {
            if b.span.start >= a.span.end {
                break;
            }
            if a.key != b.key {
                flags.insert(a.key, true);
                flags.insert(b.key, true);
            }
        }
    }
    flags
}

// ── Day summary ───────────────────────────────────────────────────

/// Occupied-car count per window day across the filtered fleet.
pub fn day_summary(cars: &[CarRow], filter: &FleetFilter, window: &VisibleWindow) -> Vec<u32> {
    let sets: Vec<Vec<NormalizedBooking>> = cars
        .iter()
        .filter(|car| filter.matches_car(car))
        .map(|car| normalize_car(&car.bookings))
        .collect();
    occupancy(sets.iter().map(Vec::as_slice), &filter.kinds, window)
}

/// Day summary over already-normalized per-car sets. Each set is one car.
pub fn occupancy<'a>(
    sets: impl Iterator<Item = &'a [NormalizedBooking]>,
    kinds: &KindFilter,
    window: &VisibleWindow,
) -> Vec<u32> {
    let mut counts = vec![0u32; window.day_count as usize];
    for set in sets {
        let visible = set
            .iter()
            .filter(|b| kinds.allows(b.key.kind))
            .map(|b| &b.span);
        // Merged ranges are disjoint, so a car adds at most 1 per day.
        for (start, end) in covered_columns(visible, window) {
            for day in start..end {
                counts[day as usize] += 1;
            }
        }
    }
    counts
}
