use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::aggregate::{conflict_flags, occupancy, utilization};
use super::availability::{availability_report, candidate_cell, checked_candidate};
use super::normalize::normalize_bookings;
use super::projection::project;
use super::EngineError;

pub fn validate_query(query: &ViewQuery) -> Result<(), EngineError> {
    if query.window.day_count == 0 {
        return Err(EngineError::LimitExceeded("window has no days"));
    }
    if query.window.day_count > MAX_DAY_COUNT {
        return Err(EngineError::LimitExceeded("window too wide"));
    }
    if query.window.as_span().is_none() {
        return Err(EngineError::LimitExceeded("window past end of calendar"));
    }
    if query
        .filter
        .search
        .as_ref()
        .is_some_and(|s| s.len() > MAX_SEARCH_LEN)
    {
        return Err(EngineError::LimitExceeded("search too long"));
    }
    Ok(())
}

/// Compose every engine stage into the view the dashboard renders.
///
/// Each car is normalized once; layout, utilization, conflicts, the day
/// summary and availability all read that same set. Rows follow snapshot
/// order and only include cars matching the search. Hidden kinds are left
/// out of the rows and the day summary but still conflict and still block
/// availability.
pub fn build_view(version: Ulid, cars: &[CarRow], query: &ViewQuery) -> CalendarView {
    let window = &query.window;
    let kinds = &query.filter.kinds;

    let mut rows = Vec::new();
    let mut sets: Vec<(CarId, Vec<NormalizedBooking>)> = Vec::new();

    for car in cars.iter().filter(|car| query.filter.matches_car(car)) {
        let normalized = normalize_bookings(&car.bookings);
        let set: Vec<NormalizedBooking> = normalized
            .iter()
            .map(|(booking, span)| NormalizedBooking {
                key: booking.key(),
                span: *span,
            })
            .collect();
        let flags = conflict_flags(&set);

        let mut bookings: Vec<BookingView> = normalized
            .iter()
            .filter(|(booking, _)| kinds.allows(booking.kind))
            .map(|(booking, span)| BookingView {
                key: booking.key(),
                label: booking.label.clone(),
                status: booking.status.clone(),
                display_name: booking.display_name.clone(),
                effective: *span,
                cell: project(span, window),
                conflict: flags.get(&booking.key()).copied().unwrap_or(false),
            })
            .collect();
        bookings.sort_by_key(|b| (b.effective.start, b.key));

        rows.push(CarView {
            car_id: car.car_id,
            display_name: car.display_name.clone(),
            plate: car.plate.clone(),
            is_available_flag: car.is_available_flag,
            utilization: utilization(&set, window),
            bookings,
        });
        sets.push((car.car_id, set));
    }

    let day_summary = occupancy(sets.iter().map(|(_, set)| set.as_slice()), kinds, window);

    let availability = query.candidate.as_ref().and_then(checked_candidate).map(|span| {
        availability_report(span, sets.iter().map(|(car_id, set)| (*car_id, set.as_slice())))
    });
    let candidate_cell = query
        .candidate
        .as_ref()
        .and_then(|candidate| candidate_cell(candidate, window));

    debug!(
        "built view {version}: {} cars, {} days, availability {}",
        rows.len(),
        window.day_count,
        if availability.is_some() { "active" } else { "inactive" }
    );

    CalendarView {
        version,
        window: *window,
        cars: rows,
        day_summary,
        availability,
        candidate_cell,
    }
}
