use tracing::debug;

use crate::model::*;

use super::normalize::normalize_car;
use super::projection::project;
use super::EngineError;

// ── Availability Resolver ─────────────────────────────────────────

/// Per-car verdict for a candidate window across the given fleet.
///
/// Returns `None` for an invalid candidate. Callers treat that as "feature
/// inactive", never as an empty fleet.
pub fn resolve_availability(
    candidate: &CandidateWindow,
    fleet: &[CarRow],
) -> Option<AvailabilityReport> {
    let span = checked_candidate(candidate)?;
    let sets: Vec<(CarId, Vec<NormalizedBooking>)> = fleet
        .iter()
        .map(|car| (car.car_id, normalize_car(&car.bookings)))
        .collect();
    Some(availability_report(
        span,
        sets.iter().map(|(car_id, set)| (*car_id, set.as_slice())),
    ))
}

/// Report over already-normalized per-car sets.
pub fn availability_report<'a>(
    candidate: DaySpan,
    sets: impl Iterator<Item = (CarId, &'a [NormalizedBooking])>,
) -> AvailabilityReport {
    let per_car = sets
        .map(|(car_id, set)| (car_id, is_available(set, &candidate)))
        .collect();
    AvailabilityReport {
        candidate,
        per_car,
    }
}

/// Free iff no booking overlaps the candidate. Touching boundaries are fine.
pub fn is_available(set: &[NormalizedBooking], candidate: &DaySpan) -> bool {
    !set.iter().any(|b| b.span.overlaps(candidate))
}

/// Where the candidate falls on the visible grid. Highlighting only.
pub fn candidate_cell(candidate: &CandidateWindow, window: &VisibleWindow) -> Option<GridCell> {
    candidate.span().and_then(|span| project(&span, window))
}

pub(super) fn checked_candidate(candidate: &CandidateWindow) -> Option<DaySpan> {
    let span = candidate.span();
    if span.is_none() {
        debug!("{}; availability inactive", EngineError::InvalidCandidateWindow);
    }
    span
}
