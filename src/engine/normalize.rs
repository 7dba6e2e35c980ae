use std::collections::HashSet;

use chrono::Days;
use tracing::debug;

use crate::model::*;

use super::EngineError;

/// Effective `[start, end)` of a booking, truncated to whole days.
///
/// Open-ended bookings occupy exactly one day from `start`.
pub fn normalize(interval: &BookingInterval) -> Result<DaySpan, EngineError> {
    let start = interval.start_day();
    let end = match interval.end_day() {
        Some(end) => end,
        // Only fails at the very end of the calendar; the check below rejects it.
        None => start.checked_add_days(Days::new(1)).unwrap_or(start),
    };
    if end <= start {
        return Err(EngineError::DegenerateInterval {
            key: interval.key(),
            start,
            end,
        });
    }
    Ok(DaySpan::new(start, end))
}

/// Drop repeated `(kind, id)` identities, keeping the first occurrence.
pub fn dedupe(bookings: &[BookingInterval]) -> Vec<&BookingInterval> {
    let mut seen = HashSet::with_capacity(bookings.len());
    let mut unique = Vec::with_capacity(bookings.len());
    for booking in bookings {
        if seen.insert(booking.key()) {
            unique.push(booking);
        } else {
            let err = EngineError::DuplicateIdentity(booking.key());
            debug!("{err}; keeping first occurrence");
            metrics::counter!(crate::observability::DUPLICATE_INTERVALS_TOTAL).increment(1);
        }
    }
    unique
}

/// Dedupe then normalize, silently excluding degenerate intervals.
pub fn normalize_bookings(bookings: &[BookingInterval]) -> Vec<(&BookingInterval, DaySpan)> {
    dedupe(bookings)
        .into_iter()
        .filter_map(|booking| match normalize(booking) {
            Ok(span) => Some((booking, span)),
            Err(err) => {
                debug!("{err}; excluded");
                metrics::counter!(crate::observability::DEGENERATE_INTERVALS_TOTAL).increment(1);
                None
            }
        })
        .collect()
}

/// The identity/range set every aggregator consumes for one car.
pub fn normalize_car(bookings: &[BookingInterval]) -> Vec<NormalizedBooking> {
    normalize_bookings(bookings)
        .into_iter()
        .map(|(booking, span)| NormalizedBooking {
            key: booking.key(),
            span,
        })
        .collect()
}
