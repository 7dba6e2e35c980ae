//! Calendar availability & conflict engine.
//!
//! Pure functions over a fleet snapshot, layered dependency-first:
//! day indices → normalization → projection → aggregation / availability.
//! Nothing here holds state or does I/O.

mod aggregate;
mod availability;
mod day_index;
mod error;
mod normalize;
mod projection;
mod view;
#[cfg(test)]
mod tests;

pub use aggregate::{conflict_flags, day_summary, has_conflict, merge_overlapping, occupancy, utilization};
pub use availability::{availability_report, candidate_cell, is_available, resolve_availability};
pub use day_index::{column_dates, date_at, day_index};
pub use error::EngineError;
pub use normalize::{dedupe, normalize, normalize_bookings, normalize_car};
pub use projection::project;
pub use view::{build_view, validate_query};
