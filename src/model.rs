use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Calendar day, the only time unit the engine reasons in.
pub type Day = NaiveDate;

pub type CarId = i64;

/// Booking id, unique only within its [`BookingKind`].
pub type BookingId = i64;

/// Half-open day range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DaySpan {
    pub start: Day,
    pub end: Day,
}

impl DaySpan {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start < end, "DaySpan start must be before end");
        Self { start, end }
    }

    pub fn len_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    pub fn overlaps(&self, other: &DaySpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_day(&self, day: Day) -> bool {
        self.start <= day && day < self.end
    }

    /// `other` lies entirely inside `self`.
    pub fn covers(&self, other: &DaySpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &DaySpan) -> Option<DaySpan> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then(|| DaySpan::new(start, end))
    }
}

impl fmt::Display for DaySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Where a booking comes from. Display only; overlap math treats all kinds alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    Reservation,
    Rental,
    #[serde(alias = "service")]
    ServiceEvent,
}

impl BookingKind {
    pub const ALL: [BookingKind; 3] = [
        BookingKind::Reservation,
        BookingKind::Rental,
        BookingKind::ServiceEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Reservation => "reservation",
            BookingKind::Rental => "rental",
            BookingKind::ServiceEvent => "service_event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reservation" | "reservations" => Some(BookingKind::Reservation),
            "rental" | "rentals" => Some(BookingKind::Rental),
            "service" | "service_event" | "service_events" => Some(BookingKind::ServiceEvent),
            _ => None,
        }
    }
}

impl fmt::Display for BookingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a booking within one car's set. Ids collide across kinds, so both are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookingKey {
    pub kind: BookingKind,
    pub id: BookingId,
}

impl fmt::Display for BookingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// One scheduled occupancy of a car, as delivered by the upstream stores.
///
/// `start`/`end` keep whatever time-of-day upstream sent; the normalizer truncates.
/// A missing `end` marks an ongoing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInterval {
    pub kind: BookingKind,
    pub id: BookingId,
    #[serde(with = "stamp")]
    pub start: NaiveDateTime,
    #[serde(default, with = "stamp::option")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl BookingInterval {
    pub fn new(kind: BookingKind, id: BookingId, start: Day, end: Option<Day>) -> Self {
        Self {
            kind,
            id,
            start: start.and_time(NaiveTime::MIN),
            end: end.map(|d| d.and_time(NaiveTime::MIN)),
            status: None,
            label: None,
            display_name: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn key(&self) -> BookingKey {
        BookingKey {
            kind: self.kind,
            id: self.id,
        }
    }

    pub fn start_day(&self) -> Day {
        self.start.date()
    }

    pub fn end_day(&self) -> Option<Day> {
        self.end.map(|ts| ts.date())
    }
}

/// One fleet vehicle and everything booked on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarRow {
    pub car_id: CarId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub plate: String,
    /// Manual override set by staff; independent of computed availability.
    #[serde(rename = "is_available", default = "default_true")]
    pub is_available_flag: bool,
    #[serde(default)]
    pub bookings: Vec<BookingInterval>,
}

fn default_true() -> bool {
    true
}

impl CarRow {
    pub fn new(car_id: CarId, display_name: impl Into<String>, plate: impl Into<String>) -> Self {
        Self {
            car_id,
            display_name: display_name.into(),
            plate: plate.into(),
            is_available_flag: true,
            bookings: Vec::new(),
        }
    }

    pub fn with_booking(mut self, booking: BookingInterval) -> Self {
        self.bookings.push(booking);
        self
    }
}

/// The rendered day columns: column `i` is `range_start + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibleWindow {
    pub range_start: Day,
    pub day_count: u32,
}

impl VisibleWindow {
    pub fn new(range_start: Day, day_count: u32) -> Self {
        Self {
            range_start,
            day_count,
        }
    }

    /// The window as a day span, `None` for an empty window or calendar overflow.
    pub fn as_span(&self) -> Option<DaySpan> {
        if self.day_count == 0 {
            return None;
        }
        let end = self
            .range_start
            .checked_add_days(chrono::Days::new(u64::from(self.day_count)))?;
        Some(DaySpan::new(self.range_start, end))
    }
}

/// Proposed `[check_in, check_out)` for a new booking. Either side may still be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub check_in: Option<Day>,
    pub check_out: Option<Day>,
}

impl CandidateWindow {
    pub fn new(check_in: Day, check_out: Day) -> Self {
        Self {
            check_in: Some(check_in),
            check_out: Some(check_out),
        }
    }

    /// The candidate as a span, or `None` unless both days are set and `check_in < check_out`.
    pub fn span(&self) -> Option<DaySpan> {
        match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) if check_in < check_out => {
                Some(DaySpan::new(check_in, check_out))
            }
            _ => None,
        }
    }
}

/// Which booking kinds are drawn. Hidden kinds still block availability and still conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindFilter {
    pub reservation: bool,
    pub rental: bool,
    pub service_event: bool,
}

impl Default for KindFilter {
    fn default() -> Self {
        Self {
            reservation: true,
            rental: true,
            service_event: true,
        }
    }
}

impl KindFilter {
    pub fn none() -> Self {
        Self {
            reservation: false,
            rental: false,
            service_event: false,
        }
    }

    pub fn only(kinds: &[BookingKind]) -> Self {
        let mut filter = Self::none();
        for kind in kinds {
            filter.set(*kind, true);
        }
        filter
    }

    pub fn set(&mut self, kind: BookingKind, visible: bool) {
        match kind {
            BookingKind::Reservation => self.reservation = visible,
            BookingKind::Rental => self.rental = visible,
            BookingKind::ServiceEvent => self.service_event = visible,
        }
    }

    pub fn allows(&self, kind: BookingKind) -> bool {
        match kind {
            BookingKind::Reservation => self.reservation,
            BookingKind::Rental => self.rental,
            BookingKind::ServiceEvent => self.service_event,
        }
    }
}

/// Dashboard filters: free-text search over name/plate plus kind visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FleetFilter {
    pub search: Option<String>,
    pub kinds: KindFilter,
}

impl FleetFilter {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_kinds(mut self, kinds: KindFilter) -> Self {
        self.kinds = kinds;
        self
    }

    /// Case-insensitive substring match on display name or plate. Blank search matches all.
    pub fn matches_car(&self, car: &CarRow) -> bool {
        let Some(search) = self.search.as_deref().map(str::trim) else {
            return true;
        };
        if search.is_empty() {
            return true;
        }
        let needle = search.to_lowercase();
        car.display_name.to_lowercase().contains(&needle)
            || car.plate.to_lowercase().contains(&needle)
    }
}

// ── Query result types ───────────────────────────────────────────

/// A booking after dedup and normalization: identity plus effective range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedBooking {
    pub key: BookingKey,
    pub span: DaySpan,
}

/// Position of a booking bar inside the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub column: u32,
    pub span: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewQuery {
    pub window: VisibleWindow,
    pub filter: FleetFilter,
    pub candidate: Option<CandidateWindow>,
}

impl ViewQuery {
    pub fn new(window: VisibleWindow) -> Self {
        Self {
            window,
            filter: FleetFilter::default(),
            candidate: None,
        }
    }

    pub fn with_filter(mut self, filter: FleetFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_candidate(mut self, candidate: CandidateWindow) -> Self {
        self.candidate = Some(candidate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    pub key: BookingKey,
    pub label: Option<String>,
    pub status: Option<String>,
    pub display_name: Option<String>,
    /// Effective (normalized) range, not the raw upstream one.
    pub effective: DaySpan,
    /// `None` when the booking lies entirely outside the window.
    pub cell: Option<GridCell>,
    pub conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarView {
    pub car_id: CarId,
    pub display_name: String,
    pub plate: String,
    pub is_available_flag: bool,
    pub utilization: u32,
    pub bookings: Vec<BookingView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityTally {
    pub available: usize,
    pub total: usize,
}

/// Per-car verdict for a candidate window. The tally is always derived from `per_car`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub candidate: DaySpan,
    pub per_car: BTreeMap<CarId, bool>,
}

impl AvailabilityReport {
    pub fn tally(&self) -> AvailabilityTally {
        AvailabilityTally {
            available: self.per_car.values().filter(|free| **free).count(),
            total: self.per_car.len(),
        }
    }

    pub fn is_available(&self, car_id: CarId) -> Option<bool> {
        self.per_car.get(&car_id).copied()
    }
}

/// Everything the dashboard renders for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarView {
    pub version: Ulid,
    pub window: VisibleWindow,
    pub cars: Vec<CarView>,
    pub day_summary: Vec<u32>,
    pub availability: Option<AvailabilityReport>,
    pub candidate_cell: Option<GridCell>,
}

/// Serde adapter for booking timestamps: accepts bare dates, naive timestamps and RFC 3339.
pub(crate) mod stamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(day.and_time(NaiveTime::MIN));
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(ts);
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(ts);
        }
        // Offsets are not converted; the wall-clock date is what the dashboard showed.
        DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local())
    }

    pub fn format(ts: &NaiveDateTime) -> String {
        if ts.time() == NaiveTime::MIN {
            ts.date().format("%Y-%m-%d").to_string()
        } else {
            ts.format("%Y-%m-%dT%H:%M:%S").to_string()
        }
    }

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date or timestamp: {raw}")))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(ts: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => s.serialize_some(&super::format(ts)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid date or timestamp: {raw}"))),
            }
        }
    }
}
