use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::normalize;
use crate::limits::*;
use crate::model::*;

/// One fetch of the fleet from the upstream stores.
///
/// `version` is assigned on construction and never read from the wire, so two
/// loads of the same file are still distinct data versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(skip, default = "Ulid::new")]
    pub version: Ulid,
    /// Days whose bookings are complete in this snapshot. `None` for a full load.
    #[serde(skip)]
    pub coverage: Option<DaySpan>,
    #[serde(default)]
    pub cars: Vec<CarRow>,
}

impl FleetSnapshot {
    pub fn new(cars: Vec<CarRow>) -> Result<Self, SnapshotError> {
        let snapshot = Self {
            version: Ulid::new(),
            coverage: None,
            cars,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn empty() -> Self {
        Self {
            version: Ulid::new(),
            coverage: None,
            cars: Vec::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: FleetSnapshot = serde_json::from_str(raw)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.cars.len() > MAX_CARS {
            return Err(SnapshotError::Invalid(format!(
                "{} cars exceeds limit of {MAX_CARS}",
                self.cars.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.cars.len());
        for car in &self.cars {
            if !seen.insert(car.car_id) {
                return Err(SnapshotError::Invalid(format!("duplicate car_id {}", car.car_id)));
            }
            if car.bookings.len() > MAX_BOOKINGS_PER_CAR {
                return Err(SnapshotError::Invalid(format!(
                    "car {} has {} bookings, limit is {MAX_BOOKINGS_PER_CAR}",
                    car.car_id,
                    car.bookings.len()
                )));
            }
        }
        Ok(())
    }

    pub fn booking_count(&self) -> usize {
        self.cars.iter().map(|car| car.bookings.len()).sum()
    }

    /// Whether every booking touching `span` is present.
    pub fn covers(&self, span: &DaySpan) -> bool {
        self.coverage.is_none_or(|coverage| coverage.covers(span))
    }

    /// Keep only bookings touching `range`, as a store keyed by `[from, to)` would return.
    ///
    /// Malformed bookings are kept; the engine decides what to do with them.
    /// The result only covers `range`, narrowed by any earlier restriction.
    pub fn restrict_to(&self, range: &DaySpan) -> Self {
        let cars = self
            .cars
            .iter()
            .map(|car| CarRow {
                bookings: car
                    .bookings
                    .iter()
                    .filter(|b| normalize(b).map_or(true, |span| span.overlaps(range)))
                    .cloned()
                    .collect(),
                ..car.clone()
            })
            .collect();
        let coverage = match self.coverage {
            None => Some(*range),
            // Disjoint restrictions leave an empty span, which covers nothing.
            Some(prev) => Some(prev.intersect(range).unwrap_or(DaySpan {
                start: range.start,
                end: range.start,
            })),
        };
        Self {
            version: Ulid::new(),
            coverage,
            cars,
        }
    }
}

/// Upstream rental/reservation/service-event store.
#[async_trait]
pub trait FleetSource: Send + Sync {
    async fn fetch(&self, range: DaySpan) -> Result<FleetSnapshot, SnapshotError>;
}

/// Reads a snapshot JSON file on every fetch.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FleetSource for JsonFileSource {
    async fn fetch(&self, range: DaySpan) -> Result<FleetSnapshot, SnapshotError> {
        let snapshot = FleetSnapshot::load(&self.path).await?;
        Ok(snapshot.restrict_to(&range))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "snapshot I/O error: {e}"),
            SnapshotError::Json(e) => write!(f, "snapshot JSON error: {e}"),
            SnapshotError::Invalid(msg) => write!(f, "invalid snapshot: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> Day {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const FLEET_JSON: &str = r#"{
        "cars": [
            {"car_id": 1, "display_name": "Skoda Octavia", "plate": "B-FC 101",
             "bookings": [
                {"kind": "reservation", "id": 7, "start": "2024-06-03", "end": "2024-06-05", "status": "confirmed"},
                {"kind": "rental", "id": 7, "start": "2024-05-01T10:00:00", "end": "2024-05-04T09:00:00"},
                {"kind": "service", "id": 2, "start": "2024-06-20"}
             ]},
            {"car_id": 2, "display_name": "VW Polo", "plate": "B-FC 102", "is_available": false}
        ]
    }"#;

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("fleetcal_test_snapshot");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{name}_{}.json", Ulid::new()))
    }

    #[test]
    fn parse_fleet_json() {
        let snapshot = FleetSnapshot::from_json(FLEET_JSON).unwrap();
        assert_eq!(snapshot.cars.len(), 2);
        assert_eq!(snapshot.booking_count(), 3);
        assert!(!snapshot.cars[1].is_available_flag);
        assert_eq!(snapshot.cars[0].bookings[2].kind, BookingKind::ServiceEvent);
        assert_eq!(snapshot.cars[0].bookings[2].end, None);
    }

    #[test]
    fn each_parse_gets_a_new_version() {
        let a = FleetSnapshot::from_json(FLEET_JSON).unwrap();
        let b = FleetSnapshot::from_json(FLEET_JSON).unwrap();
        assert_ne!(a.version, b.version);
    }

    #[test]
    fn duplicate_car_ids_rejected() {
        let json = r#"{"cars":[{"car_id":1},{"car_id":1}]}"#;
        let err = FleetSnapshot::from_json(json).unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(msg) if msg.contains("duplicate car_id 1")));
    }

    #[test]
    fn too_many_bookings_rejected() {
        let mut car = CarRow::new(1, "Golf", "B-1");
        for id in 0..=MAX_BOOKINGS_PER_CAR as BookingId {
            car.bookings.push(BookingInterval::new(BookingKind::Rental, id, d("2024-06-01"), None));
        }
        assert!(matches!(FleetSnapshot::new(vec![car]), Err(SnapshotError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = FleetSnapshot::from_json(r#"{"cars":[{"car_id":"one"}]}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));
        let err = FleetSnapshot::from_json(
            r#"{"cars":[{"car_id":1,"bookings":[{"kind":"rental","id":1,"start":"June 1"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));
    }

    #[test]
    fn restrict_keeps_touching_range_and_malformed() {
        let mut snapshot = FleetSnapshot::from_json(FLEET_JSON).unwrap();
        snapshot.cars[1].bookings.push(BookingInterval::new(
            BookingKind::Reservation,
            9,
            d("2024-06-10"),
            Some(d("2024-06-01")),
        ));
        let range = DaySpan::new(d("2024-06-01"), d("2024-06-15"));
        let restricted = snapshot.restrict_to(&range);
        assert_ne!(restricted.version, snapshot.version);
        let ids: Vec<_> = restricted.cars[0].bookings.iter().map(|b| b.key()).collect();
        assert_eq!(ids, vec![BookingKey { kind: BookingKind::Reservation, id: 7 }]);
        // Degenerate booking survives the fetch filter.
        assert_eq!(restricted.cars[1].bookings.len(), 1);
        assert!(!restricted.cars[1].is_available_flag);
    }

    #[test]
    fn restrict_records_coverage() {
        let snapshot = FleetSnapshot::from_json(FLEET_JSON).unwrap();
        assert_eq!(snapshot.coverage, None);
        assert!(snapshot.covers(&DaySpan::new(d("1990-01-01"), d("2090-01-01"))));

        let june = DaySpan::new(d("2024-06-01"), d("2024-06-08"));
        let restricted = snapshot.restrict_to(&june);
        assert_eq!(restricted.coverage, Some(june));
        assert!(restricted.covers(&DaySpan::new(d("2024-06-03"), d("2024-06-05"))));
        assert!(!restricted.covers(&DaySpan::new(d("2024-06-07"), d("2024-06-09"))));
        assert!(!restricted.covers(&DaySpan::new(d("2024-06-10"), d("2024-06-12"))));

        // A second restriction can only narrow what is known.
        let narrower = restricted.restrict_to(&DaySpan::new(d("2024-06-05"), d("2024-06-20")));
        assert_eq!(narrower.coverage, Some(DaySpan::new(d("2024-06-05"), d("2024-06-08"))));
        let disjoint = restricted.restrict_to(&DaySpan::new(d("2024-07-01"), d("2024-07-08")));
        assert!(!disjoint.covers(&DaySpan::new(d("2024-07-01"), d("2024-07-02"))));
        assert!(!disjoint.covers(&DaySpan::new(d("2024-06-01"), d("2024-06-02"))));
    }

    #[tokio::test]
    async fn json_file_source_fetches_range() {
        let path = test_path("source");
        std::fs::write(&path, FLEET_JSON).unwrap();
        let source = JsonFileSource::new(&path);
        assert_eq!(source.path(), path.as_path());
        let snapshot = source
            .fetch(DaySpan::new(d("2024-06-15"), d("2024-06-30")))
            .await
            .unwrap();
        assert_eq!(snapshot.booking_count(), 1);
        assert_eq!(snapshot.cars[0].bookings[0].kind, BookingKind::ServiceEvent);
        assert_eq!(snapshot.coverage, Some(DaySpan::new(d("2024-06-15"), d("2024-06-30"))));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = FleetSnapshot::load(&test_path("missing")).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }
}
