use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use ulid::Ulid;

use crate::engine::{build_view, column_dates, validate_query, EngineError};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::snapshot::{FleetSnapshot, FleetSource, SnapshotError};
use crate::sql::Command;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViewKey {
    version: Ulid,
    query: ViewQuery,
}

/// Holds the current fleet snapshot and memoizes the views computed from it.
pub struct CalendarService {
    snapshot: RwLock<Arc<FleetSnapshot>>,
    views: DashMap<ViewKey, Arc<CalendarView>>,
    max_cached_views: usize,
    default_days: u32,
}

impl CalendarService {
    pub fn new(snapshot: FleetSnapshot, max_cached_views: usize) -> Self {
        metrics::gauge!(observability::FLEET_CARS).set(snapshot.cars.len() as f64);
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            views: DashMap::new(),
            max_cached_views,
            default_days: DEFAULT_DAY_COUNT,
        }
    }

    pub fn with_default_days(mut self, days: u32) -> Self {
        self.default_days = days;
        self
    }

    pub async fn version(&self) -> Ulid {
        self.snapshot.read().await.version
    }

    pub fn cached_views(&self) -> usize {
        self.views.len()
    }

    /// Swap in new data. Views of the old version can no longer be served.
    pub async fn replace_snapshot(&self, snapshot: FleetSnapshot) {
        let cars = snapshot.cars.len();
        let bookings = snapshot.booking_count();
        let version = snapshot.version;
        {
            let mut guard = self.snapshot.write().await;
            *guard = Arc::new(snapshot);
        }
        self.views.clear();
        metrics::gauge!(observability::FLEET_CARS).set(cars as f64);
        metrics::gauge!(observability::VIEW_CACHE_ENTRIES).set(0.0);
        info!("snapshot {version} loaded: {cars} cars, {bookings} bookings");
    }

    pub async fn refresh(
        &self,
        source: &dyn FleetSource,
        range: DaySpan,
    ) -> Result<Ulid, SnapshotError> {
        let snapshot = source.fetch(range).await?;
        let version = snapshot.version;
        self.replace_snapshot(snapshot).await;
        Ok(version)
    }

    /// Compute (or reuse) the view for `query` against the current snapshot.
    ///
    /// Availability goes inactive when the snapshot was fetched for a range
    /// that does not cover the whole candidate stay.
    pub async fn view(&self, mut query: ViewQuery) -> Result<Arc<CalendarView>, EngineError> {
        validate_query(&query)?;
        let snapshot = self.snapshot.read().await.clone();
        if let Some(span) = query.candidate.as_ref().and_then(CandidateWindow::span)
            && !snapshot.covers(&span)
        {
            debug!("candidate {span} outside fetched data; availability inactive");
            query.candidate = None;
        }
        let key = ViewKey {
            version: snapshot.version,
            query,
        };

        if let Some(hit) = self.views.get(&key) {
            metrics::counter!(observability::VIEW_CACHE_HITS_TOTAL).increment(1);
            return Ok(hit.value().clone());
        }
        metrics::counter!(observability::VIEW_CACHE_MISSES_TOTAL).increment(1);

        let query = key.query.clone();
        let started = Instant::now();
        let view = tokio::task::spawn_blocking(move || {
            build_view(snapshot.version, &snapshot.cars, &query)
        })
        .await
        .map_err(|e| EngineError::TaskFailed(e.to_string()))?;
        metrics::histogram!(observability::VIEW_BUILD_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let view = Arc::new(view);
        if self.max_cached_views == 0 {
            return Ok(view);
        }
        // Snapshot swapped while we were computing: the result is still correct
        // for its version, but nobody can ask for that version again.
        if self.snapshot.read().await.version != key.version {
            return Ok(view);
        }
        if self.views.len() >= self.max_cached_views {
            info!("view memo full ({} entries), clearing", self.views.len());
            self.views.clear();
        }
        self.views.insert(key, view.clone());
        metrics::gauge!(observability::VIEW_CACHE_ENTRIES).set(self.views.len() as f64);
        Ok(view)
    }

    /// Run a parsed query, with today's date filling an omitted window.
    pub async fn execute(&self, command: &Command) -> Result<QueryOutput, EngineError> {
        self.execute_at(command, chrono::Local::now().date_naive()).await
    }

    pub async fn execute_at(
        &self,
        command: &Command,
        today: Day,
    ) -> Result<QueryOutput, EngineError> {
        let label = observability::command_label(command);
        let started = Instant::now();
        let result = self.run(command, today).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, command: &Command, today: Day) -> Result<QueryOutput, EngineError> {
        let query = command.filters().view_query(today, self.default_days);
        let view = self.view(query).await?;
        Ok(match command {
            Command::SelectGrid(_) => QueryOutput::Grid {
                rows: grid_rows(&view),
            },
            Command::SelectUtilization(_) => QueryOutput::Utilization {
                rows: view
                    .cars
                    .iter()
                    .map(|car| UtilizationRow {
                        car_id: car.car_id,
                        display_name: car.display_name.clone(),
                        plate: car.plate.clone(),
                        utilization: car.utilization,
                        is_available_flag: car.is_available_flag,
                    })
                    .collect(),
            },
            Command::SelectDaySummary(_) => QueryOutput::DaySummary {
                rows: column_dates(&view.window)
                    .into_iter()
                    .zip(view.day_summary.iter())
                    .enumerate()
                    .map(|(day, (date, occupied))| DaySummaryRow {
                        day: day as u32,
                        date,
                        occupied: *occupied,
                    })
                    .collect(),
            },
            Command::SelectAvailability(_) => availability_output(&view),
        })
    }
}

fn grid_rows(view: &CalendarView) -> Vec<GridRow> {
    view.cars
        .iter()
        .flat_map(|car| {
            car.bookings.iter().map(move |b| GridRow {
                car_id: car.car_id,
                kind: b.key.kind,
                id: b.key.id,
                label: b.label.clone(),
                status: b.status.clone(),
                start: b.effective.start,
                end: b.effective.end,
                column: b.cell.map(|c| c.column),
                span: b.cell.map(|c| c.span),
                conflict: b.conflict,
            })
        })
        .collect()
}

fn availability_output(view: &CalendarView) -> QueryOutput {
    let Some(report) = &view.availability else {
        return QueryOutput::Availability {
            active: false,
            tally: None,
            candidate_cell: None,
            rows: Vec::new(),
        };
    };
    let rows = view
        .cars
        .iter()
        .filter_map(|car| {
            report.is_available(car.car_id).map(|available| AvailabilityRow {
                car_id: car.car_id,
                display_name: car.display_name.clone(),
                plate: car.plate.clone(),
                available,
                is_available_flag: car.is_available_flag,
            })
        })
        .collect();
    QueryOutput::Availability {
        active: true,
        tally: Some(report.tally()),
        candidate_cell: view.candidate_cell,
        rows,
    }
}

// ── Output rows ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum QueryOutput {
    Grid {
        rows: Vec<GridRow>,
    },
    Utilization {
        rows: Vec<UtilizationRow>,
    },
    DaySummary {
        rows: Vec<DaySummaryRow>,
    },
    Availability {
        active: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        tally: Option<AvailabilityTally>,
        #[serde(skip_serializing_if = "Option::is_none")]
        candidate_cell: Option<GridCell>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        rows: Vec<AvailabilityRow>,
    },
}

impl QueryOutput {
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutput::Grid { rows } => rows.len(),
            QueryOutput::Utilization { rows } => rows.len(),
            QueryOutput::DaySummary { rows } => rows.len(),
            QueryOutput::Availability { rows, .. } => rows.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub car_id: CarId,
    pub kind: BookingKind,
    pub id: BookingId,
    pub label: Option<String>,
    pub status: Option<String>,
    pub start: Day,
    pub end: Day,
    pub column: Option<u32>,
    pub span: Option<u32>,
    pub conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationRow {
    pub car_id: CarId,
    pub display_name: String,
    pub plate: String,
    pub utilization: u32,
    pub is_available_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummaryRow {
    pub day: u32,
    pub date: Day,
    pub occupied: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityRow {
    pub car_id: CarId,
    pub display_name: String,
    pub plate: String,
    pub available: bool,
    pub is_available_flag: bool,
}
