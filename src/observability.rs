use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "fleetcal_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "fleetcal_query_duration_seconds";

/// Counter: views served from the memo.
pub const VIEW_CACHE_HITS_TOTAL: &str = "fleetcal_view_cache_hits_total";

/// Counter: views computed because the memo had no entry.
pub const VIEW_CACHE_MISSES_TOTAL: &str = "fleetcal_view_cache_misses_total";

/// Histogram: time to build one view on the blocking pool, in seconds.
pub const VIEW_BUILD_DURATION_SECONDS: &str = "fleetcal_view_build_duration_seconds";

// ── Data quality (silent recoveries) ────────────────────────────

/// Counter: bookings excluded because their effective end is not after their start.
pub const DEGENERATE_INTERVALS_TOTAL: &str = "fleetcal_degenerate_intervals_total";

/// Counter: bookings dropped because their `(kind, id)` already appeared on the car.
pub const DUPLICATE_INTERVALS_TOTAL: &str = "fleetcal_duplicate_intervals_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: cars in the current snapshot.
pub const FLEET_CARS: &str = "fleetcal_fleet_cars";

/// Gauge: views currently memoized.
pub const VIEW_CACHE_ENTRIES: &str = "fleetcal_view_cache_entries";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::warn!("metrics exporter not installed: {e}"),
    }
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectGrid(_) => "select_grid",
        Command::SelectUtilization(_) => "select_utilization",
        Command::SelectDaySummary(_) => "select_day_summary",
        Command::SelectAvailability(_) => "select_availability",
    }
}
