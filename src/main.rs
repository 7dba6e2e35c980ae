use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use fleetcal::config::Config;
use fleetcal::service::CalendarService;
use fleetcal::snapshot::FleetSnapshot;
use fleetcal::sql::parse_sql;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    fleetcal::observability::init(config.metrics_port);

    let snapshot = FleetSnapshot::load(&config.snapshot_path).await?;
    info!("fleetcal loaded {}", config.snapshot_path.display());
    info!("  cars: {}, bookings: {}", snapshot.cars.len(), snapshot.booking_count());
    info!("  max_cached_views: {}", config.max_cached_views);
    info!("  default_days: {}", config.default_days);

    let service = CalendarService::new(snapshot, config.max_cached_views)
        .with_default_days(config.default_days);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut failures = 0usize;
    if args.is_empty() {
        let tally = run_lines(&service, BufReader::new(tokio::io::stdin())).await?;
        info!("stdin done: {} ok, {} failed", tally.ok, tally.failed);
        failures += tally.failed;
    } else {
        for sql in &args {
            if !run_statement(&service, sql).await {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} statement(s) failed").into());
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    ok: usize,
    failed: usize,
}

/// One statement per line. A line that is not UTF-8 fails on its own and reading continues.
async fn run_lines<R: AsyncBufRead + Unpin>(
    service: &CalendarService,
    mut reader: R,
) -> std::io::Result<Tally> {
    let mut tally = Tally::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(tally);
        }
        line_no += 1;
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("line {line_no}: {e}");
                eprintln!("ERROR: line {line_no}: {e}");
                tally.failed += 1;
                continue;
            }
        };
        let sql = line.trim();
        if sql.is_empty() || sql.starts_with("--") {
            continue;
        }
        if run_statement(service, sql).await {
            tally.ok += 1;
        } else {
            tally.failed += 1;
        }
    }
}

/// Execute one statement and print its JSON result. Errors go to stderr.
async fn run_statement(service: &CalendarService, sql: &str) -> bool {
    let command = match parse_sql(sql) {
        Ok(command) => command,
        Err(e) => {
            warn!("rejected statement: {e}");
            eprintln!("ERROR: {e}");
            return false;
        }
    };
    match service.execute(&command).await {
        Ok(output) => match serde_json::to_string(&output) {
            Ok(json) => {
                println!("{json}");
                true
            }
            Err(e) => {
                eprintln!("ERROR: {e}");
                false
            }
        },
        Err(e) => {
            warn!("query failed: {e}");
            eprintln!("ERROR: {e}");
            false
        }
    }
}
