use super::*;
use crate::model::*;

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

fn d(s: &str) -> Day {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// The window every scenario uses: 2024-06-01, seven days.
fn june_window() -> VisibleWindow {
    VisibleWindow::new(d("2024-06-01"), 7)
}

fn reservation(id: BookingId, start: &str, end: Option<&str>) -> BookingInterval {
    BookingInterval::new(BookingKind::Reservation, id, d(start), end.map(d))
}

fn rental(id: BookingId, start: &str, end: Option<&str>) -> BookingInterval {
    BookingInterval::new(BookingKind::Rental, id, d(start), end.map(d))
}

fn service(id: BookingId, start: &str, end: Option<&str>) -> BookingInterval {
    BookingInterval::new(BookingKind::ServiceEvent, id, d(start), end.map(d))
}

fn car(id: CarId, name: &str, bookings: Vec<BookingInterval>) -> CarRow {
    let mut car = CarRow::new(id, name, format!("B-FC {id:03}"));
    car.bookings = bookings;
    car
}

fn normalized(b: &BookingInterval) -> NormalizedBooking {
    NormalizedBooking {
        key: b.key(),
        span: normalize(b).unwrap(),
    }
}

// ── Scenarios ────────────────────────────────────────────

#[test]
fn scenario_projection_inside_window() {
    let b = reservation(1, "2024-06-03", Some("2024-06-05"));
    let cell = project(&normalize(&b).unwrap(), &june_window());
    assert_eq!(cell, Some(GridCell { column: 2, span: 2 }));
}

#[test]
fn scenario_interval_before_window_is_hidden() {
    let b = reservation(1, "2024-05-20", Some("2024-05-25"));
    assert_eq!(project(&normalize(&b).unwrap(), &june_window()), None);

    let cars = vec![car(1, "Golf", vec![b])];
    assert_eq!(day_summary(&cars, &FleetFilter::default(), &june_window()), vec![0; 7]);
}

#[test]
fn scenario_overlapping_pair() {
    let a = normalized(&reservation(1, "2024-06-01", Some("2024-06-03")));
    let b = normalized(&reservation(2, "2024-06-02", Some("2024-06-04")));
    assert!(has_conflict(&a, &[b]));
    assert!(has_conflict(&b, &[a]));
    assert_eq!(utilization(&[a, b], &june_window()), 43);
}

#[test]
fn scenario_touching_pair() {
    let a = normalized(&reservation(1, "2024-06-01", Some("2024-06-03")));
    let b = normalized(&reservation(2, "2024-06-03", Some("2024-06-05")));
    assert!(!has_conflict(&a, &[b]));
    assert!(!has_conflict(&b, &[a]));
}

#[test]
fn scenario_candidate_after_booking() {
    let fleet = vec![car(1, "Golf", vec![reservation(1, "2024-06-01", Some("2024-06-05"))])];
    let report =
        resolve_availability(&CandidateWindow::new(d("2024-06-10"), d("2024-06-12")), &fleet)
            .unwrap();
    assert_eq!(report.is_available(1), Some(true));
    assert_eq!(report.tally(), AvailabilityTally { available: 1, total: 1 });
}

#[test]
fn scenario_empty_candidate() {
    let fleet = vec![car(1, "Golf", vec![]), car(2, "Polo", vec![])];
    let candidate = CandidateWindow::new(d("2024-06-10"), d("2024-06-10"));
    assert!(resolve_availability(&candidate, &fleet).is_none());
}

// ── Properties ───────────────────────────────────────────

#[test]
fn open_ended_normalizes_to_one_day() {
    for start in ["2024-02-28", "2024-02-29", "2024-12-31", "2024-06-01"] {
        let span = normalize(&rental(1, start, None)).unwrap();
        assert_eq!(span.start, d(start));
        assert_eq!(span.len_days(), 1);
    }
}

#[test]
fn conflict_symmetry_over_offsets() {
    let anchor = d("2024-06-01");
    for a_start in 0..6 {
        for a_len in 1..4 {
            for b_start in 0..6 {
                for b_len in 1..4 {
                    let a = NormalizedBooking {
                        key: BookingKey { kind: BookingKind::Rental, id: 1 },
                        span: DaySpan::new(
                            date_at(anchor, a_start).unwrap(),
                            date_at(anchor, a_start + a_len).unwrap(),
                        ),
                    };
                    let b = NormalizedBooking {
                        key: BookingKey { kind: BookingKind::Rental, id: 2 },
                        span: DaySpan::new(
                            date_at(anchor, b_start).unwrap(),
                            date_at(anchor, b_start + b_len).unwrap(),
                        ),
                    };
                    assert_eq!(has_conflict(&a, &[b]), has_conflict(&b, &[a]));
                    let flags = conflict_flags(&[a, b]);
                    assert_eq!(flags[&a.key], flags[&b.key]);
                }
            }
        }
    }
}

#[test]
fn utilization_stays_in_bounds() {
    let w = june_window();
    let anchor = w.range_start;
    for start in -3..9 {
        for len in 1..12 {
            let span = DaySpan::new(
                date_at(anchor, start).unwrap(),
                date_at(anchor, start + len).unwrap(),
            );
            let set = [NormalizedBooking {
                key: BookingKey { kind: BookingKind::Reservation, id: 1 },
                span,
            }];
            let pct = utilization(&set, &w);
            assert!(pct <= 100);
            let covered = project(&span, &w).map_or(0, |c| c.span);
            assert_eq!(pct == 0, covered == 0);
            assert_eq!(pct == 100, covered == w.day_count);
        }
    }
}

#[test]
fn duplicate_identity_does_not_inflate_or_self_conflict() {
    let bookings = vec![
        reservation(1, "2024-06-01", Some("2024-06-03")),
        reservation(1, "2024-06-01", Some("2024-06-03")),
    ];
    let set = normalize_car(&bookings);
    assert_eq!(set.len(), 1);
    assert!(!conflict_flags(&set)[&set[0].key]);
    assert_eq!(utilization(&set, &june_window()), 29);
}

#[test]
fn availability_tally_matches_map() {
    let fleet = vec![
        car(1, "Golf", vec![reservation(1, "2024-06-09", Some("2024-06-11"))]),
        car(2, "Polo", vec![]),
        car(3, "Up", vec![service(1, "2024-06-11", None)]),
        car(4, "Fabia", vec![rental(1, "2024-06-12", Some("2024-06-20"))]),
    ];
    let candidate = CandidateWindow::new(d("2024-06-10"), d("2024-06-12"));
    let report = resolve_availability(&candidate, &fleet).unwrap();
    let trues = report.per_car.values().filter(|v| **v).count();
    assert_eq!(report.tally().available, trues);
    assert_eq!(report.tally().total, 4);
    assert_eq!(trues, 2);
}

// ── View builder ─────────────────────────────────────────

fn demo_fleet() -> Vec<CarRow> {
    vec![
        car(1, "Skoda Octavia", vec![
            reservation(10, "2024-06-01", Some("2024-06-03")),
            rental(10, "2024-06-02", Some("2024-06-04")),
            service(3, "2024-05-01", Some("2024-05-02")),
        ]),
        car(2, "VW Polo", vec![
            service(4, "2024-06-06", None),
            reservation(11, "2024-06-09", Some("2024-06-08")),
        ]),
        car(3, "Fiat 500", vec![]),
    ]
}

#[test]
fn view_composes_every_stage() {
    let version = Ulid::new();
    let query = ViewQuery::new(june_window())
        .with_candidate(CandidateWindow::new(d("2024-06-03"), d("2024-06-05")));
    let view = build_view(version, &demo_fleet(), &query);

    assert_eq!(view.version, version);
    assert_eq!(view.cars.len(), 3);

    let octavia = &view.cars[0];
    assert_eq!(octavia.utilization, 43);
    assert_eq!(octavia.bookings.len(), 3);
    // Sorted by effective start: the May service event first, not visible.
    assert_eq!(octavia.bookings[0].key.kind, BookingKind::ServiceEvent);
    assert_eq!(octavia.bookings[0].cell, None);
    assert!(!octavia.bookings[0].conflict);
    // Same id, different kinds: distinct bookings, and they overlap.
    assert!(octavia.bookings[1].conflict);
    assert!(octavia.bookings[2].conflict);
    assert_eq!(octavia.bookings[2].cell, Some(GridCell { column: 1, span: 2 }));

    let polo = &view.cars[1];
    // Degenerate reservation 11 is dropped entirely.
    assert_eq!(polo.bookings.len(), 1);
    assert_eq!(polo.bookings[0].effective, DaySpan::new(d("2024-06-06"), d("2024-06-07")));
    assert_eq!(polo.utilization, 14);

    assert_eq!(view.day_summary, vec![1, 1, 1, 0, 0, 1, 0]);

    let availability = view.availability.as_ref().unwrap();
    assert!(!availability.per_car[&1]);
    assert!(availability.per_car[&2]);
    assert!(availability.per_car[&3]);
    assert_eq!(availability.tally(), AvailabilityTally { available: 2, total: 3 });
    assert_eq!(view.candidate_cell, Some(GridCell { column: 2, span: 2 }));
}

#[test]
fn view_hidden_kinds_still_conflict_and_block() {
    let filter = FleetFilter::default().with_kinds(KindFilter::only(&[BookingKind::Reservation]));
    let query = ViewQuery::new(june_window())
        .with_filter(filter)
        .with_candidate(CandidateWindow::new(d("2024-06-06"), d("2024-06-07")));
    let view = build_view(Ulid::new(), &demo_fleet(), &query);

    let octavia = &view.cars[0];
    assert_eq!(octavia.bookings.len(), 1);
    assert!(octavia.bookings[0].conflict);
    // Utilization reads the full set, not just visible kinds.
    assert_eq!(octavia.utilization, 43);

    assert_eq!(view.day_summary, vec![1, 1, 0, 0, 0, 0, 0]);

    // The hidden service event on the Polo still blocks it.
    let availability = view.availability.unwrap();
    assert_eq!(availability.is_available(2), Some(false));
}

#[test]
fn view_search_limits_rows_summary_and_tally() {
    let query = ViewQuery::new(june_window())
        .with_filter(FleetFilter::default().with_search("polo"))
        .with_candidate(CandidateWindow::new(d("2024-06-10"), d("2024-06-11")));
    let view = build_view(Ulid::new(), &demo_fleet(), &query);
    assert_eq!(view.cars.len(), 1);
    assert_eq!(view.cars[0].car_id, 2);
    assert_eq!(view.day_summary, vec![0, 0, 0, 0, 0, 1, 0]);
    assert_eq!(
        view.availability.unwrap().tally(),
        AvailabilityTally { available: 1, total: 1 }
    );
}

#[test]
fn view_without_valid_candidate_has_no_availability() {
    let query = ViewQuery::new(june_window()).with_candidate(CandidateWindow {
        check_in: Some(d("2024-06-10")),
        check_out: None,
    });
    let view = build_view(Ulid::new(), &demo_fleet(), &query);
    assert!(view.availability.is_none());
    assert!(view.candidate_cell.is_none());
}

#[test]
fn view_truncates_sub_day_timestamps() {
    let mut b = rental(1, "2024-06-02", Some("2024-06-04"));
    b.start = d("2024-06-02").and_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap());
    b.end = Some(d("2024-06-04").and_time(NaiveTime::from_hms_opt(0, 30, 0).unwrap()));
    let view = build_view(Ulid::new(), &[car(1, "Golf", vec![b])], &ViewQuery::new(june_window()));
    assert_eq!(view.cars[0].bookings[0].cell, Some(GridCell { column: 1, span: 2 }));
}

#[test]
fn view_flags_conflict_with_booking_past_the_window() {
    // The rental runs past the window edge; the service event overlaps only the hidden part.
    let bookings = vec![
        rental(1, "2024-06-06", Some("2024-06-12")),
        service(2, "2024-06-09", Some("2024-06-10")),
    ];
    let view = build_view(
        Ulid::new(),
        &[car(1, "Golf", bookings)],
        &ViewQuery::new(june_window()),
    );
    let rows = &view.cars[0].bookings;
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].key, BookingKey { kind: BookingKind::Rental, id: 1 });
    assert_eq!(rows[0].cell, Some(GridCell { column: 5, span: 2 }));
    assert!(rows[0].conflict);

    assert_eq!(rows[1].key, BookingKey { kind: BookingKind::ServiceEvent, id: 2 });
    assert_eq!(rows[1].cell, None);
    assert!(rows[1].conflict);
}

#[test]
fn validate_query_limits() {
    assert!(validate_query(&ViewQuery::new(june_window())).is_ok());
    assert_eq!(
        validate_query(&ViewQuery::new(VisibleWindow::new(d("2024-06-01"), 0))),
        Err(EngineError::LimitExceeded("window has no days"))
    );
    assert_eq!(
        validate_query(&ViewQuery::new(VisibleWindow::new(
            d("2024-06-01"),
            crate::limits::MAX_DAY_COUNT + 1
        ))),
        Err(EngineError::LimitExceeded("window too wide"))
    );
    let long = "x".repeat(crate::limits::MAX_SEARCH_LEN + 1);
    let query = ViewQuery::new(june_window()).with_filter(FleetFilter::default().with_search(long));
    assert_eq!(
        validate_query(&query),
        Err(EngineError::LimitExceeded("search too long"))
    );
}

#[test]
fn column_dates_line_up_with_summary() {
    let w = june_window();
    let dates = column_dates(&w);
    assert_eq!(dates.len(), day_summary(&demo_fleet(), &FleetFilter::default(), &w).len());
    assert_eq!(dates[6], d("2024-06-07"));
}
