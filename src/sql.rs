use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed read-only query. Every table is a projection of the same calendar view.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectGrid(Filters),
    SelectUtilization(Filters),
    SelectDaySummary(Filters),
    SelectAvailability(Filters),
}

impl Command {
    pub fn filters(&self) -> &Filters {
        match self {
            Command::SelectGrid(f)
            | Command::SelectUtilization(f)
            | Command::SelectDaySummary(f)
            | Command::SelectAvailability(f) => f,
        }
    }
}

/// `WHERE` equality filters. Absent means "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub start: Option<Day>,
    pub days: Option<u32>,
    pub search: Option<String>,
    pub kinds: Option<KindFilter>,
    pub check_in: Option<Day>,
    pub check_out: Option<Day>,
}

impl Filters {
    /// Build the engine query, filling a missing window from `today` / `default_days`.
    pub fn view_query(&self, today: Day, default_days: u32) -> ViewQuery {
        let window = VisibleWindow::new(
            self.start.unwrap_or(today),
            self.days.unwrap_or(default_days),
        );
        let filter = FleetFilter {
            search: self.search.clone(),
            kinds: self.kinds.unwrap_or_default(),
        };
        let mut query = ViewQuery::new(window).with_filter(filter);
        if self.check_in.is_some() || self.check_out.is_some() {
            query = query.with_candidate(CandidateWindow {
                check_in: self.check_in,
                check_out: self.check_out,
            });
        }
        query
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "grid" => Ok(Command::SelectGrid(require_window(filters)?)),
        "utilization" => Ok(Command::SelectUtilization(require_window(filters)?)),
        "day_summary" => Ok(Command::SelectDaySummary(require_window(filters)?)),
        // Window is optional here: the verdict never depends on it.
        "availability" => Ok(Command::SelectAvailability(filters)),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn require_window(filters: Filters) -> Result<Filters, SqlError> {
    if filters.start.is_none() {
        return Err(SqlError::MissingFilter("start"));
    }
    if filters.days.is_none() {
        return Err(SqlError::MissingFilter("days"));
    }
    Ok(filters)
}

fn extract_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_filters(inner, filters),
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_filters(left, filters)?;
                extract_filters(right, filters)
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
                match col.as_str() {
                    "start" => filters.start = parse_day_or_null(right)?,
                    "days" => filters.days = Some(parse_u32_expr(right)?),
                    "search" => filters.search = Some(parse_string_expr(right)?),
                    "kinds" => filters.kinds = Some(parse_kinds(&parse_string_expr(right)?)?),
                    "check_in" => filters.check_in = parse_day_or_null(right)?,
                    "check_out" => filters.check_out = parse_day_or_null(right)?,
                    _ => return Err(SqlError::Unsupported(format!("filter on {col}"))),
                }
                Ok(())
            }
            _ => Err(SqlError::Unsupported(format!("operator {op}"))),
        },
        _ => Err(SqlError::Unsupported(format!("condition {expr}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::BadValue(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_day_or_null(expr: &Expr) -> Result<Option<Day>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|e| SqlError::BadValue(format!("bad date '{s}': {e}"))),
        Some(value) => Err(SqlError::BadValue(format!("expected 'YYYY-MM-DD', got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_u32_expr(expr: &Expr) -> Result<u32, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .trim()
            .parse()
            .map_err(|e| SqlError::BadValue(format!("bad count '{s}': {e}"))),
        Some(value) => Err(SqlError::BadValue(format!("expected number, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// Comma-separated kind list. An empty list hides every kind.
fn parse_kinds(raw: &str) -> Result<KindFilter, SqlError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = BookingKind::parse(part)
            .ok_or_else(|| SqlError::BadValue(format!("unknown booking kind: {part}")))?;
        kinds.push(kind);
    }
    Ok(KindFilter::only(&kinds))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    MissingFilter(&'static str),
    BadValue(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadValue(s) => write!(f, "bad value: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}
