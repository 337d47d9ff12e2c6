//! FILENAME: core/pivot-engine/src/filter.rs
//! Filter Engine - Reduces a table with an ordered chain of `FilterSpec`s.
//!
//! Semantics:
//! 1. Filters run in list order; each sees only the rows kept by the previous
//!    ones (sequential AND, no OR, no grouping).
//! 2. Inert filters (no column) are skipped silently. Filters naming a column
//!    the table does not have are skipped with a warning.
//! 3. Temporal filters first drop every row whose cell cannot be read as a
//!    date, then apply their predicate. The drop happens even if the predicate
//!    itself turns out to be unusable.
//! 4. A filter that cannot be evaluated is skipped and reported as a
//!    `FilterWarning`; the chain continues.
//!
//! The source table is never modified.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use engine::dates::{in_month, shift_month};
use engine::{CellValue, Column, Table};
use rustc_hash::FxHashSet;

use crate::cache::CacheValue;
use crate::clock::{Clock, SystemClock};
use crate::definition::{FilterOperator, FilterSpec, FilterValue, OperatorFamily};
use crate::error::{FilterIssue, FilterWarning};

/// Result of running a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// The reduced table.
    pub table: Table,
    /// One entry per skipped filter, in chain order.
    pub warnings: Vec<FilterWarning>,
}

impl FilterOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Applies `filters` to `table` using the local wall clock for relative periods.
pub fn apply_filters(table: &Table, filters: &[FilterSpec]) -> FilterOutcome {
    apply_filters_with_clock(table, filters, &SystemClock)
}

/// Applies `filters` to `table`, reading "today" from `clock`.
pub fn apply_filters_with_clock(
    table: &Table,
    filters: &[FilterSpec],
    clock: &dyn Clock,
) -> FilterOutcome {
    let mut rows: Vec<usize> = (0..table.row_count()).collect();
    let mut warnings = Vec::new();

    for (position, filter) in filters.iter().enumerate() {
        let column_name = match filter.column.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };

        let column = match table.column(column_name) {
            Some(column) => column,
            None => {
                warnings.push(skipped(position, filter, column_name, FilterIssue::MissingColumn));
                continue;
            }
        };

        if filter.operator.family() == OperatorFamily::Temporal {
            rows.retain(|&r| column.values[r].as_datetime().is_some());
        }

        match evaluate(filter, column, &rows, clock) {
            Ok(kept) => rows = kept,
            Err(issue) => warnings.push(skipped(position, filter, column_name, issue)),
        }
    }

    crate::log_debug!(
        "FILTER",
        "kept {} of {} rows ({} filters, {} skipped)",
        rows.len(),
        table.row_count(),
        filters.len(),
        warnings.len()
    );

    FilterOutcome {
        table: table.select_rows(&rows),
        warnings,
    }
}

fn skipped(position: usize, filter: &FilterSpec, column: &str, issue: FilterIssue) -> FilterWarning {
    let warning = FilterWarning {
        position,
        column: column.to_string(),
        operator: filter.operator,
        issue,
    };
    crate::log_warn!("FILTER", "{}", warning);
    warning
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Ordering comparisons shared by the relational and temporal families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn test<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
        }
    }
}

/// A resolved temporal predicate.
#[derive(Debug, Clone, Copy)]
enum DateCondition {
    Compare(Comparison, NaiveDateTime),
    Between(NaiveDateTime, NaiveDateTime),
    Month(i32, u32),
    Year(i32),
}

impl DateCondition {
    fn month_from(today: NaiveDate, delta: i32) -> Self {
        let (year, month) = shift_month(today, delta);
        DateCondition::Month(year, month)
    }

    fn matches(&self, dt: &NaiveDateTime) -> bool {
        match *self {
            DateCondition::Compare(cmp, bound) => cmp.test(dt, &bound),
            DateCondition::Between(start, end) => *dt >= start && *dt <= end,
            DateCondition::Month(year, month) => in_month(dt, year, month),
            DateCondition::Year(year) => dt.year() == year,
        }
    }
}

/// Evaluates one filter over the candidate rows and returns the rows it keeps.
fn evaluate(
    filter: &FilterSpec,
    column: &Column,
    rows: &[usize],
    clock: &dyn Clock,
) -> Result<Vec<usize>, FilterIssue> {
    use FilterOperator::*;

    match filter.operator {
        Contains | NotContains => {
            let needle = scalar(filter)?.display_value().to_lowercase();
            let wanted = filter.operator == Contains;
            Ok(keep(rows, |r| {
                let cell = &column.values[r];
                let hit = !cell.is_empty() && cell.display_value().to_lowercase().contains(&needle);
                hit == wanted
            }))
        }
        Equals | NotEquals => {
            let matcher = ValueMatcher::for_column(column, std::slice::from_ref(scalar(filter)?))?;
            let wanted = filter.operator == Equals;
            Ok(keep(rows, |r| matcher.matches(&column.values[r]) == wanted))
        }
        In | NotIn => {
            let matcher = ValueMatcher::for_column(column, &list_items(filter)?)?;
            let wanted = filter.operator == In;
            Ok(keep(rows, |r| matcher.matches(&column.values[r]) == wanted))
        }
        GreaterThan => compare_rows(Comparison::Gt, column, rows, scalar(filter)?),
        LessThan => compare_rows(Comparison::Lt, column, rows, scalar(filter)?),
        GreaterThanOrEqual => compare_rows(Comparison::Ge, column, rows, scalar(filter)?),
        LessThanOrEqual => compare_rows(Comparison::Le, column, rows, scalar(filter)?),
        IsExactly => date_rows(DateCondition::Compare(Comparison::Eq, scalar_date(filter)?), column, rows),
        IsNot => date_rows(DateCondition::Compare(Comparison::Ne, scalar_date(filter)?), column, rows),
        IsAfter => date_rows(DateCondition::Compare(Comparison::Gt, scalar_date(filter)?), column, rows),
        IsOnOrAfter => date_rows(DateCondition::Compare(Comparison::Ge, scalar_date(filter)?), column, rows),
        IsBefore => date_rows(DateCondition::Compare(Comparison::Lt, scalar_date(filter)?), column, rows),
        IsOnOrBefore => date_rows(DateCondition::Compare(Comparison::Le, scalar_date(filter)?), column, rows),
        IsBetween => {
            let (start, end) = range_dates(filter)?;
            date_rows(DateCondition::Between(start, end), column, rows)
        }
        IsCurrentMonth => date_rows(DateCondition::month_from(clock.today(), 0), column, rows),
        IsPreviousMonth => date_rows(DateCondition::month_from(clock.today(), -1), column, rows),
        IsNextMonth => date_rows(DateCondition::month_from(clock.today(), 1), column, rows),
        IsCurrentYear => date_rows(DateCondition::Year(clock.today().year()), column, rows),
        IsPreviousYear => date_rows(DateCondition::Year(clock.today().year() - 1), column, rows),
        IsNextYear => date_rows(DateCondition::Year(clock.today().year() + 1), column, rows),
    }
}

fn keep(rows: &[usize], pred: impl Fn(usize) -> bool) -> Vec<usize> {
    rows.iter().copied().filter(|&r| pred(r)).collect()
}

fn scalar(filter: &FilterSpec) -> Result<&CellValue, FilterIssue> {
    match &filter.value {
        FilterValue::Scalar(value) if !value.is_empty() => Ok(value),
        FilterValue::Scalar(_) | FilterValue::None => Err(FilterIssue::MissingValue),
        FilterValue::Range(..) => Err(FilterIssue::UnexpectedRange),
    }
}

fn scalar_date(filter: &FilterSpec) -> Result<NaiveDateTime, FilterIssue> {
    let value = scalar(filter)?;
    value
        .as_datetime()
        .ok_or_else(|| FilterIssue::InvalidDate(value.display_value()))
}

fn range_dates(filter: &FilterSpec) -> Result<(NaiveDateTime, NaiveDateTime), FilterIssue> {
    match &filter.value {
        FilterValue::Range(start, end) => match (start.as_datetime(), end.as_datetime()) {
            (Some(s), Some(e)) => Ok((s, e)),
            _ => Err(FilterIssue::InvalidRange),
        },
        FilterValue::None => Err(FilterIssue::MissingValue),
        FilterValue::Scalar(_) => Err(FilterIssue::InvalidRange),
    }
}

/// Items of an `in` / `not in` filter. Text values are comma-separated lists.
fn list_items(filter: &FilterSpec) -> Result<Vec<CellValue>, FilterIssue> {
    let items: Vec<CellValue> = match &filter.value {
        FilterValue::Scalar(CellValue::Text(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(CellValue::text)
            .collect(),
        FilterValue::Scalar(CellValue::Empty) | FilterValue::None => Vec::new(),
        FilterValue::Scalar(other) => vec![other.clone()],
        FilterValue::Range(a, b) => vec![a.clone(), b.clone()],
    };
    if items.is_empty() {
        Err(FilterIssue::MissingValue)
    } else {
        Ok(items)
    }
}

/// Rows whose (already date-coercible) cell satisfies `condition`.
fn date_rows(condition: DateCondition, column: &Column, rows: &[usize]) -> Result<Vec<usize>, FilterIssue> {
    Ok(keep(rows, |r| {
        column.values[r]
            .as_datetime()
            .map_or(false, |dt| condition.matches(&dt))
    }))
}

/// Relational comparison. Date columns compare as dates when the bound is a
/// date; everything else compares numerically. Empty cells never pass.
fn compare_rows(
    cmp: Comparison,
    column: &Column,
    rows: &[usize],
    target: &CellValue,
) -> Result<Vec<usize>, FilterIssue> {
    let mut kept = Vec::with_capacity(rows.len());

    if column.is_temporal() {
        if let Some(bound) = target.as_datetime() {
            for &r in rows {
                match &column.values[r] {
                    CellValue::Empty => {}
                    CellValue::Date(dt) => {
                        if cmp.test(dt, &bound) {
                            kept.push(r);
                        }
                    }
                    other => {
                        return Err(FilterIssue::NonDateCell {
                            row: r,
                            value: other.display_value(),
                        })
                    }
                }
            }
            return Ok(kept);
        }
    }

    let bound = target
        .as_number()
        .ok_or_else(|| FilterIssue::InvalidNumber(target.display_value()))?;

    for &r in rows {
        let cell = &column.values[r];
        if cell.is_empty() {
            continue;
        }
        match cell.as_number() {
            Some(n) => {
                if cmp.test(&n, &bound) {
                    kept.push(r);
                }
            }
            None => {
                return Err(FilterIssue::NonNumericCell {
                    row: r,
                    value: cell.display_value(),
                })
            }
        }
    }

    Ok(kept)
}

/// Exact-match targets, typed after the column they are compared against.
#[derive(Debug)]
enum ValueMatcher {
    Numbers(Vec<f64>),
    Dates(Vec<NaiveDateTime>),
    Text(Vec<String>),
}

impl ValueMatcher {
    fn for_column(column: &Column, targets: &[CellValue]) -> Result<Self, FilterIssue> {
        if column.is_numeric() {
            let numbers = targets
                .iter()
                .map(|t| t.as_number().ok_or_else(|| FilterIssue::InvalidNumber(t.display_value())))
                .collect::<Result<Vec<f64>, FilterIssue>>()?;
            return Ok(ValueMatcher::Numbers(numbers));
        }

        if column.is_temporal() {
            if let Some(dates) = targets.iter().map(CellValue::as_datetime).collect::<Option<Vec<_>>>() {
                return Ok(ValueMatcher::Dates(dates));
            }
        }

        Ok(ValueMatcher::Text(targets.iter().map(CellValue::display_value).collect()))
    }

    /// Empty cells never match.
    fn matches(&self, cell: &CellValue) -> bool {
        match (self, cell) {
            (_, CellValue::Empty) => false,
            (ValueMatcher::Numbers(targets), CellValue::Number(n)) => targets.iter().any(|t| t == n),
            (ValueMatcher::Dates(targets), CellValue::Date(dt)) => targets.contains(dt),
            (ValueMatcher::Text(targets), cell) => {
                let shown = cell.display_value();
                targets.iter().any(|t| *t == shown)
            }
            _ => false,
        }
    }
}

// ============================================================================
// CONFIGURATION-TIME HELPERS
// ============================================================================

impl FilterSpec {
    /// Fills a missing or invalid "is between" range with the column's
    /// earliest and latest dates. Evaluation never does this on its own.
    pub fn with_default_bounds(&self, table: &Table) -> FilterSpec {
        if self.operator != FilterOperator::IsBetween || range_dates(self).is_ok() {
            return self.clone();
        }

        let column = match self.column.as_deref().and_then(|name| table.column(name)) {
            Some(column) => column,
            None => return self.clone(),
        };

        let bounds = column
            .values
            .iter()
            .filter_map(CellValue::as_datetime)
            .fold(None, |acc: Option<(NaiveDateTime, NaiveDateTime)>, dt| match acc {
                None => Some((dt, dt)),
                Some((lo, hi)) => Some((lo.min(dt), hi.max(dt))),
            });

        match bounds {
            Some((lo, hi)) => FilterSpec {
                value: FilterValue::Range(CellValue::Date(lo), CellValue::Date(hi)),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

/// Distinct non-empty values of a column, sorted, when there are at most
/// `limit` of them. Used to offer a pick-list instead of free text.
pub fn distinct_values(table: &Table, column: &str, limit: usize) -> Option<Vec<CellValue>> {
    let column = table.column(column)?;
    let mut seen: FxHashSet<CacheValue> = FxHashSet::default();
    let mut values = Vec::new();

    for value in column.values.iter().filter(|v| !v.is_empty()) {
        if seen.insert(CacheValue::from(value)) {
            if values.len() == limit {
                return None;
            }
            values.push(value.clone());
        }
    }

    values.sort_by(|a, b| a.natural_cmp(b));
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn appointments() -> Table {
        Table::from_text_rows(
            &["Extra2", "Amount", "Booked", "Agent"],
            &[
                vec!["Avibra", "10", "2024-05-03", "Ann"],
                vec!["avibra", "20", "2024-04-28", "Bob"],
                vec!["Other", "5", "not a date", "ann marie"],
                vec!["Avibra", "", "2023-12-31", "Cid"],
                vec!["", "7", "", "Dee"],
            ],
        )
        .unwrap()
    }

    fn rows_of(outcome: &FilterOutcome, column: &str) -> Vec<String> {
        outcome
            .table
            .column(column)
            .unwrap()
            .values
            .iter()
            .map(CellValue::display_value)
            .collect()
    }

    #[test]
    fn empty_chain_is_identity() {
        let table = appointments();
        let outcome = apply_filters(&table, &[]);
        assert_eq!(outcome.table, table);
        assert!(outcome.is_clean());
    }

    #[test]
    fn inert_filter_is_skipped_without_warning() {
        let table = appointments();
        let outcome = apply_filters(&table, &[FilterSpec::default()]);
        assert_eq!(outcome.table, table);
        assert!(outcome.is_clean());
    }

    #[test]
    fn missing_column_warns_and_continues() {
        let table = appointments();
        let outcome = apply_filters(
            &table,
            &[
                FilterSpec::new("Nope", FilterOperator::Equals, "x"),
                FilterSpec::new("Extra2", FilterOperator::Equals, "Other"),
            ],
        );
        assert_eq!(outcome.table.row_count(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].issue, FilterIssue::MissingColumn);
        assert_eq!(outcome.warnings[0].position, 0);
    }

    #[test]
    fn equality_on_text_is_case_sensitive() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Extra2", FilterOperator::Equals, "Avibra")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "Cid"]);
    }

    #[test]
    fn not_equals_keeps_empty_cells() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Extra2", FilterOperator::NotEquals, "Avibra")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Bob", "ann marie", "Dee"]);
    }

    #[test]
    fn equality_on_numeric_column_compares_numbers() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Amount", FilterOperator::Equals, "10.0")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann"]);

        let bad = apply_filters(
            &appointments(),
            &[FilterSpec::new("Amount", FilterOperator::Equals, "ten")],
        );
        assert_eq!(bad.table.row_count(), 5);
        assert_eq!(bad.warnings[0].issue, FilterIssue::InvalidNumber("ten".to_string()));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Agent", FilterOperator::Contains, "ANN")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "ann marie"]);

        let negated = apply_filters(
            &appointments(),
            &[FilterSpec::new("Extra2", FilterOperator::NotContains, "avi")],
        );
        assert_eq!(rows_of(&negated, "Agent"), vec!["ann marie", "Dee"]);
    }

    #[test]
    fn in_list_splits_on_commas() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Agent", FilterOperator::In, "Bob, Dee")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Bob", "Dee"]);

        let excluded = apply_filters(
            &appointments(),
            &[FilterSpec::new("Amount", FilterOperator::NotIn, "10,20")],
        );
        assert_eq!(rows_of(&excluded, "Agent"), vec!["ann marie", "Cid", "Dee"]);
    }

    #[test]
    fn relational_drops_empty_cells() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Amount", FilterOperator::GreaterThanOrEqual, 7.0)],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "Bob", "Dee"]);
    }

    #[test]
    fn relational_on_text_column_is_skipped() {
        let table = appointments();
        let outcome = apply_filters(&table, &[FilterSpec::new("Agent", FilterOperator::LessThan, 3.0)]);
        assert_eq!(outcome.table, table);
        assert!(matches!(outcome.warnings[0].issue, FilterIssue::NonNumericCell { .. }));
    }

    #[test]
    fn temporal_filters_drop_unparseable_rows_first() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Booked", FilterOperator::IsOnOrAfter, "2024-01-01")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "Bob"]);
    }

    #[test]
    fn temporal_drop_survives_a_bad_value() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::new("Booked", FilterOperator::IsAfter, "whenever")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "Bob", "Cid"]);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn between_is_inclusive() {
        let outcome = apply_filters(
            &appointments(),
            &[FilterSpec::between("Booked", "2024-04-28", "2024-05-03")],
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Ann", "Bob"]);
    }

    #[test]
    fn between_without_range_warns() {
        let mut filter = FilterSpec::relative("Booked", FilterOperator::IsBetween);
        let outcome = apply_filters(&appointments(), std::slice::from_ref(&filter));
        assert_eq!(outcome.warnings[0].issue, FilterIssue::MissingValue);

        filter.value = FilterValue::Scalar(CellValue::text("2024-01-01"));
        let outcome = apply_filters(&appointments(), &[filter]);
        assert_eq!(outcome.warnings[0].issue, FilterIssue::InvalidRange);
    }

    #[test]
    fn relative_periods_use_the_injected_clock() {
        let table = appointments();
        let clock = FixedClock(ymd(2024, 5, 20));

        let current = apply_filters_with_clock(
            &table,
            &[FilterSpec::relative("Booked", FilterOperator::IsCurrentMonth)],
            &clock,
        );
        assert_eq!(rows_of(&current, "Agent"), vec!["Ann"]);

        let previous = apply_filters_with_clock(
            &table,
            &[FilterSpec::relative("Booked", FilterOperator::IsPreviousMonth)],
            &clock,
        );
        assert_eq!(rows_of(&previous, "Agent"), vec!["Bob"]);

        let last_year = apply_filters_with_clock(
            &table,
            &[FilterSpec::relative("Booked", FilterOperator::IsPreviousYear)],
            &clock,
        );
        assert_eq!(rows_of(&last_year, "Agent"), vec!["Cid"]);

        let next_month = apply_filters_with_clock(
            &table,
            &[FilterSpec::relative("Booked", FilterOperator::IsNextMonth)],
            &FixedClock(ymd(2024, 3, 31)),
        );
        assert_eq!(rows_of(&next_month, "Agent"), vec!["Bob"]);
    }

    #[test]
    fn previous_month_wraps_the_year() {
        let outcome = apply_filters_with_clock(
            &appointments(),
            &[FilterSpec::relative("Booked", FilterOperator::IsPreviousMonth)],
            &FixedClock(ymd(2024, 1, 10)),
        );
        assert_eq!(rows_of(&outcome, "Agent"), vec!["Cid"]);
    }

    #[test]
    fn default_bounds_span_the_column() {
        let filter = FilterSpec::relative("Booked", FilterOperator::IsBetween);
        let filled = filter.with_default_bounds(&appointments());
        let start = ymd(2023, 12, 31).and_hms_opt(0, 0, 0).unwrap();
        let end = ymd(2024, 5, 3).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            filled.value,
            FilterValue::Range(CellValue::Date(start), CellValue::Date(end))
        );

        let untouched = FilterSpec::between("Booked", "2024-01-01", "2024-02-01");
        assert_eq!(untouched.with_default_bounds(&appointments()), untouched);
    }

    #[test]
    fn distinct_values_respects_limit() {
        let table = appointments();
        assert_eq!(
            distinct_values(&table, "Extra2", 20),
            Some(vec![
                CellValue::text("Avibra"),
                CellValue::text("Other"),
                CellValue::text("avibra"),
            ])
        );
        assert_eq!(distinct_values(&table, "Extra2", 2), None);
        assert_eq!(distinct_values(&table, "Missing", 20), None);
    }
}
