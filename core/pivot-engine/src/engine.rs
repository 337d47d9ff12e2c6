//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - The calculation core that turns a table into a pivot.
//!
//! Algorithm:
//! 1. Validate the layout against the table (fail fast, nothing partial)
//! 2. Single pass over the source rows: intern row/column keys and feed one
//!    accumulator per value pair for the body cell and, when margins are on,
//!    for the margin row, the margin column and the corner
//! 3. Order row keys naturally and column keys by first appearance
//! 4. Compute every cell, then apply the fill value to missing cells
//!
//! Output columns are grouped by value column (first appearance wins, `size`
//! forms its own group), then by aggregation in list order, then by column key.

use engine::{CellValue, Column, Table};
use rustc_hash::FxHashMap;

use crate::cache::{all_key, AggregateAccumulator, AxisCache, GroupKey};
use crate::clock::Clock;
use crate::definition::{AggregationType, PivotComputation, PivotConfig, PivotLayout};
use crate::error::PivotError;
use crate::filter::apply_filters_with_clock;
use crate::view::{PivotCell, PivotColumn, PivotRow, PivotTable};

/// Accumulators of one (row key, column key) cell, one per value pair.
type CellGroups = FxHashMap<(GroupKey, GroupKey), Vec<AggregateAccumulator>>;

/// A value pair resolved against the source table.
#[derive(Debug, Clone)]
struct ResolvedValue<'a> {
    /// `None` for `size`.
    column: Option<&'a Column>,
    aggregation: AggregationType,
}

impl ResolvedValue<'_> {
    fn value_col(&self) -> Option<String> {
        self.column.map(|c| c.name.clone())
    }

    fn label(&self) -> String {
        self.value_col()
            .unwrap_or_else(|| self.aggregation.as_str().to_string())
    }
}

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// The calculation engine for one pivot request.
pub struct PivotCalculator<'a> {
    table: &'a Table,
    layout: &'a PivotLayout,
    row_columns: Vec<&'a Column>,
    col_columns: Vec<&'a Column>,
    values: Vec<ResolvedValue<'a>>,
}

impl<'a> PivotCalculator<'a> {
    /// Resolves the layout against the table. Fails with the first
    /// configuration problem found.
    pub fn new(table: &'a Table, layout: &'a PivotLayout) -> Result<Self, PivotError> {
        if layout.index_cols.is_empty() && layout.column_cols.is_empty() {
            return Err(PivotError::NoGroupingFields);
        }

        let active = layout.active_values();
        if active.is_empty() {
            return Err(PivotError::NoValueFields);
        }

        let lookup = |name: &str| {
            table
                .column(name)
                .ok_or_else(|| PivotError::UnknownColumn(name.to_string()))
        };

        let row_columns = layout
            .index_cols
            .iter()
            .map(|name| lookup(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let col_columns = layout
            .column_cols
            .iter()
            .map(|name| lookup(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = Vec::with_capacity(active.len());
        for pair in active {
            let column = match (pair.agg_func, pair.value_col.as_deref()) {
                (AggregationType::Size, _) => None,
                (_, Some(name)) => Some(lookup(name)?),
                (_, None) => continue,
            };
            values.push(ResolvedValue {
                column,
                aggregation: pair.agg_func,
            });
        }

        Ok(PivotCalculator {
            table,
            layout,
            row_columns,
            col_columns,
            values: group_by_value_column(values),
        })
    }

    /// Executes the calculation and returns the pivot.
    pub fn calculate(&self) -> Result<PivotTable, PivotError> {
        crate::log_enter!(
            "PIVOT",
            "calculate",
            "rows={} index={:?} columns={:?} values={}",
            self.table.row_count(),
            self.layout.index_cols,
            self.layout.column_cols,
            self.values.len()
        );

        let mut row_axis = AxisCache::new(self.layout.index_cols.as_slice());
        let mut col_axis = AxisCache::new(self.layout.column_cols.as_slice());
        let mut groups = CellGroups::default();

        let margin_rows = self.layout.margins_enabled && !self.row_columns.is_empty();
        let margin_cols = self.layout.margins_enabled && !self.col_columns.is_empty();
        let all_rows = all_key(self.row_columns.len());
        let all_cols = all_key(self.col_columns.len());
        let mut skipped = 0usize;

        for row in 0..self.table.row_count() {
            let row_key = row_axis.intern_row(self.row_columns.iter().map(|c| &c.values[row]));
            let col_key = col_axis.intern_row(self.col_columns.iter().map(|c| &c.values[row]));
            let (row_key, col_key) = match (row_key, col_key) {
                (Some(r), Some(c)) => (r, c),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            if margin_rows {
                self.accumulate(&mut groups, (all_rows.clone(), col_key.clone()), row);
            }
            if margin_cols {
                self.accumulate(&mut groups, (row_key.clone(), all_cols.clone()), row);
            }
            if margin_rows && margin_cols {
                self.accumulate(&mut groups, (all_rows.clone(), all_cols.clone()), row);
            }
            self.accumulate(&mut groups, (row_key, col_key), row);
        }

        if skipped > 0 {
            crate::log_debug!("PIVOT", "{} rows with empty grouping values left out", skipped);
        }

        let mut row_keys = row_axis.sorted_keys();
        let col_keys: Vec<GroupKey> = col_axis.first_seen().to_vec();

        let margins_label = CellValue::text(self.layout.margins_name.clone());
        let mut rows: Vec<PivotRow> = row_keys
            .iter()
            .map(|key| PivotRow {
                key: row_axis.decode(key),
                is_margin: false,
            })
            .collect();
        if margin_rows {
            rows.push(PivotRow {
                key: margin_key(&margins_label, self.row_columns.len()),
                is_margin: true,
            });
            row_keys.push(all_rows);
        }

        let mut columns = Vec::new();
        let mut column_slots: Vec<(usize, GroupKey)> = Vec::new();
        for (value_index, value) in self.values.iter().enumerate() {
            for key in &col_keys {
                columns.push(PivotColumn {
                    value_col: value.value_col(),
                    aggregation: value.aggregation,
                    key: col_axis.decode(key),
                    is_margin: false,
                });
                column_slots.push((value_index, key.clone()));
            }
            if margin_cols {
                columns.push(PivotColumn {
                    value_col: value.value_col(),
                    aggregation: value.aggregation,
                    key: margin_key(&margins_label, self.col_columns.len()),
                    is_margin: true,
                });
                column_slots.push((value_index, all_cols.clone()));
            }
        }

        let fill = self.layout.effective_fill();
        let mut cells = Vec::with_capacity(row_keys.len());
        for row_key in &row_keys {
            let mut line = Vec::with_capacity(column_slots.len());
            for (value_index, col_key) in &column_slots {
                let computed = match groups.get(&(row_key.clone(), col_key.clone())) {
                    Some(accumulators) => self.compute(&accumulators[*value_index], *value_index)?,
                    None => None,
                };
                line.push(match (computed, fill) {
                    (Some(value), _) => PivotCell::Value(value),
                    (None, Some(fill)) => PivotCell::Value(fill.clone()),
                    (None, None) => PivotCell::Missing,
                });
            }
            cells.push(line);
        }

        crate::log_exit!(
            "PIVOT",
            "calculate",
            "{}x{} cells from {} groups",
            rows.len(),
            columns.len(),
            groups.len()
        );

        Ok(PivotTable {
            row_fields: self.layout.index_cols.clone(),
            column_fields: self.layout.column_cols.clone(),
            rows,
            columns,
            cells,
        })
    }

    fn accumulate(&self, groups: &mut CellGroups, key: (GroupKey, GroupKey), row: usize) {
        let accumulators = groups.entry(key).or_insert_with(|| {
            self.values
                .iter()
                .map(|v| AggregateAccumulator::new(v.aggregation))
                .collect()
        });
        for (acc, value) in accumulators.iter_mut().zip(&self.values) {
            acc.add(value.column.map(|c| &c.values[row]));
        }
    }

    fn compute(&self, acc: &AggregateAccumulator, value_index: usize) -> Result<Option<CellValue>, PivotError> {
        acc.compute().map_err(|reason| {
            let value = &self.values[value_index];
            let error = PivotError::Aggregation {
                column: value.label(),
                aggregation: value.aggregation,
                reason,
            };
            crate::log_error!("PIVOT", "{}", error);
            error
        })
    }
}

/// Stable regrouping so every pair of one value column sits together.
fn group_by_value_column(values: Vec<ResolvedValue<'_>>) -> Vec<ResolvedValue<'_>> {
    let mut order: Vec<Option<&str>> = Vec::new();
    for value in &values {
        let name = value.column.map(|c| c.name.as_str());
        if !order.contains(&name) {
            order.push(name);
        }
    }

    let mut grouped = Vec::with_capacity(values.len());
    for name in order {
        grouped.extend(
            values
                .iter()
                .filter(|v| v.column.map(|c| c.name.as_str()) == name)
                .cloned(),
        );
    }
    grouped
}

/// Header key of a margin: the label on the outermost field, blanks below.
fn margin_key(label: &CellValue, field_count: usize) -> Vec<CellValue> {
    let mut key = vec![CellValue::Empty; field_count];
    if let Some(first) = key.first_mut() {
        *first = label.clone();
    }
    key
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Builds a pivot of `table` according to `layout`.
/// This is the main entry point for the calculation engine.
pub fn build_pivot(table: &Table, layout: &PivotLayout) -> Result<PivotTable, PivotError> {
    PivotCalculator::new(table, layout)?.calculate()
}

/// Filters `table` with the slot's filter chain and pivots the result.
///
/// The layout is validated before filtering, so configuration errors win
/// over `NoData`.
pub fn run_pivot(
    table: &Table,
    config: &PivotConfig,
    clock: &dyn Clock,
) -> Result<PivotComputation, PivotError> {
    PivotCalculator::new(table, &config.layout)?;

    let outcome = apply_filters_with_clock(table, &config.filters, clock);
    if outcome.table.is_empty() {
        crate::log_info!("PIVOT", "'{}': no rows left after filtering", config.name);
        return Err(PivotError::NoData);
    }

    let pivot = build_pivot(&outcome.table, &config.layout)?;
    crate::log_info!(
        "PIVOT",
        "'{}': {} of {} rows -> {}x{} pivot",
        config.name,
        outcome.table.row_count(),
        table.row_count(),
        pivot.row_count(),
        pivot.column_count()
    );

    Ok(PivotComputation {
        table: pivot,
        filtered_rows: outcome.table.row_count(),
        warnings: outcome.warnings,
    })
}
