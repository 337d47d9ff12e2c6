//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot View - The computed result of a pivot.
//!
//! Layout is row-major: `cells[r][c]` belongs to `rows[r]` and `columns[c]`.
//! Columns are ordered by value pair first, then by column key, with each
//! pair's margin column (if any) after its keys. The margin row, if any, is last.

use engine::{CellValue, Column, Table, TableError};

use crate::definition::{AggregationType, ValueAgg};

/// Separator between the parts of a flattened column header.
pub const HEADER_SEPARATOR: &str = " / ";

/// One computed cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PivotCell {
    Value(CellValue),
    /// No source rows for this combination, or an undefined aggregate.
    #[default]
    Missing,
}

impl PivotCell {
    pub fn is_missing(&self) -> bool {
        matches!(self, PivotCell::Missing)
    }

    pub fn value(&self) -> Option<&CellValue> {
        match self {
            PivotCell::Value(v) => Some(v),
            PivotCell::Missing => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        self.value().and_then(CellValue::as_number)
    }

    /// The cell as a plain table value; missing becomes `Empty`.
    pub fn to_cell_value(&self) -> CellValue {
        self.value().cloned().unwrap_or(CellValue::Empty)
    }
}

/// A row header: one value per row field.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: Vec<CellValue>,
    pub is_margin: bool,
}

/// A column header: the value pair plus one value per column field.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotColumn {
    /// `None` for `size`, which has no value column.
    pub value_col: Option<String>,
    pub aggregation: AggregationType,
    pub key: Vec<CellValue>,
    pub is_margin: bool,
}

impl PivotColumn {
    /// The value column's name, or the aggregation name for `size`.
    pub fn value_label(&self) -> String {
        match &self.value_col {
            Some(col) => col.clone(),
            None => self.aggregation.as_str().to_string(),
        }
    }

    fn qualified_label(&self) -> String {
        match &self.value_col {
            Some(col) => format!("{}({})", self.aggregation, col),
            None => self.aggregation.as_str().to_string(),
        }
    }

    fn is_pair(&self, value: &ValueAgg) -> bool {
        let wanted = if value.agg_func == AggregationType::Size {
            None
        } else {
            value.value_col.as_deref()
        };
        self.aggregation == value.agg_func && self.value_col.as_deref() == wanted
    }
}

/// A 2-D grid of aggregated values with row and column headers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PivotTable {
    pub row_fields: Vec<String>,
    pub column_fields: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub columns: Vec<PivotColumn>,
    pub cells: Vec<Vec<PivotCell>>,
}

impl PivotTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&PivotCell> {
        self.cells.get(row).and_then(|r| r.get(column))
    }

    /// Index of the body row with the given key.
    pub fn find_row(&self, key: &[CellValue]) -> Option<usize> {
        self.rows.iter().position(|r| !r.is_margin && r.key == key)
    }

    pub fn margin_row(&self) -> Option<usize> {
        self.rows.iter().position(|r| r.is_margin)
    }

    /// Index of the body column for `value` under the given column key.
    pub fn find_column(&self, value: &ValueAgg, key: &[CellValue]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| !c.is_margin && c.is_pair(value) && c.key == key)
    }

    /// Index of the margin column for `value`.
    pub fn margin_column(&self, value: &ValueAgg) -> Option<usize> {
        self.columns.iter().position(|c| c.is_margin && c.is_pair(value))
    }

    /// Flattened column headers. Value labels are qualified as `agg(col)`
    /// when the same column is aggregated more than once.
    pub fn column_headers(&self) -> Vec<String> {
        let mut pairs: Vec<(&Option<String>, AggregationType)> = Vec::new();
        for column in &self.columns {
            if !pairs.contains(&(&column.value_col, column.aggregation)) {
                pairs.push((&column.value_col, column.aggregation));
            }
        }

        self.columns
            .iter()
            .map(|column| {
                let repeated = pairs
                    .iter()
                    .filter(|(col, _)| *col == &column.value_col)
                    .count()
                    > 1;
                let label = if repeated {
                    column.qualified_label()
                } else {
                    column.value_label()
                };

                let mut parts = vec![label];
                parts.extend(
                    column
                        .key
                        .iter()
                        .map(CellValue::display_value)
                        .filter(|part| !part.is_empty()),
                );
                parts.join(HEADER_SEPARATOR)
            })
            .collect()
    }

    /// Flattens the pivot into a plain table: one column per row field
    /// followed by one column per value column. Missing cells become `Empty`.
    pub fn to_table(&self) -> Result<Table, TableError> {
        let mut columns: Vec<Column> = self
            .row_fields
            .iter()
            .enumerate()
            .map(|(level, name)| {
                let values = self
                    .rows
                    .iter()
                    .map(|r| r.key.get(level).cloned().unwrap_or(CellValue::Empty))
                    .collect();
                Column::new(name.clone(), values)
            })
            .collect();

        for (index, header) in self.column_headers().into_iter().enumerate() {
            let values = self
                .cells
                .iter()
                .map(|row| row.get(index).map(PivotCell::to_cell_value).unwrap_or(CellValue::Empty))
                .collect();
            columns.push(Column::new(header, values));
        }

        Table::new(columns)
    }

    /// Per column, the mean of its body cells with missing cells counted as 0.
    /// `None` when there are no body rows or a cell is not numeric.
    pub fn column_means(&self) -> Vec<(String, Option<f64>)> {
        let body: Vec<&Vec<PivotCell>> = self
            .rows
            .iter()
            .zip(self.cells.iter())
            .filter(|(row, _)| !row.is_margin)
            .map(|(_, cells)| cells)
            .collect();

        self.column_headers()
            .into_iter()
            .enumerate()
            .map(|(index, header)| {
                if body.is_empty() {
                    return (header, None);
                }
                let mut total = 0.0;
                for cells in &body {
                    match cells.get(index) {
                        None | Some(PivotCell::Missing) => {}
                        Some(cell) => match cell.as_number() {
                            Some(n) => total += n,
                            None => return (header, None),
                        },
                    }
                }
                (header, Some(total / body.len() as f64))
            })
            .collect()
    }
}
