//! FILENAME: core/engine/src/table.rs
//! PURPOSE: The in-memory table consumed by the filter and pivot engines.
//! CONTEXT: A `Table` is an ordered list of named columns of equal length.
//! Tables are treated as immutable values: every transformation returns a
//! new table and leaves its input untouched.

use thiserror::Error;

use crate::cell::CellValue;

/// A single named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every non-empty value is a number (and at least one exists).
    pub fn is_numeric(&self) -> bool {
        self.all_non_empty(|v| matches!(v, CellValue::Number(_)))
    }

    /// True when every non-empty value is a date (and at least one exists).
    pub fn is_temporal(&self) -> bool {
        self.all_non_empty(|v| matches!(v, CellValue::Date(_)))
    }

    fn all_non_empty(&self, pred: impl Fn(&CellValue) -> bool) -> bool {
        let mut seen = false;
        for value in self.values.iter().filter(|v| !v.is_empty()) {
            if !pred(value) {
                return false;
            }
            seen = true;
        }
        seen
    }
}

/// Errors raised while assembling a table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("column '{column}' has {found} values, expected {expected}")]
    RaggedColumn { column: String, expected: usize, found: usize },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// An ordered collection of named columns. Rows are indexed 0..N-1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Builds a table from columns, checking they are rectangular and uniquely named.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        for (i, column) in columns.iter().enumerate() {
            if column.len() != row_count {
                return Err(TableError::RaggedColumn {
                    column: column.name.clone(),
                    expected: row_count,
                    found: column.len(),
                });
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Table { columns, row_count })
    }

    /// Builds a table from row-major values. Short rows are padded with `Empty`.
    pub fn from_rows<S: AsRef<str>>(
        headers: &[S],
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, TableError> {
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::new(h.as_ref(), Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut values = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(values.next().unwrap_or(CellValue::Empty));
            }
        }

        Table::new(columns)
    }

    /// Builds a table from raw text rows, inferring each cell's type.
    pub fn from_text_rows<S: AsRef<str>, T: AsRef<str>>(
        headers: &[S],
        rows: &[Vec<T>],
    ) -> Result<Self, TableError> {
        let typed = rows
            .iter()
            .map(|row| row.iter().map(|raw| CellValue::infer(raw.as_ref())).collect())
            .collect();
        Table::from_rows(headers, typed)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns the value at (row, column name), if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Returns a copy of one row in column order.
    pub fn row(&self, row: usize) -> Option<Vec<CellValue>> {
        if row >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[row].clone()).collect())
    }

    /// Returns a new table holding only the given rows, in the given order.
    /// Out-of-range indices are ignored.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let rows: Vec<usize> = rows.iter().copied().filter(|&r| r < self.row_count).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Table {
            columns,
            row_count: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            &["Department", "Amount"],
            vec![
                vec![CellValue::text("A"), CellValue::Number(10.0)],
                vec![CellValue::text("A"), CellValue::Number(20.0)],
                vec![CellValue::text("B"), CellValue::Number(5.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn builds_from_rows() {
        let table = sample();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names(), vec!["Department", "Amount"]);
        assert_eq!(table.value(2, "Amount"), Some(&CellValue::Number(5.0)));
    }

    #[test]
    fn pads_short_rows() {
        let table = Table::from_rows(&["a", "b"], vec![vec![CellValue::Number(1.0)]]).unwrap();
        assert_eq!(table.value(0, "b"), Some(&CellValue::Empty));
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let ragged = Table::new(vec![
            Column::new("a", vec![CellValue::Empty]),
            Column::new("b", vec![]),
        ]);
        assert!(matches!(ragged, Err(TableError::RaggedColumn { .. })));

        let dup = Table::new(vec![Column::new("a", vec![]), Column::new("a", vec![])]);
        assert_eq!(dup, Err(TableError::DuplicateColumn("a".to_string())));
    }

    #[test]
    fn select_rows_leaves_source_untouched() {
        let table = sample();
        let subset = table.select_rows(&[2, 0, 99]);
        assert_eq!(subset.row_count(), 2);
        assert_eq!(subset.value(0, "Department"), Some(&CellValue::text("B")));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn text_rows_are_typed() {
        let table = Table::from_text_rows(
            &["when", "amount"],
            &[vec!["2024-02-01", "12"], vec!["0000-00-00", "x"]],
        )
        .unwrap();
        assert!(table.column("when").unwrap().is_temporal());
        assert!(!table.column("amount").unwrap().is_numeric());
        assert_eq!(table.value(1, "when"), Some(&CellValue::Empty));
    }
}
