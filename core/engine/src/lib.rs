//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the tabular data model.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod cell;
pub mod dates;
pub mod table;

// Re-export commonly used types at the crate root
pub use cell::{CellValue, NULL_DATE_SENTINEL};
pub use dates::{format_datetime, parse_datetime, to_iso};
pub use table::{Column, Table, TableError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_tables_from_text() {
        let table = Table::from_text_rows(
            &["Extra2", "Amount"],
            &[vec!["Avibra", "10"], vec!["Other", "20"]],
        )
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, "Amount"), Some(&CellValue::Number(10.0)));
        assert!(table.column("Amount").unwrap().is_numeric());
    }

    #[test]
    fn cell_values_serialize() {
        let json = serde_json::to_string(&CellValue::Number(1.5)).unwrap();
        let back: CellValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellValue::Number(1.5));
    }
}
