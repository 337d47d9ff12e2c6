//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot-engine integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use engine::{CellValue, Table};
use pivot_engine::{FixedClock, PivotCell, PivotTable, ValueAgg};

// ============================================================================
// FIXTURES
// ============================================================================

/// The two-department example: A = 10 + 20, B = 5.
pub struct DepartmentFixture;

impl DepartmentFixture {
    pub fn table() -> Table {
        Table::from_text_rows(
            &["Department", "Amount"],
            &[vec!["A", "10"], vec!["A", "20"], vec!["B", "5"]],
        )
        .unwrap()
    }
}

/// Sales by region, product and quarter.
pub struct SalesFixture;

impl SalesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Region", "Product", "Quarter", "Sales", "Quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
        ]
    }

    pub fn table() -> Table {
        let rows = Self::data()
            .into_iter()
            .map(|(region, product, quarter, sales, quantity)| {
                vec![
                    CellValue::text(region),
                    CellValue::text(product),
                    CellValue::text(quarter),
                    CellValue::Number(sales),
                    CellValue::Number(quantity),
                ]
            })
            .collect();
        Table::from_rows(&Self::headers(), rows).unwrap()
    }
}

/// Appointment export with a free-text column and a partly dirty date column.
pub struct AppointmentFixture;

impl AppointmentFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Extra2", "Agent", "Booked", "Fee"]
    }

    pub fn table() -> Table {
        Table::from_text_rows(
            &Self::headers(),
            &[
                vec!["Avibra", "Ann", "2024-05-03", "100"],
                vec!["Avibra", "Bob", "2024-05-17 14:30", "80"],
                vec!["Other", "Ann", "2024-04-11", "120"],
                vec!["avibra", "Cid", "0000-00-00", "60"],
                vec!["Avibra", "Cid", "pending", "90"],
                vec!["Other", "Bob", "2023-11-30", "40"],
            ],
        )
        .unwrap()
    }

    /// 2024-05-20, inside the fixture's busiest month.
    pub fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn text(s: &str) -> CellValue {
    CellValue::text(s)
}

/// The body cell at (row key, value pair, column key).
pub fn body_cell<'a>(
    pivot: &'a PivotTable,
    row: &[CellValue],
    value: &ValueAgg,
    column: &[CellValue],
) -> &'a PivotCell {
    let r = pivot
        .find_row(row)
        .unwrap_or_else(|| panic!("row {:?} not found", row));
    let c = pivot
        .find_column(value, column)
        .unwrap_or_else(|| panic!("column {:?} not found", column));
    pivot.cell(r, c).unwrap()
}

/// Assert that a cell holds an expected number.
pub fn assert_number(cell: &PivotCell, expected: f64) {
    match cell.as_number() {
        Some(n) => assert!(
            (n - expected).abs() < 0.001,
            "expected {} but got {}",
            expected,
            n
        ),
        None => panic!("expected Number({}) but got {:?}", expected, cell),
    }
}

/// The values of one column of a table, as display strings.
pub fn column_strings(table: &Table, column: &str) -> Vec<String> {
    table
        .column(column)
        .unwrap()
        .values
        .iter()
        .map(CellValue::display_value)
        .collect()
}
