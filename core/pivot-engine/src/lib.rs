//! FILENAME: core/pivot-engine/src/lib.rs
//! Filter and pivot subsystem.
//!
//! This crate reduces a table with a chain of filters and summarizes the
//! result as a pivot table. It depends on `engine` only for the shared table
//! types (CellValue, Column, Table).
//!
//! Layers:
//! - `definition`: Configuration (what a pivot slot IS)
//! - `filter`: Sequential filter chain (WHICH rows take part)
//! - `cache`: Interned keys and accumulators (HOW we compute)
//! - `view`: The computed grid (WHAT we display)
//! - `engine`: Calculation entry points
//! - `workspace`: Caller-owned slots and refresh

#[doc(hidden)]
pub use log;

pub mod logging;

pub mod cache;
pub mod clock;
pub mod definition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod view;
pub mod workspace;

pub use clock::{Clock, FixedClock, SystemClock};
pub use definition::*;
pub use error::{DefinitionError, FilterIssue, FilterWarning, PivotError, WorkspaceError};
pub use filter::{apply_filters, apply_filters_with_clock, distinct_values, FilterOutcome};
pub use self::engine::{build_pivot, run_pivot, PivotCalculator};
pub use view::{PivotCell, PivotColumn, PivotRow, PivotTable, HEADER_SEPARATOR};
pub use workspace::PivotWorkspace;
