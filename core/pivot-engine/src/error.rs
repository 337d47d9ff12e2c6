//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

use crate::definition::{AggregationType, FilterOperator};

/// Fatal errors of a single pivot request. No partial table accompanies them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("Select at least one row or column field.")]
    NoGroupingFields,

    #[error("Select at least one value column and aggregation.")]
    NoValueFields,

    #[error("Column '{0}' not found in the source data.")]
    UnknownColumn(String),

    #[error("No data after applying filters.")]
    NoData,

    #[error("Cannot compute {aggregation} of '{column}': {reason}")]
    Aggregation {
        column: String,
        aggregation: AggregationType,
        reason: String,
    },
}

impl PivotError {
    /// True for errors caused by an incomplete configuration rather than the data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, PivotError::NoGroupingFields | PivotError::NoValueFields)
    }
}

/// Why a single filter could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterIssue {
    #[error("column not found")]
    MissingColumn,

    #[error("no value given")]
    MissingValue,

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("'{0}' is not a date")]
    InvalidDate(String),

    #[error("expected a start and an end date")]
    InvalidRange,

    #[error("expected a single value, got a range")]
    UnexpectedRange,

    #[error("row {row} holds non-numeric value '{value}'")]
    NonNumericCell { row: usize, value: String },

    #[error("row {row} holds non-date value '{value}'")]
    NonDateCell { row: usize, value: String },
}

/// A filter that was skipped. The rest of the chain still runs.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not apply filter #{position} on '{column}' ({operator}): {issue}")]
pub struct FilterWarning {
    /// Index of the filter in its chain.
    pub position: usize,
    pub column: String,
    pub operator: FilterOperator,
    pub issue: FilterIssue,
}

/// Errors parsing definition labels (operators, aggregations).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown aggregation: {0}")]
    UnknownAggregation(String),
}

/// Errors of workspace slot management.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("No pivot at position {0}")]
    NoSuchPivot(usize),

    #[error("Pivot name cannot be empty")]
    EmptyName,

    #[error("A pivot named '{0}' already exists")]
    DuplicateName(String),
}
