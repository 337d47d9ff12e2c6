//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The configuration a user builds up field by field.
//!
//! This module contains all the types needed to DESCRIBE a pivot:
//! - the filter chain (`FilterSpec`, `FilterOperator`, `FilterValue`)
//! - the grouping and aggregation layout (`PivotLayout`, `ValueAgg`)
//! - the named slot wrapper (`PivotConfig`) with its computation status
//!
//! Nothing here evaluates anything; see `filter` and `engine`.

use std::fmt;
use std::str::FromStr;

use engine::CellValue;
use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, FilterWarning};
use crate::view::PivotTable;

/// Default label for the margin row/column.
pub const DEFAULT_MARGINS_NAME: &str = "All_Totals";

// ============================================================================
// FILTER OPERATORS
// ============================================================================

/// The three operator families. Each constrains the shape of a filter's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorFamily {
    /// Scalar string/number comparisons and substring tests.
    Equality,
    /// Numeric ordering comparisons.
    Relational,
    /// Date comparisons, ranges and relative periods.
    Temporal,
}

/// A filter predicate. Serialized as its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "does not contain")]
    NotContains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "is exactly")]
    IsExactly,
    #[serde(rename = "is not")]
    IsNot,
    #[serde(rename = "is after")]
    IsAfter,
    #[serde(rename = "is on or after")]
    IsOnOrAfter,
    #[serde(rename = "is before")]
    IsBefore,
    #[serde(rename = "is on or before")]
    IsOnOrBefore,
    #[serde(rename = "is between (inclusive)")]
    IsBetween,
    #[serde(rename = "is current month")]
    IsCurrentMonth,
    #[serde(rename = "is previous month")]
    IsPreviousMonth,
    #[serde(rename = "is next month")]
    IsNextMonth,
    #[serde(rename = "is current year")]
    IsCurrentYear,
    #[serde(rename = "is previous year")]
    IsPreviousYear,
    #[serde(rename = "is next year")]
    IsNextYear,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 23] = [
        FilterOperator::Equals,
        FilterOperator::NotEquals,
        FilterOperator::Contains,
        FilterOperator::NotContains,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThanOrEqual,
        FilterOperator::IsExactly,
        FilterOperator::IsNot,
        FilterOperator::IsAfter,
        FilterOperator::IsOnOrAfter,
        FilterOperator::IsBefore,
        FilterOperator::IsOnOrBefore,
        FilterOperator::IsBetween,
        FilterOperator::IsCurrentMonth,
        FilterOperator::IsPreviousMonth,
        FilterOperator::IsNextMonth,
        FilterOperator::IsCurrentYear,
        FilterOperator::IsPreviousYear,
        FilterOperator::IsNextYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "==",
            FilterOperator::NotEquals => "!=",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "does not contain",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not in",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::IsExactly => "is exactly",
            FilterOperator::IsNot => "is not",
            FilterOperator::IsAfter => "is after",
            FilterOperator::IsOnOrAfter => "is on or after",
            FilterOperator::IsBefore => "is before",
            FilterOperator::IsOnOrBefore => "is on or before",
            FilterOperator::IsBetween => "is between (inclusive)",
            FilterOperator::IsCurrentMonth => "is current month",
            FilterOperator::IsPreviousMonth => "is previous month",
            FilterOperator::IsNextMonth => "is next month",
            FilterOperator::IsCurrentYear => "is current year",
            FilterOperator::IsPreviousYear => "is previous year",
            FilterOperator::IsNextYear => "is next year",
        }
    }

    pub fn family(&self) -> OperatorFamily {
        match self {
            FilterOperator::Equals
            | FilterOperator::NotEquals
            | FilterOperator::Contains
            | FilterOperator::NotContains
            | FilterOperator::In
            | FilterOperator::NotIn => OperatorFamily::Equality,
            FilterOperator::GreaterThan
            | FilterOperator::LessThan
            | FilterOperator::GreaterThanOrEqual
            | FilterOperator::LessThanOrEqual => OperatorFamily::Relational,
            FilterOperator::IsExactly
            | FilterOperator::IsNot
            | FilterOperator::IsAfter
            | FilterOperator::IsOnOrAfter
            | FilterOperator::IsBefore
            | FilterOperator::IsOnOrBefore
            | FilterOperator::IsBetween
            | FilterOperator::IsCurrentMonth
            | FilterOperator::IsPreviousMonth
            | FilterOperator::IsNextMonth
            | FilterOperator::IsCurrentYear
            | FilterOperator::IsPreviousYear
            | FilterOperator::IsNextYear => OperatorFamily::Temporal,
        }
    }

    /// Relative-period operators compare against "today" and take no value.
    pub fn is_relative_period(&self) -> bool {
        matches!(
            self,
            FilterOperator::IsCurrentMonth
                | FilterOperator::IsPreviousMonth
                | FilterOperator::IsNextMonth
                | FilterOperator::IsCurrentYear
                | FilterOperator::IsPreviousYear
                | FilterOperator::IsNextYear
        )
    }

    pub fn requires_value(&self) -> bool {
        !self.is_relative_period()
    }
}

impl Default for FilterOperator {
    fn default() -> Self {
        FilterOperator::Equals
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FilterOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| DefinitionError::UnknownOperator(s.to_string()))
    }
}

// ============================================================================
// FILTER SPEC
// ============================================================================

/// The value side of a filter. Its shape depends on the operator family.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterValue {
    /// No value (relative-period operators, or not yet chosen).
    #[default]
    None,
    /// A single string, number or date.
    Scalar(CellValue),
    /// An inclusive pair, used by "is between (inclusive)".
    Range(CellValue, CellValue),
}

impl FilterValue {
    pub fn as_scalar(&self) -> Option<&CellValue> {
        match self {
            FilterValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FilterValue::None)
    }
}

impl From<CellValue> for FilterValue {
    fn from(value: CellValue) -> Self {
        if value.is_empty() {
            FilterValue::None
        } else {
            FilterValue::Scalar(value)
        }
    }
}

/// One predicate in a sequential AND-chain.
///
/// A spec without a column is inert: the filter engine skips it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    pub column: Option<String>,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<CellValue>) -> Self {
        FilterSpec {
            column: Some(column.into()),
            operator,
            value: FilterValue::from(value.into()),
        }
    }

    /// A relative-period filter ("is current month", ...), which needs no value.
    pub fn relative(column: impl Into<String>, operator: FilterOperator) -> Self {
        FilterSpec {
            column: Some(column.into()),
            operator,
            value: FilterValue::None,
        }
    }

    /// An inclusive "is between" filter.
    pub fn between(column: impl Into<String>, start: impl Into<CellValue>, end: impl Into<CellValue>) -> Self {
        FilterSpec {
            column: Some(column.into()),
            operator: FilterOperator::IsBetween,
            value: FilterValue::Range(start.into(), end.into()),
        }
    }

    pub fn is_inert(&self) -> bool {
        self.column.as_deref().map_or(true, str::is_empty)
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Size,
    Std,
    Var,
    Nunique,
}

impl AggregationType {
    pub const ALL: [AggregationType; 10] = [
        AggregationType::Sum,
        AggregationType::Mean,
        AggregationType::Median,
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::Count,
        AggregationType::Size,
        AggregationType::Std,
        AggregationType::Var,
        AggregationType::Nunique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Mean => "mean",
            AggregationType::Median => "median",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
            AggregationType::Size => "size",
            AggregationType::Std => "std",
            AggregationType::Var => "var",
            AggregationType::Nunique => "nunique",
        }
    }

    /// Aggregations that only make sense over numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AggregationType::Sum
                | AggregationType::Mean
                | AggregationType::Median
                | AggregationType::Std
                | AggregationType::Var
        )
    }

    /// `size` counts group membership and ignores the value column.
    pub fn needs_value_column(&self) -> bool {
        *self != AggregationType::Size
    }
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::Sum
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AggregationType::ALL
            .iter()
            .copied()
            .find(|agg| agg.as_str() == wanted)
            .ok_or_else(|| DefinitionError::UnknownAggregation(s.to_string()))
    }
}

/// A (value column, aggregation) pair. `value_col` may be unset while the
/// user is still configuring it; such pairs are ignored unless they are `size`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueAgg {
    pub value_col: Option<String>,
    pub agg_func: AggregationType,
}

impl ValueAgg {
    pub fn new(value_col: impl Into<String>, agg_func: AggregationType) -> Self {
        ValueAgg {
            value_col: Some(value_col.into()),
            agg_func,
        }
    }

    pub fn size() -> Self {
        ValueAgg {
            value_col: None,
            agg_func: AggregationType::Size,
        }
    }

    /// Whether this pair contributes a value column to the pivot.
    pub fn is_active(&self) -> bool {
        self.agg_func == AggregationType::Size
            || self.value_col.as_deref().map_or(false, |c| !c.is_empty())
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Grouping, aggregation, fill and margin options for one pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotLayout {
    /// Row grouping fields, outer to inner.
    pub index_cols: Vec<String>,

    /// Column grouping fields, outer to inner.
    pub column_cols: Vec<String>,

    /// Value/aggregation pairs, in output order.
    pub value_agg_list: Vec<ValueAgg>,

    /// Whether missing cells are replaced with `fill_value`.
    pub fill_value_enabled: bool,

    /// Replacement for missing cells.
    pub fill_value: Option<CellValue>,

    /// Whether a totals row/column is appended.
    pub margins_enabled: bool,

    /// Label of the totals row/column.
    pub margins_name: String,
}

impl PivotLayout {
    /// The value pairs that take part in the computation.
    pub fn active_values(&self) -> Vec<&ValueAgg> {
        self.value_agg_list.iter().filter(|v| v.is_active()).collect()
    }

    /// The fill value, if filling is enabled and a value was given.
    pub fn effective_fill(&self) -> Option<&CellValue> {
        if self.fill_value_enabled {
            self.fill_value.as_ref()
        } else {
            None
        }
    }
}

impl Default for PivotLayout {
    fn default() -> Self {
        PivotLayout {
            index_cols: Vec::new(),
            column_cols: Vec::new(),
            value_agg_list: Vec::new(),
            fill_value_enabled: false,
            fill_value: None,
            margins_enabled: false,
            margins_name: DEFAULT_MARGINS_NAME.to_string(),
        }
    }
}

// ============================================================================
// PIVOT CONFIG (ONE SLOT)
// ============================================================================

/// A successful computation of a pivot slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotComputation {
    pub table: PivotTable,
    /// Number of source rows left after the filter chain.
    pub filtered_rows: usize,
    /// Filters skipped during this computation.
    pub warnings: Vec<FilterWarning>,
}

/// Computation state of a pivot slot. Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PivotStatus {
    /// Not computed since the last load or edit.
    #[default]
    Pending,
    Computed(PivotComputation),
    Failed(String),
}

impl PivotStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PivotStatus::Pending)
    }

    pub fn table(&self) -> Option<&PivotTable> {
        match self {
            PivotStatus::Computed(c) => Some(&c.table),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PivotStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// The complete configuration of one named pivot slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PivotConfig {
    pub name: String,
    pub filters: Vec<FilterSpec>,
    pub layout: PivotLayout,
    pub status: PivotStatus,
}

impl PivotConfig {
    pub fn new(name: impl Into<String>) -> Self {
        PivotConfig {
            name: name.into(),
            ..PivotConfig::default()
        }
    }

    /// Drops any cached result. Called after every edit.
    pub fn invalidate(&mut self) {
        self.status = PivotStatus::Pending;
    }

    /// A copy with the computation status reset, as it would be persisted.
    pub fn without_result(&self) -> PivotConfig {
        PivotConfig {
            status: PivotStatus::Pending,
            ..self.clone()
        }
    }
}
