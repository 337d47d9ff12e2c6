//! FILENAME: core/persistence/src/views.rs
//! Saved views: the JSON document holding every pivot slot's configuration.
//!
//! Only configuration is written. Computed results are never persisted and
//! every loaded slot starts out `Pending`. Every scalar keeps its type: dates
//! are written as `{"date": "<ISO-8601>"}` so they never mix with text.

use std::path::Path;

use engine::dates::{parse_datetime, to_iso};
use engine::CellValue;
use pivot_engine::{
    AggregationType, FilterOperator, FilterSpec, FilterValue, PivotConfig, PivotLayout,
    PivotWorkspace, ValueAgg, DEFAULT_MARGINS_NAME,
};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Version written into every saved-views document.
pub const SAVED_VIEWS_VERSION: u64 = 1;

// ============================================================================
// DOCUMENT
// ============================================================================

/// The top-level saved-views document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedViews {
    pub version: u64,
    pub pivots: Vec<SavedPivot>,
}

/// One pivot slot as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPivot {
    pub name: String,
    #[serde(default)]
    pub index_cols: Vec<String>,
    #[serde(default)]
    pub column_cols: Vec<String>,
    #[serde(default)]
    pub value_agg_list: Vec<SavedValueAgg>,
    #[serde(default)]
    pub filters: Vec<SavedFilter>,
    #[serde(default)]
    pub fill_value_enabled: bool,
    #[serde(default)]
    pub fill_value: Option<SavedScalar>,
    #[serde(default)]
    pub margins_enabled: bool,
    #[serde(default = "default_margins_name")]
    pub margins_name: String,
}

fn default_margins_name() -> String {
    DEFAULT_MARGINS_NAME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedValueAgg {
    #[serde(default)]
    pub value_col: Option<String>,
    #[serde(default)]
    pub agg_func: AggregationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedFilter {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<SavedFilterValue>,
}

/// A filter value: a single scalar or an inclusive pair. Either end of a
/// pair may be `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedFilterValue {
    Pair(Option<SavedScalar>, Option<SavedScalar>),
    Single(SavedScalar),
}

/// Serializable scalar. Numbers, booleans and text map onto plain JSON
/// values; dates are tagged objects holding ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedScalar {
    Number(f64),
    Boolean(bool),
    Date { date: String },
    Text(String),
}

impl SavedScalar {
    /// `None` for empty cells, which are stored as `null`.
    pub fn from_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Empty => None,
            CellValue::Number(n) => Some(SavedScalar::Number(*n)),
            CellValue::Text(s) => Some(SavedScalar::Text(s.clone())),
            CellValue::Boolean(b) => Some(SavedScalar::Boolean(*b)),
            CellValue::Date(dt) => Some(SavedScalar::Date { date: to_iso(dt) }),
        }
    }

    /// The cell value this scalar was saved from.
    pub fn to_value(&self) -> Result<CellValue, PersistenceError> {
        match self {
            SavedScalar::Number(n) => Ok(CellValue::Number(*n)),
            SavedScalar::Boolean(b) => Ok(CellValue::Boolean(*b)),
            SavedScalar::Text(s) => Ok(CellValue::Text(s.clone())),
            SavedScalar::Date { date } => parse_datetime(date)
                .map(CellValue::Date)
                .ok_or_else(|| PersistenceError::InvalidFormat(format!("'{}' is not a date", date))),
        }
    }
}

fn optional_value(saved: &Option<SavedScalar>) -> Result<CellValue, PersistenceError> {
    match saved {
        Some(scalar) => scalar.to_value(),
        None => Ok(CellValue::Empty),
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl SavedFilter {
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let value = match &spec.value {
            FilterValue::None => None,
            FilterValue::Scalar(v) => SavedScalar::from_value(v).map(SavedFilterValue::Single),
            FilterValue::Range(a, b) => Some(SavedFilterValue::Pair(
                SavedScalar::from_value(a),
                SavedScalar::from_value(b),
            )),
        };
        SavedFilter {
            column: spec.column.clone(),
            operator: spec.operator,
            value,
        }
    }

    pub fn to_spec(&self) -> Result<FilterSpec, PersistenceError> {
        let value = match &self.value {
            None => FilterValue::None,
            Some(SavedFilterValue::Single(s)) => FilterValue::Scalar(s.to_value()?),
            Some(SavedFilterValue::Pair(a, b)) => {
                FilterValue::Range(optional_value(a)?, optional_value(b)?)
            }
        };
        Ok(FilterSpec {
            column: self.column.clone(),
            operator: self.operator,
            value,
        })
    }
}

impl SavedPivot {
    pub fn from_config(config: &PivotConfig) -> Self {
        let layout = &config.layout;
        SavedPivot {
            name: config.name.clone(),
            index_cols: layout.index_cols.clone(),
            column_cols: layout.column_cols.clone(),
            value_agg_list: layout
                .value_agg_list
                .iter()
                .map(|v| SavedValueAgg {
                    value_col: v.value_col.clone(),
                    agg_func: v.agg_func,
                })
                .collect(),
            filters: config.filters.iter().map(SavedFilter::from_spec).collect(),
            fill_value_enabled: layout.fill_value_enabled,
            fill_value: layout.fill_value.as_ref().and_then(SavedScalar::from_value),
            margins_enabled: layout.margins_enabled,
            margins_name: layout.margins_name.clone(),
        }
    }

    /// Rebuilds the slot configuration with a `Pending` status.
    pub fn to_config(&self) -> Result<PivotConfig, PersistenceError> {
        Ok(PivotConfig {
            name: self.name.clone(),
            filters: self
                .filters
                .iter()
                .map(SavedFilter::to_spec)
                .collect::<Result<Vec<_>, _>>()?,
            layout: PivotLayout {
                index_cols: self.index_cols.clone(),
                column_cols: self.column_cols.clone(),
                value_agg_list: self
                    .value_agg_list
                    .iter()
                    .map(|v| ValueAgg {
                        value_col: v.value_col.clone(),
                        agg_func: v.agg_func,
                    })
                    .collect(),
                fill_value_enabled: self.fill_value_enabled,
                fill_value: self.fill_value.as_ref().map(SavedScalar::to_value).transpose()?,
                margins_enabled: self.margins_enabled,
                margins_name: self.margins_name.clone(),
            },
            status: Default::default(),
        })
    }
}

// ============================================================================
// SAVE / LOAD
// ============================================================================

/// Serializes the configurations as a pretty-printed saved-views document.
pub fn save_views(configs: &[PivotConfig]) -> Result<String, PersistenceError> {
    let document = SavedViews {
        version: SAVED_VIEWS_VERSION,
        pivots: configs.iter().map(SavedPivot::from_config).collect(),
    };
    let json = serde_json::to_string_pretty(&document)?;
    pivot_engine::log_info!("PERSISTENCE", "saved {} pivots", configs.len());
    Ok(json)
}

/// Parses a saved-views document. A bare JSON array of pivots (documents
/// written before the version field existed) is accepted as version 1.
pub fn load_views(json: &str) -> Result<Vec<PivotConfig>, PersistenceError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;

    let pivots: Vec<SavedPivot> = if raw.is_array() {
        serde_json::from_value(raw)?
    } else if raw.is_object() {
        let version = raw
            .get("version")
            .ok_or_else(|| PersistenceError::InvalidFormat("missing 'version'".to_string()))?
            .as_u64()
            .ok_or_else(|| PersistenceError::InvalidFormat("'version' is not a number".to_string()))?;
        if version != SAVED_VIEWS_VERSION {
            return Err(PersistenceError::UnsupportedVersion(version));
        }
        serde_json::from_value::<SavedViews>(raw)?.pivots
    } else {
        return Err(PersistenceError::InvalidFormat(
            "expected an object or an array of pivots".to_string(),
        ));
    };

    let configs = pivots
        .iter()
        .map(SavedPivot::to_config)
        .collect::<Result<Vec<_>, _>>()?;
    pivot_engine::log_info!("PERSISTENCE", "loaded {} pivots", configs.len());
    Ok(configs)
}

/// Loads a document into `workspace`, replacing all of its slots. On any
/// error the workspace is left exactly as it was.
pub fn load_into(workspace: &mut PivotWorkspace, json: &str) -> Result<usize, PersistenceError> {
    let pivots = match load_views(json) {
        Ok(pivots) => pivots,
        Err(e) => {
            pivot_engine::log_warn!("PERSISTENCE", "load rejected, workspace unchanged: {}", e);
            return Err(e);
        }
    };
    let count = pivots.len();
    workspace.replace_all(pivots);
    Ok(count)
}

pub fn save_views_to_path(path: &Path, configs: &[PivotConfig]) -> Result<(), PersistenceError> {
    let json = save_views(configs)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_views_from_path(path: &Path) -> Result<Vec<PivotConfig>, PersistenceError> {
    let json = std::fs::read_to_string(path)?;
    load_views(&json)
}
