//! FILENAME: core/pivot-engine/src/cache.rs
//! Pivot Cache - Internal representation used while building a pivot.
//!
//! Architecture:
//! - Each distinct grouping value is stored once per field and referenced by
//!   a `ValueId`
//! - A combination of grouping values is a `GroupKey` (a short vector of ids)
//! - Aggregates are accumulated per (row key, column key) in one pass over the
//!   source rows and only turned into cell values at the end

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use engine::CellValue;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::definition::AggregationType;

// ============================================================================
// VALUE INTERNING
// ============================================================================

/// A reference to an interned value within a field's unique value store.
pub type ValueId = u32;

/// Marks "every value of this field" inside a margin key.
pub const AXIS_ALL: ValueId = u32::MAX;

/// A normalized, hashable representation of a cell value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheValue {
    Empty,
    Number(OrderedFloat),
    Text(String),
    Boolean(bool),
    Date(NaiveDateTime),
}

impl From<&CellValue> for CacheValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => CacheValue::Empty,
            CellValue::Number(n) => CacheValue::Number(OrderedFloat(*n)),
            CellValue::Text(s) => CacheValue::Text(s.clone()),
            CellValue::Boolean(b) => CacheValue::Boolean(*b),
            CellValue::Date(dt) => CacheValue::Date(*dt),
        }
    }
}

impl CacheValue {
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            CacheValue::Empty => CellValue::Empty,
            CacheValue::Number(n) => CellValue::Number(n.0),
            CacheValue::Text(s) => CellValue::Text(s.clone()),
            CacheValue::Boolean(b) => CellValue::Boolean(*b),
            CacheValue::Date(dt) => CellValue::Date(*dt),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            CacheValue::Empty => 0,
            CacheValue::Number(_) => 1,
            CacheValue::Date(_) => 2,
            CacheValue::Text(_) => 3,
            CacheValue::Boolean(_) => 4,
        }
    }

    fn same_kind(&self, other: &CacheValue) -> bool {
        self.kind_rank() == other.kind_rank()
    }

    /// Natural order: empty < numbers < dates < text < booleans.
    pub fn natural_cmp(&self, other: &CacheValue) -> Ordering {
        match (self, other) {
            (CacheValue::Number(a), CacheValue::Number(b)) => a.0.total_cmp(&b.0),
            (CacheValue::Date(a), CacheValue::Date(b)) => a.cmp(b),
            (CacheValue::Text(a), CacheValue::Text(b)) => a.cmp(b),
            (CacheValue::Boolean(a), CacheValue::Boolean(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

/// Wrapper around f64 that implements Eq and Hash for use as map keys.
/// NaN values are treated as equal to each other; 0.0 and -0.0 are one key.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else {
            (self.0 + 0.0).to_bits().hash(state);
        }
    }
}

// ============================================================================
// FIELD CACHE
// ============================================================================

/// Distinct non-empty values of one grouping field.
#[derive(Debug, Clone, Default)]
pub struct FieldCache {
    pub name: String,
    value_to_id: FxHashMap<CacheValue, ValueId>,
    id_to_value: Vec<CacheValue>,
}

impl FieldCache {
    pub fn new(name: impl Into<String>) -> Self {
        FieldCache {
            name: name.into(),
            ..FieldCache::default()
        }
    }

    /// Interns a value and returns its id. Empty values have no id.
    pub fn intern(&mut self, value: &CellValue) -> Option<ValueId> {
        if value.is_empty() {
            return None;
        }

        let value = CacheValue::from(value);
        if let Some(&id) = self.value_to_id.get(&value) {
            return Some(id);
        }

        let id = self.id_to_value.len() as ValueId;
        self.id_to_value.push(value.clone());
        self.value_to_id.insert(value, id);
        Some(id)
    }

    pub fn value(&self, id: ValueId) -> Option<&CacheValue> {
        self.id_to_value.get(id as usize)
    }

    pub fn unique_count(&self) -> usize {
        self.id_to_value.len()
    }

    /// Position of every id in natural sort order, indexed by id.
    fn sort_ranks(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.id_to_value.len()).collect();
        ids.sort_by(|&a, &b| self.id_to_value[a].natural_cmp(&self.id_to_value[b]));

        let mut ranks = vec![0; ids.len()];
        for (rank, id) in ids.into_iter().enumerate() {
            ranks[id] = rank;
        }
        ranks
    }
}

// ============================================================================
// GROUP KEYS
// ============================================================================

/// A combination of grouping values, one id per field, outer to inner.
pub type GroupKey = SmallVec<[ValueId; 4]>;

/// The margin key of an axis with `field_count` fields.
pub fn all_key(field_count: usize) -> GroupKey {
    SmallVec::from_elem(AXIS_ALL, field_count)
}

/// The distinct keys seen on one axis (rows or columns).
#[derive(Debug, Clone, Default)]
pub struct AxisCache {
    fields: Vec<FieldCache>,
    seen: FxHashMap<GroupKey, usize>,
    first_seen: Vec<GroupKey>,
}

impl AxisCache {
    pub fn new<S: AsRef<str>>(field_names: &[S]) -> Self {
        AxisCache {
            fields: field_names.iter().map(|n| FieldCache::new(n.as_ref())).collect(),
            ..AxisCache::default()
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn key_count(&self) -> usize {
        self.first_seen.len()
    }

    /// Interns one row's grouping values. Returns `None` when any of them is
    /// empty, in which case the row takes no part in the pivot.
    pub fn intern_row<'v>(&mut self, values: impl IntoIterator<Item = &'v CellValue>) -> Option<GroupKey> {
        let mut key = GroupKey::new();
        for (field, value) in self.fields.iter_mut().zip(values) {
            key.push(field.intern(value)?);
        }

        if !self.seen.contains_key(&key) {
            self.seen.insert(key.clone(), self.first_seen.len());
            self.first_seen.push(key.clone());
        }
        Some(key)
    }

    /// Keys in the order their first row appeared.
    pub fn first_seen(&self) -> &[GroupKey] {
        &self.first_seen
    }

    /// Keys in natural order, compared field by field.
    pub fn sorted_keys(&self) -> Vec<GroupKey> {
        let ranks: Vec<Vec<usize>> = self.fields.iter().map(FieldCache::sort_ranks).collect();
        let mut keys = self.first_seen.clone();
        keys.sort_by(|a, b| {
            for (field, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                let ordering = ranks[field][*x as usize].cmp(&ranks[field][*y as usize]);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        keys
    }

    /// Turns a key back into cell values. `AXIS_ALL` decodes as `Empty`.
    pub fn decode(&self, key: &GroupKey) -> Vec<CellValue> {
        self.fields
            .iter()
            .zip(key.iter())
            .map(|(field, &id)| {
                field
                    .value(id)
                    .map(CacheValue::to_cell_value)
                    .unwrap_or(CellValue::Empty)
            })
            .collect()
    }
}

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Incremental state for one aggregation over one group.
/// Only the state its aggregation needs is filled in.
#[derive(Debug, Clone)]
pub struct AggregateAccumulator {
    aggregation: AggregationType,
    /// Rows in the group.
    size: u64,
    /// Non-empty values.
    count: u64,
    sum: f64,
    numbers: u64,
    /// Welford's running mean and sum of squared differences.
    mean: f64,
    m2: f64,
    samples: Vec<f64>,
    min: Option<CacheValue>,
    max: Option<CacheValue>,
    mixed_types: bool,
    distinct: FxHashSet<CacheValue>,
    first_invalid: Option<String>,
}

impl AggregateAccumulator {
    pub fn new(aggregation: AggregationType) -> Self {
        AggregateAccumulator {
            aggregation,
            size: 0,
            count: 0,
            sum: 0.0,
            numbers: 0,
            mean: 0.0,
            m2: 0.0,
            samples: Vec::new(),
            min: None,
            max: None,
            mixed_types: false,
            distinct: FxHashSet::default(),
            first_invalid: None,
        }
    }

    pub fn aggregation(&self) -> AggregationType {
        self.aggregation
    }

    /// Adds one row of the group. `value` is `None` for `size`, which has no
    /// value column.
    pub fn add(&mut self, value: Option<&CellValue>) {
        self.size += 1;

        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => return,
        };
        self.count += 1;

        match self.aggregation {
            AggregationType::Sum
            | AggregationType::Mean
            | AggregationType::Median
            | AggregationType::Std
            | AggregationType::Var => match numeric_value(value) {
                Some(n) => self.add_number(n),
                None => {
                    if self.first_invalid.is_none() {
                        self.first_invalid = Some(value.display_value());
                    }
                }
            },
            AggregationType::Min | AggregationType::Max => self.add_ordered(CacheValue::from(value)),
            AggregationType::Nunique => {
                self.distinct.insert(CacheValue::from(value));
            }
            AggregationType::Count | AggregationType::Size => {}
        }
    }

    fn add_number(&mut self, value: f64) {
        self.sum += value;
        self.numbers += 1;

        let delta = value - self.mean;
        self.mean += delta / (self.numbers as f64);
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;

        if self.aggregation == AggregationType::Median {
            self.samples.push(value);
        }
    }

    fn add_ordered(&mut self, value: CacheValue) {
        if let Some(current) = &self.min {
            if !current.same_kind(&value) {
                self.mixed_types = true;
                return;
            }
        }

        let lower = self
            .min
            .as_ref()
            .map_or(true, |m| value.natural_cmp(m) == Ordering::Less);
        if lower {
            self.min = Some(value.clone());
        }

        let higher = self
            .max
            .as_ref()
            .map_or(true, |m| value.natural_cmp(m) == Ordering::Greater);
        if higher {
            self.max = Some(value);
        }
    }

    /// Computes the final value. `Ok(None)` means the result is undefined
    /// (e.g. the mean of no numbers). `Err` carries the reason the values
    /// could not be aggregated.
    pub fn compute(&self) -> Result<Option<CellValue>, String> {
        if let Some(bad) = &self.first_invalid {
            return Err(format!("non-numeric value '{}'", bad));
        }

        let result = match self.aggregation {
            AggregationType::Sum => Some(self.sum),
            AggregationType::Mean => (self.numbers > 0).then_some(self.mean),
            AggregationType::Median => median(&self.samples),
            AggregationType::Var => self.sample_variance(),
            AggregationType::Std => self.sample_variance().map(f64::sqrt),
            AggregationType::Count => Some(self.count as f64),
            AggregationType::Size => Some(self.size as f64),
            AggregationType::Nunique => Some(self.distinct.len() as f64),
            AggregationType::Min | AggregationType::Max => {
                if self.mixed_types {
                    return Err("values of different types cannot be compared".to_string());
                }
                let bound = if self.aggregation == AggregationType::Min {
                    &self.min
                } else {
                    &self.max
                };
                return Ok(bound.as_ref().map(CacheValue::to_cell_value));
            }
        };

        Ok(result.map(CellValue::Number))
    }

    fn sample_variance(&self) -> Option<f64> {
        if self.numbers > 1 {
            Some(self.m2 / ((self.numbers - 1) as f64))
        } else {
            None
        }
    }
}

/// Numbers as-is, numeric text parsed, booleans as 0/1.
fn numeric_value(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_number(),
    }
}

fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
