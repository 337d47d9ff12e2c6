//! FILENAME: core/pivot-engine/src/workspace.rs
//! Pivot Workspace - The caller-owned set of named pivot slots.
//!
//! The workspace holds the ordered slots and which one is active. It owns no
//! data: every refresh is handed the source table and a clock, and the result
//! (or failure) is stored in the slot's status until the next edit.

use engine::Table;

use crate::clock::Clock;
use crate::definition::{PivotConfig, PivotStatus};
use crate::engine::run_pivot;
use crate::error::WorkspaceError;

/// Ordered pivot slots plus the active slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PivotWorkspace {
    pivots: Vec<PivotConfig>,
    active: Option<usize>,
}

impl PivotWorkspace {
    pub fn new() -> Self {
        PivotWorkspace::default()
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    pub fn pivots(&self) -> &[PivotConfig] {
        &self.pivots
    }

    pub fn names(&self) -> Vec<&str> {
        self.pivots.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&PivotConfig> {
        self.pivots.get(index)
    }

    /// Raw mutable access. Callers that change the definition should call
    /// `PivotConfig::invalidate`; `edit` does that for them.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut PivotConfig> {
        self.pivots.get_mut(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.pivots.iter().position(|p| p.name == name)
    }

    /// Applies `change` to a slot and drops its cached result.
    pub fn edit<F>(&mut self, index: usize, change: F) -> Result<(), WorkspaceError>
    where
        F: FnOnce(&mut PivotConfig),
    {
        let pivot = self
            .pivots
            .get_mut(index)
            .ok_or(WorkspaceError::NoSuchPivot(index))?;
        change(pivot);
        pivot.invalidate();
        Ok(())
    }

    /// Appends an empty slot named "Pivot N" and makes it active.
    pub fn add_pivot(&mut self) -> usize {
        let mut number = self.pivots.len() + 1;
        while self.position(&format!("Pivot {}", number)).is_some() {
            number += 1;
        }
        self.push(PivotConfig::new(format!("Pivot {}", number)))
    }

    /// Appends a prepared slot and makes it active.
    pub fn push(&mut self, config: PivotConfig) -> usize {
        self.pivots.push(config);
        let index = self.pivots.len() - 1;
        self.active = Some(index);
        crate::log_info!("WORKSPACE", "added '{}' at {}", self.pivots[index].name, index);
        index
    }

    /// Removes a slot. The active slot follows its pivot, or moves to the
    /// previous one if it was the one removed.
    pub fn remove_pivot(&mut self, index: usize) -> Result<PivotConfig, WorkspaceError> {
        if index >= self.pivots.len() {
            return Err(WorkspaceError::NoSuchPivot(index));
        }
        let removed = self.pivots.remove(index);

        self.active = match self.active {
            _ if self.pivots.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active == index => Some(index.saturating_sub(1)),
            other => other,
        };

        crate::log_info!("WORKSPACE", "removed '{}'", removed.name);
        Ok(removed)
    }

    pub fn rename_pivot(&mut self, index: usize, name: &str) -> Result<(), WorkspaceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkspaceError::EmptyName);
        }
        if index >= self.pivots.len() {
            return Err(WorkspaceError::NoSuchPivot(index));
        }
        if self.position(name).map_or(false, |existing| existing != index) {
            return Err(WorkspaceError::DuplicateName(name.to_string()));
        }
        self.pivots[index].name = name.to_string();
        Ok(())
    }

    pub fn set_active(&mut self, index: usize) -> Result<(), WorkspaceError> {
        if index >= self.pivots.len() {
            return Err(WorkspaceError::NoSuchPivot(index));
        }
        self.active = Some(index);
        Ok(())
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&PivotConfig> {
        self.active.and_then(|i| self.pivots.get(i))
    }

    /// Copies the filter chain of `source` onto every target (the source
    /// itself is skipped). Returns how many slots were updated.
    pub fn copy_filters(&mut self, source: usize, targets: &[usize]) -> Result<usize, WorkspaceError> {
        let filters = self
            .pivots
            .get(source)
            .ok_or(WorkspaceError::NoSuchPivot(source))?
            .filters
            .clone();

        if let Some(&bad) = targets.iter().find(|&&t| t >= self.pivots.len()) {
            return Err(WorkspaceError::NoSuchPivot(bad));
        }

        let mut updated = 0;
        for (index, pivot) in self.pivots.iter_mut().enumerate() {
            if index != source && targets.contains(&index) {
                pivot.filters = filters.clone();
                pivot.invalidate();
                updated += 1;
            }
        }

        crate::log_info!(
            "WORKSPACE",
            "copied {} filters from '{}' to {} pivots",
            filters.len(),
            self.pivots[source].name,
            updated
        );
        Ok(updated)
    }

    /// Recomputes one slot against `table` and stores the outcome.
    pub fn refresh(&mut self, index: usize, table: &Table, clock: &dyn Clock) -> Result<&PivotStatus, WorkspaceError> {
        let pivot = self
            .pivots
            .get_mut(index)
            .ok_or(WorkspaceError::NoSuchPivot(index))?;

        pivot.status = match run_pivot(table, pivot, clock) {
            Ok(computation) => PivotStatus::Computed(computation),
            Err(e) => {
                crate::log_warn!("WORKSPACE", "'{}' failed: {}", pivot.name, e);
                PivotStatus::Failed(e.to_string())
            }
        };
        Ok(&pivot.status)
    }

    /// Recomputes every slot. Returns how many succeeded.
    pub fn refresh_all(&mut self, table: &Table, clock: &dyn Clock) -> usize {
        let mut computed = 0;
        for index in 0..self.pivots.len() {
            if let Ok(PivotStatus::Computed(_)) = self.refresh(index, table, clock) {
                computed += 1;
            }
        }
        computed
    }

    /// Replaces every slot at once (used when loading saved views).
    /// The first slot becomes active.
    pub fn replace_all(&mut self, pivots: Vec<PivotConfig>) {
        self.active = if pivots.is_empty() { None } else { Some(0) };
        self.pivots = pivots;
        crate::log_info!("WORKSPACE", "loaded {} pivots", self.pivots.len());
    }
}
