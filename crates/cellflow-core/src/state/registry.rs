//! Copy-on-write cell registry.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::graph::{Cell, CellId};

/// Snapshot of every registered cell, in registration order.
///
/// Cloning a registry is cheap: entries are shared `Arc`s. Mutations swap the
/// affected entry for a fresh allocation and leave the others untouched, so an
/// observer holding an older snapshot can compare entries by pointer to find
/// exactly what changed.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    cells: IndexMap<CellId, Arc<Cell>, FxBuildHasher>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell by ID.
    pub fn get(&self, id: &str) -> Option<&Arc<Cell>> {
        self.cells.get(id)
    }

    /// Check whether a cell is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    /// Iterate cells in registration order.
    pub fn cells(&self) -> impl Iterator<Item = &Arc<Cell>> {
        self.cells.values()
    }

    /// Iterate cell IDs in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    /// Get the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Prerequisites listed by a cell, or `None` if it is not registered.
    pub fn prerequisites(&self, id: &str) -> Option<&[CellId]> {
        self.cells.get(id).map(|cell| cell.prerequisites.as_slice())
    }

    /// Insert or overwrite a cell.
    ///
    /// An overwritten cell keeps its original registration position.
    pub(crate) fn insert(&mut self, cell: Cell) {
        self.cells.insert(cell.id.clone(), Arc::new(cell));
    }

    /// Remove a cell, preserving the order of the remaining entries.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<Cell>> {
        self.cells.shift_remove(id)
    }

    /// Replace a cell with an updated copy.
    ///
    /// Returns `false` without calling `f` if the cell is not registered.
    pub(crate) fn update(&mut self, id: &str, f: impl FnOnce(&mut Cell)) -> bool {
        match self.cells.get_mut(id) {
            Some(entry) => {
                let mut cell = Cell::clone(entry);
                f(&mut cell);
                *entry = Arc::new(cell);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every cell, replacing each entry.
    pub(crate) fn update_all(&mut self, mut f: impl FnMut(&mut Cell)) -> bool {
        for entry in self.cells.values_mut() {
            let mut cell = Cell::clone(entry);
            f(&mut cell);
            *entry = Arc::new(cell);
        }
        !self.cells.is_empty()
    }

    /// Drop every registration.
    pub(crate) fn clear(&mut self) -> bool {
        let changed = !self.cells.is_empty();
        self.cells.clear();
        changed
    }
}
