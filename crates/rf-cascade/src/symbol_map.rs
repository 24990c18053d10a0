//! SymbolMap - logical cell → instance arena
//!
//! Fixed `rows × cols` slots holding [`InstanceId`]s, never references to
//! visuals. One map lives for the duration of a single presenter run.

use std::collections::HashMap;

use crate::grid::{GridSize, Position};
use crate::view::{GridView, InstanceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMap {
    size: GridSize,
    cells: Vec<Option<InstanceId>>,
}

impl SymbolMap {
    /// Empty map
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![None; size.cells()],
        }
    }

    /// Map each cell to the instance currently resting on it
    pub fn seed_from(view: &dyn GridView) -> Self {
        let size = view.size();
        let mut map = Self::new(size);
        for pos in size.positions() {
            if let Some(id) = view.instance_at(pos) {
                map.set(pos, Some(id));
            }
        }
        map
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.size.contains(pos)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.row * self.size.cols + pos.col)
    }

    pub fn get(&self, pos: Position) -> Option<InstanceId> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    /// Write a slot, returning the previous owner
    ///
    /// Out-of-bounds writes are logged and dropped.
    pub fn set(&mut self, pos: Position, id: Option<InstanceId>) -> Option<InstanceId> {
        match self.index(pos) {
            Some(i) => std::mem::replace(&mut self.cells[i], id),
            None => {
                log::warn!("[SymbolMap] Write outside {} grid at {}, skipping", self.size, pos);
                None
            }
        }
    }

    pub fn clear(&mut self, pos: Position) -> Option<InstanceId> {
        self.set(pos, None)
    }

    pub fn contains_instance(&self, id: InstanceId) -> bool {
        self.cells.contains(&Some(id))
    }

    pub fn position_of(&self, id: InstanceId) -> Option<Position> {
        self.iter().find(|(_, owner)| *owner == id).map(|(pos, _)| pos)
    }

    /// Occupied cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Position, InstanceId)> + '_ {
        self.size
            .positions()
            .zip(self.cells.iter())
            .filter_map(|(pos, cell)| cell.map(|id| (pos, id)))
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Instances that own more than one cell
    pub fn duplicate_owners(&self) -> Vec<InstanceId> {
        let mut counts: HashMap<InstanceId, usize> = HashMap::new();
        for (_, id) in self.iter() {
            *counts.entry(id).or_default() += 1;
        }
        let mut dupes: Vec<_> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();
        dupes.sort();
        dupes
    }
}
