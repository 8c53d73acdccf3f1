//! Belief aggregation: sums the selected entities' grids into one heatmap.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::tensor_store::EntityBeliefs;

/// Values at or below this never mark an entity as active.
pub const ACTIVE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct BoardSize {
    pub width: usize,
    pub height: usize,
}

impl Default for BoardSize {
    fn default() -> Self {
        Self {
            width: 24,
            height: 24,
        }
    }
}

impl BoardSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

/// The set of entities whose beliefs feed the heatmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySelection {
    selected: BTreeSet<usize>,
}

impl EntitySelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all(entity_count: usize) -> Self {
        (0..entity_count).collect()
    }

    pub fn contains(&self, entity: usize) -> bool {
        self.selected.contains(&entity)
    }

    /// Flip one entity; returns whether it is selected afterwards.
    pub fn toggle(&mut self, entity: usize) -> bool {
        if self.selected.remove(&entity) {
            false
        } else {
            self.selected.insert(entity);
            true
        }
    }

    /// Select everything when anything is deselected, otherwise clear.
    pub fn toggle_all(&mut self, entity_count: usize) {
        if self.selected.len() == entity_count {
            self.selected.clear();
        } else {
            *self = Self::all(entity_count);
        }
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }
}

impl FromIterator<usize> for EntitySelection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            selected: iter.into_iter().collect(),
        }
    }
}

/// Dense grid over the board, indexed `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    board: BoardSize,
    cells: Vec<f64>,
}

impl Heatmap {
    pub fn zeroed(board: BoardSize) -> Self {
        Self {
            board,
            cells: vec![0.0; board.cell_count()],
        }
    }

    pub fn board(&self) -> BoardSize {
        self.board
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        if self.board.contains(x, y) {
            self.cells[x * self.board.height + y]
        } else {
            0.0
        }
    }

    fn add(&mut self, x: usize, y: usize, value: f64) {
        self.cells[x * self.board.height + y] += value;
    }

    /// Elementwise sum with another heatmap of the same board.
    pub fn accumulate(&mut self, other: &Heatmap) {
        debug_assert_eq!(self.board, other.board);
        for (cell, value) in self.cells.iter_mut().zip(&other.cells) {
            *cell += value;
        }
    }

    pub fn max_value(&self) -> f64 {
        self.cells.iter().copied().fold(0.0, f64::max)
    }

    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(|value| *value == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub heatmap: Heatmap,
    /// Number of selected entities with a value above [`ACTIVE_EPSILON`] somewhere on the board.
    pub active_count: f64,
}

/// Sum the selected entities' beliefs over every board cell.
///
/// Entities are visited in ascending index order, so the result does not
/// depend on the order the selection was built in. Cells beyond a ragged
/// grid's extent contribute zero, and values outside the board are ignored.
pub fn aggregate(
    tensors: &EntityBeliefs,
    selection: &EntitySelection,
    board: BoardSize,
) -> Aggregate {
    let mut heatmap = Heatmap::zeroed(board);
    let mut active_count = 0.0;

    for entity in selection.iter() {
        let Some(grid) = tensors.get(&entity) else {
            continue;
        };
        let mut active = false;
        for (x, column) in grid.iter().enumerate().take(board.width) {
            for (y, value) in column.iter().copied().enumerate().take(board.height) {
                heatmap.add(x, y, value);
                if value > ACTIVE_EPSILON {
                    active = true;
                }
            }
        }
        if active {
            active_count += 1.0;
        }
    }

    Aggregate {
        heatmap,
        active_count,
    }
}
