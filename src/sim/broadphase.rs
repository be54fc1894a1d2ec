//! Uniform grid broad phase
//!
//! Buckets bodies by the grid cells their bounds touch, so the narrow phase
//! only tests bodies that share a cell. Cells live in a `BTreeMap` and
//! pairs come out sorted, keeping the candidate order deterministic.

use std::collections::{BTreeMap, BTreeSet};

use super::body::{BodyHandle, BodyKind, BodyStore, Tag};
use super::shape::Aabb;

/// Smallest cell edge, guards against a grid of microscopic cells
pub const MIN_CELL_SIZE: f32 = 1.0;

/// Candidate pair, canonical `(lower, higher)` handle order
pub type BodyPair = (BodyHandle, BodyHandle);

#[derive(Debug, Clone)]
pub struct UniformGrid {
    cell_size: f32,
    cells: BTreeMap<(i32, i32), Vec<BodyHandle>>,
}

impl Default for UniformGrid {
    fn default() -> Self {
        Self::new(MIN_CELL_SIZE)
    }
}

impl UniformGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(MIN_CELL_SIZE),
            cells: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn world_to_grid(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    fn cell_range(&self, aabb: &Aabb) -> ((i32, i32), (i32, i32)) {
        (
            self.world_to_grid(aabb.min.x, aabb.min.y),
            self.world_to_grid(aabb.max.x, aabb.max.y),
        )
    }

    pub fn insert(&mut self, handle: BodyHandle, aabb: &Aabb) {
        let (min_cell, max_cell) = self.cell_range(aabb);
        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                self.cells.entry((x, y)).or_default().push(handle);
            }
        }
    }

    /// Rebuild from every alive body.
    ///
    /// Cell size follows the largest non-wall body extent. Walls are long
    /// boundary slabs and would otherwise collapse the grid to one cell;
    /// they are simply inserted into every cell they cover.
    pub fn rebuild(&mut self, store: &BodyStore) {
        let mut largest = 0.0f32;
        store.for_each_alive(|_, body| {
            if body.tag != Tag::Wall {
                largest = largest.max(body.shape.max_extent());
            }
        });
        self.cell_size = largest.max(MIN_CELL_SIZE);
        self.cells.clear();

        store.for_each_alive(|handle, body| {
            let aabb = body.aabb();
            self.insert(handle, &aabb);
        });
    }

    /// Bodies in any cell touched by `aabb`, ascending and deduplicated.
    ///
    /// Walks occupied cells only, so a huge query box costs no more than
    /// the number of cells in use.
    pub fn query(&self, aabb: &Aabb) -> Vec<BodyHandle> {
        let (min_cell, max_cell) = self.cell_range(aabb);
        let mut results = Vec::new();
        if min_cell > max_cell {
            return results;
        }
        for (&(_, y), handles) in self.cells.range(min_cell..=max_cell) {
            if (min_cell.1..=max_cell.1).contains(&y) {
                results.extend(handles);
            }
        }
        results.sort_unstable();
        results.dedup();
        results
    }

    /// Unordered pairs sharing a cell, each reported once.
    ///
    /// Pairs without a dynamic member are skipped: static and kinematic
    /// bodies never receive collision response.
    pub fn candidate_pairs(&self, store: &BodyStore) -> Vec<BodyPair> {
        let mut pairs = BTreeSet::new();
        for handles in self.cells.values() {
            for (i, &first) in handles.iter().enumerate() {
                for &second in &handles[i + 1..] {
                    if first == second {
                        continue;
                    }
                    let dynamic = |h: BodyHandle| {
                        store
                            .get(h)
                            .map(|body| body.kind == BodyKind::Dynamic)
                            .unwrap_or(false)
                    };
                    if !dynamic(first) && !dynamic(second) {
                        continue;
                    }
                    pairs.insert((first.min(second), first.max(second)));
                }
            }
        }
        pairs.into_iter().collect()
    }
}
