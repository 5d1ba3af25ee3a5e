//! Broad-phase spatial grid over particle positions.
//!
//! The grid is rebuilt from scratch every step, before collision, with a cell
//! size of twice the particle search radius. Rebuilding uses a count /
//! prefix-sum / insert pass over a flat contents array, so steady-state
//! rebuilds allocate nothing.

use hashbrown::HashMap;
use nalgebra::Point3;

/// Uniform hash grid for neighbor queries over an unbounded domain.
#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cell_size: f32,
    /// Cell coordinate to dense cell index.
    cell_index: HashMap<[i32; 3], usize>,
    /// Flat particle indices, grouped by cell.
    contents: Vec<usize>,
    /// Start offset of each cell's group in `contents`.
    offsets: Vec<usize>,
    /// Number of entries in each cell's group.
    counts: Vec<usize>,
}

impl SpatialGrid {
    /// Create an empty grid. Useful as a placeholder before the first
    /// rebuild.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell size of the last rebuild.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of occupied cells after the last rebuild.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cell_index.len()
    }

    fn cell_of(&self, p: &Point3<f32>) -> [i32; 3] {
        [
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
            (p.z / self.cell_size).floor() as i32,
        ]
    }

    /// Rebuild the grid from current particle positions.
    ///
    /// `cell_size` must be positive; callers pass `2 × search radius` so a
    /// single-ring neighbor scan covers every candidate pair.
    pub fn rebuild(&mut self, positions: &[Point3<f32>], cell_size: f32) {
        debug_assert!(cell_size > 0.0, "grid cell size must be positive");
        self.cell_size = cell_size;
        self.cell_index.clear();
        self.contents.clear();
        self.contents.resize(positions.len(), 0);
        self.counts.clear();
        self.offsets.clear();

        // Count pass: assign dense indices to occupied cells.
        for p in positions {
            let key = self.cell_of(p);
            let next = self.cell_index.len();
            let idx = *self.cell_index.entry(key).or_insert(next);
            if idx == self.counts.len() {
                self.counts.push(0);
            }
            self.counts[idx] += 1;
        }

        // Prefix sum into offsets.
        let mut offset = 0;
        self.offsets.reserve(self.counts.len());
        for &count in &self.counts {
            self.offsets.push(offset);
            offset += count;
        }

        // Insert pass, reusing counts as per-cell cursors.
        for c in &mut self.counts {
            *c = 0;
        }
        for (i, p) in positions.iter().enumerate() {
            let key = self.cell_of(p);
            // Key was inserted in the count pass.
            if let Some(&idx) = self.cell_index.get(&key) {
                self.contents[self.offsets[idx] + self.counts[idx]] = i;
                self.counts[idx] += 1;
            }
        }
    }

    /// Particle indices stored in the cell containing `p`, if any.
    #[must_use]
    pub fn cell_contents(&self, p: &Point3<f32>) -> &[usize] {
        if self.cell_size <= 0.0 {
            return &[];
        }
        let key = self.cell_of(p);
        match self.cell_index.get(&key) {
            Some(&idx) => {
                let start = self.offsets[idx];
                &self.contents[start..start + self.counts[idx]]
            }
            None => &[],
        }
    }

    /// Visit every particle index in the 3×3×3 cell neighborhood of `p`.
    pub fn for_each_neighbor(&self, p: &Point3<f32>, mut visit: impl FnMut(usize)) {
        if self.cell_size <= 0.0 {
            return;
        }
        let center = self.cell_of(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [center[0] + dx, center[1] + dy, center[2] + dz];
                    if let Some(&idx) = self.cell_index.get(&key) {
                        let start = self.offsets[idx];
                        for &i in &self.contents[start..start + self.counts[idx]] {
                            visit(i);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_groups_by_cell() {
        let positions = vec![
            Point3::new(0.1, 0.1, 0.1),
            Point3::new(0.2, 0.1, 0.1),
            Point3::new(5.0, 5.0, 5.0),
        ];

        let mut grid = SpatialGrid::new();
        grid.rebuild(&positions, 1.0);

        assert_eq!(grid.occupied_cells(), 2);
        assert_eq!(grid.cell_contents(&positions[0]).len(), 2);
        assert_eq!(grid.cell_contents(&positions[2]), &[2]);
    }

    #[test]
    fn test_neighbor_scan_spans_adjacent_cells() {
        // Two particles in adjacent cells, closer than one cell size.
        let positions = vec![Point3::new(0.9, 0.0, 0.0), Point3::new(1.1, 0.0, 0.0)];

        let mut grid = SpatialGrid::new();
        grid.rebuild(&positions, 1.0);

        let mut seen = Vec::new();
        grid.for_each_neighbor(&positions[0], |i| seen.push(i));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_rebuild_discards_previous_contents() {
        let mut grid = SpatialGrid::new();
        grid.rebuild(&[Point3::origin()], 1.0);
        assert_eq!(grid.occupied_cells(), 1);

        grid.rebuild(&[], 1.0);
        assert_eq!(grid.occupied_cells(), 0);
        assert!(grid.cell_contents(&Point3::origin()).is_empty());
    }

    #[test]
    fn test_negative_coordinates() {
        let positions = vec![Point3::new(-0.5, -0.5, -0.5)];
        let mut grid = SpatialGrid::new();
        grid.rebuild(&positions, 1.0);
        assert_eq!(grid.cell_contents(&positions[0]), &[0]);
    }

    #[test]
    fn test_empty_grid_queries() {
        let grid = SpatialGrid::new();
        assert!(grid.cell_contents(&Point3::origin()).is_empty());
        let mut called = false;
        grid.for_each_neighbor(&Point3::origin(), |_| called = true);
        assert!(!called);
    }
}
