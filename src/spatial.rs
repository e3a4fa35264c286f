//! Uniform 3D binning grid over the world bounding box.
//!
//! A position is normalized into `[0, resolution)` per axis and floored to
//! integer cell coordinates, which are flattened as
//! `x + y * gx + z * gx * gy`. A position exactly on a cell boundary lands in
//! the higher cell. Positions outside the box produce coordinates outside the
//! grid; [`SpatialGrid::bin_index`] reports those as `None` and the passes use
//! [`SpatialGrid::clamped_bin_index`] after clamping the position.
//!
//! [`GRID_WGSL`] contains the same mapping for the compute shaders. Both must
//! stay in lockstep so debug queries agree with what the Insert pass did.

use glam::{IVec3, UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Sentinel for an empty bin head or the end of a next-pointer chain.
pub const EMPTY: i32 = -1;

/// Offsets of the 3x3x3 block around a cell, including the cell itself.
pub const NEIGHBOR_OFFSETS: [IVec3; 27] = {
    let mut offsets = [IVec3::ZERO; 27];
    let mut i = 0;
    while i < 27 {
        offsets[i] = IVec3::new((i % 3) as i32 - 1, ((i / 3) % 3) as i32 - 1, (i / 9) as i32 - 1);
        i += 1;
    }
    offsets
};

/// Grid layout: world box plus per-axis resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    pub world_min: Vec3,
    pub world_max: Vec3,
    pub resolution: UVec3,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self {
            world_min: Vec3::splat(-10.0),
            world_max: Vec3::splat(10.0),
            resolution: UVec3::splat(16),
        }
    }
}

impl SpatialGrid {
    pub fn new(world_min: Vec3, world_max: Vec3, resolution: UVec3) -> Self {
        Self { world_min, world_max, resolution }
    }

    /// Total number of bins.
    pub fn bin_count(&self) -> usize {
        self.resolution.x as usize * self.resolution.y as usize * self.resolution.z as usize
    }

    /// Edge lengths of one bin.
    pub fn cell_size(&self) -> Vec3 {
        (self.world_max - self.world_min) / self.resolution.as_vec3()
    }

    /// Shortest bin edge. Interaction radii above this are not fully covered
    /// by the 27-bin neighborhood.
    pub fn min_cell_edge(&self) -> f32 {
        self.cell_size().min_element()
    }

    pub fn contains(&self, position: Vec3) -> bool {
        position.cmpge(self.world_min).all() && position.cmple(self.world_max).all()
    }

    pub fn clamp_position(&self, position: Vec3) -> Vec3 {
        position.clamp(self.world_min, self.world_max)
    }

    /// Raw cell coordinates. May lie outside the grid for outside positions.
    #[inline]
    pub fn bin_coords(&self, position: Vec3) -> IVec3 {
        let normalized =
            (position - self.world_min) / (self.world_max - self.world_min) * self.resolution.as_vec3();
        normalized.floor().as_ivec3()
    }

    /// Flattened bin index, or `None` when the position is outside the grid.
    pub fn bin_index(&self, position: Vec3) -> Option<usize> {
        let coords = self.bin_coords(position);
        let res = self.resolution.as_ivec3();
        if coords.cmplt(IVec3::ZERO).any() || coords.cmpge(res).any() {
            return None;
        }
        Some(self.flatten(coords.as_uvec3()))
    }

    /// Cell coordinates clamped into the grid.
    #[inline]
    pub fn clamped_coords(&self, position: Vec3) -> UVec3 {
        let max = self.resolution.as_ivec3() - IVec3::ONE;
        self.bin_coords(position).clamp(IVec3::ZERO, max).as_uvec3()
    }

    /// Flattened bin index with the cell coordinates clamped into the grid.
    #[inline]
    pub fn clamped_bin_index(&self, position: Vec3) -> usize {
        self.flatten(self.clamped_coords(position))
    }

    #[inline]
    pub fn flatten(&self, coords: UVec3) -> usize {
        let (gx, gy) = (self.resolution.x as usize, self.resolution.y as usize);
        coords.x as usize + coords.y as usize * gx + coords.z as usize * gx * gy
    }

    pub fn unflatten(&self, index: usize) -> UVec3 {
        let (gx, gy) = (self.resolution.x as usize, self.resolution.y as usize);
        UVec3::new((index % gx) as u32, ((index / gx) % gy) as u32, (index / (gx * gy)) as u32)
    }

    /// Bins of the 3x3x3 block around `coords`, clipped at the grid edges.
    pub fn neighbor_bins(&self, coords: UVec3) -> impl Iterator<Item = usize> + '_ {
        let res = self.resolution.as_ivec3();
        let center = coords.as_ivec3();
        NEIGHBOR_OFFSETS.iter().filter_map(move |offset| {
            let cell = center + *offset;
            if cell.cmplt(IVec3::ZERO).any() || cell.cmpge(res).any() {
                None
            } else {
                Some(self.flatten(cell.as_uvec3()))
            }
        })
    }
}

/// WGSL helpers for bin mapping. Expects a `params` uniform with
/// `world_min`, `world_max` and `grid_resolution` fields.
pub const GRID_WGSL: &str = r#"
const EMPTY: i32 = -1;

// Raw cell coordinates (may be outside the grid)
fn pos_to_cell(pos: vec3<f32>) -> vec3<i32> {
    let extent = params.world_max - params.world_min;
    let normalized = (pos - params.world_min) / extent * vec3<f32>(params.grid_resolution);
    return vec3<i32>(floor(normalized));
}

fn clamped_cell(pos: vec3<f32>) -> vec3<i32> {
    let max_cell = vec3<i32>(params.grid_resolution) - vec3<i32>(1);
    return clamp(pos_to_cell(pos), vec3<i32>(0), max_cell);
}

fn flatten_cell(cell: vec3<i32>) -> u32 {
    let gx = params.grid_resolution.x;
    let gy = params.grid_resolution.y;
    return u32(cell.x) + u32(cell.y) * gx + u32(cell.z) * gx * gy;
}

fn cell_in_grid(cell: vec3<i32>) -> bool {
    let res = vec3<i32>(params.grid_resolution);
    return all(cell >= vec3<i32>(0)) && all(cell < res);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_grid() -> SpatialGrid {
        SpatialGrid::new(Vec3::splat(-10.0), Vec3::splat(10.0), UVec3::splat(4))
    }

    #[test]
    fn test_center_maps_to_bin_42() {
        let grid = scenario_grid();
        assert_eq!(grid.bin_coords(Vec3::ZERO), IVec3::new(2, 2, 2));
        assert_eq!(grid.bin_index(Vec3::ZERO), Some(42));
    }

    #[test]
    fn test_boundary_resolves_to_higher_bin() {
        let grid = scenario_grid();
        // Cell edges are at -10, -5, 0, 5, 10
        assert_eq!(grid.bin_coords(Vec3::new(-5.0, -10.0, 5.0)), IVec3::new(1, 0, 3));
        assert_eq!(grid.bin_coords(Vec3::new(-5.0001, 0.0, 0.0)).x, 0);
    }

    #[test]
    fn test_outside_positions_are_rejected() {
        let grid = scenario_grid();
        assert_eq!(grid.bin_index(Vec3::new(10.0, 0.0, 0.0)), None);
        assert_eq!(grid.bin_index(Vec3::new(-10.5, 0.0, 0.0)), None);
        assert_eq!(grid.bin_index(Vec3::new(0.0, 0.0, 100.0)), None);
    }

    #[test]
    fn test_clamped_index_stays_in_range() {
        let grid = scenario_grid();
        assert_eq!(grid.clamped_bin_index(Vec3::splat(10.0)), 63);
        assert_eq!(grid.clamped_bin_index(Vec3::splat(-50.0)), 0);
        assert_eq!(grid.clamped_bin_index(Vec3::new(100.0, -100.0, 0.0)), 3 + 2 * 16);
    }

    #[test]
    fn test_flatten_unflatten() {
        let grid = SpatialGrid::new(Vec3::ZERO, Vec3::new(3.0, 5.0, 7.0), UVec3::new(3, 5, 7));
        for index in 0..grid.bin_count() {
            assert_eq!(grid.flatten(grid.unflatten(index)), index);
        }
    }

    #[test]
    fn test_neighbor_bins_clip_at_edges() {
        let grid = scenario_grid();
        assert_eq!(grid.neighbor_bins(UVec3::ZERO).count(), 8);
        assert_eq!(grid.neighbor_bins(UVec3::new(1, 1, 0)).count(), 18);
        let inner: Vec<usize> = grid.neighbor_bins(UVec3::new(2, 2, 2)).collect();
        assert_eq!(inner.len(), 27);
        assert!(inner.contains(&42));
    }

    #[test]
    fn test_neighbor_offsets_cover_block() {
        let unique: std::collections::HashSet<_> =
            NEIGHBOR_OFFSETS.iter().map(|o| (o.x, o.y, o.z)).collect();
        assert_eq!(unique.len(), 27);
        assert!(NEIGHBOR_OFFSETS.iter().all(|o| o.abs().max_element() <= 1));
    }
}
