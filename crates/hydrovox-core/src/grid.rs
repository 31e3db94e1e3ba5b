//! Dense voxel density storage.

use glam::UVec3;

use crate::error::{Result, VoxelError};

/// Flat voxel density buffer in C order: voxel `(ix, iy, iz)` lives at
/// `(ix * ny + iy) * nz + iz`.
///
/// One grid is allocated per sequence, refilled for every frame and zeroed after
/// each export.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    dims: UVec3,
    data: Vec<f32>,
}

impl DensityGrid {
    /// Creates a zeroed grid.
    pub fn new(dims: UVec3) -> Self {
        let len = dims.x as usize * dims.y as usize * dims.z as usize;
        Self {
            dims,
            data: vec![0.0; len],
        }
    }

    /// Wraps existing values, checking the length against `dims`.
    pub fn from_vec(dims: UVec3, data: Vec<f32>) -> Result<Self> {
        let expected = dims.x as usize * dims.y as usize * dims.z as usize;
        if data.len() != expected {
            return Err(VoxelError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn index(&self, ix: u32, iy: u32, iz: u32) -> usize {
        (ix as usize * self.dims.y as usize + iy as usize) * self.dims.z as usize + iz as usize
    }

    #[must_use]
    pub fn get(&self, ix: u32, iy: u32, iz: u32) -> f32 {
        self.data[self.index(ix, iy, iz)]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Resets every voxel to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// True if every voxel is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    /// Copies the values into a nested `[nx][ny][nz]` array.
    #[must_use]
    pub fn to_nested(&self) -> Vec<Vec<Vec<f32>>> {
        let (ny, nz) = (self.dims.y as usize, self.dims.z as usize);
        if ny == 0 || nz == 0 {
            return vec![Vec::new(); self.dims.x as usize];
        }
        self.data
            .chunks(ny * nz)
            .map(|plane| plane.chunks(nz).map(<[f32]>::to_vec).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_zero() {
        let grid = DensityGrid::new(UVec3::new(2, 3, 4));
        assert_eq!(grid.len(), 24);
        assert!(grid.is_zero());
    }

    #[test]
    fn test_index_layout() {
        let data: Vec<f32> = (0..24u8).map(f32::from).collect();
        let grid = DensityGrid::from_vec(UVec3::new(2, 3, 4), data).unwrap();
        assert_eq!(grid.get(0, 0, 1), 1.0);
        assert_eq!(grid.get(0, 1, 0), 4.0);
        assert_eq!(grid.get(1, 0, 0), 12.0);

        let nested = grid.to_nested();
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[1][2][3], 23.0);
    }

    #[test]
    fn test_clear() {
        let mut grid = DensityGrid::from_vec(UVec3::new(1, 1, 2), vec![3.0, 4.0]).unwrap();
        assert!(!grid.is_zero());
        grid.clear();
        assert!(grid.is_zero());
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_size_mismatch() {
        let err = DensityGrid::from_vec(UVec3::new(2, 2, 2), vec![0.0; 7]).unwrap_err();
        assert!(matches!(
            err,
            VoxelError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }
}
