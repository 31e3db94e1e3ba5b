//! Voxel grid geometry and mesh extents.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxelError};

/// Axis-aligned extent of a mesh: minimum corner plus `(length, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: DVec3,
    pub extent: DVec3,
}

impl MeshBounds {
    /// Computes bounds from planar coordinates and every elevation value.
    ///
    /// Empty inputs give a zero-sized box at the origin.
    pub fn from_coordinates(x: &[f64], y: &[f64], z: &[f64]) -> Self {
        fn span(values: &[f64]) -> (f64, f64) {
            if values.is_empty() {
                return (0.0, 0.0);
            }
            values
                .iter()
                .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
        }

        let (x0, x1) = span(x);
        let (y0, y1) = span(y);
        let (z0, z1) = span(z);

        Self {
            min: DVec3::new(x0, y0, z0),
            extent: DVec3::new(x1 - x0, y1 - y0, z1 - z0),
        }
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> DVec3 {
        self.min + self.extent
    }
}

/// How the voxel grid resolution is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSizing {
    /// Explicit voxel counts `[nx, ny, nz]`; voxel size follows from the mesh extent.
    Dimensions([u32; 3]),
    /// Fixed voxel size; counts are `round(extent / size)`.
    VoxelSize([f64; 3]),
}

impl Default for VolumeSizing {
    fn default() -> Self {
        Self::Dimensions([64, 64, 16])
    }
}

/// Placement and resolution of a regular voxel grid.
///
/// Voxel `(ix, iy, iz)` is centered at `origin + discretization_offset + (i + 0.5) * voxel_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeGeometry {
    origin: DVec3,
    voxel_size: DVec3,
    dims: UVec3,
    discretization_offset: DVec3,
}

impl VolumeGeometry {
    /// Creates a geometry with explicit dimensions (no discretization offset).
    ///
    /// # Panics
    /// Panics if any dimension is zero or any voxel size is not strictly positive.
    pub fn new(origin: DVec3, voxel_size: DVec3, dims: UVec3) -> Self {
        assert!(dims.min_element() > 0, "All dimensions must be >= 1");
        assert!(
            voxel_size.min_element() > 0.0,
            "Voxel size must be positive, got {voxel_size:?}"
        );
        Self {
            origin,
            voxel_size,
            dims,
            discretization_offset: DVec3::ZERO,
        }
    }

    /// Fits a grid over mesh bounds.
    ///
    /// With [`VolumeSizing::VoxelSize`] the rounded dimensions no longer cover the
    /// extent exactly; the half-voxel mismatch `|dims - extent/size| * 0.5 * size`
    /// shifts the grid so it stays centered on the mesh.
    ///
    /// Fails with [`VoxelError::InvalidGeometry`] for a voxel size that is not
    /// finite and positive, or when the voxel count does not fit in memory indices.
    pub fn from_bounds(bounds: &MeshBounds, sizing: VolumeSizing) -> Result<Self> {
        let geometry = match sizing {
            VolumeSizing::Dimensions(dims) => {
                let dims = UVec3::from_array(dims).max(UVec3::ONE);
                let size = bounds.extent / dims.as_dvec3();
                // flat axes (single plane, constant elevation) get unit voxels
                let size = DVec3::select(size.cmpgt(DVec3::ZERO), size, DVec3::ONE);
                if !size.is_finite() {
                    return Err(VoxelError::InvalidGeometry(format!(
                        "mesh extent {:?} is not finite",
                        bounds.extent
                    )));
                }
                Self::new(bounds.min, size, dims)
            }
            VolumeSizing::VoxelSize(size) => {
                let size = DVec3::from_array(size);
                if !size.is_finite() || size.min_element() <= 0.0 {
                    return Err(VoxelError::InvalidGeometry(format!(
                        "voxel size must be finite and positive, got {size:?}"
                    )));
                }
                let raw = bounds.extent / size;
                let derived = raw.round().max(DVec3::ONE);
                if !derived.is_finite() || derived.max_element() > f64::from(u32::MAX) {
                    return Err(VoxelError::InvalidGeometry(format!(
                        "voxel size {size:?} gives {derived:?} voxels per axis"
                    )));
                }
                let mut geometry = Self::new(bounds.min, size, derived.as_uvec3());
                geometry.discretization_offset = (raw - derived) * 0.5 * size;
                geometry
            }
        };

        if geometry.checked_voxel_count().is_none() {
            return Err(VoxelError::InvalidGeometry(format!(
                "{:?} voxels overflow the address space",
                geometry.dims
            )));
        }
        Ok(geometry)
    }

    /// Mesh-space origin the grid was fitted to.
    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    #[must_use]
    pub fn voxel_size(&self) -> DVec3 {
        self.voxel_size
    }

    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Signed centering correction; its magnitude is `|dims - extent/size| * 0.5 * size`.
    #[must_use]
    pub fn discretization_offset(&self) -> DVec3 {
        self.discretization_offset
    }

    /// Minimum corner of the first voxel.
    #[must_use]
    pub fn grid_min(&self) -> DVec3 {
        self.origin + self.discretization_offset
    }

    /// Maximum corner of the last voxel.
    #[must_use]
    pub fn grid_max(&self) -> DVec3 {
        self.grid_min() + self.dims.as_dvec3() * self.voxel_size
    }

    /// Number of horizontal columns (`nx * ny`).
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.dims.x as usize * self.dims.y as usize
    }

    /// Total number of voxels (`nx * ny * nz`).
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.column_count() * self.dims.z as usize
    }

    /// `nx * ny * nz`, or `None` if it overflows `usize`.
    #[must_use]
    pub fn checked_voxel_count(&self) -> Option<usize> {
        (self.dims.x as usize)
            .checked_mul(self.dims.y as usize)?
            .checked_mul(self.dims.z as usize)
    }

    /// Flattened column id of `(ix, iy)`.
    #[must_use]
    pub fn column_id(&self, ix: u32, iy: u32) -> usize {
        ix as usize * self.dims.y as usize + iy as usize
    }

    /// Flattened voxel id of `(ix, iy, iz)`.
    #[must_use]
    pub fn voxel_id(&self, ix: u32, iy: u32, iz: u32) -> usize {
        self.column_id(ix, iy) * self.dims.z as usize + iz as usize
    }

    /// World-space center of voxel `(ix, iy, iz)`.
    #[must_use]
    pub fn voxel_center(&self, ix: u32, iy: u32, iz: u32) -> DVec3 {
        self.grid_min() + (UVec3::new(ix, iy, iz).as_dvec3() + 0.5) * self.voxel_size
    }

    /// Horizontal search window of column `(ix, iy)`: `(xmin, xmax, ymin, ymax)`.
    ///
    /// The window reaches one full voxel past the center on each side, so it is
    /// two voxels wide and overlaps its neighbours.
    #[must_use]
    pub fn column_window(&self, ix: u32, iy: u32) -> (f64, f64, f64, f64) {
        let center = self.voxel_center(ix, iy, 0);
        (
            center.x - self.voxel_size.x,
            center.x + self.voxel_size.x,
            center.y - self.voxel_size.y,
            center.y + self.voxel_size.y,
        )
    }

    /// Inclusive range of column indices along one axis whose window may contain `coord`.
    pub(crate) fn candidate_range(&self, coord: f64, axis: usize) -> Option<(u32, u32)> {
        let n = self.dims[axis];
        let u = (coord - self.grid_min()[axis]) / self.voxel_size[axis] - 0.5;
        if !u.is_finite() {
            return None;
        }
        let lo = (u.floor() - 1.0).max(0.0);
        let hi = (u.floor() + 2.0).min(f64::from(n) - 1.0);
        if hi < lo {
            return None;
        }
        Some((lo as u32, hi as u32))
    }
}
