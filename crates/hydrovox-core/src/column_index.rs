//! Spatial binning of mesh vertices into voxel columns.
//!
//! Every horizontal voxel column `(ix, iy)` (flattened to `xy_id = ix * ny + iy`)
//! owns the ids of the vertices whose planar position lies inside the column's
//! search window (see [`VolumeGeometry::column_window`]). Planar positions are the
//! same on every plane, so one match is replicated across all planes as
//! `plane * vertices_per_plane + vertex`. The index depends only on geometry and
//! planar coordinates and is built once per sequence.

#![allow(clippy::cast_possible_truncation)]

use std::ops::Range;

use crate::error::{Result, VoxelError};
use crate::geometry::VolumeGeometry;
use crate::mesh::MeshSnapshot;

/// Vertical acceptance window of every z layer.
///
/// Layer `k` accepts `zmin[k] <= z <= zmax[k]`, centered on the voxel and two
/// voxel heights tall.
#[derive(Debug, Clone, PartialEq)]
pub struct ZBounds {
    pub zmin: Vec<f64>,
    pub zmax: Vec<f64>,
}

impl ZBounds {
    pub fn new(geometry: &VolumeGeometry) -> Self {
        let height = geometry.voxel_size().z;
        let (zmin, zmax) = (0..geometry.dims().z)
            .map(|iz| {
                let center = geometry.voxel_center(0, 0, iz).z;
                (center - height, center + height)
            })
            .unzip();
        Self { zmin, zmax }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zmin.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zmin.is_empty()
    }

    #[must_use]
    pub fn contains(&self, iz: usize, z: f64) -> bool {
        self.zmin[iz] <= z && z <= self.zmax[iz]
    }
}

/// Per-column candidate vertex ids, replicated over every plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnIndex {
    columns: Vec<Vec<u32>>,
    vertices_per_plane: usize,
    plane_count: usize,
}

impl ColumnIndex {
    /// Bins every column in one pass.
    pub fn build(
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<Self> {
        let columns = build_column_range(geometry, x, y, plane_count, 0..geometry.column_count())?;
        Ok(Self::from_columns(columns, x.len(), plane_count))
    }

    /// Assembles an index from columns built elsewhere (e.g. by parallel workers).
    pub fn from_columns(columns: Vec<Vec<u32>>, vertices_per_plane: usize, plane_count: usize) -> Self {
        Self {
            columns,
            vertices_per_plane,
            plane_count,
        }
    }

    /// Number of columns (`nx * ny`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Candidate vertex ids of column `xy_id`.
    #[must_use]
    pub fn column(&self, xy_id: usize) -> &[u32] {
        &self.columns[xy_id]
    }

    #[must_use]
    pub fn vertices_per_plane(&self) -> usize {
        self.vertices_per_plane
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Total number of stored ids across all columns.
    #[must_use]
    pub fn total_candidates(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Packs the index into one flat buffer for a single device binding.
    ///
    /// Layout: `[offset_0, len_0, offset_1, len_1, ..., ids...]`, where offsets are
    /// absolute positions in the returned buffer.
    pub fn pack(&self) -> Result<Vec<u32>> {
        let header = self.columns.len() * 2;
        let total = header + self.total_candidates();
        if u32::try_from(total).is_err() {
            return Err(VoxelError::TooManyVertices(total));
        }

        let mut packed = Vec::with_capacity(total);
        let mut offset = header;
        for column in &self.columns {
            packed.push(offset as u32);
            packed.push(column.len() as u32);
            offset += column.len();
        }
        for column in &self.columns {
            packed.extend_from_slice(column);
        }
        Ok(packed)
    }

    /// Checks that a snapshot matches the mesh this index was built for.
    pub fn check_snapshot(&self, snapshot: &MeshSnapshot) -> Result<()> {
        if snapshot.vertices_per_plane() != self.vertices_per_plane {
            return Err(VoxelError::SizeMismatch {
                expected: self.vertices_per_plane,
                actual: snapshot.vertices_per_plane(),
            });
        }
        if snapshot.plane_count() != self.plane_count {
            return Err(VoxelError::SizeMismatch {
                expected: self.plane_count,
                actual: snapshot.plane_count(),
            });
        }
        Ok(())
    }
}

/// Bins the columns `xy_ids` (a contiguous range of flattened column ids).
///
/// Vertices are scattered into the few columns whose windows can reach them and
/// then confirmed with the exact window test, so each column lists its matches in
/// ascending vertex order, plane after plane.
pub fn build_column_range(
    geometry: &VolumeGeometry,
    x: &[f64],
    y: &[f64],
    plane_count: usize,
    xy_ids: Range<usize>,
) -> Result<Vec<Vec<u32>>> {
    if x.len() != y.len() {
        return Err(VoxelError::SizeMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    let replicated = x.len() * plane_count;
    if u32::try_from(replicated).is_err() {
        return Err(VoxelError::TooManyVertices(replicated));
    }

    let ny = geometry.dims().y as usize;
    let mut matches: Vec<Vec<u32>> = vec![Vec::new(); xy_ids.len()];

    for (vertex, (&px, &py)) in x.iter().zip(y).enumerate() {
        let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (
            geometry.candidate_range(px, 0),
            geometry.candidate_range(py, 1),
        ) else {
            continue;
        };
        for ix in x_lo..=x_hi {
            for iy in y_lo..=y_hi {
                let xy_id = ix as usize * ny + iy as usize;
                if !xy_ids.contains(&xy_id) {
                    continue;
                }
                let (xmin, xmax, ymin, ymax) = geometry.column_window(ix, iy);
                if xmin <= px && px <= xmax && ymin <= py && py <= ymax {
                    matches[xy_id - xy_ids.start].push(vertex as u32);
                }
            }
        }
    }

    let vertices_per_plane = x.len();
    Ok(matches
        .into_iter()
        .map(|found| {
            let mut column = Vec::with_capacity(found.len() * plane_count);
            for plane in 0..plane_count {
                let base = (plane * vertices_per_plane) as u32;
                column.extend(found.iter().map(|&v| base + v));
            }
            column
        })
        .collect())
}

/// Mean scalar over the candidates of `voxel_id` whose elevation falls in the
/// voxel's z window, or exactly `0.0` when none do.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn voxel_density(
    columns: &ColumnIndex,
    bounds: &ZBounds,
    snapshot: &MeshSnapshot,
    voxel_id: usize,
) -> f32 {
    let nz = bounds.len();
    let (xy_id, iz) = (voxel_id / nz, voxel_id % nz);
    let (z, scalar) = (snapshot.z(), snapshot.scalar());

    let (sum, count) = columns
        .column(xy_id)
        .iter()
        .map(|&v| v as usize)
        .filter(|&v| bounds.contains(iz, z[v]))
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + scalar[v], count + 1));

    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}
