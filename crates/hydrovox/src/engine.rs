//! Fill and export of one grid per time point.

use std::fs;
use std::path::{Path, PathBuf};

use hydrovox_core::{DensityGrid, MeshSnapshot, Result, VolumeGeometry, VoxelBackend};

use crate::vol::VolWriter;
use crate::writer::{GridWriter, NamedGrid};

/// Owns the backend, the single reusable density grid, and the output target.
///
/// The grid is zeroed after every successful write so each export starts from
/// a clean buffer.
pub struct VoxelEngine {
    backend: Box<dyn VoxelBackend>,
    writer: Box<dyn GridWriter>,
    geometry: VolumeGeometry,
    grid: DensityGrid,
    output_dir: PathBuf,
}

impl VoxelEngine {
    /// Creates an engine writing Mitsuba volumes into `output_dir`.
    pub fn new(
        backend: Box<dyn VoxelBackend>,
        geometry: VolumeGeometry,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            writer: Box::new(VolWriter),
            grid: DensityGrid::new(geometry.dims()),
            geometry,
            output_dir: output_dir.into(),
        }
    }

    /// Replaces the grid writer.
    #[must_use]
    pub fn with_writer(mut self, writer: impl GridWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Builds the backend's column index for `geometry`.
    pub fn prepare(&mut self, x: &[f64], y: &[f64], plane_count: usize) -> Result<()> {
        log::info!(
            "preparing {} backend for {}x{}x{} voxels",
            self.backend.name(),
            self.geometry.dims().x,
            self.geometry.dims().y,
            self.geometry.dims().z
        );
        self.backend.prepare(&self.geometry, x, y, plane_count)
    }

    pub fn is_prepared(&self) -> bool {
        self.backend.is_prepared()
    }

    /// Fills the grid from `snapshot`. On failure the grid is zeroed so nothing
    /// partial can be written.
    pub fn fill(&mut self, snapshot: &MeshSnapshot) -> Result<()> {
        if let Err(e) = self.backend.fill(snapshot, &mut self.grid) {
            self.grid.clear();
            return Err(e);
        }
        Ok(())
    }

    /// Writes the current grid as `field_name` to `{output_dir}/{base_name}.{ext}`,
    /// then zeroes it.
    pub fn write(&mut self, field_name: &str, base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(base_name);
        self.writer.write_grids(
            &path,
            &self.geometry,
            &[NamedGrid {
                name: field_name,
                grid: &self.grid,
            }],
        )?;
        self.grid.clear();
        Ok(path)
    }

    /// Fills from `snapshot` and writes the result under the snapshot's field name.
    pub fn export_time_point(
        &mut self,
        snapshot: &MeshSnapshot,
        base_name: &str,
    ) -> Result<PathBuf> {
        self.fill(snapshot)?;
        let path = self.write(snapshot.field_name(), base_name)?;
        log::debug!("exported '{}' to {}", snapshot.field_name(), path.display());
        Ok(path)
    }

    pub fn output_path(&self, base_name: &str) -> PathBuf {
        self.output_dir.join(format!("{base_name}.{}", self.writer.extension()))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
