//! Mitsuba grid volume (`.vol`) writer.
//!
//! Layout, all little-endian:
//!
//! ```text
//! "VOL" 3            magic and version
//! 1 (i32)            encoding: float32
//! xres yres zres     (i32)
//! channels (i32)
//! xmin ymin zmin xmax ymax zmax (f32)
//! data               f32, ((z * yres + y) * xres + x) * channels + channel
//! ```
//!
//! The format has no room for channel names, so every volume gets a
//! [`VolumeManifest`] sidecar (`frame_0.vol` -> `frame_0.json`).

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use hydrovox_core::{Result, VolumeGeometry, VoxelError};
use serde::{Deserialize, Serialize};

use crate::writer::{write_atomically, GridWriter, NamedGrid};

const MAGIC: &[u8; 3] = b"VOL";
const VERSION: u8 = 3;
const ENCODING_FLOAT32: i32 = 1;

/// Channel names and placement of one `.vol` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeManifest {
    /// Field name of each channel, in channel order.
    pub channels: Vec<String>,
    pub dims: [u32; 3],
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
}

impl VolumeManifest {
    pub fn new(geometry: &VolumeGeometry, grids: &[NamedGrid<'_>]) -> Self {
        Self {
            channels: grids.iter().map(|g| g.name.to_owned()).collect(),
            dims: geometry.dims().to_array(),
            bbox_min: geometry.grid_min().to_array(),
            bbox_max: geometry.grid_max().to_array(),
        }
    }

    /// Sidecar path of a volume file.
    #[must_use]
    pub fn path_for(volume: &Path) -> PathBuf {
        volume.with_extension("json")
    }

    /// Reads the sidecar of `volume`.
    pub fn load(volume: &Path) -> Result<Self> {
        let text = fs::read_to_string(Self::path_for(volume))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, volume: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        write_atomically(&Self::path_for(volume), |tmp| Ok(fs::write(tmp, text)?))
    }
}

/// Writes grids as channels of one Mitsuba volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolWriter;

impl VolWriter {
    /// Encodes `grids` as interleaved channels of one volume.
    pub fn encode<W: Write>(
        out: &mut W,
        geometry: &VolumeGeometry,
        grids: &[NamedGrid<'_>],
    ) -> Result<()> {
        let dims = geometry.dims();
        if grids.is_empty() {
            return Err(VoxelError::FormatError("no grid to write".into()));
        }
        for named in grids {
            if named.grid.dims() != dims {
                return Err(VoxelError::SizeMismatch {
                    expected: geometry.voxel_count(),
                    actual: named.grid.len(),
                });
            }
        }

        out.write_all(MAGIC)?;
        out.write_u8(VERSION)?;
        out.write_i32::<LittleEndian>(ENCODING_FLOAT32)?;
        for res in dims.to_array() {
            out.write_i32::<LittleEndian>(res as i32)?;
        }
        out.write_i32::<LittleEndian>(grids.len() as i32)?;

        let (min, max) = (geometry.grid_min(), geometry.grid_max());
        for bound in min.to_array().into_iter().chain(max.to_array()) {
            out.write_f32::<LittleEndian>(bound as f32)?;
        }

        for iz in 0..dims.z {
            for iy in 0..dims.y {
                for ix in 0..dims.x {
                    for named in grids {
                        out.write_f32::<LittleEndian>(named.grid.get(ix, iy, iz))?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl GridWriter for VolWriter {
    fn extension(&self) -> &'static str {
        "vol"
    }

    fn write_grids(
        &self,
        path: &Path,
        geometry: &VolumeGeometry,
        grids: &[NamedGrid<'_>],
    ) -> Result<()> {
        write_atomically(path, |tmp| {
            let mut out = BufWriter::new(File::create(tmp)?);
            Self::encode(&mut out, geometry, grids)?;
            out.flush()?;
            Ok(())
        })?;
        VolumeManifest::new(geometry, grids).save(path)?;

        let names: Vec<&str> = grids.iter().map(|g| g.name).collect();
        log::debug!("wrote {} ({})", path.display(), names.join(", "));
        Ok(())
    }
}
