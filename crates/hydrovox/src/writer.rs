//! Grid file output.

use std::fs;
use std::path::{Path, PathBuf};

use hydrovox_core::{DensityGrid, Result, VolumeGeometry};

/// A density grid labelled with the field it was filled from.
#[derive(Debug, Clone, Copy)]
pub struct NamedGrid<'a> {
    pub name: &'a str,
    pub grid: &'a DensityGrid,
}

/// Serializes one or more grids of the same geometry into a single file.
pub trait GridWriter: Send {
    /// File extension without the leading dot.
    fn extension(&self) -> &'static str;

    /// Writes `grids` to `path`, replacing any existing file.
    fn write_grids(
        &self,
        path: &Path,
        geometry: &VolumeGeometry,
        grids: &[NamedGrid<'_>],
    ) -> Result<()>;
}

/// Runs `write` against a temporary sibling of `path`, then renames it into
/// place. The temporary file is removed if `write` fails.
pub(crate) fn write_atomically(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(path).with_file_name(tmp_name);

    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
