//! Per-time-step mesh view handed to the fill backends.

use std::sync::Arc;

use crate::error::{Result, VoxelError};

/// Immutable mesh state at one (possibly interpolated) time point.
///
/// Planar coordinates are shared by every plane; `z` and `scalar` hold one value
/// per vertex per plane, plane-major.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    x: Arc<[f64]>,
    y: Arc<[f64]>,
    z: Vec<f64>,
    scalar: Vec<f64>,
    field_name: String,
    plane_count: usize,
}

impl MeshSnapshot {
    /// Builds a snapshot, checking `len(z) == len(scalar) == len(x) * plane_count`.
    pub fn new(
        x: Arc<[f64]>,
        y: Arc<[f64]>,
        z: Vec<f64>,
        scalar: Vec<f64>,
        field_name: impl Into<String>,
        plane_count: usize,
    ) -> Result<Self> {
        if y.len() != x.len() {
            return Err(VoxelError::SizeMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        let expected = x.len() * plane_count;
        for actual in [z.len(), scalar.len()] {
            if actual != expected {
                return Err(VoxelError::SizeMismatch { expected, actual });
            }
        }
        Ok(Self {
            x,
            y,
            z,
            scalar,
            field_name: field_name.into(),
            plane_count,
        })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Elevation of every vertex of every plane.
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// Values of the sampled field, aligned with [`z`](Self::z).
    pub fn scalar(&self) -> &[f64] {
        &self.scalar
    }

    /// Name of the sampled field.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    #[must_use]
    pub fn vertices_per_plane(&self) -> usize {
        self.x.len()
    }

    /// Plane count including interpolated planes.
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_invariant() {
        let x: Arc<[f64]> = vec![0.0, 1.0].into();
        let y: Arc<[f64]> = vec![0.0, 1.0].into();

        let ok = MeshSnapshot::new(x.clone(), y.clone(), vec![0.0; 6], vec![1.0; 6], "F", 3);
        let snapshot = ok.unwrap();
        assert_eq!(snapshot.vertices_per_plane(), 2);
        assert_eq!(snapshot.plane_count(), 3);
        assert_eq!(snapshot.field_name(), "F");

        let bad = MeshSnapshot::new(x, y, vec![0.0; 5], vec![1.0; 6], "F", 3);
        assert!(matches!(
            bad,
            Err(VoxelError::SizeMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }
}
