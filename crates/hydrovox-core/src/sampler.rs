//! Time- and plane-interpolated sampling of a layered simulation mesh.

use std::sync::Arc;

use crate::error::{Result, VoxelError};
use crate::geometry::MeshBounds;
use crate::interpolation::{interpolate_planes, lerp, time_fraction, total_plane_count};
use crate::mesh::MeshSnapshot;
use crate::reader::{FieldSet, SimulationReader};

/// Field names tried, in order, for vertex elevation.
pub const ELEVATION_FIELDS: [&str; 2] = ["ELEVATION Z", "COTE Z"];

/// Produces [`MeshSnapshot`]s for any `(time_index, sub_step)` pair.
///
/// Sub-step `s` of `time_interp_steps` blends record `t` towards record `t + 1`
/// by `s / (time_interp_steps + 1)`. Every field read through the sampler,
/// elevation included, goes through the same blend and then through plane
/// interpolation.
pub struct MeshSampler<R> {
    reader: R,
    plane_interp_steps: usize,
    time_interp_steps: usize,
    raw_plane_count: usize,
    vertices_per_plane: usize,
    total_plane_count: usize,
    x: Arc<[f64]>,
    y: Arc<[f64]>,
    bounds: MeshBounds,
    time_index: usize,
    sub_step: usize,
    current: FieldSet,
    next: Option<(usize, FieldSet)>,
}

impl<R: SimulationReader> MeshSampler<R> {
    /// Loads the first record of `reader` and measures the mesh extent.
    pub fn load(mut reader: R, plane_interp_steps: usize, time_interp_steps: usize) -> Result<Self> {
        if reader.time_records().is_empty() {
            return Err(VoxelError::FormatError("file has no time records".into()));
        }

        let vertices_per_plane = reader.vertices_per_plane();
        let raw_plane_count = reader.raw_plane_count();
        if raw_plane_count == 0 {
            return Err(VoxelError::FormatError("mesh has no planes".into()));
        }
        for coords in [reader.x(), reader.y()] {
            if coords.len() != vertices_per_plane {
                return Err(VoxelError::SizeMismatch {
                    expected: vertices_per_plane,
                    actual: coords.len(),
                });
            }
        }

        let x: Arc<[f64]> = reader.x().into();
        let y: Arc<[f64]> = reader.y().into();
        let current = reader.read(0)?;

        let mut sampler = Self {
            reader,
            plane_interp_steps,
            time_interp_steps,
            raw_plane_count,
            vertices_per_plane,
            total_plane_count: total_plane_count(raw_plane_count, plane_interp_steps),
            x,
            y,
            bounds: MeshBounds::from_coordinates(&[], &[], &[]),
            time_index: 0,
            sub_step: 0,
            current,
            next: None,
        };

        let elevation = sampler.get_field(&ELEVATION_FIELDS)?;
        sampler.bounds = MeshBounds::from_coordinates(&sampler.x, &sampler.y, &elevation);

        log::info!(
            "loaded mesh: {} vertices x {} planes ({} after interpolation), {} time records",
            vertices_per_plane,
            raw_plane_count,
            sampler.total_plane_count,
            sampler.time_record_count()
        );
        Ok(sampler)
    }

    /// Moves to record `time_index`, optionally blended towards the next record.
    pub fn set_time_point(&mut self, time_index: usize, sub_step: usize) -> Result<()> {
        let len = self.time_record_count();
        if time_index >= len {
            return Err(VoxelError::IndexOutOfRange {
                index: time_index,
                len,
            });
        }
        if sub_step > self.time_interp_steps {
            return Err(VoxelError::IndexOutOfRange {
                index: sub_step,
                len: self.time_interp_steps + 1,
            });
        }
        if sub_step > 0 && time_index + 1 >= len {
            return Err(VoxelError::IndexOutOfRange {
                index: time_index + 1,
                len,
            });
        }

        // read everything first so a failed read leaves the previous time point intact
        let cached_next = self.next.as_ref().map(|(index, _)| *index);
        let moving = time_index != self.time_index;
        // the previous "next" record is often the new current one
        let reuse_next = moving && cached_next == Some(time_index);
        let fresh_current = if moving && !reuse_next {
            Some(self.reader.read(time_index)?)
        } else {
            None
        };
        let fresh_next = if sub_step > 0 && cached_next != Some(time_index + 1) {
            Some(self.reader.read(time_index + 1)?)
        } else {
            None
        };

        if let Some(fields) = fresh_current {
            self.current = fields;
        } else if reuse_next {
            if let Some((_, fields)) = self.next.take() {
                self.current = fields;
            }
        }
        if let Some(fields) = fresh_next {
            self.next = Some((time_index + 1, fields));
        }
        self.time_index = time_index;
        self.sub_step = sub_step;

        log::debug!("time point {time_index}.{sub_step}");
        Ok(())
    }

    /// Returns the first of `candidates` present in the current record,
    /// time-blended and plane-interpolated.
    pub fn get_field(&self, candidates: &[&str]) -> Result<Vec<f64>> {
        let name = self
            .find_field(candidates)
            .ok_or_else(|| self.field_not_found(candidates))?;
        let values = &self.current[name];

        let expected = self.vertices_per_plane * self.raw_plane_count;
        if values.len() != expected {
            return Err(VoxelError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }

        let blended = match (&self.next, self.sub_step) {
            (Some((_, next)), sub_step) if sub_step > 0 => {
                let upper = next.get(name).ok_or_else(|| VoxelError::FieldNotFound {
                    candidates: vec![name.to_string()],
                    time_index: self.time_index + 1,
                })?;
                if upper.len() != expected {
                    return Err(VoxelError::SizeMismatch {
                        expected,
                        actual: upper.len(),
                    });
                }
                lerp(values, upper, time_fraction(sub_step, self.time_interp_steps))
            }
            _ => values.clone(),
        };

        Ok(interpolate_planes(
            &blended,
            self.vertices_per_plane,
            self.raw_plane_count,
            self.plane_interp_steps,
        ))
    }

    /// Samples elevation and the first matching field at the current time point.
    pub fn snapshot(&self, candidates: &[&str]) -> Result<MeshSnapshot> {
        let z = self.get_field(&ELEVATION_FIELDS)?;
        let scalar = self.get_field(candidates)?;
        let name = self
            .find_field(candidates)
            .ok_or_else(|| self.field_not_found(candidates))?;

        MeshSnapshot::new(
            Arc::clone(&self.x),
            Arc::clone(&self.y),
            z,
            scalar,
            name,
            self.total_plane_count,
        )
    }

    fn find_field(&self, candidates: &[&str]) -> Option<&str> {
        candidates
            .iter()
            .map(|name| name.trim())
            .find(|name| self.current.contains_key(*name))
            .and_then(|name| self.current.get_key_value(name))
            .map(|(key, _)| key.as_str())
    }

    fn field_not_found(&self, candidates: &[&str]) -> VoxelError {
        VoxelError::FieldNotFound {
            candidates: candidates.iter().map(ToString::to_string).collect(),
            time_index: self.time_index,
        }
    }

    /// Names of every field in the current record, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.current.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Current `(time_index, sub_step)`.
    #[must_use]
    pub fn time_point(&self) -> (usize, usize) {
        (self.time_index, self.sub_step)
    }

    #[must_use]
    pub fn time_record_count(&self) -> usize {
        self.reader.time_records().len()
    }

    /// Mesh extent measured on the first record.
    #[must_use]
    pub fn bounds(&self) -> MeshBounds {
        self.bounds
    }

    #[must_use]
    pub fn vertices_per_plane(&self) -> usize {
        self.vertices_per_plane
    }

    #[must_use]
    pub fn raw_plane_count(&self) -> usize {
        self.raw_plane_count
    }

    /// Plane count including interpolated planes.
    #[must_use]
    pub fn total_plane_count(&self) -> usize {
        self.total_plane_count
    }

    #[must_use]
    pub fn time_interp_steps(&self) -> usize {
        self.time_interp_steps
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryReader;

    /// Two vertices, two raw planes, three records; elevation rises by 1 per record.
    fn reader() -> MemoryReader {
        MemoryReader::new(vec![0.0, 4.0], vec![0.0, 2.0], 2)
            .with_record(
                0.0,
                [
                    ("ELEVATION Z", vec![0.0, 0.0, 10.0, 10.0]),
                    ("VELOCITY U", vec![1.0, 2.0, 3.0, 4.0]),
                ],
            )
            .unwrap()
            .with_record(
                1.0,
                [
                    ("ELEVATION Z", vec![1.0, 1.0, 11.0, 11.0]),
                    ("VELOCITY U", vec![3.0, 4.0, 5.0, 6.0]),
                ],
            )
            .unwrap()
            .with_record(
                2.0,
                [
                    ("ELEVATION Z", vec![2.0, 2.0, 12.0, 12.0]),
                    ("VELOCITY U", vec![5.0, 6.0, 7.0, 8.0]),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_load_measures_bounds() {
        let sampler = MeshSampler::load(reader(), 1, 1).unwrap();
        assert_eq!(sampler.total_plane_count(), 3);
        assert_eq!(sampler.time_record_count(), 3);
        let bounds = sampler.bounds();
        assert_eq!(bounds.min.to_array(), [0.0, 0.0, 0.0]);
        assert_eq!(bounds.extent.to_array(), [4.0, 2.0, 10.0]);
    }

    #[test]
    fn test_alternate_elevation_name() {
        let reader = MemoryReader::new(vec![0.0], vec![0.0], 1)
            .with_record(0.0, [("COTE Z", vec![3.5])])
            .unwrap();
        let sampler = MeshSampler::load(reader, 0, 0).unwrap();
        assert_eq!(sampler.bounds().min.z, 3.5);
    }

    #[test]
    fn test_missing_elevation() {
        let reader = MemoryReader::new(vec![0.0], vec![0.0], 1)
            .with_record(0.0, [("DEPTH", vec![1.0])])
            .unwrap();
        assert!(matches!(
            MeshSampler::load(reader, 0, 0),
            Err(VoxelError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_file() {
        let reader = MemoryReader::new(vec![0.0], vec![0.0], 1);
        assert!(matches!(
            MeshSampler::load(reader, 0, 0),
            Err(VoxelError::FormatError(_))
        ));
    }

    #[test]
    fn test_sub_step_zero_is_raw_record() {
        let mut sampler = MeshSampler::load(reader(), 0, 3).unwrap();
        sampler.set_time_point(1, 0).unwrap();
        assert_eq!(
            sampler.get_field(&["VELOCITY U"]).unwrap(),
            vec![3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_midpoint_is_average() {
        let mut sampler = MeshSampler::load(reader(), 0, 1).unwrap();
        sampler.set_time_point(0, 1).unwrap();
        assert_eq!(
            sampler.get_field(&["VELOCITY U"]).unwrap(),
            vec![2.0, 3.0, 4.0, 5.0]
        );
        // elevation is blended too
        assert_eq!(
            sampler.get_field(&ELEVATION_FIELDS).unwrap(),
            vec![0.5, 0.5, 10.5, 10.5]
        );
    }

    #[test]
    fn test_walking_sub_steps_reuses_records() {
        let mut sampler = MeshSampler::load(reader(), 0, 1).unwrap();
        for (t, s, expected) in [
            (0, 0, 1.0),
            (0, 1, 2.0),
            (1, 0, 3.0),
            (1, 1, 4.0),
            (2, 0, 5.0),
        ] {
            sampler.set_time_point(t, s).unwrap();
            assert_eq!(sampler.time_point(), (t, s));
            assert_eq!(sampler.get_field(&["VELOCITY U"]).unwrap()[0], expected);
        }
    }

    #[test]
    fn test_time_and_plane_interpolation_compose() {
        let mut sampler = MeshSampler::load(reader(), 1, 1).unwrap();
        sampler.set_time_point(0, 1).unwrap();
        let snapshot = sampler.snapshot(&["VELOCITY U"]).unwrap();
        assert_eq!(snapshot.plane_count(), 3);
        assert_eq!(snapshot.z(), &[0.5, 0.5, 5.5, 5.5, 10.5, 10.5]);
        assert_eq!(snapshot.scalar(), &[2.0, 3.0, 3.0, 4.0, 4.0, 5.0]);
        assert_eq!(snapshot.field_name(), "VELOCITY U");
    }

    #[test]
    fn test_out_of_range() {
        let mut sampler = MeshSampler::load(reader(), 0, 2).unwrap();
        assert!(matches!(
            sampler.set_time_point(3, 0),
            Err(VoxelError::IndexOutOfRange { index: 3, len: 3 })
        ));
        // no record after the last one to blend towards
        assert!(matches!(
            sampler.set_time_point(2, 1),
            Err(VoxelError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            sampler.set_time_point(0, 3),
            Err(VoxelError::IndexOutOfRange { .. })
        ));
    }

    /// Fails every read of one record.
    struct BrokenRecord {
        inner: MemoryReader,
        broken: usize,
    }

    impl SimulationReader for BrokenRecord {
        fn time_records(&self) -> &[f64] {
            self.inner.time_records()
        }

        fn read(&mut self, index: usize) -> Result<FieldSet> {
            if index == self.broken {
                return Err(VoxelError::FormatError(format!("record {index} is truncated")));
            }
            self.inner.read(index)
        }

        fn raw_plane_count(&self) -> usize {
            self.inner.raw_plane_count()
        }

        fn vertices_per_plane(&self) -> usize {
            self.inner.vertices_per_plane()
        }

        fn x(&self) -> &[f64] {
            self.inner.x()
        }

        fn y(&self) -> &[f64] {
            self.inner.y()
        }
    }

    #[test]
    fn test_failed_read_keeps_time_point() {
        let broken = BrokenRecord {
            inner: reader(),
            broken: 2,
        };
        let mut sampler = MeshSampler::load(broken, 0, 1).unwrap();
        sampler.set_time_point(0, 1).unwrap();

        // blending 1 -> 2 needs the broken record
        assert!(matches!(
            sampler.set_time_point(1, 1),
            Err(VoxelError::FormatError(_))
        ));
        assert_eq!(sampler.time_point(), (0, 1));
        assert_eq!(sampler.get_field(&["VELOCITY U"]).unwrap()[0], 2.0);

        sampler.set_time_point(1, 0).unwrap();
        assert_eq!(sampler.get_field(&["VELOCITY U"]).unwrap()[0], 3.0);
        assert!(sampler.set_time_point(2, 0).is_err());
        assert_eq!(sampler.time_point(), (1, 0));
        assert_eq!(sampler.get_field(&["VELOCITY U"]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_field_candidates() {
        let sampler = MeshSampler::load(reader(), 0, 0).unwrap();
        assert!(sampler.get_field(&["TEMPERATURE", "VELOCITY U "]).is_ok());
        assert!(matches!(
            sampler.get_field(&["TEMPERATURE"]),
            Err(VoxelError::FieldNotFound { time_index: 0, .. })
        ));
        assert_eq!(sampler.field_names(), vec!["ELEVATION Z", "VELOCITY U"]);
    }
}
