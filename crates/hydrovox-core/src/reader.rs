//! Simulation reader interface.
//!
//! A [`SimulationReader`] exposes a multi-plane mesh whose vertex values are
//! stored per time record. Planar coordinates are shared by every plane; each
//! field holds `vertices_per_plane * raw_plane_count` values, plane-major.

use std::collections::HashMap;

use crate::error::{Result, VoxelError};

/// Scalar fields of one time record, keyed by trimmed field name.
pub type FieldSet = HashMap<String, Vec<f64>>;

/// Source of time records for a layered mesh.
pub trait SimulationReader {
    /// Time value of every record, in file order.
    fn time_records(&self) -> &[f64];

    /// Reads every field of record `index`.
    fn read(&mut self, index: usize) -> Result<FieldSet>;

    /// Number of horizontal layers stored in the file.
    fn raw_plane_count(&self) -> usize;

    /// Number of vertices in one layer.
    fn vertices_per_plane(&self) -> usize;

    /// Planar x coordinates (one layer).
    fn x(&self) -> &[f64];

    /// Planar y coordinates (one layer).
    fn y(&self) -> &[f64];
}

impl<R: SimulationReader + ?Sized> SimulationReader for Box<R> {
    fn time_records(&self) -> &[f64] {
        (**self).time_records()
    }

    fn read(&mut self, index: usize) -> Result<FieldSet> {
        (**self).read(index)
    }

    fn raw_plane_count(&self) -> usize {
        (**self).raw_plane_count()
    }

    fn vertices_per_plane(&self) -> usize {
        (**self).vertices_per_plane()
    }

    fn x(&self) -> &[f64] {
        (**self).x()
    }

    fn y(&self) -> &[f64] {
        (**self).y()
    }
}

/// Reader over records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    x: Vec<f64>,
    y: Vec<f64>,
    raw_plane_count: usize,
    times: Vec<f64>,
    records: Vec<FieldSet>,
}

impl MemoryReader {
    /// Creates a reader with no records.
    ///
    /// # Panics
    /// Panics if `x` and `y` differ in length or `raw_plane_count` is zero.
    pub fn new(x: Vec<f64>, y: Vec<f64>, raw_plane_count: usize) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have the same length");
        assert!(raw_plane_count > 0, "raw_plane_count must be >= 1");
        Self {
            x,
            y,
            raw_plane_count,
            times: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Appends a time record, checking every field length.
    pub fn push_record(&mut self, time: f64, fields: FieldSet) -> Result<()> {
        let expected = self.x.len() * self.raw_plane_count;
        if let Some(bad) = fields.values().find(|values| values.len() != expected) {
            return Err(VoxelError::SizeMismatch {
                expected,
                actual: bad.len(),
            });
        }
        self.times.push(time);
        self.records.push(fields);
        Ok(())
    }

    /// Builder-style variant of [`push_record`](Self::push_record).
    pub fn with_record<'a>(
        mut self,
        time: f64,
        fields: impl IntoIterator<Item = (&'a str, Vec<f64>)>,
    ) -> Result<Self> {
        let fields = fields
            .into_iter()
            .map(|(name, values)| (name.to_string(), values))
            .collect();
        self.push_record(time, fields)?;
        Ok(self)
    }
}

impl SimulationReader for MemoryReader {
    fn time_records(&self) -> &[f64] {
        &self.times
    }

    fn read(&mut self, index: usize) -> Result<FieldSet> {
        self.records
            .get(index)
            .cloned()
            .ok_or(VoxelError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
    }

    fn raw_plane_count(&self) -> usize {
        self.raw_plane_count
    }

    fn vertices_per_plane(&self) -> usize {
        self.x.len()
    }

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }
}
