//! Export of a range of time points, with interpolated sub-steps.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use hydrovox_backends::create_backend;
use hydrovox_core::{
    MeshSampler, Result, SequenceConfig, SimulationReader, VolumeGeometry, VoxelError,
};

use crate::engine::VoxelEngine;
use crate::selafin::open_selafin;

/// Outcome of a sequence run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceReport {
    /// Written files, in export order.
    pub frames: Vec<PathBuf>,
    /// Whether the run stopped early on the cancellation flag.
    pub cancelled: bool,
}

/// Which frames a run will export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub start: usize,
    pub end: usize,
    pub time_interp_steps: usize,
}

impl FramePlan {
    /// Resolves `[start, end]` against `record_count`; `end = None` means the last record.
    pub fn new(
        start: usize,
        end: Option<usize>,
        time_interp_steps: usize,
        record_count: usize,
    ) -> Result<Self> {
        let end = end.unwrap_or(record_count.saturating_sub(1));
        for index in [start, end] {
            if index >= record_count {
                return Err(VoxelError::IndexOutOfRange {
                    index,
                    len: record_count,
                });
            }
        }
        if start > end {
            return Err(VoxelError::IndexOutOfRange {
                index: start,
                len: end + 1,
            });
        }
        Ok(Self {
            start,
            end,
            time_interp_steps,
        })
    }

    /// Every `(time_index, sub_step)` in export order.
    ///
    /// Sub-steps blend towards the next record, so none follow the last time point.
    pub fn frames(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.start..=self.end).flat_map(move |t| {
            let subs = if t < self.end { self.time_interp_steps } else { 0 };
            (0..=subs).map(move |s| (t, s))
        })
    }

    pub fn frame_count(&self) -> usize {
        let points = self.end - self.start + 1;
        points + (points - 1) * self.time_interp_steps
    }
}

/// Exports every frame of `plan` through `engine`, naming them
/// `{base_name}_{counter}` with one counter over all frames.
///
/// The engine is prepared from the sampler's mesh first if needed. `cancel` is
/// checked before each frame.
pub fn run_sequence<R: SimulationReader>(
    sampler: &mut MeshSampler<R>,
    engine: &mut VoxelEngine,
    plan: &FramePlan,
    field: &str,
    base_name: &str,
    cancel: &AtomicBool,
) -> Result<SequenceReport> {
    if !engine.is_prepared() {
        engine.prepare(sampler.x(), sampler.y(), sampler.total_plane_count())?;
    }

    log::info!(
        "exporting {} frames of '{field}' (time points {}..={}) with the {} backend",
        plan.frame_count(),
        plan.start,
        plan.end,
        engine.backend_name()
    );

    let mut report = SequenceReport::default();
    for (counter, (time_index, sub_step)) in plan.frames().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::warn!("sequence cancelled after {} frames", report.frames.len());
            report.cancelled = true;
            break;
        }

        let frame_name = format!("{base_name}_{counter}");
        let exported = sampler
            .set_time_point(time_index, sub_step)
            .and_then(|()| sampler.snapshot(&[field]))
            .and_then(|snapshot| engine.export_time_point(&snapshot, &frame_name));

        match exported {
            Ok(path) => {
                log::debug!("frame {counter} ({time_index}.{sub_step}) -> {}", path.display());
                report.frames.push(path);
            }
            Err(source) => {
                return Err(VoxelError::FrameFailed {
                    time_index,
                    sub_step,
                    field: field.to_string(),
                    source: Box::new(source),
                })
            }
        }
    }

    log::info!(
        "wrote {} frames to {}",
        report.frames.len(),
        engine.output_dir().display()
    );
    Ok(report)
}

/// Runs a whole sequence from a config: opens the Selafin source, fits the grid
/// to the mesh, and exports every frame.
pub fn run(config: &SequenceConfig, cancel: &AtomicBool) -> Result<SequenceReport> {
    let mut sampler = open_selafin(
        &config.source,
        config.plane_interp_steps,
        config.time_interp_steps,
    )?;
    let plan = FramePlan::new(
        config.start,
        config.end,
        config.time_interp_steps,
        sampler.time_record_count(),
    )?;

    let geometry = VolumeGeometry::from_bounds(&sampler.bounds(), config.sizing)?;
    let backend = create_backend(config.backend)?;
    let mut engine = VoxelEngine::new(backend, geometry, &config.output_dir);

    run_sequence(
        &mut sampler,
        &mut engine,
        &plan,
        &config.field,
        &config.base_name,
        cancel,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults_to_last_record() {
        let plan = FramePlan::new(1, None, 0, 4).unwrap();
        assert_eq!((plan.start, plan.end), (1, 3));
        assert_eq!(plan.frames().collect::<Vec<_>>(), vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn test_plan_sub_steps_stop_before_end() {
        let plan = FramePlan::new(0, Some(2), 2, 3).unwrap();
        let frames: Vec<_> = plan.frames().collect();
        assert_eq!(
            frames,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0)]
        );
        assert_eq!(plan.frame_count(), frames.len());
    }

    #[test]
    fn test_plan_single_point_has_no_sub_steps() {
        let plan = FramePlan::new(2, Some(2), 3, 3).unwrap();
        assert_eq!(plan.frames().collect::<Vec<_>>(), vec![(2, 0)]);
        assert_eq!(plan.frame_count(), 1);
    }

    #[test]
    fn test_plan_rejects_out_of_range() {
        assert!(matches!(
            FramePlan::new(0, Some(3), 0, 3),
            Err(VoxelError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            FramePlan::new(5, None, 0, 3),
            Err(VoxelError::IndexOutOfRange { index: 5, len: 3 })
        ));
        assert!(matches!(
            FramePlan::new(2, Some(1), 0, 3),
            Err(VoxelError::IndexOutOfRange { index: 2, .. })
        ));
        assert!(FramePlan::new(0, None, 0, 0).is_err());
    }
}
