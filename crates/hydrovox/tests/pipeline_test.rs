//! End-to-end tests: Selafin file in, `.vol` frames out.
//!
//! GPU comparisons need an adapter (real or software fallback); without one
//! they print a notice and return early.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use hydrovox::*;

/// 3x3 lattice over [0, 10]^2 on two planes (z = -4 and z = 0), three records.
/// Elevation is constant in time; velocity grows by 10 per record.
fn write_fixture(dir: &Path) -> PathBuf {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..3_i32 {
        for j in 0..3_i32 {
            x.push(f64::from(i) * 5.0);
            y.push(f64::from(j) * 5.0);
        }
    }
    let elevation: Vec<f64> = [-4.0; 9].into_iter().chain([0.0; 9]).collect();
    let records = (0..3_i32)
        .map(|t| {
            let u = (0..18_i32).map(|v| f64::from(v) + 10.0 * f64::from(t)).collect();
            (f64::from(t) * 3600.0, vec![elevation.clone(), u])
        })
        .collect();

    let path = dir.join("lattice.slf");
    SelafinFile {
        title: "lattice".into(),
        plane_count: 2,
        x,
        y,
        variables: vec!["ELEVATION Z".into(), "VELOCITY U".into()],
        records,
        ..SelafinFile::default()
    }
    .save(&path)
    .unwrap();
    path
}

fn config(source: PathBuf, output: &Path, backend: BackendKind) -> SequenceConfig {
    SequenceConfig {
        source,
        sizing: VolumeSizing::Dimensions([2, 2, 2]),
        backend,
        output_dir: output.to_path_buf(),
        ..SequenceConfig::default()
    }
}

/// Decodes a single-channel `.vol`, returning its resolution and x-fastest data.
fn read_vol(path: &Path) -> ([i32; 3], Vec<f32>) {
    let bytes = fs::read(path).unwrap();
    assert_eq!(&bytes[..4], b"VOL\x03");
    let int = |at: usize| i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
    assert_eq!(int(4), 1, "float32 encoding");
    assert_eq!(int(20), 1, "single channel");
    let data = bytes[48..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    ([int(8), int(12), int(16)], data)
}

#[test]
fn test_sequence_names_and_counts_frames() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let out = dir.path().join("volumes");

    let mut config = config(source, &out, BackendKind::Sequential);
    config.time_interp_steps = 1;
    config.base_name = "tide".into();

    let report = run(&config, &AtomicBool::new(false)).unwrap();
    assert!(!report.cancelled);
    // 3 time points plus one sub-step between each pair
    let expected: Vec<PathBuf> = (0..5).map(|i| out.join(format!("tide_{i}.vol"))).collect();
    assert_eq!(report.frames, expected);

    for frame in &report.frames {
        let (dims, data) = read_vol(frame);
        assert_eq!(dims, [2, 2, 2]);
        assert_eq!(data.len(), 8);
        assert!(data.iter().any(|&d| d != 0.0));
    }
    assert!(!out.join("tide_5.vol").exists());

    let manifest = VolumeManifest::load(&report.frames[0]).unwrap();
    assert_eq!(manifest.channels, vec!["VELOCITY U"]);
    assert_eq!(manifest.dims, [2, 2, 2]);
}

#[test]
fn test_unusable_voxel_size_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let out = dir.path().join("volumes");

    for size in [[0.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, f64::NAN], [1.0e-12, 1.0, 1.0]] {
        let mut config = config(source.clone(), &out, BackendKind::Sequential);
        config.sizing = VolumeSizing::VoxelSize(size);
        assert!(
            matches!(
                run(&config, &AtomicBool::new(false)),
                Err(VoxelError::InvalidGeometry(_))
            ),
            "{size:?}"
        );
    }
    assert!(!out.exists());
}

#[test]
fn test_sub_step_is_midpoint_of_neighbours() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let out = dir.path().join("volumes");

    let mut config = config(source, &out, BackendKind::Sequential);
    config.time_interp_steps = 1;
    config.end = Some(1);

    let report = run(&config, &AtomicBool::new(false)).unwrap();
    assert_eq!(report.frames.len(), 3);

    let (_, first) = read_vol(&report.frames[0]);
    let (_, mid) = read_vol(&report.frames[1]);
    let (_, last) = read_vol(&report.frames[2]);
    for ((a, m), b) in first.iter().zip(&mid).zip(&last) {
        if *a == 0.0 {
            // candidate sets do not move with time here
            assert_eq!(*m, 0.0);
        } else {
            assert!((m - (a + b) / 2.0).abs() < 1e-4, "{m} vs {a}, {b}");
            assert!((b - a - 10.0).abs() < 1e-4);
        }
    }
}

#[test]
fn test_parallel_output_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());

    let seq = run(
        &config(source.clone(), &dir.path().join("seq"), BackendKind::Sequential),
        &AtomicBool::new(false),
    )
    .unwrap();
    let par = run(
        &config(source, &dir.path().join("par"), BackendKind::Parallel { threads: 2 }),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(seq.frames.len(), par.frames.len());
    for (a, b) in seq.frames.iter().zip(&par.frames) {
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_gpu_output_matches_sequential() {
    if let Err(e) = GpuBackend::new() {
        eprintln!("Skipping GPU pipeline test: {e}");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());

    let seq = run(
        &config(source.clone(), &dir.path().join("seq"), BackendKind::Sequential),
        &AtomicBool::new(false),
    )
    .unwrap();
    let gpu = run(
        &config(source, &dir.path().join("gpu"), BackendKind::Gpu),
        &AtomicBool::new(false),
    )
    .unwrap();

    for (a, b) in seq.frames.iter().zip(&gpu.frames) {
        let (_, expected) = read_vol(a);
        let (_, actual) = read_vol(b);
        for (e, g) in expected.iter().zip(&actual) {
            assert!((e - g).abs() <= 1e-6 * e.abs().max(1.0), "{g} vs {e}");
        }
    }
}

#[test]
fn test_cancelled_before_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let out = dir.path().join("volumes");

    let report = run(
        &config(source, &out, BackendKind::Sequential),
        &AtomicBool::new(true),
    )
    .unwrap();
    assert!(report.cancelled);
    assert!(report.frames.is_empty());
}

#[test]
fn test_missing_field_reports_frame() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let mut config = config(source, &dir.path().join("volumes"), BackendKind::Sequential);
    config.field = "SALINITY".into();

    match run(&config, &AtomicBool::new(false)) {
        Err(VoxelError::FrameFailed {
            time_index,
            sub_step,
            field,
            source,
        }) => {
            assert_eq!((time_index, sub_step), (0, 0));
            assert_eq!(field, "SALINITY");
            assert!(matches!(*source, VoxelError::FieldNotFound { .. }));
        }
        other => panic!("expected FrameFailed, got {other:?}"),
    }
}

#[test]
fn test_range_and_source_errors() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path());
    let out = dir.path().join("volumes");

    let mut bad_end = config(source, &out, BackendKind::Sequential);
    bad_end.end = Some(9);
    assert!(matches!(
        run(&bad_end, &AtomicBool::new(false)),
        Err(VoxelError::IndexOutOfRange { index: 9, len: 3 })
    ));
    assert!(!out.exists(), "nothing is written when the range is invalid");

    let missing = config(dir.path().join("nope.slf"), &out, BackendKind::Sequential);
    assert!(matches!(
        run(&missing, &AtomicBool::new(false)),
        Err(VoxelError::FileNotFound(_))
    ));
}

#[test]
fn test_engine_with_memory_reader() {
    let dir = tempfile::tempdir().unwrap();
    let reader = MemoryReader::new(vec![0.0, 10.0, 0.0, 10.0], vec![0.0, 0.0, 10.0, 10.0], 1)
        .with_record(
            0.0,
            [
                ("COTE Z", vec![0.0; 4]),
                ("TRACER", vec![1.0, 2.0, 3.0, 4.0]),
            ],
        )
        .unwrap();
    let mut sampler = MeshSampler::load(reader, 0, 0).unwrap();

    let geometry =
        VolumeGeometry::new(DVec3::ZERO, DVec3::new(5.0, 5.0, 1.0), UVec3::new(2, 2, 1));
    let mut engine = VoxelEngine::new(
        create_backend(BackendKind::Sequential).unwrap(),
        geometry,
        dir.path(),
    );
    let plan = FramePlan::new(0, None, 0, sampler.time_record_count()).unwrap();
    let report = run_sequence(
        &mut sampler,
        &mut engine,
        &plan,
        "TRACER",
        "corners",
        &AtomicBool::new(false),
    )
    .unwrap();

    let (dims, data) = read_vol(&report.frames[0]);
    assert_eq!(dims, [2, 2, 1]);
    // x fastest: (0,0), (1,0), (0,1), (1,1)
    assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
}
