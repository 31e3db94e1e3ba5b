//! Linear interpolation across time records and across mesh planes.

#![allow(clippy::cast_precision_loss)]

/// Plane count after inserting `steps` virtual planes between each pair of raw planes.
#[must_use]
pub fn total_plane_count(raw_plane_count: usize, steps: usize) -> usize {
    raw_plane_count.saturating_sub(1) * steps + raw_plane_count
}

/// Fraction of the way from one record to the next for `sub_step` of `steps` sub-steps.
#[must_use]
pub fn time_fraction(sub_step: usize, steps: usize) -> f64 {
    sub_step as f64 / (steps + 1) as f64
}

/// Element-wise `current + fraction * (next - current)`.
///
/// # Panics
/// Panics if the slices differ in length.
#[must_use]
pub fn lerp(current: &[f64], next: &[f64], fraction: f64) -> Vec<f64> {
    assert_eq!(
        current.len(),
        next.len(),
        "records must have the same length"
    );
    current
        .iter()
        .zip(next)
        .map(|(&a, &b)| a + fraction * (b - a))
        .collect()
}

/// Synthesizes `steps` planes between every pair of consecutive raw planes.
///
/// `raw` holds `raw_plane_count` contiguous blocks of `vertices_per_plane` values.
/// Raw block `k` is copied to synthetic plane `k * (steps + 1)`; the planes in
/// between are linear blends of the two raw blocks around them. The result is
/// plane-major with [`total_plane_count`] planes.
///
/// # Panics
/// Panics if `raw.len() != vertices_per_plane * raw_plane_count`.
#[must_use]
pub fn interpolate_planes(
    raw: &[f64],
    vertices_per_plane: usize,
    raw_plane_count: usize,
    steps: usize,
) -> Vec<f64> {
    assert_eq!(
        raw.len(),
        vertices_per_plane * raw_plane_count,
        "field length does not match {raw_plane_count} planes of {vertices_per_plane} vertices"
    );
    if steps == 0 || raw_plane_count < 2 {
        return raw.to_vec();
    }

    let stride = steps + 1;
    let planes = total_plane_count(raw_plane_count, steps);
    let block = |k: usize| &raw[k * vertices_per_plane..(k + 1) * vertices_per_plane];

    let mut out = Vec::with_capacity(planes * vertices_per_plane);
    for p in 0..planes {
        let (k, slot) = (p / stride, p % stride);
        if slot == 0 {
            out.extend_from_slice(block(k));
        } else {
            let fraction = slot as f64 / stride as f64;
            out.extend(
                block(k)
                    .iter()
                    .zip(block(k + 1))
                    .map(|(&lower, &upper)| lower + fraction * (upper - lower)),
            );
        }
    }
    out
}
