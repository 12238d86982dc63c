//! Seeded box generators for demos, comparisons and benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::model::{Box3D, ValidationError};

/// Parcel templates (width, height, depth) used by [`parcel_boxes`].
pub const PARCEL_TEMPLATES: [(f64, f64, f64); 6] = [
    (30.0, 20.0, 10.0),
    (40.0, 30.0, 20.0),
    (60.0, 40.0, 30.0),
    (80.0, 60.0, 40.0),
    (100.0, 20.0, 15.0),
    (25.0, 25.0, 25.0),
];

/// Named container extents for demo runs.
pub const CONTAINER_PRESETS: [(&str, (f64, f64, f64)); 3] = [
    ("small", (50.0, 40.0, 30.0)),
    ("medium", (100.0, 80.0, 60.0)),
    ("sea_container", (589.0, 235.0, 239.0)),
];

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

const PARCEL_SCALE_MIN: f64 = 0.8;
const PARCEL_SCALE_MAX: f64 = 1.2;
/// Weight per unit of volume for generated parcels.
const PARCEL_DENSITY: f64 = 0.0002;

/// Kind of generated data set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Boxes with integer sides in 5..=20.
    Uniform,
    /// Parcel templates with ±20 % variation.
    Parcels,
}

/// Generates a data set of the given kind.
pub fn generate(kind: DatasetKind, count: usize, seed: u64) -> Result<Vec<Box3D>, ValidationError> {
    match kind {
        DatasetKind::Uniform => uniform_boxes(count, seed, 5, 20),
        DatasetKind::Parcels => parcel_boxes(count, seed),
    }
}

/// Boxes with integer sides drawn from `min..=max`, largest volume first.
///
/// Ids run from 1 to `count` in generation order; every box has unit weight.
pub fn uniform_boxes(
    count: usize,
    seed: u64,
    min: u32,
    max: u32,
) -> Result<Vec<Box3D>, ValidationError> {
    if min == 0 || min > max {
        return Err(ValidationError::InvalidConfiguration(format!(
            "side range must satisfy 0 < min <= max, got {}..={}",
            min, max
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut boxes = (1..=count)
        .map(|id| {
            let dims = (
                f64::from(rng.gen_range(min..=max)),
                f64::from(rng.gen_range(min..=max)),
                f64::from(rng.gen_range(min..=max)),
            );
            Box3D::unit(id, dims)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable sort keeps generation order among equal volumes.
    boxes.sort_by(|a, b| b.volume().total_cmp(&a.volume()));
    Ok(boxes)
}

/// Parcel-like boxes: a random template with every side scaled by 0.8 to 1.2.
pub fn parcel_boxes(count: usize, seed: u64) -> Result<Vec<Box3D>, ValidationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=count)
        .map(|id| {
            let (w, h, d) = PARCEL_TEMPLATES[rng.gen_range(0..PARCEL_TEMPLATES.len())];
            let dims = (
                w * rng.gen_range(PARCEL_SCALE_MIN..PARCEL_SCALE_MAX),
                h * rng.gen_range(PARCEL_SCALE_MIN..PARCEL_SCALE_MAX),
                d * rng.gen_range(PARCEL_SCALE_MIN..PARCEL_SCALE_MAX),
            );
            Box3D::new(id, dims, dims.0 * dims.1 * dims.2 * PARCEL_DENSITY)
        })
        .collect()
}

/// Looks up a container preset by name.
pub fn preset_container(name: &str) -> Option<(f64, f64, f64)> {
    CONTAINER_PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|(_, dims)| *dims)
}
