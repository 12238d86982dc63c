//! Candidate anchor construction and scoring.
//!
//! An anchor is the minimum corner at which a box could be placed. Anchors
//! come from the faces of occupied grid cells and of already placed boxes;
//! each attempt ranks them by a composite score so that low, near, left
//! positions are tried first.

use std::cmp::Ordering;

use crate::types::{BoundingBox, Vec3};

/// Weights of the position score. Lower scores are tried first.
///
/// `score = z·z_weight + y·y_weight + x·x_weight − utilization·utilization_weight`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    pub z: f64,
    pub y: f64,
    pub x: f64,
    pub utilization: f64,
}

impl ScoreWeights {
    pub const DEFAULT_Z: f64 = 1.0;
    pub const DEFAULT_Y: f64 = 0.8;
    pub const DEFAULT_X: f64 = 0.6;
    pub const DEFAULT_UTILIZATION: f64 = 10.0;

    /// Scores an anchor given the utilization the container would reach.
    #[inline]
    pub fn score(&self, anchor: &Vec3, utilization: f64) -> f64 {
        anchor.z * self.z + anchor.y * self.y + anchor.x * self.x
            - utilization * self.utilization
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            z: Self::DEFAULT_Z,
            y: Self::DEFAULT_Y,
            x: Self::DEFAULT_X,
            utilization: Self::DEFAULT_UTILIZATION,
        }
    }
}

/// The six anchors that put a box of `extents` flush against the faces of
/// the region `[min, min + size]`.
///
/// The first three sit on the +x, +y and +z faces; the last three put the
/// box against the −x, −y and −z faces from the outside.
#[inline]
pub fn face_anchors(min: Vec3, size: Vec3, extents: Vec3) -> [Vec3; 6] {
    [
        Vec3::new(min.x + size.x, min.y, min.z),
        Vec3::new(min.x, min.y + size.y, min.z),
        Vec3::new(min.x, min.y, min.z + size.z),
        Vec3::new(min.x - extents.x, min.y, min.z),
        Vec3::new(min.x, min.y - extents.y, min.z),
        Vec3::new(min.x, min.y, min.z - extents.z),
    ]
}

/// Checks whether a box of `extents` anchored at `anchor` stays inside `bounds`.
#[inline]
pub fn fits_in_bounds(anchor: Vec3, extents: Vec3, bounds: &Vec3) -> bool {
    BoundingBox::from_position_and_dims(anchor, extents).is_within(bounds)
}

/// An anchor together with its score.
#[derive(Clone, Copy, Debug)]
struct ScoredAnchor {
    anchor: Vec3,
    score: f64,
}

impl ScoredAnchor {
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.anchor.cmp_zyx(&other.anchor))
    }
}

/// Deduplicates anchors and orders them by ascending score, ties by (z, y, x).
///
/// `utilization` is the fill ratio the container would reach with the box
/// placed; it is the same for every anchor of one attempt.
pub fn rank<I>(anchors: I, weights: &ScoreWeights, utilization: f64) -> Vec<Vec3>
where
    I: IntoIterator<Item = Vec3>,
{
    let mut scored: Vec<ScoredAnchor> = anchors
        .into_iter()
        .map(|anchor| ScoredAnchor {
            anchor,
            score: weights.score(&anchor, utilization),
        })
        .collect();

    scored.sort_by(ScoredAnchor::cmp_rank);
    // Equal anchors have equal scores, so duplicates end up adjacent.
    scored.dedup_by(|a, b| a.anchor.cmp_zyx(&b.anchor) == Ordering::Equal);
    scored.into_iter().map(|s| s.anchor).collect()
}
