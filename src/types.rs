//! Points, extents and box footprints shared by the grid and the containers.
//!
//! Positions are minimum corners; x is width, y is height, z is depth.

use std::cmp::Ordering;
use std::ops::{Add, Sub};

/// Amount subtracted from a box's max corner before it is mapped to grid cells.
///
/// Keeps a face lying exactly on a cell boundary from claiming the next cell.
pub const BOUNDARY_EPSILON: f64 = 1e-3;

/// A position or an extent along the three container axes.
///
/// ```
/// use grid_packer::types::Vec3;
///
/// let anchor = Vec3::new(10.0, 0.0, 6.0);
/// let extents = Vec3::new(15.0, 12.0, 10.0);
/// assert_eq!(anchor + extents, Vec3::new(25.0, 12.0, 16.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The container origin.
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// `(x, y, z)` as used by the wire types.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    #[inline]
    pub const fn from_tuple((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }

    /// Smallest side, used to size grid cells.
    #[inline]
    pub fn min_component(&self) -> f64 {
        self.x.min(self.y).min(self.z)
    }

    /// Whether extents `self` fit inside extents `bounds` on every axis.
    #[inline]
    pub fn fits_within(&self, bounds: &Self) -> bool {
        self.x <= bounds.x && self.y <= bounds.y && self.z <= bounds.z
    }

    /// Lexicographic (z, y, x) comparison: bottom first, then back, then left.
    ///
    /// Uses `f64::total_cmp`, so the result is a total order even for
    /// signed zeros and NaNs.
    #[inline]
    pub fn cmp_zyx(&self, other: &Self) -> Ordering {
        self.z
            .total_cmp(&other.z)
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.x.total_cmp(&other.x))
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Sorting and deduplication key for anchor points.
///
/// Orders points by (z, y, x) ascending and compares them by value, so it
/// can live in ordered sets where `Vec3` itself (only `PartialEq`) cannot.
#[derive(Clone, Copy, Debug)]
pub struct AnchorKey(pub Vec3);

impl PartialEq for AnchorKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AnchorKey {}

impl PartialOrd for AnchorKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnchorKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_zyx(&other.0)
    }
}

/// Anything with extents along x, y and z.
///
/// For boxes this is the extent under the current orientation.
pub trait Dimensional {
    fn dimensions(&self) -> Vec3;
}

/// Anything anchored at a minimum corner.
pub trait Positioned {
    fn position(&self) -> Vec3;

    /// Footprint spanned by the position and the current extents.
    fn bounding_box(&self) -> BoundingBox
    where
        Self: Dimensional,
    {
        BoundingBox::from_position_and_dims(self.position(), self.dimensions())
    }
}

/// Axis-aligned footprint of a placed box.
///
/// Intervals are half-open, so neighbours sharing a face do not collide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Whether the interiors of the two boxes overlap.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// Whether the box lies inside a container of extents `bounds` anchored at the origin.
    #[inline]
    pub fn is_within(&self, bounds: &Vec3) -> bool {
        self.min.x >= 0.0
            && self.min.y >= 0.0
            && self.min.z >= 0.0
            && self.max.fits_within(bounds)
    }

    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}
