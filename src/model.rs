//! Data models for the box packing engine.
//!
//! This module defines the fundamental data structures:
//! - `Box3D`: an item to be packed, with its orientation and placement state
//! - `Orientation`: one of the six axis-aligned rotations of a box
//! - `ContainerSpec`: validated container extents and weight budget
//!
//! Box placement state is only written by the containers in this crate, so a
//! caller never observes a half-placed box.

use std::fmt;

use thiserror::Error;

use crate::types::{Dimensional, Positioned, Vec3};

/// Validation error for box and container data.
///
/// Returned when a caller violates a construction contract (non-positive or
/// non-finite extents, invalid weights). A box that merely does not fit is
/// never an error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Helper function to validate a single dimension.
pub(crate) fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive and finite, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_box_weight(value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "Weight must be non-negative and finite, got: {}",
            value
        )));
    }
    Ok(())
}

fn validate_weight_budget(value: f64) -> Result<(), ValidationError> {
    // An infinite budget is how "no weight limit" is expressed.
    if value <= 0.0 || value.is_nan() {
        return Err(ValidationError::InvalidWeight(format!(
            "Maximum weight must be positive, got: {}",
            value
        )));
    }
    Ok(())
}

fn validate_dims_3d(dims: (f64, f64, f64), prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.0, &format!("{prefix}width"))?;
    validate_dimension(dims.1, &format!("{prefix}height"))?;
    validate_dimension(dims.2, &format!("{prefix}depth"))?;
    Ok(())
}

/// Axis permutations for the six axis-aligned rotations of a box.
///
/// Entry `i` lists which original dimension (0 = width, 1 = height,
/// 2 = depth) lies along x, y and z under orientation `i`.
pub const ORIENTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2], // w, h, d
    [0, 2, 1], // w, d, h
    [1, 0, 2], // h, w, d
    [1, 2, 0], // h, d, w
    [2, 0, 1], // d, w, h
    [2, 1, 0], // d, h, w
];

/// One of the six axis-aligned rotations of a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Orientation(usize);

impl Orientation {
    /// All orientations in search priority order.
    pub const ALL: [Orientation; 6] = [
        Orientation(0),
        Orientation(1),
        Orientation(2),
        Orientation(3),
        Orientation(4),
        Orientation(5),
    ];

    /// The unrotated orientation.
    pub const IDENTITY: Orientation = Orientation(0);

    /// Creates an orientation from its table index, clamping to `0..=5`.
    pub fn from_index(index: usize) -> Self {
        Self(index.min(ORIENTATIONS.len() - 1))
    }

    /// Index into [`ORIENTATIONS`].
    pub fn index(self) -> usize {
        self.0
    }

    /// Applies the permutation to original `(width, height, depth)` dimensions.
    pub fn apply(self, dims: (f64, f64, f64)) -> Vec3 {
        let source = [dims.0, dims.1, dims.2];
        let [ix, iy, iz] = ORIENTATIONS[self.0];
        Vec3::new(source[ix], source[iy], source[iz])
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a 3D box to be packed.
///
/// # Fields
/// * `id` - Unique identification number of the box
/// * `dims` - Original dimensions (width, height, depth)
/// * `weight` - Weight of the box
///
/// Orientation, position and the placed flag are managed by the container
/// that holds the box and are exposed read-only.
#[derive(Clone, Debug)]
pub struct Box3D {
    pub id: usize,
    pub dims: (f64, f64, f64),
    pub weight: f64,
    orientation: Orientation,
    position: Vec3,
    placed: bool,
}

impl Box3D {
    /// Weight assigned by [`Box3D::unit`].
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    /// Creates a new unplaced Box3D with validation.
    ///
    /// # Parameters
    /// * `id` - Unique ID
    /// * `dims` - Dimensions (width, height, depth)
    /// * `weight` - Weight, zero or more
    ///
    /// # Examples
    /// ```
    /// use grid_packer::model::Box3D;
    ///
    /// let box_ok = Box3D::new(1, (10.0, 20.0, 30.0), 5.0);
    /// assert!(box_ok.is_ok());
    ///
    /// let box_invalid = Box3D::new(1, (-10.0, 20.0, 30.0), 5.0);
    /// assert!(box_invalid.is_err());
    /// ```
    pub fn new(id: usize, dims: (f64, f64, f64), weight: f64) -> Result<Self, ValidationError> {
        validate_dims_3d(dims, "")?;
        validate_box_weight(weight)?;
        Ok(Self {
            id,
            dims,
            weight,
            orientation: Orientation::IDENTITY,
            position: Vec3::zero(),
            placed: false,
        })
    }

    /// Creates a box with [`Box3D::DEFAULT_WEIGHT`].
    pub fn unit(id: usize, dims: (f64, f64, f64)) -> Result<Self, ValidationError> {
        Self::new(id, dims, Self::DEFAULT_WEIGHT)
    }

    /// Volume of the box; independent of the orientation.
    pub fn volume(&self) -> f64 {
        let (w, h, d) = self.dims;
        w * h * d
    }

    /// Extents along x, y and z under the given orientation.
    #[inline]
    pub fn extents_for(&self, orientation: Orientation) -> Vec3 {
        orientation.apply(self.dims)
    }

    /// Current orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Whether the box is currently placed in a container.
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Checks whether at least one orientation fits into `bounds`.
    pub fn fits_any_orientation(&self, bounds: &Vec3) -> bool {
        Orientation::ALL
            .iter()
            .any(|&o| self.extents_for(o).fits_within(bounds))
    }

    /// Records a successful placement. Position, orientation and flag change together.
    pub(crate) fn mark_placed(&mut self, position: Vec3, orientation: Orientation) {
        self.position = position;
        self.orientation = orientation;
        self.placed = true;
    }

    pub(crate) fn mark_unplaced(&mut self) {
        self.placed = false;
    }
}

impl PartialEq for Box3D {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Box3D {}

impl Dimensional for Box3D {
    fn dimensions(&self) -> Vec3 {
        self.extents_for(self.orientation)
    }
}

impl Positioned for Box3D {
    fn position(&self) -> Vec3 {
        self.position
    }
}

impl fmt::Display for Box3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h, d) = self.dims;
        let p = self.position;
        write!(
            f,
            "Box[id={}, dims=({:.1},{:.1},{:.1}), pos=({:.1},{:.1},{:.1}), orient={}, placed={}]",
            self.id, w, h, d, p.x, p.y, p.z, self.orientation, self.placed
        )
    }
}

/// Validated container extents and weight budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerSpec {
    pub dims: (f64, f64, f64),
    pub max_weight: f64,
}

impl ContainerSpec {
    /// Creates a container specification after validating the parameters.
    ///
    /// `None` for `max_weight` means the weight is not limited.
    pub fn new(dims: (f64, f64, f64), max_weight: Option<f64>) -> Result<Self, ValidationError> {
        validate_dims_3d(dims, "Container ")?;
        let max_weight = max_weight.unwrap_or(f64::INFINITY);
        validate_weight_budget(max_weight)?;
        Ok(Self { dims, max_weight })
    }

    /// Container extents as a vector.
    #[inline]
    pub fn dims_as_vec3(&self) -> Vec3 {
        Vec3::from_tuple(self.dims)
    }

    /// Returns the volume of the container.
    pub fn volume(&self) -> f64 {
        let (w, h, d) = self.dims;
        w * h * d
    }

    /// Whether a weight limit applies.
    pub fn has_weight_limit(&self) -> bool {
        self.max_weight.is_finite()
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Vec3 {
        self.dims_as_vec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_table_holds_six_distinct_permutations() {
        for (i, perm) in ORIENTATIONS.iter().enumerate() {
            let mut sorted = *perm;
            sorted.sort_unstable();
            assert_eq!(sorted, [0, 1, 2], "entry {} is not a permutation", i);
            for other in &ORIENTATIONS[i + 1..] {
                assert_ne!(perm, other);
            }
        }
    }

    #[test]
    fn extents_follow_orientation_table() {
        let b = Box3D::unit(1, (10.0, 8.0, 6.0)).unwrap();
        assert_eq!(b.extents_for(Orientation::from_index(0)), Vec3::new(10.0, 8.0, 6.0));
        assert_eq!(b.extents_for(Orientation::from_index(1)), Vec3::new(10.0, 6.0, 8.0));
        assert_eq!(b.extents_for(Orientation::from_index(3)), Vec3::new(8.0, 6.0, 10.0));
        assert_eq!(b.extents_for(Orientation::from_index(5)), Vec3::new(6.0, 8.0, 10.0));
    }

    #[test]
    fn orientation_index_is_clamped() {
        assert_eq!(Orientation::from_index(42).index(), 5);
    }

    #[test]
    fn new_box_starts_unplaced_at_origin() {
        let b = Box3D::new(7, (1.0, 2.0, 3.0), 4.0).unwrap();
        assert!(!b.is_placed());
        assert_eq!(b.orientation(), Orientation::IDENTITY);
        assert_eq!(b.position(), Vec3::zero());
        assert!((b.volume() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn volume_is_orientation_invariant() {
        let mut b = Box3D::unit(1, (2.0, 3.0, 5.0)).unwrap();
        let before = b.volume();
        b.mark_placed(Vec3::zero(), Orientation::from_index(4));
        assert_eq!(b.volume(), before);
        let extents = b.dimensions();
        assert!((extents.x * extents.y * extents.z - before).abs() < 1e-12);
    }

    #[test]
    fn boxes_compare_by_id() {
        let a = Box3D::unit(1, (1.0, 1.0, 1.0)).unwrap();
        let b = Box3D::unit(1, (9.0, 9.0, 9.0)).unwrap();
        let c = Box3D::unit(2, (1.0, 1.0, 1.0)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_invalid_box_parameters() {
        assert!(matches!(
            Box3D::new(1, (0.0, 1.0, 1.0), 1.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(matches!(
            Box3D::new(1, (1.0, f64::NAN, 1.0), 1.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(matches!(
            Box3D::new(1, (1.0, 1.0, 1.0), -2.0),
            Err(ValidationError::InvalidWeight(_))
        ));
    }

    #[test]
    fn fits_any_orientation_checks_rotations() {
        let bounds = Vec3::new(50.0, 40.0, 30.0);
        let tall = Box3D::unit(1, (10.0, 45.0, 5.0)).unwrap();
        let huge = Box3D::unit(2, (200.0, 5.0, 5.0)).unwrap();
        assert!(tall.fits_any_orientation(&bounds));
        assert!(!huge.fits_any_orientation(&bounds));
    }

    #[test]
    fn container_spec_validation() {
        let unlimited = ContainerSpec::new((50.0, 40.0, 30.0), None).unwrap();
        assert!(!unlimited.has_weight_limit());
        assert!((unlimited.volume() - 60_000.0).abs() < 1e-9);

        assert!(ContainerSpec::new((0.0, 40.0, 30.0), None).is_err());
        assert!(ContainerSpec::new((50.0, -1.0, 30.0), Some(10.0)).is_err());
        assert!(ContainerSpec::new((50.0, 40.0, 30.0), Some(0.0)).is_err());
    }
}
