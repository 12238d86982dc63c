//! Unindexed reference container.
//!
//! Candidates are the origin plus three corners of every placed box, and
//! collisions are found by scanning all placed boxes. It exists so that the
//! grid-backed [`PackingContainer`](crate::container::PackingContainer) can be
//! compared against a simple, obviously correct placement.

use std::fmt;

use crate::model::{Box3D, ContainerSpec, Orientation, ValidationError};
use crate::types::{AnchorKey, BoundingBox, Dimensional, Positioned, Vec3};

#[derive(Debug, Clone)]
pub struct BaselineContainer {
    spec: ContainerSpec,
    allow_rotation: bool,
    placed: Vec<Box3D>,
    current_weight: f64,
    placed_volume: f64,
    positions_examined: u64,
}

impl BaselineContainer {
    pub fn new(dims: (f64, f64, f64), max_weight: Option<f64>) -> Result<Self, ValidationError> {
        Ok(Self {
            spec: ContainerSpec::new(dims, max_weight)?,
            allow_rotation: true,
            placed: Vec::new(),
            current_weight: 0.0,
            placed_volume: 0.0,
            positions_examined: 0,
        })
    }

    /// Restricts placement to the unrotated orientation when `false`.
    pub fn with_rotation(mut self, allow: bool) -> Self {
        self.allow_rotation = allow;
        self
    }

    /// Places a box at the first free corner candidate.
    pub fn place_box(&mut self, item: &mut Box3D) -> bool {
        if item.is_placed() || self.contains(item.id) {
            return false;
        }
        if self.current_weight + item.weight > self.spec.max_weight {
            return false;
        }

        let bounds = self.spec.dims_as_vec3();
        let candidates = self.corner_candidates();
        let orientations: &[Orientation] = if self.allow_rotation {
            &Orientation::ALL
        } else {
            &Orientation::ALL[..1]
        };

        for &orientation in orientations {
            let extents = item.extents_for(orientation);
            for &anchor in &candidates {
                let candidate = BoundingBox::from_position_and_dims(anchor, extents);
                if !candidate.is_within(&bounds) {
                    continue;
                }
                self.positions_examined += 1;
                if self.overlaps_any(&candidate) {
                    continue;
                }

                item.mark_placed(anchor, orientation);
                self.current_weight += item.weight;
                self.placed_volume += item.volume();
                self.placed.push(item.clone());
                return true;
            }
        }
        false
    }

    /// Removes a placed box. Returns `false` if it is not in this container.
    pub fn remove_box(&mut self, item: &mut Box3D) -> bool {
        let Some(index) = self.placed.iter().position(|b| b.id == item.id) else {
            return false;
        };
        let stored = self.placed.remove(index);
        self.current_weight -= stored.weight;
        self.placed_volume -= stored.volume();
        item.mark_unplaced();
        true
    }

    /// Origin plus the +x, +y and +z corners of every placed box, in (z, y, x) order.
    fn corner_candidates(&self) -> Vec<Vec3> {
        let mut keys: Vec<AnchorKey> = Vec::with_capacity(1 + self.placed.len() * 3);
        keys.push(AnchorKey(Vec3::zero()));
        for b in &self.placed {
            let bb = b.bounding_box();
            keys.push(AnchorKey(Vec3::new(bb.max.x, bb.min.y, bb.min.z)));
            keys.push(AnchorKey(Vec3::new(bb.min.x, bb.max.y, bb.min.z)));
            keys.push(AnchorKey(Vec3::new(bb.min.x, bb.min.y, bb.max.z)));
        }
        keys.sort();
        keys.dedup();
        keys.into_iter().map(|k| k.0).collect()
    }

    fn overlaps_any(&self, candidate: &BoundingBox) -> bool {
        self.placed
            .iter()
            .any(|b| b.bounding_box().intersects(candidate))
    }

    pub fn placed_boxes(&self) -> Vec<Box3D> {
        self.placed.clone()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.placed.iter().any(|b| b.id == id)
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    pub fn volume_utilization(&self) -> f64 {
        self.placed_volume / self.spec.volume()
    }

    pub fn weight_utilization(&self) -> f64 {
        if self.spec.has_weight_limit() {
            self.current_weight / self.spec.max_weight
        } else {
            0.0
        }
    }

    pub fn positions_examined(&self) -> u64 {
        self.positions_examined
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }
}

impl fmt::Display for BaselineContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h, d) = self.spec.dims;
        write!(
            f,
            "BaselineContainer[dims=({:.1},{:.1},{:.1}), boxes={}, util={:.1}%]",
            w,
            h,
            d,
            self.placed.len(),
            self.volume_utilization() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_along_corners() {
        let mut container = BaselineContainer::new((50.0, 40.0, 30.0), None).unwrap();
        let mut a = Box3D::unit(1, (10.0, 8.0, 6.0)).unwrap();
        let mut b = Box3D::unit(2, (15.0, 12.0, 10.0)).unwrap();

        assert!(container.place_box(&mut a));
        assert!(container.place_box(&mut b));
        assert_eq!(a.position(), Vec3::zero());
        assert_eq!(b.position(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(container.placed_count(), 2);
    }

    #[test]
    fn rejects_oversized_and_overweight() {
        let mut container = BaselineContainer::new((50.0, 40.0, 30.0), Some(5.0)).unwrap();
        let mut huge = Box3D::unit(1, (200.0, 5.0, 5.0)).unwrap();
        let mut heavy = Box3D::new(2, (5.0, 5.0, 5.0), 6.0).unwrap();

        assert!(!container.place_box(&mut huge));
        assert!(!container.place_box(&mut heavy));
        assert_eq!(container.placed_count(), 0);
        assert_eq!(container.positions_examined(), 0);
    }

    #[test]
    fn rotation_can_be_disabled() {
        let mut b = Box3D::unit(1, (30.0, 10.0, 10.0)).unwrap();
        let mut fixed = BaselineContainer::new((10.0, 10.0, 30.0), None)
            .unwrap()
            .with_rotation(false);
        assert!(!fixed.place_box(&mut b));

        let mut free = BaselineContainer::new((10.0, 10.0, 30.0), None).unwrap();
        assert!(free.place_box(&mut b));
        assert_eq!(b.dimensions(), Vec3::new(10.0, 10.0, 30.0));
    }

    #[test]
    fn remove_frees_space() {
        let mut container = BaselineContainer::new((10.0, 10.0, 10.0), None).unwrap();
        let mut a = Box3D::unit(1, (10.0, 10.0, 10.0)).unwrap();
        let mut b = Box3D::unit(2, (10.0, 10.0, 10.0)).unwrap();

        assert!(container.place_box(&mut a));
        assert!(!container.place_box(&mut b));
        assert!(container.remove_box(&mut a));
        assert!(!a.is_placed());
        assert!(container.place_box(&mut b));
        assert!(!container.remove_box(&mut a));
    }
}
