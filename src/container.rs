//! Placement engine: one container backed by a [`GridIndex`].
//!
//! Boxes are placed greedily, one at a time. For every orientation the engine
//! builds a ranked candidate list from current state (grid anchors, placed-box
//! faces and the origin) and takes the first candidate the grid accepts.
//! The corner hint pool is bookkeeping only and never feeds the search. A brute-force
//! scan over the whole grid is available as a reference mode.

use std::collections::BTreeSet;
use std::fmt;

use crate::candidates::{face_anchors, fits_in_bounds, rank};
use crate::grid::{GridIndex, GridStatistics};
use crate::model::{Box3D, ContainerSpec, Orientation, ValidationError};
use crate::optimizer::PackingConfig;
use crate::types::{AnchorKey, Dimensional, Positioned, Vec3};

/// A single container with grid-accelerated placement.
///
/// # Invariants
/// - placed boxes are pairwise non-overlapping and inside the container
/// - the summed weight of placed boxes never exceeds `max_weight`
/// - every placed box is registered in the grid under its current extents
#[derive(Debug)]
pub struct PackingContainer {
    spec: ContainerSpec,
    config: PackingConfig,
    grid: GridIndex,
    placed: Vec<Box3D>,
    hints: BTreeSet<AnchorKey>,
    current_weight: f64,
    placed_volume: f64,
    min_box_size: f64,
    positions_examined: u64,
}

impl PackingContainer {
    /// Creates an empty container with the default [`PackingConfig`].
    ///
    /// `None` for `max_weight` means the weight is not limited.
    ///
    /// # Examples
    /// ```
    /// use grid_packer::container::PackingContainer;
    /// use grid_packer::model::Box3D;
    ///
    /// let mut container = PackingContainer::new((50.0, 40.0, 30.0), None).unwrap();
    /// let mut item = Box3D::unit(1, (10.0, 8.0, 6.0)).unwrap();
    /// assert!(container.place_box(&mut item));
    /// assert!(item.is_placed());
    /// ```
    pub fn new(dims: (f64, f64, f64), max_weight: Option<f64>) -> Result<Self, ValidationError> {
        Self::with_config(dims, max_weight, PackingConfig::default())
    }

    /// Creates an empty container with a custom configuration.
    ///
    /// The grid cell size derives from `config.expected_min_box_dim`, or from
    /// the smallest container extent divided by `config.min_box_divisor`.
    pub fn with_config(
        dims: (f64, f64, f64),
        max_weight: Option<f64>,
        config: PackingConfig,
    ) -> Result<Self, ValidationError> {
        let spec = ContainerSpec::new(dims, max_weight)?;
        config.validate()?;

        let bounds = spec.dims_as_vec3();
        let min_box_size = config
            .expected_min_box_dim
            .unwrap_or_else(|| bounds.min_component() / config.min_box_divisor);
        let grid = GridIndex::new(bounds, min_box_size)?;

        Ok(Self {
            spec,
            config,
            grid,
            placed: Vec::new(),
            hints: BTreeSet::new(),
            current_weight: 0.0,
            placed_volume: 0.0,
            min_box_size,
            positions_examined: 0,
        })
    }

    /// Places a box using the pruned candidate search.
    ///
    /// On success the box's position, orientation and placed flag are set and
    /// `true` is returned. A box that does not fit leaves both the box and the
    /// container untouched.
    pub fn place_box(&mut self, item: &mut Box3D) -> bool {
        if !self.admits(item) {
            return false;
        }

        let utilization = (self.placed_volume + item.volume()) / self.spec.volume();
        for &orientation in self.orientations() {
            let extents = item.extents_for(orientation);
            if !extents.fits_within(&self.spec.dims_as_vec3()) {
                continue;
            }
            if let Some(position) = self.search_pruned(extents, utilization) {
                self.commit(item, position, orientation);
                return true;
            }
        }

        log::debug!("box {} found no free position", item.id);
        false
    }

    /// Places a box by scanning every grid point, for comparison runs.
    ///
    /// The step is the adaptive minimum box size. Points are visited in
    /// ascending (z, y, x) order and the first free one is taken.
    pub fn place_box_brute_force(&mut self, item: &mut Box3D) -> bool {
        if !self.admits(item) {
            return false;
        }

        for &orientation in self.orientations() {
            let extents = item.extents_for(orientation);
            if !extents.fits_within(&self.spec.dims_as_vec3()) {
                continue;
            }
            if let Some(position) = self.search_exhaustive(extents) {
                self.commit(item, position, orientation);
                return true;
            }
        }

        log::debug!("box {} found no free position (brute force)", item.id);
        false
    }

    /// Removes a placed box and clears its placed flag.
    ///
    /// Returns `false` without any change if the box is not in this container.
    pub fn remove_box(&mut self, item: &mut Box3D) -> bool {
        let Some(index) = self.placed.iter().position(|b| b.id == item.id) else {
            log::debug!("box {} is not tracked by this container", item.id);
            return false;
        };

        let stored = self.placed.remove(index);
        self.grid.remove_box(&stored);
        if self.placed.is_empty() {
            self.current_weight = 0.0;
            self.placed_volume = 0.0;
        } else {
            self.current_weight -= stored.weight;
            self.placed_volume -= stored.volume();
        }
        self.hints = self.placed.iter().flat_map(corner_hints).collect();
        item.mark_unplaced();
        true
    }

    /// Empties the container. Boxes held by callers keep their placed flag.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.placed.clear();
        self.hints.clear();
        self.current_weight = 0.0;
        self.placed_volume = 0.0;
        self.positions_examined = 0;
    }

    fn admits(&self, item: &Box3D) -> bool {
        if item.is_placed() || self.contains(item.id) {
            log::debug!("box {} is already placed", item.id);
            return false;
        }
        if self.current_weight + item.weight > self.spec.max_weight {
            log::debug!(
                "box {} would exceed the weight limit ({:.2} + {:.2} > {:.2})",
                item.id,
                self.current_weight,
                item.weight,
                self.spec.max_weight
            );
            return false;
        }
        true
    }

    fn orientations(&self) -> &'static [Orientation] {
        if self.config.allow_item_rotation {
            &Orientation::ALL
        } else {
            &Orientation::ALL[..1]
        }
    }

    fn search_pruned(&mut self, extents: Vec3, utilization: f64) -> Option<Vec3> {
        let bounds = self.spec.dims_as_vec3();

        let mut anchors = self.grid.possible_placements(extents);
        for placed in &self.placed {
            let bbox = placed.bounding_box();
            anchors.extend(
                face_anchors(bbox.min, bbox.dimensions(), extents)
                    .into_iter()
                    .filter(|a| fits_in_bounds(*a, extents, &bounds)),
            );
        }
        anchors.push(Vec3::zero());

        let ranked = rank(anchors, &self.config.score_weights, utilization);
        for anchor in ranked.into_iter().take(self.config.max_candidates) {
            if !fits_in_bounds(anchor, extents, &bounds) {
                continue;
            }
            self.positions_examined += 1;
            if self.grid.can_place(anchor, extents) {
                return Some(anchor);
            }
        }
        None
    }

    fn search_exhaustive(&mut self, extents: Vec3) -> Option<Vec3> {
        let bounds = self.spec.dims_as_vec3();
        let xs = scan_positions(bounds.x, extents.x, self.min_box_size);
        let ys = scan_positions(bounds.y, extents.y, self.min_box_size);
        let zs = scan_positions(bounds.z, extents.z, self.min_box_size);

        for &z in &zs {
            for &y in &ys {
                for &x in &xs {
                    let position = Vec3::new(x, y, z);
                    self.positions_examined += 1;
                    if self.grid.can_place(position, extents) {
                        return Some(position);
                    }
                }
            }
        }
        None
    }

    fn commit(&mut self, item: &mut Box3D, position: Vec3, orientation: Orientation) {
        item.mark_placed(position, orientation);
        self.grid.place_box(item);
        self.current_weight += item.weight;
        self.placed_volume += item.volume();

        self.hints.extend(corner_hints(item));

        log::debug!(
            "placed box {} at ({:.2}, {:.2}, {:.2}) orientation {}",
            item.id,
            position.x,
            position.y,
            position.z,
            orientation
        );
        self.placed.push(item.clone());
    }

    /// Fraction of the container volume filled by placed boxes (0.0 to 1.0).
    pub fn volume_utilization(&self) -> f64 {
        self.placed_volume / self.spec.volume()
    }

    /// Fraction of the weight budget in use; 0.0 when the weight is not limited.
    pub fn weight_utilization(&self) -> f64 {
        if self.spec.has_weight_limit() {
            self.current_weight / self.spec.max_weight
        } else {
            0.0
        }
    }

    /// Copies of the placed boxes in placement order.
    pub fn placed_boxes(&self) -> Vec<Box3D> {
        self.placed.clone()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    pub fn max_weight(&self) -> f64 {
        self.spec.max_weight
    }

    pub fn dims(&self) -> (f64, f64, f64) {
        self.spec.dims
    }

    pub fn volume(&self) -> f64 {
        self.spec.volume()
    }

    /// Minimum box size the grid and the brute-force step derive from.
    pub fn min_box_size(&self) -> f64 {
        self.min_box_size
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    pub fn grid_statistics(&self) -> GridStatistics {
        self.grid.statistics()
    }

    /// Number of distinct corner hints of the boxes currently placed.
    pub fn candidate_pool_size(&self) -> usize {
        self.hints.len()
    }

    /// Cumulative number of positions checked against the grid.
    pub fn positions_examined(&self) -> u64 {
        self.positions_examined
    }

    /// Informational summary of the search state.
    pub fn performance_stats(&self) -> String {
        format!(
            "Placed: {}, Positions examined: {}, Candidate pool: {}, {}",
            self.placed.len(),
            self.positions_examined,
            self.hints.len(),
            self.grid.statistics()
        )
    }

    /// Whether a box with this id is placed in the container.
    pub fn contains(&self, id: usize) -> bool {
        self.placed.iter().any(|b| b.id == id)
    }
}

impl fmt::Display for PackingContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h, d) = self.spec.dims;
        write!(
            f,
            "PackingContainer[dims=({:.1},{:.1},{:.1}), boxes={}, util={:.1}%, weight={:.1}/{:.1}]",
            w,
            h,
            d,
            self.placed.len(),
            self.volume_utilization() * 100.0,
            self.current_weight,
            self.spec.max_weight
        )
    }
}

/// The +x, +y and +z corners of a placed box.
fn corner_hints(item: &Box3D) -> [AnchorKey; 3] {
    let bbox = item.bounding_box();
    [
        AnchorKey(Vec3::new(bbox.max.x, bbox.min.y, bbox.min.z)),
        AnchorKey(Vec3::new(bbox.min.x, bbox.max.y, bbox.min.z)),
        AnchorKey(Vec3::new(bbox.min.x, bbox.min.y, bbox.max.z)),
    ]
}

/// Scan positions `0, step, 2·step, …` along one axis that keep an object of
/// length `extent` inside `len`. Empty when the object is longer than `len`.
fn scan_positions(len: f64, extent: f64, step: f64) -> Vec<f64> {
    let max_pos = len - extent;
    (0u32..)
        .map(|i| f64::from(i) * step)
        .take_while(|&pos| pos <= max_pos)
        .collect()
}
