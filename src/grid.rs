//! Uniform 3D grid index over the container volume.
//!
//! The container is split into equally sized cells. Every placed box is
//! recorded in each cell its bounding box overlaps, so collision queries only
//! touch the cells around the candidate box:
//! - a coarse pass skips unoccupied cells,
//! - an exact separating-axis test runs against the boxes in occupied cells.
//!
//! Cells store box ids only; the bounding boxes live in one map keyed by id.

use std::fmt;

use hashbrown::HashMap;
use serde::Serialize;
use smallvec::SmallVec;
use utoipa::ToSchema;

use crate::candidates::{face_anchors, fits_in_bounds};
use crate::model::{Box3D, ValidationError, validate_dimension};
use crate::types::{BOUNDARY_EPSILON, BoundingBox, Positioned, Vec3};

/// Inclusive cell coordinate range `(low, high)` along x, y and z.
type CellRange = ([usize; 3], [usize; 3]);

#[derive(Clone, Debug, Default)]
struct Cell {
    boxes: SmallVec<[usize; 2]>,
}

impl Cell {
    #[inline]
    fn is_occupied(&self) -> bool {
        !self.boxes.is_empty()
    }
}

/// Uniform grid index with fixed cell size.
pub struct GridIndex {
    bounds: Vec3,
    cell_size: Vec3,
    dims: [usize; 3],
    cells: Vec<Cell>,
    entries: HashMap<usize, BoundingBox>,
}

impl fmt::Debug for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self.cells.iter().filter(|c| c.is_occupied()).count();
        f.debug_struct("GridIndex")
            .field("bounds", &self.bounds)
            .field("cell_size", &self.cell_size)
            .field("dims", &self.dims)
            .field("occupied_cells", &occupied)
            .field("boxes", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl GridIndex {
    /// Lower bound for the cell edge length.
    pub const MIN_CELL_SIZE: f64 = 1.0;

    /// Upper bound for the number of cells in one grid.
    pub const MAX_CELLS: usize = 10_000_000;

    /// Creates an empty grid covering `[0, bounds]`.
    ///
    /// The cell edge is `max(MIN_CELL_SIZE, min_box_size / 2)` on every axis,
    /// and each axis gets `ceil(extent / edge)` cells.
    ///
    /// # Errors
    /// Non-positive or non-finite extents and a non-positive `min_box_size`
    /// are contract violations and return a [`ValidationError`]. So is a
    /// grid of more than [`Self::MAX_CELLS`] cells.
    pub fn new(bounds: Vec3, min_box_size: f64) -> Result<Self, ValidationError> {
        validate_dimension(bounds.x, "Grid width")?;
        validate_dimension(bounds.y, "Grid height")?;
        validate_dimension(bounds.z, "Grid depth")?;
        if !(min_box_size > 0.0 && min_box_size.is_finite()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "minimum box size must be positive and finite, got: {}",
                min_box_size
            )));
        }

        let edge = (min_box_size / 2.0).max(Self::MIN_CELL_SIZE);
        let cell_size = Vec3::new(edge, edge, edge);
        let dims = [
            axis_cell_count(bounds.x, edge),
            axis_cell_count(bounds.y, edge),
            axis_cell_count(bounds.z, edge),
        ];
        let total = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .filter(|&n| n <= Self::MAX_CELLS)
            .ok_or_else(|| {
                ValidationError::InvalidConfiguration(format!(
                    "grid of {}x{}x{} cells is too large",
                    dims[0], dims[1], dims[2]
                ))
            })?;

        Ok(Self {
            bounds,
            cell_size,
            dims,
            cells: vec![Cell::default(); total],
            entries: HashMap::new(),
        })
    }

    /// Container extents covered by the grid.
    pub fn bounds(&self) -> Vec3 {
        self.bounds
    }

    /// Edge lengths of one cell.
    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    /// Number of cells along x, y and z.
    pub fn grid_dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of boxes currently registered.
    pub fn registered_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether a box id is registered.
    pub fn is_registered(&self, id: usize) -> bool {
        self.entries.contains_key(&id)
    }

    /// Box ids recorded in one cell, `None` when the coordinates are outside the grid.
    pub fn cell_boxes(&self, ix: usize, iy: usize, iz: usize) -> Option<&[usize]> {
        if ix >= self.dims[0] || iy >= self.dims[1] || iz >= self.dims[2] {
            return None;
        }
        Some(&self.cells[self.flat_index(ix, iy, iz)].boxes)
    }

    /// Checks whether a box with `extents` can be placed at `position`.
    ///
    /// Fails fast when the box would leave the container. Otherwise every
    /// occupied cell in the box's cell range is checked exactly against the
    /// boxes recorded there.
    pub fn can_place(&self, position: Vec3, extents: Vec3) -> bool {
        let candidate = BoundingBox::from_position_and_dims(position, extents);
        if !candidate.is_within(&self.bounds) {
            return false;
        }

        let (lo, hi) = self.cell_range(&candidate);
        for idx in range_indices(self.dims, lo, hi) {
            let cell = &self.cells[idx];
            if !cell.is_occupied() {
                continue;
            }
            for id in &cell.boxes {
                match self.entries.get(id) {
                    Some(existing) if existing.intersects(&candidate) => return false,
                    Some(_) => {}
                    None => debug_assert!(false, "grid invariant violated: unknown box {id}"),
                }
            }
        }
        true
    }

    /// Registers a positioned, oriented box in every cell it overlaps.
    ///
    /// Registering an id again first drops its previous cells.
    pub fn place_box(&mut self, item: &Box3D) {
        if self.entries.contains_key(&item.id) {
            self.remove_id(item.id);
        }

        let bbox = item.bounding_box();
        if !bbox.is_within(&self.bounds) {
            log::warn!(
                "box {} registered outside the grid bounds: {:?}",
                item.id,
                bbox
            );
        }

        let (lo, hi) = self.cell_range(&bbox);
        for idx in range_indices(self.dims, lo, hi) {
            self.cells[idx].boxes.push(item.id);
        }
        self.entries.insert(item.id, bbox);
    }

    /// Removes a box from every cell it was registered in.
    ///
    /// Returns `false` if the box was not registered.
    pub fn remove_box(&mut self, item: &Box3D) -> bool {
        self.remove_id(item.id)
    }

    fn remove_id(&mut self, id: usize) -> bool {
        let Some(bbox) = self.entries.remove(&id) else {
            return false;
        };

        let (lo, hi) = self.cell_range(&bbox);
        for idx in range_indices(self.dims, lo, hi) {
            let boxes = &mut self.cells[idx].boxes;
            match boxes.iter().position(|&b| b == id) {
                Some(pos) => {
                    boxes.swap_remove(pos);
                }
                None => debug_assert!(false, "grid invariant violated: box {id} missing from cell"),
            }
        }
        true
    }

    /// Candidate anchors for a box with the given extents.
    ///
    /// Always contains the origin. For every occupied cell the six face
    /// anchors of that cell are added if the box fits inside the container
    /// there. The result is sorted by (z, y, x) without duplicates.
    pub fn possible_placements(&self, extents: Vec3) -> Vec<Vec3> {
        let mut anchors = vec![Vec3::zero()];

        for ix in 0..self.dims[0] {
            for iy in 0..self.dims[1] {
                for iz in 0..self.dims[2] {
                    if !self.cells[self.flat_index(ix, iy, iz)].is_occupied() {
                        continue;
                    }
                    let base = self.cell_origin(ix, iy, iz);
                    anchors.extend(
                        face_anchors(base, self.cell_size, extents)
                            .into_iter()
                            .filter(|a| fits_in_bounds(*a, extents, &self.bounds)),
                    );
                }
            }
        }

        anchors.sort_by(Vec3::cmp_zyx);
        anchors.dedup_by(|a, b| a.cmp_zyx(b).is_eq());
        anchors
    }

    /// Occupancy summary; diagnostic only.
    pub fn statistics(&self) -> GridStatistics {
        let mut occupied_cells = 0;
        let mut box_references = 0;
        for cell in self.cells.iter().filter(|c| c.is_occupied()) {
            occupied_cells += 1;
            box_references += cell.boxes.len();
        }

        let total_cells = self.cells.len();
        GridStatistics {
            grid_dims: self.dims,
            cell_size: self.cell_size.x,
            occupied_cells,
            total_cells,
            occupancy_ratio: occupied_cells as f64 / total_cells as f64,
            box_references,
        }
    }

    /// Resets every cell to unoccupied and forgets all boxes.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.boxes.clear();
        }
        self.entries.clear();
    }

    #[inline]
    fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (ix * self.dims[1] + iy) * self.dims[2] + iz
    }

    fn cell_origin(&self, ix: usize, iy: usize, iz: usize) -> Vec3 {
        Vec3::new(
            ix as f64 * self.cell_size.x,
            iy as f64 * self.cell_size.y,
            iz as f64 * self.cell_size.z,
        )
    }

    /// Maps a world coordinate to a cell coordinate, clamped to `[0, n - 1]`.
    #[inline]
    fn cell_coord(&self, value: f64, axis: usize) -> usize {
        let size = match axis {
            0 => self.cell_size.x,
            1 => self.cell_size.y,
            _ => self.cell_size.z,
        };
        let t = (value / size).floor();
        // Also catches NaN.
        if !(t > 0.0) {
            return 0;
        }
        (t as usize).min(self.dims[axis] - 1)
    }

    fn cell_range(&self, bbox: &BoundingBox) -> CellRange {
        let lo = [
            self.cell_coord(bbox.min.x, 0),
            self.cell_coord(bbox.min.y, 1),
            self.cell_coord(bbox.min.z, 2),
        ];
        let hi = [
            self.cell_coord(bbox.max.x - BOUNDARY_EPSILON, 0).max(lo[0]),
            self.cell_coord(bbox.max.y - BOUNDARY_EPSILON, 1).max(lo[1]),
            self.cell_coord(bbox.max.z - BOUNDARY_EPSILON, 2).max(lo[2]),
        ];
        (lo, hi)
    }
}

fn axis_cell_count(extent: f64, edge: f64) -> usize {
    ((extent / edge).ceil() as usize).max(1)
}

/// Flat indices of all cells in the inclusive range, in x-major order.
fn range_indices(
    dims: [usize; 3],
    lo: [usize; 3],
    hi: [usize; 3],
) -> impl Iterator<Item = usize> {
    (lo[0]..=hi[0]).flat_map(move |ix| {
        (lo[1]..=hi[1])
            .flat_map(move |iy| (lo[2]..=hi[2]).map(move |iz| (ix * dims[1] + iy) * dims[2] + iz))
    })
}

/// Occupancy summary of a [`GridIndex`].
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct GridStatistics {
    /// Number of cells along x, y and z.
    pub grid_dims: [usize; 3],
    /// Edge length of one cell.
    pub cell_size: f64,
    pub occupied_cells: usize,
    pub total_cells: usize,
    /// Occupied cells divided by total cells (0.0 to 1.0).
    pub occupancy_ratio: f64,
    /// Sum of box references over all cells.
    pub box_references: usize,
}

impl fmt::Display for GridStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Grid[{}x{}x{}], Occupied: {}/{} ({:.1}%), Boxes: {}",
            self.grid_dims[0],
            self.grid_dims[1],
            self.grid_dims[2],
            self.occupied_cells,
            self.total_cells,
            self.occupancy_ratio * 100.0,
            self.box_references
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;

    fn placed(id: usize, dims: (f64, f64, f64), at: (f64, f64, f64)) -> Box3D {
        let mut b = Box3D::unit(id, dims).unwrap();
        b.mark_placed(Vec3::from_tuple(at), Orientation::IDENTITY);
        b
    }

    fn grid_50_40_30() -> GridIndex {
        // min box size 0.6 -> cell edge clamps to 1.0
        GridIndex::new(Vec3::new(50.0, 40.0, 30.0), 0.6).unwrap()
    }

    #[test]
    fn cell_size_is_adaptive_with_lower_bound() {
        let fine = grid_50_40_30();
        assert_eq!(fine.cell_size(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(fine.grid_dims(), [50, 40, 30]);

        let coarse = GridIndex::new(Vec3::new(10.5, 10.0, 4.0), 10.0).unwrap();
        assert_eq!(coarse.cell_size(), Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(coarse.grid_dims(), [3, 2, 1]);
    }

    #[test]
    fn rejects_non_positive_extents() {
        assert!(matches!(
            GridIndex::new(Vec3::new(0.0, 10.0, 10.0), 1.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(matches!(
            GridIndex::new(Vec3::new(10.0, 10.0, 10.0), 0.0),
            Err(ValidationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn refuses_grids_beyond_the_cell_limit() {
        assert!(matches!(
            GridIndex::new(Vec3::new(1e6, 1e6, 100.0), 2.0),
            Err(ValidationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            GridIndex::new(Vec3::new(1e300, 1e300, 1e300), 2.0),
            Err(ValidationError::InvalidConfiguration(_))
        ));

        // Sea container at the default divisor stays well inside the limit.
        let sea = GridIndex::new(Vec3::new(589.0, 235.0, 239.0), 235.0 / 50.0).unwrap();
        let [x, y, z] = sea.grid_dims();
        assert!(x * y * z <= GridIndex::MAX_CELLS);
    }

    #[test]
    fn box_on_cell_boundary_does_not_claim_next_cell() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (5.0, 5.0, 5.0), (0.0, 0.0, 0.0)));

        let stats = grid.statistics();
        assert_eq!(stats.occupied_cells, 1);
        assert_eq!(grid.cell_boxes(0, 0, 0), Some(&[1usize][..]));
        assert_eq!(grid.cell_boxes(1, 0, 0), Some(&[][..]));
    }

    #[test]
    fn box_at_far_boundary_maps_to_last_cell() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (5.0, 5.0, 5.0), (15.0, 15.0, 15.0)));

        assert_eq!(grid.cell_boxes(3, 3, 3), Some(&[1usize][..]));
        assert_eq!(grid.statistics().occupied_cells, 1);
    }

    #[test]
    fn partial_overlap_registers_in_every_touched_cell() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (6.0, 1.0, 1.0), (3.0, 0.0, 0.0)));

        // x in [3, 9) spans cells 0 and 1
        assert_eq!(grid.cell_boxes(0, 0, 0), Some(&[1usize][..]));
        assert_eq!(grid.cell_boxes(1, 0, 0), Some(&[1usize][..]));
        assert_eq!(grid.statistics().box_references, 2);
    }

    #[test]
    fn can_place_detects_overlap_and_allows_touching() {
        let mut grid = grid_50_40_30();
        grid.place_box(&placed(1, (10.0, 8.0, 6.0), (0.0, 0.0, 0.0)));

        assert!(!grid.can_place(Vec3::new(5.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0)));
        assert!(grid.can_place(Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0)));
        assert!(grid.can_place(Vec3::new(0.0, 8.0, 0.0), Vec3::new(10.0, 10.0, 10.0)));
        assert!(grid.can_place(Vec3::new(0.0, 0.0, 6.0), Vec3::new(10.0, 10.0, 10.0)));
    }

    #[test]
    fn can_place_rejects_out_of_bounds() {
        let grid = grid_50_40_30();
        assert!(!grid.can_place(Vec3::new(45.0, 0.0, 0.0), Vec3::new(10.0, 1.0, 1.0)));
        assert!(!grid.can_place(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        assert!(!grid.can_place(Vec3::zero(), Vec3::new(200.0, 5.0, 5.0)));
        assert!(grid.can_place(Vec3::zero(), Vec3::new(50.0, 40.0, 30.0)));
    }

    #[test]
    fn coarse_occupancy_is_confirmed_exactly() {
        // Both boxes share cell (0, 0, 0) but do not overlap.
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (2.0, 2.0, 2.0), (0.0, 0.0, 0.0)));
        assert!(grid.can_place(Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn place_then_remove_restores_statistics() {
        let mut grid = grid_50_40_30();
        grid.place_box(&placed(1, (10.0, 8.0, 6.0), (0.0, 0.0, 0.0)));
        let before = grid.statistics();

        let extra = placed(2, (15.0, 12.0, 10.0), (10.0, 0.0, 0.0));
        grid.place_box(&extra);
        assert_ne!(grid.statistics(), before);

        assert!(grid.remove_box(&extra));
        assert_eq!(grid.statistics(), before);
        assert!(!grid.is_registered(2));
    }

    #[test]
    fn removing_unregistered_box_is_a_no_op() {
        let mut grid = grid_50_40_30();
        let stray = placed(9, (1.0, 1.0, 1.0), (0.0, 0.0, 0.0));
        assert!(!grid.remove_box(&stray));
        assert_eq!(grid.statistics().occupied_cells, 0);
    }

    #[test]
    fn cell_stays_occupied_while_another_box_remains() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        let a = placed(1, (2.0, 2.0, 2.0), (0.0, 0.0, 0.0));
        let b = placed(2, (2.0, 2.0, 2.0), (2.0, 0.0, 0.0));
        grid.place_box(&a);
        grid.place_box(&b);

        assert!(grid.remove_box(&a));
        assert_eq!(grid.cell_boxes(0, 0, 0), Some(&[2usize][..]));
        assert!(grid.remove_box(&b));
        assert_eq!(grid.statistics().occupied_cells, 0);
    }

    #[test]
    fn possible_placements_on_empty_grid_is_origin() {
        let grid = grid_50_40_30();
        assert_eq!(grid.possible_placements(Vec3::new(5.0, 5.0, 5.0)), vec![Vec3::zero()]);
    }

    #[test]
    fn possible_placements_are_sorted_unique_and_in_bounds() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (5.0, 5.0, 5.0), (0.0, 0.0, 0.0)));
        let extents = Vec3::new(5.0, 5.0, 5.0);

        let anchors = grid.possible_placements(extents);
        assert_eq!(
            anchors,
            vec![
                Vec3::zero(),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
            ]
        );
        for a in &anchors {
            assert!(fits_in_bounds(*a, extents, &grid.bounds()));
        }
    }

    #[test]
    fn clear_resets_all_cells() {
        let mut grid = grid_50_40_30();
        grid.place_box(&placed(1, (10.0, 8.0, 6.0), (0.0, 0.0, 0.0)));
        grid.clear();
        let stats = grid.statistics();
        assert_eq!(stats.occupied_cells, 0);
        assert_eq!(stats.box_references, 0);
        assert_eq!(grid.registered_count(), 0);
        assert!(grid.can_place(Vec3::zero(), Vec3::new(10.0, 8.0, 6.0)));
    }

    #[test]
    fn statistics_display_format() {
        let mut grid = GridIndex::new(Vec3::new(20.0, 20.0, 20.0), 10.0).unwrap();
        grid.place_box(&placed(1, (5.0, 5.0, 5.0), (0.0, 0.0, 0.0)));
        assert_eq!(
            grid.statistics().to_string(),
            "Grid[4x4x4], Occupied: 1/64 (1.6%), Boxes: 1"
        );
    }
}
