//! Integration tests for the placement engines.

use grid_packer::baseline::BaselineContainer;
use grid_packer::container::PackingContainer;
use grid_packer::dataset::{parcel_boxes, uniform_boxes};
use grid_packer::model::{Box3D, ContainerSpec};
use grid_packer::optimizer::{PackingConfig, Strategy, pack_objects_with_config};
use grid_packer::types::{Dimensional, Positioned, Vec3};

const STANDARD: (f64, f64, f64) = (50.0, 40.0, 30.0);

fn reference_boxes() -> Vec<Box3D> {
    [
        (10.0, 8.0, 6.0),
        (15.0, 12.0, 10.0),
        (20.0, 15.0, 12.0),
        (8.0, 8.0, 8.0),
        (25.0, 5.0, 8.0),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, dims)| Box3D::unit(i + 1, dims).unwrap())
    .collect()
}

/// Coarse grid sized for generated boxes with sides of at least 5.
fn coarse_config() -> PackingConfig {
    PackingConfig::builder().expected_min_box_dim(Some(5.0)).build()
}

fn assert_valid_packing(placed: &[Box3D], dims: (f64, f64, f64), max_weight: f64) {
    let bounds = Vec3::from_tuple(dims);
    for b in placed {
        assert!(b.is_placed(), "box {} is not marked placed", b.id);
        assert!(
            b.bounding_box().is_within(&bounds),
            "box {} leaves the container: {}",
            b.id,
            b
        );
    }
    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            assert!(
                !a.bounding_box().intersects(&b.bounding_box()),
                "boxes {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
    let total: f64 = placed.iter().map(|b| b.weight).sum();
    assert!(
        total <= max_weight,
        "total weight {} exceeds {}",
        total,
        max_weight
    );
}

mod invariant_tests {
    use super::*;

    #[test]
    fn pruned_placements_never_overlap() {
        let dims = (100.0, 80.0, 60.0);
        let mut container = PackingContainer::with_config(dims, None, coarse_config()).unwrap();

        let mut placed = 0;
        for mut b in uniform_boxes(150, 42, 5, 20).unwrap() {
            if container.place_box(&mut b) {
                placed += 1;
            }
        }
        assert!(placed > 0);
        assert_valid_packing(&container.placed_boxes(), dims, f64::INFINITY);
    }

    #[test]
    fn weight_bound_holds_after_every_placement() {
        let dims = (100.0, 80.0, 60.0);
        let max_weight = 60.0;
        let mut container =
            PackingContainer::with_config(dims, Some(max_weight), coarse_config()).unwrap();

        let mut rejected_for_weight = false;
        for mut b in parcel_boxes(80, 7).unwrap() {
            let before = container.current_weight();
            let fits_budget = before + b.weight <= max_weight;
            let placed = container.place_box(&mut b);
            if !fits_budget {
                assert!(!placed, "box {} placed beyond the weight budget", b.id);
                rejected_for_weight = true;
            }
            assert!(container.current_weight() <= max_weight);
        }
        assert!(rejected_for_weight, "data set should hit the weight limit");
        assert_valid_packing(&container.placed_boxes(), dims, max_weight);
    }

    #[test]
    fn batch_strategies_produce_valid_packings() {
        let spec = ContainerSpec::new((60.0, 50.0, 40.0), Some(500.0)).unwrap();
        let boxes = uniform_boxes(60, 3, 5, 20).unwrap();

        for strategy in Strategy::ALL {
            let result =
                pack_objects_with_config(boxes.clone(), spec, strategy, coarse_config()).unwrap();
            assert_eq!(
                result.placed_count() + result.unplaced_count(),
                boxes.len(),
                "{} lost boxes",
                strategy
            );
            assert_valid_packing(&result.placed, spec.dims, spec.max_weight);
        }
    }
}

mod cross_validation_tests {
    use super::*;

    #[test]
    fn pruned_and_brute_force_place_the_same_reference_boxes() {
        let mut pruned = PackingContainer::new(STANDARD, None).unwrap();
        let mut brute = PackingContainer::new(STANDARD, None).unwrap();

        for b in reference_boxes() {
            let mut for_pruned = b.clone();
            let mut for_brute = b;
            assert!(pruned.place_box(&mut for_pruned), "pruned rejected {}", for_pruned.id);
            assert!(
                brute.place_box_brute_force(&mut for_brute),
                "brute force rejected {}",
                for_brute.id
            );
        }

        assert_eq!(pruned.placed_count(), brute.placed_count());
        assert_valid_packing(&pruned.placed_boxes(), STANDARD, f64::INFINITY);
        assert_valid_packing(&brute.placed_boxes(), STANDARD, f64::INFINITY);
    }

    #[test]
    fn baseline_places_the_reference_boxes() {
        let mut baseline = BaselineContainer::new(STANDARD, None).unwrap();
        for mut b in reference_boxes() {
            assert!(baseline.place_box(&mut b));
        }
        assert_valid_packing(&baseline.placed_boxes(), STANDARD, f64::INFINITY);
    }
}

mod rejection_tests {
    use super::*;

    #[test]
    fn oversized_box_leaves_container_unchanged() {
        let mut container = PackingContainer::new(STANDARD, None).unwrap();
        let mut first = Box3D::unit(1, (10.0, 8.0, 6.0)).unwrap();
        assert!(container.place_box(&mut first));

        let stats = container.grid_statistics();
        let weight = container.current_weight();
        let utilization = container.volume_utilization();

        let mut huge = Box3D::unit(2, (200.0, 5.0, 5.0)).unwrap();
        assert!(!container.place_box(&mut huge));
        assert!(!container.place_box_brute_force(&mut huge));

        assert!(!huge.is_placed());
        assert_eq!(container.placed_count(), 1);
        assert_eq!(container.grid_statistics(), stats);
        assert_eq!(container.current_weight(), weight);
        assert_eq!(container.volume_utilization(), utilization);
    }
}

mod determinism_tests {
    use super::*;

    fn run() -> Vec<(usize, Vec3, usize)> {
        let mut container =
            PackingContainer::with_config((100.0, 80.0, 60.0), None, coarse_config()).unwrap();
        let mut out = Vec::new();
        for mut b in parcel_boxes(40, 11).unwrap() {
            if container.place_box(&mut b) {
                out.push((b.id, b.position(), b.orientation().index()));
            }
        }
        out
    }

    #[test]
    fn identical_inputs_give_identical_placements() {
        let first = run();
        let second = run();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn place_then_remove_restores_grid_statistics() {
        let mut container = PackingContainer::new(STANDARD, None).unwrap();
        let mut boxes = reference_boxes();
        let (last, rest) = boxes.split_last_mut().unwrap();
        for b in rest.iter_mut() {
            assert!(container.place_box(b));
        }

        let before = container.grid_statistics();
        let weight = container.current_weight();
        assert!(container.place_box(last));
        assert!(container.remove_box(last));

        assert_eq!(container.grid_statistics(), before);
        assert!((container.current_weight() - weight).abs() < 1e-9);
        assert!(!last.is_placed());
    }

    #[test]
    fn removing_a_middle_box_frees_its_space() {
        let mut container = PackingContainer::new((30.0, 10.0, 10.0), None).unwrap();
        let mut boxes: Vec<Box3D> = (1..=3)
            .map(|id| Box3D::unit(id, (10.0, 10.0, 10.0)).unwrap())
            .collect();
        for b in boxes.iter_mut() {
            assert!(container.place_box(b));
        }
        let freed = boxes[1].position();
        assert!(container.remove_box(&mut boxes[1]));

        let mut replacement = Box3D::unit(9, (10.0, 10.0, 10.0)).unwrap();
        assert!(container.place_box(&mut replacement));
        assert_eq!(replacement.position(), freed);
        assert_eq!(replacement.dimensions(), Vec3::new(10.0, 10.0, 10.0));
    }
}

mod scaling_tests {
    use super::*;

    #[test]
    fn pruned_search_examines_bounded_positions_per_call() {
        let config = coarse_config();
        let bound = 6 * config.max_candidates as u64;
        let mut container = PackingContainer::with_config((100.0, 80.0, 60.0), None, config).unwrap();

        for mut b in uniform_boxes(120, 42, 5, 20).unwrap() {
            let before = container.positions_examined();
            container.place_box(&mut b);
            assert!(container.positions_examined() - before <= bound);
        }
    }

    #[test]
    fn brute_force_scans_where_pruned_search_skips() {
        let mut pruned = PackingContainer::new(STANDARD, None).unwrap();
        let mut brute = PackingContainer::new(STANDARD, None).unwrap();

        let floor = Box3D::unit(1, (50.0, 40.0, 20.0)).unwrap();
        assert!(pruned.place_box(&mut floor.clone()));
        assert!(brute.place_box_brute_force(&mut floor.clone()));

        // Fits the empty container only at z in [0, 15], all of which is now taken.
        let slab = Box3D::unit(2, (50.0, 40.0, 15.0)).unwrap();
        assert!(!pruned.place_box(&mut slab.clone()));
        assert!(!brute.place_box_brute_force(&mut slab.clone()));

        assert!(
            brute.positions_examined() > 4 * pruned.positions_examined(),
            "brute force examined {} positions, pruned {}",
            brute.positions_examined(),
            pruned.positions_examined()
        );
    }
}
