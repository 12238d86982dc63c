//! Grid-indexed 3D bin packing.
//!
//! Places axis-aligned boxes into a single container, one at a time, using a
//! uniform grid index to keep collision checks local and a ranked candidate
//! list to keep the search for each box short.
//!
//! # Examples
//! ```
//! use grid_packer::container::PackingContainer;
//! use grid_packer::model::Box3D;
//! use grid_packer::types::{Positioned, Vec3};
//!
//! let mut container = PackingContainer::new((50.0, 40.0, 30.0), Some(100.0)).unwrap();
//! let mut first = Box3D::new(1, (10.0, 8.0, 6.0), 2.0).unwrap();
//! let mut second = Box3D::new(2, (15.0, 12.0, 10.0), 3.0).unwrap();
//!
//! assert!(container.place_box(&mut first));
//! assert!(container.place_box(&mut second));
//! assert_eq!(first.position(), Vec3::zero());
//! assert_eq!(container.placed_count(), 2);
//! ```

pub mod api;
pub mod baseline;
pub mod candidates;
pub mod config;
pub mod container;
pub mod dataset;
pub mod grid;
pub mod logging;
pub mod model;
pub mod optimizer;
pub mod types;
