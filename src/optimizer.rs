//! Batch packing on top of the placement engines.
//!
//! Feeds a list of boxes, in the given order, into a single container using
//! one of three strategies:
//! - `Pruned`: grid-backed candidate search (the production path)
//! - `BruteForce`: grid-backed exhaustive scan, for cross-validation
//! - `Baseline`: unindexed corner search, for comparison
//!
//! Every box ends up either placed or rejected with an [`UnplacedReason`];
//! progress is reported through [`PackEvent`]s.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::baseline::BaselineContainer;
use crate::candidates::ScoreWeights;
use crate::container::PackingContainer;
use crate::grid::GridStatistics;
use crate::model::{Box3D, ContainerSpec, Orientation, ValidationError};
use crate::types::{Dimensional, Positioned, Vec3};

/// Configuration of the placement search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Upper bound of candidates evaluated per orientation
    pub max_candidates: usize,
    /// Divisor applied to the smallest container extent to estimate the smallest box dimension
    pub min_box_divisor: f64,
    /// Explicit smallest box dimension; overrides the divisor when set
    pub expected_min_box_dim: Option<f64>,
    /// Weights of the position score
    pub score_weights: ScoreWeights,
    /// Allows the five rotated orientations
    pub allow_item_rotation: bool,
}

impl PackingConfig {
    pub const DEFAULT_MAX_CANDIDATES: usize = 1000;
    pub const DEFAULT_MIN_BOX_DIVISOR: f64 = 50.0;
    pub const DEFAULT_ALLOW_ITEM_ROTATION: bool = true;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Checks that the configuration can drive a container.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_candidates == 0 {
            return Err(ValidationError::InvalidConfiguration(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if !(self.min_box_divisor > 0.0 && self.min_box_divisor.is_finite()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "min_box_divisor must be positive and finite, got: {}",
                self.min_box_divisor
            )));
        }
        if let Some(dim) = self.expected_min_box_dim {
            if !(dim > 0.0 && dim.is_finite()) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "expected_min_box_dim must be positive and finite, got: {}",
                    dim
                )));
            }
        }
        Ok(())
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            max_candidates: Self::DEFAULT_MAX_CANDIDATES,
            min_box_divisor: Self::DEFAULT_MIN_BOX_DIVISOR,
            expected_min_box_dim: None,
            score_weights: ScoreWeights::default(),
            allow_item_rotation: Self::DEFAULT_ALLOW_ITEM_ROTATION,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn max_candidates(mut self, max: usize) -> Self {
        self.config.max_candidates = max;
        self
    }

    pub fn min_box_divisor(mut self, divisor: f64) -> Self {
        self.config.min_box_divisor = divisor;
        self
    }

    pub fn expected_min_box_dim(mut self, dim: Option<f64>) -> Self {
        self.config.expected_min_box_dim = dim;
        self
    }

    pub fn score_weights(mut self, weights: ScoreWeights) -> Self {
        self.config.score_weights = weights;
        self
    }

    pub fn allow_item_rotation(mut self, allow: bool) -> Self {
        self.config.allow_item_rotation = allow;
        self
    }

    /// Returns the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Placement strategy of a batch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Pruned,
    BruteForce,
    Baseline,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Pruned, Strategy::BruteForce, Strategy::Baseline];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Pruned => "pruned",
            Strategy::BruteForce => "brute_force",
            Strategy::Baseline => "baseline",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Box that could not be placed.
#[derive(Clone, Debug)]
pub struct UnplacedBox {
    pub object: Box3D,
    pub reason: UnplacedReason,
}

/// Reasons why a box could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    WeightLimitExceeded,
    DimensionsExceedContainer,
    NoFreePosition,
    DuplicateId,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::WeightLimitExceeded => "weight_limit_exceeded",
            UnplacedReason::DimensionsExceedContainer => "dimensions_exceed_container",
            UnplacedReason::NoFreePosition => "no_free_position",
            UnplacedReason::DuplicateId => "duplicate_id",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::WeightLimitExceeded => {
                write!(f, "Box would exceed the container's weight limit")
            }
            UnplacedReason::DimensionsExceedContainer => {
                write!(f, "Box does not fit the container in any allowed orientation")
            }
            UnplacedReason::NoFreePosition => {
                write!(f, "No free position left for the box")
            }
            UnplacedReason::DuplicateId => {
                write!(f, "A box with the same id is already placed")
            }
        }
    }
}

/// Events emitted while packing, suitable for live visualization.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// The container was created.
    ContainerReady {
        dims: (f64, f64, f64),
        /// `None` when the weight is not limited.
        max_weight: Option<f64>,
        strategy: Strategy,
        /// Grid cell edge; `None` for the unindexed baseline.
        cell_size: Option<f64>,
    },
    /// A box was placed.
    ObjectPlaced {
        id: usize,
        pos: (f64, f64, f64),
        /// Extents under the chosen orientation.
        dims: (f64, f64, f64),
        orientation: usize,
        weight: f64,
        total_weight: f64,
        utilization: f64,
    },
    /// A box could not be placed.
    ObjectRejected {
        id: usize,
        weight: f64,
        dims: (f64, f64, f64),
        reason_code: String,
        reason_text: String,
    },
    /// Packing finished.
    Finished {
        placed: usize,
        unplaced: usize,
        utilization: f64,
        positions_examined: u64,
    },
}

/// Outcome of a batch run.
#[derive(Clone, Debug)]
pub struct PackingResult {
    pub strategy: Strategy,
    pub spec: ContainerSpec,
    /// Placed boxes in placement order, with position and orientation set.
    pub placed: Vec<Box3D>,
    pub unplaced: Vec<UnplacedBox>,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub total_weight: f64,
    pub positions_examined: u64,
    pub elapsed: Duration,
    /// Grid occupancy; `None` for the unindexed baseline.
    pub grid: Option<GridStatistics>,
    /// Informational summary of the container's search state.
    pub statistics: String,
}

impl PackingResult {
    /// Whether every box was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }
}

/// Container behind a strategy.
enum Packer {
    Indexed {
        container: PackingContainer,
        brute_force: bool,
    },
    Baseline(BaselineContainer),
}

impl Packer {
    fn new(
        spec: &ContainerSpec,
        strategy: Strategy,
        config: PackingConfig,
    ) -> Result<Self, ValidationError> {
        let max_weight = spec.has_weight_limit().then_some(spec.max_weight);
        Ok(match strategy {
            Strategy::Pruned | Strategy::BruteForce => Packer::Indexed {
                container: PackingContainer::with_config(spec.dims, max_weight, config)?,
                brute_force: strategy == Strategy::BruteForce,
            },
            Strategy::Baseline => Packer::Baseline(
                BaselineContainer::new(spec.dims, max_weight)?
                    .with_rotation(config.allow_item_rotation),
            ),
        })
    }

    fn place(&mut self, item: &mut Box3D) -> bool {
        match self {
            Packer::Indexed {
                container,
                brute_force: false,
            } => container.place_box(item),
            Packer::Indexed {
                container,
                brute_force: true,
            } => container.place_box_brute_force(item),
            Packer::Baseline(container) => container.place_box(item),
        }
    }

    fn contains(&self, id: usize) -> bool {
        match self {
            Packer::Indexed { container, .. } => container.contains(id),
            Packer::Baseline(container) => container.contains(id),
        }
    }

    fn current_weight(&self) -> f64 {
        match self {
            Packer::Indexed { container, .. } => container.current_weight(),
            Packer::Baseline(container) => container.current_weight(),
        }
    }

    fn volume_utilization(&self) -> f64 {
        match self {
            Packer::Indexed { container, .. } => container.volume_utilization(),
            Packer::Baseline(container) => container.volume_utilization(),
        }
    }

    fn weight_utilization(&self) -> f64 {
        match self {
            Packer::Indexed { container, .. } => container.weight_utilization(),
            Packer::Baseline(container) => container.weight_utilization(),
        }
    }

    fn positions_examined(&self) -> u64 {
        match self {
            Packer::Indexed { container, .. } => container.positions_examined(),
            Packer::Baseline(container) => container.positions_examined(),
        }
    }

    fn placed_boxes(&self) -> Vec<Box3D> {
        match self {
            Packer::Indexed { container, .. } => container.placed_boxes(),
            Packer::Baseline(container) => container.placed_boxes(),
        }
    }

    fn grid_statistics(&self) -> Option<GridStatistics> {
        match self {
            Packer::Indexed { container, .. } => Some(container.grid_statistics()),
            Packer::Baseline(_) => None,
        }
    }

    fn statistics(&self) -> String {
        match self {
            Packer::Indexed { container, .. } => container.performance_stats(),
            Packer::Baseline(container) => format!(
                "Placed: {}, Positions examined: {}",
                container.placed_count(),
                container.positions_examined()
            ),
        }
    }
}

fn fits_container(object: &Box3D, bounds: &Vec3, allow_rotation: bool) -> bool {
    if allow_rotation {
        object.fits_any_orientation(bounds)
    } else {
        object
            .extents_for(Orientation::IDENTITY)
            .fits_within(bounds)
    }
}

/// Packs boxes into one container with the default configuration.
///
/// # Parameters
/// * `objects` - Boxes in placement order
/// * `spec` - Container extents and weight budget
/// * `strategy` - Placement strategy
///
/// # Examples
/// ```
/// use grid_packer::model::{Box3D, ContainerSpec};
/// use grid_packer::optimizer::{Strategy, pack_objects};
///
/// let spec = ContainerSpec::new((50.0, 40.0, 30.0), None).unwrap();
/// let boxes = vec![Box3D::unit(1, (10.0, 8.0, 6.0)).unwrap()];
/// let result = pack_objects(boxes, spec, Strategy::Pruned).unwrap();
/// assert!(result.is_complete());
/// ```
pub fn pack_objects(
    objects: Vec<Box3D>,
    spec: ContainerSpec,
    strategy: Strategy,
) -> Result<PackingResult, ValidationError> {
    pack_objects_with_config(objects, spec, strategy, PackingConfig::default())
}

/// Like [`pack_objects`], with a custom configuration.
pub fn pack_objects_with_config(
    objects: Vec<Box3D>,
    spec: ContainerSpec,
    strategy: Strategy,
    config: PackingConfig,
) -> Result<PackingResult, ValidationError> {
    pack_objects_with_progress(objects, spec, strategy, config, |_| {})
}

/// Packs boxes and reports every step through `on_event` (suitable for SSE).
///
/// Boxes are fed in the given order and always start unplaced. Rejections are
/// classified before the search runs, so only `NoFreePosition` costs a search.
pub fn pack_objects_with_progress(
    objects: Vec<Box3D>,
    spec: ContainerSpec,
    strategy: Strategy,
    config: PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> Result<PackingResult, ValidationError> {
    let started = Instant::now();
    let mut packer = Packer::new(&spec, strategy, config)?;
    let bounds = spec.dims_as_vec3();

    on_event(&PackEvent::ContainerReady {
        dims: spec.dims,
        max_weight: spec.has_weight_limit().then_some(spec.max_weight),
        strategy,
        cell_size: packer.grid_statistics().map(|g| g.cell_size),
    });

    let mut unplaced: Vec<UnplacedBox> = Vec::new();
    for mut object in objects {
        object.mark_unplaced();

        let rejection = if packer.contains(object.id) {
            Some(UnplacedReason::DuplicateId)
        } else if packer.current_weight() + object.weight > spec.max_weight {
            Some(UnplacedReason::WeightLimitExceeded)
        } else if !fits_container(&object, &bounds, config.allow_item_rotation) {
            Some(UnplacedReason::DimensionsExceedContainer)
        } else if packer.place(&mut object) {
            None
        } else {
            Some(UnplacedReason::NoFreePosition)
        };

        match rejection {
            None => on_event(&PackEvent::ObjectPlaced {
                id: object.id,
                pos: object.position().as_tuple(),
                dims: object.dimensions().as_tuple(),
                orientation: object.orientation().index(),
                weight: object.weight,
                total_weight: packer.current_weight(),
                utilization: packer.volume_utilization(),
            }),
            Some(reason) => {
                on_event(&PackEvent::ObjectRejected {
                    id: object.id,
                    weight: object.weight,
                    dims: object.dims,
                    reason_code: reason.code().to_string(),
                    reason_text: reason.to_string(),
                });
                unplaced.push(UnplacedBox { object, reason });
            }
        }
    }

    let placed = packer.placed_boxes();
    on_event(&PackEvent::Finished {
        placed: placed.len(),
        unplaced: unplaced.len(),
        utilization: packer.volume_utilization(),
        positions_examined: packer.positions_examined(),
    });

    let elapsed = started.elapsed();
    log::debug!(
        "{} run: {} placed, {} unplaced, {} positions examined in {:?}",
        strategy,
        placed.len(),
        unplaced.len(),
        packer.positions_examined(),
        elapsed
    );

    Ok(PackingResult {
        strategy,
        spec,
        placed,
        unplaced,
        volume_utilization: packer.volume_utilization(),
        weight_utilization: packer.weight_utilization(),
        total_weight: packer.current_weight(),
        positions_examined: packer.positions_examined(),
        elapsed,
        grid: packer.grid_statistics(),
        statistics: packer.statistics(),
    })
}

/// Summary of one strategy in a comparison.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct StrategyRun {
    pub strategy: Strategy,
    pub placed: usize,
    pub unplaced: usize,
    pub volume_utilization: f64,
    pub positions_examined: u64,
    pub elapsed_ms: f64,
}

impl StrategyRun {
    fn from_result(result: &PackingResult) -> Self {
        Self {
            strategy: result.strategy,
            placed: result.placed_count(),
            unplaced: result.unplaced_count(),
            volume_utilization: result.volume_utilization,
            positions_examined: result.positions_examined,
            elapsed_ms: result.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Side-by-side results of all strategies on the same boxes.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ComparisonReport {
    pub object_count: usize,
    pub runs: Vec<StrategyRun>,
    /// Brute-force time divided by pruned time.
    pub speedup: Option<f64>,
    /// Brute-force positions examined divided by pruned positions examined.
    pub examined_ratio: Option<f64>,
    /// Whether pruned and brute-force search placed the same number of boxes.
    pub pruned_matches_brute_force: bool,
}

impl ComparisonReport {
    pub fn run(&self, strategy: Strategy) -> Option<&StrategyRun> {
        self.runs.iter().find(|r| r.strategy == strategy)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} boxes", self.object_count)?;
        for run in &self.runs {
            writeln!(
                f,
                "  {:<12} placed {:>5}  util {:>5.1}%  examined {:>10}  {:>9.2} ms",
                run.strategy.name(),
                run.placed,
                run.volume_utilization * 100.0,
                run.positions_examined,
                run.elapsed_ms
            )?;
        }
        if let Some(speedup) = self.speedup {
            writeln!(f, "  speedup pruned vs brute force: {:.1}x", speedup)?;
        }
        Ok(())
    }
}

/// Runs every strategy on copies of the same boxes.
pub fn compare_strategies(
    objects: &[Box3D],
    spec: ContainerSpec,
    config: PackingConfig,
) -> Result<ComparisonReport, ValidationError> {
    let runs = Strategy::ALL
        .iter()
        .map(|&strategy| {
            pack_objects_with_config(objects.to_vec(), spec, strategy, config)
                .map(|result| StrategyRun::from_result(&result))
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    let pruned = runs.iter().find(|r| r.strategy == Strategy::Pruned);
    let brute = runs.iter().find(|r| r.strategy == Strategy::BruteForce);

    let (speedup, examined_ratio, pruned_matches_brute_force) = match (pruned, brute) {
        (Some(p), Some(b)) => (
            (p.elapsed_ms > 0.0).then(|| b.elapsed_ms / p.elapsed_ms),
            (p.positions_examined > 0)
                .then(|| b.positions_examined as f64 / p.positions_examined as f64),
            p.placed == b.placed,
        ),
        _ => (None, None, false),
    };

    if !pruned_matches_brute_force {
        log::warn!(
            "pruned and brute-force search disagree on {} boxes",
            objects.len()
        );
    }

    Ok(ComparisonReport {
        object_count: objects.len(),
        runs,
        speedup,
        examined_ratio,
        pruned_matches_brute_force,
    })
}
