//! Search space definitions and sequential search strategies.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lm_types::{LmResult, OptimizerError};

use crate::gp::{Acquisition, GaussianProcess};
use crate::trial::OptimizationConfig;

/// A proposed point, one coordinate per search dimension.
pub type Point = Vec<f64>;

/// A single continuous dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Human-readable dimension name (e.g. "z17").
    pub name: String,
    /// Inclusive lower bound.
    pub low: f64,
    /// Inclusive upper bound.
    pub high: f64,
}

impl Dimension {
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }

    /// Map a coordinate into [0, 1].
    pub fn to_unit(&self, x: f64) -> f64 {
        (x - self.low) / self.span()
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.low, self.high)
    }
}

/// The full search space: an ordered list of continuous dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    /// A hyper-rectangle of `n` dimensions named `z0..z{n-1}`, all bounded
    /// to `[low, high]`.
    pub fn uniform(n: usize, low: f64, high: f64) -> Self {
        Self {
            dimensions: (0..n)
                .map(|i| Dimension {
                    name: format!("z{i}"),
                    low,
                    high,
                })
                .collect(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            low,
            high,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn validate(&self) -> LmResult<()> {
        if self.dimensions.is_empty() {
            return Err(OptimizerError::InvalidSearchSpace {
                message: "search space has no dimensions".to_string(),
            }
            .into());
        }
        for dim in &self.dimensions {
            if !(dim.low.is_finite() && dim.high.is_finite() && dim.low < dim.high) {
                return Err(OptimizerError::InvalidSearchSpace {
                    message: format!(
                        "dimension {} has invalid bounds [{}, {}]",
                        dim.name, dim.low, dim.high
                    ),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(point)
                .all(|(dim, x)| dim.contains(*x))
    }

    /// Rescale a point into the unit hypercube.
    pub fn to_unit(&self, point: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(point)
            .map(|(dim, x)| dim.to_unit(*x))
            .collect()
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Point {
        self.dimensions
            .iter()
            .map(|dim| rng.gen_range(dim.low..=dim.high))
            .collect()
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Generate the next batch of points to evaluate.
    fn suggest(&mut self, count: usize) -> Vec<Point>;

    /// Report a completed evaluation so adaptive strategies can learn.
    fn report(&mut self, _point: &[f64], _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Random search ----

/// Independent uniform sampling across the search space, seeded.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn sample_one(&mut self) -> Point {
        self.space.sample(&mut self.rng)
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<Point> {
        (0..count).map(|_| self.sample_one()).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Bayesian search ----

/// Perturbation widths, as fractions of each dimension's span, used to build
/// local candidates around the best observations.
const LOCAL_SCALES: [f64; 4] = [0.02, 0.05, 0.1, 0.2];

/// How many of the best observations seed local candidates.
const LOCAL_ANCHORS: usize = 5;

/// Gaussian-process Bayesian optimization.
///
/// The first `n_initial_points` suggestions are uniform random. After that,
/// each suggestion fits a GP to every reported observation and returns the
/// candidate with the highest acquisition value. Candidates are half uniform
/// samples and half perturbations of the best points seen so far. If the GP
/// cannot be fit the strategy falls back to a random point.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
    observations: Vec<(Point, f64)>,
    suggested: usize,
    n_initial_points: usize,
    n_candidates: usize,
    acquisition: Acquisition,
    noise: f64,
}

impl BayesianSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self::from_config(space, &OptimizationConfig::default().with_seed(seed))
    }

    pub fn from_config(space: SearchSpace, config: &OptimizationConfig) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            observations: Vec::new(),
            suggested: 0,
            n_initial_points: config.n_initial_points,
            n_candidates: config.n_candidates.max(1),
            acquisition: config.acquisition,
            noise: config.noise,
        }
    }

    pub fn observations(&self) -> &[(Point, f64)] {
        &self.observations
    }

    /// Pure exploration sample.
    fn explore(&mut self) -> Point {
        self.space.sample(&mut self.rng)
    }

    /// Candidate pool for the acquisition function.
    fn candidates(&mut self) -> Vec<Point> {
        let mut ranked: Vec<&(Point, f64)> = self.observations.iter().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        let anchors: Vec<Point> = ranked
            .iter()
            .take(LOCAL_ANCHORS)
            .map(|(p, _)| p.clone())
            .collect();

        let n_random = self.n_candidates.div_ceil(2);
        let n_local = self.n_candidates - n_random;
        let mut pool = Vec::with_capacity(self.n_candidates);
        for _ in 0..n_random {
            pool.push(self.space.sample(&mut self.rng));
        }
        if anchors.is_empty() {
            return pool;
        }
        for i in 0..n_local {
            let anchor = &anchors[i % anchors.len()];
            let scale = LOCAL_SCALES[(i / anchors.len()) % LOCAL_SCALES.len()];
            let point = self
                .space
                .dimensions
                .iter()
                .zip(anchor)
                .map(|(dim, x)| {
                    let noise = self.rng.gen_range(-1.0..1.0) * scale * dim.span();
                    dim.clamp(x + noise)
                })
                .collect();
            pool.push(point);
        }
        pool
    }

    /// Fit the surrogate and maximize the acquisition over a candidate pool.
    fn exploit(&mut self) -> LmResult<Point> {
        let x: Vec<Vec<f64>> = self
            .observations
            .iter()
            .map(|(p, _)| self.space.to_unit(p))
            .collect();
        let y: Vec<f64> = self.observations.iter().map(|(_, v)| *v).collect();
        let gp = GaussianProcess::fit(x, &y, self.noise)?;
        let best = gp.best_standardized();

        let pool = self.candidates();
        let acquisition = self.acquisition;
        let scores: Vec<f64> = pool
            .par_iter()
            .map(|candidate| {
                let (mean, std) = gp.predict_standardized(&self.space.to_unit(candidate));
                acquisition.score(mean, std, best)
            })
            .collect();

        // First maximum wins so the choice does not depend on thread timing.
        let mut best_idx = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best_idx] {
                best_idx = i;
            }
        }
        debug!(
            "acquisition {:.6} at candidate {} of {} (length scale {:.3})",
            scores[best_idx],
            best_idx,
            pool.len(),
            gp.length_scale()
        );
        pool.into_iter()
            .nth(best_idx)
            .ok_or_else(|| OptimizerError::NoSuggestion {
                strategy: self.name().to_string(),
            }
            .into())
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self, count: usize) -> Vec<Point> {
        (0..count)
            .map(|_| {
                let point = if self.suggested < self.n_initial_points || self.observations.is_empty() {
                    self.explore()
                } else {
                    match self.exploit() {
                        Ok(point) => point,
                        Err(e) => {
                            warn!("surrogate unavailable, sampling at random: {e}");
                            self.explore()
                        }
                    }
                };
                self.suggested += 1;
                point
            })
            .collect()
    }

    fn report(&mut self, point: &[f64], objective: f64) {
        self.observations.push((point.to_vec(), objective));
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_float("x", -5.0, 5.0)
            .add_float("y", 0.0, 1.0)
    }

    #[test]
    fn uniform_space_names_dimensions() {
        let space = SearchSpace::uniform(256, -5.0, 5.0);
        assert_eq!(space.len(), 256);
        assert_eq!(space.dimensions[0].name, "z0");
        assert_eq!(space.dimensions[255].name, "z255");
        assert!(space.validate().is_ok());
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(SearchSpace::new().validate().is_err());
        assert!(SearchSpace::new().add_float("x", 1.0, 1.0).validate().is_err());
        assert!(SearchSpace::new()
            .add_float("x", 0.0, f64::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn random_search_respects_bounds() {
        let space = sample_space();
        let mut rs = RandomSearch::new(space.clone(), 7);
        let suggestions = rs.suggest(50);
        assert_eq!(suggestions.len(), 50);
        for point in &suggestions {
            assert!(space.contains(point), "out of bounds: {point:?}");
        }
    }

    #[test]
    fn random_search_is_reproducible() {
        let mut a = RandomSearch::new(sample_space(), 1234);
        let mut b = RandomSearch::new(sample_space(), 1234);
        let mut c = RandomSearch::new(sample_space(), 4321);
        let first = a.suggest(5);
        assert_eq!(first, b.suggest(5));
        assert_ne!(first, c.suggest(5));
    }

    #[test]
    fn bayesian_search_starts_with_exploration() {
        let config = OptimizationConfig::default()
            .with_seed(3)
            .with_initial_points(4);
        let mut bs = BayesianSearch::from_config(sample_space(), &config);
        let mut random = RandomSearch::new(sample_space(), 3);
        // The initial phase draws from the same seeded stream as plain random search.
        assert_eq!(bs.suggest(4), random.suggest(4));
    }

    #[test]
    fn bayesian_search_moves_toward_the_minimum() {
        let space = SearchSpace::new().add_float("x", -5.0, 5.0);
        let config = OptimizationConfig::default()
            .with_seed(11)
            .with_initial_points(5)
            .with_candidates(200);
        let mut bs = BayesianSearch::from_config(space.clone(), &config);
        let objective = |p: &[f64]| (p[0] - 2.0).powi(2);

        let mut best = f64::INFINITY;
        for _ in 0..25 {
            let point = bs.suggest(1).remove(0);
            assert!(space.contains(&point));
            let value = objective(&point);
            best = best.min(value);
            bs.report(&point, value);
        }
        assert!(best < 0.05, "best value {best}");
        assert_eq!(bs.observations().len(), 25);
    }

    #[test]
    fn bayesian_search_is_reproducible() {
        let space = sample_space();
        let config = OptimizationConfig::default()
            .with_seed(99)
            .with_initial_points(3)
            .with_candidates(64);
        let run = || {
            let mut bs = BayesianSearch::from_config(space.clone(), &config);
            let mut points = Vec::new();
            for _ in 0..8 {
                let p = bs.suggest(1).remove(0);
                let v = p[0].abs() + p[1];
                bs.report(&p, v);
                points.push(p);
            }
            points
        };
        assert_eq!(run(), run());
    }
}
