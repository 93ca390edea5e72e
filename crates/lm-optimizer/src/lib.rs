//! # lm-optimizer
//!
//! Sequential black-box minimization for LatMol.
//!
//! Provides continuous search space definitions, search strategies (random,
//! Gaussian-process Bayesian), trial tracking and the [`minimize`] loop that
//! drives a strategy against an objective one evaluation at a time.

mod gp;
mod minimize;
mod search;
mod trial;

pub use gp::{Acquisition, GaussianProcess};
pub use minimize::{minimize, minimize_with};
pub use search::{BayesianSearch, Dimension, Point, RandomSearch, SearchSpace, SearchStrategy};
pub use trial::{
    OptimizationConfig, OptimizationId, OptimizationResult, OptimizationState,
    OptimizationStatus, Trial, TrialPhase,
};
