//! # lm-engine
//!
//! Latent-space molecular optimization. A [`Decoder`] turns latent vectors
//! into token sequences, the [`ValidityRetryGenerator`] keeps decoding until
//! at least one sequence is a valid structure, a [`ScoringOracle`] turns the
//! first structure into a score, and the [`OptimizationDriver`] runs the
//! Bayesian minimizer over all of it.

pub mod config;
pub mod decoder;
pub mod driver;
pub mod generator;
pub mod materializer;
pub mod oracle;

pub use config::RunConfig;
pub use decoder::{Decoder, LibraryDecoder, LibraryDecoderConfig, REFERENCE_LIBRARY};
pub use driver::{MoleculeOptimization, OptimizationDriver, LATENT_BOUND};
pub use generator::{RetryPolicy, ValidityRetryGenerator, DEFAULT_MAX_ATTEMPTS};
pub use materializer::StructureMaterializer;
pub use oracle::{
    DrugLikenessDeficit, MolecularWeightDistance, ScoringOracle, SyntheticAccessibility,
};
