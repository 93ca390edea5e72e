//! The optimization driver: latent proposals in, best structure out.

use serde::{Deserialize, Serialize};
use tracing::info;

use lm_chem::MolecularProperties;
use lm_optimizer::{minimize, OptimizationConfig, OptimizationResult, SearchSpace};
use lm_types::{CandidateStructure, LatentVector, LmResult, Objective, ObjectiveSpec};

use crate::decoder::Decoder;
use crate::generator::{RetryPolicy, ValidityRetryGenerator};
use crate::materializer::StructureMaterializer;
use crate::oracle;

/// Every latent coordinate is searched within `[-LATENT_BOUND, LATENT_BOUND]`.
pub const LATENT_BOUND: f64 = 5.0;

/// Result of one driver run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeOptimization {
    pub objective: ObjectiveSpec,
    pub best_latent: LatentVector,
    pub best_score: f64,
    /// The structure that was scored at the best latent point.
    pub best_structure: CandidateStructure,
    /// The scored structure of every trial, in call order.
    pub structures: Vec<CandidateStructure>,
    pub decode_calls: usize,
    pub invalid_batches: usize,
    pub result: OptimizationResult,
}

impl MoleculeOptimization {
    pub fn best_hits(&self) -> usize {
        self.result.best_hits()
    }

    pub fn trial_count(&self) -> usize {
        self.result.trials.len()
    }
}

/// Runs the minimizer over the latent space of a decoder.
pub struct OptimizationDriver {
    generator: ValidityRetryGenerator,
    properties: Box<dyn MolecularProperties>,
    config: OptimizationConfig,
}

impl OptimizationDriver {
    /// A driver over a `LATENT_DIM`-dimensional decoder using the default
    /// vocabulary and SMILES validator.
    pub fn new(decoder: Box<dyn Decoder>, properties: Box<dyn MolecularProperties>) -> Self {
        let generator = ValidityRetryGenerator::new(decoder, StructureMaterializer::default());
        Self::with_generator(generator, properties)
    }

    pub fn with_generator(
        generator: ValidityRetryGenerator,
        properties: Box<dyn MolecularProperties>,
    ) -> Self {
        Self {
            generator,
            properties,
            config: OptimizationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.generator.set_retry_policy(policy);
        self
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn generator(&self) -> &ValidityRetryGenerator {
        &self.generator
    }

    /// Optimize an objective given by name (`"MW"`, `"qed"`, `"sa"`, ...).
    ///
    /// Unknown names fail before anything is decoded.
    pub fn optimize_named(
        &mut self,
        objective: &str,
        target: Option<f64>,
    ) -> LmResult<MoleculeOptimization> {
        let objective: Objective = objective.parse()?;
        self.optimize(objective, target)
    }

    /// Search the latent space for the point whose first decoded structure
    /// minimizes `objective`.
    ///
    /// `target` is required for molecular weight and ignored otherwise. All
    /// configuration is validated before the first decode; any error from
    /// generation or scoring aborts the run.
    pub fn optimize(
        &mut self,
        objective: Objective,
        target: Option<f64>,
    ) -> LmResult<MoleculeOptimization> {
        let spec = ObjectiveSpec::resolve(objective, target)?;
        self.config.validate()?;
        let latent_dim = self.generator.latent_dim();
        let space = SearchSpace::uniform(latent_dim, -LATENT_BOUND, LATENT_BOUND);
        space.validate()?;
        let oracle = oracle::for_spec(spec, self.properties.as_ref())?;

        info!(
            "optimizing {} over {} latent dimensions ({} calls, seed {})",
            oracle.name(),
            latent_dim,
            self.config.n_calls,
            self.config.seed
        );

        let calls_before = self.generator.decode_calls();
        let invalid_before = self.generator.invalid_batches();
        let generator = &mut self.generator;
        let mut structures = Vec::with_capacity(self.config.n_calls);
        let result = minimize(space, self.config.clone(), |point| {
            let latent = LatentVector::new(point.to_vec())?;
            let valid = generator.generate(&latent)?;
            let score = oracle.score(&valid)?;
            structures.push(valid.first().clone());
            Ok(score)
        })?;

        let best_latent = LatentVector::new(result.best_point.clone())?;
        let best_structure = structures
            .get(result.best_trial_number)
            .cloned()
            .ok_or_else(|| {
                lm_types::internal_error!(
                    "no structure recorded for trial {}",
                    result.best_trial_number
                )
            })?;

        info!(
            "best {} = {:.4} for {} ({} decode calls)",
            oracle.name(),
            result.best_objective,
            best_structure,
            self.generator.decode_calls() - calls_before
        );

        Ok(MoleculeOptimization {
            objective: spec,
            best_latent,
            best_score: result.best_objective,
            best_structure,
            structures,
            decode_calls: self.generator.decode_calls() - calls_before,
            invalid_batches: self.generator.invalid_batches() - invalid_before,
            result,
        })
    }
}

impl std::fmt::Debug for OptimizationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationDriver")
            .field("generator", &self.generator)
            .field("config", &self.config)
            .finish()
    }
}
