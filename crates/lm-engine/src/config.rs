//! Run configuration for the `latmol` binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use lm_optimizer::OptimizationConfig;
use lm_types::{config_error, LmResult, Objective};

use crate::decoder::LibraryDecoderConfig;
use crate::generator::RetryPolicy;

pub const ENV_CONFIG: &str = "LATMOL_CONFIG";
pub const ENV_OBJECTIVE: &str = "LATMOL_OBJECTIVE";
pub const ENV_TARGET: &str = "LATMOL_TARGET";
pub const ENV_SEED: &str = "LATMOL_SEED";

/// Everything one run needs. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Objective name, parsed case-insensitively (`"MW"`, `"QED"`, `"SA"`).
    pub objective: String,
    /// Target molecular weight; required when the objective is `MW`.
    pub target: Option<f64>,
    pub optimization: OptimizationConfig,
    pub decoder: LibraryDecoderConfig,
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            objective: Objective::DrugLikeness.name().to_string(),
            target: None,
            optimization: OptimizationConfig::default(),
            decoder: LibraryDecoderConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> LmResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> LmResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load from `LATMOL_CONFIG` if set, then apply the environment overrides.
    pub fn from_env() -> LmResult<Self> {
        let mut config = match std::env::var(ENV_CONFIG) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override objective, target and seed from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> LmResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(objective) = lookup(ENV_OBJECTIVE) {
            self.objective = objective;
        }
        if let Some(target) = lookup(ENV_TARGET) {
            let value: f64 = target
                .trim()
                .parse()
                .map_err(|_| config_error!("{ENV_TARGET} is not a number: {target:?}"))?;
            self.target = Some(value);
        }
        if let Some(seed) = lookup(ENV_SEED) {
            let value: u64 = seed
                .trim()
                .parse()
                .map_err(|_| config_error!("{ENV_SEED} is not an unsigned integer: {seed:?}"))?;
            self.optimization.seed = value;
            self.decoder.seed = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> LmResult<()> {
        self.objective.parse::<Objective>()?;
        self.optimization.validate()?;
        self.decoder.validate()
    }
}
