//! Validity-retry generation: decode until at least one valid structure.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use lm_types::{GenerationError, LatentVector, LmResult, ValidStructures, LATENT_DIM};

use crate::decoder::Decoder;
use crate::materializer::StructureMaterializer;

/// Default bound on decode attempts per latent vector.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// How many times the generator decodes the same vector before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::capped(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// At most `max_attempts` decode calls; at least one is always made.
    pub fn capped(max_attempts: usize) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Retry until the decoder produces something valid.
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    fn allows(&self, attempts: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

/// Wraps a decoder so every call yields a non-empty set of valid structures.
pub struct ValidityRetryGenerator {
    decoder: Box<dyn Decoder>,
    materializer: StructureMaterializer,
    latent_dim: usize,
    policy: RetryPolicy,
    decode_calls: usize,
    invalid_batches: usize,
}

impl ValidityRetryGenerator {
    pub fn new(decoder: Box<dyn Decoder>, materializer: StructureMaterializer) -> Self {
        Self {
            decoder,
            materializer,
            latent_dim: LATENT_DIM,
            policy: RetryPolicy::default(),
            decode_calls: 0,
            invalid_batches: 0,
        }
    }

    pub fn with_latent_dim(mut self, dim: usize) -> Self {
        self.latent_dim = dim;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Total decoder invocations since construction.
    pub fn decode_calls(&self) -> usize {
        self.decode_calls
    }

    /// Decoder invocations that produced no valid structure.
    pub fn invalid_batches(&self) -> usize {
        self.invalid_batches
    }

    /// Decode `latent` until at least one sequence is a valid structure.
    ///
    /// A dimension mismatch fails before the decoder is called. Decoder
    /// errors propagate without retry.
    pub fn generate(&mut self, latent: &LatentVector) -> LmResult<ValidStructures> {
        latent.ensure_dim(self.latent_dim)?;

        let mut attempts = 0;
        loop {
            if !self.policy.allows(attempts) {
                warn!("no valid structure after {attempts} decode attempts");
                return Err(GenerationError::RetryExhausted { attempts }.into());
            }
            attempts += 1;
            self.decode_calls += 1;

            let batch = self.decoder.decode(latent)?;
            let valid: Vec<_> = batch
                .iter()
                .filter_map(|sequence| self.materializer.materialize(sequence))
                .collect();

            match ValidStructures::from_vec(valid) {
                Some(structures) => {
                    debug!(
                        "attempt {attempts}: {} of {} sequences valid, first {}",
                        structures.len(),
                        batch.len(),
                        structures.first()
                    );
                    return Ok(structures);
                }
                None => {
                    self.invalid_batches += 1;
                    trace!("attempt {attempts}: all {} sequences invalid", batch.len());
                }
            }
        }
    }
}

impl std::fmt::Debug for ValidityRetryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidityRetryGenerator")
            .field("latent_dim", &self.latent_dim)
            .field("policy", &self.policy)
            .field("decode_calls", &self.decode_calls)
            .field("invalid_batches", &self.invalid_batches)
            .finish()
    }
}
