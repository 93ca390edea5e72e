//! The sequential minimization loop.

use chrono::Utc;
use tracing::{debug, info};

use lm_types::{LmResult, OptimizerError};

use crate::search::{BayesianSearch, SearchSpace, SearchStrategy};
use crate::trial::{OptimizationConfig, OptimizationResult, OptimizationStatus, Trial, TrialPhase};

/// Minimize `objective` over `space` with Gaussian-process Bayesian search.
pub fn minimize<F>(space: SearchSpace, config: OptimizationConfig, objective: F) -> LmResult<OptimizationResult>
where
    F: FnMut(&[f64]) -> LmResult<f64>,
{
    space.validate()?;
    config.validate()?;
    let mut strategy = BayesianSearch::from_config(space, &config);
    minimize_with(&mut strategy, config, objective)
}

/// Run `config.n_calls` evaluations, one at a time, proposed by `strategy`.
///
/// The first error from `objective` aborts the run and is returned as-is.
/// A non-finite objective value is an error.
pub fn minimize_with<S, F>(
    strategy: &mut S,
    config: OptimizationConfig,
    mut objective: F,
) -> LmResult<OptimizationResult>
where
    S: SearchStrategy + ?Sized,
    F: FnMut(&[f64]) -> LmResult<f64>,
{
    config.validate()?;
    let n_calls = config.n_calls;
    let n_initial = config.n_initial_points;
    let mut status = OptimizationStatus::new(config, strategy.name());
    status.mark_running();
    info!(
        "starting {} minimization {}: {} calls, {} initial",
        status.strategy, status.id, n_calls, n_initial
    );

    for trial_number in 0..n_calls {
        match run_trial(strategy, &mut objective, trial_number, n_initial) {
            Ok(trial) => {
                debug!(
                    "trial {} objective {:.6} ({:?})",
                    trial.trial_number, trial.objective, trial.phase
                );
                status.record(trial);
            }
            Err(e) => {
                info!("minimization {} failed at trial {}: {}", status.id, trial_number, e);
                return Err(e);
            }
        }
    }

    status.mark_completed();
    let result = status.into_result()?;
    info!(
        "minimization {} finished: best {:.6} at trial {} ({} hits)",
        result.id,
        result.best_objective,
        result.best_trial_number,
        result.best_hits()
    );
    Ok(result)
}

fn run_trial<S, F>(
    strategy: &mut S,
    objective: &mut F,
    trial_number: usize,
    n_initial: usize,
) -> LmResult<Trial>
where
    S: SearchStrategy + ?Sized,
    F: FnMut(&[f64]) -> LmResult<f64>,
{
    let point = strategy
        .suggest(1)
        .into_iter()
        .next()
        .ok_or_else(|| OptimizerError::NoSuggestion {
            strategy: strategy.name().to_string(),
        })?;
    let phase = if trial_number < n_initial {
        TrialPhase::Initial
    } else {
        TrialPhase::Guided
    };

    let started_at = Utc::now();
    let value = objective(&point)?;
    if !value.is_finite() {
        return Err(OptimizerError::NonFiniteObjective { trial_number }.into());
    }
    strategy.report(&point, value);
    Ok(Trial::new(trial_number, point, value, phase, started_at))
}
