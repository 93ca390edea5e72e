//! Trial tracking and optimization run management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lm_types::{LmResult, OptimizerError};

use crate::gp::Acquisition;
use crate::search::Point;

/// Unique optimization run identifier.
pub type OptimizationId = Uuid;

/// Top-level configuration for an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Total number of objective evaluations.
    pub n_calls: usize,

    /// Evaluations drawn uniformly at random before the surrogate takes over.
    pub n_initial_points: usize,

    /// Seed for every random draw the search makes.
    pub seed: u64,

    pub acquisition: Acquisition,

    /// Size of the candidate pool the acquisition function is maximized over.
    pub n_candidates: usize,

    /// Observation noise added to the kernel diagonal.
    pub noise: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_calls: 150,
            n_initial_points: 20,
            seed: 1234,
            acquisition: Acquisition::default(),
            n_candidates: 1000,
            noise: 1e-6,
        }
    }
}

impl OptimizationConfig {
    pub fn with_calls(mut self, n: usize) -> Self {
        self.n_calls = n;
        self
    }

    pub fn with_initial_points(mut self, n: usize) -> Self {
        self.n_initial_points = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_acquisition(mut self, acquisition: Acquisition) -> Self {
        self.acquisition = acquisition;
        self
    }

    pub fn with_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn validate(&self) -> LmResult<()> {
        let problem = if self.n_calls == 0 {
            Some("n_calls must be positive".to_string())
        } else if self.n_initial_points > self.n_calls {
            Some(format!(
                "n_initial_points ({}) exceeds n_calls ({})",
                self.n_initial_points, self.n_calls
            ))
        } else if self.n_candidates == 0 {
            Some("n_candidates must be positive".to_string())
        } else if !(self.noise.is_finite() && self.noise >= 0.0) {
            Some(format!("noise must be finite and non-negative, got {}", self.noise))
        } else {
            None
        };
        match problem {
            Some(message) => Err(OptimizerError::InvalidConfig { message }.into()),
            None => Ok(()),
        }
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub id: OptimizationId,
    pub config: OptimizationConfig,
    pub strategy: String,
    pub state: OptimizationState,
    pub trials: Vec<Trial>,
    pub best_trial: Option<usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OptimizationStatus {
    pub fn new(config: OptimizationConfig, strategy: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            trials: Vec::with_capacity(config.n_calls),
            config,
            strategy: strategy.to_string(),
            state: OptimizationState::Pending,
            best_trial: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn trials_completed(&self) -> usize {
        self.trials.len()
    }

    pub fn best(&self) -> Option<&Trial> {
        self.best_trial.and_then(|i| self.trials.get(i))
    }

    /// Append a finished trial and update the best if it strictly improves.
    pub fn record(&mut self, trial: Trial) {
        let improves = self
            .best()
            .map_or(true, |best| trial.objective < best.objective);
        self.trials.push(trial);
        if improves {
            self.best_trial = Some(self.trials.len() - 1);
        }
    }

    /// Finalize a completed run.
    pub fn into_result(self) -> LmResult<OptimizationResult> {
        let best = self
            .best()
            .cloned()
            .ok_or_else(|| OptimizerError::NoSuggestion {
                strategy: self.strategy.clone(),
            })?;
        Ok(OptimizationResult {
            id: self.id,
            config: self.config,
            strategy: self.strategy,
            best_point: best.point,
            best_objective: best.objective,
            best_trial_number: best.trial_number,
            trials: self.trials,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// Whether a trial was proposed by random exploration or by the surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialPhase {
    Initial,
    Guided,
}

/// A single objective evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub trial_number: usize,
    pub point: Point,
    pub objective: f64,
    pub phase: TrialPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Trial {
    pub fn new(
        trial_number: usize,
        point: Point,
        objective: f64,
        phase: TrialPhase,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trial_number,
            point,
            objective,
            phase,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Outcome of a completed optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub id: OptimizationId,
    pub config: OptimizationConfig,
    pub strategy: String,
    pub best_point: Point,
    pub best_objective: f64,
    pub best_trial_number: usize,
    /// Every evaluation, in call order.
    pub trials: Vec<Trial>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OptimizationResult {
    /// Number of trials whose objective equals the best objective.
    pub fn best_hits(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.objective == self.best_objective)
            .count()
    }

    pub fn objective_trace(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.objective).collect()
    }

    /// Running minimum of the objective after each trial.
    pub fn convergence(&self) -> Vec<f64> {
        self.trials
            .iter()
            .scan(f64::INFINITY, |best, t| {
                *best = best.min(t.objective);
                Some(*best)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(n: usize, objective: f64) -> Trial {
        Trial::new(n, vec![n as f64], objective, TrialPhase::Initial, Utc::now())
    }

    #[test]
    fn default_config_matches_documented_budget() {
        let config = OptimizationConfig::default();
        assert_eq!(config.n_calls, 150);
        assert_eq!(config.n_initial_points, 20);
        assert_eq!(config.seed, 1234);
        assert_eq!(config.acquisition, Acquisition::ExpectedImprovement { xi: 0.01 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let base = OptimizationConfig::default();
        assert!(base.clone().with_calls(0).validate().is_err());
        assert!(base.clone().with_calls(10).with_initial_points(11).validate().is_err());
        assert!(base.clone().with_candidates(0).validate().is_err());
        assert!(base.clone().with_noise(-1.0).validate().is_err());
        assert!(base.with_calls(10).with_initial_points(10).validate().is_ok());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: OptimizationConfig =
            serde_json::from_str(r#"{"n_calls": 30, "seed": 7}"#).unwrap();
        assert_eq!(config.n_calls, 30);
        assert_eq!(config.seed, 7);
        assert_eq!(config.n_initial_points, 20);
    }

    #[test]
    fn optimization_status_lifecycle() {
        let mut status = OptimizationStatus::new(OptimizationConfig::default(), "random");

        assert_eq!(status.state, OptimizationState::Pending);
        assert!(status.started_at.is_none());

        status.mark_running();
        assert_eq!(status.state, OptimizationState::Running);
        assert!(status.started_at.is_some());

        status.mark_completed();
        assert_eq!(status.state, OptimizationState::Completed);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn best_trial_tracking_minimizes_and_keeps_first_tie() {
        let mut status = OptimizationStatus::new(OptimizationConfig::default(), "random");
        status.record(trial(0, 1.5));
        assert_eq!(status.best().unwrap().objective, 1.5);

        status.record(trial(1, 0.5));
        status.record(trial(2, 2.0));
        status.record(trial(3, 0.5));
        let best = status.best().unwrap();
        assert_eq!(best.objective, 0.5);
        assert_eq!(best.trial_number, 1);
        assert_eq!(status.trials_completed(), 4);
    }

    #[test]
    fn result_reports_history_and_hits() {
        let mut status = OptimizationStatus::new(OptimizationConfig::default(), "random");
        status.mark_running();
        for (i, v) in [3.0, 1.0, 2.0, 1.0].into_iter().enumerate() {
            status.record(trial(i, v));
        }
        status.mark_completed();
        let result = status.into_result().unwrap();

        assert_eq!(result.best_objective, 1.0);
        assert_eq!(result.best_trial_number, 1);
        assert_eq!(result.best_point, vec![1.0]);
        assert_eq!(result.best_hits(), 2);
        assert_eq!(result.objective_trace(), vec![3.0, 1.0, 2.0, 1.0]);
        assert_eq!(result.convergence(), vec![3.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_run_has_no_result() {
        let status = OptimizationStatus::new(OptimizationConfig::default(), "random");
        assert!(status.into_result().is_err());
    }

    #[test]
    fn trial_timing() {
        let t = trial(0, 1.0);
        assert!(t.finished_at >= t.started_at);
        assert!(t.duration_ms() >= 0);
    }
}
