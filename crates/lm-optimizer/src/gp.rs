//! Gaussian-process surrogate and acquisition functions.
//!
//! Inputs are expected in the unit hypercube. Targets are standardized before
//! fitting, so predictions and acquisition values live on the standardized
//! scale; only their ordering matters to the search.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;
use std::f64::consts::{PI, SQRT_2};

use lm_types::{LmResult, OptimizerError};

/// Length-scale grid, multiplied by `sqrt(dim)` so the kernel stays
/// comparable across dimensionalities.
const LENGTH_SCALES: [f64; 6] = [0.1, 0.2, 0.35, 0.5, 1.0, 2.0];

/// Extra diagonal terms tried when the kernel matrix is not numerically
/// positive definite.
const JITTER: [f64; 4] = [0.0, 1e-8, 1e-6, 1e-4];

fn matern52(r: f64) -> f64 {
    let s = 5f64.sqrt() * r;
    (1.0 + s + s * s / 3.0) * (-s).exp()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// A fitted GP with a Matérn 5/2 kernel and unit signal variance.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    x: Vec<Vec<f64>>,
    y_mean: f64,
    y_std: f64,
    y_best: f64,
    length_scale: f64,
    noise: f64,
    chol_l: DMatrix<f64>,
    alpha: DVector<f64>,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    /// Fit to observations, selecting the length scale with the highest
    /// log marginal likelihood.
    pub fn fit(x: Vec<Vec<f64>>, y: &[f64], noise: f64) -> LmResult<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(surrogate_error(format!(
                "need matching non-empty inputs, got {} points and {} targets",
                n,
                y.len()
            )));
        }
        let dim = x[0].len();
        if dim == 0 || x.iter().any(|p| p.len() != dim) {
            return Err(surrogate_error("inconsistent input dimensions".to_string()));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(surrogate_error("non-finite target".to_string()));
        }

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let ys = DVector::from_iterator(n, y.iter().map(|v| (v - y_mean) / y_std));
        let y_best = ys.iter().copied().fold(f64::INFINITY, f64::min);

        let dist = DMatrix::from_fn(n, n, |i, j| squared_distance(&x[i], &x[j]).sqrt());
        let scale = (dim as f64).sqrt();

        let mut best: Option<(f64, f64, f64, DMatrix<f64>, DVector<f64>)> = None;
        for base in LENGTH_SCALES {
            let length_scale = base * scale;
            let Some((l, used_noise)) = factorize(&dist, length_scale, noise) else {
                continue;
            };
            let Some(alpha) = solve_cholesky(&l, &ys) else {
                continue;
            };
            let log_det: f64 = l.diagonal().iter().map(|d| d.ln()).sum();
            let lml = -0.5 * ys.dot(&alpha) - log_det - 0.5 * n as f64 * (2.0 * PI).ln();
            if !lml.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |b| lml > b.0) {
                best = Some((lml, length_scale, used_noise, l, alpha));
            }
        }

        let (log_marginal_likelihood, length_scale, noise, chol_l, alpha) = best
            .ok_or_else(|| surrogate_error("kernel matrix is not positive definite".to_string()))?;

        Ok(Self {
            x,
            y_mean,
            y_std,
            y_best,
            length_scale,
            noise,
            chol_l,
            alpha,
            log_marginal_likelihood,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    /// Lowest observed target on the standardized scale.
    pub fn best_standardized(&self) -> f64 {
        self.y_best
    }

    /// Posterior mean and standard deviation on the standardized scale.
    pub fn predict_standardized(&self, point: &[f64]) -> (f64, f64) {
        let k = DVector::from_iterator(
            self.x.len(),
            self.x
                .iter()
                .map(|xi| matern52(squared_distance(xi, point).sqrt() / self.length_scale)),
        );
        let mean = k.dot(&self.alpha);
        let explained = self
            .chol_l
            .solve_lower_triangular(&k)
            .map(|v| v.dot(&v))
            .unwrap_or(0.0);
        let var = (1.0 + self.noise - explained).max(1e-12);
        (mean, var.sqrt())
    }

    /// Posterior mean and standard deviation in the original target units.
    pub fn predict(&self, point: &[f64]) -> (f64, f64) {
        let (mean, std) = self.predict_standardized(point);
        (mean * self.y_std + self.y_mean, std * self.y_std)
    }
}

fn surrogate_error(message: String) -> lm_types::LmError {
    OptimizerError::Surrogate { message }.into()
}

/// Cholesky factor of the kernel matrix, escalating the diagonal until the
/// factorization succeeds.
fn factorize(dist: &DMatrix<f64>, length_scale: f64, noise: f64) -> Option<(DMatrix<f64>, f64)> {
    let n = dist.nrows();
    let base = dist.map(|r| matern52(r / length_scale));
    JITTER.iter().find_map(|jitter| {
        let diag = noise + jitter;
        let k = &base + DMatrix::<f64>::identity(n, n) * diag;
        k.cholesky().map(|chol| (chol.l(), diag))
    })
}

fn solve_cholesky(l: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let z = l.solve_lower_triangular(b)?;
    l.transpose().solve_upper_triangular(&z)
}

/// Acquisition function for minimization. Higher values are more promising.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Acquisition {
    ExpectedImprovement { xi: f64 },
    ProbabilityOfImprovement { xi: f64 },
    LowerConfidenceBound { kappa: f64 },
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::ExpectedImprovement { xi: 0.01 }
    }
}

impl Acquisition {
    /// Score a prediction against the best observed value.
    pub fn score(&self, mean: f64, std: f64, best: f64) -> f64 {
        match *self {
            Acquisition::ExpectedImprovement { xi } => {
                let improvement = best - mean - xi;
                if std <= 0.0 {
                    return improvement.max(0.0);
                }
                let z = improvement / std;
                improvement * normal_cdf(z) + std * normal_pdf(z)
            }
            Acquisition::ProbabilityOfImprovement { xi } => {
                let improvement = best - mean - xi;
                if std <= 0.0 {
                    return if improvement > 0.0 { 1.0 } else { 0.0 };
                }
                normal_cdf(improvement / std)
            }
            Acquisition::LowerConfidenceBound { kappa } => -(mean - kappa * std),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Acquisition::ExpectedImprovement { .. } => "EI",
            Acquisition::ProbabilityOfImprovement { .. } => "PI",
            Acquisition::LowerConfidenceBound { .. } => "LCB",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64 / 7.0]).collect();
        let y = x.iter().map(|p| (p[0] - 0.3).powi(2)).collect();
        (x, y)
    }

    #[test]
    fn normal_helpers() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_pdf(0.0) - 0.398_942_28).abs() < 1e-6);
    }

    #[test]
    fn fit_interpolates_training_points() {
        let (x, y) = line_data();
        let gp = GaussianProcess::fit(x.clone(), &y, 1e-6).unwrap();
        assert_eq!(gp.len(), 8);
        for (p, v) in x.iter().zip(&y) {
            let (mean, std) = gp.predict(p);
            assert!((mean - v).abs() < 1e-2, "mean {mean} vs {v}");
            assert!(std < 0.05, "std {std} at a training point");
        }
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let x = vec![vec![0.0, 0.0], vec![0.1, 0.1]];
        let gp = GaussianProcess::fit(x, &[1.0, 2.0], 1e-6).unwrap();
        let (_, near) = gp.predict_standardized(&[0.05, 0.05]);
        let (_, far) = gp.predict_standardized(&[1.0, 1.0]);
        assert!(far > near);
    }

    #[test]
    fn constant_targets_do_not_break_standardization() {
        let x = vec![vec![0.2], vec![0.5], vec![0.9]];
        let gp = GaussianProcess::fit(x, &[3.0, 3.0, 3.0], 1e-6).unwrap();
        let (mean, _) = gp.predict(&[0.5]);
        assert!((mean - 3.0).abs() < 1e-6);
        assert_eq!(gp.best_standardized(), 0.0);
    }

    #[test]
    fn duplicate_points_are_handled_by_jitter() {
        let x = vec![vec![0.4], vec![0.4], vec![0.4]];
        let gp = GaussianProcess::fit(x, &[1.0, 1.5, 0.5], 0.0).unwrap();
        assert!(gp.log_marginal_likelihood().is_finite());
    }

    #[test]
    fn fit_rejects_bad_input() {
        assert!(GaussianProcess::fit(vec![], &[], 1e-6).is_err());
        assert!(GaussianProcess::fit(vec![vec![0.0]], &[1.0, 2.0], 1e-6).is_err());
        assert!(GaussianProcess::fit(vec![vec![0.0], vec![0.0, 1.0]], &[1.0, 2.0], 1e-6).is_err());
        assert!(GaussianProcess::fit(vec![vec![0.0]], &[f64::NAN], 1e-6).is_err());
    }

    #[test]
    fn expected_improvement_prefers_lower_mean_and_is_non_negative() {
        let ei = Acquisition::default();
        let good = ei.score(-1.0, 0.5, 0.0);
        let bad = ei.score(1.0, 0.5, 0.0);
        assert!(good > bad);
        assert!(bad >= 0.0);
        assert_eq!(ei.score(1.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn expected_improvement_rewards_uncertainty() {
        let ei = Acquisition::ExpectedImprovement { xi: 0.0 };
        assert!(ei.score(0.0, 1.0, 0.0) > ei.score(0.0, 0.1, 0.0));
    }

    #[test]
    fn other_acquisitions() {
        let pi = Acquisition::ProbabilityOfImprovement { xi: 0.0 };
        assert!((pi.score(0.0, 1.0, 0.0) - 0.5).abs() < 1e-12);
        let lcb = Acquisition::LowerConfidenceBound { kappa: 2.0 };
        assert_eq!(lcb.score(1.0, 0.5, 0.0), 0.0);
        assert_eq!(lcb.name(), "LCB");
    }
}
