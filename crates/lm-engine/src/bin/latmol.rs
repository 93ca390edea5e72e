use anyhow::Context;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lm_chem::SmilesProperties;
use lm_engine::{LibraryDecoder, OptimizationDriver, RunConfig, StructureMaterializer, ValidityRetryGenerator};

#[derive(Serialize)]
struct Summary<'a> {
    run_id: String,
    objective: String,
    target: Option<f64>,
    best_smiles: &'a str,
    best_score: f64,
    best_trial: usize,
    best_hits: usize,
    trials: usize,
    decode_calls: usize,
    invalid_batches: usize,
    convergence: Vec<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::from_env().context("loading run configuration")?;
    config.validate().context("validating run configuration")?;
    info!(
        "latmol {}: objective {}, {} calls, seed {}",
        env!("CARGO_PKG_VERSION"),
        config.objective,
        config.optimization.n_calls,
        config.optimization.seed
    );

    let decoder = LibraryDecoder::new(config.decoder.clone()).context("building decoder")?;
    let generator = ValidityRetryGenerator::new(Box::new(decoder), StructureMaterializer::default())
        .with_latent_dim(config.decoder.latent_dim)
        .with_retry_policy(config.retry);
    let mut driver = OptimizationDriver::with_generator(generator, Box::new(SmilesProperties))
        .with_config(config.optimization.clone());

    let run = driver
        .optimize_named(&config.objective, config.target)
        .context("optimization failed")?;

    let summary = Summary {
        run_id: run.result.id.to_string(),
        objective: run.objective.objective().to_string(),
        target: run.objective.target(),
        best_smiles: run.best_structure.smiles(),
        best_score: run.best_score,
        best_trial: run.result.best_trial_number,
        best_hits: run.best_hits(),
        trials: run.trial_count(),
        decode_calls: run.decode_calls,
        invalid_batches: run.invalid_batches,
        convergence: run.result.convergence(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
