//! Propagation of distributions by random sampling
//!
//! Each input is drawn from its assumed distribution, the model is evaluated for every draw and
//! the resulting values are summarised. Draws for which the model cannot be evaluated are
//! dropped and counted rather than aborting the run.

use ndarray::Array1;
use ndarray_rand::rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use serde::Serialize;
use thiserror::Error;

use crate::config::MonteCarloSettings;
use crate::distributions::Distribution;
use crate::expression::{Bindings, Expr};
use crate::math::{quantile, SampleStatistics};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum MonteCarloError {
    #[error("input '{variable}' cannot be sampled: {reason}")]
    Distribution { variable: String, reason: String },
    #[error("only {accepted} of {requested} draws gave a model value, at least 2 are needed")]
    NoValidDraws { requested: usize, accepted: usize },
    #[error("at least 2 draws must be requested")]
    TooFewSamples,
    #[error("confidence level {0} must lie strictly between 0 and 1")]
    InvalidConfidence(f64),
}

/// An input quantity and the distribution its draws come from
#[derive(Clone, Debug, PartialEq)]
pub struct SampledInput {
    pub name: String,
    pub distribution: Distribution,
    pub central_value: f64,
    pub standard_uncertainty: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub requested: usize,
    pub accepted: usize,
    pub mean: f64,
    pub standard_deviation: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Probabilistically symmetric interval holding `confidence_level` of the draws
    pub coverage_interval: (f64, f64),
    pub confidence_level: f64,
}

/// Sample `model` over the distributions of `inputs`
///
/// The generator is seeded from `settings`, so repeated runs give identical summaries.
///
/// # Errors
/// Fails when fewer than two draws are requested, for a confidence level outside `(0, 1)`, when an
/// input's parameters do not describe a distribution and when fewer than two draws produce a
/// finite model value.
pub fn simulate(
    model: &Expr,
    inputs: &[SampledInput],
    settings: &MonteCarloSettings,
    confidence_level: f64,
) -> Result<MonteCarloSummary, MonteCarloError> {
    let requested = settings.samples;
    if requested < 2 {
        return Err(MonteCarloError::TooFewSamples);
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(MonteCarloError::InvalidConfidence(confidence_level));
    }

    let mut rng = Isaac64Rng::seed_from_u64(settings.seed);
    let draws = inputs
        .iter()
        .map(|input| {
            input
                .distribution
                .sample(
                    input.central_value,
                    input.standard_uncertainty,
                    requested,
                    &mut rng,
                )
                .map_err(|reason| MonteCarloError::Distribution {
                    variable: input.name.clone(),
                    reason,
                })
        })
        .collect::<Result<Vec<Array1<f64>>, _>>()?;

    let mut bindings: Bindings = inputs
        .iter()
        .map(|input| (input.name.clone(), input.central_value))
        .collect();
    let mut values = Vec::with_capacity(requested);
    let mut rejected = 0;
    for i in 0..requested {
        for (input, samples) in inputs.iter().zip(&draws) {
            if let Some(value) = bindings.get_mut(&input.name) {
                *value = samples[i];
            }
        }
        // If evaluation fails for a draw we just skip it
        match model.evaluate(&bindings) {
            Ok(value) => values.push(value),
            Err(e) => {
                rejected += 1;
                log::debug!("discarding draw {i}: {e}");
            }
        }
    }
    if rejected > 0 {
        log::warn!("{rejected} of {requested} draws could not be evaluated and were discarded");
    }

    summarise(values, requested, confidence_level)
}

fn summarise(
    mut values: Vec<f64>,
    requested: usize,
    confidence_level: f64,
) -> Result<MonteCarloSummary, MonteCarloError> {
    let accepted = values.len();
    let no_valid_draws = MonteCarloError::NoValidDraws {
        requested,
        accepted,
    };
    values.sort_by(f64::total_cmp);

    let statistics = SampleStatistics::from_values(&values).ok_or_else(|| no_valid_draws.clone())?;
    let standard_deviation = statistics
        .standard_deviation
        .ok_or_else(|| no_valid_draws.clone())?;
    let tail = (1.0 - confidence_level) / 2.0;
    let bounds = (
        quantile(&values, tail),
        quantile(&values, 1.0 - tail),
        quantile(&values, 0.5),
    );
    let (Some(lower), Some(upper), Some(median)) = bounds else {
        return Err(no_valid_draws);
    };

    Ok(MonteCarloSummary {
        requested,
        accepted,
        mean: statistics.mean,
        standard_deviation,
        median,
        min: values[0],
        max: values[accepted - 1],
        coverage_interval: (lower, upper),
        confidence_level,
    })
}
