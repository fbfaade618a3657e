//! Law of propagation of uncertainty for uncorrelated inputs
//!
//! For a model $y = f(x_1, \ldots, x_N)$ every input contributes $u_i = |c_i| u(x_i)$ where the
//! sensitivity coefficient $c_i = \partial f / \partial x_i$ is evaluated at the central values.
//! The contributions combine in quadrature, the Welch-Satterthwaite formula gives the effective
//! degrees of freedom and a Student-t quantile turns the combined standard uncertainty into an
//! expanded uncertainty.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use thiserror::Error;

use crate::expression::{Bindings, EvalError, Expr};
use crate::uncertainty::Resolved;

/// Above this many degrees of freedom the Student-t quantile equals the normal one to within
/// floating point noise
const NORMAL_LIMIT: f64 = 1e7;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PropagationError {
    #[error("sensitivity to '{variable}': {source}")]
    Sensitivity {
        variable: String,
        #[source]
        source: EvalError,
    },
    #[error("model value: {0}")]
    CentralValue(#[source] EvalError),
    #[error("input '{variable}' has invalid degrees of freedom {value}")]
    InvalidDegreesOfFreedom { variable: String, value: f64 },
    #[error("input '{variable}' has invalid standard uncertainty {value}")]
    InvalidUncertainty { variable: String, value: f64 },
    #[error("confidence level {0} must lie strictly between 0 and 1")]
    InvalidConfidence(f64),
    #[error("no coverage factor exists for {0} degrees of freedom")]
    CoverageFactor(f64),
}

/// An input quantity as seen by the propagation law
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub name: String,
    pub central_value: f64,
    pub standard_uncertainty: f64,
    /// `f64::INFINITY` for exactly known or Type B quantities
    pub degrees_of_freedom: f64,
}

impl Input {
    pub fn new(name: impl Into<String>, resolved: Resolved) -> Self {
        Self {
            name: name.into(),
            central_value: resolved.central_value,
            standard_uncertainty: resolved.standard_uncertainty,
            degrees_of_freedom: resolved.degrees_of_freedom,
        }
    }

    fn validate(&self) -> Result<(), PropagationError> {
        if !(self.standard_uncertainty.is_finite() && self.standard_uncertainty >= 0.0) {
            return Err(PropagationError::InvalidUncertainty {
                variable: self.name.clone(),
                value: self.standard_uncertainty,
            });
        }
        // NaN fails the comparison
        if !(self.degrees_of_freedom > 0.0) {
            return Err(PropagationError::InvalidDegreesOfFreedom {
                variable: self.name.clone(),
                value: self.degrees_of_freedom,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Contribution {
    pub variable: String,
    pub sensitivity_coefficient: f64,
    pub contribution_uncertainty: f64,
    /// Share of the combined variance, zero when the combined uncertainty vanishes
    pub contribution_rate_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculationResult {
    /// Model evaluated at the central values of the inputs
    pub central_value: f64,
    pub contributions: Vec<Contribution>,
    pub combined_standard_uncertainty: f64,
    /// `f64::INFINITY` when every contributing input has infinite degrees of freedom
    pub effective_degrees_of_freedom: f64,
    pub coverage_factor: f64,
    pub expanded_uncertainty: f64,
    pub confidence_level: f64,
}

/// Combine the standard uncertainties of `inputs` through `model`
///
/// `model` must depend on the inputs only; every input is a candidate contributor even when the
/// model does not mention it, in which case its sensitivity is zero.
///
/// # Errors
/// Fails when an input carries an invalid uncertainty or degrees of freedom, when the model or
/// one of its partial derivatives cannot be evaluated at the central values, and when the
/// confidence level is not strictly between 0 and 1.
pub fn combine(
    model: &Expr,
    inputs: &[Input],
    confidence_level: f64,
) -> Result<CalculationResult, PropagationError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(PropagationError::InvalidConfidence(confidence_level));
    }
    for input in inputs {
        input.validate()?;
    }

    let bindings: Bindings = inputs
        .iter()
        .map(|input| (input.name.clone(), input.central_value))
        .collect();
    let central_value = model
        .evaluate(&bindings)
        .map_err(PropagationError::CentralValue)?;

    let sensitivities = inputs
        .iter()
        .map(|input| {
            model
                .differentiate(&input.name)
                .evaluate(&bindings)
                .map_err(|source| PropagationError::Sensitivity {
                    variable: input.name.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let uncertainties = inputs
        .iter()
        .zip(&sensitivities)
        .map(|(input, c)| c.abs() * input.standard_uncertainty)
        .collect::<Vec<_>>();
    let combined_standard_uncertainty = uncertainties.iter().map(|u| u.powi(2)).sum::<f64>().sqrt();

    let contributions = inputs
        .iter()
        .zip(sensitivities)
        .zip(&uncertainties)
        .map(|((input, sensitivity_coefficient), &contribution_uncertainty)| Contribution {
            variable: input.name.clone(),
            sensitivity_coefficient,
            contribution_uncertainty,
            contribution_rate_percent: if combined_standard_uncertainty > 0.0 {
                (contribution_uncertainty / combined_standard_uncertainty).powi(2) * 100.0
            } else {
                0.0
            },
        })
        .collect();

    let effective_degrees_of_freedom = welch_satterthwaite(
        combined_standard_uncertainty,
        inputs
            .iter()
            .zip(&uncertainties)
            .map(|(input, &u)| (u, input.degrees_of_freedom)),
    );
    let coverage_factor = coverage_factor(confidence_level, effective_degrees_of_freedom)?;

    Ok(CalculationResult {
        central_value,
        contributions,
        combined_standard_uncertainty,
        effective_degrees_of_freedom,
        coverage_factor,
        expanded_uncertainty: coverage_factor * combined_standard_uncertainty,
        confidence_level,
    })
}

/// Effective degrees of freedom of a combined uncertainty
///
/// `contributions` are `(u_i, nu_i)` pairs. Terms with infinite degrees of freedom or a zero
/// contribution add nothing to the denominator; when nothing is left, or `combined` is zero,
/// the result is infinite.
pub fn welch_satterthwaite(
    combined: f64,
    contributions: impl IntoIterator<Item = (f64, f64)>,
) -> f64 {
    if combined <= 0.0 {
        return f64::INFINITY;
    }

    let denominator = contributions
        .into_iter()
        .filter(|&(u, dof)| dof.is_finite() && u != 0.0)
        .map(|(u, dof)| u.powi(4) / dof)
        .sum::<f64>();

    if denominator > 0.0 {
        combined.powi(4) / denominator
    } else {
        f64::INFINITY
    }
}

/// Two-sided Student-t quantile for `confidence_level` at `degrees_of_freedom`
///
/// Falls back to the normal quantile for infinite (or practically infinite) degrees of freedom.
///
/// # Errors
/// Fails for a confidence level outside `(0, 1)` and for non-positive degrees of freedom.
pub fn coverage_factor(
    confidence_level: f64,
    degrees_of_freedom: f64,
) -> Result<f64, PropagationError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(PropagationError::InvalidConfidence(confidence_level));
    }
    let p = (1.0 + confidence_level) / 2.0;

    if degrees_of_freedom > NORMAL_LIMIT {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|_| PropagationError::CoverageFactor(degrees_of_freedom))?;
        return Ok(normal.inverse_cdf(p));
    }

    let t = StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map_err(|_| PropagationError::CoverageFactor(degrees_of_freedom))?;
    Ok(t.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{combine, coverage_factor, welch_satterthwaite, Input, PropagationError};
    use crate::expression::{parse, EvalError};

    fn input(name: &str, central_value: f64, standard_uncertainty: f64, dof: f64) -> Input {
        Input {
            name: name.to_owned(),
            central_value,
            standard_uncertainty,
            degrees_of_freedom: dof,
        }
    }

    #[test]
    fn coverage_factor_matches_tables() {
        approx::assert_relative_eq!(
            coverage_factor(0.95, f64::INFINITY).unwrap(),
            1.959_96,
            epsilon = 1e-5
        );
        approx::assert_relative_eq!(coverage_factor(0.95, 2.0).unwrap(), 4.3027, epsilon = 1e-4);
        approx::assert_relative_eq!(coverage_factor(0.95, 10.0).unwrap(), 2.2281, epsilon = 1e-4);
        approx::assert_relative_eq!(coverage_factor(0.99, 5.0).unwrap(), 4.0321, epsilon = 1e-4);
        approx::assert_relative_eq!(
            coverage_factor(0.95, 1e8).unwrap(),
            coverage_factor(0.95, f64::INFINITY).unwrap()
        );
    }

    #[test]
    fn coverage_factor_rejects_bad_arguments() {
        assert_eq!(
            coverage_factor(1.0, 5.0),
            Err(PropagationError::InvalidConfidence(1.0))
        );
        assert_eq!(
            coverage_factor(0.95, 0.0),
            Err(PropagationError::CoverageFactor(0.0))
        );
    }

    #[test]
    fn welch_satterthwaite_ignores_infinite_terms() {
        let combined = 5f64.sqrt();
        let dof = welch_satterthwaite(combined, [(1.0, 5.0), (2.0, f64::INFINITY)]);
        approx::assert_relative_eq!(dof, 125.0, epsilon = 1e-9);
        assert!(dof > 5.0 && dof.is_finite());

        assert!(welch_satterthwaite(2.0, [(2.0, f64::INFINITY)]).is_infinite());
        assert!(welch_satterthwaite(0.0, [(0.0, 3.0)]).is_infinite());
    }

    #[test]
    fn welch_satterthwaite_approaches_the_dominant_dof() {
        let mut previous = f64::INFINITY;
        for u2 in [2.0, 1.0, 0.1, 0.01, 0.0] {
            let combined = (1.0f64 + u2 * u2).sqrt();
            let dof = welch_satterthwaite(combined, [(1.0, 5.0), (u2, f64::INFINITY)]);
            assert!(dof <= previous);
            previous = dof;
        }
        approx::assert_relative_eq!(previous, 5.0);
    }

    #[test]
    fn combine_two_independent_inputs() {
        let model = parse("a + b").unwrap();
        let result = combine(
            &model,
            &[input("a", 1.0, 1.0, 5.0), input("b", 2.0, 2.0, f64::INFINITY)],
            0.95,
        )
        .unwrap();

        approx::assert_relative_eq!(result.central_value, 3.0);
        approx::assert_relative_eq!(result.combined_standard_uncertainty, 5f64.sqrt());
        approx::assert_relative_eq!(result.effective_degrees_of_freedom, 125.0, epsilon = 1e-9);
        approx::assert_relative_eq!(
            result.expanded_uncertainty,
            result.coverage_factor * 5f64.sqrt()
        );
    }

    #[test]
    fn product_sensitivity_and_rates() {
        // a Type B rectangular with half-width 1, x fixed at 2
        let model = parse("a * x").unwrap();
        let result = combine(
            &model,
            &[
                input("a", 3.0, 1.0 / 3f64.sqrt(), f64::INFINITY),
                input("x", 2.0, 0.0, f64::INFINITY),
            ],
            0.95,
        )
        .unwrap();

        assert_eq!(result.contributions[0].sensitivity_coefficient, 2.0);
        approx::assert_relative_eq!(result.contributions[1].sensitivity_coefficient, 3.0);
        let total = result
            .contributions
            .iter()
            .map(|c| c.contribution_rate_percent)
            .sum::<f64>();
        approx::assert_relative_eq!(total, 100.0, epsilon = 1e-9);
        assert!(result.effective_degrees_of_freedom.is_infinite());
        approx::assert_relative_eq!(result.coverage_factor, 1.959_96, epsilon = 1e-5);
    }

    #[test]
    fn zero_combined_uncertainty_reports_zero_rates() {
        let model = parse("2 * x").unwrap();
        let result = combine(&model, &[input("x", 1.0, 0.0, f64::INFINITY)], 0.95).unwrap();
        approx::assert_abs_diff_eq!(result.combined_standard_uncertainty, 0.0);
        approx::assert_abs_diff_eq!(result.contributions[0].contribution_rate_percent, 0.0);
        approx::assert_abs_diff_eq!(result.expanded_uncertainty, 0.0);
    }

    #[test]
    fn evaluation_failures_name_the_input() {
        let model = parse("a / x").unwrap();
        let error = combine(
            &model,
            &[input("a", 1.0, 0.1, 4.0), input("x", 0.0, 0.1, 4.0)],
            0.95,
        )
        .unwrap_err();
        assert!(matches!(
            error,
            PropagationError::CentralValue(EvalError::Domain { .. })
        ));

        let model = parse("a * y").unwrap();
        let error = combine(&model, &[input("a", 1.0, 0.1, 4.0)], 0.95).unwrap_err();
        assert!(matches!(error, PropagationError::CentralValue(EvalError::UnboundVariable { .. })));
    }

    #[test]
    fn non_differentiable_points_fail_for_that_input() {
        // d/dx sqrt(x) at 0 divides by zero
        let model = parse("sqrt(x) + a").unwrap();
        let error = combine(
            &model,
            &[input("a", 1.0, 0.1, 4.0), input("x", 0.0, 0.1, 4.0)],
            0.95,
        )
        .unwrap_err();
        match error {
            PropagationError::Sensitivity { variable, .. } => assert_eq!(variable, "x"),
            other => panic!("expected a sensitivity failure, got {other:?}"),
        }
    }

    #[test]
    fn inputs_are_validated() {
        let model = parse("a").unwrap();
        assert!(matches!(
            combine(&model, &[input("a", 1.0, 0.1, 0.0)], 0.95),
            Err(PropagationError::InvalidDegreesOfFreedom { .. })
        ));
        assert!(matches!(
            combine(&model, &[input("a", 1.0, -0.1, 3.0)], 0.95),
            Err(PropagationError::InvalidUncertainty { .. })
        ));
        assert!(matches!(
            combine(&model, &[input("a", 1.0, 0.1, 3.0)], 0.0),
            Err(PropagationError::InvalidConfidence(_))
        ));
    }

    proptest! {
        #[test]
        fn rates_always_sum_to_one_hundred(
            a in 0.1..10.0f64,
            b in 0.1..10.0f64,
            ua in 0.01..1.0f64,
            ub in 0.01..1.0f64,
            na in 1.0..50.0f64,
        ) {
            let model = parse("a^2 / b + ln(b)").unwrap();
            let result = combine(
                &model,
                &[input("a", a, ua, na), input("b", b, ub, f64::INFINITY)],
                0.95,
            )
            .unwrap();
            let total = result
                .contributions
                .iter()
                .map(|c| c.contribution_rate_percent)
                .sum::<f64>();
            approx::assert_relative_eq!(total, 100.0, epsilon = 1e-9);
            prop_assert!(result.effective_degrees_of_freedom >= na * (1.0 - 1e-9));
        }
    }
}
