//! Uncertainty budgets ready for display or serialisation

use std::fmt;

use serde::Serialize;

use crate::config::RoundingSettings;
use crate::distributions::Distribution;
use crate::expression::Expr;
use crate::propagation::CalculationResult;
use crate::regression::{Mode, RegressionModel};
use crate::rounding::round_uncertainty;
use crate::uncertainty::{Resolved, UncertaintyType, Variable};

/// One input quantity of a budget
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BudgetRow {
    pub variable: String,
    pub uncertainty_type: UncertaintyType,
    /// Only reported for Type B quantities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    pub unit: String,
    pub central_value: f64,
    pub standard_uncertainty: f64,
    pub degrees_of_freedom: f64,
    pub sensitivity_coefficient: f64,
    pub contribution_uncertainty: f64,
    pub contribution_rate_percent: f64,
}

/// A partial derivative of the model in readable form
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Derivative {
    pub variable: String,
    pub expression: String,
}

impl Derivative {
    pub fn new(variable: impl Into<String>, derivative: &Expr) -> Self {
        Self {
            variable: variable.into(),
            expression: derivative.render(),
        }
    }
}

/// Fit statistics of a regression model used by a budget
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegressionSummary {
    pub name: String,
    pub description: String,
    pub mode: Mode,
    pub use_weights: bool,
    pub count: usize,
    pub slope: f64,
    pub slope_uncertainty: f64,
    pub intercept: f64,
    pub intercept_uncertainty: f64,
    pub residual_variance: f64,
    pub r_squared: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

impl RegressionSummary {
    /// Summary of the current fit, `None` if the model has not been fitted
    pub fn new(name: impl Into<String>, model: &RegressionModel) -> Option<Self> {
        let line = model.fitted()?;
        Some(Self {
            name: name.into(),
            description: model.description().to_owned(),
            mode: model.mode(),
            use_weights: model.use_weights(),
            count: line.count,
            slope: line.slope,
            slope_uncertainty: line.slope_uncertainty,
            intercept: line.intercept,
            intercept_uncertainty: line.intercept_uncertainty,
            residual_variance: line.residual_variance,
            r_squared: line.r_squared,
            f_statistic: line.significance.map(|s| s.f_statistic),
            p_value: line.significance.map(|s| s.p_value),
        })
    }
}

/// Everything needed to report one result at one calibration point
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Budget {
    pub result: String,
    pub point: String,
    pub unit: String,
    pub rows: Vec<BudgetRow>,
    pub central_value: f64,
    pub combined_standard_uncertainty: f64,
    pub effective_degrees_of_freedom: f64,
    pub coverage_factor: f64,
    pub expanded_uncertainty: f64,
    /// Expanded uncertainty cut to the configured significant digits
    pub rounded_expanded_uncertainty: f64,
    pub confidence_level: f64,
    pub derivatives: Vec<Derivative>,
    pub regressions: Vec<RegressionSummary>,
}

/// Sources a budget is assembled from
///
/// `inputs` must be in the order of `calculation.contributions`.
pub struct BudgetParts<'a> {
    pub result: &'a str,
    pub point: &'a str,
    pub unit: &'a str,
    pub inputs: Vec<(&'a Variable, Resolved)>,
    pub calculation: CalculationResult,
    pub derivatives: Vec<Derivative>,
    pub regressions: Vec<RegressionSummary>,
}

impl Budget {
    pub fn assemble(parts: BudgetParts<'_>, rounding: &RoundingSettings) -> Self {
        let BudgetParts {
            result,
            point,
            unit,
            inputs,
            calculation,
            derivatives,
            regressions,
        } = parts;

        let rows = inputs
            .into_iter()
            .zip(calculation.contributions)
            .map(|((variable, resolved), contribution)| BudgetRow {
                variable: contribution.variable,
                uncertainty_type: variable.kind,
                distribution: (variable.kind == UncertaintyType::TypeB)
                    .then_some(variable.distribution),
                unit: variable.unit.clone(),
                central_value: resolved.central_value,
                standard_uncertainty: resolved.standard_uncertainty,
                degrees_of_freedom: resolved.degrees_of_freedom,
                sensitivity_coefficient: contribution.sensitivity_coefficient,
                contribution_uncertainty: contribution.contribution_uncertainty,
                contribution_rate_percent: contribution.contribution_rate_percent,
            })
            .collect();

        Self {
            result: result.to_owned(),
            point: point.to_owned(),
            unit: unit.to_owned(),
            rows,
            central_value: calculation.central_value,
            combined_standard_uncertainty: calculation.combined_standard_uncertainty,
            effective_degrees_of_freedom: calculation.effective_degrees_of_freedom,
            coverage_factor: calculation.coverage_factor,
            expanded_uncertainty: calculation.expanded_uncertainty,
            rounded_expanded_uncertainty: round_uncertainty(
                calculation.expanded_uncertainty,
                rounding.significant_digits,
                rounding.mode,
            ),
            confidence_level: calculation.confidence_level,
            derivatives,
            regressions,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} at {}", self.result, self.point)?;
        writeln!(
            f,
            "{:<12} {:<11} {:>14} {:>12} {:>8} {:>12} {:>12} {:>8}",
            "variable", "type", "value", "u", "dof", "c", "u_i", "rate %"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<12} {:<11} {:>14.6e} {:>12.4e} {:>8.1} {:>12.4e} {:>12.4e} {:>8.2}",
                row.variable,
                format!("{:?}", row.uncertainty_type),
                row.central_value,
                row.standard_uncertainty,
                row.degrees_of_freedom,
                row.sensitivity_coefficient,
                row.contribution_uncertainty,
                row.contribution_rate_percent
            )?;
        }
        writeln!(
            f,
            "y = {:e} {}, uc = {:e}, dof = {:.1}, k = {:.4}",
            self.central_value,
            self.unit,
            self.combined_standard_uncertainty,
            self.effective_degrees_of_freedom,
            self.coverage_factor
        )?;
        write!(
            f,
            "U({:.0} %) = {} {}",
            self.confidence_level * 100.0,
            self.rounded_expanded_uncertainty,
            self.unit
        )
    }
}
