//! A calibration project: model, input quantities, calibration points and regression models
//!
//! A project is read from TOML:
//!
//! ```toml
//! equation = "y = a * x"
//! calibration_points = ["10", "20"]
//!
//! [document]
//! number = "CAL-001"
//! name = "Gauge block"
//!
//! [[variables]]
//! name = "a"
//! type = "type_b"
//! distribution = "rectangular"
//! values."10" = { central_value = 3.0, half_width = 1.0 }
//! ```
//!
//! Derived values are never stored in the file; every calculation resolves its inputs from the
//! current raw values.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::distributions::Distribution;
use crate::expression::{Engine, Expr};
use crate::model::ModelEquation;
use crate::monte_carlo::{self, MonteCarloSummary, SampledInput};
use crate::propagation::{combine, CalculationResult, Input};
use crate::regression::RegressionModel;
use crate::report::{Budget, BudgetParts, Derivative, RegressionSummary};
use crate::uncertainty::{Resolved, UncertaintyType, Variable};
use crate::units::{self, UnitReport};
use crate::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Revision {
    pub version: String,
    pub description: String,
    pub author: String,
    pub checker: String,
    pub approver: String,
    pub date: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentInfo {
    pub number: String,
    pub name: String,
    pub version: String,
    pub revisions: Vec<Revision>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub equation: String,
    /// Input quantities in display order
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub calibration_points: Vec<String>,
    #[serde(default)]
    pub regressions: BTreeMap<String, RegressionModel>,
    /// Units of the result variables
    #[serde(default)]
    pub result_units: BTreeMap<String, String>,
    #[serde(default)]
    pub document: DocumentInfo,
}

/// Outcome of one result variable at one calibration point
#[derive(Debug)]
pub struct PairOutcome {
    pub result: String,
    pub point: String,
    pub budget: Result<Budget>,
}

impl Project {
    /// Parse a project document
    ///
    /// # Errors
    /// Fails for malformed TOML, duplicate variable or calibration point names and a model that
    /// does not parse.
    pub fn from_toml(text: &str) -> Result<Self> {
        let project: Self = toml::from_str(text)?;
        if let Some(name) = project.variables.iter().map(|v| &v.name).duplicates().next() {
            return Err(Error::Config(format!("variable '{name}' is defined more than once")));
        }
        if let Some(point) = project.calibration_points.iter().duplicates().next() {
            return Err(Error::Config(format!(
                "calibration point '{point}' is listed more than once"
            )));
        }
        project.model()?;
        log::info!(
            "loaded project '{}' with {} variables and {} calibration points",
            project.document.name,
            project.variables.len(),
            project.calibration_points.len()
        );
        Ok(project)
    }

    /// Read a project from a TOML file
    ///
    /// # Errors
    /// See [`Project::from_toml`]; also fails when the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("reading project from {path:?}");
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// # Errors
    /// Returns [`Error::Model`] when the equation text is not a valid model.
    pub fn model(&self) -> Result<ModelEquation> {
        Ok(ModelEquation::parse(&Engine::default(), &self.equation)?)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Fit every regression model to its current data
    ///
    /// Models that cannot be fitted are left unfitted and reported; the rest are still fitted.
    pub fn fit_regressions(&mut self) -> Vec<Error> {
        let mut failures = Vec::new();
        for (name, model) in &mut self.regressions {
            match model.fit() {
                Ok(line) => log::debug!(
                    "fitted '{name}': slope {} intercept {} r2 {}",
                    line.slope,
                    line.intercept,
                    line.r_squared
                ),
                Err(source) => {
                    log::warn!("regression model '{name}' cannot be fitted: {source}");
                    failures.push(Error::Regression {
                        name: name.clone(),
                        source,
                    });
                }
            }
        }
        failures
    }

    /// Resolve every variable at every calibration point and store the results on the variables
    ///
    /// A failed resolution clears the stored value for that point and is reported.
    pub fn refresh_variables(&mut self) -> Vec<Error> {
        let mut failures = Vec::new();
        for variable in &mut self.variables {
            for point in &self.calibration_points {
                let outcome = variable.resolve(point, &self.regressions);
                variable.store(point, outcome.as_ref().ok().copied());
                if let Err(source) = outcome {
                    failures.push(Error::Resolve {
                        variable: variable.name.clone(),
                        point: point.clone(),
                        source,
                    });
                }
            }
        }
        failures
    }

    fn check_point(&self, point: &str) -> Result<()> {
        if self.calibration_points.iter().any(|p| p == point) {
            Ok(())
        } else {
            Err(Error::UnknownPoint(point.to_owned()))
        }
    }

    /// Model of `result` in terms of inputs, with each input variable resolved at `point`
    fn prepare(&self, result: &str, point: &str) -> Result<(Expr, Vec<(&Variable, Resolved)>)> {
        self.check_point(point)?;
        let expression = self.model()?.expression_for(result)?;
        let inputs = expression
            .variables()
            .into_iter()
            .map(|name| {
                let variable = self
                    .variable(&name)
                    .ok_or_else(|| Error::UnknownVariable(name.clone()))?;
                let resolved = variable
                    .resolve(point, &self.regressions)
                    .map_err(|source| Error::Resolve {
                        variable: name,
                        point: point.to_owned(),
                        source,
                    })?;
                Ok::<_, Error>((variable, resolved))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((expression, inputs))
    }

    /// Combined and expanded uncertainty of `result` at `point`
    ///
    /// Only the inputs `result` depends on take part.
    ///
    /// # Errors
    /// Fails for an unknown point or result, a variable missing from the project, an input that
    /// cannot be resolved and a model that cannot be evaluated at the central values.
    pub fn calculate(
        &self,
        result: &str,
        point: &str,
        confidence_level: f64,
    ) -> Result<CalculationResult> {
        let (expression, inputs) = self.prepare(result, point)?;
        Ok(combine(&expression, &to_inputs(&inputs), confidence_level)?)
    }

    /// Partial derivatives of `result` with respect to each of its inputs
    ///
    /// # Errors
    /// Fails when the model does not parse or does not define `result`.
    pub fn derivatives(&self, result: &str) -> Result<Vec<Derivative>> {
        let expression = self.model()?.expression_for(result)?;
        Ok(expression
            .variables()
            .into_iter()
            .map(|name| {
                let derivative = expression.differentiate(&name);
                Derivative::new(name, &derivative)
            })
            .collect())
    }

    /// Full uncertainty budget of `result` at `point`
    ///
    /// # Errors
    /// See [`Project::calculate`].
    pub fn budget(&self, result: &str, point: &str, settings: &Settings) -> Result<Budget> {
        let (expression, inputs) = self.prepare(result, point)?;
        let calculation = combine(&expression, &to_inputs(&inputs), settings.confidence_level)?;
        log::debug!(
            "{result} at {point}: {} ± {} (k = {})",
            calculation.central_value,
            calculation.combined_standard_uncertainty,
            calculation.coverage_factor
        );

        let derivatives = inputs
            .iter()
            .map(|(variable, _)| {
                Derivative::new(&variable.name, &expression.differentiate(&variable.name))
            })
            .collect();
        let regressions = inputs
            .iter()
            .filter(|(variable, _)| variable.kind == UncertaintyType::Regression)
            .filter_map(|(variable, _)| variable.values.get(point)?.regression.as_deref())
            .unique()
            .filter_map(|name| RegressionSummary::new(name, self.regressions.get(name)?))
            .collect();

        Ok(Budget::assemble(
            BudgetParts {
                result,
                point,
                unit: self.result_units.get(result).map_or("", String::as_str),
                inputs,
                calculation,
                derivatives,
                regressions,
            },
            &settings.rounding,
        ))
    }

    /// Budgets for every result at every calibration point
    ///
    /// A failing pair is reported in its [`PairOutcome`] and does not stop the others.
    ///
    /// # Errors
    /// Fails only when the model itself does not parse.
    pub fn calculate_all(&self, settings: &Settings) -> Result<Vec<PairOutcome>> {
        let model = self.model()?;
        let mut outcomes = Vec::new();
        for (result, point) in model.results().cartesian_product(&self.calibration_points) {
            let budget = self.budget(result, point, settings);
            if let Err(e) = &budget {
                log::warn!("{result} at {point}: {e}");
            }
            outcomes.push(PairOutcome {
                result: result.to_owned(),
                point: point.clone(),
                budget,
            });
        }
        Ok(outcomes)
    }

    /// Monte Carlo cross-check of `result` at `point`
    ///
    /// Type B inputs are drawn from their assumed distribution, Type A and regression inputs
    /// from a normal distribution and fixed inputs are held constant.
    ///
    /// # Errors
    /// See [`Project::calculate`] and [`monte_carlo::simulate`].
    pub fn monte_carlo(
        &self,
        result: &str,
        point: &str,
        settings: &Settings,
    ) -> Result<MonteCarloSummary> {
        let (expression, inputs) = self.prepare(result, point)?;
        let sampled = inputs
            .iter()
            .map(|(variable, resolved)| SampledInput {
                name: variable.name.clone(),
                distribution: match variable.kind {
                    UncertaintyType::TypeB => variable.distribution,
                    _ => Distribution::Normal,
                },
                central_value: resolved.central_value,
                standard_uncertainty: resolved.standard_uncertainty,
            })
            .collect::<Vec<_>>();
        Ok(monte_carlo::simulate(
            &expression,
            &sampled,
            &settings.monte_carlo,
            settings.confidence_level,
        )?)
    }

    /// Compare the declared units of results and inputs with every model equation
    ///
    /// # Errors
    /// Fails only when the model itself does not parse.
    pub fn check_units(&self) -> Result<UnitReport> {
        let model = self.model()?;
        let declared = model
            .results()
            .map(|result| {
                let unit = self.result_units.get(result).map_or("", String::as_str);
                (result, unit)
            })
            .chain(self.variables.iter().map(|v| (v.name.as_str(), v.unit.as_str())))
            .collect::<Vec<_>>();
        let report = units::check_units(&model, &declared);
        log::info!(
            "unit check: {} ok, {} warnings, {} errors",
            report.count(units::Status::Ok),
            report.count(units::Status::Warn),
            report.count(units::Status::Error)
        );
        Ok(report)
    }

    /// Regression models no variable refers to
    pub fn unused_regressions(&self) -> Vec<&str> {
        let used: HashSet<&str> = self
            .variables
            .iter()
            .flat_map(|v| v.values.values())
            .filter_map(|values| values.regression.as_deref())
            .collect();
        self.regressions
            .keys()
            .map(String::as_str)
            .filter(|name| !used.contains(name))
            .collect()
    }
}

fn to_inputs(inputs: &[(&Variable, Resolved)]) -> Vec<Input> {
    inputs
        .iter()
        .map(|(variable, resolved)| Input::new(variable.name.clone(), *resolved))
        .collect()
}
