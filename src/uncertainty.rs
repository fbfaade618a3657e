//! Input quantities and the standard uncertainties assigned to them
//!
//! Every [`Variable`] names the source of its uncertainty with an [`UncertaintyType`] and keeps
//! the raw inputs for each calibration point in [`PointValues`]. Resolving a variable at a point
//! turns those inputs into a central value, a standard uncertainty and degrees of freedom.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::distributions::{normal_coverage_factor, Distribution};
use crate::math::SampleStatistics;
use crate::regression::{FitError, RegressionModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyType {
    /// Statistics of repeated observations
    TypeA,
    /// Half-width of an assumed distribution
    TypeB,
    /// Inverse estimate from a calibration curve
    Regression,
    /// Exactly known constant
    Fixed,
}

/// Where a regression variable takes the value it reads off the calibration curve
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum XSource {
    /// The calibration point's name, read as a number
    PointName,
    Fixed(f64),
}

/// Raw inputs of one variable at one calibration point
///
/// Only the fields relevant to the variable's [`UncertaintyType`] are consulted.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PointValues {
    /// Repeated observations of a Type A quantity
    pub samples: Vec<f64>,
    /// Central value of a Type B or fixed quantity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub central_value: Option<f64>,
    /// Manually assigned standard uncertainty of a single Type A observation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_uncertainty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub half_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divisor: Option<f64>,
    /// Coverage probability of the stated half-width of a normal distribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Overrides the degrees of freedom otherwise implied by the uncertainty type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_source: Option<XSource>,
    /// Standard uncertainty of the value read off the calibration curve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_uncertainty: Option<f64>,
    /// Number of observations averaged into the value read off the calibration curve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicates: Option<usize>,
}

/// Central value, standard uncertainty and degrees of freedom of an input
///
/// Infinite degrees of freedom are represented by `f64::INFINITY`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Resolved {
    pub central_value: f64,
    pub standard_uncertainty: f64,
    pub degrees_of_freedom: f64,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ResolveError {
    #[error("no observations were recorded")]
    InsufficientSamples,
    #[error("a single observation needs a manually assigned standard uncertainty")]
    SingleSample,
    #[error("'{field}' is required")]
    MissingField { field: &'static str },
    #[error("divisor {divisor} must be a positive number")]
    InvalidDivisor { divisor: f64 },
    #[error("{field} = {value} is out of range")]
    InvalidValue { field: &'static str, value: f64 },
    #[error("regression model '{name}' does not exist")]
    UnknownRegression { name: String },
    #[error("calibration point '{point}' cannot be read as a number")]
    PointNameNotNumeric { point: String },
    #[error("regression model '{model}': {source}")]
    Fit {
        model: String,
        #[source]
        source: FitError,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: UncertaintyType,
    /// Shape assumed for a Type B quantity
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    /// Inputs keyed by calibration point name
    #[serde(default)]
    pub values: BTreeMap<String, PointValues>,
    #[serde(skip)]
    resolved: BTreeMap<String, Resolved>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: UncertaintyType) -> Self {
        Self {
            name: name.into(),
            kind,
            distribution: Distribution::default(),
            unit: String::new(),
            description: String::new(),
            values: BTreeMap::new(),
            resolved: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    #[must_use]
    pub fn with_values(mut self, point: impl Into<String>, values: PointValues) -> Self {
        self.values.insert(point.into(), values);
        self
    }

    /// Result of the last [`Variable::store`] for `point`
    pub fn resolved(&self, point: &str) -> Option<&Resolved> {
        self.resolved.get(point)
    }

    /// Record the resolution for `point`, or forget it when resolution failed
    pub fn store(&mut self, point: &str, resolved: Option<Resolved>) {
        match resolved {
            Some(resolved) => self.resolved.insert(point.to_owned(), resolved),
            None => self.resolved.remove(point),
        };
    }

    /// Central value, standard uncertainty and degrees of freedom at `point`
    ///
    /// # Errors
    /// Returns a [`ResolveError`] describing the first missing or invalid input. Regression
    /// variables need their model fitted beforehand; fit failures are reported unchanged
    /// inside [`ResolveError::Fit`].
    pub fn resolve(
        &self,
        point: &str,
        regressions: &BTreeMap<String, RegressionModel>,
    ) -> Result<Resolved, ResolveError> {
        let default = PointValues::default();
        let values = self.values.get(point).unwrap_or(&default);

        let resolved = match self.kind {
            UncertaintyType::TypeA => type_a(values)?,
            UncertaintyType::TypeB => type_b(values, self.distribution)?,
            UncertaintyType::Regression => from_regression(values, point, regressions)?,
            UncertaintyType::Fixed => Resolved {
                central_value: finite(values.central_value, "central_value")?,
                standard_uncertainty: 0.0,
                degrees_of_freedom: f64::INFINITY,
            },
        };

        log::debug!(
            "{} at {point}: {} ± {} (dof {})",
            self.name,
            resolved.central_value,
            resolved.standard_uncertainty,
            resolved.degrees_of_freedom
        );
        Ok(resolved)
    }
}

fn finite(value: Option<f64>, field: &'static str) -> Result<f64, ResolveError> {
    let value = value.ok_or(ResolveError::MissingField { field })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ResolveError::InvalidValue { field, value })
    }
}

fn non_negative(value: Option<f64>, field: &'static str) -> Result<f64, ResolveError> {
    let value = finite(value, field)?;
    if value < 0.0 {
        return Err(ResolveError::InvalidValue { field, value });
    }
    Ok(value)
}

/// Explicit degrees of freedom must be positive, infinity included
fn degrees_of_freedom(values: &PointValues) -> Result<f64, ResolveError> {
    match values.degrees_of_freedom {
        None => Ok(f64::INFINITY),
        Some(dof) if dof > 0.0 => Ok(dof),
        Some(value) => Err(ResolveError::InvalidValue {
            field: "degrees_of_freedom",
            value,
        }),
    }
}

/// Mean of the observations with `s / sqrt(n)` and `n - 1` degrees of freedom
fn type_a(values: &PointValues) -> Result<Resolved, ResolveError> {
    if let Some(&value) = values.samples.iter().find(|x| !x.is_finite()) {
        return Err(ResolveError::InvalidValue {
            field: "samples",
            value,
        });
    }
    let statistics =
        SampleStatistics::from_values(&values.samples).ok_or(ResolveError::InsufficientSamples)?;

    match statistics.standard_error() {
        Some(standard_uncertainty) => {
            #[allow(clippy::cast_precision_loss)]
            let degrees_of_freedom = (statistics.count - 1) as f64;
            Ok(Resolved {
                central_value: statistics.mean,
                standard_uncertainty,
                degrees_of_freedom,
            })
        }
        None => {
            let standard_uncertainty = values
                .standard_uncertainty
                .ok_or(ResolveError::SingleSample)?;
            // One observation carries no information about its own spread
            if values.degrees_of_freedom.is_none() {
                log::warn!("a single observation needs explicit degrees of freedom");
                return Err(ResolveError::MissingField {
                    field: "degrees_of_freedom",
                });
            }
            Ok(Resolved {
                central_value: statistics.mean,
                standard_uncertainty: non_negative(
                    Some(standard_uncertainty),
                    "standard_uncertainty",
                )?,
                degrees_of_freedom: degrees_of_freedom(values)?,
            })
        }
    }
}

/// Half-width over the divisor of the assumed distribution
fn type_b(values: &PointValues, distribution: Distribution) -> Result<Resolved, ResolveError> {
    let central_value = finite(values.central_value, "central_value")?;
    let half_width = non_negative(values.half_width, "half_width")?;

    let divisor = match (values.divisor, distribution.default_divisor(), values.confidence) {
        (Some(divisor), _, _) => divisor,
        (None, Some(divisor), _) => divisor,
        (None, None, Some(confidence)) => {
            normal_coverage_factor(confidence).ok_or(ResolveError::InvalidValue {
                field: "confidence",
                value: confidence,
            })?
        }
        (None, None, None) => return Err(ResolveError::MissingField { field: "divisor" }),
    };
    if !(divisor > 0.0 && divisor.is_finite()) {
        return Err(ResolveError::InvalidDivisor { divisor });
    }

    Ok(Resolved {
        central_value,
        standard_uncertainty: half_width / divisor,
        degrees_of_freedom: degrees_of_freedom(values)?,
    })
}

fn from_regression(
    values: &PointValues,
    point: &str,
    regressions: &BTreeMap<String, RegressionModel>,
) -> Result<Resolved, ResolveError> {
    let name = values
        .regression
        .as_deref()
        .ok_or(ResolveError::MissingField { field: "regression" })?;
    let model = regressions
        .get(name)
        .ok_or_else(|| ResolveError::UnknownRegression {
            name: name.to_owned(),
        })?;

    let observed = match values.x_source {
        None => return Err(ResolveError::MissingField { field: "x_source" }),
        Some(XSource::Fixed(value)) => finite(Some(value), "x_source")?,
        Some(XSource::PointName) => point
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ResolveError::PointNameNotNumeric {
                point: point.to_owned(),
            })?,
    };
    let input_uncertainty = match values.input_uncertainty {
        None => 0.0,
        uncertainty => non_negative(uncertainty, "input_uncertainty")?,
    };

    let estimate = model
        .estimate(observed, input_uncertainty, values.replicates.unwrap_or(1))
        .map_err(|source| ResolveError::Fit {
            model: name.to_owned(),
            source,
        })?;

    Ok(Resolved {
        central_value: estimate.value,
        standard_uncertainty: estimate.standard_uncertainty,
        degrees_of_freedom: estimate.degrees_of_freedom,
    })
}
