//! Straight-line calibration curves
//!
//! A [`RegressionModel`] fits `response = intercept + slope * predictor` by (optionally
//! weighted) least squares. In [`Mode::Direct`] the predictor is `x` and the response `y`; in
//! [`Mode::Inverted`] the columns swap roles. Either way the model is used backwards: an
//! observed response is converted into the predictor value that would have produced it.

mod import;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use thiserror::Error;

pub use import::{read_csv, read_csv_file, CsvImport, RowParseError};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FitError {
    #[error("at least 2 data points are required, found {found}")]
    InsufficientData { found: usize },
    #[error("every predictor value is identical, the slope is undetermined")]
    DegenerateDesign,
    #[error("data point {index} contains a value that is not finite")]
    NonFiniteData { index: usize },
    #[error("the model has not been fitted to its current data")]
    ModelNotFit,
    #[error("the fitted slope is zero, the line cannot be inverted")]
    ZeroSlope,
    #[error("the number of replicate observations must be at least 1")]
    InvalidReplicates,
}

/// One calibration observation
///
/// `ux` and `uy` are standard uncertainties; `None` means unspecified.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ux: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uy: Option<f64>,
}

impl DataPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ux: None,
            uy: None,
        }
    }

    #[must_use]
    pub const fn with_uncertainties(mut self, ux: Option<f64>, uy: Option<f64>) -> Self {
        self.ux = ux;
        self.uy = uy;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// `y = intercept + slope * x`, estimates `x` from an observed `y`
    #[default]
    Direct,
    /// `x = intercept + slope * y`, estimates `y` from an observed `x`
    Inverted,
}

impl Mode {
    /// (predictor, response, response uncertainty) of a point
    const fn orient(self, point: &DataPoint) -> (f64, f64, Option<f64>) {
        match self {
            Self::Direct => (point.x, point.y, point.uy),
            Self::Inverted => (point.y, point.x, point.ux),
        }
    }
}

/// F test of the slope against a horizontal line
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Significance {
    pub f_statistic: f64,
    /// Upper tail probability of `f_statistic` under F(1, n - 2)
    pub p_value: f64,
}

/// Parameters of a fitted line together with the design summary needed to invert it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FittedLine {
    pub slope: f64,
    pub intercept: f64,
    pub slope_uncertainty: f64,
    pub intercept_uncertainty: f64,
    /// Weighted sum of squared residuals over `n - 2`, zero for two points
    pub residual_variance: f64,
    pub residual_degrees_of_freedom: usize,
    pub r_squared: f64,
    /// Absent when there are no residual degrees of freedom
    pub significance: Option<Significance>,
    pub count: usize,
    pub weight_sum: f64,
    pub predictor_mean: f64,
    pub response_mean: f64,
    /// Weighted sum of squared predictor deviations
    pub sxx: f64,
}

/// A value read off a fitted line with its standard uncertainty
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Estimate {
    pub value: f64,
    pub standard_uncertainty: f64,
    /// `f64::INFINITY` when no finite-dof term contributes
    pub degrees_of_freedom: f64,
}

/// Weight of a point: `1 / u^2`, or 1 when the uncertainty is unspecified or not positive
fn weight(uncertainty: Option<f64>) -> f64 {
    match uncertainty {
        Some(u) if u > 0.0 => u.powi(-2),
        _ => 1.0,
    }
}

/// Least squares fit of a straight line to `points`
///
/// # Errors
/// Fails with [`FitError::InsufficientData`] for fewer than two points,
/// [`FitError::NonFiniteData`] when a coordinate is NaN or infinite and
/// [`FitError::DegenerateDesign`] when every predictor value is the same.
pub fn fit(points: &[DataPoint], mode: Mode, use_weights: bool) -> Result<FittedLine, FitError> {
    let n = points.len();
    if n < 2 {
        return Err(FitError::InsufficientData { found: n });
    }
    if let Some(index) = points
        .iter()
        .position(|point| !(point.x.is_finite() && point.y.is_finite()))
    {
        return Err(FitError::NonFiniteData { index });
    }

    let oriented = points.iter().map(|point| mode.orient(point));
    let x = oriented.clone().map(|(x, _, _)| x).collect::<Array1<f64>>();
    let y = oriented.clone().map(|(_, y, _)| y).collect::<Array1<f64>>();
    let w = if use_weights {
        oriented.map(|(_, _, u)| weight(u)).collect::<Array1<f64>>()
    } else {
        Array1::ones(n)
    };

    let weight_sum = w.sum();
    let predictor_mean = (&w * &x).sum() / weight_sum;
    let response_mean = (&w * &y).sum() / weight_sum;
    let dx = &x - predictor_mean;
    let dy = &y - response_mean;

    let sxx = (&w * &dx * &dx).sum();
    if !(sxx > 0.0 && sxx.is_finite()) {
        return Err(FitError::DegenerateDesign);
    }
    let sxy = (&w * &dx * &dy).sum();
    let syy = (&w * &dy * &dy).sum();

    let slope = sxy / sxx;
    let intercept = slope.mul_add(-predictor_mean, response_mean);
    let residuals = &y - &x.mapv(|xi| slope.mul_add(xi, intercept));
    let sum_of_squares = (&w * &residuals * &residuals).sum();

    let residual_degrees_of_freedom = n - 2;
    #[allow(clippy::cast_precision_loss)]
    let residual_variance = if residual_degrees_of_freedom > 0 {
        sum_of_squares / residual_degrees_of_freedom as f64
    } else {
        0.0
    };

    let slope_uncertainty = (residual_variance / sxx).sqrt();
    let intercept_uncertainty =
        (residual_variance * (predictor_mean.powi(2) / sxx + weight_sum.recip())).sqrt();
    // No spread in the response leaves nothing for the line to explain
    let r_squared = if syy > 0.0 {
        1.0 - sum_of_squares / syy
    } else {
        0.0
    };

    let significance = if residual_degrees_of_freedom > 0 {
        significance(slope, sxx, residual_variance, residual_degrees_of_freedom)
    } else {
        None
    };

    log::debug!("fitted {n} points: slope {slope}, intercept {intercept}, s2 {residual_variance}");

    Ok(FittedLine {
        slope,
        intercept,
        slope_uncertainty,
        intercept_uncertainty,
        residual_variance,
        residual_degrees_of_freedom,
        r_squared,
        significance,
        count: n,
        weight_sum,
        predictor_mean,
        response_mean,
        sxx,
    })
}

#[allow(clippy::cast_precision_loss)]
fn significance(
    slope: f64,
    sxx: f64,
    residual_variance: f64,
    residual_degrees_of_freedom: usize,
) -> Option<Significance> {
    let regression_sum_of_squares = slope.powi(2) * sxx;
    if residual_variance == 0.0 {
        return Some(Significance {
            f_statistic: f64::INFINITY,
            p_value: 0.0,
        });
    }

    let f_statistic = regression_sum_of_squares / residual_variance;
    let distribution = FisherSnedecor::new(1.0, residual_degrees_of_freedom as f64).ok()?;
    Some(Significance {
        f_statistic,
        p_value: distribution.sf(f_statistic),
    })
}

impl FittedLine {
    /// Predictor value whose fitted response is `observed`
    ///
    /// `observed_uncertainty` is the standard uncertainty of the observed response and
    /// `replicates` the number of observations it is the mean of. The uncertainty combines the
    /// scatter about the line, the position of `observed` relative to the calibration data and
    /// the uncertainty of `observed` itself:
    ///
    /// $$
    ///     u^2 = \frac{s^2}{b^2}\left(\frac{1}{m} + \frac{1}{W}
    ///         + \frac{(y_0 - \bar{y})^2}{b^2 S_{xx}}\right) + \frac{u(y_0)^2}{b^2}
    /// $$
    ///
    /// The degrees of freedom follow from Welch-Satterthwaite with `n - 2` for the fit term.
    ///
    /// # Errors
    /// Fails with [`FitError::ZeroSlope`] for a horizontal line and
    /// [`FitError::InvalidReplicates`] when `replicates` is zero.
    pub fn inverse(
        &self,
        observed: f64,
        observed_uncertainty: f64,
        replicates: usize,
    ) -> Result<Estimate, FitError> {
        if self.slope == 0.0 {
            return Err(FitError::ZeroSlope);
        }
        if replicates == 0 {
            return Err(FitError::InvalidReplicates);
        }

        let b2 = self.slope.powi(2);
        #[allow(clippy::cast_precision_loss)]
        let fit_variance = self.residual_variance / b2
            * ((replicates as f64).recip()
                + self.weight_sum.recip()
                + (observed - self.response_mean).powi(2) / (b2 * self.sxx));
        let input_variance = observed_uncertainty.powi(2) / b2;
        let variance = fit_variance + input_variance;

        #[allow(clippy::cast_precision_loss)]
        let degrees_of_freedom = if fit_variance > 0.0 {
            variance.powi(2) / (fit_variance.powi(2) / self.residual_degrees_of_freedom as f64)
        } else {
            f64::INFINITY
        };

        Ok(Estimate {
            value: (observed - self.intercept) / self.slope,
            standard_uncertainty: variance.sqrt(),
            degrees_of_freedom,
        })
    }

    /// Fitted response at `predictor` with the uncertainty of the fitted mean response
    pub fn predict(&self, predictor: f64) -> Estimate {
        let variance = self.residual_variance
            * (self.weight_sum.recip() + (predictor - self.predictor_mean).powi(2) / self.sxx);

        #[allow(clippy::cast_precision_loss)]
        let degrees_of_freedom = if self.residual_degrees_of_freedom > 0 && variance > 0.0 {
            self.residual_degrees_of_freedom as f64
        } else {
            f64::INFINITY
        };

        Estimate {
            value: self.slope.mul_add(predictor, self.intercept),
            standard_uncertainty: variance.sqrt(),
            degrees_of_freedom,
        }
    }
}

/// A named calibration data set and the line fitted to it
///
/// Changing the data, mode or weighting discards the fit, so estimates are always taken from a
/// line that matches the current data.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RegressionModel {
    #[serde(default)]
    mode: Mode,
    #[serde(default)]
    use_weights: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    data: Vec<DataPoint>,
    #[serde(skip)]
    fitted: Option<FittedLine>,
}

impl RegressionModel {
    pub const fn new(mode: Mode, use_weights: bool, data: Vec<DataPoint>) -> Self {
        Self {
            mode,
            use_weights,
            description: String::new(),
            data,
            fitted: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub const fn use_weights(&self) -> bool {
        self.use_weights
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn data(&self) -> &[DataPoint] {
        &self.data
    }

    pub const fn fitted(&self) -> Option<&FittedLine> {
        self.fitted.as_ref()
    }

    pub fn set_data(&mut self, data: Vec<DataPoint>) {
        self.data = data;
        self.fitted = None;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.fitted = None;
    }

    pub fn set_use_weights(&mut self, use_weights: bool) {
        self.use_weights = use_weights;
        self.fitted = None;
    }

    /// Fit the line to the current data and keep it for later estimates
    ///
    /// # Errors
    /// See [`fit`]. A failed fit also discards any previous one.
    pub fn fit(&mut self) -> Result<&FittedLine, FitError> {
        self.fitted = None;
        let line = fit(&self.data, self.mode, self.use_weights)?;
        Ok(self.fitted.insert(line))
    }

    /// Inverse estimate from the current fit, see [`FittedLine::inverse`]
    ///
    /// # Errors
    /// Fails with [`FitError::ModelNotFit`] unless [`RegressionModel::fit`] has succeeded
    /// since the data last changed.
    pub fn estimate(
        &self,
        observed: f64,
        observed_uncertainty: f64,
        replicates: usize,
    ) -> Result<Estimate, FitError> {
        self.fitted
            .as_ref()
            .ok_or(FitError::ModelNotFit)?
            .inverse(observed, observed_uncertainty, replicates)
    }
}
