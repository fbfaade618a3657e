use ndarray::Array1;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{Beta, Normal, Triangular, Uniform};
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as StandardNormal};

/// Assumed shape of a Type B quantity
///
/// A distribution with half-width $a$ has standard deviation $a / d$ where $d$ is the divisor:
/// - rectangular: $d = \sqrt{3}$
/// - triangular: $d = \sqrt{6}$
/// - U-shaped (arcsine): $d = \sqrt{2}$
/// - normal: $d$ is the coverage factor of the stated interval
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    Normal,
    Rectangular,
    Triangular,
    UShaped,
}

impl Distribution {
    /// Divisor implied by the shape alone, `None` for the normal distribution whose divisor
    /// depends on the confidence of the stated interval
    pub fn default_divisor(self) -> Option<f64> {
        match self {
            Self::Normal => None,
            Self::Rectangular => Some(3f64.sqrt()),
            Self::Triangular => Some(6f64.sqrt()),
            Self::UShaped => Some(2f64.sqrt()),
        }
    }

    /// Draw `count` values with the given centre and standard deviation
    ///
    /// A zero standard deviation, or one too small to separate the bounds of a bounded
    /// distribution from its centre, yields a constant array.
    ///
    /// # Errors
    /// Returns a description of the problem when the parameters do not describe a
    /// distribution, for example a negative or non-finite spread.
    pub fn sample<R: Rng>(
        self,
        centre: f64,
        standard_deviation: f64,
        count: usize,
        rng: &mut R,
    ) -> Result<Array1<f64>, String> {
        if !(centre.is_finite() && standard_deviation.is_finite()) || standard_deviation < 0.0 {
            return Err(format!(
                "cannot sample around {centre} with standard deviation {standard_deviation}"
            ));
        }
        if standard_deviation == 0.0 {
            return Ok(Array1::from_elem(count, centre));
        }

        let half_width = self
            .default_divisor()
            .map_or(0.0, |divisor| standard_deviation * divisor);
        let (low, high) = (centre - half_width, centre + half_width);
        if !(high - low).is_finite() {
            return Err(format!(
                "half-width {half_width} around {centre} exceeds the range of a float"
            ));
        }
        // Bounds closer than the spacing of floats around the centre collapse onto it
        if self != Self::Normal && low >= high {
            return Ok(Array1::from_elem(count, centre));
        }
        let samples = match self {
            Self::Normal => {
                let normal = Normal::new(centre, standard_deviation).map_err(|e| e.to_string())?;
                Array1::random_using(count, normal, rng)
            }
            Self::Rectangular => Array1::random_using(count, Uniform::new(low, high), rng),
            Self::Triangular => {
                let triangular = Triangular::new(low, high, centre).map_err(|e| e.to_string())?;
                Array1::random_using(count, triangular, rng)
            }
            Self::UShaped => {
                // Arcsine law on [-1, 1] is an affine image of Beta(1/2, 1/2)
                let beta = Beta::new(0.5, 0.5).map_err(|e| e.to_string())?;
                Array1::random_using(count, beta, rng)
                    .mapv(|b: f64| centre + half_width * 2.0f64.mul_add(b, -1.0))
            }
        };

        Ok(samples)
    }
}

/// Two-sided coverage factor of a normal distribution at `confidence`
///
/// Returns `None` unless `0 < confidence < 1`.
pub fn normal_coverage_factor(confidence: f64) -> Option<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let standard = StandardNormal::new(0.0, 1.0).ok()?;
    Some(standard.inverse_cdf((1.0 + confidence) / 2.0))
}
