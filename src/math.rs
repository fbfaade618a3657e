use ndarray::ArrayView1;
use num_traits::{Float, FromPrimitive};

/// Location and spread of a set of repeated observations
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleStatistics<E> {
    pub count: usize,
    pub mean: E,
    /// Sample standard deviation with the `n - 1` divisor, absent for a single observation
    pub standard_deviation: Option<E>,
}

impl<E: Float + FromPrimitive> SampleStatistics<E> {
    /// Summarise `values`, returning `None` when there are none
    ///
    /// # Examples
    ///
    /// ```
    /// use uncertainty_budget::math::SampleStatistics;
    ///
    /// let statistics = SampleStatistics::<f64>::from_values(&[9.8, 10.0, 10.2]).unwrap();
    /// assert_eq!(statistics.count, 3);
    /// assert!((statistics.mean - 10.0).abs() < 1e-12);
    /// assert!((statistics.standard_deviation.unwrap() - 0.2).abs() < 1e-12);
    /// ```
    pub fn from_values(values: &[E]) -> Option<Self> {
        let view = ArrayView1::from(values);
        let mean = view.mean()?;
        let standard_deviation = (values.len() > 1).then(|| view.var(E::one()).sqrt());

        Some(Self {
            count: values.len(),
            mean,
            standard_deviation,
        })
    }

    /// Standard deviation of the mean, `s / sqrt(n)`
    pub fn standard_error(&self) -> Option<E> {
        let n = E::from_usize(self.count)?;
        self.standard_deviation.map(|s| s / n.sqrt())
    }
}

/// Value below which the fraction `p` of the sorted `values` lie
///
/// Linear interpolation between closest ranks, so `p = 0` and `p = 1` return the extremes.
/// Returns `None` for an empty slice or `p` outside `[0, 1]`.
pub fn quantile<E: Float + FromPrimitive>(sorted: &[E], p: f64) -> Option<E> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let rank = p * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = E::from_f64(rank - rank.floor())?;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
