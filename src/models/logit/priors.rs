//! Prior specifications for the binomial-logit observation model.

/// Independent Gaussian slab over regression coefficients: per-coefficient
/// prior mean and precision.
#[derive(Debug, Clone)]
pub struct GaussianSlab {
    pub mean: Vec<f64>,
    pub precision: Vec<f64>,
}

impl GaussianSlab {
    #[must_use]
    pub const fn new(mean: Vec<f64>, precision: Vec<f64>) -> Self {
        Self { mean, precision }
    }

    /// Zero-mean slab with weak precision on every coefficient.
    #[must_use]
    pub fn diffuse(dimension: usize) -> Self {
        Self {
            mean: vec![0.0; dimension],
            precision: vec![0.01; dimension],
        }
    }

    /// Zero-mean unit-precision slab.
    #[must_use]
    pub fn unit(dimension: usize) -> Self {
        Self {
            mean: vec![0.0; dimension],
            precision: vec![1.0; dimension],
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Whether the slab is internally consistent and numerically usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.mean.len() == self.precision.len()
            && self.mean.iter().all(|value| value.is_finite())
            && self
                .precision
                .iter()
                .all(|value| *value > 0.0 && value.is_finite())
    }
}

/// Spike-and-slab prior: a continuous slab plus per-coefficient prior
/// inclusion probabilities and an optional cap on model-selection flips.
#[derive(Debug, Clone)]
pub struct SpikeSlabPrior {
    pub slab: GaussianSlab,
    pub inclusion_probabilities: Vec<f64>,
    pub max_flips: Option<usize>,
}

impl SpikeSlabPrior {
    #[must_use]
    pub const fn new(slab: GaussianSlab, inclusion_probabilities: Vec<f64>) -> Self {
        Self {
            slab,
            inclusion_probabilities,
            max_flips: None,
        }
    }

    #[must_use]
    pub const fn with_max_flips(mut self, max_flips: usize) -> Self {
        self.max_flips = Some(max_flips);
        self
    }

    /// Degenerate prior that never includes any coefficient, pinning the
    /// coefficient vector at its (zero) prior mean.
    #[must_use]
    pub fn exclude_all(dimension: usize) -> Self {
        Self {
            slab: GaussianSlab::unit(dimension),
            inclusion_probabilities: vec![0.0; dimension],
            max_flips: None,
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.inclusion_probabilities.len()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.slab.is_valid()
            && self.slab.dimension() == self.inclusion_probabilities.len()
            && self
                .inclusion_probabilities
                .iter()
                .all(|probability| (0.0..=1.0).contains(probability))
    }
}

/// Construction-time choice of observation prior.
///
/// The two degenerate cases of the original interface ("no predictors" and
/// "reinstantiating an existing model") are folded into one explicit variant
/// instead of being inferred from an absent prior.
#[derive(Debug, Clone)]
pub enum ObservationPrior {
    /// Spike-and-slab variable selection over the regression coefficients.
    SpikeSlab(SpikeSlabPrior),
    /// Degenerate prior that samples nothing and fixes coefficients at zero.
    ExcludeAll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffuse_slab_is_valid() {
        assert!(GaussianSlab::diffuse(3).is_valid());
    }

    #[test]
    fn slab_rejects_non_positive_precision() {
        let slab = GaussianSlab::new(vec![0.0], vec![0.0]);
        assert!(!slab.is_valid());
    }

    #[test]
    fn slab_rejects_length_mismatch() {
        let slab = GaussianSlab::new(vec![0.0, 0.0], vec![1.0]);
        assert!(!slab.is_valid());
    }

    #[test]
    fn exclude_all_prior_is_valid_and_zero_probability() {
        let prior = SpikeSlabPrior::exclude_all(4);
        assert!(prior.is_valid());
        assert!(prior.inclusion_probabilities.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn prior_rejects_out_of_range_probability() {
        let prior = SpikeSlabPrior::new(GaussianSlab::unit(1), vec![1.5]);
        assert!(!prior.is_valid());
    }

    #[test]
    fn max_flips_builder_sets_cap() {
        let prior = SpikeSlabPrior::exclude_all(1).with_max_flips(10);
        assert_eq!(prior.max_flips, Some(10));
    }
}
