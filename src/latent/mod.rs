//! # Latent state engines
//!
//! Seam for the Gaussian state-space machinery the observation layer sits on.
//! The engine consumes Gaussian pseudo-observations produced by data
//! augmentation and is otherwise opaque to the observation model.
//!
//! [`LocalLevel`] is the shipped default: a scalar random-walk level with a
//! forward-filter backward-sampler trajectory draw and a conjugate
//! inverse-gamma update of the innovation variance.

use rand::Rng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::utils::sample_standard_normal;

/// Errors raised by latent state filtering and sampling.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LatentStateError {
    #[error("state filter produced a non-finite value")]
    NonFiniteFilter,
    #[error("innovation variance must be positive and finite")]
    InvalidVariance,
}

/// A Gaussian pseudo-observation of the latent linear predictor.
///
/// `precision == 0` encodes a missing time point: it occupies its slot in the
/// series but carries no information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PseudoObservation {
    pub value: f64,
    pub precision: f64,
}

impl PseudoObservation {
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            value: 0.0,
            precision: 0.0,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.precision <= 0.0
    }
}

/// Inverse-gamma prior on a variance parameter.
#[derive(Debug, Clone, Copy)]
pub struct InverseGammaPrior {
    pub shape: f64,
    pub scale: f64,
}

impl Default for InverseGammaPrior {
    fn default() -> Self {
        Self {
            shape: 1.0,
            scale: 1.0,
        }
    }
}

impl InverseGammaPrior {
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.shape > 0.0 && self.scale > 0.0 && self.shape.is_finite() && self.scale.is_finite()
    }
}

/// Contract of the latent Gaussian state machinery.
///
/// The observation layer treats implementations as black boxes: it hands over
/// regression-adjusted pseudo-observations and receives per-time-point
/// observation-equation contributions back.
pub trait LatentStateEngine: std::fmt::Debug {
    /// Dimension of the state vector.
    fn state_dimension(&self) -> usize;

    /// Observation-equation contribution of a state vector.
    fn contribution(&self, state: &[f64]) -> f64;

    /// One state-transition draw, in place.
    fn advance(&self, state: &mut [f64], rng: &mut StdRng);

    /// Variance added to the contribution by one transition step.
    fn innovation_variance(&self) -> f64;

    /// Draw a state trajectory conditional on the pseudo-observations and
    /// update state-model parameters. Returns the contribution series.
    ///
    /// # Errors
    ///
    /// Returns `LatentStateError` if filtering or sampling degenerates.
    fn draw_state(
        &mut self,
        pseudo: &[PseudoObservation],
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, LatentStateError>;

    /// One predict-then-condition filtering step of the contribution's
    /// (mean, variance), used for one-step-ahead holdout evaluation.
    ///
    /// # Errors
    ///
    /// Returns `LatentStateError` if the update produces non-finite values.
    fn filter_update(
        &self,
        mean: &mut f64,
        variance: &mut f64,
        pseudo: &PseudoObservation,
    ) -> Result<(), LatentStateError>;
}

/// Scalar local-level (random walk) state component.
#[derive(Debug, Clone)]
pub struct LocalLevel {
    innovation_variance: f64,
    initial_mean: f64,
    initial_variance: f64,
    variance_prior: InverseGammaPrior,
}

impl Default for LocalLevel {
    fn default() -> Self {
        Self {
            innovation_variance: 0.1,
            initial_mean: 0.0,
            initial_variance: 1.0e4,
            variance_prior: InverseGammaPrior::default(),
        }
    }
}

impl LocalLevel {
    /// # Errors
    ///
    /// Returns `LatentStateError::InvalidVariance` if `innovation_variance`
    /// is not positive and finite.
    pub fn new(innovation_variance: f64) -> Result<Self, LatentStateError> {
        if !(innovation_variance > 0.0 && innovation_variance.is_finite()) {
            return Err(LatentStateError::InvalidVariance);
        }
        Ok(Self {
            innovation_variance,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn with_initial(mut self, mean: f64, variance: f64) -> Self {
        self.initial_mean = mean;
        self.initial_variance = variance;
        self
    }

    #[must_use]
    pub const fn with_variance_prior(mut self, prior: InverseGammaPrior) -> Self {
        self.variance_prior = prior;
        self
    }

    fn forward_filter(
        &self,
        pseudo: &[PseudoObservation],
    ) -> Result<(Vec<f64>, Vec<f64>), LatentStateError> {
        let n = pseudo.len();
        let mut means = vec![0.0; n];
        let mut variances = vec![0.0; n];
        for t in 0..n {
            let (pred_mean, pred_var) = if t == 0 {
                (self.initial_mean, self.initial_variance)
            } else {
                (means[t - 1], variances[t - 1] + self.innovation_variance)
            };
            if pseudo[t].is_missing() {
                means[t] = pred_mean;
                variances[t] = pred_var;
            } else {
                let obs_var = 1.0 / pseudo[t].precision;
                let gain = pred_var / (pred_var + obs_var);
                means[t] = gain.mul_add(pseudo[t].value - pred_mean, pred_mean);
                variances[t] = pred_var * (1.0 - gain);
            }
            if !(means[t].is_finite() && variances[t].is_finite() && variances[t] >= 0.0) {
                return Err(LatentStateError::NonFiniteFilter);
            }
        }
        Ok((means, variances))
    }

    fn backward_sample(
        &self,
        means: &[f64],
        variances: &[f64],
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, LatentStateError> {
        let n = means.len();
        let mut states = vec![0.0; n];
        states[n - 1] = variances[n - 1]
            .sqrt()
            .mul_add(sample_standard_normal(rng), means[n - 1]);
        for t in (0..n - 1).rev() {
            let denom = variances[t] + self.innovation_variance;
            let gain = if denom > 0.0 { variances[t] / denom } else { 0.0 };
            let cond_mean = gain.mul_add(states[t + 1] - means[t], means[t]);
            let cond_var = variances[t] * (1.0 - gain);
            states[t] = cond_var
                .max(0.0)
                .sqrt()
                .mul_add(sample_standard_normal(rng), cond_mean);
            if !states[t].is_finite() {
                return Err(LatentStateError::NonFiniteFilter);
            }
        }
        Ok(states)
    }

    fn draw_innovation_variance(
        &mut self,
        states: &[f64],
        rng: &mut StdRng,
    ) -> Result<(), LatentStateError> {
        if states.len() < 2 || !self.variance_prior.is_valid() {
            return Ok(());
        }
        let increments = states.len() - 1;
        let sum_squares: f64 = states
            .windows(2)
            .map(|pair| {
                let step = pair[1] - pair[0];
                step * step
            })
            .sum();
        let shape = 0.5f64.mul_add(usize_to_f64(increments), self.variance_prior.shape);
        let scale = 0.5f64.mul_add(sum_squares, self.variance_prior.scale);
        let draw = scale / sample_gamma(shape, rng);
        if !(draw > 0.0 && draw.is_finite()) {
            return Err(LatentStateError::InvalidVariance);
        }
        self.innovation_variance = draw;
        Ok(())
    }
}

impl LatentStateEngine for LocalLevel {
    fn state_dimension(&self) -> usize {
        1
    }

    fn contribution(&self, state: &[f64]) -> f64 {
        state.first().copied().unwrap_or(0.0)
    }

    fn advance(&self, state: &mut [f64], rng: &mut StdRng) {
        if let Some(level) = state.first_mut() {
            *level += self.innovation_variance.sqrt() * sample_standard_normal(rng);
        }
    }

    fn innovation_variance(&self) -> f64 {
        self.innovation_variance
    }

    fn draw_state(
        &mut self,
        pseudo: &[PseudoObservation],
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, LatentStateError> {
        if pseudo.is_empty() {
            return Ok(Vec::new());
        }
        let (means, variances) = self.forward_filter(pseudo)?;
        let states = self.backward_sample(&means, &variances, rng)?;
        self.draw_innovation_variance(&states, rng)?;
        Ok(states)
    }

    fn filter_update(
        &self,
        mean: &mut f64,
        variance: &mut f64,
        pseudo: &PseudoObservation,
    ) -> Result<(), LatentStateError> {
        *variance += self.innovation_variance;
        if !pseudo.is_missing() {
            let obs_var = 1.0 / pseudo.precision;
            let gain = *variance / (*variance + obs_var);
            *mean += gain * (pseudo.value - *mean);
            *variance *= 1.0 - gain;
        }
        if mean.is_finite() && variance.is_finite() && *variance >= 0.0 {
            Ok(())
        } else {
            Err(LatentStateError::NonFiniteFilter)
        }
    }
}

/// Marsaglia-Tsang draw from `Gamma(shape, 1)`.
fn sample_gamma(shape: f64, rng: &mut StdRng) -> f64 {
    if shape < 1.0 {
        let boost = rng.random::<f64>().max(f64::MIN_POSITIVE);
        return sample_gamma(shape + 1.0, rng) * boost.powf(1.0 / shape);
    }
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = sample_standard_normal(rng);
        let v = c.mul_add(x, 1.0).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u = rng.random::<f64>().max(f64::MIN_POSITIVE);
        if u.ln() < (0.5 * x).mul_add(x, d - d * v + d * v.ln()) {
            return d * v;
        }
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
