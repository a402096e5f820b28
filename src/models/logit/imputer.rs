//! Latent-data imputation for binomial observations under a logit link.
//!
//! Each observation with `n` trials and `k` successes is mapped to a single
//! Gaussian pseudo-observation `(value, precision)` on the linear-predictor
//! scale. Small counts take an exact per-trial path; large counts take a
//! central-limit approximation over the aggregate latent sum.

use rand::Rng;
use rand::rngs::StdRng;

use crate::latent::PseudoObservation;
use crate::models::logit::likelihood::{
    logistic_stable, logit, standard_normal_cdf, standard_normal_pdf,
};
use crate::utils::sample_standard_normal;

/// Default trial-count threshold above which the central-limit path engages.
pub const DEFAULT_CLT_THRESHOLD: u32 = 5;

/// Mixture approximation of the standard logistic distribution by three
/// zero-mean normals, moment-matched on variance and kurtosis. The weights
/// solve the linear system that reproduces the logistic variance pi^2 / 3
/// and fourth moment 7 pi^4 / 15 for component variances 1.6, 3.0 and 8.0.
const MIXTURE_WEIGHTS: [f64; 3] = [0.330_763, 0.518_637, 0.150_600];
const MIXTURE_VARIANCES: [f64; 3] = [1.6, 3.0, 8.0];

const EPS_UNIFORM: f64 = 1e-12;
const MIN_AGGREGATE_VARIANCE: f64 = 1e-8;

/// Draws Gaussian pseudo-observations for binomial-logistic data.
#[derive(Debug, Clone)]
pub struct BinomialLogitImputer {
    clt_threshold: u32,
}

impl Default for BinomialLogitImputer {
    fn default() -> Self {
        Self::new(DEFAULT_CLT_THRESHOLD)
    }
}

impl BinomialLogitImputer {
    #[must_use]
    pub const fn new(clt_threshold: u32) -> Self {
        Self { clt_threshold }
    }

    #[must_use]
    pub const fn clt_threshold(&self) -> u32 {
        self.clt_threshold
    }

    /// Whether an observation with the given trial count uses the
    /// central-limit path. Counts at or below the threshold use the exact
    /// per-trial path.
    #[must_use]
    pub fn uses_clt(&self, trials: u64) -> bool {
        trials > u64::from(self.clt_threshold)
    }

    /// Imputes the Gaussian pseudo-observation for one binomial observation
    /// given the current linear predictor `eta`.
    ///
    /// Returns a missing pseudo-observation when there are no trials.
    #[must_use]
    pub fn impute(
        &self,
        rng: &mut StdRng,
        successes: u64,
        trials: u64,
        eta: f64,
    ) -> PseudoObservation {
        if trials == 0 {
            return PseudoObservation::missing();
        }
        if self.uses_clt(trials) {
            impute_clt(rng, successes, trials, eta)
        } else {
            impute_exact(rng, successes, trials, eta)
        }
    }
}

/// Exact path: one truncated-logistic latent draw per trial, each assigned to
/// a mixture component by its posterior weight, then combined into a single
/// precision-weighted pseudo-observation.
fn impute_exact(rng: &mut StdRng, successes: u64, trials: u64, eta: f64) -> PseudoObservation {
    let mut information = 0.0;
    let mut weighted_sum = 0.0;
    for trial in 0..trials {
        let success = trial < successes;
        let z = sample_truncated_logistic(rng, eta, success);
        let residual = z - eta;
        let component = assign_component(rng, residual);
        let precision = 1.0 / MIXTURE_VARIANCES[component];
        information += precision;
        weighted_sum += precision * z;
    }
    PseudoObservation {
        value: weighted_sum / information,
        precision: information,
    }
}

/// Central-limit path: the aggregate latent sum over all trials is
/// approximated by one Gaussian whose mean and variance come from the
/// closed-form truncated-normal-mixture moments.
fn impute_clt(rng: &mut StdRng, successes: u64, trials: u64, eta: f64) -> PseudoObservation {
    let n = u64_to_f64(trials);
    let k = u64_to_f64(successes);
    let (mean_success, variance_success) = truncated_mixture_moments(eta, true);
    let (mean_failure, variance_failure) = truncated_mixture_moments(eta, false);

    let sum_mean = k.mul_add(mean_success, (n - k) * mean_failure);
    let sum_variance =
        k.mul_add(variance_success, (n - k) * variance_failure).max(MIN_AGGREGATE_VARIANCE);

    let sum_draw = sum_variance.sqrt().mul_add(sample_standard_normal(rng), sum_mean);
    PseudoObservation {
        value: sum_draw / n,
        precision: n * n / sum_variance,
    }
}

/// Samples the latent logistic utility `z = eta + e`, with `e` standard
/// logistic, conditioned on the trial outcome via the inverse CDF.
fn sample_truncated_logistic(rng: &mut StdRng, eta: f64, success: bool) -> f64 {
    let boundary = logistic_stable(-eta);
    let u: f64 = rng.random();
    let cumulative = if success {
        // z > 0, so the logistic error exceeds -eta.
        boundary.mul_add(1.0 - u, u).clamp(EPS_UNIFORM, 1.0 - EPS_UNIFORM)
    } else {
        (boundary * u).clamp(EPS_UNIFORM, 1.0 - EPS_UNIFORM)
    };
    eta + logit(cumulative)
}

/// Assigns a latent residual to a mixture component with probability
/// proportional to `weight_r * N(residual | 0, variance_r)`.
fn assign_component(rng: &mut StdRng, residual: f64) -> usize {
    let mut posterior = [0.0_f64; 3];
    let mut total = 0.0;
    for (index, (&weight, &variance)) in
        MIXTURE_WEIGHTS.iter().zip(MIXTURE_VARIANCES.iter()).enumerate()
    {
        let standard = residual / variance.sqrt();
        let density = weight * standard_normal_pdf(standard) / variance.sqrt();
        posterior[index] = density;
        total += density;
    }
    if total <= 0.0 || !total.is_finite() {
        // Residual is far out in every tail; the widest component dominates.
        return MIXTURE_VARIANCES.len() - 1;
    }
    let target: f64 = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (index, &mass) in posterior.iter().enumerate() {
        cumulative += mass;
        if target <= cumulative {
            return index;
        }
    }
    posterior.len() - 1
}

/// Mean and variance of the latent utility for a single trial with linear
/// predictor `eta`, conditioned on a success or failure outcome, under the
/// normal-mixture approximation of the logistic error.
fn truncated_mixture_moments(eta: f64, success: bool) -> (f64, f64) {
    // Probability of the conditioning event under the mixture.
    let mut event_probability = 0.0;
    for (&weight, &variance) in MIXTURE_WEIGHTS.iter().zip(MIXTURE_VARIANCES.iter()) {
        let sd = variance.sqrt();
        let a = -eta / sd;
        let tail = 1.0 - standard_normal_cdf(a);
        event_probability += weight * if success { tail } else { 1.0 - tail };
    }
    event_probability = event_probability.clamp(EPS_UNIFORM, 1.0);

    let mut mean = 0.0;
    let mut second_moment = 0.0;
    for (&weight, &variance) in MIXTURE_WEIGHTS.iter().zip(MIXTURE_VARIANCES.iter()) {
        let sd = variance.sqrt();
        let a = -eta / sd;
        let pdf = standard_normal_pdf(a);
        let cdf = standard_normal_cdf(a);
        let (component_probability, component_mean, component_second) = if success {
            let tail = (1.0 - cdf).max(EPS_UNIFORM);
            // Moments of N(eta, sd^2) truncated to z > 0.
            let hazard = pdf / tail;
            let m = sd.mul_add(hazard, eta);
            let v = variance * hazard.mul_add(-(hazard - a), 1.0);
            (weight * tail, m, v + m * m)
        } else {
            let head = cdf.max(EPS_UNIFORM);
            // Moments of N(eta, sd^2) truncated to z <= 0.
            let hazard = pdf / head;
            let m = sd.mul_add(-hazard, eta);
            let v = variance * hazard.mul_add(-(hazard + a), 1.0);
            (weight * head, m, v + m * m)
        };
        let posterior_weight = component_probability / event_probability;
        mean = posterior_weight.mul_add(component_mean, mean);
        second_moment = posterior_weight.mul_add(component_second, second_moment);
    }
    let variance = (second_moment - mean * mean).max(MIN_AGGREGATE_VARIANCE);
    (mean, variance)
}

#[expect(clippy::cast_precision_loss, reason = "trial counts stay far below 2^53")]
const fn u64_to_f64(value: u64) -> f64 {
    value as f64
}
