//! Spike-and-slab posterior sampling for the logistic observation model.
//!
//! The coefficient draw runs on the Gaussian pseudo-observations produced by
//! data augmentation: a model-selection sweep toggles inclusion indicators by
//! their conditional posterior odds, then the included coefficients are drawn
//! from the conjugate Gaussian conditional.

use std::cell::RefCell;
use std::rc::Rc;

use faer::Mat;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::models::logit::imputer::BinomialLogitImputer;
use crate::models::logit::likelihood::logistic_stable;
use crate::models::logit::observation::{AugmentedBinomialObservation, GlmCoefficients};
use crate::models::logit::priors::GaussianSlab;
use crate::models::logit::types::LogitModelError;
use crate::utils::{
    cholesky_decompose, cholesky_log_det, cholesky_solve, sample_from_precision_cholesky,
};

/// Draws logistic regression coefficients with spike-and-slab variable
/// selection, conditional on augmented data.
#[derive(Debug)]
pub struct SpikeSlabLogitSampler {
    coefficients: Rc<RefCell<GlmCoefficients>>,
    slab: GaussianSlab,
    inclusion_probabilities: Vec<f64>,
    max_flips: Option<usize>,
    imputer: BinomialLogitImputer,
}

impl SpikeSlabLogitSampler {
    /// Build the sampler and immediately force-exclude every coefficient
    /// whose prior inclusion probability is exactly zero. That pruning is
    /// deterministic and permanent, not a sampled decision.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrior` for malformed slab/spike inputs and
    /// `PriorDimensionMismatch` when the prior does not cover the model's
    /// predictor dimension.
    pub fn new(
        coefficients: Rc<RefCell<GlmCoefficients>>,
        slab: GaussianSlab,
        inclusion_probabilities: Vec<f64>,
        clt_threshold: u32,
    ) -> Result<Self, LogitModelError> {
        if !slab.is_valid()
            || slab.dimension() != inclusion_probabilities.len()
            || !inclusion_probabilities
                .iter()
                .all(|probability| (0.0..=1.0).contains(probability))
        {
            return Err(LogitModelError::InvalidPrior);
        }
        let dimension = coefficients.borrow().dimension();
        if slab.dimension() != dimension {
            return Err(LogitModelError::PriorDimensionMismatch {
                prior: slab.dimension(),
                predictors: dimension,
            });
        }
        {
            let mut coefficients = coefficients.borrow_mut();
            for (index, &probability) in inclusion_probabilities.iter().enumerate() {
                if probability == 0.0 {
                    coefficients.force_exclude(index);
                } else {
                    coefficients.set_included(index, true);
                }
            }
        }
        Ok(Self {
            coefficients,
            slab,
            inclusion_probabilities,
            max_flips: None,
            imputer: BinomialLogitImputer::new(clt_threshold),
        })
    }

    /// Cap the number of inclusion toggles examined per sweep.
    pub fn limit_model_selection(&mut self, max_flips: usize) {
        self.max_flips = Some(max_flips);
    }

    #[must_use]
    pub const fn max_flips(&self) -> Option<usize> {
        self.max_flips
    }

    #[must_use]
    pub const fn imputer(&self) -> &BinomialLogitImputer {
        &self.imputer
    }

    #[must_use]
    pub const fn clt_threshold(&self) -> u32 {
        self.imputer.clt_threshold()
    }

    #[must_use]
    pub fn coefficients(&self) -> Rc<RefCell<GlmCoefficients>> {
        Rc::clone(&self.coefficients)
    }

    /// One coefficient update: a model-selection sweep followed by a draw of
    /// the included coefficients, conditional on each record's stored
    /// imputation net of the state contribution.
    ///
    /// # Errors
    ///
    /// Returns `SolveFailed` when the conditional precision is not positive
    /// definite and `NonFiniteDraw` when the draw degenerates.
    pub fn draw_coefficients(
        &mut self,
        rng: &mut StdRng,
        records: &[AugmentedBinomialObservation],
        state_contribution: &[f64],
    ) -> Result<(), LogitModelError> {
        let statistics = self.accumulate(records, state_contribution);
        self.sweep_inclusion_indicators(rng, &statistics);
        self.draw_included(rng, &statistics)
    }

    /// Weighted cross-products of the augmented data on the regression scale.
    fn accumulate(
        &self,
        records: &[AugmentedBinomialObservation],
        state_contribution: &[f64],
    ) -> SufficientStatistics {
        let dimension = self.slab.dimension();
        let mut xtwx = Mat::<f64>::zeros(dimension, dimension);
        let mut xtwz = vec![0.0; dimension];
        for (record, &state) in records.iter().zip(state_contribution.iter()) {
            if record.missing || record.latent.is_missing() {
                continue;
            }
            let weight = record.latent.precision;
            let target = record.latent.value - state;
            for i in 0..dimension {
                let xi = record.predictors[i];
                xtwz[i] += weight * xi * target;
                for j in 0..=i {
                    let increment = weight * xi * record.predictors[j];
                    xtwx[(i, j)] += increment;
                    if i != j {
                        xtwx[(j, i)] += increment;
                    }
                }
            }
        }
        SufficientStatistics { xtwx, xtwz }
    }

    /// Toggle inclusion indicators by their conditional posterior odds, in a
    /// random order, visiting at most `max_flips` free coefficients.
    fn sweep_inclusion_indicators(&self, rng: &mut StdRng, statistics: &SufficientStatistics) {
        let mut candidates: Vec<usize> = {
            let coefficients = self.coefficients.borrow();
            (0..self.inclusion_probabilities.len())
                .filter(|&index| {
                    coefficients.is_eligible(index)
                        && self.inclusion_probabilities[index] < 1.0
                })
                .collect()
        };
        candidates.shuffle(rng);
        if let Some(cap) = self.max_flips {
            candidates.truncate(cap);
        }

        for index in candidates {
            let mut with = self.current_inclusion();
            let mut without = with.clone();
            with[index] = true;
            without[index] = false;
            let (Some(log_with), Some(log_without)) = (
                self.log_model_weight(&with, statistics),
                self.log_model_weight(&without, statistics),
            ) else {
                continue;
            };
            let probability = logistic_stable(log_with - log_without);
            let include = rng.random::<f64>() < probability;
            self.coefficients.borrow_mut().set_included(index, include);
        }
    }

    fn current_inclusion(&self) -> Vec<bool> {
        let coefficients = self.coefficients.borrow();
        (0..coefficients.dimension())
            .map(|index| coefficients.is_included(index))
            .collect()
    }

    /// Log marginal weight of an inclusion set, up to a constant shared by
    /// all sets: spike prior mass plus the Gaussian integral over the
    /// included coefficients.
    fn log_model_weight(
        &self,
        included: &[bool],
        statistics: &SufficientStatistics,
    ) -> Option<f64> {
        let coefficients = self.coefficients.borrow();
        let mut weight = 0.0;
        for (index, &probability) in self.inclusion_probabilities.iter().enumerate() {
            if !coefficients.is_eligible(index) {
                continue;
            }
            weight += if included[index] {
                probability.max(f64::MIN_POSITIVE).ln()
            } else {
                (1.0 - probability).max(f64::MIN_POSITIVE).ln()
            };
        }
        drop(coefficients);

        let subset: Vec<usize> = (0..included.len()).filter(|&i| included[i]).collect();
        if subset.is_empty() {
            return Some(weight);
        }

        let (precision, shifted) = self.conditional_system(&subset, statistics);
        let lower = cholesky_decompose(&precision)?;
        let mean = cholesky_solve(&lower, &shifted);

        let mut log_det_prior = 0.0;
        let mut prior_quadratic = 0.0;
        for &index in &subset {
            let prior_precision = self.slab.precision[index];
            let prior_mean = self.slab.mean[index];
            log_det_prior += prior_precision.ln();
            prior_quadratic += prior_precision * prior_mean * prior_mean;
        }
        let posterior_quadratic: f64 = shifted
            .iter()
            .zip(mean.iter())
            .map(|(b, m)| b * m)
            .sum();

        weight += 0.5 * (log_det_prior - cholesky_log_det(&lower));
        weight += 0.5 * (posterior_quadratic - prior_quadratic);
        weight.is_finite().then_some(weight)
    }

    /// Conditional posterior precision and shifted target for a subset of
    /// coefficients: `X'WX + D` and `X'Wz + D m` restricted to the subset.
    fn conditional_system(
        &self,
        subset: &[usize],
        statistics: &SufficientStatistics,
    ) -> (Mat<f64>, Vec<f64>) {
        let size = subset.len();
        let precision = Mat::from_fn(size, size, |i, j| {
            let mut entry = statistics.xtwx[(subset[i], subset[j])];
            if i == j {
                entry += self.slab.precision[subset[i]];
            }
            entry
        });
        let shifted = subset
            .iter()
            .map(|&index| {
                self.slab.precision[index].mul_add(self.slab.mean[index], statistics.xtwz[index])
            })
            .collect();
        (precision, shifted)
    }

    /// Draw the included coefficients from their Gaussian conditional; every
    /// excluded coefficient stays at zero.
    fn draw_included(
        &self,
        rng: &mut StdRng,
        statistics: &SufficientStatistics,
    ) -> Result<(), LogitModelError> {
        let subset = self.coefficients.borrow().included_indices();
        if subset.is_empty() {
            return Ok(());
        }
        let (precision, shifted) = self.conditional_system(&subset, statistics);
        let lower = cholesky_decompose(&precision).ok_or(LogitModelError::SolveFailed)?;
        let mean = cholesky_solve(&lower, &shifted);
        let noise = sample_from_precision_cholesky(&lower, rng);

        let mut coefficients = self.coefficients.borrow_mut();
        for (position, &index) in subset.iter().enumerate() {
            let value = mean[position] + noise[position];
            if !value.is_finite() {
                return Err(LogitModelError::NonFiniteDraw);
            }
            coefficients.set_value(index, value);
        }
        Ok(())
    }
}

struct SufficientStatistics {
    xtwx: Mat<f64>,
    xtwz: Vec<f64>,
}

/// Posterior sampler for the full state-space model. Holds the same
/// observation-model sampler handle that is attached to the observation
/// component, so both attachment points observe identical configuration.
#[derive(Debug)]
pub struct StateSpacePosteriorSampler {
    observation_sampler: Rc<RefCell<SpikeSlabLogitSampler>>,
}

impl StateSpacePosteriorSampler {
    #[must_use]
    pub const fn new(observation_sampler: Rc<RefCell<SpikeSlabLogitSampler>>) -> Self {
        Self { observation_sampler }
    }

    #[must_use]
    pub fn observation_sampler(&self) -> Rc<RefCell<SpikeSlabLogitSampler>> {
        Rc::clone(&self.observation_sampler)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::latent::PseudoObservation;

    fn shared_coefficients(dimension: usize) -> Rc<RefCell<GlmCoefficients>> {
        Rc::new(RefCell::new(GlmCoefficients::new(dimension)))
    }

    fn informative_records(
        dimension: usize,
        target: f64,
        count: usize,
    ) -> Vec<AugmentedBinomialObservation> {
        (0..count)
            .map(|_| {
                let mut record = AugmentedBinomialObservation::new(1, 2, vec![1.0; dimension]);
                record.latent = PseudoObservation {
                    value: target,
                    precision: 4.0,
                };
                record
            })
            .collect()
    }

    #[test]
    fn zero_probability_coefficients_are_dropped_at_construction() {
        let coefficients = shared_coefficients(3);
        coefficients.borrow_mut().set_value(1, 2.0);
        let sampler = SpikeSlabLogitSampler::new(
            Rc::clone(&coefficients),
            GaussianSlab::unit(3),
            vec![0.5, 0.0, 1.0],
            5,
        )
        .expect("valid prior");
        assert!(!coefficients.borrow().is_eligible(1));
        assert!((coefficients.borrow().value(1) - 0.0).abs() < f64::EPSILON);
        assert!(coefficients.borrow().is_included(2));
        assert_eq!(sampler.clt_threshold(), 5);
    }

    #[test]
    fn dropped_coefficients_never_reappear_across_sweeps() {
        let coefficients = shared_coefficients(2);
        let mut sampler = SpikeSlabLogitSampler::new(
            Rc::clone(&coefficients),
            GaussianSlab::unit(2),
            vec![1.0, 0.0],
            5,
        )
        .expect("valid prior");
        let records = informative_records(2, 1.5, 30);
        let state = vec![0.0; records.len()];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..25 {
            sampler
                .draw_coefficients(&mut rng, &records, &state)
                .expect("draw succeeds");
            assert!(!coefficients.borrow().is_included(1));
            assert!((coefficients.borrow().value(1) - 0.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn degenerate_sampler_pins_coefficients_at_zero() {
        let coefficients = shared_coefficients(1);
        let mut sampler = SpikeSlabLogitSampler::new(
            Rc::clone(&coefficients),
            GaussianSlab::unit(1),
            vec![0.0],
            5,
        )
        .expect("valid prior");
        let records = informative_records(1, 2.0, 40);
        let state = vec![0.0; records.len()];
        let mut rng = StdRng::seed_from_u64(9);
        sampler
            .draw_coefficients(&mut rng, &records, &state)
            .expect("draw succeeds");
        assert!((coefficients.borrow().value(0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn informative_data_pulls_the_coefficient_toward_the_target() {
        let coefficients = shared_coefficients(1);
        let mut sampler = SpikeSlabLogitSampler::new(
            Rc::clone(&coefficients),
            GaussianSlab::diffuse(1),
            vec![1.0],
            5,
        )
        .expect("valid prior");
        let records = informative_records(1, 1.2, 200);
        let state = vec![0.0; records.len()];
        let mut rng = StdRng::seed_from_u64(17);
        let mut total = 0.0;
        let draws = 50;
        for _ in 0..draws {
            sampler
                .draw_coefficients(&mut rng, &records, &state)
                .expect("draw succeeds");
            total += coefficients.borrow().value(0);
        }
        let average = total / f64::from(draws);
        assert!((average - 1.2).abs() < 0.2, "posterior mean drifted: {average}");
    }

    #[test]
    fn prior_dimension_mismatch_is_rejected() {
        let error = SpikeSlabLogitSampler::new(
            shared_coefficients(2),
            GaussianSlab::unit(3),
            vec![0.5, 0.5, 0.5],
            5,
        )
        .expect_err("dimension mismatch");
        assert!(matches!(
            error,
            LogitModelError::PriorDimensionMismatch {
                prior: 3,
                predictors: 2,
            }
        ));
    }

    #[test]
    fn invalid_inclusion_probability_is_rejected() {
        let error = SpikeSlabLogitSampler::new(
            shared_coefficients(1),
            GaussianSlab::unit(1),
            vec![1.5],
            5,
        )
        .expect_err("invalid spike");
        assert!(matches!(error, LogitModelError::InvalidPrior));
    }

    #[test]
    fn max_flips_caps_the_sweep() {
        let coefficients = shared_coefficients(4);
        let mut sampler = SpikeSlabLogitSampler::new(
            coefficients,
            GaussianSlab::unit(4),
            vec![0.5; 4],
            5,
        )
        .expect("valid prior");
        sampler.limit_model_selection(2);
        assert_eq!(sampler.max_flips(), Some(2));
    }

    #[test]
    fn shared_handle_exposes_one_sampler_instance() {
        let sampler = Rc::new(RefCell::new(
            SpikeSlabLogitSampler::new(
                shared_coefficients(1),
                GaussianSlab::unit(1),
                vec![0.5],
                5,
            )
            .expect("valid prior"),
        ));
        let posterior = StateSpacePosteriorSampler::new(Rc::clone(&sampler));
        posterior.observation_sampler().borrow_mut().limit_model_selection(7);
        assert_eq!(sampler.borrow().max_flips(), Some(7));
    }
}
