//! Binomial-logit regression observation component.
//!
//! Holds the augmented data records and the coefficient vector shared between
//! the spike-and-slab sampler and external reporting. Each record carries the
//! most recent Gaussian imputation so the coefficient draw and the state draw
//! within one iteration see the same augmented data.

use std::cell::RefCell;
use std::rc::Rc;

use faer::Mat;

use crate::latent::PseudoObservation;
use crate::models::logit::sampler::SpikeSlabLogitSampler;
use crate::reporting::ReportedParameter;
use crate::utils::dot_row;

/// One binomial observation augmented with its latest Gaussian imputation.
#[derive(Debug, Clone)]
pub struct AugmentedBinomialObservation {
    pub successes: u64,
    pub trials: u64,
    pub predictors: Vec<f64>,
    pub missing: bool,
    pub latent: PseudoObservation,
}

impl AugmentedBinomialObservation {
    #[must_use]
    pub const fn new(successes: u64, trials: u64, predictors: Vec<f64>) -> Self {
        Self {
            successes,
            trials,
            predictors,
            missing: false,
            latent: PseudoObservation::missing(),
        }
    }

    /// Mark the record completely missing: it keeps its time slot but
    /// contributes no likelihood.
    #[must_use]
    pub const fn completely_missing(mut self) -> Self {
        self.missing = true;
        self
    }
}

/// Regression coefficients with spike-and-slab inclusion state.
///
/// `eligible[j] == false` marks a coefficient permanently excluded: it is
/// zeroed at exclusion time and never revisited by model selection.
#[derive(Debug, Clone)]
pub struct GlmCoefficients {
    values: Vec<f64>,
    included: Vec<bool>,
    eligible: Vec<bool>,
}

impl GlmCoefficients {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
            included: vec![true; dimension],
            eligible: vec![true; dimension],
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    #[must_use]
    pub fn is_included(&self, index: usize) -> bool {
        self.included[index]
    }

    #[must_use]
    pub fn is_eligible(&self, index: usize) -> bool {
        self.eligible[index]
    }

    /// Indices currently in the model.
    #[must_use]
    pub fn included_indices(&self) -> Vec<usize> {
        (0..self.included.len())
            .filter(|&index| self.included[index])
            .collect()
    }

    pub fn set_value(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    pub fn set_included(&mut self, index: usize, included: bool) {
        if self.eligible[index] {
            self.included[index] = included;
            if !included {
                self.values[index] = 0.0;
            }
        }
    }

    /// Permanently exclude a coefficient. It is zeroed now and ignored by
    /// every later model-selection sweep.
    pub fn force_exclude(&mut self, index: usize) {
        self.eligible[index] = false;
        self.included[index] = false;
        self.values[index] = 0.0;
    }

    /// Linear predictor for one predictor row.
    #[must_use]
    pub fn predict(&self, predictors: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(predictors.iter())
            .map(|(coefficient, predictor)| coefficient * predictor)
            .sum()
    }

    /// Linear predictor for row `row` of a design matrix.
    #[must_use]
    pub fn predict_row(&self, design: &Mat<f64>, row: usize) -> f64 {
        dot_row(design, row, &self.values)
    }
}

impl ReportedParameter for GlmCoefficients {
    fn snapshot(&self) -> Vec<f64> {
        self.values.clone()
    }
}

/// The binomial logistic regression observation model: augmented data plus a
/// shared coefficient handle and, once wired, the attached posterior sampler.
#[derive(Debug)]
pub struct BinomialLogitRegression {
    predictor_dimension: usize,
    data: Vec<AugmentedBinomialObservation>,
    coefficients: Rc<RefCell<GlmCoefficients>>,
    sampler: Option<Rc<RefCell<SpikeSlabLogitSampler>>>,
}

impl BinomialLogitRegression {
    #[must_use]
    pub fn new(predictor_dimension: usize) -> Self {
        Self {
            predictor_dimension,
            data: Vec::new(),
            coefficients: Rc::new(RefCell::new(GlmCoefficients::new(predictor_dimension))),
            sampler: None,
        }
    }

    #[must_use]
    pub const fn predictor_dimension(&self) -> usize {
        self.predictor_dimension
    }

    #[must_use]
    pub fn data(&self) -> &[AugmentedBinomialObservation] {
        &self.data
    }

    #[must_use]
    pub fn data_mut(&mut self) -> &mut [AugmentedBinomialObservation] {
        &mut self.data
    }

    /// The live coefficient handle shared with the sampler and, in regression
    /// mode, the parameter registry.
    #[must_use]
    pub fn coefficients(&self) -> Rc<RefCell<GlmCoefficients>> {
        Rc::clone(&self.coefficients)
    }

    /// Attach the posterior sampler for the coefficients. The same handle is
    /// referenced by the state-space posterior sampler.
    pub fn set_method(&mut self, sampler: Rc<RefCell<SpikeSlabLogitSampler>>) {
        self.sampler = Some(sampler);
    }

    #[must_use]
    pub fn sampler(&self) -> Option<Rc<RefCell<SpikeSlabLogitSampler>>> {
        self.sampler.as_ref().map(Rc::clone)
    }

    /// Append one augmented record. Rows arrive in time order; the caller
    /// guarantees the predictor row matches the model dimension.
    pub fn add_observation(&mut self, observation: AugmentedBinomialObservation) {
        debug_assert_eq!(observation.predictors.len(), self.predictor_dimension);
        self.data.push(observation);
    }

    /// Linear predictor of record `index` from the current coefficients.
    #[must_use]
    pub fn regression_part(&self, index: usize) -> f64 {
        self.coefficients.borrow().predict(&self.data[index].predictors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_exclude_zeroes_and_locks_the_coefficient() {
        let mut coefficients = GlmCoefficients::new(2);
        coefficients.set_value(1, 3.0);
        coefficients.force_exclude(1);
        assert!((coefficients.value(1) - 0.0).abs() < f64::EPSILON);
        assert!(!coefficients.is_eligible(1));

        coefficients.set_included(1, true);
        assert!(!coefficients.is_included(1));
    }

    #[test]
    fn excluded_coefficient_drops_out_of_the_linear_predictor() {
        let mut coefficients = GlmCoefficients::new(2);
        coefficients.set_value(0, 1.0);
        coefficients.set_value(1, 2.0);
        coefficients.set_included(1, false);
        assert!((coefficients.predict(&[1.0, 10.0]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_reports_the_full_vector_with_zeros_for_excluded() {
        let mut coefficients = GlmCoefficients::new(3);
        coefficients.set_value(0, 0.5);
        coefficients.set_value(2, -1.0);
        coefficients.force_exclude(2);
        assert_eq!(coefficients.snapshot(), vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn observations_are_kept_in_insertion_order() {
        let mut model = BinomialLogitRegression::new(1);
        model.add_observation(AugmentedBinomialObservation::new(1, 4, vec![1.0]));
        model.add_observation(
            AugmentedBinomialObservation::new(0, 2, vec![1.0]).completely_missing(),
        );
        assert_eq!(model.data().len(), 2);
        assert_eq!(model.data()[0].successes, 1);
        assert!(model.data()[1].missing);
    }

    #[test]
    fn regression_part_uses_the_record_predictor_row() {
        let mut model = BinomialLogitRegression::new(2);
        model.add_observation(AugmentedBinomialObservation::new(1, 2, vec![1.0, 2.0]));
        model.coefficients().borrow_mut().set_value(0, 0.5);
        model.coefficients().borrow_mut().set_value(1, 1.0);
        assert!((model.regression_part(0) - 2.5).abs() < f64::EPSILON);
    }
}
