//! The binomial-logit state-space model.
//!
//! Couples the logistic observation component to a latent state engine. One
//! call to [`StateSpaceLogitModel::sample_posterior`] runs a full Gibbs
//! iteration: impute augmented data, redraw the latent state, redraw the
//! regression coefficients. The surrounding MCMC loop is the caller's.

use faer::Mat;
use num_traits::ToPrimitive;
use rand::rngs::StdRng;

use crate::latent::{LatentStateEngine, LocalLevel, PseudoObservation};
use crate::models::logit::imputer::BinomialLogitImputer;
use crate::models::logit::likelihood::logistic_stable;
use crate::models::logit::observation::{AugmentedBinomialObservation, BinomialLogitRegression};
use crate::models::logit::sampler::StateSpacePosteriorSampler;
use crate::models::logit::types::LogitModelError;
use crate::utils::sample_binomial;

/// A structural time-series model with binomial observations through a
/// logistic link.
///
/// Both the covariate and the pure-intercept cases share this one type; the
/// regression flag records which mode the model was built in, since that is
/// not inferable from the data after construction.
#[derive(Debug)]
pub struct StateSpaceLogitModel {
    observation: BinomialLogitRegression,
    engine: Box<dyn LatentStateEngine>,
    state_contribution: Vec<f64>,
    regression: bool,
    posterior_sampler: Option<StateSpacePosteriorSampler>,
}

impl StateSpaceLogitModel {
    /// Dimension-only skeleton: no data, a default local-level state.
    #[must_use]
    pub fn new(predictor_dimension: usize) -> Self {
        Self {
            observation: BinomialLogitRegression::new(predictor_dimension),
            engine: Box::new(LocalLevel::default()),
            state_contribution: Vec::new(),
            regression: false,
            posterior_sampler: None,
        }
    }

    /// Build the model from aligned data columns. The caller guarantees the
    /// four inputs have equal row counts.
    #[must_use]
    pub fn from_data(
        successes: &[u64],
        trials: &[u64],
        predictors: &Mat<f64>,
        observed: &[bool],
    ) -> Self {
        debug_assert_eq!(successes.len(), trials.len());
        debug_assert_eq!(successes.len(), predictors.nrows());
        debug_assert_eq!(successes.len(), observed.len());
        let mut model = Self::new(predictors.ncols());
        for row in 0..successes.len() {
            let predictor_row: Vec<f64> =
                (0..predictors.ncols()).map(|col| predictors[(row, col)]).collect();
            let mut record =
                AugmentedBinomialObservation::new(successes[row], trials[row], predictor_row);
            if !observed[row] {
                record = record.completely_missing();
            }
            model.add_data(record);
        }
        model
    }

    /// Swap in a different latent state engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Box<dyn LatentStateEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn set_regression_flag(&mut self, regression: bool) {
        self.regression = regression;
    }

    #[must_use]
    pub const fn regression(&self) -> bool {
        self.regression
    }

    #[must_use]
    pub const fn observation_model(&self) -> &BinomialLogitRegression {
        &self.observation
    }

    pub fn observation_model_mut(&mut self) -> &mut BinomialLogitRegression {
        &mut self.observation
    }

    #[must_use]
    pub fn engine(&self) -> &dyn LatentStateEngine {
        self.engine.as_ref()
    }

    /// Latest drawn state contribution, one entry per time point.
    #[must_use]
    pub fn state_contribution(&self) -> &[f64] {
        &self.state_contribution
    }

    /// Attach the state-space posterior sampler.
    pub fn set_method(&mut self, sampler: StateSpacePosteriorSampler) {
        self.posterior_sampler = Some(sampler);
    }

    /// Whether both mandatory sampler attachments are in place.
    #[must_use]
    pub fn is_samplable(&self) -> bool {
        self.posterior_sampler.is_some() && self.observation.sampler().is_some()
    }

    /// Append one record, keeping the state series aligned with the data.
    pub fn add_data(&mut self, record: AugmentedBinomialObservation) {
        self.observation.add_observation(record);
        self.state_contribution.push(0.0);
    }

    /// One full Gibbs iteration: impute, draw state, draw coefficients.
    ///
    /// The imputation is stored on each record before the state draw, so the
    /// coefficient draw conditions on exactly the same augmented data.
    ///
    /// # Errors
    ///
    /// Returns `SamplerNotAttached` when either sampler attachment is
    /// missing, or propagates state/coefficient draw failures.
    pub fn sample_posterior(&mut self, rng: &mut StdRng) -> Result<(), LogitModelError> {
        let sampler = self
            .posterior_sampler
            .as_ref()
            .ok_or(LogitModelError::SamplerNotAttached)?
            .observation_sampler();
        if self.observation.sampler().is_none() {
            return Err(LogitModelError::SamplerNotAttached);
        }

        let coefficients = self.observation.coefficients();
        let regression_parts: Vec<f64> = {
            let coefficients = coefficients.borrow();
            self.observation
                .data()
                .iter()
                .map(|record| coefficients.predict(&record.predictors))
                .collect()
        };

        let mut state_targets = Vec::with_capacity(regression_parts.len());
        {
            let sampler = sampler.borrow();
            let imputer = sampler.imputer();
            for (index, record) in self.observation.data_mut().iter_mut().enumerate() {
                let pseudo = if record.missing {
                    PseudoObservation::missing()
                } else {
                    let eta = self.state_contribution[index] + regression_parts[index];
                    imputer.impute(rng, record.successes, record.trials, eta)
                };
                record.latent = pseudo;
                state_targets.push(if pseudo.is_missing() {
                    pseudo
                } else {
                    PseudoObservation {
                        value: pseudo.value - regression_parts[index],
                        precision: pseudo.precision,
                    }
                });
            }
        }

        self.state_contribution = self.engine.draw_state(&state_targets, rng)?;
        sampler
            .borrow_mut()
            .draw_coefficients(rng, self.observation.data(), &self.state_contribution)?;
        Ok(())
    }

    /// One simulated successes trajectory over the forecast horizon, starting
    /// from the terminal state of one posterior draw. Does not mutate model
    /// state; call once per retained draw.
    #[must_use]
    pub fn simulate_forecast(
        &self,
        rng: &mut StdRng,
        predictors: &Mat<f64>,
        trials: &[u64],
        final_state: &[f64],
    ) -> Vec<f64> {
        debug_assert_eq!(predictors.ncols(), self.observation.predictor_dimension());
        let coefficients = self.observation.coefficients();
        let coefficients = coefficients.borrow();
        let mut state = final_state.to_vec();
        let mut forecast = Vec::with_capacity(trials.len());
        for (row, &trials_at) in trials.iter().enumerate() {
            self.engine.advance(&mut state, rng);
            let eta = self.engine.contribution(&state) + coefficients.predict_row(predictors, row);
            let probability = logistic_stable(eta);
            forecast.push(count_to_f64(sample_binomial(rng, trials_at, probability)));
        }
        forecast
    }

    /// One-step-ahead prediction errors over a holdout window.
    ///
    /// Starting from the terminal training state, each step scores the
    /// observed count against the predicted expectation, then augments the
    /// holdout observation through `imputer` and folds it into the filter.
    ///
    /// # Errors
    ///
    /// Propagates filter failures as `LatentStateError`.
    pub fn one_step_holdout_prediction_errors(
        &self,
        rng: &mut StdRng,
        imputer: &BinomialLogitImputer,
        response: &[f64],
        trials: &[u64],
        predictors: &Mat<f64>,
        final_state: &[f64],
    ) -> Result<Vec<f64>, LogitModelError> {
        debug_assert_eq!(response.len(), trials.len());
        debug_assert_eq!(response.len(), predictors.nrows());
        let coefficients = self.observation.coefficients();
        let coefficients = coefficients.borrow();

        let mut mean = self.engine.contribution(final_state);
        let mut variance = 0.0;
        let mut errors = Vec::with_capacity(response.len());
        for row in 0..response.len() {
            let regression_part = coefficients.predict_row(predictors, row);
            let eta = mean + regression_part;
            let expected = count_to_f64(trials[row]) * logistic_stable(eta);
            errors.push(response[row] - expected);

            let successes = response_to_count(response[row], trials[row]);
            let pseudo = imputer.impute(rng, successes, trials[row], eta);
            let adjusted = if pseudo.is_missing() {
                pseudo
            } else {
                PseudoObservation {
                    value: pseudo.value - regression_part,
                    precision: pseudo.precision,
                }
            };
            self.engine.filter_update(&mut mean, &mut variance, &adjusted)?;
        }
        Ok(errors)
    }
}

/// Holdout responses arrive as reals; imputation needs a count in
/// `[0, trials]`.
fn response_to_count(response: f64, trials: u64) -> u64 {
    response.round().to_u64().unwrap_or(0).min(trials)
}

#[expect(clippy::cast_precision_loss, reason = "trial counts stay far below 2^53")]
const fn count_to_f64(value: u64) -> f64 {
    value as f64
}
