//! Model-manager entry points: construction and wiring, data ingestion, and
//! forecast/holdout evaluation.

use std::cell::RefCell;
use std::rc::Rc;

use faer::Mat;
use rand::rngs::StdRng;

use crate::input::{FittedSeries, ForecastData, HoldoutData, InputError, SeriesData, design_or_intercept};
use crate::models::logit::imputer::{BinomialLogitImputer, DEFAULT_CLT_THRESHOLD};
use crate::models::logit::model::StateSpaceLogitModel;
use crate::models::logit::observation::AugmentedBinomialObservation;
use crate::models::logit::priors::{ObservationPrior, SpikeSlabPrior};
use crate::models::logit::sampler::{SpikeSlabLogitSampler, StateSpacePosteriorSampler};
use crate::models::logit::types::{LogitModelError, ModelOptions};
use crate::reporting::ParameterRegistry;

/// Registry name under which the regression coefficients are reported.
pub const COEFFICIENTS_PARAMETER: &str = "coefficients";

/// Ephemeral forecast/holdout context, overwritten on each unpack. A holdout
/// context is a forecast context plus the observed responses.
#[derive(Debug, Clone)]
struct EvaluationContext {
    predictors: Mat<f64>,
    trials: Vec<u64>,
    response: Option<Vec<f64>>,
}

/// Owns the model instance and drives its assembly, data ingestion, and
/// out-of-sample evaluation. One manager serves one sequential sampling loop.
#[derive(Debug)]
pub struct LogitModelManager {
    model: Option<StateSpaceLogitModel>,
    predictor_dimension: Option<usize>,
    clt_threshold: u32,
    context: Option<EvaluationContext>,
}

impl Default for LogitModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LogitModelManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            model: None,
            predictor_dimension: None,
            clt_threshold: DEFAULT_CLT_THRESHOLD,
            context: None,
        }
    }

    /// Predictor dimension used when building a dimension-only model.
    pub fn set_predictor_dimension(&mut self, dimension: usize) {
        self.predictor_dimension = Some(dimension);
    }

    #[must_use]
    pub const fn clt_threshold(&self) -> u32 {
        self.clt_threshold
    }

    #[must_use]
    pub const fn model(&self) -> Option<&StateSpaceLogitModel> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut StateSpaceLogitModel> {
        self.model.as_mut()
    }

    /// Build the observation model, wire its samplers, and install it,
    /// replacing any previously held instance.
    ///
    /// With `data` present the model is built from the series (synthesizing
    /// an intercept column when no predictors were supplied); without data a
    /// dimension-only skeleton is built from the previously set predictor
    /// dimension. A `SpikeSlab` prior yields a variable-selection sampler and
    /// registers the coefficients under [`COEFFICIENTS_PARAMETER`];
    /// `ExcludeAll` yields a degenerate sampler that pins the coefficients at
    /// zero, registering nothing and clearing any previous registration under
    /// that name.
    ///
    /// # Errors
    ///
    /// Any failure leaves the previously installed model (and the manager's
    /// threshold) untouched: `MissingPredictorDimension`,
    /// `InvalidCltThreshold`, `InvalidPrior`, `PriorDimensionMismatch`, or an
    /// `InputError` from series validation.
    pub fn create_observation_model(
        &mut self,
        data: Option<&SeriesData>,
        prior: &ObservationPrior,
        options: &ModelOptions,
        registry: &mut ParameterRegistry,
    ) -> Result<&mut StateSpaceLogitModel, LogitModelError> {
        let clt_threshold = match options.clt_threshold {
            Some(value) if value >= 1 => value,
            Some(_) => return Err(LogitModelError::InvalidCltThreshold),
            None => self.clt_threshold,
        };

        let mut model = match data {
            Some(series) => {
                series.validate()?;
                let regression = series.predictors.is_some();
                let design = design_or_intercept(series.predictors.as_ref(), series.len());
                let mut model = StateSpaceLogitModel::from_data(
                    &series.successes,
                    &series.trials,
                    &design,
                    &series.observed,
                );
                // Both modes share one type, so the flag is recorded here.
                model.set_regression_flag(regression);
                model
            }
            None => {
                let dimension = self
                    .predictor_dimension
                    .ok_or(LogitModelError::MissingPredictorDimension)?;
                StateSpaceLogitModel::new(dimension)
            }
        };

        let coefficients = model.observation_model().coefficients();
        let sampler = match prior {
            ObservationPrior::SpikeSlab(prior_spec) => {
                if !prior_spec.is_valid() {
                    return Err(LogitModelError::InvalidPrior);
                }
                let mut sampler = SpikeSlabLogitSampler::new(
                    Rc::clone(&coefficients),
                    prior_spec.slab.clone(),
                    prior_spec.inclusion_probabilities.clone(),
                    clt_threshold,
                )?;
                if let Some(max_flips) = prior_spec.max_flips {
                    if max_flips > 0 {
                        sampler.limit_model_selection(max_flips);
                    }
                }
                registry.add(COEFFICIENTS_PARAMETER, coefficients);
                sampler
            }
            ObservationPrior::ExcludeAll => {
                let degenerate =
                    SpikeSlabPrior::exclude_all(model.observation_model().predictor_dimension());
                let sampler = SpikeSlabLogitSampler::new(
                    coefficients,
                    degenerate.slab,
                    degenerate.inclusion_probabilities,
                    clt_threshold,
                )?;
                // A same-named registration would keep snapshotting the
                // replaced model's coefficients.
                registry.remove(COEFFICIENTS_PARAMETER);
                sampler
            }
        };

        // Both the observation model and the full model need the sampler; the
        // two attachment points share one instance.
        let sampler = Rc::new(RefCell::new(sampler));
        model.observation_model_mut().set_method(Rc::clone(&sampler));
        model.set_method(StateSpacePosteriorSampler::new(sampler));

        self.clt_threshold = clt_threshold;
        Ok(self.model.insert(model))
    }

    /// Re-ingest the training series retained by a previous fit.
    ///
    /// # Errors
    ///
    /// See [`LogitModelManager::add_data_from_series`].
    pub fn add_data_from_fit(&mut self, fit: &FittedSeries) -> Result<(), LogitModelError> {
        self.add_data_from_series(fit.original_series())
    }

    /// Validate a raw series and append its rows to the installed model.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotBuilt` without a model, or an `InputError` from
    /// validation.
    pub fn add_data_from_series(&mut self, series: &SeriesData) -> Result<(), LogitModelError> {
        series.validate()?;
        let design = design_or_intercept(series.predictors.as_ref(), series.len());
        self.add_data(&series.successes, &series.trials, &design, &series.observed)
    }

    /// Append one augmented record per row, in order, marking rows missing
    /// when their observed flag is false. Equal row counts across the four
    /// inputs are a caller-guaranteed precondition.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotBuilt` when no model is installed.
    pub fn add_data(
        &mut self,
        successes: &[u64],
        trials: &[u64],
        predictors: &Mat<f64>,
        observed: &[bool],
    ) -> Result<(), LogitModelError> {
        debug_assert_eq!(successes.len(), trials.len());
        debug_assert_eq!(successes.len(), predictors.nrows());
        debug_assert_eq!(successes.len(), observed.len());
        let model = self.model.as_mut().ok_or(LogitModelError::ModelNotBuilt)?;
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
        Ok(())
    }

    /// Evaluation designs must be as wide as the installed model; without a
    /// model the check waits for the next construction.
    fn check_design_width(&self, predictors: &Mat<f64>) -> Result<(), LogitModelError> {
        if let Some(model) = &self.model {
            let expected = model.observation_model().predictor_dimension();
            if predictors.ncols() != expected {
                return Err(InputError::PredictorColumnMismatch {
                    cols: predictors.ncols(),
                    expected,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Store trials and predictors for a future horizon; returns the horizon.
    ///
    /// # Errors
    ///
    /// Returns an `InputError` when supplied predictor rows disagree with the
    /// trials length, or when the design width disagrees with the installed
    /// model's predictor dimension.
    pub fn unpack_forecast_data(&mut self, data: &ForecastData) -> Result<usize, LogitModelError> {
        let horizon = data.trials.len();
        if let Some(predictors) = &data.predictors {
            if predictors.nrows() != horizon {
                return Err(InputError::PredictorRowMismatch {
                    rows: predictors.nrows(),
                    expected: horizon,
                }
                .into());
            }
        }
        let predictors = design_or_intercept(data.predictors.as_ref(), horizon);
        self.check_design_width(&predictors)?;
        self.context = Some(EvaluationContext {
            predictors,
            trials: data.trials.clone(),
            response: None,
        });
        Ok(horizon)
    }

    /// Simulate one observation trajectory over the stored forecast horizon
    /// from the terminal state of one posterior draw.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotBuilt` or `ForecastContextMissing`.
    pub fn simulate_forecast(
        &self,
        rng: &mut StdRng,
        final_state: &[f64],
    ) -> Result<Vec<f64>, LogitModelError> {
        let model = self.model.as_ref().ok_or(LogitModelError::ModelNotBuilt)?;
        let context = self
            .context
            .as_ref()
            .ok_or(LogitModelError::ForecastContextMissing)?;
        Ok(model.simulate_forecast(rng, &context.predictors, &context.trials, final_state))
    }

    /// Store a holdout window; returns its length.
    ///
    /// A size mismatch is a hard failure: nothing is installed and any stale
    /// context from a previous unpack is cleared, so mismatched shapes can
    /// never reach the evaluation step.
    ///
    /// # Errors
    ///
    /// Returns `HoldoutSizeMismatch` when predictor rows or trials disagree
    /// with the response length, or an `InputError` when the design width
    /// disagrees with the installed model's predictor dimension.
    pub fn unpack_holdout_data(&mut self, data: &HoldoutData) -> Result<usize, LogitModelError> {
        let n = data.response.len();
        let predictor_rows = data.predictors.as_ref().map_or(n, Mat::nrows);
        if predictor_rows != n || data.trials.len() != n {
            self.context = None;
            return Err(LogitModelError::HoldoutSizeMismatch {
                response: n,
                predictors: predictor_rows,
                trials: data.trials.len(),
            });
        }
        let predictors = design_or_intercept(data.predictors.as_ref(), n);
        if let Err(error) = self.check_design_width(&predictors) {
            self.context = None;
            return Err(error);
        }
        self.context = Some(EvaluationContext {
            predictors,
            trials: data.trials.clone(),
            response: Some(data.response.clone()),
        });
        Ok(n)
    }

    /// One-step-ahead prediction errors over the stored holdout window, using
    /// a freshly built imputer at the manager's current threshold.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotBuilt`, `HoldoutContextMissing` when the last unpack
    /// was not a holdout unpack, or a propagated filter failure.
    pub fn one_step_holdout_prediction_errors(
        &self,
        rng: &mut StdRng,
        final_state: &[f64],
    ) -> Result<Vec<f64>, LogitModelError> {
        let model = self.model.as_ref().ok_or(LogitModelError::ModelNotBuilt)?;
        let context = self
            .context
            .as_ref()
            .ok_or(LogitModelError::HoldoutContextMissing)?;
        let response = context
            .response
            .as_ref()
            .ok_or(LogitModelError::HoldoutContextMissing)?;
        let imputer = BinomialLogitImputer::new(self.clt_threshold);
        model.one_step_holdout_prediction_errors(
            rng,
            &imputer,
            response,
            &context.trials,
            &context.predictors,
            final_state,
        )
    }
}
