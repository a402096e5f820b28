//! Errors and option structs for the binomial-logit state-space module.

use crate::input::InputError;
use crate::latent::LatentStateError;
use thiserror::Error;

/// Errors returned by model construction, data ingestion, sampling, and
/// evaluation.
#[derive(Debug, Error)]
pub enum LogitModelError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    LatentState(#[from] LatentStateError),
    #[error("predictor dimension must be set before building a dimension-only model")]
    MissingPredictorDimension,
    #[error("CLT threshold must be at least 1")]
    InvalidCltThreshold,
    #[error("invalid spike-and-slab prior configuration")]
    InvalidPrior,
    #[error("prior covers {prior} coefficients but the model has {predictors} predictors")]
    PriorDimensionMismatch { prior: usize, predictors: usize },
    #[error(
        "holdout data of the wrong size: response has {response} rows, \
         predictors {predictors}, trials {trials}"
    )]
    HoldoutSizeMismatch {
        response: usize,
        predictors: usize,
        trials: usize,
    },
    #[error("no model has been built yet")]
    ModelNotBuilt,
    #[error("forecast data must be unpacked before simulating a forecast")]
    ForecastContextMissing,
    #[error("holdout data must be unpacked before computing prediction errors")]
    HoldoutContextMissing,
    #[error("posterior samplers must be attached before sampling")]
    SamplerNotAttached,
    #[error("coefficient posterior solve failed")]
    SolveFailed,
    #[error("posterior draw produced a non-finite value")]
    NonFiniteDraw,
}

/// Options recognized by model construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelOptions {
    /// Trial-count cutoff above which data augmentation switches from the
    /// exact mixture representation to the CLT approximation. `None` keeps
    /// the manager's current threshold (5 unless previously configured).
    pub clt_threshold: Option<u32>,
}

impl ModelOptions {
    /// Options that keep every threshold at its current value.
    #[must_use]
    pub const fn keep_current() -> Self {
        Self {
            clt_threshold: None,
        }
    }

    #[must_use]
    pub const fn with_clt_threshold(threshold: u32) -> Self {
        Self {
            clt_threshold: Some(threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_keep_current_threshold() {
        assert!(ModelOptions::default().clt_threshold.is_none());
        assert!(ModelOptions::keep_current().clt_threshold.is_none());
    }

    #[test]
    fn explicit_threshold_is_carried() {
        assert_eq!(ModelOptions::with_clt_threshold(9).clt_threshold, Some(9));
    }
}
