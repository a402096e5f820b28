//! # Model inputs
//!
//! Containers for binomial time-series data, forecast horizons, and holdout
//! windows, plus the shared helper that synthesizes an intercept column when
//! no predictors are supplied.
//!
//! # Examples
//!
//! ```
//! use binomial_bsts::SeriesData;
//!
//! let series = SeriesData::new(vec![3, 7], vec![10, 10]);
//! assert!(series.validate().is_ok());
//! ```

use faer::Mat;
use thiserror::Error;

use crate::utils::matrix_is_finite;

/// Errors returned when validating raw series data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("series must contain at least one observation")]
    EmptySeries,
    #[error("{field} length ({len}) must match successes length ({expected})")]
    LengthMismatch {
        field: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("successes exceed trials at row {index}")]
    SuccessesExceedTrials { index: usize },
    #[error("predictor rows ({rows}) must match series length ({expected})")]
    PredictorRowMismatch { rows: usize, expected: usize },
    #[error("predictor columns ({cols}) must match the model's predictor dimension ({expected})")]
    PredictorColumnMismatch { cols: usize, expected: usize },
    #[error("predictors contain non-finite values")]
    NonFinitePredictors,
}

/// One binomial time series: successes out of trials at each time point,
/// optional predictors, and per-row observed flags.
///
/// A row whose observed flag is `false` is treated as completely missing: it
/// keeps its time slot for state alignment but contributes no likelihood.
#[derive(Debug, Clone)]
pub struct SeriesData {
    pub successes: Vec<u64>,
    pub trials: Vec<u64>,
    pub predictors: Option<Mat<f64>>,
    pub observed: Vec<bool>,
}

impl SeriesData {
    /// Create a fully observed series with no predictors.
    #[must_use]
    pub fn new(successes: Vec<u64>, trials: Vec<u64>) -> Self {
        let observed = vec![true; successes.len()];
        Self {
            successes,
            trials,
            predictors: None,
            observed,
        }
    }

    #[must_use]
    pub fn with_predictors(mut self, predictors: Mat<f64>) -> Self {
        self.predictors = Some(predictors);
        self
    }

    #[must_use]
    pub fn with_observed(mut self, observed: Vec<bool>) -> Self {
        self.observed = observed;
        self
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.successes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.successes.is_empty()
    }

    /// Validate shapes and the successes-within-trials invariant.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if any component is malformed.
    pub fn validate(&self) -> Result<(), InputError> {
        let n = self.successes.len();
        if n == 0 {
            return Err(InputError::EmptySeries);
        }
        if self.trials.len() != n {
            return Err(InputError::LengthMismatch {
                field: "trials",
                len: self.trials.len(),
                expected: n,
            });
        }
        if self.observed.len() != n {
            return Err(InputError::LengthMismatch {
                field: "observed",
                len: self.observed.len(),
                expected: n,
            });
        }
        for (index, (successes, trials)) in
            self.successes.iter().zip(self.trials.iter()).enumerate()
        {
            if successes > trials {
                return Err(InputError::SuccessesExceedTrials { index });
            }
        }
        if let Some(predictors) = &self.predictors {
            if predictors.nrows() != n {
                return Err(InputError::PredictorRowMismatch {
                    rows: predictors.nrows(),
                    expected: n,
                });
            }
            if !matrix_is_finite(predictors) {
                return Err(InputError::NonFinitePredictors);
            }
        }
        Ok(())
    }
}

/// Artifact of a previous fit that retains the series it was trained on.
///
/// Lets callers re-ingest training data when reinstantiating a model without
/// carrying the raw inputs separately.
#[derive(Debug, Clone)]
pub struct FittedSeries {
    original: SeriesData,
}

impl FittedSeries {
    #[must_use]
    pub const fn new(original: SeriesData) -> Self {
        Self { original }
    }

    #[must_use]
    pub const fn original_series(&self) -> &SeriesData {
        &self.original
    }
}

/// Trial counts and predictors for a future forecast horizon.
#[derive(Debug, Clone)]
pub struct ForecastData {
    pub trials: Vec<u64>,
    pub predictors: Option<Mat<f64>>,
}

impl ForecastData {
    #[must_use]
    pub const fn new(trials: Vec<u64>) -> Self {
        Self {
            trials,
            predictors: None,
        }
    }

    #[must_use]
    pub fn with_predictors(mut self, predictors: Mat<f64>) -> Self {
        self.predictors = Some(predictors);
        self
    }
}

/// Observed responses, trial counts, and predictors for a holdout window.
#[derive(Debug, Clone)]
pub struct HoldoutData {
    pub response: Vec<f64>,
    pub trials: Vec<u64>,
    pub predictors: Option<Mat<f64>>,
}

impl HoldoutData {
    #[must_use]
    pub const fn new(response: Vec<f64>, trials: Vec<u64>) -> Self {
        Self {
            response,
            trials,
            predictors: None,
        }
    }

    #[must_use]
    pub fn with_predictors(mut self, predictors: Mat<f64>) -> Self {
        self.predictors = Some(predictors);
        self
    }
}

/// Return the supplied design matrix, or a single all-ones intercept column
/// when none was given.
///
/// Both construction modes funnel through this helper so the pure-intercept
/// model exercises the same regression machinery as a covariate model.
#[must_use]
pub fn design_or_intercept(predictors: Option<&Mat<f64>>, rows: usize) -> Mat<f64> {
    predictors.map_or_else(|| Mat::from_fn(rows, 1, |_, _| 1.0), Mat::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_plain_series() {
        let series = SeriesData::new(vec![1, 2], vec![5, 5]);
        assert!(series.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_series() {
        let series = SeriesData::new(Vec::new(), Vec::new());
        assert_eq!(series.validate(), Err(InputError::EmptySeries));
    }

    #[test]
    fn validate_rejects_successes_above_trials() {
        let series = SeriesData::new(vec![6], vec![5]);
        assert_eq!(
            series.validate(),
            Err(InputError::SuccessesExceedTrials { index: 0 })
        );
    }

    #[test]
    fn validate_rejects_trials_length_mismatch() {
        let series = SeriesData::new(vec![1, 2], vec![5]);
        assert_eq!(
            series.validate(),
            Err(InputError::LengthMismatch {
                field: "trials",
                len: 1,
                expected: 2,
            })
        );
    }

    #[test]
    fn validate_rejects_predictor_row_mismatch() {
        let series = SeriesData::new(vec![1, 2], vec![5, 5])
            .with_predictors(Mat::from_fn(3, 1, |_, _| 1.0));
        assert_eq!(
            series.validate(),
            Err(InputError::PredictorRowMismatch {
                rows: 3,
                expected: 2,
            })
        );
    }

    #[test]
    fn validate_rejects_non_finite_predictors() {
        let series = SeriesData::new(vec![1, 2], vec![5, 5])
            .with_predictors(Mat::from_fn(2, 1, |i, _| if i == 0 { f64::NAN } else { 1.0 }));
        assert_eq!(series.validate(), Err(InputError::NonFinitePredictors));
    }

    #[test]
    fn intercept_design_is_all_ones_single_column() {
        let design = design_or_intercept(None, 4);
        assert_eq!(design.nrows(), 4);
        assert_eq!(design.ncols(), 1);
        for i in 0..4 {
            assert!((design[(i, 0)] - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn supplied_design_passes_through_unchanged() {
        let supplied = Mat::from_fn(3, 2, |i, j| {
            if j == 0 {
                1.0
            } else {
                f64::from(u32::try_from(i).unwrap_or(u32::MAX))
            }
        });
        let design = design_or_intercept(Some(&supplied), 3);
        assert_eq!(design.ncols(), 2);
        assert!((design[(2, 1)] - 2.0).abs() < f64::EPSILON);
    }
}
