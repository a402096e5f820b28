//! Binomial-logit structural time-series model.
//!
//! Observations are binomial counts tied to covariates through a logistic
//! link, with optional spike-and-slab variable selection over the regression
//! coefficients. Data augmentation turns each count into a Gaussian
//! pseudo-observation so that coefficients and latent state are both drawn
//! with linear-Gaussian machinery.
//!
//! [`LogitModelManager`] is the entry point: it assembles the model, wires
//! the samplers, ingests data, and exposes forecast and holdout evaluation.
//! The MCMC loop itself is driven by the caller, one
//! [`StateSpaceLogitModel::sample_posterior`] call per iteration.

pub mod imputer;
pub mod likelihood;
pub mod manager;
pub mod model;
pub mod observation;
pub mod priors;
pub mod sampler;
pub mod types;

pub use imputer::{BinomialLogitImputer, DEFAULT_CLT_THRESHOLD};
pub use manager::{COEFFICIENTS_PARAMETER, LogitModelManager};
pub use model::StateSpaceLogitModel;
pub use observation::{AugmentedBinomialObservation, BinomialLogitRegression, GlmCoefficients};
pub use priors::{GaussianSlab, ObservationPrior, SpikeSlabPrior};
pub use sampler::{SpikeSlabLogitSampler, StateSpacePosteriorSampler};
pub use types::{LogitModelError, ModelOptions};
