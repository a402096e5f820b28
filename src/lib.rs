#![forbid(unsafe_code)]

//! # `binomial_bsts`
//!
//! Bayesian structural time-series modeling for binomial outcomes: a latent
//! Gaussian state process observed through a logistic link, with optional
//! spike-and-slab variable selection over regression coefficients.
//!
//! The crate covers model assembly and posterior-sampling configuration. A
//! [`LogitModelManager`] builds the observation model from raw series data (or
//! a dimension-only skeleton), attaches a data-augmentation-based posterior
//! sampler, and exposes forecasting and holdout evaluation. The caller owns
//! the MCMC loop and the random stream, calling
//! [`StateSpaceLogitModel::sample_posterior`] once per iteration.
//!
//! ```
//! use binomial_bsts::{
//!     GaussianSlab, LogitModelManager, ModelOptions, ObservationPrior, ParameterRegistry,
//!     SeriesData, SpikeSlabPrior,
//! };
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut manager = LogitModelManager::new();
//! let mut registry = ParameterRegistry::new();
//! let series = SeriesData::new(vec![3, 7], vec![10, 10]);
//! let prior = ObservationPrior::SpikeSlab(SpikeSlabPrior::new(
//!     GaussianSlab::diffuse(1),
//!     vec![1.0],
//! ));
//! let model = manager
//!     .create_observation_model(Some(&series), &prior, &ModelOptions::default(), &mut registry)
//!     .expect("construction succeeds");
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! for _ in 0..10 {
//!     model.sample_posterior(&mut rng).expect("iteration succeeds");
//!     registry.record_draws();
//! }
//! ```

pub mod input;
pub mod latent;
pub mod models;
pub mod reporting;
pub mod utils;

pub use input::{FittedSeries, ForecastData, HoldoutData, InputError, SeriesData};
pub use latent::{
    InverseGammaPrior, LatentStateEngine, LatentStateError, LocalLevel, PseudoObservation,
};
pub use models::logit::{
    AugmentedBinomialObservation, BinomialLogitImputer, BinomialLogitRegression,
    COEFFICIENTS_PARAMETER, DEFAULT_CLT_THRESHOLD, GaussianSlab, GlmCoefficients,
    LogitModelError, LogitModelManager, ModelOptions, ObservationPrior, SpikeSlabLogitSampler,
    SpikeSlabPrior, StateSpaceLogitModel, StateSpacePosteriorSampler,
};
pub use reporting::{ParameterHandle, ParameterRegistry, ParameterSummary, ReportedParameter};
