//! # Models
//!
//! Observation-model implementations for structural time series with
//! discrete responses. Currently: binomial counts through a logistic link.

pub mod logit;
