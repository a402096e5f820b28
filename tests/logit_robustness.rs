use faer::Mat;
use rand::SeedableRng;
use rand::rngs::StdRng;

use binomial_bsts::{
    ForecastData, GaussianSlab, HoldoutData, InputError, LogitModelManager, LogitModelError,
    ModelOptions, ObservationPrior, ParameterRegistry, SeriesData, SpikeSlabPrior,
};

fn manager_with_model(series: &SeriesData) -> LogitModelManager {
    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();
    manager
        .create_observation_model(
            Some(series),
            &ObservationPrior::ExcludeAll,
            &ModelOptions::default(),
            &mut registry,
        )
        .expect("construction should succeed");
    manager
}

#[test]
fn holdout_unpack_rejects_response_predictor_mismatch() {
    // Response length 5 against 4 predictor rows: hard failure, no context.
    let mut manager = manager_with_model(&SeriesData::new(vec![3, 7], vec![10, 10]));
    let holdout = HoldoutData::new(vec![1.0; 5], vec![10; 5])
        .with_predictors(Mat::from_fn(4, 1, |_, _| 1.0));
    let error = manager.unpack_holdout_data(&holdout).expect_err("size mismatch");
    assert!(matches!(
        error,
        LogitModelError::HoldoutSizeMismatch {
            response: 5,
            predictors: 4,
            trials: 5,
        }
    ));

    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(
        manager.one_step_holdout_prediction_errors(&mut rng, &[0.0]),
        Err(LogitModelError::HoldoutContextMissing)
    ));
}

#[test]
fn construction_rejects_malformed_series() {
    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();

    let too_many_successes = SeriesData::new(vec![6], vec![5]);
    let error = manager
        .create_observation_model(
            Some(&too_many_successes),
            &ObservationPrior::ExcludeAll,
            &ModelOptions::default(),
            &mut registry,
        )
        .expect_err("successes above trials");
    assert!(matches!(
        error,
        LogitModelError::InvalidInput(InputError::SuccessesExceedTrials { index: 0 })
    ));

    let empty = SeriesData::new(Vec::new(), Vec::new());
    let error = manager
        .create_observation_model(
            Some(&empty),
            &ObservationPrior::ExcludeAll,
            &ModelOptions::default(),
            &mut registry,
        )
        .expect_err("empty series");
    assert!(matches!(
        error,
        LogitModelError::InvalidInput(InputError::EmptySeries)
    ));
    assert!(manager.model().is_none());
}

#[test]
fn construction_rejects_a_prior_of_the_wrong_dimension() {
    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();
    let prior = ObservationPrior::SpikeSlab(SpikeSlabPrior::new(
        GaussianSlab::diffuse(3),
        vec![0.5; 3],
    ));
    let error = manager
        .create_observation_model(
            Some(&SeriesData::new(vec![3, 7], vec![10, 10])),
            &prior,
            &ModelOptions::default(),
            &mut registry,
        )
        .expect_err("prior is wider than the intercept-only design");
    assert!(matches!(
        error,
        LogitModelError::PriorDimensionMismatch {
            prior: 3,
            predictors: 1,
        }
    ));
    assert!(manager.model().is_none());
}

#[test]
fn extreme_series_keep_the_sampler_finite() {
    // All failures, all successes, and zero-trial rows in one series.
    let series = SeriesData::new(vec![0, 10, 0, 10, 0], vec![10, 10, 0, 10, 10]);
    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();
    let prior =
        ObservationPrior::SpikeSlab(SpikeSlabPrior::new(GaussianSlab::diffuse(1), vec![1.0]));
    let model = manager
        .create_observation_model(Some(&series), &prior, &ModelOptions::default(), &mut registry)
        .expect("construction should succeed");

    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..30 {
        model.sample_posterior(&mut rng).expect("iteration should succeed");
        assert!(model.state_contribution().iter().all(|value| value.is_finite()));
        let coefficients = model.observation_model().coefficients();
        assert!(coefficients.borrow().value(0).is_finite());
    }
    // The zero-trial row never carries augmented information.
    assert!(model.observation_model().data()[2].latent.is_missing());
}

#[test]
fn tiny_clt_threshold_routes_everything_through_the_clt_path() {
    let series = SeriesData::new(vec![1, 2, 3], vec![4, 5, 6]);
    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();
    let model = manager
        .create_observation_model(
            Some(&series),
            &ObservationPrior::ExcludeAll,
            &ModelOptions::with_clt_threshold(1),
            &mut registry,
        )
        .expect("construction should succeed");

    let mut rng = StdRng::seed_from_u64(29);
    for _ in 0..10 {
        model.sample_posterior(&mut rng).expect("iteration should succeed");
    }
    assert!(model
        .observation_model()
        .data()
        .iter()
        .all(|record| record.latent.precision > 0.0));
}

#[test]
fn mostly_missing_series_still_samples() {
    let series = SeriesData::new(vec![2, 3, 1, 4], vec![8, 8, 8, 8])
        .with_observed(vec![false, true, false, false]);
    let mut manager = manager_with_model(&series);
    let model = manager.model_mut().expect("model installed");

    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..15 {
        model.sample_posterior(&mut rng).expect("iteration should succeed");
    }
    assert_eq!(model.state_contribution().len(), 4);
    let data = model.observation_model().data();
    assert!(data[0].latent.is_missing());
    assert!(!data[1].latent.is_missing());
}

#[test]
fn evaluation_without_a_model_is_rejected() {
    let manager = LogitModelManager::new();
    let mut rng = StdRng::seed_from_u64(37);
    assert!(matches!(
        manager.simulate_forecast(&mut rng, &[0.0]),
        Err(LogitModelError::ModelNotBuilt)
    ));
    assert!(matches!(
        manager.one_step_holdout_prediction_errors(&mut rng, &[0.0]),
        Err(LogitModelError::ModelNotBuilt)
    ));
}

#[test]
fn holdout_errors_shrink_for_well_predicted_series() {
    // A balanced series keeps the level near zero; holding out the same rate
    // should score errors well inside the trial count.
    let series = SeriesData::new(vec![5; 30], vec![10; 30]);
    let mut manager = manager_with_model(&series);
    {
        let model = manager.model_mut().expect("model installed");
        let mut rng = StdRng::seed_from_u64(41);
        for _ in 0..40 {
            model.sample_posterior(&mut rng).expect("iteration should succeed");
        }
    }
    let final_state =
        vec![*manager.model().expect("model installed").state_contribution().last().expect("non-empty")];

    manager
        .unpack_holdout_data(&HoldoutData::new(vec![5.0; 8], vec![10; 8]))
        .expect("unpack should succeed");
    let mut rng = StdRng::seed_from_u64(43);
    let errors = manager
        .one_step_holdout_prediction_errors(&mut rng, &final_state)
        .expect("evaluation should succeed");
    assert_eq!(errors.len(), 8);
    let mean_abs = errors.iter().map(|e| e.abs()).sum::<f64>() / 8.0;
    assert!(mean_abs < 4.0, "one-step errors too large: {mean_abs}");
}

#[test]
fn unpacking_overwrites_the_previous_context() {
    let mut manager = manager_with_model(&SeriesData::new(vec![3, 7], vec![10, 10]));
    manager
        .unpack_forecast_data(&ForecastData::new(vec![10; 5]))
        .expect("unpack should succeed");
    manager
        .unpack_forecast_data(&ForecastData::new(vec![10; 2]))
        .expect("unpack should succeed");

    let mut rng = StdRng::seed_from_u64(47);
    let forecast = manager
        .simulate_forecast(&mut rng, &[0.0])
        .expect("simulation should succeed");
    assert_eq!(forecast.len(), 2);
}
