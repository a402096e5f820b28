use faer::Mat;
use rand::SeedableRng;
use rand::rngs::StdRng;

use binomial_bsts::{
    COEFFICIENTS_PARAMETER, ForecastData, GaussianSlab, HoldoutData, LogitModelManager,
    ModelOptions, ObservationPrior, ParameterRegistry, SeriesData, SpikeSlabPrior,
};

fn main() {
    let n = 60;
    let predictors = Mat::from_fn(n, 2, |i, j| {
        if j == 0 {
            1.0
        } else {
            (idx_to_f64(i) / 10.0).sin()
        }
    });
    let successes: Vec<u64> = (0..n)
        .map(|i| 3 + u64::try_from(i % 5).unwrap_or(0))
        .collect();
    let series = SeriesData::new(successes, vec![12; n]).with_predictors(predictors);

    let prior = ObservationPrior::SpikeSlab(
        SpikeSlabPrior::new(GaussianSlab::diffuse(2), vec![1.0, 0.5]).with_max_flips(10),
    );

    let mut manager = LogitModelManager::new();
    let mut registry = ParameterRegistry::new();
    let mut rng = StdRng::seed_from_u64(42);

    let final_state = {
        let model = manager
            .create_observation_model(Some(&series), &prior, &ModelOptions::default(), &mut registry)
            .expect("construction");
        for _ in 0..200 {
            model.sample_posterior(&mut rng).expect("posterior iteration");
            registry.record_draws();
        }
        vec![*model.state_contribution().last().expect("state")]
    };

    for (index, summary) in registry
        .summarize(COEFFICIENTS_PARAMETER)
        .expect("coefficients registered")
        .iter()
        .enumerate()
    {
        println!(
            "beta[{index}]: mean {:.3}, sd {:.3}, 95% [{:.3}, {:.3}]",
            summary.mean, summary.std_dev, summary.q025, summary.q975
        );
    }

    let horizon = manager
        .unpack_forecast_data(
            &ForecastData::new(vec![12; 8])
                .with_predictors(Mat::from_fn(8, 2, |_, j| if j == 0 { 1.0 } else { 0.3 })),
        )
        .expect("forecast unpack");
    let forecast = manager.simulate_forecast(&mut rng, &final_state).expect("forecast");
    println!("forecast over {horizon} steps: {forecast:?}");

    manager
        .unpack_holdout_data(
            &HoldoutData::new(vec![5.0, 4.0, 6.0, 5.0], vec![12; 4])
                .with_predictors(Mat::from_fn(4, 2, |_, j| if j == 0 { 1.0 } else { 0.3 })),
        )
        .expect("holdout unpack");
    let errors = manager
        .one_step_holdout_prediction_errors(&mut rng, &final_state)
        .expect("holdout evaluation");
    let cumulative: f64 = errors.iter().map(|e| e.abs()).sum();
    println!("one-step errors: {errors:?} (cumulative abs {cumulative:.2})");
}

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}
