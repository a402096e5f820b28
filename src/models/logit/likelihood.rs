//! Link functions and normal helpers for the binomial-logit observation model.

use statrs::function::erf::erf;

const EPS_PROBABILITY: f64 = 1.0e-12;

/// Stable logistic transform.
#[must_use]
pub fn logistic_stable(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

/// Bound probability away from exact 0 and 1.
#[must_use]
pub fn clamp_probability(probability: f64) -> f64 {
    probability.clamp(EPS_PROBABILITY, 1.0 - EPS_PROBABILITY)
}

/// Logit transform with clipping.
#[must_use]
pub fn logit(probability: f64) -> f64 {
    let p = clamp_probability(probability);
    (p / (1.0 - p)).ln()
}

/// Density of the standard normal.
#[must_use]
pub fn standard_normal_pdf(value: f64) -> f64 {
    (-0.5 * value * value).exp() / std::f64::consts::TAU.sqrt()
}

/// CDF of the standard normal with finite clipping.
#[must_use]
pub fn standard_normal_cdf(value: f64) -> f64 {
    clamp_probability(0.5 * (1.0 + erf(value / std::f64::consts::SQRT_2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn logistic_is_bounded() {
        assert!(logistic_stable(-1_000.0) >= 0.0);
        assert!(logistic_stable(1_000.0) <= 1.0);
    }

    #[test]
    fn logit_inverts_logistic() {
        for eta in [-3.0, -0.5, 0.0, 1.7] {
            assert_relative_eq!(logit(logistic_stable(eta)), eta, epsilon = 1.0e-9);
        }
    }

    #[test]
    fn normal_cdf_is_half_at_zero() {
        assert_relative_eq!(standard_normal_cdf(0.0), 0.5, epsilon = 1.0e-12);
    }

    #[test]
    fn normal_pdf_is_symmetric() {
        assert_relative_eq!(
            standard_normal_pdf(1.3),
            standard_normal_pdf(-1.3),
            epsilon = 1.0e-15
        );
    }
}
