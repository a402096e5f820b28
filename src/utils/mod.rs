//! # Utilities
//!
//! Shared numeric helpers: Cholesky factorization for small symmetric
//! positive-definite systems, random-draw primitives, and faer matrix checks.

use faer::Mat;
use rand::Rng;
use rand::rngs::StdRng;

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix,
/// or `None` when the matrix is not positive definite.
#[must_use]
pub fn cholesky_decompose(matrix: &Mat<f64>) -> Option<Mat<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return None;
    }
    let mut lower = Mat::<f64>::zeros(n, n);
    for row in 0..n {
        for col in 0..=row {
            let mut sum = matrix[(row, col)];
            for k in 0..col {
                sum -= lower[(row, k)] * lower[(col, k)];
            }
            if row == col {
                if !(sum > 0.0 && sum.is_finite()) {
                    return None;
                }
                lower[(row, row)] = sum.sqrt();
            } else {
                lower[(row, col)] = sum / lower[(col, col)];
            }
        }
    }
    Some(lower)
}

/// Solve `L L' x = b` given the lower Cholesky factor `L`.
#[must_use]
pub fn cholesky_solve(lower: &Mat<f64>, rhs: &[f64]) -> Vec<f64> {
    let n = lower.nrows();
    let mut forward = vec![0.0; n];
    for row in 0..n {
        let mut sum = rhs[row];
        for k in 0..row {
            sum -= lower[(row, k)] * forward[k];
        }
        forward[row] = sum / lower[(row, row)];
    }
    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = forward[row];
        for k in (row + 1)..n {
            sum -= lower[(k, row)] * solution[k];
        }
        solution[row] = sum / lower[(row, row)];
    }
    solution
}

/// Log-determinant of `L L'` from the lower Cholesky factor `L`.
#[must_use]
pub fn cholesky_log_det(lower: &Mat<f64>) -> f64 {
    (0..lower.nrows())
        .map(|idx| 2.0 * lower[(idx, idx)].ln())
        .sum()
}

/// Draw `x ~ N(0, (L L')^{-1})` by back-substituting standard normals
/// through `L'`.
#[must_use]
pub fn sample_from_precision_cholesky(lower: &Mat<f64>, rng: &mut StdRng) -> Vec<f64> {
    let n = lower.nrows();
    let mut draw = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = sample_standard_normal(rng);
        for k in (row + 1)..n {
            sum -= lower[(k, row)] * draw[k];
        }
        draw[row] = sum / lower[(row, row)];
    }
    draw
}

/// One standard normal draw via Box-Muller.
#[must_use]
pub fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// One binomial draw: per-trial Bernoulli summation for moderate counts, a
/// clamped normal approximation for very large ones.
#[must_use]
pub fn sample_binomial(rng: &mut StdRng, trials: u64, probability: f64) -> u64 {
    const EXACT_TRIALS: u64 = 1_024;
    let p = probability.clamp(0.0, 1.0);
    if trials <= EXACT_TRIALS {
        let mut successes = 0;
        for _ in 0..trials {
            if rng.random::<f64>() < p {
                successes += 1;
            }
        }
        return successes;
    }
    #[expect(clippy::cast_precision_loss, reason = "trial counts stay far below 2^53")]
    let n = trials as f64;
    let mean = n * p;
    let variance = (n * p * (1.0 - p)).max(f64::MIN_POSITIVE);
    let draw = variance
        .sqrt()
        .mul_add(sample_standard_normal(rng), mean)
        .round()
        .clamp(0.0, n);
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "clamped to [0, trials]"
    )]
    let successes = draw as u64;
    successes
}

/// Dot product of a matrix row with a coefficient slice.
#[must_use]
pub fn dot_row(matrix: &Mat<f64>, row: usize, values: &[f64]) -> f64 {
    (0..matrix.ncols())
        .map(|col| matrix[(row, col)] * values[col])
        .sum()
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}
