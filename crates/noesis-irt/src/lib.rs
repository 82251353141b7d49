//! 3-parameter logistic (3PL) Item Response Theory core.
//!
//! Pure, deterministic, side-effect-free functions over `(theta, a, b, c)`:
//! the item characteristic curve, the Fisher information function, and a
//! grid-based Expected A Posteriori (EAP) ability estimator with a 95%
//! credible interval. No I/O, no randomness, no wall-clock reads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrimination scaling constant used by the logistic-normal approximation.
pub const D: f64 = 1.7;

/// Lower bound of the ability grid used for EAP integration.
pub const GRID_MIN: f64 = -4.0;
/// Upper bound of the ability grid used for EAP integration.
pub const GRID_MAX: f64 = 4.0;
/// Number of equally spaced points on `[GRID_MIN, GRID_MAX]`.
pub const GRID_POINTS: usize = 161;
/// Spacing between consecutive grid points; `(GRID_MAX - GRID_MIN) / (GRID_POINTS - 1)`.
pub const GRID_STEP: f64 = 0.05;

/// Default prior mean for theta, empirically calibrated against the seed population.
pub const DEFAULT_THETA0: f64 = -0.780;
/// Default prior standard deviation for theta.
pub const DEFAULT_SIGMA0: f64 = 0.543;

/// Default guessing parameter used when an item's `c` is unspecified.
pub const C_DEFAULT: f64 = 0.25;

/// Predicted-correctness threshold above which an item is considered
/// "mastered" in the IRT sense (distinct from BKT's `pLearned` mastery).
pub const IRT_MASTERY_P_CORRECT: f64 = 0.80;

/// Errors produced by degenerate numeric conditions in the IRT core.
///
/// Per the kernel's error taxonomy these should never occur for validated
/// item parameters (`a > 0`, `c in [0, 1)`); callers must not expose
/// unvalidated parameters to these functions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IrtError {
    #[error("numeric error: {0}")]
    NumericError(String),
}

/// The three calibrated parameters of a 3PL item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParams {
    /// Discrimination, `a > 0`.
    pub a: f64,
    /// Difficulty, `b` on the same logit scale as theta.
    pub b: f64,
    /// Guessing (pseudo-chance) parameter, `c in [0, 1)`.
    pub c: f64,
}

impl ItemParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }
}

/// One scored response to an item, as consumed by [`eap_estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredResponse {
    pub params: ItemParams,
    pub correct: bool,
}

/// Result of a grid-based EAP ability estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EapEstimate {
    pub theta: f64,
    pub sd: f64,
    pub ci95_low: f64,
    pub ci95_high: f64,
}

/// The 3PL item characteristic function: `P(correct | theta)`.
///
/// Domain: `a > 0`, `c in [0, 1)`. Result lies in `[c, 1)` for any finite
/// theta, modulo floating-point rounding at extreme `theta - b`.
pub fn p3pl(theta: f64, params: ItemParams) -> f64 {
    let ItemParams { a, b, c } = params;
    c + (1.0 - c) / (1.0 + (-D * a * (theta - b)).exp())
}

/// Fisher information of an item at a given theta.
///
/// Fails with [`IrtError::NumericError`] if `p` lands on `0` or `1` after
/// evaluation — a degenerate condition that should not occur for `c in
/// (0, 1)` and a grid-bounded theta, but floating point can reach it at
/// extreme `theta - b`.
pub fn item_information(theta: f64, params: ItemParams) -> Result<f64, IrtError> {
    let p = p3pl(theta, params);
    if p <= 0.0 || p >= 1.0 {
        return Err(IrtError::NumericError(format!(
            "item_information: p3pl collapsed to {p} at theta={theta}, params={params:?}"
        )));
    }
    let ItemParams { a, c, .. } = params;
    let numerator = D * D * a * a * (p - c) * (p - c);
    let denominator = (1.0 - c) * (1.0 - c) * p * (1.0 - p);
    Ok(numerator / denominator)
}

fn grid() -> impl Iterator<Item = f64> {
    (0..GRID_POINTS).map(|i| GRID_MIN + i as f64 * GRID_STEP)
}

/// Grid-based EAP ability estimate with a 95% credible interval.
///
/// Uses the exact grid constants specified by the kernel (161 points on
/// `[-4, 4]`, step 0.05) for cross-implementation reproducibility. Empty
/// `responses` returns the prior unchanged (within grid resolution).
pub fn eap_estimate(
    responses: &[ScoredResponse],
    prior_mean: f64,
    prior_sd: f64,
) -> EapEstimate {
    let unnormalised: Vec<f64> = grid()
        .map(|t| {
            let prior = (-0.5 * ((t - prior_mean) / prior_sd).powi(2)).exp();
            let likelihood = responses.iter().fold(1.0_f64, |acc, r| {
                let p = p3pl(t, r.params);
                acc * if r.correct { p } else { 1.0 - p }
            });
            prior * likelihood
        })
        .collect();

    let total: f64 = unnormalised.iter().sum();
    let posterior: Vec<f64> = unnormalised.iter().map(|v| v / total).collect();

    let theta: f64 = grid()
        .zip(posterior.iter())
        .map(|(t, p)| t * p)
        .sum();

    let variance: f64 = grid()
        .zip(posterior.iter())
        .map(|(t, p)| (t - theta) * (t - theta) * p)
        .sum();
    let sd = variance.sqrt();

    let mut cumulative = 0.0;
    let mut ci95_low = GRID_MIN;
    let mut ci95_high = GRID_MAX;
    let mut low_found = false;
    let mut high_found = false;
    for (t, p) in grid().zip(posterior.iter()) {
        cumulative += p;
        if !low_found && cumulative >= 0.025 {
            ci95_low = t;
            low_found = true;
        }
        if !high_found && cumulative >= 0.975 {
            ci95_high = t;
            high_found = true;
            break;
        }
    }

    EapEstimate {
        theta,
        sd,
        ci95_low,
        ci95_high,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_params() -> impl Strategy<Value = ItemParams> {
        (0.1f64..3.0, -3.0f64..3.0, 0.0f64..0.45).prop_map(|(a, b, c)| ItemParams::new(a, b, c))
    }

    proptest! {
        #[test]
        fn p3pl_stays_in_c_one_range(theta in -6.0f64..6.0, params in valid_params()) {
            let p = p3pl(theta, params);
            prop_assert!(p >= params.c - 1e-9);
            prop_assert!(p < 1.0 + 1e-9);
        }

        #[test]
        fn item_information_nonnegative_when_defined(theta in -4.0f64..4.0, params in valid_params()) {
            if let Ok(info) = item_information(theta, params) {
                prop_assert!(info >= 0.0);
            }
        }
    }

    #[test]
    fn eap_of_empty_history_returns_prior_within_grid_resolution() {
        let result = eap_estimate(&[], DEFAULT_THETA0, DEFAULT_SIGMA0);
        assert!((result.theta - DEFAULT_THETA0).abs() < 0.05);
        assert!((result.sd - DEFAULT_SIGMA0).abs() < 0.1);
        assert!(result.ci95_low <= result.theta);
        assert!(result.theta <= result.ci95_high);
    }

    #[test]
    fn eap_shifts_upward_after_a_correct_response() {
        let params = ItemParams::new(1.2, -1.5, 0.25);
        let baseline = eap_estimate(&[], DEFAULT_THETA0, DEFAULT_SIGMA0);
        let after = eap_estimate(
            &[ScoredResponse {
                params,
                correct: true,
            }],
            DEFAULT_THETA0,
            DEFAULT_SIGMA0,
        );
        assert!(after.theta > baseline.theta);
    }

    #[test]
    fn item_information_fails_at_extreme_theta() {
        // a very steep item far from theta drives p toward 0 or 1 exactly.
        let params = ItemParams::new(50.0, 0.0, 0.0);
        let result = item_information(-4.0, params);
        assert!(result.is_err());
    }

    #[test]
    fn ci95_brackets_theta() {
        let params = ItemParams::new(1.2, -1.5, 0.25);
        let responses: Vec<ScoredResponse> = (0..5)
            .map(|i| ScoredResponse {
                params,
                correct: i % 2 == 0,
            })
            .collect();
        let result = eap_estimate(&responses, DEFAULT_THETA0, DEFAULT_SIGMA0);
        assert!(result.ci95_low <= result.theta + 1e-9);
        assert!(result.theta <= result.ci95_high + 1e-9);
    }
}
