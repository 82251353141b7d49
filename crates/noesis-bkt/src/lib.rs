//! Bayesian Knowledge Tracing (BKT) core.
//!
//! A two-state hidden Markov model (learned / not learned) per knowledge
//! component. Pure update functions plus the per-session KC state machine
//! built on top of them: zero I/O, zero randomness.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `pLearned >= MASTERY_THRESHOLD` is the BKT definition of "mastered".
pub const MASTERY_THRESHOLD: f64 = 0.95;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BktError {
    #[error("numeric error: {0}")]
    NumericError(String),
}

/// Calibrated BKT parameters for one knowledge component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KcParams {
    /// Prior probability of already having learned the KC.
    pub p_l0: f64,
    /// Probability of transitioning from not-learned to learned per opportunity.
    pub p_t: f64,
    /// Probability of slipping (incorrect despite having learned).
    pub p_s: f64,
    /// Probability of guessing (correct despite not having learned).
    pub p_g: f64,
}

/// Per-session, per-KC posterior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcState {
    pub kc_id: String,
    pub p_learned: f64,
    pub attempts: u32,
    pub correct: u32,
    pub is_mastered: bool,
}

impl KcState {
    pub fn initial(kc_id: impl Into<String>, params: KcParams) -> Self {
        let p_learned = params.p_l0.clamp(0.0, 1.0);
        Self {
            kc_id: kc_id.into(),
            p_learned,
            attempts: 0,
            correct: 0,
            is_mastered: p_learned >= MASTERY_THRESHOLD,
        }
    }
}

/// Bayesian filter update followed by the learning transition.
///
/// Returns the new `pLearned`, clamped to `[0, 1]`. Fails with
/// [`BktError::NumericError`] if both terms of the observation-update
/// denominator are zero — a degenerate parameter configuration that
/// callers must not expose (e.g. `pS=1, pG=0` with a zero prior).
pub fn update_bkt(p_learned: f64, is_correct: bool, params: KcParams) -> Result<f64, BktError> {
    let KcParams { p_t, p_s, p_g, .. } = params;

    let updated = if is_correct {
        let numerator = p_learned * (1.0 - p_s);
        let denominator = numerator + (1.0 - p_learned) * p_g;
        if denominator == 0.0 {
            return Err(BktError::NumericError(
                "update_bkt: zero denominator on correct-response update".into(),
            ));
        }
        numerator / denominator
    } else {
        let numerator = p_learned * p_s;
        let denominator = numerator + (1.0 - p_learned) * (1.0 - p_g);
        if denominator == 0.0 {
            return Err(BktError::NumericError(
                "update_bkt: zero denominator on incorrect-response update".into(),
            ));
        }
        numerator / denominator
    };

    let with_transition = updated + (1.0 - updated) * p_t;
    Ok(with_transition.clamp(0.0, 1.0))
}

/// Applies [`update_bkt`] to a KC state, returning a new state. The input
/// state is never mutated.
pub fn update_kc_state(
    state: &KcState,
    is_correct: bool,
    params: KcParams,
) -> Result<KcState, BktError> {
    let p_learned = update_bkt(state.p_learned, is_correct, params)?;
    Ok(KcState {
        kc_id: state.kc_id.clone(),
        p_learned,
        attempts: state.attempts + 1,
        correct: state.correct + u32::from(is_correct),
        is_mastered: p_learned >= MASTERY_THRESHOLD,
    })
}

/// Seeds initial states for every KC in the catalogue.
pub fn initialise_all_kcs(catalogue: &[(String, KcParams)]) -> HashMap<String, KcState> {
    catalogue
        .iter()
        .map(|(kc_id, params)| (kc_id.clone(), KcState::initial(kc_id.clone(), *params)))
        .collect()
}

/// Aggregated per-session mastery summary across the KC catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KcSummary {
    pub total: usize,
    pub mastered: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub overall_progress: u32,
}

/// Computes totals, mastered/in-progress/not-started counts, and
/// `overallProgress = round(100 * mastered / total)`.
pub fn summarize(states: &HashMap<String, KcState>) -> KcSummary {
    let total = states.len();
    let mastered = states.values().filter(|s| s.is_mastered).count();
    let not_started = states.values().filter(|s| s.attempts == 0).count();
    let in_progress = states
        .values()
        .filter(|s| s.attempts > 0 && !s.is_mastered)
        .count();
    let overall_progress = if total == 0 {
        0
    } else {
        ((mastered as f64 / total as f64) * 100.0).round() as u32
    };
    KcSummary {
        total,
        mastered,
        in_progress,
        not_started,
        overall_progress,
    }
}

/// The non-mastered KC with the lowest `pLearned`, ties broken
/// lexicographically by `kcId`. `None` if every KC is mastered.
pub fn weakest_unmastered(states: &HashMap<String, KcState>) -> Option<&KcState> {
    states
        .values()
        .filter(|s| !s.is_mastered)
        .min_by(|a, b| {
            a.p_learned
                .partial_cmp(&b.p_learned)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.kc_id.cmp(&b.kc_id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UK_CAPITALS: KcParams = KcParams {
        p_l0: 0.60,
        p_t: 0.25,
        p_s: 0.08,
        p_g: 0.25,
    };

    #[test]
    fn single_correct_response_matches_worked_example() {
        let result = update_bkt(UK_CAPITALS.p_l0, true, UK_CAPITALS).unwrap();
        assert!((result - 0.884_975).abs() < 1e-5);
    }

    #[test]
    fn all_correct_sequence_increases_p_learned_monotonically() {
        let mut p = 0.3_f64;
        for _ in 0..5 {
            let next = update_bkt(p, true, UK_CAPITALS).unwrap();
            assert!(next > p);
            p = next;
        }
    }

    #[test]
    fn all_incorrect_sequence_never_exceeds_transition_floor() {
        // incorrect responses still add p_t worth of learning each step, but
        // the pre-transition (filtered) term must not increase.
        let mut p = 0.6_f64;
        for _ in 0..5 {
            let filtered = {
                let numerator = p * UK_CAPITALS.p_s;
                let denominator = numerator + (1.0 - p) * (1.0 - UK_CAPITALS.p_g);
                numerator / denominator
            };
            assert!(filtered <= p);
            p = update_bkt(p, false, UK_CAPITALS).unwrap();
        }
    }

    #[test]
    fn initialise_all_kcs_seeds_catalogue_defaults() {
        let catalogue = vec![("UK_capitals".to_string(), UK_CAPITALS)];
        let states = initialise_all_kcs(&catalogue);
        let state = &states["UK_capitals"];
        assert_eq!(state.p_learned, 0.60);
        assert_eq!(state.attempts, 0);
        assert!(!state.is_mastered);
    }

    #[test]
    fn weakest_unmastered_breaks_ties_lexicographically() {
        let mut states = HashMap::new();
        states.insert(
            "b_kc".to_string(),
            KcState {
                kc_id: "b_kc".into(),
                p_learned: 0.4,
                attempts: 1,
                correct: 0,
                is_mastered: false,
            },
        );
        states.insert(
            "a_kc".to_string(),
            KcState {
                kc_id: "a_kc".into(),
                p_learned: 0.4,
                attempts: 1,
                correct: 0,
                is_mastered: false,
            },
        );
        let weakest = weakest_unmastered(&states).unwrap();
        assert_eq!(weakest.kc_id, "a_kc");
    }

    proptest! {
        #[test]
        fn update_bkt_result_always_in_unit_interval(
            p_learned in 0.0f64..1.0,
            is_correct in any::<bool>(),
            p_t in 0.0f64..1.0,
            p_s in 0.0f64..0.5,
            p_g in 0.0f64..0.5,
        ) {
            let params = KcParams { p_l0: p_learned, p_t, p_s, p_g };
            if let Ok(result) = update_bkt(p_learned, is_correct, params) {
                prop_assert!((0.0..=1.0).contains(&result));
                let state = KcState::initial("kc", params);
                let next = update_kc_state(&state, is_correct, params).unwrap();
                prop_assert_eq!(next.is_mastered, next.p_learned >= MASTERY_THRESHOLD);
            }
        }
    }
}
