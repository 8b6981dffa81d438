//! Interacting Multiple Model (IMM) filter.
//!
//! Maintains a bank of five motion models (CV, CA1, CA2, CTR1, CTR2) per
//! track, mixed by a Markov mode-probability vector μ.
//!
//! Predict runs interaction (mixing) → per-model prediction → merge; mode
//! probabilities are unchanged by predict. Update runs a per-model Kalman
//! update, re-weights μ by the model likelihoods against the predicted mode
//! probabilities, and merges. Singular innovation covariances cause the
//! affected model to be skipped for that step; if every model is skipped the
//! previous merged estimate is retained and μ resets to uniform.

use crate::config::PredictionConfig;
use crate::models::{CaModel, CtrModel, CvModel, MotionModel};
use crate::types::{MeasCov, MeasMat, MeasVec, StateCov, StateVec, IMM_MODELS, MEAS_DIM};
use tracing::trace;

/// Per-track filter state: one (x, P) per model plus the mode probabilities
/// and the merged estimate exposed outside the filter.
#[derive(Clone, Debug)]
pub struct ImmState {
    pub model_states: [StateVec; IMM_MODELS],
    pub model_covariances: [StateCov; IMM_MODELS],
    /// Non-negative, sums to 1.
    pub mode_probabilities: [f64; IMM_MODELS],
    pub merged_state: StateVec,
    pub merged_covariance: StateCov,
}

impl ImmState {
    /// Seed every model with the same initial state and covariance.
    pub fn new(x0: StateVec, p0: StateCov, mode_probabilities: [f64; IMM_MODELS]) -> Self {
        Self {
            model_states: [x0; IMM_MODELS],
            model_covariances: [p0; IMM_MODELS],
            mode_probabilities,
            merged_state: x0,
            merged_covariance: p0,
        }
    }
}

/// Gaussian measurement likelihood with a 1e-30 floor, evaluated in log
/// space to survive extreme innovations.
pub(crate) fn gaussian_likelihood(innovation: &MeasVec, s: &MeasCov) -> f64 {
    let det = s.determinant();
    if det < 1e-30 {
        return 1e-30;
    }
    let Some(s_inv) = s.try_inverse() else {
        return 1e-30;
    };
    let d2 = (innovation.transpose() * s_inv * innovation)[(0, 0)];
    let log_lik =
        -0.5 * (MEAS_DIM as f64 * (2.0 * std::f64::consts::PI).ln() + det.ln() + d2);
    log_lik.exp().max(1e-30)
}

/// The shared model bank and mode transition matrix. Stateless across
/// tracks: each track owns its [`ImmState`].
pub struct ImmFilter {
    models: [MotionModel; IMM_MODELS],
    transition: [[f64; IMM_MODELS]; IMM_MODELS],
    initial_mode_probabilities: [f64; IMM_MODELS],
}

impl ImmFilter {
    pub fn new(cfg: &PredictionConfig) -> Self {
        Self {
            models: [
                MotionModel::ConstantVelocity(CvModel::new(cfg.cv.clone())),
                MotionModel::ConstantAcceleration(CaModel::new(cfg.ca1.clone(), "CA1")),
                MotionModel::ConstantAcceleration(CaModel::new(cfg.ca2.clone(), "CA2")),
                MotionModel::CoordinatedTurn(CtrModel::new(cfg.ctr1.clone(), "CTR1")),
                MotionModel::CoordinatedTurn(CtrModel::new(cfg.ctr2.clone(), "CTR2")),
            ],
            transition: cfg.imm.transition_matrix,
            initial_mode_probabilities: cfg.imm.initial_mode_probabilities,
        }
    }

    pub fn initial_mode_probabilities(&self) -> [f64; IMM_MODELS] {
        self.initial_mode_probabilities
    }

    pub fn model_labels(&self) -> [&'static str; IMM_MODELS] {
        [
            self.models[0].label(),
            self.models[1].label(),
            self.models[2].label(),
            self.models[3].label(),
            self.models[4].label(),
        ]
    }

    /// H selects the Cartesian position rows (0, 3, 6) of the state.
    pub fn measurement_matrix() -> MeasMat {
        let mut h = MeasMat::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 3)] = 1.0;
        h[(2, 6)] = 1.0;
        h
    }

    /// Predicted mode probabilities c̄ⱼ = Σᵢ Tᵢⱼ·μᵢ.
    fn predicted_mode_probabilities(&self, mu: &[f64; IMM_MODELS]) -> [f64; IMM_MODELS] {
        let mut c_bar = [0.0; IMM_MODELS];
        for (j, c) in c_bar.iter_mut().enumerate() {
            for i in 0..IMM_MODELS {
                *c += self.transition[i][j] * mu[i];
            }
        }
        c_bar
    }

    /// Interaction/mixing: replace each model's (x, P) with the
    /// probability-weighted mixture of all models.
    fn interaction(&self, state: &mut ImmState) {
        let mu = state.mode_probabilities;
        let c_bar = self.predicted_mode_probabilities(&mu);

        let mut mix = [[0.0; IMM_MODELS]; IMM_MODELS];
        for i in 0..IMM_MODELS {
            for j in 0..IMM_MODELS {
                mix[i][j] = if c_bar[j] > 1e-15 {
                    self.transition[i][j] * mu[i] / c_bar[j]
                } else if i == j {
                    1.0
                } else {
                    0.0
                };
            }
        }

        let mut x0 = [StateVec::zeros(); IMM_MODELS];
        for (j, x) in x0.iter_mut().enumerate() {
            for i in 0..IMM_MODELS {
                *x += state.model_states[i] * mix[i][j];
            }
        }

        let mut p0 = [StateCov::zeros(); IMM_MODELS];
        for (j, p) in p0.iter_mut().enumerate() {
            for i in 0..IMM_MODELS {
                let diff = state.model_states[i] - x0[j];
                *p += (state.model_covariances[i] + diff * diff.transpose()) * mix[i][j];
            }
        }

        state.model_states = x0;
        state.model_covariances = p0;
    }

    /// Full IMM predict: interaction → per-model prediction → merge.
    pub fn predict(&self, dt: f64, state: &mut ImmState) {
        self.interaction(state);
        for (m, model) in self.models.iter().enumerate() {
            let (x, p) = model.predict(&state.model_states[m], &state.model_covariances[m], dt);
            state.model_states[m] = x;
            state.model_covariances[m] = p;
        }
        Self::merge_estimates(state);

        trace!(dt, probs = ?state.mode_probabilities, "imm predict");
    }

    fn update_mode_probabilities(
        &self,
        state: &mut ImmState,
        likelihoods: &[f64; IMM_MODELS],
    ) {
        let c_bar = self.predicted_mode_probabilities(&state.mode_probabilities);
        let mut total = 0.0;
        for j in 0..IMM_MODELS {
            state.mode_probabilities[j] = likelihoods[j] * c_bar[j];
            total += state.mode_probabilities[j];
        }
        if total > 1e-30 {
            for p in &mut state.mode_probabilities {
                *p /= total;
            }
        } else {
            state.mode_probabilities = [1.0 / IMM_MODELS as f64; IMM_MODELS];
        }
    }

    /// Full IMM update against a Cartesian measurement `z` with noise `R`.
    pub fn update(&self, state: &mut ImmState, z: &MeasVec, r: &MeasCov) {
        let h = Self::measurement_matrix();
        let mut likelihoods = [1e-30; IMM_MODELS];
        let mut any_updated = false;

        for m in 0..IMM_MODELS {
            let z_pred = h * state.model_states[m];
            let innovation = z - z_pred;
            let s = h * state.model_covariances[m] * h.transpose() + r;

            let Some(s_inv) = s.try_inverse() else {
                continue; // model skipped for this update
            };
            if s.determinant() < 1e-30 {
                continue;
            }

            let k = state.model_covariances[m] * h.transpose() * s_inv;
            state.model_states[m] += k * innovation;
            state.model_covariances[m] =
                (StateCov::identity() - k * h) * state.model_covariances[m];

            likelihoods[m] = gaussian_likelihood(&innovation, &s);
            any_updated = true;
        }

        if !any_updated {
            // Every innovation covariance degenerated: keep the previous
            // merged estimate, forget the mode evidence.
            state.mode_probabilities = [1.0 / IMM_MODELS as f64; IMM_MODELS];
            return;
        }

        self.update_mode_probabilities(state, &likelihoods);
        Self::merge_estimates(state);

        trace!(probs = ?state.mode_probabilities, "imm update");
    }

    /// Innovation covariance of the merged estimate, S = H·P·Hᵀ + R.
    /// Used by the associators to build gates.
    pub fn innovation_covariance(&self, state: &ImmState, r: &MeasCov) -> MeasCov {
        let h = Self::measurement_matrix();
        h * state.merged_covariance * h.transpose() + r
    }

    /// Innovation of the merged estimate against `z`.
    pub fn innovation(&self, state: &ImmState, z: &MeasVec) -> MeasVec {
        let h = Self::measurement_matrix();
        z - h * state.merged_state
    }

    /// Probability-weighted merge of the model bank into the authoritative
    /// estimate.
    pub fn merge_estimates(state: &mut ImmState) {
        let mut x = StateVec::zeros();
        for m in 0..IMM_MODELS {
            x += state.model_states[m] * state.mode_probabilities[m];
        }

        let mut p = StateCov::zeros();
        for m in 0..IMM_MODELS {
            let diff = state.model_states[m] - x;
            p += (state.model_covariances[m] + diff * diff.transpose())
                * state.mode_probabilities[m];
        }

        state.merged_state = x;
        state.merged_covariance = p;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PredictionConfig;
    use approx::assert_abs_diff_eq;

    fn filter() -> ImmFilter {
        ImmFilter::new(&PredictionConfig::default())
    }

    fn fresh_state(filter: &ImmFilter, x0: StateVec) -> ImmState {
        let p0 = StateCov::identity() * 100.0;
        ImmState::new(x0, p0, filter.initial_mode_probabilities())
    }

    fn probs_sum(state: &ImmState) -> f64 {
        state.mode_probabilities.iter().sum()
    }

    #[test]
    fn measurement_matrix_selects_positions() {
        let h = ImmFilter::measurement_matrix();
        let x = StateVec::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let z = h * x;
        assert_eq!(z, MeasVec::new(1.0, 4.0, 7.0));
    }

    #[test]
    fn predict_preserves_mode_probabilities() {
        let f = filter();
        let mut state = fresh_state(
            &f,
            StateVec::from_column_slice(&[1000.0, 10.0, 0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0]),
        );
        let before = state.mode_probabilities;
        f.predict(0.1, &mut state);
        assert_eq!(state.mode_probabilities, before);
        assert_abs_diff_eq!(probs_sum(&state), 1.0, epsilon = 1e-9);
        // Position moved with velocity under the dominant models.
        assert!(state.merged_state[0] > 1000.0);
    }

    #[test]
    fn update_renormalizes_probabilities_and_keeps_covariance_sane() {
        let f = filter();
        let mut state = fresh_state(
            &f,
            StateVec::from_column_slice(&[1000.0, 10.0, 0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0]),
        );
        let r = MeasCov::identity() * 625.0;

        for k in 1..=10 {
            f.predict(0.1, &mut state);
            let z = MeasVec::new(1000.0 + k as f64, 0.0, 100.0);
            f.update(&mut state, &z, &r);

            assert_abs_diff_eq!(probs_sum(&state), 1.0, epsilon = 1e-9);
            assert!(state.mode_probabilities.iter().all(|&p| p >= 0.0));

            let p = state.merged_covariance;
            let asym = (p - p.transpose()).abs().max();
            assert!(asym <= 1e-9, "merged covariance asymmetry {asym}");
            for i in 0..9 {
                assert!(p[(i, i)] > 0.0, "non-positive variance at {i}");
            }
        }
    }

    #[test]
    fn update_pulls_state_toward_measurement() {
        let f = filter();
        let mut state = fresh_state(
            &f,
            StateVec::from_column_slice(&[1000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        );
        let r = MeasCov::identity() * 625.0;
        let z = MeasVec::new(1040.0, 0.0, 0.0);
        f.update(&mut state, &z, &r);
        assert!(state.merged_state[0] > 1000.0 && state.merged_state[0] < 1040.0);
    }

    #[test]
    fn likelihood_at_zero_innovation_matches_gaussian_normalizer() {
        let s = MeasCov::identity() * 625.0;
        let expected = (2.0 * std::f64::consts::PI).powf(-1.5) * s.determinant().powf(-0.5);
        let got = gaussian_likelihood(&MeasVec::zeros(), &s);
        assert_abs_diff_eq!(got, expected, epsilon = 1e-12);
    }

    #[test]
    fn likelihood_floors_on_degenerate_covariance() {
        assert_eq!(gaussian_likelihood(&MeasVec::zeros(), &MeasCov::zeros()), 1e-30);
    }

    #[test]
    fn all_models_singular_retains_merged_estimate() {
        let f = filter();
        // Zero covariance and zero noise: S is singular for every model.
        let x0 = StateVec::from_column_slice(&[500.0, 1.0, 0.0, 0.0, 0.0, 0.0, 50.0, 0.0, 0.0]);
        let mut state = ImmState::new(x0, StateCov::zeros(), f.initial_mode_probabilities());
        let merged_before = state.merged_state;

        f.update(&mut state, &MeasVec::new(9999.0, 9999.0, 9999.0), &MeasCov::zeros());

        assert_eq!(state.merged_state, merged_before);
        for p in state.mode_probabilities {
            assert_abs_diff_eq!(p, 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn maneuver_models_win_during_a_hard_turn() {
        let f = filter();
        let omega = 0.5f64;
        let speed = 30.0f64;
        // Circle of radius v/ω around (940, 0); start at (1000, 0) heading +y,
        // with the matching centripetal acceleration in the state.
        let radius = speed / omega;
        let x0 = StateVec::from_column_slice(&[
            1000.0, 0.0, -omega * speed, 0.0, speed, 0.0, 0.0, 0.0, 0.0,
        ]);
        let mut state = ImmState::new(
            x0,
            StateCov::identity() * 25.0,
            f.initial_mode_probabilities(),
        );

        let r = MeasCov::identity() * 4.0;
        let dt = 1.0;
        for k in 1..=15 {
            let theta = omega * dt * k as f64;
            let z = MeasVec::new(940.0 + radius * theta.cos(), radius * theta.sin(), 0.0);
            f.predict(dt, &mut state);
            f.update(&mut state, &z, &r);
        }

        let cv = state.mode_probabilities[0];
        let maneuver: f64 = state.mode_probabilities[1..].iter().sum();
        assert!(
            maneuver > cv,
            "maneuver mass {maneuver:.3} should beat CV {cv:.3} in a 0.5 rad/s turn"
        );
        assert!(cv < 0.4, "CV should lose weight, got {cv:.3}");
    }
}
