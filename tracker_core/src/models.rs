//! Motion models for the IMM bank.
//!
//! State ordering is [x, vx, ax, y, vy, ay, z, vz, az]; each axis occupies a
//! contiguous (position, velocity, acceleration) triple. Every model exposes
//! `predict(x, P, dt)` computed as x' = F(dt, x)·x, P' = F·P·Fᵀ + Q(dt).

use crate::config::{CaConfig, CtrConfig, CvConfig};
use crate::types::{StateCov, StateVec};

/// Per-axis (position, velocity, acceleration) indices.
const AXES: [(usize, usize, usize); 3] = [(0, 1, 2), (3, 4, 5), (6, 7, 8)];

// ---------------------------------------------------------------------------
// Constant velocity
// ---------------------------------------------------------------------------

/// Constant-velocity dynamics; acceleration states are forced to zero.
#[derive(Clone, Debug)]
pub struct CvModel {
    config: CvConfig,
}

impl CvModel {
    pub fn new(config: CvConfig) -> Self {
        Self { config }
    }

    fn transition_matrix(dt: f64) -> StateCov {
        let mut f = StateCov::identity();
        for (p, v, a) in AXES {
            f[(p, v)] = dt;
            f[(a, a)] = 0.0;
        }
        f
    }

    /// White-noise-on-velocity process noise with a small acceleration
    /// residual keeping the zeroed states observable.
    fn process_noise(&self, dt: f64) -> StateCov {
        let q = self.config.process_noise_std * self.config.process_noise_std;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt / 2.0;
        let dt4 = dt2 * dt2 / 4.0;

        let mut qm = StateCov::zeros();
        for (p, v, a) in AXES {
            qm[(p, p)] = dt4 * q;
            qm[(p, v)] = dt3 * q;
            qm[(v, p)] = dt3 * q;
            qm[(v, v)] = dt2 * q;
            qm[(a, a)] = q * 0.01;
        }
        qm
    }

    pub fn predict(&self, x: &StateVec, p: &StateCov, dt: f64) -> (StateVec, StateCov) {
        let f = Self::transition_matrix(dt);
        let mut x_out = f * x;
        for (_, _, a) in AXES {
            x_out[a] = 0.0;
        }
        let p_out = f * p * f.transpose() + self.process_noise(dt);
        (x_out, p_out)
    }
}

// ---------------------------------------------------------------------------
// Constant acceleration
// ---------------------------------------------------------------------------

/// Constant-acceleration dynamics with an exponential acceleration decay.
#[derive(Clone, Debug)]
pub struct CaModel {
    config: CaConfig,
    label: &'static str,
}

impl CaModel {
    pub fn new(config: CaConfig, label: &'static str) -> Self {
        Self { config, label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    fn transition_matrix(&self, dt: f64) -> StateCov {
        let mut f = StateCov::identity();
        let dt2 = 0.5 * dt * dt;
        let decay = self.config.accel_decay_rate;
        for (p, v, a) in AXES {
            f[(p, v)] = dt;
            f[(p, a)] = dt2;
            f[(v, a)] = dt;
            f[(a, a)] = decay;
        }
        f
    }

    /// Standard jerk-white-noise block.
    fn process_noise(&self, dt: f64) -> StateCov {
        let q = self.config.process_noise_std * self.config.process_noise_std;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;
        let dt5 = dt4 * dt;

        let mut qm = StateCov::zeros();
        for (p, v, a) in AXES {
            qm[(p, p)] = dt5 / 20.0 * q;
            qm[(p, v)] = dt4 / 8.0 * q;
            qm[(p, a)] = dt3 / 6.0 * q;
            qm[(v, p)] = dt4 / 8.0 * q;
            qm[(v, v)] = dt3 / 3.0 * q;
            qm[(v, a)] = dt2 / 2.0 * q;
            qm[(a, p)] = dt3 / 6.0 * q;
            qm[(a, v)] = dt2 / 2.0 * q;
            qm[(a, a)] = dt * q;
        }
        qm
    }

    pub fn predict(&self, x: &StateVec, p: &StateCov, dt: f64) -> (StateVec, StateCov) {
        let f = self.transition_matrix(dt);
        let x_out = f * x;
        let p_out = f * p * f.transpose() + self.process_noise(dt);
        (x_out, p_out)
    }
}

// ---------------------------------------------------------------------------
// Coordinated turn
// ---------------------------------------------------------------------------

/// Coordinated-turn dynamics in the xy-plane; the turn rate is estimated
/// from the current velocity/acceleration state.
#[derive(Clone, Debug)]
pub struct CtrModel {
    config: CtrConfig,
    label: &'static str,
}

impl CtrModel {
    pub fn new(config: CtrConfig, label: &'static str) -> Self {
        Self { config, label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// ω = (vx·ay − vy·ax) / (vx² + vy²), zero when nearly stationary.
    pub fn estimate_turn_rate(x: &StateVec) -> f64 {
        let (vx, vy) = (x[1], x[4]);
        let (ax, ay) = (x[2], x[5]);
        let v2 = vx * vx + vy * vy;
        if v2 < 1e-6 {
            return 0.0;
        }
        (vx * ay - vy * ax) / v2
    }

    fn transition_matrix(dt: f64, x: &StateVec) -> StateCov {
        let omega = Self::estimate_turn_rate(x);
        let mut f = StateCov::identity();

        if omega.abs() < 1e-6 {
            // Near-zero turn rate degenerates to CV.
            for (p, v, a) in AXES {
                f[(p, v)] = dt;
                f[(a, a)] = 0.0;
            }
        } else {
            let sin_ot = (omega * dt).sin();
            let cos_ot = (omega * dt).cos();

            // xy coordinated-turn rotation block
            f[(0, 1)] = sin_ot / omega;
            f[(0, 4)] = -(1.0 - cos_ot) / omega;
            f[(1, 1)] = cos_ot;
            f[(1, 4)] = -sin_ot;
            f[(3, 1)] = (1.0 - cos_ot) / omega;
            f[(3, 4)] = sin_ot / omega;
            f[(4, 1)] = sin_ot;
            f[(4, 4)] = cos_ot;

            // z-axis stays constant velocity
            f[(6, 7)] = dt;

            // Acceleration states decay through the turn
            f[(2, 2)] = 0.5;
            f[(5, 5)] = 0.5;
            f[(8, 8)] = 0.0;
        }
        f
    }

    /// CV-style noise, with turn-rate noise added on the xy axes.
    fn process_noise(&self, dt: f64) -> StateCov {
        let q = self.config.process_noise_std * self.config.process_noise_std;
        let q_omega = self.config.turn_rate_noise_std * self.config.turn_rate_noise_std;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;

        let mut qm = StateCov::zeros();
        for (axis, (p, v, a)) in AXES.iter().enumerate() {
            let q_axis = if axis < 2 { q + q_omega } else { q };
            qm[(*p, *p)] = dt3 / 3.0 * q_axis;
            qm[(*p, *v)] = dt2 / 2.0 * q_axis;
            qm[(*v, *p)] = dt2 / 2.0 * q_axis;
            qm[(*v, *v)] = dt * q_axis;
            qm[(*a, *a)] = q_axis * 0.1;
        }
        qm
    }

    pub fn predict(&self, x: &StateVec, p: &StateCov, dt: f64) -> (StateVec, StateCov) {
        let f = Self::transition_matrix(dt, x);
        let x_out = f * x;
        let p_out = f * p * f.transpose() + self.process_noise(dt);
        (x_out, p_out)
    }
}

// ---------------------------------------------------------------------------
// Variant dispatch
// ---------------------------------------------------------------------------

/// One model slot of the IMM bank.
#[derive(Clone, Debug)]
pub enum MotionModel {
    ConstantVelocity(CvModel),
    ConstantAcceleration(CaModel),
    CoordinatedTurn(CtrModel),
}

impl MotionModel {
    pub fn predict(&self, x: &StateVec, p: &StateCov, dt: f64) -> (StateVec, StateCov) {
        match self {
            MotionModel::ConstantVelocity(m) => m.predict(x, p, dt),
            MotionModel::ConstantAcceleration(m) => m.predict(x, p, dt),
            MotionModel::CoordinatedTurn(m) => m.predict(x, p, dt),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MotionModel::ConstantVelocity(_) => "CV",
            MotionModel::ConstantAcceleration(m) => m.label(),
            MotionModel::CoordinatedTurn(m) => m.label(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
