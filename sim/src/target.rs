//! Ground-truth targets and their motion.
//!
//! Each target carries a true Cartesian state [position, velocity] and a
//! `MotionSpec` describing how it moves; the injector steps targets forward
//! and converts them to radar detections.

use serde::{Deserialize, Serialize};

/// How a target moves between dwells.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Straight flight at the current velocity.
    ConstantVelocity,
    /// Coordinated turn in the xy-plane. `omega` is the yaw rate (rad/s).
    ConstantTurn { omega: f64 },
    /// Constant acceleration (m/s²).
    ConstantAccel { ax: f64, ay: f64, az: f64 },
}

/// A simulated target with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    pub id: u64,
    /// True position (m).
    pub position: [f64; 3],
    /// True velocity (m/s).
    pub velocity: [f64; 3],
    pub motion: MotionSpec,
    /// Target produces no detections before this time (s).
    pub appear_at: Option<f64>,
    /// Target produces no detections at or after this time (s).
    pub disappear_at: Option<f64>,
    /// Mean signal strength (dBm) used by the injector.
    pub strength_dbm: f64,
    /// Radar cross section (dBsm).
    pub rcs_dbsm: f64,
    /// Micro-Doppler spread (Hz); rotary drones show large values.
    pub micro_doppler_hz: f64,
}

impl Target {
    pub fn new(id: u64, position: [f64; 3], velocity: [f64; 3], motion: MotionSpec) -> Self {
        Self {
            id,
            position,
            velocity,
            motion,
            appear_at: None,
            disappear_at: None,
            strength_dbm: -60.0,
            rcs_dbsm: -15.0,
            micro_doppler_hz: 80.0,
        }
    }

    /// Propagate the true state by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        match self.motion {
            MotionSpec::ConstantVelocity => {
                for i in 0..3 {
                    self.position[i] += self.velocity[i] * dt;
                }
            }
            MotionSpec::ConstantTurn { omega } => {
                let (vx, vy) = (self.velocity[0], self.velocity[1]);
                let speed = (vx * vx + vy * vy).sqrt();
                let heading = vy.atan2(vx);
                let new_heading = heading + omega * dt;
                self.position[0] += speed * heading.cos() * dt;
                self.position[1] += speed * heading.sin() * dt;
                self.position[2] += self.velocity[2] * dt;
                self.velocity[0] = speed * new_heading.cos();
                self.velocity[1] = speed * new_heading.sin();
            }
            MotionSpec::ConstantAccel { ax, ay, az } => {
                let a = [ax, ay, az];
                for i in 0..3 {
                    self.position[i] += self.velocity[i] * dt + 0.5 * a[i] * dt * dt;
                    self.velocity[i] += a[i] * dt;
                }
            }
        }
    }

    /// True if the target produces detections at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if let Some(appear) = self.appear_at {
            if t < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        true
    }

    pub fn speed(&self) -> f64 {
        let v = self.velocity;
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_velocity_moves_linearly() {
        let mut t = Target::new(0, [0.0, 0.0, 100.0], [10.0, -5.0, 1.0], MotionSpec::ConstantVelocity);
        t.step(2.0);
        assert_eq!(t.position, [20.0, -10.0, 102.0]);
    }

    #[test]
    fn constant_turn_preserves_speed() {
        let mut t = Target::new(
            0,
            [1000.0, 0.0, 100.0],
            [15.0, 0.0, 0.0],
            MotionSpec::ConstantTurn { omega: 0.2 },
        );
        for _ in 0..50 {
            t.step(0.1);
        }
        assert!((t.speed() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn appearance_window_gates_activity() {
        let mut t = Target::new(0, [0.0; 3], [0.0; 3], MotionSpec::ConstantVelocity);
        t.appear_at = Some(1.0);
        t.disappear_at = Some(5.0);
        assert!(!t.is_active(0.5));
        assert!(t.is_active(3.0));
        assert!(!t.is_active(5.0));
    }
}
