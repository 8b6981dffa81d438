//! Dwell injector: converts ground-truth targets into the DSP's detection
//! messages with Gaussian measurement noise, missed detections and Poisson
//! clutter.

use crate::target::Target;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use tracker_core::types::{cartesian_to_spherical, Detection, SpDetectionMessage, Timestamp};
use tracker_core::wire::MSG_ID_SP_DETECTION;

/// Radar and noise parameters for the injected stream.
#[derive(Clone, Debug)]
pub struct InjectorParams {
    /// 1σ range noise (m).
    pub range_noise_std: f64,
    /// 1σ azimuth noise (rad).
    pub azimuth_noise_std: f64,
    /// 1σ elevation noise (rad).
    pub elevation_noise_std: f64,
    /// Probability that an active target produces a detection.
    pub detection_probability: f64,
    /// Mean number of clutter returns per dwell.
    pub clutter_rate: f64,
    /// Maximum instrumented range (m) for clutter placement.
    pub max_range: f64,
    /// Noise floor (dBm) reported with each detection.
    pub noise_floor_dbm: f64,
}

impl Default for InjectorParams {
    fn default() -> Self {
        Self {
            range_noise_std: 5.0,
            azimuth_noise_std: 0.002,
            elevation_noise_std: 0.002,
            detection_probability: 0.95,
            clutter_rate: 0.0,
            max_range: 15_000.0,
            noise_floor_dbm: -95.0,
        }
    }
}

/// Generates one `SpDetectionMessage` per dwell from the target set.
pub struct DwellInjector {
    params: InjectorParams,
    rng: ChaCha8Rng,
    dwell_count: u32,
}

impl DwellInjector {
    pub fn new(params: InjectorParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            dwell_count: 0,
        }
    }

    pub fn dwell_count(&self) -> u32 {
        self.dwell_count
    }

    fn target_detection(&mut self, target: &Target) -> Detection {
        let s = cartesian_to_spherical(target.position[0], target.position[1], target.position[2]);
        let range_noise = Normal::new(0.0, self.params.range_noise_std).unwrap();
        let az_noise = Normal::new(0.0, self.params.azimuth_noise_std).unwrap();
        let el_noise = Normal::new(0.0, self.params.elevation_noise_std).unwrap();

        let strength = target.strength_dbm + self.rng.gen::<f64>() * 2.0 - 1.0;
        Detection {
            range: (s.range + range_noise.sample(&mut self.rng)).max(1.0),
            azimuth: s.azimuth + az_noise.sample(&mut self.rng),
            elevation: s.elevation + el_noise.sample(&mut self.rng),
            strength,
            noise: self.params.noise_floor_dbm,
            snr: strength - self.params.noise_floor_dbm,
            rcs: target.rcs_dbsm,
            micro_doppler: target.micro_doppler_hz + self.rng.gen::<f64>() * 10.0 - 5.0,
        }
    }

    fn clutter_detection(&mut self) -> Detection {
        // Uniform in area: r ~ R·sqrt(U).
        let range = self.params.max_range * self.rng.gen::<f64>().sqrt();
        let azimuth = self.rng.gen::<f64>() * 2.0 * std::f64::consts::PI - std::f64::consts::PI;
        let elevation = self.rng.gen::<f64>() * 0.3;
        let strength = -85.0 + self.rng.gen::<f64>() * 10.0;
        Detection {
            range: range.max(60.0),
            azimuth,
            elevation,
            strength,
            noise: self.params.noise_floor_dbm,
            snr: strength - self.params.noise_floor_dbm,
            rcs: -25.0,
            micro_doppler: self.rng.gen::<f64>() * 20.0,
        }
    }

    /// Poisson draw by multiplying uniforms until the product drops below
    /// e^(−λ).
    fn clutter_count(&mut self) -> usize {
        let lambda = self.params.clutter_rate;
        if lambda <= 0.0 {
            return 0;
        }
        let threshold = (-lambda).exp();
        let mut n = 0usize;
        let mut prod = self.rng.gen::<f64>();
        while prod > threshold && n < 50 {
            prod *= self.rng.gen::<f64>();
            n += 1;
        }
        n
    }

    /// Produce the next dwell at simulation time `t` (s).
    pub fn next_dwell(&mut self, targets: &[Target], t: f64, timestamp: Timestamp) -> SpDetectionMessage {
        self.dwell_count += 1;
        let mut detections = Vec::new();

        for target in targets {
            if !target.is_active(t) {
                continue;
            }
            if self.rng.gen::<f64>() > self.params.detection_probability {
                continue;
            }
            let d = self.target_detection(target);
            if d.range <= self.params.max_range {
                detections.push(d);
            }
        }

        let n_clutter = self.clutter_count();
        for _ in 0..n_clutter {
            detections.push(self.clutter_detection());
        }

        SpDetectionMessage {
            message_id: MSG_ID_SP_DETECTION,
            dwell_count: self.dwell_count,
            timestamp,
            detections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MotionSpec;

    #[test]
    fn injects_one_detection_per_active_target() {
        let params = InjectorParams {
            detection_probability: 1.0,
            ..InjectorParams::default()
        };
        let mut injector = DwellInjector::new(params, 42);
        let targets = vec![
            Target::new(0, [1000.0, 0.0, 100.0], [10.0, 0.0, 0.0], MotionSpec::ConstantVelocity),
            Target::new(1, [5000.0, 2000.0, 300.0], [0.0, -20.0, 0.0], MotionSpec::ConstantVelocity),
        ];
        let msg = injector.next_dwell(&targets, 0.0, 1_000_000);
        assert_eq!(msg.dwell_count, 1);
        assert_eq!(msg.detections.len(), 2);
    }

    #[test]
    fn inactive_targets_produce_nothing() {
        let params = InjectorParams {
            detection_probability: 1.0,
            ..InjectorParams::default()
        };
        let mut injector = DwellInjector::new(params, 7);
        let mut t = Target::new(0, [1000.0, 0.0, 100.0], [0.0; 3], MotionSpec::ConstantVelocity);
        t.disappear_at = Some(1.0);
        let msg = injector.next_dwell(&[t], 2.0, 1_000_000);
        assert!(msg.detections.is_empty());
    }

    #[test]
    fn noise_stays_near_truth() {
        let params = InjectorParams {
            detection_probability: 1.0,
            range_noise_std: 5.0,
            ..InjectorParams::default()
        };
        let mut injector = DwellInjector::new(params, 99);
        let target = Target::new(0, [1000.0, 0.0, 100.0], [0.0; 3], MotionSpec::ConstantVelocity);
        for _ in 0..50 {
            let msg = injector.next_dwell(&[target.clone()], 0.0, 1_000_000);
            let d = &msg.detections[0];
            assert!((d.range - 1004.99).abs() < 50.0, "range {range}", range = d.range);
            assert!(d.snr > 0.0);
        }
    }

    #[test]
    fn same_seed_reproduces_the_stream() {
        let targets = vec![Target::new(
            0,
            [2000.0, 500.0, 150.0],
            [5.0, 5.0, 0.0],
            MotionSpec::ConstantVelocity,
        )];
        let params = InjectorParams {
            clutter_rate: 2.0,
            ..InjectorParams::default()
        };
        let mut a = DwellInjector::new(params.clone(), 1234);
        let mut b = DwellInjector::new(params, 1234);
        for k in 0..10 {
            let ma = a.next_dwell(&targets, k as f64 * 0.1, 1_000_000 + k * 100_000);
            let mb = b.next_dwell(&targets, k as f64 * 0.1, 1_000_000 + k * 100_000);
            assert_eq!(ma.detections, mb.detections);
        }
    }
}
