//! Position-error and continuity accumulators for scenario summaries.

use tracker_core::track::Track;
use tracker_core::types::TrackId;

use crate::target::Target;
use std::collections::HashMap;

/// Accumulated error statistics against ground truth.
#[derive(Clone, Debug, Default)]
pub struct ScenarioMetrics {
    pub n_samples: u64,
    sum_sq_pos_err: f64,
    /// Per-track continuity bookkeeping.
    continuity: HashMap<TrackId, TrackContinuity>,
}

#[derive(Clone, Debug)]
pub struct TrackContinuity {
    pub first_seen: f64,
    pub last_seen: f64,
    pub samples: u64,
}

impl ScenarioMetrics {
    /// Match each confirmed track to its nearest active target and
    /// accumulate the position error.
    pub fn accumulate(&mut self, t: f64, tracks: &[Track], targets: &[Target]) {
        for track in tracks {
            let p = track.position();
            let nearest = targets
                .iter()
                .filter(|target| target.is_active(t))
                .map(|target| {
                    let dx = p.x - target.position[0];
                    let dy = p.y - target.position[1];
                    let dz = p.z - target.position[2];
                    dx * dx + dy * dy + dz * dz
                })
                .fold(f64::INFINITY, f64::min);

            if nearest.is_finite() {
                self.sum_sq_pos_err += nearest;
                self.n_samples += 1;
            }

            let entry = self.continuity.entry(track.id).or_insert(TrackContinuity {
                first_seen: t,
                last_seen: t,
                samples: 0,
            });
            entry.last_seen = t;
            entry.samples += 1;
        }
    }

    /// Root-mean-square position error over all accumulated samples (m).
    pub fn rmse_position(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_samples as f64).sqrt()
    }

    pub fn continuity(&self) -> &HashMap<TrackId, TrackContinuity> {
        &self.continuity
    }
}
