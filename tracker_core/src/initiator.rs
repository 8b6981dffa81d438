//! M-of-N track initiation from unmatched clusters.
//!
//! Each unmatched cluster within the initiation range either extends the
//! first candidate whose most recent detection lies inside the velocity
//! gate, or seeds a new candidate. A candidate reaching `m` hits within `n`
//! opportunities is promoted to a tentative track; the initial velocity is
//! the finite difference of the last two detections.

use crate::config::{InitialCovarianceConfig, InitiationConfig};
use crate::track::Track;
use crate::types::{Cluster, StateCov, StateVec, Timestamp, TrackId, IMM_MODELS};
use tracing::{debug, info};

/// One detection attributed to a candidate.
#[derive(Clone, Debug)]
struct TentativeDetection {
    cluster: Cluster,
    timestamp: Timestamp,
    dwell_count: u32,
}

/// Accumulating evidence for a not-yet-confirmed target.
#[derive(Clone, Debug)]
struct InitiationCandidate {
    history: Vec<TentativeDetection>,
    hits: u32,
    total: u32,
    promoted: bool,
}

pub struct TrackInitiator {
    init_config: InitiationConfig,
    cov_config: InitialCovarianceConfig,
    initial_mode_probabilities: [f64; IMM_MODELS],
    candidates: Vec<InitiationCandidate>,
    next_id: u32,
}

impl TrackInitiator {
    pub fn new(
        init_config: InitiationConfig,
        cov_config: InitialCovarianceConfig,
        initial_mode_probabilities: [f64; IMM_MODELS],
    ) -> Self {
        Self {
            init_config,
            cov_config,
            initial_mode_probabilities,
            candidates: Vec::new(),
            next_id: 0,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    fn initial_state(cluster: &Cluster) -> StateVec {
        let mut x = StateVec::zeros();
        x[0] = cluster.cartesian.x;
        x[3] = cluster.cartesian.y;
        x[6] = cluster.cartesian.z;
        x
    }

    fn initial_state_with_velocity(prior: &Cluster, latest: &Cluster, dt: f64) -> StateVec {
        let mut x = Self::initial_state(latest);
        if dt > 1e-6 {
            x[1] = (latest.cartesian.x - prior.cartesian.x) / dt;
            x[4] = (latest.cartesian.y - prior.cartesian.y) / dt;
            x[7] = (latest.cartesian.z - prior.cartesian.z) / dt;
        }
        x
    }

    fn initial_covariance(&self) -> StateCov {
        let sp2 = self.cov_config.position_std * self.cov_config.position_std;
        let sv2 = self.cov_config.velocity_std * self.cov_config.velocity_std;
        let sa2 = self.cov_config.acceleration_std * self.cov_config.acceleration_std;
        let mut p = StateCov::zeros();
        for axis in 0..3 {
            p[(axis * 3, axis * 3)] = sp2;
            p[(axis * 3 + 1, axis * 3 + 1)] = sv2;
            p[(axis * 3 + 2, axis * 3 + 2)] = sa2;
        }
        p
    }

    /// Feed this dwell's unmatched clusters; returns any newly promoted
    /// tracks.
    pub fn process_candidates(
        &mut self,
        unmatched: &[Cluster],
        now: Timestamp,
        dwell_count: u32,
    ) -> Vec<Track> {
        let mut new_tracks = Vec::new();

        for cluster in unmatched {
            if cluster.range > self.init_config.max_initiation_range {
                continue;
            }

            let mut matched = false;
            for cand in &mut self.candidates {
                if cand.promoted || cand.history.is_empty() {
                    continue;
                }
                let last = cand.history.last().unwrap();
                let dr = (cluster.range - last.cluster.range).abs();
                let da = (cluster.azimuth - last.cluster.azimuth).abs();
                let de = (cluster.elevation - last.cluster.elevation).abs();

                let dt = (now.saturating_sub(last.timestamp)) as f64 * 1e-6;
                let range_gate = self.init_config.velocity_gate * dt + 100.0;

                if dr < range_gate && da < 0.1 && de < 0.1 {
                    cand.history.push(TentativeDetection {
                        cluster: cluster.clone(),
                        timestamp: now,
                        dwell_count,
                    });
                    cand.hits += 1;
                    cand.total += 1;

                    if cand.hits >= self.init_config.m && cand.total <= self.init_config.n {
                        cand.promoted = true;

                        let x0 = if cand.history.len() >= 2 {
                            let h0 = &cand.history[cand.history.len() - 2];
                            let h1 = &cand.history[cand.history.len() - 1];
                            let dt_init =
                                (h1.timestamp.saturating_sub(h0.timestamp)) as f64 * 1e-6;
                            Self::initial_state_with_velocity(&h0.cluster, &h1.cluster, dt_init)
                        } else {
                            Self::initial_state(cluster)
                        };

                        let p0 = self.initial_covariance();
                        let id = self.next_track_id();
                        info!(
                            track = %id,
                            range = cluster.range,
                            azimuth = cluster.azimuth,
                            elevation = cluster.elevation,
                            "initiated track"
                        );
                        new_tracks.push(Track::new(
                            id,
                            x0,
                            p0,
                            self.initial_mode_probabilities,
                            now,
                        ));
                    }
                    matched = true;
                    break;
                }
            }

            if !matched {
                self.candidates.push(InitiationCandidate {
                    history: vec![TentativeDetection {
                        cluster: cluster.clone(),
                        timestamp: now,
                        dwell_count,
                    }],
                    hits: 1,
                    total: 1,
                    promoted: false,
                });
            }
        }

        new_tracks
    }

    /// Drop candidates that were promoted, failed the M-of-N window, or
    /// went stale (first detection older than n + 5 dwells).
    pub fn purge_stale_candidates(&mut self, current_dwell: u32) {
        let m = self.init_config.m;
        let n = self.init_config.n;
        let before = self.candidates.len();
        self.candidates.retain(|c| {
            if c.promoted {
                return false;
            }
            let Some(first) = c.history.first() else {
                return false;
            };
            if c.total >= n && c.hits < m {
                return false;
            }
            current_dwell.saturating_sub(first.dwell_count) <= n + 5
        });
        if before != self.candidates.len() {
            debug!(
                purged = before - self.candidates.len(),
                remaining = self.candidates.len(),
                "purged initiation candidates"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{cartesian_to_spherical, CartesianPos};
    use approx::assert_abs_diff_eq;

    fn initiator() -> TrackInitiator {
        TrackInitiator::new(
            InitiationConfig::default(), // m=3, n=5
            InitialCovarianceConfig::default(),
            [0.4, 0.15, 0.15, 0.15, 0.15],
        )
    }

    fn cluster_at(x: f64, y: f64, z: f64) -> Cluster {
        let s = cartesian_to_spherical(x, y, z);
        Cluster {
            range: s.range,
            azimuth: s.azimuth,
            elevation: s.elevation,
            cartesian: CartesianPos { x, y, z },
            num_detections: 1,
            ..Cluster::default()
        }
    }

    const DT_US: Timestamp = 100_000;

    #[test]
    fn promotes_after_m_consecutive_hits_with_velocity_estimate() {
        let mut init = initiator();
        let mut ts = 1_000_000;

        // Target moving +10 m/s in x, one cluster per dwell.
        let t1 = init.process_candidates(&[cluster_at(1000.0, 0.0, 100.0)], ts, 1);
        assert!(t1.is_empty());
        assert_eq!(init.candidate_count(), 1);

        ts += DT_US;
        let t2 = init.process_candidates(&[cluster_at(1001.0, 0.0, 100.0)], ts, 2);
        assert!(t2.is_empty());

        ts += DT_US;
        let t3 = init.process_candidates(&[cluster_at(1002.0, 0.0, 100.0)], ts, 3);
        assert_eq!(t3.len(), 1);

        let track = &t3[0];
        assert_eq!(track.id, TrackId(0));
        assert_abs_diff_eq!(track.imm.merged_state[0], 1002.0, epsilon = 1e-9);
        assert_abs_diff_eq!(track.imm.merged_state[1], 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(track.imm.merged_state[6], 100.0, epsilon = 1e-9);

        // The promoted candidate disappears on purge.
        init.purge_stale_candidates(3);
        assert_eq!(init.candidate_count(), 0);
    }

    #[test]
    fn distant_clusters_seed_separate_candidates() {
        let mut init = initiator();
        init.process_candidates(
            &[cluster_at(1000.0, 0.0, 100.0), cluster_at(8000.0, 3000.0, 200.0)],
            1_000_000,
            1,
        );
        assert_eq!(init.candidate_count(), 2);
    }

    #[test]
    fn beyond_initiation_range_is_ignored() {
        let mut init = initiator();
        init.process_candidates(&[cluster_at(16_000.0, 0.0, 100.0)], 1_000_000, 1);
        assert_eq!(init.candidate_count(), 0);
    }

    #[test]
    fn promoted_candidate_does_not_promote_twice() {
        let mut init = initiator();
        let mut ts = 1_000_000;
        for k in 0..5u32 {
            let tracks = init.process_candidates(
                &[cluster_at(1000.0 + k as f64, 0.0, 100.0)],
                ts,
                k + 1,
            );
            if k == 2 {
                assert_eq!(tracks.len(), 1, "promotes exactly at the third hit");
            } else {
                assert!(tracks.is_empty(), "no track expected at dwell {}", k + 1);
            }
            ts += DT_US;
        }
        // Dwells 4 and 5 seeded a fresh candidate alongside the promoted one.
        assert_eq!(init.candidate_count(), 2);
        init.purge_stale_candidates(5);
        assert_eq!(init.candidate_count(), 1);
    }

    #[test]
    fn stale_candidates_are_purged() {
        let mut init = initiator();
        init.process_candidates(&[cluster_at(1000.0, 0.0, 100.0)], 1_000_000, 1);
        assert_eq!(init.candidate_count(), 1);
        // n + 5 = 10 dwells of slack; dwell 12 is beyond it.
        init.purge_stale_candidates(12);
        assert_eq!(init.candidate_count(), 0);
    }

    #[test]
    fn track_ids_are_monotone() {
        let mut init = initiator();
        let mut ts = 1_000_000;
        let mut ids = Vec::new();
        // Two well-separated targets promoted in the same dwell sequence.
        for k in 0..3u32 {
            let tracks = init.process_candidates(
                &[
                    cluster_at(1000.0 + k as f64, 0.0, 100.0),
                    cluster_at(5000.0, 2000.0 + k as f64, 300.0),
                ],
                ts,
                k + 1,
            );
            ids.extend(tracks.iter().map(|t| t.id.0));
            ts += DT_US;
        }
        assert_eq!(ids, vec![0, 1]);
    }
}
