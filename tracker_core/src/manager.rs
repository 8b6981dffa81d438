//! Track manager: the per-dwell orchestrator.
//!
//! Stage order per dwell is fixed: log raw → preprocess → cluster → Δt →
//! predict → associate → update/miss → initiate → maintain → delete/prune →
//! classify. Everything runs to completion on the processing thread; the
//! manager owns all track state and needs no synchronization.

use crate::association::AssociationEngine;
use crate::binlog::BinaryLogger;
use crate::clustering::ClusterEngine;
use crate::config::TrackerConfig;
use crate::imm::ImmFilter;
use crate::initiator::TrackInitiator;
use crate::preprocess::Preprocessor;
use crate::track::Track;
use crate::types::{
    now_micros, Cluster, MeasCov, SpDetectionMessage, Timestamp, TrackClassification, TrackStatus,
    TrackUpdateMessage,
};
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

pub struct TrackManager {
    config: TrackerConfig,
    preprocessor: Preprocessor,
    cluster_engine: ClusterEngine,
    imm_filter: ImmFilter,
    association_engine: AssociationEngine,
    initiator: TrackInitiator,
    tracks: Vec<Track>,
    measurement_noise: MeasCov,
    logger: BinaryLogger,
    /// Updates of tracks pruned in the most recent dwell, kept so the
    /// display can see the final Deleted state once.
    deleted_this_dwell: Vec<TrackUpdateMessage>,
    last_dwell_time: Timestamp,
    dwell_count: u32,
    dropped_promotions: u64,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Self {
        let sigma = config.track_management.measurement_noise_std;
        let measurement_noise = MeasCov::identity() * (sigma * sigma);

        let logger = if config.system.log_enabled {
            BinaryLogger::open(&config.system.log_directory, "tracker")
        } else {
            BinaryLogger::disabled()
        };

        let preprocessor = Preprocessor::new(config.preprocessing.clone());
        let cluster_engine = ClusterEngine::new(&config.clustering);
        let imm_filter = ImmFilter::new(&config.prediction);
        let association_engine = AssociationEngine::new(&config.association);
        let initiator = TrackInitiator::new(
            config.track_management.initiation.clone(),
            config.track_management.initial_covariance.clone(),
            config.prediction.imm.initial_mode_probabilities,
        );

        info!(
            clustering = cluster_engine.active_method(),
            association = association_engine.active_method(),
            sigma_r = sigma,
            "track manager initialized"
        );

        Self {
            config,
            preprocessor,
            cluster_engine,
            imm_filter,
            association_engine,
            initiator,
            tracks: Vec::new(),
            measurement_noise,
            logger,
            deleted_this_dwell: Vec::new(),
            last_dwell_time: 0,
            dwell_count: 0,
            dropped_promotions: 0,
        }
    }

    /// Run the full tracking cycle for one dwell.
    pub fn process_dwell(&mut self, msg: &SpDetectionMessage) {
        let ts = if msg.timestamp > 0 { msg.timestamp } else { now_micros() };
        self.dwell_count = msg.dwell_count;

        debug!(
            dwell = self.dwell_count,
            detections = msg.detections.len(),
            "processing dwell"
        );

        self.logger.log_raw(ts, msg);

        let filtered = self.preprocessor.process(&msg.detections);
        self.logger.log_preprocessed(ts, &filtered);

        let clusters = self.cluster_engine.process(&filtered);
        self.logger.log_clustered(ts, &clusters);

        // Δt from the previous dwell, clamped to the cycle period on the
        // first dwell and on timestamp glitches.
        let cycle_s = self.config.system.cycle_period_ms as f64 * 1e-3;
        let mut dt = if self.last_dwell_time > 0 {
            (ts as f64 - self.last_dwell_time as f64) * 1e-6
        } else {
            cycle_s
        };
        if dt <= 0.0 || dt > 10.0 {
            dt = cycle_s;
        }

        self.predict(dt, ts);
        self.associate(&clusters, ts);
        self.maintain_tracks();
        self.delete_tracks(ts);
        self.classify_tracks();

        self.last_dwell_time = ts;

        debug!(
            active = self.num_active_tracks(),
            confirmed = self.num_confirmed_tracks(),
            candidates = self.initiator.candidate_count(),
            "dwell done"
        );
    }

    /// Predict every live track to the dwell time. Models share no state,
    /// so the sweep parallelizes trivially.
    fn predict(&mut self, dt: f64, ts: Timestamp) {
        let filter = &self.imm_filter;
        self.tracks.par_iter_mut().for_each(|track| {
            if track.status != TrackStatus::Deleted {
                filter.predict(dt, &mut track.imm);
                track.increment_age();
            }
        });
        for track in &self.tracks {
            if track.status != TrackStatus::Deleted {
                self.logger.log_predicted(ts, track.id, &track.imm.merged_state);
                trace!(
                    track = %track.id,
                    x = track.imm.merged_state[0],
                    y = track.imm.merged_state[3],
                    z = track.imm.merged_state[6],
                    "predicted"
                );
            }
        }
    }

    fn associate(&mut self, clusters: &[Cluster], ts: Timestamp) {
        let active: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].status != TrackStatus::Deleted)
            .collect();

        let result = {
            let refs: Vec<&Track> = active.iter().map(|&i| &self.tracks[i]).collect();
            self.association_engine.process(
                &refs,
                clusters,
                &self.imm_filter,
                &self.measurement_noise,
            )
        };

        for m in &result.matched {
            let idx = active[m.track_index];
            let cluster = &clusters[m.cluster_index];
            let z = cluster.measurement();

            let track = &mut self.tracks[idx];
            self.imm_filter.update(&mut track.imm, &z, &self.measurement_noise);
            track.record_hit(ts);

            self.logger
                .log_associated(ts, track.id, cluster.cluster_id, m.distance);
            self.logger
                .log_updated(ts, track.id, &track.imm.merged_state, track.status);
            trace!(
                track = %track.id,
                cluster = %cluster.cluster_id,
                distance = m.distance,
                "updated"
            );
        }

        for &t in &result.unmatched_tracks {
            let idx = active[t];
            self.tracks[idx].record_miss();
            trace!(track = %self.tracks[idx].id, "missed");
        }

        let unmatched: Vec<Cluster> = result
            .unmatched_clusters
            .iter()
            .map(|&c| clusters[c].clone())
            .collect();
        if !unmatched.is_empty() {
            let promoted = self
                .initiator
                .process_candidates(&unmatched, ts, self.dwell_count);
            for track in promoted {
                if self.tracks.len() >= self.config.system.max_tracks {
                    self.dropped_promotions += 1;
                    warn!(
                        max_tracks = self.config.system.max_tracks,
                        dropped = self.dropped_promotions,
                        "track table full; dropping promotion"
                    );
                    continue;
                }
                self.logger.log_initiated(ts, track.id, &track.imm.merged_state);
                self.tracks.push(track);
            }
            self.initiator.purge_stale_candidates(self.dwell_count);
        }
    }

    /// Quality bookkeeping and confirmed/coasting transitions.
    fn maintain_tracks(&mut self) {
        let maint = &self.config.track_management.maintenance;

        for track in &mut self.tracks {
            if track.status == TrackStatus::Deleted {
                continue;
            }

            if track.consecutive_misses == 0 {
                track.quality = (track.quality + maint.quality_boost).min(1.0);
            } else {
                track.quality *= maint.quality_decay_rate;
            }

            match track.status {
                TrackStatus::Tentative => {
                    if track.hit_count >= maint.confirm_hits {
                        track.status = TrackStatus::Confirmed;
                        info!(track = %track.id, hits = track.hit_count, "track confirmed");
                    }
                }
                TrackStatus::Confirmed => {
                    if track.consecutive_misses > 0 {
                        track.status = TrackStatus::Coasting;
                        debug!(
                            track = %track.id,
                            misses = track.consecutive_misses,
                            "track coasting"
                        );
                    }
                }
                TrackStatus::Coasting => {
                    if track.consecutive_misses == 0 {
                        track.status = TrackStatus::Confirmed;
                    }
                }
                TrackStatus::Deleted => {}
            }
        }
    }

    /// Mark terminal tracks Deleted, then prune them. Deleted is a sink
    /// state: pruned tracks are only remembered for one display snapshot.
    fn delete_tracks(&mut self, ts: Timestamp) {
        let del = &self.config.track_management.deletion;

        for track in &mut self.tracks {
            if track.status == TrackStatus::Deleted {
                continue;
            }
            let reason = if track.consecutive_misses >= del.max_coasting_dwells {
                Some("max_coasting")
            } else if track.quality < del.min_quality {
                Some("low_quality")
            } else if track.spherical_position().range > del.max_range {
                Some("out_of_range")
            } else {
                None
            };

            if let Some(reason) = reason {
                track.status = TrackStatus::Deleted;
                self.logger.log_deleted(ts, track.id);
                info!(track = %track.id, reason, "track deleted");
            }
        }

        self.deleted_this_dwell = self
            .tracks
            .iter()
            .filter(|t| t.status == TrackStatus::Deleted)
            .map(|t| t.to_update_message())
            .collect();
        self.tracks.retain(|t| t.status != TrackStatus::Deleted);
    }

    /// Heuristic classification from speed and mode-family probabilities.
    fn classify_tracks(&mut self) {
        for track in &mut self.tracks {
            if track.status == TrackStatus::Deleted {
                continue;
            }
            let speed = track.speed();
            let probs = &track.imm.mode_probabilities;
            let cv = probs[0];
            let ca = probs[1] + probs[2];
            let ctr = probs[3] + probs[4];

            track.classification = if speed < 2.0 {
                TrackClassification::Clutter
            } else if ctr > 0.4 && speed > 5.0 && speed < 30.0 {
                TrackClassification::DroneRotary
            } else if cv > 0.3 && speed > 15.0 && speed < 80.0 {
                TrackClassification::DroneFixedWing
            } else if ca > 0.3 && speed > 5.0 && speed < 25.0 {
                TrackClassification::Bird
            } else {
                TrackClassification::Unknown
            };
        }
    }

    /// Track table for the display: live tracks plus the ones pruned this
    /// dwell (sent once with status Deleted; the sender may filter them).
    pub fn track_updates(&self) -> Vec<TrackUpdateMessage> {
        let mut updates: Vec<TrackUpdateMessage> =
            self.tracks.iter().map(|t| t.to_update_message()).collect();
        updates.extend(self.deleted_this_dwell.iter().copied());
        updates
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn logger(&self) -> &BinaryLogger {
        &self.logger
    }

    pub fn candidate_count(&self) -> usize {
        self.initiator.candidate_count()
    }

    pub fn num_active_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.status != TrackStatus::Deleted)
            .count()
    }

    pub fn num_confirmed_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.status == TrackStatus::Confirmed)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
