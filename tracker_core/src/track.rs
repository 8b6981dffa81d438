//! Track: IMM state plus lifecycle book-keeping.
//!
//! Status transitions are driven by the track manager; the track itself only
//! records hits/misses and projects its merged estimate for the display.

use crate::imm::ImmState;
use crate::types::{
    cartesian_to_spherical, CartesianPos, SphericalPos, StateCov, StateVec, Timestamp,
    TrackClassification, TrackId, TrackStatus, TrackUpdateMessage, IMM_MODELS,
};
use crate::wire::MSG_ID_TRACK_UPDATE;

/// One tracked target.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: TrackId,
    pub status: TrackStatus,
    pub classification: TrackClassification,
    /// Per-model filter state; `imm.merged_state` is the authoritative estimate.
    pub imm: ImmState,
    /// Total number of measurement updates (birth counts as the first hit).
    pub hit_count: u32,
    /// Total number of missed dwells.
    pub miss_count: u32,
    /// Misses since the last hit; reset on every hit.
    pub consecutive_misses: u32,
    /// Dwells since birth.
    pub age: u32,
    /// Track quality in [0, 1].
    pub quality: f64,
    pub initiation_time: Timestamp,
    pub last_update_time: Timestamp,
}

impl Track {
    /// Create a tentative track from an initial state estimate. Every IMM
    /// model starts from the same state and covariance.
    pub fn new(
        id: TrackId,
        x0: StateVec,
        p0: StateCov,
        mode_probabilities: [f64; IMM_MODELS],
        birth_time: Timestamp,
    ) -> Self {
        Self {
            id,
            status: TrackStatus::Tentative,
            classification: TrackClassification::Unknown,
            imm: ImmState::new(x0, p0, mode_probabilities),
            hit_count: 1,
            miss_count: 0,
            consecutive_misses: 0,
            age: 0,
            quality: 0.5,
            initiation_time: birth_time,
            last_update_time: birth_time,
        }
    }

    pub fn position(&self) -> CartesianPos {
        CartesianPos {
            x: self.imm.merged_state[0],
            y: self.imm.merged_state[3],
            z: self.imm.merged_state[6],
        }
    }

    pub fn velocity(&self) -> CartesianPos {
        CartesianPos {
            x: self.imm.merged_state[1],
            y: self.imm.merged_state[4],
            z: self.imm.merged_state[7],
        }
    }

    pub fn speed(&self) -> f64 {
        let v = self.velocity();
        (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
    }

    pub fn spherical_position(&self) -> SphericalPos {
        let p = self.position();
        cartesian_to_spherical(p.x, p.y, p.z)
    }

    /// Radial closing speed, (r⃗·v⃗)/|r⃗|.
    pub fn range_rate(&self) -> f64 {
        let p = self.position();
        let v = self.velocity();
        let r = (p.x * p.x + p.y * p.y + p.z * p.z).sqrt();
        if r < 1e-9 {
            return 0.0;
        }
        (p.x * v.x + p.y * v.y + p.z * v.z) / r
    }

    pub fn record_hit(&mut self, now: Timestamp) {
        self.hit_count += 1;
        self.consecutive_misses = 0;
        self.last_update_time = now;
    }

    pub fn record_miss(&mut self) {
        self.miss_count += 1;
        self.consecutive_misses += 1;
    }

    pub fn increment_age(&mut self) {
        self.age += 1;
    }

    /// Project the merged estimate into the display message.
    pub fn to_update_message(&self) -> TrackUpdateMessage {
        let sph = self.spherical_position();
        let pos = self.position();
        let vel = self.velocity();
        TrackUpdateMessage {
            message_id: MSG_ID_TRACK_UPDATE,
            track_id: self.id.0,
            timestamp: self.last_update_time,
            status: self.status,
            classification: self.classification,
            range: sph.range,
            azimuth: sph.azimuth,
            elevation: sph.elevation,
            range_rate: self.range_rate(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            vx: vel.x,
            vy: vel.y,
            vz: vel.z,
            track_quality: self.quality,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            age: self.age,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
