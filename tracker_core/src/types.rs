//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Scalar / time types: f64 throughout for numerical precision in the filters.
// ---------------------------------------------------------------------------

/// Microseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in microseconds.
pub fn now_micros() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// State / measurement dimensions
// ---------------------------------------------------------------------------

/// State dimension: [x, vx, ax, y, vy, ay, z, vz, az]
pub const STATE_DIM: usize = 9;
/// Measurement dimension: Cartesian [x, y, z]
pub const MEAS_DIM: usize = 3;
/// Number of motion models in the IMM bank (CV, CA1, CA2, CTR1, CTR2).
pub const IMM_MODELS: usize = 5;

/// 9-dimensional state vector [x, vx, ax, y, vy, ay, z, vz, az]
pub type StateVec = SVector<f64, STATE_DIM>;
/// 9×9 state covariance
pub type StateCov = SMatrix<f64, STATE_DIM, STATE_DIM>;
/// 3-dimensional Cartesian measurement [x, y, z]
pub type MeasVec = Vector3<f64>;
/// 3×3 measurement covariance
pub type MeasCov = Matrix3<f64>;
/// 3×9 measurement matrix H
pub type MeasMat = SMatrix<f64, MEAS_DIM, STATE_DIM>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Detection from the signal processor
// ---------------------------------------------------------------------------

/// One threshold-crossing return produced by the DSP within a dwell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Slant range (m)
    pub range: f64,
    /// Azimuth (rad)
    pub azimuth: f64,
    /// Elevation (rad)
    pub elevation: f64,
    /// Signal strength (dBm)
    pub strength: f64,
    /// Noise floor (dBm)
    pub noise: f64,
    /// Signal-to-noise ratio (dB)
    pub snr: f64,
    /// Radar cross section (dBsm)
    pub rcs: f64,
    /// Micro-Doppler spread (Hz)
    pub micro_doppler: f64,
}

/// A batch of detections with a common timestamp — one radar dwell.
#[derive(Clone, Debug, Default)]
pub struct SpDetectionMessage {
    pub message_id: u32,
    pub dwell_count: u32,
    pub timestamp: Timestamp,
    pub detections: Vec<Detection>,
}

// ---------------------------------------------------------------------------
// Coordinate frames
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CartesianPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SphericalPos {
    pub range: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

/// Radar convention: x east, y north, z up; azimuth in the xy-plane,
/// elevation from the horizontal.
pub fn spherical_to_cartesian(range: f64, azimuth: f64, elevation: f64) -> CartesianPos {
    CartesianPos {
        x: range * elevation.cos() * azimuth.cos(),
        y: range * elevation.cos() * azimuth.sin(),
        z: range * elevation.sin(),
    }
}

pub fn cartesian_to_spherical(x: f64, y: f64, z: f64) -> SphericalPos {
    let range = (x * x + y * y + z * z).sqrt();
    SphericalPos {
        range,
        azimuth: y.atan2(x),
        elevation: if range > 1e-9 { (z / range).asin() } else { 0.0 },
    }
}

// ---------------------------------------------------------------------------
// Cluster: centroided group of detections (the tracker's measurement)
// ---------------------------------------------------------------------------

/// Strength-weighted centroid of one detection group.
#[derive(Clone, Debug, Default)]
pub struct Cluster {
    pub cluster_id: ClusterId,
    pub range: f64,
    pub azimuth: f64,
    pub elevation: f64,
    /// Arithmetic mean strength of the members (dBm)
    pub strength: f64,
    pub snr: f64,
    pub rcs: f64,
    pub micro_doppler: f64,
    pub num_detections: u32,
    /// Centroid converted to Cartesian — the measurement fed to the filter.
    pub cartesian: CartesianPos,
    /// Indices of the contributing detections within the preprocessed dwell.
    pub detection_indices: Vec<u32>,
}

impl Cluster {
    /// The Cartesian centroid as a measurement vector.
    pub fn measurement(&self) -> MeasVec {
        MeasVec::new(self.cartesian.x, self.cartesian.y, self.cartesian.z)
    }
}

// ---------------------------------------------------------------------------
// Track status and classification
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Newly initiated, not yet confirmed
    Tentative,
    /// Receiving regular updates
    Confirmed,
    /// Confirmed track currently missing detections
    Coasting,
    /// Marked for removal; pruned at the end of the dwell
    Deleted,
}

impl TrackStatus {
    pub fn as_u32(self) -> u32 {
        match self {
            TrackStatus::Tentative => 0,
            TrackStatus::Confirmed => 1,
            TrackStatus::Coasting => 2,
            TrackStatus::Deleted => 3,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(TrackStatus::Tentative),
            1 => Some(TrackStatus::Confirmed),
            2 => Some(TrackStatus::Coasting),
            3 => Some(TrackStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackClassification {
    Unknown,
    DroneRotary,
    DroneFixedWing,
    Bird,
    Clutter,
}

impl TrackClassification {
    pub fn as_u32(self) -> u32 {
        match self {
            TrackClassification::Unknown => 0,
            TrackClassification::DroneRotary => 1,
            TrackClassification::DroneFixedWing => 2,
            TrackClassification::Bird => 3,
            TrackClassification::Clutter => 4,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(TrackClassification::Unknown),
            1 => Some(TrackClassification::DroneRotary),
            2 => Some(TrackClassification::DroneFixedWing),
            3 => Some(TrackClassification::Bird),
            4 => Some(TrackClassification::Clutter),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Track update sent to the display
// ---------------------------------------------------------------------------

/// One track's state as serialized for the display (128-byte wire record).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackUpdateMessage {
    pub message_id: u32,
    pub track_id: u32,
    pub timestamp: Timestamp,
    pub status: TrackStatus,
    pub classification: TrackClassification,
    pub range: f64,
    pub azimuth: f64,
    pub elevation: f64,
    pub range_rate: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub track_quality: f64,
    pub hit_count: u32,
    pub miss_count: u32,
    pub age: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
