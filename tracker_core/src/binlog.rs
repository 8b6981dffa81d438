//! Binary stage logger.
//!
//! Every pipeline stage appends a framed record:
//! `magic:u32 (0xCAFEBABE) | recordType:u32 | timestamp:u64 | payloadSize:u32`
//! followed by the payload. The logger is internally synchronized and
//! becomes a no-op when disabled or when opening the file failed.

use crate::types::{
    Cluster, ClusterId, Detection, SpDetectionMessage, StateVec, Timestamp, TrackId, TrackStatus,
    TrackUpdateMessage,
};
use crate::wire;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

pub const LOG_MAGIC: u32 = 0xCAFE_BABE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum LogRecordType {
    RawDetection = 0,
    Preprocessed = 1,
    Clustered = 2,
    Predicted = 3,
    Associated = 4,
    TrackInitiated = 5,
    TrackUpdated = 6,
    TrackDeleted = 7,
    TrackSent = 8,
}

impl LogRecordType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => LogRecordType::RawDetection,
            1 => LogRecordType::Preprocessed,
            2 => LogRecordType::Clustered,
            3 => LogRecordType::Predicted,
            4 => LogRecordType::Associated,
            5 => LogRecordType::TrackInitiated,
            6 => LogRecordType::TrackUpdated,
            7 => LogRecordType::TrackDeleted,
            8 => LogRecordType::TrackSent,
            _ => return None,
        })
    }
}

/// Header size on disk.
pub const LOG_HEADER_SIZE: usize = 20;

#[derive(Default)]
pub struct BinaryLogger {
    file: Mutex<Option<BufWriter<File>>>,
}

impl BinaryLogger {
    /// A logger that drops every record.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open `<directory>/<prefix>_<epoch-seconds>.bin`, creating the
    /// directory if needed. Failure leaves the logger disabled.
    pub fn open(directory: &str, prefix: &str) -> Self {
        let logger = Self::default();
        if let Err(e) = std::fs::create_dir_all(directory) {
            warn!(directory, error = %e, "cannot create log directory");
            return logger;
        }
        let epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = Path::new(directory).join(format!("{prefix}_{epoch}.bin"));
        match File::create(&path) {
            Ok(f) => {
                info!(path = %path.display(), "opened binary log");
                *logger.file.lock().unwrap() = Some(BufWriter::new(f));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "cannot open binary log"),
        }
        logger
    }

    pub fn is_open(&self) -> bool {
        self.file.lock().unwrap().is_some()
    }

    fn write_record(&self, record_type: LogRecordType, ts: Timestamp, payload: &[u8]) {
        let mut guard = self.file.lock().unwrap();
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let mut header = Vec::with_capacity(LOG_HEADER_SIZE);
        header.extend_from_slice(&LOG_MAGIC.to_le_bytes());
        header.extend_from_slice(&(record_type as u32).to_le_bytes());
        header.extend_from_slice(&ts.to_le_bytes());
        header.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        if writer.write_all(&header).and_then(|_| writer.write_all(payload)).is_err() {
            // Stop logging on the first write failure.
            *guard = None;
            warn!("binary log write failed; logging disabled");
        }
    }

    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap();
        if let Some(writer) = guard.as_mut() {
            let _ = writer.flush();
        }
        *guard = None;
    }

    // -- per-stage helpers ---------------------------------------------------

    pub fn log_raw(&self, ts: Timestamp, msg: &SpDetectionMessage) {
        if !self.is_open() {
            return;
        }
        self.write_record(
            LogRecordType::RawDetection,
            ts,
            &wire::encode_detection_message(msg),
        );
    }

    pub fn log_preprocessed(&self, ts: Timestamp, detections: &[Detection]) {
        if !self.is_open() {
            return;
        }
        let mut payload = Vec::with_capacity(4 + detections.len() * wire::DETECTION_SIZE);
        payload.extend_from_slice(&(detections.len() as u32).to_le_bytes());
        for d in detections {
            for v in [
                d.range,
                d.azimuth,
                d.elevation,
                d.strength,
                d.noise,
                d.snr,
                d.rcs,
                d.micro_doppler,
            ] {
                payload.extend_from_slice(&v.to_le_bytes());
            }
        }
        self.write_record(LogRecordType::Preprocessed, ts, &payload);
    }

    pub fn log_clustered(&self, ts: Timestamp, clusters: &[Cluster]) {
        if !self.is_open() {
            return;
        }
        let mut payload = Vec::new();
        payload.extend_from_slice(&(clusters.len() as u32).to_le_bytes());
        for c in clusters {
            payload.extend_from_slice(&c.cluster_id.0.to_le_bytes());
            payload.extend_from_slice(&c.num_detections.to_le_bytes());
            for v in [
                c.range,
                c.azimuth,
                c.elevation,
                c.strength,
                c.snr,
                c.rcs,
                c.micro_doppler,
                c.cartesian.x,
                c.cartesian.y,
                c.cartesian.z,
            ] {
                payload.extend_from_slice(&v.to_le_bytes());
            }
        }
        self.write_record(LogRecordType::Clustered, ts, &payload);
    }

    fn state_payload(track_id: TrackId, state: &StateVec) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 + 72);
        payload.extend_from_slice(&track_id.0.to_le_bytes());
        for i in 0..9 {
            payload.extend_from_slice(&state[i].to_le_bytes());
        }
        payload
    }

    pub fn log_predicted(&self, ts: Timestamp, track_id: TrackId, state: &StateVec) {
        if !self.is_open() {
            return;
        }
        self.write_record(LogRecordType::Predicted, ts, &Self::state_payload(track_id, state));
    }

    pub fn log_associated(
        &self,
        ts: Timestamp,
        track_id: TrackId,
        cluster_id: ClusterId,
        distance: f64,
    ) {
        if !self.is_open() {
            return;
        }
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&track_id.0.to_le_bytes());
        payload.extend_from_slice(&cluster_id.0.to_le_bytes());
        payload.extend_from_slice(&distance.to_le_bytes());
        self.write_record(LogRecordType::Associated, ts, &payload);
    }

    pub fn log_initiated(&self, ts: Timestamp, track_id: TrackId, state: &StateVec) {
        if !self.is_open() {
            return;
        }
        self.write_record(
            LogRecordType::TrackInitiated,
            ts,
            &Self::state_payload(track_id, state),
        );
    }

    pub fn log_updated(
        &self,
        ts: Timestamp,
        track_id: TrackId,
        state: &StateVec,
        status: TrackStatus,
    ) {
        if !self.is_open() {
            return;
        }
        let mut payload = Self::state_payload(track_id, state);
        payload.extend_from_slice(&status.as_u32().to_le_bytes());
        self.write_record(LogRecordType::TrackUpdated, ts, &payload);
    }

    pub fn log_deleted(&self, ts: Timestamp, track_id: TrackId) {
        if !self.is_open() {
            return;
        }
        self.write_record(LogRecordType::TrackDeleted, ts, &track_id.0.to_le_bytes());
    }

    pub fn log_sent(&self, ts: Timestamp, update: &TrackUpdateMessage) {
        if !self.is_open() {
            return;
        }
        let mut payload = Vec::with_capacity(wire::TRACK_UPDATE_SIZE);
        wire::encode_track_update(update, &mut payload);
        self.write_record(LogRecordType::TrackSent, ts, &payload);
    }
}

impl Drop for BinaryLogger {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
