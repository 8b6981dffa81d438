//! Binary wire codecs for the DSP and display interfaces.
//!
//! All messages are little-endian and packed. Layouts:
//!
//! - Detection message (`0x0001`):
//!   `messageId:u32 | dwellCount:u32 | timestamp:u64 | numDetections:u32`
//!   followed by `numDetections` × 8 f64 (64 bytes each).
//! - Track update (`0x0002`): fixed 128 bytes.
//! - Track table (`0x0003`):
//!   `messageId:u32 | timestamp:u64 | numTracks:u32` followed by
//!   `numTracks` × 128-byte track updates.

use crate::error::{Result, TrackerError};
use crate::types::{
    Detection, SpDetectionMessage, Timestamp, TrackClassification, TrackStatus,
    TrackUpdateMessage,
};

pub const MSG_ID_SP_DETECTION: u32 = 0x0001;
pub const MSG_ID_TRACK_UPDATE: u32 = 0x0002;
pub const MSG_ID_TRACK_TABLE: u32 = 0x0003;

/// Size of one serialized detection record.
pub const DETECTION_SIZE: usize = 64;
/// Size of the detection message header.
pub const DETECTION_HEADER_SIZE: usize = 20;
/// Size of one serialized track update.
pub const TRACK_UPDATE_SIZE: usize = 128;
/// Size of the track table header.
pub const TRACK_TABLE_HEADER_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Little-endian cursor
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(TrackerError::Malformed(format!(
                "buffer truncated: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Detection message
// ---------------------------------------------------------------------------

pub fn encode_detection_message(msg: &SpDetectionMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(DETECTION_HEADER_SIZE + msg.detections.len() * DETECTION_SIZE);
    put_u32(&mut out, MSG_ID_SP_DETECTION);
    put_u32(&mut out, msg.dwell_count);
    put_u64(&mut out, msg.timestamp);
    put_u32(&mut out, msg.detections.len() as u32);
    for d in &msg.detections {
        put_f64(&mut out, d.range);
        put_f64(&mut out, d.azimuth);
        put_f64(&mut out, d.elevation);
        put_f64(&mut out, d.strength);
        put_f64(&mut out, d.noise);
        put_f64(&mut out, d.snr);
        put_f64(&mut out, d.rcs);
        put_f64(&mut out, d.micro_doppler);
    }
    out
}

pub fn decode_detection_message(buf: &[u8]) -> Result<SpDetectionMessage> {
    let mut r = Reader::new(buf);
    let message_id = r.u32()?;
    if message_id != MSG_ID_SP_DETECTION {
        return Err(TrackerError::Malformed(format!(
            "unexpected message id 0x{message_id:04X}, expected 0x{MSG_ID_SP_DETECTION:04X}"
        )));
    }
    let dwell_count = r.u32()?;
    let timestamp = r.u64()?;
    let num = r.u32()? as usize;
    let mut detections = Vec::with_capacity(num);
    for _ in 0..num {
        detections.push(Detection {
            range: r.f64()?,
            azimuth: r.f64()?,
            elevation: r.f64()?,
            strength: r.f64()?,
            noise: r.f64()?,
            snr: r.f64()?,
            rcs: r.f64()?,
            micro_doppler: r.f64()?,
        });
    }
    Ok(SpDetectionMessage {
        message_id,
        dwell_count,
        timestamp,
        detections,
    })
}

// ---------------------------------------------------------------------------
// Track update / track table
// ---------------------------------------------------------------------------

pub fn encode_track_update(msg: &TrackUpdateMessage, out: &mut Vec<u8>) {
    put_u32(out, MSG_ID_TRACK_UPDATE);
    put_u32(out, msg.track_id);
    put_u64(out, msg.timestamp);
    put_u32(out, msg.status.as_u32());
    put_u32(out, msg.classification.as_u32());
    put_f64(out, msg.range);
    put_f64(out, msg.azimuth);
    put_f64(out, msg.elevation);
    put_f64(out, msg.range_rate);
    put_f64(out, msg.x);
    put_f64(out, msg.y);
    put_f64(out, msg.z);
    put_f64(out, msg.vx);
    put_f64(out, msg.vy);
    put_f64(out, msg.vz);
    put_f64(out, msg.track_quality);
    put_u32(out, msg.hit_count);
    put_u32(out, msg.miss_count);
    put_u32(out, msg.age);
    put_u32(out, 0); // pad to 128 bytes
}

pub fn decode_track_update(buf: &[u8]) -> Result<TrackUpdateMessage> {
    let mut r = Reader::new(buf);
    let message_id = r.u32()?;
    if message_id != MSG_ID_TRACK_UPDATE {
        return Err(TrackerError::Malformed(format!(
            "unexpected message id 0x{message_id:04X}, expected 0x{MSG_ID_TRACK_UPDATE:04X}"
        )));
    }
    let track_id = r.u32()?;
    let timestamp = r.u64()?;
    let status_raw = r.u32()?;
    let status = TrackStatus::from_u32(status_raw)
        .ok_or_else(|| TrackerError::Malformed(format!("invalid track status {status_raw}")))?;
    let class_raw = r.u32()?;
    let classification = TrackClassification::from_u32(class_raw)
        .ok_or_else(|| TrackerError::Malformed(format!("invalid classification {class_raw}")))?;
    let msg = TrackUpdateMessage {
        message_id,
        track_id,
        timestamp,
        status,
        classification,
        range: r.f64()?,
        azimuth: r.f64()?,
        elevation: r.f64()?,
        range_rate: r.f64()?,
        x: r.f64()?,
        y: r.f64()?,
        z: r.f64()?,
        vx: r.f64()?,
        vy: r.f64()?,
        vz: r.f64()?,
        track_quality: r.f64()?,
        hit_count: r.u32()?,
        miss_count: r.u32()?,
        age: r.u32()?,
    };
    r.u32()?; // pad
    Ok(msg)
}

pub fn encode_track_table(updates: &[TrackUpdateMessage], timestamp: Timestamp) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(TRACK_TABLE_HEADER_SIZE + updates.len() * TRACK_UPDATE_SIZE);
    put_u32(&mut out, MSG_ID_TRACK_TABLE);
    put_u64(&mut out, timestamp);
    put_u32(&mut out, updates.len() as u32);
    for u in updates {
        encode_track_update(u, &mut out);
    }
    out
}

pub fn decode_track_table(buf: &[u8]) -> Result<(Timestamp, Vec<TrackUpdateMessage>)> {
    let mut r = Reader::new(buf);
    let message_id = r.u32()?;
    if message_id != MSG_ID_TRACK_TABLE {
        return Err(TrackerError::Malformed(format!(
            "unexpected message id 0x{message_id:04X}, expected 0x{MSG_ID_TRACK_TABLE:04X}"
        )));
    }
    let timestamp = r.u64()?;
    let num = r.u32()? as usize;
    let mut updates = Vec::with_capacity(num);
    for i in 0..num {
        let start = TRACK_TABLE_HEADER_SIZE + i * TRACK_UPDATE_SIZE;
        if start + TRACK_UPDATE_SIZE > buf.len() {
            return Err(TrackerError::Malformed(format!(
                "track table truncated at record {i}"
            )));
        }
        updates.push(decode_track_update(&buf[start..start + TRACK_UPDATE_SIZE])?);
    }
    Ok((timestamp, updates))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
