//! Detection preprocessing: per-field range/angle/SNR/RCS/strength gating.
//!
//! A detection passes iff every field lies inclusively within its configured
//! [min, max] interval. Input order is preserved; the rejected count
//! accumulates across dwells for observability.

use crate::config::PreprocessConfig;
use crate::types::Detection;
use tracing::debug;

pub struct Preprocessor {
    config: PreprocessConfig,
    rejected: u64,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            rejected: 0,
        }
    }

    fn is_valid(&self, d: &Detection) -> bool {
        let c = &self.config;
        d.range >= c.min_range
            && d.range <= c.max_range
            && d.azimuth >= c.min_azimuth
            && d.azimuth <= c.max_azimuth
            && d.elevation >= c.min_elevation
            && d.elevation <= c.max_elevation
            && d.snr >= c.min_snr
            && d.snr <= c.max_snr
            && d.rcs >= c.min_rcs
            && d.rcs <= c.max_rcs
            && d.strength >= c.min_strength
            && d.strength <= c.max_strength
    }

    /// Filter one dwell's detections, preserving order.
    pub fn process(&mut self, raw: &[Detection]) -> Vec<Detection> {
        let mut filtered = Vec::with_capacity(raw.len());
        for d in raw {
            if self.is_valid(d) {
                filtered.push(*d);
            } else {
                self.rejected += 1;
            }
        }
        debug!(
            input = raw.len(),
            passed = filtered.len(),
            rejected_total = self.rejected,
            "preprocessed dwell"
        );
        filtered
    }

    /// Total detections rejected since construction.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
