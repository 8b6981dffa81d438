//! Tracker configuration tree, loaded from JSON.
//!
//! Every section and field carries the reference default, so a partial (or
//! absent) section simply falls back to defaults. Keys are camelCase to match
//! the deployed config files.

use crate::error::{Result, TrackerError};
use crate::types::IMM_MODELS;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemConfig {
    pub cycle_period_ms: u32,
    pub max_detections_per_dwell: usize,
    pub max_tracks: usize,
    pub log_directory: String,
    pub log_enabled: bool,
    /// 0 = off … 5 = trace; mapped onto the tracing level filter by the CLI.
    pub log_level: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: 100,
            max_detections_per_dwell: 256,
            max_tracks: 200,
            log_directory: "./logs".to_string(),
            log_enabled: true,
            log_level: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    pub receiver_ip: String,
    pub receiver_port: u16,
    pub sender_ip: String,
    pub sender_port: u16,
    pub receive_buffer_size: usize,
    pub send_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            receiver_ip: "0.0.0.0".to_string(),
            receiver_port: 50000,
            sender_ip: "127.0.0.1".to_string(),
            sender_port: 50001,
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessConfig {
    pub min_range: f64,
    pub max_range: f64,
    pub min_azimuth: f64,
    pub max_azimuth: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    #[serde(rename = "minSNR")]
    pub min_snr: f64,
    #[serde(rename = "maxSNR")]
    pub max_snr: f64,
    #[serde(rename = "minRCS")]
    pub min_rcs: f64,
    #[serde(rename = "maxRCS")]
    pub max_rcs: f64,
    pub min_strength: f64,
    pub max_strength: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_range: 50.0,
            max_range: 20_000.0,
            min_azimuth: -std::f64::consts::PI,
            max_azimuth: std::f64::consts::PI,
            min_elevation: -0.1745,
            max_elevation: 1.5708,
            min_snr: 8.0,
            max_snr: 60.0,
            min_rcs: -30.0,
            max_rcs: 20.0,
            min_strength: -100.0,
            max_strength: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMethod {
    Dbscan,
    RangeBased,
    RangeStrength,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DbscanConfig {
    pub epsilon_range: f64,
    pub epsilon_azimuth: f64,
    pub epsilon_elevation: f64,
    pub min_points: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        Self {
            epsilon_range: 50.0,
            epsilon_azimuth: 0.02,
            epsilon_elevation: 0.02,
            min_points: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RangeBasedConfig {
    pub range_gate_size: f64,
    pub azimuth_gate_size: f64,
    pub elevation_gate_size: f64,
}

impl Default for RangeBasedConfig {
    fn default() -> Self {
        Self {
            range_gate_size: 75.0,
            azimuth_gate_size: 0.03,
            elevation_gate_size: 0.03,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RangeStrengthConfig {
    pub range_gate_size: f64,
    pub azimuth_gate_size: f64,
    pub elevation_gate_size: f64,
    pub strength_gate_size: f64,
}

impl Default for RangeStrengthConfig {
    fn default() -> Self {
        Self {
            range_gate_size: 75.0,
            azimuth_gate_size: 0.03,
            elevation_gate_size: 0.03,
            strength_gate_size: 6.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterConfig {
    pub method: ClusterMethod,
    pub dbscan: DbscanConfig,
    pub range_based: RangeBasedConfig,
    pub range_strength: RangeStrengthConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            method: ClusterMethod::Dbscan,
            dbscan: DbscanConfig::default(),
            range_based: RangeBasedConfig::default(),
            range_strength: RangeStrengthConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImmConfig {
    pub initial_mode_probabilities: [f64; IMM_MODELS],
    /// Row-stochastic Markov transition matrix; row i = from model i.
    pub transition_matrix: [[f64; IMM_MODELS]; IMM_MODELS],
}

impl Default for ImmConfig {
    fn default() -> Self {
        Self {
            initial_mode_probabilities: [0.4, 0.15, 0.15, 0.15, 0.15],
            transition_matrix: [
                [0.92, 0.02, 0.02, 0.02, 0.02],
                [0.15, 0.79, 0.02, 0.02, 0.02],
                [0.15, 0.02, 0.79, 0.02, 0.02],
                [0.15, 0.02, 0.02, 0.79, 0.02],
                [0.15, 0.02, 0.02, 0.02, 0.79],
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CvConfig {
    pub process_noise_std: f64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            process_noise_std: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaConfig {
    pub process_noise_std: f64,
    pub accel_decay_rate: f64,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            process_noise_std: 2.0,
            accel_decay_rate: 0.95,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CtrConfig {
    pub process_noise_std: f64,
    pub turn_rate_noise_std: f64,
}

impl Default for CtrConfig {
    fn default() -> Self {
        Self {
            process_noise_std: 1.5,
            turn_rate_noise_std: 0.05,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PredictionConfig {
    pub imm: ImmConfig,
    pub cv: CvConfig,
    pub ca1: CaConfig,
    pub ca2: CaConfig,
    pub ctr1: CtrConfig,
    pub ctr2: CtrConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    Mahalanobis,
    Gnn,
    Jpda,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MahalanobisConfig {
    pub distance_threshold: f64,
}

impl Default for MahalanobisConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 9.21,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GnnConfig {
    pub cost_threshold: f64,
}

impl Default for GnnConfig {
    fn default() -> Self {
        Self {
            cost_threshold: 16.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JpdaConfig {
    pub gate_size: f64,
    pub clutter_density: f64,
    pub detection_probability: f64,
}

impl Default for JpdaConfig {
    fn default() -> Self {
        Self {
            gate_size: 16.0,
            clutter_density: 1e-6,
            detection_probability: 0.9,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssociationConfig {
    pub method: AssociationMethod,
    pub gating_threshold: f64,
    pub mahalanobis: MahalanobisConfig,
    pub gnn: GnnConfig,
    pub jpda: JpdaConfig,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            method: AssociationMethod::Gnn,
            gating_threshold: 16.0,
            mahalanobis: MahalanobisConfig::default(),
            gnn: GnnConfig::default(),
            jpda: JpdaConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitiationConfig {
    /// Hits required within the window
    pub m: u32,
    /// Window length in opportunities
    pub n: u32,
    pub max_initiation_range: f64,
    /// Expected maximum closing speed used for the candidate range gate (m/s)
    pub velocity_gate: f64,
}

impl Default for InitiationConfig {
    fn default() -> Self {
        Self {
            m: 3,
            n: 5,
            max_initiation_range: 15_000.0,
            velocity_gate: 100.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaintenanceConfig {
    pub confirm_hits: u32,
    pub coasting_limit: u32,
    /// Accepted for config compatibility; deletion is driven by
    /// `deletion.maxCoastingDwells`.
    pub delete_after_misses: u32,
    pub quality_decay_rate: f64,
    pub quality_boost: f64,
    pub min_quality_threshold: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            confirm_hits: 5,
            coasting_limit: 10,
            delete_after_misses: 15,
            quality_decay_rate: 0.95,
            quality_boost: 0.1,
            min_quality_threshold: 0.1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeletionConfig {
    pub max_coasting_dwells: u32,
    pub min_quality: f64,
    pub max_range: f64,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            max_coasting_dwells: 15,
            min_quality: 0.05,
            max_range: 25_000.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitialCovarianceConfig {
    pub position_std: f64,
    pub velocity_std: f64,
    pub acceleration_std: f64,
}

impl Default for InitialCovarianceConfig {
    fn default() -> Self {
        Self {
            position_std: 50.0,
            velocity_std: 20.0,
            acceleration_std: 5.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackManagementConfig {
    pub initiation: InitiationConfig,
    pub maintenance: MaintenanceConfig,
    pub deletion: DeletionConfig,
    pub initial_covariance: InitialCovarianceConfig,
    /// 1σ Cartesian measurement noise (m); R = diag(σ²).
    pub measurement_noise_std: f64,
}

impl Default for TrackManagementConfig {
    fn default() -> Self {
        Self {
            initiation: InitiationConfig::default(),
            maintenance: MaintenanceConfig::default(),
            deletion: DeletionConfig::default(),
            initial_covariance: InitialCovarianceConfig::default(),
            measurement_noise_std: 25.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplayConfig {
    pub update_rate_ms: u32,
    pub send_deleted_tracks: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            update_rate_ms: 200,
            send_deleted_tracks: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    pub system: SystemConfig,
    pub network: NetworkConfig,
    pub preprocessing: PreprocessConfig,
    pub clustering: ClusterConfig,
    pub prediction: PredictionConfig,
    pub association: AssociationConfig,
    pub track_management: TrackManagementConfig,
    pub display: DisplayConfig,
}

/// Load a configuration file, validating the IMM transition matrix.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TrackerConfig> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        TrackerError::Config(format!(
            "cannot open config file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    let config: TrackerConfig = serde_json::from_str(&text)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &TrackerConfig) -> Result<()> {
    for (i, row) in config.prediction.imm.transition_matrix.iter().enumerate() {
        let sum: f64 = row.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(TrackerError::Config(format!(
                "transition matrix row {i} sums to {sum}, expected 1"
            )));
        }
        if row.iter().any(|&p| p < 0.0) {
            return Err(TrackerError::Config(format!(
                "transition matrix row {i} has a negative entry"
            )));
        }
    }
    if config.track_management.initiation.m > config.track_management.initiation.n {
        return Err(TrackerError::Config(
            "initiation.m must not exceed initiation.n".to_string(),
        ));
    }
    if config.system.cycle_period_ms == 0 {
        return Err(TrackerError::Config(
            "system.cyclePeriodMs must be positive".to_string(),
        ));
    }
    Ok(())
}
