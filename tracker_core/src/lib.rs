//! `tracker_core` — Real-time 3D multi-target tracking for counter-UAS radar.
//!
//! # Module layout
//! - [`types`]       — Fundamental types (detections, clusters, state vectors, messages)
//! - [`config`]      — JSON configuration tree with reference defaults
//! - [`error`]       — Error type for the fallible boundaries
//! - [`wire`]        — Binary codecs for the DSP / display interfaces
//! - [`preprocess`]  — Per-detection field gating
//! - [`clustering`]  — Detection → measurement clustering strategies
//! - [`models`]      — CV / CA / CTR motion models
//! - [`imm`]         — Interacting Multiple Model filter
//! - [`association`] — Gated track-to-cluster assignment strategies
//! - [`track`]       — Track entity and lifecycle counters
//! - [`initiator`]   — M-of-N track initiation
//! - [`manager`]     — Per-dwell orchestrator
//! - [`binlog`]      — Binary stage logger
//! - [`net`]         — UDP receiver / sender collaborators
//! - [`pipeline`]    — Ingress queue + processing thread lifecycle

pub mod association;
pub mod binlog;
pub mod clustering;
pub mod config;
pub mod error;
pub mod imm;
pub mod initiator;
pub mod manager;
pub mod models;
pub mod net;
pub mod pipeline;
pub mod preprocess;
pub mod track;
pub mod types;
pub mod wire;

pub use config::{load_config, TrackerConfig};
pub use error::{Result, TrackerError};
pub use manager::TrackManager;
pub use pipeline::TrackerPipeline;
pub use track::Track;
pub use types::{
    Cluster, Detection, SpDetectionMessage, TrackClassification, TrackId, TrackStatus,
    TrackUpdateMessage,
};
