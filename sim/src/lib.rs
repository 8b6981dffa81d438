//! Synthetic dwell injection for the counter-UAS tracker.
//!
//! - [`target`]    — ground-truth targets with simple motion specs
//! - [`injector`]  — targets → noisy spherical detections, dwell by dwell
//! - [`scenarios`] — named deterministic scenarios
//! - [`metrics`]   — position-error / continuity accumulators

pub mod injector;
pub mod metrics;
pub mod scenarios;
pub mod target;

pub use injector::{DwellInjector, InjectorParams};
pub use scenarios::{Scenario, ScenarioKind};
pub use target::{MotionSpec, Target};
