//! Named deterministic scenarios for batch runs and regression checks.

use crate::injector::InjectorParams;
use crate::target::{MotionSpec, Target};
use clap::ValueEnum;

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    /// One inbound rotary drone on a straight path.
    SingleInbound,
    /// Two fixed-wing targets crossing paths.
    CrossingPair,
    /// One drone orbiting at constant turn rate.
    TurningDrone,
    /// A slow drone buried in clutter.
    ClutterField,
}

pub struct Scenario {
    pub name: &'static str,
    pub targets: Vec<Target>,
    pub injector: InjectorParams,
    /// Simulation length (s).
    pub duration: f64,
    /// Dwell period (s).
    pub dwell_period: f64,
}

impl Scenario {
    pub fn build(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::SingleInbound => Scenario {
                name: "single_inbound",
                targets: vec![Target::new(
                    0,
                    [4000.0, 1000.0, 200.0],
                    [-18.0, -4.0, 0.0],
                    MotionSpec::ConstantVelocity,
                )],
                injector: InjectorParams::default(),
                duration: 30.0,
                dwell_period: 0.1,
            },
            ScenarioKind::CrossingPair => {
                let mut a = Target::new(
                    0,
                    [2000.0, -800.0, 300.0],
                    [25.0, 8.0, 0.0],
                    MotionSpec::ConstantVelocity,
                );
                a.micro_doppler_hz = 20.0;
                let mut b = Target::new(
                    1,
                    [3500.0, 800.0, 350.0],
                    [-25.0, -8.0, 0.0],
                    MotionSpec::ConstantVelocity,
                );
                b.micro_doppler_hz = 20.0;
                Scenario {
                    name: "crossing_pair",
                    targets: vec![a, b],
                    injector: InjectorParams::default(),
                    duration: 40.0,
                    dwell_period: 0.1,
                }
            }
            ScenarioKind::TurningDrone => Scenario {
                name: "turning_drone",
                targets: vec![Target::new(
                    0,
                    [1500.0, 0.0, 150.0],
                    [0.0, 12.0, 0.0],
                    MotionSpec::ConstantTurn { omega: 0.2 },
                )],
                injector: InjectorParams::default(),
                duration: 60.0,
                dwell_period: 0.1,
            },
            ScenarioKind::ClutterField => Scenario {
                name: "clutter_field",
                targets: vec![Target::new(
                    0,
                    [2500.0, 500.0, 120.0],
                    [8.0, -3.0, 0.0],
                    MotionSpec::ConstantVelocity,
                )],
                injector: InjectorParams {
                    clutter_rate: 3.0,
                    ..InjectorParams::default()
                },
                duration: 30.0,
                dwell_period: 0.1,
            },
        }
    }
}
