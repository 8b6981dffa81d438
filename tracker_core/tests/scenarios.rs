//! Deterministic end-to-end scenarios over the full per-dwell pipeline:
//! 100 ms cycle, confirmation after 3 hits, M-of-N = 3-of-5, σ_R = 25 m.

use tracker_core::config::{AssociationMethod, TrackerConfig};
use tracker_core::manager::TrackManager;
use tracker_core::types::{
    cartesian_to_spherical, Detection, SpDetectionMessage, Timestamp, TrackStatus,
};
use tracker_core::wire::MSG_ID_SP_DETECTION;

const CYCLE_US: Timestamp = 100_000;
const T0: Timestamp = 1_000_000;

fn scenario_config() -> TrackerConfig {
    let mut cfg = TrackerConfig::default();
    cfg.system.log_enabled = false;
    cfg.track_management.maintenance.confirm_hits = 3;
    cfg.track_management.initiation.m = 3;
    cfg.track_management.initiation.n = 5;
    cfg
}

fn detection_from_cartesian(x: f64, y: f64, z: f64) -> Detection {
    let s = cartesian_to_spherical(x, y, z);
    Detection {
        range: s.range,
        azimuth: s.azimuth,
        elevation: s.elevation,
        strength: -60.0,
        noise: -95.0,
        snr: 20.0,
        rcs: -10.0,
        micro_doppler: 80.0,
    }
}

fn dwell(dwell_count: u32, detections: Vec<Detection>) -> SpDetectionMessage {
    SpDetectionMessage {
        message_id: MSG_ID_SP_DETECTION,
        dwell_count,
        timestamp: T0 + (dwell_count as u64 - 1) * CYCLE_US,
        detections,
    }
}

/// Scenario 1: a single target on a straight line at (10, 0, 0) m/s from
/// (1000, 0, 100) m, one noiseless detection per dwell.
#[test]
fn straight_line_target_is_confirmed_with_good_velocity() {
    let mut mgr = TrackManager::new(scenario_config());

    let pos = |k: u32| {
        let t = (k - 1) as f64 * 0.1;
        (1000.0 + 10.0 * t, 0.0, 100.0)
    };

    // Dwell 1: one candidate, no track yet.
    let (x, y, z) = pos(1);
    mgr.process_dwell(&dwell(1, vec![detection_from_cartesian(x, y, z)]));
    assert_eq!(mgr.candidate_count(), 1);
    assert_eq!(mgr.num_active_tracks(), 0);

    // Dwell 2: still accumulating.
    let (x, y, z) = pos(2);
    mgr.process_dwell(&dwell(2, vec![detection_from_cartesian(x, y, z)]));
    assert_eq!(mgr.num_active_tracks(), 0);

    // Dwell 3: promoted.
    let (x, y, z) = pos(3);
    mgr.process_dwell(&dwell(3, vec![detection_from_cartesian(x, y, z)]));
    assert_eq!(mgr.num_active_tracks(), 1);
    assert_eq!(mgr.tracks()[0].status, TrackStatus::Tentative);

    for k in 4..=6u32 {
        let (x, y, z) = pos(k);
        mgr.process_dwell(&dwell(k, vec![detection_from_cartesian(x, y, z)]));
        if k == 5 {
            assert_eq!(
                mgr.tracks()[0].status,
                TrackStatus::Confirmed,
                "confirmed at the third update"
            );
        }
    }

    let track = &mgr.tracks()[0];
    assert_eq!(track.status, TrackStatus::Confirmed);
    assert!(
        (track.speed() - 10.0).abs() < 2.0,
        "speed estimate {:.2} m/s should be within 2 m/s of truth",
        track.speed()
    );
    let cv = track.imm.mode_probabilities[0];
    assert!(cv > 0.5, "CV mode probability {cv:.3} should dominate by dwell 6");
    let sum: f64 = track.imm.mode_probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

/// Scenario 2: the same target disappears after dwell 5; the track coasts,
/// then is deleted when consecutive misses reach the coasting limit.
#[test]
fn disappearing_target_coasts_then_deletes() {
    let mut cfg = scenario_config();
    cfg.track_management.deletion.max_coasting_dwells = 8;
    let mut mgr = TrackManager::new(cfg);

    for k in 1..=5u32 {
        let t = (k - 1) as f64 * 0.1;
        mgr.process_dwell(&dwell(
            k,
            vec![detection_from_cartesian(1000.0 + 10.0 * t, 0.0, 100.0)],
        ));
    }
    assert_eq!(mgr.num_confirmed_tracks(), 1);
    let hits_at_disappearance = mgr.tracks()[0].hit_count;

    // First empty dwell: Confirmed -> Coasting.
    mgr.process_dwell(&dwell(6, vec![]));
    assert_eq!(mgr.tracks()[0].status, TrackStatus::Coasting);

    // Coasting persists while misses accumulate; hitCount never changes.
    for k in 7..=12u32 {
        mgr.process_dwell(&dwell(k, vec![]));
        assert_eq!(mgr.num_active_tracks(), 1, "still coasting at dwell {k}");
        assert_eq!(mgr.tracks()[0].status, TrackStatus::Coasting);
        assert_eq!(mgr.tracks()[0].hit_count, hits_at_disappearance);
    }

    // Eighth consecutive miss reaches the limit: deleted and pruned.
    mgr.process_dwell(&dwell(13, vec![]));
    assert_eq!(mgr.num_active_tracks(), 0);
    assert_eq!(
        mgr.track_updates().len(),
        1,
        "final snapshot carries the deleted track once"
    );
    assert_eq!(mgr.track_updates()[0].status, TrackStatus::Deleted);

    mgr.process_dwell(&dwell(14, vec![]));
    assert!(mgr.track_updates().is_empty(), "deleted is a sink state");
}

/// Scenario 3: two targets crossing in x under GNN keep their identities.
#[test]
fn crossing_targets_keep_identity_under_gnn() {
    let mut cfg = scenario_config();
    cfg.association.method = AssociationMethod::Gnn;
    let mut mgr = TrackManager::new(cfg);

    let pos_a = |t: f64| (995.0 + 5.0 * t, -100.0, 100.0);
    let pos_b = |t: f64| (1005.0 - 5.0 * t, 100.0, 100.0);

    let mut id_by_direction = std::collections::HashMap::new();
    for k in 1..=40u32 {
        let t = (k - 1) as f64 * 0.1;
        let (ax, ay, az) = pos_a(t);
        let (bx, by, bz) = pos_b(t);
        mgr.process_dwell(&dwell(
            k,
            vec![
                detection_from_cartesian(ax, ay, az),
                detection_from_cartesian(bx, by, bz),
            ],
        ));

        if k == 10 {
            assert_eq!(mgr.num_active_tracks(), 2);
            for track in mgr.tracks() {
                let direction = track.velocity().x > 0.0;
                id_by_direction.insert(direction, track.id);
            }
            assert_eq!(id_by_direction.len(), 2);
        }
    }

    // Both survive the crossing (t = 1 s) and no identity swap occurred:
    // the eastbound track still carries the eastbound id.
    assert_eq!(mgr.num_active_tracks(), 2);
    for track in mgr.tracks() {
        assert_eq!(track.status, TrackStatus::Confirmed);
        let direction = track.velocity().x > 0.0;
        assert_eq!(
            id_by_direction[&direction], track.id,
            "track {} changed identity across the crossing",
            track.id
        );
    }
}

/// Scenario 3b: under plain nearest neighbor both tracks must still survive.
#[test]
fn crossing_targets_survive_under_nearest_neighbor() {
    let mut cfg = scenario_config();
    cfg.association.method = AssociationMethod::Mahalanobis;
    let mut mgr = TrackManager::new(cfg);

    for k in 1..=40u32 {
        let t = (k - 1) as f64 * 0.1;
        mgr.process_dwell(&dwell(
            k,
            vec![
                detection_from_cartesian(995.0 + 5.0 * t, -100.0, 100.0),
                detection_from_cartesian(1005.0 - 5.0 * t, 100.0, 100.0),
            ],
        ));
    }
    assert_eq!(mgr.num_active_tracks(), 2);
    assert_eq!(mgr.num_confirmed_tracks(), 2);
}

/// Scenario 4: a clutter-only dwell records a miss on the confirmed track
/// and seeds candidates that never promote.
#[test]
fn clutter_only_dwell_feeds_initiator_without_promotions() {
    let mut mgr = TrackManager::new(scenario_config());

    for k in 1..=5u32 {
        let t = (k - 1) as f64 * 0.1;
        mgr.process_dwell(&dwell(
            k,
            vec![detection_from_cartesian(1000.0 + 10.0 * t, 0.0, 100.0)],
        ));
    }
    assert_eq!(mgr.num_confirmed_tracks(), 1);
    assert_eq!(mgr.candidate_count(), 0);

    // Three clutter returns far outside the track gate and far apart.
    let clutter = vec![
        Detection {
            range: 5000.0,
            azimuth: 1.0,
            elevation: 0.2,
            ..detection_from_cartesian(1000.0, 0.0, 100.0)
        },
        Detection {
            range: 7000.0,
            azimuth: -1.5,
            elevation: 0.1,
            ..detection_from_cartesian(1000.0, 0.0, 100.0)
        },
        Detection {
            range: 9000.0,
            azimuth: 2.5,
            elevation: 0.3,
            ..detection_from_cartesian(1000.0, 0.0, 100.0)
        },
    ];
    mgr.process_dwell(&dwell(6, clutter));

    assert_eq!(mgr.num_active_tracks(), 1);
    assert_eq!(mgr.tracks()[0].consecutive_misses, 1);
    assert_eq!(mgr.tracks()[0].status, TrackStatus::Coasting);
    assert_eq!(mgr.candidate_count(), 3);

    // The clutter never repeats, so no candidate can reach m hits.
    for k in 7..=9u32 {
        mgr.process_dwell(&dwell(k, vec![]));
    }
    assert_eq!(mgr.num_active_tracks(), 1, "no clutter track was born");
}

/// Scenario 5: JPDA with two symmetric gated measurements updates toward
/// the midpoint side of the chosen measurement and leaves the other free.
#[test]
fn jpda_ambiguous_measurements_resolve_deterministically() {
    let mut cfg = scenario_config();
    cfg.association.method = AssociationMethod::Jpda;
    let mut mgr = TrackManager::new(cfg);

    // A hovering target at (1000, 0, 100).
    for k in 1..=5u32 {
        mgr.process_dwell(&dwell(k, vec![detection_from_cartesian(1000.0, 0.0, 100.0)]));
    }
    assert_eq!(mgr.num_confirmed_tracks(), 1);

    // Two measurements symmetric about the prediction.
    mgr.process_dwell(&dwell(
        6,
        vec![
            detection_from_cartesian(1000.0, 30.0, 100.0),
            detection_from_cartesian(1000.0, -30.0, 100.0),
        ],
    ));

    let track = &mgr.tracks()[0];
    assert_eq!(track.consecutive_misses, 0, "one measurement was accepted");
    // The update pulled y off zero toward the matched side, but not past it.
    let y = track.position().y;
    assert!(y.abs() > 1e-6 && y.abs() < 30.0, "y = {y}");
    // The unmatched twin seeded a candidate.
    assert_eq!(mgr.candidate_count(), 1);
}

/// Scenario 6: a target on a 0.2 rad/s circle stays tracked with bounded
/// position error (< 3σ_R).
#[test]
fn turning_target_stays_tracked_with_bounded_error() {
    let mut mgr = TrackManager::new(scenario_config());

    let omega = 0.2f64;
    let speed = 15.0f64;
    let radius = speed / omega; // 75 m
    let center = (1000.0, 0.0);

    let truth = |k: u32| {
        let t = (k - 1) as f64 * 0.1;
        let theta = omega * t;
        (
            center.0 + radius * theta.cos(),
            center.1 + radius * theta.sin(),
            100.0,
        )
    };

    for k in 1..=40u32 {
        let (x, y, z) = truth(k);
        mgr.process_dwell(&dwell(k, vec![detection_from_cartesian(x, y, z)]));
    }

    assert_eq!(mgr.num_active_tracks(), 1);
    let track = &mgr.tracks()[0];
    assert_eq!(track.status, TrackStatus::Confirmed);

    let (tx, ty, tz) = truth(40);
    let p = track.position();
    let err = ((p.x - tx).powi(2) + (p.y - ty).powi(2) + (p.z - tz).powi(2)).sqrt();
    assert!(err < 75.0, "position error {err:.1} m exceeds 3σ_R");

    let sum: f64 = track.imm.mode_probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

/// Boundary behaviour: an empty dwell stream predicts existing tracks and
/// never invokes association on clusters.
#[test]
fn empty_dwells_only_age_tracks() {
    let mut mgr = TrackManager::new(scenario_config());
    for k in 1..=3u32 {
        mgr.process_dwell(&dwell(k, vec![detection_from_cartesian(1000.0, 0.0, 100.0)]));
    }
    assert_eq!(mgr.num_active_tracks(), 1);
    let age_before = mgr.tracks()[0].age;

    mgr.process_dwell(&dwell(4, vec![]));
    assert_eq!(mgr.tracks()[0].age, age_before + 1);
    assert_eq!(mgr.tracks()[0].consecutive_misses, 1);
}
