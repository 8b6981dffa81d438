//! Spatial clustering of detections into measurements.
//!
//! Three strategies, selected at construction:
//! - density clustering over a normalized (range, azimuth, elevation) metric,
//! - greedy range-gate sweep over range-sorted detections,
//! - the same sweep with an additional strength-difference gate.
//!
//! Every strategy reduces each group to a strength-weighted spherical
//! centroid; the engine assigns monotone cluster ids and converts the
//! centroid to Cartesian.

use crate::config::{ClusterConfig, ClusterMethod, DbscanConfig, RangeBasedConfig, RangeStrengthConfig};
use crate::types::{spherical_to_cartesian, Cluster, ClusterId, Detection};
use tracing::debug;

// ---------------------------------------------------------------------------
// Density clustering
// ---------------------------------------------------------------------------

pub struct DbscanClusterer {
    config: DbscanConfig,
}

impl DbscanClusterer {
    pub fn new(config: DbscanConfig) -> Self {
        Self { config }
    }

    /// Normalized distance: 1.0 at the edge of the epsilon ellipsoid.
    fn distance(&self, a: &Detection, b: &Detection) -> f64 {
        let dr = (a.range - b.range) / self.config.epsilon_range;
        let da = (a.azimuth - b.azimuth) / self.config.epsilon_azimuth;
        let de = (a.elevation - b.elevation) / self.config.epsilon_elevation;
        (dr * dr + da * da + de * de).sqrt()
    }

    fn neighbors(&self, dets: &[Detection], idx: usize) -> Vec<usize> {
        (0..dets.len())
            .filter(|&i| self.distance(&dets[idx], &dets[i]) <= 1.0)
            .collect()
    }

    fn cluster(&self, dets: &[Detection]) -> Vec<Vec<usize>> {
        const UNDEFINED: i32 = -1;
        const NOISE: i32 = -2;

        let n = dets.len();
        let mut labels = vec![UNDEFINED; n];
        let mut next_label = 0i32;

        for i in 0..n {
            if labels[i] != UNDEFINED {
                continue;
            }
            let seeds = self.neighbors(dets, i);
            if seeds.len() < self.config.min_points {
                labels[i] = NOISE;
                continue;
            }

            let label = next_label;
            next_label += 1;
            labels[i] = label;

            // Expand the cluster over the transitive closure of core points.
            let mut seed_set = seeds;
            let mut si = 0;
            while si < seed_set.len() {
                let q = seed_set[si];
                si += 1;
                if labels[q] == NOISE {
                    labels[q] = label;
                }
                if labels[q] != UNDEFINED {
                    continue;
                }
                labels[q] = label;
                let q_neighbors = self.neighbors(dets, q);
                if q_neighbors.len() >= self.config.min_points {
                    for nn in q_neighbors {
                        if labels[nn] == UNDEFINED || labels[nn] == NOISE {
                            seed_set.push(nn);
                        }
                    }
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); next_label as usize];
        for (i, &label) in labels.iter().enumerate() {
            if label >= 0 {
                groups[label as usize].push(i);
            }
        }
        // Noise points still carry target energy; keep them as singleton
        // clusters so downstream sees every detection as a candidate.
        for (i, &label) in labels.iter().enumerate() {
            if label == NOISE {
                groups.push(vec![i]);
            }
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// Range-gate clustering
// ---------------------------------------------------------------------------

pub struct RangeClusterer {
    config: RangeBasedConfig,
}

impl RangeClusterer {
    pub fn new(config: RangeBasedConfig) -> Self {
        Self { config }
    }

    fn in_gate(&self, a: &Detection, b: &Detection) -> bool {
        (a.range - b.range).abs() <= self.config.range_gate_size
            && (a.azimuth - b.azimuth).abs() <= self.config.azimuth_gate_size
            && (a.elevation - b.elevation).abs() <= self.config.elevation_gate_size
    }

    fn cluster(&self, dets: &[Detection]) -> Vec<Vec<usize>> {
        greedy_range_sweep(dets, self.config.range_gate_size, |a, b| self.in_gate(a, b))
    }
}

// ---------------------------------------------------------------------------
// Range + strength clustering
// ---------------------------------------------------------------------------

pub struct RangeStrengthClusterer {
    config: RangeStrengthConfig,
}

impl RangeStrengthClusterer {
    pub fn new(config: RangeStrengthConfig) -> Self {
        Self { config }
    }

    fn in_gate(&self, a: &Detection, b: &Detection) -> bool {
        (a.range - b.range).abs() <= self.config.range_gate_size
            && (a.azimuth - b.azimuth).abs() <= self.config.azimuth_gate_size
            && (a.elevation - b.elevation).abs() <= self.config.elevation_gate_size
            && (a.strength - b.strength).abs() <= self.config.strength_gate_size
    }

    fn cluster(&self, dets: &[Detection]) -> Vec<Vec<usize>> {
        greedy_range_sweep(dets, self.config.range_gate_size, |a, b| self.in_gate(a, b))
    }
}

/// Sort by range ascending, greedily seed a group at the smallest unassigned
/// detection and sweep forward while candidates stay inside the gates;
/// stop the sweep once the range gap alone exceeds the range gate.
fn greedy_range_sweep<F>(dets: &[Detection], range_gate: f64, in_gate: F) -> Vec<Vec<usize>>
where
    F: Fn(&Detection, &Detection) -> bool,
{
    let n = dets.len();
    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| dets[a].range.total_cmp(&dets[b].range));

    let mut assigned = vec![false; n];
    let mut groups = Vec::new();

    for si in 0..n {
        let i = sorted[si];
        if assigned[i] {
            continue;
        }
        let mut group = vec![i];
        assigned[i] = true;

        for &j in &sorted[si + 1..] {
            if assigned[j] {
                continue;
            }
            if dets[j].range - dets[i].range > range_gate {
                break;
            }
            if in_gate(&dets[i], &dets[j]) {
                group.push(j);
                assigned[j] = true;
            }
        }
        groups.push(group);
    }
    groups
}

// ---------------------------------------------------------------------------
// Centroid construction
// ---------------------------------------------------------------------------

/// Reduce one detection group to a strength-weighted spherical centroid.
/// Weights are linear-scale strengths (10^(dBm/10)), normalized; the
/// aggregate strength is the arithmetic mean in dBm.
fn build_cluster(dets: &[Detection], indices: &[usize]) -> Cluster {
    let mut c = Cluster {
        num_detections: indices.len() as u32,
        ..Cluster::default()
    };

    let mut lin_sum = 0.0;
    for &idx in indices {
        lin_sum += 10f64.powf(dets[idx].strength / 10.0);
        c.detection_indices.push(idx as u32);
    }

    let mut total_strength = 0.0;
    for &idx in indices {
        let d = &dets[idx];
        let w = 10f64.powf(d.strength / 10.0) / lin_sum;
        c.range += w * d.range;
        c.azimuth += w * d.azimuth;
        c.elevation += w * d.elevation;
        c.snr += w * d.snr;
        c.rcs += w * d.rcs;
        c.micro_doppler += w * d.micro_doppler;
        total_strength += d.strength;
    }
    c.strength = total_strength / indices.len() as f64;
    c
}

// ---------------------------------------------------------------------------
// Strategy dispatch + engine
// ---------------------------------------------------------------------------

pub enum Clusterer {
    Dbscan(DbscanClusterer),
    RangeBased(RangeClusterer),
    RangeStrength(RangeStrengthClusterer),
}

impl Clusterer {
    fn cluster(&self, dets: &[Detection]) -> Vec<Vec<usize>> {
        match self {
            Clusterer::Dbscan(c) => c.cluster(dets),
            Clusterer::RangeBased(c) => c.cluster(dets),
            Clusterer::RangeStrength(c) => c.cluster(dets),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Clusterer::Dbscan(_) => "dbscan",
            Clusterer::RangeBased(_) => "range_based",
            Clusterer::RangeStrength(_) => "range_strength",
        }
    }
}

/// Owns the selected strategy and the monotone cluster id counter.
pub struct ClusterEngine {
    clusterer: Clusterer,
    next_cluster_id: u32,
}

impl ClusterEngine {
    pub fn new(config: &ClusterConfig) -> Self {
        let clusterer = match config.method {
            ClusterMethod::Dbscan => Clusterer::Dbscan(DbscanClusterer::new(config.dbscan.clone())),
            ClusterMethod::RangeBased => {
                Clusterer::RangeBased(RangeClusterer::new(config.range_based.clone()))
            }
            ClusterMethod::RangeStrength => {
                Clusterer::RangeStrength(RangeStrengthClusterer::new(config.range_strength.clone()))
            }
        };
        Self {
            clusterer,
            next_cluster_id: 0,
        }
    }

    pub fn active_method(&self) -> &'static str {
        self.clusterer.name()
    }

    /// Cluster one dwell and produce wire-ready measurements.
    pub fn process(&mut self, dets: &[Detection]) -> Vec<Cluster> {
        if dets.is_empty() {
            return Vec::new();
        }

        let groups = self.clusterer.cluster(dets);
        let mut clusters: Vec<Cluster> = groups
            .iter()
            .map(|indices| build_cluster(dets, indices))
            .collect();

        for c in &mut clusters {
            c.cluster_id = ClusterId(self.next_cluster_id);
            self.next_cluster_id += 1;
            c.cartesian = spherical_to_cartesian(c.range, c.azimuth, c.elevation);
        }

        debug!(
            method = self.clusterer.name(),
            detections = dets.len(),
            clusters = clusters.len(),
            "clustered dwell"
        );
        clusters
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
