//! `cuastrack` CLI: live UDP tracking, offline scenario runs, log inspection.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sim::{DwellInjector, Scenario, ScenarioKind};
use std::io::Read;
use std::path::PathBuf;
use tracker_core::binlog::{LogRecordType, LOG_HEADER_SIZE, LOG_MAGIC};
use tracker_core::config::{AssociationMethod, TrackerConfig};
use tracker_core::manager::TrackManager;
use tracker_core::pipeline::TrackerPipeline;
use tracker_core::types::TrackStatus;

#[derive(Parser)]
#[command(name = "cuastrack", about = "Counter-UAS radar tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live UDP pipeline until stdin closes (or Enter is pressed).
    Run {
        /// Path to the JSON configuration file
        #[arg(long, default_value = "config/tracker.json")]
        config: PathBuf,
    },
    /// Run a named scenario offline and print a tracking summary.
    Simulate {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Optional configuration file (defaults apply otherwise)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use JPDA association instead of the configured method
        #[arg(long)]
        jpda: bool,
        /// Write a JSON metrics summary to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Walk a binary stage log and print per-record-type counts.
    DumpLog {
        /// Path to a .bin log file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_live(&config),
        Commands::Simulate {
            scenario,
            seed,
            config,
            jpda,
            output,
        } => run_scenario(scenario, seed, config.as_deref(), jpda, output.as_deref()),
        Commands::DumpLog { input } => dump_log(&input),
    }
}

fn run_live(config_path: &std::path::Path) -> Result<()> {
    let config = tracker_core::load_config(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    println!(
        "Starting tracker: detections on {}:{}, tracks to {}:{}",
        config.network.receiver_ip,
        config.network.receiver_port,
        config.network.sender_ip,
        config.network.sender_port
    );

    let mut pipeline = TrackerPipeline::new(config);
    pipeline.start().context("starting pipeline")?;

    println!("Tracker running. Press Enter to stop.");
    let mut sink = String::new();
    let _ = std::io::stdin().read_line(&mut sink);

    pipeline.stop();
    let stats = pipeline.stats();
    println!(
        "Stopped after {} cycles ({} overruns).",
        stats.cycles.load(std::sync::atomic::Ordering::Relaxed),
        stats.overruns.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config_path: Option<&std::path::Path>,
    jpda: bool,
    output_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = match config_path {
        Some(p) => tracker_core::load_config(p).with_context(|| format!("loading {}", p.display()))?,
        None => TrackerConfig::default(),
    };
    config.system.log_enabled = false;
    if jpda {
        config.association.method = AssociationMethod::Jpda;
    }

    let scenario = Scenario::build(kind);
    let mut targets = scenario.targets.clone();
    let mut injector = DwellInjector::new(scenario.injector.clone(), seed);
    let mut manager = TrackManager::new(config);
    let mut metrics = sim::metrics::ScenarioMetrics::default();

    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s, {} targets)...",
        scenario.name,
        seed,
        scenario.duration,
        targets.len()
    );

    let started = std::time::Instant::now();
    let mut t = 0.0f64;
    let mut timestamp = 1_000_000u64;
    let dwell_us = (scenario.dwell_period * 1e6) as u64;
    let mut dwells = 0u64;

    while t < scenario.duration {
        let msg = injector.next_dwell(&targets, t, timestamp);
        manager.process_dwell(&msg);
        metrics.accumulate(t, manager.tracks(), &targets);

        for target in &mut targets {
            target.step(scenario.dwell_period);
        }
        t += scenario.dwell_period;
        timestamp += dwell_us;
        dwells += 1;
    }

    let elapsed = started.elapsed();
    println!(
        "Done: {} dwells in {:.2}s ({:.0} dwells/s)",
        dwells,
        elapsed.as_secs_f64(),
        dwells as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!(
        "Tracks: {} active, {} confirmed, position RMSE {:.1} m",
        manager.num_active_tracks(),
        manager.num_confirmed_tracks(),
        metrics.rmse_position()
    );

    println!("--- Track table ---");
    for u in manager.track_updates() {
        println!(
            "  T{:<4} {:<9} range={:8.1} m  az={:6.3} rad  speed={:5.1} m/s  quality={:.2}  hits={} misses={}",
            u.track_id,
            status_name(u.status),
            u.range,
            u.azimuth,
            (u.vx * u.vx + u.vy * u.vy + u.vz * u.vz).sqrt(),
            u.track_quality,
            u.hit_count,
            u.miss_count
        );
    }

    println!("--- Continuity ---");
    let mut rows: Vec<_> = metrics.continuity().iter().collect();
    rows.sort_by_key(|(id, _)| **id);
    for (id, c) in rows {
        println!(
            "  {}: {:.1}s -> {:.1}s ({} samples)",
            id, c.first_seen, c.last_seen, c.samples
        );
    }

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "dwells": dwells,
            "elapsed_s": elapsed.as_secs_f64(),
            "active_tracks": manager.num_active_tracks(),
            "confirmed_tracks": manager.num_confirmed_tracks(),
            "rmse_position_m": metrics.rmse_position(),
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }
    Ok(())
}

fn status_name(status: TrackStatus) -> &'static str {
    match status {
        TrackStatus::Tentative => "Tentative",
        TrackStatus::Confirmed => "Confirmed",
        TrackStatus::Coasting => "Coasting",
        TrackStatus::Deleted => "Deleted",
    }
}

fn dump_log(path: &std::path::Path) -> Result<()> {
    let mut file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let mut counts = [0u64; 9];
    let mut offset = 0usize;
    let mut records = 0u64;

    while offset + LOG_HEADER_SIZE <= bytes.len() {
        let magic = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        if magic != LOG_MAGIC {
            bail!("bad magic 0x{magic:08X} at offset {offset}");
        }
        let record_type = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
        let payload_size =
            u32::from_le_bytes(bytes[offset + 16..offset + 20].try_into().unwrap()) as usize;

        if LogRecordType::from_u32(record_type).is_none() {
            bail!("unknown record type {record_type} at offset {offset}");
        }
        counts[record_type as usize] += 1;
        records += 1;
        offset += LOG_HEADER_SIZE + payload_size;
    }

    if offset != bytes.len() {
        println!("warning: {} trailing bytes (truncated final record)", bytes.len() - offset);
    }

    println!("{records} records in {}", path.display());
    let names = [
        "raw", "preprocessed", "clustered", "predicted", "associated", "initiated", "updated",
        "deleted", "sent",
    ];
    for (name, count) in names.iter().zip(counts.iter()) {
        println!("  {name:<12} {count}");
    }
    Ok(())
}
