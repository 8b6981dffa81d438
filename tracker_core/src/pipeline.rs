//! Tracker pipeline: wires the receiver, the track manager and the sender
//! together across two threads.
//!
//! The ingress thread (owned by the receiver) pushes decoded dwells into an
//! unbounded channel; the processing thread pops one message per iteration
//! with a timeout of one cycle period, runs the full per-dwell pipeline,
//! then serializes and sends the track table. Dwells are processed strictly
//! in arrival order; `stop()` finishes any in-flight dwell before joining.

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::manager::TrackManager;
use crate::net::{DetectionReceiver, TrackSender};
use crate::types::{now_micros, SpDetectionMessage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Default)]
pub struct PipelineStats {
    pub cycles: AtomicU64,
    pub overruns: AtomicU64,
}

pub struct TrackerPipeline {
    config: TrackerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    receiver: Option<DetectionReceiver>,
    processing: Option<JoinHandle<()>>,
    ingress: Option<mpsc::Sender<SpDetectionMessage>>,
}

impl TrackerPipeline {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PipelineStats::default()),
            receiver: None,
            processing: None,
            ingress: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Direct ingress hook, exercised by the receiver callback. Also usable
    /// by offline feeders once the pipeline is started.
    pub fn on_detection(&self, msg: SpDetectionMessage) {
        if let Some(tx) = &self.ingress {
            // The receiving side outlives us while running; a send failure
            // just means the pipeline already stopped.
            let _ = tx.send(msg);
        }
    }

    /// Acquire the sockets, spawn the processing thread, start the ingress
    /// callback. Fails fatally on socket errors.
    pub fn start(&mut self) -> Result<()> {
        info!("starting tracker pipeline");

        let sender = TrackSender::new(&self.config.network, self.config.display.clone())?;
        let mut manager = TrackManager::new(self.config.clone());

        let (tx, rx) = mpsc::channel::<SpDetectionMessage>();
        self.ingress = Some(tx.clone());
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let cycle_period = Duration::from_millis(self.config.system.cycle_period_ms as u64);
        let cycle_period_ms = self.config.system.cycle_period_ms as f64;

        self.processing = Some(std::thread::spawn(move || {
            info!("processing loop started");
            while running.load(Ordering::SeqCst) {
                let msg = match rx.recv_timeout(cycle_period) {
                    Ok(msg) => msg,
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                };

                let cycle_start = Instant::now();
                manager.process_dwell(&msg);

                let updates = manager.track_updates();
                let ts = if msg.timestamp > 0 { msg.timestamp } else { now_micros() };
                if !updates.is_empty() {
                    sender.send_track_table(&updates, ts);
                    for u in &updates {
                        manager.logger().log_sent(ts, u);
                    }
                }

                let cycles = stats.cycles.fetch_add(1, Ordering::Relaxed) + 1;
                let elapsed_ms = cycle_start.elapsed().as_secs_f64() * 1e3;
                if elapsed_ms > cycle_period_ms {
                    stats.overruns.fetch_add(1, Ordering::Relaxed);
                    warn!(elapsed_ms, cycle_period_ms, "dwell overran the cycle period");
                }
                if cycles % 100 == 0 {
                    info!(
                        cycles,
                        tracks = manager.num_active_tracks(),
                        confirmed = manager.num_confirmed_tracks(),
                        elapsed_ms,
                        "cycle"
                    );
                }
            }
            info!("processing loop exited");
        }));

        let mut receiver = DetectionReceiver::new(self.config.network.clone());
        let ingress = tx;
        if let Err(e) = receiver.start(move |msg| {
            let _ = ingress.send(msg);
        }) {
            self.stop();
            return Err(e);
        }
        self.receiver = Some(receiver);

        info!("tracker pipeline started");
        Ok(())
    }

    /// Clear the running flag, wake and join the processing thread, close
    /// the sockets. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut receiver) = self.receiver.take() {
            receiver.stop();
        }
        // Dropping the ingress sender unblocks `recv_timeout` immediately
        // via disconnection once the queue drains.
        self.ingress = None;
        if let Some(handle) = self.processing.take() {
            let _ = handle.join();
        }
        info!(
            cycles = self.stats.cycles.load(Ordering::Relaxed),
            overruns = self.stats.overruns.load(Ordering::Relaxed),
            "tracker pipeline stopped"
        );
    }
}

impl Drop for TrackerPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
