//! UDP collaborators: detection ingress and track-table egress.
//!
//! The receiver owns a bound socket and a reader thread that decodes each
//! datagram and hands it to a callback; malformed datagrams are dropped and
//! counted. The sender owns a connected socket. Both are released on
//! `stop`/`close` and on drop.

use crate::config::{DisplayConfig, NetworkConfig};
use crate::error::{Result, TrackerError};
use crate::types::{SpDetectionMessage, Timestamp, TrackStatus, TrackUpdateMessage};
use crate::wire;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct ReceiverStats {
    pub messages: AtomicU64,
    pub detections: AtomicU64,
    pub malformed: AtomicU64,
}

pub struct DetectionReceiver {
    config: NetworkConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
    thread: Option<JoinHandle<()>>,
}

impl DetectionReceiver {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ReceiverStats::default()),
            thread: None,
        }
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.stats)
    }

    /// Bind the socket and start the reader thread. The callback runs on
    /// that thread for every well-formed detection message.
    pub fn start<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(SpDetectionMessage) + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(TrackerError::Net("receiver already started".to_string()));
        }

        let addr = format!("{}:{}", self.config.receiver_ip, self.config.receiver_port);
        let socket = UdpSocket::bind(&addr)
            .map_err(|e| TrackerError::Net(format!("cannot bind {addr}: {e}")))?;
        socket
            .set_read_timeout(Some(Duration::from_millis(200)))
            .map_err(|e| TrackerError::Net(format!("cannot set read timeout: {e}")))?;

        info!(addr, "detection receiver listening");

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let buffer_size = self.config.receive_buffer_size;

        self.thread = Some(std::thread::spawn(move || {
            let mut buf = vec![0u8; buffer_size];
            while running.load(Ordering::SeqCst) {
                let n = match socket.recv_from(&mut buf) {
                    Ok((n, _peer)) => n,
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "receive failed");
                        continue;
                    }
                };

                match wire::decode_detection_message(&buf[..n]) {
                    Ok(msg) => {
                        stats.messages.fetch_add(1, Ordering::Relaxed);
                        stats
                            .detections
                            .fetch_add(msg.detections.len() as u64, Ordering::Relaxed);
                        debug!(
                            dwell = msg.dwell_count,
                            detections = msg.detections.len(),
                            "received dwell"
                        );
                        callback(msg);
                    }
                    Err(e) => {
                        stats.malformed.fetch_add(1, Ordering::Relaxed);
                        warn!(bytes = n, error = %e, "dropping malformed datagram");
                    }
                }
            }
        }));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        info!(
            messages = self.stats.messages.load(Ordering::Relaxed),
            detections = self.stats.detections.load(Ordering::Relaxed),
            malformed = self.stats.malformed.load(Ordering::Relaxed),
            "detection receiver stopped"
        );
    }
}

impl Drop for DetectionReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

pub struct TrackSender {
    display: DisplayConfig,
    socket: Option<UdpSocket>,
    sent: AtomicU64,
}

impl TrackSender {
    /// Open a connected socket towards the display endpoint.
    pub fn new(net: &NetworkConfig, display: DisplayConfig) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| TrackerError::Net(format!("cannot open sender socket: {e}")))?;
        let dest = format!("{}:{}", net.sender_ip, net.sender_port);
        socket
            .connect(&dest)
            .map_err(|e| TrackerError::Net(format!("cannot set destination {dest}: {e}")))?;
        info!(dest, "track sender initialized");
        Ok(Self {
            display,
            socket: Some(socket),
            sent: AtomicU64::new(0),
        })
    }

    /// Serialize and send the current track table. Honours
    /// `display.sendDeletedTracks`.
    pub fn send_track_table(&self, updates: &[TrackUpdateMessage], ts: Timestamp) {
        let Some(socket) = &self.socket else {
            return;
        };
        let to_send: Vec<TrackUpdateMessage> = updates
            .iter()
            .filter(|u| self.display.send_deleted_tracks || u.status != TrackStatus::Deleted)
            .copied()
            .collect();
        if to_send.is_empty() {
            return;
        }
        let data = wire::encode_track_table(&to_send, ts);
        match socket.send(&data) {
            Ok(_) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                debug!(tracks = to_send.len(), bytes = data.len(), "sent track table");
            }
            Err(e) => warn!(error = %e, "failed to send track table"),
        }
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            info!(sent = self.messages_sent(), "track sender closed");
        }
    }
}

impl Drop for TrackSender {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Detection;
    use std::sync::mpsc;

    #[test]
    fn receiver_delivers_datagrams_and_counts_malformed() {
        let config = NetworkConfig {
            receiver_ip: "127.0.0.1".to_string(),
            receiver_port: 0, // ephemeral port would lose the address; use a fixed high port
            ..NetworkConfig::default()
        };
        // Bind first on an OS-assigned port to learn a free one, then reuse it.
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let config = NetworkConfig {
            receiver_port: port,
            ..config
        };
        let mut receiver = DetectionReceiver::new(config);
        let (tx, rx) = mpsc::channel();
        receiver
            .start(move |msg| {
                let _ = tx.send(msg);
            })
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let msg = SpDetectionMessage {
            message_id: wire::MSG_ID_SP_DETECTION,
            dwell_count: 5,
            timestamp: 123,
            detections: vec![Detection::default()],
        };
        sender
            .send_to(&wire::encode_detection_message(&msg), ("127.0.0.1", port))
            .unwrap();
        sender.send_to(b"garbage", ("127.0.0.1", port)).unwrap();

        let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.dwell_count, 5);

        // Malformed datagrams never reach the callback.
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        receiver.stop();
    }

    #[test]
    fn sender_filters_deleted_tracks_when_configured() {
        let listen = UdpSocket::bind("127.0.0.1:0").unwrap();
        listen
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = listen.local_addr().unwrap().port();

        let net = NetworkConfig {
            sender_ip: "127.0.0.1".to_string(),
            sender_port: port,
            ..NetworkConfig::default()
        };
        let display = DisplayConfig {
            send_deleted_tracks: false,
            ..DisplayConfig::default()
        };
        let sender = TrackSender::new(&net, display).unwrap();

        let mut deleted = sample_update(1);
        deleted.status = TrackStatus::Deleted;
        sender.send_track_table(&[sample_update(0), deleted], 777);

        let mut buf = [0u8; 2048];
        let (n, _) = listen.recv_from(&mut buf).unwrap();
        let (ts, updates) = wire::decode_track_table(&buf[..n]).unwrap();
        assert_eq!(ts, 777);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].track_id, 0);
    }

    fn sample_update(id: u32) -> TrackUpdateMessage {
        TrackUpdateMessage {
            message_id: wire::MSG_ID_TRACK_UPDATE,
            track_id: id,
            timestamp: 0,
            status: TrackStatus::Confirmed,
            classification: crate::types::TrackClassification::Unknown,
            range: 0.0,
            azimuth: 0.0,
            elevation: 0.0,
            range_rate: 0.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            track_quality: 0.0,
            hit_count: 0,
            miss_count: 0,
            age: 0,
        }
    }
}
