//! Publish boundary
//!
//! Results leave the pipeline through a [`Publisher`], on one of two topics.
//! Delivery is fan-out: every subscriber of a topic gets every message, with
//! no acknowledgment and no replay for late subscribers.
//!
//! Two publishers are provided:
//!
//! - [`BroadcastHub`]: in-process fan-out over channels, for embedding and tests
//! - [`UdpPublisher`]: one datagram stream per subscriber address
//!
//! ## Example
//!
//! ```rust
//! use sweepscope_core::publish::{BroadcastHub, Publisher, Topic};
//!
//! let hub = BroadcastHub::new();
//! let viewer = hub.subscribe(Topic::Scan);
//! let tracker = hub.subscribe(Topic::Scan);
//!
//! hub.publish(Topic::Scan, "433920000 -62.5 ").unwrap();
//! assert_eq!(viewer.recv().unwrap(), "433920000 -62.5 ");
//! assert_eq!(tracker.recv().unwrap(), "433920000 -62.5 ");
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{SweepError, SweepResult};

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Raw per-sweep detections
    Scan,
    /// Clustered signal descriptors
    Signal,
}

impl Topic {
    /// Exchange name seen by subscribers.
    pub fn exchange(&self) -> &'static str {
        match self {
            Topic::Scan => "scanSweep",
            Topic::Signal => "signalSweep",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.exchange())
    }
}

/// Sink for pipeline output.
///
/// Called from both the sweep producer and the clustering worker.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: Topic, payload: &str) -> SweepResult<()>;
}

impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn publish(&self, topic: Topic, payload: &str) -> SweepResult<()> {
        (**self).publish(topic, payload)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&self, topic: Topic, payload: &str) -> SweepResult<()> {
        (**self).publish(topic, payload)
    }
}

/// In-process fan-out.
///
/// Subscribers whose receiver has been dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: Mutex<Vec<(Topic, Sender<String>)>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every message published on `topic` from now on.
    pub fn subscribe(&self, topic: Topic) -> Receiver<String> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((topic, tx));
        }
        rx
    }

    /// Live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .lock()
            .map(|subs| subs.iter().filter(|(t, _)| *t == topic).count())
            .unwrap_or(0)
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, topic: Topic, payload: &str) -> SweepResult<()> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| SweepError::Publish("subscriber list poisoned".to_string()))?;
        let before = subs.len();
        subs.retain(|(t, tx)| *t != topic || tx.send(payload.to_string()).is_ok());
        if subs.len() < before {
            debug!(%topic, dropped = before - subs.len(), "pruned closed subscribers");
        }
        Ok(())
    }
}

/// UDP fan-out publisher.
///
/// Payloads larger than `max_payload` are split on value-group boundaries
/// (pairs for scans, quadruples for signals) so no datagram carries a partial
/// record.
#[derive(Debug)]
pub struct UdpPublisher {
    socket: UdpSocket,
    scan_targets: Vec<SocketAddr>,
    signal_targets: Vec<SocketAddr>,
    max_payload: usize,
}

impl UdpPublisher {
    /// Bind an ephemeral local socket.
    pub fn bind(
        scan_targets: Vec<SocketAddr>,
        signal_targets: Vec<SocketAddr>,
        max_payload: usize,
    ) -> SweepResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .map_err(|e| SweepError::Publish(format!("bind failed: {}", e)))?;
        Ok(Self {
            socket,
            scan_targets,
            signal_targets,
            max_payload: max_payload.clamp(64, MAX_UDP_PAYLOAD),
        })
    }

    pub fn local_addr(&self) -> SweepResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn targets(&self, topic: Topic) -> &[SocketAddr] {
        match topic {
            Topic::Scan => &self.scan_targets,
            Topic::Signal => &self.signal_targets,
        }
    }
}

impl Publisher for UdpPublisher {
    fn publish(&self, topic: Topic, payload: &str) -> SweepResult<()> {
        let group = match topic {
            Topic::Scan => 2,
            Topic::Signal => crate::codec::SIGNAL_FIELDS,
        };
        let datagrams = split_payload(payload, group, self.max_payload);
        if datagrams.len() > 1 {
            debug!(%topic, bytes = payload.len(), datagrams = datagrams.len(), "split payload");
        }

        let mut failures = Vec::new();
        for target in self.targets(topic) {
            for datagram in &datagrams {
                if let Err(e) = self.socket.send_to(datagram.as_bytes(), target) {
                    failures.push(format!("{}: {}", target, e));
                    break;
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SweepError::Publish(failures.join("; ")))
        }
    }
}

/// Split a flat message into chunks of at most `max_len` bytes, cutting only
/// after every `group` values. An empty message yields one empty chunk.
fn split_payload(payload: &str, group: usize, max_len: usize) -> Vec<String> {
    if payload.len() <= max_len {
        return vec![payload.to_string()];
    }

    let tokens: Vec<&str> = payload.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    for record in tokens.chunks(group.max(1)) {
        let mut piece = String::new();
        for t in record {
            piece.push_str(t);
            piece.push(' ');
        }
        if !current.is_empty() && current.len() + piece.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_topic_exchange_names() {
        assert_eq!(Topic::Scan.exchange(), "scanSweep");
        assert_eq!(Topic::Signal.to_string(), "signalSweep");
    }

    #[test]
    fn test_hub_fans_out_per_topic() {
        let hub = BroadcastHub::new();
        let scan_a = hub.subscribe(Topic::Scan);
        let scan_b = hub.subscribe(Topic::Scan);
        let signal = hub.subscribe(Topic::Signal);

        hub.publish(Topic::Scan, "1 -2 ").unwrap();
        hub.publish(Topic::Signal, "1 2 3 4 ").unwrap();

        assert_eq!(scan_a.try_recv().unwrap(), "1 -2 ");
        assert_eq!(scan_b.try_recv().unwrap(), "1 -2 ");
        assert!(scan_a.try_recv().is_err());
        assert_eq!(signal.try_recv().unwrap(), "1 2 3 4 ");
    }

    #[test]
    fn test_hub_prunes_dropped_subscribers() {
        let hub = BroadcastHub::new();
        let keep = hub.subscribe(Topic::Scan);
        drop(hub.subscribe(Topic::Scan));
        assert_eq!(hub.subscriber_count(Topic::Scan), 2);

        hub.publish(Topic::Scan, "x").unwrap();
        assert_eq!(hub.subscriber_count(Topic::Scan), 1);
        assert_eq!(keep.recv().unwrap(), "x");
    }

    #[test]
    fn test_split_payload_keeps_pairs() {
        let msg = "100 -1.5 200 -2.5 300 -3.5 ";
        let chunks = split_payload(msg, 2, 12);
        assert_eq!(chunks, vec!["100 -1.5 ", "200 -2.5 ", "300 -3.5 "]);

        assert_eq!(split_payload(msg, 2, 1000), vec![msg.to_string()]);
        assert_eq!(split_payload("", 2, 10), vec![String::new()]);
    }

    #[test]
    fn test_udp_publish_reaches_subscribers() {
        let rx_a = UdpSocket::bind("127.0.0.1:0").unwrap();
        let rx_b = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx_a.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        rx_b.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let publisher = UdpPublisher::bind(
            vec![rx_a.local_addr().unwrap(), rx_b.local_addr().unwrap()],
            Vec::new(),
            MAX_UDP_PAYLOAD,
        )
        .unwrap();
        publisher.publish(Topic::Scan, "433920000 -62.5 ").unwrap();
        // No signal subscribers: nothing sent, not an error
        publisher.publish(Topic::Signal, "1 2 3 4 ").unwrap();

        let mut buf = [0u8; 128];
        let n = rx_a.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"433920000 -62.5 ");
        let n = rx_b.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"433920000 -62.5 ");
    }
}
