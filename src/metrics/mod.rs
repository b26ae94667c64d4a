//! Metrics module for observing collective traffic and phase latency.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ProtocolMetrics                     │
//! │  ┌─────────────────────┐  ┌──────────────────────┐  │
//! │  │  Counters           │  │  Histograms          │  │
//! │  │ - collectives{op}   │  │ - phase_seconds      │  │
//! │  │ - items sent/recv   │  │   {phase}            │  │
//! │  │ - bytes sent/recv   │  │                      │  │
//! │  └─────────────────────┘  └──────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! One `ProtocolMetrics` is shared by a communicator and the round-trip
//! driver running on top of it.

mod counters;
mod histograms;

pub use counters::{Counter, LabeledCounter};
pub use histograms::{Histogram, HistogramSnapshot, LabeledHistogram, DEFAULT_BUCKETS};

use crate::types::CollectiveOp;
use std::fmt::Write;
use std::time::Duration;

/// Metrics for one peer's participation in the protocol.
#[derive(Debug)]
pub struct ProtocolMetrics {
    /// Collective calls entered, by operation.
    pub collectives: LabeledCounter<1>,
    /// Items sent to other peers.
    pub items_sent: Counter,
    /// Items received from other peers.
    pub items_received: Counter,
    /// Payload bytes sent to other peers.
    pub bytes_sent: Counter,
    /// Payload bytes received from other peers.
    pub bytes_received: Counter,
    /// Wall time per round-trip phase.
    pub phase_latency: LabeledHistogram<1>,
}

impl ProtocolMetrics {
    /// Create a new, zeroed metrics set.
    pub fn new() -> Self {
        Self {
            collectives: LabeledCounter::new(
                "regather_collectives_total",
                "Collective calls entered",
                ["op"],
            ),
            items_sent: Counter::new("regather_items_sent_total", "Items sent to peers"),
            items_received: Counter::new("regather_items_received_total", "Items received from peers"),
            bytes_sent: Counter::new("regather_bytes_sent_total", "Payload bytes sent to peers"),
            bytes_received: Counter::new(
                "regather_bytes_received_total",
                "Payload bytes received from peers",
            ),
            phase_latency: LabeledHistogram::new(
                "regather_phase_seconds",
                "Wall time per round-trip phase",
                ["phase"],
            ),
        }
    }

    /// Record entry into a collective.
    pub fn record_collective(&self, op: CollectiveOp) {
        self.collectives.inc([op.as_str()]);
    }

    /// Record an outgoing payload.
    pub fn record_sent(&self, items: u64, bytes: usize) {
        self.items_sent.inc_by(items);
        self.bytes_sent.inc_by(bytes as u64);
    }

    /// Record an incoming payload.
    pub fn record_received(&self, items: u64, bytes: usize) {
        self.items_received.inc_by(items);
        self.bytes_received.inc_by(bytes as u64);
    }

    /// Record how long a phase took.
    pub fn record_phase(&self, phase: &str, elapsed: Duration) {
        self.phase_latency.observe_duration([phase], elapsed);
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            collectives: self
                .collectives
                .get_all()
                .into_iter()
                .map(|([op], n)| (op, n))
                .collect(),
            items_sent: self.items_sent.get(),
            items_received: self.items_received.get(),
            bytes_sent: self.bytes_sent.get(),
            bytes_received: self.bytes_received.get(),
            phases: self
                .phase_latency
                .get_all()
                .into_iter()
                .map(|([phase], h)| (phase, h))
                .collect(),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# HELP {} {}", self.collectives.name(), self.collectives.help());
        let _ = writeln!(out, "# TYPE {} counter", self.collectives.name());
        for ([op], value) in self.collectives.get_all() {
            let _ = writeln!(
                out,
                "{}{{{}=\"{}\"}} {}",
                self.collectives.name(),
                self.collectives.label_names()[0],
                op,
                value
            );
        }

        for counter in [
            &self.items_sent,
            &self.items_received,
            &self.bytes_sent,
            &self.bytes_received,
        ] {
            let _ = writeln!(out, "# HELP {} {}", counter.name(), counter.help());
            let _ = writeln!(out, "# TYPE {} counter", counter.name());
            let _ = writeln!(out, "{} {}", counter.name(), counter.get());
        }

        let name = self.phase_latency.name();
        let label = self.phase_latency.label_names()[0];
        let _ = writeln!(out, "# HELP {} {}", name, self.phase_latency.help());
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for ([phase], snapshot) in self.phase_latency.get_all() {
            for (upper, count) in snapshot.buckets.iter().zip(&snapshot.counts) {
                let _ = writeln!(
                    out,
                    "{}_bucket{{{}=\"{}\",le=\"{}\"}} {}",
                    name, label, phase, upper, count
                );
            }
            let _ = writeln!(
                out,
                "{}_bucket{{{}=\"{}\",le=\"+Inf\"}} {}",
                name, label, phase, snapshot.count
            );
            let _ = writeln!(out, "{}_sum{{{}=\"{}\"}} {}", name, label, phase, snapshot.sum);
            let _ = writeln!(out, "{}_count{{{}=\"{}\"}} {}", name, label, phase, snapshot.count);
        }

        out
    }
}

impl Default for ProtocolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`ProtocolMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Collective calls by operation name.
    pub collectives: Vec<(String, u64)>,
    /// Items sent to peers.
    pub items_sent: u64,
    /// Items received from peers.
    pub items_received: u64,
    /// Payload bytes sent.
    pub bytes_sent: u64,
    /// Payload bytes received.
    pub bytes_received: u64,
    /// Latency per phase.
    pub phases: Vec<(String, HistogramSnapshot)>,
}

impl MetricsSnapshot {
    /// Number of calls recorded for an operation.
    pub fn collective_count(&self, op: CollectiveOp) -> u64 {
        self.collectives
            .iter()
            .find(|(name, _)| name == op.as_str())
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}
