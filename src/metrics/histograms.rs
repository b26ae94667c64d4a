//! Histogram metrics for measuring distributions of values.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default histogram buckets (in seconds) for latency measurements.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

/// A histogram with fixed cumulative buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    bucket_counts: Vec<AtomicU64>,
    sum: AtomicU64, // f64 bits
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the default buckets.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create a histogram with custom bucket upper bounds.
    pub fn with_buckets(buckets: &[f64]) -> Self {
        let mut buckets = buckets.to_vec();
        buckets.sort_by(|a, b| a.total_cmp(b));
        let bucket_counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();

        Self {
            buckets,
            bucket_counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Observe a value.
    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut current = self.sum.load(Ordering::Relaxed);
        loop {
            let new_sum = (f64::from_bits(current) + value).to_bits();
            match self
                .sum
                .compare_exchange_weak(current, new_sum, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        for (i, &upper) in self.buckets.iter().enumerate() {
            if value <= upper {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observe a duration in seconds.
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self.buckets.clone(),
            counts: self
                .bucket_counts
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            sum: f64::from_bits(self.sum.load(Ordering::Relaxed)),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a histogram.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    /// Bucket upper bounds.
    pub buckets: Vec<f64>,
    /// Cumulative count per bucket.
    pub counts: Vec<u64>,
    /// Sum of observed values.
    pub sum: f64,
    /// Number of observations.
    pub count: u64,
}

impl HistogramSnapshot {
    /// Mean of observed values, zero when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// A histogram keyed by label values.
#[derive(Debug)]
pub struct LabeledHistogram<const N: usize> {
    name: &'static str,
    help: &'static str,
    label_names: [&'static str; N],
    buckets: Vec<f64>,
    histograms: RwLock<HashMap<[String; N], Histogram>>,
}

impl<const N: usize> LabeledHistogram<N> {
    /// Create a labeled histogram with the default buckets.
    pub fn new(name: &'static str, help: &'static str, label_names: [&'static str; N]) -> Self {
        Self {
            name,
            help,
            label_names,
            buckets: DEFAULT_BUCKETS.to_vec(),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// Get the histogram name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the histogram help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Get the label names.
    pub fn label_names(&self) -> &[&'static str; N] {
        &self.label_names
    }

    /// Observe a duration for the given labels.
    pub fn observe_duration(&self, labels: [&str; N], duration: Duration) {
        let key: [String; N] = labels.map(|s| s.to_string());

        {
            let histograms = self.histograms.read();
            if let Some(histogram) = histograms.get(&key) {
                histogram.observe_duration(duration);
                return;
            }
        }

        self.histograms
            .write()
            .entry(key)
            .or_insert_with(|| Histogram::with_buckets(&self.buckets))
            .observe_duration(duration);
    }

    /// Snapshot for specific labels.
    pub fn snapshot(&self, labels: [&str; N]) -> Option<HistogramSnapshot> {
        let key: [String; N] = labels.map(|s| s.to_string());
        self.histograms.read().get(&key).map(Histogram::snapshot)
    }

    /// Snapshots of all label sets, sorted by labels.
    pub fn get_all(&self) -> Vec<([String; N], HistogramSnapshot)> {
        let mut all: Vec<_> = self
            .histograms
            .read()
            .iter()
            .map(|(k, h)| (k.clone(), h.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
