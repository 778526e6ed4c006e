//! Telemetry Sink (SPEC_FULL.md §5.9): per-scan throughput samples,
//! advisory-only worker-count biasing for the next scan of the same
//! device. Never gates correctness — the scanner runs fine with no
//! samples at all.

use std::collections::VecDeque;
use std::sync::Mutex;

const SAMPLES_PER_DEVICE: usize = 8;

/// One scan's throughput, recorded after the fact.
#[derive(Debug, Clone, Copy)]
pub struct ThroughputSample {
    pub workers: usize,
    pub files_per_second: f64,
    pub bytes_per_second: f64,
}

/// Ring-buffer-backed in-memory store of recent throughput samples per
/// device. Cheap to keep around for the process lifetime; nothing here
/// is persisted to the catalog.
pub struct TelemetrySink {
    by_device: Mutex<std::collections::HashMap<i64, VecDeque<ThroughputSample>>>,
}

impl Default for TelemetrySink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self {
            by_device: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn record(&self, device_id: i64, workers: usize, files: u64, bytes: u64, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 {
            return;
        }
        let sample = ThroughputSample {
            workers,
            files_per_second: files as f64 / elapsed_secs,
            bytes_per_second: bytes as f64 / elapsed_secs,
        };
        let mut guard = self.by_device.lock().expect("telemetry sink poisoned");
        let samples = guard.entry(device_id).or_default();
        samples.push_back(sample);
        while samples.len() > SAMPLES_PER_DEVICE {
            samples.pop_front();
        }
    }

    /// The `workers` value with the best observed `bytes_per_second`
    /// among the last samples for `device_id`, or `default_workers` if
    /// no samples exist yet.
    pub fn recommend_workers(&self, device_id: i64, default_workers: usize) -> usize {
        let guard = self.by_device.lock().expect("telemetry sink poisoned");
        let Some(samples) = guard.get(&device_id) else {
            return default_workers;
        };
        samples
            .iter()
            .max_by(|a, b| a.bytes_per_second.total_cmp(&b.bytes_per_second))
            .map(|s| s.workers)
            .unwrap_or(default_workers)
    }
}
