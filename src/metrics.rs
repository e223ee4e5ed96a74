//! Request metrics and statistics for a pipeline run.

use crate::types::ResultPayload;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline requests
pub struct PipelineMetrics {
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Requests answered with a failure payload
    pub requests_failed: AtomicU64,
    /// Rows that received a prediction
    pub rows_predicted: AtomicU64,
    /// Rows removed by the product and date filters
    pub rows_dropped: AtomicU64,
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Request times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            requests_processed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            rows_predicted: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(64)),
            start_time: Instant::now(),
        }
    }

    /// Record a finished request and its outcome
    pub fn record_request(&self, processing_time: Duration, payload: &ResultPayload) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        match payload {
            ResultPayload::Success(report) => {
                self.rows_predicted
                    .fetch_add(report.results.len() as u64, Ordering::Relaxed);
                self.rows_dropped
                    .fetch_add(report.diagnostics.total_dropped() as u64, Ordering::Relaxed);
            }
            ResultPayload::Failure(report) => {
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut by_kind) = self.failures_by_kind.write() {
                    *by_kind
                        .entry(report.error_kind.as_str().to_string())
                        .or_insert(0) += 1;
                }
            }
        }
    }

    /// Get request time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests_processed.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FUEL PRICE INFERENCE - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Processed: {:>8}  │  Throughput: {:>7.1} req/s ║",
            requests,
            self.get_throughput()
        );
        info!(
            "║ Requests Failed:    {:>8}  │  Rows Predicted: {:>10} ║",
            failed,
            self.rows_predicted.load(Ordering::Relaxed)
        );
        info!(
            "║ Rows Dropped:       {:>8}                                 ║",
            self.rows_dropped.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Request Time (μs): mean={:>7} p50={:>7} p95={:>7} max={:>7} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.max_us
        );

        let by_kind = self.get_failures_by_kind();
        if !by_kind.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Kind:                                            ║");
            for (kind, count) in &by_kind {
                info!("║   {:20}: {:>6}                               ║", kind, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}
