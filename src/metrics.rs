//! Request metrics for the prediction service.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept per model before the oldest half is dropped
const MAX_SAMPLES_PER_MODEL: usize = 1000;

/// Metrics collector for served predictions
pub struct ServiceMetrics {
    /// Predictions that returned a result
    pub predictions_served: AtomicU64,
    /// Predictions that failed, any kind
    pub predictions_failed: AtomicU64,
    /// Failures keyed by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Call counts and latency samples per model
    model_times: RwLock<HashMap<String, ModelTimes>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            model_times: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, model_name: &str, duration: Duration) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        let mut times = self.model_times.write().unwrap_or_else(PoisonError::into_inner);
        let model_times = times.entry(model_name.to_string()).or_default();
        model_times.calls += 1;
        model_times.samples_us.push(duration.as_micros() as u64);
        if model_times.samples_us.len() > MAX_SAMPLES_PER_MODEL {
            model_times.samples_us.drain(0..MAX_SAMPLES_PER_MODEL / 2);
        }
    }

    /// Record a failed prediction
    pub fn record_failure(&self, kind: &str) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);

        let mut by_kind = self
            .failures_by_kind
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Latency statistics per model
    pub fn get_model_stats(&self) -> HashMap<String, ModelStats> {
        let times = self.model_times.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = HashMap::new();

        for (model, model_times) in times.iter() {
            if model_times.samples_us.is_empty() {
                continue;
            }

            let mut sorted: Vec<u64> = model_times.samples_us.clone();
            sorted.sort_unstable();

            let sum: u64 = sorted.iter().sum();
            let count = sorted.len();

            stats.insert(
                model.clone(),
                ModelStats {
                    calls: model_times.calls,
                    mean_us: sum / count as u64,
                    p50_us: sorted[count / 2],
                    p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
                    max_us: sorted[count - 1],
                },
            );
        }

        stats
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Predictions per second since start, failures included
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let total = self.predictions_served.load(Ordering::Relaxed)
                + self.predictions_failed.load(Ordering::Relaxed);
            total as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy for the metrics endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs(),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            predictions_failed: self.predictions_failed.load(Ordering::Relaxed),
            throughput: self.get_throughput(),
            failures_by_kind: self.get_failures_by_kind(),
            models: self.get_model_stats(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let total = snapshot.predictions_served + snapshot.predictions_failed;
        let failure_rate = if total > 0 {
            (snapshot.predictions_failed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        info!(
            served = snapshot.predictions_served,
            failed = snapshot.predictions_failed,
            failure_rate = %format!("{:.1}%", failure_rate),
            throughput = %format!("{:.2} req/s", snapshot.throughput),
            uptime_s = snapshot.uptime_seconds,
            "Prediction service summary"
        );

        for (kind, count) in &snapshot.failures_by_kind {
            info!(kind = %kind, count = count, "Failures by kind");
        }

        for (model, stats) in &snapshot.models {
            info!(
                model = %model,
                calls = stats.calls,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model latency"
            );
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Total calls and the most recent latency samples (in microseconds)
#[derive(Debug, Default)]
struct ModelTimes {
    calls: u64,
    samples_us: Vec<u64>,
}

/// Model-specific latency statistics
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub predictions_served: u64,
    pub predictions_failed: u64,
    pub throughput: f64,
    pub failures_by_kind: HashMap<String, u64>,
    pub models: HashMap<String, ModelStats>,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
