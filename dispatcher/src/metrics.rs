//! Prometheus metrics for the dispatcher
//!
//! # Metrics
//!
//! - `dispatcher_claimed_total` - Rows claimed from the queue
//! - `dispatcher_submissions_total{outcome}` - Submissions by outcome (`sent`, `error`)
//! - `dispatcher_construction_failures_total` - Rows left in `sending` because no envelope could be built
//! - `dispatcher_hash_record_failures_total` - Submissions aborted because the hash could not be stored
//! - `dispatcher_finalize_failures_total` - Outcomes that could not be written back
//! - `dispatcher_relay_depth` - Rows waiting in the relay for a free channel
//! - `dispatcher_submit_duration_seconds` - Gateway submission latency

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Metrics collector
#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    /// Rows claimed
    pub claimed_total: IntCounter,

    /// Submissions by outcome
    pub submissions_total: IntCounterVec,

    /// Envelope construction failures
    pub construction_failures: IntCounter,

    /// Hash checkpoint failures
    pub hash_record_failures: IntCounter,

    /// Finalization write failures
    pub finalize_failures: IntCounter,

    /// Relay occupancy
    pub relay_depth: IntGauge,

    /// Submission latency
    pub submit_duration: Histogram,

    registry: Registry,
}

impl DispatcherMetrics {
    /// Create a collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let claimed_total =
            IntCounter::new("dispatcher_claimed_total", "Rows claimed from the queue")?;
        registry.register(Box::new(claimed_total.clone()))?;

        let submissions_total = IntCounterVec::new(
            Opts::new("dispatcher_submissions_total", "Submissions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        let construction_failures = IntCounter::new(
            "dispatcher_construction_failures_total",
            "Rows left in sending because no envelope could be built",
        )?;
        registry.register(Box::new(construction_failures.clone()))?;

        let hash_record_failures = IntCounter::new(
            "dispatcher_hash_record_failures_total",
            "Submissions aborted because the hash could not be stored",
        )?;
        registry.register(Box::new(hash_record_failures.clone()))?;

        let finalize_failures = IntCounter::new(
            "dispatcher_finalize_failures_total",
            "Outcomes that could not be written back",
        )?;
        registry.register(Box::new(finalize_failures.clone()))?;

        let relay_depth = IntGauge::new(
            "dispatcher_relay_depth",
            "Rows waiting in the relay for a free channel",
        )?;
        registry.register(Box::new(relay_depth.clone()))?;

        let submit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "dispatcher_submit_duration_seconds",
                "Gateway submission latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(submit_duration.clone()))?;

        Ok(Self {
            claimed_total,
            submissions_total,
            construction_failures,
            hash_record_failures,
            finalize_failures,
            relay_depth,
            submit_duration,
            registry,
        })
    }

    /// Record claimed rows
    pub fn record_claimed(&self, rows: usize) {
        self.claimed_total.inc_by(rows as u64);
    }

    /// Record a finalized submission
    pub fn record_submission(&self, success: bool) {
        let outcome = if success { "sent" } else { "error" };
        self.submissions_total.with_label_values(&[outcome]).inc();
    }

    /// Submissions finalized with `outcome`
    pub fn submissions(&self, outcome: &str) -> u64 {
        self.submissions_total.with_label_values(&[outcome]).get()
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
