//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `stream_ledger_streams_created_total` - Streams opened
//! - `stream_ledger_streams_cancelled_total` - Streams cancelled
//! - `stream_ledger_rejected_operations_total` - Failed mutations by operation and error class
//! - `stream_ledger_active_streams` - Streams currently escrowed
//! - `stream_ledger_escrowed_total` - Base units pulled into escrow (all tokens)

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Streams opened
    pub streams_created: IntCounter,

    /// Streams cancelled
    pub streams_cancelled: IntCounter,

    /// Failed mutations, labelled by operation and error class
    pub rejected_operations: IntCounterVec,

    /// Streams currently escrowed
    pub active_streams: IntGauge,

    /// Base units pulled into escrow
    pub escrowed_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let streams_created = IntCounter::new(
            "stream_ledger_streams_created_total",
            "Total number of streams created",
        )?;
        registry.register(Box::new(streams_created.clone()))?;

        let streams_cancelled = IntCounter::new(
            "stream_ledger_streams_cancelled_total",
            "Total number of streams cancelled",
        )?;
        registry.register(Box::new(streams_cancelled.clone()))?;

        let rejected_operations = IntCounterVec::new(
            Opts::new(
                "stream_ledger_rejected_operations_total",
                "Mutations rejected, by operation and error class",
            ),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(rejected_operations.clone()))?;

        let active_streams = IntGauge::new(
            "stream_ledger_active_streams",
            "Number of streams currently escrowed",
        )?;
        registry.register(Box::new(active_streams.clone()))?;

        let escrowed_total = IntCounter::new(
            "stream_ledger_escrowed_total",
            "Base units pulled into escrow across all tokens",
        )?;
        registry.register(Box::new(escrowed_total.clone()))?;

        Ok(Self {
            streams_created,
            streams_cancelled,
            rejected_operations,
            active_streams,
            escrowed_total,
            registry,
        })
    }

    /// Record a created stream
    pub fn record_created(&self, deposit: u128) {
        self.streams_created.inc();
        self.active_streams.inc();
        // Counter is u64; saturate very large deposits
        self.escrowed_total
            .inc_by(u64::try_from(deposit).unwrap_or(u64::MAX));
    }

    /// Record a cancelled stream
    pub fn record_cancelled(&self) {
        self.streams_cancelled.inc();
        self.active_streams.dec();
    }

    /// Record a rejected mutation
    pub fn record_rejected(&self, operation: &str, error: &crate::Error) {
        self.rejected_operations
            .with_label_values(&[operation, error.label()])
            .inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
