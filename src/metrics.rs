// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the capz-adopt controllers.
//!
//! Every metric carries the namespace prefix `capz_adopt_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - adoption reconciles and their outcomes
//! - **Resource Lifecycle Metrics** - native resources created during adoption
//! - **Secret Metrics** - what the secret reconciler decided to do
//! - **Finalizer Metrics** - cluster identity finalizer patches
//! - **Mapping Metrics** - watch fan-out results
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_adopt::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("ManagedCluster", std::time::Duration::from_secs(1));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all capz-adopt metrics
const METRICS_NAMESPACE: &str = "capz_adopt";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of the watched resource (`ManagedCluster`, `ManagedClustersAgentPool`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of the watched resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Resource Lifecycle Metrics
// ============================================================================

/// Total number of native resources created
///
/// Labels:
/// - `resource_type`: Kind of resource created (`Cluster`, `MachinePool`, ...)
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_created_total"),
        "Total number of resources created by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Secret Metrics
// ============================================================================

/// Generated secret reconciliation outcomes
///
/// Labels:
/// - `action`: `created`, `patched`, `skipped_unowned` or `unchanged`
pub static SECRET_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_secret_reconciles_total"),
        "Generated secret reconciliation outcomes by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Finalizer Metrics
// ============================================================================

/// Cluster identity finalizer patches
///
/// Labels:
/// - `action`: `added` or `removed`
pub static FINALIZER_PATCHES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_finalizer_patches_total"),
        "Cluster identity finalizer patches by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Mapping Metrics
// ============================================================================

/// Reconcile requests produced by watch mapping functions
///
/// Labels:
/// - `mapper`: Name of the mapping function
pub static MAPPED_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_mapped_requests_total"),
        "Reconcile requests produced by watch mapping functions",
    );
    let counter = CounterVec::new(opts, &["mapper"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeued by the error policy
pub fn record_reconciliation_requeue(resource_type: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
}

/// Record resource creation
///
/// # Arguments
/// * `resource_type` - The kind of resource created
pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record the outcome of one generated secret reconcile
pub fn record_secret_write(action: &str) {
    SECRET_WRITES_TOTAL.with_label_values(&[action]).inc();
}

/// Record a finalizer patch on a cluster identity
pub fn record_finalizer_patch(action: &str) {
    FINALIZER_PATCHES_TOTAL.with_label_values(&[action]).inc();
}

/// Record the number of requests one mapping call produced
pub fn record_mapped_requests(mapper: &str, count: usize) {
    MAPPED_REQUESTS_TOTAL
        .with_label_values(&[mapper])
        .inc_by(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation_success() {
        let resource_type = "TestResource";

        record_reconciliation_success(resource_type, Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[resource_type, "success"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[resource_type]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_reconciliation_error() {
        let resource_type = "TestResourceError";

        record_reconciliation_error(resource_type, Duration::from_millis(250));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[resource_type, "error"]);
        assert!(counter.get() > 0.0);
    }

    #[test]
    fn test_record_secret_write_by_action() {
        let before = SECRET_WRITES_TOTAL
            .with_label_values(&["skipped_unowned"])
            .get();
        record_secret_write("skipped_unowned");
        let after = SECRET_WRITES_TOTAL
            .with_label_values(&["skipped_unowned"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_record_mapped_requests_adds_count() {
        let before = MAPPED_REQUESTS_TOTAL.with_label_values(&["test_mapper"]).get();
        record_mapped_requests("test_mapper", 3);
        let after = MAPPED_REQUESTS_TOTAL.with_label_values(&["test_mapper"]).get();
        assert!(after >= before + 3.0);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("GatherTest", Duration::from_millis(100));
        record_finalizer_patch("added");

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(metrics_text.contains("capz_adopt_reconciliations_total"));
        assert!(metrics_text.contains("capz_adopt_finalizer_patches_total"));
    }
}
