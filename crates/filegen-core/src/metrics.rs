//! Metrics published by the manager
//!
//! Values go through the `metrics` facade; the embedding process decides
//! whether a recorder (e.g. a Prometheus exporter) is installed.

use metrics::{describe_gauge, gauge};

/// Number of unique hashes currently being fetched from sources
pub const OBJECT_WAITS: &str = "filegen_client_object_waits";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_gauge!(
        OBJECT_WAITS,
        "Number of objects being awaited from file generator sources"
    );
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn set_object_waits(count: usize) {
    gauge!(OBJECT_WAITS).set(count as f64);
}
