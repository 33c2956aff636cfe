//! Prometheus metrics for the syncer operator

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicI64;

/// Labels for outcome counters
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

/// Number of sync loops currently registered
pub static ACTIVE_LOOPS: Lazy<Gauge<i64, AtomicI64>> = Lazy::new(Gauge::default);

/// Sync passes by outcome
pub static SYNC_PASSES: Lazy<Family<OutcomeLabels, Counter>> = Lazy::new(Family::default);

/// Reconciliations by outcome
pub static RECONCILIATIONS: Lazy<Family<OutcomeLabels, Counter>> = Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register(
        "syncer_active_loops",
        "Number of running binding sync loops",
        ACTIVE_LOOPS.clone(),
    );
    registry.register(
        "syncer_sync_passes",
        "Synchronization passes by outcome",
        SYNC_PASSES.clone(),
    );
    registry.register(
        "syncer_reconciliations",
        "Binding reconciliations by outcome",
        RECONCILIATIONS.clone(),
    );
    registry
});

pub fn set_active_loops(count: usize) {
    ACTIVE_LOOPS.set(count as i64);
}

pub fn inc_sync_pass(outcome: &str) {
    SYNC_PASSES
        .get_or_create(&OutcomeLabels {
            outcome: outcome.to_string(),
        })
        .inc();
}

pub fn inc_reconciliation(outcome: &str) {
    RECONCILIATIONS
        .get_or_create(&OutcomeLabels {
            outcome: outcome.to_string(),
        })
        .inc();
}
