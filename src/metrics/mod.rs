// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

use crate::fetching::core::Association;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for fetch behaviour
// ============================================================================
//
// Makes the N+1 trade-off observable:
// - store round trips per operation (query, lookup, children)
// - association cache hits vs. secondary fetches
// - fetches a strategy promised to avoid
// - queries cut at the row cap, and orders dropped because of it
// - end-to-end duration per fetch strategy
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Store operation label values.
pub const OP_QUERY: &str = "query";
pub const OP_LOOKUP: &str = "lookup";
pub const OP_CHILDREN: &str = "children";

pub struct FetchMetrics {
    registry: Registry,

    // Store Metrics
    pub store_round_trips: IntCounterVec,
    pub rows_truncated: IntCounter,
    pub partial_parents_dropped: IntCounter,

    // Association Metrics
    pub association_cache_hits: IntCounterVec,
    pub secondary_fetches: IntCounterVec,
    pub unexpected_extra_fetches: IntCounterVec,

    // Strategy Metrics
    pub fetch_duration: HistogramVec,
}

impl FetchMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Store Metrics
        let store_round_trips = IntCounterVec::new(
            Opts::new("store_round_trips_total", "Total store round trips"),
            &["operation"],
        )?;
        registry.register(Box::new(store_round_trips.clone()))?;

        let rows_truncated = IntCounter::new(
            "rows_truncated_total",
            "Queries whose result was cut at the row cap",
        )?;
        registry.register(Box::new(rows_truncated.clone()))?;

        let partial_parents_dropped = IntCounter::new(
            "partial_parents_dropped_total",
            "Folded orders dropped because the row cap cut their line items",
        )?;
        registry.register(Box::new(partial_parents_dropped.clone()))?;

        // Association Metrics
        let association_cache_hits = IntCounterVec::new(
            Opts::new(
                "association_cache_hits_total",
                "Association accesses served from the unit-of-work cache",
            ),
            &["association"],
        )?;
        registry.register(Box::new(association_cache_hits.clone()))?;

        let secondary_fetches = IntCounterVec::new(
            Opts::new("secondary_fetches_total", "Lazy association lookups sent to the store"),
            &["association"],
        )?;
        registry.register(Box::new(secondary_fetches.clone()))?;

        let unexpected_extra_fetches = IntCounterVec::new(
            Opts::new(
                "unexpected_extra_fetches_total",
                "Lazy lookups issued by a strategy that promised none",
            ),
            &["association"],
        )?;
        registry.register(Box::new(unexpected_extra_fetches.clone()))?;

        // Strategy Metrics
        let fetch_duration = HistogramVec::new(
            HistogramOpts::new("fetch_duration_seconds", "Fetch duration per strategy")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["strategy"],
        )?;
        registry.register(Box::new(fetch_duration.clone()))?;

        Ok(Self {
            registry,
            store_round_trips,
            rows_truncated,
            partial_parents_dropped,
            association_cache_hits,
            secondary_fetches,
            unexpected_extra_fetches,
            fetch_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_round_trip(&self, operation: &str) {
        self.store_round_trips.with_label_values(&[operation]).inc();
    }

    pub fn record_cache_hit(&self, association: Association) {
        self.association_cache_hits
            .with_label_values(&[association.as_str()])
            .inc();
    }

    pub fn record_secondary_fetch(&self, association: Association) {
        self.secondary_fetches
            .with_label_values(&[association.as_str()])
            .inc();
    }

    pub fn record_unexpected_fetch(&self, association: Association) {
        self.unexpected_extra_fetches
            .with_label_values(&[association.as_str()])
            .inc();
    }

    pub fn record_truncation(&self) {
        self.rows_truncated.inc();
    }

    pub fn record_partial_parent_dropped(&self) {
        self.partial_parents_dropped.inc();
    }

    pub fn observe_fetch(&self, strategy: &str, duration_secs: f64) {
        self.fetch_duration
            .with_label_values(&[strategy])
            .observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = FetchMetrics::new().unwrap();
        metrics.record_truncation();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_round_trips_by_operation() {
        let metrics = FetchMetrics::new().unwrap();
        metrics.record_round_trip(OP_QUERY);
        metrics.record_round_trip(OP_LOOKUP);
        metrics.record_round_trip(OP_LOOKUP);

        let gathered = metrics.registry.gather();
        let trips = gathered
            .iter()
            .find(|m| m.name() == "store_round_trips_total")
            .unwrap();
        assert_eq!(trips.metric.len(), 2); // query + lookup labels
    }

    #[test]
    fn test_association_counters() {
        let metrics = FetchMetrics::new().unwrap();
        metrics.record_secondary_fetch(Association::Customer);
        metrics.record_cache_hit(Association::Customer);
        metrics.record_cache_hit(Association::Customer);

        let gathered = metrics.registry.gather();
        let hits = gathered
            .iter()
            .find(|m| m.name() == "association_cache_hits_total")
            .unwrap();
        assert_eq!(hits.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_fetch_duration_histogram() {
        let metrics = FetchMetrics::new().unwrap();
        metrics.observe_fetch("fetch_joined", 0.02);

        let gathered = metrics.registry.gather();
        let duration = gathered
            .iter()
            .find(|m| m.name() == "fetch_duration_seconds")
            .unwrap();
        assert_eq!(duration.metric[0].histogram.sample_count, Some(1));
    }
}
