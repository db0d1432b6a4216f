use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus counters for the use cases
// ============================================================================
//
// Provides:
// - Registration outcomes
// - Player name retries inside the registration transaction
// - Transaction outcomes (committed / rolled back / commit failed)
// - Campaign lifecycle transitions
//
// The registry is exposed so an outer layer can serve it; this crate does not
// run an HTTP endpoint itself.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub registrations_total: IntCounterVec,
    pub player_name_retries_total: IntCounter,
    pub transactions_total: IntCounterVec,
    pub campaign_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let registrations_total = IntCounterVec::new(
            Opts::new("registrations_total", "Account registrations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(registrations_total.clone()))?;

        let player_name_retries_total = IntCounter::new(
            "player_name_retries_total",
            "Player names re-derived after a uniqueness conflict",
        )?;
        registry.register(Box::new(player_name_retries_total.clone()))?;

        let transactions_total = IntCounterVec::new(
            Opts::new("transactions_total", "Units of work by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let campaign_transitions_total = IntCounterVec::new(
            Opts::new("campaign_transitions_total", "Persisted campaign transitions"),
            &["transition"],
        )?;
        registry.register(Box::new(campaign_transitions_total.clone()))?;

        Ok(Self {
            registry,
            registrations_total,
            player_name_retries_total,
            transactions_total,
            campaign_transitions_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_registration(&self, outcome: &str) {
        self.registrations_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_player_name_retry(&self) {
        self.player_name_retries_total.inc();
    }

    pub fn record_transaction(&self, outcome: &str) {
        self.transactions_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_campaign_transition(&self, transition: &str) {
        self.campaign_transitions_total.with_label_values(&[transition]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_player_name_retry();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_registration() {
        let metrics = Metrics::new().unwrap();
        metrics.record_registration("registered");
        metrics.record_registration("registered");
        metrics.record_registration("conflict");

        let gathered = metrics.registry().gather();
        let registrations = gathered.iter().find(|m| m.name() == "registrations_total").unwrap();
        assert_eq!(registrations.metric.len(), 2); // Two outcome labels
    }

    #[test]
    fn test_record_player_name_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_player_name_retry();
        metrics.record_player_name_retry();

        let gathered = metrics.registry().gather();
        let retries = gathered.iter().find(|m| m.name() == "player_name_retries_total").unwrap();
        assert_eq!(retries.metric[0].counter.value, Some(2.0));
    }
}
