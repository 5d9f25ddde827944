//! `HttpCircuitBreaker`: the autoscaler's circuit breaker over HTTP.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use dynscale_autoscale::CircuitBreaker;
use dynscale_core::DynscaleConfig;

use crate::error::BreakerResult;
use crate::probe::{Endpoint, ProbeResult, http_probe};

/// Breaker endpoints keyed by table config key.
#[derive(Debug, Clone, Default)]
pub struct HttpCircuitBreaker {
    endpoints: HashMap<String, Endpoint>,
}

impl HttpCircuitBreaker {
    /// Build from configuration. `None` when no table has a breaker URL.
    ///
    /// A table's own URL and timeout take precedence over `[global]`.
    pub fn from_config(config: &DynscaleConfig) -> BreakerResult<Option<Self>> {
        let mut endpoints = HashMap::new();
        for key in config.tables.keys() {
            if let Some((url, timeout_ms)) = config.breaker_for(key) {
                let endpoint = Endpoint::parse(url, Duration::from_millis(timeout_ms))?;
                endpoints.insert(key.clone(), endpoint);
            }
        }
        if endpoints.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { endpoints }))
    }

    /// Register an endpoint for one config key.
    pub fn with_endpoint(mut self, config_key: impl Into<String>, endpoint: Endpoint) -> Self {
        self.endpoints.insert(config_key.into(), endpoint);
        self
    }

    pub fn endpoint(&self, config_key: &str) -> Option<&Endpoint> {
        self.endpoints.get(config_key)
    }

    /// Probe the endpoint for `config_key`. Keys without one read as closed.
    pub async fn check(&self, table: &str, config_key: &str) -> ProbeResult {
        let Some(endpoint) = self.endpoints.get(config_key) else {
            return ProbeResult::Closed;
        };
        let result = http_probe(endpoint, table, config_key).await;
        if result.is_open() {
            warn!(%table, url = endpoint.url(), ?result, "circuit breaker is open");
        }
        result
    }
}

impl CircuitBreaker for HttpCircuitBreaker {
    async fn is_open(&self, table: &str, config_key: &str) -> bool {
        self.check(table, config_key).await.is_open()
    }
}
