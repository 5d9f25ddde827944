//! Fleet runner: one provisioning cycle per managed table per tick.
//!
//! Tables are discovered from the capacity provider and paired with
//! configuration keys. Each table is resolved, evaluated and has its
//! counters persisted in turn. A failing table is logged and reported;
//! the rest of the fleet carries on.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use dynscale_core::{DynscaleConfig, TableMatch, TableMatcher};

use crate::error::{ScaleError, ScaleResult};
use crate::orchestrator::{CycleOutcome, NoBreaker, ThroughputOrchestrator};
use crate::provider::{
    CapacityMutator, CapacityProvider, CircuitBreaker, HysteresisStore, MetricsProvider,
    OverrideStore,
};
use crate::resolver::ConfigResolver;

/// A table whose cycle failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table_name: String,
    pub config_key: String,
    pub error: String,
}

/// Everything one pass over the fleet did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetReport {
    pub outcomes: Vec<CycleOutcome>,
    pub failures: Vec<TableFailure>,
}

pub struct FleetRunner<P, S, B = NoBreaker> {
    config: DynscaleConfig,
    matcher: TableMatcher,
    orchestrator: ThroughputOrchestrator<P, B>,
    resolver: ConfigResolver<S>,
    counters: S,
}

impl<P, S> FleetRunner<P, S, NoBreaker>
where
    P: MetricsProvider + CapacityProvider + CapacityMutator,
    S: OverrideStore + HysteresisStore + Clone,
{
    /// Build a runner without a circuit breaker.
    pub fn new(config: DynscaleConfig, providers: P, store: S) -> ScaleResult<Self> {
        let matcher = config.matcher()?;
        let dry_run = config.global.dry_run;
        let resolver = ConfigResolver::new(store.clone(), config.global.override_prefix.clone())
            .with_dry_run(dry_run);
        Ok(Self {
            orchestrator: ThroughputOrchestrator::new(providers).with_dry_run(dry_run),
            config,
            matcher,
            resolver,
            counters: store,
        })
    }
}

impl<P, S, B> FleetRunner<P, S, B>
where
    P: MetricsProvider + CapacityProvider + CapacityMutator,
    S: OverrideStore + HysteresisStore,
    B: CircuitBreaker,
{
    /// Gate every table on `breaker`.
    pub fn with_breaker<B2: CircuitBreaker>(self, breaker: B2) -> FleetRunner<P, S, B2> {
        FleetRunner {
            config: self.config,
            matcher: self.matcher,
            orchestrator: self.orchestrator.with_breaker(breaker),
            resolver: self.resolver,
            counters: self.counters,
        }
    }

    pub fn config(&self) -> &DynscaleConfig {
        &self.config
    }

    /// Managed tables paired with the configuration key each matched.
    pub fn targets(&self) -> ScaleResult<Vec<TableMatch>> {
        let tables = self.orchestrator.providers().list_tables()?;
        Ok(self.matcher.match_tables(tables.as_slice()))
    }

    /// One cycle for one table: resolve, evaluate, persist counters.
    pub async fn check_table(&self, target: &TableMatch) -> ScaleResult<CycleOutcome> {
        let base = self
            .config
            .table(&target.config_key)
            .ok_or_else(|| ScaleError::TableNotFound(target.config_key.clone()))?;
        let config = self.resolver.resolve(&target.table_name, base);

        let checks = self.counters.load_checks(&target.table_name)?;
        let outcome = self
            .orchestrator
            .ensure_provisioning(target, &config, checks)
            .await?;
        self.counters.save_checks(&target.table_name, outcome.checks)?;
        Ok(outcome)
    }

    /// One pass over every managed table.
    pub async fn run_once(&self) -> ScaleResult<FleetReport> {
        let mut report = FleetReport::default();
        for target in self.targets()? {
            match self.check_table(&target).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!(table = %target.table_name, error = %e, "provisioning cycle failed");
                    report.failures.push(TableFailure {
                        table_name: target.table_name,
                        config_key: target.config_key,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Run passes every `interval` until `shutdown` changes.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "fleet runner started");

        loop {
            match self.run_once().await {
                Ok(report) => info!(
                    tables = report.outcomes.len(),
                    failures = report.failures.len(),
                    "fleet pass complete"
                ),
                Err(e) => error!(error = %e, "fleet pass failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("fleet runner shutting down");
                    break;
                }
            }
        }
    }
}
