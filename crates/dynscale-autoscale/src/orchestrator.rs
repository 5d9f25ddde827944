//! Throughput update orchestrator.
//!
//! One call to [`ThroughputOrchestrator::ensure_provisioning`] is one
//! provisioning cycle for one table: consult the circuit breaker, gather
//! metrics and current capacity, run the read and write engines, combine
//! their verdicts and push the new capacity.

use serde::Serialize;
use tracing::{debug, info, warn};

use dynscale_core::{
    ConsecutiveChecks, Direction, MetricsSnapshot, TableMatch, TableScalingConfig, TableStatus,
};

use crate::engine::{DirectionDecision, DirectionEngine};
use crate::error::ScaleResult;
use crate::provider::{CapacityMutator, CapacityProvider, CircuitBreaker, MetricsProvider};

/// What a cycle did to the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CycleAction {
    /// The breaker was open; nothing was evaluated.
    BreakerOpen,
    /// Neither direction needs a change.
    NoChange,
    /// One direction wants a change but both are required.
    HeldForPartner,
    /// A change was wanted but the table is not in an actionable state.
    NotActive { status: TableStatus },
    /// A change was wanted but dry-run is on.
    DryRun { read_units: u64, write_units: u64 },
    /// The mutator accepted the new capacity.
    Applied { read_units: u64, write_units: u64 },
}

/// Result of one provisioning cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub table_name: String,
    pub config_key: String,
    #[serde(flatten)]
    pub action: CycleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reads: Option<DirectionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writes: Option<DirectionDecision>,
    /// Counters to carry into the next cycle.
    pub checks: ConsecutiveChecks,
}

/// Circuit breaker that is never open, for deployments without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBreaker;

impl CircuitBreaker for NoBreaker {
    async fn is_open(&self, _table: &str, _config_key: &str) -> bool {
        false
    }
}

/// Runs provisioning cycles against a set of providers.
pub struct ThroughputOrchestrator<P, B = NoBreaker> {
    providers: P,
    breaker: B,
    dry_run: bool,
}

impl<P> ThroughputOrchestrator<P, NoBreaker> {
    pub fn new(providers: P) -> Self {
        Self {
            providers,
            breaker: NoBreaker,
            dry_run: false,
        }
    }
}

impl<P, B> ThroughputOrchestrator<P, B> {
    /// Gate every cycle on `breaker`.
    pub fn with_breaker<B2: CircuitBreaker>(self, breaker: B2) -> ThroughputOrchestrator<P, B2> {
        ThroughputOrchestrator {
            providers: self.providers,
            breaker,
            dry_run: self.dry_run,
        }
    }

    /// Log changes instead of applying them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn providers(&self) -> &P {
        &self.providers
    }
}

impl<P, B> ThroughputOrchestrator<P, B>
where
    P: MetricsProvider + CapacityProvider + CapacityMutator,
    B: CircuitBreaker,
{
    /// Run one provisioning cycle for `target` under `config`.
    ///
    /// Provider and mutator errors are returned as-is. The counters in the
    /// returned outcome replace `checks` for the next cycle.
    pub async fn ensure_provisioning(
        &self,
        target: &TableMatch,
        config: &TableScalingConfig,
        checks: ConsecutiveChecks,
    ) -> ScaleResult<CycleOutcome> {
        let table = target.table_name.as_str();

        if self.breaker.is_open(table, &target.config_key).await {
            warn!(%table, "circuit breaker is open, skipping cycle");
            return Ok(CycleOutcome {
                table_name: target.table_name.clone(),
                config_key: target.config_key.clone(),
                action: CycleAction::BreakerOpen,
                reads: None,
                writes: None,
                checks: ConsecutiveChecks::default(),
            });
        }

        let reads = self.evaluate(table, Direction::Read, config, checks)?;
        let writes = self.evaluate(table, Direction::Write, config, checks)?;
        let checks = ConsecutiveChecks::new(reads.consecutive_checks, writes.consecutive_checks);

        let apply = if config.always_decrease_rw_together {
            reads.update_needed && writes.update_needed
        } else {
            reads.update_needed || writes.update_needed
        };

        let action = if apply {
            self.apply(target, reads.new_units, writes.new_units)?
        } else if reads.update_needed || writes.update_needed {
            info!(
                %table,
                reads = reads.update_needed,
                writes = writes.update_needed,
                "both directions must change together, holding update"
            );
            CycleAction::HeldForPartner
        } else {
            debug!(%table, "no throughput change needed");
            CycleAction::NoChange
        };

        Ok(CycleOutcome {
            table_name: target.table_name.clone(),
            config_key: target.config_key.clone(),
            action,
            reads: Some(reads),
            writes: Some(writes),
            checks,
        })
    }

    fn evaluate(
        &self,
        table: &str,
        direction: Direction,
        config: &TableScalingConfig,
        checks: ConsecutiveChecks,
    ) -> ScaleResult<DirectionDecision> {
        let current = self.providers.provisioned_units(table, direction)?;
        // A disabled direction keeps its capacity; its metrics are never read.
        let metrics = if config.direction(direction).autoscaling_enabled {
            self.providers.snapshot(table, direction, config.lookback())?
        } else {
            MetricsSnapshot::default()
        };
        debug!(
            %table,
            %direction,
            current,
            consumed = metrics.consumed_percent,
            throttled = metrics.throttled_count,
            "metrics gathered"
        );
        Ok(DirectionEngine::new(direction).evaluate(
            table,
            config,
            &metrics,
            current,
            checks.get(direction),
        ))
    }

    fn apply(&self, target: &TableMatch, read_units: u64, write_units: u64) -> ScaleResult<CycleAction> {
        let table = target.table_name.as_str();

        let status = self.providers.status(table)?;
        if !status.is_actionable() {
            warn!(%table, %status, "table is not active, skipping throughput update");
            return Ok(CycleAction::NotActive { status });
        }

        if self.dry_run {
            info!(%table, read_units, write_units, "dry-run, not updating provisioning");
            return Ok(CycleAction::DryRun {
                read_units,
                write_units,
            });
        }

        self.providers
            .apply(table, &target.config_key, read_units, write_units)?;
        info!(%table, read_units, write_units, "provisioning updated");
        Ok(CycleAction::Applied {
            read_units,
            write_units,
        })
    }
}
