//! Direction decision engine, shared by reads and writes.
//!
//! Given a table's configuration, the metrics for one direction, the
//! current provisioned units, and the hysteresis counter carried over from
//! the previous cycle, decide whether that direction needs a new capacity.
//! The engine holds no state of its own; the counter comes in and goes
//! back out with the decision.
//!
//! # Algorithm
//!
//! ```text
//! disabled                      → keep current, counter = 0
//! consumed >= reset percent     → counter = 0
//! up-scaling:
//!     candidates (in order): throttled-by-provisioned table,
//!                            throttled-by-consumed table,
//!                            consumed table | flat amount above upper threshold,
//!                            flat amount when throttled count above threshold
//!     winner = first strictly largest candidate
//!     winner > current          → approve, counter = 0
//! down-scaling (nothing approved above):
//!     consumed table | flat amount below lower threshold
//!     target != current         → counter += 1
//!     counter >= required checks → approve (counter kept)
//! proposal below consumption    → keep current
//! ```

use serde::Serialize;
use tracing::{debug, info};

use dynscale_core::{Direction, DirectionConfig, MetricsSnapshot, TableScalingConfig};

use crate::calculators;
use crate::scale_table::{lookup_decrease, lookup_increase};

/// Why a direction ended up with its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleReason {
    NoChange,
    ScaleUpThrottledByProvisioned,
    ScaleUpThrottledByConsumed,
    ScaleUpConsumed,
    ScaleUpThrottledCount,
    ScaleDownConsumed,
    SafetyClamped,
}

impl ScaleReason {
    pub fn describe(&self) -> &'static str {
        match self {
            ScaleReason::NoChange => "no change needed",
            ScaleReason::ScaleUpThrottledByProvisioned => {
                "throttled events by provisioned units threshold exceeded"
            }
            ScaleReason::ScaleUpThrottledByConsumed => {
                "throttled events by consumed units threshold exceeded"
            }
            ScaleReason::ScaleUpConsumed => "consumed threshold exceeded",
            ScaleReason::ScaleUpThrottledCount => "throttled events threshold exceeded",
            ScaleReason::ScaleDownConsumed => "consumed below lower threshold",
            ScaleReason::SafetyClamped => "consumed is over proposed units",
        }
    }
}

/// Outcome of one direction for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionDecision {
    pub direction: Direction,
    pub update_needed: bool,
    pub current_units: u64,
    pub new_units: u64,
    pub reason: ScaleReason,
    /// Counter to carry into the next cycle.
    pub consecutive_checks: u32,
}

/// The decision engine for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionEngine {
    direction: Direction,
}

impl DirectionEngine {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Decide the capacity for this engine's direction.
    pub fn evaluate(
        &self,
        table_name: &str,
        config: &TableScalingConfig,
        metrics: &MetricsSnapshot,
        current_units: u64,
        consecutive_checks: u32,
    ) -> DirectionDecision {
        let direction = self.direction;
        let cfg = config.direction(direction);

        let mut decision = DirectionDecision {
            direction,
            update_needed: false,
            current_units,
            new_units: current_units,
            reason: ScaleReason::NoChange,
            consecutive_checks,
        };

        if !cfg.autoscaling_enabled {
            info!(table = %table_name, %direction, "autoscaling has been disabled");
            decision.consecutive_checks = 0;
            return decision;
        }

        let consumed = metrics.consumed_percent;

        if let Some(reset) = cfg.checks_reset_percent()
            && consumed >= reset
        {
            info!(
                table = %table_name,
                %direction,
                consumed,
                reset_percent = reset,
                "resetting consecutive checks: consumed percent reached reset percent"
            );
            decision.consecutive_checks = 0;
        }

        // Logged only; the down-scaling branch below still runs.
        if consumed == 0.0 && !cfg.allow_scaling_down_on_0_percent {
            info!(table = %table_name, %direction, "scaling down is not done when usage is at 0%");
        }

        if !cfg.up_scaling_enabled {
            debug!(table = %table_name, %direction, "up scaling disabled in configuration");
        } else {
            let (target, reason) = self.scale_up_target(cfg, metrics, current_units);
            if target > current_units {
                info!(
                    table = %table_name,
                    %direction,
                    reason = reason.describe(),
                    "resetting consecutive checks: scale up"
                );
                decision.update_needed = true;
                decision.new_units = target;
                decision.reason = reason;
                decision.consecutive_checks = 0;
            }
        }

        if !decision.update_needed {
            if !cfg.down_scaling_enabled {
                debug!(table = %table_name, %direction, "down scaling disabled in configuration");
            } else {
                if let Some(target) = self.scale_down_target(cfg, metrics, current_units)
                    && target != current_units
                {
                    decision.consecutive_checks += 1;
                    if decision.consecutive_checks >= cfg.checks_before_scale_down {
                        decision.update_needed = true;
                        decision.new_units = target;
                        decision.reason = ScaleReason::ScaleDownConsumed;
                    }
                }
                debug!(
                    table = %table_name,
                    %direction,
                    checks = decision.consecutive_checks,
                    required = cfg.checks_before_scale_down,
                    "consecutive checks"
                );
            }
        }

        if calculators::is_consumed_over_proposed(current_units, decision.new_units, consumed) {
            info!(
                table = %table_name,
                %direction,
                proposed = decision.new_units,
                "consumed is over proposed units, leaving table at current setting"
            );
            decision.update_needed = false;
            decision.new_units = current_units;
            decision.reason = ScaleReason::SafetyClamped;
        }

        if decision.update_needed {
            info!(
                table = %table_name,
                %direction,
                from = current_units,
                to = decision.new_units,
                reason = decision.reason.describe(),
                "capacity change proposed"
            );
        }

        decision
    }

    /// Largest increase any metric asks for, with the metric that asked.
    ///
    /// Returns `(0, NoChange)` when no candidate fires.
    fn scale_up_target(
        &self,
        cfg: &DirectionConfig,
        metrics: &MetricsSnapshot,
        current: u64,
    ) -> (u64, ScaleReason) {
        let consumed = metrics.consumed_percent;
        let max = cfg.max_provisioned();
        let increase = |unit, amount: f64| {
            if amount > 0.0 {
                calculators::increase(unit, current, amount, max, consumed)
            } else {
                0
            }
        };

        let by_provisioned = increase(
            cfg.resolved_increase_throttled_by_provisioned_unit(),
            lookup_increase(
                cfg.increase_throttled_by_provisioned_scale.as_ref(),
                metrics.throttled_by_provisioned_percent,
            ),
        );

        let by_consumed = increase(
            cfg.resolved_increase_throttled_by_consumed_unit(),
            lookup_increase(
                cfg.increase_throttled_by_consumed_scale.as_ref(),
                metrics.throttled_by_consumed_percent,
            ),
        );

        let consumed_unit = cfg.resolved_increase_consumed_unit();
        let consumed_amount = lookup_increase(cfg.increase_consumed_scale.as_ref(), consumed);
        let by_usage = if consumed_amount > 0.0 {
            increase(consumed_unit, consumed_amount)
        } else if cfg.upper_threshold().is_some_and(|upper| consumed > upper) {
            increase(consumed_unit, cfg.resolved_increase_consumed_with())
        } else {
            0
        };

        let by_throttled_count = match cfg.throttled_upper_threshold() {
            Some(threshold) if metrics.throttled_count as f64 > threshold => {
                increase(cfg.increase_unit, cfg.resolved_increase_consumed_with())
            }
            _ => 0,
        };

        [
            (by_provisioned, ScaleReason::ScaleUpThrottledByProvisioned),
            (by_consumed, ScaleReason::ScaleUpThrottledByConsumed),
            (by_usage, ScaleReason::ScaleUpConsumed),
            (by_throttled_count, ScaleReason::ScaleUpThrottledCount),
        ]
        .into_iter()
        .fold((0, ScaleReason::NoChange), |best, candidate| {
            if candidate.0 > best.0 { candidate } else { best }
        })
    }

    /// Decreased capacity when usage is low, or `None` when no rule fires.
    fn scale_down_target(
        &self,
        cfg: &DirectionConfig,
        metrics: &MetricsSnapshot,
        current: u64,
    ) -> Option<u64> {
        let consumed = metrics.consumed_percent;
        let unit = cfg.resolved_decrease_consumed_unit();
        let min = cfg.min_provisioned();

        let amount = lookup_decrease(cfg.decrease_consumed_scale.as_ref(), consumed);
        if amount > 0.0 {
            return Some(calculators::decrease(unit, current, amount, min));
        }
        if cfg.lower_threshold().is_some_and(|lower| consumed < lower) {
            return Some(calculators::decrease(
                unit,
                current,
                cfg.resolved_decrease_consumed_with(),
                min,
            ));
        }
        None
    }
}
