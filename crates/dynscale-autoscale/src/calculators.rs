//! Capacity arithmetic.
//!
//! Turns a scaling amount into an absolute capacity. Increases start from
//! whichever is larger of the current capacity and what consumption
//! implies, so a table running hot over its provisioned capacity grows
//! from its real load rather than from a stale setting.

use tracing::debug;

use dynscale_core::ScaleUnit;

/// Capacity implied by the consumed percentage, rounded up.
pub fn consumption_based(current: u64, consumed_percent: f64) -> u64 {
    (current as f64 * consumed_percent / 100.0).ceil().max(0.0) as u64
}

/// New capacity after an increase of `amount`, never below `current`.
///
/// A `max` of `None` leaves the result unbounded.
pub fn increase(
    unit: ScaleUnit,
    current: u64,
    amount: f64,
    max: Option<u64>,
    consumed_percent: f64,
) -> u64 {
    let baseline = consumption_based(current, consumed_percent).max(current);
    let step = match unit {
        ScaleUnit::Percent => (baseline as f64 * amount / 100.0).ceil().max(0.0) as u64,
        ScaleUnit::Units => amount.max(0.0) as u64,
    };
    let mut updated = baseline.saturating_add(step);

    if let Some(max) = max
        && updated > max
    {
        debug!(max, wanted = updated, "reached provisioned max limit");
        updated = max;
    }
    updated.max(current)
}

/// New capacity after a decrease of `amount`, never above `current`.
pub fn decrease(unit: ScaleUnit, current: u64, amount: f64, min: Option<u64>) -> u64 {
    let step = match unit {
        ScaleUnit::Percent => (current as f64 * amount / 100.0).floor().max(0.0) as u64,
        ScaleUnit::Units => amount.max(0.0) as u64,
    };
    let updated = current.saturating_sub(step);

    let floor = effective_min(min);
    if updated < floor {
        debug!(min = floor, wanted = updated, "reached provisioned min limit");
        return floor.min(current);
    }
    updated
}

/// Lowest capacity a decrease may reach: the configured minimum.
///
/// Never below one unit, with or without a minimum, because a table can't
/// be provisioned at zero.
pub fn effective_min(min: Option<u64>) -> u64 {
    min.unwrap_or(1).max(1)
}

/// True when `proposed` would sit below what the table is already using.
pub fn is_consumed_over_proposed(current: u64, proposed: u64, consumed_percent: f64) -> bool {
    consumption_based(current, consumed_percent) > proposed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_increase_rounds_up() {
        assert_eq!(increase(ScaleUnit::Percent, 100, 50.0, None, 95.0), 150);
        assert_eq!(increase(ScaleUnit::Percent, 3, 10.0, None, 50.0), 4);
    }

    #[test]
    fn unit_increase_adds_amount() {
        assert_eq!(increase(ScaleUnit::Units, 100, 25.0, None, 10.0), 125);
    }

    #[test]
    fn increase_starts_from_consumption_when_over_provisioned() {
        // 200% consumed on 10 units: baseline is 20, plus 50%.
        assert_eq!(increase(ScaleUnit::Percent, 10, 50.0, None, 200.0), 30);
        assert_eq!(increase(ScaleUnit::Units, 10, 5.0, None, 200.0), 25);
    }

    #[test]
    fn increase_clamps_to_max() {
        assert_eq!(increase(ScaleUnit::Percent, 100, 50.0, Some(120), 95.0), 120);
    }

    #[test]
    fn increase_never_drops_below_current() {
        // Already above max: stay put rather than shrink.
        assert_eq!(increase(ScaleUnit::Percent, 200, 50.0, Some(120), 95.0), 200);
        assert_eq!(increase(ScaleUnit::Units, 200, 0.0, None, 0.0), 200);
        for current in [1, 7, 100, 4_000] {
            for amount in [0.0, 1.0, 33.0, 100.0] {
                for max in [None, Some(1), Some(50), Some(10_000)] {
                    let result = increase(ScaleUnit::Percent, current, amount, max, 80.0);
                    assert!(result >= current);
                    if let Some(max) = max
                        && current <= max
                    {
                        assert!(result <= max);
                    }
                }
            }
        }
    }

    #[test]
    fn percent_decrease_rounds_down_the_step() {
        // 33% of 10 is 3.3: remove 3.
        assert_eq!(decrease(ScaleUnit::Percent, 10, 33.0, None), 7);
        assert_eq!(decrease(ScaleUnit::Percent, 100, 50.0, None), 50);
    }

    #[test]
    fn unit_decrease_subtracts_amount() {
        assert_eq!(decrease(ScaleUnit::Units, 100, 30.0, None), 70);
    }

    #[test]
    fn decrease_clamps_to_min() {
        assert_eq!(decrease(ScaleUnit::Percent, 100, 90.0, Some(25)), 25);
        assert_eq!(decrease(ScaleUnit::Units, 100, 500.0, Some(25)), 25);
    }

    #[test]
    fn decrease_keeps_at_least_one_unit() {
        assert_eq!(decrease(ScaleUnit::Units, 5, 50.0, None), 1);
        assert_eq!(decrease(ScaleUnit::Percent, 5, 100.0, None), 1);
    }

    #[test]
    fn decrease_never_rises_above_current() {
        // A minimum above current would otherwise push capacity up.
        assert_eq!(decrease(ScaleUnit::Units, 10, 5.0, Some(15)), 10);
        for current in [1, 2, 10, 999] {
            for amount in [0.0, 10.0, 50.0, 150.0] {
                for min in [None, Some(1), Some(5), Some(5_000)] {
                    let result = decrease(ScaleUnit::Percent, current, amount, min);
                    assert!(result <= current);
                    if let Some(min) = min
                        && min <= current
                    {
                        assert!(result >= min);
                    }
                }
            }
        }
    }

    #[test]
    fn effective_min_floors_at_one_unit() {
        assert_eq!(effective_min(Some(50)), 50);
        assert_eq!(effective_min(Some(5)), 5);
        assert_eq!(effective_min(Some(0)), 1);
        assert_eq!(effective_min(None), 1);
    }

    #[test]
    fn consumed_over_proposed() {
        // 80% of 100 is 80 units in use.
        assert!(is_consumed_over_proposed(100, 79, 80.0));
        assert!(!is_consumed_over_proposed(100, 80, 80.0));
        assert!(!is_consumed_over_proposed(100, 100, 80.0));
        // Over 100% consumed: even the current setting is too low.
        assert!(is_consumed_over_proposed(100, 100, 120.0));
    }
}
