//! Scale table lookups.
//!
//! A missing or empty table always yields zero, which callers read as
//! "no amount from the table".

use dynscale_core::ScaleTable;

/// Amount of the largest threshold `<= value`, walking thresholds upwards.
pub fn lookup_increase(table: Option<&ScaleTable>, value: f64) -> f64 {
    let Some(table) = table else {
        return 0.0;
    };

    let mut amount = 0.0;
    for step in table.steps() {
        if value < step.threshold {
            break;
        }
        amount = step.amount;
    }
    amount
}

/// Amount of the smallest threshold `>= value`, walking thresholds downwards.
pub fn lookup_decrease(table: Option<&ScaleTable>, value: f64) -> f64 {
    let Some(table) = table else {
        return 0.0;
    };

    let mut amount = 0.0;
    for step in table.steps().iter().rev() {
        if value > step.threshold {
            break;
        }
        amount = step.amount;
    }
    amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increase_table() -> ScaleTable {
        ScaleTable::new([(80.0, 10.0), (0.0, 0.0), (90.0, 25.0), (95.0, 50.0)]).unwrap()
    }

    fn decrease_table() -> ScaleTable {
        ScaleTable::new([(10.0, 50.0), (20.0, 30.0), (30.0, 10.0)]).unwrap()
    }

    #[test]
    fn increase_carries_largest_threshold_below_value() {
        let table = increase_table();
        assert_eq!(lookup_increase(Some(&table), 50.0), 0.0);
        assert_eq!(lookup_increase(Some(&table), 80.0), 10.0);
        assert_eq!(lookup_increase(Some(&table), 92.5), 25.0);
        assert_eq!(lookup_increase(Some(&table), 300.0), 50.0);
    }

    #[test]
    fn increase_below_smallest_threshold_is_zero() {
        let table = ScaleTable::new([(50.0, 10.0)]).unwrap();
        assert_eq!(lookup_increase(Some(&table), 49.9), 0.0);
    }

    #[test]
    fn decrease_carries_smallest_threshold_above_value() {
        let table = decrease_table();
        assert_eq!(lookup_decrease(Some(&table), 5.0), 50.0);
        assert_eq!(lookup_decrease(Some(&table), 10.0), 50.0);
        assert_eq!(lookup_decrease(Some(&table), 15.0), 30.0);
        assert_eq!(lookup_decrease(Some(&table), 30.0), 10.0);
    }

    #[test]
    fn decrease_above_largest_threshold_is_zero() {
        assert_eq!(lookup_decrease(Some(&decrease_table()), 30.1), 0.0);
    }

    #[test]
    fn missing_or_empty_table_is_zero() {
        let empty = ScaleTable::default();
        assert_eq!(lookup_increase(None, 99.0), 0.0);
        assert_eq!(lookup_increase(Some(&empty), 99.0), 0.0);
        assert_eq!(lookup_decrease(None, 1.0), 0.0);
        assert_eq!(lookup_decrease(Some(&empty), 1.0), 0.0);
    }

    #[test]
    fn lookups_are_idempotent() {
        let table = increase_table();
        let first = lookup_increase(Some(&table), 91.0);
        for _ in 0..3 {
            assert_eq!(lookup_increase(Some(&table), 91.0), first);
        }
    }

    #[test]
    fn increase_is_monotonic_in_value() {
        let table = increase_table();
        let mut previous = 0.0;
        for tenth in 0..=1200 {
            let amount = lookup_increase(Some(&table), tenth as f64 / 10.0);
            assert!(amount >= previous, "dropped at {}", tenth as f64 / 10.0);
            previous = amount;
        }
    }

    #[test]
    fn decrease_is_non_increasing_in_value() {
        let table = decrease_table();
        let mut previous = f64::INFINITY;
        for tenth in 0..=500 {
            let amount = lookup_decrease(Some(&table), tenth as f64 / 10.0);
            assert!(amount <= previous, "rose at {}", tenth as f64 / 10.0);
            previous = amount;
        }
    }
}
