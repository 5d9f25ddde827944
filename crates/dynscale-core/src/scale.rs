//! Scale units and scale tables.
//!
//! A scale table maps a metric threshold to a scaling amount. In TOML it is
//! written as an inline table with numeric keys:
//!
//! ```toml
//! increase_consumed_scale = { 0 = 0, 80 = 10, 90 = 25, "97.5" = 50 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a scaling amount is applied to the current capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleUnit {
    /// The amount is a number of capacity units.
    Units,
    /// The amount is a percentage of the current capacity.
    #[default]
    Percent,
}

/// One `threshold → amount` entry of a scale table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleStep {
    pub threshold: f64,
    pub amount: f64,
}

/// Threshold table, kept sorted by ascending threshold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ScaleTable {
    steps: Vec<ScaleStep>,
}

impl ScaleTable {
    /// Build a table from `(threshold, amount)` pairs in any order.
    pub fn new(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, ConfigError> {
        let mut steps = Vec::new();
        for (threshold, amount) in pairs {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::ScaleTable(format!(
                    "threshold {threshold} must be a non-negative number"
                )));
            }
            if !amount.is_finite() || amount < 0.0 {
                return Err(ConfigError::ScaleTable(format!(
                    "amount {amount} at threshold {threshold} must be a non-negative number"
                )));
            }
            steps.push(ScaleStep { threshold, amount });
        }

        steps.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        if let Some(pair) = steps.windows(2).find(|w| w[0].threshold == w[1].threshold) {
            return Err(ConfigError::ScaleTable(format!(
                "duplicate threshold {}",
                pair[0].threshold
            )));
        }

        Ok(Self { steps })
    }

    /// Entries in ascending threshold order.
    pub fn steps(&self) -> &[ScaleStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl TryFrom<BTreeMap<String, f64>> for ScaleTable {
    type Error = ConfigError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut pairs = Vec::with_capacity(map.len());
        for (key, amount) in map {
            let threshold = key.trim().parse::<f64>().map_err(|_| {
                ConfigError::ScaleTable(format!("threshold {key:?} is not a number"))
            })?;
            pairs.push((threshold, amount));
        }
        Self::new(pairs)
    }
}

impl From<ScaleTable> for BTreeMap<String, f64> {
    fn from(table: ScaleTable) -> Self {
        table
            .steps
            .into_iter()
            .map(|step| (step.threshold.to_string(), step.amount))
            .collect()
    }
}
