//! dynscale.toml configuration parser.
//!
//! ```toml
//! [global]
//! check_interval_secs = 300
//! circuit_breaker_url = "http://breaker.internal:8080/status"
//!
//! [tables."^orders-"]
//! always_decrease_rw_together = true
//!
//! [tables."^orders-".reads]
//! upper_threshold = 80
//! increase_with = 50
//! min_provisioned = 5
//! max_provisioned = 500
//! ```
//!
//! Keys under `[tables]` are regular expressions matched against the
//! start of a table name. Every field has a default, so an empty section
//! enables autoscaling with the stock thresholds.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::scale::{ScaleTable, ScaleUnit};
use crate::types::{Direction, LookbackWindow};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynscaleConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub tables: BTreeMap<String, TableScalingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Seconds between provisioning checks.
    pub check_interval_secs: u64,
    /// Log throughput changes instead of applying them.
    pub dry_run: bool,
    /// Circuit breaker endpoint used by tables without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_url: Option<String>,
    pub circuit_breaker_timeout_ms: u64,
    /// Key prefix for per-table overrides in the override store.
    pub override_prefix: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            dry_run: false,
            circuit_breaker_url: None,
            circuit_breaker_timeout_ms: 10_000,
            override_prefix: "dynscale".to_string(),
        }
    }
}

/// Fully resolved scaling configuration for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableScalingConfig {
    pub reads: DirectionConfig,
    pub writes: DirectionConfig,
    /// Only change throughput when both directions want a change.
    pub always_decrease_rw_together: bool,
    /// Minutes back at which the metrics window opens.
    pub lookback_window_start: u64,
    /// Length of the metrics window in minutes.
    pub lookback_period: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_timeout_ms: Option<u64>,
}

impl Default for TableScalingConfig {
    fn default() -> Self {
        Self {
            reads: DirectionConfig::default(),
            writes: DirectionConfig::default(),
            always_decrease_rw_together: false,
            lookback_window_start: 15,
            lookback_period: 5,
            circuit_breaker_url: None,
            circuit_breaker_timeout_ms: None,
        }
    }
}

impl TableScalingConfig {
    pub fn direction(&self, direction: Direction) -> &DirectionConfig {
        match direction {
            Direction::Read => &self.reads,
            Direction::Write => &self.writes,
        }
    }

    pub fn lookback(&self) -> LookbackWindow {
        LookbackWindow {
            start_minutes: self.lookback_window_start,
            period_minutes: self.lookback_period,
        }
    }

    pub fn validate(&self, scope: &str) -> ConfigResult<()> {
        if self.lookback_period == 0 {
            return Err(ConfigError::invalid(scope, "lookback_period must be at least 1"));
        }
        if self.lookback_period > self.lookback_window_start {
            return Err(ConfigError::invalid(
                scope,
                "lookback_period cannot exceed lookback_window_start",
            ));
        }
        if let Some(url) = &self.circuit_breaker_url {
            validate_breaker_url(scope, url)?;
        }
        for direction in Direction::ALL {
            let scope = format!("{scope}.{direction}s");
            self.direction(direction).validate(&scope)?;
        }
        Ok(())
    }
}

/// Scaling knobs for one direction.
///
/// Granular `*_consumed_*` and `*_throttled_*` fields override the
/// direction-level `increase_*`/`decrease_*` defaults when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    pub autoscaling_enabled: bool,
    pub up_scaling_enabled: bool,
    pub down_scaling_enabled: bool,

    /// Consumed percent above which capacity is increased. Zero disables.
    pub upper_threshold: f64,
    /// Consumed percent below which capacity is decreased. Zero disables.
    pub lower_threshold: f64,
    /// Throttled event count above which capacity is increased. Zero disables.
    pub throttled_upper_threshold: f64,

    pub increase_with: f64,
    pub increase_unit: ScaleUnit,
    pub decrease_with: f64,
    pub decrease_unit: ScaleUnit,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_consumed_with: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_consumed_unit: Option<ScaleUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_throttled_by_provisioned_unit: Option<ScaleUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_throttled_by_consumed_unit: Option<ScaleUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrease_consumed_with: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrease_consumed_unit: Option<ScaleUnit>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_consumed_scale: Option<ScaleTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_throttled_by_provisioned_scale: Option<ScaleTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_throttled_by_consumed_scale: Option<ScaleTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrease_consumed_scale: Option<ScaleTable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_provisioned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_provisioned: Option<u64>,

    /// Consecutive low-usage checks required before scaling down.
    pub checks_before_scale_down: u32,
    /// Consumed percent at or above which the check counter resets. Zero disables.
    pub checks_reset_percent: f64,
    pub allow_scaling_down_on_0_percent: bool,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            autoscaling_enabled: true,
            up_scaling_enabled: true,
            down_scaling_enabled: true,
            upper_threshold: 90.0,
            lower_threshold: 30.0,
            throttled_upper_threshold: 0.0,
            increase_with: 50.0,
            increase_unit: ScaleUnit::Percent,
            decrease_with: 50.0,
            decrease_unit: ScaleUnit::Percent,
            increase_consumed_with: None,
            increase_consumed_unit: None,
            increase_throttled_by_provisioned_unit: None,
            increase_throttled_by_consumed_unit: None,
            decrease_consumed_with: None,
            decrease_consumed_unit: None,
            increase_consumed_scale: None,
            increase_throttled_by_provisioned_scale: None,
            increase_throttled_by_consumed_scale: None,
            decrease_consumed_scale: None,
            min_provisioned: None,
            max_provisioned: None,
            checks_before_scale_down: 1,
            checks_reset_percent: 0.0,
            allow_scaling_down_on_0_percent: false,
        }
    }
}

/// Priority-ordered coalescing: the granular value wins when present.
///
/// `Some(0.0)` is an explicit value and wins over the default; zero here is
/// not "unset" the way it is for thresholds and min/max.
fn granular<T>(granular: Option<T>, default: T) -> T {
    granular.unwrap_or(default)
}

/// A threshold of zero (or less) means the rule is switched off.
fn enabled(threshold: f64) -> Option<f64> {
    (threshold > 0.0).then_some(threshold)
}

impl DirectionConfig {
    pub fn upper_threshold(&self) -> Option<f64> {
        enabled(self.upper_threshold)
    }

    pub fn lower_threshold(&self) -> Option<f64> {
        enabled(self.lower_threshold)
    }

    pub fn throttled_upper_threshold(&self) -> Option<f64> {
        enabled(self.throttled_upper_threshold)
    }

    pub fn checks_reset_percent(&self) -> Option<f64> {
        enabled(self.checks_reset_percent)
    }

    pub fn resolved_increase_consumed_with(&self) -> f64 {
        granular(self.increase_consumed_with, self.increase_with)
    }

    pub fn resolved_increase_consumed_unit(&self) -> ScaleUnit {
        granular(self.increase_consumed_unit, self.increase_unit)
    }

    pub fn resolved_increase_throttled_by_provisioned_unit(&self) -> ScaleUnit {
        granular(self.increase_throttled_by_provisioned_unit, self.increase_unit)
    }

    pub fn resolved_increase_throttled_by_consumed_unit(&self) -> ScaleUnit {
        granular(self.increase_throttled_by_consumed_unit, self.increase_unit)
    }

    pub fn resolved_decrease_consumed_with(&self) -> f64 {
        granular(self.decrease_consumed_with, self.decrease_with)
    }

    pub fn resolved_decrease_consumed_unit(&self) -> ScaleUnit {
        granular(self.decrease_consumed_unit, self.decrease_unit)
    }

    /// Configured ceiling; zero is treated as unbounded.
    pub fn max_provisioned(&self) -> Option<u64> {
        self.max_provisioned.filter(|max| *max > 0)
    }

    /// Configured floor; zero is treated as unset.
    pub fn min_provisioned(&self) -> Option<u64> {
        self.min_provisioned.filter(|min| *min > 0)
    }

    pub fn validate(&self, scope: &str) -> ConfigResult<()> {
        if let (Some(min), Some(max)) = (self.min_provisioned(), self.max_provisioned())
            && min > max
        {
            return Err(ConfigError::invalid(
                scope,
                format!("min_provisioned ({min}) is greater than max_provisioned ({max})"),
            ));
        }
        if self.checks_before_scale_down == 0 {
            return Err(ConfigError::invalid(
                scope,
                "checks_before_scale_down must be at least 1",
            ));
        }

        let amounts = [
            ("upper_threshold", Some(self.upper_threshold)),
            ("lower_threshold", Some(self.lower_threshold)),
            ("throttled_upper_threshold", Some(self.throttled_upper_threshold)),
            ("checks_reset_percent", Some(self.checks_reset_percent)),
            ("increase_with", Some(self.increase_with)),
            ("decrease_with", Some(self.decrease_with)),
            ("increase_consumed_with", self.increase_consumed_with),
            ("decrease_consumed_with", self.decrease_consumed_with),
        ];
        for (field, value) in amounts {
            if let Some(value) = value
                && (!value.is_finite() || value < 0.0)
            {
                return Err(ConfigError::invalid(
                    scope,
                    format!("{field} must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

impl DynscaleConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: DynscaleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.global.check_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "global",
                "check_interval_secs must be at least 1",
            ));
        }
        if let Some(url) = &self.global.circuit_breaker_url {
            validate_breaker_url("global", url)?;
        }
        // Compiling the matcher validates every key.
        self.matcher()?;
        for (key, table) in &self.tables {
            table.validate(&format!("tables.{key}"))?;
        }
        Ok(())
    }

    pub fn table(&self, key: &str) -> Option<&TableScalingConfig> {
        self.tables.get(key)
    }

    /// Circuit breaker endpoint and timeout for a table key, if any.
    pub fn breaker_for(&self, key: &str) -> Option<(&str, u64)> {
        let table = self.tables.get(key);
        let url = table
            .and_then(|t| t.circuit_breaker_url.as_deref())
            .or(self.global.circuit_breaker_url.as_deref())?;
        let timeout = table
            .and_then(|t| t.circuit_breaker_timeout_ms)
            .unwrap_or(self.global.circuit_breaker_timeout_ms);
        Some((url, timeout))
    }

    pub fn matcher(&self) -> ConfigResult<TableMatcher> {
        let mut patterns = Vec::with_capacity(self.tables.len());
        for key in self.tables.keys() {
            let regex = Regex::new(&format!("^(?:{key})")).map_err(|source| {
                ConfigError::Pattern {
                    key: key.clone(),
                    source,
                }
            })?;
            patterns.push((key.clone(), regex));
        }
        Ok(TableMatcher { patterns })
    }
}

fn validate_breaker_url(scope: &str, url: &str) -> ConfigResult<()> {
    if !url.starts_with("http://") {
        return Err(ConfigError::invalid(
            scope,
            format!("circuit_breaker_url must be an http:// URL, got {url:?}"),
        ));
    }
    Ok(())
}

/// A table name paired with the configuration key it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMatch {
    pub table_name: String,
    pub config_key: String,
}

/// Compiled `[tables]` keys.
#[derive(Debug, Clone)]
pub struct TableMatcher {
    patterns: Vec<(String, Regex)>,
}

impl TableMatcher {
    /// Pair table names with config keys.
    ///
    /// Keys are tried in configuration order and a table is claimed by the
    /// first key that matches it. Unmatched tables are left out.
    pub fn match_tables<S: AsRef<str>>(&self, table_names: &[S]) -> Vec<TableMatch> {
        let mut matched: Vec<TableMatch> = Vec::new();
        for (key, regex) in &self.patterns {
            for name in table_names {
                let name = name.as_ref();
                if !regex.is_match(name) || matched.iter().any(|m| m.table_name == name) {
                    continue;
                }
                matched.push(TableMatch {
                    table_name: name.to_string(),
                    config_key: key.clone(),
                });
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DynscaleConfig::from_toml_str("").unwrap();
        assert_eq!(config.global.check_interval_secs, 300);
        assert!(!config.global.dry_run);
        assert!(config.tables.is_empty());
    }

    #[test]
    fn empty_table_section_gets_stock_thresholds() {
        let config = DynscaleConfig::from_toml_str("[tables.orders]").unwrap();
        let table = config.table("orders").unwrap();
        assert_eq!(table.reads.upper_threshold(), Some(90.0));
        assert_eq!(table.writes.lower_threshold(), Some(30.0));
        assert_eq!(table.reads.throttled_upper_threshold(), None);
        assert_eq!(table.reads.checks_before_scale_down, 1);
        assert_eq!(table.lookback(), LookbackWindow::default());
    }

    #[test]
    fn parses_full_table_section() {
        let config = DynscaleConfig::from_toml_str(
            r#"
[global]
check_interval_secs = 60
dry_run = true

[tables."^orders-"]
always_decrease_rw_together = true

[tables."^orders-".reads]
upper_threshold = 80
increase_unit = "units"
increase_with = 20
min_provisioned = 5
max_provisioned = 500
increase_consumed_scale = { 0 = 0, 85 = 50, 95 = 100 }

[tables."^orders-".writes]
autoscaling_enabled = false
"#,
        )
        .unwrap();

        assert!(config.global.dry_run);
        let table = config.table("^orders-").unwrap();
        assert!(table.always_decrease_rw_together);
        assert_eq!(table.reads.increase_unit, ScaleUnit::Units);
        assert_eq!(table.reads.max_provisioned(), Some(500));
        assert_eq!(table.reads.increase_consumed_scale.as_ref().unwrap().len(), 3);
        assert!(!table.writes.autoscaling_enabled);
    }

    #[test]
    fn granular_values_override_direction_defaults() {
        let dir = DirectionConfig {
            increase_unit: ScaleUnit::Units,
            increase_with: 10.0,
            increase_consumed_unit: Some(ScaleUnit::Percent),
            decrease_consumed_with: Some(5.0),
            ..DirectionConfig::default()
        };
        assert_eq!(dir.resolved_increase_consumed_unit(), ScaleUnit::Percent);
        assert_eq!(dir.resolved_increase_consumed_with(), 10.0);
        assert_eq!(
            dir.resolved_increase_throttled_by_provisioned_unit(),
            ScaleUnit::Units
        );
        assert_eq!(dir.resolved_decrease_consumed_with(), 5.0);
        assert_eq!(dir.resolved_decrease_consumed_unit(), ScaleUnit::Percent);
    }

    #[test]
    fn explicit_zero_granular_value_wins() {
        let dir = DirectionConfig {
            increase_with: 50.0,
            increase_consumed_with: Some(0.0),
            decrease_consumed_with: Some(0.0),
            ..DirectionConfig::default()
        };
        assert_eq!(dir.resolved_increase_consumed_with(), 0.0);
        assert_eq!(dir.resolved_decrease_consumed_with(), 0.0);
    }

    #[test]
    fn rejects_min_above_max() {
        let err = DynscaleConfig::from_toml_str(
            "[tables.t.writes]\nmin_provisioned = 50\nmax_provisioned = 10\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("tables.t.writes"), "{err}");
    }

    #[test]
    fn rejects_zero_checks_before_scale_down() {
        let result =
            DynscaleConfig::from_toml_str("[tables.t.reads]\nchecks_before_scale_down = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_period_longer_than_window() {
        let result = DynscaleConfig::from_toml_str(
            "[tables.t]\nlookback_window_start = 5\nlookback_period = 10\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_pattern() {
        let err = DynscaleConfig::from_toml_str("[tables.\"orders(\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn rejects_https_breaker() {
        let result = DynscaleConfig::from_toml_str(
            "[global]\ncircuit_breaker_url = \"https://breaker/status\"\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn first_matching_key_claims_table() {
        let config = DynscaleConfig::from_toml_str(
            "[tables.\"orders\"]\n[tables.\"orders-archive\"]\n[tables.\"users$\"]\n",
        )
        .unwrap();
        let names = ["orders-archive", "orders-live", "users", "users-old", "billing"];
        let matched = config.matcher().unwrap().match_tables(&names);

        let pairs: Vec<(&str, &str)> = matched
            .iter()
            .map(|m| (m.table_name.as_str(), m.config_key.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("orders-archive", "orders"),
                ("orders-live", "orders"),
                ("users", "users$"),
            ]
        );
    }

    #[test]
    fn patterns_anchor_at_start_only() {
        let config = DynscaleConfig::from_toml_str("[tables.\"live\"]").unwrap();
        let matched = config
            .matcher()
            .unwrap()
            .match_tables(&["live-orders", "orders-live"]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].table_name, "live-orders");
    }

    #[test]
    fn table_breaker_overrides_global() {
        let config = DynscaleConfig::from_toml_str(
            r#"
[global]
circuit_breaker_url = "http://global/status"

[tables.a]

[tables.b]
circuit_breaker_url = "http://b/status"
circuit_breaker_timeout_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.breaker_for("a"), Some(("http://global/status", 10_000)));
        assert_eq!(config.breaker_for("b"), Some(("http://b/status", 250)));
    }

    #[test]
    fn no_breaker_when_unconfigured() {
        let config = DynscaleConfig::from_toml_str("[tables.a]").unwrap();
        assert_eq!(config.breaker_for("a"), None);
    }

    #[test]
    fn renders_back_to_toml() {
        let config = DynscaleConfig::from_toml_str(
            "[tables.t.reads]\nincrease_consumed_scale = { 50 = 10 }\n",
        )
        .unwrap();
        let rendered = config.to_toml_string().unwrap();
        let reparsed = DynscaleConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.table("t"), config.table("t"));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynscale.toml");
        std::fs::write(&path, "[global]\ncheck_interval_secs = 30\n").unwrap();
        let config = DynscaleConfig::from_file(&path).unwrap();
        assert_eq!(config.global.check_interval_secs, 30);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = DynscaleConfig::from_file(Path::new("/nonexistent/dynscale.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dynscale.toml"));
    }
}
