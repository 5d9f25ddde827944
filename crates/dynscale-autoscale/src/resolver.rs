//! Per-table configuration resolution.
//!
//! The static configuration for a table is layered with a dynamic JSON
//! override from the override store, and the merged result is written
//! back so operators can read the effective configuration from the store.
//! Store failures never stop a cycle: they are logged and the static
//! configuration is used.

use tracing::{debug, error};

use dynscale_core::{TableScalingConfig, merge_override};

use crate::provider::OverrideStore;

pub struct ConfigResolver<S> {
    store: S,
    prefix: String,
    dry_run: bool,
}

impl<S: OverrideStore> ConfigResolver<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            dry_run: false,
        }
    }

    /// Skip writing the merged configuration back.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Store key holding the override for `table_name`.
    pub fn override_key(&self, table_name: &str) -> String {
        format!("{}/{table_name}", self.prefix)
    }

    /// Effective configuration for `table_name`.
    pub fn resolve(&self, table_name: &str, base: &TableScalingConfig) -> TableScalingConfig {
        let key = self.override_key(table_name);

        let resolved = match self.store.load_override(&key) {
            Ok(Some(document)) => match merge_override(base, &document)
                .and_then(|merged| merged.validate(&key).map(|()| merged))
            {
                Ok(merged) => {
                    debug!(table = %table_name, %key, "applied configuration override");
                    merged
                }
                Err(e) => {
                    error!(table = %table_name, %key, error = %e, "invalid configuration override");
                    base.clone()
                }
            },
            Ok(None) => base.clone(),
            Err(e) => {
                error!(table = %table_name, %key, error = %e, "can't read configuration override");
                base.clone()
            }
        };

        if !self.dry_run {
            match serde_json::to_string(&resolved) {
                Ok(document) => {
                    if let Err(e) = self.store.store_override(&key, &document) {
                        error!(table = %table_name, %key, error = %e, "can't store configuration override");
                    }
                }
                Err(e) => {
                    error!(table = %table_name, error = %e, "can't encode configuration override");
                }
            }
        }

        resolved
    }
}
