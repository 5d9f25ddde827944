//! dynscale-core: shared types and configuration for the dynscale
//! capacity controller.
//!
//! Everything here is plain data: the TOML configuration model, scale
//! tables, the metrics snapshot handed to the decision engine, and the
//! JSON merge used to layer dynamic per-table overrides on top of the
//! static file.

pub mod config;
pub mod error;
pub mod overrides;
pub mod scale;
pub mod types;

pub use config::{
    DirectionConfig, DynscaleConfig, GlobalConfig, TableMatch, TableMatcher, TableScalingConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use overrides::merge_override;
pub use scale::{ScaleStep, ScaleTable, ScaleUnit};
pub use types::*;
