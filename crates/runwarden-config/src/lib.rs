//! Configuration system for the runwarden workflow controller.
//!
//! Provides TOML-based configuration with:
//! - `[controller]` worker pool, resync period and retry limit
//! - `[rate_limit]` per-key exponential backoff and overall token bucket
//! - `[history]` per-workflow run retention and sweep cadence
//! - Config file layering (user config dir + project-local overrides)
//!
//! Values are plain data threaded into constructors; nothing here is global.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, user_config_dir,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
