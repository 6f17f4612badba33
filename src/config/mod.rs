// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML-backed data model.
//! - `loader.rs`: read a config file from disk, or fall back to defaults.
//! - `validate.rs`: reject configs that cannot produce a working toolchain call.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    BuildSection, ConfigFile, DebuggerSection, RawConfigFile, TestSection, ToolchainSection,
    WatchSection,
};
pub use validate::validate_config;
