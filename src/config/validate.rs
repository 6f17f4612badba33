// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StepRunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StepRunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_toolchain(cfg)?;
    validate_build(cfg)?;
    validate_debugger(cfg)?;
    Ok(())
}

fn validate_toolchain(cfg: &RawConfigFile) -> Result<()> {
    if cfg.toolchain.path.trim().is_empty() {
        return Err(StepRunnerError::ConfigError(
            "[toolchain].path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.build_file.as_os_str().is_empty() {
        return Err(StepRunnerError::ConfigError(
            "[build].build_file must not be empty".to_string(),
        ));
    }

    if cfg.build.introspect_args.is_empty() {
        return Err(StepRunnerError::ConfigError(
            "[build].introspect_args must contain at least one argument".to_string(),
        ));
    }

    if cfg.build.build_file_flag.trim().is_empty() {
        return Err(StepRunnerError::ConfigError(
            "[build].build_file_flag must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_debugger(cfg: &RawConfigFile) -> Result<()> {
    if cfg.debugger.command.trim().is_empty() {
        return Err(StepRunnerError::ConfigError(
            "[debugger].command must not be empty".to_string(),
        ));
    }
    Ok(())
}
