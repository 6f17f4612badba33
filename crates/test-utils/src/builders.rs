#![allow(dead_code)]

use std::path::PathBuf;

use steprunner::config::{ConfigFile, RawConfigFile};
use steprunner::types::{ConsoleMode, StepDescriptor};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn toolchain(mut self, path: &str) -> Self {
        self.config.toolchain.path = path.to_string();
        self
    }

    pub fn not_found_hint(mut self, hint: &str) -> Self {
        self.config.toolchain.not_found_hint = Some(hint.to_string());
        self
    }

    pub fn build_file(mut self, path: &str) -> Self {
        self.config.build.build_file = PathBuf::from(path);
        self
    }

    pub fn build_arg(mut self, arg: &str) -> Self {
        self.config.build.args.push(arg.to_string());
        self
    }

    pub fn test_arg(mut self, arg: &str) -> Self {
        self.config.test.args.push(arg.to_string());
        self
    }

    pub fn bin_dir(mut self, dir: &str) -> Self {
        self.config.test.bin_dir = PathBuf::from(dir);
        self
    }

    pub fn debugger(mut self, command: &str) -> Self {
        self.config.debugger.command = command.to_string();
        self
    }

    pub fn console(mut self, console: ConsoleMode) -> Self {
        self.config.debugger.console = console;
        self
    }

    pub fn watch(mut self, enabled: bool) -> Self {
        self.config.watch.enabled = enabled;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `(name, description, is_default)` triples to descriptors.
pub fn steps(entries: &[(&str, &str, bool)]) -> Vec<StepDescriptor> {
    entries
        .iter()
        .map(|(name, description, is_default)| StepDescriptor::new(*name, *description, *is_default))
        .collect()
}

/// Introspection output in the toolchain's help format.
pub fn help_output(entries: &[(&str, &str, bool)]) -> String {
    let mut out = String::from("Usage: zig build [steps] [options]\n\nSteps:\n");
    for (name, description, is_default) in entries {
        let marker = if *is_default { " (default)" } else { "" };
        out.push_str(&format!("  {name}{marker}  {description}\n"));
    }
    out.push_str("\nGeneral Options:\n  -p, --prefix [path]  Where to install files\n");
    out
}
