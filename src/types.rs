use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Kind of a build step, derived from the prefix of its description.
///
/// The declaration order is the display order used by pickers:
/// `Run < Test < Build < Tool < None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Run,
    Test,
    Build,
    Tool,
    None,
}

impl Category {
    /// Classify a step by its description.
    ///
    /// `"Test"` is matched without a colon so descriptions such as
    /// `"Tests: run all"` still land in [`Category::Test`].
    pub fn from_description(description: &str) -> Self {
        if description.starts_with("Run:") {
            Category::Run
        } else if description.starts_with("Test") {
            Category::Test
        } else if description.starts_with("Build:") {
            Category::Build
        } else if description.starts_with("Tool:") {
            Category::Tool
        } else {
            Category::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Run => "run",
            Category::Test => "test",
            Category::Build => "build",
            Category::Tool => "tool",
            Category::None => "none",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step reported by the toolchain's introspection output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub is_default: bool,
}

impl StepDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, is_default: bool) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            category: Category::from_description(&description),
            description,
            is_default,
        }
    }
}

/// Where a launched debugger should attach its console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMode {
    Integrated,
    External,
    Internal,
}

impl Default for ConsoleMode {
    fn default() -> Self {
        ConsoleMode::Integrated
    }
}

impl FromStr for ConsoleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "integrated" => Ok(ConsoleMode::Integrated),
            "external" => Ok(ConsoleMode::External),
            "internal" => Ok(ConsoleMode::Internal),
            other => Err(format!(
                "invalid console mode: {other} (expected \"integrated\", \"external\" or \"internal\")"
            )),
        }
    }
}
