// src/discovery/parser.rs

//! Line scanner for the toolchain's introspection output.
//!
//! The output is read in three states:
//!
//! ```text
//! BeforeSection --(header line)--> InSection --(end line)--> AfterSection
//! ```
//!
//! Only lines seen while `InSection` are matched against the step grammar
//! `name SP [ "(default)" ] [ WS ] description`.

use regex::Regex;
use tracing::{debug, trace};

use crate::errors::{Result, StepRunnerError};
use crate::types::StepDescriptor;

pub const STEPS_HEADER: &str = "Steps:";
pub const GENERAL_OPTIONS_HEADER: &str = "General Options:";

const STEP_LINE_PATTERN: &str = r"^\s*(\S+) (\(default\))?\s*(.*)$";

/// Delimiters of the steps section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarkers {
    pub header: String,
    pub end: String,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self {
            header: STEPS_HEADER.to_string(),
            end: GENERAL_OPTIONS_HEADER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeSection,
    InSection,
    AfterSection,
}

/// Parses the steps section out of introspection output.
#[derive(Debug, Clone)]
pub struct StepParser {
    markers: SectionMarkers,
    line: Regex,
}

impl StepParser {
    pub fn new(markers: SectionMarkers) -> Result<Self> {
        let line = Regex::new(STEP_LINE_PATTERN)
            .map_err(|e| StepRunnerError::Other(anyhow::anyhow!("invalid step line pattern: {e}")))?;
        Ok(Self { markers, line })
    }

    /// Extract the steps in source order.
    ///
    /// Fails if the header or the end marker is missing.
    pub fn parse(&self, output: &str) -> Result<Vec<StepDescriptor>> {
        let mut state = ScanState::BeforeSection;
        let mut steps = Vec::new();

        for line in output.lines() {
            match state {
                ScanState::BeforeSection => {
                    if line.trim_start().starts_with(self.markers.header.as_str()) {
                        state = ScanState::InSection;
                    }
                }
                ScanState::InSection => {
                    if line.trim_start().starts_with(self.markers.end.as_str()) {
                        state = ScanState::AfterSection;
                        break;
                    }
                    if let Some(step) = self.parse_line(line) {
                        steps.push(step);
                    }
                }
                ScanState::AfterSection => break,
            }
        }

        match state {
            ScanState::BeforeSection => Err(StepRunnerError::DiscoveryParse {
                message: format!("no '{}' section in toolchain output", self.markers.header),
                detail: None,
            }),
            ScanState::InSection => Err(StepRunnerError::DiscoveryParse {
                message: format!(
                    "'{}' section is not followed by '{}'",
                    self.markers.header, self.markers.end
                ),
                detail: None,
            }),
            ScanState::AfterSection => {
                debug!(count = steps.len(), "parsed build steps");
                Ok(steps)
            }
        }
    }

    fn parse_line(&self, line: &str) -> Option<StepDescriptor> {
        if line.trim().is_empty() {
            return None;
        }

        let Some(caps) = self.line.captures(line) else {
            trace!(line, "skipping line that is not a step");
            return None;
        };

        let name = caps.get(1)?.as_str();
        let is_default = caps.get(2).is_some();
        let description = caps.get(3).map(|m| m.as_str().trim_end()).unwrap_or("");

        Some(StepDescriptor::new(name, description, is_default))
    }
}
