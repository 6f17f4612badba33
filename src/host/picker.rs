// src/host/picker.rs

//! Terminal-backed picker.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::Result;
use crate::host::{PickItem, Picker};

/// Line reader over stdin, shared by everything that prompts the user.
///
/// Two independent buffered readers on stdin would steal input from each
/// other, so the session loop and the picker both go through this.
#[derive(Debug)]
pub struct TerminalInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalInput {
    pub fn stdin() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    pub async fn read_line(&self) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        Ok(lines.next_line().await?)
    }
}

/// Prints a numbered list on stderr and reads the choice from stdin.
///
/// An empty line, `q`, end of input or an out-of-range number dismisses the
/// prompt.
#[derive(Debug, Clone)]
pub struct TerminalPicker {
    input: Arc<TerminalInput>,
    title: String,
}

impl TerminalPicker {
    pub fn new(input: Arc<TerminalInput>) -> Self {
        Self {
            input,
            title: "Select a build step".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    async fn prompt(&self, items: Vec<PickItem>) -> Result<Option<usize>> {
        if items.is_empty() {
            return Ok(None);
        }

        eprintln!("{}:", self.title);
        eprint!("{}", render_items(&items));
        eprint!("> ");

        let Some(line) = self.input.read_line().await? else {
            debug!("input closed while picking");
            return Ok(None);
        };

        Ok(parse_choice(&line, items.len()))
    }
}

impl Picker for TerminalPicker {
    fn pick(&self, items: Vec<PickItem>) -> Pin<Box<dyn Future<Output = Result<Option<usize>>> + Send + '_>> {
        Box::pin(self.prompt(items))
    }
}

/// Numbered, column-aligned listing of `items`.
pub fn render_items(items: &[PickItem]) -> String {
    let width = items.iter().map(|i| i.label.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (idx, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "  {:>2}) {:<width$}  {}\n",
            idx + 1,
            item.label,
            item.description,
            width = width
        ));
    }
    out
}

/// Turn user input into a zero-based index. Accepts a 1-based number.
pub fn parse_choice(input: &str, len: usize) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return None;
    }
    match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= len => Some(n - 1),
        _ => None,
    }
}
