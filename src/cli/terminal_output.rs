//! Live terminal view of a pipeline run
//!
//! Subscribes to execution events, prints one line per event above a
//! progress bar counting finished nodes, and optionally shows each node's
//! output between separators.

use crate::cli::output::{create_progress_bar, format_execution_event, format_output, format_value};
use crate::execution::ExecutionEvent;
use console::style;
use indicatif::ProgressBar;

/// Event handler that renders a run to the terminal
#[derive(Clone)]
pub struct TerminalProgress {
    bar: ProgressBar,
    show_output: bool,
}

impl TerminalProgress {
    /// Create a view for a run of `total_nodes` nodes
    pub fn new(total_nodes: usize, show_output: bool) -> Self {
        Self {
            bar: create_progress_bar(total_nodes),
            show_output,
        }
    }

    /// Hidden view, for non-interactive output
    pub fn hidden(show_output: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            show_output,
        }
    }

    pub fn handle(&self, event: &ExecutionEvent) {
        self.bar.println(format_execution_event(event));

        match event {
            ExecutionEvent::NodeStart { node_name, .. } => {
                self.bar.set_message(node_name.clone());
            }
            ExecutionEvent::NodeComplete { output, .. } => {
                self.bar.inc(1);
                if self.show_output {
                    self.bar.println(separator());
                    self.bar.println(format_output(&format_value(output), 10));
                    self.bar.println(separator());
                }
            }
            ExecutionEvent::Complete { .. } => {
                self.bar.finish_with_message(style("done").green().to_string());
            }
            ExecutionEvent::Error { .. } => {
                self.bar.abandon_with_message(style("failed").red().to_string());
            }
            _ => {}
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Horizontal rule spanning the terminal width
fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    style("─".repeat(width)).dim().to_string()
}
