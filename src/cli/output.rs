//! CLI output formatting

use crate::{
    core::{ExecutionStatus, NodeStatus},
    execution::{ExecutionEvent, PreviewResult},
    persistence::ExecutionRecord,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's nodes
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

pub fn format_node_status(status: NodeStatus) -> String {
    match status {
        NodeStatus::Success => style("SUCCESS").green().to_string(),
        NodeStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// One-line summary of an execution record
pub fn format_record_summary(record: &ExecutionRecord) -> String {
    let status_icon = match record.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
    };

    format!(
        "{} {} - {} - {} ({} nodes) - {}",
        status_icon,
        style(short_id(&record.id)).dim(),
        style(&record.pipeline_name).bold(),
        format_status(record.status),
        record.node_results.len(),
        style(record.start_time.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::Start {
            execution_id,
            pipeline_name,
            ..
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::NodeStart {
            node_name,
            node_type,
            ..
        } => format!(
            "{} {} {}",
            SPINNER,
            style(node_name).cyan(),
            style(format!("[{}]", node_type)).dim()
        ),
        ExecutionEvent::NodeComplete {
            node_name,
            metadata,
            ..
        } => {
            let mut details = vec![format_duration(Duration::from_millis(metadata.duration_ms))];
            if let Some(usage) = &metadata.token_usage {
                details.push(format!("{} tokens", usage.total_tokens));
            }
            if let Some(model) = &metadata.model {
                details.push(model.clone());
            }
            format!(
                "{} {} {}",
                CHECK,
                style(node_name).green(),
                style(format!("({})", details.join(", "))).dim()
            )
        }
        ExecutionEvent::NodeError {
            node_name, error, ..
        } => format!("{} {}: {}", CROSS, style(node_name).red(), style(error).dim()),
        ExecutionEvent::Complete { execution_id, .. } => format!(
            "{} Pipeline ({}) {} completed",
            INFO,
            style(short_id(execution_id)).dim(),
            style("successfully").green()
        ),
        ExecutionEvent::Error {
            execution_id,
            message,
            ..
        } => format!(
            "{} Pipeline ({}) {}: {}",
            CROSS,
            style(short_id(execution_id)).dim(),
            style("failed").red(),
            message
        ),
    }
}

/// Render a JSON value for humans: strings and `{"value": ...}` unwrapped
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) if map.len() == 1 && map.contains_key("value") => {
            map.get("value").map(format_value).unwrap_or_default()
        }
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Format node output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Print the details of one execution record
pub fn print_record_details(record: &ExecutionRecord, verbose: bool) -> anyhow::Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(record.id).cyan());
    println!(
        "  Pipeline: {} ({})",
        style(&record.pipeline_name).bold(),
        style(&record.pipeline_id).dim()
    );
    println!("  Status: {}", format_status(record.status));
    println!("  Started: {}", style(record.start_time.to_rfc3339()).dim());
    if let Some(end) = record.end_time {
        println!("  Finished: {}", style(end.to_rfc3339()).dim());
        if let Ok(duration) = end.signed_duration_since(record.start_time).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    if let Some(error) = &record.error {
        println!("  Error: {}", style(error).red());
    }

    println!("\n  {}", style("Nodes:").bold());
    for result in &record.node_results {
        println!(
            "    {} {} [{}] {}",
            format_node_status(result.status),
            style(&result.node_name).bold(),
            style(&result.node_type).dim(),
            style(format_duration(Duration::from_millis(result.metadata.duration_ms))).dim()
        );
    }

    if let Some(output) = &record.final_output {
        println!("\n  {}", style("Final output:").bold());
        for line in format_output(&format_value(output), 20).lines() {
            println!("    {}", line);
        }
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(record)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

/// Print a preview result as a numbered path
pub fn print_preview(result: &PreviewResult) {
    for (i, step) in result.execution_path.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            style(&step.node_id).bold(),
            format_node_status(step.status)
        );
        if step.status == NodeStatus::Success {
            for line in format_output(&format_value(&step.output), 5).lines() {
                println!("       {}", style(line).dim());
            }
        }
    }

    match &result.error {
        Some(error) => println!("\n{} Preview stopped: {}", CROSS, style(error).red()),
        None => println!("\n{} Output:\n{}", CHECK, format_value(&result.output)),
    }
}
