//! CLI output formatting

use crate::{
    core::{Event, ExecutionStatus, PipelineResult, RunOutcome, RunStatus},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static STOP: Emoji<'_, '_> = Emoji("⛔ ", "- ");

/// Progress bar over run configurations
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule as wide as the terminal
pub fn separator() -> String {
    let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80).min(120);
    style("─".repeat(width)).dim().to_string()
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("SUCCEEDED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One line per run configuration, naming the failing step
pub fn format_run_outcome(outcome: &RunOutcome) -> String {
    match &outcome.status {
        RunStatus::Succeeded => format!(
            "{} {} {}",
            CHECK,
            style(&outcome.run).bold(),
            style(format!("{} steps", outcome.steps.len())).dim()
        ),
        RunStatus::Failed { step_id, error, .. } => format!(
            "{} {} failed at {}: {}",
            CROSS,
            style(&outcome.run).bold(),
            style(step_id).red(),
            style(error).dim()
        ),
        RunStatus::Aborted { reason } => format!(
            "{} {} aborted: {}",
            STOP,
            style(&outcome.run).bold(),
            style(reason).yellow()
        ),
    }
}

/// Final report for a pipeline result
pub fn format_pipeline_result(result: &PipelineResult) -> String {
    let mut lines = vec![separator()];
    lines.extend(result.outcomes.iter().map(format_run_outcome));
    lines.push(separator());

    let failed = result.failures().len();
    let summary = if failed == 0 {
        format!(
            "{} {} {} ({} run configurations)",
            CHECK,
            style(&result.pipeline_name).bold(),
            style("succeeded").green(),
            result.outcomes.len()
        )
    } else {
        format!(
            "{} {} {} ({} of {} run configurations failed)",
            CROSS,
            style(&result.pipeline_name).bold(),
            style("failed").red(),
            failed,
            result.outcomes.len()
        )
    };
    lines.push(summary);
    lines.join("\n")
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
    };

    format!(
        "{} {} - {} - {} ({}/{} runs failed) - {}",
        status_icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.failed_runs,
        summary.total_runs,
        style(summary.event.as_deref().unwrap_or("forced")).cyan()
    )
}

/// Format an execution event for display
///
/// Returns `None` for events that only matter to the progress bar.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_runs,
        } => Some(format!(
            "{} Starting pipeline {} ({}) with {} run configurations",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim(),
            style(total_runs).cyan()
        )),
        ExecutionEvent::RunStarted { .. } | ExecutionEvent::WorkspaceReady { .. } => None,
        ExecutionEvent::StepStarted {
            run_index, step_id, ..
        } => Some(format!(
            "{} #{} {}",
            SPINNER,
            run_index + 1,
            style(step_id).cyan()
        )),
        ExecutionEvent::StepSucceeded {
            run_index, step_id, ..
        } => Some(format!(
            "{} #{} {}",
            CHECK,
            run_index + 1,
            style(step_id).green()
        )),
        ExecutionEvent::StepFailed {
            run_index,
            step_id,
            error,
            output,
        } => {
            let mut line = format!(
                "{} #{} {}: {}",
                CROSS,
                run_index + 1,
                style(step_id).red(),
                style(error).dim()
            );
            if !output.is_empty() {
                line.push('\n');
                line.push_str(&format_output(output, 10));
            }
            Some(line)
        }
        ExecutionEvent::RunFinished { run, status } => Some(match status {
            RunStatus::Succeeded => format!("{} {} {}", CHECK, style(run).bold(), style("succeeded").green()),
            RunStatus::Failed { step_id, .. } => format!(
                "{} {} failed at {}",
                CROSS,
                style(run).bold(),
                style(step_id).red()
            ),
            RunStatus::Aborted { reason } => {
                format!("{} {} aborted: {}", STOP, style(run).bold(), reason)
            }
        }),
        ExecutionEvent::PipelineCompleted { .. } => None,
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{}... ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            truncated
        )
    }
}

/// Notice for an event no trigger admits
pub fn format_discarded_event(event: &Event, json: bool) -> String {
    if json {
        serde_json::json!({ "discarded": true, "event": event.to_string() }).to_string()
    } else {
        format!(
            "{} Event {} does not match any trigger, nothing to run",
            INFO,
            style(event).cyan()
        )
    }
}
