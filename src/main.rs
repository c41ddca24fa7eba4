use matrixci::actions::ActionRegistry;
use matrixci::cli::commands::{HistoryCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand};
use matrixci::cli::output::*;
use matrixci::cli::{Cli, Command};
use matrixci::core::{config::PipelineConfig, Event, ExecutionStatus};
use matrixci::execution::{ExecutionEngine, ExecutionEvent};
use matrixci::persistence::{create_summary, ExecutionSummary, PersistenceBackend};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        matrixci::persistence::SqliteExecutionStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(matrixci::persistence::InMemoryPersistence::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let succeeded = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Matrix(cmd) => show_matrix(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let mut pipeline = config.to_pipeline()?;

    if !cmd.json {
        println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());
    }

    for (key, value) in &cmd.var {
        pipeline.variables.insert(key.clone(), value.clone());
        if !cmd.json {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    let event = Event::new(cmd.event.into(), cmd.branch.clone());
    if !cmd.force && !pipeline.admits(&event) {
        println!("{}", format_discarded_event(&event, cmd.json));
        return Ok(true);
    }

    let mut engine = ExecutionEngine::new(ActionRegistry::with_builtins(), cmd.scheduling_strategy());
    if let Some(root) = &cmd.workspace_root {
        engine = engine.with_workspace_root(root);
    }

    if !cmd.json {
        let progress = create_progress_bar(pipeline.configurations().len());
        engine
            .add_event_handler(move |event| {
                if let ExecutionEvent::RunFinished { run, .. } = &event {
                    progress.inc(1);
                    progress.set_message(run.label());
                }
                if let ExecutionEvent::PipelineCompleted { .. } = &event {
                    progress.finish_and_clear();
                }
                if let Some(line) = format_execution_event(&event) {
                    progress.println(line);
                }
            })
            .await;
    }

    let event = if cmd.force { None } else { Some(event) };
    let result = engine
        .execute(Arc::new(pipeline), event)
        .await
        .context("Pipeline rejected before any run started")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("\n{}", format_pipeline_result(&result));
    }

    if !cmd.no_history {
        let store = open_store().await?;
        let summary = create_summary(&result);
        store.save_execution(&summary).await?;
        if !cmd.json {
            println!(
                "{} Execution saved to history (ID: {})",
                INFO,
                style(&summary.execution_id.to_string()[..8]).dim()
            );
        }
    }

    Ok(result.succeeded())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<bool> {
    let result = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let pipeline = config.to_pipeline()?;
        ActionRegistry::with_builtins().check(&pipeline)?;
        Ok((config, pipeline))
    });

    match result {
        Ok((config, pipeline)) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(true);
            }
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&pipeline.name).bold());
            println!("  Steps: {}", style(pipeline.steps.len()).cyan());
            println!("  Run configurations: {}", style(pipeline.configurations().len()).cyan());
            println!("  Triggers: {}", style(pipeline.triggers.rules().len()).cyan());
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            Ok(false)
        }
    }
}

fn show_matrix(cmd: &MatrixCommand) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline()?;
    let configurations = pipeline.configurations();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(configurations)?);
    } else {
        println!(
            "{} {} run configurations for {}:",
            INFO,
            style(configurations.len()).cyan(),
            style(&pipeline.name).bold()
        );
        for run in configurations {
            println!("  {}", run);
        }
    }

    Ok(true)
}

async fn list_pipelines(cmd: &ListCommand) -> Result<bool> {
    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let executions = store.list_executions(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "execution_count": executions.len()
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(true);
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        if cmd.with_counts {
            let executions = store.list_executions(pipeline_name).await?;
            let succeeded = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Completed)
                .count();
            let failed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    Ok(true)
}

async fn show_history(cmd: &HistoryCommand) -> Result<bool> {
    let store = open_store().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose || cmd.json)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(true);
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all.extend(store.list_executions(&pipeline).await?);
            }
            all
        }
    };
    executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    executions.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(true);
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
        if cmd.verbose {
            for failure in &summary.failures {
                println!("      {}", style(failure).dim());
            }
        }
    }

    Ok(true)
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Event: {}", summary.event.as_deref().unwrap_or("forced"));
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Run configurations: {} ({} failed)",
        summary.total_runs, summary.failed_runs
    );
    for failure in &summary.failures {
        println!("    {} {}", CROSS, failure);
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
