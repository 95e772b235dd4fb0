use agentflow::cli::commands::{HistoryCommand, LlmArgs, PreviewCommand, RunCommand, ValidateCommand};
use agentflow::cli::output::*;
use agentflow::cli::terminal_output::TerminalProgress;
use agentflow::cli::{Cli, Command};
use agentflow::core::config::{EngineSettings, PipelineConfig};
use agentflow::execution::{preview, ExecutionEngine, NodeExecutorRegistry};
use agentflow::llm::{CommandLlmProvider, EchoLlmProvider, LlmProvider};
use agentflow::persistence::{ExecutionRecordStore, InMemoryRecordStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Preview(cmd) => preview_pipeline(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_config(file: &str) -> Result<PipelineConfig> {
    PipelineConfig::from_file(file).context("Failed to load pipeline config")
}

fn llm_provider(args: &LlmArgs) -> Arc<dyn LlmProvider> {
    if args.echo_llm {
        Arc::new(EchoLlmProvider)
    } else {
        Arc::new(CommandLlmProvider::new(args.client_config()))
    }
}

fn build_registry(config: &PipelineConfig, settings: &EngineSettings, llm: &LlmArgs) -> NodeExecutorRegistry {
    NodeExecutorRegistry::with_defaults(
        settings.simulated_delay(),
        Arc::new(config.template_store()),
        llm_provider(llm),
    )
}

#[cfg(feature = "sqlite")]
async fn open_store(ephemeral: bool) -> Result<Arc<dyn ExecutionRecordStore>> {
    if ephemeral {
        return Ok(Arc::new(InMemoryRecordStore::new()));
    }
    let store = agentflow::persistence::SqliteRecordStore::with_default_path().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(ephemeral: bool) -> Result<Arc<dyn ExecutionRecordStore>> {
    if !ephemeral {
        tracing::warn!("Built without sqlite support; history is kept in memory only");
    }
    Ok(Arc::new(InMemoryRecordStore::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let input = cmd.input.value().map_err(anyhow::Error::msg)?;

    // CLI flags override file settings
    let mut settings = config.settings.clone();
    if let Some(limit) = cmd.max_concurrency {
        settings.max_concurrency = Some(limit);
    }
    if let Some(delay_ms) = cmd.delay_ms {
        settings.simulated_delay_ms = delay_ms;
    }

    let pipeline = config.to_pipeline();
    let registry = build_registry(&config, &settings, &cmd.llm);
    let store = open_store(cmd.no_history).await?;
    let engine = ExecutionEngine::new(registry, store).with_settings(&settings);

    let view = TerminalProgress::new(pipeline.nodes.len(), cmd.show_output);
    engine.add_event_handler(move |event| view.handle(&event));

    println!();
    match engine.execute(&pipeline, input).await {
        Ok(run) => {
            println!("\n{} Final output:", CHECK);
            println!("{}", format_value(&run.final_output));
            if !cmd.no_history {
                println!(
                    "\n{} Execution saved to history (ID: {})",
                    INFO,
                    style(run.execution_id).dim()
                );
            }
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let config = match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Could not load pipeline:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let result = config.validate();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.is_valid {
        println!("{} {}", CHECK, result.message);
        println!("  Name: {}", style(&config.name).bold());
        if let Some(version) = &config.version {
            println!("  Version: {}", style(version).cyan());
        }
        println!("  Nodes: {}", style(config.nodes.len()).cyan());
        println!("  Edges: {}", style(config.edges.len()).cyan());
        println!("  Templates: {}", style(config.templates.len()).cyan());
    } else {
        println!("{} Validation failed:", CROSS);
        println!("  {}", style(&result.message).red());
    }

    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn preview_pipeline(cmd: &PreviewCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let input = cmd.input.value().map_err(anyhow::Error::msg)?;

    let mut settings = config.settings.clone();
    if let Some(delay_ms) = cmd.delay_ms {
        settings.simulated_delay_ms = delay_ms;
    }

    let pipeline = config.to_pipeline();
    let registry = build_registry(&config, &settings, &cmd.llm);
    let result = preview(&pipeline, &registry, input).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{} Preview of {}:", INFO, style(&pipeline.name).bold());
        print_preview(&result);
    }

    if !result.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(false).await?;

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.find_by_id(exec_id).await? {
            Some(record) if cmd.json => println!("{}", serde_json::to_string_pretty(&record)?),
            Some(record) => print_record_details(&record, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let records = match &cmd.pipeline {
        Some(pipeline_id) => store.find_by_pipeline_id(pipeline_id).await?,
        None => store.find_all().await?,
    };
    let records: Vec<_> = records.into_iter().take(cmd.limit).collect();

    if cmd.json {
        let data = serde_json::json!({ "executions": records });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for record in &records {
        println!("  {}", format_record_summary(record));
    }

    Ok(())
}
