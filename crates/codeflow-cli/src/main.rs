use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use codeflow_ai::{LLMProvider, OllamaClient};
use codeflow_core::ConfigManager;
use codeflow_mcp::{find_workflow, workflows, DebugLogger, WorkflowParams};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod console;
mod context;
mod logging;
mod menu;
mod session;

use console::StdinInput;
use context::AppContext;

#[derive(Parser)]
#[command(
    name = "codeflow",
    version,
    author,
    about = "CodeFlow agent - chat with a local LLM and drive code-analysis tools over MCP",
    long_about = "CodeFlow streams chat with a local Ollama model and exposes the tools, prompts and workflows of a code-analysis MCP server."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, global = true, help = "Also write logs to stderr")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "MCP server URL (overrides config)")]
    server_url: Option<String>,

    #[arg(long, global = true, help = "Ollama model name (overrides config)")]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat with menu access (default)")]
    Chat,

    #[command(about = "List the tools exposed by the MCP server")]
    Tools,

    #[command(about = "List the prompts exposed by the MCP server")]
    Prompts,

    #[command(about = "List the available workflows")]
    Workflows,

    #[command(about = "Run one workflow and print its JSON result")]
    Run {
        #[arg(help = "Workflow name")]
        workflow: String,

        #[arg(
            short,
            long = "param",
            value_name = "KEY=VALUE",
            value_parser = parse_param,
            help = "Workflow parameter (repeatable)"
        )]
        params: Vec<(String, String)>,
    },

    #[command(about = "Write a default configuration file")]
    InitConfig {
        #[arg(help = "Target path", default_value = ".codeflow.toml")]
        path: PathBuf,
    },
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    WorkflowParams::parse_pair(raw).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    match cli.command.take().unwrap_or(Commands::Chat) {
        Commands::InitConfig { path } => {
            ConfigManager::create_default_config(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote default configuration to".green(), path.display());
        }
        Commands::Chat => {
            let (ctx, _log_guard) = start(&cli)?;
            let mut input = StdinInput::new();
            session::run_repl(&ctx, &mut input).await;
        }
        Commands::Tools => {
            let (ctx, _log_guard) = start(&cli)?;
            list_tools(&ctx).await?;
        }
        Commands::Prompts => {
            let (ctx, _log_guard) = start(&cli)?;
            list_prompts(&ctx).await?;
        }
        Commands::Workflows => list_workflows(),
        Commands::Run { workflow, params } => {
            let (ctx, _log_guard) = start(&cli)?;
            run_workflow(&ctx, &workflow, params).await?;
        }
    }

    Ok(())
}

/// Load and validate configuration (CLI flags win over file and environment),
/// install logging and build the shared context. The guard keeps the log
/// writer alive.
fn start(cli: &Cli) -> Result<(AppContext, WorkerGuard)> {
    let mut config_mgr =
        ConfigManager::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = &cli.server_url {
        config_mgr.config_mut().mcp.server_url = url.clone();
    }
    if let Some(model) = &cli.model {
        config_mgr.config_mut().llm.model = model.clone();
    }
    ConfigManager::validate_config(config_mgr.config()).context("Invalid configuration")?;
    let config = config_mgr.config().clone();

    let log_guard = logging::init_logging(&config.logging, cli.verbose).with_context(|| {
        format!("Failed to set up logging in {}", config.logging.log_dir().display())
    })?;
    DebugLogger::init();

    info!(
        model = %config.llm.model,
        server = %config.mcp.server_url,
        transport = %config.mcp.transport,
        "Starting CodeFlow agent"
    );

    let llm: Arc<dyn LLMProvider> = Arc::new(OllamaClient::from_config(&config.llm));
    Ok((AppContext::new(config, llm), log_guard))
}

async fn list_tools(ctx: &AppContext) -> Result<()> {
    let server = ctx.server().await.context("Could not connect to the MCP server")?;
    let tools = server.list_tools().await.context("Could not retrieve tools")?;

    println!("{}", "Available tools:".bold());
    for (idx, tool) in tools.iter().enumerate() {
        println!(
            "{}. {} - {}",
            idx + 1,
            tool.name.cyan(),
            tool.description.as_deref().unwrap_or("")
        );
        for property in tool.property_names() {
            let marker = if tool.is_required(&property) { " (required)" } else { "" };
            println!("     {}{}", property, marker.yellow());
        }
    }
    Ok(())
}

async fn list_prompts(ctx: &AppContext) -> Result<()> {
    let server = ctx.server().await.context("Could not connect to the MCP server")?;
    let prompts = server.list_prompts().await.context("Could not retrieve prompts")?;

    println!("{}", "Available prompts:".bold());
    for (idx, prompt) in prompts.iter().enumerate() {
        println!(
            "{}. {} - {}",
            idx + 1,
            prompt.name.cyan(),
            prompt.description.as_deref().unwrap_or("")
        );
        for arg in &prompt.arguments {
            let marker = if arg.required { " (required)" } else { "" };
            println!("     {}{}", arg.name, marker.yellow());
        }
    }
    Ok(())
}

fn list_workflows() {
    println!("{}", "Available workflows:".bold());
    for (idx, workflow) in workflows().iter().enumerate() {
        println!(
            "{}. {} - {}",
            idx + 1,
            workflow.name.cyan(),
            workflow.description
        );
        println!("     params: {}", workflow.params.join(", "));
    }
}

async fn run_workflow(ctx: &AppContext, name: &str, params: Vec<(String, String)>) -> Result<()> {
    let workflow = find_workflow(name).ok_or_else(|| anyhow!("Unknown workflow: {}", name))?;
    let params: WorkflowParams = params.into_iter().collect();

    let tasks = ctx.tasks().await.context("Could not connect to the MCP server")?;
    let result = workflow.run(&tasks, &params).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
