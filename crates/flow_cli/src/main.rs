use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chat_core::{Config, ConversationTree, TreeHandle};
use clap::{Parser, Subcommand};
use colored::Colorize;
use flow_system::{
    FlowGraph, FlowManager, FlowRunner, FlowStatus, FlowStorage, JsonFileStorage, StepRegistry,
    StepServices,
};
use generation_queue::{EchoGenerationService, GenerationParams, GenerationQueue};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod render;

#[derive(Parser)]
#[command(name = "flowchat")]
#[command(about = "Validate, inspect and dry-run chat flows")]
#[command(version)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding flows and tree snapshots
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a flow file against the built-in step types
    Validate {
        /// Flow snapshot
        flow: PathBuf,
    },
    /// Print the active path of a tree snapshot
    ShowTree {
        /// Tree snapshot
        tree: PathBuf,
    },
    /// Run a flow with the local echo generator
    Run {
        /// Flow snapshot
        flow: PathBuf,
        /// Tree snapshot to start from (an empty conversation otherwise)
        #[arg(long)]
        tree: Option<PathBuf>,
        /// Store the flow and resulting tree in the data directory
        #[arg(long)]
        save: bool,
    },
    /// List flows stored in the data directory
    Flows,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_target(true).with_line_number(true).with_file(false))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::new(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }

    match cli.command {
        Commands::Validate { flow } => validate(&flow).await,
        Commands::ShowTree { tree } => show_tree(&tree).await,
        Commands::Run { flow, tree, save } => run_flow(&config, &flow, tree.as_deref(), save).await,
        Commands::Flows => list_flows(&config).await,
    }
}

async fn read_flow(path: &Path) -> Result<FlowGraph> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    FlowGraph::from_json(&json).with_context(|| format!("parsing flow {}", path.display()))
}

async fn read_tree(path: &Path) -> Result<ConversationTree> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    ConversationTree::from_json(&json).with_context(|| format!("parsing tree {}", path.display()))
}

async fn validate(path: &Path) -> Result<()> {
    let graph = read_flow(path).await?;
    let registry = StepRegistry::with_builtin_steps();
    graph.validate(&registry)?;
    let start = graph.start_step()?;
    println!(
        "{} {} ({} steps, {} connections), starts at {} [{}]",
        "ok".green().bold(),
        graph.name,
        graph.steps.len(),
        graph.connections.len(),
        start.id,
        start.step_type
    );
    Ok(())
}

async fn show_tree(path: &Path) -> Result<()> {
    let tree = read_tree(path).await?;
    print!("{}", render::active_path(&tree));
    Ok(())
}

async fn run_flow(config: &Config, flow: &Path, tree: Option<&Path>, save: bool) -> Result<()> {
    let graph = read_flow(flow).await?;
    let registry = Arc::new(StepRegistry::with_builtin_steps());
    graph.validate(&registry)?;

    let tree = match tree {
        Some(path) => read_tree(path).await?,
        None => ConversationTree::new(),
    };
    let tree = TreeHandle::new(tree);
    let queue = GenerationQueue::new(
        Arc::new(EchoGenerationService::default()),
        GenerationParams::from(config),
    );
    let runner = FlowRunner::new(
        tree.clone(),
        Arc::clone(&queue),
        registry,
        StepServices::default(),
        config,
    )
    .await;

    if let Err(e) = runner.start(graph.clone()).await {
        tracing::debug!("Flow halted during start: {}", e);
    }
    let _ = queue.when_idle().await.await;
    if runner.is_running().await {
        runner.stop("Nothing left to generate").await;
    }

    let view = runner.view().await;
    print!("{}", render::active_path(&*tree.lock().await));
    println!();
    match &view.status {
        FlowStatus::Idle => println!(
            "{} {}",
            "finished:".green().bold(),
            view.last_reason.as_deref().unwrap_or("")
        ),
        FlowStatus::Halted { reason, at } => {
            println!("{} {} ({})", "halted:".yellow().bold(), reason, at.to_rfc3339())
        }
        FlowStatus::Running => println!("{}", "running".cyan()),
    }
    println!("{} steps dispatched", view.history.len());

    if save {
        let storage = JsonFileStorage::new(config.data_dir());
        storage.save_flow(&graph).await?;
        storage.save_tree(&*tree.lock().await).await?;
        println!(
            "saved flow {} and tree {} to {}",
            graph.id,
            tree.id(),
            storage.base_path().display()
        );
    }
    Ok(())
}

async fn list_flows(config: &Config) -> Result<()> {
    let storage = Arc::new(JsonFileStorage::new(config.data_dir()));
    let mut manager = FlowManager::new(storage);
    if manager.load_all().await? == 0 {
        println!("no flows in {}", config.data_dir().display());
        return Ok(());
    }
    for flow in manager.list() {
        println!("{}  {} ({} steps)", flow.id, flow.name.bold(), flow.steps.len());
    }
    Ok(())
}
