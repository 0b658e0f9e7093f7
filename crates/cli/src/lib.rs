use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use watchdog_collector::{ContextCollector, RunConfig, SystemRunner};
use watchdog_protocol::Workdir;

mod channel;
mod extract;
mod report;
mod turns;
mod validate;

#[derive(Parser)]
#[command(name = "watchdog")]
#[command(about = "Collects CI failure context and extracts the analysis verdict", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Working directory for artifacts (overrides WATCHDOG_DIR)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gh availability and the agent credential; export warnings
    Validate,

    /// Collect permissions, related issues/PRs, run history and test outputs
    Collect,

    /// Render the context document from collected artifacts
    Render(RenderArgs),

    /// Collect, then render
    Prepare(RenderArgs),

    /// Parse the agent's result and telemetry into step outputs
    Extract,

    /// Compute the agent's turn budget from feature flags
    MaxTurns,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Character budget for the context document (overrides WATCHDOG_MAX_CONTEXT_CHARS)
    #[arg(long)]
    max_chars: Option<usize>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RunConfig::from_env();
    if let Some(dir) = &cli.workdir {
        config = config.with_workdir(Workdir::new(dir));
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose || config.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Validate => run_validate(&config).await?,
        Commands::Collect => run_collect(&config).await,
        Commands::Render(args) => run_render(&apply_render_args(config, &args)).await?,
        Commands::Prepare(args) => {
            let config = apply_render_args(config, &args);
            run_collect(&config).await;
            run_render(&config).await?;
        }
        Commands::Extract => run_extract(&config).await?,
        Commands::MaxTurns => run_max_turns(&config)?,
    }

    Ok(())
}

fn apply_render_args(mut config: RunConfig, args: &RenderArgs) -> RunConfig {
    if let Some(max_chars) = args.max_chars {
        config.max_context_chars = max_chars;
    }
    config
}

async fn run_validate(config: &RunConfig) -> Result<()> {
    let runner = SystemRunner::new(config.command_timeout);
    validate::validate(config, &runner)
        .await
        .context("Preflight validation failed")?;
    Ok(())
}

async fn run_collect(config: &RunConfig) {
    let runner = SystemRunner::new(config.command_timeout);
    ContextCollector::new(config, &runner).collect().await;
}

async fn run_render(config: &RunConfig) -> Result<()> {
    report::write_context_document(config).await?;
    Ok(())
}

async fn run_extract(config: &RunConfig) -> Result<()> {
    let record = extract::build_record(config).await;
    channel::write_outputs(config.output_file.as_deref(), &record)
        .context("Failed to write step outputs")?;
    log::info!(
        "Outputs set: severity={}, action_taken={}",
        record.severity,
        record.action_taken
    );
    Ok(())
}

fn run_max_turns(config: &RunConfig) -> Result<()> {
    let turns = turns::max_turns(&config.features);
    log::info!("Dynamic max turns: {turns}");
    channel::export_env(
        config.env_file.as_deref(),
        "DYNAMIC_MAX_TURNS",
        &turns.to_string(),
    )
    .context("Failed to export DYNAMIC_MAX_TURNS")?;
    println!("{turns}");
    Ok(())
}
