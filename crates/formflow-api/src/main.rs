//! Formflow CLI entry point.
//!
//! Binary name: `formflow`
//!
//! Parses CLI arguments, loads config, initializes the database and services,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use formflow_infra::config::load_global_config;
use formflow_infra::filesystem::resolve_data_dir;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "formflow", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_global_config(&data_dir).await;

    let filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => config.log_filter.clone().unwrap_or_else(|| "warn".to_string()),
        1 => "info,formflow_core=debug,formflow_infra=debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let state = AppState::init(&data_dir, &config).await?;
    let editor = cli.editor_id();

    match cli.command {
        Commands::Workflow { action } => {
            cli::workflow::handle_workflow_command(action, &state, editor, cli.json).await?;
        }
        Commands::Question { action } => {
            cli::question::handle_question_command(action, &state, cli.json).await?;
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
