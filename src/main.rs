mod cli;
mod commands;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use widget_deck::Error as DeckError;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(deck_error) = e.downcast_ref::<DeckError>() {
            eprintln!("Error: {}", deck_error);
            if let Some(suggestion) = deck_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    let is_tui = matches!(command, Commands::Tui);
    init_tracing(is_tui)?;

    match command {
        // ── Commands that need NO config ────────────────────────────
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Checksum { path } => commands::run_checksum(&path, &output::CliOutput),
        Commands::Validate { path, sha256 } => {
            // A config is optional here: without one the default roots apply
            let config = match cli.config {
                Some(config_path) => Some(commands::load_config(Some(config_path), cli.dev)?),
                None => commands::load_config(None, cli.dev).ok(),
            };
            commands::run_validate(config, cli.dev, path, sha256.as_deref(), &output::CliOutput)
        }

        // ── Commands that need config ───────────────────────────────
        Commands::Tui => commands::run_tui(cli.config, cli.dev).await,
        Commands::Run {
            widget,
            json,
            extended,
        } => {
            commands::run_widget(cli.config, cli.dev, &widget, json, extended, &output::CliOutput)
                .await
        }
        Commands::List { json } => {
            let config = commands::load_config(cli.config, cli.dev)?;
            commands::run_list(config, json, &output::CliOutput)
        }
    }
}

fn init_tracing(is_tui: bool) -> anyhow::Result<()> {
    if is_tui {
        // The dashboard owns the terminal, so logs go to a file
        let log_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("widget-deck");
        std::fs::create_dir_all(&log_dir)?;

        let log_path = log_dir.join("tui.log");
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
