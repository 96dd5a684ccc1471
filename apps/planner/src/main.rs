use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpOptimizerService, LifecycleState, OptimizerSession, ToggleOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod interactive;
mod render;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "planner", about = "Pick menu items and ask the optimizer for the cheapest plan")]
struct Args {
    /// Optimizer service base URL; overrides config file and environment.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Config file to read instead of ./planner.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the menu.
    Menu,
    /// Select the given items, optimize once and print the result.
    Optimize {
        #[arg(long = "item", required = true)]
        items: Vec<String>,
    },
    /// Read commands from stdin.
    Interactive,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.base_url = server_url;
    }
    init_tracing(&settings);

    let service = HttpOptimizerService::with_timeout(&settings.base_url, settings.request_timeout())
        .with_context(|| format!("cannot use optimizer service '{}'", settings.base_url))?;
    info!(base_url = service.base_url(), "planner: optimizer service configured");
    let session = OptimizerSession::new(Arc::new(service));

    match args.command {
        Command::Menu => run_menu(&session).await,
        Command::Optimize { items } => run_optimize(&session, &items).await,
        Command::Interactive => {
            interactive::run(session).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_menu(session: &Arc<OptimizerSession>) -> Result<ExitCode> {
    let loaded = session.load_catalog().await;
    print!("{}", render::render_catalog(&session.current_view().await));
    Ok(if loaded.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_optimize(session: &Arc<OptimizerSession>, items: &[String]) -> Result<ExitCode> {
    session
        .load_catalog()
        .await
        .context("failed to load the menu")?;

    for item in items {
        let already_selected = session
            .selected_items()
            .await
            .iter()
            .any(|id| id.as_str() == item);
        if already_selected {
            continue;
        }
        if session.toggle(item).await? == ToggleOutcome::UnknownItem {
            let view = session.current_view().await;
            let offered: Vec<_> = view.items.iter().map(|item| item.name.as_str()).collect();
            bail!("'{item}' is not on the menu (offered: {})", offered.join(", "));
        }
    }

    session.submit().await?;
    session.settle().await;

    print!("{}", render::render_view(&session.current_view().await));
    Ok(match session.state().await {
        LifecycleState::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
