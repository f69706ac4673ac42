use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backlog_forge::config::Config;
use backlog_forge::orchestrator::OrchestratorSettings;
use backlog_forge::registry::ProjectRegistry;
use backlog_forge::sandbox::LocalSandboxProvider;
use backlog_forge::{api, db, mcp};

#[derive(Parser)]
#[command(name = "bforge")]
#[command(about = "Plan and build apps in per-project sandboxes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API (defaults to BACKLOG_FORGE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Start MCP server via stdio
    Mcp,
    /// List registered projects
    Projects,
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "backlog_forge=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // MCP mode: log to stderr so stdout is clean for protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_registry(config: &Config) -> anyhow::Result<ProjectRegistry> {
    let db = db::Database::open(config.database_path())?;
    db.migrate()?;

    let provider = Arc::new(LocalSandboxProvider::new(&config.sandbox_root));
    Ok(ProjectRegistry::new(
        db,
        provider,
        OrchestratorSettings::from_config(config),
    ))
}

async fn serve(config: &Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Backlog Forge server on port {}", port);

    let registry = open_registry(config)?;
    let app = api::create_router(registry);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Backlog Forge listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // MCP mode needs stderr for logging since stdout is the protocol channel
    let use_stderr = matches!(cli.command, Some(Commands::Mcp));
    init_tracing(use_stderr);

    let config = Config::from_env()?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            serve(&config, port.unwrap_or(config.port)).await?;
        }
        Some(Commands::Mcp) => {
            let registry = open_registry(&config)?;
            mcp::run_stdio_server(registry).await?;
        }
        Some(Commands::Projects) => {
            let registry = open_registry(&config)?;
            for project in registry.list_projects()? {
                println!(
                    "{}\t{}\t{}",
                    project.identifier,
                    project.display_name,
                    project.created_at.to_rfc3339()
                );
            }
        }
        None => {
            serve(&config, config.port).await?;
        }
    }

    Ok(())
}
