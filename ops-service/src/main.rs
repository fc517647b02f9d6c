use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ops_service::api::{self, AppState};
use ops_service::config::Config;

#[derive(Parser, Debug)]
#[command(name = "ops-service")]
#[command(about = "Operations service exposing typed OS primitives over the MCP protocol")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "OPS_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "OPS_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Default command execution timeout, in seconds
    #[arg(long, env = "OPS_COMMAND_TIMEOUT_SECS", default_value = "300")]
    command_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long, env = "OPS_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ops_service=debug,tower_http=debug"
    } else {
        "ops_service=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config {
        command_timeout_secs: cli.command_timeout_secs,
        ..Config::default()
    };

    let state = AppState::new(config);
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting operations service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
