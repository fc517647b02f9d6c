use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_service::api::{self, AppState};
use chat_service::config::Config;

#[derive(Parser, Debug)]
#[command(name = "chat-service")]
#[command(about = "Chat orchestrator bridging a local LLM endpoint and the operations service")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "CHAT_PORT", default_value = "8081")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "CHAT_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Base URL of the Ollama endpoint
    #[arg(long, env = "CHAT_OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    ollama_base_url: String,

    /// Default model name
    #[arg(long, env = "CHAT_DEFAULT_MODEL", default_value = "llama3.2")]
    default_model: String,

    /// Sampling temperature
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    temperature: f64,

    /// Token cap per model call
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1000")]
    max_tokens: u32,

    /// Base URL of the operations service
    #[arg(long, env = "CHAT_MCP_BASE_URL", default_value = "http://localhost:8080")]
    mcp_base_url: String,

    /// Per tool-call timeout, in seconds
    #[arg(long, env = "CHAT_TOOL_TIMEOUT_SECS", default_value = "30")]
    tool_timeout_secs: u64,

    /// Retries per tool call on transport failures
    #[arg(long, env = "CHAT_MAX_RETRIES", default_value = "3")]
    max_retries: u32,

    /// Delay between retries, in seconds
    #[arg(long, env = "CHAT_RETRY_DELAY_SECS", default_value = "1")]
    retry_delay_secs: u64,

    /// Master switch for tool use
    #[arg(
        long,
        env = "CHAT_TOOLS_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    tools_enabled: bool,

    /// Upper bound on tool calls per turn
    #[arg(long, env = "CHAT_MAX_CALLS_PER_TURN", default_value = "5")]
    max_calls_per_turn: usize,

    /// Override the caller's home directory (defaults to $HOME)
    #[arg(long, env = "CHAT_HOME_DIR")]
    home_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, env = "CHAT_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            ollama_base_url: self.ollama_base_url,
            default_model: self.default_model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            mcp_base_url: self.mcp_base_url,
            tool_timeout_secs: self.tool_timeout_secs,
            max_retries: self.max_retries,
            retry_delay_secs: self.retry_delay_secs,
            tools_enabled: self.tools_enabled,
            max_calls_per_turn: self.max_calls_per_turn,
            home_dir: self.home_dir,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "chat_service=debug,tower_http=debug"
    } else {
        "chat_service=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind = cli.bind.clone();
    let port = cli.port;
    let state = AppState::new(cli.into_config())?;
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("Starting chat service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
