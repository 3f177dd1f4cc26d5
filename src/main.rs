use chat_relay::config::config_search_paths;
use chat_relay::{build_router, AppState, RelayConfig, SharedLogger, UpstreamClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "chat-relay",
    about = "Streaming chat relay for OpenAI-compatible providers",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = "chat-relay.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal; real environment variables still apply.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(port) = cli.port {
        config.port = port;
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    // Validate config eagerly
    let base_url = config.effective_base_url()?;
    let api_key = config.resolve_api_key()?;

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let upstream = UpstreamClient::from_config(&config, api_key, client)?;

    if config.chat.enable_thinking && config.effective_thinking_extension()?.is_none() {
        warn!(
            provider = %config.provider.name,
            "Thinking is on by default but this provider has no thinking extension configured"
        );
    }

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Provider:  {}", config.provider.name);
    info!("  Base URL:  {}", base_url);
    info!("  Model:     {}", config.provider.model);
    info!("  Thinking:  {} (default)", config.chat.enable_thinking);
    info!("  Deadline:  {}s", config.chat.timeout_secs);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting chat-relay provider={} base_url={} model={} port={}",
            config.provider.name, base_url, config.provider.model, config.port
        ),
    );

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        upstream: Arc::new(upstream),
        logger,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
