use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use divergent_flow::{
    api::{self, middleware::CorsPolicy, AppState},
    app::{build_dispatcher, Services},
    config::{ServerConfig, StoreKind},
};

#[derive(Parser)]
#[command(name = "dflow")]
#[command(about = "Capture short notes, classify them, and review them later")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Primary store, overrides DFLOW_STORE
        #[arg(long, value_enum)]
        store: Option<StoreKind>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "divergent_flow=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}

async fn serve(host: String, port: u16, store: Option<StoreKind>) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(store) = store {
        config.store = store;
    }
    tracing::info!(
        environment = config.environment.as_str(),
        store = ?config.store,
        "Starting Divergent Flow"
    );

    let services = Services::from_config(&config)?;
    let dispatcher = build_dispatcher(&services)?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(dispatcher).with_shutdown(shutdown.clone());
    let app = api::create_router(state, CorsPolicy::new(&config.cors_origins).layer());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Divergent Flow listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    services.projector.flush().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, host, store }) => serve(host, port, store).await,
        None => serve("127.0.0.1".to_string(), 5000, None).await,
    }
}
