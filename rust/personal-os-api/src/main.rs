//! Personal OS API - Main Entry Point

use clap::Parser;
use mimalloc::MiMalloc;

use personal_os_api::config::{AppConfig, ConfigValidator};
use personal_os_api::logging::init_tracing;
use personal_os_api::server::create_app;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments. Flags win over the config file and environment.
#[derive(Parser, Debug)]
#[command(name = "personal-os-api")]
#[command(about = "Personal OS API - reviews, goals, interviews, documents and insights")]
#[command(version)]
struct Args {
    /// Host to bind to.
    #[arg(long, env = "PERSONAL_OS_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PERSONAL_OS_PORT")]
    port: Option<u16>,

    /// Log level (`RUST_LOG` still takes precedence).
    #[arg(long, env = "PERSONAL_OS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Config file path.
    #[arg(short, long, env = "PERSONAL_OS_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_unchecked(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, config.logging.json);
    tracing::info!("Starting Personal OS API v{}", env!("CARGO_PKG_VERSION"));

    ConfigValidator::validate(&config)
        .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;
    tracing::info!("Configuration loaded");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let (app, state) = create_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Unsaved editor content is written before exit.
    let open = state.sessions.len();
    state.sessions.close_all().await;
    tracing::info!(flushed_sessions = open, "Server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed
/// never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
