//! tock-server: timer scheduling service.
//!
//! Serves the timer API, consumes module lifecycle events from the
//! in-process queue, and fires timer callbacks from the local engine.

use clap::Parser;
use tracing::info;

use tock_server::{build_router, App, StoreChoice};

// ── CLI ─────────────────────────────────────────────────────────────

/// Timer scheduling service.
#[derive(Parser, Debug)]
#[command(name = "tock-server", version, about)]
struct Cli {
    /// Timer store backend.
    #[arg(long, env = "TOCK_STORE", value_enum, default_value_t = StoreChoice::Auto)]
    store: StoreChoice,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Skip re-registering stored timers at start.
    #[arg(long, env = "TOCK_SKIP_REBUILD", default_value_t = false)]
    skip_rebuild: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tock_core::config::load_dotenv();
    let mut config = tock_core::Config::from_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.log_summary();

    let mut app = App::build(&config, cli.store).await?;
    if !cli.skip_rebuild {
        app.rebuild_triggers().await?;
    }
    let listener_task = app.spawn_listener();

    let router = build_router(app.state.clone(), &config.server.cors_origin);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;

    if let Some(task) = listener_task {
        task.abort();
    }
    app.state.engine.shutdown().await;
    info!("tock-server exited cleanly");

    Ok(())
}
