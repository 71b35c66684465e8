use tracing_subscriber::EnvFilter;

use bubblepop_server::build_app;
use bubblepop_server::config::ServerConfig;
use bubblepop_server::round_loop::RoundCommand;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let addr = config.listen_addr.clone();
    let (app, state, round_loop) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        },
    };
    tracing::info!("Bubblepop server listening on {addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
        }
        tracing::info!("Shutdown requested");
    });
    if let Err(e) = serve.await {
        tracing::error!("Server error: {e}");
    }

    // Finalize any running round before exiting.
    state.send(RoundCommand::Stop).await;
    if let Err(e) = round_loop.await {
        tracing::error!("Round loop task failed: {e}");
    }
    tracing::info!("Bubblepop server stopped");
}
