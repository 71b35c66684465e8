pub mod api;
pub mod board;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod health;
pub mod leaderboard;
pub mod round_loop;
pub mod spawn;
pub mod state;
pub mod store;
pub mod surfaces;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config, starting the
/// round loop. The returned handle completes once the loop has stopped.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState, JoinHandle<()>) {
    let (state, round_loop) = AppState::new(config);

    let api_routes = Router::new()
        .route("/status", get(api::get_status))
        .route("/leaderboards", get(api::list_leaderboards))
        .route("/leaderboards/{board}", get(api::get_leaderboard))
        .route("/players/{player_id}/binding", get(api::get_binding))
        .route("/players/{player_id}/stats", get(api::get_stats));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state, round_loop)
}
