use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use bubblepop_core::bindings::ClientBinding;
use bubblepop_core::player::PlayerId;
use bubblepop_core::round::RoundStatus;

use crate::error::AppError;
use crate::leaderboard::LeaderboardEntry;
use crate::state::AppState;
use crate::store::PlayerStats;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: RoundStatus,
    pub round_id: Option<String>,
    pub time_remaining: Option<u32>,
    pub roster: Vec<RosterEntry>,
    pub live_bubbles: usize,
    pub lanes_held: usize,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub name: String,
}

/// GET /api/v1/status: current round and who is in the world.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.snapshot.borrow().clone();
    Json(StatusResponse {
        status: snapshot.status,
        round_id: snapshot.round_id,
        time_remaining: snapshot.time_remaining,
        roster: snapshot
            .roster
            .into_iter()
            .map(|p| RosterEntry {
                player_id: p.id,
                name: p.name,
            })
            .collect(),
        live_bubbles: snapshot.live_bubbles,
        lanes_held: snapshot.lanes_held,
        connections: state.ws_connection_count.load(Ordering::Relaxed),
    })
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub board: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// GET /api/v1/leaderboards: names of boards that have been written.
pub async fn list_leaderboards(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.leaderboards.board_names())
}

/// GET /api/v1/leaderboards/{board}: ranked entries, best first.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    if limit == 0 || limit > MAX_LEADERBOARD_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LEADERBOARD_LIMIT}"
        )));
    }
    let entries = state
        .leaderboards
        .ranking(&board, limit)
        .ok_or_else(|| AppError::NotFound(format!("Leaderboard {board} not found")))?;
    Ok(Json(LeaderboardResponse { board, entries }))
}

/// GET /api/v1/players/{id}/binding: color name and score shown to the player.
pub async fn get_binding(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<ClientBinding>, AppError> {
    state
        .bindings
        .read()
        .await
        .get(player_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No binding for player {player_id}")))
}

/// GET /api/v1/players/{id}/stats: persisted lifetime stats.
pub async fn get_stats(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<PlayerStats>, AppError> {
    state
        .store
        .stats(player_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No stats for player {player_id}")))
}
