use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use bubblepop_core::player::{Player, PlayerId};
use bubblepop_core::services::LeaderboardService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Default)]
struct Board {
    lower_is_better: bool,
    scores: HashMap<PlayerId, (String, i64)>,
}

/// In-memory named leaderboards. Each write replaces the player's value.
#[derive(Debug, Clone, Default)]
pub struct Leaderboards {
    boards: Arc<RwLock<HashMap<String, Board>>>,
}

impl Leaderboards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranked entries of `board`, best first; ties break by player id.
    pub fn ranking(&self, board: &str, limit: usize) -> Option<Vec<LeaderboardEntry>> {
        let boards = self.boards.read().unwrap_or_else(PoisonError::into_inner);
        let board = boards.get(board)?;
        let mut rows: Vec<(PlayerId, &String, i64)> = board
            .scores
            .iter()
            .map(|(id, (name, value))| (*id, name, *value))
            .collect();
        rows.sort_by(|a, b| {
            let by_value = if board.lower_is_better {
                a.2.cmp(&b.2)
            } else {
                b.2.cmp(&a.2)
            };
            by_value.then(a.0.cmp(&b.0))
        });
        Some(
            rows.into_iter()
                .take(limit)
                .enumerate()
                .map(|(i, (player_id, name, value))| LeaderboardEntry {
                    rank: i + 1,
                    player_id,
                    name: name.clone(),
                    value,
                })
                .collect(),
        )
    }

    pub fn board_names(&self) -> Vec<String> {
        let boards = self.boards.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = boards.keys().cloned().collect();
        names.sort();
        names
    }
}

impl LeaderboardService for Leaderboards {
    fn set_score(&mut self, board: &str, player: &Player, value: i64, lower_is_better: bool) {
        let mut boards = self.boards.write().unwrap_or_else(PoisonError::into_inner);
        let entry = boards.entry(board.to_string()).or_default();
        entry.lower_is_better = lower_is_better;
        entry
            .scores
            .insert(player.id, (player.name.clone(), value));
        tracing::debug!(board, player_id = player.id, value, "Leaderboard updated");
    }
}
