use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// A player's accumulated score for the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub player: Player,
    pub score: i32,
}

/// In-memory per-round score accumulator. Entries appear on the first score
/// event for a player and only disappear on a full clear.
#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    entries: HashMap<PlayerId, LedgerEntry>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the player's total and return the new total.
    pub fn record(&mut self, player: &Player, delta: i32) -> i32 {
        let entry = self
            .entries
            .entry(player.id)
            .or_insert_with(|| LedgerEntry {
                player: player.clone(),
                score: 0,
            });
        entry.score = entry.score.saturating_add(delta);
        entry.score
    }

    pub fn score_of(&self, player_id: PlayerId) -> Option<i32> {
        self.entries.get(&player_id).map(|e| e.score)
    }

    /// All entries, sorted by player id for stable iteration.
    pub fn entries(&self) -> Vec<&LedgerEntry> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.player.id);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Players sharing the highest score among entries accepted by `eligible`.
    ///
    /// A round cannot be won with a negative score: when every eligible total
    /// is below zero nobody wins.
    pub fn winners(&self, eligible: impl Fn(&LedgerEntry) -> bool) -> Vec<Player> {
        let candidates: Vec<&LedgerEntry> = self
            .entries()
            .into_iter()
            .filter(|e| eligible(*e))
            .collect();
        let Some(best) = candidates.iter().map(|e| e.score).max() else {
            return Vec::new();
        };
        if best < 0 {
            return Vec::new();
        }
        candidates
            .into_iter()
            .filter(|e| e.score == best)
            .map(|e| e.player.clone())
            .collect()
    }
}
