use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::Notice;
use crate::player::PlayerId;

/// What a player's own UI shows: their color name and running score.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientBinding {
    pub color_name: Option<String>,
    pub score: i32,
}

/// Per-player UI bindings, fed from round notices.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bindings: HashMap<PlayerId, ClientBinding>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, notice: &Notice) {
        match notice {
            Notice::ColorAssigned { player_id, color } => {
                self.bindings.entry(*player_id).or_default().color_name =
                    Some(color.name().to_string());
            },
            Notice::ScoreChanged { player_id, total } => {
                self.bindings.entry(*player_id).or_default().score = *total;
            },
            Notice::RoundStarted { .. } => {
                for binding in self.bindings.values_mut() {
                    binding.score = 0;
                }
            },
            // Color assignments do not outlive the round; scores stay on show.
            Notice::RoundEnded { .. } => {
                for binding in self.bindings.values_mut() {
                    binding.color_name = None;
                }
            },
            Notice::TimeRemaining { .. } | Notice::ResetView => {},
        }
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&ClientBinding> {
        self.bindings.get(&player_id)
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<ClientBinding> {
        self.bindings.remove(&player_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
