use std::sync::{Arc, PoisonError, RwLock};

use bubblepop_core::lanes::{LaneId, LaneOwner};
use bubblepop_core::services::{DisplaySurface, OwnershipService};

/// Countdown sign text, as last set by the round.
#[derive(Debug, Clone, Default)]
pub struct TimerDisplay {
    text: Arc<RwLock<Option<String>>>,
}

impl TimerDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<String> {
        self.text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DisplaySurface for TimerDisplay {
    fn set_text(&mut self, text: &str) {
        *self.text.write().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
    }

    fn clear(&mut self) {
        *self.text.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Current simulation owner of every lane entity.
#[derive(Debug, Clone)]
pub struct LaneTable {
    owners: Arc<RwLock<Vec<LaneOwner>>>,
}

impl LaneTable {
    pub fn new(lane_count: usize) -> Self {
        Self {
            owners: Arc::new(RwLock::new(vec![LaneOwner::Server; lane_count])),
        }
    }

    pub fn owners(&self) -> Vec<LaneOwner> {
        self.owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OwnershipService for LaneTable {
    fn set_owner(&mut self, lane: LaneId, owner: LaneOwner) {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        if lane >= owners.len() {
            owners.resize(lane + 1, LaneOwner::Server);
        }
        owners[lane] = owner;
        tracing::debug!(lane, ?owner, "Lane ownership transferred");
    }
}
