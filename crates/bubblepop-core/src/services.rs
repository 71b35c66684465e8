//! Contracts of the platform services the round controller talks to.
//!
//! Every call is fire and forget: the controller never waits for or checks
//! an acknowledgement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bubble::{AssignData, BubbleClass};
use crate::lanes::{LaneId, LaneOwner};
use crate::player::Player;
use crate::spawner::{EntityId, SpawnGroup};

/// Persisted per-player variable names.
pub const POPS_VAR: &str = "pops";
pub const WINS_VAR: &str = "wins";
pub const PLAYERS_MET_VAR: &str = "players";

/// Leaderboard names.
pub const POPS_BOARD: &str = "MostPops";
pub const WINS_BOARD: &str = "MostWins";
pub const SOCIAL_BOARD: &str = "MostSocial";

/// Asynchronous creation request for one bubble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub request_id: u64,
    /// Round generation that issued the request.
    pub generation: u64,
    pub class: BubbleClass,
    pub position: [f32; 3],
}

/// Result of a resolved [`SpawnRequest`].
#[derive(Debug)]
pub struct SpawnCompletion {
    pub request: SpawnRequest,
    pub entities: Vec<EntityId>,
    pub group: Box<dyn SpawnGroup>,
}

/// Issues asynchronous object creation. The completion is fed back to the
/// controller as a separate event; a failed creation is simply never fed
/// back.
pub trait SpawnService: Send {
    fn request(&mut self, request: SpawnRequest);
}

/// Delivers data to the behavior of a spawned bubble.
pub trait BubbleSink: Send {
    fn assign(&mut self, entity: EntityId, data: AssignData);
}

/// Player-keyed persistent key/value store. Last write wins.
pub trait PersistenceStore: Send {
    fn get_int(&self, player: &Player, var: &str) -> Option<i64>;
    fn set_int(&mut self, player: &Player, var: &str, value: i64);
    fn get_names(&self, player: &Player, var: &str) -> Option<BTreeSet<String>>;
    fn set_names(&mut self, player: &Player, var: &str, value: BTreeSet<String>);
}

pub trait LeaderboardService: Send {
    fn set_score(&mut self, board: &str, player: &Player, value: i64, lower_is_better: bool);
}

/// Single text sink showing the remaining seconds.
pub trait DisplaySurface: Send {
    fn set_text(&mut self, text: &str);
    fn clear(&mut self);
}

/// Transfers simulation ownership of a lane entity.
pub trait OwnershipService: Send {
    fn set_owner(&mut self, lane: LaneId, owner: LaneOwner);
}

/// Bundle of collaborators injected into the controller.
pub struct Services {
    pub spawner: Box<dyn SpawnService>,
    pub bubbles: Box<dyn BubbleSink>,
    pub store: Box<dyn PersistenceStore>,
    pub leaderboards: Box<dyn LeaderboardService>,
    pub display: Box<dyn DisplaySurface>,
    pub ownership: Box<dyn OwnershipService>,
}

