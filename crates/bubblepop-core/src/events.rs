use serde::{Deserialize, Serialize};

use crate::bubble::ScoreReport;
use crate::player::{Player, PlayerColor, PlayerId};
use crate::services::SpawnCompletion;
use crate::spawner::EntityId;

/// Everything the round controller reacts to. Each variant is handled to
/// completion before the next one is looked at.
#[derive(Debug)]
pub enum RoundEvent {
    /// A player stepped on the start trigger.
    StartGame { player: Player },
    /// A client left focused interaction, or an operator ended the round.
    ForceGameOver,
    PlayerEnteredWorld { player: Player },
    PlayerExitedWorld { player_id: PlayerId },
    /// A client needs its color re-sent, e.g. after an ownership transfer.
    RequestColor { player: Player },
    SpawnTick,
    CountdownTick,
    SpawnCompleted(SpawnCompletion),
    /// A bubble was popped.
    Score(ScoreReport),
    /// A bubble entered the collection trigger without being popped.
    BubbleEscaped { entity: EntityId },
}

/// Client-visible changes produced by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    RoundStarted {
        round_id: String,
        duration_secs: u32,
    },
    ColorAssigned {
        player_id: PlayerId,
        color: PlayerColor,
    },
    ScoreChanged {
        player_id: PlayerId,
        total: i32,
    },
    /// Seconds left on the countdown, sent each time it changes.
    TimeRemaining {
        secs: u32,
    },
    /// Clients should drop back to their default camera.
    ResetView,
    RoundEnded {
        winners: Vec<PlayerId>,
        scores: Vec<(PlayerId, i32)>,
    },
}
