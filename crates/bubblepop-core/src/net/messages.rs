use serde::{Deserialize, Serialize};

use crate::bubble::AssignData;
use crate::events::Notice;
use crate::player::{PlayerColor, PlayerId};
use crate::spawner::EntityId;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Host
    Hello = 0x01,
    StartRound = 0x02,
    ForceGameOver = 0x03,
    TapBubble = 0x04,
    RequestColor = 0x05,

    // Host -> Client (round)
    RoundStarted = 0x10,
    RoundEnded = 0x11,
    ResetView = 0x12,
    TimeRemaining = 0x13,
    ColorAssigned = 0x14,
    ScoreChanged = 0x15,

    // Host -> Client (board)
    BubbleSpawned = 0x20,
    BubbleRemoved = 0x21,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::StartRound),
            0x03 => Some(Self::ForceGameOver),
            0x04 => Some(Self::TapBubble),
            0x05 => Some(Self::RequestColor),
            0x10 => Some(Self::RoundStarted),
            0x11 => Some(Self::RoundEnded),
            0x12 => Some(Self::ResetView),
            0x13 => Some(Self::TimeRemaining),
            0x14 => Some(Self::ColorAssigned),
            0x15 => Some(Self::ScoreChanged),
            0x20 => Some(Self::BubbleSpawned),
            0x21 => Some(Self::BubbleRemoved),
            _ => None,
        }
    }
}

// ============================================================================
// Client -> Host
// ============================================================================

/// First frame on every connection. Registers the sender in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMsg {
    pub player_id: PlayerId,
    pub name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartRoundMsg {}

/// Sent when the player leaves focused interaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForceGameOverMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapBubbleMsg {
    pub entity: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestColorMsg {}

// ============================================================================
// Host -> Client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStartedMsg {
    pub round_id: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScoreEntry {
    pub player_id: PlayerId,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEndedMsg {
    pub winners: Vec<PlayerId>,
    pub scores: Vec<PlayerScoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResetViewMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemainingMsg {
    pub secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorAssignedMsg {
    pub player_id: PlayerId,
    pub color: PlayerColor,
    pub color_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChangedMsg {
    pub player_id: PlayerId,
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleSpawnedMsg {
    pub entity: EntityId,
    pub data: AssignData,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubbleRemovedMsg {
    pub entity: EntityId,
    /// Set when the bubble was popped rather than escaping or being swept.
    pub popped_by: Option<PlayerId>,
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Hello(HelloMsg),
    StartRound(StartRoundMsg),
    ForceGameOver(ForceGameOverMsg),
    TapBubble(TapBubbleMsg),
    RequestColor(RequestColorMsg),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoundStarted(RoundStartedMsg),
    RoundEnded(RoundEndedMsg),
    ResetView(ResetViewMsg),
    TimeRemaining(TimeRemainingMsg),
    ColorAssigned(ColorAssignedMsg),
    ScoreChanged(ScoreChangedMsg),
    BubbleSpawned(BubbleSpawnedMsg),
    BubbleRemoved(BubbleRemovedMsg),
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::RoundStarted {
                round_id,
                duration_secs,
            } => Self::RoundStarted(RoundStartedMsg {
                round_id,
                duration_secs,
            }),
            Notice::ColorAssigned { player_id, color } => Self::ColorAssigned(ColorAssignedMsg {
                player_id,
                color,
                color_name: color.name().to_string(),
            }),
            Notice::ScoreChanged { player_id, total } => {
                Self::ScoreChanged(ScoreChangedMsg { player_id, total })
            },
            Notice::TimeRemaining { secs } => Self::TimeRemaining(TimeRemainingMsg { secs }),
            Notice::ResetView => Self::ResetView(ResetViewMsg {}),
            Notice::RoundEnded { winners, scores } => Self::RoundEnded(RoundEndedMsg {
                winners,
                scores: scores
                    .into_iter()
                    .map(|(player_id, score)| PlayerScoreEntry { player_id, score })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_byte_covers_every_type() {
        for t in [
            MessageType::Hello,
            MessageType::StartRound,
            MessageType::ForceGameOver,
            MessageType::TapBubble,
            MessageType::RequestColor,
            MessageType::RoundStarted,
            MessageType::RoundEnded,
            MessageType::ResetView,
            MessageType::TimeRemaining,
            MessageType::ColorAssigned,
            MessageType::ScoreChanged,
            MessageType::BubbleSpawned,
            MessageType::BubbleRemoved,
        ] {
            assert_eq!(MessageType::from_byte(t as u8), Some(t));
        }
        assert_eq!(MessageType::from_byte(0xFF), None);
    }

    #[test]
    fn color_notice_carries_name() {
        let msg = ServerMessage::from(Notice::ColorAssigned {
            player_id: 3,
            color: PlayerColor::CYAN,
        });
        match msg {
            ServerMessage::ColorAssigned(m) => {
                assert_eq!(m.player_id, 3);
                assert_eq!(m.color_name, "cyan");
            },
            other => panic!("Expected ColorAssigned, got {other:?}"),
        }
    }

    #[test]
    fn round_ended_notice_keeps_score_order() {
        let msg = ServerMessage::from(Notice::RoundEnded {
            winners: vec![2],
            scores: vec![(1, 3), (2, 4)],
        });
        let ServerMessage::RoundEnded(m) = msg else {
            panic!("Expected RoundEnded");
        };
        assert_eq!(m.winners, vec![2]);
        assert_eq!(
            m.scores,
            vec![
                PlayerScoreEntry {
                    player_id: 1,
                    score: 3
                },
                PlayerScoreEntry {
                    player_id: 2,
                    score: 4
                },
            ]
        );
    }
}
