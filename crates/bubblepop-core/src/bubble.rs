use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::player::{Player, PlayerColor, PlayerId};
use crate::spawner::EntityId;

/// Kind drawn when a spawn request is issued, before any owner is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BubbleClass {
    Regular,
    Special,
    Penalty,
}

impl BubbleClass {
    /// Map a uniform draw in `0..1` to a class. The special band sits just
    /// above the penalty threshold, so specials are conditioned on the draw
    /// not being a penalty.
    pub fn from_draw(draw: f64, config: &RoundConfig) -> Self {
        if config.penalty_enabled && draw < config.penalty_chance {
            Self::Penalty
        } else if draw < config.penalty_chance + config.special_chance {
            Self::Special
        } else {
            Self::Regular
        }
    }

    pub fn draw<R: Rng + ?Sized>(rng: &mut R, config: &RoundConfig) -> Self {
        Self::from_draw(rng.random::<f64>(), config)
    }

    pub fn base_score(self, config: &RoundConfig) -> i32 {
        match self {
            Self::Regular => config.regular_score,
            Self::Special => config.special_score,
            Self::Penalty => config.penalty_score,
        }
    }
}

/// Tag handed to a spawned bubble. The bubble alone decides whether a pop
/// attempt turns into a score event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BubbleKind {
    /// Only `owner` may pop it. No owner means nobody can.
    Regular { owner: Option<PlayerId> },
    /// Anyone may pop it; the multiplier applies only for `owner`.
    Special { owner: Option<PlayerId> },
    /// Anyone may pop it for a negative score.
    Penalty,
}

impl BubbleKind {
    pub fn class(self) -> BubbleClass {
        match self {
            Self::Regular { .. } => BubbleClass::Regular,
            Self::Special { .. } => BubbleClass::Special,
            Self::Penalty => BubbleClass::Penalty,
        }
    }

    pub fn owner(self) -> Option<PlayerId> {
        match self {
            Self::Regular { owner } | Self::Special { owner } => owner,
            Self::Penalty => None,
        }
    }
}

/// Data pushed to a bubble once after its spawn resolves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssignData {
    pub kind: BubbleKind,
    pub color: PlayerColor,
    pub score: i32,
    pub scale: f32,
}

impl AssignData {
    pub fn player(&self) -> Option<PlayerId> {
        self.kind.owner()
    }
}

/// Score event produced by a popped bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub player: Player,
    pub score: i32,
    pub entity: EntityId,
}

/// Pop rules of a single live bubble.
#[derive(Debug, Clone)]
pub struct Bubble {
    pub entity: EntityId,
    pub data: AssignData,
    popped: bool,
}

impl Bubble {
    pub fn new(entity: EntityId, data: AssignData) -> Self {
        Self {
            entity,
            data,
            popped: false,
        }
    }

    pub fn is_popped(&self) -> bool {
        self.popped
    }

    /// Translate a tap by `popper` into a score report. Returns `None` when
    /// the popper may not pop this bubble or it already popped.
    pub fn tap(&mut self, popper: &Player, special_multiplier: i32) -> Option<ScoreReport> {
        if self.popped {
            return None;
        }
        let score = match self.data.kind {
            BubbleKind::Penalty => self.data.score,
            BubbleKind::Regular { owner } => {
                if owner != Some(popper.id) {
                    return None;
                }
                self.data.score
            },
            BubbleKind::Special { owner } => {
                if owner == Some(popper.id) {
                    self.data.score * special_multiplier
                } else {
                    self.data.score
                }
            },
        };
        self.popped = true;
        Some(ScoreReport {
            player: popper.clone(),
            score,
            entity: self.entity,
        })
    }
}

/// Random point on a sphere of `radius` around `center`.
pub fn spawn_position<R: Rng + ?Sized>(rng: &mut R, center: [f32; 3], radius: f32) -> [f32; 3] {
    let mut v = [
        rng.random_range(-1.0f32..=1.0),
        rng.random_range(-1.0f32..=1.0),
        rng.random_range(-1.0f32..=1.0),
    ];
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        v = [0.0, 1.0, 0.0];
    } else {
        for c in &mut v {
            *c /= len;
        }
    }
    [
        center[0] + v[0] * radius,
        center[1] + v[1] * radius,
        center[2] + v[2] * radius,
    ]
}
