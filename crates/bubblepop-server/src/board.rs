use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bubblepop_core::bubble::{AssignData, Bubble, ScoreReport};
use bubblepop_core::net::messages::{BubbleRemovedMsg, BubbleSpawnedMsg, ServerMessage};
use bubblepop_core::player::{Player, PlayerId};
use bubblepop_core::services::BubbleSink;
use bubblepop_core::spawner::{EntityId, SpawnGroup};

use crate::broadcast::Outbox;

/// A bubble object in the world. It exists from the moment its spawn resolves;
/// it becomes poppable once the controller has assigned its data.
#[derive(Debug)]
struct LiveBubble {
    position: [f32; 3],
    age: f32,
    bubble: Option<Bubble>,
    popped_by: Option<PlayerId>,
}

#[derive(Debug, Default)]
struct BoardInner {
    bubbles: HashMap<EntityId, LiveBubble>,
}

/// Shared table of live bubbles. Cloning yields another handle to the same
/// board.
#[derive(Debug, Clone)]
pub struct BubbleBoard {
    inner: Arc<Mutex<BoardInner>>,
    outbox: Outbox,
}

impl BubbleBoard {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoardInner::default())),
            outbox,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a freshly spawned, not yet assigned bubble.
    pub fn materialize(&self, entity: EntityId, position: [f32; 3]) {
        self.lock().bubbles.insert(
            entity,
            LiveBubble {
                position,
                age: 0.0,
                bubble: None,
                popped_by: None,
            },
        );
    }

    /// Remove bubbles torn down by their spawn group.
    pub fn remove(&self, entities: &[EntityId]) {
        let removed: Vec<(EntityId, Option<PlayerId>, bool)> = {
            let mut inner = self.lock();
            entities
                .iter()
                .filter_map(|e| {
                    inner
                        .bubbles
                        .remove(e)
                        .map(|b| (*e, b.popped_by, b.bubble.is_some()))
                })
                .collect()
        };
        for (entity, popped_by, announced) in removed {
            if announced {
                self.outbox
                    .push(ServerMessage::BubbleRemoved(BubbleRemovedMsg { entity, popped_by }));
            }
        }
    }

    /// Resolve a tap into a score report using the bubble's own pop rules.
    pub fn tap(
        &self,
        entity: EntityId,
        popper: &Player,
        special_multiplier: i32,
    ) -> Option<ScoreReport> {
        let mut inner = self.lock();
        let live = inner.bubbles.get_mut(&entity)?;
        let report = live.bubble.as_mut()?.tap(popper, special_multiplier)?;
        live.popped_by = Some(popper.id);
        Some(report)
    }

    /// Move every bubble up by one frame and return the ones that aged out of
    /// play bounds.
    pub fn advance(&self, dt: f32, rise_speed: f32, lifetime: f32) -> Vec<EntityId> {
        let mut inner = self.lock();
        let mut escaped = Vec::new();
        for (entity, live) in &mut inner.bubbles {
            live.age += dt;
            live.position[1] += rise_speed * dt;
            if live.age >= lifetime && live.popped_by.is_none() {
                escaped.push(*entity);
            }
        }
        escaped.sort_unstable();
        escaped
    }

    pub fn len(&self) -> usize {
        self.lock().bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.lock().bubbles.contains_key(&entity)
    }

    pub fn data_of(&self, entity: EntityId) -> Option<AssignData> {
        self.lock()
            .bubbles
            .get(&entity)
            .and_then(|b| b.bubble.as_ref().map(|b| b.data))
    }
}

impl BubbleSink for BubbleBoard {
    fn assign(&mut self, entity: EntityId, data: AssignData) {
        let position = {
            let mut inner = self.lock();
            let Some(live) = inner.bubbles.get_mut(&entity) else {
                tracing::debug!(entity, "Assign for a bubble that is already gone");
                return;
            };
            live.bubble = Some(Bubble::new(entity, data));
            live.position
        };
        self.outbox.push(ServerMessage::BubbleSpawned(BubbleSpawnedMsg {
            entity,
            data,
            position,
        }));
    }
}

/// Teardown handle for bubbles created by one spawn request.
#[derive(Debug)]
pub struct BoardGroup {
    board: BubbleBoard,
    entities: Vec<EntityId>,
    disposed: bool,
}

impl BoardGroup {
    pub fn new(board: BubbleBoard, entities: Vec<EntityId>) -> Self {
        Self {
            board,
            entities,
            disposed: false,
        }
    }
}

impl SpawnGroup for BoardGroup {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.board.remove(&self.entities);
    }
}
