use std::time::Duration;

use tokio::sync::mpsc;

use bubblepop_core::services::{SpawnCompletion, SpawnRequest, SpawnService};
use bubblepop_core::spawner::EntityId;

use crate::board::{BoardGroup, BubbleBoard};

/// Spawn service that resolves each request on its own task after a fixed
/// creation latency, then feeds the completion back to the round loop.
pub struct TaskSpawnService {
    board: BubbleBoard,
    completions: mpsc::UnboundedSender<SpawnCompletion>,
    latency: Duration,
    next_entity: EntityId,
}

impl TaskSpawnService {
    pub fn new(
        board: BubbleBoard,
        completions: mpsc::UnboundedSender<SpawnCompletion>,
        latency: Duration,
    ) -> Self {
        Self {
            board,
            completions,
            latency,
            next_entity: 1,
        }
    }
}

impl SpawnService for TaskSpawnService {
    fn request(&mut self, request: SpawnRequest) {
        let entity = self.next_entity;
        self.next_entity += 1;

        let board = self.board.clone();
        let completions = self.completions.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            board.materialize(entity, request.position);
            let completion = SpawnCompletion {
                request,
                entities: vec![entity],
                group: Box::new(BoardGroup::new(board, vec![entity])),
            };
            if let Err(mpsc::error::SendError(mut orphan)) = completions.send(completion) {
                tracing::debug!(entity, "Round loop gone, disposing spawned bubble");
                orphan.group.dispose();
            }
        });
    }
}
