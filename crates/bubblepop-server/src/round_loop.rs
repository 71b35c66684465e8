use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use bubblepop_core::bindings::BindingRegistry;
use bubblepop_core::config::RoundConfig;
use bubblepop_core::events::RoundEvent;
use bubblepop_core::net::messages::ServerMessage;
use bubblepop_core::player::{Player, PlayerId};
use bubblepop_core::round::{RoundController, RoundStatus};
use bubblepop_core::services::{Services, SpawnCompletion};
use bubblepop_core::spawner::EntityId;

use crate::board::BubbleBoard;
use crate::broadcast::{Outbox, publish};
use crate::leaderboard::Leaderboards;
use crate::spawn::TaskSpawnService;
use crate::store::JsonFileStore;
use crate::surfaces::{LaneTable, TimerDisplay};

pub type SharedBindings = Arc<RwLock<BindingRegistry>>;

/// Commands sent from the WebSocket handlers to the round loop.
#[derive(Debug)]
pub enum RoundCommand {
    PlayerEntered { player: Player },
    PlayerExited { player_id: PlayerId },
    StartRound { player_id: PlayerId },
    ForceGameOver { player_id: PlayerId },
    Tap { player_id: PlayerId, entity: EntityId },
    RequestColor { player_id: PlayerId },
    Stop,
}

/// Read-only view of the round, refreshed after every handled event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundSnapshot {
    pub status: RoundStatus,
    pub round_id: Option<String>,
    pub generation: Option<u64>,
    pub time_remaining: Option<u32>,
    pub roster: Vec<Player>,
    pub live_bubbles: usize,
    pub lanes_held: usize,
}

/// World collaborators shared between the round loop and the HTTP surface.
#[derive(Debug, Clone)]
pub struct RoundWorld {
    pub outbox: Outbox,
    pub board: BubbleBoard,
    pub display: TimerDisplay,
    pub lanes: LaneTable,
    pub leaderboards: Leaderboards,
    pub store: JsonFileStore,
}

impl RoundWorld {
    pub fn new(lane_count: usize, store: JsonFileStore) -> Self {
        let outbox = Outbox::new();
        Self {
            board: BubbleBoard::new(outbox.clone()),
            display: TimerDisplay::new(),
            lanes: LaneTable::new(lane_count),
            leaderboards: Leaderboards::new(),
            store,
            outbox,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub round: RoundConfig,
    pub spawn_latency: Duration,
    pub frame_interval: Duration,
    pub command_buffer: usize,
}

pub struct RoundLoopHandle {
    pub commands: mpsc::Sender<RoundCommand>,
    pub snapshot: watch::Receiver<RoundSnapshot>,
    pub join: JoinHandle<()>,
}

/// Spawn the round loop as a tokio task. It owns the controller; everything
/// else talks to it through the returned command sender.
pub fn spawn_round_loop(
    settings: LoopSettings,
    world: RoundWorld,
    bindings: SharedBindings,
    tx: broadcast::Sender<Bytes>,
) -> RoundLoopHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(settings.command_buffer);
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(RoundSnapshot::default());

    let services = Services {
        spawner: Box::new(TaskSpawnService::new(
            world.board.clone(),
            completion_tx,
            settings.spawn_latency,
        )),
        bubbles: Box::new(world.board.clone()),
        store: Box::new(world.store.clone()),
        leaderboards: Box::new(world.leaderboards.clone()),
        display: Box::new(world.display.clone()),
        ownership: Box::new(world.lanes.clone()),
    };
    let round_loop = RoundLoop {
        ctl: RoundController::new(settings.round.clone(), services),
        board: world.board,
        outbox: world.outbox,
        store: world.store,
        bindings,
        tx,
        snapshot: snapshot_tx,
    };

    let join = tokio::spawn(run_round_loop(
        round_loop,
        settings.frame_interval,
        cmd_rx,
        completion_rx,
    ));

    RoundLoopHandle {
        commands: cmd_tx,
        snapshot: snapshot_rx,
        join,
    }
}

struct RoundLoop {
    ctl: RoundController,
    board: BubbleBoard,
    outbox: Outbox,
    store: JsonFileStore,
    bindings: SharedBindings,
    tx: broadcast::Sender<Bytes>,
    snapshot: watch::Sender<RoundSnapshot>,
}

impl RoundLoop {
    async fn apply(&mut self, cmd: RoundCommand) {
        match cmd {
            RoundCommand::PlayerEntered { player } => {
                self.ctl.handle(RoundEvent::PlayerEnteredWorld { player });
            },
            RoundCommand::PlayerExited { player_id } => {
                self.ctl.handle(RoundEvent::PlayerExitedWorld { player_id });
                self.bindings.write().await.remove(player_id);
            },
            RoundCommand::StartRound { player_id } => {
                if let Some(player) = self.roster_player(player_id) {
                    self.ctl.handle(RoundEvent::StartGame { player });
                }
            },
            RoundCommand::ForceGameOver { player_id } => {
                if self.roster_player(player_id).is_some() {
                    tracing::info!(player_id, "Game over forced by client");
                    self.ctl.handle(RoundEvent::ForceGameOver);
                }
            },
            RoundCommand::Tap { player_id, entity } => {
                let Some(player) = self.roster_player(player_id) else {
                    return;
                };
                let multiplier = self.ctl.config().special_multiplier;
                if let Some(report) = self.board.tap(entity, &player, multiplier) {
                    self.ctl.handle(RoundEvent::Score(report));
                }
            },
            RoundCommand::RequestColor { player_id } => {
                if let Some(player) = self.roster_player(player_id) {
                    self.ctl.handle(RoundEvent::RequestColor { player });
                }
            },
            // Handled by the loop itself.
            RoundCommand::Stop => {},
        }
    }

    fn roster_player(&self, player_id: PlayerId) -> Option<Player> {
        let player = self.ctl.player(player_id).cloned();
        if player.is_none() {
            tracing::debug!(player_id, "Command from a player not in the world");
        }
        player
    }

    fn advance_frame(&mut self, dt: f32) {
        let config = self.ctl.config();
        let escaped = self
            .board
            .advance(dt, config.rise_speed, config.bubble_lifetime_secs);
        for entity in escaped {
            self.ctl.handle(RoundEvent::BubbleEscaped { entity });
        }
    }

    /// Publish controller notices, then world messages, then refresh the
    /// snapshot and write out any stats the step changed.
    async fn flush(&mut self) {
        let notices = self.ctl.drain_notices();
        let world = self.outbox.drain();

        if !notices.is_empty() {
            let mut bindings = self.bindings.write().await;
            for notice in &notices {
                bindings.apply(notice);
            }
        }
        for notice in notices {
            publish(&self.tx, &ServerMessage::from(notice));
        }
        for msg in &world {
            publish(&self.tx, msg);
        }

        let next = RoundSnapshot {
            status: self.ctl.status(),
            round_id: self.ctl.round().map(|r| r.id.to_string()),
            generation: self.ctl.round().map(|r| r.generation),
            time_remaining: self.ctl.time_remaining(),
            roster: self.ctl.roster().to_vec(),
            live_bubbles: self.ctl.spawns().entity_count(),
            lanes_held: self.ctl.lanes().held_count(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        self.store.persist().await;
    }
}

/// Interval whose first tick is one full period away.
fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Tick an optional interval; an unarmed timer never fires.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending::<()>().await,
    }
}

async fn run_round_loop(
    mut round_loop: RoundLoop,
    frame_interval: Duration,
    mut cmd_rx: mpsc::Receiver<RoundCommand>,
    mut completion_rx: mpsc::UnboundedReceiver<SpawnCompletion>,
) {
    let mut frame = tokio::time::interval(frame_interval);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let frame_dt = frame_interval.as_secs_f32();

    let mut spawn_timer: Option<Interval> = None;
    let mut countdown_timer: Option<Interval> = None;
    let mut armed_generation: Option<u64> = None;

    tracing::info!("Round loop started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(RoundCommand::Stop) | None => {
                        round_loop.ctl.handle(RoundEvent::ForceGameOver);
                        round_loop.flush().await;
                        break;
                    },
                    Some(cmd) => round_loop.apply(cmd).await,
                }
            }
            Some(completion) = completion_rx.recv() => {
                round_loop.ctl.handle(RoundEvent::SpawnCompleted(completion));
            }
            _ = next_tick(&mut spawn_timer) => {
                round_loop.ctl.handle(RoundEvent::SpawnTick);
            }
            _ = next_tick(&mut countdown_timer) => {
                round_loop.ctl.handle(RoundEvent::CountdownTick);
            }
            _ = frame.tick() => {
                round_loop.advance_frame(frame_dt);
            }
        }

        // Timers exist exactly while a round runs and restart with each one.
        let timers = round_loop.ctl.timers();
        let generation = timers.map(|t| t.generation);
        if generation != armed_generation {
            armed_generation = generation;
            spawn_timer = timers.map(|t| periodic(t.spawn_interval));
            countdown_timer = timers.map(|t| periodic(t.countdown_interval));
        }

        round_loop.flush().await;
    }

    tracing::info!("Round loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bubblepop_core::net::protocol::decode_server_message;

    struct Harness {
        handle: RoundLoopHandle,
        rx: broadcast::Receiver<Bytes>,
        bindings: SharedBindings,
        world: RoundWorld,
    }

    fn harness(round: RoundConfig) -> Harness {
        harness_with_store(round, JsonFileStore::in_memory())
    }

    fn harness_with_store(round: RoundConfig, store: JsonFileStore) -> Harness {
        let (tx, rx) = broadcast::channel(4096);
        let world = RoundWorld::new(round.lane_count, store);
        let bindings = SharedBindings::default();
        let settings = LoopSettings {
            round,
            spawn_latency: Duration::from_millis(1),
            frame_interval: Duration::from_millis(20),
            command_buffer: 64,
        };
        let handle = spawn_round_loop(settings, world.clone(), Arc::clone(&bindings), tx);
        Harness {
            handle,
            rx,
            bindings,
            world,
        }
    }

    fn short_round() -> RoundConfig {
        RoundConfig {
            round_duration_secs: 1,
            spawn_interval_ms: 50,
            ..RoundConfig::default()
        }
    }

    async fn recv(rx: &mut broadcast::Receiver<Bytes>) -> ServerMessage {
        let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("broadcast closed");
        decode_server_message(&data).expect("should decode")
    }

    async fn recv_until<T>(
        rx: &mut broadcast::Receiver<Bytes>,
        mut pick: impl FnMut(ServerMessage) -> Option<T>,
    ) -> T {
        loop {
            if let Some(found) = pick(recv(rx).await) {
                return found;
            }
        }
    }

    async fn enter(h: &Harness, id: PlayerId, name: &str) {
        h.handle
            .commands
            .send(RoundCommand::PlayerEntered {
                player: Player::new(id, name),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_broadcasts_round_then_colors_then_time() {
        let mut h = harness(short_round());
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        assert!(matches!(
            recv(&mut h.rx).await,
            ServerMessage::RoundStarted(m) if m.duration_secs == 1
        ));
        assert!(matches!(
            recv(&mut h.rx).await,
            ServerMessage::ColorAssigned(m) if m.player_id == 1
        ));
        assert!(matches!(
            recv(&mut h.rx).await,
            ServerMessage::TimeRemaining(m) if m.secs == 1
        ));
    }

    #[tokio::test]
    async fn round_spawns_bubbles_and_ends_on_time() {
        let mut h = harness(short_round());
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        let spawned = recv_until(&mut h.rx, |m| match m {
            ServerMessage::BubbleSpawned(b) => Some(b),
            _ => None,
        })
        .await;
        assert!(h.world.board.contains(spawned.entity));

        let ended = recv_until(&mut h.rx, |m| match m {
            ServerMessage::RoundEnded(e) => Some(e),
            _ => None,
        })
        .await;
        // Nobody popped anything.
        assert!(ended.winners.is_empty());

        // Residual bubbles are swept with the round.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.world.board.is_empty());
        assert_eq!(h.handle.snapshot.borrow().status, RoundStatus::Idle);
        assert_eq!(h.world.display.text(), None);
    }

    #[tokio::test]
    async fn no_spawns_while_idle() {
        let mut h = harness(short_round());
        enter(&h, 1, "Alice").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.rx.try_recv().is_err());
        assert!(h.world.board.is_empty());
    }

    #[tokio::test]
    async fn tap_scores_and_updates_binding() {
        let mut h = harness(RoundConfig {
            round_duration_secs: 5,
            ..short_round()
        });
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        // Alice holds the only color, so every regular bubble is hers.
        let target = recv_until(&mut h.rx, |m| match m {
            ServerMessage::BubbleSpawned(b) if b.data.player() == Some(1) => Some(b.entity),
            _ => None,
        })
        .await;
        h.handle
            .commands
            .send(RoundCommand::Tap {
                player_id: 1,
                entity: target,
            })
            .await
            .unwrap();

        let total = recv_until(&mut h.rx, |m| match m {
            ServerMessage::ScoreChanged(s) if s.player_id == 1 => Some(s.total),
            _ => None,
        })
        .await;
        assert!(total >= 1);
        let removed = recv_until(&mut h.rx, |m| match m {
            ServerMessage::BubbleRemoved(r) if r.entity == target => Some(r),
            _ => None,
        })
        .await;
        assert_eq!(removed.popped_by, Some(1));

        let binding = h.bindings.read().await.get(1).cloned().unwrap();
        assert_eq!(binding.score, total);
        assert!(binding.color_name.is_some());
    }

    #[tokio::test]
    async fn stop_finalizes_running_round() {
        let mut h = harness(RoundConfig {
            round_duration_secs: 60,
            ..short_round()
        });
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();
        recv_until(&mut h.rx, |m| matches!(m, ServerMessage::RoundStarted(_)).then_some(()))
            .await;

        h.handle.commands.send(RoundCommand::Stop).await.unwrap();
        recv_until(&mut h.rx, |m| matches!(m, ServerMessage::RoundEnded(_)).then_some(())).await;
        tokio::time::timeout(Duration::from_secs(2), h.handle.join)
            .await
            .expect("loop should exit")
            .unwrap();
    }

    #[tokio::test]
    async fn exit_clears_binding_and_roster() {
        let h = harness(short_round());
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();
        h.handle
            .commands
            .send(RoundCommand::PlayerExited { player_id: 1 })
            .await
            .unwrap();

        let mut snapshot = h.handle.snapshot.clone();
        tokio::time::timeout(
            Duration::from_secs(2),
            snapshot.wait_for(|s| s.roster.is_empty() && s.status == RoundStatus::Running),
        )
        .await
        .expect("snapshot should update")
        .unwrap();
        assert!(h.bindings.read().await.get(1).is_none());
    }

    #[tokio::test]
    async fn reentry_after_exit_keeps_player_in_world() {
        let mut h = harness(short_round());
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::PlayerExited { player_id: 1 })
            .await
            .unwrap();
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        // Only a player still in the roster can start a round and get a color.
        let assigned = recv_until(&mut h.rx, |m| match m {
            ServerMessage::ColorAssigned(c) => Some(c.player_id),
            _ => None,
        })
        .await;
        assert_eq!(assigned, 1);
        let roster = h.handle.snapshot.borrow().roster.clone();
        assert_eq!(roster, vec![Player::new(1, "Alice")]);
    }

    #[tokio::test]
    async fn final_countdown_precedes_round_end() {
        let mut h = harness(short_round());
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        let mut order = Vec::new();
        loop {
            match recv(&mut h.rx).await {
                ServerMessage::TimeRemaining(m) if m.secs == 0 => order.push("zero"),
                ServerMessage::ResetView(_) => order.push("reset"),
                ServerMessage::RoundEnded(_) => {
                    order.push("ended");
                    break;
                },
                _ => {},
            }
        }
        assert_eq!(order, vec!["zero", "reset", "ended"]);
    }

    #[tokio::test]
    async fn finalize_writes_stats_file() {
        let path = std::env::temp_dir().join(format!("bubblepop-loop-{}.json", uuid::Uuid::new_v4()));
        let mut h = harness_with_store(
            RoundConfig {
                round_duration_secs: 60,
                ..short_round()
            },
            JsonFileStore::open(&path),
        );
        enter(&h, 1, "Alice").await;
        h.handle
            .commands
            .send(RoundCommand::StartRound { player_id: 1 })
            .await
            .unwrap();

        let target = recv_until(&mut h.rx, |m| match m {
            ServerMessage::BubbleSpawned(b) if b.data.player() == Some(1) => Some(b.entity),
            _ => None,
        })
        .await;
        h.handle
            .commands
            .send(RoundCommand::Tap {
                player_id: 1,
                entity: target,
            })
            .await
            .unwrap();
        let total = recv_until(&mut h.rx, |m| match m {
            ServerMessage::ScoreChanged(s) if s.player_id == 1 => Some(s.total),
            _ => None,
        })
        .await;
        // Scoring alone leaves the file untouched.
        assert!(!path.exists());

        h.handle
            .commands
            .send(RoundCommand::ForceGameOver { player_id: 1 })
            .await
            .unwrap();
        recv_until(&mut h.rx, |m| matches!(m, ServerMessage::RoundEnded(_)).then_some(())).await;
        h.handle.commands.send(RoundCommand::Stop).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), h.handle.join)
            .await
            .expect("loop should exit")
            .unwrap();

        let reopened = JsonFileStore::open(&path);
        let stats = reopened.stats(1).expect("stats written at round end");
        assert_eq!(stats.ints["pops"], i64::from(total));
        assert_eq!(stats.ints["wins"], 1);
        let _ = std::fs::remove_file(&path);
    }
}
