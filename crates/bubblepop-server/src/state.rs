use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use bubblepop_core::player::PlayerId;

use crate::config::ServerConfig;
use crate::leaderboard::Leaderboards;
use crate::round_loop::{
    LoopSettings, RoundCommand, RoundSnapshot, RoundWorld, SharedBindings, spawn_round_loop,
};
use crate::store::JsonFileStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub commands: mpsc::Sender<RoundCommand>,
    pub snapshot: watch::Receiver<RoundSnapshot>,
    /// Encoded server messages for every connected client.
    pub tx: broadcast::Sender<Bytes>,
    pub bindings: SharedBindings,
    pub leaderboards: Leaderboards,
    pub store: JsonFileStore,
    /// Player ids with a live WebSocket.
    pub connected: Arc<Mutex<HashSet<PlayerId>>>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state and start the round loop. Must be called from inside a
    /// tokio runtime.
    pub fn new(config: ServerConfig) -> (Self, JoinHandle<()>) {
        let round = config.round_config();
        let store = match &config.stats_path {
            Some(path) => JsonFileStore::open(path),
            None => JsonFileStore::in_memory(),
        };
        let world = RoundWorld::new(round.lane_count, store);
        let (tx, _) = broadcast::channel(config.limits.broadcast_capacity);
        let bindings = SharedBindings::default();

        let settings = LoopSettings {
            round,
            spawn_latency: Duration::from_millis(config.world.spawn_latency_ms),
            frame_interval: Duration::from_millis(config.world.frame_interval_ms),
            command_buffer: config.limits.command_buffer,
        };
        let leaderboards = world.leaderboards.clone();
        let store = world.store.clone();
        let handle = spawn_round_loop(settings, world, Arc::clone(&bindings), tx.clone());

        let state = Self {
            config: Arc::new(config),
            commands: handle.commands,
            snapshot: handle.snapshot,
            tx,
            bindings,
            leaderboards,
            store,
            connected: Arc::new(Mutex::new(HashSet::new())),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        };
        (state, handle.join)
    }

    /// Forward a command to the round loop. Returns false once the loop is
    /// gone.
    pub async fn send(&self, cmd: RoundCommand) -> bool {
        if self.commands.send(cmd).await.is_err() {
            tracing::warn!("Round loop is not running, command dropped");
            return false;
        }
        true
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
