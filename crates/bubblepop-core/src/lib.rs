pub mod bindings;
pub mod bubble;
pub mod config;
pub mod events;
pub mod lanes;
pub mod ledger;
pub mod net;
pub mod palette;
pub mod player;
pub mod round;
pub mod services;
pub mod spawner;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    use crate::bubble::AssignData;
    use crate::config::RoundConfig;
    use crate::lanes::{LaneId, LaneOwner};
    use crate::player::{Player, PlayerId};
    use crate::services::{
        BubbleSink, DisplaySurface, LeaderboardService, OwnershipService, PersistenceStore,
        Services, SpawnCompletion, SpawnRequest, SpawnService,
    };
    use crate::spawner::{EntityId, SpawnGroup};

    /// Create `n` test players with sequential IDs starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as PlayerId + 1, format!("Player{}", i + 1)))
            .collect()
    }

    pub fn test_config() -> RoundConfig {
        RoundConfig::default()
    }

    /// Everything the controller pushed into its collaborators.
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub spawn_requests: Vec<SpawnRequest>,
        pub assigned: Vec<(EntityId, AssignData)>,
        pub ints: HashMap<(PlayerId, String), i64>,
        pub name_sets: HashMap<(PlayerId, String), BTreeSet<String>>,
        /// `(board, player, value)` in write order.
        pub board_writes: Vec<(String, PlayerId, i64)>,
        pub display: Option<String>,
        pub display_history: Vec<Option<String>>,
        pub owners: HashMap<LaneId, LaneOwner>,
        pub owner_changes: usize,
        pub disposed_groups: usize,
    }

    impl Recorder {
        pub fn int(&self, player_id: PlayerId, var: &str) -> Option<i64> {
            self.ints.get(&(player_id, var.to_string())).copied()
        }

        pub fn names(&self, player_id: PlayerId, var: &str) -> Option<&BTreeSet<String>> {
            self.name_sets.get(&(player_id, var.to_string()))
        }
    }

    pub type SharedRecorder = Arc<Mutex<Recorder>>;

    /// Collaborator double implementing every service contract on top of a
    /// shared [`Recorder`].
    #[derive(Debug, Clone)]
    pub struct RecordingService(pub SharedRecorder);

    impl RecordingService {
        fn with<T>(&self, f: impl FnOnce(&mut Recorder) -> T) -> T {
            let mut rec = self.0.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut rec)
        }
    }

    impl SpawnService for RecordingService {
        fn request(&mut self, request: SpawnRequest) {
            self.with(|r| r.spawn_requests.push(request));
        }
    }

    impl BubbleSink for RecordingService {
        fn assign(&mut self, entity: EntityId, data: AssignData) {
            self.with(|r| r.assigned.push((entity, data)));
        }
    }

    impl PersistenceStore for RecordingService {
        fn get_int(&self, player: &Player, var: &str) -> Option<i64> {
            self.with(|r| r.int(player.id, var))
        }

        fn set_int(&mut self, player: &Player, var: &str, value: i64) {
            self.with(|r| r.ints.insert((player.id, var.to_string()), value));
        }

        fn get_names(&self, player: &Player, var: &str) -> Option<BTreeSet<String>> {
            self.with(|r| r.names(player.id, var).cloned())
        }

        fn set_names(&mut self, player: &Player, var: &str, value: BTreeSet<String>) {
            self.with(|r| r.name_sets.insert((player.id, var.to_string()), value));
        }
    }

    impl LeaderboardService for RecordingService {
        fn set_score(&mut self, board: &str, player: &Player, value: i64, _lower_is_better: bool) {
            self.with(|r| r.board_writes.push((board.to_string(), player.id, value)));
        }
    }

    impl DisplaySurface for RecordingService {
        fn set_text(&mut self, text: &str) {
            self.with(|r| {
                r.display = Some(text.to_string());
                r.display_history.push(r.display.clone());
            });
        }

        fn clear(&mut self) {
            self.with(|r| {
                r.display = None;
                r.display_history.push(None);
            });
        }
    }

    impl OwnershipService for RecordingService {
        fn set_owner(&mut self, lane: LaneId, owner: LaneOwner) {
            self.with(|r| {
                r.owners.insert(lane, owner);
                r.owner_changes += 1;
            });
        }
    }

    pub fn recording_services() -> (Services, SharedRecorder) {
        let recorder = SharedRecorder::default();
        let svc = RecordingService(Arc::clone(&recorder));
        let services = Services {
            spawner: Box::new(svc.clone()),
            bubbles: Box::new(svc.clone()),
            store: Box::new(svc.clone()),
            leaderboards: Box::new(svc.clone()),
            display: Box::new(svc.clone()),
            ownership: Box::new(svc),
        };
        (services, recorder)
    }

    /// Spawn group that counts its teardown in the recorder.
    #[derive(Debug)]
    pub struct RecordedGroup(pub SharedRecorder);

    impl SpawnGroup for RecordedGroup {
        fn dispose(&mut self) {
            let mut rec = self.0.lock().unwrap_or_else(|e| e.into_inner());
            rec.disposed_groups += 1;
        }
    }

    /// Resolve `request` into a completion owning `entities`.
    pub fn complete_spawn(
        recorder: &SharedRecorder,
        request: SpawnRequest,
        entities: Vec<EntityId>,
    ) -> SpawnCompletion {
        SpawnCompletion {
            request,
            entities,
            group: Box::new(RecordedGroup(Arc::clone(recorder))),
        }
    }
}
