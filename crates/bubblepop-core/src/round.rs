use std::collections::BTreeSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bubble::{AssignData, BubbleClass, BubbleKind, ScoreReport, spawn_position};
use crate::config::RoundConfig;
use crate::events::{Notice, RoundEvent};
use crate::lanes::{LaneManager, LaneOwner};
use crate::ledger::{LedgerEntry, ScoreLedger};
use crate::palette::{self, ColorAssignment};
use crate::player::{Player, PlayerColor, PlayerId};
use crate::services::{
    PLAYERS_MET_VAR, POPS_BOARD, POPS_VAR, SOCIAL_BOARD, Services, SpawnCompletion, SpawnRequest,
    WINS_BOARD, WINS_VAR,
};
use crate::spawner::{EntityId, SpawnerRegistry};

/// Lifecycle of the live round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    #[default]
    Idle,
    Running,
    /// Finalizing; only observable from inside `end_game`.
    Ending,
}

/// Interval timers of a running round. The driver arms them when a new
/// generation appears and drops them when none is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTimers {
    pub generation: u64,
    pub spawn_interval: Duration,
    pub countdown_interval: Duration,
}

/// The single live round.
#[derive(Debug, Clone)]
pub struct Round {
    pub id: Uuid,
    pub generation: u64,
    pub time_remaining: u32,
    pub started_at: u64,
    pub timers: RoundTimers,
}

/// Owns the round state machine and every per-round map.
///
/// All mutation happens inside [`RoundController::handle`] (or the named
/// operations it dispatches to), one event at a time.
pub struct RoundController {
    config: RoundConfig,
    services: Services,
    rng: StdRng,
    status: RoundStatus,
    round: Option<Round>,
    generation: u64,
    next_request_id: u64,
    roster: Vec<Player>,
    palette: Vec<PlayerColor>,
    colors: ColorAssignment,
    lanes: LaneManager,
    spawns: SpawnerRegistry,
    ledger: ScoreLedger,
    notices: Vec<Notice>,
}

impl RoundController {
    pub fn new(config: RoundConfig, services: Services) -> Self {
        Self::with_rng(config, services, StdRng::from_os_rng())
    }

    pub fn with_rng(config: RoundConfig, services: Services, rng: StdRng) -> Self {
        let palette = config.palette_colors();
        let lanes = LaneManager::new(config.lane_count);
        Self {
            config,
            services,
            rng,
            status: RoundStatus::Idle,
            round: None,
            generation: 0,
            next_request_id: 1,
            roster: Vec::new(),
            palette,
            colors: ColorAssignment::new(),
            lanes,
            spawns: SpawnerRegistry::new(),
            ledger: ScoreLedger::new(),
            notices: Vec::new(),
        }
    }

    pub fn handle(&mut self, event: RoundEvent) {
        match event {
            RoundEvent::StartGame { player } => self.start_game(&player),
            RoundEvent::ForceGameOver => self.end_game(),
            RoundEvent::PlayerEnteredWorld { player } => self.on_player_enter_world(player),
            RoundEvent::PlayerExitedWorld { player_id } => self.on_player_exit_world(player_id),
            RoundEvent::RequestColor { player } => self.request_color(&player),
            RoundEvent::SpawnTick => self.spawn_tick(),
            RoundEvent::CountdownTick => self.countdown_tick(),
            RoundEvent::SpawnCompleted(completion) => self.on_spawn_completed(completion),
            RoundEvent::Score(report) => self.report_score(report),
            RoundEvent::BubbleEscaped { entity } => self.collect(entity),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn start_game(&mut self, triggering: &Player) {
        if self.status != RoundStatus::Idle {
            tracing::debug!(player_id = triggering.id, "Round already running, start ignored");
            return;
        }

        match self.lanes.grant(triggering.id) {
            Some(lane) => {
                self.services
                    .ownership
                    .set_owner(lane, LaneOwner::Player(triggering.id));
                tracing::info!(player_id = triggering.id, lane, "Ownership lane granted");
            },
            None => tracing::debug!(
                player_id = triggering.id,
                held = self.lanes.held_count(),
                "No ownership lane granted"
            ),
        }

        palette::shuffle(&mut self.palette, &mut self.rng);
        self.ledger.clear();
        self.colors.clear();
        let residual = self.spawns.dispose_all();
        if residual > 0 {
            tracing::warn!(residual, "Disposed spawns left over from an earlier round");
        }

        self.generation += 1;
        let round = Round {
            id: Uuid::new_v4(),
            generation: self.generation,
            time_remaining: self.config.round_duration_secs,
            started_at: crate::time::unix_now_secs(),
            timers: RoundTimers {
                generation: self.generation,
                spawn_interval: self.config.spawn_interval(),
                countdown_interval: Duration::from_secs(1),
            },
        };
        tracing::info!(
            round = %round.id,
            generation = round.generation,
            roster = self.roster.len(),
            "Round started"
        );
        self.notices.push(Notice::RoundStarted {
            round_id: round.id.to_string(),
            duration_secs: round.time_remaining,
        });
        self.round = Some(round);
        self.status = RoundStatus::Running;

        let roster: Vec<PlayerId> = self.roster.iter().map(|p| p.id).collect();
        for player_id in roster {
            self.assign_color(player_id);
        }
        self.publish_time();
    }

    /// Forced end or time's up. Persists the round and resets per-round state.
    pub fn end_game(&mut self) {
        if self.status != RoundStatus::Running {
            tracing::debug!(status = ?self.status, "No running round, end ignored");
            return;
        }
        self.status = RoundStatus::Ending;
        let round = self.round.take();

        self.services.display.clear();
        for lane in self.lanes.release_all() {
            self.services.ownership.set_owner(lane, LaneOwner::Server);
        }
        let residual = self.spawns.dispose_all();

        let winners = self.finalize();
        tracing::info!(
            round = ?round.as_ref().map(|r| r.id),
            participants = self.ledger.len(),
            winners = ?winners,
            residual,
            "Round ended"
        );
        self.notices.push(Notice::RoundEnded {
            winners,
            scores: self
                .ledger
                .entries()
                .into_iter()
                .map(|e| (e.player.id, e.score))
                .collect(),
        });

        self.ledger.clear();
        self.colors.clear();
        self.status = RoundStatus::Idle;
    }

    fn times_up(&mut self) {
        self.notices.push(Notice::ResetView);
        self.end_game();
    }

    /// Write the ledger into persistent stats and leaderboards. Returns the
    /// winners' ids.
    fn finalize(&mut self) -> Vec<PlayerId> {
        let roster = &self.roster;
        let departed_can_win = self.config.departed_players_can_win;
        let winners = self.ledger.winners(|e: &LedgerEntry| {
            departed_can_win || roster.iter().any(|p| p.id == e.player.id)
        });

        let participants: Vec<LedgerEntry> = self.ledger.entries().into_iter().cloned().collect();
        for entry in &participants {
            let pops = self
                .services
                .store
                .get_int(&entry.player, POPS_VAR)
                .unwrap_or(0)
                + i64::from(entry.score);
            self.services.store.set_int(&entry.player, POPS_VAR, pops);
            self.services
                .leaderboards
                .set_score(POPS_BOARD, &entry.player, pops, false);
            self.update_players_met(&entry.player);
        }

        for winner in &winners {
            let wins = self.services.store.get_int(winner, WINS_VAR).unwrap_or(0) + 1;
            self.services.store.set_int(winner, WINS_VAR, wins);
            self.services
                .leaderboards
                .set_score(WINS_BOARD, winner, wins, false);
        }

        winners.into_iter().map(|p| p.id).collect()
    }

    fn update_players_met(&mut self, player: &Player) {
        let mut met = self
            .services
            .store
            .get_names(player, PLAYERS_MET_VAR)
            .unwrap_or_default();
        let before = met.len();
        met.extend(
            self.roster
                .iter()
                .filter(|p| p.id != player.id)
                .map(|p| p.name.clone()),
        );
        if met.len() == before {
            return;
        }
        let count = met.len() as i64;
        self.services.store.set_names(player, PLAYERS_MET_VAR, met);
        self.services
            .leaderboards
            .set_score(SOCIAL_BOARD, player, count, false);
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    pub fn spawn_tick(&mut self) {
        let Some(round) = &self.round else {
            return;
        };
        let generation = round.generation;
        let class = BubbleClass::draw(&mut self.rng, &self.config);
        let position = spawn_position(
            &mut self.rng,
            self.config.spawn_point,
            self.config.spawn_radius,
        );
        let request = SpawnRequest {
            request_id: self.next_request_id,
            generation,
            class,
            position,
        };
        self.next_request_id += 1;
        self.services.spawner.request(request);
    }

    pub fn countdown_tick(&mut self) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        round.time_remaining = round.time_remaining.saturating_sub(1);
        let remaining = round.time_remaining;
        self.publish_time();
        if remaining == 0 {
            tracing::info!("Time's up");
            self.times_up();
        }
    }

    fn publish_time(&mut self) {
        if let Some(round) = &self.round {
            let secs = round.time_remaining;
            self.services.display.set_text(&secs.to_string());
            self.notices.push(Notice::TimeRemaining { secs });
        }
    }

    // ------------------------------------------------------------------
    // Spawning and scoring
    // ------------------------------------------------------------------

    pub fn on_spawn_completed(&mut self, completion: SpawnCompletion) {
        let SpawnCompletion {
            request,
            entities,
            mut group,
        } = completion;

        let current = self.round.as_ref().map(|r| r.generation);
        if current != Some(request.generation) {
            tracing::debug!(
                request_id = request.request_id,
                generation = request.generation,
                current = ?current,
                "Stale spawn completion, disposing"
            );
            group.dispose();
            return;
        }

        self.spawns.register_group(&entities, group);
        for entity in entities {
            let data = self.bubble_data(request.class);
            self.services.bubbles.assign(entity, data);
        }
    }

    fn bubble_data(&mut self, class: BubbleClass) -> AssignData {
        let score = class.base_score(&self.config);
        match class {
            BubbleClass::Penalty => AssignData {
                kind: BubbleKind::Penalty,
                color: PlayerColor::BROWN,
                score,
                scale: 1.0,
            },
            BubbleClass::Special => AssignData {
                kind: BubbleKind::Special {
                    owner: self.random_assigned_color().and_then(|c| self.colors.owner_of(c)),
                },
                color: PlayerColor::GOLD,
                score,
                scale: self.config.special_scale,
            },
            BubbleClass::Regular => {
                let (color, owner) = match self.random_assigned_color() {
                    Some(color) => (color, self.colors.owner_of(color)),
                    None => (self.palette.first().copied().unwrap_or_default(), None),
                };
                AssignData {
                    kind: BubbleKind::Regular { owner },
                    color,
                    score,
                    scale: 1.0,
                }
            },
        }
    }

    fn random_assigned_color(&mut self) -> Option<PlayerColor> {
        let colors = self.colors.distinct_colors();
        if colors.is_empty() {
            return None;
        }
        Some(colors[self.rng.random_range(0..colors.len())])
    }

    /// Accumulate a pop and dispose the bubble that produced it. Accepted in
    /// any state.
    pub fn report_score(&mut self, report: ScoreReport) {
        let total = self.ledger.record(&report.player, report.score);
        tracing::debug!(
            player_id = report.player.id,
            delta = report.score,
            total,
            entity = report.entity,
            "Score recorded"
        );
        self.notices.push(Notice::ScoreChanged {
            player_id: report.player.id,
            total,
        });
        self.spawns.dispose(report.entity);
    }

    /// Collection trigger: the bubble left play without being popped.
    pub fn collect(&mut self, entity: EntityId) {
        if self.spawns.dispose(entity) {
            tracing::trace!(entity, "Bubble escaped");
        }
    }

    // ------------------------------------------------------------------
    // Roster and colors
    // ------------------------------------------------------------------

    pub fn on_player_enter_world(&mut self, player: Player) {
        if self.roster.iter().any(|p| p.id == player.id) {
            return;
        }
        tracing::info!(player_id = player.id, name = %player.name, "Player entered world");
        self.roster.push(player);
    }

    pub fn on_player_exit_world(&mut self, player_id: PlayerId) {
        self.roster.retain(|p| p.id != player_id);
        if let Some(color) = self.colors.release(player_id) {
            tracing::debug!(player_id, color = %color.to_hex(), "Color released");
        }
        if let Some(lane) = self.lanes.revoke(player_id) {
            self.services.ownership.set_owner(lane, LaneOwner::Server);
            tracing::debug!(player_id, lane, "Ownership lane returned to server");
        }
        tracing::info!(player_id, "Player exited world");
    }

    pub fn request_color(&mut self, player: &Player) {
        if self.status != RoundStatus::Running {
            return;
        }
        match self.colors.color_of(player.id) {
            Some(color) => self.notices.push(Notice::ColorAssigned {
                player_id: player.id,
                color,
            }),
            None => self.assign_color(player.id),
        }
    }

    fn assign_color(&mut self, player_id: PlayerId) {
        let roster_index = self
            .roster
            .iter()
            .position(|p| p.id == player_id)
            .unwrap_or(self.roster.len());
        let Some(color) = palette::allocate(&self.palette, &self.colors, roster_index) else {
            tracing::warn!(player_id, "Empty palette, no color assigned");
            return;
        };
        self.colors.assign(player_id, color);
        tracing::debug!(player_id, color = %color.to_hex(), "Color assigned");
        self.notices.push(Notice::ColorAssigned { player_id, color });
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Take every notice produced since the last drain.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RoundStatus::Running
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Present iff a round is running.
    pub fn timers(&self) -> Option<RoundTimers> {
        self.round.as_ref().map(|r| r.timers)
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.round.as_ref().map(|r| r.time_remaining)
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == player_id)
    }

    pub fn palette(&self) -> &[PlayerColor] {
        &self.palette
    }

    pub fn colors(&self) -> &ColorAssignment {
        &self.colors
    }

    pub fn lanes(&self) -> &LaneManager {
        &self.lanes
    }

    pub fn spawns(&self) -> &SpawnerRegistry {
        &self.spawns
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Names every roster member has met, as persisted.
    pub fn players_met(&self, player: &Player) -> BTreeSet<String> {
        self.services
            .store
            .get_names(player, PLAYERS_MET_VAR)
            .unwrap_or_default()
    }
}
