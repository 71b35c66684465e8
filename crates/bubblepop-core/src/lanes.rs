use serde::{Deserialize, Serialize};

use crate::player::PlayerId;

/// Index of an ownership lane.
pub type LaneId = usize;

/// Who simulates a lane entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneOwner {
    Server,
    Player(PlayerId),
}

/// Fixed set of ownership lanes, each held by at most one player and each
/// player holding at most one lane.
#[derive(Debug, Clone)]
pub struct LaneManager {
    lanes: Vec<Option<PlayerId>>,
}

impl LaneManager {
    pub fn new(lane_count: usize) -> Self {
        Self {
            lanes: vec![None; lane_count],
        }
    }

    pub fn capacity(&self) -> usize {
        self.lanes.len()
    }

    pub fn held_count(&self) -> usize {
        self.lanes.iter().filter(|l| l.is_some()).count()
    }

    pub fn lane_of(&self, player_id: PlayerId) -> Option<LaneId> {
        self.lanes.iter().position(|l| *l == Some(player_id))
    }

    pub fn owner(&self, lane: LaneId) -> LaneOwner {
        match self.lanes.get(lane).copied().flatten() {
            Some(pid) => LaneOwner::Player(pid),
            None => LaneOwner::Server,
        }
    }

    /// Grant the first free lane. `None` if the player already holds one or
    /// every lane is taken.
    pub fn grant(&mut self, player_id: PlayerId) -> Option<LaneId> {
        if self.lane_of(player_id).is_some() {
            return None;
        }
        let lane = self.lanes.iter().position(Option::is_none)?;
        self.lanes[lane] = Some(player_id);
        Some(lane)
    }

    /// Return the player's lane to the server, if they hold one.
    pub fn revoke(&mut self, player_id: PlayerId) -> Option<LaneId> {
        let lane = self.lane_of(player_id)?;
        self.lanes[lane] = None;
        Some(lane)
    }

    /// Return every held lane to the server.
    pub fn release_all(&mut self) -> Vec<LaneId> {
        let mut released = Vec::new();
        for (lane, holder) in self.lanes.iter_mut().enumerate() {
            if holder.take().is_some() {
                released.push(lane);
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_first_come_until_full() {
        let mut lanes = LaneManager::new(4);
        for pid in 1..=4 {
            assert_eq!(lanes.grant(pid), Some(pid as LaneId - 1));
        }
        assert_eq!(lanes.grant(5), None);
        assert_eq!(lanes.held_count(), 4);
    }

    #[test]
    fn one_lane_per_player() {
        let mut lanes = LaneManager::new(4);
        assert_eq!(lanes.grant(1), Some(0));
        assert_eq!(lanes.grant(1), None);
        assert_eq!(lanes.held_count(), 1);
    }

    #[test]
    fn revoke_frees_lane_for_next_player() {
        let mut lanes = LaneManager::new(2);
        lanes.grant(1);
        lanes.grant(2);
        assert_eq!(lanes.revoke(1), Some(0));
        assert_eq!(lanes.owner(0), LaneOwner::Server);
        assert_eq!(lanes.grant(3), Some(0));
        assert_eq!(lanes.revoke(42), None);
    }

    #[test]
    fn release_all_reports_held_lanes() {
        let mut lanes = LaneManager::new(4);
        lanes.grant(1);
        lanes.grant(2);
        lanes.revoke(1);
        assert_eq!(lanes.release_all(), vec![1]);
        assert!(lanes.release_all().is_empty());
        assert_eq!(lanes.owner(7), LaneOwner::Server);
    }
}
