use rand::Rng;
use rand::seq::SliceRandom;

use crate::player::{PlayerColor, PlayerId};

/// Colors currently held by players, in assignment order.
///
/// Each player holds at most one color. While the roster fits the palette no
/// two players share a color; beyond that the allocator's fallback lets
/// players share.
#[derive(Debug, Clone, Default)]
pub struct ColorAssignment {
    entries: Vec<(PlayerId, PlayerColor)>,
}

impl ColorAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_of(&self, player_id: PlayerId) -> Option<PlayerColor> {
        self.entries
            .iter()
            .find(|(id, _)| *id == player_id)
            .map(|(_, c)| *c)
    }

    /// Earliest player still holding `color`.
    pub fn owner_of(&self, color: PlayerColor) -> Option<PlayerId> {
        self.entries
            .iter()
            .find(|(_, c)| *c == color)
            .map(|(id, _)| *id)
    }

    pub fn is_assigned(&self, color: PlayerColor) -> bool {
        self.entries.iter().any(|(_, c)| *c == color)
    }

    /// Record `color` for `player_id`, replacing any color they held.
    pub fn assign(&mut self, player_id: PlayerId, color: PlayerColor) {
        match self.entries.iter_mut().find(|(id, _)| *id == player_id) {
            Some(entry) => entry.1 = color,
            None => self.entries.push((player_id, color)),
        }
    }

    /// Drop the player's entry. The color becomes free again unless someone
    /// else also holds it.
    pub fn release(&mut self, player_id: PlayerId) -> Option<PlayerColor> {
        let idx = self.entries.iter().position(|(id, _)| *id == player_id)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of players holding a color.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct colors in use, in first-assignment order.
    pub fn distinct_colors(&self) -> Vec<PlayerColor> {
        let mut colors: Vec<PlayerColor> = Vec::with_capacity(self.entries.len());
        for (_, c) in &self.entries {
            if !colors.contains(c) {
                colors.push(*c);
            }
        }
        colors
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, PlayerColor)> + '_ {
        self.entries.iter().copied()
    }
}

/// Pick a color for the player at `roster_index`.
///
/// Prefers the first palette color nobody holds (palette order is the
/// current shuffle order). When every color is taken, cycles
/// deterministically by `roster_index`. Returns `None` only for an empty
/// palette.
pub fn allocate(
    palette: &[PlayerColor],
    assigned: &ColorAssignment,
    roster_index: usize,
) -> Option<PlayerColor> {
    if palette.is_empty() {
        return None;
    }
    palette
        .iter()
        .copied()
        .find(|c| !assigned.is_assigned(*c))
        .or_else(|| Some(palette[roster_index % palette.len()]))
}

/// Uniform in-place shuffle (Fisher–Yates).
pub fn shuffle<R: Rng + ?Sized>(palette: &mut [PlayerColor], rng: &mut R) {
    palette.shuffle(rng);
}
