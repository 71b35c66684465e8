use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::player::PlayerColor;

/// Deployment constants for a bubble round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Round length in seconds.
    pub round_duration_secs: u32,
    /// Interval between spawn requests (milliseconds).
    pub spawn_interval_ms: u64,
    /// Whether penalty bubbles can be drawn at all.
    pub penalty_enabled: bool,
    /// Penalty threshold of the kind draw.
    pub penalty_chance: f64,
    /// Width of the special band above the penalty threshold.
    pub special_chance: f64,
    /// Bonus applied when a special bubble is popped by its tagged owner.
    pub special_multiplier: i32,
    pub regular_score: i32,
    pub special_score: i32,
    pub penalty_score: i32,
    /// Bubbles spawn on a sphere of this radius around `spawn_point`.
    pub spawn_radius: f32,
    pub spawn_point: [f32; 3],
    /// Palette as `#RRGGBB` strings, in unshuffled order.
    pub palette: Vec<String>,
    /// Number of ownership lanes.
    pub lane_count: usize,
    /// Upward speed of a live bubble (units/s).
    pub rise_speed: f32,
    /// Age after which a bubble has left play bounds (seconds).
    pub bubble_lifetime_secs: f32,
    /// Visual scale of special bubbles.
    pub special_scale: f32,
    /// Whether players who left mid-round stay eligible to win it.
    pub departed_players_can_win: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            spawn_interval_ms: 200,
            penalty_enabled: false,
            penalty_chance: 0.1,
            special_chance: 0.05,
            special_multiplier: 2,
            regular_score: 1,
            special_score: 2,
            penalty_score: -1,
            spawn_radius: 0.5,
            spawn_point: [0.0, 1.5, 0.0],
            palette: PlayerColor::PALETTE.iter().map(|c| c.to_hex()).collect(),
            lane_count: 4,
            rise_speed: 0.2,
            bubble_lifetime_secs: 12.0,
            special_scale: 1.5,
            departed_players_can_win: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config io error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl RoundConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BUBBLEPOP_ROUND_CONFIG")
            && let Ok(config) = Self::from_file(&path)
        {
            return config;
        }
        if let Ok(config) = Self::from_file("config/round.toml") {
            return config;
        }
        Self::default()
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_duration_secs == 0 {
            return Err(ConfigError::Invalid("round_duration_secs must be > 0".into()));
        }
        if self.spawn_interval_ms == 0 {
            return Err(ConfigError::Invalid("spawn_interval_ms must be > 0".into()));
        }
        if self.lane_count == 0 {
            return Err(ConfigError::Invalid("lane_count must be > 0".into()));
        }
        if self.palette.is_empty() {
            return Err(ConfigError::Invalid("palette must not be empty".into()));
        }
        if let Some(bad) = self
            .palette
            .iter()
            .find(|hex| PlayerColor::from_hex(hex).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "palette entry {bad:?} is not a #RRGGBB color"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for (hex, color) in self.palette.iter().zip(self.palette_colors()) {
            if color == PlayerColor::GOLD || color == PlayerColor::BROWN {
                return Err(ConfigError::Invalid(format!(
                    "palette entry {hex:?} is reserved for special or penalty bubbles"
                )));
            }
            if !seen.insert(color) {
                return Err(ConfigError::Invalid(format!(
                    "palette entry {hex:?} duplicates an earlier color"
                )));
            }
        }
        for (name, p) in [
            ("penalty_chance", self.penalty_chance),
            ("special_chance", self.special_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1")));
            }
        }
        if self.spawn_radius < 0.0 || !self.spawn_radius.is_finite() {
            return Err(ConfigError::Invalid("spawn_radius must be >= 0".into()));
        }
        Ok(())
    }

    /// Parsed palette. Entries that fail to parse are skipped; `validate` rejects them.
    pub fn palette_colors(&self) -> Vec<PlayerColor> {
        self.palette
            .iter()
            .filter_map(|hex| PlayerColor::from_hex(hex))
            .collect()
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }
}
