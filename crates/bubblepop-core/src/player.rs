use serde::{Deserialize, Serialize};

/// Unique identifier for a player in the world.
pub type PlayerId = u64;

/// A player present in the world. The core only ever compares players by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Color token used to tie regular bubbles to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    pub const RED: PlayerColor = PlayerColor { r: 255, g: 0, b: 0 };
    pub const GREEN: PlayerColor = PlayerColor { r: 0, g: 255, b: 0 };
    pub const BLUE: PlayerColor = PlayerColor { r: 0, g: 0, b: 255 };
    pub const YELLOW: PlayerColor = PlayerColor {
        r: 255,
        g: 255,
        b: 0,
    };
    pub const MAGENTA: PlayerColor = PlayerColor {
        r: 255,
        g: 0,
        b: 255,
    };
    pub const CYAN: PlayerColor = PlayerColor {
        r: 0,
        g: 255,
        b: 255,
    };

    /// Color of special (bonus) bubbles.
    pub const GOLD: PlayerColor = PlayerColor {
        r: 255,
        g: 215,
        b: 0,
    };

    /// Color of penalty bubbles.
    pub const BROWN: PlayerColor = PlayerColor {
        r: 139,
        g: 69,
        b: 19,
    };

    /// Default player palette, in its unshuffled order.
    pub const PALETTE: &[PlayerColor] = &[
        Self::RED,
        Self::GREEN,
        Self::BLUE,
        Self::YELLOW,
        Self::MAGENTA,
        Self::CYAN,
    ];

    /// `#RRGGBB` form.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse a `#RRGGBB` (or `RRGGBB`) string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Human readable name shown on the player's UI.
    pub fn name(self) -> &'static str {
        match self {
            Self::RED => "red",
            Self::GREEN => "green",
            Self::BLUE => "blue",
            Self::YELLOW => "yellow",
            Self::MAGENTA => "magenta",
            Self::CYAN => "cyan",
            Self::GOLD => "gold",
            Self::BROWN => "brown",
            _ => "assigned",
        }
    }
}
