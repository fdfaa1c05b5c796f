//! Static scan-code catalogs.
//!
//! Every printed marker in the play area decodes to a small integer. Codes
//! 1-8 identify players, 9-11 weapons and 12-14 power-ups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A player's scan code for the current roster composition.
pub type Symbol = u8;

/// Pool of player codes, handed out in roster order.
pub const SYMBOLS: [Symbol; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponKind {
    #[default]
    Pistol,
    Shotgun,
    Sniper,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 3] = [WeaponKind::Pistol, WeaponKind::Shotgun, WeaponKind::Sniper];

    /// Resolves a scanned weapon marker, `None` for any other code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|weapon| weapon.code() == code)
    }

    pub fn code(self) -> u8 {
        match self {
            WeaponKind::Pistol => 9,
            WeaponKind::Shotgun => 10,
            WeaponKind::Sniper => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WeaponKind::Pistol => "Pistol",
            WeaponKind::Shotgun => "Shotgun",
            WeaponKind::Sniper => "Sniper",
        }
    }

    /// Health removed from the target per successful shot.
    pub fn damage(self) -> i32 {
        match self {
            WeaponKind::Pistol => 10,
            WeaponKind::Shotgun => 20,
            WeaponKind::Sniper => 99,
        }
    }
}

impl fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    HealthPack,
    Invisibility,
    ScoreMultiplier,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::HealthPack,
        PowerUpKind::Invisibility,
        PowerUpKind::ScoreMultiplier,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|power_up| power_up.code() == code)
    }

    pub fn code(self) -> u8 {
        match self {
            PowerUpKind::HealthPack => 12,
            PowerUpKind::Invisibility => 13,
            PowerUpKind::ScoreMultiplier => 14,
        }
    }

    /// Label shown on the buff indicator while the effect is live.
    pub fn name(self) -> &'static str {
        match self {
            PowerUpKind::HealthPack => "Health Pack",
            PowerUpKind::Invisibility => "Invisibility",
            PowerUpKind::ScoreMultiplier => "Score Multiplier",
        }
    }

    pub fn cost(self) -> u32 {
        10
    }

    /// Time units until the buff label (and any transient flag) is cleared.
    pub fn duration_units(self) -> u32 {
        match self {
            PowerUpKind::HealthPack => 3,
            PowerUpKind::Invisibility | PowerUpKind::ScoreMultiplier => 10,
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
