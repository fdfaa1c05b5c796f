pub mod catalog;

pub use catalog::{PowerUpKind, Symbol, WeaponKind, SYMBOLS};

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PROTOCOL_VERSION: u32 = 1;

pub const MAX_PLAYERS: usize = 8;
pub const MIN_PLAYERS: usize = 2;
/// Longest accepted display name, in characters. Keeps a full roster
/// snapshot inside one datagram.
pub const MAX_NAME_LEN: usize = 32;
pub const TAG_TARGET: u32 = 12;
pub const STARTING_HEALTH: i32 = 100;
pub const SHOT_POINTS: u32 = 10;
pub const SCORE_MULT_FACTOR: u32 = 2;
pub const TREASURE_VALUE: u32 = 50;
pub const HEALTH_PACK_BONUS: i32 = 50;

pub const COUNTDOWN_FROM: u32 = 3;
pub const RESET_DELAY_UNITS: u32 = 5;
/// Wall-clock length of one game time unit.
pub const TIME_UNIT: Duration = Duration::from_secs(1);

/// Ephemeral per-connection identifier, assigned by the server.
pub type ConnectionId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    Player,
    Spectator,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub leader: bool,
    pub is_ready: bool,
    pub is_spectator: bool,
    pub health: i32,
    pub points: u32,
    pub tags: u32,
    pub gun: WeaponKind,
    pub active_power_up: Option<PowerUpKind>,
    pub used_health_pack: bool,
    pub used_invisibility: bool,
    pub used_score_multiplier: bool,
    pub used_treasure: bool,
    pub symbol: Option<Symbol>,
    pub is_invisible: bool,
    pub is_score_mult_active: bool,
}

impl Player {
    pub fn new(id: ConnectionId, name: String, is_spectator: bool, leader: bool) -> Self {
        Self {
            id,
            name,
            leader,
            is_ready: false,
            is_spectator,
            health: STARTING_HEALTH,
            points: 0,
            tags: 0,
            gun: WeaponKind::default(),
            active_power_up: None,
            used_health_pack: false,
            used_invisibility: false,
            used_score_multiplier: false,
            used_treasure: false,
            symbol: None,
            is_invisible: false,
            is_score_mult_active: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn has_used(&self, power_up: PowerUpKind) -> bool {
        match power_up {
            PowerUpKind::HealthPack => self.used_health_pack,
            PowerUpKind::Invisibility => self.used_invisibility,
            PowerUpKind::ScoreMultiplier => self.used_score_multiplier,
        }
    }

    pub fn mark_used(&mut self, power_up: PowerUpKind) {
        match power_up {
            PowerUpKind::HealthPack => self.used_health_pack = true,
            PowerUpKind::Invisibility => self.used_invisibility = true,
            PowerUpKind::ScoreMultiplier => self.used_score_multiplier = true,
        }
    }

    /// Points earned for one successful shot with the current modifiers.
    pub fn shot_reward(&self) -> u32 {
        if self.is_score_mult_active {
            SHOT_POINTS * SCORE_MULT_FACTOR
        } else {
            SHOT_POINTS
        }
    }
}

/// Already-decoded requests coming from the marker-detection layer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientAction {
    RequestSymbol,
    JoinLobby { name: String, role: JoinRole },
    ToggleReady,
    TriggerStart,
    Shoot { target_symbol: Symbol },
    PowerUp { code: u8 },
    TreasureFound,
    ChangeGun { code: u8 },
    SendEmoji { target_name: String, emoji: String },
}

/// Summaries shown in every participant's live feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Shot {
        shooter: String,
        target: String,
        weapon: WeaponKind,
        timestamp: u64,
    },
    Death {
        killer: String,
        victim: String,
        timestamp: u64,
    },
    PowerUp {
        player: String,
        power_up: PowerUpKind,
        timestamp: u64,
    },
    Treasure {
        player: String,
        timestamp: u64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    YourSymbol { symbol: Option<Symbol> },
    LobbyUpdate { players: Vec<Player> },
    DisplayStart { players: Vec<Player> },
    EnableStart,
    Countdown { remaining: u32 },
    GameStarted { players: Vec<Player> },
    PlayerUpdate { players: Vec<Player> },
    ShotNotice,
    DeathNotice { shooter_name: String },
    LiveFeed(LiveEvent),
    PowerUpAck,
    FailedPurchase { power_up: PowerUpKind, cost: u32 },
    RepeatUse { power_up: PowerUpKind },
    WeaponChanged { weapon: WeaponKind },
    TreasureAck,
    InvisibilityNotice { target_name: String },
    GameEnd { winner: Player, players: Vec<Player> },
    Victory,
    Defeat,
    SessionReset,
    EmojiReceived { from: String, emoji: String },
    JoinRejected { reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect { client_version: u32 },
    Heartbeat,
    Action(ClientAction),
    Disconnect,

    Connected { client_id: ConnectionId },
    Event(ServerEvent),
    Disconnected { reason: String },
}
