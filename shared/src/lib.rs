//! Types and constants shared between the arena server and its clients.
//!
//! `Player` and `Arrow` double as the server's authoritative state records and as the
//! payloads relayed to clients, so both ends of the channel agree on one shape.

pub mod protocol;

use serde::{Deserialize, Serialize};

pub use protocol::{
    decode, encode, events, AuthenticationData, ClientEvent, EntityRef, PlayerCoordinates,
    PlayerHealthData, PlayerHitData, PlayerReviveData, ProtocolError, ReviveData, ServerEvent,
    SetupData, ShootData,
};

pub const BASE_HEALTH: u32 = 10;
pub const POINTS_HIT: i32 = 10;
pub const POINTS_BONUS_DEADLY_HIT: i32 = 20;
pub const POINTS_FRIENDLY_HIT: i32 = -5;

pub const ARENA_WIDTH: u32 = 800;
pub const ARENA_HEIGHT: u32 = 600;
/// Horizontal inset applied to a team base before sampling a spawn point.
pub const SPAWN_MARGIN_X: f32 = 32.0;
/// Vertical inset applied to a team base before sampling a spawn point.
pub const SPAWN_MARGIN_Y: f32 = 32.0;

/// Arrows older than this are dropped from the snapshot sent to joining players.
pub const ARROW_LIFETIME_MS: u64 = 10_000;

pub const DEFAULT_ANIMATION: &str = "stand_down";

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// The four directions an arrow may travel in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Maps a `(posDiffX, posDiffY)` pair onto a cardinal direction.
    /// Anything that is not a unit step along exactly one axis is rejected.
    pub fn from_components(dx: f32, dy: f32) -> Option<Direction> {
        match (dx, dy) {
            (x, y) if x == -1.0 && y == 0.0 => Some(Direction::Left),
            (x, y) if x == 1.0 && y == 0.0 => Some(Direction::Right),
            (x, y) if x == 0.0 && y == -1.0 => Some(Direction::Up),
            (x, y) if x == 0.0 && y == 1.0 => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn components(self) -> (f32, f32) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }

    /// Sprite rotation in degrees; the arrow graphic points left at 0.
    pub fn angle(self) -> f32 {
        match self {
            Direction::Left => 0.0,
            Direction::Up => 90.0,
            Direction::Right => 180.0,
            Direction::Down => 270.0,
        }
    }
}

/// Per-player counters. They only ever grow while the player entry lives.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub arrows_fired: u32,
    pub deaths: u32,
    /// Times this player was hit.
    pub hits_taken: u32,
    /// Times this player's arrows hit somebody.
    pub hits: u32,
    pub friendly_hits: u32,
    pub deadly_hits: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub character: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub animation: String,
    pub health: u32,
    pub statistics: Statistics,
}

impl Player {
    pub fn new(
        id: String,
        auth: AuthenticationData,
        team: Team,
        (x, y): (f32, f32),
        health: u32,
    ) -> Self {
        Self {
            id,
            name: auth.name,
            character: auth.character,
            team,
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            animation: DEFAULT_ANIMATION.to_string(),
            health,
            statistics: Statistics::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    /// Takes one point of damage. Returns true when this hit was the killing blow.
    pub fn take_hit(&mut self) -> bool {
        let was_alive = self.health > 0;
        self.health = self.health.saturating_sub(1);
        self.statistics.hits_taken += 1;

        let killed = was_alive && self.health == 0;
        if killed {
            self.statistics.deaths += 1;
        }
        killed
    }

    /// Restores full health at a fresh position and clears any motion.
    pub fn revive(&mut self, (x, y): (f32, f32), health: u32) {
        self.x = x;
        self.y = y;
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.health = health;
        self.animation = DEFAULT_ANIMATION.to_string();
    }
}

/// An arrow in flight. Only its launch parameters are tracked; the clients simulate
/// the trajectory and report collisions back.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Arrow {
    pub id: String,
    pub player_id: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub pos_diff_x: f32,
    pub pos_diff_y: f32,
    pub angle: f32,
    pub created_at: Timestamp,
}

impl Arrow {
    pub fn new(
        id: String,
        owner: &Player,
        (x, y): (f32, f32),
        direction: Direction,
        created_at: Timestamp,
    ) -> Self {
        let (pos_diff_x, pos_diff_y) = direction.components();
        Self {
            id,
            player_id: owner.id.clone(),
            team: owner.team,
            x,
            y,
            pos_diff_x,
            pos_diff_y,
            angle: direction.angle(),
            created_at,
        }
    }
}

/// A rectangular spawn region belonging to one team, taken from the map data.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TeamBase {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub team: Team,
}

impl TeamBase {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}
