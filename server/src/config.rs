//! Session rules and transport settings.

use shared::{
    ARENA_HEIGHT, ARENA_WIDTH, ARROW_LIFETIME_MS, BASE_HEALTH, POINTS_BONUS_DEADLY_HIT, POINTS_FRIENDLY_HIT,
    POINTS_HIT, SPAWN_MARGIN_X, SPAWN_MARGIN_Y,
};
use std::time::Duration;

/// Constants fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    pub base_health: u32,
    pub points_hit: i32,
    pub points_bonus_deadly_hit: i32,
    pub points_friendly_hit: i32,
    pub arena_width: u32,
    pub arena_height: u32,
    pub spawn_margin_x: f32,
    pub spawn_margin_y: f32,
    /// Arrows still in flight after this many milliseconds are considered lost
    pub arrow_lifetime_ms: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            base_health: BASE_HEALTH,
            points_hit: POINTS_HIT,
            points_bonus_deadly_hit: POINTS_BONUS_DEADLY_HIT,
            points_friendly_hit: POINTS_FRIENDLY_HIT,
            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
            spawn_margin_x: SPAWN_MARGIN_X,
            spawn_margin_y: SPAWN_MARGIN_Y,
            arrow_lifetime_ms: ARROW_LIFETIME_MS,
        }
    }
}

impl GameRules {
    pub fn with_base_health(mut self, base_health: u32) -> Self {
        self.base_health = base_health.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrent connections
    pub max_clients: usize,
    /// Connections silent for longer than this are dropped
    pub client_timeout: Duration,
    /// Interval between WebSocket pings sent to each client
    pub ping_interval: Duration,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 32,
            client_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(10),
            rules: GameRules::default(),
        }
    }
}
