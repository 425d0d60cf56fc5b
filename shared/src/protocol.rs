//! Wire protocol between the arena server and its clients.
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`. Payload-less events may omit `data`.

use crate::{Arrow, Player, Team, TeamBase};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Event names understood by both ends of the channel.
///
/// The `#[serde(rename)]` attributes on [`ClientEvent`] and [`ServerEvent`] must use
/// exactly these strings.
pub mod events {
    pub const AUTHENTICATION: &str = "authentication:successful";
    pub const SETUP: &str = "game:setup";
    pub const POINTS: &str = "game:points";

    pub const RECONNECT: &str = "reconnect";
    pub const STOP: &str = "stop";
    pub const RESET: &str = "reset";

    pub const PLAYER_JOINED: &str = "player:joined";
    pub const PLAYERS: &str = "actors:collection";
    pub const PROTAGONIST: &str = "player:protagonist";
    pub const COORDINATES: &str = "player:coordinates";
    pub const REVIVE: &str = "player:revive";
    pub const HIT: &str = "player:hit";
    pub const QUIT: &str = "player:left";

    pub const ARROW_SHOOT: &str = "arrow:shoot";
    pub const ARROW_CREATE: &str = "arrow:create";
    pub const ARROW_DESTROY: &str = "arrow:destroy";
    pub const ARROWS: &str = "arrow:collection";
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported frame type: {0}")]
    UnsupportedFrame(&'static str),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthenticationData {
    pub name: String,
    pub character: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SetupData {
    pub bases: Vec<TeamBase>,
}

/// Last known transform of a player. `id` is overwritten with the sender's id
/// before it is relayed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCoordinates {
    #[serde(default)]
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub velocity_x: f32,
    #[serde(default)]
    pub velocity_y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

/// A shot as requested by a client. Client-side `id`, `team` and `angle` values are
/// ignored; the server derives them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootData {
    pub player_id: String,
    pub x: f32,
    pub y: f32,
    pub pos_diff_x: f32,
    pub pos_diff_y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHitData {
    pub player_id: String,
    pub arrow_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviveData {
    pub player_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerHealthData {
    pub id: String,
    pub health: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerReviveData {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub health: u32,
}

/// Reference to a player or arrow by id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntityRef {
    pub id: String,
}

/// Events sent from a client to the server.
///
/// Each rename must equal a constant in [`events`]; `name()` and the name-table tests
/// catch any drift between the two.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "authentication:successful")]
    Authenticate(AuthenticationData),
    #[serde(rename = "game:setup")]
    Setup(SetupData),
    #[serde(rename = "player:coordinates")]
    Move(PlayerCoordinates),
    #[serde(rename = "arrow:shoot")]
    Shoot(ShootData),
    #[serde(rename = "arrow:destroy")]
    DestroyArrow(EntityRef),
    #[serde(rename = "player:hit")]
    Hit(PlayerHitData),
    #[serde(rename = "player:revive")]
    Revive(ReviveData),
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "reset")]
    Reset,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate(_) => events::AUTHENTICATION,
            ClientEvent::Setup(_) => events::SETUP,
            ClientEvent::Move(_) => events::COORDINATES,
            ClientEvent::Shoot(_) => events::ARROW_SHOOT,
            ClientEvent::DestroyArrow(_) => events::ARROW_DESTROY,
            ClientEvent::Hit(_) => events::HIT,
            ClientEvent::Revive(_) => events::REVIVE,
            ClientEvent::Stop => events::STOP,
            ClientEvent::Reset => events::RESET,
        }
    }
}

/// Events sent from the server to clients.
///
/// Renames follow the same rule as [`ClientEvent`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Asks a client to report the team bases of its map.
    #[serde(rename = "game:setup")]
    SetupRequest,
    /// The complete score ledger.
    #[serde(rename = "game:points")]
    Points(BTreeMap<Team, i32>),
    /// The connection refers to a player the server no longer knows; the client must reload.
    #[serde(rename = "reconnect")]
    Reconnect,
    #[serde(rename = "stop")]
    Stopped,
    #[serde(rename = "player:joined")]
    Joined(Player),
    #[serde(rename = "actors:collection")]
    Players(Vec<Player>),
    #[serde(rename = "player:protagonist")]
    Protagonist(Player),
    #[serde(rename = "player:coordinates")]
    Moved(PlayerCoordinates),
    #[serde(rename = "player:revive")]
    Revived(PlayerReviveData),
    #[serde(rename = "player:hit")]
    Hit(PlayerHealthData),
    #[serde(rename = "player:left")]
    Left(EntityRef),
    #[serde(rename = "arrow:create")]
    ArrowCreated(Arrow),
    #[serde(rename = "arrow:destroy")]
    ArrowDestroyed(EntityRef),
    #[serde(rename = "arrow:collection")]
    Arrows(Vec<Arrow>),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::SetupRequest => events::SETUP,
            ServerEvent::Points(_) => events::POINTS,
            ServerEvent::Reconnect => events::RECONNECT,
            ServerEvent::Stopped => events::STOP,
            ServerEvent::Joined(_) => events::PLAYER_JOINED,
            ServerEvent::Players(_) => events::PLAYERS,
            ServerEvent::Protagonist(_) => events::PROTAGONIST,
            ServerEvent::Moved(_) => events::COORDINATES,
            ServerEvent::Revived(_) => events::REVIVE,
            ServerEvent::Hit(_) => events::HIT,
            ServerEvent::Left(_) => events::QUIT,
            ServerEvent::ArrowCreated(_) => events::ARROW_CREATE,
            ServerEvent::ArrowDestroyed(_) => events::ARROW_DESTROY,
            ServerEvent::Arrows(_) => events::ARROWS,
        }
    }
}

pub fn encode<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
