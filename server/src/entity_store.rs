//! In-memory registries for the volatile objects of a session.
//!
//! Both stores are keyed by opaque string ids. Removal is idempotent: the
//! "arrow hit a player" and "arrow hit a wall" paths may both try to destroy the
//! same arrow, and the second attempt must be a silent no-op.

use log::debug;
use shared::{Arrow, Player, PlayerCoordinates, Team};
use std::collections::HashMap;

/// Anything that can live in an [`EntityStore`].
pub trait Entity {
    fn id(&self) -> &str;
}

impl Entity for Player {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Arrow {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct EntityStore<T> {
    entities: HashMap<String, T>,
}

pub type PlayerStore = EntityStore<Player>;
pub type ArrowStore = EntityStore<Arrow>;

impl<T: Entity + Clone> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    /// Stores a new entity. Returns false and keeps the existing entry if the id is
    /// already taken.
    pub fn insert(&mut self, entity: T) -> bool {
        if self.entities.contains_key(entity.id()) {
            return false;
        }
        self.entities.insert(entity.id().to_string(), entity);
        true
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Removes an entity. Unknown ids yield `None`, never an error.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let removed = self.entities.remove(id);
        if removed.is_none() {
            debug!("Ignoring removal of unknown entity {}", id);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    /// Owned copies of every stored entity.
    pub fn all(&self) -> Vec<T> {
        self.entities.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

impl<T: Entity + Clone> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore<Player> {
    /// Stores the last reported transform of a player and returns the update to relay,
    /// stamped with the player's id and current animation.
    ///
    /// Unknown ids are ignored; the event may belong to a connection that already left
    /// or has not joined yet.
    pub fn apply_movement(
        &mut self,
        id: &str,
        coords: &PlayerCoordinates,
    ) -> Option<PlayerCoordinates> {
        let player = self.entities.get_mut(id)?;

        player.x = coords.x;
        player.y = coords.y;
        player.velocity_x = coords.velocity_x;
        player.velocity_y = coords.velocity_y;
        if let Some(animation) = &coords.animation {
            player.animation = animation.clone();
        }

        Some(PlayerCoordinates {
            id: player.id.clone(),
            x: player.x,
            y: player.y,
            velocity_x: player.velocity_x,
            velocity_y: player.velocity_y,
            animation: Some(player.animation.clone()),
        })
    }

    pub fn count_team(&self, team: Team) -> usize {
        self.entities.values().filter(|p| p.team == team).count()
    }

    /// Every player except the one with the given id.
    pub fn all_except(&self, id: &str) -> Vec<Player> {
        self.entities
            .values()
            .filter(|p| p.id != id)
            .cloned()
            .collect()
    }
}
