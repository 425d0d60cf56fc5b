//! The authoritative state of one session.
//!
//! `GameState` owns every entity store, the score ledger, the cached team bases and
//! the lifecycle. The dispatcher holds exactly one instance and threads it through
//! every handler, which keeps a single writer for all game data.

use crate::combat::{resolve_hit, HitOutcome};
use crate::config::GameRules;
use crate::entity_store::{ArrowStore, PlayerStore};
use crate::score::ScoreLedger;
use crate::session::Lifecycle;
use crate::teams::{assign_team, SpawnAllocator};
use crate::utils::{generate_id, get_timestamp};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Arrow, AuthenticationData, Direction, Player, PlayerCoordinates, PlayerReviveData, ShootData,
    TeamBase, Timestamp,
};

#[derive(Debug)]
pub struct GameState {
    pub rules: GameRules,
    pub players: PlayerStore,
    pub arrows: ArrowStore,
    pub score: ScoreLedger,
    pub spawns: SpawnAllocator,
    pub lifecycle: Lifecycle,
    rng: StdRng,
}

impl GameState {
    pub fn new(rules: GameRules) -> Self {
        Self::with_rng(rules, StdRng::from_entropy())
    }

    /// Uses the given generator for spawn placement, e.g. a seeded one in tests.
    pub fn with_rng(rules: GameRules, rng: StdRng) -> Self {
        Self {
            rules,
            players: PlayerStore::new(),
            arrows: ArrowStore::new(),
            score: ScoreLedger::new(),
            spawns: SpawnAllocator::new(),
            lifecycle: Lifecycle::new(),
            rng,
        }
    }

    pub fn configure_bases(&mut self, bases: Vec<TeamBase>) -> bool {
        self.spawns.configure(bases)
    }

    /// Creates the player for a connection on the smaller team, inside its base.
    /// Returns `None` if the connection already has a player.
    pub fn add_player(&mut self, id: &str, auth: AuthenticationData) -> Option<Player> {
        if self.players.contains(id) {
            warn!("Connection {} already has a player", id);
            return None;
        }

        let team = assign_team(&self.players);
        let spawn = self.spawns.spawn_point(team, &self.rules, &mut self.rng);
        let player = Player::new(id.to_string(), auth, team, spawn, self.rules.base_health);

        info!(
            "Added player {} ({}) to team {:?} at ({}, {})",
            player.name, id, team, player.x, player.y
        );
        self.players.insert(player.clone());
        Some(player)
    }

    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let removed = self.players.remove(id);
        if let Some(player) = &removed {
            info!("Removed player {} ({})", player.name, id);
        }
        removed
    }

    pub fn apply_movement(&mut self, id: &str, coords: &PlayerCoordinates) -> Option<PlayerCoordinates> {
        self.players.apply_movement(id, coords)
    }

    /// Registers an arrow fired by `owner_id`.
    ///
    /// Returns `None` if the owner is unknown or the direction is not one of the four
    /// cardinal unit vectors. Team and angle are taken from the server's records, not
    /// from the client.
    pub fn fire_arrow(&mut self, owner_id: &str, shot: &ShootData) -> Option<Arrow> {
        let direction = Direction::from_components(shot.pos_diff_x, shot.pos_diff_y)?;
        let owner = self.players.get_mut(owner_id)?;
        owner.statistics.arrows_fired += 1;

        let arrow = Arrow::new(generate_id(), owner, (shot.x, shot.y), direction, get_timestamp());
        self.arrows.insert(arrow.clone());
        Some(arrow)
    }

    pub fn destroy_arrow(&mut self, id: &str) -> Option<Arrow> {
        self.arrows.remove(id)
    }

    /// Drops arrows fired more than `arrow_lifetime_ms` before `now`. Their shooter
    /// may have left before reporting a destroy, so nobody else ever will.
    pub fn expire_arrows(&mut self, now: Timestamp) -> usize {
        let lifetime = self.rules.arrow_lifetime_ms;
        let expired: Vec<String> = self
            .arrows
            .iter()
            .filter(|arrow| now.saturating_sub(arrow.created_at) > lifetime)
            .map(|arrow| arrow.id.clone())
            .collect();
        for id in &expired {
            self.arrows.remove(id);
        }
        if !expired.is_empty() {
            debug!("Expired {} stale arrows", expired.len());
        }
        expired.len()
    }

    pub fn resolve_hit(&mut self, player_id: &str, arrow_id: &str) -> Option<HitOutcome> {
        resolve_hit(
            &mut self.players,
            &mut self.arrows,
            &mut self.score,
            &self.rules,
            player_id,
            arrow_id,
        )
    }

    /// Restores a player to full health at a fresh point in its own base.
    pub fn revive_player(&mut self, id: &str) -> Option<PlayerReviveData> {
        let team = self.players.get(id)?.team;
        let spawn = self.spawns.spawn_point(team, &self.rules, &mut self.rng);
        let base_health = self.rules.base_health;

        let player = self.players.get_mut(id)?;
        player.revive(spawn, base_health);

        Some(PlayerReviveData {
            id: player.id.clone(),
            x: player.x,
            y: player.y,
            health: player.health,
        })
    }

    /// Ends the session: no new players, all players and arrows dropped. The score
    /// stays readable until the next reset.
    pub fn stop(&mut self) {
        self.lifecycle.stop();
        self.players.clear();
        self.arrows.clear();
    }

    /// Wipes the session and starts accepting players again. The team bases are
    /// forgotten, so the next player triggers a new setup handshake.
    pub fn reset(&mut self) {
        self.players.clear();
        self.arrows.clear();
        self.score.reset();
        self.spawns.clear();
        self.lifecycle.reset();
    }
}
