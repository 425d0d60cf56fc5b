//! Team assignment and spawn placement.

use crate::config::GameRules;
use crate::entity_store::PlayerStore;
use crate::utils::{random_coordinates, sample_in_base};
use log::{info, warn};
use rand::Rng;
use shared::{Team, TeamBase};

/// Picks the team with fewer connected players. Ties go to red.
pub fn assign_team(players: &PlayerStore) -> Team {
    let red = players.count_team(Team::Red);
    let blue = players.count_team(Team::Blue);
    if blue < red {
        Team::Blue
    } else {
        Team::Red
    }
}

/// Holds the team bases reported by the setup handshake and turns them into spawn points.
///
/// Until [`SpawnAllocator::configure`] has been called the allocator is unconfigured;
/// the dispatcher keeps players out of the session until then.
#[derive(Debug, Default, Clone)]
pub struct SpawnAllocator {
    bases: Option<Vec<TeamBase>>,
}

impl SpawnAllocator {
    pub fn new() -> Self {
        Self { bases: None }
    }

    pub fn is_configured(&self) -> bool {
        self.bases.is_some()
    }

    /// Caches the bases for the rest of the session. Returns false if bases were
    /// already set; they are read-only once configured.
    ///
    /// Bases that are not finite, non-negative rectangles are dropped, and their team
    /// spawns anywhere in the arena.
    pub fn configure(&mut self, bases: Vec<TeamBase>) -> bool {
        if self.bases.is_some() {
            return false;
        }
        let bases: Vec<TeamBase> = bases
            .into_iter()
            .filter(|base| {
                let usable = is_usable(base);
                if !usable {
                    warn!("Dropping malformed {:?} base {:?}", base.team, base);
                }
                usable
            })
            .collect();
        for team in Team::ALL {
            if !bases.iter().any(|b| b.team == team) {
                warn!("No base reported for team {:?}, spawning it anywhere", team);
            }
        }
        info!("Configured {} team bases", bases.len());
        self.bases = Some(bases);
        true
    }

    pub fn clear(&mut self) {
        self.bases = None;
    }

    pub fn bases(&self) -> &[TeamBase] {
        self.bases.as_deref().unwrap_or(&[])
    }

    /// A point inside the team's base, inset by the spawn margins. Falls back to a
    /// random arena point when the team has no usable base.
    pub fn spawn_point<R: Rng>(&self, team: Team, rules: &GameRules, rng: &mut R) -> (f32, f32) {
        self.bases()
            .iter()
            .find(|b| b.team == team)
            .and_then(|base| {
                sample_in_base(rng, base, rules.spawn_margin_x, rules.spawn_margin_y)
            })
            .unwrap_or_else(|| random_coordinates(rng, rules.arena_width, rules.arena_height))
    }
}

fn is_usable(base: &TeamBase) -> bool {
    let right = base.x + base.width;
    let bottom = base.y + base.height;
    [base.x, base.y, base.width, base.height, right, bottom]
        .iter()
        .all(|v| v.is_finite())
        && base.width >= 0.0
        && base.height >= 0.0
}
