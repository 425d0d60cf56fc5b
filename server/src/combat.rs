//! Resolution of client-reported arrow hits.
//!
//! The client engine decides when an arrow touches a player and reports it; this
//! module applies the consequences. A resolution runs start to finish inside one
//! dispatcher turn, so no other report can observe a half-applied hit.

use crate::config::GameRules;
use crate::entity_store::{ArrowStore, PlayerStore};
use crate::score::ScoreLedger;
use log::debug;
use shared::PlayerHealthData;

/// What a resolved hit changed.
#[derive(Debug, Clone, PartialEq)]
pub struct HitOutcome {
    /// New health of the target, to broadcast.
    pub health: PlayerHealthData,
    /// Id of the arrow consumed by the hit.
    pub destroyed_arrow: Option<String>,
    pub score_changed: bool,
    pub killing_blow: bool,
}

/// Applies a hit of `arrow_id` on `player_id`.
///
/// Returns `None` without touching any state when the target is unknown or the arrow
/// is no longer in flight. An arrow resolves at most one hit, so a duplicate report
/// for the same pair is a no-op.
pub fn resolve_hit(
    players: &mut PlayerStore,
    arrows: &mut ArrowStore,
    score: &mut ScoreLedger,
    rules: &GameRules,
    player_id: &str,
    arrow_id: &str,
) -> Option<HitOutcome> {
    if !players.contains(player_id) {
        debug!("Hit reported on unknown player {}", player_id);
        return None;
    }
    let Some(arrow) = arrows.get(arrow_id).cloned() else {
        debug!("Hit reported with stale arrow {}", arrow_id);
        return None;
    };

    let (target_team, health, killing_blow) = {
        let target = players.get_mut(player_id)?;
        let killed = target.take_hit();
        (target.team, target.health, killed)
    };

    let mut score_changed = false;
    if let Some(owner) = players.get_mut(&arrow.player_id) {
        owner.statistics.hits += 1;

        if arrow.team == target_team {
            owner.statistics.friendly_hits += 1;
            score.add(arrow.team, rules.points_friendly_hit);
        } else {
            score.add(arrow.team, rules.points_hit);
            if killing_blow {
                owner.statistics.deadly_hits += 1;
                score.add(arrow.team, rules.points_bonus_deadly_hit);
            }
        }
        score_changed = true;
    } else {
        debug!(
            "Owner {} of arrow {} has left, no points awarded",
            arrow.player_id, arrow.id
        );
    }

    let destroyed_arrow = arrows.remove(arrow_id).map(|a| a.id);

    Some(HitOutcome {
        health: PlayerHealthData {
            id: player_id.to_string(),
            health,
        },
        destroyed_arrow,
        score_changed,
        killing_blow,
    })
}
