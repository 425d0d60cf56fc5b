use shared::Team;
use std::collections::BTreeMap;

/// Point totals per team.
///
/// Clients always receive the full ledger rather than deltas, so a missed update is
/// healed by the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreLedger {
    points: BTreeMap<Team, i32>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self {
            points: Team::ALL.iter().map(|team| (*team, 0)).collect(),
        }
    }

    pub fn add(&mut self, team: Team, delta: i32) {
        *self.points.entry(team).or_insert(0) += delta;
    }

    pub fn get(&self, team: Team) -> i32 {
        self.points.get(&team).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<Team, i32> {
        self.points.clone()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ScoreLedger {
    fn default() -> Self {
        Self::new()
    }
}
