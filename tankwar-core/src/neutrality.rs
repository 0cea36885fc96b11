//! Shoot history and the three-player non-aggression rule

use rustc_hash::FxHashMap;

use crate::vehicle::PlayerId;

/// Who fired on whom, per player, for the current round.
///
/// A player's bucket is cleared when that player starts its turn and the
/// whole ledger is dropped with the world at the start of every round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShotLedger {
    players: Vec<PlayerId>,
    fired_on: FxHashMap<PlayerId, Vec<PlayerId>>,
}

impl ShotLedger {
    pub fn new(players: impl IntoIterator<Item = PlayerId>) -> Self {
        let players: Vec<PlayerId> = players.into_iter().collect();
        let fired_on = players.iter().map(|&p| (p, Vec::new())).collect();
        Self { players, fired_on }
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn record(&mut self, shooter: PlayerId, target: PlayerId) {
        if shooter == target {
            return;
        }
        self.fired_on.entry(shooter).or_default().push(target);
    }

    pub fn clear(&mut self, player: PlayerId) {
        if let Some(bucket) = self.fired_on.get_mut(&player) {
            bucket.clear();
        }
    }

    pub fn has_fired_on(&self, shooter: PlayerId, target: PlayerId) -> bool {
        self.fired_on
            .get(&shooter)
            .is_some_and(|bucket| bucket.contains(&target))
    }

    /// Whether `shooter` must hold fire on `target`.
    ///
    /// Only meaningful with three or more players. The shooter may attack the
    /// target if the target attacked it, or if no third player is already
    /// attacking the target. Otherwise the shooter stays neutral.
    ///
    /// With no shots recorded nobody is neutral, as in the game's reference
    /// client; holding fire until someone else shoots first would mean no
    /// one ever could.
    pub fn is_neutral(&self, shooter: PlayerId, target: PlayerId) -> bool {
        if shooter == target || self.players.len() < 3 {
            return false;
        }
        if self.has_fired_on(target, shooter) {
            return false;
        }
        self.players
            .iter()
            .filter(|&&third| third != shooter && third != target)
            .any(|&third| self.has_fired_on(third, target))
    }
}
