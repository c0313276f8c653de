use super::player::PlayerId;
use crate::error::PreferenceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Terminal result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Winner(PlayerId),
    Draw,
}

impl Outcome {
    pub fn winner(self) -> Option<PlayerId> {
        match self {
            Outcome::Winner(player) => Some(player),
            Outcome::Draw => None,
        }
    }
}

/// A player's ranking of every possible outcome, best first.
///
/// A win of one's own always ranks first and a draw second; only the order of
/// the other players' wins is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceOrder {
    player: PlayerId,
    ranking: Vec<Outcome>,
}

impl PreferenceOrder {
    /// Validates a declared order over `{Draw} ∪ {Winner(q) | q ≠ player}`.
    pub fn declare(
        player: PlayerId,
        players: u8,
        order: &[Outcome],
    ) -> Result<Self, PreferenceError> {
        if player.index() >= players as usize {
            return Err(PreferenceError::UnknownPlayer {
                player,
                players: players as usize,
            });
        }

        let mut seen = HashSet::new();
        for &outcome in order {
            let expected = match outcome {
                Outcome::Draw => true,
                Outcome::Winner(other) => other != player && other.index() < players as usize,
            };
            if !expected {
                return Err(PreferenceError::Unexpected(outcome));
            }
            if !seen.insert(outcome) {
                return Err(PreferenceError::Duplicate(outcome));
            }
        }

        if !seen.contains(&Outcome::Draw) {
            return Err(PreferenceError::Missing(Outcome::Draw));
        }
        if let Some(missing) = PlayerId::all(players)
            .filter(|&other| other != player)
            .map(Outcome::Winner)
            .find(|outcome| !seen.contains(outcome))
        {
            return Err(PreferenceError::Missing(missing));
        }
        if order.first() != Some(&Outcome::Draw) {
            return Err(PreferenceError::DrawNotSecond);
        }

        let mut ranking = Vec::with_capacity(order.len() + 1);
        ranking.push(Outcome::Winner(player));
        ranking.extend_from_slice(order);
        Ok(Self { player, ranking })
    }

    /// Shorthand for declaring only the order in which other players' wins are preferred.
    pub fn from_other_winners(
        player: PlayerId,
        players: u8,
        others: &[PlayerId],
    ) -> Result<Self, PreferenceError> {
        let mut order = Vec::with_capacity(others.len() + 1);
        order.push(Outcome::Draw);
        order.extend(others.iter().copied().map(Outcome::Winner));
        Self::declare(player, players, &order)
    }

    /// Prefers the other players' wins in seat order after `player`.
    pub fn seat_order(player: PlayerId, players: u8) -> Self {
        let mut ranking = vec![Outcome::Winner(player), Outcome::Draw];
        ranking.extend(player.turn_order(players).skip(1).map(Outcome::Winner));
        Self { player, ranking }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn ranking(&self) -> &[Outcome] {
        &self.ranking
    }

    /// Position of `outcome` in the ranking; lower is better.
    pub fn rank(&self, outcome: Outcome) -> usize {
        self.ranking
            .iter()
            .position(|&ranked| ranked == outcome)
            .unwrap_or(self.ranking.len())
    }

    pub fn prefers(&self, a: Outcome, b: Outcome) -> bool {
        self.rank(a) < self.rank(b)
    }
}

/// Declared preference orders for every seat of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceProfile {
    orders: Vec<Option<PreferenceOrder>>,
}

impl PreferenceProfile {
    pub fn new(players: u8) -> Self {
        Self {
            orders: vec![None; players as usize],
        }
    }

    /// Every seat prefers other winners in seat order after itself.
    pub fn seat_order(players: u8) -> Self {
        Self {
            orders: PlayerId::all(players)
                .map(|player| Some(PreferenceOrder::seat_order(player, players)))
                .collect(),
        }
    }

    pub fn players(&self) -> u8 {
        self.orders.len() as u8
    }

    pub fn set(&mut self, order: PreferenceOrder) -> Result<(), PreferenceError> {
        let player = order.player();
        let players = self.orders.len();
        let slot = self
            .orders
            .get_mut(player.index())
            .ok_or(PreferenceError::UnknownPlayer { player, players })?;
        *slot = Some(order);
        Ok(())
    }

    pub fn get(&self, player: PlayerId) -> Option<&PreferenceOrder> {
        self.orders.get(player.index()).and_then(Option::as_ref)
    }

    /// First seat without a declared order, if any.
    pub fn first_missing(&self) -> Option<PlayerId> {
        self.orders
            .iter()
            .position(Option::is_none)
            .map(|index| PlayerId::new(index as u8))
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }
}
