use crate::game::rules::{RulePolicy, WinScan};
use crate::knowledge::{Fact, Position};
use crate::model::{Outcome, PlayerId, Suit};
use std::collections::HashMap;

/// Players holding all four cards of some suit in every remaining world, in seat order.
pub fn forced_winners(position: &Position) -> Vec<PlayerId> {
    PlayerId::all(position.players())
        .filter(|&player| {
            Suit::all(position.suits())
                .any(|suit| position.is_forced(&Fact::holds_all(player, suit)))
        })
        .collect()
}

/// First member of `winners` in turn order starting at `start`.
pub fn tie_break(winners: &[PlayerId], start: PlayerId, players: u8) -> Option<PlayerId> {
    start
        .turn_order(players)
        .find(|player| winners.contains(player))
}

/// Winner of `position`, if any.
///
/// `asker` is the player whose ask produced the position, or `None` after a
/// skip or at the start of a game.
pub fn detect_forced_win(
    position: &Position,
    policy: &RulePolicy,
    asker: Option<PlayerId>,
) -> Option<PlayerId> {
    if policy.determined_deal_wins && position.is_determined() {
        if let Some(asker) = asker {
            return Some(asker);
        }
    }
    let winners = forced_winners(position);
    match winners.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            let start = match (policy.win_scan, asker) {
                (WinScan::FromAsker, Some(asker)) => asker,
                _ => position.mover(),
            };
            tie_break(&winners, start, position.players())
        }
    }
}

/// Positions visited in order, indexed for constant-time repetition lookup.
#[derive(Debug, Clone, Default)]
pub struct History {
    order: Vec<Position>,
    index: HashMap<Position, usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.index.contains_key(position)
    }

    /// Index of the earlier visit to `position`, if any.
    pub fn index_of(&self, position: &Position) -> Option<usize> {
        self.index.get(position).copied()
    }

    /// Appends `position` and returns its index. Already-visited positions are not re-added.
    pub fn push(&mut self, position: Position) -> usize {
        if let Some(existing) = self.index_of(&position) {
            return existing;
        }
        let at = self.order.len();
        self.index.insert(position.clone(), at);
        self.order.push(position);
        at
    }

    /// Forgets every position from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        while self.order.len() > len {
            if let Some(position) = self.order.pop() {
                self.index.remove(&position);
            }
        }
    }

    pub fn last(&self) -> Option<&Position> {
        self.order.last()
    }

    pub fn get(&self, at: usize) -> Option<&Position> {
        self.order.get(at)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.order.iter()
    }
}

/// Where a position comes to rest after terminal checks and automatic skips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub position: Position,
    pub skipped: Vec<PlayerId>,
    pub outcome: Option<Outcome>,
    /// History index of the earlier visit when the outcome is a repetition draw.
    pub repeated: Option<usize>,
}

impl Settlement {
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Runs the terminal checks on a freshly resolved position and skips empty-handed movers.
///
/// A forced win is checked before repetition; a position that is neither is
/// recorded in `history`. Each skip yields a new position that goes through the
/// same checks, with no asker.
pub fn settle(
    mut position: Position,
    history: &mut History,
    policy: &RulePolicy,
    mut asker: Option<PlayerId>,
) -> Settlement {
    let mut skipped = Vec::new();
    loop {
        if let Some(winner) = detect_forced_win(&position, policy, asker) {
            return Settlement {
                position,
                skipped,
                outcome: Some(Outcome::Winner(winner)),
                repeated: None,
            };
        }
        if let Some(earlier) = history.index_of(&position) {
            return Settlement {
                position,
                skipped,
                outcome: Some(Outcome::Draw),
                repeated: Some(earlier),
            };
        }
        history.push(position.clone());

        let mover = position.mover();
        if position.hand_size(mover) > 0 {
            return Settlement {
                position,
                skipped,
                outcome: None,
                repeated: None,
            };
        }
        skipped.push(mover);
        position = position.skip();
        asker = None;
    }
}
