use super::player::PlayerId;
use super::suit::{CARDS_PER_SUIT, Suit};
use crate::error::GameError;
use core::fmt;

/// One complete hypothesis of how many cards of each suit each player holds.
///
/// Counts are stored suit-major, so worlds order lexicographically by the first
/// suit's distribution, then the second, and so on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct World {
    players: u8,
    counts: Box<[u8]>,
}

impl World {
    /// Builds a world from a suit-major count table (`counts[suit * players + player]`).
    pub fn from_counts(players: u8, counts: Vec<u8>) -> Self {
        debug_assert!(players > 0 && counts.len() % players as usize == 0);
        Self {
            players,
            counts: counts.into_boxed_slice(),
        }
    }

    /// Builds a world from one row of suit counts per player.
    pub fn from_hands(hands: &[&[u8]]) -> Self {
        let players = hands.len();
        let suits = hands.first().map(|row| row.len()).unwrap_or(0);
        let mut counts = vec![0; suits * players];
        for (player, row) in hands.iter().enumerate() {
            for (suit, &count) in row.iter().enumerate() {
                counts[suit * players + player] = count;
            }
        }
        Self::from_counts(players as u8, counts)
    }

    pub fn players(&self) -> u8 {
        self.players
    }

    pub fn suits(&self) -> u8 {
        (self.counts.len() / self.players as usize) as u8
    }

    /// Cards of `suit` held by `player`. A seat or suit outside the table holds nothing.
    pub fn count_of(&self, suit: Suit, player: PlayerId) -> u8 {
        self.slot(suit, player)
            .and_then(|slot| self.counts.get(slot).copied())
            .unwrap_or(0)
    }

    pub fn holds_all(&self, player: PlayerId, suit: Suit) -> bool {
        self.count_of(suit, player) == CARDS_PER_SUIT
    }

    pub fn suit_total(&self, suit: Suit) -> u32 {
        let start = suit.index() * self.players as usize;
        self.counts
            .get(start..start + self.players as usize)
            .map(|row| row.iter().map(|&c| c as u32).sum())
            .unwrap_or(0)
    }

    pub fn hand_total(&self, player: PlayerId) -> u32 {
        Suit::all(self.suits())
            .map(|suit| self.count_of(suit, player) as u32)
            .sum()
    }

    /// True when every suit is fully dealt and every hand matches `hand_sizes`.
    pub fn is_consistent_with_hand_sizes(&self, hand_sizes: &[u8]) -> bool {
        if hand_sizes.len() != self.players as usize {
            return false;
        }
        let suits_complete =
            Suit::all(self.suits()).all(|suit| self.suit_total(suit) == CARDS_PER_SUIT as u32);
        suits_complete
            && PlayerId::all(self.players)
                .all(|player| self.hand_total(player) == hand_sizes[player.index()] as u32)
    }

    /// Moves one card of `suit` from `from` to `to`, producing a new world.
    pub fn transfer_one(&self, suit: Suit, from: PlayerId, to: PlayerId) -> Result<World, GameError> {
        let (Some(source), Some(dest)) = (self.slot(suit, from), self.slot(suit, to)) else {
            return Err(GameError::InvalidTransfer { suit, from, to });
        };
        if self.counts[source] == 0 {
            return Err(GameError::InvalidTransfer { suit, from, to });
        }
        let mut counts = self.counts.clone();
        counts[source] -= 1;
        counts[dest] += 1;
        Ok(World {
            players: self.players,
            counts,
        })
    }

    fn slot(&self, suit: Suit, player: PlayerId) -> Option<usize> {
        if player.index() >= self.players as usize || suit.index() >= self.suits() as usize {
            return None;
        }
        Some(suit.index() * self.players as usize + player.index())
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for player in PlayerId::all(self.players) {
            if player.index() > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{player}[")?;
            for suit in Suit::all(self.suits()) {
                if suit.index() > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", self.count_of(suit, player))?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(index: u8) -> PlayerId {
        PlayerId::new(index)
    }

    fn s(index: u8) -> Suit {
        Suit::new(index)
    }

    #[test]
    fn from_hands_lays_out_counts_per_player() {
        let world = World::from_hands(&[&[3, 1], &[1, 3]]);
        assert_eq!(world.players(), 2);
        assert_eq!(world.suits(), 2);
        assert_eq!(world.count_of(s(0), p(0)), 3);
        assert_eq!(world.count_of(s(1), p(0)), 1);
        assert_eq!(world.count_of(s(0), p(1)), 1);
        assert_eq!(world.hand_total(p(1)), 4);
    }

    #[test]
    fn consistency_checks_suits_and_hands() {
        let world = World::from_hands(&[&[3, 1], &[1, 3]]);
        assert!(world.is_consistent_with_hand_sizes(&[4, 4]));
        assert!(!world.is_consistent_with_hand_sizes(&[5, 3]));
        assert!(!world.is_consistent_with_hand_sizes(&[4, 4, 0]));

        let short_suit = World::from_hands(&[&[3, 1], &[0, 3]]);
        assert!(!short_suit.is_consistent_with_hand_sizes(&[4, 3]));
    }

    #[test]
    fn transfer_moves_exactly_one_card() {
        let world = World::from_hands(&[&[3, 1], &[1, 3]]);
        let moved = world.transfer_one(s(1), p(1), p(0)).expect("source holds suit");
        assert_eq!(moved.count_of(s(1), p(0)), 2);
        assert_eq!(moved.count_of(s(1), p(1)), 2);
        assert!(moved.is_consistent_with_hand_sizes(&[5, 3]));
        assert_eq!(world.count_of(s(1), p(0)), 1, "original is untouched");
    }

    #[test]
    fn transfer_from_empty_source_fails() {
        let world = World::from_hands(&[&[4, 0], &[0, 4]]);
        let err = world.transfer_one(s(0), p(1), p(0)).unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidTransfer {
                suit: s(0),
                from: p(1),
                to: p(0),
            }
        );
    }

    #[test]
    fn seats_and_suits_off_the_table_hold_nothing() {
        let world = World::from_hands(&[&[0, 4], &[4, 0]]);
        assert_eq!(world.count_of(s(0), p(2)), 0);
        assert_eq!(world.count_of(s(2), p(0)), 0);
        assert!(!world.holds_all(p(2), s(0)));
        assert_eq!(world.suit_total(s(2)), 0);
        assert!(world.transfer_one(s(0), p(1), p(2)).is_err());
        assert!(world.transfer_one(s(0), p(2), p(0)).is_err());
    }

    #[test]
    fn holds_all_requires_four() {
        let world = World::from_hands(&[&[4, 0], &[0, 4]]);
        assert!(world.holds_all(p(0), s(0)));
        assert!(!world.holds_all(p(0), s(1)));
    }

    #[test]
    fn display_lists_each_hand() {
        let world = World::from_hands(&[&[4, 0], &[0, 4]]);
        assert_eq!(world.to_string(), "P0[4,0] P1[0,4]");
    }
}
