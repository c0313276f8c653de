use crate::error::{GameError, SetupError};
use crate::model::{CARDS_PER_SUIT, World};

/// Cap on the size of an enumerated prior.
pub const DEFAULT_WORLD_LIMIT: usize = 1_000_000;

/// Generates every world in which each suit is fully dealt and each player holds
/// exactly `hand_sizes[player]` cards. Worlds come out in ascending order.
///
/// Fails with `TooManyWorlds` as soon as more than `limit` worlds exist.
pub fn enumerate_worlds(
    suits: u8,
    hand_sizes: &[u8],
    limit: usize,
) -> Result<Vec<World>, GameError> {
    let players = hand_sizes.len();
    let mut walk = Walk {
        players,
        suits: suits as usize,
        limit,
        counts: vec![0; suits as usize * players],
        remaining: hand_sizes.to_vec(),
        worlds: Vec::new(),
    };
    walk.suit(0)?;
    Ok(walk.worlds)
}

struct Walk {
    players: usize,
    suits: usize,
    limit: usize,
    counts: Vec<u8>,
    remaining: Vec<u8>,
    worlds: Vec<World>,
}

impl Walk {
    fn suit(&mut self, suit: usize) -> Result<(), GameError> {
        if suit == self.suits {
            if self.remaining.iter().all(|&r| r == 0) {
                if self.worlds.len() == self.limit {
                    return Err(SetupError::TooManyWorlds { limit: self.limit }.into());
                }
                self.worlds
                    .push(World::from_counts(self.players as u8, self.counts.clone()));
            }
            return Ok(());
        }

        // A hand that cannot be filled by the suits still to come is a dead end.
        let capacity_left = (self.suits - suit) as u32 * CARDS_PER_SUIT as u32;
        if self.remaining.iter().any(|&r| r as u32 > capacity_left) {
            return Ok(());
        }

        self.deal(suit, 0, CARDS_PER_SUIT)
    }

    /// Distributes the `left` undealt cards of `suit` over players `player..`.
    fn deal(&mut self, suit: usize, player: usize, left: u8) -> Result<(), GameError> {
        if player + 1 == self.players {
            if self.remaining[player] < left {
                return Ok(());
            }
            self.place(suit, player, left);
            let result = self.suit(suit + 1);
            self.place(suit, player, 0);
            return result;
        }

        let most = left.min(self.remaining[player]);
        for take in 0..=most {
            self.place(suit, player, take);
            let result = self.deal(suit, player + 1, left - take);
            self.place(suit, player, 0);
            result?;
        }
        Ok(())
    }

    /// Sets the count for (suit, player), keeping `remaining` in step.
    fn place(&mut self, suit: usize, player: usize, count: u8) {
        let slot = suit * self.players + player;
        self.remaining[player] += self.counts[slot];
        self.counts[slot] = count;
        self.remaining[player] -= count;
    }
}
