use super::enumerate::{DEFAULT_WORLD_LIMIT, enumerate_worlds};
use super::fact::{Fact, WorldPredicate};
use crate::error::{GameError, SetupError};
use crate::model::{CARDS_PER_SUIT, PlayerId, Suit, World};
use core::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const MAX_SUITS: u8 = 16;
pub const MAX_PLAYERS: usize = 16;

/// The knowledge state: every world consistent with the public history, the
/// public hand sizes, and the player to move.
///
/// Worlds are kept sorted and deduplicated, so equality and hashing are set
/// semantics. The world slice is shared, which keeps snapshots held in a game
/// history cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    suits: u8,
    hand_sizes: Arc<[u8]>,
    mover: PlayerId,
    worlds: Arc<[World]>,
}

impl Position {
    /// Full prior for a new game: every world matching `hand_sizes`, player 0 to move.
    pub fn initial(suits: u8, hand_sizes: &[u8]) -> Result<Self, GameError> {
        Self::initial_with_limit(suits, hand_sizes, DEFAULT_WORLD_LIMIT)
    }

    pub fn initial_with_limit(
        suits: u8,
        hand_sizes: &[u8],
        world_limit: usize,
    ) -> Result<Self, GameError> {
        validate_setup(suits, hand_sizes)?;
        let worlds = enumerate_worlds(suits, hand_sizes, world_limit)?;
        if worlds.is_empty() {
            return Err(GameError::EmptyKnowledgeState);
        }
        Ok(Self {
            suits,
            hand_sizes: hand_sizes.into(),
            mover: PlayerId::new(0),
            worlds: worlds.into(),
        })
    }

    /// Builds a position from an explicit world set, e.g. to analyse a constructed scenario.
    pub fn from_worlds(
        suits: u8,
        hand_sizes: &[u8],
        mover: PlayerId,
        worlds: Vec<World>,
    ) -> Result<Self, GameError> {
        validate_setup(suits, hand_sizes)?;
        if mover.index() >= hand_sizes.len() {
            return Err(SetupError::UnknownMover {
                mover,
                players: hand_sizes.len(),
            }
            .into());
        }
        if let Some(index) = worlds.iter().position(|world| {
            world.suits() != suits || !world.is_consistent_with_hand_sizes(hand_sizes)
        }) {
            return Err(SetupError::InconsistentWorld { index }.into());
        }
        if worlds.is_empty() {
            return Err(GameError::EmptyKnowledgeState);
        }
        Ok(Self {
            suits,
            hand_sizes: hand_sizes.into(),
            mover,
            worlds: canonical(worlds),
        })
    }

    pub fn suits(&self) -> u8 {
        self.suits
    }

    pub fn players(&self) -> u8 {
        self.hand_sizes.len() as u8
    }

    pub fn hand_sizes(&self) -> &[u8] {
        &self.hand_sizes
    }

    pub fn hand_size(&self, player: PlayerId) -> u8 {
        self.hand_sizes[player.index()]
    }

    pub fn mover(&self) -> PlayerId {
        self.mover
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// True when the predicate holds in every member world.
    pub fn is_forced<P: WorldPredicate + ?Sized>(&self, predicate: &P) -> bool {
        self.worlds.iter().all(|world| predicate.test(world))
    }

    /// True when the predicate holds in at least one member world.
    pub fn is_possible<P: WorldPredicate + ?Sized>(&self, predicate: &P) -> bool {
        self.worlds.iter().any(|world| predicate.test(world))
    }

    /// Keeps only the worlds satisfying the predicate.
    pub fn filter<P: WorldPredicate + ?Sized>(&self, predicate: &P) -> Result<Self, GameError> {
        if self.is_forced(predicate) {
            return Ok(self.clone());
        }
        let kept: Vec<World> = self
            .worlds
            .iter()
            .filter(|world| predicate.test(world))
            .cloned()
            .collect();
        if kept.is_empty() {
            return Err(GameError::EmptyKnowledgeState);
        }
        Ok(Self {
            worlds: kept.into(),
            ..self.clone()
        })
    }

    /// Moves one `suit` card from `from` to `to` in every world where `from` holds one.
    pub fn apply_transfer(&self, suit: Suit, from: PlayerId, to: PlayerId) -> Result<Self, GameError> {
        let holders = self.filter(&Fact::holds(from, suit))?;
        let moved = holders
            .worlds
            .iter()
            .map(|world| world.transfer_one(suit, from, to))
            .collect::<Result<Vec<_>, _>>()?;

        let mut hand_sizes = self.hand_sizes.to_vec();
        hand_sizes[from.index()] -= 1;
        hand_sizes[to.index()] += 1;

        Ok(Self {
            suits: self.suits,
            hand_sizes: hand_sizes.into(),
            mover: self.mover,
            worlds: canonical(moved),
        })
    }

    /// Same worlds and hand sizes with another player to move.
    pub fn with_mover(&self, mover: PlayerId) -> Self {
        Self {
            mover,
            ..self.clone()
        }
    }

    /// The turn passes to the next seat without any other change.
    pub fn skip(&self) -> Self {
        self.with_mover(self.mover.next(self.players()))
    }

    pub fn is_suit_forced_complete(&self, player: PlayerId, suit: Suit) -> bool {
        self.is_forced(&Fact::holds_all(player, suit))
    }

    /// Fewest and most cards of `suit` that `player` may hold.
    pub fn count_range(&self, player: PlayerId, suit: Suit) -> RangeInclusive<u8> {
        let mut low = CARDS_PER_SUIT;
        let mut high = 0;
        for world in self.worlds.iter() {
            let count = world.count_of(suit, player);
            low = low.min(count);
            high = high.max(count);
        }
        low..=high
    }

    /// True when only one world remains, i.e. the deal is fully settled.
    pub fn is_determined(&self) -> bool {
        self.worlds.len() == 1
    }
}

impl fmt::Display for Position {
    /// One line per player: hand size, then each suit's possible count range.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for player in PlayerId::all(self.players()) {
            write!(f, "{player} ({})", self.hand_size(player))?;
            for suit in Suit::all(self.suits) {
                let range = self.count_range(player, suit);
                if range.start() == range.end() {
                    write!(f, " {suit}={}", range.start())?;
                } else {
                    write!(f, " {suit}={}-{}", range.start(), range.end())?;
                }
            }
            if player == self.mover {
                f.write_str("   <<<< to move")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn canonical(mut worlds: Vec<World>) -> Arc<[World]> {
    worlds.sort_unstable();
    worlds.dedup();
    worlds.into()
}

fn validate_setup(suits: u8, hand_sizes: &[u8]) -> Result<(), SetupError> {
    if suits == 0 {
        return Err(SetupError::NoSuits);
    }
    if suits > MAX_SUITS {
        return Err(SetupError::TooManySuits {
            suits,
            max: MAX_SUITS,
        });
    }
    let players = hand_sizes.len();
    if !(2..=MAX_PLAYERS).contains(&players) {
        return Err(SetupError::PlayerCount {
            players,
            max: MAX_PLAYERS,
        });
    }
    let expected = suits as u32 * CARDS_PER_SUIT as u32;
    let actual: u32 = hand_sizes.iter().map(|&h| h as u32).sum();
    if actual != expected {
        return Err(SetupError::CardCountMismatch {
            suits,
            expected,
            actual,
        });
    }
    Ok(())
}
