use crate::model::{CARDS_PER_SUIT, PlayerId, Suit, World};

/// A property of a single world.
pub trait WorldPredicate {
    fn test(&self, world: &World) -> bool;
}

impl<F> WorldPredicate for F
where
    F: Fn(&World) -> bool,
{
    fn test(&self, world: &World) -> bool {
        self(world)
    }
}

/// Facts about one player's holding of one suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fact {
    /// The player holds at least one card of the suit.
    Holds { player: PlayerId, suit: Suit },
    /// The player holds no card of the suit.
    Lacks { player: PlayerId, suit: Suit },
    /// The player holds all four cards of the suit.
    HoldsAll { player: PlayerId, suit: Suit },
    HoldsAtLeast { player: PlayerId, suit: Suit, count: u8 },
}

impl Fact {
    pub const fn holds(player: PlayerId, suit: Suit) -> Self {
        Fact::Holds { player, suit }
    }

    pub const fn lacks(player: PlayerId, suit: Suit) -> Self {
        Fact::Lacks { player, suit }
    }

    pub const fn holds_all(player: PlayerId, suit: Suit) -> Self {
        Fact::HoldsAll { player, suit }
    }
}

impl WorldPredicate for Fact {
    fn test(&self, world: &World) -> bool {
        match *self {
            Fact::Holds { player, suit } => world.count_of(suit, player) > 0,
            Fact::Lacks { player, suit } => world.count_of(suit, player) == 0,
            Fact::HoldsAll { player, suit } => world.count_of(suit, player) == CARDS_PER_SUIT,
            Fact::HoldsAtLeast {
                player,
                suit,
                count,
            } => world.count_of(suit, player) >= count,
        }
    }
}
