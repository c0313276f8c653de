use core::fmt;
use serde::{Deserialize, Serialize};

/// Every suit has exactly this many indistinguishable cards.
pub const CARDS_PER_SUIT: u8 = 4;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Suit(u8);

impl Suit {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Iterates the suits of a game with `count` suits in label order.
    pub fn all(count: u8) -> impl Iterator<Item = Suit> + Clone {
        (0..count).map(Suit)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}
