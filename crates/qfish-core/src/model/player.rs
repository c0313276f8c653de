use core::fmt;
use serde::{Deserialize, Serialize};

/// Seat index in `[0, players)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Next seat in turn order at a table of `players`.
    pub const fn next(self, players: u8) -> PlayerId {
        PlayerId((self.0 + 1) % players)
    }

    /// Seats in turn order starting with `self`, wrapping once around the table.
    pub fn turn_order(self, players: u8) -> impl Iterator<Item = PlayerId> {
        let start = self.0;
        (0..players).map(move |offset| PlayerId(((start as u16 + offset as u16) % players as u16) as u8))
    }

    pub fn all(players: u8) -> impl Iterator<Item = PlayerId> + Clone {
        (0..players).map(PlayerId)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
