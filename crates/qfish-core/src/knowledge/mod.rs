//! Common knowledge shared by every player: the set of worlds still consistent
//! with the public history of a game.
//!
//! - `fact`: predicates evaluated against single worlds.
//! - `enumerate`: exhaustive generation of the prior world set.
//! - `position`: the knowledge state itself, with forced/possible queries and
//!   history-preserving updates.

mod enumerate;
mod fact;
mod position;

pub use enumerate::{DEFAULT_WORLD_LIMIT, enumerate_worlds};
pub use fact::{Fact, WorldPredicate};
pub use position::{MAX_PLAYERS, MAX_SUITS, Position};
