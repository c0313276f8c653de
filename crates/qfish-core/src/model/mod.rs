pub mod outcome;
pub mod player;
pub mod suit;
pub mod world;

pub use outcome::{Outcome, PreferenceOrder, PreferenceProfile};
pub use player::PlayerId;
pub use suit::{CARDS_PER_SUIT, Suit};
pub use world::World;
