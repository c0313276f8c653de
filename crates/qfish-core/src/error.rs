use crate::game::rules::Answer;
use crate::model::{Outcome, PlayerId, Suit};
use thiserror::Error;

/// Every failure the core can report. Wins and draws are outcomes, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Bad suit/hand-size configuration; the game cannot be created.
    #[error("invalid setup: {0}")]
    InvalidSetup(#[from] SetupError),
    /// The event breaks the rules. State is unchanged and the caller may retry.
    #[error("illegal event: {0}")]
    IllegalEvent(#[from] IllegalEvent),
    /// A world was asked to give up a card it does not hold. Engine bug.
    #[error("cannot transfer a {suit} card from {from} to {to}: source holds none")]
    InvalidTransfer {
        suit: Suit,
        from: PlayerId,
        to: PlayerId,
    },
    /// Filtering removed every world. Engine bug or an illegal event slipped through.
    #[error("knowledge state would become empty")]
    EmptyKnowledgeState,
    #[error("invalid preferences: {0}")]
    InvalidPreferences(#[from] PreferenceError),
}

impl GameError {
    /// Faults that invalidate the game instance rather than a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GameError::InvalidTransfer { .. } | GameError::EmptyKnowledgeState
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("a game needs at least one suit")]
    NoSuits,
    #[error("at most {max} suits are supported, got {suits}")]
    TooManySuits { suits: u8, max: u8 },
    #[error("a game needs between 2 and {max} players, got {players}")]
    PlayerCount { players: usize, max: usize },
    #[error("hands hold {actual} cards but {suits} suits make {expected}")]
    CardCountMismatch {
        suits: u8,
        expected: u32,
        actual: u32,
    },
    #[error("more than {limit} worlds are consistent with the hand sizes")]
    TooManyWorlds { limit: usize },
    #[error("world {index} does not match the declared suits and hand sizes")]
    InconsistentWorld { index: usize },
    #[error("mover {mover} is not seated at a table of {players}")]
    UnknownMover { mover: PlayerId, players: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalEvent {
    #[error("the game is over: {0:?}")]
    GameOver(Outcome),
    #[error("the game faulted and accepts no further events")]
    Faulted,
    #[error("an answer is pending; ask again after it is resolved")]
    AnswerPending,
    #[error("no ask is awaiting an answer")]
    NoPendingAsk,
    #[error("it is {expected}'s turn, not {actual}'s")]
    OutOfTurn { expected: PlayerId, actual: PlayerId },
    #[error("{0} is not seated at this table")]
    UnknownPlayer(PlayerId),
    #[error("{0} is not a suit in this game")]
    UnknownSuit(Suit),
    #[error("{0} cannot ask themselves")]
    AskedSelf(PlayerId),
    #[error("{0} has no cards and cannot be asked")]
    EmptyHandedTarget(PlayerId),
    #[error("{0} has no cards and must skip")]
    MustSkip(PlayerId),
    #[error("{player} cannot hold any {suit} card and may not ask for one")]
    SuitNotHeld { player: PlayerId, suit: Suit },
    #[error("the answer is forced to {forced:?}")]
    ForcedAnswer { forced: Answer },
    #[error("{0} holds cards; skips are only due for empty hands")]
    SkipNotDue(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreferenceError {
    #[error("{player} is not seated at a table of {players}")]
    UnknownPlayer { player: PlayerId, players: usize },
    #[error("draw must rank directly after a win of one's own")]
    DrawNotSecond,
    #[error("{0:?} is listed more than once")]
    Duplicate(Outcome),
    #[error("{0:?} is not a ranked outcome for this player")]
    Unexpected(Outcome),
    #[error("ranking is missing {0:?}")]
    Missing(Outcome),
}
