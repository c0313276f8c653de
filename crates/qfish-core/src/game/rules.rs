use crate::error::{GameError, IllegalEvent};
use crate::knowledge::{Fact, Position};
use crate::model::{PlayerId, Suit};
use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Answer::Yes => "yes",
            Answer::No => "no",
        })
    }
}

/// `asker` asks `target` whether they hold a card of `suit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ask {
    pub asker: PlayerId,
    pub target: PlayerId,
    pub suit: Suit,
}

impl Ask {
    pub const fn new(asker: PlayerId, target: PlayerId, suit: Suit) -> Self {
        Self {
            asker,
            target,
            suit,
        }
    }
}

impl fmt::Display for Ask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} asks {} for {}", self.asker, self.target, self.suit)
    }
}

/// Who moves after an answer has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAdvance {
    /// YES keeps the turn with the asker, NO passes it to the player who answered.
    #[default]
    AskerKeepsOnYes,
    /// The turn passes to the seat after the asker whatever the answer.
    NextInSeat,
}

/// Where the scan for a winner starts when several players complete a suit at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinScan {
    /// Start at the player who moves in the resolved position.
    #[default]
    FromMover,
    /// Start at the player whose ask was just answered; falls back to the mover
    /// when no ask was involved.
    FromAsker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePolicy {
    pub turn_advance: TurnAdvance,
    /// Asking for a suit publicly reveals that the asker holds at least one card of it.
    pub asker_must_hold_suit: bool,
    /// An answer that leaves a single possible deal wins the game for the asker.
    pub determined_deal_wins: bool,
    pub win_scan: WinScan,
}

impl RulePolicy {
    /// Rules of the classic referee.
    ///
    /// The turn rotates after every ask and an ask reveals the asker's suit. An
    /// answer that pins down the whole deal wins for the asker, and simultaneous
    /// suit completions are scanned from the asker.
    pub const fn classic() -> Self {
        Self {
            turn_advance: TurnAdvance::NextInSeat,
            asker_must_hold_suit: true,
            determined_deal_wins: true,
            win_scan: WinScan::FromAsker,
        }
    }

    /// Seat that moves once `ask` has been answered with `answer`.
    pub fn next_mover(&self, ask: Ask, answer: Answer, players: u8) -> PlayerId {
        match (self.turn_advance, answer) {
            (TurnAdvance::AskerKeepsOnYes, Answer::Yes) => ask.asker,
            (TurnAdvance::AskerKeepsOnYes, Answer::No) => ask.target,
            (TurnAdvance::NextInSeat, _) => ask.asker.next(players),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerRequirement {
    /// Every remaining world agrees; the answer is not a choice.
    Forced(Answer),
    /// The target may truthfully answer either way.
    Choice,
}

impl AnswerRequirement {
    pub fn forced(self) -> Option<Answer> {
        match self {
            AnswerRequirement::Forced(answer) => Some(answer),
            AnswerRequirement::Choice => None,
        }
    }

    pub fn permits(self, answer: Answer) -> bool {
        self.forced().is_none_or(|forced| forced == answer)
    }
}

/// Checks that `ask` may be made from `position`. Nothing is mutated.
pub fn validate_ask(position: &Position, policy: &RulePolicy, ask: Ask) -> Result<(), IllegalEvent> {
    let players = position.players() as usize;
    if ask.asker.index() >= players {
        return Err(IllegalEvent::UnknownPlayer(ask.asker));
    }
    if ask.target.index() >= players {
        return Err(IllegalEvent::UnknownPlayer(ask.target));
    }
    if ask.suit.index() >= position.suits() as usize {
        return Err(IllegalEvent::UnknownSuit(ask.suit));
    }
    if ask.asker != position.mover() {
        return Err(IllegalEvent::OutOfTurn {
            expected: position.mover(),
            actual: ask.asker,
        });
    }
    if position.hand_size(ask.asker) == 0 {
        return Err(IllegalEvent::MustSkip(ask.asker));
    }
    if ask.target == ask.asker {
        return Err(IllegalEvent::AskedSelf(ask.asker));
    }
    if position.hand_size(ask.target) == 0 {
        return Err(IllegalEvent::EmptyHandedTarget(ask.target));
    }
    if policy.asker_must_hold_suit && !position.is_possible(&Fact::holds(ask.asker, ask.suit)) {
        return Err(IllegalEvent::SuitNotHeld {
            player: ask.asker,
            suit: ask.suit,
        });
    }
    Ok(())
}

/// What the position learns from the ask itself, before any answer.
pub fn reveal(position: &Position, policy: &RulePolicy, ask: Ask) -> Result<Position, GameError> {
    if policy.asker_must_hold_suit {
        position.filter(&Fact::holds(ask.asker, ask.suit))
    } else {
        Ok(position.clone())
    }
}

pub fn answer_requirement(position: &Position, ask: Ask) -> AnswerRequirement {
    if position.is_forced(&Fact::holds(ask.target, ask.suit)) {
        AnswerRequirement::Forced(Answer::Yes)
    } else if position.is_forced(&Fact::lacks(ask.target, ask.suit)) {
        AnswerRequirement::Forced(Answer::No)
    } else {
        AnswerRequirement::Choice
    }
}

/// Resolves `answer` against the revealed position of a pending ask and moves the turn.
///
/// A NO keeps the worlds where the target lacks the suit; a YES moves one card
/// from target to asker in every world where the target holds one.
pub fn apply_answer(
    position: &Position,
    policy: &RulePolicy,
    ask: Ask,
    answer: Answer,
) -> Result<Position, GameError> {
    if let AnswerRequirement::Forced(forced) = answer_requirement(position, ask) {
        if forced != answer {
            return Err(IllegalEvent::ForcedAnswer { forced }.into());
        }
    }
    let resolved = match answer {
        Answer::No => position.filter(&Fact::lacks(ask.target, ask.suit))?,
        Answer::Yes => position.apply_transfer(ask.suit, ask.target, ask.asker)?,
    };
    let mover = policy.next_mover(ask, answer, position.players());
    Ok(resolved.with_mover(mover))
}

/// Every legal ask for the mover: targets in seat order after the asker, suits ascending.
pub fn legal_asks(position: &Position, policy: &RulePolicy) -> Vec<Ask> {
    let asker = position.mover();
    if position.hand_size(asker) == 0 {
        return Vec::new();
    }
    let players = position.players();
    let suits: Vec<Suit> = Suit::all(position.suits())
        .filter(|&suit| {
            !policy.asker_must_hold_suit || position.is_possible(&Fact::holds(asker, suit))
        })
        .collect();

    asker
        .turn_order(players)
        .skip(1)
        .filter(|&target| position.hand_size(target) > 0)
        .flat_map(|target| suits.iter().map(move |&suit| Ask::new(asker, target, suit)))
        .collect()
}
