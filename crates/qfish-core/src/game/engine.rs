use super::rules::{self, Answer, AnswerRequirement, Ask, RulePolicy};
use super::terminal::{History, settle};
use crate::error::{GameError, IllegalEvent};
use crate::knowledge::Position;
use crate::model::{Outcome, PlayerId, PreferenceOrder, PreferenceProfile, Suit};
use core::fmt;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    AwaitingAsk,
    AwaitingAnswer(PendingAnswer),
    Terminal(Outcome),
    /// An engine invariant broke; the game accepts no further events.
    Faulted,
}

/// An accepted ask waiting for the target's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    pub ask: Ask,
    pub requirement: AnswerRequirement,
    /// Position after the ask itself was made public.
    pub position: Position,
}

impl PendingAnswer {
    pub fn forced(&self) -> Option<Answer> {
        self.requirement.forced()
    }
}

/// Result of an answer or skip once terminal checks and automatic skips ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// `None` when the resolved event was a skip.
    pub answer: Option<Answer>,
    pub forced: bool,
    pub skipped: Vec<PlayerId>,
    pub mover: PlayerId,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Asked {
        ask: Ask,
    },
    Answered {
        ask: Ask,
        answer: Answer,
        forced: bool,
    },
    Skipped {
        player: PlayerId,
    },
    Ended {
        outcome: Outcome,
    },
}

type TerminalListener = Box<dyn FnOnce(Outcome) + Send>;

/// One game: the authoritative position, its history and the event transcript.
pub struct Game {
    policy: RulePolicy,
    position: Position,
    history: History,
    phase: Phase,
    preferences: PreferenceProfile,
    transcript: Vec<GameEvent>,
    listener: Option<TerminalListener>,
    notified: bool,
}

impl Game {
    pub fn new(suits: u8, hand_sizes: &[u8]) -> Result<Self, GameError> {
        Self::with_policy(suits, hand_sizes, RulePolicy::default())
    }

    pub fn with_policy(suits: u8, hand_sizes: &[u8], policy: RulePolicy) -> Result<Self, GameError> {
        let position = Position::initial(suits, hand_sizes)?;
        Ok(Self::from_position(position, policy))
    }

    /// Starts a game from an arbitrary position, which becomes the first history entry.
    pub fn from_position(position: Position, policy: RulePolicy) -> Self {
        let players = position.players();
        let mut game = Self {
            policy,
            position: position.clone(),
            history: History::new(),
            phase: Phase::AwaitingAsk,
            preferences: PreferenceProfile::new(players),
            transcript: Vec::new(),
            listener: None,
            notified: false,
        };
        game.advance(position, None);
        game
    }

    pub fn policy(&self) -> &RulePolicy {
        &self.policy
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn transcript(&self) -> &[GameEvent] {
        &self.transcript
    }

    pub fn public_hand_sizes(&self) -> &[u8] {
        self.position.hand_sizes()
    }

    pub fn is_suit_forced_complete(&self, player: PlayerId, suit: Suit) -> bool {
        player.index() < self.position.players() as usize
            && suit.index() < self.position.suits() as usize
            && self.position.is_suit_forced_complete(player, suit)
    }

    pub fn current_mover(&self) -> PlayerId {
        self.position.mover()
    }

    pub fn players(&self) -> u8 {
        self.position.players()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Terminal(_) | Phase::Faulted)
    }

    pub fn pending(&self) -> Option<&PendingAnswer> {
        match &self.phase {
            Phase::AwaitingAnswer(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn legal_asks(&self) -> Vec<Ask> {
        match self.phase {
            Phase::AwaitingAsk => rules::legal_asks(&self.position, &self.policy),
            _ => Vec::new(),
        }
    }

    /// Declares `player`'s ranking of `Draw` and the other players' wins, best first.
    pub fn declare_preferences(&mut self, player: PlayerId, order: &[Outcome]) -> Result<(), GameError> {
        let order = PreferenceOrder::declare(player, self.players(), order)?;
        self.set_preferences(order)
    }

    pub fn set_preferences(&mut self, order: PreferenceOrder) -> Result<(), GameError> {
        self.preferences.set(order)?;
        Ok(())
    }

    pub fn preferences(&self) -> &PreferenceProfile {
        &self.preferences
    }

    /// Registers the one-shot terminal callback. Fires at once if the game already ended.
    pub fn on_terminal<F>(&mut self, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        if self.notified {
            return;
        }
        match self.phase {
            Phase::Terminal(outcome) => {
                self.notified = true;
                callback(outcome);
            }
            _ => self.listener = Some(Box::new(callback)),
        }
    }

    pub fn submit_ask(&mut self, asker: PlayerId, target: PlayerId, suit: Suit) -> Result<PendingAnswer, GameError> {
        self.ensure_accepting()?;
        if matches!(self.phase, Phase::AwaitingAnswer(_)) {
            return Err(IllegalEvent::AnswerPending.into());
        }
        let ask = Ask::new(asker, target, suit);
        rules::validate_ask(&self.position, &self.policy, ask)?;
        let revealed = rules::reveal(&self.position, &self.policy, ask).map_err(|err| self.fault(err))?;
        let pending = PendingAnswer {
            ask,
            requirement: rules::answer_requirement(&revealed, ask),
            position: revealed,
        };
        self.transcript.push(GameEvent::Asked { ask });
        self.phase = Phase::AwaitingAnswer(pending.clone());
        Ok(pending)
    }

    pub fn submit_answer(&mut self, answer: Answer) -> Result<Resolution, GameError> {
        self.ensure_accepting()?;
        let pending = match &self.phase {
            Phase::AwaitingAnswer(pending) => pending.clone(),
            _ => return Err(IllegalEvent::NoPendingAsk.into()),
        };
        if let Some(forced) = pending.forced() {
            if forced != answer {
                return Err(IllegalEvent::ForcedAnswer { forced }.into());
            }
        }
        let next = rules::apply_answer(&pending.position, &self.policy, pending.ask, answer)
            .map_err(|err| self.fault(err))?;
        let forced = pending.forced().is_some();
        self.transcript.push(GameEvent::Answered {
            ask: pending.ask,
            answer,
            forced,
        });
        let skipped = self.advance(next, Some(pending.ask.asker));
        Ok(Resolution {
            answer: Some(answer),
            forced,
            skipped,
            mover: self.position.mover(),
            outcome: self.outcome(),
        })
    }

    /// Skips are applied by the engine itself; this only succeeds if one is somehow due.
    pub fn submit_skip(&mut self) -> Result<Resolution, GameError> {
        self.ensure_accepting()?;
        if matches!(self.phase, Phase::AwaitingAnswer(_)) {
            return Err(IllegalEvent::AnswerPending.into());
        }
        let mover = self.position.mover();
        if self.position.hand_size(mover) > 0 {
            return Err(IllegalEvent::SkipNotDue(mover).into());
        }
        self.transcript.push(GameEvent::Skipped { player: mover });
        let mut skipped = vec![mover];
        skipped.extend(self.advance(self.position.skip(), None));
        Ok(Resolution {
            answer: None,
            forced: true,
            skipped,
            mover: self.position.mover(),
            outcome: self.outcome(),
        })
    }

    fn ensure_accepting(&self) -> Result<(), IllegalEvent> {
        match self.phase {
            Phase::Terminal(outcome) => Err(IllegalEvent::GameOver(outcome)),
            Phase::Faulted => Err(IllegalEvent::Faulted),
            _ => Ok(()),
        }
    }

    fn fault(&mut self, err: GameError) -> GameError {
        if err.is_fatal() {
            self.phase = Phase::Faulted;
        }
        err
    }

    /// Settles a resolved position into the game and returns the players skipped on the way.
    fn advance(&mut self, position: Position, asker: Option<PlayerId>) -> Vec<PlayerId> {
        let settlement = settle(position, &mut self.history, &self.policy, asker);
        self.transcript.extend(
            settlement
                .skipped
                .iter()
                .map(|&player| GameEvent::Skipped { player }),
        );
        self.position = settlement.position;
        match settlement.outcome {
            Some(outcome) => {
                self.transcript.push(GameEvent::Ended { outcome });
                self.phase = Phase::Terminal(outcome);
                if let Some(listener) = self.listener.take() {
                    self.notified = true;
                    listener(outcome);
                }
            }
            None => self.phase = Phase::AwaitingAsk,
        }
        settlement.skipped
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("policy", &self.policy)
            .field("phase", &self.phase)
            .field("position", &self.position)
            .field("history_len", &self.history.len())
            .field("events", &self.transcript.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupError;
    use crate::game::rules::TurnAdvance;
    use crate::knowledge::Fact;
    use crate::model::World;
    use std::sync::{Arc, Mutex};

    fn p(index: u8) -> PlayerId {
        PlayerId::new(index)
    }

    fn s(index: u8) -> Suit {
        Suit::new(index)
    }

    #[test]
    fn new_rejects_wrong_card_total() {
        let err = Game::new(2, &[2, 2]).unwrap_err();
        assert_eq!(
            err,
            SetupError::CardCountMismatch {
                suits: 2,
                expected: 8,
                actual: 4
            }
            .into()
        );
    }

    #[test]
    fn full_information_win_is_reported_at_creation() {
        let game = Game::new(1, &[4, 0]).unwrap();
        assert_eq!(game.outcome(), Some(Outcome::Winner(p(0))));
        assert_eq!(
            game.transcript(),
            &[GameEvent::Ended {
                outcome: Outcome::Winner(p(0))
            }]
        );
    }

    #[test]
    fn empty_handed_player_is_skipped_without_an_ask() {
        let game = Game::new(2, &[0, 4, 4]).unwrap();
        assert_eq!(game.current_mover(), p(1));
        assert_eq!(game.phase(), &Phase::AwaitingAsk);
        assert_eq!(game.transcript(), &[GameEvent::Skipped { player: p(0) }]);
    }

    #[test]
    fn skip_mid_game_passes_to_next_seat() {
        let policy = RulePolicy {
            turn_advance: TurnAdvance::NextInSeat,
            ..RulePolicy::default()
        };
        let mut game = Game::with_policy(1, &[2, 1, 1], policy).unwrap();
        game.submit_ask(p(0), p(1), s(0)).unwrap();
        let resolution = game.submit_answer(Answer::Yes).unwrap();
        assert_eq!(resolution.skipped, vec![p(1)]);
        assert_eq!(resolution.mover, p(2));
        assert_eq!(game.public_hand_sizes(), &[3, 0, 1]);
        assert_eq!(resolution.outcome, None);
    }

    #[test]
    fn illegal_ask_leaves_state_unchanged() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        let before = game.position().clone();
        let err = game.submit_ask(p(1), p(0), s(0)).unwrap_err();
        assert!(matches!(
            err,
            GameError::IllegalEvent(IllegalEvent::OutOfTurn { .. })
        ));
        assert_eq!(game.position(), &before);
        assert_eq!(game.phase(), &Phase::AwaitingAsk);
        assert!(game.transcript().is_empty());
    }

    #[test]
    fn forced_answer_cannot_be_contradicted() {
        let mut game = Game::new(1, &[2, 2]).unwrap();
        let pending = game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(pending.forced(), Some(Answer::Yes));
        let err = game.submit_answer(Answer::No).unwrap_err();
        assert_eq!(
            err,
            IllegalEvent::ForcedAnswer {
                forced: Answer::Yes
            }
            .into()
        );
        assert_eq!(game.pending(), Some(&pending));

        let resolution = game.submit_answer(Answer::Yes).unwrap();
        assert!(resolution.forced);
        assert_eq!(game.public_hand_sizes(), &[3, 1]);
    }

    #[test]
    fn answering_without_an_ask_is_illegal() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        assert_eq!(
            game.submit_answer(Answer::Yes).unwrap_err(),
            IllegalEvent::NoPendingAsk.into()
        );
        game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(
            game.submit_ask(p(0), p(1), s(1)).unwrap_err(),
            IllegalEvent::AnswerPending.into()
        );
    }

    #[test]
    fn skip_is_rejected_when_not_due() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        assert_eq!(
            game.submit_skip().unwrap_err(),
            IllegalEvent::SkipNotDue(p(0)).into()
        );
    }

    #[test]
    fn repetition_ends_in_a_draw_at_the_first_repeat() {
        let policy = RulePolicy {
            turn_advance: TurnAdvance::NextInSeat,
            ..RulePolicy::default()
        };
        let mut game = Game::with_policy(2, &[4, 4], policy).unwrap();

        game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(game.submit_answer(Answer::Yes).unwrap().outcome, None);

        let pending = game.submit_ask(p(1), p(0), s(0)).unwrap();
        assert_eq!(pending.forced(), Some(Answer::Yes));
        assert_eq!(game.submit_answer(Answer::Yes).unwrap().outcome, None);

        let pending = game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(pending.forced(), Some(Answer::Yes));
        let resolution = game.submit_answer(Answer::Yes).unwrap();
        assert_eq!(resolution.outcome, Some(Outcome::Draw));
        assert_eq!(game.history().len(), 3);
        assert_eq!(game.position(), game.history().get(1).unwrap());
    }

    #[test]
    fn classic_rules_repeat_after_four_answers() {
        let mut game = Game::with_policy(2, &[4, 4], RulePolicy::classic()).unwrap();
        let script = [
            (p(0), p(1), Answer::Yes),
            (p(1), p(0), Answer::Yes),
            (p(0), p(1), Answer::Yes),
            (p(1), p(0), Answer::Yes),
        ];
        for (turn, (asker, target, answer)) in script.into_iter().enumerate() {
            game.submit_ask(asker, target, s(0)).unwrap();
            let resolution = game.submit_answer(answer).unwrap();
            if turn < 3 {
                assert_eq!(resolution.outcome, None, "turn {turn}");
            } else {
                assert_eq!(resolution.outcome, Some(Outcome::Draw));
            }
        }
        assert_eq!(game.public_hand_sizes(), &[4, 4]);
    }

    #[test]
    fn simultaneous_forced_wins_go_to_first_in_turn_order() {
        let a = World::from_hands(&[&[0, 0, 4, 0], &[4, 0, 0, 0], &[0, 0, 0, 4], &[0, 4, 0, 0]]);
        let b = World::from_hands(&[&[1, 0, 3, 0], &[3, 0, 1, 0], &[0, 0, 0, 4], &[0, 4, 0, 0]]);
        let c = World::from_hands(&[&[0, 0, 4, 0], &[3, 1, 0, 0], &[1, 0, 0, 3], &[0, 3, 0, 1]]);
        let position = Position::from_worlds(4, &[4, 4, 4, 4], p(0), vec![a, b, c]).unwrap();
        let mut game = Game::from_position(position, RulePolicy::default());
        assert_eq!(game.outcome(), None);

        let pending = game.submit_ask(p(0), p(1), s(1)).unwrap();
        assert_eq!(pending.forced(), None);
        let resolution = game.submit_answer(Answer::No).unwrap();
        assert_eq!(resolution.mover, p(1));
        assert_eq!(resolution.outcome, Some(Outcome::Winner(p(2))));
        assert!(game.is_suit_forced_complete(p(3), s(1)));
    }

    #[test]
    fn terminal_callback_fires_once() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let mut game = Game::new(1, &[2, 2]).unwrap();
        let sink = Arc::clone(&fired);
        game.on_terminal(move |outcome| sink.lock().unwrap().push(outcome));

        for _ in 0..2 {
            game.submit_ask(p(0), p(1), s(0)).unwrap();
            game.submit_answer(Answer::Yes).unwrap();
        }
        assert_eq!(game.outcome(), Some(Outcome::Winner(p(0))));
        let sink = Arc::clone(&fired);
        game.on_terminal(move |outcome| sink.lock().unwrap().push(outcome));
        assert_eq!(*fired.lock().unwrap(), vec![Outcome::Winner(p(0))]);
        assert_eq!(
            game.submit_ask(p(0), p(1), s(0)).unwrap_err(),
            IllegalEvent::GameOver(Outcome::Winner(p(0))).into()
        );
    }

    #[test]
    fn late_listener_is_notified_immediately() {
        let fired = Arc::new(Mutex::new(None));
        let mut game = Game::new(1, &[4, 0]).unwrap();
        let sink = Arc::clone(&fired);
        game.on_terminal(move |outcome| *sink.lock().unwrap() = Some(outcome));
        assert_eq!(*fired.lock().unwrap(), Some(Outcome::Winner(p(0))));
    }

    #[test]
    fn classic_ask_reveals_asker_holding() {
        let mut game = Game::with_policy(2, &[4, 4], RulePolicy::classic()).unwrap();
        let pending = game.submit_ask(p(0), p(1), s(1)).unwrap();
        assert!(pending.position.is_forced(&Fact::holds(p(0), s(1))));
        assert_eq!(pending.position.world_count(), 4);
    }

    #[test]
    fn classic_answer_that_pins_the_deal_wins_for_the_asker() {
        let mut game = Game::with_policy(1, &[2, 2], RulePolicy::classic()).unwrap();
        assert!(game.position().is_determined());
        assert_eq!(game.outcome(), None);

        let pending = game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(pending.forced(), Some(Answer::Yes));
        let resolution = game.submit_answer(Answer::Yes).unwrap();
        assert_eq!(resolution.mover, p(1));
        assert_eq!(resolution.outcome, Some(Outcome::Winner(p(0))));

        let mut game = Game::new(1, &[2, 2]).unwrap();
        game.submit_ask(p(0), p(1), s(0)).unwrap();
        assert_eq!(game.submit_answer(Answer::Yes).unwrap().outcome, None);
    }

    #[test]
    fn preferences_are_validated_and_stored() {
        let mut game = Game::new(2, &[4, 4, 0]).unwrap();
        let err = game
            .declare_preferences(p(0), &[Outcome::Winner(p(1)), Outcome::Draw, Outcome::Winner(p(2))])
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidPreferences(_)));
        game.declare_preferences(p(0), &[Outcome::Draw, Outcome::Winner(p(2)), Outcome::Winner(p(1))])
            .unwrap();
        let order = game.preferences().get(p(0)).unwrap();
        assert!(order.prefers(Outcome::Winner(p(2)), Outcome::Winner(p(1))));
        assert_eq!(game.preferences().first_missing(), Some(p(1)));
    }
}
