use crate::solver::{Action, Solver, SolverConfig, SolverError};
use qfish_core::game::rules::{self, Answer, Ask, RulePolicy};
use qfish_core::game::{Game, GameEvent, History, PendingAnswer};
use qfish_core::knowledge::Position;
use qfish_core::model::{Outcome, PlayerId, PreferenceProfile};
use qfish_core::{GameError, IllegalEvent};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

/// Read-only view of a game handed to a strategy.
pub struct DecisionContext<'a> {
    pub position: &'a Position,
    pub history: &'a History,
    pub policy: &'a RulePolicy,
    pub preferences: &'a PreferenceProfile,
}

impl<'a> DecisionContext<'a> {
    pub fn from_game(game: &'a Game) -> Self {
        Self {
            position: game.position(),
            history: game.history(),
            policy: game.policy(),
            preferences: game.preferences(),
        }
    }

    pub fn mover(&self) -> PlayerId {
        self.position.mover()
    }
}

#[derive(Debug, Error)]
pub enum PlayError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("{0} has no legal ask")]
    NoLegalAsk(PlayerId),
    #[error("{expected} seats needed, {actual} given")]
    SeatCount { expected: usize, actual: usize },
}

/// Decision function for one seat.
pub trait Strategy: Send {
    fn name(&self) -> &'static str;

    /// Picks the ask for the mover of `ctx`.
    fn choose_ask(&mut self, ctx: &DecisionContext<'_>) -> Result<Ask, PlayError>;

    /// Picks a truthful answer for the target of `pending`. Only called when
    /// both answers are possible.
    fn choose_answer(&mut self, ctx: &DecisionContext<'_>, pending: &PendingAnswer) -> Result<Answer, PlayError>;
}

/// Plays the solver's choice.
pub struct SolverStrategy {
    solver: Solver,
}

impl SolverStrategy {
    pub fn new(solver: Solver) -> Self {
        Self { solver }
    }

    pub fn for_game(game: &Game, config: SolverConfig) -> Self {
        Self::new(Solver::for_game(game, config))
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }
}

impl Strategy for SolverStrategy {
    fn name(&self) -> &'static str {
        "solver"
    }

    fn choose_ask(&mut self, ctx: &DecisionContext<'_>) -> Result<Ask, PlayError> {
        match self.solver.best_action(ctx.position, ctx.history)? {
            Action::Ask(ask) => Ok(ask),
            Action::Skip => Err(PlayError::NoLegalAsk(ctx.mover())),
        }
    }

    fn choose_answer(&mut self, ctx: &DecisionContext<'_>, pending: &PendingAnswer) -> Result<Answer, PlayError> {
        Ok(self
            .solver
            .best_answer(&pending.position, pending.ask, ctx.history)?)
    }
}

/// Always the first legal ask; answers YES when free to choose.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstLegalStrategy;

impl Strategy for FirstLegalStrategy {
    fn name(&self) -> &'static str {
        "first_legal"
    }

    fn choose_ask(&mut self, ctx: &DecisionContext<'_>) -> Result<Ask, PlayError> {
        rules::legal_asks(ctx.position, ctx.policy)
            .first()
            .copied()
            .ok_or(PlayError::NoLegalAsk(ctx.mover()))
    }

    fn choose_answer(&mut self, _ctx: &DecisionContext<'_>, pending: &PendingAnswer) -> Result<Answer, PlayError> {
        Ok(pending.forced().unwrap_or(Answer::Yes))
    }
}

/// Summary of a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    pub outcome: Outcome,
    pub asks: usize,
    pub forced_answers: usize,
    pub skips: usize,
    pub events: Vec<GameEvent>,
}

impl PlayRecord {
    fn from_game(game: &Game, outcome: Outcome) -> Self {
        let events = game.transcript().to_vec();
        let count = |matches: fn(&GameEvent) -> bool| events.iter().filter(|event| matches(event)).count();
        Self {
            outcome,
            asks: count(|event| matches!(event, GameEvent::Asked { .. })),
            forced_answers: count(|event| matches!(event, GameEvent::Answered { forced: true, .. })),
            skips: count(|event| matches!(event, GameEvent::Skipped { .. })),
            events,
        }
    }
}

/// Drives `game` to its outcome, one strategy per seat. Forced answers are
/// given without consulting the target's strategy.
pub fn play_out(game: &mut Game, seats: &mut [Box<dyn Strategy>]) -> Result<PlayRecord, PlayError> {
    let expected = game.players() as usize;
    if seats.len() != expected {
        return Err(PlayError::SeatCount {
            expected,
            actual: seats.len(),
        });
    }

    while game.outcome().is_none() {
        let mover = game.current_mover();
        let ask = seats[mover.index()].choose_ask(&DecisionContext::from_game(game))?;
        let pending = game.submit_ask(ask.asker, ask.target, ask.suit)?;

        let answer = match pending.forced() {
            Some(forced) => forced,
            None => seats[ask.target.index()].choose_answer(&DecisionContext::from_game(game), &pending)?,
        };
        let resolution = game.submit_answer(answer)?;

        event!(
            target: "qfish_bot::play",
            Level::INFO,
            asker = %ask.asker,
            strategy = seats[mover.index()].name(),
            target_player = %ask.target,
            suit = %ask.suit,
            answer = %answer,
            forced = resolution.forced,
            hand_sizes = ?game.public_hand_sizes(),
            worlds = game.position().world_count(),
        );
        for skipped in &resolution.skipped {
            event!(target: "qfish_bot::play", Level::INFO, skipped = %skipped, "empty hand skipped");
        }
    }

    let outcome = game
        .outcome()
        .ok_or(GameError::IllegalEvent(IllegalEvent::Faulted))?;
    event!(
        target: "qfish_bot::play",
        Level::INFO,
        outcome = ?outcome,
        events = game.transcript().len(),
        "game finished"
    );
    Ok(PlayRecord::from_game(game, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfish_core::model::Suit;

    fn seats(players: usize, make: impl Fn() -> Box<dyn Strategy>) -> Vec<Box<dyn Strategy>> {
        (0..players).map(|_| make()).collect()
    }

    #[test]
    fn first_legal_play_finishes_with_the_asker_winning() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        let mut seats = seats(2, || Box::new(FirstLegalStrategy));
        let record = play_out(&mut game, &mut seats).unwrap();
        assert_eq!(record.outcome, Outcome::Winner(PlayerId::new(0)));
        assert_eq!(record.asks, 4);
        assert!(matches!(
            record.events.first(),
            Some(GameEvent::Asked { ask }) if ask.suit == Suit::new(0)
        ));
    }

    #[test]
    fn seat_count_must_match() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        let mut seats = seats(3, || Box::new(FirstLegalStrategy));
        assert!(matches!(
            play_out(&mut game, &mut seats),
            Err(PlayError::SeatCount {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn finished_games_return_immediately() {
        let mut game = Game::new(1, &[4, 0]).unwrap();
        let mut seats = seats(2, || Box::new(FirstLegalStrategy));
        let record = play_out(&mut game, &mut seats).unwrap();
        assert_eq!(record.asks, 0);
        assert_eq!(record.outcome, Outcome::Winner(PlayerId::new(0)));
    }

    #[test]
    fn solver_seats_play_to_the_solved_outcome() {
        let mut game = Game::new(2, &[4, 4]).unwrap();
        for player in PlayerId::all(2) {
            game.set_preferences(qfish_core::model::PreferenceOrder::seat_order(player, 2))
                .unwrap();
        }
        let config = SolverConfig::default();
        let mut seats: Vec<Box<dyn Strategy>> = vec![
            Box::new(SolverStrategy::for_game(&game, config)),
            Box::new(SolverStrategy::for_game(&game, config)),
        ];
        let record = play_out(&mut game, &mut seats).unwrap();
        assert_eq!(record.outcome, Outcome::Winner(PlayerId::new(1)));
        assert!(record.asks >= 1);
    }
}
