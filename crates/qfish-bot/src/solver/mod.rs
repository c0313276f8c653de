//! Backward induction over the graph of knowledge states.
//!
//! Every node is a settled position (the mover holds cards and no win is
//! forced). The mover picks the ask whose outcome they rank best; the target of
//! an ask picks the answer they rank best whenever both answers are truthful.
//! Returning to a position already on the search path is a draw.
//!
//! Results are memoized per position, except those that depend on a position
//! sitting above the node on the current path: such a value only holds for the
//! path it was computed on.

mod budget;
mod error;

pub use budget::{SolverBudget, SolverStats};
pub use error::SolverError;

use budget::Meter;
use qfish_core::game::rules::{self, Answer, AnswerRequirement, Ask, RulePolicy};
use qfish_core::game::{Game, History, detect_forced_win, settle};
use qfish_core::knowledge::Position;
use qfish_core::model::{Outcome, PlayerId, PreferenceOrder, PreferenceProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{Level, event};

/// Depends on nothing above the node it was computed for.
const UNBOUND: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ask(Ask),
    Skip,
}

impl Action {
    /// Player whose ask produces the successors of this action.
    pub fn asker(&self) -> Option<PlayerId> {
        match self {
            Action::Ask(ask) => Some(ask.asker),
            Action::Skip => None,
        }
    }
}

/// How a target picks between two answers they rank equally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerTieBreak {
    #[default]
    PreferNo,
    PreferYes,
}

impl AnswerTieBreak {
    fn pick(self) -> Answer {
        match self {
            AnswerTieBreak::PreferNo => Answer::No,
            AnswerTieBreak::PreferYes => Answer::Yes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverConfig {
    pub budget: SolverBudget,
    pub answer_tie_break: AnswerTieBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub outcome: Outcome,
    pub action: Action,
    pub stats: SolverStats,
}

#[derive(Debug, Clone, Copy)]
struct Solved {
    outcome: Outcome,
    action: Action,
}

pub struct Solver {
    policy: RulePolicy,
    preferences: PreferenceProfile,
    config: SolverConfig,
    memo: HashMap<Position, Solved>,
    memo_base: Vec<Position>,
    stats: SolverStats,
}

impl Solver {
    pub fn new(policy: RulePolicy, preferences: PreferenceProfile, config: SolverConfig) -> Self {
        Self {
            policy,
            preferences,
            config,
            memo: HashMap::new(),
            memo_base: Vec::new(),
            stats: SolverStats::default(),
        }
    }

    /// Solver using the game's rules and declared preferences.
    pub fn for_game(game: &Game, config: SolverConfig) -> Self {
        Self::new(*game.policy(), game.preferences().clone(), config)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Value and best action of a settled position reached after `history`.
    pub fn analyze(&mut self, position: &Position, history: &History) -> Result<Analysis, SolverError> {
        self.prepare(history)?;
        if detect_forced_win(position, &self.policy, None).is_some() {
            return Err(SolverError::TerminalPosition);
        }

        let mut meter = Meter::start(self.config.budget);
        let mut path = history.clone();
        let mark = path.push(position.clone());
        let frame = Frame::open(position.clone(), mark, path.len(), &self.policy);
        let solved = self.run(frame, &mut path, &mut meter);
        self.finish(&meter);
        let solved = solved?;

        event!(
            target: "qfish_bot::solver",
            Level::DEBUG,
            mover = %position.mover(),
            worlds = position.world_count(),
            nodes = self.stats.nodes,
            memo_size = self.stats.memo_size,
            memo_hits = self.stats.memo_hits,
            outcome = ?solved.outcome,
            elapsed_ms = self.stats.elapsed_ms,
        );

        Ok(Analysis {
            outcome: solved.outcome,
            action: solved.action,
            stats: self.stats,
        })
    }

    pub fn best_action(&mut self, position: &Position, history: &History) -> Result<Action, SolverError> {
        Ok(self.analyze(position, history)?.action)
    }

    pub fn outcome_under_optimal_play(
        &mut self,
        position: &Position,
        history: &History,
    ) -> Result<Outcome, SolverError> {
        Ok(self.analyze(position, history)?.outcome)
    }

    /// The answer the target of `ask` should give. `revealed` is the position
    /// once the ask is public, as held by a pending answer.
    pub fn best_answer(
        &mut self,
        revealed: &Position,
        ask: Ask,
        history: &History,
    ) -> Result<Answer, SolverError> {
        self.prepare(history)?;
        if let AnswerRequirement::Forced(forced) = rules::answer_requirement(revealed, ask) {
            return Ok(forced);
        }

        let mut meter = Meter::start(self.config.budget);
        let mut path = history.clone();
        let mut outcomes = Vec::with_capacity(2);
        for answer in [Answer::Yes, Answer::No] {
            let next = rules::apply_answer(revealed, &self.policy, ask, answer)?;
            match self.evaluate(next, Some(ask.asker), &mut path, &mut meter) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    self.finish(&meter);
                    return Err(err);
                }
            }
        }
        self.finish(&meter);

        let order = order_of(&self.preferences, ask.target)?;
        let answer = choose_answer(order, outcomes[0], outcomes[1], self.config.answer_tie_break);
        event!(
            target: "qfish_bot::solver",
            Level::DEBUG,
            target_player = %ask.target,
            yes = ?outcomes[0],
            no = ?outcomes[1],
            answer = %answer,
            nodes = self.stats.nodes,
        );
        Ok(answer)
    }

    /// Checks preferences and drops memoized values computed against another history.
    fn prepare(&mut self, history: &History) -> Result<(), SolverError> {
        if let Some(missing) = self.preferences.first_missing() {
            return Err(SolverError::MissingPreferences(missing));
        }
        if !self.memo_base.iter().eq(history.iter()) {
            self.memo.clear();
            self.memo_base = history.iter().cloned().collect();
        }
        self.stats = SolverStats::default();
        Ok(())
    }

    fn finish(&mut self, meter: &Meter) {
        self.stats.nodes = meter.nodes();
        self.stats.elapsed_ms = meter.elapsed_ms();
        self.stats.memo_size = self.memo.len();
    }

    /// Value of a freshly resolved position: settled against `path`, then searched if needed.
    fn evaluate(
        &mut self,
        next: Position,
        asker: Option<PlayerId>,
        path: &mut History,
        meter: &mut Meter,
    ) -> Result<Outcome, SolverError> {
        let base = self.memo_base.len();
        match self.descend(next, asker, path, base)? {
            Descent::Leaf(outcome, _) => Ok(outcome),
            Descent::Node(frame) => Ok(self.run(frame, path, meter)?.outcome),
        }
    }

    /// Settles `next` onto `path` and either resolves it at once or opens a frame for it.
    fn descend(
        &mut self,
        next: Position,
        asker: Option<PlayerId>,
        path: &mut History,
        base: usize,
    ) -> Result<Descent, SolverError> {
        let restore = path.len();
        let settlement = settle(next, path, &self.policy, asker);
        if let Some(outcome) = settlement.outcome {
            path.truncate(restore);
            let depends_on = settlement
                .repeated
                .filter(|&index| index >= base)
                .unwrap_or(UNBOUND);
            return Ok(Descent::Leaf(outcome, depends_on));
        }
        if let Some(&solved) = self.memo.get(&settlement.position) {
            self.stats.memo_hits += 1;
            event!(
                target: "qfish_bot::solver",
                Level::TRACE,
                mover = %settlement.position.mover(),
                outcome = ?solved.outcome,
                "memo hit"
            );
            path.truncate(restore);
            return Ok(Descent::Leaf(solved.outcome, UNBOUND));
        }
        let mark = path.len() - 1;
        Ok(Descent::Node(Frame::open(settlement.position, mark, restore, &self.policy)))
    }

    /// Depth-first search from `root` with an explicit frame stack.
    fn run(&mut self, root: Frame, path: &mut History, meter: &mut Meter) -> Result<Solved, SolverError> {
        let base = self.memo_base.len();
        let tie_break = self.config.answer_tie_break;
        meter.charge()?;
        let mut stack = vec![root];
        let mut carried: Option<(Outcome, usize)> = None;

        self.stats.max_depth = self.stats.max_depth.max(1);

        while let Some(frame) = stack.last_mut() {
            if let Some((outcome, depends_on)) = carried.take() {
                frame.record(outcome, depends_on);
            }

            if let Some((next, asker)) = frame.next_successor(&self.policy, &self.preferences, tie_break)? {
                match self.descend(next, asker, path, base)? {
                    Descent::Leaf(outcome, depends_on) => carried = Some((outcome, depends_on)),
                    Descent::Node(child) => {
                        meter.charge()?;
                        stack.push(child);
                        self.stats.max_depth = self.stats.max_depth.max(stack.len());
                    }
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            path.truncate(frame.restore);
            let Some(solved) = frame.best else {
                return Err(SolverError::NoLegalAction(frame.node.mover()));
            };
            let depends_on = if frame.low < frame.mark { frame.low } else { UNBOUND };
            if depends_on == UNBOUND {
                self.memo.insert(frame.node, solved);
            }
            if stack.is_empty() {
                return Ok(solved);
            }
            carried = Some((solved.outcome, depends_on));
        }
        Err(SolverError::TerminalPosition)
    }
}

enum Descent {
    Leaf(Outcome, usize),
    Node(Frame),
}

/// One node under evaluation.
struct Frame {
    node: Position,
    /// Path index of `node`.
    mark: usize,
    /// Path length to restore once the node is done.
    restore: usize,
    actions: Vec<Action>,
    next_action: usize,
    step: Option<Step>,
    best: Option<Solved>,
    /// Lowest path index any result below this node depends on.
    low: usize,
}

/// Successors of one action: one per answer, or the skipped position.
struct Step {
    action: Action,
    resolved: Position,
    answers: Vec<Option<Answer>>,
    outcomes: Vec<Outcome>,
}

impl Frame {
    fn open(node: Position, mark: usize, restore: usize, policy: &RulePolicy) -> Self {
        let actions = if node.hand_size(node.mover()) == 0 {
            vec![Action::Skip]
        } else {
            rules::legal_asks(&node, policy)
                .into_iter()
                .map(Action::Ask)
                .collect()
        };
        Self {
            node,
            mark,
            restore,
            actions,
            next_action: 0,
            step: None,
            best: None,
            low: UNBOUND,
        }
    }

    fn record(&mut self, outcome: Outcome, depends_on: usize) {
        self.low = self.low.min(depends_on);
        if let Some(step) = self.step.as_mut() {
            step.outcomes.push(outcome);
        }
    }

    /// Next position to evaluate with the asker that produced it, or `None`
    /// once the node is decided.
    fn next_successor(
        &mut self,
        policy: &RulePolicy,
        preferences: &PreferenceProfile,
        tie_break: AnswerTieBreak,
    ) -> Result<Option<(Position, Option<PlayerId>)>, SolverError> {
        if let Some(step) = self.step.as_ref() {
            if let Some(&answer) = step.answers.get(step.outcomes.len()) {
                return Ok(Some((step.successor(answer, policy)?, step.action.asker())));
            }
        }
        if let Some(step) = self.step.take() {
            self.conclude(step, preferences, tie_break)?;
        }
        self.advance(policy)
    }

    /// Folds a fully evaluated action into the node's best choice.
    fn conclude(
        &mut self,
        step: Step,
        preferences: &PreferenceProfile,
        tie_break: AnswerTieBreak,
    ) -> Result<(), SolverError> {
        let outcome = match (step.action, step.outcomes.as_slice()) {
            (Action::Ask(ask), &[yes, no]) => {
                let order = order_of(preferences, ask.target)?;
                match choose_answer(order, yes, no, tie_break) {
                    Answer::Yes => yes,
                    Answer::No => no,
                }
            }
            (_, &[only]) => only,
            _ => return Err(SolverError::NoLegalAction(self.node.mover())),
        };

        let mover_order = order_of(preferences, self.node.mover())?;
        let better = self
            .best
            .is_none_or(|best| mover_order.prefers(outcome, best.outcome));
        if better {
            self.best = Some(Solved {
                outcome,
                action: step.action,
            });
        }
        if mover_order.rank(outcome) == 0 {
            self.next_action = self.actions.len();
        }
        Ok(())
    }

    /// Opens the next action and yields its first successor.
    fn advance(&mut self, policy: &RulePolicy) -> Result<Option<(Position, Option<PlayerId>)>, SolverError> {
        let Some(&action) = self.actions.get(self.next_action) else {
            return Ok(None);
        };
        self.next_action += 1;
        let step = match action {
            Action::Skip => Step {
                action,
                resolved: self.node.skip(),
                answers: vec![None],
                outcomes: Vec::new(),
            },
            Action::Ask(ask) => {
                let resolved = rules::reveal(&self.node, policy, ask)?;
                let answers = match rules::answer_requirement(&resolved, ask) {
                    AnswerRequirement::Forced(answer) => vec![Some(answer)],
                    AnswerRequirement::Choice => vec![Some(Answer::Yes), Some(Answer::No)],
                };
                Step {
                    action,
                    resolved,
                    answers,
                    outcomes: Vec::with_capacity(2),
                }
            }
        };
        let next = step.successor(step.answers[0], policy)?;
        self.step = Some(step);
        Ok(Some((next, action.asker())))
    }
}

impl Step {
    fn successor(&self, answer: Option<Answer>, policy: &RulePolicy) -> Result<Position, SolverError> {
        match (self.action, answer) {
            (Action::Ask(ask), Some(answer)) => {
                Ok(rules::apply_answer(&self.resolved, policy, ask, answer)?)
            }
            _ => Ok(self.resolved.clone()),
        }
    }
}

fn order_of(preferences: &PreferenceProfile, player: PlayerId) -> Result<&PreferenceOrder, SolverError> {
    preferences
        .get(player)
        .ok_or(SolverError::MissingPreferences(player))
}

fn choose_answer(order: &PreferenceOrder, yes: Outcome, no: Outcome, tie_break: AnswerTieBreak) -> Answer {
    let (yes_rank, no_rank) = (order.rank(yes), order.rank(no));
    if yes_rank < no_rank {
        Answer::Yes
    } else if no_rank < yes_rank {
        Answer::No
    } else {
        tie_break.pick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfish_core::game::TurnAdvance;
    use qfish_core::model::{Suit, World};

    fn p(index: u8) -> PlayerId {
        PlayerId::new(index)
    }

    fn s(index: u8) -> Suit {
        Suit::new(index)
    }

    fn solver(players: u8, policy: RulePolicy) -> Solver {
        Solver::new(policy, PreferenceProfile::seat_order(players), SolverConfig::default())
    }

    /// P0 asks P1 for S0: YES hands P0 all of S0, NO leaves P2 holding all of S1.
    fn split_verdict() -> (Position, Ask) {
        let w1 = World::from_hands(&[&[3, 0, 1], &[1, 1, 1], &[0, 3, 2]]);
        let w2 = World::from_hands(&[&[3, 0, 1], &[0, 0, 3], &[1, 4, 0]]);
        let position = Position::from_worlds(3, &[4, 3, 5], p(0), vec![w1, w2]).unwrap();
        (position, Ask::new(p(0), p(1), s(0)))
    }

    #[test]
    fn single_world_game_is_won_by_asking() {
        let position = Position::initial(1, &[2, 2]).unwrap();
        let analysis = solver(2, RulePolicy::default())
            .analyze(&position, &History::new())
            .unwrap();
        assert_eq!(analysis.outcome, Outcome::Winner(p(0)));
        assert_eq!(analysis.action, Action::Ask(Ask::new(p(0), p(1), s(0))));
    }

    #[test]
    fn decided_positions_are_rejected() {
        let position = Position::initial(1, &[4, 0]).unwrap();
        let err = solver(2, RulePolicy::default())
            .analyze(&position, &History::new())
            .unwrap_err();
        assert_eq!(err, SolverError::TerminalPosition);
    }

    #[test]
    fn preferences_are_required() {
        let position = Position::initial(2, &[4, 4]).unwrap();
        let mut solver = Solver::new(
            RulePolicy::default(),
            PreferenceProfile::new(2),
            SolverConfig::default(),
        );
        assert_eq!(
            solver.analyze(&position, &History::new()).unwrap_err(),
            SolverError::MissingPreferences(p(0))
        );
    }

    #[test]
    fn target_answers_toward_the_winner_they_prefer() {
        let (position, ask) = split_verdict();
        let mut profile = PreferenceProfile::seat_order(3);

        profile
            .set(PreferenceOrder::from_other_winners(p(1), 3, &[p(2), p(0)]).unwrap())
            .unwrap();
        let mut solver = Solver::new(RulePolicy::default(), profile.clone(), SolverConfig::default());
        assert_eq!(solver.best_answer(&position, ask, &History::new()).unwrap(), Answer::No);

        profile
            .set(PreferenceOrder::from_other_winners(p(1), 3, &[p(0), p(2)]).unwrap())
            .unwrap();
        let mut solver = Solver::new(RulePolicy::default(), profile, SolverConfig::default());
        assert_eq!(solver.best_answer(&position, ask, &History::new()).unwrap(), Answer::Yes);
    }

    #[test]
    fn indifferent_target_follows_tie_break() {
        // YES leaves P2 alone holding S1; NO leaves P0 and P2 tied, scanned from P1.
        let w1 = World::from_hands(&[&[2, 0, 3], &[2, 0, 1], &[0, 4, 0]]);
        let w2 = World::from_hands(&[&[4, 1, 0], &[0, 3, 0], &[0, 0, 4]]);
        let position = Position::from_worlds(3, &[5, 3, 4], p(0), vec![w1, w2]).unwrap();
        let ask = Ask::new(p(0), p(1), s(0));
        let history = History::new();

        let mut prefer_no = solver(3, RulePolicy::default());
        assert_eq!(prefer_no.best_answer(&position, ask, &history).unwrap(), Answer::No);

        let mut prefer_yes = Solver::new(
            RulePolicy::default(),
            PreferenceProfile::seat_order(3),
            SolverConfig {
                answer_tie_break: AnswerTieBreak::PreferYes,
                ..SolverConfig::default()
            },
        );
        assert_eq!(prefer_yes.best_answer(&position, ask, &history).unwrap(), Answer::Yes);
    }

    #[test]
    fn forced_answers_need_no_search() {
        let position = Position::initial(1, &[2, 2]).unwrap();
        let mut solver = solver(2, RulePolicy::default());
        let answer = solver
            .best_answer(&position, Ask::new(p(0), p(1), s(0)), &History::new())
            .unwrap();
        assert_eq!(answer, Answer::Yes);
        assert_eq!(solver.stats().nodes, 0);
    }

    #[test]
    fn two_suit_game_is_reproducible() {
        let position = Position::initial(2, &[4, 4]).unwrap();
        let mut first = solver(2, RulePolicy::default());
        let a = first.analyze(&position, &History::new()).unwrap();
        let b = first.analyze(&position, &History::new()).unwrap();
        let c = solver(2, RulePolicy::default())
            .analyze(&position, &History::new())
            .unwrap();
        assert_eq!(a.outcome, Outcome::Winner(p(1)));
        assert_eq!((a.outcome, a.action), (b.outcome, b.action));
        assert_eq!((a.outcome, a.action), (c.outcome, c.action));
    }

    #[test]
    fn rotating_rules_are_reproducible() {
        let position = Position::initial(2, &[4, 4]).unwrap();
        for policy in [
            RulePolicy::classic(),
            RulePolicy {
                turn_advance: TurnAdvance::NextInSeat,
                asker_must_hold_suit: false,
                ..RulePolicy::default()
            },
        ] {
            let first = solver(2, policy).analyze(&position, &History::new()).unwrap();
            let second = solver(2, policy).analyze(&position, &History::new()).unwrap();
            assert_eq!(first.outcome, second.outcome);
            assert_eq!(first.action, second.action);
            assert!(first.stats.nodes > 0);
        }
    }

    #[test]
    fn node_budget_is_enforced() {
        let position = Position::initial(3, &[4, 4, 4]).unwrap();
        let mut solver = Solver::new(
            RulePolicy::default(),
            PreferenceProfile::seat_order(3),
            SolverConfig {
                budget: SolverBudget::unlimited().with_max_nodes(1),
                ..SolverConfig::default()
            },
        );
        let err = solver.analyze(&position, &History::new()).unwrap_err();
        assert!(matches!(err, SolverError::BudgetExceeded { nodes: 2, .. }));
    }

    #[test]
    fn empty_handed_mover_skips() {
        let position = Position::initial(2, &[0, 4, 4]).unwrap();
        let analysis = solver(3, RulePolicy::default())
            .analyze(&position, &History::new())
            .unwrap();
        assert_eq!(analysis.action, Action::Skip);
    }

    /// Plain recursive search with no memo: every successor is settled on the
    /// live path, so any return to a position on it is a draw.
    fn exhaustive(
        position: &Position,
        path: &mut History,
        policy: &RulePolicy,
        preferences: &PreferenceProfile,
        tie_break: AnswerTieBreak,
    ) -> Outcome {
        let mover = position.mover();
        let actions: Vec<Action> = if position.hand_size(mover) == 0 {
            vec![Action::Skip]
        } else {
            rules::legal_asks(position, policy)
                .into_iter()
                .map(Action::Ask)
                .collect()
        };
        let order = preferences.get(mover).unwrap();
        let mut best: Option<Outcome> = None;
        for action in actions {
            let outcome = match action {
                Action::Skip => settle_and_search(position.skip(), None, path, policy, preferences, tie_break),
                Action::Ask(ask) => {
                    let revealed = rules::reveal(position, policy, ask).unwrap();
                    let mut value = |answer| {
                        let next = rules::apply_answer(&revealed, policy, ask, answer).unwrap();
                        settle_and_search(next, Some(ask.asker), path, policy, preferences, tie_break)
                    };
                    match rules::answer_requirement(&revealed, ask) {
                        AnswerRequirement::Forced(answer) => value(answer),
                        AnswerRequirement::Choice => {
                            let (yes, no) = (value(Answer::Yes), value(Answer::No));
                            let target = preferences.get(ask.target).unwrap();
                            match choose_answer(target, yes, no, tie_break) {
                                Answer::Yes => yes,
                                Answer::No => no,
                            }
                        }
                    }
                }
            };
            if best.is_none_or(|best| order.prefers(outcome, best)) {
                best = Some(outcome);
            }
        }
        best.unwrap()
    }

    fn settle_and_search(
        next: Position,
        asker: Option<PlayerId>,
        path: &mut History,
        policy: &RulePolicy,
        preferences: &PreferenceProfile,
        tie_break: AnswerTieBreak,
    ) -> Outcome {
        let restore = path.len();
        let settlement = settle(next, path, policy, asker);
        let outcome = match settlement.outcome {
            Some(outcome) => outcome,
            None => exhaustive(&settlement.position, path, policy, preferences, tie_break),
        };
        path.truncate(restore);
        outcome
    }

    #[test]
    fn memoized_search_agrees_with_exhaustive_search() {
        let policies = [
            RulePolicy::default(),
            RulePolicy::classic(),
            RulePolicy {
                turn_advance: TurnAdvance::NextInSeat,
                ..RulePolicy::default()
            },
        ];
        let setups: [(u8, &[u8]); 2] = [(2, &[4, 4]), (1, &[2, 1, 1])];
        for policy in policies {
            for &(suits, hands) in &setups {
                let game = Game::with_policy(suits, hands, policy).unwrap();
                assert!(!game.is_over());
                let preferences = PreferenceProfile::seat_order(hands.len() as u8);
                let mut path = game.history().clone();
                let expected = exhaustive(
                    game.position(),
                    &mut path,
                    &policy,
                    &preferences,
                    AnswerTieBreak::default(),
                );
                let mut solver = Solver::new(policy, preferences, SolverConfig::default());
                let outcome = solver
                    .outcome_under_optimal_play(game.position(), game.history())
                    .unwrap();
                assert_eq!(outcome, expected, "{suits} suits, hands {hands:?}, {policy:?}");
            }
        }
    }
}
