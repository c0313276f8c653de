use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use qfish_bot::{
    FirstLegalStrategy, PlayError, PlayRecord, Solver, SolverConfig, SolverError, SolverStrategy,
    Strategy, play_out,
};
use qfish_core::GameError;
use qfish_core::game::{Game, GameEvent, RulePolicy, TurnAdvance};
use qfish_core::model::{Outcome, PlayerId, PreferenceProfile};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event, info_span};

use crate::config::{BenchConfig, GameConfig, ResolvedOutputs, SeatKind, ValidationError};

/// Plays every configured game once and records the results.
pub struct BenchRunner {
    config: BenchConfig,
    outputs: ResolvedOutputs,
    plans: Vec<GamePlan>,
    solver: SolverConfig,
    logging_enabled: bool,
}

struct GamePlan {
    config: GameConfig,
    preferences: PreferenceProfile,
}

/// Summary details returned after a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub games_played: usize,
    pub draws: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub telemetry_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GameLogRow<'a> {
    run_id: &'a str,
    game: &'a str,
    suits: u8,
    hands: &'a [u8],
    rules: RulePolicy,
    seats: Vec<SeatKind>,
    predicted: Option<Outcome>,
    outcome: Outcome,
    winner: Option<PlayerId>,
    asks: usize,
    forced_answers: usize,
    skips: usize,
    elapsed_ms: u64,
    events: &'a [GameEvent],
}

struct GameResult {
    name: String,
    suits: u8,
    hands: Vec<u8>,
    rules: RulePolicy,
    predicted: Option<Outcome>,
    record: PlayRecord,
    elapsed_ms: u64,
}

impl BenchRunner {
    /// Build a runner from a validated configuration. Every game is set up
    /// once here so setup errors surface before anything is written.
    pub fn new(config: BenchConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let mut plans = Vec::with_capacity(config.games.len());
        for game in &config.games {
            let plan = GamePlan {
                preferences: game.preference_profile()?,
                config: game.clone(),
            };
            plan.build()?;
            plans.push(plan);
        }

        Ok(Self {
            solver: config.solver.solver_config(),
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            plans,
        })
    }

    /// Play the configured games in order, streaming one JSONL row per game.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut results = Vec::with_capacity(self.plans.len());
        let mut rows_written = 0usize;

        for plan in &self.plans {
            let result = self.play(plan)?;
            let row = GameLogRow {
                run_id: &self.config.run_id,
                game: &result.name,
                suits: result.suits,
                hands: &result.hands,
                rules: result.rules,
                seats: plan.seats(),
                predicted: result.predicted,
                outcome: result.record.outcome,
                winner: result.record.outcome.winner(),
                asks: result.record.asks,
                forced_answers: result.record.forced_answers,
                skips: result.record.skips,
                elapsed_ms: result.elapsed_ms,
                events: &result.record.events,
            };
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            rows_written += 1;
            results.push(result);
        }

        writer.flush()?;
        write_markdown(&self.outputs.summary_md, &self.config.run_id, &results)?;

        let telemetry_path = self
            .logging_enabled
            .then(|| self.outputs.telemetry_jsonl());

        Ok(RunSummary {
            games_played: results.len(),
            draws: results
                .iter()
                .filter(|result| result.record.outcome == Outcome::Draw)
                .count(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            telemetry_path,
        })
    }

    fn play(&self, plan: &GamePlan) -> Result<GameResult, RunnerError> {
        let name = plan.config.name.clone();
        let _span = info_span!(target: "qfish_bench::game", "game", game = %name).entered();
        let mut game = plan.build()?;
        let predicted = self.predict(&name, &game, plan.config.predict)?;

        let label = name.clone();
        game.on_terminal(move |outcome| {
            event!(target: "qfish_bench::game", Level::DEBUG, game = %label, outcome = ?outcome, "terminal");
        });

        let mut seats = plan.strategies(&game, self.solver);
        let started = Instant::now();
        let record = play_out(&mut game, &mut seats).map_err(|source| RunnerError::Play {
            game: name.clone(),
            source,
        })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        event!(
            target: "qfish_bench::game",
            Level::INFO,
            game = %name,
            outcome = ?record.outcome,
            predicted = ?predicted,
            asks = record.asks,
            forced_answers = record.forced_answers,
            skips = record.skips,
            elapsed_ms,
        );

        Ok(GameResult {
            name,
            suits: plan.config.suits,
            hands: plan.config.hands.clone(),
            rules: plan.config.rules,
            predicted,
            record,
            elapsed_ms,
        })
    }

    /// Value of the opening position under optimal play, or `None` when
    /// prediction is off or the search runs out of budget.
    fn predict(&self, name: &str, game: &Game, predict: bool) -> Result<Option<Outcome>, RunnerError> {
        if game.is_over() {
            return Ok(game.outcome());
        }
        if !predict {
            return Ok(None);
        }
        let mut solver = Solver::for_game(game, self.solver);
        match solver.outcome_under_optimal_play(game.position(), game.history()) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(SolverError::BudgetExceeded { nodes, elapsed_ms }) => {
                event!(
                    target: "qfish_bench::game",
                    Level::WARN,
                    game = name,
                    nodes,
                    elapsed_ms,
                    "prediction skipped: solver budget exhausted"
                );
                Ok(None)
            }
            Err(source) => Err(RunnerError::Solver {
                game: name.to_string(),
                source,
            }),
        }
    }
}

impl GamePlan {
    fn build(&self) -> Result<Game, RunnerError> {
        let wrap = |source| RunnerError::Game {
            game: self.config.name.clone(),
            source,
        };
        let mut game = Game::with_policy(self.config.suits, &self.config.hands, self.config.rules)
            .map_err(wrap)?;
        for player in PlayerId::all(self.config.players()) {
            if let Some(order) = self.preferences.get(player) {
                game.set_preferences(order.clone()).map_err(wrap)?;
            }
        }
        Ok(game)
    }

    fn seats(&self) -> Vec<SeatKind> {
        PlayerId::all(self.config.players())
            .map(|player| self.config.seat(player))
            .collect()
    }

    fn strategies(&self, game: &Game, solver: SolverConfig) -> Vec<Box<dyn Strategy>> {
        self.seats()
            .into_iter()
            .map(|kind| -> Box<dyn Strategy> {
                match kind {
                    SeatKind::Solver => Box::new(SolverStrategy::for_game(game, solver)),
                    SeatKind::FirstLegal => Box::new(FirstLegalStrategy),
                }
            })
            .collect()
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn describe(outcome: Option<Outcome>) -> String {
    match outcome {
        Some(Outcome::Winner(player)) => format!("{player} wins"),
        Some(Outcome::Draw) => "draw".to_string(),
        None => "-".to_string(),
    }
}

fn write_markdown(path: &Path, run_id: &str, results: &[GameResult]) -> Result<(), RunnerError> {
    let mut rows = String::new();
    rows.push_str("# Quantum Go Fish Bench\n\n");
    rows.push_str(&format!("Run: `{run_id}`\n\n"));
    rows.push_str("| Game | Suits | Hands | Turn advance | Asker holds | Outcome | Solver | Asks | Forced | Skips | ms |\n");
    rows.push_str("|------|-------|-------|--------------|-------------|---------|--------|------|--------|-------|----|\n");

    for result in results {
        let hands = result
            .hands
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("/");
        let turn_advance = match result.rules.turn_advance {
            TurnAdvance::AskerKeepsOnYes => "asker keeps on yes",
            TurnAdvance::NextInSeat => "next in seat",
        };
        rows.push_str(&format!(
            "| {name} | {suits} | {hands} | {turn_advance} | {holds} | {outcome} | {predicted} | {asks} | {forced} | {skips} | {ms} |\n",
            name = result.name,
            suits = result.suits,
            holds = if result.rules.asker_must_hold_suit { "Yes" } else { "No" },
            outcome = describe(Some(result.record.outcome)),
            predicted = describe(result.predicted),
            asks = result.record.asks,
            forced = result.record.forced_answers,
            skips = result.record.skips,
            ms = result.elapsed_ms,
        ));
    }

    fs::write(path, rows)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Config(#[from] ValidationError),
    #[error("game '{game}' could not be set up: {source}")]
    Game { game: String, source: GameError },
    #[error("game '{game}' failed during play: {source}")]
    Play { game: String, source: PlayError },
    #[error("game '{game}' could not be solved: {source}")]
    Solver { game: String, source: SolverError },
}
