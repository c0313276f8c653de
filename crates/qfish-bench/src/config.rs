use qfish_bot::{AnswerTieBreak, SolverBudget, SolverConfig};
use qfish_core::game::RulePolicy;
use qfish_core::knowledge::{MAX_PLAYERS, MAX_SUITS};
use qfish_core::model::{CARDS_PER_SUIT, PlayerId, PreferenceOrder, PreferenceProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchConfig {
    pub run_id: String,
    #[serde(default)]
    pub solver: SolverSettings,
    pub games: Vec<GameConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.solver.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        validate_games(&self.games)?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

/// Search limits and tie-break shared by every solver seat.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SolverSettings {
    #[serde(default)]
    pub max_nodes: Option<usize>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub answer_tie_break: AnswerTieBreak,
}

impl SolverSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nodes == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "solver.max_nodes".to_string(),
                message: "node budget must be greater than zero".to_string(),
            });
        }
        if self.time_limit_ms == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "solver.time_limit_ms".to_string(),
                message: "time limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn solver_config(&self) -> SolverConfig {
        let mut budget = SolverBudget::unlimited();
        if let Some(max_nodes) = self.max_nodes {
            budget = budget.with_max_nodes(max_nodes);
        }
        if let Some(ms) = self.time_limit_ms {
            budget = budget.with_time_limit(Duration::from_millis(ms));
        }
        SolverConfig {
            budget,
            answer_tie_break: self.answer_tie_break,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatKind {
    Solver,
    FirstLegal,
}

/// One game to play: setup, rules, seating and declared preferences.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GameConfig {
    pub name: String,
    pub suits: u8,
    pub hands: Vec<u8>,
    #[serde(default)]
    pub rules: RulePolicy,
    /// One entry per player; empty seats every player with the solver.
    #[serde(default)]
    pub seats: Vec<SeatKind>,
    /// Per player, the other players ranked best first; empty means seat order.
    #[serde(default)]
    pub preferences: Vec<Vec<u8>>,
    /// Solve the opening position before play.
    #[serde(default = "default_predict")]
    pub predict: bool,
}

impl GameConfig {
    pub fn players(&self) -> u8 {
        self.hands.len() as u8
    }

    pub fn seat(&self, player: PlayerId) -> SeatKind {
        self.seats
            .get(player.index())
            .copied()
            .unwrap_or(SeatKind::Solver)
    }

    /// Preference profile for the game, falling back to seat order.
    pub fn preference_profile(&self) -> Result<PreferenceProfile, ValidationError> {
        let players = self.players();
        if self.preferences.is_empty() {
            return Ok(PreferenceProfile::seat_order(players));
        }
        let mut profile = PreferenceProfile::new(players);
        for (index, ranking) in self.preferences.iter().enumerate() {
            let field = format!("games[{}].preferences[{index}]", self.name);
            let others: Vec<PlayerId> = ranking.iter().copied().map(PlayerId::new).collect();
            let order = PreferenceOrder::from_other_winners(PlayerId::new(index as u8), players, &others)
                .map_err(|err| ValidationError::InvalidField {
                    field: field.clone(),
                    message: err.to_string(),
                })?;
            profile.set(order).map_err(|err| ValidationError::InvalidField {
                field,
                message: err.to_string(),
            })?;
        }
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let field = |suffix: &str| format!("games[{}].{suffix}", self.name);
        if self.suits == 0 || self.suits > MAX_SUITS {
            return Err(ValidationError::InvalidField {
                field: field("suits"),
                message: format!("suits must be between 1 and {MAX_SUITS}"),
            });
        }
        let players = self.hands.len();
        if !(2..=MAX_PLAYERS).contains(&players) {
            return Err(ValidationError::InvalidField {
                field: field("hands"),
                message: format!("between 2 and {MAX_PLAYERS} hands are required"),
            });
        }
        let total: u32 = self.hands.iter().map(|&h| h as u32).sum();
        let expected = self.suits as u32 * CARDS_PER_SUIT as u32;
        if total != expected {
            return Err(ValidationError::InvalidField {
                field: field("hands"),
                message: format!("hands hold {total} cards but {} suits make {expected}", self.suits),
            });
        }
        if !self.seats.is_empty() && self.seats.len() != players {
            return Err(ValidationError::InvalidField {
                field: field("seats"),
                message: format!("expected {players} seats, found {}", self.seats.len()),
            });
        }
        if !self.preferences.is_empty() && self.preferences.len() != players {
            return Err(ValidationError::InvalidField {
                field: field("preferences"),
                message: format!("expected {players} rankings, found {}", self.preferences.len()),
            });
        }
        self.preference_profile().map(|_| ())
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_predict() -> bool {
    true
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_games(games: &[GameConfig]) -> Result<(), ValidationError> {
    if games.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "games".to_string(),
            message: "at least one game must be specified".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for game in games {
        if game.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "games.name".to_string(),
                message: "game name must not be empty".to_string(),
            });
        }
        if !game.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(ValidationError::InvalidField {
                field: format!("games[{}].name", game.name),
                message: "game name contains invalid characters".to_string(),
            });
        }
        if !seen.insert(game.name.as_str()) {
            return Err(ValidationError::InvalidField {
                field: "games".to_string(),
                message: format!("game name '{}' defined more than once", game.name),
            });
        }
        game.validate()?;
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

impl ResolvedOutputs {
    /// Structured telemetry is written beside the summary table.
    pub fn telemetry_jsonl(&self) -> PathBuf {
        self.summary_md
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("telemetry.jsonl")
    }
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
