use qfish_core::GameError;
use qfish_core::model::PlayerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// The node or time cap was hit. The caller may retry with a larger budget.
    #[error("search budget exhausted after {nodes} nodes in {elapsed_ms} ms")]
    BudgetExceeded { nodes: usize, elapsed_ms: u64 },
    #[error("no preference order declared for {0}")]
    MissingPreferences(PlayerId),
    #[error("the position is already decided")]
    TerminalPosition,
    #[error("{0} has no legal action")]
    NoLegalAction(PlayerId),
    #[error(transparent)]
    Game(#[from] GameError),
}
