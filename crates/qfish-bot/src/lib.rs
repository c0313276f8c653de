pub mod solver;
pub mod strategy;

pub use solver::{
    Action, Analysis, AnswerTieBreak, Solver, SolverBudget, SolverConfig, SolverError, SolverStats,
};
pub use strategy::{
    DecisionContext, FirstLegalStrategy, PlayError, PlayRecord, SolverStrategy, Strategy, play_out,
};
