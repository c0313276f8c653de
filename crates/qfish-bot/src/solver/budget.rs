use super::SolverError;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Caps on a single search. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverBudget {
    pub max_nodes: Option<usize>,
    pub time_limit: Option<Duration>,
}

impl SolverBudget {
    pub const fn unlimited() -> Self {
        Self {
            max_nodes: None,
            time_limit: None,
        }
    }

    pub const fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub const fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Counters for the most recent search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SolverStats {
    pub nodes: usize,
    pub memo_hits: usize,
    pub memo_size: usize,
    pub max_depth: usize,
    pub elapsed_ms: u64,
}

/// Charges node expansions against a budget.
pub(crate) struct Meter {
    budget: SolverBudget,
    started: Instant,
    nodes: usize,
}

impl Meter {
    pub(crate) fn start(budget: SolverBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            nodes: 0,
        }
    }

    pub(crate) fn nodes(&self) -> usize {
        self.nodes
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub(crate) fn charge(&mut self) -> Result<(), SolverError> {
        self.nodes += 1;
        let over_nodes = self.budget.max_nodes.is_some_and(|max| self.nodes > max);
        let over_time = self
            .budget
            .time_limit
            .is_some_and(|limit| self.started.elapsed() > limit);
        if over_nodes || over_time {
            return Err(SolverError::BudgetExceeded {
                nodes: self.nodes,
                elapsed_ms: self.elapsed_ms(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_cap_trips_after_the_limit() {
        let mut meter = Meter::start(SolverBudget::unlimited().with_max_nodes(2));
        assert!(meter.charge().is_ok());
        assert!(meter.charge().is_ok());
        assert!(matches!(
            meter.charge(),
            Err(SolverError::BudgetExceeded { nodes: 3, .. })
        ));
    }

    #[test]
    fn zero_time_limit_trips_once_time_passes() {
        let mut meter = Meter::start(SolverBudget::unlimited().with_time_limit(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        assert!(meter.charge().is_err());
    }
}
