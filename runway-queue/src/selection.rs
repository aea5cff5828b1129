//! Runner selection strategies
//!
//! Once admission has found the runners with enough free memory, a strategy
//! picks the one that receives the request.

use rand::seq::IndexedRandom;
use runway_core::domain::runner::RunnerState;

use crate::remote::RemoteRunner;

/// A runner that can accept the request, with the state observed for it
#[derive(Debug, Clone)]
pub struct AvailableRunner {
    pub runner: RemoteRunner,
    pub state: RunnerState,
}

/// Policy picking one runner among those able to take a request
pub trait RunnerSelectionStrategy: Send + Sync {
    /// Picks a runner; `None` only when `candidates` is empty
    fn select<'a>(&self, candidates: &'a [AvailableRunner]) -> Option<&'a AvailableRunner>;
}

/// Picks uniformly at random
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelectionStrategy;

impl RunnerSelectionStrategy for RandomSelectionStrategy {
    fn select<'a>(&self, candidates: &'a [AvailableRunner]) -> Option<&'a AvailableRunner> {
        candidates.choose(&mut rand::rng())
    }
}

/// Picks the runner with the most free memory
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoadedSelectionStrategy;

impl RunnerSelectionStrategy for LeastLoadedSelectionStrategy {
    fn select<'a>(&self, candidates: &'a [AvailableRunner]) -> Option<&'a AvailableRunner> {
        candidates
            .iter()
            .max_by_key(|candidate| candidate.state.free_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEndpoint;

    fn candidate(url: &str, free_memory: u64) -> AvailableRunner {
        AvailableRunner {
            runner: RemoteRunner::new("node", FakeEndpoint::new(url, &[("node", free_memory)])),
            state: RunnerState {
                name: "node".to_string(),
                total_memory: 4096,
                free_memory,
                running_apps: 0,
            },
        }
    }

    #[test]
    fn test_random_picks_a_candidate() {
        let candidates = vec![candidate("http://r1", 512), candidate("http://r2", 512)];
        for _ in 0..20 {
            let picked = RandomSelectionStrategy.select(&candidates).unwrap();
            assert!(candidates.iter().any(|c| c.runner == picked.runner));
        }
        assert!(RandomSelectionStrategy.select(&[]).is_none());
    }

    #[test]
    fn test_least_loaded_picks_most_free_memory() {
        let candidates = vec![
            candidate("http://r1", 512),
            candidate("http://r2", 2048),
            candidate("http://r3", 1024),
        ];
        let picked = LeastLoadedSelectionStrategy.select(&candidates).unwrap();
        assert_eq!(picked.runner.base_url(), "http://r2");
    }
}
