//! Trial records and the sweep's trial set.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::params::PerfParams;

/// One benchmark trial: a parameter combination and, once the sweep has run
/// it, the measured wall-clock execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub params: PerfParams,
    /// Recorded exactly once, by the sweep loop.
    pub elapsed: Option<Duration>,
}

impl Trial {
    pub fn new(params: PerfParams) -> Self {
        Self { params, elapsed: None }
    }

    /// Elapsed time in whole milliseconds, if measured.
    pub fn elapsed_ms(&self) -> Option<u128> {
        self.elapsed.map(|d| d.as_millis())
    }
}

/// Ordered collection of trials for one sweep session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialSet {
    pub trials: Vec<Trial>,
}

impl TrialSet {
    pub fn new(trials: Vec<Trial>) -> Self {
        Self { trials }
    }

    /// Cartesian grid of tile sizes, cache sizes and thread counts, in the
    /// given order.
    pub fn from_grid(tile_sizes: &[u32], cache_mibs: &[u64], threads: &[usize]) -> Self {
        let mut trials =
            Vec::with_capacity(tile_sizes.len() * cache_mibs.len() * threads.len());
        for &tile_size in tile_sizes {
            for &cache_mib in cache_mibs {
                for &n in threads {
                    trials.push(Trial::new(PerfParams { tile_size, cache_mib, threads: n }));
                }
            }
        }
        Self { trials }
    }

    /// Append one more trial, typically the currently-active parameters.
    pub fn push(&mut self, params: PerfParams) {
        self.trials.push(Trial::new(params));
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Index of the trial with the minimum recorded execution time.
    ///
    /// Ties go to the first-seen trial; trials without a measurement never
    /// win. `None` when nothing has been measured.
    pub fn fastest_index(&self) -> Option<usize> {
        let mut best: Option<(usize, Duration)> = None;
        for (i, trial) in self.trials.iter().enumerate() {
            if let Some(elapsed) = trial.elapsed {
                match best {
                    Some((_, best_elapsed)) if elapsed >= best_elapsed => {}
                    _ => best = Some((i, elapsed)),
                }
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn fastest(&self) -> Option<&Trial> {
        self.fastest_index().map(|i| &self.trials[i])
    }
}

impl fmt::Display for TrialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fastest = self.fastest_index();
        for (i, trial) in self.trials.iter().enumerate() {
            let elapsed = match trial.elapsed_ms() {
                Some(ms) => format!("{ms} ms"),
                None => "not run".to_string(),
            };
            let marker = if fastest == Some(i) { "  <- fastest" } else { "" };
            writeln!(f, "{} : {}{}", trial.params, elapsed, marker)?;
        }
        Ok(())
    }
}
