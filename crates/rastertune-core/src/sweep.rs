//! The benchmark sweep loop.
//!
//! Strictly sequential: one trial at a time, on one worker. Parallel trials
//! would share the tile cache and thread pool under test and invalidate
//! every measurement.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::error::{Result, SweepError};
use crate::operator::OperatorRunner;
use crate::params::{ParamStore, ParamsRestoreGuard};
use crate::trial::TrialSet;

/// Progress units credited per completed trial.
pub const TRIAL_WORK_UNITS: u64 = 100;

/// Progress surface for a running sweep.
pub trait SweepObserver: Send {
    fn begin(&mut self, _total_units: u64) {}
    fn trial_started(&mut self, _index: usize, _params: &crate::params::PerfParams) {}
    fn advance(&mut self, _units: u64) {}
    fn done(&mut self) {}
}

/// Observer that ignores everything. Useful in tests.
pub struct NullObserver;

impl SweepObserver for NullObserver {}

/// The outcome of a completed sweep, handed back to the caller. Adopting the
/// winning parameters is the caller's decision; the sweep itself leaves the
/// store exactly as it found it.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub trials: TrialSet,
    pub fastest_index: usize,
    pub total: Duration,
}

impl SweepReport {
    pub fn fastest(&self) -> &crate::trial::Trial {
        &self.trials.trials[self.fastest_index]
    }
}

/// Run the full benchmark sweep.
///
/// The currently-active parameters are appended to `set` as an extra trial,
/// so the baseline configuration is always measured and can win. Each trial
/// creates a fresh target product inside a scratch directory, applies its
/// parameters to `store`, executes the operator once, records wall-clock
/// elapsed time, then flushes the operator's tile cache.
///
/// The first failing trial aborts the sweep; no retry, no partial results.
/// On every exit path the store is restored to its pre-sweep value and the
/// scratch directory is removed.
pub fn run_sweep(
    runner: &dyn OperatorRunner,
    store: &dyn ParamStore,
    mut set: TrialSet,
    observer: &mut dyn SweepObserver,
) -> Result<SweepReport> {
    if set.is_empty() {
        return Err(SweepError::EmptySet);
    }
    set.push(store.current());

    let workdir = tempfile::Builder::new().prefix("rastertune-bench-").tempdir()?;
    let guard = ParamsRestoreGuard::capture(store);
    let started = Instant::now();

    let outcome = drive_trials(runner, store, &mut set, workdir.path(), observer);

    // Restore first, then delete the scratch directory. Both are
    // best-effort and run whether the loop succeeded or not.
    drop(guard);
    if let Err(e) = workdir.close() {
        warn!(error = %e, "could not remove benchmark scratch directory");
    }

    match outcome {
        Ok(()) => {
            observer.done();
            let fastest_index = set.fastest_index().ok_or(SweepError::EmptySet)?;
            info!(
                fastest = %set.trials[fastest_index].params,
                "benchmark sweep complete"
            );
            Ok(SweepReport { trials: set, fastest_index, total: started.elapsed() })
        }
        Err(e) => {
            error!(error = %e, "could not perform benchmark");
            Err(e)
        }
    }
}

fn drive_trials(
    runner: &dyn OperatorRunner,
    store: &dyn ParamStore,
    set: &mut TrialSet,
    workdir: &Path,
    observer: &mut dyn SweepObserver,
) -> Result<()> {
    observer.begin(set.len() as u64 * TRIAL_WORK_UNITS);

    for (index, trial) in set.trials.iter_mut().enumerate() {
        observer.trial_started(index, &trial.params);
        info!(operator = runner.name(), trial = index, params = %trial.params, "benchmarking");

        let target = runner
            .create_target(workdir)
            .map_err(SweepError::TargetCreation)?
            .ok_or(SweepError::MissingTarget)?;

        store.apply(trial.params);
        let active = store.current();

        let start = Instant::now();
        runner
            .execute(&target, &active)
            .map_err(|source| SweepError::Execution { params: active, source })?;
        trial.elapsed = Some(start.elapsed());

        // Cold cache for the next trial.
        runner.flush_tile_cache();
        observer.advance(TRIAL_WORK_UNITS);
    }

    Ok(())
}
