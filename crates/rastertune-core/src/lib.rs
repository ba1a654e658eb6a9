//! Benchmark sweep engine for tiled raster processing parameters.
//!
//! Runs the same processing operator under several combinations of tile
//! size, cache size and thread count, measures wall-clock time for each
//! combination, and reports the fastest one so the caller can adopt it as
//! the new default performance configuration. The operator itself sits
//! behind the [`OperatorRunner`] seam; this crate owns only the sweep loop,
//! the selection policy, and the restore-everything cleanup discipline.

pub mod error;
pub mod operator;
pub mod params;
pub mod sweep;
pub mod trial;

pub use error::{Result, SweepError};
pub use operator::{BoxFilterOp, OperatorRunner, TargetProduct};
pub use params::{ParamStore, ParamsRestoreGuard, PerfParams, ProcessParamStore};
pub use sweep::{run_sweep, NullObserver, SweepObserver, SweepReport, TRIAL_WORK_UNITS};
pub use trial::{Trial, TrialSet};
