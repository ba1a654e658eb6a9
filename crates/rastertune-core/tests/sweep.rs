//! End-to-end sweeps over the synthetic box-filter operator.

use rastertune_core::{
    run_sweep, BoxFilterOp, NullObserver, ParamStore, PerfParams, ProcessParamStore, TrialSet,
};
use serial_test::serial;

#[test]
fn box_filter_sweep_measures_every_combination() {
    let runner = BoxFilterOp::new(96, 96);
    let store = ProcessParamStore::new(PerfParams { tile_size: 48, cache_mib: 32, threads: 1 });
    let set = TrialSet::from_grid(&[16, 32], &[8], &[1, 2]);

    let report = run_sweep(&runner, &store, set, &mut NullObserver).unwrap();

    // 2x1x2 grid plus the baseline configuration.
    assert_eq!(report.trials.len(), 5);
    for trial in &report.trials.trials {
        assert!(trial.elapsed.is_some());
    }
    assert!(report.fastest_index < report.trials.len());
    assert_eq!(report.fastest().params, report.trials.fastest().unwrap().params);
    assert!(report.total >= report.fastest().elapsed.unwrap());
}

#[test]
fn sweep_leaves_store_untouched() {
    let runner = BoxFilterOp::new(64, 64);
    let before = PerfParams { tile_size: 64, cache_mib: 16, threads: 2 };
    let store = ProcessParamStore::new(before);
    let set = TrialSet::from_grid(&[16, 64], &[8], &[1]);

    run_sweep(&runner, &store, set, &mut NullObserver).unwrap();
    assert_eq!(store.current(), before);
}

#[test]
#[serial]
fn global_store_is_restored_after_a_sweep() {
    let store = ProcessParamStore::global();
    let before = PerfParams { tile_size: 40, cache_mib: 24, threads: 2 };
    store.apply(before);

    let runner = BoxFilterOp::new(64, 64);
    let set = TrialSet::from_grid(&[32], &[8], &[1, 2]);
    let report = run_sweep(&runner, store, set, &mut NullObserver).unwrap();

    assert_eq!(store.current(), before);
    // The baseline trial carries the global store's pre-sweep value.
    assert_eq!(report.trials.trials.last().unwrap().params, before);
}
