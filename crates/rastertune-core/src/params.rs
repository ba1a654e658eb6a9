//! Performance parameters and the process-wide parameter store.

use std::fmt;
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One performance configuration: the three knobs the sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfParams {
    /// Edge length of a square raster tile, in pixels.
    pub tile_size: u32,
    /// Tile-cache budget, in MiB.
    pub cache_mib: u64,
    /// Worker threads for tile processing.
    pub threads: usize,
}

impl Default for PerfParams {
    fn default() -> Self {
        Self { tile_size: 512, cache_mib: 1024, threads: num_cpus::get() }
    }
}

impl fmt::Display for PerfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile size: {}, cache size: {} MiB, threads: {}",
            self.tile_size, self.cache_mib, self.threads
        )
    }
}

/// Read/write access to the active performance configuration.
///
/// Single-writer by convention: only one sweep may mutate the store at a
/// time, and sweeps never run concurrently.
pub trait ParamStore: Send + Sync {
    /// The currently-active parameters.
    fn current(&self) -> PerfParams;

    /// Make `params` the active configuration.
    fn apply(&self, params: PerfParams);
}

/// In-process parameter store backing the whole application.
#[derive(Debug)]
pub struct ProcessParamStore {
    inner: RwLock<PerfParams>,
}

impl ProcessParamStore {
    pub fn new(params: PerfParams) -> Self {
        Self { inner: RwLock::new(params) }
    }

    /// The process-wide store instance.
    pub fn global() -> &'static ProcessParamStore {
        static GLOBAL: OnceLock<ProcessParamStore> = OnceLock::new();
        GLOBAL.get_or_init(|| ProcessParamStore::new(PerfParams::default()))
    }
}

impl Default for ProcessParamStore {
    fn default() -> Self {
        Self::new(PerfParams::default())
    }
}

impl ParamStore for ProcessParamStore {
    fn current(&self) -> PerfParams {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, params: PerfParams) {
        debug!(%params, "applying performance parameters");
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = params;
    }
}

/// Restores the store's pre-sweep parameters when dropped.
///
/// Held for the whole sweep so the configuration active at sweep end equals
/// the configuration active at sweep start, on every exit path.
pub struct ParamsRestoreGuard<'a> {
    store: &'a dyn ParamStore,
    saved: PerfParams,
}

impl<'a> ParamsRestoreGuard<'a> {
    pub fn capture(store: &'a dyn ParamStore) -> Self {
        let saved = store.current();
        Self { store, saved }
    }

    /// The parameters that will be restored.
    pub fn saved(&self) -> PerfParams {
        self.saved
    }
}

impl Drop for ParamsRestoreGuard<'_> {
    fn drop(&mut self) {
        self.store.apply(self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threads_match_machine() {
        let params = PerfParams::default();
        assert_eq!(params.threads, num_cpus::get());
        assert!(params.tile_size > 0);
    }

    #[test]
    fn store_roundtrip() {
        let store = ProcessParamStore::default();
        let params = PerfParams { tile_size: 128, cache_mib: 64, threads: 2 };
        store.apply(params);
        assert_eq!(store.current(), params);
    }

    #[test]
    fn guard_restores_on_drop() {
        let store = ProcessParamStore::new(PerfParams { tile_size: 256, cache_mib: 512, threads: 4 });
        let before = store.current();
        {
            let _guard = ParamsRestoreGuard::capture(&store);
            store.apply(PerfParams { tile_size: 32, cache_mib: 8, threads: 1 });
            assert_ne!(store.current(), before);
        }
        assert_eq!(store.current(), before);
    }

    #[test]
    fn guard_restores_on_panic() {
        let store = ProcessParamStore::new(PerfParams { tile_size: 256, cache_mib: 512, threads: 4 });
        let before = store.current();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ParamsRestoreGuard::capture(&store);
            store.apply(PerfParams { tile_size: 16, cache_mib: 4, threads: 1 });
            panic!("trial blew up");
        }));
        assert!(result.is_err());
        assert_eq!(store.current(), before);
    }

    #[test]
    fn display_names_all_three_knobs() {
        let text = PerfParams { tile_size: 512, cache_mib: 1024, threads: 8 }.to_string();
        assert!(text.contains("512"));
        assert!(text.contains("1024"));
        assert!(text.contains("8"));
    }
}
