//! Operator-execution seam and the synthetic reference operator.
//!
//! The real processing engine lives outside this crate. [`OperatorRunner`]
//! is the contract the sweep drives; [`BoxFilterOp`] is a small self-contained
//! implementation that genuinely honors the swept parameters (tile size,
//! cache budget, thread count) so measured times mean something.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::params::PerfParams;

/// The write target for one trial execution, created inside the sweep's
/// scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProduct {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Contract between the sweep loop and a processing operator.
pub trait OperatorRunner: Send + Sync {
    /// Operator name, used in progress messages and reports.
    fn name(&self) -> &str;

    /// Create the target product for one trial.
    ///
    /// `Ok(None)` means the operator could not produce a target at all; the
    /// sweep treats that as an unrecoverable precondition violation.
    fn create_target(&self, workdir: &Path) -> Result<Option<TargetProduct>>;

    /// Execute the operator once, end to end, under the given parameters.
    fn execute(&self, target: &TargetProduct, params: &PerfParams) -> Result<()>;

    /// Drop any cached intermediate tiles so the next trial starts cold.
    fn flush_tile_cache(&self);
}

/// Synthetic 3x3 box filter over a generated scene.
///
/// Tiles are `tile_size` square, filtered on a rayon pool of `threads`
/// workers, and source tiles are cached up to `cache_mib`. Stands in for an
/// external operator; no attempt at being a real resampler.
pub struct BoxFilterOp {
    width: u32,
    height: u32,
    targets: AtomicUsize,
    cache: TileCache,
}

impl BoxFilterOp {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, targets: AtomicUsize::new(0), cache: TileCache::default() }
    }

    /// Deterministic source pixel so trial outputs are comparable.
    fn source_pixel(x: i64, y: i64) -> f32 {
        ((x * 31 + y * 17).rem_euclid(251)) as f32
    }

    fn filtered_pixel(&self, x: u32, y: u32) -> f32 {
        let mut sum = 0.0f32;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (x as i64 + dx).clamp(0, self.width as i64 - 1);
                let sy = (y as i64 + dy).clamp(0, self.height as i64 - 1);
                sum += Self::source_pixel(sx, sy);
            }
        }
        sum / 9.0
    }

    /// Filter one tile, pulling the source tile through the cache.
    fn filter_tile(&self, tx: u32, ty: u32, tile: u32, budget: u64) -> Vec<f32> {
        let x0 = tx * tile;
        let y0 = ty * tile;
        let w = tile.min(self.width - x0);
        let h = tile.min(self.height - y0);

        // Warm the cache with the raw source tile; the filter itself reads
        // pixels directly so edge handling stays simple.
        self.cache.get_or_insert(tx, ty, budget, || {
            let mut raw = Vec::with_capacity((w * h) as usize);
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    raw.push(Self::source_pixel(x as i64, y as i64));
                }
            }
            raw
        });

        let mut out = Vec::with_capacity((w * h) as usize);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                out.push(self.filtered_pixel(x, y));
            }
        }
        out
    }
}

impl OperatorRunner for BoxFilterOp {
    fn name(&self) -> &str {
        "BoxFilter"
    }

    fn create_target(&self, workdir: &Path) -> Result<Option<TargetProduct>> {
        let n = self.targets.fetch_add(1, Ordering::Relaxed);
        let path = workdir.join(format!("boxfilter_{n:03}.raw"));
        Ok(Some(TargetProduct { path, width: self.width, height: self.height }))
    }

    fn execute(&self, target: &TargetProduct, params: &PerfParams) -> Result<()> {
        let tile = params.tile_size.max(1);
        let tiles_x = self.width.div_ceil(tile);
        let tiles_y = self.height.div_ceil(tile);
        let budget = params.cache_mib * 1024 * 1024;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.threads.max(1))
            .build()
            .context("building tile worker pool")?;

        let coords: Vec<(u32, u32)> =
            (0..tiles_y).flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty))).collect();

        let tiles: Vec<((u32, u32), Vec<f32>)> = pool.install(|| {
            coords
                .par_iter()
                .map(|&(tx, ty)| ((tx, ty), self.filter_tile(tx, ty, tile, budget)))
                .collect()
        });

        // Scatter tiles into a row-major raster so the product layout does
        // not depend on the tiling under test.
        let mut raster = vec![0.0f32; (self.width * self.height) as usize];
        for ((tx, ty), data) in &tiles {
            let x0 = tx * tile;
            let y0 = ty * tile;
            let w = tile.min(self.width - x0);
            for (row, chunk) in data.chunks(w as usize).enumerate() {
                let start = ((y0 + row as u32) * self.width + x0) as usize;
                raster[start..start + chunk.len()].copy_from_slice(chunk);
            }
        }

        let file = File::create(&target.path)
            .with_context(|| format!("creating target product {}", target.path.display()))?;
        let mut out = BufWriter::new(file);
        for value in &raster {
            out.write_all(&value.to_le_bytes())?;
        }
        out.flush().context("flushing target product")?;
        Ok(())
    }

    fn flush_tile_cache(&self) {
        self.cache.clear();
    }
}

/// Budget-capped cache of raw source tiles.
#[derive(Default)]
struct TileCache {
    inner: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    tiles: HashMap<(u32, u32), Vec<f32>>,
    bytes: u64,
}

impl TileCache {
    /// Insertion is skipped once the budget is exhausted; the tile is still
    /// produced and returned to the caller.
    fn get_or_insert(&self, tx: u32, ty: u32, budget: u64, produce: impl FnOnce() -> Vec<f32>) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.tiles.contains_key(&(tx, ty)) {
            return;
        }
        let raw = produce();
        let cost = (raw.len() * std::mem::size_of::<f32>()) as u64;
        if state.bytes + cost <= budget {
            state.bytes += cost;
            state.tiles.insert((tx, ty), raw);
        }
    }

    fn clear(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.tiles.clear();
        state.bytes = 0;
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).tiles.len()
    }
}
