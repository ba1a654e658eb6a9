//! Benchmark sweep command implementation

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use rastertune_core::{
    run_sweep, BoxFilterOp, ParamStore, PerfParams, ProcessParamStore, SweepObserver, SweepReport,
    TrialSet,
};

use crate::config::CliConfig;

/// Sweep command arguments
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// Tile sizes to benchmark, in pixels
    #[arg(long, value_delimiter = ',', default_values = ["256", "512", "1024"])]
    pub tile_sizes: Vec<u32>,

    /// Tile-cache sizes to benchmark, in MiB
    #[arg(long, value_delimiter = ',', default_values = ["512", "1024", "2048"])]
    pub cache_sizes: Vec<u64>,

    /// Thread counts to benchmark (defaults to 1, half the cores, all cores)
    #[arg(long, value_delimiter = ',', value_name = "N")]
    pub threads: Vec<usize>,

    /// Width of the synthetic scene, in pixels
    #[arg(long, default_value = "2048", value_name = "PX")]
    pub width: u32,

    /// Height of the synthetic scene, in pixels
    #[arg(long, default_value = "2048", value_name = "PX")]
    pub height: u32,

    /// Output format (text, json, csv)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: String,

    /// Output file for results
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Adopt the winning parameters as the new defaults
    #[arg(long)]
    pub accept: bool,
}

/// One row of the rendered results.
#[derive(Debug, Serialize)]
struct TrialRow {
    tile_size: u32,
    cache_mib: u64,
    threads: usize,
    elapsed_ms: u128,
    fastest: bool,
}

/// Serializable sweep results.
#[derive(Debug, Serialize)]
struct SweepResults {
    operator: String,
    timestamp: String,
    scene_width: u32,
    scene_height: u32,
    total_duration_s: f64,
    trials: Vec<TrialRow>,
}

/// Drives an indicatif bar from sweep progress callbacks.
struct BarObserver {
    bar: ProgressBar,
}

impl SweepObserver for BarObserver {
    fn begin(&mut self, total_units: u64) {
        self.bar.set_length(total_units);
    }

    fn trial_started(&mut self, _index: usize, params: &PerfParams) {
        self.bar.set_message(format!("Benchmarking ({params})"));
    }

    fn advance(&mut self, units: u64) {
        self.bar.inc(units);
    }

    fn done(&mut self) {
        self.bar
            .finish_with_message(format!("{} Benchmark sweep completed", style("✓").green()));
    }
}

impl SweepCommand {
    /// Execute the sweep command
    pub async fn execute(&self, config: &CliConfig, config_path: &Path) -> Result<()> {
        self.validate_args()?;

        let thread_counts = self.thread_counts();
        let set = TrialSet::from_grid(&self.tile_sizes, &self.cache_sizes, &thread_counts);
        info!(
            trials = set.len() + 1,
            width = self.width,
            height = self.height,
            "starting benchmark sweep"
        );

        // Seed the process-wide store from the persisted defaults; the sweep
        // restores it before returning.
        let store = ProcessParamStore::global();
        store.apply(config.performance);

        let runner = BoxFilterOp::new(self.width, self.height);

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        let mut observer = BarObserver { bar: bar.clone() };

        // The sweep itself is blocking and strictly sequential; run it off
        // the async runtime so the progress surface stays live.
        let report = tokio::task::spawn_blocking(move || {
            run_sweep(&runner, store, set, &mut observer)
        })
        .await
        .context("benchmark worker panicked")?;

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                bar.abandon_with_message(format!("{} Benchmark failed", style("✗").red()));
                return Err(e).context("could not perform benchmark");
            }
        };

        self.output_results(&report)?;
        self.persist(config, config_path, &report)?;
        Ok(())
    }

    fn validate_args(&self) -> Result<()> {
        match self.format.as_str() {
            "text" | "json" | "csv" => {}
            _ => anyhow::bail!(
                "Invalid format: {}. Must be one of: text, json, csv",
                self.format
            ),
        }
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("Scene dimensions must be greater than 0");
        }
        for &tile_size in &self.tile_sizes {
            if tile_size == 0 {
                anyhow::bail!("Tile size must be greater than 0");
            }
        }
        for &n in &self.threads {
            if n == 0 {
                anyhow::bail!("Thread count must be greater than 0");
            }
        }
        Ok(())
    }

    /// Thread counts under test; defaults scale with the machine.
    fn thread_counts(&self) -> Vec<usize> {
        if !self.threads.is_empty() {
            return self.threads.clone();
        }
        let cores = num_cpus::get();
        let mut counts = vec![1, cores.div_ceil(2), cores];
        counts.dedup();
        counts
    }

    fn results(&self, report: &SweepReport) -> SweepResults {
        let trials = report
            .trials
            .trials
            .iter()
            .enumerate()
            .map(|(i, trial)| TrialRow {
                tile_size: trial.params.tile_size,
                cache_mib: trial.params.cache_mib,
                threads: trial.params.threads,
                elapsed_ms: trial.elapsed_ms().unwrap_or_default(),
                fastest: i == report.fastest_index,
            })
            .collect();
        SweepResults {
            operator: "BoxFilter".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            scene_width: self.width,
            scene_height: self.height,
            total_duration_s: report.total.as_secs_f64(),
            trials,
        }
    }

    /// Render the results in the selected format.
    fn output_results(&self, report: &SweepReport) -> Result<()> {
        let output: Box<dyn Write> = if let Some(output_path) = &self.output {
            Box::new(std::fs::File::create(output_path).with_context(|| {
                format!("Failed to create output file: {}", output_path.display())
            })?)
        } else {
            Box::new(std::io::stdout())
        };

        match self.format.as_str() {
            "json" => {
                serde_json::to_writer_pretty(output, &self.results(report))?;
            }
            "csv" => {
                self.write_csv_results(output, report)?;
            }
            _ => {
                self.write_text_results(output, report)?;
            }
        }
        Ok(())
    }

    fn write_text_results(&self, mut output: Box<dyn Write>, report: &SweepReport) -> Result<()> {
        writeln!(output, "\n{}", style("Benchmark results").bold().cyan())?;
        writeln!(output, "=================")?;
        writeln!(output)?;
        writeln!(output, "Scene: {}x{} px, operator: BoxFilter", self.width, self.height)?;
        writeln!(output, "Total duration: {:.2}s", report.total.as_secs_f64())?;
        writeln!(output)?;
        write!(output, "{}", report.trials)?;
        writeln!(output)?;
        writeln!(
            output,
            "{} {}",
            style("Fastest:").bold().green(),
            report.fastest().params
        )?;
        Ok(())
    }

    fn write_csv_results(&self, mut output: Box<dyn Write>, report: &SweepReport) -> Result<()> {
        writeln!(output, "tile_size,cache_mib,threads,elapsed_ms,fastest")?;
        for row in self.results(report).trials {
            writeln!(
                output,
                "{},{},{},{},{}",
                row.tile_size, row.cache_mib, row.threads, row.elapsed_ms, row.fastest
            )?;
        }
        Ok(())
    }

    /// Persist what the user asked to keep: the winning parameters when
    /// `--accept` is set, and the last output directory when one was used.
    /// Without `--accept` the performance defaults stay untouched.
    fn persist(&self, config: &CliConfig, config_path: &Path, report: &SweepReport) -> Result<()> {
        let mut updated = config.clone();
        let mut dirty = false;

        if let Some(dir) = self.output.as_ref().and_then(|p| p.parent()) {
            if !dir.as_os_str().is_empty() {
                updated.last_output_dir = Some(dir.to_path_buf());
                dirty = true;
            }
        }

        if self.accept {
            let winner = report.fastest().params;
            updated.performance = winner;
            dirty = true;
            println!(
                "{} Adopted new performance defaults: {}",
                style("✓").green(),
                winner
            );
        } else {
            println!("Re-run with --accept to adopt the fastest configuration as the default.");
        }

        if dirty {
            updated.save(config_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        cmd: SweepCommand,
    }

    fn parse(args: &[&str]) -> SweepCommand {
        Harness::parse_from(std::iter::once("sweep").chain(args.iter().copied())).cmd
    }

    #[test]
    fn default_grid_is_three_by_three() {
        let cmd = parse(&[]);
        assert_eq!(cmd.tile_sizes, vec![256, 512, 1024]);
        assert_eq!(cmd.cache_sizes, vec![512, 1024, 2048]);
        assert!(cmd.threads.is_empty());
        assert!(!cmd.accept);
    }

    #[test]
    fn list_arguments_are_comma_delimited() {
        let cmd = parse(&["--tile-sizes", "128,256", "--threads", "1,8"]);
        assert_eq!(cmd.tile_sizes, vec![128, 256]);
        assert_eq!(cmd.threads, vec![1, 8]);
    }

    #[test]
    fn rejects_unknown_format() {
        let cmd = parse(&["--format", "xml"]);
        assert!(cmd.validate_args().is_err());
    }

    #[test]
    fn rejects_zero_tile_size() {
        let cmd = parse(&["--tile-sizes", "0,256"]);
        assert!(cmd.validate_args().is_err());
    }

    #[test]
    fn thread_defaults_cover_machine_range() {
        let cmd = parse(&[]);
        let counts = cmd.thread_counts();
        assert_eq!(counts.first(), Some(&1));
        assert_eq!(counts.last(), Some(&num_cpus::get()));
    }
}
