//! # lgore-runner
//!
//! Busy-worker demo for `lgore-core`.
//!
//! Reserves the configured cores, then starts one spinning worker per lgore
//! (or `--workers N`), each pinned to its own core, until Ctrl+C or
//! `--duration-secs` elapses. Per-worker iteration counts are printed on exit.
//!
//! # Usage
//!
//! ```bash
//! lgore-runner --reserve 0-1 --duration-secs 10
//! lgore-runner config.json --log-level debug
//! ```

mod config;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lgore_core::logging::{LogOptions, init_logging};
use lgore_core::core_set::parse_cpu_list;
use lgore_core::{CoreSet, Environment, LgoreConfig};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::worker::{WorkerReport, run_busy_worker};

/// Pin busy workers to exclusive CPU cores.
#[derive(Parser)]
#[command(name = "lgore-runner", about = "Pin busy workers to exclusive CPU cores")]
struct Cli {
    /// Optional configuration file path (JSON).
    config: Option<PathBuf>,

    /// Ordinals of allowed cores to keep out of the pool, in cpulist form
    /// (`0`, `0-1,4`). Repeatable.
    #[arg(short, long = "reserve", value_parser = parse_cpu_list)]
    reserve: Vec<CoreSet>,

    /// Number of workers (default: one per lgore).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many seconds instead of waiting for Ctrl+C.
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// File config with command-line overrides applied.
    fn resolve(&self) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => RunnerConfig::default(),
        };
        if !self.reserve.is_empty() {
            let ordinals: CoreSet = self.reserve.iter().flat_map(|set| set.iter()).collect();
            config.lgore = LgoreConfig { reserve_cores: ordinals.iter().collect(), ..config.lgore };
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.duration_secs.is_some() {
            config.duration_secs = self.duration_secs;
        }
        if self.log_dir.is_some() {
            config.log.log_path = self.log_dir.clone();
        }
        Ok(config)
    }
}

/// Wait for every worker task and return how many of them failed.
async fn join_workers(tasks: Vec<JoinHandle<lgore_core::Result<()>>>) -> usize {
    let mut failed = 0;
    for (id, task) in tasks.into_iter().enumerate() {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("[lgore {id}] worker failed: {e}");
                failed += 1;
            }
            Err(e) => {
                error!("[lgore {id}] worker panicked: {e}");
                failed += 1;
            }
        }
    }
    failed
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    // 1. Initialize logging
    let module_name = config.log.module_name.as_deref().unwrap_or("lgore-runner");
    init_logging(&LogOptions {
        level: &cli.log_level,
        dir: config.log.log_path.as_deref(),
        file_prefix: module_name,
        json: cli.log_json,
    })?;
    info!("lgore-runner starting — reserve={:?}", config.lgore.reserve_cores);

    // 2. Build the lgore pool
    let env = Arc::new(Environment::init(&config.lgore).context("initializing lgore environment")?);
    let count = env.lgore_count();
    info!("available worker count: {count}");
    info!("lgores: {}", serde_json::to_string(&env.snapshot())?);

    let workers = match config.workers {
        Some(n) if n > count => {
            warn!("requested {n} workers but only {count} lgore(s) available");
            count
        }
        Some(n) => n,
        None => count,
    };

    // 3. Start one blocking worker per lgore
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = crossbeam_channel::bounded::<WorkerReport>(workers);
    let mut tasks = Vec::with_capacity(workers);
    for id in 0..workers {
        let (env, stop, tx) = (env.clone(), stop.clone(), tx.clone());
        tasks.push(tokio::task::spawn_blocking(move || run_busy_worker(&env, id, &stop, &tx)));
    }
    drop(tx);
    info!("{workers} worker(s) started — press Ctrl+C to stop");

    // 4. Wait for shutdown signal, deadline, or every worker exiting on its own
    let workers_done = join_workers(tasks);
    tokio::pin!(workers_done);

    let deadline = async {
        match config.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    let failed = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("shutdown signal received");
            stop.store(true, Ordering::Relaxed);
            (&mut workers_done).await
        }
        _ = deadline => {
            info!("run duration elapsed");
            stop.store(true, Ordering::Relaxed);
            (&mut workers_done).await
        }
        // workers only return before `stop` when they fail
        failed = &mut workers_done => {
            warn!("all workers exited before shutdown");
            failed
        }
    };

    // 5. Report
    let mut reports: Vec<WorkerReport> = rx.iter().collect();
    reports.sort_by_key(|r| r.id);
    let total: u64 = reports.iter().map(|r| r.iterations).sum();
    for report in &reports {
        info!("{report}");
    }
    info!("{} worker(s) finished, {total} iterations in total — goodbye", reports.len());
    if failed > 0 && reports.is_empty() {
        anyhow::bail!("all {failed} worker(s) failed to occupy their lgore");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from(["lgore-runner", "-r", "2", "-r", "0", "-w", "3", "-d", "5"]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.lgore.reserve_cores, vec![0, 2]);
        assert!(!config.lgore.occupy_all);
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.duration_secs, Some(5));
    }

    #[test]
    fn reserve_accepts_cpu_lists() {
        let cli = Cli::parse_from(["lgore-runner", "--reserve", "0-1,4", "--reserve", "1,6"]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.lgore.reserve_cores, vec![0, 1, 4, 6]);

        assert!(Cli::try_parse_from(["lgore-runner", "--reserve", "3-1"]).is_err());
        assert!(Cli::try_parse_from(["lgore-runner", "--reserve", "x"]).is_err());
    }

    #[tokio::test]
    async fn join_workers_counts_failures() {
        // two workers that cannot get their lgore, one that finishes cleanly
        let env = Arc::new(Environment::with_port(
            &LgoreConfig::default(),
            Arc::new(lgore_core::FakeAffinity::with_cores(2).unwrap()),
        ).unwrap());
        let stop = Arc::new(AtomicBool::new(true));
        let (tx, rx) = crossbeam_channel::unbounded();
        let tasks = vec![
            tokio::task::spawn_blocking(|| Err(lgore_core::LgoreError::NotSupported)),
            tokio::task::spawn_blocking(move || run_busy_worker(&env, 7, &stop, &tx)),
            tokio::task::spawn_blocking(|| Ok(())),
        ];
        assert_eq!(join_workers(tasks).await, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_failed_workers_finish_without_stop() {
        let tasks = (0..3)
            .map(|_| tokio::task::spawn_blocking(|| Err(lgore_core::LgoreError::NoneAvailable)))
            .collect();
        // completes on its own: the runner does not need a signal to exit
        let failed = tokio::time::timeout(Duration::from_secs(5), join_workers(tasks)).await.unwrap();
        assert_eq!(failed, 3);
    }

    #[test]
    fn no_flags_keep_default_reservation() {
        let cli = Cli::parse_from(["lgore-runner"]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.lgore, LgoreConfig::default());
        assert!(config.workers.is_none());
    }
}
