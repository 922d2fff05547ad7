//! Busy worker that holds one lgore for its whole lifetime.
//!
//! The worker occupies its lgore, spins until told to stop, releases, and
//! reports how much it got done over a crossbeam channel. Watching `htop`
//! while it runs shows each worker stuck to its own core.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use lgore_core::Environment;
use tracing::info;

/// Result of one worker run.
#[derive(Debug, Clone, Copy)]
pub struct WorkerReport {
    pub id: usize,
    pub core_id: usize,
    pub iterations: u64,
    pub elapsed: Duration,
}

impl std::fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        let rate = if secs > 0.0 { self.iterations as f64 / secs } else { 0.0 };
        write!(
            f,
            "lgore={} core={} iterations={} elapsed={:.2}s rate={:.0}/s",
            self.id, self.core_id, self.iterations, secs, rate,
        )
    }
}

/// Run a busy loop on lgore `id` on the calling thread.
///
/// Blocks until `stop` is set. Must run on a dedicated thread (or
/// `spawn_blocking`), never inside an async task.
pub fn run_busy_worker(
    env: &Environment,
    id: usize,
    stop: &AtomicBool,
    tx: &Sender<WorkerReport>,
) -> lgore_core::Result<()> {
    let occupancy = env.occupy(id)?;
    let core_id = occupancy.core_id();
    info!("[lgore {id}] worker started on core {core_id}");

    let start = Instant::now();
    let mut iterations: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        iterations = black_box(iterations.wrapping_add(1));
    }
    let elapsed = start.elapsed();

    occupancy.release()?;
    info!("[lgore {id}] worker exited");

    // receiver gone means the runner is shutting down anyway
    let _ = tx.send(WorkerReport { id, core_id, iterations, elapsed });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use lgore_core::{FakeAffinity, LgoreConfig, LgoreError, LgoreState};

    use super::*;

    fn fake_env() -> Environment {
        let fake = Arc::new(FakeAffinity::with_cores(4).unwrap());
        Environment::with_port(&LgoreConfig::default(), fake).unwrap()
    }

    #[test]
    fn worker_reports_and_releases() {
        let env = fake_env();
        let stop = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded();

        thread::scope(|s| {
            let worker = s.spawn(|| run_busy_worker(&env, 1, &stop, &tx));
            // busy while running
            while env.lgore_state(1).unwrap() != LgoreState::Busy && !worker.is_finished() {
                thread::yield_now();
            }
            stop.store(true, Ordering::Relaxed);
            worker.join().unwrap().unwrap();
        });

        let report = rx.try_recv().unwrap();
        assert_eq!(report.id, 1);
        assert_eq!(report.core_id, 2);
        assert_eq!(env.lgore_state(1).unwrap(), LgoreState::Available);
    }

    #[test]
    fn worker_on_busy_lgore_fails() {
        let env = fake_env();
        let _held = env.occupy(0).unwrap();
        let stop = AtomicBool::new(true);
        let (tx, rx) = crossbeam_channel::unbounded();

        let res = thread::scope(|s| s.spawn(|| run_busy_worker(&env, 0, &stop, &tx)).join().unwrap());
        assert!(matches!(res, Err(LgoreError::AlreadyOccupied { id: 0, .. })));
        assert!(rx.try_recv().is_err());
    }
}
