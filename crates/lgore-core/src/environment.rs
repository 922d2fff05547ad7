//! The lgore pool and its public API.
//!
//! An [`Environment`] captures the process's allowed cores at init, sets the
//! reserved ones aside and exposes the rest as lgores `0..N` in ascending
//! core-id order. Every state transition (occupy, release, rebuild) runs under
//! one pool-wide mutex, so two threads can never hold the same core.
//!
//! # Architecture
//!
//! ```text
//! AffinityPort::process_affinity ──► original
//! planner::plan_available        ──► available = original - reserved
//! available.iter()               ──► lgores[i].core_id = i-th set bit
//! occupy / release               ──► Mutex<Pool> + AffinityPort::set_thread_affinity
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use serde::Serialize;
use tracing::{info, warn};

use crate::affinity::{AffinityPort, SystemAffinity};
use crate::config::LgoreConfig;
use crate::core_set::CoreSet;
use crate::error::{LgoreError, Result};
use crate::lgore::{Lgore, LgoreState};
use crate::planner::plan_available;

/// Point-in-time view of one lgore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LgoreInfo {
    pub id: usize,
    pub core_id: usize,
    pub state: LgoreState,
}

struct Pool {
    original: CoreSet,
    available: CoreSet,
    lgores: Vec<Lgore>,
}

impl Pool {
    fn build(port: &dyn AffinityPort, config: &LgoreConfig) -> Result<Self> {
        if config.reserve_cores.is_empty() {
            return Err(LgoreError::EmptyReservation);
        }
        if config.occupy_all {
            warn!("occupy_all is not supported yet, ignoring");
        }

        let original = port.process_affinity()?;
        let available = plan_available(&original, &config.reserve_cores)?;
        let lgores = available.iter().map(Lgore::new).collect();
        Ok(Self { original, available, lgores })
    }

    fn get_mut(&mut self, id: usize) -> Result<&mut Lgore> {
        let count = self.lgores.len();
        self.lgores.get_mut(id).ok_or(LgoreError::InvalidId { id, count })
    }

    fn get(&self, id: usize) -> Result<&Lgore> {
        self.lgores.get(id).ok_or(LgoreError::InvalidId { id, count: self.lgores.len() })
    }

    /// Lgore held by `thread`, if any.
    fn held_by(&self, thread: ThreadId) -> Option<usize> {
        self.lgores.iter().position(|lg| lg.holder().is_some_and(|h| h.thread == thread))
    }

    fn busy(&self) -> usize {
        self.lgores.iter().filter(|lg| lg.state() == LgoreState::Busy).count()
    }
}

/// Owner of all lgores and of the lock guarding them.
pub struct Environment {
    port: Arc<dyn AffinityPort>,
    pool: Mutex<Pool>,
    next_ticket: AtomicU64,
}

impl Environment {
    /// Initialize against the real OS affinity of the calling thread.
    pub fn init(config: &LgoreConfig) -> Result<Self> {
        Self::with_port(config, Arc::new(SystemAffinity))
    }

    /// Initialize with an explicit [`AffinityPort`].
    pub fn with_port(config: &LgoreConfig, port: Arc<dyn AffinityPort>) -> Result<Self> {
        let pool = Pool::build(port.as_ref(), config)?;
        info!(
            "lgore environment initialized — original={}, available={}, {} lgore(s)",
            pool.original,
            pool.available,
            pool.lgores.len(),
        );
        Ok(Self { port, pool: Mutex::new(pool), next_ticket: AtomicU64::new(1) })
    }

    /// Rebuild the pool from a new configuration.
    ///
    /// The allowed set is queried again. Refused with [`LgoreError::PoolBusy`]
    /// while any lgore is occupied; on any error the old pool stays in place.
    pub fn reinit(&self, config: &LgoreConfig) -> Result<()> {
        let mut pool = self.lock();
        let busy = pool.busy();
        if busy > 0 {
            return Err(LgoreError::PoolBusy { busy });
        }

        *pool = Pool::build(self.port.as_ref(), config)?;
        info!(
            "lgore environment rebuilt — original={}, available={}, {} lgore(s)",
            pool.original,
            pool.available,
            pool.lgores.len(),
        );
        Ok(())
    }

    /// Number of lgores (population count of the available set).
    pub fn lgore_count(&self) -> usize {
        self.lock().lgores.len()
    }

    pub fn lgore_state(&self, id: usize) -> Result<LgoreState> {
        Ok(self.lock().get(id)?.state())
    }

    /// Core id backing lgore `id`.
    pub fn core_id(&self, id: usize) -> Result<usize> {
        Ok(self.lock().get(id)?.core_id())
    }

    /// Cores the process was allowed to run on at init.
    pub fn original(&self) -> CoreSet {
        self.lock().original
    }

    /// Cores exposed as lgores.
    pub fn available(&self) -> CoreSet {
        self.lock().available
    }

    pub fn snapshot(&self) -> Vec<LgoreInfo> {
        self.lock()
            .lgores
            .iter()
            .enumerate()
            .map(|(id, lg)| LgoreInfo { id, core_id: lg.core_id(), state: lg.state() })
            .collect()
    }

    /// Bind the calling thread exclusively to lgore `id`'s core.
    ///
    /// Never waits: fails immediately with [`LgoreError::AlreadyOccupied`] if
    /// another holder has it. The returned [`Occupancy`] releases the lgore
    /// when dropped and, being `!Send`, cannot leave the occupying thread.
    ///
    /// A thread holds at most one lgore: if it already holds one, the call
    /// fails with [`LgoreError::ThreadAlreadyHolds`] and its mask is untouched.
    pub fn occupy(&self, id: usize) -> Result<Occupancy<'_>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut pool = self.lock();
        pool.get(id)?;
        if let Some(held) = pool.held_by(thread::current().id()) {
            if held == id {
                return Err(LgoreError::AlreadyOccupied { id, core: pool.get(id)?.core_id() });
            }
            return Err(LgoreError::ThreadAlreadyHolds { id: held });
        }
        let lg = pool.get_mut(id)?;
        lg.occupy(id, self.port.as_ref(), ticket)?;
        Ok(Occupancy {
            env: self,
            id,
            core_id: lg.core_id(),
            ticket,
            released: false,
            _not_send: PhantomData,
        })
    }

    /// Release lgore `id` held by the calling thread.
    ///
    /// Succeeds without effect if the lgore is available. Fails with
    /// [`LgoreError::NotOwner`] when another thread holds it. If restoring the
    /// original mask fails the error is returned, but the lgore is available
    /// regardless.
    pub fn release(&self, id: usize) -> Result<()> {
        let mut pool = self.lock();
        let original = pool.original;
        pool.get_mut(id)?.release(id, self.port.as_ref(), &original)
    }

    fn release_ticket(&self, id: usize, ticket: u64) -> Result<()> {
        let mut pool = self.lock();
        let original = pool.original;
        match pool.lgores.get_mut(id) {
            Some(lg) if lg.holder().is_some_and(|h| h.ticket == ticket) => {
                lg.release(id, self.port.as_ref(), &original)
            }
            // released by id in the meantime
            _ => Ok(()),
        }
    }

    // Transitions leave the pool consistent before returning, so a poisoned
    // lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive hold on one lgore, tied to the thread that occupied it.
///
/// Dropping the handle releases the lgore; use [`Occupancy::release`] to
/// observe the restoration result, or [`Occupancy::detach`] to keep the lgore
/// busy and release it later with [`Environment::release`].
#[must_use = "dropping an Occupancy releases the lgore immediately"]
pub struct Occupancy<'env> {
    env: &'env Environment,
    id: usize,
    core_id: usize,
    ticket: u64,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl Occupancy<'_> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.env.release_ticket(self.id, self.ticket)
    }

    /// Give up the handle without releasing; returns the lgore id.
    pub fn detach(mut self) -> usize {
        self.released = true;
        self.id
    }
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.env.release_ticket(self.id, self.ticket) {
            warn!("lgore {}: release on drop failed: {e}", self.id);
        }
    }
}

impl std::fmt::Debug for Occupancy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Occupancy").field("id", &self.id).field("core_id", &self.core_id).finish()
    }
}
