//! Per-core exclusivity state machine.
//!
//! ```text
//!            occupy (affinity := {core})
//!   Available ─────────────────────────► Busy
//!       ▲                                 │
//!       └─────────────────────────────────┘
//!            release (affinity := original)
//! ```
//!
//! Affinity is a property of an OS thread, so the thread that occupies a lgore
//! is recorded as its holder and is the only one allowed to release it. A Rust
//! thread never migrates between OS threads, which makes the holder record
//! enough to keep the "pinned to thread" half of the contract.

use std::thread::{self, ThreadId};

use serde::Serialize;
use tracing::{debug, warn};

use crate::affinity::AffinityPort;
use crate::core_set::CoreSet;
use crate::error::{LgoreError, Result};

/// Observable state of a lgore.
///
/// Nonexistent ids are reported as [`LgoreError::InvalidId`], never as a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LgoreState {
    /// Can be occupied.
    Available,
    /// Held by exactly one thread.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Holder {
    pub(crate) thread: ThreadId,
    /// Distinguishes successive occupations of the same lgore.
    pub(crate) ticket: u64,
}

/// One exclusively-occupiable core.
#[derive(Debug)]
pub(crate) struct Lgore {
    core_id: usize,
    holder: Option<Holder>,
}

impl Lgore {
    pub(crate) fn new(core_id: usize) -> Self {
        Self { core_id, holder: None }
    }

    pub(crate) fn core_id(&self) -> usize {
        self.core_id
    }

    pub(crate) fn holder(&self) -> Option<Holder> {
        self.holder
    }

    pub(crate) fn state(&self) -> LgoreState {
        match self.holder {
            Some(_) => LgoreState::Busy,
            None => LgoreState::Available,
        }
    }

    /// Bind the calling thread to this lgore's core and mark it busy.
    ///
    /// On failure nothing changes: the state stays `Available` and the
    /// thread keeps its previous mask.
    pub(crate) fn occupy(&mut self, id: usize, port: &dyn AffinityPort, ticket: u64) -> Result<()> {
        if self.holder.is_some() {
            return Err(LgoreError::AlreadyOccupied { id, core: self.core_id });
        }

        port.set_thread_affinity(&CoreSet::single(self.core_id)?)?;
        self.holder = Some(Holder { thread: thread::current().id(), ticket });
        debug!("lgore {id} occupied (core {})", self.core_id);
        Ok(())
    }

    /// Restore the calling thread's mask to `original` and mark the lgore available.
    ///
    /// A lgore that is already available is left alone and `Ok` is returned.
    /// The state flips to `Available` before the mask is restored, so a
    /// failed restoration is reported but never leaves the lgore busy.
    pub(crate) fn release(&mut self, id: usize, port: &dyn AffinityPort, original: &CoreSet) -> Result<()> {
        let Some(holder) = self.holder else {
            return Ok(());
        };
        if holder.thread != thread::current().id() {
            return Err(LgoreError::NotOwner { id });
        }

        self.holder = None;
        debug!("lgore {id} released (core {})", self.core_id);
        port.set_thread_affinity(original).inspect_err(|e| {
            warn!("lgore {id}: failed to restore thread affinity to {original}: {e}");
        })
    }
}
