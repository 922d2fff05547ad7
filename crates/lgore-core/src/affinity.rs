//! The operating-system boundary: reading and setting CPU affinity masks.
//!
//! Everything else in this crate is pure bookkeeping; [`AffinityPort`] is the
//! one seam where the OS is touched. [`SystemAffinity`] is the real thing on
//! Linux, [`FakeAffinity`] keeps per-thread masks in memory so the state
//! machine can be exercised deterministically on any host.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use crate::core_set::CoreSet;
use crate::error::{LgoreError, Result};

/// Capability to query and change CPU affinity.
pub trait AffinityPort: Send + Sync {
    /// Cores the process is currently allowed to run on.
    fn process_affinity(&self) -> Result<CoreSet>;

    /// Restrict the *calling thread* to `cores`.
    fn set_thread_affinity(&self, cores: &CoreSet) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SystemAffinity: sched_{get,set}affinity
// ---------------------------------------------------------------------------

/// Affinity control through `sched_getaffinity`/`sched_setaffinity` (Linux).
///
/// On other platforms every call returns [`LgoreError::NotSupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAffinity;

impl SystemAffinity {
    /// Mask of the calling thread.
    pub fn current_thread_affinity(&self) -> Result<CoreSet> {
        sys::get_affinity()
    }
}

impl AffinityPort for SystemAffinity {
    fn process_affinity(&self) -> Result<CoreSet> {
        // pid 0 is the calling thread; at init time nothing has been narrowed yet
        sys::get_affinity()
    }

    fn set_thread_affinity(&self, cores: &CoreSet) -> Result<()> {
        sys::set_affinity(cores)
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::{io, mem};

    use crate::core_set::{CoreSet, MAX_CORES};
    use crate::error::{LgoreError, Result};

    pub(super) fn get_affinity() -> Result<CoreSet> {
        // SAFETY: cpu_set_t is plain data, all-zero is the empty set.
        let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };
        // SAFETY: the size passed matches the buffer.
        let r = unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut cpu_set) };
        if r != 0 {
            return Err(LgoreError::Affinity(io::Error::last_os_error()));
        }

        // SAFETY: every index is below CPU_SETSIZE.
        Ok((0..MAX_CORES).filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &cpu_set) }).collect())
    }

    pub(super) fn set_affinity(cores: &CoreSet) -> Result<()> {
        // SAFETY: cpu_set_t is plain data, all-zero is the empty set.
        let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };
        for cpu in cores.iter() {
            // SAFETY: CoreSet never holds ids >= CPU_SETSIZE.
            unsafe { libc::CPU_SET(cpu, &mut cpu_set) };
        }

        // SAFETY: the size passed matches the buffer.
        let r = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &cpu_set) };
        if r != 0 {
            return Err(LgoreError::Affinity(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use crate::core_set::CoreSet;
    use crate::error::{LgoreError, Result};

    pub(super) fn get_affinity() -> Result<CoreSet> {
        Err(LgoreError::NotSupported)
    }

    pub(super) fn set_affinity(_cores: &CoreSet) -> Result<()> {
        Err(LgoreError::NotSupported)
    }
}

// ---------------------------------------------------------------------------
// FakeAffinity: in-memory port
// ---------------------------------------------------------------------------

/// In-memory [`AffinityPort`] with per-thread masks.
///
/// Threads that never called `set_thread_affinity` report the process mask.
/// Failures can be injected to exercise error paths.
#[derive(Debug)]
pub struct FakeAffinity {
    process: CoreSet,
    threads: Mutex<HashMap<ThreadId, CoreSet>>,
    fail_query: AtomicBool,
    fail_set: AtomicBool,
}

impl FakeAffinity {
    pub fn new(process: CoreSet) -> Self {
        Self {
            process,
            threads: Mutex::new(HashMap::new()),
            fail_query: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
        }
    }

    /// Fake host whose process may run on cores `0..n`.
    pub fn with_cores(n: usize) -> Result<Self> {
        Ok(Self::new(CoreSet::first_n(n)?))
    }

    /// Make subsequent `process_affinity` calls fail.
    pub fn fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `set_thread_affinity` calls fail.
    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    /// Mask of the calling thread.
    pub fn current_thread_affinity(&self) -> CoreSet {
        self.thread_affinity(thread::current().id())
    }

    /// Mask of an arbitrary thread.
    pub fn thread_affinity(&self, thread: ThreadId) -> CoreSet {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads.get(&thread).copied().unwrap_or(self.process)
    }
}

impl AffinityPort for FakeAffinity {
    fn process_affinity(&self) -> Result<CoreSet> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(libc::EPERM).into());
        }
        Ok(self.process)
    }

    fn set_thread_affinity(&self, cores: &CoreSet) -> Result<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(libc::EPERM).into());
        }
        // kernel semantics: the mask must intersect the cores that exist
        if !cores.iter().any(|core| self.process.is_set(core)) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL).into());
        }
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads.insert(thread::current().id(), *cores);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_tracks_threads_separately() {
        let fake = FakeAffinity::with_cores(4).unwrap();
        let single = CoreSet::single(2).unwrap();
        fake.set_thread_affinity(&single).unwrap();
        assert_eq!(fake.current_thread_affinity(), single);

        let other = thread::scope(|s| s.spawn(|| fake.current_thread_affinity()).join().unwrap());
        assert_eq!(other, CoreSet::first_n(4).unwrap());
    }

    #[test]
    fn fake_injected_failures() {
        let fake = FakeAffinity::with_cores(2).unwrap();
        fake.fail_query(true);
        assert!(matches!(fake.process_affinity(), Err(LgoreError::Affinity(_))));
        fake.fail_query(false);
        assert!(fake.process_affinity().is_ok());

        fake.fail_set(true);
        assert!(fake.set_thread_affinity(&CoreSet::single(1).unwrap()).is_err());
        assert_eq!(fake.current_thread_affinity(), CoreSet::first_n(2).unwrap());
    }

    #[test]
    fn fake_rejects_disjoint_mask() {
        let fake = FakeAffinity::with_cores(2).unwrap();
        assert!(fake.set_thread_affinity(&CoreSet::single(5).unwrap()).is_err());
        assert!(fake.set_thread_affinity(&CoreSet::new()).is_err());
    }
}
