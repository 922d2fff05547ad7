//! Process-wide [`Environment`].
//!
//! Thin free-function layer for callers that want one pool per process and
//! id-based occupy/release. The first successful `init` creates the
//! environment; later calls rebuild it in place (see [`Environment::reinit`]).
//! The affinity port chosen by the first call is kept for the process lifetime.

use std::sync::{Arc, OnceLock};

use crate::affinity::{AffinityPort, SystemAffinity};
use crate::config::LgoreConfig;
use crate::environment::Environment;
use crate::error::{LgoreError, Result};
use crate::lgore::LgoreState;

static ENV: OnceLock<Environment> = OnceLock::new();

/// Initialize (or rebuild) the process-wide environment using the OS affinity.
pub fn init(config: &LgoreConfig) -> Result<()> {
    init_with_port(config, Arc::new(SystemAffinity))
}

/// Same as [`init`] with [`LgoreConfig::default`]: reserve the first allowed core.
pub fn init_default() -> Result<()> {
    init(&LgoreConfig::default())
}

/// Initialize with an explicit port. `port` is ignored once initialized.
pub fn init_with_port(config: &LgoreConfig, port: Arc<dyn AffinityPort>) -> Result<()> {
    if let Some(env) = ENV.get() {
        return env.reinit(config);
    }
    let env = Environment::with_port(config, port)?;
    if ENV.set(env).is_err() {
        // another thread initialized first; last writer wins
        return environment()?.reinit(config);
    }
    Ok(())
}

/// The process-wide environment, for the handle-based API.
pub fn environment() -> Result<&'static Environment> {
    ENV.get().ok_or(LgoreError::NotInitialized)
}

/// Number of lgores, `0` before initialization.
pub fn lgore_count() -> usize {
    ENV.get().map_or(0, Environment::lgore_count)
}

pub fn lgore_state(id: usize) -> Result<LgoreState> {
    environment()?.lgore_state(id)
}

/// Bind the calling thread to lgore `id`. Must be paired with [`release`] on
/// the same thread.
pub fn occupy(id: usize) -> Result<()> {
    environment()?.occupy(id).map(|occupancy| {
        occupancy.detach();
    })
}

/// Release lgore `id`; a no-op if it is already available.
pub fn release(id: usize) -> Result<()> {
    environment()?.release(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::FakeAffinity;

    // single test: the environment is shared by the whole test binary
    #[test]
    fn process_wide_lifecycle() {
        assert_eq!(lgore_count(), 0);
        assert!(matches!(lgore_state(0), Err(LgoreError::NotInitialized)));
        assert!(matches!(occupy(0), Err(LgoreError::NotInitialized)));

        let fake = Arc::new(FakeAffinity::with_cores(4).unwrap());
        init_with_port(&LgoreConfig::default(), fake.clone()).unwrap();
        assert_eq!(lgore_count(), 3);

        occupy(0).unwrap();
        assert_eq!(lgore_state(0).unwrap(), LgoreState::Busy);
        assert_eq!(fake.current_thread_affinity().to_string(), "1");
        assert!(matches!(occupy(0), Err(LgoreError::AlreadyOccupied { .. })));

        // rebuild refused while busy
        let two = LgoreConfig { occupy_all: false, reserve_cores: vec![0, 1] };
        assert!(matches!(init_with_port(&two, fake.clone()), Err(LgoreError::PoolBusy { .. })));

        release(0).unwrap();
        release(0).unwrap();
        assert_eq!(lgore_state(0).unwrap(), LgoreState::Available);
        assert_eq!(fake.current_thread_affinity().to_string(), "0-3");

        init_with_port(&two, fake).unwrap();
        assert_eq!(lgore_count(), 2);
        assert!(matches!(lgore_state(2), Err(LgoreError::InvalidId { id: 2, count: 2 })));
    }
}
