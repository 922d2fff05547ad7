//! # lgore-core
//!
//! Exclusive assignment of CPU cores to threads. A few cores of the process's
//! allowed set are reserved (for the async runtime, I/O, ...) and the rest are
//! exposed as *lgores*: numbered units that one thread at a time can occupy,
//! which pins that thread to the lgore's core until it releases it.
//!
//! - **Core sets** (`core_set`): fixed 1024-bit set of core ids, ordinal lookup
//! - **Affinity** (`affinity`): OS boundary (`sched_{get,set}affinity`) + in-memory fake
//! - **Planning** (`planner`): allowed set minus reserved ordinals
//! - **Lgores** (`lgore`): per-core Available/Busy state machine
//! - **Environment** (`environment`): the pool, its lock and the occupy/release API
//! - **Process-wide API** (`global`): free functions over one shared environment
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): `LgoreError` via thiserror
//! - **Logging** (`logging`): tracing-based structured logging
//!
//! ```no_run
//! use lgore_core::{Environment, LgoreConfig};
//!
//! # fn main() -> lgore_core::Result<()> {
//! let env = Environment::init(&LgoreConfig::default())?;
//! std::thread::scope(|s| {
//!     for id in 0..env.lgore_count() {
//!         let env = &env;
//!         s.spawn(move || -> lgore_core::Result<()> {
//!             let occupancy = env.occupy(id)?;
//!             // runs on core `occupancy.core_id()` only
//!             occupancy.release()
//!         });
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod affinity;
pub mod config;
pub mod core_set;
pub mod environment;
pub mod error;
pub mod global;
pub mod lgore;
pub mod logging;
pub mod planner;

pub use affinity::{AffinityPort, FakeAffinity, SystemAffinity};
pub use config::LgoreConfig;
pub use core_set::{CoreSet, MAX_CORES};
pub use environment::{Environment, LgoreInfo, Occupancy};
pub use error::{LgoreError, Result};
pub use lgore::LgoreState;
