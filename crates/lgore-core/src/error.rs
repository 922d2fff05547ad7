//! Typed error definitions for lgore management.
//!
//! [`LgoreError`] covers both tiers of failure: configuration/initialization
//! errors, after which the [`Environment`](crate::Environment) must not be
//! used, and runtime errors from individual occupy/release calls, which are
//! left to the caller to handle or retry.

use std::io;

use thiserror::Error;

/// Result alias used throughout `lgore-core`.
pub type Result<T, E = LgoreError> = std::result::Result<T, E>;

/// Errors produced by core set handling, planning and lgore transitions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LgoreError {
    /// The reservation list was empty.
    #[error("must reserve at least one core")]
    EmptyReservation,

    /// The process is allowed to run on fewer than two cores.
    #[error("not enough logical cores: have {count}, need more than one")]
    NotEnoughCores { count: usize },

    /// A reservation ordinal does not name a core of the allowed set.
    #[error("invalid reservation ordinal {ordinal} (allowed set has {count} cores)")]
    InvalidReservation { ordinal: usize, count: usize },

    /// Every allowed core was reserved.
    #[error("no lgores left after reservation")]
    NoneAvailable,

    /// A core id outside the supported range was used.
    #[error("core {core} is out of range (max core is {max})", max = crate::core_set::MAX_CORES - 1)]
    CoreOutOfRange { core: usize },

    /// The lgore id does not name a lgore of the pool.
    #[error("invalid lgore id {id} (pool has {count} lgores)")]
    InvalidId { id: usize, count: usize },

    /// The lgore is already held by some execution context.
    #[error("lgore {id} (core {core}) is already occupied")]
    AlreadyOccupied { id: usize, core: usize },

    /// The calling thread already holds another lgore; a thread is pinned to one core at a time.
    #[error("calling thread already holds lgore {id}")]
    ThreadAlreadyHolds { id: usize },

    /// Release was attempted from a thread that does not hold the lgore.
    #[error("lgore {id} is held by another thread")]
    NotOwner { id: usize },

    /// Reinitialization was attempted while lgores were still held.
    #[error("cannot rebuild pool while {busy} lgore(s) are occupied")]
    PoolBusy { busy: usize },

    /// The process-wide environment was used before initialization.
    #[error("environment is not initialized")]
    NotInitialized,

    /// Underlying affinity query or update failed.
    #[error("affinity error: {0}")]
    Affinity(#[from] io::Error),

    /// Affinity control is unavailable on this platform.
    #[error("CPU affinity operations are not supported on this platform")]
    NotSupported,

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),
}

impl LgoreError {
    /// Whether this error belongs to the configuration/initialization tier.
    ///
    /// These are not recoverable without a new configuration. Everything else
    /// is a runtime error the caller may decide to retry. [`LgoreError::Affinity`]
    /// belongs to whichever call returned it: fatal from `init`, recoverable
    /// from `occupy`/`release`.
    pub fn is_init_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyReservation
                | Self::NotEnoughCores { .. }
                | Self::InvalidReservation { .. }
                | Self::NoneAvailable
                | Self::NotInitialized
                | Self::NotSupported
                | Self::Config(_)
        )
    }
}
