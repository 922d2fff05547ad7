//! Derivation of the available core set from the allowed set and a reservation list.
//!
//! Reservations are *ordinals into the allowed set*, not raw core ids: with an
//! allowed set of `{2, 5, 6}`, ordinal `0` reserves core 2. This keeps a
//! reservation list meaningful when a supervisor has already narrowed the
//! process to a subset of the machine (cgroups, `taskset`, ...).

use tracing::debug;

use crate::core_set::CoreSet;
use crate::error::{LgoreError, Result};

/// Compute `original` minus the cores named by `reserve` ordinals.
///
/// Duplicate ordinals are harmless: clearing an already-cleared core is a no-op.
///
/// # Errors
///
/// - [`LgoreError::EmptyReservation`] if `reserve` is empty
/// - [`LgoreError::NotEnoughCores`] if `original` has fewer than two cores
/// - [`LgoreError::InvalidReservation`] if an ordinal is `>= original.count()`
/// - [`LgoreError::NoneAvailable`] if nothing is left after reservation
pub fn plan_available(original: &CoreSet, reserve: &[usize]) -> Result<CoreSet> {
    if reserve.is_empty() {
        return Err(LgoreError::EmptyReservation);
    }

    let count = original.count();
    if count <= 1 {
        return Err(LgoreError::NotEnoughCores { count });
    }

    let mut available = *original;
    for &ordinal in reserve {
        let core = original
            .nth_set_bit(ordinal)
            .ok_or(LgoreError::InvalidReservation { ordinal, count })?;
        debug!("reserving ordinal {ordinal} -> core {core}");
        available.clear(core);
    }

    if available.is_empty() {
        return Err(LgoreError::NoneAvailable);
    }
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cores(ids: &[usize]) -> CoreSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn reserve_first_of_four() {
        let available = plan_available(&cores(&[0, 1, 2, 3]), &[0]).unwrap();
        assert_eq!(available, cores(&[1, 2, 3]));
    }

    #[test]
    fn ordinals_index_the_allowed_set() {
        // restricted process: ordinal 1 is core 5, not core 1
        let available = plan_available(&cores(&[2, 5, 6, 9]), &[1, 3]).unwrap();
        assert_eq!(available, cores(&[2, 6]));
    }

    #[test]
    fn duplicate_ordinals_are_idempotent() {
        let available = plan_available(&cores(&[0, 1, 2, 3]), &[1, 1, 1]).unwrap();
        assert_eq!(available.count(), 3);
        assert!(!available.is_set(1));
    }

    #[test]
    fn empty_reservation() {
        assert!(matches!(plan_available(&cores(&[0, 1]), &[]), Err(LgoreError::EmptyReservation)));
        // checked before the core count
        assert!(matches!(plan_available(&CoreSet::new(), &[]), Err(LgoreError::EmptyReservation)));
    }

    #[test]
    fn not_enough_cores() {
        assert!(matches!(
            plan_available(&cores(&[3]), &[0]),
            Err(LgoreError::NotEnoughCores { count: 1 })
        ));
    }

    #[test]
    fn ordinal_out_of_range() {
        assert!(matches!(
            plan_available(&cores(&[0, 1, 2, 3]), &[0, 5]),
            Err(LgoreError::InvalidReservation { ordinal: 5, count: 4 })
        ));
    }

    #[test]
    fn everything_reserved() {
        assert!(matches!(
            plan_available(&cores(&[0, 1]), &[0, 1]),
            Err(LgoreError::NoneAvailable)
        ));
    }
}
