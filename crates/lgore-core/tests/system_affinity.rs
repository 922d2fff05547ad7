//! Integration tests against the real OS affinity port.
//!
//! Linux only. Hosts with a single allowed core, or where changing affinity
//! is not permitted (some containers), skip instead of failing.

#![cfg(target_os = "linux")]

use lgore_core::*;

fn permission_denied(e: &LgoreError) -> bool {
    matches!(e, LgoreError::Affinity(err) if err.raw_os_error() == Some(libc::EPERM))
}

/// Runs `f` on a fresh thread so affinity changes never leak into the harness.
fn on_fresh_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    std::thread::scope(|s| s.spawn(f).join().unwrap())
}

#[test]
fn process_affinity_is_not_empty() {
    let cores = SystemAffinity.process_affinity().expect("sched_getaffinity failed");
    assert!(cores.count() >= 1);
    assert_eq!(cores.nth_set_bit(0), cores.iter().next());
}

#[test]
fn occupy_pins_and_release_restores() {
    on_fresh_thread(|| {
        let env = match Environment::init(&LgoreConfig::default()) {
            Ok(env) => env,
            Err(LgoreError::NotEnoughCores { .. }) => {
                eprintln!("Skipping: single-core host");
                return;
            }
            Err(e) => panic!("Unexpected init error: {e:?}"),
        };
        let original = env.original();
        assert_eq!(env.lgore_count(), original.count() - 1);
        // ordinal 0 is reserved, so lgore 0 is the second allowed core
        assert_eq!(env.core_id(0).unwrap(), original.nth_set_bit(1).unwrap());

        let occupancy = match env.occupy(0) {
            Ok(o) => o,
            Err(ref e) if permission_denied(e) => {
                eprintln!("Skipping: insufficient permissions");
                return;
            }
            Err(e) => panic!("Unexpected occupy error: {e:?}"),
        };
        let pinned = SystemAffinity.current_thread_affinity().unwrap();
        assert_eq!(pinned, CoreSet::single(occupancy.core_id()).unwrap());
        assert_eq!(env.lgore_state(0).unwrap(), LgoreState::Busy);

        occupancy.release().expect("release failed");
        assert_eq!(env.lgore_state(0).unwrap(), LgoreState::Available);
        assert_eq!(SystemAffinity.current_thread_affinity().unwrap(), original);
    });
}

#[test]
fn reserving_everything_fails() {
    let original = SystemAffinity.process_affinity().unwrap();
    let config = LgoreConfig { occupy_all: false, reserve_cores: (0..original.count()).collect() };
    let err = Environment::init(&config).err().unwrap();
    assert!(matches!(err, LgoreError::NoneAvailable | LgoreError::NotEnoughCores { .. }));
    assert!(err.is_init_error());
}
