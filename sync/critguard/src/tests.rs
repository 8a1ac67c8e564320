//! Test suite for critguard

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::channel,
    },
    thread,
    time::Duration,
};

use super::*;

fn may_interrupt() {
    // simulate preemption inside the region
    if fastrand::u8(0..3) == 0 {
        thread::yield_now();
    }
}

/// Runs `f` on a fresh thread and returns its result.
fn on_other_thread<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    thread::scope(|s| s.spawn(f).join().unwrap())
}

#[test]
fn smoke() {
    let sr = interrupts_disable();
    interrupts_restore(sr);
    let sr = interrupts_disable();
    interrupts_restore(sr);
    assert!(is_initialized());
}

#[test]
fn hosted_token_is_placeholder() {
    let sr = interrupts_disable();
    assert_eq!(sr, CpuSr::HOSTED);
    assert_eq!(sr.into_raw(), 0);
    interrupts_restore(sr);

    let sr = CpuSr::from_raw(0x200);
    assert_eq!(sr.into_raw(), 0x200);
    assert_eq!(format!("{:?}", sr), "CpuSr(0x200)");
}

#[test]
fn global_nesting_tracks_depth() {
    assert_eq!(nesting_depth(), 0);
    let outer = interrupts_disable();
    let inner = interrupts_disable();
    assert_eq!(nesting_depth(), 2);
    interrupts_restore(inner);
    assert_eq!(nesting_depth(), 1);
    interrupts_restore(outer);
    assert_eq!(nesting_depth(), 0);
}

#[test]
fn guard_state_restored() {
    {
        let guard = IrqSave::new();
        assert_eq!(guard.state(), CpuSr::HOSTED);
        assert_eq!(nesting_depth(), 1);
        let _nested = IrqSave::default();
        assert_eq!(nesting_depth(), 2);
    }
    assert_eq!(nesting_depth(), 0);
}

#[test]
fn base_guard_pairs() {
    let state = <IrqSave as BaseGuard>::acquire();
    assert_eq!(nesting_depth(), 1);
    <IrqSave as BaseGuard>::release(state);
    assert_eq!(nesting_depth(), 0);
}

#[test]
fn with_returns_closure_value() {
    let value = with(|| {
        assert_eq!(nesting_depth(), 1);
        with(|| nesting_depth() * 21)
    });
    assert_eq!(value, 42);
    assert_eq!(nesting_depth(), 0);
}

#[test]
fn unwind_safety() {
    let result = thread::spawn(|| {
        with(|| {
            panic!("boom");
        })
    })
    .join();
    assert!(result.is_err());

    // The panicking thread must have left the section while unwinding.
    let entered = on_other_thread(|| {
        let sr = interrupts_disable();
        interrupts_restore(sr);
        true
    });
    assert!(entered);
}

#[test]
fn init_after_first_use_is_rejected() {
    let sr = interrupts_disable();
    interrupts_restore(sr);
    assert_eq!(init(SpinConfig::DEFAULT), Err(PortError::AlreadyInitialized));
}

#[test]
fn checked_restore_without_disable() {
    let sr = interrupts_disable();
    interrupts_restore(sr);
    assert_eq!(try_interrupts_restore(CpuSr::HOSTED), Err(PortError::NotHeld));
}

#[test]
#[cfg_attr(
    any(debug_assertions, feature = "checked"),
    should_panic(expected = "does not hold it")
)]
fn surplus_restore_asserts() {
    let sr = interrupts_disable();
    interrupts_restore(sr);
    interrupts_restore(sr);
}

#[test]
fn domain_blocks_other_thread() {
    let domain = ExclusionDomain::new();
    let entered = AtomicBool::new(false);

    let sr = domain.disable();
    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let sr = domain.disable();
            entered.store(true, Ordering::SeqCst);
            domain.restore(sr);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        domain.restore(sr);
        waiter.join().unwrap();
    });

    assert!(entered.load(Ordering::SeqCst));
    assert!(!domain.is_held());
}

#[test]
fn nested_domain_needs_every_restore() {
    let domain = ExclusionDomain::new();

    let outer = domain.disable();
    let inner = domain.disable();
    assert_eq!(domain.nesting_depth(), 2);
    assert!(on_other_thread(|| domain.try_disable().is_none()));

    domain.restore(inner);
    assert!(domain.is_held_by_current_thread());
    assert!(on_other_thread(|| domain.try_disable().is_none()));

    domain.restore(outer);
    assert!(!domain.is_held());
    assert!(on_other_thread(|| {
        let sr = domain.try_disable().unwrap();
        domain.restore(sr);
        true
    }));
}

#[test]
fn restore_from_non_holder_is_rejected() {
    let domain = ExclusionDomain::new();
    let sr = domain.disable();

    let err = on_other_thread(|| domain.try_restore(sr));
    assert_eq!(err, Err(PortError::NotHeld));
    assert!(domain.is_held_by_current_thread());
    assert_eq!(domain.nesting_depth(), 1);

    domain.restore(sr);
    assert_eq!(domain.try_restore(sr), Err(PortError::NotHeld));
}

#[test]
fn depth_is_private_to_holder() {
    let domain = ExclusionDomain::new();
    let sr = domain.disable();
    assert_eq!(on_other_thread(|| domain.nesting_depth()), 0);
    assert!(on_other_thread(|| domain.is_held()));
    domain.restore(sr);
}

#[test]
fn domain_guard_restores_on_drop() {
    let domain = ExclusionDomain::default();
    {
        let guard = domain.enter();
        assert_eq!(guard.state(), CpuSr::HOSTED);
        assert_eq!(domain.nesting_depth(), 1);
    }
    assert!(!domain.is_held());
}

#[test]
fn concurrent_increments_parking() {
    const INCREMENTS_PER_THREAD: u32 = 1000;
    const NUM_THREADS: u32 = 8;

    struct Shared {
        domain: ExclusionDomain,
        count: core::cell::UnsafeCell<u32>,
    }
    unsafe impl Sync for Shared {}

    let shared = Arc::new(Shared {
        domain: ExclusionDomain::with_config(SpinConfig::PARK_IMMEDIATELY),
        count: core::cell::UnsafeCell::new(0),
    });
    assert_eq!(shared.domain.config(), SpinConfig::PARK_IMMEDIATELY);

    let (tx, rx) = channel();
    let mut handles = Vec::new();
    for _ in 0..NUM_THREADS {
        let tx = tx.clone();
        let shared = shared.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..INCREMENTS_PER_THREAD {
                let sr = shared.domain.disable();
                unsafe {
                    let val = *shared.count.get();
                    may_interrupt();
                    *shared.count.get() = val + 1;
                }
                shared.domain.restore(sr);
            }
            tx.send(()).unwrap();
        }));
    }

    drop(tx);
    for _ in 0..NUM_THREADS {
        rx.recv().unwrap();
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        unsafe { *shared.count.get() },
        INCREMENTS_PER_THREAD * NUM_THREADS
    );
}

#[test]
fn only_one_holder_at_a_time() {
    let domain = ExclusionDomain::new();
    let inside = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| {
                for _ in 0..500 {
                    let _guard = domain.enter();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    may_interrupt();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });
}

#[test]
fn raw_mutex_backs_lock_api_mutex() {
    let m: lock_api::Mutex<RawMutex, u32> =
        lock_api::Mutex::const_new(RawMutex::with_config(SpinConfig::PARK_IMMEDIATELY), 0);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1000 {
                    *m.lock() += 1;
                }
            });
        }
    });

    assert_eq!(*m.lock(), 4000);
    let guard = m.lock();
    assert!(m.try_lock().is_none());
    drop(guard);
    assert!(m.try_lock().is_some());
}

#[test]
fn debug_output() {
    let domain = ExclusionDomain::new();
    let sr = domain.disable();
    let debug_str = format!("{:?}", domain);
    assert!(debug_str.contains("held: true"));
    assert!(debug_str.contains("depth: 1"));
    domain.restore(sr);
}

#[test]
fn error_messages() {
    assert_eq!(
        PortError::NotInitialized.to_string(),
        "critical section restored before it was ever entered"
    );
    assert_eq!(
        PortError::AlreadyInitialized.to_string(),
        "critical section domain is already initialized"
    );
}

#[test]
#[cfg(feature = "stats")]
fn stats_count_nesting_and_contention() {
    let domain = ExclusionDomain::new();
    let outer = domain.disable();
    let inner = domain.disable();
    domain.restore(inner);

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let sr = domain.disable();
            domain.restore(sr);
        });
        while domain.stats().contended == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        domain.restore(outer);
        waiter.join().unwrap();
    });

    let stats = domain.stats();
    assert_eq!(stats.acquisitions, 3);
    assert_eq!(stats.nested, 1);
    assert_eq!(stats.contended, 1);
}

#[test]
#[cfg(feature = "critical-section-impl")]
fn critical_section_crate_uses_global_domain() {
    critical_section::with(|_cs| {
        assert_eq!(nesting_depth(), 1);
        critical_section::with(|_cs| assert_eq!(nesting_depth(), 2));
    });
    assert_eq!(nesting_depth(), 0);
}
