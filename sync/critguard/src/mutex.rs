//! The host mutual-exclusion primitive behind an exclusion domain.

use core::{
    num::NonZeroUsize,
    sync::atomic::{AtomicBool, Ordering},
};

use event_listener::{Event, Listener};

use crate::util::{Spin, SpinConfig};

/// A [`lock_api::RawMutex`] implementation for hosted targets.
///
/// Contended callers spin briefly according to their [`SpinConfig`] and then
/// park the OS thread on an [`Event`]. Unlocking wakes one parked thread.
pub struct RawMutex {
    locked: AtomicBool,
    event: Event,
    config: SpinConfig,
}

impl RawMutex {
    /// Creates a [`RawMutex`] with default spin configuration.
    #[inline(always)]
    pub const fn new() -> Self {
        Self::with_config(SpinConfig::DEFAULT)
    }

    /// Creates a [`RawMutex`] with custom spin configuration.
    #[inline(always)]
    pub const fn with_config(config: SpinConfig) -> Self {
        Self {
            locked: AtomicBool::new(false),
            event: Event::new(),
            config,
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawMutex {
    type GuardMarker = lock_api::GuardNoSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawMutex::new();

    fn lock(&self) {
        let mut spin = Spin::new(self.config);
        loop {
            if self.try_lock() {
                return;
            }
            if spin.spin() {
                continue;
            }

            // Register before the re-check so an unlock in between is not missed.
            let listener = self.event.listen();
            if self.try_lock() {
                return;
            }
            log::trace!("host mutex contended, parking {:?}", std::thread::current().id());
            listener.wait();
        }
    }

    #[inline(always)]
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        self.event.notify(1);
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// A [`lock_api::GetThreadId`] backed by the address of a thread-local.
///
/// The address is unique among live threads, which is all the reentrant
/// lock needs to recognize its owner.
pub struct HostThreadId;

unsafe impl lock_api::GetThreadId for HostThreadId {
    const INIT: Self = HostThreadId;

    fn nonzero_thread_id(&self) -> NonZeroUsize {
        thread_local!(static KEY: u8 = const { 0 });
        KEY.with(|key| {
            // SAFETY: the address of a live thread-local is never null.
            unsafe { NonZeroUsize::new_unchecked(key as *const u8 as usize) }
        })
    }
}
