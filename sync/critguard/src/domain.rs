//! Reentrant exclusion domain.
//!
//! An [`ExclusionDomain`] is the object a critical section actually locks.
//! The crate-level entry points share a single static domain; separate
//! instances exist for embedding and testing.

#[cfg(feature = "stats")]
use core::sync::atomic::AtomicU64;
use core::{
    fmt,
    marker::PhantomData,
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};

use lock_api::ReentrantMutex;

use crate::{
    error::{PortError, Result},
    mutex::{HostThreadId, RawMutex},
    state::CpuSr,
    util::SpinConfig,
};

/// Counter snapshot for a domain (available with `stats` feature).
#[cfg(feature = "stats")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DomainStats {
    /// Successful disables, nested ones included.
    pub acquisitions: u64,
    /// Disables performed by a thread that already held the domain.
    pub nested: u64,
    /// Disables that found the domain held by another thread.
    pub contended: u64,
}

#[cfg(feature = "stats")]
struct Counters {
    acquisitions: AtomicU64,
    nested: AtomicU64,
    contended: AtomicU64,
}

/// A reentrant mutual-exclusion domain driven by disable/restore pairs.
///
/// `disable` blocks while another thread holds the domain and nests freely
/// on the holding thread. Each `disable` must be matched by exactly one
/// `restore` on the same thread, innermost first.
pub struct ExclusionDomain {
    lock: ReentrantMutex<RawMutex, HostThreadId, ()>,
    config: SpinConfig,
    // Written only by the holding thread.
    depth: AtomicUsize,
    #[cfg(feature = "stats")]
    counters: Counters,
}

impl ExclusionDomain {
    /// Creates an unheld domain with the default [`SpinConfig`].
    pub const fn new() -> Self {
        Self::with_config(SpinConfig::DEFAULT)
    }

    /// Creates an unheld domain whose host mutex spins per `config`.
    pub const fn with_config(config: SpinConfig) -> Self {
        Self {
            lock: ReentrantMutex::const_new(RawMutex::with_config(config), HostThreadId, ()),
            config,
            depth: AtomicUsize::new(0),
            #[cfg(feature = "stats")]
            counters: Counters {
                acquisitions: AtomicU64::new(0),
                nested: AtomicU64::new(0),
                contended: AtomicU64::new(0),
            },
        }
    }

    /// Enters the domain, blocking until no other thread holds it.
    pub fn disable(&self) -> CpuSr {
        let guard = match self.lock.try_lock() {
            Some(guard) => guard,
            None => {
                #[cfg(feature = "stats")]
                self.counters.contended.fetch_add(1, Ordering::Relaxed);
                self.lock.lock()
            }
        };
        // Released again by `try_restore`.
        mem::forget(guard);
        self.entered()
    }

    /// Enters the domain only if that does not require waiting.
    pub fn try_disable(&self) -> Option<CpuSr> {
        let guard = self.lock.try_lock()?;
        mem::forget(guard);
        Some(self.entered())
    }

    fn entered(&self) -> CpuSr {
        let _prev = self.depth.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "stats")]
        {
            self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
            if _prev > 0 {
                self.counters.nested.fetch_add(1, Ordering::Relaxed);
            }
        }
        CpuSr::HOSTED
    }

    /// Leaves one level of the domain.
    ///
    /// # Panics
    ///
    /// Panics in debug builds, or with the `checked` feature, when the calling
    /// thread does not hold the domain. Otherwise the misuse is logged and
    /// nothing is released.
    #[track_caller]
    pub fn restore(&self, prev: CpuSr) {
        if let Err(err) = self.try_restore(prev) {
            report_misuse(err);
        }
    }

    /// Leaves one level of the domain, reporting misuse as an error.
    pub fn try_restore(&self, prev: CpuSr) -> Result<()> {
        // Nothing to write back on a hosted target.
        let _ = prev;
        if !self.lock.is_owned_by_current_thread() {
            return Err(PortError::NotHeld);
        }
        self.depth.fetch_sub(1, Ordering::Relaxed);
        // SAFETY: the calling thread owns the lock through a guard forgotten
        // in `disable` or `try_disable`.
        unsafe { self.lock.force_unlock() };
        Ok(())
    }

    /// Enters the domain and returns a guard that restores it on drop.
    pub fn enter(&self) -> DomainGuard<'_> {
        DomainGuard {
            domain: self,
            state: self.disable(),
            _not_send: PhantomData,
        }
    }

    /// Returns `true` if any thread holds the domain.
    ///
    /// The answer may be stale immediately; do not use it for synchronization.
    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }

    /// Returns `true` if the calling thread holds the domain.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock.is_owned_by_current_thread()
    }

    /// Returns how many unmatched disables the calling thread has made.
    pub fn nesting_depth(&self) -> usize {
        if self.is_held_by_current_thread() {
            self.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Returns the configuration of the underlying host mutex.
    pub fn config(&self) -> SpinConfig {
        self.config
    }

    /// Returns a snapshot of the acquisition counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> DomainStats {
        DomainStats {
            acquisitions: self.counters.acquisitions.load(Ordering::Relaxed),
            nested: self.counters.nested.load(Ordering::Relaxed),
            contended: self.counters.contended.load(Ordering::Relaxed),
        }
    }
}

impl Default for ExclusionDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExclusionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionDomain")
            .field("held", &self.is_held())
            .field("depth", &self.depth.load(Ordering::Relaxed))
            .finish()
    }
}

/// RAII guard for [`ExclusionDomain::enter`].
pub struct DomainGuard<'a> {
    domain: &'a ExclusionDomain,
    state: CpuSr,
    _not_send: PhantomData<*const ()>,
}

impl DomainGuard<'_> {
    /// Returns the state that will be handed back on drop.
    pub fn state(&self) -> CpuSr {
        self.state
    }
}

impl Drop for DomainGuard<'_> {
    fn drop(&mut self) {
        self.domain.restore(self.state);
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(debug_assertions, feature = "checked"))] {
        #[track_caller]
        pub(crate) fn report_misuse(err: PortError) {
            log::error!("critical section misuse: {err}");
            panic!("critical section misuse: {err}");
        }
    } else {
        pub(crate) fn report_misuse(err: PortError) {
            log::error!("critical section misuse: {err}; release skipped");
        }
    }
}
