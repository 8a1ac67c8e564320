//! Adaptive spinning used before a waiter parks on the host.

use std::thread::yield_now;

/// Spin configuration for the host mutex.
///
/// # Valid Ranges
///
/// - `max_spins`: Should be in the range 1..=100 for reasonable behavior
/// - `spin_before_yield`: Should be <= `max_spins` and typically <= 10 to avoid
///   excessive spin loop iterations (exponential backoff)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinConfig {
    /// Maximum number of spin iterations before parking the thread
    pub max_spins: u32,
    /// Number of busy-wait spins before falling back to `yield_now`
    pub spin_before_yield: u32,
}

impl SpinConfig {
    /// The configuration used by [`crate::ExclusionDomain::new`].
    pub const DEFAULT: Self = Self {
        max_spins: 10,
        spin_before_yield: 3,
    };

    /// Never spin; park as soon as the lock is found held.
    pub const PARK_IMMEDIATELY: Self = Self {
        max_spins: 0,
        spin_before_yield: 0,
    };
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Helper for adaptive spinning with configurable strategy.
pub(crate) struct Spin {
    count: u32,
    config: SpinConfig,
}

impl Spin {
    #[inline]
    pub(crate) fn new(config: SpinConfig) -> Self {
        Self { count: 0, config }
    }

    /// Perform one spin iteration.
    /// Returns `true` if more spins should be attempted, `false` if should park.
    ///
    /// Backs off exponentially for the first `spin_before_yield` iterations,
    /// then yields the time slice. The shift is clamped so an oversized
    /// `spin_before_yield` cannot overflow.
    #[inline]
    pub(crate) fn spin(&mut self) -> bool {
        if self.count >= self.config.max_spins {
            return false;
        }
        self.count += 1;
        if self.count <= self.config.spin_before_yield {
            for _ in 0..(1u32 << self.count.min(10)) {
                core::hint::spin_loop();
            }
        } else {
            yield_now();
        }
        true
    }
}
