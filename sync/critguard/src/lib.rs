// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Architecture
//!
//! - [`interrupts_disable`] / [`interrupts_restore`]: the matched pair every
//!   protected region is bracketed with. On this hosted port "disabling
//!   interrupts" means entering one process-wide reentrant host mutex.
//! - [`ExclusionDomain`]: the reentrant lock behind the pair, also usable on
//!   its own.
//! - [`IrqSave`] and [`with`]: RAII helpers that restore on every exit path,
//!   unwinding included.
//! - [`CpuSr`]: the opaque saved-state token.
//!
//! The global domain is constructed on the first [`interrupts_disable`]
//! behind a one-time gate, so racing first callers still share a single
//! lock. [`init`] constructs it eagerly with a custom [`SpinConfig`].
//!
//! # Feature Flags
//!
//! - `checked`: keep misuse assertions in release builds
//! - `stats`: count acquisitions, nested entries and contention
//! - `critical-section-impl`: make `critical_section::with` use the global
//!   domain
//!
//! # Usage Patterns
//!
//! ```rust
//! let sr = critguard::interrupts_disable();
//! // ... touch shared state ...
//! critguard::interrupts_restore(sr);
//!
//! let answer = critguard::with(|| 6 * 7);
//! assert_eq!(answer, 42);
//! ```

use spin::Once;

#[cfg(feature = "critical-section-impl")]
mod cs_impl;
mod domain;
mod error;
mod guard;
mod mutex;
mod state;
#[cfg(test)]
mod tests;
mod util;

#[cfg(feature = "stats")]
pub use self::domain::DomainStats;
pub use self::{
    domain::{DomainGuard, ExclusionDomain},
    error::{PortError, Result},
    guard::{BaseGuard, IrqSave},
    mutex::{HostThreadId, RawMutex},
    state::CpuSr,
    util::SpinConfig,
};

/// The process-wide exclusion domain.
static DOMAIN: Once<ExclusionDomain> = Once::new();

fn domain() -> &'static ExclusionDomain {
    DOMAIN.call_once(|| {
        log::debug!("critical section domain initialized on first use");
        ExclusionDomain::new()
    })
}

/// Constructs the global domain ahead of its first use.
///
/// Returns [`PortError::AlreadyInitialized`] if the domain already exists,
/// in which case `config` is ignored.
pub fn init(config: SpinConfig) -> Result<()> {
    let mut created = false;
    DOMAIN.call_once(|| {
        created = true;
        log::debug!("critical section domain initialized with {config:?}");
        ExclusionDomain::with_config(config)
    });
    if created {
        Ok(())
    } else {
        Err(PortError::AlreadyInitialized)
    }
}

/// Returns whether the global domain has been constructed.
pub fn is_initialized() -> bool {
    DOMAIN.is_completed()
}

/// Enters the process-wide critical section.
///
/// Blocks while another thread is inside it. A thread already inside may
/// call this again without blocking and must then restore once per call.
/// The returned token must be handed, unchanged, to the matching
/// [`interrupts_restore`].
#[inline]
pub fn interrupts_disable() -> CpuSr {
    domain().disable()
}

/// Leaves one level of the process-wide critical section.
///
/// `prev` is the token returned by the matching [`interrupts_disable`].
///
/// # Panics
///
/// Panics in debug builds, or with the `checked` feature, if the calling
/// thread is not inside the critical section (including when it was never
/// entered by anyone). Release builds log the misuse and release nothing.
#[inline]
#[track_caller]
pub fn interrupts_restore(prev: CpuSr) {
    if let Err(err) = try_interrupts_restore(prev) {
        domain::report_misuse(err);
    }
}

/// Checked variant of [`interrupts_restore`] that reports misuse as an error.
pub fn try_interrupts_restore(prev: CpuSr) -> Result<()> {
    DOMAIN
        .get()
        .ok_or(PortError::NotInitialized)?
        .try_restore(prev)
}

/// Returns how many unmatched disables the calling thread has made.
pub fn nesting_depth() -> usize {
    DOMAIN.get().map_or(0, ExclusionDomain::nesting_depth)
}

/// Runs `f` inside the process-wide critical section.
///
/// The section is left when `f` returns or unwinds.
pub fn with<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = IrqSave::new();
    f()
}

/// Returns the counters of the global domain.
#[cfg(feature = "stats")]
pub fn stats() -> DomainStats {
    DOMAIN.get().map(ExclusionDomain::stats).unwrap_or_default()
}
