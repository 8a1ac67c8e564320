//! RAII guards for the process-wide critical section.

use core::marker::PhantomData;

use crate::state::CpuSr;

/// Base trait for all guard types.
///
/// A port enters its critical section in `acquire` and leaves it in
/// `release`, handing back exactly the state `acquire` produced.
pub trait BaseGuard {
    /// State saved when entering critical section.
    type State: Clone + Copy;

    /// Enter critical section, returning saved state.
    fn acquire() -> Self::State;

    /// Exit critical section, restoring state.
    fn release(state: Self::State);
}

/// Guard that holds the process-wide critical section until dropped.
///
/// Nested guards on one thread are allowed; the section is left when the
/// outermost one is dropped. The guard must be dropped on the thread that
/// created it, so it is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct IrqSave {
    state: CpuSr,
    _not_send: PhantomData<*const ()>,
}

impl BaseGuard for IrqSave {
    type State = CpuSr;

    #[inline]
    fn acquire() -> Self::State {
        crate::interrupts_disable()
    }

    #[inline]
    #[track_caller]
    fn release(state: Self::State) {
        crate::interrupts_restore(state)
    }
}

impl IrqSave {
    /// Create a new guard, entering the critical section.
    #[inline]
    pub fn new() -> Self {
        Self {
            state: <Self as BaseGuard>::acquire(),
            _not_send: PhantomData,
        }
    }

    /// Returns the state saved on entry.
    #[inline]
    pub fn state(&self) -> CpuSr {
        self.state
    }
}

impl Drop for IrqSave {
    #[inline]
    fn drop(&mut self) {
        <Self as BaseGuard>::release(self.state)
    }
}

impl Default for IrqSave {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
