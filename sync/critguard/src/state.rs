//! The saved-state token threaded from a disable to its restore.

use core::fmt;

/// Opaque CPU status snapshot returned by [`crate::interrupts_disable`].
///
/// Ports that mask interrupts in hardware store the pre-disable status
/// register here. The hosted port has no such state and always hands out
/// [`CpuSr::HOSTED`]. Either way callers must not inspect the value; they
/// only pass it back, unchanged, to the matching restore.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "the saved state must be passed to the matching restore"]
pub struct CpuSr(usize);

impl CpuSr {
    /// Placeholder produced by the hosted port.
    pub const HOSTED: Self = Self(0);

    /// Wraps a raw status word captured by a port.
    #[inline(always)]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw status word for a port to write back.
    #[inline(always)]
    pub const fn into_raw(self) -> usize {
        self.0
    }
}

impl Default for CpuSr {
    fn default() -> Self {
        Self::HOSTED
    }
}

impl fmt::Debug for CpuSr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSr({:#x})", self.0)
    }
}
