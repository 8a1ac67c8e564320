//! Backs the `critical-section` crate with the global exclusion domain.

use critical_section::RawRestoreState;

use crate::state::CpuSr;

struct GlobalDomain;
critical_section::set_impl!(GlobalDomain);

unsafe impl critical_section::Impl for GlobalDomain {
    unsafe fn acquire() -> RawRestoreState {
        // The hosted token is always `CpuSr::HOSTED`, so the unit restore
        // state loses nothing.
        let _ = crate::interrupts_disable();
    }

    unsafe fn release(_restore_state: RawRestoreState) {
        crate::interrupts_restore(CpuSr::HOSTED);
    }
}
