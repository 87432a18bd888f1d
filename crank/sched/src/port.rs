//! Target glue
//!
//! The Cortex-M platform maps the scheduler's collaborator seam onto the
//! hardware: the switch request is the PendSV pending bit, idle is WFI,
//! and interrupt-context detection reads the active vector. Other
//! targets provide their own [`Platform`] impl; hosts use
//! `crank_core::SoftPlatform`.

#[cfg(target_arch = "arm")]
use crank_core::Platform;

/// Platform binding for Cortex-M targets
#[cfg(target_arch = "arm")]
pub struct CortexPlatform;

#[cfg(target_arch = "arm")]
impl Platform for CortexPlatform {
    fn pend_switch(&self) {
        cortex_m::peripheral::SCB::set_pendsv();
    }

    fn idle_wait(&self) {
        cortex_m::asm::wfi();
    }

    fn in_interrupt(&self) -> bool {
        !matches!(
            cortex_m::peripheral::SCB::vect_active(),
            cortex_m::peripheral::scb::VectActive::ThreadMode
        )
    }
}
