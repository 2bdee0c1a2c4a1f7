//! The D0 boot hart.

use bootcore::{Cpu, Mcor, PmpTable};
use log::debug;

use crate::csr;

/// T-Head C906 running the loader in M-mode.
pub struct C906 {
    /// PMP entries implemented by this core.
    pmp_entries: usize,
}

impl C906 {
    pub const fn new(pmp_entries: usize) -> Self {
        Self { pmp_entries }
    }
}

impl Cpu for C906 {
    fn hart_id(&self) -> usize {
        crate::hart_id()
    }

    fn finalize_core_config(&mut self) {
        debug!("mhcr {:#x}, mcor <- {:#x}", csr::read_mhcr(), Mcor::FLUSH_ALL.bits());
        csr::write_mcor(Mcor::FLUSH_ALL.bits());
        crate::cache::sync_is();
    }

    fn install_pmp(&mut self, table: &PmpTable) {
        crate::pmp::install(table, self.pmp_entries);
    }

    unsafe fn enter(&mut self, entry: usize, hart_id: usize, dtb: usize) -> ! {
        crate::fence_i();
        unsafe { crate::handoff::jump(entry, hart_id, dtb) }
    }

    fn idle(&mut self) -> ! {
        loop {
            crate::wfi();
        }
    }
}
