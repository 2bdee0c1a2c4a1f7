//! Boot sequence: stage, protect, hand off.
//!
//! Nothing in here returns. Either the next stage is entered or the hart
//! is parked after logging why.

use log::{error, info};

use crate::error::{Error, Result};
use crate::image::DescriptorTable;
use crate::pmp::PmpTable;
use crate::stager::{BootImages, Stager};
use crate::traits::{Cpu, Decompressor, FlashRead, PhysMemory};

/// Everything needed for the jump.
///
/// Built from [`BootImages`], so a plan implies every image is in RAM and
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffPlan {
    /// Firmware entry point.
    pub entry: usize,
    /// Physical address of the device tree, passed in `a1`.
    pub dtb: usize,
    pub pmp: PmpTable,
}

impl HandoffPlan {
    pub fn new(images: &BootImages, pmp: PmpTable) -> Self {
        Self {
            entry: images.firmware.destination,
            dtb: images.device_tree.destination,
            pmp,
        }
    }
}

/// Finalize the core, install the PMP policy and enter the next stage.
pub fn handoff<C: Cpu>(cpu: &mut C, plan: HandoffPlan) -> ! {
    let hart_id = cpu.hart_id();
    info!(
        "entering {:#010x} (hart {}, dtb {:#010x}, {} pmp entries)",
        plan.entry,
        hart_id,
        plan.dtb,
        plan.pmp.len()
    );

    cpu.finalize_core_config();
    cpu.install_pmp(&plan.pmp);

    // SAFETY: the plan comes from staged images, so `entry` holds the
    // firmware that was just copied and published.
    unsafe { cpu.enter(plan.entry, hart_id, plan.dtb) }
}

/// Report `err` and park the hart.
pub fn halt<C: Cpu>(cpu: &mut C, err: Error) -> ! {
    error!("boot failed: {err}");
    cpu.idle()
}

/// Stage every image of `table`, build the PMP policy, hand off.
pub fn run<C, F, M, D>(
    cpu: &mut C,
    stager: &mut Stager<F, M, D>,
    table: &DescriptorTable,
    pmp: impl FnOnce() -> Result<PmpTable>,
) -> !
where
    C: Cpu,
    F: FlashRead,
    M: PhysMemory,
    D: Decompressor,
{
    let plan = stager
        .stage_all(table)
        .and_then(|images| Ok(HandoffPlan::new(&images, pmp()?)));

    match plan {
        Ok(plan) => handoff(cpu, plan),
        Err(err) => halt(cpu, err),
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use log::LevelFilter;

    use super::*;
    use crate::flash::XipWindow;
    use crate::image::{ImageDescriptor, ImageName};
    use crate::logger::ConsoleLogger;
    use crate::pmp::{PmpPermissions, PmpRegion};
    use crate::stager::OutputBound;
    use crate::testing::{BufferSerial, Event, MarkerDecompressor, MockCpu, RecordingCache, SimRam, Trace};

    static CONSOLE: ConsoleLogger<BufferSerial> = ConsoleLogger::new();

    const ORIGIN: u32 = 0x10_0000;
    const RAM: usize = 0x5000_0000;

    fn table() -> DescriptorTable {
        DescriptorTable {
            kernel: ImageDescriptor {
                name: ImageName::Kernel,
                flash_offset: ORIGIN + 0x10,
                ram_destination: RAM + 0x200,
                fixed_size: 0x100,
                required: true,
            },
            device_tree: ImageDescriptor {
                name: ImageName::DeviceTree,
                flash_offset: ORIGIN + 0x100,
                ram_destination: RAM + 0x100,
                fixed_size: 0x40,
                required: true,
            },
            firmware: ImageDescriptor {
                name: ImageName::Firmware,
                flash_offset: ORIGIN + 0x180,
                ram_destination: RAM,
                fixed_size: 0x40,
                required: true,
            },
            root_filesystem: None,
        }
    }

    fn pmp() -> Result<PmpTable> {
        PmpTable::builder(8)
            .region(PmpRegion::napot(RAM, 0x1000, PmpPermissions::RWX)?)?
            .finish()
    }

    /// Run the whole sequence over `flash` and return the recorded trace.
    fn boot(flash: &[u8]) -> Trace {
        let trace = Trace::default();
        let xip = unsafe {
            XipWindow::new(flash.as_ptr() as usize, ORIGIN, flash.len(), RecordingCache::new(&trace))
        };
        let mut stager = Stager::new(
            xip,
            SimRam::new(RAM, 0x400, &trace),
            MarkerDecompressor::new(0x5A, 0x20, &trace),
            OutputBound::RamEnd(RAM + 0x400),
        );
        let mut cpu = MockCpu::new(0, &trace);

        let unwound = catch_unwind(AssertUnwindSafe(|| {
            run(&mut cpu, &mut stager, &table(), pmp);
        }));
        assert!(unwound.is_err());
        trace
    }

    fn flash_with_kernel_header(header: [u8; 5]) -> Vec<u8> {
        let mut flash = vec![0xFF; 0x200];
        flash[0x0B..0x10].copy_from_slice(&header);
        flash
    }

    #[test]
    fn test_success_enters_firmware_last() {
        let trace = boot(&flash_with_kernel_header([0x00, 0x20, 0x00, 0x00, 0x00]));
        let events = trace.events();

        let publish = trace.position(|e| *e == Event::Publish).unwrap();
        let finalize = trace.position(|e| *e == Event::FinalizeCore).unwrap();
        let pmp = trace.position(|e| matches!(e, Event::InstallPmp { .. })).unwrap();
        let enter = trace.position(|e| matches!(e, Event::Enter { .. })).unwrap();

        assert!(publish < finalize);
        assert!(finalize < pmp);
        assert!(pmp < enter);
        assert_eq!(enter, events.len() - 1);
        assert_eq!(events[pmp], Event::InstallPmp { entries: 2 });
        assert_eq!(
            events[enter],
            Event::Enter {
                entry: RAM,
                hart_id: 0,
                dtb: RAM + 0x100
            }
        );
    }

    #[test]
    fn test_compressed_kernel_boots() {
        let trace = boot(&flash_with_kernel_header([0x01, 0x20, 0x00, 0x00, 0x00]));
        assert!(trace.events().contains(&Event::Decompress {
            src_len: 0x20,
            capacity: 0x200
        }));
        assert!(trace.position(|e| matches!(e, Event::Enter { .. })).is_some());
    }

    #[test]
    fn test_missing_kernel_halts() {
        let trace = boot(&flash_with_kernel_header([0x00, 0xFF, 0xFF, 0xFF, 0xFF]));
        let events = trace.events();

        assert_eq!(events.last(), Some(&Event::Idle));
        assert!(!events.contains(&Event::Publish));
        assert!(!events.contains(&Event::FinalizeCore));
        assert!(trace.position(|e| matches!(e, Event::InstallPmp { .. })).is_none());
        assert!(trace.position(|e| matches!(e, Event::Enter { .. })).is_none());
    }

    #[test]
    fn test_bad_pmp_layout_halts_before_jump() {
        let flash = flash_with_kernel_header([0x00, 0x20, 0x00, 0x00, 0x00]);
        let trace = Trace::default();
        let xip = unsafe {
            XipWindow::new(flash.as_ptr() as usize, ORIGIN, flash.len(), RecordingCache::new(&trace))
        };
        let mut stager = Stager::new(
            xip,
            SimRam::new(RAM, 0x400, &trace),
            MarkerDecompressor::new(0x5A, 0x20, &trace),
            OutputBound::Descriptor,
        );
        let mut cpu = MockCpu::new(0, &trace);

        let unwound = catch_unwind(AssertUnwindSafe(|| {
            run(&mut cpu, &mut stager, &table(), || {
                PmpTable::builder(8)
                    .region(PmpRegion::napot(RAM + 0x10, 0x1000, PmpPermissions::RWX)?)?
                    .finish()
            });
        }));

        assert!(unwound.is_err());
        assert_eq!(trace.events().last(), Some(&Event::Idle));
        assert!(trace.position(|e| matches!(e, Event::Enter { .. })).is_none());
    }

    #[test]
    fn test_halt_reports_pmp_errors_too() {
        CONSOLE.attach(BufferSerial::default());
        let _ = CONSOLE.install(LevelFilter::Trace);

        let trace = Trace::default();
        let mut cpu = MockCpu::new(0, &trace);
        let unwound = catch_unwind(AssertUnwindSafe(|| {
            halt(&mut cpu, Error::PmpTableFull);
        }));
        assert!(unwound.is_err());
        assert_eq!(trace.events(), [Event::Idle]);

        let out = CONSOLE.detach().unwrap().text();
        assert!(
            out.contains("[ERROR] bootcore::sequence: boot failed: PMP table is full\r\n"),
            "{out}"
        );
    }

    #[test]
    fn test_plan_takes_firmware_and_dtb_addresses() {
        let flash = flash_with_kernel_header([0x00, 0x08, 0x00, 0x00, 0x00]);
        let trace = Trace::default();
        let xip = unsafe {
            XipWindow::new(flash.as_ptr() as usize, ORIGIN, flash.len(), RecordingCache::new(&trace))
        };
        let mut stager = Stager::new(
            xip,
            SimRam::new(RAM, 0x400, &trace),
            MarkerDecompressor::new(0, 0, &trace),
            OutputBound::Descriptor,
        );

        let images = stager.stage_all(&table()).unwrap();
        let plan = HandoffPlan::new(&images, pmp().unwrap());
        assert_eq!(plan.entry, RAM);
        assert_eq!(plan.dtb, RAM + 0x100);
    }
}
