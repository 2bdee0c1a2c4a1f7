//! Host stand-ins for the hardware collaborators.
//!
//! Every stand-in appends to a shared [`Trace`] so tests can assert the
//! exact order of cache maintenance, copies, PMP installation and the jump.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::DecompressError;
use crate::pmp::PmpTable;
use crate::traits::{Cpu, DataCache, Decompressor, PhysMemory, Serial};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Invalidate { addr: usize, len: usize },
    CleanInvalidateAll,
    Decompress { src_len: usize, capacity: usize },
    Publish,
    FinalizeCore,
    InstallPmp { entries: usize },
    Enter { entry: usize, hart_id: usize, dtb: usize },
    Idle,
}

#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<Event>>>);

impl Trace {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(pred)
    }
}

pub struct RecordingCache {
    trace: Trace,
}

impl RecordingCache {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: trace.clone(),
        }
    }
}

impl DataCache for RecordingCache {
    fn invalidate_range(&mut self, addr: usize, len: usize) {
        self.trace.push(Event::Invalidate { addr, len });
    }

    fn clean_invalidate_all(&mut self) {
        self.trace.push(Event::CleanInvalidateAll);
    }
}

/// RAM region starting at a synthetic physical address.
pub struct SimRam {
    pub base: usize,
    pub bytes: Vec<u8>,
    trace: Trace,
}

impl SimRam {
    pub fn new(base: usize, len: usize, trace: &Trace) -> Self {
        Self {
            base,
            bytes: vec![0; len],
            trace: trace.clone(),
        }
    }

    pub fn at(&self, addr: usize, len: usize) -> &[u8] {
        let start = addr - self.base;
        &self.bytes[start..start + len]
    }
}

impl PhysMemory for SimRam {
    unsafe fn region_mut(&mut self, addr: usize, len: usize) -> &mut [u8] {
        let start = addr - self.base;
        &mut self.bytes[start..start + len]
    }

    fn publish(&mut self) {
        self.trace.push(Event::Publish);
    }
}

/// Decompressor that fills its output with a marker byte.
pub struct MarkerDecompressor {
    pub marker: u8,
    pub produce: usize,
    trace: Trace,
}

impl MarkerDecompressor {
    pub fn new(marker: u8, produce: usize, trace: &Trace) -> Self {
        Self {
            marker,
            produce,
            trace: trace.clone(),
        }
    }
}

impl Decompressor for MarkerDecompressor {
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
        self.trace.push(Event::Decompress {
            src_len: src.len(),
            capacity: dst.len(),
        });
        if self.produce > dst.len() {
            return Err(DecompressError::OutputOverflow);
        }
        dst[..self.produce].fill(self.marker);
        Ok(self.produce)
    }
}

/// CPU whose `enter` and `idle` unwind instead of diverging.
pub struct MockCpu {
    pub hart: usize,
    trace: Trace,
}

impl MockCpu {
    pub fn new(hart: usize, trace: &Trace) -> Self {
        Self {
            hart,
            trace: trace.clone(),
        }
    }
}

impl Cpu for MockCpu {
    fn hart_id(&self) -> usize {
        self.hart
    }

    fn finalize_core_config(&mut self) {
        self.trace.push(Event::FinalizeCore);
    }

    fn install_pmp(&mut self, table: &PmpTable) {
        self.trace.push(Event::InstallPmp {
            entries: table.len(),
        });
    }

    unsafe fn enter(&mut self, entry: usize, hart_id: usize, dtb: usize) -> ! {
        self.trace.push(Event::Enter {
            entry,
            hart_id,
            dtb,
        });
        panic!("entered next stage");
    }

    fn idle(&mut self) -> ! {
        self.trace.push(Event::Idle);
        panic!("halted");
    }
}

/// Serial port that keeps everything written to it.
#[derive(Default)]
pub struct BufferSerial {
    pub out: Vec<u8>,
}

impl BufferSerial {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl Serial for BufferSerial {
    fn write_byte(&mut self, byte: u8) {
        self.out.push(byte);
    }
}
