//! `log` backend for the early console.
//!
//! Records are written as `[LEVEL] target: message` followed by `\r\n`.
//! The serial port sits behind a spin lock; the loader is single-hart so
//! the lock is never contended, it only makes the logger `Sync`.

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

use crate::fmt::SerialWriter;
use crate::traits::Serial;

pub struct ConsoleLogger<S> {
    serial: Mutex<Option<S>>,
}

impl<S: Serial + Send> ConsoleLogger<S> {
    /// Logger with no port attached yet. Records are dropped until
    /// [`attach`](Self::attach) is called.
    pub const fn new() -> Self {
        Self {
            serial: Mutex::new(None),
        }
    }

    /// Hand the console port to the logger.
    pub fn attach(&self, serial: S) {
        *self.serial.lock() = Some(serial);
    }

    /// Take the port back. Later records are dropped.
    pub fn detach(&self) -> Option<S> {
        self.serial.lock().take()
    }

    /// Install `self` as the global logger.
    pub fn install(&'static self, level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl<S: Serial + Send> Default for ConsoleLogger<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Serial + Send> Log for ConsoleLogger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(serial) = self.serial.lock().as_mut() {
            let _ = writeln!(
                SerialWriter(serial),
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
