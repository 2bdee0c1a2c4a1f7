//! Formatting glue for the early console.

use crate::traits::Serial;

/// Wrapper to implement `core::fmt::Write` for any [`Serial`] impl.
///
/// Bare `\n` is expanded to `\r\n` for serial terminals.
pub struct SerialWriter<'a, S: Serial>(pub &'a mut S);

impl<S: Serial> core::fmt::Write for SerialWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for line in s.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) if !body.ends_with('\r') => {
                    self.0.write_str(body);
                    self.0.write_bytes(b"\r\n");
                }
                _ => self.0.write_str(line),
            }
        }
        Ok(())
    }
}

/// Byte count with a binary unit, for size summaries.
#[derive(Debug, Clone, Copy)]
pub struct Size(pub usize);

impl core::fmt::Display for Size {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        const KIB: usize = 1024;
        const MIB: usize = 1024 * KIB;
        match self.0 {
            n if n >= MIB && n % MIB == 0 => write!(f, "{} MiB", n / MIB),
            n if n >= KIB && n % KIB == 0 => write!(f, "{} KiB", n / KIB),
            n => write!(f, "{n} B"),
        }
    }
}
