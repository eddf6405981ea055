//! Kernel logger
//!
//! `log` backend for the kernel. Records are formatted into a fixed stack
//! buffer (no allocation on the logging path) and handed to the registered
//! line writer, which is the console on real hardware and whatever the host
//! harness installs in tests.

use log::{Level, LevelFilter, Metadata, Record};
use spin::Mutex;

/// Maximum formatted line length; longer records are truncated.
pub const LINE_CAPACITY: usize = 512;

/// Destination of formatted log lines
pub type LineWriter = fn(&str);

/// Logger that forwards formatted lines to the registered writer
struct KernelLogger;

/// Installed line writer (None = records are dropped)
static WRITER: Mutex<Option<LineWriter>> = Mutex::new(None);

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let writer = match *WRITER.lock() {
            Some(writer) => writer,
            None => return,
        };

        // Format: [LEVEL] target: message
        let mut buf = [0u8; LINE_CAPACITY];
        let pos = {
            use core::fmt::Write;
            let mut out = BufferWriter { buffer: &mut buf, pos: 0 };
            let _ = core::write!(
                &mut out,
                "[{}] {}: {}",
                level_str(record.level()),
                record.target(),
                record.args()
            );
            out.pos
        };

        // Truncation may split a multi-byte character; drop the partial tail.
        let line = match core::str::from_utf8(&buf[..pos]) {
            Ok(line) => line,
            Err(e) => core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or(""),
        };
        writer(line);
    }

    fn flush(&self) {}
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Simple buffer writer for formatting without alloc
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> core::fmt::Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

/// Global logger instance
static LOGGER: KernelLogger = KernelLogger;

/// Register the line writer and install the logger at `Info`
pub fn init(writer: LineWriter) {
    init_with_level(writer, LevelFilter::Info);
}

/// Register the line writer and install the logger with a specific level
///
/// Installing twice keeps the first `log` registration but still swaps the
/// writer and the level.
pub fn init_with_level(writer: LineWriter, level: LevelFilter) {
    *WRITER.lock() = Some(writer);
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("logger already installed, writer replaced");
    }
    log::set_max_level(level);
}

/// Log at DEBUG level
#[inline]
pub fn debug(msg: &str) {
    log::debug!("{}", msg);
}

/// Log at INFO level
#[inline]
pub fn info(msg: &str) {
    log::info!("{}", msg);
}
