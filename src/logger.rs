// src/logger.rs

//! `log::Log` implementation that forwards records to the serial console.
//!
//! The original kernel writes ad-hoc `"[MODULE] ..."` lines straight to
//! the UART; this keeps that wire format but routes it through the `log`
//! facade so callers use `log::info!`/`log::warn!` instead of hand-rolled
//! `serial_puts` calls.

use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record};

use crate::serial;

static LOGGER: SerialLogger = SerialLogger;
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        serial::write_str_args(record.level(), record.target(), *record.args());
    }

    fn flush(&self) {}
}

/// Install the serial-backed logger as the global `log` sink.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init(level: LevelFilter) {
    if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    // SAFETY: `LOGGER` is a `'static` zero-sized value and `set_logger` is
    // only called once, guarded by `LOGGER_INITIALIZED`.
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .expect("logger must only be installed once");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(LevelFilter::Info);
        init(LevelFilter::Debug);
    }
}
