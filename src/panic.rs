// src/panic.rs

//! Panic handling.
//!
//! Logs the panic, then halts. A nested panic (one triggered while already
//! handling a panic, e.g. from a broken `Display` impl) skips straight to
//! halting so it can't recurse forever.

#[cfg(not(test))]
use core::panic::PanicInfo;
#[cfg(not(test))]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(test))]
static PANICKING: AtomicBool = AtomicBool::new(false);

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if PANICKING.swap(true, Ordering::SeqCst) {
        crate::serial::write_str("[PANIC] nested panic, halting\n");
        crate::hlt_loop();
    }

    log::error!("kernel panic: {info}");
    crate::hlt_loop();
}
