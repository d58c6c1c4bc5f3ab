// src/kernel/shell.rs

//! Serial command shell.
//!
//! Reads a line at a time from the console and dispatches to the other
//! kernel subsystems. Uses a fixed-size line buffer - no heap, no `alloc`
//! - matching the rest of the kernel's no-allocation data model.

use crate::kernel::{memory, process, scheduler};
use crate::serial;

const MAX_INPUT: usize = 128;

/// Read one line from the console into `buf`, honoring backspace, and
/// return the slice actually filled. Blocks on [`serial::get_byte`]; if the
/// serial port is unavailable (e.g. running headless) this returns
/// immediately with an empty line to avoid spinning forever.
fn read_line(buf: &mut [u8; MAX_INPUT]) -> &str {
    let mut pos = 0usize;

    loop {
        let Some(c) = serial::get_byte() else {
            break;
        };

        match c {
            b'\r' | b'\n' => {
                serial::write_str("\n");
                break;
            }
            0x08 | 0x7F if pos > 0 => {
                pos -= 1;
                serial::write_str("\u{8} \u{8}");
            }
            32..=126 if pos < MAX_INPUT - 1 => {
                buf[pos] = c;
                pos += 1;
                // echo
                let echoed = [c];
                if let Ok(s) = core::str::from_utf8(&echoed) {
                    serial::write_str(s);
                }
            }
            _ => {}
        }
    }

    core::str::from_utf8(&buf[..pos]).unwrap_or("")
}

fn run_ticks(count: u32) {
    for tick in 0..count {
        scheduler::update_time();
        scheduler::schedule();
        log::info!("[tick {tick}] current PID: {}", scheduler::current_pid());
    }
}

fn dispatch(command: &str) {
    match command {
        "ps" => process::print_table(),
        "mem" => memory::print_status(),
        "sched" => {
            scheduler::print_status();
            log::info!("running 5 scheduler ticks...");
            run_ticks(5);
        }
        "create" => {
            let pid = process::create(2, 4096, 8192);
            log::info!("created new process with PID: {pid}");
            process::print_table();
        }
        "help" => {
            log::info!("=== kacchiOS Commands ===");
            log::info!("ps      - show process table");
            log::info!("mem     - show memory status");
            log::info!("sched   - show scheduler status & run ticks");
            log::info!("create  - create a new process");
            log::info!("help    - show this help message");
        }
        other => {
            log::warn!("unknown command: {other}");
            log::info!("type 'help' for available commands.");
        }
    }
}

/// Run the interactive command loop forever. Never returns in practice;
/// only stops if the serial port goes away, for the same reason
/// `read_line` bails out on an unavailable port.
#[cfg(not(test))]
pub fn run() -> ! {
    let mut buf = [0u8; MAX_INPUT];
    loop {
        serial::write_str("kacchiOS> ");
        let line = read_line(&mut buf);
        if !line.is_empty() {
            dispatch(line);
        }
        if !serial::is_available() {
            crate::hlt_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_known_commands_does_not_panic() {
        memory::init();
        process::init();
        scheduler::init(scheduler::SchedulingAlgorithm::RoundRobin, 5);
        for cmd in ["ps", "mem", "sched", "create", "help", "bogus"] {
            dispatch(cmd);
        }
    }
}
