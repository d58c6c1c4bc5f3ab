// src/main.rs

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

#[cfg(not(test))]
use bootloader::{entry_point, BootInfo};
#[cfg(not(test))]
use kacchi_os::constants::{BOOT_DEMO_TICKS, DEMO_HEAP_SIZE, DEMO_PROCESS_COUNT, DEMO_STACK_SIZE, DEFAULT_TIME_QUANTUM};
#[cfg(not(test))]
use kacchi_os::kernel::{memory, process, scheduler, shell};
#[cfg(not(test))]
use kacchi_os::{logger, serial};

#[cfg(not(test))]
entry_point!(kernel_main);

#[cfg(not(test))]
fn kernel_main(_boot_info: &'static BootInfo) -> ! {
    serial::init().ok();
    logger::init(log::LevelFilter::Info);

    memory::init();
    process::init();
    scheduler::init(scheduler::SchedulingAlgorithm::RoundRobin, DEFAULT_TIME_QUANTUM);

    log::info!("========================================");
    log::info!("    kacchiOS - Minimal Baremetal OS");
    log::info!("========================================");
    log::info!("Hello from kacchiOS!");
    log::info!("Running null process...");

    let mut pids = [0u32; DEMO_PROCESS_COUNT as usize];
    for (i, pid) in pids.iter_mut().enumerate() {
        let priority = (i as u32 % 4) + 1;
        *pid = process::create(priority, DEMO_STACK_SIZE, DEMO_HEAP_SIZE);
    }
    log::info!("created {} demo processes: {:?}", DEMO_PROCESS_COUNT, pids);

    for tick in 0..BOOT_DEMO_TICKS {
        scheduler::update_time();
        scheduler::schedule();
        log::info!("[tick {tick}] current PID: {}", scheduler::current_pid());
    }

    process::print_table();

    shell::run();
}

#[cfg(test)]
fn main() {}
