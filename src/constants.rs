// src/constants.rs

//! Kernel configuration constants.
//!
//! These values are taken directly from the reference baremetal kernel this
//! one is modeled on; they are not tunable at runtime.

/// Base address of the kernel's own heap (unused by the process allocator,
/// kept for documentation of the address-space layout).
pub const KERNEL_HEAP_START: u32 = 0x10000;

/// Size of the kernel heap region.
pub const KERNEL_HEAP_SIZE: u32 = 0x100000; // 1 MB

/// Base address of the process heap, the region the bump allocator manages.
pub const PROCESS_HEAP_START: u32 = 0x110000;

/// Size of the process heap region.
pub const PROCESS_HEAP_SIZE: u32 = 0x400000; // 4 MB

/// Maximum number of live memory block entries the allocator can track.
pub const MAX_MEMORY_BLOCKS: usize = 256;

/// Maximum number of process table entries, including the idle process.
pub const MAX_PROCESSES: usize = 256;

/// Wait-time threshold (in ticks) above which a ready process is aged up
/// (priority value decremented) by the round-robin scheduler.
pub const AGING_THRESHOLD: u32 = 1000;

/// Default round-robin time quantum, in ticks.
pub const DEFAULT_TIME_QUANTUM: u32 = 5;

/// Stack size handed to each demo process created at boot.
pub const DEMO_STACK_SIZE: u32 = 4096;

/// Heap size handed to each demo process created at boot.
pub const DEMO_HEAP_SIZE: u32 = 8192;

/// Number of demo processes created at boot.
pub const DEMO_PROCESS_COUNT: u32 = 10;

/// Number of scheduler ticks run at boot to demonstrate rotation.
pub const BOOT_DEMO_TICKS: u32 = 12;
