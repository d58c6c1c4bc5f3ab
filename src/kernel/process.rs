// src/kernel/process.rs

//! Process control blocks and the process table.
//!
//! Slot 0 is reserved for the idle process (pid 0): it is created by
//! `init`, is never returned by `create`, and the scheduler treats it as
//! the fallback when nothing else is ready.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::constants::MAX_PROCESSES;
use crate::kernel::memory;

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Terminated = 0,
    Ready = 1,
    Current = 2,
}

/// Placeholder CPU register file. Real context save/restore is out of
/// scope; these fields exist so a future scheduler could grow into them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags: u32,
}

/// A process control block.
#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub process_id: u32,
    pub state: ProcessState,
    pub priority: u32,
    pub stack_base: u32,
    pub stack_size: u32,
    pub heap_base: u32,
    pub heap_size: u32,
    pub context: CpuContext,
    pub creation_time: u32,
    pub wait_time: u32,
}

impl Pcb {
    const EMPTY: Pcb = Pcb {
        process_id: 0,
        state: ProcessState::Terminated,
        priority: 0,
        stack_base: 0,
        stack_size: 0,
        heap_base: 0,
        heap_size: 0,
        context: CpuContext {
            eax: 0,
            ebx: 0,
            ecx: 0,
            edx: 0,
            esi: 0,
            edi: 0,
            ebp: 0,
            esp: 0,
            eip: 0,
            eflags: 0,
        },
        creation_time: 0,
        wait_time: 0,
    };
}

/// The process table: a dense array of live PCBs plus id allocation state.
pub struct ProcessTable {
    processes: [Pcb; MAX_PROCESSES],
    process_count: usize,
    next_process_id: u32,
    /// Monotonically advanced by `tick`; stamped onto newly created PCBs.
    /// The reference kernel never actually advances this before scheduler
    /// ticks run, so `creation_time` on demo processes is typically 0 -
    /// preserved here rather than "fixed", since nothing in the spec
    /// depends on it being otherwise.
    global_time: u32,
}

impl ProcessTable {
    const fn new() -> Self {
        ProcessTable {
            processes: [Pcb::EMPTY; MAX_PROCESSES],
            process_count: 0,
            next_process_id: 1,
            global_time: 0,
        }
    }

    /// Reset the table and install the idle process at slot 0.
    pub fn init(&mut self) {
        self.processes[0] = Pcb {
            process_id: 0,
            state: ProcessState::Current,
            priority: 0,
            stack_base: 0x20000,
            stack_size: 0x1000,
            heap_base: 0x21000,
            heap_size: 0x2000,
            context: CpuContext::default(),
            creation_time: 0,
            wait_time: 0,
        };
        self.process_count = 1;
        self.next_process_id = 1;
        self.global_time = 0;
        log::info!("process manager initialized");
    }

    /// Advance the process manager's notion of time by one tick.
    pub fn tick(&mut self) {
        self.global_time += 1;
    }

    fn index_of(&self, process_id: u32) -> Option<usize> {
        self.processes[..self.process_count]
            .iter()
            .position(|p| p.process_id == process_id)
    }

    /// Create a process with the given priority, stack size and heap size.
    /// Allocates its stack and heap from the global memory allocator.
    /// Returns the new process id, or `0` on failure.
    pub fn create(&mut self, priority: u32, stack_size: u32, heap_size: u32) -> u32 {
        if self.process_count >= MAX_PROCESSES {
            log::error!("process table full");
            return 0;
        }

        // The pid is consumed whether or not allocation below succeeds,
        // matching the reference manager - a failed create still burns a
        // pid, it is never reused.
        let pid = self.next_process_id;
        self.next_process_id += 1;

        let stack_base = memory::allocate(stack_size, pid);
        let heap_base = memory::allocate(heap_size, pid);
        if stack_base == 0 || heap_base == 0 {
            log::error!("failed to allocate memory for process {pid}");
            return 0;
        }

        let mut context = CpuContext::default();
        context.esp = stack_base + stack_size;
        context.ebp = context.esp;
        context.eip = 0;

        self.processes[self.process_count] = Pcb {
            process_id: pid,
            state: ProcessState::Ready,
            priority,
            stack_base,
            stack_size,
            heap_base,
            heap_size,
            context,
            creation_time: self.global_time,
            wait_time: 0,
        };
        self.process_count += 1;
        pid
    }

    /// Mark a process terminated and release its memory. A warning is
    /// logged if the process id is unknown.
    pub fn terminate(&mut self, process_id: u32) {
        let Some(index) = self.index_of(process_id) else {
            log::warn!("process {process_id} not found");
            return;
        };
        self.processes[index].state = ProcessState::Terminated;
        memory::free_owner(process_id);
        log::info!("process {process_id} terminated");
    }

    /// Set a process's state directly. A no-op if the process id is unknown.
    pub fn set_state(&mut self, process_id: u32, state: ProcessState) {
        if let Some(index) = self.index_of(process_id) {
            self.processes[index].state = state;
        }
    }

    /// Return a process's state, or `Terminated` if the id is unknown.
    pub fn get_state(&self, process_id: u32) -> ProcessState {
        self.index_of(process_id)
            .map(|i| self.processes[i].state)
            .unwrap_or(ProcessState::Terminated)
    }

    /// Return a copy of a process's PCB, if it exists.
    pub fn get_pcb(&self, process_id: u32) -> Option<Pcb> {
        self.index_of(process_id).map(|i| self.processes[i])
    }

    /// Mutable access to a PCB, for the scheduler. Not exposed outside the
    /// kernel module tree.
    pub(crate) fn get_pcb_mut(&mut self, process_id: u32) -> Option<&mut Pcb> {
        let index = self.index_of(process_id)?;
        Some(&mut self.processes[index])
    }

    /// Iterate over every live PCB in table order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.processes[..self.process_count].iter()
    }

    /// Iterate mutably over every live PCB in table order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pcb> {
        self.processes[..self.process_count].iter_mut()
    }

    /// Log the process table.
    pub fn print_table(&self) {
        log::info!("=== Process Table ===");
        for pcb in self.iter() {
            let state = match pcb.state {
                ProcessState::Current => "CURRENT",
                ProcessState::Ready => "READY",
                ProcessState::Terminated => "TERM.",
            };
            log::info!(
                "{} | {} | priority {} | stack 0x{:x} | heap 0x{:x} | wait {}",
                pcb.process_id,
                state,
                pcb.priority,
                pcb.stack_base,
                pcb.heap_base,
                pcb.wait_time
            );
        }
    }
}

lazy_static! {
    pub static ref PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());
}

/// Initialize the global process table.
pub fn init() {
    PROCESS_TABLE.lock().init();
}

/// Create a process in the global process table.
pub fn create(priority: u32, stack_size: u32, heap_size: u32) -> u32 {
    PROCESS_TABLE.lock().create(priority, stack_size, heap_size)
}

/// Terminate a process in the global process table.
pub fn terminate(process_id: u32) {
    PROCESS_TABLE.lock().terminate(process_id);
}

/// Set a process's state in the global process table.
pub fn set_state(process_id: u32, state: ProcessState) {
    PROCESS_TABLE.lock().set_state(process_id, state);
}

/// Get a process's state from the global process table.
pub fn get_state(process_id: u32) -> ProcessState {
    PROCESS_TABLE.lock().get_state(process_id)
}

/// Get a copy of a process's PCB from the global process table.
pub fn get_pcb(process_id: u32) -> Option<Pcb> {
    PROCESS_TABLE.lock().get_pcb(process_id)
}

/// Log the global process table.
pub fn print_table() {
    PROCESS_TABLE.lock().print_table();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ProcessTable {
        memory::init();
        let mut t = ProcessTable::new();
        t.init();
        t
    }

    #[test]
    fn idle_process_occupies_slot_zero() {
        let t = fresh();
        let idle = t.get_pcb(0).unwrap();
        assert_eq!(idle.state, ProcessState::Current);
        assert_eq!(idle.stack_base, 0x20000);
        assert_eq!(idle.heap_base, 0x21000);
    }

    #[test]
    fn create_assigns_increasing_pids_starting_at_one() {
        let mut t = fresh();
        let p1 = t.create(1, 4096, 8192);
        let p2 = t.create(1, 4096, 8192);
        assert_eq!(p1, 1);
        assert_eq!(p2, 2);
        assert_eq!(t.get_state(p1), ProcessState::Ready);
    }

    #[test]
    fn terminate_frees_memory_and_marks_terminated() {
        let mut t = fresh();
        let pid = t.create(1, 64, 64);
        t.terminate(pid);
        assert_eq!(t.get_state(pid), ProcessState::Terminated);
    }

    #[test]
    fn terminate_unknown_pid_is_a_no_op_warning() {
        let mut t = fresh();
        t.terminate(999);
        assert_eq!(t.get_state(999), ProcessState::Terminated);
    }

    #[test]
    fn get_pcb_of_unknown_pid_is_none() {
        let t = fresh();
        assert!(t.get_pcb(42).is_none());
    }

    #[test]
    fn process_table_full_returns_zero() {
        let mut t = fresh();
        // Terminate each process before creating the next so memory blocks
        // get reused and only the process table itself fills up.
        for _ in 0..(MAX_PROCESSES - 1) {
            let pid = t.create(1, 64, 64);
            assert_ne!(pid, 0);
            t.terminate(pid);
        }
        assert_eq!(t.create(1, 64, 64), 0);
    }
}
