// src/kernel/memory.rs

//! Bump-with-reuse byte-region allocator.
//!
//! Allocation scans existing blocks for the first free one that's large
//! enough (first-fit reuse) before bumping the heap pointer for a fresh
//! block. Freeing never splits or merges interior blocks; the only
//! compaction is trimming free blocks off the tail, which lets a heap of
//! entirely-freed blocks reclaim its space without a general-purpose
//! allocator's bookkeeping.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::constants::{MAX_MEMORY_BLOCKS, PROCESS_HEAP_START, PROCESS_HEAP_SIZE};

/// Whether a tracked block is available for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Not currently handed out.
    Free,
    /// Owned by the process named in `MemoryBlock::owner_id`.
    Allocated,
}

/// A single tracked region of the process heap.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBlock {
    pub address: u32,
    pub size: u32,
    pub owner_id: u32,
    pub state: BlockState,
}

impl MemoryBlock {
    const EMPTY: MemoryBlock = MemoryBlock {
        address: 0,
        size: 0,
        owner_id: 0,
        state: BlockState::Free,
    };
}

/// Result of releasing every block owned by a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreedSummary {
    pub freed_count: u32,
    pub freed_bytes: u32,
}

/// The allocator's full state: the block table plus the bump cursor.
pub struct Allocator {
    blocks: [MemoryBlock; MAX_MEMORY_BLOCKS],
    block_count: usize,
    heap_start: u32,
    heap_end: u32,
    bump_ptr: u32,
}

impl Allocator {
    const fn new() -> Self {
        Allocator {
            blocks: [MemoryBlock::EMPTY; MAX_MEMORY_BLOCKS],
            block_count: 0,
            heap_start: 0,
            heap_end: 0,
            bump_ptr: 0,
        }
    }

    /// Reset the heap bounds and forget every tracked block.
    pub fn init(&mut self) {
        self.heap_start = PROCESS_HEAP_START;
        self.heap_end = PROCESS_HEAP_START + PROCESS_HEAP_SIZE;
        self.block_count = 0;
        self.bump_ptr = self.heap_start;
        log::info!("memory allocator initialized");
    }

    fn find_block_index(&self, address: u32) -> Option<usize> {
        self.blocks[..self.block_count]
            .iter()
            .position(|b| b.address == address)
    }

    fn compact_tail(&mut self) {
        while self.block_count > 0 && self.blocks[self.block_count - 1].state == BlockState::Free {
            self.block_count -= 1;
        }
        self.bump_ptr = if self.block_count == 0 {
            self.heap_start
        } else {
            let last = &self.blocks[self.block_count - 1];
            last.address + last.size
        };
    }

    /// Allocate `size` bytes for `owner_id`, returning the block address or
    /// `0` on failure (zero-size request, exhausted block table, or
    /// exhausted heap).
    pub fn allocate(&mut self, size: u32, owner_id: u32) -> u32 {
        if size == 0 {
            log::error!("zero-size allocation requested");
            return 0;
        }

        for block in self.blocks[..self.block_count].iter_mut() {
            if block.state == BlockState::Free && block.size >= size {
                block.state = BlockState::Allocated;
                block.owner_id = owner_id;
                return block.address;
            }
        }

        if self.block_count >= MAX_MEMORY_BLOCKS {
            log::error!("maximum memory blocks reached");
            return 0;
        }
        if self.bump_ptr.checked_add(size).is_none_or(|end| end > self.heap_end) {
            log::error!("heap exhausted");
            return 0;
        }

        let address = self.bump_ptr;
        self.blocks[self.block_count] = MemoryBlock {
            address,
            size,
            owner_id,
            state: BlockState::Allocated,
        };
        self.block_count += 1;
        self.bump_ptr += size;
        address
    }

    /// Free the block at `address`. Freeing an unknown or already-free
    /// address logs a warning and is otherwise a no-op.
    pub fn free(&mut self, address: u32) {
        let Some(index) = self.find_block_index(address) else {
            log::warn!("attempted to free unallocated address 0x{address:x}");
            return;
        };
        if self.blocks[index].state == BlockState::Free {
            log::warn!("attempted double free at 0x{address:x}");
            return;
        }
        self.blocks[index].state = BlockState::Free;
        self.compact_tail();
    }

    /// Free every block owned by `owner_id`.
    pub fn free_owner(&mut self, owner_id: u32) -> FreedSummary {
        let mut freed_count = 0;
        let mut freed_bytes = 0;
        for block in self.blocks[..self.block_count].iter_mut() {
            if block.owner_id == owner_id && block.state == BlockState::Allocated {
                block.state = BlockState::Free;
                freed_count += 1;
                freed_bytes += block.size;
            }
        }
        if freed_count == 0 {
            log::warn!("no allocated blocks found for owner {owner_id}");
            return FreedSummary { freed_count: 0, freed_bytes: 0 };
        }
        self.compact_tail();
        log::info!("freed {freed_bytes} bytes across {freed_count} blocks for owner {owner_id}");
        FreedSummary { freed_count, freed_bytes }
    }

    /// Log a table of every tracked block plus aggregate usage.
    pub fn print_status(&self) {
        let mut total_allocated: u32 = 0;
        let mut total_free: u32 = 0;
        let unallocated_tail = self.heap_end - self.bump_ptr;

        log::info!("=== Memory Status ===");
        for block in self.blocks[..self.block_count].iter() {
            match block.state {
                BlockState::Allocated => total_allocated += block.size,
                BlockState::Free => total_free += block.size,
            }
            log::info!(
                "0x{:x} | {} bytes | {} | owner {}",
                block.address,
                block.size,
                if block.state == BlockState::Allocated { "ALLOCATED" } else { "FREE" },
                block.owner_id
            );
        }
        log::info!("total allocated: {total_allocated} bytes");
        log::info!("total free: {} bytes", total_free + unallocated_tail);
        log::info!("unallocated heap: {unallocated_tail} bytes");
        log::info!("bump pointer: 0x{:x}", self.bump_ptr);
    }

    #[cfg(test)]
    fn block_count(&self) -> usize {
        self.block_count
    }

    #[cfg(test)]
    fn bump_ptr(&self) -> u32 {
        self.bump_ptr
    }
}

lazy_static! {
    pub static ref ALLOCATOR: Mutex<Allocator> = Mutex::new(Allocator::new());
}

/// Initialize the global allocator.
pub fn init() {
    ALLOCATOR.lock().init();
}

/// Allocate `size` bytes for `owner_id` from the global allocator.
pub fn allocate(size: u32, owner_id: u32) -> u32 {
    ALLOCATOR.lock().allocate(size, owner_id)
}

/// Free the block at `address` in the global allocator.
pub fn free(address: u32) {
    ALLOCATOR.lock().free(address);
}

/// Free every block owned by `owner_id` in the global allocator.
pub fn free_owner(owner_id: u32) -> FreedSummary {
    ALLOCATOR.lock().free_owner(owner_id)
}

/// Log the global allocator's status.
pub fn print_status() {
    ALLOCATOR.lock().print_status();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Allocator {
        let mut a = Allocator::new();
        a.init();
        a
    }

    #[test]
    fn allocate_bumps_pointer() {
        let mut a = fresh();
        let addr = a.allocate(64, 1);
        assert_eq!(addr, PROCESS_HEAP_START);
        assert_eq!(a.bump_ptr(), PROCESS_HEAP_START + 64);
        assert_eq!(a.block_count(), 1);
    }

    #[test]
    fn zero_size_allocation_fails() {
        let mut a = fresh();
        assert_eq!(a.allocate(0, 1), 0);
        assert_eq!(a.block_count(), 0);
    }

    #[test]
    fn free_then_reuse_first_fit() {
        let mut a = fresh();
        let first = a.allocate(128, 1);
        let second = a.allocate(64, 2);
        a.free(first);
        // A request that fits inside the freed block is reused rather than
        // bumping the pointer further.
        let reused = a.allocate(100, 3);
        assert_eq!(reused, first);
        let _ = second;
    }

    #[test]
    fn free_unknown_address_is_a_no_op() {
        let mut a = fresh();
        a.free(0xdead_beef);
        assert_eq!(a.block_count(), 0);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut a = fresh();
        let addr = a.allocate(16, 1);
        a.free(addr);
        a.free(addr);
        assert_eq!(a.block_count(), 0);
    }

    #[test]
    fn tail_compaction_reclaims_space_but_not_interior_blocks() {
        let mut a = fresh();
        let first = a.allocate(32, 1);
        let second = a.allocate(32, 1);
        let third = a.allocate(32, 1);
        a.free(third);
        a.free(second);
        // Both tail blocks compacted away; bump pointer retreats.
        assert_eq!(a.bump_ptr(), first + 32);
        assert_eq!(a.block_count(), 1);

        // Freeing `first` (now the only, and last, block) compacts it too.
        a.free(first);
        assert_eq!(a.block_count(), 0);
        assert_eq!(a.bump_ptr(), PROCESS_HEAP_START);
    }

    #[test]
    fn free_owner_releases_every_block_for_that_owner() {
        let mut a = fresh();
        let a1 = a.allocate(32, 7);
        let a2 = a.allocate(32, 7);
        let _b1 = a.allocate(32, 8);
        let summary = a.free_owner(7);
        assert_eq!(summary.freed_count, 2);
        assert_eq!(summary.freed_bytes, 64);
        let _ = (a1, a2);
    }

    #[test]
    fn heap_exhaustion_is_reported_and_does_not_panic() {
        let mut a = fresh();
        assert_eq!(a.allocate(PROCESS_HEAP_SIZE + 1, 1), 0);
    }

    #[test]
    fn max_memory_blocks_is_enforced() {
        let mut a = fresh();
        for i in 0..MAX_MEMORY_BLOCKS as u32 {
            assert_ne!(a.allocate(1, i), 0);
        }
        assert_eq!(a.allocate(1, 9999), 0);
    }
}
