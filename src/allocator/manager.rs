//! Root memory manager - a stack allocator over an OS reservation.

use core::ptr::NonNull;

use tracing::error;

use super::arena::Arena;
use super::stack::Stack;
use crate::vmem;

/// A stack-allocator-based manager intended as the central memory resource
/// of an application.
///
/// The manager owns the OS reservation backing its stack and releases it on
/// drop. It tracks the number of live allocations; all typed entry points
/// funnel into the stack's aligned byte primitives.
pub struct MemoryManager {
    allocation_count: usize,
    allocator: Stack,
}

impl MemoryManager {
    /// Reserve `capacity` bytes from the OS and build the root stack over
    /// them. Returns `None` if the OS refuses the reservation.
    pub fn new(capacity: usize) -> Option<Self> {
        let memory = vmem::reserve(capacity)?;
        Some(Self {
            allocation_count: 0,
            allocator: unsafe { Stack::from_raw_parts(memory, capacity) },
        })
    }

    /// Number of live allocations made through the manager.
    #[inline]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    /// Total size in bytes of the managed reservation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    /// Bytes currently in use by the underlying stack.
    #[inline]
    pub fn used(&self) -> usize {
        self.allocator.used()
    }

    /// Direct access to the underlying stack allocator.
    #[inline]
    pub fn allocator(&self) -> &Stack {
        &self.allocator
    }

    /// Allocate a zeroed region able to hold `count` values of type `T`.
    pub fn alloc<T>(&mut self, count: usize) -> Option<NonNull<T>> {
        let new_block = self.allocator.alloc::<T>(count);
        if new_block.is_some() {
            self.allocation_count += 1;
        }
        new_block
    }

    /// Reallocate a region previously created by the manager.
    ///
    /// The allocation count grows only when a new block had to be created
    /// (the returned pointer differs from `block`); an in-place resize of
    /// the top block leaves it untouched.
    pub fn realloc<T>(&mut self, block: *mut T, new_count: usize) -> Option<NonNull<T>> {
        let new_block = self.allocator.realloc(block, new_count);
        if let Some(new_block) = new_block {
            if new_block.as_ptr() != block {
                self.allocation_count += 1;
            }
        }
        new_block
    }

    /// Free the last allocated block. Returns `false` on an empty stack.
    pub fn pop(&mut self) -> bool {
        let popped = self.allocator.pop();
        if popped {
            self.allocation_count = self.allocation_count.saturating_sub(1);
        }
        popped
    }

    /// Pop blocks until `block` itself has been freed, or the stack empties.
    ///
    /// Fails up front (logged, `false`) when `block` is null, outside the
    /// stack's buffer, or points into the already-free region.
    ///
    /// Caveat: a `block` that never matches an actual allocation boundary
    /// drains the entire stack and still returns `true` - the same trust
    /// boundary as [`Stack::clear_at`], one level up.
    pub fn clear_until(&mut self, block: *const u8) -> bool {
        let start = self.allocator.base() as usize;
        let addr = block as usize;

        // Check that the block lies within the allocator's live memory.
        if addr < start || addr > start + self.allocator.previous_offset() {
            if addr > start + self.allocator.capacity() || addr < start {
                error!(
                    target: "allocator",
                    "clear_until pointer outside of the stack memory region"
                );
            } else {
                error!(
                    target: "allocator",
                    "clear_until pointer to an already free region of the stack"
                );
            }
            return false;
        }

        loop {
            let Some(top_block) = self.allocator.top() else {
                break;
            };
            if self.allocator.pop() {
                self.allocation_count = self.allocation_count.saturating_sub(1);
            }
            if top_block.as_ptr() as *const u8 == block {
                break;
            }
        }

        true
    }

    /// Reset the manager: zero the allocation count and clear the stack.
    pub fn clear(&mut self) {
        self.allocation_count = 0;
        self.allocator.clear();
    }

    /// Carve `size` bytes out of the root stack and wrap them as a fresh
    /// (non-owning) arena.
    ///
    /// The arena is a live view into the manager's buffer: it must not be
    /// used after the span it occupies is popped or cleared by the manager.
    pub fn make_arena(&mut self, size: usize) -> Option<Arena> {
        let memory = self.alloc::<u8>(size)?;
        Some(unsafe { Arena::from_raw_parts(memory, size) })
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        if let Some(memory) = NonNull::new(self.allocator.base()) {
            unsafe { vmem::release(memory, self.allocator.capacity()) };
        }
    }
}
