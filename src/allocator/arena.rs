//! Arena allocator - header-free bump allocation.
//!
//! Design: the cheapest allocator possible, a single forward-moving offset.
//! The price of keeping no per-block metadata is that individual blocks can
//! never be freed: reclamation is whole-arena (`clear`) or rollback to a
//! [`ArenaCheckpoint`], and reallocation needs the caller to supply the
//! current block size.

use core::ptr::NonNull;

use tracing::error;

use crate::logging;
use crate::mem;
use crate::vmem;

/// Arena (bump) allocator over a caller-provided buffer.
///
/// The arena does not own its memory: it never allocates from or returns
/// memory to the OS, except when constructed through [`Arena::owned`]. All
/// blocks it returns are zeroed.
pub struct Arena {
    buf: *mut u8,
    capacity: usize,
    offset: usize,
}

/// Saved arena offset for scoped temporary allocations.
///
/// Restoring rolls the arena back to the allocation state it had when the
/// checkpoint was taken. [`Arena::restore`] consumes the checkpoint, so it
/// cannot be applied twice; take checkpoints in LIFO order from a single
/// thread of control.
#[derive(Debug)]
pub struct ArenaCheckpoint {
    arena: *const u8,
    saved_offset: usize,
}

impl Arena {
    /// Empty arena with no backing memory; every allocation fails.
    pub const fn new() -> Self {
        Self {
            buf: core::ptr::null_mut(),
            capacity: 0,
            offset: 0,
        }
    }

    /// Create an arena managing (but not owning) `buf`.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for reads and writes of `capacity` bytes for as
    /// long as the arena (or any pointer it returns) is in use, and must not
    /// be accessed through any other path in the meantime.
    pub unsafe fn from_raw_parts(buf: NonNull<u8>, capacity: usize) -> Self {
        Self {
            buf: buf.as_ptr(),
            capacity,
            offset: 0,
        }
    }

    /// Create an arena backed by a fresh OS reservation of `capacity` bytes.
    ///
    /// The arena itself stays unaware of the ownership: pair this with
    /// [`Arena::free_owned`] to return the reservation.
    pub fn owned(capacity: usize) -> Option<Self> {
        let memory = vmem::reserve(capacity)?;
        Some(unsafe { Self::from_raw_parts(memory, capacity) })
    }

    /// Release the OS reservation behind an arena created by
    /// [`Arena::owned`], leaving the arena empty.
    ///
    /// # Safety
    ///
    /// The arena must have been created by [`Arena::owned`] and no pointer
    /// into it may be used afterwards.
    pub unsafe fn free_owned(&mut self) {
        if let Some(memory) = NonNull::new(self.buf) {
            vmem::release(memory, self.capacity);
        }
        self.buf = core::ptr::null_mut();
        self.capacity = 0;
        self.offset = 0;
    }

    /// Total size in bytes of the managed buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently in use.
    #[inline]
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Bytes still available (ignoring alignment padding).
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    /// Allocate a zeroed block of `size` bytes aligned to `alignment`.
    ///
    /// Returns `None` if `size` is zero, the arena has no capacity, or the
    /// aligned block does not fit in the remaining space.
    pub fn alloc_align(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 || self.capacity == 0 {
            return None;
        }

        let start = self.buf as usize;
        let end = start + self.capacity;
        let block_addr = mem::align_forward(start + self.offset, alignment);

        // Check that there is enough memory.
        if block_addr.checked_add(size).map_or(true, |block_end| block_end > end) {
            error!(
                target: "allocator",
                size,
                alignment,
                remaining = self.remaining(),
                "arena unable to allocate"
            );
            crate::handle_memory_error();
            return None;
        }

        // Commit the new block by bumping the offset.
        self.offset = block_addr + size - start;

        let block = block_addr as *mut u8;
        unsafe { mem::memory_set(block, size, 0) };
        logging::log_allocation(size, block);

        NonNull::new(block)
    }

    /// Allocate a zeroed block able to hold `count` values of type `T`.
    pub fn alloc<T>(&mut self, count: usize) -> Option<NonNull<T>> {
        let size = core::mem::size_of::<T>().checked_mul(count)?;
        self.alloc_align(size, core::mem::align_of::<T>())
            .map(|block| block.cast())
    }

    /// Resize a previously allocated block.
    ///
    /// The arena keeps no record of its blocks, so the caller must pass the
    /// block's `current_size`. The most recent allocation (where
    /// `block + current_size` is the free cursor) grows or shrinks in place;
    /// any other block is copied into a fresh allocation and the old bytes
    /// become permanently wasted space. A null `block` or zero
    /// `current_size` behaves as a plain allocation. `new_size == 0` is a
    /// contract violation (use [`Arena::clear`] to free).
    pub fn realloc_align(
        &mut self,
        block: *mut u8,
        current_size: usize,
        new_size: usize,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        debug_assert!(new_size != 0, "arena realloc cannot free blocks");
        if new_size == 0 || self.capacity == 0 {
            return None;
        }

        if block.is_null() || current_size == 0 {
            return self.alloc_align(new_size, alignment);
        }

        let start = self.buf as usize;
        let end = start + self.capacity;
        let free_addr = start + self.offset;
        let addr = block as usize;

        // Check that the block lies within the arena's memory.
        if addr < start || addr >= end {
            error!(
                target: "allocator",
                "reallocation of a block outside of the arena region"
            );
            crate::handle_memory_error();
            return None;
        }

        // Check that the block is not already free.
        if addr >= free_addr {
            error!(
                target: "allocator",
                "reallocation of a freed arena block (use-after-free)"
            );
            crate::handle_memory_error();
            return None;
        }

        debug_assert!(
            current_size <= self.offset,
            "current_size surpasses the arena offset"
        );

        // The most recent allocation grows or shrinks in place.
        if addr == free_addr - current_size {
            if addr.checked_add(new_size).map_or(true, |block_end| block_end > end) {
                error!(
                    target: "allocator",
                    current_size,
                    new_size,
                    "arena unable to resize block in place"
                );
                crate::handle_memory_error();
                return None;
            }

            self.offset = self.offset - current_size + new_size;
            return NonNull::new(block);
        }

        // No help but to create a fresh block and migrate the data.
        let new_block = self.alloc_align(new_size, alignment)?;
        unsafe { mem::memory_move(new_block.as_ptr(), block, current_size.min(new_size)) };

        Some(new_block)
    }

    /// Resize a block of `current_count` values of `T` to `new_count`.
    pub fn realloc<T>(
        &mut self,
        block: *mut T,
        current_count: usize,
        new_count: usize,
    ) -> Option<NonNull<T>> {
        let current_size = core::mem::size_of::<T>().checked_mul(current_count)?;
        let new_size = core::mem::size_of::<T>().checked_mul(new_count)?;
        self.realloc_align(
            block as *mut u8,
            current_size,
            new_size,
            core::mem::align_of::<T>(),
        )
        .map(|new_block| new_block.cast())
    }

    /// Reset the arena to empty. O(1); all previously returned pointers
    /// become dangling.
    #[inline]
    pub fn clear(&mut self) {
        self.offset = 0;
    }

    /// Save the current offset for a later [`Arena::restore`].
    pub fn checkpoint(&self) -> ArenaCheckpoint {
        ArenaCheckpoint {
            arena: self.buf,
            saved_offset: self.offset,
        }
    }

    /// Roll the arena back to a previously taken checkpoint, consuming it.
    /// Every block allocated after the checkpoint becomes dangling.
    pub fn restore(&mut self, checkpoint: ArenaCheckpoint) {
        debug_assert!(
            core::ptr::eq(checkpoint.arena, self.buf),
            "checkpoint restored on a different arena"
        );
        self.offset = checkpoint.saved_offset;
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
