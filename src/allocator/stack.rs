//! Stack allocator - bump allocation with per-block headers.
//!
//! Design: a plain bump cursor plus a [`BlockHeader`] behind every block.
//! The header records the padding spent on alignment, the block capacity,
//! and the offset of the previously allocated block, which is enough to pop
//! in LIFO order, roll back to any earlier block boundary, and grow or
//! shrink the top block in place.
//!
//! The allocator never owns its buffer and never calls the OS; see
//! [`super::MemoryManager`] for the owned composition.

use core::ptr::NonNull;

use tracing::error;

use super::header::{BlockHeader, HEADER_ALIGN, HEADER_SIZE};
use crate::logging;
use crate::mem;

/// Stack memory allocator over a caller-provided buffer.
///
/// Invariant: `previous_offset <= offset <= capacity`. `offset` points at
/// the first free byte; `previous_offset` at the data of the most recently
/// allocated live block (zero when the stack is empty).
///
/// Pointers returned by the allocator are raw: a block freed by [`pop`] or
/// [`Stack::clear_at`] leaves any copies of its pointer dangling, and the
/// allocator cannot detect reads through them. The caller owns that
/// discipline.
///
/// [`pop`]: Stack::pop
pub struct Stack {
    buf: *mut u8,
    capacity: usize,
    offset: usize,
    previous_offset: usize,
}

impl Stack {
    /// Empty stack with no backing memory; every allocation fails.
    pub const fn new() -> Self {
        Self {
            buf: core::ptr::null_mut(),
            capacity: 0,
            offset: 0,
            previous_offset: 0,
        }
    }

    /// Create a stack allocator managing (but not owning) `buf`.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for reads and writes of `capacity` bytes for as
    /// long as the stack (or any pointer it returns) is in use, and must not
    /// be accessed through any other path in the meantime.
    pub unsafe fn from_raw_parts(buf: NonNull<u8>, capacity: usize) -> Self {
        Self {
            buf: buf.as_ptr(),
            capacity,
            offset: 0,
            previous_offset: 0,
        }
    }

    /// Total size in bytes of the managed buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently in use (offset to the first free byte).
    #[inline]
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Base pointer of the managed buffer.
    #[inline]
    pub(crate) fn base(&self) -> *mut u8 {
        self.buf
    }

    /// Offset of the top block's data; zero when the stack is empty.
    #[inline]
    pub(crate) fn previous_offset(&self) -> usize {
        self.previous_offset
    }

    /// Allocate a zeroed block of `size` bytes aligned to `alignment`.
    ///
    /// Returns `None` if `size` is zero, the stack has no capacity, or the
    /// block (plus header and padding) does not fit in the remaining space.
    pub fn alloc_align(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if self.capacity == 0 || size == 0 {
            return None;
        }

        let free_addr = self.buf as usize + self.offset;
        let padding = mem::padding_with_header(free_addr, alignment, HEADER_SIZE, HEADER_ALIGN);
        let remaining = self.capacity - self.offset;

        let required = match padding.checked_add(size) {
            Some(required) if required <= remaining => required,
            _ => {
                error!(
                    target: "allocator",
                    size,
                    padding,
                    remaining,
                    "stack unable to allocate"
                );
                crate::handle_memory_error();
                return None;
            }
        };

        let new_block = unsafe { self.buf.add(self.offset + padding) };

        // Write the header associated with the new block.
        unsafe {
            let header = new_block.sub(HEADER_SIZE) as *mut BlockHeader;
            header.write(BlockHeader {
                padding,
                capacity: size,
                previous_offset: self.previous_offset,
            });
        }

        self.previous_offset = self.offset + padding;
        self.offset += required;

        unsafe { mem::memory_set(new_block, size, 0) };
        logging::log_allocation(size, new_block);

        NonNull::new(new_block)
    }

    /// Allocate a zeroed block able to hold `count` values of type `T`.
    pub fn alloc<T>(&mut self, count: usize) -> Option<NonNull<T>> {
        let size = core::mem::size_of::<T>().checked_mul(count)?;
        self.alloc_align(size, core::mem::align_of::<T>())
            .map(|block| block.cast())
    }

    /// Resize a previously allocated block.
    ///
    /// `new_size == 0` frees the block (and everything above it) via
    /// [`Stack::clear_at`] and returns `None`. If `block` is the top of the
    /// stack, it grows or shrinks in place and keeps its address. Any other
    /// live block is copied into a fresh allocation - the old block becomes
    /// wasted space until a `pop`/`clear_at` reclaims it, since the stack
    /// never compacts. Pointers outside the buffer or to already-freed
    /// regions are rejected (logged, `None`).
    pub fn realloc_align(
        &mut self,
        block: *mut u8,
        new_size: usize,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        if new_size == 0 {
            self.clear_at(block);
            return None;
        }

        // Fast path: the top block just adjusts the offset.
        if self.previous_offset != 0 && block as usize == self.buf as usize + self.previous_offset
        {
            match self.previous_offset.checked_add(new_size) {
                Some(new_offset) if new_offset <= self.capacity => {
                    self.offset = new_offset;
                    unsafe {
                        let header = block.sub(HEADER_SIZE) as *mut BlockHeader;
                        (*header).capacity = new_size;
                    }
                    return NonNull::new(block);
                }
                _ => {
                    error!(
                        target: "allocator",
                        new_size,
                        remaining = self.capacity - self.previous_offset,
                        "stack unable to resize top block in place"
                    );
                    crate::handle_memory_error();
                    return None;
                }
            }
        }

        let start = self.buf as usize;
        let addr = block as usize;

        // Check that the address is within the allocator's memory.
        if addr < start + HEADER_SIZE || addr >= start + self.capacity {
            error!(
                target: "allocator",
                "pointer outside of the memory region managed by the stack allocator"
            );
            crate::handle_memory_error();
            return None;
        }

        // Check that the address is not already free.
        if addr >= start + self.offset {
            error!(
                target: "allocator",
                "reallocation of an already freed block (use-after-free)"
            );
            crate::handle_memory_error();
            return None;
        }

        let old_capacity = unsafe { (*BlockHeader::behind(block)).capacity };

        if new_size > self.capacity - self.offset {
            error!(
                target: "allocator",
                old_capacity,
                new_size,
                remaining = self.capacity - self.offset,
                "stack unable to reallocate by copy"
            );
            crate::handle_memory_error();
            return None;
        }

        let new_block = self.alloc_align(new_size, alignment)?;

        let copy_size = old_capacity.min(new_size);
        unsafe { mem::memory_copy(new_block.as_ptr(), block, copy_size) };

        Some(new_block)
    }

    /// Resize a block to hold `new_count` values of type `T`.
    ///
    /// A `new_count` of zero clears the stack up to (and including) `block`.
    pub fn realloc<T>(&mut self, block: *mut T, new_count: usize) -> Option<NonNull<T>> {
        let new_size = core::mem::size_of::<T>().checked_mul(new_count)?;
        self.realloc_align(block as *mut u8, new_size, core::mem::align_of::<T>())
            .map(|new_block| new_block.cast())
    }

    /// Free the most recently allocated block. Returns `false` on an empty
    /// stack, leaving the state untouched.
    pub fn pop(&mut self) -> bool {
        if self.previous_offset == 0 {
            return false;
        }

        let top = unsafe { self.buf.add(self.previous_offset) };
        let header = unsafe { *BlockHeader::behind(top) };

        self.offset = self.previous_offset.saturating_sub(header.padding);
        self.previous_offset = header.previous_offset;

        logging::log_deallocation(header.capacity, top);
        true
    }

    /// Roll the stack back so that `block` (and every block allocated after
    /// it) is freed.
    ///
    /// Fails without mutating state when `block` is null, outside the
    /// buffer, or points into the already-free region; the two failure
    /// causes are logged distinctly.
    ///
    /// Caveat: if `block` is in range but does not correspond to an actual
    /// allocation boundary, the bytes behind it are still interpreted as a
    /// header, which can corrupt the offset arbitrarily or clear the entire
    /// stack. The header carries no checksum; handing back real block
    /// pointers is the caller's responsibility.
    pub fn clear_at(&mut self, block: *const u8) -> bool {
        if block.is_null() {
            return false;
        }

        let start = self.buf as usize;
        let addr = block as usize;

        // A block pointer always sits at least one header past the start.
        if addr < start + HEADER_SIZE || addr > start + self.previous_offset {
            if addr < start + HEADER_SIZE || addr > start + self.capacity {
                error!(
                    target: "allocator",
                    "clear_at pointer outside of the stack allocator memory region"
                );
            } else {
                error!(
                    target: "allocator",
                    "clear_at pointer to an already free region of the stack"
                );
            }
            crate::handle_memory_error();
            return false;
        }

        let header = unsafe { *BlockHeader::behind(block) };

        self.offset = addr.saturating_sub(header.padding).saturating_sub(start);
        self.previous_offset = header.previous_offset;
        true
    }

    /// Reset the allocator to empty. O(1); all previously returned pointers
    /// become dangling.
    #[inline]
    pub fn clear(&mut self) {
        self.offset = 0;
        self.previous_offset = 0;
    }

    // -- Read-only introspection of the most recent live block. --

    /// Pointer to the data of the top block, or `None` when empty.
    #[inline]
    pub fn top(&self) -> Option<NonNull<u8>> {
        if self.previous_offset == 0 {
            return None;
        }
        NonNull::new(unsafe { self.buf.add(self.previous_offset) })
    }

    /// Header of the top block, or `None` when empty.
    pub fn top_header(&self) -> Option<&BlockHeader> {
        if self.previous_offset == 0 {
            return None;
        }
        Some(unsafe { &*BlockHeader::behind(self.buf.add(self.previous_offset)) })
    }

    /// Size in bytes of the top block; zero when empty.
    pub fn top_size(&self) -> usize {
        self.top_header().map_or(0, |header| header.capacity)
    }

    /// `previous_offset` recorded in the top block's header; zero when empty.
    pub fn top_previous_offset(&self) -> usize {
        self.top_header().map_or(0, |header| header.previous_offset)
    }

    /// Header of the given live block, or `None` if `block` is null, outside
    /// the buffer, or above the top block.
    pub fn header_of(&self, block: *const u8) -> Option<&BlockHeader> {
        let start = self.buf as usize;
        let addr = block as usize;

        let valid = !block.is_null()
            && addr >= start + HEADER_SIZE
            && addr <= start + self.capacity
            && addr <= start + self.previous_offset;

        if !valid {
            return None;
        }
        Some(unsafe { &*BlockHeader::behind(block) })
    }

    /// Size in bytes of the given block; zero if the pointer is invalid.
    pub fn size_of_block(&self, block: *const u8) -> usize {
        self.header_of(block).map_or(0, |header| header.capacity)
    }

    /// `previous_offset` of the given block's header; zero if invalid.
    pub fn previous_offset_of(&self, block: *const u8) -> usize {
        self.header_of(block)
            .map_or(0, |header| header.previous_offset)
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
