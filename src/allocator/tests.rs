//! Allocator scenario tests.
//!
//! Suite organized by component:
//! - Stack: LIFO discipline, rollback, reallocation, exhaustion
//! - Arena: bump allocation, checkpoint/restore, realloc by copy
//! - Manager: allocation counting, clear_until, arena carving

#[cfg(test)]
mod tests {
    use super::super::header::HEADER_SIZE;
    use super::super::*;
    use crate::mem;
    use core::mem::size_of;
    use core::ptr::NonNull;

    /// Backing buffer with a known base alignment so that offsets in the
    /// assertions below are deterministic.
    #[repr(align(16))]
    struct Buffer<const N: usize>([u8; N]);

    impl<const N: usize> Buffer<N> {
        fn new() -> Self {
            Buffer([0u8; N])
        }

        fn stack(&mut self) -> Stack {
            unsafe { Stack::from_raw_parts(NonNull::new(self.0.as_mut_ptr()).unwrap(), N) }
        }

        fn arena(&mut self) -> Arena {
            unsafe { Arena::from_raw_parts(NonNull::new(self.0.as_mut_ptr()).unwrap(), N) }
        }
    }

    // ===== Stack =====

    #[test]
    fn first_allocation_lands_one_header_past_the_base() {
        let mut buffer = Buffer::<128>::new();
        let mut stack = buffer.stack();

        // 16-aligned base: the padding is exactly the header.
        let block = stack.alloc_align(16, 8).expect("first alloc");
        assert_eq!(
            block.as_ptr() as usize,
            buffer.0.as_ptr() as usize + HEADER_SIZE
        );
        assert_eq!(stack.used(), HEADER_SIZE + 16);

        // A request bigger than the whole buffer fails, state unchanged.
        assert!(stack.alloc_align(200, 8).is_none());
        assert_eq!(stack.used(), HEADER_SIZE + 16);
    }

    #[test]
    fn header_reachable_behind_every_block() {
        let mut buffer = Buffer::<512>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(16, 8).expect("x").as_ptr();
        let y = stack.alloc_align(40, 8).expect("y").as_ptr();

        let x_header = stack.header_of(x).expect("x header");
        assert_eq!(x_header.capacity, 16);
        assert_eq!(x_header.previous_offset, 0);

        let y_header = stack.header_of(y).expect("y header");
        assert_eq!(y_header.capacity, 40);
        assert_eq!(
            y_header.previous_offset,
            x as usize - buffer.0.as_ptr() as usize
        );

        // Header addresses satisfy the header alignment.
        let header_addr = y as usize - HEADER_SIZE;
        assert_eq!(header_addr % core::mem::align_of::<BlockHeader>(), 0);

        assert_eq!(stack.size_of_block(x), 16);
        assert_eq!(stack.previous_offset_of(y), stack.top_previous_offset());
    }

    #[test]
    fn lifo_round_trip_returns_to_empty() {
        let mut buffer = Buffer::<1024>::new();
        let mut stack = buffer.stack();

        for size in [16, 32, 48, 64] {
            stack.alloc_align(size, 8).expect("alloc");
        }
        for _ in 0..4 {
            assert!(stack.pop());
        }

        assert_eq!(stack.used(), 0);
        assert!(stack.top().is_none());
        assert!(!stack.pop());
    }

    #[test]
    fn pop_is_strict_lifo() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(32, 8).expect("x");
        let _y = stack.alloc_align(32, 8).expect("y");

        assert!(stack.pop());
        assert_eq!(stack.top(), Some(x));

        assert!(stack.pop());
        assert!(stack.top().is_none());

        // Popping an empty stack fails and changes nothing.
        assert!(!stack.pop());
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn clear_at_rolls_back_to_the_block_below() {
        let mut buffer = Buffer::<512>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(32, 8).expect("x");
        let y = stack.alloc_align(32, 8).expect("y").as_ptr();
        let _z = stack.alloc_align(32, 8).expect("z");

        assert!(stack.clear_at(y));
        assert_eq!(stack.top(), Some(x));

        // The freed span is reused by the next allocation.
        let reused = stack.alloc_align(32, 8).expect("reuse").as_ptr();
        assert_eq!(reused, y);
    }

    #[test]
    fn clear_at_rejects_foreign_and_freed_pointers() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(32, 8).expect("x").as_ptr();
        let used = stack.used();

        // Null pointer.
        assert!(!stack.clear_at(core::ptr::null()));

        // Pointer beyond the buffer entirely.
        let foreign = buffer.0.as_ptr() as usize + 4096;
        assert!(!stack.clear_at(foreign as *const u8));

        // Pointer into the free region above the top block.
        let free_region = buffer.0.as_ptr() as usize + used + HEADER_SIZE;
        assert!(!stack.clear_at(free_region as *const u8));

        // Failures leave the stack untouched.
        assert_eq!(stack.used(), used);
        assert_eq!(stack.top().map(|p| p.as_ptr()), Some(x));
    }

    #[test]
    fn top_block_reallocates_in_place() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        let block = stack.alloc_align(32, 8).expect("alloc").as_ptr();
        let used = stack.used();

        // Growing keeps the address and bumps the offset.
        let grown = stack.realloc_align(block, 64, 8).expect("grow");
        assert_eq!(grown.as_ptr(), block);
        assert_eq!(stack.used(), used + 32);
        assert_eq!(stack.top_size(), 64);

        // Shrinking keeps the address and retreats the offset.
        let shrunk = stack.realloc_align(block, 16, 8).expect("shrink");
        assert_eq!(shrunk.as_ptr(), block);
        assert_eq!(stack.used(), used - 16);
        assert_eq!(stack.top_size(), 16);
    }

    #[test]
    fn in_place_growth_respects_capacity() {
        let mut buffer = Buffer::<128>::new();
        let mut stack = buffer.stack();

        let block = stack.alloc_align(32, 8).expect("alloc").as_ptr();
        let used = stack.used();

        assert!(stack.realloc_align(block, 4096, 8).is_none());
        assert_eq!(stack.used(), used);
        assert_eq!(stack.top_size(), 32);
    }

    #[test]
    fn non_top_realloc_copies_into_a_new_block() {
        let mut buffer = Buffer::<512>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(32, 8).expect("x").as_ptr();
        unsafe {
            for i in 0..32 {
                x.add(i).write(i as u8 + 1);
            }
        }
        let _y = stack.alloc_align(32, 8).expect("y");

        let moved = stack.realloc_align(x, 48, 8).expect("moved").as_ptr();
        assert_ne!(moved, x);

        // The first min(old, new) bytes migrated; the tail is zeroed.
        unsafe {
            for i in 0..32 {
                assert_eq!(moved.add(i).read(), i as u8 + 1);
            }
            for i in 32..48 {
                assert_eq!(moved.add(i).read(), 0);
            }
        }
    }

    #[test]
    fn realloc_to_zero_frees_the_block() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        let block = stack.alloc_align(32, 8).expect("alloc").as_ptr();
        assert!(stack.realloc_align(block, 0, 8).is_none());
        assert_eq!(stack.used(), 0);
        assert!(stack.top().is_none());
    }

    #[test]
    fn realloc_rejects_freed_and_foreign_pointers() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        let x = stack.alloc_align(32, 8).expect("x").as_ptr();
        let y = stack.alloc_align(32, 8).expect("y").as_ptr();

        // Free y, then try to resize it: use-after-free.
        assert!(stack.pop());
        assert!(stack.realloc_align(y, 64, 8).is_none());

        // A pointer the stack never handed out.
        let mut foreign = [0u8; 64];
        assert!(stack
            .realloc_align(foreign.as_mut_ptr(), 16, 8)
            .is_none());

        // x is still intact.
        assert_eq!(stack.top().map(|p| p.as_ptr()), Some(x));
    }

    #[test]
    fn exhaustion_boundary_is_exact() {
        let mut buffer = Buffer::<128>::new();
        let base = buffer.0.as_ptr() as usize;
        let mut stack = buffer.stack();

        let padding = mem::padding_with_header(base, 8, HEADER_SIZE, size_of::<usize>());
        let largest = 128 - padding;

        // Exactly the remaining space succeeds; one more byte fails.
        assert!(stack.alloc_align(largest, 8).is_some());
        assert_eq!(stack.used(), 128);

        stack.clear();
        assert!(stack.alloc_align(largest + 1, 8).is_none());
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn clear_resets_both_offsets() {
        let mut buffer = Buffer::<256>::new();
        let mut stack = buffer.stack();

        stack.alloc_align(32, 8).expect("a");
        stack.alloc_align(32, 8).expect("b");
        stack.clear();

        assert_eq!(stack.used(), 0);
        assert!(stack.top().is_none());
        assert_eq!(stack.top_previous_offset(), 0);

        // The buffer is immediately reusable.
        assert!(stack.alloc_align(64, 8).is_some());
    }

    // ===== Arena =====

    #[test]
    fn arena_realloc_extends_the_last_block_in_place() {
        let mut buffer = Buffer::<256>::new();
        let mut arena = buffer.arena();

        let block = arena.alloc_align(32, 8).expect("alloc").as_ptr();
        let resized = arena.realloc_align(block, 32, 64, 8).expect("grow");
        assert_eq!(resized.as_ptr(), block);
        assert_eq!(arena.used(), 64);

        let shrunk = arena.realloc_align(block, 64, 16, 8).expect("shrink");
        assert_eq!(shrunk.as_ptr(), block);
        assert_eq!(arena.used(), 16);
    }

    #[test]
    fn arena_realloc_copies_interior_blocks() {
        let mut buffer = Buffer::<512>::new();
        let mut arena = buffer.arena();

        let x = arena.alloc_align(16, 8).expect("x").as_ptr();
        unsafe {
            for i in 0..16 {
                x.add(i).write(0xA0 + i as u8);
            }
        }
        let _y = arena.alloc_align(16, 8).expect("y");

        let moved = arena.realloc_align(x, 16, 32, 8).expect("moved").as_ptr();
        assert_ne!(moved, x);
        unsafe {
            for i in 0..16 {
                assert_eq!(moved.add(i).read(), 0xA0 + i as u8);
            }
        }
    }

    #[test]
    fn arena_realloc_rejects_bad_pointers() {
        let mut buffer = Buffer::<128>::new();
        let mut arena = buffer.arena();

        let block = arena.alloc_align(32, 8).expect("alloc").as_ptr();

        // Beyond the buffer.
        let foreign = buffer.0.as_ptr() as usize + 4096;
        assert!(arena
            .realloc_align(foreign as *mut u8, 16, 32, 8)
            .is_none());

        // Into the free region.
        let free_region = unsafe { block.add(64) };
        assert!(arena.realloc_align(free_region, 16, 32, 8).is_none());
    }

    #[test]
    fn arena_typed_realloc_preserves_values() {
        let mut buffer = Buffer::<512>::new();
        let mut arena = buffer.arena();

        let values: NonNull<u32> = arena.alloc(4).expect("alloc");
        unsafe {
            for i in 0..4 {
                values.as_ptr().add(i).write(i as u32 * 7);
            }
        }
        let _bump = arena.alloc::<u8>(1).expect("displace");

        let resized = arena.realloc(values.as_ptr(), 4, 8).expect("resized");
        assert_ne!(resized, values);
        unsafe {
            for i in 0..4 {
                assert_eq!(resized.as_ptr().add(i).read(), i as u32 * 7);
            }
        }
    }

    // ===== Manager =====

    #[test]
    fn manager_counts_allocations_and_pops() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");
        assert_eq!(manager.allocation_count(), 0);

        manager.alloc::<u64>(8).expect("a");
        manager.alloc::<u32>(4).expect("b");
        assert_eq!(manager.allocation_count(), 2);

        assert!(manager.pop());
        assert_eq!(manager.allocation_count(), 1);

        assert!(manager.pop());
        assert!(!manager.pop());
        assert_eq!(manager.allocation_count(), 0);
    }

    #[test]
    fn manager_failed_allocation_leaves_count_unchanged() {
        let mut manager = MemoryManager::new(4096).expect("manager");
        assert!(manager.alloc::<u8>(1 << 20).is_none());
        assert_eq!(manager.allocation_count(), 0);
        assert_eq!(manager.used(), 0);
    }

    #[test]
    fn manager_realloc_counts_only_new_blocks() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");

        let block = manager.alloc::<u8>(16).expect("alloc").as_ptr();
        assert_eq!(manager.allocation_count(), 1);

        // Top block resizes in place: no new block, no count change.
        let same = manager.realloc(block, 32).expect("in place");
        assert_eq!(same.as_ptr(), block);
        assert_eq!(manager.allocation_count(), 1);

        // Burying the block forces a copy, which counts.
        manager.alloc::<u8>(16).expect("bury");
        let moved = manager.realloc(block, 64).expect("copied");
        assert_ne!(moved.as_ptr(), block);
        assert_eq!(manager.allocation_count(), 3);
    }

    #[test]
    fn clear_until_pops_back_to_the_given_block() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");

        let x = manager.alloc::<u8>(32).expect("x");
        let y = manager.alloc::<u8>(32).expect("y");
        manager.alloc::<u8>(32).expect("z");
        assert_eq!(manager.allocation_count(), 3);

        assert!(manager.clear_until(y.as_ptr()));
        assert_eq!(manager.allocation_count(), 1);
        assert_eq!(manager.allocator().top(), Some(x));
    }

    #[test]
    fn clear_until_with_a_non_boundary_pointer_drains_the_stack() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");

        let x = manager.alloc::<u8>(32).expect("x");
        manager.alloc::<u8>(32).expect("y");
        manager.alloc::<u8>(32).expect("z");
        assert_eq!(manager.allocation_count(), 3);

        // An interior pointer never matches a popped block, so the loop
        // walks the whole stack and still reports success.
        let interior = unsafe { x.as_ptr().add(7) };
        assert!(manager.clear_until(interior));
        assert_eq!(manager.allocation_count(), 0);
        assert_eq!(manager.used(), 0);
        assert!(manager.allocator().top().is_none());
    }

    #[test]
    fn clear_until_rejects_pointers_outside_the_live_region() {
        let mut manager = MemoryManager::new(4096).expect("manager");
        let block = manager.alloc::<u8>(32).expect("block");

        assert!(!manager.clear_until(core::ptr::null()));

        let beyond = block.as_ptr() as usize + (1 << 20);
        assert!(!manager.clear_until(beyond as *const u8));

        assert_eq!(manager.allocation_count(), 1);
    }

    #[test]
    fn manager_clear_resets_everything() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");

        manager.alloc::<u64>(8).expect("a");
        manager.alloc::<u64>(8).expect("b");
        manager.clear();

        assert_eq!(manager.allocation_count(), 0);
        assert_eq!(manager.used(), 0);
        assert!(manager.alloc::<u64>(8).is_some());
    }

    #[test]
    fn make_arena_carves_a_working_sub_allocator() {
        let mut manager = MemoryManager::new(1 << 16).expect("manager");

        let mut arena = manager.make_arena(4096).expect("arena");
        assert_eq!(manager.allocation_count(), 1);
        assert!(manager.used() >= 4096);

        let values: NonNull<u32> = arena.alloc(16).expect("arena alloc");
        unsafe { values.as_ptr().write(0xDEAD_BEEF) };
        assert_eq!(arena.capacity(), 4096);

        // A carve bigger than the remaining root space fails cleanly.
        assert!(manager.make_arena(1 << 20).is_none());
        assert_eq!(manager.allocation_count(), 1);
    }
}
