//! Alignment math and raw memory primitives.
//!
//! Design: `padding_with_header` reserves room for a block header *below*
//! the address it aligns, so a single bump places both the header and the
//! data block at their required alignments. Both allocators share this math.

/// Align `addr` forward to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub fn align_forward(addr: usize, alignment: usize) -> usize {
    assert!(
        alignment.is_power_of_two(),
        "expected alignment ({alignment}) to be a power of two"
    );

    let mod_align = addr & (alignment - 1); // Same as addr % alignment.
    if mod_align != 0 {
        addr + (alignment - mod_align)
    } else {
        addr
    }
}

/// Filler bytes needed before a new block at `addr` so that the block
/// satisfies `alignment` and the `header_size` bytes directly below it start
/// at a `header_alignment`-aligned address.
///
/// Two-stage computation: align the data block, then align the header slot
/// beneath it, then add the header itself. The result is always at least
/// `header_size`. Both alignments must be powers of two.
pub fn padding_with_header(
    addr: usize,
    alignment: usize,
    header_size: usize,
    header_alignment: usize,
) -> usize {
    assert!(
        alignment.is_power_of_two() && header_alignment.is_power_of_two(),
        "expected alignments to be powers of two (alignment: {alignment}, header_alignment: {header_alignment})"
    );

    // Padding necessary for the alignment of the new block of memory.
    let mut padding = 0;
    let mod_align = addr & (alignment - 1);
    if mod_align != 0 {
        padding += alignment - mod_align;
    }
    let addr = addr + padding;

    // Padding necessary for the header alignment.
    let mod_header = addr & (header_alignment - 1);
    if mod_header != 0 {
        padding += header_alignment - mod_header;
    }

    // The padding must at least contain the header.
    padding + header_size
}

/// Fill `size` bytes at `ptr` with `fill`.
///
/// # Safety
///
/// `ptr` must be valid for writes of `size` bytes.
#[inline]
pub unsafe fn memory_set(ptr: *mut u8, size: usize, fill: u8) {
    core::ptr::write_bytes(ptr, fill, size);
}

/// Copy `size` bytes from `src` to `dst`. The regions must not overlap.
///
/// # Safety
///
/// `src` must be valid for reads and `dst` for writes of `size` bytes, and
/// the two ranges must be disjoint.
#[inline]
pub unsafe fn memory_copy(dst: *mut u8, src: *const u8, size: usize) {
    debug_assert!(
        dst as usize >= src as usize + size || src as usize >= dst as usize + size,
        "memory_copy ranges overlap"
    );
    core::ptr::copy_nonoverlapping(src, dst, size);
}

/// Copy `size` bytes from `src` to `dst`; the regions may overlap.
///
/// # Safety
///
/// `src` must be valid for reads and `dst` for writes of `size` bytes.
#[inline]
pub unsafe fn memory_move(dst: *mut u8, src: *const u8, size: usize) {
    core::ptr::copy(src, dst, size);
}
