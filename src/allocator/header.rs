//! Per-block metadata for the stack allocator.

/// Header written immediately before every stack-allocated block.
///
/// Memory layout:
///
/// ```text
///           previous_offset                      |-capacity-|
///                  ^                             ^          ^
///                  |                             |          |
///  |previous header|previous block|++++++|header|   block   |
///                                 ^             ^
///                                 |---padding---|
/// ```
///
/// `padding` counts the alignment filler *and* the header itself, so the end
/// of the previous block is always `block - padding`. `previous_offset` is a
/// back-pointer by offset (relative to the allocator buffer) to the data of
/// the block allocated before this one, forming the chain that `pop` and
/// `clear_at` walk.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct BlockHeader {
    /// Bytes between the end of the previous block and the start of this
    /// block's data. Always at least `HEADER_SIZE`.
    pub padding: usize,
    /// Size in bytes of the data block this header describes.
    pub capacity: usize,
    /// The allocator's `previous_offset` before this block was created; zero
    /// if this block was the first.
    pub previous_offset: usize,
}

/// Size in bytes of [`BlockHeader`].
pub(crate) const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

/// Alignment requirement of [`BlockHeader`].
pub(crate) const HEADER_ALIGN: usize = core::mem::align_of::<BlockHeader>();

impl BlockHeader {
    /// Pointer to the header stored directly behind a block's data pointer.
    ///
    /// # Safety
    ///
    /// `block` must point at least `HEADER_SIZE` bytes past the start of an
    /// allocator buffer holding an initialized header at that position.
    #[inline]
    pub(crate) unsafe fn behind(block: *const u8) -> *const BlockHeader {
        block.sub(HEADER_SIZE) as *const BlockHeader
    }
}
