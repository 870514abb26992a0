//! Memory allocators - arena and stack bump allocation over flat buffers.
//!
//! Design: three layers sharing the alignment math in [`crate::mem`]:
//! 1. [`Arena`] - offset-only bump allocation, whole-arena reset or
//!    checkpoint/restore.
//! 2. [`Stack`] - bump allocation with a header behind every block, enabling
//!    LIFO pop, rollback to a block boundary, and in-place top reallocation.
//! 3. [`MemoryManager`] - a stack over an OS reservation, intended as the
//!    application's root memory resource; can carve sub-arenas.
//!
//! Neither allocator owns its buffer; only the manager (and `Arena::owned`)
//! hold an OS reservation, released on drop / `free_owned`.

mod arena;
mod header;
mod manager;
mod stack;

#[cfg(test)]
mod tests;

pub use arena::{Arena, ArenaCheckpoint};
pub use header::BlockHeader;
pub use manager::MemoryManager;
pub use stack::Stack;
