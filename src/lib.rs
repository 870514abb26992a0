//! memroot - non-owning arena and stack allocators with a root memory manager
//!
//! This crate provides two bump allocators over caller-supplied buffers and a
//! manager that composes them into an application's root memory resource:
//!
//! ```text
//!   MemoryManager (root resource, owns the OS reservation)
//!   └── Stack (bump + per-block headers: pop, clear_at, in-place realloc)
//!       └── Arena × N (carved sub-regions: bump only, reset/checkpoint)
//! ```
//!
//! Neither allocator owns its memory - they manage offsets into a buffer
//! someone else keeps alive. Only the manager (and `Arena::owned`) touch the
//! OS, through [`vmem`].
//!
//! Stack block layout:
//!
//! ```text
//!          previous                          current
//!           offset                           offset
//!             ^                                ^
//!             |                                |
//!   |header 1|block 1|++++|header 2| block 2  | free space |
//!   ^                ^             ^                       ^
//!   |                |---padding---|                       |
//! start                                                   end
//! ```
//!
//! Every block is preceded by a [`BlockHeader`] recording the padding spent
//! on alignment, the block capacity, and the offset of the previously
//! allocated block - enough to pop in LIFO order or roll back to any earlier
//! block boundary.
//!
//! ## Error model
//!
//! Allocation returns `Option<NonNull<u8>>`; status operations return `bool`.
//! Capacity exhaustion and invalid pointers are logged (via `tracing`) and
//! reported as `None`/`false`, never panics. Contract violations - a
//! non-power-of-two alignment, restoring a checkpoint on the wrong arena -
//! are assertions. The `abort-on-memory-error` feature turns allocation
//! failure into a process abort for programs that cannot run degraded.
//!
//! ## Safety
//!
//! The allocators hand out raw pointers into a flat buffer and trust the
//! caller to respect their lifetimes: a pointer freed by `pop`/`clear_at`
//! dangles, and `clear_at` interprets the bytes behind any in-range pointer
//! as a header. Allocator instances are single-threaded by design (`!Send`,
//! `!Sync` via their raw-pointer fields); callers that share one must
//! serialize access themselves.

pub mod allocator;
pub mod logging;
pub mod mem;
pub mod vmem;

// Re-export the primary API surface.
pub use allocator::{Arena, ArenaCheckpoint, BlockHeader, MemoryManager, Stack};

/// Escalation point for allocation failure, called after the failure has
/// been logged. A no-op unless `abort-on-memory-error` is enabled.
#[inline]
pub(crate) fn handle_memory_error() {
    #[cfg(feature = "abort-on-memory-error")]
    std::process::abort();
}
