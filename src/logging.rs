//! Logging utilities for the allocators.
//!
//! Diagnostics only: allocation failures are reported through `tracing` and
//! the operation still returns `None`/`false`, whether or not a subscriber
//! is installed.

// Re-export tracing macros for use throughout the crate.
pub use tracing::{debug, error, info, trace, warn, Level};

/// Initialize logging with sensible defaults.
///
/// For release builds, logs at INFO level and above are enabled; debug
/// builds also enable DEBUG and TRACE. `RUST_LOG` overrides both.
pub fn init() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("memroot=debug")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("memroot=info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

/// Log a successful allocation.
#[inline]
pub fn log_allocation(size: usize, ptr: *const u8) {
    trace!(
        target: "allocator",
        size,
        ptr = ?ptr,
        "allocated block"
    );
}

/// Log a block being handed back (popped or rolled back over).
#[inline]
pub fn log_deallocation(size: usize, ptr: *const u8) {
    trace!(
        target: "allocator",
        size,
        ptr = ?ptr,
        "freed block"
    );
}
