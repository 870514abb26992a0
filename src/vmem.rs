//! OS virtual-memory reservation and release.
//!
//! Backs the memory manager's root stack and owned arenas. Unix goes through
//! anonymous private `mmap`; Windows through `VirtualAlloc`. Reserved pages
//! are zero-initialized by the OS.

use core::ptr::NonNull;

use tracing::error;

/// Reserve `size` bytes of read-write memory from the OS.
///
/// Returns `None` after logging the OS error if the reservation fails (or
/// aborts under the `abort-on-memory-error` feature). A zero `size` request
/// fails without touching the OS.
pub fn reserve(size: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        return None;
    }

    let memory = os_reserve(size);
    if memory.is_none() {
        error!(
            target: "vmem",
            size,
            error = %std::io::Error::last_os_error(),
            "OS failed to reserve memory"
        );
        crate::handle_memory_error();
    }
    memory
}

/// Release a reservation previously obtained from [`reserve`].
///
/// `size` must be the size passed to [`reserve`] (ignored on Windows, which
/// releases whole reservations). Failure is logged, never fatal.
///
/// # Safety
///
/// `memory` must have been returned by [`reserve`] with this `size`, and no
/// live pointer into the region may be used afterwards.
pub unsafe fn release(memory: NonNull<u8>, size: usize) {
    if !os_release(memory, size) {
        error!(
            target: "vmem",
            ptr = ?memory.as_ptr(),
            size,
            error = %std::io::Error::last_os_error(),
            "OS failed to release memory"
        );
    }
}

#[cfg(unix)]
fn os_reserve(size: usize) -> Option<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            core::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return None;
    }
    NonNull::new(ptr as *mut u8)
}

#[cfg(unix)]
unsafe fn os_release(memory: NonNull<u8>, size: usize) -> bool {
    libc::munmap(memory.as_ptr() as *mut libc::c_void, size) == 0
}

#[cfg(windows)]
fn os_reserve(size: usize) -> Option<NonNull<u8>> {
    use winapi::um::memoryapi::VirtualAlloc;
    use winapi::um::winnt::{MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

    let ptr = unsafe {
        VirtualAlloc(
            core::ptr::null_mut(),
            size,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        )
    };
    NonNull::new(ptr as *mut u8)
}

#[cfg(windows)]
unsafe fn os_release(memory: NonNull<u8>, size: usize) -> bool {
    use winapi::um::memoryapi::VirtualFree;
    use winapi::um::winnt::MEM_RELEASE;

    let _ = size;
    VirtualFree(memory.as_ptr() as *mut _, 0, MEM_RELEASE) != 0
}
