//! Unix stack implementation using mmap

use super::round_to_page;
use lwthread_core::constants::GUARD_SIZE;
use lwthread_core::error::MemoryError;
use nix::unistd::{sysconf, SysconfVar};
use std::ptr::NonNull;
use std::sync::OnceLock;

/// System page size (falls back to 4 KB if sysconf has no answer)
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(n)) if n > 0 => n as usize,
        _ => 4096,
    })
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// An exclusively-owned, guard-protected stack mapping
pub struct Stack {
    /// Start of the mapping (the guard page)
    base: NonNull<u8>,
    /// Total mapping length, guard included
    len: usize,
    /// Guard length
    guard: usize,
}

// The mapping is plain memory owned by this value alone.
unsafe impl Send for Stack {}

impl Stack {
    /// Map a stack with at least `size` usable bytes
    pub fn new(size: usize) -> Result<Stack, MemoryError> {
        let page = page_size();
        let usable = round_to_page(size, page)?;
        let guard = round_to_page(GUARD_SIZE, page)?;
        let len = usable.checked_add(guard).ok_or(MemoryError::SizeOverflow)?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::MapFailed(last_errno()));
        }

        // Low end becomes the guard (stack grows down toward it)
        let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
        if ret != 0 {
            let errno = last_errno();
            unsafe {
                libc::munmap(base, len);
            }
            return Err(MemoryError::ProtectionFailed(errno));
        }

        let base = NonNull::new(base as *mut u8).ok_or(MemoryError::MapFailed(0))?;
        Ok(Stack { base, len, guard })
    }

    /// Lowest usable address
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.guard) }
    }

    /// One past the highest usable address (initial stack pointer)
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.len) }
    }

    /// Usable size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.len - self.guard
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("size", &self.size())
            .finish()
    }
}
