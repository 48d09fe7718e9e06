//! Stack memory for green threads
//!
//! Every green thread owns one [`Stack`]: an anonymous private mapping with a
//! `PROT_NONE` guard page at its low end, so an overflow faults instead of
//! running into a neighbouring allocation. The mapping is released exactly
//! once, when the `Stack` is dropped.
//!
//! ```text
//!  low                                                    high
//!  +-------------+---------------------------------------+
//!  | guard page  |  usable stack (grows downward)  <---  |
//!  +-------------+---------------------------------------+
//!  base          bottom()                               top()
//! ```

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    } else {
        compile_error!("Unsupported platform");
    }
}

use lwthread_core::error::MemoryError;

/// Round `size` up to a multiple of `page` (a power of two)
#[inline]
pub fn round_to_page(size: usize, page: usize) -> Result<usize, MemoryError> {
    debug_assert!(page.is_power_of_two());
    size.checked_add(page - 1)
        .map(|s| s & !(page - 1))
        .ok_or(MemoryError::SizeOverflow)
}
