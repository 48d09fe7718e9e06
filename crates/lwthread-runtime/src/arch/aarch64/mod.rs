//! aarch64 context switching implementation
//!
//! AAPCS64: x19-x29, the link register, sp and the low halves of v8-v15
//! (d8-d15) are callee-saved.

use super::EntryFn;
use std::arch::naked_asm;

/// Saved registers for a voluntary switch
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Context {
    /// x19..=x28
    pub x: [u64; 10],
    pub fp: u64,
    pub lr: u64,
    pub sp: u64,
    /// d8..=d15
    pub d: [u64; 8],
}

impl Context {
    pub(crate) const fn zeroed() -> Self {
        Self { x: [0; 10], fp: 0, lr: 0, sp: 0, d: [0; 8] }
    }
}

/// Initialize a fresh context
///
/// # Safety
///
/// `ctx` must point to valid `Context` memory and `stack_top` must be the
/// one-past-the-end address of a writable stack.
#[inline]
pub(crate) unsafe fn init_context(ctx: *mut Context, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let ctx = &mut *ctx;
    *ctx = Context::zeroed();
    ctx.sp = ((stack_top as usize) & !0xF) as u64;
    ctx.lr = entry_trampoline as usize as u64;
    ctx.x[0] = entry as usize as u64; // x19
    ctx.x[1] = arg as u64; // x20
}

/// Calls `x19(x20)`; the entry function never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #0",
    );
}

/// Perform a voluntary context switch
///
/// # Safety
///
/// Same contract as the x86_64 version.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(_old: *mut Context, _new: *const Context) {
    naked_asm!(
        // Save to old (x0)
        "stp x19, x20, [x0, #0x00]",
        "stp x21, x22, [x0, #0x10]",
        "stp x23, x24, [x0, #0x20]",
        "stp x25, x26, [x0, #0x30]",
        "stp x27, x28, [x0, #0x40]",
        "stp x29, x30, [x0, #0x50]",
        "mov x9, sp",
        "str x9, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new (x1)
        "ldp x19, x20, [x1, #0x00]",
        "ldp x21, x22, [x1, #0x10]",
        "ldp x23, x24, [x1, #0x20]",
        "ldp x25, x26, [x1, #0x30]",
        "ldp x27, x28, [x1, #0x40]",
        "ldp x29, x30, [x1, #0x50]",
        "ldr x9, [x1, #0x60]",
        "mov sp, x9",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}
