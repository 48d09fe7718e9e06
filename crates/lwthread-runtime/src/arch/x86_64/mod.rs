//! x86_64 context switching implementation
//!
//! System V AMD64: rbx, rbp, r12-r15 and rsp are callee-saved, so a
//! voluntary switch only has to preserve those plus the resume address.

use super::EntryFn;
use std::arch::naked_asm;

/// Saved registers for a voluntary switch
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Context {
    pub rsp: u64,
    pub rip: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl Context {
    pub(crate) const fn zeroed() -> Self {
        Self { rsp: 0, rip: 0, rbx: 0, rbp: 0, r12: 0, r13: 0, r14: 0, r15: 0 }
    }
}

/// Initialize a fresh context
///
/// The first switch into `ctx` lands in `entry_trampoline`, which calls
/// `entry(arg)` on the new stack.
///
/// # Safety
///
/// `ctx` must point to valid `Context` memory and `stack_top` must be the
/// one-past-the-end address of a writable stack.
#[inline]
pub(crate) unsafe fn init_context(ctx: *mut Context, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    // The trampoline is entered by `jmp`, not `call`, so the stack must be
    // 16-byte aligned here for the `call` inside it to satisfy the ABI.
    let aligned_sp = (stack_top as usize) & !0xF;

    let ctx = &mut *ctx;
    *ctx = Context::zeroed();
    ctx.rsp = aligned_sp as u64;
    ctx.rip = entry_trampoline as usize as u64;
    ctx.r12 = entry as usize as u64;
    ctx.r13 = arg as u64;
}

/// Calls `r12(r13)`; the entry function never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Perform a voluntary context switch
///
/// Saves callee-saved registers to `old` and loads from `new`. Returns when
/// some other context switches back into `old`.
///
/// # Safety
///
/// `new` must hold a context produced by `init_context` or by a previous
/// switch out of a stack that is still alive.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(_old: *mut Context, _new: *const Context) {
    naked_asm!(
        // Save callee-saved registers to old (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from new (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for a saved context
        "1:",
        "ret",
    );
}
