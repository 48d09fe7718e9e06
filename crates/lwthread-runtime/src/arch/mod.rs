//! Architecture-specific context switching
//!
//! Each architecture provides the same three items:
//!
//! - `Context` - callee-saved register snapshot
//! - `init_context` - bind a fresh context to a stack and entry point
//! - `switch_context` - save the current registers, load another context
//!
//! Nothing outside `fiber` touches these directly.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub(crate) use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub(crate) use self::aarch64::*;
    } else {
        compile_error!("Unsupported architecture");
    }
}

/// Entry point signature for a fresh context.
///
/// Receives the argument given to `init_context` and must never return.
pub(crate) type EntryFn = extern "C" fn(usize) -> !;
